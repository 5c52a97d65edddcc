//! IPC contract between a client application and an authentication broker
//!
//! The broker is reached over one of several channels (content provider,
//! bound service, account manager). This crate only describes the shape of a
//! call: a [`BrokerOperationBundle`] goes out, a flat [`Bundle`] comes back, or
//! the call fails with a [`CommunicationError`].
//!
//! [`StrategyChain`] combines several channels and falls back from one to the
//! next when a channel is unavailable.

pub mod bundle;
pub mod chain;
pub mod errors;
pub mod operation;
pub mod strategy;

pub use bundle::{Bundle, BundleValue};
pub use chain::StrategyChain;
pub use errors::{Category, CommunicationError, Result};
pub use operation::{BrokerOperation, BrokerOperationBundle};
pub use strategy::{IpcStrategy, IpcStrategyType, IpcTransport};
