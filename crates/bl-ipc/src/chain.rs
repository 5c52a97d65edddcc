use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::bundle::Bundle;
use crate::errors::{CommunicationError, Result};
use crate::operation::BrokerOperationBundle;
use crate::strategy::{IpcStrategy, IpcStrategyType, IpcTransport};

/// Ordered list of IPC strategies tried one after another
///
/// Strategies that do not support the targeted broker are skipped. The first
/// successful reply wins; a [`CommunicationError`] moves on to the next
/// strategy, and the last error is returned once every strategy has failed.
#[derive(Clone, Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn IpcStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn IpcStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn push(&mut self, strategy: Arc<dyn IpcStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn strategy_types(&self) -> Vec<IpcStrategyType> {
        self.strategies.iter().map(|s| s.strategy_type()).collect()
    }
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChain")
            .field("strategies", &self.strategy_types())
            .finish()
    }
}

#[async_trait::async_trait]
impl IpcTransport for StrategyChain {
    #[instrument(skip(self, request), fields(operation = %request.operation, target = %request.target_broker_package))]
    async fn communicate(&self, request: &BrokerOperationBundle) -> Result<Bundle> {
        let mut last_error: Option<CommunicationError> = None;

        for strategy in &self.strategies {
            let strategy_type = strategy.strategy_type();
            if !strategy.is_supported_by_targeted_broker(&request.target_broker_package) {
                debug!("Skipping {} - not supported by target broker", strategy_type);
                continue;
            }

            debug!("Communicating with broker via {}", strategy_type);
            match strategy.communicate(request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("IPC via {} failed, trying next strategy: {}", strategy_type, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CommunicationError::no_usable_strategy(format!(
                "No IPC strategy supports broker '{}'",
                request.target_broker_package
            ))
        }))
    }
}
