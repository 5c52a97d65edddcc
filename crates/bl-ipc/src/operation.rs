use std::fmt;

use crate::bundle::Bundle;

/// Broker API addressed by an IPC call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerOperation {
    /// Protocol version negotiation
    Hello,
    AcquireTokenSilent,
    GetAccounts,
    RemoveAccount,
    GetCurrentAccountInSharedDevice,
    GetDeviceMode,
    SignOutFromSharedDevice,
    GenerateShr,
}

impl BrokerOperation {
    /// Stable wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "MSAL_HELLO",
            Self::AcquireTokenSilent => "MSAL_ACQUIRE_TOKEN_SILENT",
            Self::GetAccounts => "MSAL_GET_ACCOUNTS",
            Self::RemoveAccount => "MSAL_REMOVE_ACCOUNT",
            Self::GetCurrentAccountInSharedDevice => "MSAL_GET_CURRENT_ACCOUNT_IN_SHARED_DEVICE",
            Self::GetDeviceMode => "MSAL_GET_DEVICE_MODE",
            Self::SignOutFromSharedDevice => "MSAL_SIGN_OUT_FROM_SHARED_DEVICE",
            Self::GenerateShr => "MSAL_GENERATE_SHR",
        }
    }
}

impl fmt::Display for BrokerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation, its parameters and the broker package it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOperationBundle {
    pub operation: BrokerOperation,
    pub target_broker_package: String,
    pub bundle: Bundle,
}

impl BrokerOperationBundle {
    pub fn new(
        operation: BrokerOperation,
        target_broker_package: impl Into<String>,
        bundle: Bundle,
    ) -> Self {
        Self {
            operation,
            target_broker_package: target_broker_package.into(),
            bundle,
        }
    }
}
