use std::{fmt, sync::Arc};

use crate::domain::StoreScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    ConnectionFailed(String),
    AccessDenied(String),
    Throttled(String),
    MalformedResponse(String),
    QueryFailed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            Self::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            Self::Throttled(msg) => write!(f, "Request throttled: {}", msg),
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Self::QueryFailed(msg) => write!(f, "Query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read access to a key-value parameter store.
///
/// `Ok(None)` is reserved for a store that explicitly reports the parameter
/// as absent. Every other failure is an `Err`.
#[async_trait::async_trait]
pub trait ParameterStore: Send + Sync {
    async fn fetch(&self, name: &str, decrypt: bool) -> Result<Option<String>, StoreError>;
}

/// Builds store clients for a region/account scope
#[async_trait::async_trait]
pub trait ParameterStoreFactory: Send + Sync {
    async fn store_for(&self, scope: &StoreScope) -> Result<Arc<dyn ParameterStore>, StoreError>;
}
