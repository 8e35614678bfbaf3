use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::StoreScope;
use crate::storage::repository::*;

/// In-memory parameter store. Records every name it is asked for so callers
/// can check which keys were looked up and how often.
#[derive(Clone, Default)]
pub struct LocalStorage {
    parameters: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashMap<String, StoreError>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters<K, V>(parameters: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        for (name, value) in parameters {
            storage.insert(name, value);
        }
        storage
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), value.into());
    }

    /// Makes every fetch of `name` fail with `error`.
    pub fn fail_with(&self, name: impl Into<String>, error: StoreError) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), error);
    }

    pub fn fetch_count(&self) -> usize {
        self.requests.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl ParameterStore for LocalStorage {
    async fn fetch(&self, name: &str, _decrypt: bool) -> Result<Option<String>, StoreError> {
        self.requests
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());

        if let Some(error) = self
            .failures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Err(error.clone());
        }

        Ok(self
            .parameters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned())
    }
}

/// Hands out [`LocalStorage`] instances per scope. Scopes without a
/// dedicated store fall back to the default one.
#[derive(Clone, Default)]
pub struct LocalStorageFactory {
    default_store: LocalStorage,
    scoped: HashMap<StoreScope, LocalStorage>,
    created: Arc<AtomicUsize>,
}

impl LocalStorageFactory {
    pub fn new(default_store: LocalStorage) -> Self {
        Self {
            default_store,
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: StoreScope, store: LocalStorage) -> Self {
        self.scoped.insert(scope, store);
        self
    }

    /// Number of times a store was requested from this factory.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ParameterStoreFactory for LocalStorageFactory {
    async fn store_for(&self, scope: &StoreScope) -> Result<Arc<dyn ParameterStore>, StoreError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let store: Arc<dyn ParameterStore> =
            Arc::new(self.scoped.get(scope).unwrap_or(&self.default_store).clone());
        Ok(store)
    }
}
