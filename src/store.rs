//! The secret store capability consumed by hydration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::item::RawItem;

/// A secrets manager holding items and resolving `op://` references.
///
/// Implementations own transport, authentication and any retry policy; errors
/// are propagated by the hydrator as-is.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the full item `item` from vault `vault`.
    async fn fetch_item(&self, vault: &str, item: &str) -> Result<RawItem, StoreError>;

    /// Resolve one reference hop. The result may itself be another reference.
    async fn resolve_reference(&self, reference: &str) -> Result<String, StoreError>;
}

/// A store kept entirely in memory. Handy for local development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<(String, String), RawItem>,
    references: HashMap<String, String>,
    resolutions: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, vault: &str, item: RawItem) -> Self {
        self.items.insert((vault.to_string(), item.title.clone()), item);
        self
    }

    pub fn with_reference(mut self, reference: &str, value: &str) -> Self {
        self.references.insert(reference.to_string(), value.to_string());
        self
    }

    /// Number of `resolve_reference` calls served so far.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn fetch_item(&self, vault: &str, item: &str) -> Result<RawItem, StoreError> {
        if !self.items.keys().any(|(v, _)| v == vault) {
            return Err(StoreError::VaultNotFound(vault.to_string()));
        }
        self.items
            .get(&(vault.to_string(), item.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound {
                vault: vault.to_string(),
                item: item.to_string(),
            })
    }

    async fn resolve_reference(&self, reference: &str) -> Result<String, StoreError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.references
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::FieldNotFound {
                reference: reference.to_string(),
                field: reference.rsplit('/').next().unwrap_or_default().to_string(),
            })
    }
}
