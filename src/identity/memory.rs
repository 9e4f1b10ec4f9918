use std::collections::HashMap;

use async_trait::async_trait;

use super::MappingStore;
use crate::utils::error::TranslateError;

/// A fixed mapping held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryMappingStore {
    by_ega: HashMap<String, String>,
    by_elixir: HashMap<String, String>,
}

impl MemoryMappingStore {
    /// Builds a store from `(ega_id, elixir_id)` pairs.
    pub fn from_pairs<E, X>(pairs: impl IntoIterator<Item = (E, X)>) -> Self
    where
        E: Into<String>,
        X: Into<String>,
    {
        let mut store = Self::default();
        for (ega_id, elixir_id) in pairs {
            store.insert(ega_id, elixir_id);
        }
        store
    }

    pub fn insert(&mut self, ega_id: impl Into<String>, elixir_id: impl Into<String>) {
        let (ega_id, elixir_id) = (ega_id.into(), elixir_id.into());
        self.by_ega.insert(ega_id.clone(), elixir_id.clone());
        self.by_elixir.insert(elixir_id, ega_id);
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn elixir_id_for(&self, ega_id: &str) -> Result<Option<String>, TranslateError> {
        Ok(self.by_ega.get(ega_id).cloned())
    }

    async fn ega_id_for(&self, elixir_id: &str) -> Result<Option<String>, TranslateError> {
        Ok(self.by_elixir.get(elixir_id).cloned())
    }
}
