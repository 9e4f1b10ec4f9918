//! The `identity` module translates user identifiers between the CEGA
//! namespace (EGA ids) and the LEGA namespace (Elixir ids).
//!
//! Lookups go through a `MappingStore`. The production store is the
//! `mapping(ega_id, elixir_id)` table in Postgres; an in-memory store backs
//! the tests. The translator never writes to the store.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::utils::error::TranslateError;

pub use memory::MemoryMappingStore;
pub use postgres::PgMappingStore;

/// Which way a message crosses the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    CegaToLega,
    LegaToCega,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::CegaToLega => f.write_str("CEGA to LEGA"),
            Direction::LegaToCega => f.write_str("LEGA to CEGA"),
        }
    }
}

/// Read-only access to the identity mapping.
///
/// Both lookups return `Ok(None)` when no row matches.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn elixir_id_for(&self, ega_id: &str) -> Result<Option<String>, TranslateError>;

    async fn ega_id_for(&self, elixir_id: &str) -> Result<Option<String>, TranslateError>;
}

#[derive(Clone)]
pub struct IdentityTranslator {
    store: Arc<dyn MappingStore>,
}

impl IdentityTranslator {
    pub fn new(store: impl MappingStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Maps an EGA id to its Elixir id.
    pub async fn to_elixir_id(&self, ega_id: &str) -> Result<String, TranslateError> {
        match self.store.elixir_id_for(ega_id).await? {
            Some(elixir_id) => {
                info!(ega_id, elixir_id = %elixir_id, "Replacing EGA ID with Elixir ID");
                Ok(elixir_id)
            }
            None => Err(TranslateError::NotFound {
                id: ega_id.to_string(),
            }),
        }
    }

    /// Maps an Elixir id to its EGA id.
    pub async fn to_ega_id(&self, elixir_id: &str) -> Result<String, TranslateError> {
        match self.store.ega_id_for(elixir_id).await? {
            Some(ega_id) => {
                info!(elixir_id, ega_id = %ega_id, "Replacing Elixir ID with EGA ID");
                Ok(ega_id)
            }
            None => Err(TranslateError::NotFound {
                id: elixir_id.to_string(),
            }),
        }
    }

    /// Translates `id` into the namespace of the destination side.
    pub async fn translate(
        &self,
        id: &str,
        direction: Direction,
    ) -> Result<String, TranslateError> {
        match direction {
            Direction::CegaToLega => self.to_elixir_id(id).await,
            Direction::LegaToCega => self.to_ega_id(id).await,
        }
    }
}

impl fmt::Debug for IdentityTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityTranslator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
