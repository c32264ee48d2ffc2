//! Store boundary.
//!
//! The core never talks to storage directly: every compiled relation, and
//! every preload fetch, goes through `Store::execute`. Connection handling,
//! pooling and retries belong to the implementation.

mod memory;

#[cfg(test)]
mod tests;

use crate::{db::relation::Relation, value::Record};
use std::sync::Arc;
use thiserror::Error as ThisError;

// re-exports
pub use memory::MemoryStore;

///
/// Store
///
/// Executes one relation as one request/response unit.
///

pub trait Store {
    fn execute(&self, relation: &Relation) -> Result<Vec<Record>, StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    fn execute(&self, relation: &Relation) -> Result<Vec<Record>, StoreError> {
        (**self).execute(relation)
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn execute(&self, relation: &Relation) -> Result<Vec<Record>, StoreError> {
        (**self).execute(relation)
    }
}

///
/// StoreError
///
/// Failure reported by a store. Passed to callers unchanged; the core never
/// retries.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },

    #[error("relation '{name}' is not in scope")]
    UnknownRelation { name: String },

    #[error("unsupported relation shape: {message}")]
    Unsupported { message: String },

    #[error("store backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
