//! Query composition and execution.
//!
//! Pipeline: a `QueryDefinition` is declared once against a `Schema`; each
//! invocation binds a `ParameterSet`, the assembler composes the base
//! `Relation` into a `CompiledQuery`, and a `QuerySession` executes it on a
//! `Store` and decorates the rows.

pub mod aggregate;
pub mod assemble;
pub mod definition;
pub mod filter;
pub mod fingerprint;
pub mod params;
pub mod predicate;
pub mod relation;
pub mod response;
pub mod session;
pub mod sql;
pub mod store;

// re-exports
pub use assemble::{CompiledQuery, assemble};
pub use response::{DecoratedResult, DecoratedRow};
pub use session::QuerySession;
pub use store::{MemoryStore, Store, StoreError};
