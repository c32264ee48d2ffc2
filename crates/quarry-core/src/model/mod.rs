//! Runtime schema model.
//!
//! Entities, their fields, and the association graph between them. Query
//! definitions resolve association paths against this graph once, at build
//! time, so that every join the assembler emits is known to be valid.
//!
//! In general:
//! - `Schema` defines *what exists*
//! - `db::definition` defines *what may be asked*

mod association;
mod entity;
mod schema;


pub use association::{Association, AssociationKind, AssociationPath, JoinStep, ResolvedPath};
pub use entity::{EntityModel, FieldKind, FieldModel};
pub use schema::Schema;
