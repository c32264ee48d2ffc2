//! Core runtime for Quarry: schema model, relations, query definitions, the
//! assembler that composes them, and the stores that execute the result.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Column name under which aggregate sub-relations expose their owner key.
pub const OWNER_KEY_COLUMN: &str = "owner_key";

/// Prefix applied to the names of aggregate sub-relations.
pub const AGGREGATE_RELATION_PREFIX: &str = "agg_";

/// Output column produced by count relations.
pub const COUNT_COLUMN: &str = "count";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// Stores, sessions, and errors are imported from their modules.
///

pub mod prelude {
    pub use crate::{
        db::{
            definition::{
                AggregateFunction, AggregateSpec, ParamHandler, QueryDefinition, ScopeTransform,
            },
            params::ParameterSet,
            predicate::{ColumnRef, Predicate},
            relation::{OrderDirection, Relation},
        },
        model::{AssociationPath, EntityModel, Schema},
        value::{Record, Value},
    };
}
