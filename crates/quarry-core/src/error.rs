use crate::{
    config::ConfigError,
    db::{params::ParamsError, response::ResponseError, store::StoreError},
    model::FieldKind,
    value::Value,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error surfaced by sessions and definition builders.
/// Each variant keeps its concern-specific payload intact.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Definition(_) => ErrorClass::Definition,
            Self::Validation(_) | Self::Params(_) => ErrorClass::Validation,
            Self::Store(_) => ErrorClass::Store,
            Self::Config(_) => ErrorClass::Config,
            Self::Response(_) => ErrorClass::Response,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}: {self}", self.class())
    }

    /// Borrow the validation payload when this is a parameter rejection.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

///
/// ErrorClass
///
/// Coarse classification: definition bugs are authoring errors, validation
/// errors are per-invocation rejections, store errors come from outside.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    Definition,
    Validation,
    Store,
    Config,
    Response,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Definition => "definition",
            Self::Validation => "validation",
            Self::Store => "store",
            Self::Config => "config",
            Self::Response => "response",
        };
        f.write_str(label)
    }
}

///
/// DefinitionError
///
/// Authoring bugs in a query definition or schema. Raised while building,
/// before any parameters are bound.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DefinitionError {
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("entity '{entity}' has no association '{association}'")]
    UnknownAssociation { entity: String, association: String },

    #[error("entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("association path must not be empty (aggregate '{alias}')")]
    EmptyAggregatePath { alias: String },

    #[error("duplicate {kind} '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("relation '{name}' is referenced before it is declared")]
    UnknownRelation { name: String },

    #[error("base relation reads '{found}' but the definition is declared for '{expected}'")]
    BaseEntityMismatch { expected: String, found: String },

    #[error("aggregate '{alias}': {message}")]
    InvalidAggregate { alias: String, message: String },

    #[error("text search field '{entity}.{field}' is {kind}, not text")]
    NotTextField {
        entity: String,
        field: String,
        kind: FieldKind,
    },
}

impl DefinitionError {
    pub(crate) fn unknown_entity(entity: impl Into<String>) -> Self {
        Self::UnknownEntity {
            entity: entity.into(),
        }
    }

    pub(crate) fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }
}

///
/// ValidationError
///
/// Structured per-invocation rejection of one bound parameter value.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("parameter '{key}' rejected value '{value}': {reason}")]
pub struct ValidationError {
    pub key: String,
    pub value: Value,
    pub reason: ValidationReason,
}

impl ValidationError {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value, reason: ValidationReason) -> Self {
        Self {
            key: key.into(),
            value,
            reason,
        }
    }

    pub(crate) fn rejected(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, value, ValidationReason::Rejected)
    }
}

///
/// ValidationReason
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidationReason {
    #[error("no handler branch accepts this value")]
    Rejected,

    #[error("not a sortable field")]
    UnknownSortField,

    #[error("expected a positive integer")]
    NotPositiveInteger,

    #[error("expected a {expected} value")]
    WrongKind { expected: FieldKind },

    #[error("{0}")]
    Extension(String),
}
