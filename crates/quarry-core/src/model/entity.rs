use crate::{
    model::association::{Association, AssociationKind},
    value::Value,
};
use std::fmt;

///
/// EntityModel
/// Runtime model for one entity: its table, key, fields and associations.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityModel {
    /// Table name; also the entity's stable name in definitions.
    pub name: String,
    /// Primary key field (must appear in `fields`).
    pub primary_key: String,
    /// Ordered field list.
    pub fields: Vec<FieldModel>,
    /// Outgoing associations, looked up by name.
    pub associations: Vec<Association>,
}

impl EntityModel {
    /// Create an entity whose primary key is an integer field.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();

        Self {
            name: name.into(),
            fields: vec![FieldModel::new(primary_key.clone(), FieldKind::Int)],
            primary_key,
            associations: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldModel::new(name, kind));
        self
    }

    #[must_use]
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(AssociationKind::BelongsTo, name, target, foreign_key)
    }

    #[must_use]
    pub fn has_many(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(AssociationKind::HasMany, name, target, foreign_key)
    }

    #[must_use]
    pub fn has_one(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(AssociationKind::HasOne, name, target, foreign_key)
    }

    fn association(
        mut self,
        kind: AssociationKind,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.associations.push(Association {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    #[must_use]
    pub fn find_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }
}

///
/// FieldModel
/// Field metadata used for validation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldModel {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldModel {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

///
/// FieldKind
///
/// Minimal type surface; aligned with `Value` variants.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Bool,
    Float,
    Int,
    Text,
    List,
}

impl FieldKind {
    /// Whether sum aggregates are defined over this kind.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Convert a raw parameter value into this kind. Lists convert member by
    /// member and fail if any member does; list fields take values as given.
    #[must_use]
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::List, _) => Some(value.clone()),
            (_, Value::List(items)) => items
                .iter()
                .map(|item| self.coerce(item))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            (Self::Int, _) => value.coerce_int().map(Value::Int),
            (Self::Float, _) => value.coerce_float().map(Value::Float),
            (Self::Bool, _) => value.coerce_bool().map(Value::Bool),
            (Self::Text, Value::Text(_)) => Some(value.clone()),
            (Self::Text, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(Value::Text(value.to_string()))
            }
            (Self::Text, Value::Null) => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::Text => "text",
            Self::List => "list",
        })
    }
}
