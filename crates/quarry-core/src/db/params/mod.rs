//! Module: params
//! Responsibility: caller-supplied parameters and their bound, defaulted form.
//! Does not own: handler dispatch or predicate construction.
//! Boundary: the filter compiler consumes `BoundParams`, never raw input.


use crate::{db::definition::QueryDefinition, value::Value};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// ParamsError
///
/// Raw parameter input that cannot be represented as a `ParameterSet`.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ParamsError {
    #[error("parameters must be a JSON object")]
    NotAnObject,

    #[error("parameter '{key}' has an unsupported value (nested objects are not accepted)")]
    UnsupportedValue { key: String },
}

///
/// ParameterSet
///
/// Per-invocation mapping from parameter key to raw value. Keys nobody
/// declared are carried but never read.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, Value>);

impl ParameterSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build from a parsed JSON object such as a decoded request query.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ParamsError> {
        let serde_json::Value::Object(map) = json else {
            return Err(ParamsError::NotAnObject);
        };

        let mut out = BTreeMap::new();
        for (key, raw) in map {
            let Some(value) = value_from_json(raw) else {
                return Err(ParamsError::UnsupportedValue { key });
            };
            out.insert(key, value);
        }

        Ok(Self(out))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

fn value_from_json(raw: serde_json::Value) -> Option<Value> {
    Some(match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(v),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(v) => Value::Int(v),
            None => Value::Float(n.as_f64()?),
        },
        serde_json::Value::String(v) => Value::Text(v),
        serde_json::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(value_from_json)
                .collect::<Option<Vec<_>>>()?,
        ),
        serde_json::Value::Object(_) => return None,
    })
}

///
/// BoundParams
///
/// Declared keys only, blank values dropped, defaults applied. This is the
/// view handlers, CTE builders and extensions receive.
///

#[derive(Clone, Debug, Default, Deref, Eq, PartialEq)]
pub struct BoundParams(BTreeMap<String, Value>);

impl BoundParams {
    /// Bind `declared` keys (with optional defaults) against raw input.
    pub(crate) fn bind<'a>(
        declared: impl IntoIterator<Item = (&'a str, Option<&'a Value>)>,
        params: &ParameterSet,
    ) -> Self {
        let mut out = BTreeMap::new();
        for (key, default) in declared {
            let supplied = params.get(key).filter(|value| !value.is_blank());
            let value = supplied.or_else(|| default.filter(|value| !value.is_blank()));
            if let Some(value) = value {
                out.insert(key.to_string(), strip_blank_items(value.clone()));
            }
        }

        Self(out)
    }

    /// Value bound to `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

// `["a", "", null]` binds as `["a"]`.
fn strip_blank_items(value: Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.into_iter().filter(|v| !v.is_blank()).collect()),
        other => other,
    }
}

/// Bind a parameter set against every key `definition` declares.
#[must_use]
pub fn bind(definition: &QueryDefinition, params: &ParameterSet) -> BoundParams {
    BoundParams::bind(definition.declared_keys(), params)
}
