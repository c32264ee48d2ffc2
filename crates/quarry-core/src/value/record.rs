use crate::value::Value;
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Record
///
/// One row: field name to value. Used for stored rows, projected results,
/// and preloaded associations alike.
///

#[derive(
    Clone, Debug, Default, Deref, Deserialize, Eq, IntoIterator, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Field value, treating an absent field as null.
    #[must_use]
    pub fn value(&self, field: &str) -> &Value {
        const NULL: &Value = &Value::Null;

        self.0.get(field).unwrap_or(NULL)
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
