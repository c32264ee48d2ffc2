use crate::{
    db::{params::BoundParams, relation::Relation},
    error::ValidationError,
    value::{Record, Value},
};
use std::{fmt, sync::Arc};

/// Derived value for one fetched row.
pub type RowDecorationFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Derived value for the whole fetched result.
pub type RelationDecorationFn = Arc<dyn Fn(&[Record]) -> Value + Send + Sync>;

///
/// Decorations
///
/// Named pure functions registered with a definition and evaluated on demand
/// against executed rows. They only read; fetched data is never modified.
///

#[derive(Clone, Default)]
pub struct Decorations {
    rows: Vec<(String, RowDecorationFn)>,
    relation: Vec<(String, RelationDecorationFn)>,
}

impl Decorations {
    pub(crate) fn add_row(&mut self, name: String, f: RowDecorationFn) {
        self.rows.push((name, f));
    }

    pub(crate) fn add_relation(&mut self, name: String, f: RelationDecorationFn) {
        self.relation.push((name, f));
    }

    #[must_use]
    pub fn row(&self, name: &str) -> Option<&RowDecorationFn> {
        self.rows.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDecorationFn> {
        self.relation.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn row_names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(name, _)| name.as_str())
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relation.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.relation.is_empty()
    }
}

impl fmt::Debug for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorations")
            .field("rows", &self.row_names().collect::<Vec<_>>())
            .field("relation", &self.relation_names().collect::<Vec<_>>())
            .finish()
    }
}

///
/// AssemblyExtension
///
/// Hook run after filtering and before ordering and pagination. Facet and
/// custom ordering features plug in here.
///

pub trait AssemblyExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Parameter keys this extension reads; they are bound like any other.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn apply(&self, relation: Relation, params: &BoundParams) -> Result<Relation, ValidationError>;
}
