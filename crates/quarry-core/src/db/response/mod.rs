//! Module: response
//! Responsibility: executed rows plus their preloads and decorations.
//! Does not own: fetching; the session fills a `DecoratedResult` once.
//! Boundary: read-only views; fetched records are never modified.


use crate::{
    db::definition::Decorations,
    model::{AssociationPath, JoinStep, ResolvedPath},
    value::{Record, Value},
};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// ResponseError
/// Errors related to interpreting an executed result.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ResponseError {
    #[error("expected exactly one row, found 0 (entity {entity})")]
    NotFound { entity: String },

    #[error("expected exactly one row, found {count} (entity {entity})")]
    NotUnique { entity: String, count: usize },
}

///
/// PreloadHop
///
/// Rows fetched for one hop of a preloaded path, matched to the previous
/// hop's rows by `step.source_column = step.target_column`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreloadHop {
    pub step: JoinStep,
    pub rows: Vec<Record>,
}

///
/// PreloadSet
///
/// Every fetched hop keyed by its path from the base entity. Hops shared by
/// several preloads are fetched and stored once.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PreloadSet {
    hops: BTreeMap<AssociationPath, PreloadHop>,
    paths: Vec<ResolvedPath>,
}

impl PreloadSet {
    #[must_use]
    pub fn new(paths: Vec<ResolvedPath>) -> Self {
        Self {
            hops: BTreeMap::new(),
            paths,
        }
    }

    pub(crate) fn insert(&mut self, step: JoinStep, rows: Vec<Record>) {
        self.hops
            .insert(step.path.clone(), PreloadHop { step, rows });
    }

    #[must_use]
    pub fn contains(&self, path: &AssociationPath) -> bool {
        self.hops.contains_key(path)
    }

    #[must_use]
    pub fn hop(&self, path: &AssociationPath) -> Option<&PreloadHop> {
        self.hops.get(path)
    }

    /// Declared preload paths, in declaration order.
    #[must_use]
    pub fn paths(&self) -> &[ResolvedPath] {
        &self.paths
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Rows reached from `record` along `path`, or `None` when the path was
    /// not preloaded.
    #[must_use]
    pub fn related<'a>(
        &'a self,
        record: &'a Record,
        path: &AssociationPath,
    ) -> Option<Vec<&'a Record>> {
        if path.is_root() {
            return None;
        }
        let resolved = self
            .paths
            .iter()
            .find(|p| p.path.len() >= path.len() && p.path.prefix(path.len()) == *path)?;

        let mut current: Vec<&'a Record> = vec![record];
        for step in resolved.steps.iter().take(path.len()) {
            let hop = self.hops.get(&step.path)?;
            current = current
                .into_iter()
                .flat_map(|owner: &'a Record| {
                    let key = owner.value(&step.source_column);
                    hop.rows.iter().filter(move |row| {
                        !key.is_null() && row.value(&step.target_column) == key
                    })
                })
                .collect();
        }

        Some(current)
    }
}

///
/// DecoratedResult
///
/// Rows of one execution, in relation order, with their preloads and the
/// definition's decorations.
///

#[derive(Clone, Debug)]
pub struct DecoratedResult {
    entity: String,
    rows: Vec<Record>,
    preloads: PreloadSet,
    decorations: Arc<Decorations>,
}

impl DecoratedResult {
    #[must_use]
    pub fn new(
        entity: impl Into<String>,
        rows: Vec<Record>,
        preloads: PreloadSet,
        decorations: Arc<Decorations>,
    ) -> Self {
        Self {
            entity: entity.into(),
            rows,
            preloads,
            decorations,
        }
    }

    //
    // Cardinality
    //

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Require exactly one row.
    pub fn one(&self) -> Result<DecoratedRow<'_>, ResponseError> {
        match self.rows.len() {
            0 => Err(ResponseError::NotFound {
                entity: self.entity.clone(),
            }),
            1 => Ok(DecoratedRow {
                record: &self.rows[0],
                result: self,
            }),
            count => Err(ResponseError::NotUnique {
                entity: self.entity.clone(),
                count,
            }),
        }
    }

    /// Require at most one row.
    pub fn one_opt(&self) -> Result<Option<DecoratedRow<'_>>, ResponseError> {
        match self.one() {
            Ok(row) => Ok(Some(row)),
            Err(ResponseError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    //
    // Rows
    //

    #[must_use]
    pub fn row(&self, index: usize) -> Option<DecoratedRow<'_>> {
        self.rows.get(index).map(|record| DecoratedRow {
            record,
            result: self,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = DecoratedRow<'_>> {
        self.rows.iter().map(|record| DecoratedRow {
            record,
            result: self,
        })
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }

    /// Values of `field` across every row, in order.
    #[must_use]
    pub fn column(&self, field: &str) -> Vec<Value> {
        self.rows.iter().map(|row| row.value(field).clone()).collect()
    }

    //
    // Decorations and preloads
    //

    /// Evaluate the relation-level decoration `name` over every row.
    #[must_use]
    pub fn extension(&self, name: &str) -> Option<Value> {
        self.decorations.relation(name).map(|f| f(&self.rows))
    }

    #[must_use]
    pub const fn preloads(&self) -> &PreloadSet {
        &self.preloads
    }

    /// Rows preloaded for `record` along `path` (dotted).
    #[must_use]
    pub fn preloaded<'a>(&'a self, record: &'a Record, path: &str) -> Option<Vec<&'a Record>> {
        self.preloads.related(record, &AssociationPath::parse(path))
    }
}

impl<'a> IntoIterator for &'a DecoratedResult {
    type Item = DecoratedRow<'a>;
    type IntoIter = Box<dyn Iterator<Item = DecoratedRow<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

///
/// DecoratedRow
///
/// Borrowed view of one row with access to its decorations and preloads.
///

#[derive(Clone, Copy, Debug)]
pub struct DecoratedRow<'a> {
    record: &'a Record,
    result: &'a DecoratedResult,
}

impl<'a> DecoratedRow<'a> {
    #[must_use]
    pub const fn record(&self) -> &'a Record {
        self.record
    }

    /// Selected field or aggregate alias; null when absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &'a Value {
        self.record.value(field)
    }

    /// Evaluate the row-level decoration `name`.
    #[must_use]
    pub fn derived(&self, name: &str) -> Option<Value> {
        self.result.decorations.row(name).map(|f| f(self.record))
    }

    /// Rows preloaded for this row along `path` (dotted).
    #[must_use]
    pub fn preloaded(&self, path: &str) -> Option<Vec<&'a Record>> {
        self.result.preloaded(self.record, path)
    }
}
