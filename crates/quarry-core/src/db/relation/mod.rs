//! Module: relation
//! Responsibility: the logical relation every query is composed into.
//! Does not own: schema resolution, parameter handling, or execution.
//! Boundary: stores execute `Relation`s; the sql module renders them.

#[cfg(test)]
mod tests;

use crate::{
    db::predicate::{ColumnRef, Predicate, Scope},
    model::ResolvedPath,
    value::Value,
};
use std::collections::BTreeSet;

///
/// Source
///
/// Where a relation (or join) reads rows from.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    Table(String),
    Named(String),
}

impl Source {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Table(name) | Self::Named(name) => name,
        }
    }
}

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
}

///
/// Join
///
/// Equi-join of `source` (bound under `scope`) on `left = right`, where
/// `right` is a column of the joined scope.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub source: Source,
    pub scope: Scope,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

///
/// AggregateFunction
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum AggregateFunction {
    #[default]
    Sum,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// Neutral result over an empty set, where one exists.
    #[must_use]
    pub const fn identity(self) -> Option<Value> {
        match self {
            Self::Sum | Self::Count => Some(Value::Int(0)),
            Self::Min | Self::Max => None,
        }
    }
}

///
/// Projection
///
/// One output item of a relation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Projection {
    /// Every field of a scope, under its own name.
    All { scope: Scope },
    Column {
        column: ColumnRef,
        alias: String,
    },
    /// `COALESCE(column, fallback)`.
    Coalesce {
        column: ColumnRef,
        fallback: Value,
        alias: String,
    },
    /// `function(column) OVER (PARTITION BY partition_by)`, evaluated over the
    /// relation's rows after its own joins and predicate.
    Window {
        function: AggregateFunction,
        column: ColumnRef,
        partition_by: Vec<ColumnRef>,
        alias: String,
    },
    /// Number of (distinct) rows; must be the only projection.
    CountAll { alias: String },
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

///
/// OrderKey
///
/// Sort target: an input column or an output alias (e.g. an aggregate).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OrderKey {
    Column(ColumnRef),
    Output(String),
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: OrderDirection,
}

impl OrderTerm {
    #[must_use]
    pub const fn asc(column: ColumnRef) -> Self {
        Self {
            key: OrderKey::Column(column),
            direction: OrderDirection::Asc,
        }
    }

    #[must_use]
    pub const fn desc(column: ColumnRef) -> Self {
        Self {
            key: OrderKey::Column(column),
            direction: OrderDirection::Desc,
        }
    }

    #[must_use]
    pub fn output(alias: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            key: OrderKey::Output(alias.into()),
            direction,
        }
    }
}

///
/// Page
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

///
/// NamedRelation
///
/// A relation registered under a name (CTE), visible to later CTEs and to
/// the enclosing relation's clauses.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NamedRelation {
    pub name: String,
    pub relation: Relation,
}

///
/// Relation
///
/// Logical, not-yet-executed query over one source. Every operation is a
/// pure transform returning the next relation; nothing is executed until a
/// store receives the final value.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Relation {
    source: Source,
    ctes: Vec<NamedRelation>,
    joins: Vec<Join>,
    predicate: Option<Predicate>,
    projection: Vec<Projection>,
    distinct: bool,
    order: Vec<OrderTerm>,
    page: Option<Page>,
}

impl Relation {
    #[must_use]
    pub const fn new(source: Source) -> Self {
        Self {
            source,
            ctes: Vec::new(),
            joins: Vec::new(),
            predicate: None,
            projection: Vec::new(),
            distinct: false,
            order: Vec::new(),
            page: None,
        }
    }

    /// Relation over every row of a table.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(Source::Table(name.into()))
    }

    /// Relation over a named sub-relation declared by an enclosing scope.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Source::Named(name.into()))
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// AND a predicate onto the relation.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(Predicate::And(mut children)) => {
                children.push(predicate);
                Predicate::And(children)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
        });
        self
    }

    /// OR a predicate onto the relation (union of predicates).
    #[must_use]
    pub fn or_filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(existing) => Predicate::Or(vec![existing, predicate]),
        });
        self
    }

    /// Add a join unless one is already bound under the same scope.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        if !self.has_join(&join.scope) {
            self.joins.push(join);
        }
        self
    }

    /// Join every hop of a resolved association path, one join per prefix.
    /// Hops already joined are reused; a to-many hop makes the relation
    /// distinct so base rows are not multiplied.
    #[must_use]
    pub fn join_path(mut self, resolved: &ResolvedPath, kind: JoinKind) -> Self {
        let mut from = Scope::Base;
        for step in &resolved.steps {
            let scope = Scope::path(step.path.clone());
            if step.kind.is_to_many() {
                self.distinct = true;
            }
            self = self.join(Join {
                kind,
                source: Source::Table(step.target_entity.clone()),
                scope: scope.clone(),
                left: ColumnRef::new(from, &step.source_column),
                right: ColumnRef::new(scope.clone(), &step.target_column),
            });
            from = scope;
        }
        self
    }

    /// Register a named sub-relation. Names are unique; re-registering a
    /// name replaces nothing and is ignored.
    #[must_use]
    pub fn with_cte(mut self, name: impl Into<String>, relation: Self) -> Self {
        let name = name.into();
        if !self.has_cte(&name) {
            self.ctes.push(NamedRelation { name, relation });
        }
        self
    }

    /// Replace the projection.
    #[must_use]
    pub fn select(mut self, projection: Vec<Projection>) -> Self {
        self.projection = projection;
        self
    }

    /// Append one projection item.
    #[must_use]
    pub fn project(mut self, item: Projection) -> Self {
        self.projection.push(item);
        self
    }

    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    #[must_use]
    pub const fn page(mut self, limit: Option<u32>, offset: u32) -> Self {
        self.page = Some(Page { limit, offset });
        self
    }

    /// Count of matching rows: ordering and pagination are dropped, the
    /// projection is replaced.
    #[must_use]
    pub fn into_count(mut self) -> Self {
        if self.projection.is_empty() || !self.distinct {
            self.projection = vec![Projection::All { scope: Scope::Base }];
        }
        self.order.clear();
        self.page = None;

        Self::named(COUNTED)
            .with_cte(COUNTED, self)
            .select(vec![Projection::CountAll {
                alias: crate::COUNT_COLUMN.to_string(),
            }])
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn source(&self) -> &Source {
        &self.source
    }

    #[must_use]
    pub fn ctes(&self) -> &[NamedRelation] {
        &self.ctes
    }

    #[must_use]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    #[must_use]
    pub const fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    #[must_use]
    pub fn projection(&self) -> &[Projection] {
        &self.projection
    }

    #[must_use]
    pub const fn is_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn order(&self) -> &[OrderTerm] {
        &self.order
    }

    #[must_use]
    pub const fn page_spec(&self) -> Option<Page> {
        self.page
    }

    #[must_use]
    pub fn has_join(&self, scope: &Scope) -> bool {
        self.joins.iter().any(|join| &join.scope == scope)
    }

    #[must_use]
    pub fn has_cte(&self, name: &str) -> bool {
        self.ctes.iter().any(|cte| cte.name == name)
    }

    /// Names of every sub-relation this relation reads but does not declare
    /// itself. A relation is only executable where all of them are in scope.
    #[must_use]
    pub fn free_relation_refs(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        if let Source::Named(name) = &self.source {
            refs.insert(name.clone());
        }
        for join in &self.joins {
            if let Source::Named(name) = &join.source {
                refs.insert(name.clone());
            }
        }
        if let Some(predicate) = &self.predicate {
            refs.extend(predicate.relation_refs());
        }

        // CTE bodies may read earlier siblings only.
        let mut declared = BTreeSet::new();
        let mut unbound = BTreeSet::new();
        for cte in &self.ctes {
            for name in cte.relation.free_relation_refs() {
                if !declared.contains(&name) {
                    unbound.insert(name);
                }
            }
            declared.insert(cte.name.clone());
        }

        refs.retain(|name| !declared.contains(name));
        refs.extend(unbound);
        refs
    }
}

// Name of the wrapper sub-relation used by count relations.
const COUNTED: &str = "counted";
