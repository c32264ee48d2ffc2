//! Module: aggregate
//! Responsibility: plan filter-independent per-row aggregates.
//! Does not own: parameter handling or the main relation's predicate.
//! Boundary: the assembler attaches plans; stores evaluate the windows.
//!
//! Each association path becomes one named sub-relation over the path's
//! rows, computing `function(field) OVER (PARTITION BY owner_key)` and kept
//! DISTINCT so there is one row per owner. The main relation left-joins it
//! by key. Because the sub-relation reads the association's table on its
//! own, predicates on the main relation can never narrow what it sums.


use crate::{
    AGGREGATE_RELATION_PREFIX, OWNER_KEY_COLUMN,
    db::{
        definition::{AggregateSpec, OnEmpty},
        predicate::{ColumnRef, Scope},
        relation::{AggregateFunction, Join, JoinKind, Projection, Relation, Source},
    },
    error::DefinitionError,
    model::{AssociationPath, Schema},
};
use std::collections::BTreeSet;

///
/// NamedSubrelation
///
/// Registered sub-relation plus the columns it is joined on.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NamedSubrelation {
    pub name: String,
    pub relation: Relation,
    /// Column of the sub-relation holding the owner's key.
    pub owner_key: String,
    /// Base column the owner key matches.
    pub base_column: String,
}

///
/// AggregateColumn
///
/// One aggregate served by a sub-relation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateColumn {
    pub alias: String,
    pub function: AggregateFunction,
    pub field: String,
    pub on_empty: OnEmpty,
}

///
/// AggregatePlan
///
/// Every aggregate over one association path, sharing one sub-relation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregatePlan {
    pub path: AssociationPath,
    pub subrelation: NamedSubrelation,
    pub columns: Vec<AggregateColumn>,
}

impl AggregatePlan {
    /// Register the sub-relation and left-join it onto `relation` by key.
    #[must_use]
    pub fn attach(&self, relation: Relation) -> Relation {
        let sub = &self.subrelation;

        relation
            .with_cte(sub.name.clone(), sub.relation.clone())
            .join(Join {
                kind: JoinKind::Left,
                source: Source::Named(sub.name.clone()),
                scope: Scope::Named(sub.name.clone()),
                left: ColumnRef::base(&sub.base_column),
                right: ColumnRef::named(&sub.name, &sub.owner_key),
            })
    }

    /// Main-relation projections exposing each aggregate under its alias.
    #[must_use]
    pub fn projections(&self) -> Vec<Projection> {
        self.columns
            .iter()
            .map(|col| {
                let column = ColumnRef::named(&self.subrelation.name, &col.alias);
                let identity = match col.on_empty {
                    OnEmpty::Identity => col.function.identity(),
                    OnEmpty::Null => None,
                };

                match identity {
                    Some(fallback) => Projection::Coalesce {
                        column,
                        fallback,
                        alias: col.alias.clone(),
                    },
                    None => Projection::Column {
                        column,
                        alias: col.alias.clone(),
                    },
                }
            })
            .collect()
    }

    /// True when this plan serves `alias`.
    #[must_use]
    pub fn serves(&self, alias: &str) -> bool {
        self.columns.iter().any(|col| col.alias == alias)
    }
}

/// Plan every aggregate declared for `entity`, grouping specs that share an
/// association path into one sub-relation, in first-declared order.
pub fn plan(
    schema: &Schema,
    entity: &str,
    specs: &[AggregateSpec],
) -> Result<Vec<AggregatePlan>, DefinitionError> {
    let base = schema.entity(entity)?;

    let mut aliases = BTreeSet::new();
    for spec in specs {
        if spec.association.is_root() {
            return Err(DefinitionError::EmptyAggregatePath {
                alias: spec.alias.clone(),
            });
        }
        if spec.alias == OWNER_KEY_COLUMN
            || base.has_field(&spec.alias)
            || !aliases.insert(spec.alias.as_str())
        {
            return Err(DefinitionError::duplicate("column", &spec.alias));
        }
    }

    let mut groups: Vec<(AssociationPath, Vec<AggregateColumn>)> = Vec::new();
    for spec in specs {
        let column = plan_column(schema, entity, spec)?;
        match groups.iter_mut().find(|(path, _)| path == &spec.association) {
            Some((_, columns)) => columns.push(column),
            None => groups.push((spec.association.clone(), vec![column])),
        }
    }

    let mut names = BTreeSet::new();
    let mut plans = Vec::with_capacity(groups.len());
    for (path, columns) in groups {
        let name = subrelation_name(&path);
        if !names.insert(name.clone()) {
            return Err(DefinitionError::duplicate("relation", name));
        }
        let (relation, base_column) = build_subrelation(schema, entity, &path, &columns)?;

        plans.push(AggregatePlan {
            path,
            subrelation: NamedSubrelation {
                name,
                relation,
                owner_key: OWNER_KEY_COLUMN.to_string(),
                base_column,
            },
            columns,
        });
    }

    Ok(plans)
}

/// Name of the sub-relation serving aggregates over `path`.
#[must_use]
pub fn subrelation_name(path: &AssociationPath) -> String {
    format!("{AGGREGATE_RELATION_PREFIX}{}", path.to_ident())
}

// Validate one spec against the entity its path reaches.
fn plan_column(
    schema: &Schema,
    entity: &str,
    spec: &AggregateSpec,
) -> Result<AggregateColumn, DefinitionError> {
    let resolved = schema.resolve(entity, &spec.association)?;
    let target = schema.entity(&resolved.target)?;

    let field = spec
        .field
        .clone()
        .unwrap_or_else(|| target.primary_key.clone());
    let model = target
        .find_field(&field)
        .ok_or_else(|| DefinitionError::unknown_field(&target.name, &field))?;

    if spec.function == AggregateFunction::Sum && !model.kind.is_numeric() {
        return Err(DefinitionError::InvalidAggregate {
            alias: spec.alias.clone(),
            message: format!("cannot sum non-numeric field '{}.{field}'", target.name),
        });
    }

    Ok(AggregateColumn {
        alias: spec.alias.clone(),
        function: spec.function,
        field,
        on_empty: spec.on_empty,
    })
}

// Build the partitioned sub-relation for one path, returning it with the
// base column its owner key matches.
//
// The first hop's table is the sub-relation's source; later hops are inner
// joined beneath it under paths relative to that first hop. Rows that
// reach no leaf drop out, so such owners fall back to the identity.
fn build_subrelation(
    schema: &Schema,
    entity: &str,
    path: &AssociationPath,
    columns: &[AggregateColumn],
) -> Result<(Relation, String), DefinitionError> {
    let resolved = schema.resolve(entity, path)?;
    let Some(first) = resolved.steps.first() else {
        return Err(DefinitionError::EmptyAggregatePath {
            alias: columns.first().map(|col| col.alias.clone()).unwrap_or_default(),
        });
    };

    let owner = ColumnRef::base(&first.target_column);
    let mut relation = Relation::table(&first.target_entity);
    let mut from = Scope::Base;
    for step in &resolved.steps[1..] {
        let scope = Scope::path(step.path.suffix(1));
        relation = relation.join(Join {
            kind: JoinKind::Inner,
            source: Source::Table(step.target_entity.clone()),
            scope: scope.clone(),
            left: ColumnRef::new(from, &step.source_column),
            right: ColumnRef::new(scope.clone(), &step.target_column),
        });
        from = scope;
    }

    let mut projection = vec![Projection::Column {
        column: owner.clone(),
        alias: OWNER_KEY_COLUMN.to_string(),
    }];
    projection.extend(columns.iter().map(|col| Projection::Window {
        function: col.function,
        column: ColumnRef::new(from.clone(), &col.field),
        partition_by: vec![owner.clone()],
        alias: col.alias.clone(),
    }));

    Ok((
        relation.select(projection).distinct(),
        first.source_column.clone(),
    ))
}
