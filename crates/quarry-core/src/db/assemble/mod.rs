//! Module: assemble
//! Responsibility: compose a definition, parameters and a base relation into
//! one executable relation.
//! Does not own: execution, preload fetching, or decoration evaluation.
//! Boundary: pure; performs no I/O and keeps no state between calls.
//!
//! Step order is fixed:
//! 1. default scope
//! 2. declared CTEs
//! 3. aggregate sub-relations
//! 4. params, filters, text query
//! 5. preloads (recorded only)
//! 6. extensions
//! 7. selection, order, page
//! 8. decorations and fingerprint


use crate::{
    db::{
        definition::{Decorations, QueryDefinition, parse_order_term},
        filter,
        fingerprint::QueryFingerprint,
        params::{self, BoundParams, ParameterSet},
        predicate::{ColumnRef, Scope},
        relation::{OrderKey, OrderTerm, Projection, Relation, Source},
        sql::{self, SqlDialect, SqlStatement},
    },
    error::{DefinitionError, Error, ValidationError, ValidationReason},
    model::ResolvedPath,
    value::Value,
};
use std::{collections::BTreeSet, sync::Arc};

///
/// CompiledQuery
///
/// Assembled relation plus what execution needs afterwards. Owned by one
/// invocation; never cached.
///

#[derive(Clone, Debug)]
pub struct CompiledQuery {
    entity: String,
    relation: Relation,
    preloads: Vec<ResolvedPath>,
    decorations: Arc<Decorations>,
    fingerprint: QueryFingerprint,
    params: BoundParams,
}

impl CompiledQuery {
    /// Entity the base relation reads.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub const fn relation(&self) -> &Relation {
        &self.relation
    }

    #[must_use]
    pub fn preloads(&self) -> &[ResolvedPath] {
        &self.preloads
    }

    #[must_use]
    pub const fn decorations(&self) -> &Arc<Decorations> {
        &self.decorations
    }

    #[must_use]
    pub const fn fingerprint(&self) -> QueryFingerprint {
        self.fingerprint
    }

    #[must_use]
    pub const fn params(&self) -> &BoundParams {
        &self.params
    }

    /// Count of matching rows, ignoring order and pagination.
    #[must_use]
    pub fn count_relation(&self) -> Relation {
        self.relation.clone().into_count()
    }

    /// Render as one parameterised statement.
    #[must_use]
    pub fn to_sql(&self, dialect: SqlDialect) -> SqlStatement {
        sql::render(&self.relation, dialect)
    }

    #[must_use]
    pub fn into_relation(self) -> Relation {
        self.relation
    }
}

/// Assemble `definition` over `base` with `params`. Any failure aborts the
/// whole assembly; no partial relation is returned.
pub fn assemble(
    definition: &QueryDefinition,
    base: Relation,
    params: &ParameterSet,
) -> Result<CompiledQuery, Error> {
    let schema = definition.schema();
    let entity = definition.entity();

    if base.source() != &Source::Table(entity.to_string()) {
        return Err(DefinitionError::BaseEntityMismatch {
            expected: entity.to_string(),
            found: base.source().name().to_string(),
        }
        .into());
    }

    let bound = params::bind(definition, params);

    // 1. default scope
    let mut relation = filter::apply_transform(base, definition.default_scope(), schema, entity)?;

    // 2. declared CTEs
    for cte in definition.ctes() {
        relation = relation.with_cte(cte.name.clone(), cte.build(&bound));
    }

    // 3. aggregates
    for plan in definition.aggregate_plans() {
        relation = plan.attach(relation);
    }

    // 4. params, filters, text query
    let compiled = filter::compile(definition, &bound)?;
    relation = compiled.apply(relation, schema, entity)?;

    // 5. preloads
    let preloads = definition.preloads().to_vec();

    // 6. extensions
    for extension in definition.extensions() {
        relation = extension.apply(relation, &bound)?;
    }

    // 7. selection, order, page
    relation = relation.select(projection(definition));
    relation = apply_order(relation, definition, &bound)?;
    relation = project_order_columns(relation);
    relation = apply_page(relation, definition, &bound)?;

    // 8. decorations and fingerprint
    let fingerprint = QueryFingerprint::of(&relation);

    Ok(CompiledQuery {
        entity: entity.to_string(),
        relation,
        preloads,
        decorations: Arc::clone(definition.decorations()),
        fingerprint,
        params: bound,
    })
}

// Selected base fields (always with the primary key and preload link
// columns), then every aggregate alias.
fn projection(definition: &QueryDefinition) -> Vec<Projection> {
    let mut out = Vec::new();

    if definition.selection().is_empty() {
        if !definition.aggregate_plans().is_empty() {
            out.push(Projection::All { scope: Scope::Base });
        }
    } else {
        let base = definition.schema().entity(definition.entity()).ok();
        let mut fields: Vec<&str> = vec![definition.primary_key()];
        fields.extend(
            definition
                .preloads()
                .iter()
                .filter_map(|path| path.steps.first())
                .map(|step| step.source_column.as_str()),
        );
        fields.extend(
            definition
                .selection()
                .iter()
                .map(String::as_str)
                .filter(|field| base.is_some_and(|entity| entity.has_field(field))),
        );

        let mut seen = BTreeSet::new();
        for field in fields {
            if seen.insert(field) {
                out.push(Projection::Column {
                    column: ColumnRef::base(field),
                    alias: field.to_string(),
                });
            }
        }
    }

    for plan in definition.aggregate_plans() {
        out.extend(plan.projections());
    }

    out
}

// Order parameter, else the default order; a primary-key tie-break keeps
// pages stable whenever rows are ordered or paged.
fn apply_order(
    relation: Relation,
    definition: &QueryDefinition,
    bound: &BoundParams,
) -> Result<Relation, ValidationError> {
    let mut terms = Vec::new();

    let requested = definition
        .order_param()
        .and_then(|spec| bound.value(&spec.key).map(|value| (spec, value)));
    if let Some((spec, value)) = requested {
        let items = match value {
            Value::List(items) => items.clone(),
            Value::Text(text) => text
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| Value::Text(part.to_string()))
                .collect(),
            other => vec![other.clone()],
        };
        for item in items {
            let Some(text) = item.as_text() else {
                return Err(ValidationError::new(
                    &spec.key,
                    value.clone(),
                    ValidationReason::UnknownSortField,
                ));
            };
            let (name, direction) = parse_order_term(text);
            let key = definition.sort_key(name).ok_or_else(|| {
                ValidationError::new(&spec.key, value.clone(), ValidationReason::UnknownSortField)
            })?;
            terms.push(OrderTerm {
                key: key.clone(),
                direction,
            });
        }
    } else {
        terms.extend(definition.default_order().iter().cloned());
    }

    let paged = definition.pagination().is_some_and(|spec| {
        bound.value(&spec.page_key).is_some()
            || bound.value(&spec.per_page_key).is_some()
            || spec.default_per_page.is_some()
    });
    let pk = OrderKey::Column(ColumnRef::base(definition.primary_key()));
    if (!terms.is_empty() || paged) && !terms.iter().any(|term| term.key == pk) {
        terms.push(OrderTerm::asc(ColumnRef::base(definition.primary_key())));
    }

    Ok(terms.into_iter().fold(relation, Relation::order_by))
}

// Under DISTINCT every ordered column must be selected; columns the
// selection left out are appended under their own names.
fn project_order_columns(relation: Relation) -> Relation {
    if !relation.is_distinct() || relation.projection().is_empty() {
        return relation;
    }

    let missing: Vec<ColumnRef> = relation
        .order()
        .iter()
        .filter_map(|term| match &term.key {
            OrderKey::Column(column) => Some(column),
            OrderKey::Output(_) => None,
        })
        .filter(|column| {
            !relation.projection().iter().any(|item| match item {
                Projection::All { scope } => *scope == column.scope,
                Projection::Column { column: selected, .. } => selected == *column,
                _ => false,
            })
        })
        .cloned()
        .collect();

    missing.into_iter().fold(relation, |relation, column| {
        relation.project(Projection::Column {
            alias: column.field.clone(),
            column,
        })
    })
}

fn apply_page(
    relation: Relation,
    definition: &QueryDefinition,
    bound: &BoundParams,
) -> Result<Relation, ValidationError> {
    let Some(spec) = definition.pagination() else {
        return Ok(relation);
    };

    let page = positive(bound, &spec.page_key)?;
    let per_page = positive(bound, &spec.per_page_key)?;
    let per_page = match (per_page, spec.default_per_page, page) {
        (Some(n), _, _) => n,
        (None, Some(n), _) => n,
        (None, None, Some(_)) => spec.max_per_page,
        (None, None, None) => return Ok(relation),
    };
    let per_page = per_page.clamp(1, spec.max_per_page.max(1));
    let offset = page.unwrap_or(1).saturating_sub(1).saturating_mul(per_page);

    Ok(relation.page(Some(per_page), offset))
}

// Bound value for `key` as a positive integer, if bound.
fn positive(bound: &BoundParams, key: &str) -> Result<Option<u32>, ValidationError> {
    let Some(value) = bound.value(key) else {
        return Ok(None);
    };

    value
        .coerce_int()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| ValidationError::new(key, value.clone(), ValidationReason::NotPositiveInteger))
}
