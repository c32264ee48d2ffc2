//! Module: filter
//! Responsibility: turn bound parameters into predicates and scope transforms.
//! Does not own: defaults or blank handling (params), or join ordering.
//! Boundary: the assembler applies `CompiledFilters` to the relation.
//!
//! Combination rules:
//! - distinct declarations AND together
//! - members of one list-valued filter OR together
//! - text-query fields OR together
//! - every association path a predicate reads is joined exactly once


use crate::{
    db::{
        definition::{FilterSpec, ParamSpec, QueryDefinition, ScopeTransform, TextQuerySpec},
        params::BoundParams,
        predicate::{ColumnRef, Predicate, Scope},
        relation::{JoinKind, Relation},
    },
    error::{DefinitionError, ValidationError, ValidationReason},
    model::Schema,
    value::Value,
};

/// Equality predicate for one filter value; a list ORs its members.
/// Values are converted to the field's kind first, and a value that does not
/// convert rejects the parameter. Blank values produce no predicate.
pub fn compile_filter(
    spec: &FilterSpec,
    value: &Value,
) -> Result<Option<Predicate>, ValidationError> {
    if value.is_blank() {
        return Ok(None);
    }
    let value = match value {
        Value::List(items) => {
            Value::List(items.iter().filter(|item| !item.is_blank()).cloned().collect())
        }
        scalar => scalar.clone(),
    };
    let typed = match spec.kind {
        Some(kind) => kind.coerce(&value).ok_or_else(|| {
            ValidationError::new(
                &spec.key,
                value.clone(),
                ValidationReason::WrongKind { expected: kind },
            )
        })?,
        None => value,
    };
    let column = ColumnRef::new(Scope::path(spec.path.clone()), &spec.field);

    let predicate = match typed {
        Value::List(items) => {
            Predicate::any(items.into_iter().map(|item| column.eq(item)).collect())
        }
        scalar => column.eq(scalar),
    };

    Ok(Some(predicate))
}

/// OR of case-insensitive substring matches over every declared field.
/// Terms shorter than the minimum length produce no predicate.
#[must_use]
pub fn compile_text(spec: &TextQuerySpec, value: &Value) -> Option<Predicate> {
    let term = value.to_search_text()?;
    if term.is_empty() || term.chars().count() < spec.min_term_len {
        return None;
    }

    let matches: Vec<Predicate> = spec
        .fields
        .iter()
        .flat_map(|(path, fields)| {
            fields
                .iter()
                .map(|field| ColumnRef::new(Scope::path(path.clone()), field).contains_ci(&term))
        })
        .collect();

    (!matches.is_empty()).then(|| Predicate::any(matches))
}

/// Dispatch a bound parameter through its handler. Unbound parameters
/// (no value and no default) contribute nothing.
pub fn compile_param(
    spec: &ParamSpec,
    value: Option<&Value>,
) -> Result<ScopeTransform, ValidationError> {
    match value {
        Some(value) => spec.handler.dispatch(&spec.key, value),
        None => Ok(ScopeTransform::Identity),
    }
}

///
/// CompiledFilters
///
/// Every predicate (ANDed) and stored transform produced for one
/// invocation, in declaration order.
///

#[derive(Clone, Debug, Default)]
pub struct CompiledFilters {
    predicates: Vec<Predicate>,
    transforms: Vec<ScopeTransform>,
}

impl CompiledFilters {
    fn push(&mut self, transform: ScopeTransform) {
        match transform {
            ScopeTransform::Identity => {}
            ScopeTransform::Where(predicate) => self.predicates.push(predicate),
            scope @ ScopeTransform::Scope(_) => self.transforms.push(scope),
        }
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Conjunction of every predicate, if any.
    #[must_use]
    pub fn predicate(&self) -> Option<Predicate> {
        (!self.predicates.is_empty()).then(|| Predicate::all(self.predicates.clone()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.transforms.is_empty()
    }

    /// AND the predicates onto `relation`, join the paths they read, then
    /// run stored transforms in declaration order.
    pub fn apply(
        self,
        relation: Relation,
        schema: &Schema,
        entity: &str,
    ) -> Result<Relation, DefinitionError> {
        let mut relation = relation;
        if let Some(predicate) = self.predicate() {
            relation = apply_predicate(relation, predicate, schema, entity)?;
        }
        for transform in &self.transforms {
            relation = apply_transform(relation, transform, schema, entity)?;
        }

        Ok(relation)
    }
}

/// Compile params, filters and the text query of `definition`.
pub fn compile(
    definition: &QueryDefinition,
    bound: &BoundParams,
) -> Result<CompiledFilters, ValidationError> {
    let mut out = CompiledFilters::default();

    for param in definition.params() {
        out.push(compile_param(param, bound.value(&param.key))?);
    }
    for filter in definition.filters() {
        if let Some(value) = bound.value(&filter.key)
            && let Some(predicate) = compile_filter(filter, value)?
        {
            out.push(ScopeTransform::Where(predicate));
        }
    }
    if let Some(text) = definition.text_query()
        && let Some(predicate) = bound
            .value(&text.key)
            .and_then(|value| compile_text(text, value))
    {
        out.push(ScopeTransform::Where(predicate));
    }

    Ok(out)
}

/// Apply one transform. `Where` predicates get their paths joined.
pub fn apply_transform(
    relation: Relation,
    transform: &ScopeTransform,
    schema: &Schema,
    entity: &str,
) -> Result<Relation, DefinitionError> {
    match transform {
        ScopeTransform::Identity => Ok(relation),
        ScopeTransform::Where(predicate) => {
            apply_predicate(relation, predicate.clone(), schema, entity)
        }
        ScopeTransform::Scope(f) => Ok(f(relation)),
    }
}

// Left joins keep rows whose association is empty visible to OR branches
// that do not read it.
fn apply_predicate(
    relation: Relation,
    predicate: Predicate,
    schema: &Schema,
    entity: &str,
) -> Result<Relation, DefinitionError> {
    let mut relation = relation;
    for scope in predicate.scopes() {
        if let Scope::Path(path) = scope {
            let resolved = schema.resolve(entity, &path)?;
            relation = relation.join_path(&resolved, JoinKind::Left);
        }
    }

    Ok(relation.filter(predicate))
}
