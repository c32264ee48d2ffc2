//! Module: definition
//! Responsibility: immutable, validated query definitions.
//! Does not own: per-invocation binding, assembly, or execution.
//! Boundary: every authoring bug surfaces from `QueryDefinitionBuilder::build`.

mod decoration;
mod spec;

#[cfg(test)]
mod tests;

use crate::{
    db::{
        aggregate::{self, AggregatePlan},
        params::{BoundParams, ParameterSet},
        predicate::{ColumnRef, Predicate, Scope},
        relation::{OrderDirection, OrderKey, OrderTerm, Relation, Source},
    },
    error::DefinitionError,
    model::{AssociationPath, FieldKind, ResolvedPath, Schema},
    value::{Record, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

// re-exports
pub use decoration::{AssemblyExtension, Decorations, RelationDecorationFn, RowDecorationFn};
pub use spec::{
    AggregateFunction, AggregateSpec, ApplyFn, CteBuilderFn, CteSpec, FilterSpec, Fallback,
    OnEmpty, OrderParamSpec, PaginationSpec, ParamHandler, ParamSpec, ScopeFn, ScopeTransform,
    TextQuerySpec,
};

///
/// QueryDefinition
///
/// Everything one query type may do, declared once and shared across
/// invocations. Immutable after `build`; safe to share behind an `Arc`.
///

pub struct QueryDefinition {
    schema: Arc<Schema>,
    entity: String,
    primary_key: String,
    default_scope: ScopeTransform,
    preloads: Vec<ResolvedPath>,
    aggregates: Vec<AggregateSpec>,
    aggregate_plans: Vec<AggregatePlan>,
    ctes: Vec<CteSpec>,
    params: Vec<ParamSpec>,
    filters: Vec<FilterSpec>,
    text_query: Option<TextQuerySpec>,
    selection: Vec<String>,
    order_param: Option<OrderParamSpec>,
    sortable: BTreeMap<String, OrderKey>,
    default_order: Vec<OrderTerm>,
    pagination: Option<PaginationSpec>,
    extensions: Vec<Arc<dyn AssemblyExtension>>,
    extension_keys: Vec<String>,
    decorations: Arc<Decorations>,
}

impl QueryDefinition {
    #[must_use]
    pub fn builder(schema: Arc<Schema>, entity: impl Into<String>) -> QueryDefinitionBuilder {
        QueryDefinitionBuilder::new(schema, entity.into())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Every row of the base entity; the usual base relation.
    #[must_use]
    pub fn base_relation(&self) -> Relation {
        Relation::table(&self.entity)
    }

    #[must_use]
    pub const fn default_scope(&self) -> &ScopeTransform {
        &self.default_scope
    }

    #[must_use]
    pub fn preloads(&self) -> &[ResolvedPath] {
        &self.preloads
    }

    #[must_use]
    pub fn aggregates(&self) -> &[AggregateSpec] {
        &self.aggregates
    }

    #[must_use]
    pub fn aggregate_plans(&self) -> &[AggregatePlan] {
        &self.aggregate_plans
    }

    #[must_use]
    pub fn ctes(&self) -> &[CteSpec] {
        &self.ctes
    }

    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    #[must_use]
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    #[must_use]
    pub const fn text_query(&self) -> Option<&TextQuerySpec> {
        self.text_query.as_ref()
    }

    #[must_use]
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    #[must_use]
    pub const fn order_param(&self) -> Option<&OrderParamSpec> {
        self.order_param.as_ref()
    }

    /// Sort key for an order parameter name.
    #[must_use]
    pub fn sort_key(&self, name: &str) -> Option<&OrderKey> {
        self.sortable.get(name)
    }

    #[must_use]
    pub fn default_order(&self) -> &[OrderTerm] {
        &self.default_order
    }

    #[must_use]
    pub const fn pagination(&self) -> Option<&PaginationSpec> {
        self.pagination.as_ref()
    }

    #[must_use]
    pub fn extensions(&self) -> &[Arc<dyn AssemblyExtension>] {
        &self.extensions
    }

    #[must_use]
    pub const fn decorations(&self) -> &Arc<Decorations> {
        &self.decorations
    }

    /// Every parameter key this definition reads, with its default.
    #[must_use]
    pub fn declared_keys(&self) -> Vec<(&str, Option<&Value>)> {
        let mut keys: Vec<(&str, Option<&Value>)> = self
            .params
            .iter()
            .map(|p| (p.key.as_str(), p.default.as_ref()))
            .collect();

        keys.extend(self.filters.iter().map(|f| (f.key.as_str(), None)));
        if let Some(text) = &self.text_query {
            keys.push((text.key.as_str(), None));
        }
        if let Some(order) = &self.order_param {
            keys.push((order.key.as_str(), None));
        }
        if let Some(page) = &self.pagination {
            keys.push((page.page_key.as_str(), None));
            keys.push((page.per_page_key.as_str(), None));
        }
        keys.extend(self.extension_keys.iter().map(|k| (k.as_str(), None)));

        keys
    }
}

impl fmt::Debug for QueryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDefinition")
            .field("entity", &self.entity)
            .field("default_scope", &self.default_scope)
            .field("aggregates", &self.aggregates)
            .field("ctes", &self.ctes)
            .field("params", &self.params)
            .field("filters", &self.filters)
            .field("text_query", &self.text_query)
            .field("selection", &self.selection)
            .field("order_param", &self.order_param)
            .field("pagination", &self.pagination)
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("decorations", &self.decorations)
            .finish_non_exhaustive()
    }
}

///
/// QueryDefinitionBuilder
///
/// Collects declarations; `build` validates all of them against the schema
/// before a definition can exist.
///

pub struct QueryDefinitionBuilder {
    schema: Arc<Schema>,
    entity: String,
    default_scope: ScopeTransform,
    preloads: Vec<AssociationPath>,
    aggregates: Vec<AggregateSpec>,
    ctes: Vec<CteSpec>,
    params: Vec<ParamSpec>,
    filters: Vec<FilterSpec>,
    text_query: Option<TextQuerySpec>,
    selection: Vec<String>,
    order_param: Option<OrderParamSpec>,
    default_order: Vec<String>,
    pagination: Option<PaginationSpec>,
    extensions: Vec<Arc<dyn AssemblyExtension>>,
    decorations: Decorations,
}

impl QueryDefinitionBuilder {
    fn new(schema: Arc<Schema>, entity: String) -> Self {
        Self {
            schema,
            entity,
            default_scope: ScopeTransform::Identity,
            preloads: Vec::new(),
            aggregates: Vec::new(),
            ctes: Vec::new(),
            params: Vec::new(),
            filters: Vec::new(),
            text_query: None,
            selection: Vec::new(),
            order_param: None,
            default_order: Vec::new(),
            pagination: None,
            extensions: Vec::new(),
            decorations: Decorations::default(),
        }
    }

    /// Transform applied to every base relation before anything else.
    #[must_use]
    pub fn default_scope(mut self, transform: impl Into<ScopeTransform>) -> Self {
        self.default_scope = transform.into();
        self
    }

    /// Fetch `path` in batches after execution instead of joining it.
    #[must_use]
    pub fn preload(mut self, path: &str) -> Self {
        self.preloads.push(AssociationPath::parse(path));
        self
    }

    #[must_use]
    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    /// Named sub-relation built per invocation from the bound parameters.
    #[must_use]
    pub fn cte(
        mut self,
        name: impl Into<String>,
        builder: impl Fn(&BoundParams) -> Relation + Send + Sync + 'static,
    ) -> Self {
        self.ctes.push(CteSpec {
            name: name.into(),
            builder: Arc::new(builder),
        });
        self
    }

    #[must_use]
    pub fn param(self, key: impl Into<String>, handler: ParamHandler) -> Self {
        self.param_spec(ParamSpec {
            key: key.into(),
            default: None,
            handler,
        })
    }

    #[must_use]
    pub fn param_with_default(
        self,
        key: impl Into<String>,
        default: impl Into<Value>,
        handler: ParamHandler,
    ) -> Self {
        self.param_spec(ParamSpec {
            key: key.into(),
            default: Some(default.into()),
            handler,
        })
    }

    #[must_use]
    pub fn param_spec(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Equality filter bound to `key`; `target` is `path.to.field`.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, target: &str) -> Self {
        self.filters.push(FilterSpec::new(key, target));
        self
    }

    #[must_use]
    pub fn text_query(mut self, spec: TextQuerySpec) -> Self {
        self.text_query = Some(spec);
        self
    }

    /// Restrict projected base fields. The primary key is always selected.
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn order_param(mut self, spec: OrderParamSpec) -> Self {
        self.order_param = Some(spec);
        self
    }

    /// Order used when no order parameter is bound (`"name"` or `"-name"`).
    #[must_use]
    pub fn default_order(mut self, term: impl Into<String>) -> Self {
        self.default_order.push(term.into());
        self
    }

    #[must_use]
    pub fn paginate(mut self, spec: PaginationSpec) -> Self {
        self.pagination = Some(spec);
        self
    }

    #[must_use]
    pub fn extension(mut self, extension: impl AssemblyExtension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    #[must_use]
    pub fn decorate_rows(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.decorations.add_row(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn decorate_relation(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[Record]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.decorations.add_relation(name.into(), Arc::new(f));
        self
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn build(mut self) -> Result<QueryDefinition, DefinitionError> {
        let schema = &self.schema;
        let base = schema.entity(&self.entity)?;
        let primary_key = base.primary_key.clone();

        let extension_keys: Vec<String> = self.extensions.iter().flat_map(|e| e.keys()).collect();
        self.check_keys(&extension_keys)?;
        self.check_decorations()?;

        for filter in &mut self.filters {
            filter.kind = Some(schema.field_kind(&self.entity, &filter.path, &filter.field)?);
        }
        if let Some(text) = &self.text_query {
            for (path, fields) in &text.fields {
                for field in fields {
                    let kind = schema.field_kind(&self.entity, path, field)?;
                    if kind != FieldKind::Text {
                        let target = schema.resolve(&self.entity, path)?.target;
                        return Err(DefinitionError::NotTextField {
                            entity: target,
                            field: field.clone(),
                            kind,
                        });
                    }
                }
            }
        }

        let aggregate_plans = aggregate::plan(schema, &self.entity, &self.aggregates)?;
        let visible = self.check_ctes(&aggregate_plans)?;

        if let Some(predicate) = self.default_scope.predicate() {
            self.check_predicate(predicate, &visible)?;
        }
        for param in &self.params {
            for (_, transform) in param.handler.arms() {
                if let Some(predicate) = transform.predicate() {
                    self.check_predicate(predicate, &visible)?;
                }
            }
        }

        for field in &self.selection {
            let is_alias = self.aggregates.iter().any(|a| &a.alias == field);
            if !is_alias && !base.has_field(field) {
                return Err(DefinitionError::unknown_field(&self.entity, field));
            }
        }

        let preloads = self
            .preloads
            .iter()
            .map(|path| {
                if path.is_root() {
                    return Err(DefinitionError::UnknownAssociation {
                        entity: self.entity.clone(),
                        association: String::new(),
                    });
                }
                schema.resolve(&self.entity, path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sortable = self.sortable()?;
        let default_order = self
            .default_order
            .iter()
            .map(|term| {
                let (name, direction) = parse_order_term(term);
                self.sort_key_for(name)
                    .map(|key| OrderTerm { key, direction })
                    .ok_or_else(|| DefinitionError::unknown_field(&self.entity, name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryDefinition {
            entity: self.entity,
            primary_key,
            default_scope: self.default_scope,
            preloads,
            aggregates: self.aggregates,
            aggregate_plans,
            ctes: self.ctes,
            params: self.params,
            filters: self.filters,
            text_query: self.text_query,
            selection: self.selection,
            order_param: self.order_param,
            sortable,
            default_order,
            pagination: self.pagination,
            extensions: self.extensions,
            extension_keys,
            decorations: Arc::new(self.decorations),
            schema: self.schema,
        })
    }

    // Parameter keys share one namespace across every declaration kind.
    fn check_keys(&self, extension_keys: &[String]) -> Result<(), DefinitionError> {
        let mut keys: Vec<&str> = Vec::new();
        keys.extend(self.params.iter().map(|p| p.key.as_str()));
        keys.extend(self.filters.iter().map(|f| f.key.as_str()));
        keys.extend(self.text_query.iter().map(|t| t.key.as_str()));
        keys.extend(self.order_param.iter().map(|o| o.key.as_str()));
        if let Some(page) = &self.pagination {
            keys.push(&page.page_key);
            keys.push(&page.per_page_key);
        }
        keys.extend(extension_keys.iter().map(String::as_str));

        let mut seen = BTreeSet::new();
        for key in keys {
            if !seen.insert(key) {
                return Err(DefinitionError::duplicate("parameter key", key));
            }
        }

        Ok(())
    }

    fn check_decorations(&self) -> Result<(), DefinitionError> {
        let mut rows = BTreeSet::new();
        for name in self.decorations.row_names() {
            if !rows.insert(name) {
                return Err(DefinitionError::duplicate("row decoration", name));
            }
        }
        let mut relation = BTreeSet::new();
        for name in self.decorations.relation_names() {
            if !relation.insert(name) {
                return Err(DefinitionError::duplicate("relation decoration", name));
            }
        }

        Ok(())
    }

    // CTE names are unique, distinct from aggregate sub-relations, and each
    // body may only read tables and earlier CTEs. Bodies are built once
    // with default-bound parameters. Returns every visible relation name.
    fn check_ctes(&self, plans: &[AggregatePlan]) -> Result<BTreeSet<String>, DefinitionError> {
        let mut visible = BTreeSet::new();
        let defaults = BoundParams::bind(
            self.params
                .iter()
                .map(|p| (p.key.as_str(), p.default.as_ref())),
            &ParameterSet::new(),
        );

        for cte in &self.ctes {
            let relation = cte.build(&defaults);
            check_sources(&self.schema, &relation)?;
            if let Some(name) = relation
                .free_relation_refs()
                .into_iter()
                .find(|name| !visible.contains(name))
            {
                return Err(DefinitionError::UnknownRelation { name });
            }
            if !visible.insert(cte.name.clone()) {
                return Err(DefinitionError::duplicate("relation", &cte.name));
            }
        }

        for plan in plans {
            if !visible.insert(plan.subrelation.name.clone()) {
                return Err(DefinitionError::duplicate("relation", &plan.subrelation.name));
            }
        }

        Ok(visible)
    }

    // Static predicates must name resolvable paths, fields and relations.
    fn check_predicate(
        &self,
        predicate: &Predicate,
        visible: &BTreeSet<String>,
    ) -> Result<(), DefinitionError> {
        for column in predicate.columns() {
            match &column.scope {
                Scope::Base => {
                    self.schema.resolve_field(
                        &self.entity,
                        &AssociationPath::root(),
                        &column.field,
                    )?;
                }
                Scope::Path(path) => {
                    self.schema
                        .resolve_field(&self.entity, path, &column.field)?;
                }
                Scope::Named(name) => {
                    if !visible.contains(name) {
                        return Err(DefinitionError::UnknownRelation { name: name.clone() });
                    }
                }
            }
        }
        if let Some(name) = predicate
            .relation_refs()
            .into_iter()
            .find(|name| !visible.contains(name))
        {
            return Err(DefinitionError::UnknownRelation { name });
        }

        Ok(())
    }

    fn sortable(&self) -> Result<BTreeMap<String, OrderKey>, DefinitionError> {
        let mut out = BTreeMap::new();
        if let Some(order) = &self.order_param {
            for name in &order.sortable {
                let key = self
                    .sort_key_for(name)
                    .ok_or_else(|| DefinitionError::unknown_field(&self.entity, name))?;
                out.insert(name.clone(), key);
            }
        }

        Ok(out)
    }

    // Base fields sort by column, aggregate aliases by output value.
    fn sort_key_for(&self, name: &str) -> Option<OrderKey> {
        if self.aggregates.iter().any(|a| a.alias == name) {
            return Some(OrderKey::Output(name.to_string()));
        }
        let base = self.schema.entity(&self.entity).ok()?;

        base.has_field(name)
            .then(|| OrderKey::Column(ColumnRef::base(name)))
    }
}

/// Split `"-name"` into `("name", Desc)` and `"name"` into `("name", Asc)`.
#[must_use]
pub fn parse_order_term(term: &str) -> (&str, OrderDirection) {
    let term = term.trim();
    match term.strip_prefix('-') {
        Some(name) => (name.trim(), OrderDirection::Desc),
        None => (term.strip_prefix('+').unwrap_or(term).trim(), OrderDirection::Asc),
    }
}

// Every table a relation reads, at any depth, must exist.
fn check_sources(schema: &Schema, relation: &Relation) -> Result<(), DefinitionError> {
    let sources = std::iter::once(relation.source()).chain(relation.joins().iter().map(|j| &j.source));
    for source in sources {
        if let Source::Table(table) = source
            && !schema.contains(table)
        {
            return Err(DefinitionError::unknown_entity(table));
        }
    }
    for cte in relation.ctes() {
        check_sources(schema, &cte.relation)?;
    }

    Ok(())
}
