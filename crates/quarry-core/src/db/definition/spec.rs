use crate::{
    config::{PaginationConfig, TextSearchConfig},
    db::{params::BoundParams, predicate::Predicate, relation::Relation},
    error::ValidationError,
    model::{AssociationPath, FieldKind},
    value::Value,
};
use std::{fmt, sync::Arc};

// re-exports
pub use crate::db::relation::AggregateFunction;

/// Stored relation transform.
pub type ScopeFn = Arc<dyn Fn(Relation) -> Relation + Send + Sync>;

/// Fallback arm computing a transform from the bound value.
pub type ApplyFn = Arc<dyn Fn(&Value) -> ScopeTransform + Send + Sync>;

/// Deferred body of a named sub-relation.
pub type CteBuilderFn = Arc<dyn Fn(&BoundParams) -> Relation + Send + Sync>;

///
/// ScopeTransform
///
/// What a default scope or a parameter arm does to the relation: nothing,
/// AND a predicate (joins inferred from its paths), or an arbitrary stored
/// transform.
///

#[derive(Clone, Default)]
pub enum ScopeTransform {
    #[default]
    Identity,
    Where(Predicate),
    Scope(ScopeFn),
}

impl ScopeTransform {
    pub fn scope(f: impl Fn(Relation) -> Relation + Send + Sync + 'static) -> Self {
        Self::Scope(Arc::new(f))
    }

    #[must_use]
    pub const fn predicate(&self) -> Option<&Predicate> {
        match self {
            Self::Where(predicate) => Some(predicate),
            _ => None,
        }
    }
}

impl From<Predicate> for ScopeTransform {
    fn from(predicate: Predicate) -> Self {
        Self::Where(predicate)
    }
}

impl fmt::Debug for ScopeTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::Where(predicate) => f.debug_tuple("Where").field(predicate).finish(),
            Self::Scope(_) => f.write_str("Scope(<fn>)"),
        }
    }
}

///
/// Fallback
///
/// Arm taken when no explicit value arm matches.
///

#[derive(Clone, Default)]
pub enum Fallback {
    /// Unmatched values contribute nothing.
    Ignore,
    /// Unmatched values abort assembly with a `ValidationError`.
    #[default]
    Reject,
    Apply(ApplyFn),
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ignore => "Ignore",
            Self::Reject => "Reject",
            Self::Apply(_) => "Apply(<fn>)",
        })
    }
}

///
/// ParamHandler
///
/// Dispatch table: recognized values map to transforms; everything else
/// goes to the fallback arm. Values match on equality of the whole bound
/// value.
///

#[derive(Clone, Debug, Default)]
pub struct ParamHandler {
    arms: Vec<(Value, ScopeTransform)>,
    fallback: Fallback,
}

impl ParamHandler {
    /// Empty table that rejects every value until arms are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler whose only arm computes a transform from the value.
    pub fn apply(f: impl Fn(&Value) -> ScopeTransform + Send + Sync + 'static) -> Self {
        Self::new().otherwise(f)
    }

    #[must_use]
    pub fn when(mut self, value: impl Into<Value>, transform: impl Into<ScopeTransform>) -> Self {
        self.arms.push((value.into(), transform.into()));
        self
    }

    #[must_use]
    pub fn otherwise_ignore(mut self) -> Self {
        self.fallback = Fallback::Ignore;
        self
    }

    #[must_use]
    pub fn otherwise_reject(mut self) -> Self {
        self.fallback = Fallback::Reject;
        self
    }

    #[must_use]
    pub fn otherwise(mut self, f: impl Fn(&Value) -> ScopeTransform + Send + Sync + 'static) -> Self {
        self.fallback = Fallback::Apply(Arc::new(f));
        self
    }

    #[must_use]
    pub fn arms(&self) -> &[(Value, ScopeTransform)] {
        &self.arms
    }

    #[must_use]
    pub const fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Resolve `value` to a transform, or reject it under `key`.
    pub fn dispatch(&self, key: &str, value: &Value) -> Result<ScopeTransform, ValidationError> {
        if let Some((_, transform)) = self.arms.iter().find(|(arm, _)| arm == value) {
            return Ok(transform.clone());
        }

        match &self.fallback {
            Fallback::Ignore => Ok(ScopeTransform::Identity),
            Fallback::Reject => Err(ValidationError::rejected(key, value.clone())),
            Fallback::Apply(f) => Ok(f(value)),
        }
    }
}

///
/// ParamSpec
///

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub key: String,
    pub default: Option<Value>,
    pub handler: ParamHandler,
}

///
/// FilterSpec
///
/// Equality filter on `path.field`; a list value ORs its members.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterSpec {
    pub key: String,
    pub path: AssociationPath,
    pub field: String,
    /// Kind of the target field, resolved when the definition is built.
    /// Bound values are converted to it before comparison.
    pub kind: Option<FieldKind>,
}

impl FilterSpec {
    /// `target` is `path.to.field`; a bare name filters a base field.
    #[must_use]
    pub fn new(key: impl Into<String>, target: &str) -> Self {
        let (path, field) = AssociationPath::split_field(target);

        Self {
            key: key.into(),
            path,
            field,
            kind: None,
        }
    }
}

///
/// TextQuerySpec
///
/// Free-text search: the term is matched case-insensitively as a substring
/// of every listed field, and any match is enough.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextQuerySpec {
    pub key: String,
    pub fields: Vec<(AssociationPath, Vec<String>)>,
    pub min_term_len: usize,
}

impl TextQuerySpec {
    pub const DEFAULT_KEY: &'static str = "query";

    #[must_use]
    pub fn new() -> Self {
        Self {
            key: Self::DEFAULT_KEY.to_string(),
            fields: Vec::new(),
            min_term_len: 1,
        }
    }

    #[must_use]
    pub fn from_config(config: &TextSearchConfig) -> Self {
        Self::new().min_term_len(config.min_term_len)
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Search `fields` on the entity reached by `path` (`""` for the base).
    #[must_use]
    pub fn fields<I, F>(mut self, path: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.fields.push((
            AssociationPath::parse(path),
            fields.into_iter().map(Into::into).collect(),
        ));
        self
    }

    #[must_use]
    pub const fn min_term_len(mut self, len: usize) -> Self {
        self.min_term_len = len;
        self
    }
}

impl Default for TextQuerySpec {
    fn default() -> Self {
        Self::new()
    }
}

///
/// OnEmpty
///
/// Result for owners with no associated rows.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnEmpty {
    /// The function's neutral value (0 for sum and count).
    #[default]
    Identity,
    Null,
}

///
/// AggregateSpec
///
/// `function(field)` over every row reached through `association`, per
/// base row, independent of any filter in the same query.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateSpec {
    pub association: AssociationPath,
    /// `None` counts rows by the target's primary key.
    pub field: Option<String>,
    pub function: AggregateFunction,
    pub alias: String,
    pub on_empty: OnEmpty,
}

impl AggregateSpec {
    #[must_use]
    pub fn new(
        function: AggregateFunction,
        association: &str,
        field: Option<&str>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            association: AssociationPath::parse(association),
            field: field.map(str::to_string),
            function,
            alias: alias.into(),
            on_empty: OnEmpty::Identity,
        }
    }

    #[must_use]
    pub fn sum(association: &str, field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Sum, association, Some(field), alias)
    }

    #[must_use]
    pub fn count(association: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Count, association, None, alias)
    }

    #[must_use]
    pub fn min(association: &str, field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Min, association, Some(field), alias)
    }

    #[must_use]
    pub fn max(association: &str, field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Max, association, Some(field), alias)
    }

    /// Report owners without associated rows as null instead of the identity.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.on_empty = OnEmpty::Null;
        self
    }
}

///
/// CteSpec
///

#[derive(Clone)]
pub struct CteSpec {
    pub name: String,
    pub builder: CteBuilderFn,
}

impl CteSpec {
    #[must_use]
    pub fn build(&self, params: &BoundParams) -> Relation {
        (self.builder)(params)
    }
}

impl fmt::Debug for CteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CteSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

///
/// OrderParamSpec
///
/// Sort parameter: `"name"` ascending, `"-name"` descending. Names are base
/// fields or aggregate aliases.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderParamSpec {
    pub key: String,
    pub sortable: Vec<String>,
}

impl OrderParamSpec {
    #[must_use]
    pub fn new<I, S>(key: impl Into<String>, sortable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            sortable: sortable.into_iter().map(Into::into).collect(),
        }
    }
}

///
/// PaginationSpec
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaginationSpec {
    pub page_key: String,
    pub per_page_key: String,
    pub default_per_page: Option<u32>,
    pub max_per_page: u32,
}

impl PaginationSpec {
    #[must_use]
    pub fn from_config(config: &PaginationConfig) -> Self {
        Self {
            page_key: "page".to_string(),
            per_page_key: "per_page".to_string(),
            default_per_page: config.default_per_page,
            max_per_page: config.max_per_page,
        }
    }
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self::from_config(&PaginationConfig::default())
    }
}
