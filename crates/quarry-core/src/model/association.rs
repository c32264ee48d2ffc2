use std::fmt;

///
/// AssociationKind
///
/// Which side of the link carries the foreign key.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AssociationKind {
    /// Foreign key lives on the source entity.
    BelongsTo,
    /// Foreign key lives on the target entity; many targets per source.
    HasMany,
    /// Foreign key lives on the target entity; at most one target.
    HasOne,
}

impl AssociationKind {
    #[must_use]
    pub const fn is_to_many(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

///
/// Association
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    pub foreign_key: String,
}

///
/// AssociationPath
///
/// Chain of association names from a base entity, e.g. `line_items.product`.
/// The empty path denotes the base entity itself.
///

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AssociationPath(Vec<String>);

impl AssociationPath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path; empty segments are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// Split `path.to.field` into its association path and terminal field.
    #[must_use]
    pub fn split_field(dotted: &str) -> (Self, String) {
        let mut path = Self::parse(dotted);
        let field = path.0.pop().unwrap_or_default();

        (path, field)
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First `len` segments.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Segments after the first `skip`.
    #[must_use]
    pub fn suffix(&self, skip: usize) -> Self {
        Self(self.0[skip.min(self.0.len())..].to_vec())
    }

    /// Identifier-safe rendering (`line_items_product`).
    #[must_use]
    pub fn to_ident(&self) -> String {
        self.0.join("_")
    }
}

impl fmt::Display for AssociationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for AssociationPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

///
/// JoinStep
///
/// One resolved hop: `source.source_column = target.target_column`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinStep {
    /// Path from the base entity through this hop.
    pub path: AssociationPath,
    pub kind: AssociationKind,
    pub source_entity: String,
    pub target_entity: String,
    pub source_column: String,
    pub target_column: String,
}

///
/// ResolvedPath
///
/// An association path checked against the schema graph.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPath {
    pub path: AssociationPath,
    pub steps: Vec<JoinStep>,
    /// Entity reached at the end of the path (the base entity for the root).
    pub target: String,
}

impl ResolvedPath {
    /// True when any hop can multiply source rows.
    #[must_use]
    pub fn is_to_many(&self) -> bool {
        self.steps.iter().any(|step| step.kind.is_to_many())
    }
}
