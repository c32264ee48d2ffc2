use crate::{model::AssociationPath, value::Value};
use std::{
    collections::BTreeSet,
    fmt,
    ops::{BitAnd, BitOr},
};

///
/// Predicate AST
///
/// Schema-agnostic representation of row predicates over scoped columns.
/// This layer contains no join logic or execution semantics. All
/// interpretation occurs in later passes:
///
/// - join inference (assembler)
/// - evaluation (memory store)
/// - rendering (sql)
///

///
/// Scope
///
/// Where a column lives within one relation: the relation's own source, a
/// joined association path, or a named sub-relation.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Scope {
    Base,
    Path(AssociationPath),
    Named(String),
}

impl Scope {
    /// Scope for a path; the empty path is the base.
    #[must_use]
    pub fn path(path: AssociationPath) -> Self {
        if path.is_root() {
            Self::Base
        } else {
            Self::Path(path)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("<base>"),
            Self::Path(path) => write!(f, "{path}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

///
/// ColumnRef
///
/// A field within a scope. Also the entry point for building predicates:
/// `ColumnRef::at("line_items", "sku").eq("RED")`.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColumnRef {
    pub scope: Scope,
    pub field: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(scope: Scope, field: impl Into<String>) -> Self {
        Self {
            scope,
            field: field.into(),
        }
    }

    /// Column on the relation's own source.
    #[must_use]
    pub fn base(field: impl Into<String>) -> Self {
        Self::new(Scope::Base, field)
    }

    /// Column reached through a dotted association path.
    #[must_use]
    pub fn at(path: &str, field: impl Into<String>) -> Self {
        Self::new(Scope::path(AssociationPath::parse(path)), field)
    }

    /// Column of a named sub-relation.
    #[must_use]
    pub fn named(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(Scope::Named(name.into()), field)
    }

    /// Parse `path.to.field`; a bare name is a base column.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        let (path, field) = AssociationPath::split_field(dotted);

        Self::new(Scope::path(path), field)
    }

    // ------------------------------------------------------------------
    // Comparison predicates
    // ------------------------------------------------------------------

    #[must_use]
    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value.into())
    }

    #[must_use]
    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value.into())
    }

    #[must_use]
    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value.into())
    }

    #[must_use]
    pub fn lte(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lte, value.into())
    }

    #[must_use]
    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value.into())
    }

    #[must_use]
    pub fn gte(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gte, value.into())
    }

    /// Membership test against a fixed list.
    #[must_use]
    pub fn in_list<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.compare(
            CompareOp::In,
            Value::List(values.into_iter().map(Into::into).collect()),
        )
    }

    // ------------------------------------------------------------------
    // Structural predicates
    // ------------------------------------------------------------------

    /// Column is null, or its scope did not join.
    #[must_use]
    pub fn is_null(&self) -> Predicate {
        Predicate::IsNull {
            column: self.clone(),
        }
    }

    /// Case-insensitive substring match.
    #[must_use]
    pub fn contains_ci(&self, term: impl Into<String>) -> Predicate {
        Predicate::TextContainsCi {
            column: self.clone(),
            term: term.into(),
        }
    }

    /// Column value appears in `relation.relation_column`.
    #[must_use]
    pub fn in_relation(
        &self,
        relation: impl Into<String>,
        relation_column: impl Into<String>,
    ) -> Predicate {
        Predicate::InRelation {
            column: self.clone(),
            relation: relation.into(),
            relation_column: relation_column.into(),
        }
    }

    fn compare(&self, op: CompareOp, value: Value) -> Predicate {
        Predicate::Compare(ComparePredicate {
            column: self.clone(),
            op,
            value,
        })
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Base => f.write_str(&self.field),
            scope => write!(f, "{scope}.{}", self.field),
        }
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0x01,
    Ne = 0x02,
    Lt = 0x03,
    Lte = 0x04,
    Gt = 0x05,
    Gte = 0x06,
    In = 0x07,
}

impl CompareOp {
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComparePredicate {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub value: Value,
}

///
/// Predicate
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull {
        column: ColumnRef,
    },
    TextContainsCi {
        column: ColumnRef,
        term: String,
    },
    InRelation {
        column: ColumnRef,
        relation: String,
        relation_column: String,
    },
}

impl Predicate {
    #[must_use]
    pub const fn and(preds: Vec<Self>) -> Self {
        Self::And(preds)
    }

    #[must_use]
    pub const fn or(preds: Vec<Self>) -> Self {
        Self::Or(preds)
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(pred: Self) -> Self {
        Self::Not(Box::new(pred))
    }

    /// Conjunction that collapses trivial shapes: none is `True`, one is itself.
    #[must_use]
    pub fn all(mut preds: Vec<Self>) -> Self {
        match preds.len() {
            0 => Self::True,
            1 => preds.remove(0),
            _ => Self::And(preds),
        }
    }

    /// Disjunction that collapses trivial shapes: none is `False`, one is itself.
    #[must_use]
    pub fn any(mut preds: Vec<Self>) -> Self {
        match preds.len() {
            0 => Self::False,
            1 => preds.remove(0),
            _ => Self::Or(preds),
        }
    }

    /// Every scope this predicate reads from.
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<Scope> {
        let mut out = BTreeSet::new();
        self.collect_scopes(&mut out);
        out
    }

    /// Every column this predicate reads, in tree order.
    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    /// Every named sub-relation this predicate reads from.
    #[must_use]
    pub fn relation_refs(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for scope in self.scopes() {
            if let Scope::Named(name) = scope {
                out.insert(name);
            }
        }
        self.collect_relation_refs(&mut out);
        out
    }

    fn collect_scopes(&self, out: &mut BTreeSet<Scope>) {
        match self {
            Self::True | Self::False => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_scopes(out);
                }
            }
            Self::Not(inner) => inner.collect_scopes(out),
            Self::Compare(cmp) => {
                out.insert(cmp.column.scope.clone());
            }
            Self::IsNull { column }
            | Self::TextContainsCi { column, .. }
            | Self::InRelation { column, .. } => {
                out.insert(column.scope.clone());
            }
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Self::True | Self::False => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
            Self::Compare(cmp) => out.push(&cmp.column),
            Self::IsNull { column }
            | Self::TextContainsCi { column, .. }
            | Self::InRelation { column, .. } => out.push(column),
        }
    }

    fn collect_relation_refs(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_relation_refs(out);
                }
            }
            Self::Not(inner) => inner.collect_relation_refs(out),
            Self::InRelation { relation, .. } => {
                out.insert(relation.clone());
            }
            _ => {}
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitAnd for &Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        Predicate::And(vec![self.clone(), rhs.clone()])
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

impl BitOr for &Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        Predicate::Or(vec![self.clone(), rhs.clone()])
    }
}
