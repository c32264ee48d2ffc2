use crate::{
    db::predicate::{ColumnRef, CompareOp, ComparePredicate, Predicate},
    value::Value,
};
use std::cmp::Ordering;

///
/// FieldPresence
///
/// Result of attempting to read a column from a row during predicate
/// evaluation. This distinguishes between a missing field and a
/// present field whose value may be `Null`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldPresence {
    /// Field exists and has a value (including `Value::Null`).
    Present(Value),
    /// Field is not present on the row.
    Missing,
}

///
/// Row
///
/// Abstraction over a row-like value that can expose scoped columns and
/// answer membership in named sub-relations. This decouples predicate
/// evaluation from the store's binding layout.
///

pub trait Row {
    fn column(&self, column: &ColumnRef) -> FieldPresence;

    /// Whether `value` appears in column `column` of named relation `relation`.
    fn relation_contains(&self, relation: &str, column: &str, value: &Value) -> bool;
}

// Evaluate a column predicate only when the column carries a non-null value.
fn on_value<R: Row + ?Sized>(row: &R, column: &ColumnRef, f: impl FnOnce(&Value) -> bool) -> bool {
    match row.column(column) {
        FieldPresence::Present(Value::Null) | FieldPresence::Missing => false,
        FieldPresence::Present(value) => f(&value),
    }
}

///
/// Evaluate a predicate against a single row.
///
/// Comparisons follow SQL null semantics: a null or missing column never
/// satisfies a comparison, only `IsNull`.
///
#[must_use]
pub fn eval<R: Row + ?Sized>(row: &R, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::False => false,

        Predicate::And(children) => children.iter().all(|child| eval(row, child)),
        Predicate::Or(children) => children.iter().any(|child| eval(row, child)),
        Predicate::Not(inner) => !eval(row, inner),

        Predicate::Compare(cmp) => eval_compare(row, cmp),

        Predicate::IsNull { column } => matches!(
            row.column(column),
            FieldPresence::Present(Value::Null) | FieldPresence::Missing
        ),

        Predicate::TextContainsCi { column, term } => {
            on_value(row, column, |actual| actual.text_contains_ci(term))
        }

        Predicate::InRelation {
            column,
            relation,
            relation_column,
        } => on_value(row, column, |actual| {
            row.relation_contains(relation, relation_column, actual)
        }),
    }
}

// Evaluate a single comparison predicate against a row.
fn eval_compare<R: Row + ?Sized>(row: &R, cmp: &ComparePredicate) -> bool {
    let ComparePredicate { column, op, value } = cmp;

    on_value(row, column, |actual| match op {
        CompareOp::Eq => actual == value,
        CompareOp::Ne => actual != value,
        CompareOp::Lt => actual.cmp(value) == Ordering::Less,
        CompareOp::Lte => actual.cmp(value) != Ordering::Greater,
        CompareOp::Gt => actual.cmp(value) == Ordering::Greater,
        CompareOp::Gte => actual.cmp(value) != Ordering::Less,
        CompareOp::In => match value {
            Value::List(items) => items.iter().any(|item| item == actual),
            other => actual == other,
        },
    })
}
