mod ast;
mod eval;


pub use ast::{ColumnRef, CompareOp, ComparePredicate, Predicate, Scope};
pub use eval::{FieldPresence, Row, eval};
