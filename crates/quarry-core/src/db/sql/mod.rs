//! Module: sql
//! Responsibility: render a `Relation` as one parameterised SQL statement.
//! Does not own: execution, connections, or result decoding.
//! Boundary: external relational stores run the rendered statement.

#[cfg(test)]
mod tests;

use crate::{
    db::{
        predicate::{ColumnRef, CompareOp, Predicate, Scope},
        relation::{JoinKind, OrderDirection, OrderKey, Projection, Relation, Source},
    },
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// SqlDialect
///
/// Placeholder and case-insensitive matching style of the target database.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// `$1, $2, ...` placeholders and `ILIKE`.
    #[default]
    Postgres,
    /// `?` placeholders and `LIKE` over `LOWER(...)`.
    Sqlite,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        })
    }
}

///
/// SqlStatement
///
/// Statement text plus its bound values, in placeholder order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Render `relation` (CTEs, joins, predicate, projection, order and page)
/// as a single statement.
#[must_use]
pub fn render(relation: &Relation, dialect: SqlDialect) -> SqlStatement {
    let mut writer = SqlWriter {
        dialect,
        sql: String::new(),
        params: Vec::new(),
    };
    writer.relation(relation);

    SqlStatement {
        sql: writer.sql,
        params: writer.params,
    }
}

///
/// SqlWriter
///

struct SqlWriter {
    dialect: SqlDialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn relation(&mut self, relation: &Relation) {
        if !relation.ctes().is_empty() {
            self.sql.push_str("WITH ");
            for (i, cte) in relation.ctes().iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.sql.push_str(&quote(&cte.name));
                self.sql.push_str(" AS (");
                self.relation(&cte.relation);
                self.sql.push(')');
            }
            self.sql.push(' ');
        }

        let base = relation.source().name().to_string();
        self.sql.push_str("SELECT ");
        if relation.is_distinct() {
            self.sql.push_str("DISTINCT ");
        }
        self.projection(relation.projection(), &base);

        self.sql.push_str(" FROM ");
        self.source(relation.source(), &base);

        for join in relation.joins() {
            self.sql.push_str(match join.kind {
                JoinKind::Inner => " INNER JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            self.source(&join.source, &scope_alias(&join.scope, &base));
            self.sql.push_str(" ON ");
            self.column(&join.left, &base);
            self.sql.push_str(" = ");
            self.column(&join.right, &base);
        }

        if let Some(predicate) = relation.predicate() {
            self.sql.push_str(" WHERE ");
            self.predicate(predicate, &base);
        }

        if !relation.order().is_empty() {
            self.sql.push_str(" ORDER BY ");
            for (i, term) in relation.order().iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                match &term.key {
                    OrderKey::Column(column) => self.column(column, &base),
                    OrderKey::Output(alias) => self.sql.push_str(&quote(alias)),
                }
                self.sql.push_str(match term.direction {
                    OrderDirection::Asc => " ASC NULLS FIRST",
                    OrderDirection::Desc => " DESC NULLS LAST",
                });
            }
        }

        if let Some(page) = relation.page_spec() {
            match (page.limit, self.dialect) {
                (Some(limit), _) => self.sql.push_str(&format!(" LIMIT {limit}")),
                (None, SqlDialect::Sqlite) if page.offset > 0 => self.sql.push_str(" LIMIT -1"),
                (None, _) => {}
            }
            if page.offset > 0 {
                self.sql.push_str(&format!(" OFFSET {}", page.offset));
            }
        }
    }

    fn source(&mut self, source: &Source, alias: &str) {
        let name = source.name();
        self.sql.push_str(&quote(name));
        if name != alias {
            self.sql.push_str(" AS ");
            self.sql.push_str(&quote(alias));
        }
    }

    fn projection(&mut self, projection: &[Projection], base: &str) {
        if projection.is_empty() {
            self.sql.push_str(&quote(base));
            self.sql.push_str(".*");
            return;
        }

        for (i, item) in projection.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            match item {
                Projection::All { scope } => {
                    self.sql.push_str(&quote(&scope_alias(scope, base)));
                    self.sql.push_str(".*");
                }
                Projection::Column { column, alias } => {
                    self.column(column, base);
                    self.alias(alias);
                }
                Projection::Coalesce {
                    column,
                    fallback,
                    alias,
                } => {
                    self.sql.push_str("COALESCE(");
                    self.column(column, base);
                    self.sql.push_str(", ");
                    self.param(fallback.clone());
                    self.sql.push(')');
                    self.alias(alias);
                }
                Projection::Window {
                    function,
                    column,
                    partition_by,
                    alias,
                } => {
                    self.sql.push_str(function.sql_name());
                    self.sql.push('(');
                    self.column(column, base);
                    self.sql.push_str(") OVER (PARTITION BY ");
                    for (j, part) in partition_by.iter().enumerate() {
                        if j > 0 {
                            self.sql.push_str(", ");
                        }
                        self.column(part, base);
                    }
                    self.sql.push(')');
                    self.alias(alias);
                }
                Projection::CountAll { alias } => {
                    self.sql.push_str("COUNT(*)");
                    self.alias(alias);
                }
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate, base: &str) {
        match predicate {
            Predicate::True => self.sql.push_str("1 = 1"),
            Predicate::False => self.sql.push_str("1 = 0"),
            Predicate::And(children) => self.junction(children, " AND ", "1 = 1", base),
            Predicate::Or(children) => self.junction(children, " OR ", "1 = 0", base),
            Predicate::Not(inner) => {
                self.sql.push_str("NOT (");
                self.predicate(inner, base);
                self.sql.push(')');
            }
            Predicate::Compare(cmp) => match (cmp.op, &cmp.value) {
                (CompareOp::In, Value::List(items)) if items.is_empty() => {
                    self.sql.push_str("1 = 0");
                }
                (CompareOp::In, Value::List(items)) => {
                    self.column(&cmp.column, base);
                    self.sql.push_str(" IN (");
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            self.sql.push_str(", ");
                        }
                        self.param(item.clone());
                    }
                    self.sql.push(')');
                }
                (op, value) => {
                    self.column(&cmp.column, base);
                    self.sql.push_str(operator(op));
                    self.param(value.clone());
                }
            },
            Predicate::IsNull { column } => {
                self.column(column, base);
                self.sql.push_str(" IS NULL");
            }
            Predicate::TextContainsCi { column, term } => {
                let pattern = Value::Text(format!("%{}%", escape_like(term)));
                match self.dialect {
                    SqlDialect::Postgres => {
                        self.column(column, base);
                        self.sql.push_str(" ILIKE ");
                        self.param(pattern);
                    }
                    SqlDialect::Sqlite => {
                        self.sql.push_str("LOWER(");
                        self.column(column, base);
                        self.sql.push_str(") LIKE LOWER(");
                        self.param(pattern);
                        self.sql.push(')');
                    }
                }
                self.sql.push_str(" ESCAPE '\\'");
            }
            Predicate::InRelation {
                column,
                relation,
                relation_column,
            } => {
                self.column(column, base);
                self.sql.push_str(&format!(
                    " IN (SELECT {}.{} FROM {})",
                    quote(relation),
                    quote(relation_column),
                    quote(relation)
                ));
            }
        }
    }

    fn junction(&mut self, children: &[Predicate], sep: &str, empty: &str, base: &str) {
        if children.is_empty() {
            self.sql.push_str(empty);
            return;
        }

        self.sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            self.predicate(child, base);
        }
        self.sql.push(')');
    }

    fn column(&mut self, column: &ColumnRef, base: &str) {
        self.sql.push_str(&quote(&scope_alias(&column.scope, base)));
        self.sql.push('.');
        self.sql.push_str(&quote(&column.field));
    }

    fn alias(&mut self, alias: &str) {
        self.sql.push_str(" AS ");
        self.sql.push_str(&quote(alias));
    }

    fn param(&mut self, value: Value) {
        self.params.push(value);
        match self.dialect {
            SqlDialect::Postgres => self.sql.push_str(&format!("${}", self.params.len())),
            SqlDialect::Sqlite => self.sql.push('?'),
        }
    }
}

const fn operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq | CompareOp::In => " = ",
        CompareOp::Ne => " <> ",
        CompareOp::Lt => " < ",
        CompareOp::Lte => " <= ",
        CompareOp::Gt => " > ",
        CompareOp::Gte => " >= ",
    }
}

// Table alias a scope is bound under within one SELECT.
fn scope_alias(scope: &Scope, base: &str) -> String {
    match scope {
        Scope::Base => base.to_string(),
        Scope::Path(path) => path.to_string(),
        Scope::Named(name) => name.clone(),
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
