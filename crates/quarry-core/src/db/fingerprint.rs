//! Deterministic query fingerprinting derived from the compiled relation.
#![allow(clippy::cast_possible_truncation)]

use crate::{
    db::{
        predicate::{ColumnRef, Predicate, Scope},
        relation::{JoinKind, OrderDirection, OrderKey, Projection, Relation, Source},
    },
    value::Value,
};
use sha2::{Digest, Sha256};
use std::fmt;

///
/// QueryFingerprint
///
/// Stable, deterministic fingerprint for compiled relations. Two relations
/// with the same structure and bound values always hash identically.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    #[must_use]
    pub fn of(relation: &Relation) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"queryfp:v1");
        hash_relation(&mut hasher, relation);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

fn hash_relation(hasher: &mut Sha256, relation: &Relation) {
    write_tag(hasher, 0x01);
    hash_source(hasher, relation.source());

    write_tag(hasher, 0x02);
    write_len(hasher, relation.ctes().len());
    for cte in relation.ctes() {
        write_str(hasher, &cte.name);
        hash_relation(hasher, &cte.relation);
    }

    write_tag(hasher, 0x03);
    write_len(hasher, relation.joins().len());
    for join in relation.joins() {
        write_tag(
            hasher,
            match join.kind {
                JoinKind::Inner => 0x30,
                JoinKind::Left => 0x31,
            },
        );
        hash_source(hasher, &join.source);
        hash_scope(hasher, &join.scope);
        hash_column(hasher, &join.left);
        hash_column(hasher, &join.right);
    }

    write_tag(hasher, 0x04);
    match relation.predicate() {
        Some(predicate) => hash_predicate(hasher, predicate),
        None => write_tag(hasher, 0x40),
    }

    write_tag(hasher, 0x05);
    write_len(hasher, relation.projection().len());
    for item in relation.projection() {
        hash_projection(hasher, item);
    }

    write_tag(hasher, 0x06);
    write_tag(hasher, u8::from(relation.is_distinct()));

    write_tag(hasher, 0x07);
    write_len(hasher, relation.order().len());
    for term in relation.order() {
        match &term.key {
            OrderKey::Column(column) => {
                write_tag(hasher, 0x70);
                hash_column(hasher, column);
            }
            OrderKey::Output(alias) => {
                write_tag(hasher, 0x71);
                write_str(hasher, alias);
            }
        }
        write_tag(
            hasher,
            match term.direction {
                OrderDirection::Asc => 0x01,
                OrderDirection::Desc => 0x02,
            },
        );
    }

    write_tag(hasher, 0x08);
    match relation.page_spec() {
        Some(page) => {
            write_tag(hasher, 0x81);
            match page.limit {
                Some(limit) => {
                    write_tag(hasher, 0x01);
                    write_u32(hasher, limit);
                }
                None => write_tag(hasher, 0x00),
            }
            write_u32(hasher, page.offset);
        }
        None => write_tag(hasher, 0x80),
    }
}

fn hash_source(hasher: &mut Sha256, source: &Source) {
    match source {
        Source::Table(name) => {
            write_tag(hasher, 0x10);
            write_str(hasher, name);
        }
        Source::Named(name) => {
            write_tag(hasher, 0x11);
            write_str(hasher, name);
        }
    }
}

fn hash_scope(hasher: &mut Sha256, scope: &Scope) {
    match scope {
        Scope::Base => write_tag(hasher, 0x20),
        Scope::Path(path) => {
            write_tag(hasher, 0x21);
            write_str(hasher, &path.to_string());
        }
        Scope::Named(name) => {
            write_tag(hasher, 0x22);
            write_str(hasher, name);
        }
    }
}

fn hash_column(hasher: &mut Sha256, column: &ColumnRef) {
    hash_scope(hasher, &column.scope);
    write_str(hasher, &column.field);
}

fn hash_predicate(hasher: &mut Sha256, predicate: &Predicate) {
    match predicate {
        Predicate::True => write_tag(hasher, 0x41),
        Predicate::False => write_tag(hasher, 0x42),
        Predicate::And(children) => {
            write_tag(hasher, 0x43);
            write_len(hasher, children.len());
            for child in children {
                hash_predicate(hasher, child);
            }
        }
        Predicate::Or(children) => {
            write_tag(hasher, 0x44);
            write_len(hasher, children.len());
            for child in children {
                hash_predicate(hasher, child);
            }
        }
        Predicate::Not(inner) => {
            write_tag(hasher, 0x45);
            hash_predicate(hasher, inner);
        }
        Predicate::Compare(cmp) => {
            write_tag(hasher, 0x46);
            hash_column(hasher, &cmp.column);
            write_tag(hasher, cmp.op.tag());
            write_value(hasher, &cmp.value);
        }
        Predicate::IsNull { column } => {
            write_tag(hasher, 0x47);
            hash_column(hasher, column);
        }
        Predicate::TextContainsCi { column, term } => {
            write_tag(hasher, 0x48);
            hash_column(hasher, column);
            write_str(hasher, term);
        }
        Predicate::InRelation {
            column,
            relation,
            relation_column,
        } => {
            write_tag(hasher, 0x49);
            hash_column(hasher, column);
            write_str(hasher, relation);
            write_str(hasher, relation_column);
        }
    }
}

fn hash_projection(hasher: &mut Sha256, item: &Projection) {
    match item {
        Projection::All { scope } => {
            write_tag(hasher, 0x50);
            hash_scope(hasher, scope);
        }
        Projection::Column { column, alias } => {
            write_tag(hasher, 0x51);
            hash_column(hasher, column);
            write_str(hasher, alias);
        }
        Projection::Coalesce {
            column,
            fallback,
            alias,
        } => {
            write_tag(hasher, 0x52);
            hash_column(hasher, column);
            write_value(hasher, fallback);
            write_str(hasher, alias);
        }
        Projection::Window {
            function,
            column,
            partition_by,
            alias,
        } => {
            write_tag(hasher, 0x53);
            write_str(hasher, function.sql_name());
            hash_column(hasher, column);
            write_len(hasher, partition_by.len());
            for column in partition_by {
                hash_column(hasher, column);
            }
            write_str(hasher, alias);
        }
        Projection::CountAll { alias } => {
            write_tag(hasher, 0x54);
            write_str(hasher, alias);
        }
    }
}

fn write_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => write_tag(hasher, 0x60),
        Value::Bool(v) => {
            write_tag(hasher, 0x61);
            write_tag(hasher, u8::from(*v));
        }
        Value::Int(v) => {
            write_tag(hasher, 0x62);
            hasher.update(v.to_be_bytes());
        }
        Value::Float(v) => {
            write_tag(hasher, 0x63);
            hasher.update(v.to_bits().to_be_bytes());
        }
        Value::Text(v) => {
            write_tag(hasher, 0x64);
            write_str(hasher, v);
        }
        Value::List(items) => {
            write_tag(hasher, 0x65);
            write_len(hasher, items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    write_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_len(hasher: &mut Sha256, len: usize) {
    write_u32(hasher, u32::try_from(len).unwrap_or(u32::MAX));
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_relations_share_a_fingerprint() {
        let build = || {
            Relation::table("orders")
                .filter(ColumnRef::base("status").eq("open"))
                .page(Some(10), 0)
        };

        assert_eq!(QueryFingerprint::of(&build()), QueryFingerprint::of(&build()));
    }

    #[test]
    fn bound_values_change_the_fingerprint() {
        let open = Relation::table("orders").filter(ColumnRef::base("status").eq("open"));
        let shipped = Relation::table("orders").filter(ColumnRef::base("status").eq("shipped"));

        assert_ne!(QueryFingerprint::of(&open), QueryFingerprint::of(&shipped));
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hex = QueryFingerprint::of(&Relation::table("orders")).as_hex();

        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
