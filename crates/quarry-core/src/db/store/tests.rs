use super::*;
use crate::{
    db::{
        predicate::{ColumnRef, Scope},
        relation::{AggregateFunction, Join, JoinKind, OrderTerm, Projection, Source},
    },
    model::AssociationPath,
    test_fixtures,
    value::Value,
};

fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter().filter_map(|row| row.value("id").as_int()).collect()
}

fn line_items_join(kind: JoinKind) -> Join {
    Join {
        kind,
        source: Source::Table("line_items".to_string()),
        scope: Scope::Path(AssociationPath::parse("line_items")),
        left: ColumnRef::base("id"),
        right: ColumnRef::at("line_items", "order_id"),
    }
}

#[test]
fn unknown_table_is_a_store_error() {
    let store = test_fixtures::store();
    let err = store.execute(&Relation::table("missing")).unwrap_err();

    assert_eq!(
        err,
        StoreError::UnknownTable {
            table: "missing".to_string()
        }
    );
}

#[test]
fn executions_are_counted_per_call() {
    let store = test_fixtures::store();
    assert_eq!(store.executions(), 0);

    store.execute(&Relation::table("orders")).unwrap();
    let _ = store.execute(&Relation::table("missing"));

    assert_eq!(store.executions(), 2);
}

#[test]
fn inner_join_drops_unmatched_and_left_join_keeps_them() {
    let store = test_fixtures::store();

    let inner = store
        .execute(
            &Relation::table("orders")
                .join(line_items_join(JoinKind::Inner))
                .distinct(),
        )
        .unwrap();
    let left = store
        .execute(
            &Relation::table("orders")
                .join(line_items_join(JoinKind::Left))
                .distinct(),
        )
        .unwrap();

    assert_eq!(ids(&inner), [1, 2]);
    assert_eq!(ids(&left), [1, 2, 3]);
}

#[test]
fn join_without_distinct_multiplies_rows() {
    let store = test_fixtures::store();
    let rows = store
        .execute(&Relation::table("orders").join(line_items_join(JoinKind::Inner)))
        .unwrap();

    assert_eq!(rows.len(), 5);
}

#[test]
fn predicates_read_joined_scopes() {
    let store = test_fixtures::store();
    let rows = store
        .execute(
            &Relation::table("orders")
                .join(line_items_join(JoinKind::Left))
                .filter(ColumnRef::at("line_items", "sku").eq("GREEN"))
                .distinct(),
        )
        .unwrap();

    assert_eq!(ids(&rows), [1]);
}

#[test]
fn window_sums_are_computed_per_partition() {
    let store = test_fixtures::store();
    let rows = store
        .execute(
            &Relation::table("line_items")
                .select(vec![
                    Projection::Column {
                        column: ColumnRef::base("order_id"),
                        alias: "owner_key".to_string(),
                    },
                    Projection::Window {
                        function: AggregateFunction::Sum,
                        column: ColumnRef::base("amount"),
                        partition_by: vec![ColumnRef::base("order_id")],
                        alias: "total".to_string(),
                    },
                ])
                .distinct(),
        )
        .unwrap();

    assert_eq!(
        rows,
        [
            Record::new().with("owner_key", 1).with("total", 60),
            Record::new().with("owner_key", 2).with("total", 12),
        ]
    );
}

#[test]
fn window_functions_cover_count_min_max() {
    let store = test_fixtures::store();
    let window = |function, alias: &str| Projection::Window {
        function,
        column: ColumnRef::base("amount"),
        partition_by: vec![ColumnRef::base("order_id")],
        alias: alias.to_string(),
    };
    let rows = store
        .execute(
            &Relation::table("line_items")
                .filter(ColumnRef::base("order_id").eq(1))
                .select(vec![
                    window(AggregateFunction::Count, "n"),
                    window(AggregateFunction::Min, "lo"),
                    window(AggregateFunction::Max, "hi"),
                ])
                .distinct(),
        )
        .unwrap();

    assert_eq!(
        rows,
        [Record::new().with("n", 3).with("lo", 10).with("hi", 30)]
    );
}

#[test]
fn ctes_are_readable_by_name_and_by_membership() {
    let store = test_fixtures::store();
    let relation = Relation::table("orders")
        .with_cte(
            "red_items",
            Relation::table("line_items").filter(ColumnRef::base("sku").eq("RED")),
        )
        .filter(ColumnRef::base("id").in_relation("red_items", "order_id"));

    let rows = store.execute(&relation).unwrap();
    assert_eq!(ids(&rows), [1, 2]);

    let unbound = store
        .execute(&Relation::table("orders").filter(ColumnRef::base("id").in_relation("nope", "id")))
        .unwrap();
    assert!(unbound.is_empty());

    let err = store.execute(&Relation::named("nope")).unwrap_err();
    assert!(matches!(err, StoreError::UnknownRelation { .. }));
}

#[test]
fn coalesce_fills_nulls_from_missing_left_join() {
    let store = test_fixtures::store();
    let totals = Relation::table("line_items")
        .select(vec![
            Projection::Column {
                column: ColumnRef::base("order_id"),
                alias: "owner_key".to_string(),
            },
            Projection::Window {
                function: AggregateFunction::Sum,
                column: ColumnRef::base("amount"),
                partition_by: vec![ColumnRef::base("order_id")],
                alias: "total".to_string(),
            },
        ])
        .distinct();
    let relation = Relation::table("orders")
        .with_cte("agg_line_items", totals)
        .join(Join {
            kind: JoinKind::Left,
            source: Source::Named("agg_line_items".to_string()),
            scope: Scope::Named("agg_line_items".to_string()),
            left: ColumnRef::base("id"),
            right: ColumnRef::named("agg_line_items", "owner_key"),
        })
        .select(vec![
            Projection::Column {
                column: ColumnRef::base("id"),
                alias: "id".to_string(),
            },
            Projection::Coalesce {
                column: ColumnRef::named("agg_line_items", "total"),
                fallback: Value::Int(0),
                alias: "total".to_string(),
            },
        ]);

    let rows = store.execute(&relation).unwrap();
    let totals: Vec<_> = rows.iter().map(|row| row.value("total").clone()).collect();

    assert_eq!(totals, [Value::Int(60), Value::Int(12), Value::Int(0)]);
}

#[test]
fn order_and_page_apply_after_projection() {
    let store = test_fixtures::store();
    let rows = store
        .execute(
            &Relation::table("line_items")
                .order_by(OrderTerm::desc(ColumnRef::base("amount")))
                .page(Some(2), 1),
        )
        .unwrap();

    assert_eq!(ids(&rows), [2, 1]);
}

#[test]
fn count_relation_ignores_page_and_dedupes_distinct_bases() {
    let store = test_fixtures::store();
    let relation = Relation::table("orders")
        .join(line_items_join(JoinKind::Left))
        .filter(ColumnRef::at("line_items", "sku").in_list(["RED", "BLUE"]))
        .distinct()
        .page(Some(1), 0)
        .into_count();

    let rows = store.execute(&relation).unwrap();
    assert_eq!(rows, [Record::new().with("count", 2)]);
}

#[test]
fn count_cannot_be_mixed_with_columns() {
    let store = test_fixtures::store();
    let relation = Relation::table("orders").select(vec![
        Projection::CountAll {
            alias: "count".to_string(),
        },
        Projection::Column {
            column: ColumnRef::base("id"),
            alias: "id".to_string(),
        },
    ]);

    assert!(matches!(
        store.execute(&relation),
        Err(StoreError::Unsupported { .. })
    ));
}
