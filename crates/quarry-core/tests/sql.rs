mod common;

use quarry_core::{
    db::{
        QuerySession,
        definition::{AggregateSpec, OrderParamSpec},
        sql::SqlDialect,
        store::MemoryStore,
    },
    prelude::*,
};

fn definition() -> QueryDefinition {
    QueryDefinition::builder(common::schema(), "orders")
        .aggregate(AggregateSpec::sum("line_items", "amount", "total"))
        .aggregate(AggregateSpec::max("line_items", "amount", "largest").nullable())
        .aggregate(AggregateSpec::count("shipments", "shipment_count"))
        .filter("sku", "line_items.sku")
        .filter("carrier", "shipments.carrier")
        .build()
        .expect("definition is valid")
}

#[test]
fn one_with_clause_carries_every_aggregate_relation() {
    let store = MemoryStore::new();
    let session = QuerySession::new(&store);
    let definition = definition();

    let stmt = session
        .to_sql(
            &definition,
            definition.base_relation(),
            &ParameterSet::new().with("sku", vec!["RED", "BLUE"]),
        )
        .unwrap();

    assert!(stmt.sql.starts_with("WITH "), "{}", stmt.sql);
    assert_eq!(stmt.sql.matches("WITH ").count(), 1, "{}", stmt.sql);
    assert!(stmt.sql.contains(r#""agg_line_items" AS ("#), "{}", stmt.sql);
    assert!(stmt.sql.contains(r#""agg_shipments" AS ("#), "{}", stmt.sql);
    assert!(
        stmt.sql
            .contains(r#"MAX("line_items"."amount") OVER (PARTITION BY "line_items"."order_id")"#),
        "{}",
        stmt.sql
    );
    assert!(
        stmt.sql.contains(r#"OVER (PARTITION BY "shipments"."order_id")"#),
        "{}",
        stmt.sql
    );
    assert!(stmt.params.contains(&Value::from("RED")));
    assert!(stmt.params.contains(&Value::from("BLUE")));
}

#[test]
fn each_association_is_joined_once() {
    let store = MemoryStore::new();
    let session = QuerySession::new(&store);
    let definition = definition();

    let unfiltered = session
        .to_sql(&definition, definition.base_relation(), &ParameterSet::new())
        .unwrap();
    let filtered = session
        .to_sql(
            &definition,
            definition.base_relation(),
            &ParameterSet::new()
                .with("sku", vec!["RED", "BLUE"])
                .with("carrier", "ups"),
        )
        .unwrap();

    // one join per aggregate relation
    assert_eq!(unfiltered.sql.matches(" JOIN ").count(), 2, "{}", unfiltered.sql);
    // plus one per filtered association
    assert_eq!(filtered.sql.matches(" JOIN ").count(), 4, "{}", filtered.sql);
    assert!(filtered.sql.contains("SELECT DISTINCT"), "{}", filtered.sql);
}

#[test]
fn sqlite_rendering_uses_positional_placeholders() {
    let store = MemoryStore::new();
    let session = QuerySession::new(&store).with_dialect(SqlDialect::Sqlite);
    let definition = definition();

    let stmt = session
        .to_sql(
            &definition,
            definition.base_relation(),
            &ParameterSet::new().with("carrier", "dhl"),
        )
        .unwrap();

    assert_eq!(stmt.sql.matches('?').count(), stmt.params.len(), "{}", stmt.sql);
    assert!(!stmt.sql.contains('$'), "{}", stmt.sql);
}

#[test]
fn rendering_never_touches_the_store() {
    let store = common::store();
    let session = QuerySession::new(&store);
    let definition = definition();

    session
        .to_sql(&definition, definition.base_relation(), &ParameterSet::new())
        .unwrap();

    assert_eq!(store.executions(), 0);
}

#[test]
fn distinct_selection_carries_its_order_columns() {
    let store = common::store();
    let session = QuerySession::new(&store);
    let definition = QueryDefinition::builder(common::schema(), "orders")
        .select(["number"])
        .filter("sku", "line_items.sku")
        .order_param(OrderParamSpec::new("sort", ["status", "number"]))
        .build()
        .unwrap();
    let params = ParameterSet::new().with("sku", "RED").with("sort", "-status");

    let stmt = session
        .to_sql(&definition, definition.base_relation(), &params)
        .unwrap();
    let (select_list, rest) = stmt.sql.split_once(" FROM ").unwrap();

    assert!(select_list.starts_with("SELECT DISTINCT"), "{}", stmt.sql);
    assert!(
        select_list.contains(r#""orders"."status" AS "status""#),
        "{}",
        stmt.sql
    );
    assert!(rest.contains(r#"ORDER BY "orders"."status" DESC"#), "{}", stmt.sql);

    let result = session
        .execute_default(&definition, &params)
        .unwrap();
    assert_eq!(
        result.column("status"),
        vec![Value::from("shipped"), Value::from("open")]
    );
    assert_eq!(result.column("number"), vec![Value::from("A-2"), Value::from("A-1")]);
}
