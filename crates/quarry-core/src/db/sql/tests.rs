use super::*;
use crate::{
    db::relation::{AggregateFunction, Join, OrderTerm},
    model::AssociationPath,
};

fn items_join() -> Join {
    Join {
        kind: JoinKind::Left,
        source: Source::Table("line_items".to_string()),
        scope: Scope::Path(AssociationPath::parse("line_items")),
        left: ColumnRef::base("id"),
        right: ColumnRef::at("line_items", "order_id"),
    }
}

#[test]
fn plain_table_selects_every_base_column() {
    let stmt = render(&Relation::table("orders"), SqlDialect::Postgres);

    assert_eq!(stmt.sql, r#"SELECT "orders".* FROM "orders""#);
    assert!(stmt.params.is_empty());
}

#[test]
fn postgres_numbers_placeholders_in_text_order() {
    let relation = Relation::table("orders")
        .join(items_join())
        .filter(ColumnRef::base("status").eq("open"))
        .filter(ColumnRef::at("line_items", "sku").in_list(["RED", "BLUE"]))
        .distinct();

    let stmt = render(&relation, SqlDialect::Postgres);

    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT DISTINCT "orders".* FROM "orders" "#,
            r#"LEFT JOIN "line_items" ON "orders"."id" = "line_items"."order_id" "#,
            r#"WHERE ("orders"."status" = $1 AND "line_items"."sku" IN ($2, $3))"#,
        )
    );
    assert_eq!(
        stmt.params,
        [Value::from("open"), Value::from("RED"), Value::from("BLUE")]
    );
}

#[test]
fn sqlite_uses_question_marks_and_lowered_like() {
    let relation = Relation::table("customers").filter(ColumnRef::base("name").contains_ci("50%"));

    let stmt = render(&relation, SqlDialect::Sqlite);

    assert_eq!(
        stmt.sql,
        r#"SELECT "customers".* FROM "customers" WHERE LOWER("customers"."name") LIKE LOWER(?) ESCAPE '\'"#
    );
    assert_eq!(stmt.params, [Value::from(r"%50\%%")]);
}

#[test]
fn postgres_text_search_uses_ilike() {
    let relation = Relation::table("customers").filter(ColumnRef::base("name").contains_ci("ada"));

    let stmt = render(&relation, SqlDialect::Postgres);

    assert!(stmt.sql.ends_with(r#"WHERE "customers"."name" ILIKE $1 ESCAPE '\'"#));
    assert_eq!(stmt.params, [Value::from("%ada%")]);
}

#[test]
fn windows_ctes_and_coalesce_render_as_one_statement() {
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
            Projection::All { scope: Scope::Base },
            Projection::Coalesce {
                column: ColumnRef::named("agg_line_items", "total"),
                fallback: Value::Int(0),
                alias: "total".to_string(),
            },
        ]);

    let stmt = render(&relation, SqlDialect::Postgres);

    assert_eq!(
        stmt.sql,
        concat!(
            r#"WITH "agg_line_items" AS (SELECT DISTINCT "line_items"."order_id" AS "owner_key", "#,
            r#"SUM("line_items"."amount") OVER (PARTITION BY "line_items"."order_id") AS "total" "#,
            r#"FROM "line_items") "#,
            r#"SELECT "orders".*, COALESCE("agg_line_items"."total", $1) AS "total" FROM "orders" "#,
            r#"LEFT JOIN "agg_line_items" ON "orders"."id" = "agg_line_items"."owner_key""#,
        )
    );
    assert_eq!(stmt.params, [Value::Int(0)]);
    assert_eq!(stmt.sql.matches("WITH").count(), 1);
}

#[test]
fn nested_paths_are_aliased_by_dotted_path() {
    let relation = Relation::table("orders").join(Join {
        kind: JoinKind::Left,
        source: Source::Table("products".to_string()),
        scope: Scope::Path(AssociationPath::parse("line_items.product")),
        left: ColumnRef::at("line_items", "product_id"),
        right: ColumnRef::at("line_items.product", "id"),
    });

    let stmt = render(&relation, SqlDialect::Postgres);

    assert!(stmt.sql.contains(
        r#"LEFT JOIN "products" AS "line_items.product" ON "line_items"."product_id" = "line_items.product"."id""#
    ));
}

#[test]
fn order_and_page_render_with_null_placement() {
    let relation = Relation::table("orders")
        .order_by(OrderTerm::output("total", OrderDirection::Desc))
        .order_by(OrderTerm::asc(ColumnRef::base("id")))
        .page(Some(25), 50);

    let stmt = render(&relation, SqlDialect::Postgres);

    assert!(stmt.sql.ends_with(
        r#"ORDER BY "total" DESC NULLS LAST, "orders"."id" ASC NULLS FIRST LIMIT 25 OFFSET 50"#
    ));
}

#[test]
fn sqlite_offset_without_limit_keeps_limit_clause() {
    let relation = Relation::table("orders").page(None, 10);

    let stmt = render(&relation, SqlDialect::Sqlite);

    assert!(stmt.sql.ends_with("LIMIT -1 OFFSET 10"));
}

#[test]
fn empty_membership_and_constants_render_as_tautologies() {
    let relation = Relation::table("orders").filter(Predicate::all(vec![
        ColumnRef::base("id").in_list(Vec::<i64>::new()),
        Predicate::True,
        ColumnRef::base("id").in_relation("recent", "order_id"),
        Predicate::not(ColumnRef::base("customer_id").is_null()),
    ]));

    let stmt = render(&relation, SqlDialect::Postgres);

    assert!(stmt.sql.ends_with(concat!(
        r#"WHERE (1 = 0 AND 1 = 1 AND "orders"."id" IN (SELECT "recent"."order_id" FROM "recent") "#,
        r#"AND NOT ("orders"."customer_id" IS NULL))"#,
    )));
}

#[test]
fn count_wraps_relation_in_counted_cte() {
    let relation = Relation::table("orders")
        .filter(ColumnRef::base("status").eq("open"))
        .into_count();

    let stmt = render(&relation, SqlDialect::Postgres);

    assert_eq!(
        stmt.sql,
        concat!(
            r#"WITH "counted" AS (SELECT "orders".* FROM "orders" WHERE "orders"."status" = $1) "#,
            r#"SELECT COUNT(*) AS "count" FROM "counted""#,
        )
    );
}

#[test]
fn identifiers_are_quoted() {
    assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    assert_eq!(escape_like(r"a_b\c"), r"a\_b\\c");
}

#[test]
fn dialect_deserializes_lowercase() {
    #[derive(serde::Deserialize)]
    struct Holder {
        dialect: SqlDialect,
    }

    let holder: Holder = toml::from_str(r#"dialect = "sqlite""#).unwrap();
    assert_eq!(holder.dialect, SqlDialect::Sqlite);
}
