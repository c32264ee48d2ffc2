use super::*;
use crate::model::AssociationPath;

fn line_items_join() -> Join {
    Join {
        kind: JoinKind::Left,
        source: Source::Table("line_items".to_string()),
        scope: Scope::Path(AssociationPath::parse("line_items")),
        left: ColumnRef::base("id"),
        right: ColumnRef::at("line_items", "order_id"),
    }
}

#[test]
fn filter_chains_flatten_into_one_conjunction() {
    let relation = Relation::table("orders")
        .filter(ColumnRef::base("a").eq(1))
        .filter(ColumnRef::base("b").eq(2))
        .filter(ColumnRef::base("c").eq(3));

    let Some(Predicate::And(children)) = relation.predicate() else {
        panic!("expected conjunction");
    };
    assert_eq!(children.len(), 3);
}

#[test]
fn or_filter_unions_with_existing_predicate() {
    let relation = Relation::table("orders")
        .filter(ColumnRef::base("status").eq("open"))
        .or_filter(ColumnRef::base("status").eq("shipped"));

    assert_eq!(
        relation.predicate(),
        Some(&Predicate::Or(vec![
            ColumnRef::base("status").eq("open"),
            ColumnRef::base("status").eq("shipped"),
        ]))
    );
}

#[test]
fn joins_are_deduplicated_by_scope() {
    let relation = Relation::table("orders")
        .join(line_items_join())
        .join(line_items_join());

    assert_eq!(relation.joins().len(), 1);
}

#[test]
fn join_path_joins_each_prefix_once_and_marks_distinct() {
    let schema = crate::test_fixtures::schema();
    let products = schema
        .resolve("orders", &AssociationPath::parse("line_items.product"))
        .unwrap();
    let items = schema
        .resolve("orders", &AssociationPath::parse("line_items"))
        .unwrap();

    let relation = Relation::table("orders")
        .join_path(&items, JoinKind::Left)
        .join_path(&products, JoinKind::Left);

    assert!(relation.is_distinct());
    assert_eq!(relation.joins().len(), 2);
    assert_eq!(relation.joins()[0], line_items_join());

    let product = &relation.joins()[1];
    assert_eq!(product.left, ColumnRef::at("line_items", "product_id"));
    assert_eq!(product.right, ColumnRef::at("line_items.product", "id"));
}

#[test]
fn belongs_to_join_keeps_rows_unique() {
    let schema = crate::test_fixtures::schema();
    let customer = schema
        .resolve("orders", &AssociationPath::parse("customer"))
        .unwrap();

    let relation = Relation::table("orders").join_path(&customer, JoinKind::Left);
    assert!(!relation.is_distinct());
}

#[test]
fn ctes_keep_declaration_order_and_ignore_repeats() {
    let relation = Relation::table("orders")
        .with_cte("first", Relation::table("line_items"))
        .with_cte("second", Relation::named("first"))
        .with_cte("first", Relation::table("products"));

    let names: Vec<_> = relation.ctes().iter().map(|cte| cte.name.as_str()).collect();
    assert_eq!(names, ["first", "second"]);
    assert_eq!(
        relation.ctes()[0].relation.source(),
        &Source::Table("line_items".to_string())
    );
}

#[test]
fn free_relation_refs_excludes_declared_siblings() {
    let relation = Relation::table("orders")
        .with_cte("first", Relation::table("line_items"))
        .with_cte("second", Relation::named("first"))
        .filter(ColumnRef::base("id").in_relation("second", "order_id"));

    assert!(relation.free_relation_refs().is_empty());
}

#[test]
fn free_relation_refs_reports_forward_and_outer_references() {
    let relation = Relation::table("orders")
        .with_cte("first", Relation::named("second"))
        .with_cte("second", Relation::table("line_items"))
        .filter(ColumnRef::base("id").in_relation("outer", "order_id"));

    let refs = relation.free_relation_refs();
    assert!(refs.contains("second"));
    assert!(refs.contains("outer"));
}

#[test]
fn into_count_wraps_and_drops_order_and_page() {
    let relation = Relation::table("orders")
        .order_by(OrderTerm::asc(ColumnRef::base("id")))
        .page(Some(10), 20)
        .into_count();

    assert_eq!(relation.source(), &Source::Named("counted".to_string()));
    assert_eq!(
        relation.projection(),
        [Projection::CountAll {
            alias: "count".to_string()
        }]
    );

    let inner = &relation.ctes()[0].relation;
    assert!(inner.order().is_empty());
    assert_eq!(inner.page_spec(), None);
}

#[test]
fn identity_exists_for_sum_and_count_only() {
    assert_eq!(AggregateFunction::Sum.identity(), Some(Value::Int(0)));
    assert_eq!(AggregateFunction::Count.identity(), Some(Value::Int(0)));
    assert_eq!(AggregateFunction::Min.identity(), None);
    assert_eq!(AggregateFunction::default(), AggregateFunction::Sum);
}
