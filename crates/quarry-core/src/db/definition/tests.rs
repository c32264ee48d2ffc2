use super::*;
use crate::{
    db::relation::Projection,
    test_fixtures,
};

fn orders() -> QueryDefinitionBuilder {
    QueryDefinition::builder(test_fixtures::schema(), "orders")
}

#[test]
fn minimal_definition_builds() {
    let definition = orders().build().unwrap();

    assert_eq!(definition.entity(), "orders");
    assert_eq!(definition.primary_key(), "id");
    assert_eq!(definition.base_relation(), Relation::table("orders"));
    assert!(definition.declared_keys().is_empty());
}

#[test]
fn unknown_entity_is_rejected() {
    let err = QueryDefinition::builder(test_fixtures::schema(), "refunds")
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::unknown_entity("refunds"));
}

#[test]
fn parameter_keys_share_one_namespace() {
    let err = orders()
        .filter("status", "status")
        .param("status", ParamHandler::new())
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::duplicate("parameter key", "status"));

    let err = orders()
        .text_query(TextQuerySpec::new().key("page").fields("", ["number"]))
        .paginate(PaginationSpec::default())
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::duplicate("parameter key", "page"));
}

#[test]
fn filter_targets_must_resolve() {
    let err = orders()
        .filter("sku", "line_items.colour")
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::unknown_field("line_items", "colour"));

    let err = orders()
        .filter("x", "refunds.amount")
        .build()
        .unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownAssociation { .. }));
}

#[test]
fn text_fields_must_resolve() {
    let err = orders()
        .text_query(TextQuerySpec::new().fields("customer", ["nickname"]))
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::unknown_field("customers", "nickname"));
}

#[test]
fn text_fields_must_be_text() {
    let err = orders()
        .text_query(
            TextQuerySpec::new()
                .fields("", ["number"])
                .fields("line_items", ["sku", "amount"]),
        )
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        DefinitionError::NotTextField {
            entity: "line_items".to_string(),
            field: "amount".to_string(),
            kind: FieldKind::Int,
        }
    );
}

#[test]
fn filters_record_their_field_kind() {
    let definition = orders()
        .filter("sku", "line_items.sku")
        .filter("customer", "customer_id")
        .build()
        .unwrap();

    let kinds: Vec<Option<FieldKind>> = definition.filters().iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![Some(FieldKind::Text), Some(FieldKind::Int)]);
}

#[test]
fn cte_may_read_earlier_ctes_only() {
    let ok = orders()
        .cte("open_orders", |_| {
            Relation::table("orders").filter(ColumnRef::base("status").eq("open"))
        })
        .cte("open_ids", |_| Relation::named("open_orders"))
        .build();
    assert!(ok.is_ok());

    let err = orders()
        .cte("open_ids", |_| Relation::named("open_orders"))
        .cte("open_orders", |_| Relation::table("orders"))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        DefinitionError::UnknownRelation {
            name: "open_orders".to_string()
        }
    );
}

#[test]
fn cte_names_are_unique_and_tables_exist() {
    let err = orders()
        .cte("a", |_| Relation::table("orders"))
        .cte("a", |_| Relation::table("orders"))
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::duplicate("relation", "a"));

    let err = orders()
        .cte("a", |_| Relation::table("refunds"))
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::unknown_entity("refunds"));

    let err = orders()
        .aggregate(AggregateSpec::count("line_items", "item_count"))
        .cte("agg_line_items", |_| Relation::table("line_items"))
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::duplicate("relation", "agg_line_items"));
}

#[test]
fn cte_body_sees_default_bound_params_at_build() {
    let definition = orders()
        .param_with_default("state", "open", ParamHandler::new().otherwise_ignore())
        .cte("scoped", |params| {
            let state = params.value("state").cloned().unwrap_or(Value::Null);
            Relation::table("orders").filter(ColumnRef::base("status").eq(state))
        })
        .build();

    assert!(definition.is_ok());
}

#[test]
fn default_scope_predicate_is_checked() {
    let err = orders()
        .default_scope(ColumnRef::base("archived").eq(false))
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::unknown_field("orders", "archived"));

    let err = orders()
        .default_scope(ColumnRef::base("id").in_relation("ghost", "id"))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        DefinitionError::UnknownRelation {
            name: "ghost".to_string()
        }
    );
}

#[test]
fn handler_arm_predicates_are_checked() {
    let err = orders()
        .param(
            "carrier",
            ParamHandler::new().when("ups", ColumnRef::at("shipments", "courier").eq("ups")),
        )
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::unknown_field("shipments", "courier"));
}

#[test]
fn selection_accepts_fields_and_aggregate_aliases() {
    let definition = orders()
        .aggregate(AggregateSpec::sum("line_items", "amount", "total"))
        .select(["number", "total"])
        .build()
        .unwrap();
    assert_eq!(definition.selection(), &["number", "total"]);

    let err = orders().select(["colour"]).build().unwrap_err();
    assert_eq!(err, DefinitionError::unknown_field("orders", "colour"));
}

#[test]
fn preloads_resolve_and_reject_empty_paths() {
    let definition = orders()
        .preload("line_items.product")
        .build()
        .unwrap();
    assert_eq!(definition.preloads()[0].steps.len(), 2);

    let err = orders().preload("").build().unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownAssociation { .. }));
}

#[test]
fn sortable_names_map_to_columns_or_outputs() {
    let definition = orders()
        .aggregate(AggregateSpec::sum("line_items", "amount", "total"))
        .order_param(OrderParamSpec::new("sort", ["number", "total"]))
        .default_order("-total")
        .build()
        .unwrap();

    assert_eq!(
        definition.sort_key("number"),
        Some(&OrderKey::Column(ColumnRef::base("number")))
    );
    assert_eq!(
        definition.sort_key("total"),
        Some(&OrderKey::Output("total".to_string()))
    );
    assert_eq!(definition.sort_key("status"), None);
    assert_eq!(
        definition.default_order(),
        &[OrderTerm::output("total", OrderDirection::Desc)]
    );

    let err = orders()
        .order_param(OrderParamSpec::new("sort", ["colour"]))
        .build()
        .unwrap_err();
    assert_eq!(err, DefinitionError::unknown_field("orders", "colour"));
}

#[test]
fn duplicate_decoration_names_are_rejected() {
    let err = orders()
        .decorate_rows("label", |_| Value::Null)
        .decorate_rows("label", |_| Value::Null)
        .build()
        .unwrap_err();

    assert_eq!(err, DefinitionError::duplicate("row decoration", "label"));
}

#[test]
fn declared_keys_cover_every_declaration() {
    let definition = orders()
        .param_with_default("state", "open", ParamHandler::new().otherwise_ignore())
        .filter("sku", "line_items.sku")
        .text_query(TextQuerySpec::new().fields("", ["number"]))
        .order_param(OrderParamSpec::new("sort", ["number"]))
        .paginate(PaginationSpec::default())
        .build()
        .unwrap();

    let keys: Vec<&str> = definition.declared_keys().iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["state", "sku", "query", "sort", "page", "per_page"]);
    assert_eq!(
        definition.declared_keys()[0].1,
        Some(&Value::from("open"))
    );
}

#[test]
fn aggregate_plans_are_exposed() {
    let definition = orders()
        .aggregate(AggregateSpec::sum("line_items", "amount", "total"))
        .build()
        .unwrap();

    let projections = definition.aggregate_plans()[0].projections();
    assert!(matches!(
        &projections[0],
        Projection::Coalesce { alias, .. } if alias == "total"
    ));
}

#[test]
fn order_terms_parse_direction_prefixes() {
    assert_eq!(parse_order_term("-total"), ("total", OrderDirection::Desc));
    assert_eq!(parse_order_term("+number"), ("number", OrderDirection::Asc));
    assert_eq!(parse_order_term(" number "), ("number", OrderDirection::Asc));
}
