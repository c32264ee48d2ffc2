//! Order-book schema and seeded store shared by the integration tests.
#![allow(dead_code)]

use quarry_core::{
    db::store::MemoryStore,
    model::{EntityModel, FieldKind, Schema},
    value::{Record, Value},
};
use std::sync::Arc;

pub fn schema() -> Arc<Schema> {
    let schema = Schema::new([
        EntityModel::new("customers", "id")
            .field("name", FieldKind::Text)
            .field("region", FieldKind::Text)
            .has_many("orders", "orders", "customer_id"),
        EntityModel::new("orders", "id")
            .field("number", FieldKind::Text)
            .field("status", FieldKind::Text)
            .field("customer_id", FieldKind::Int)
            .belongs_to("customer", "customers", "customer_id")
            .has_many("line_items", "line_items", "order_id")
            .has_many("shipments", "shipments", "order_id"),
        EntityModel::new("line_items", "id")
            .field("order_id", FieldKind::Int)
            .field("product_id", FieldKind::Int)
            .field("sku", FieldKind::Text)
            .field("amount", FieldKind::Int)
            .belongs_to("product", "products", "product_id"),
        EntityModel::new("products", "id")
            .field("name", FieldKind::Text)
            .field("category", FieldKind::Text),
        EntityModel::new("shipments", "id")
            .field("order_id", FieldKind::Int)
            .field("carrier", FieldKind::Text)
            .field("status", FieldKind::Text),
    ])
    .expect("fixture schema is valid");

    Arc::new(schema)
}

/// Orders 1..=3: order 1 has items {10, 20, 30}, order 2 has {5, 7}, order 3
/// has none.
pub fn store() -> MemoryStore {
    let mut store = MemoryStore::new();

    store.insert_all(
        "customers",
        [
            Record::new().with("id", 1).with("name", "Ada Lovelace").with("region", "eu"),
            Record::new().with("id", 2).with("name", "Grace Hopper").with("region", "us"),
        ],
    );
    store.insert_all(
        "orders",
        [
            order(1, "A-1", "open", 1),
            order(2, "A-2", "shipped", 2),
            order(3, "A-3", "open", 1),
        ],
    );
    store.insert_all(
        "line_items",
        [
            line_item(1, 1, 1, "RED", 10),
            line_item(2, 1, 2, "BLUE", 20),
            line_item(3, 1, 3, "GREEN", 30),
            line_item(4, 2, 1, "RED", 5),
            line_item(5, 2, 2, "BLUE", 7),
        ],
    );
    store.insert_all(
        "products",
        [
            product(1, "Red Widget", "widgets"),
            product(2, "Blue Gadget", "gadgets"),
            product(3, "Green Widget", "widgets"),
        ],
    );
    store.insert_all(
        "shipments",
        [
            shipment(1, 1, "ups", "delivered"),
            shipment(2, 1, "dhl", "pending"),
            shipment(3, 2, "ups", "pending"),
        ],
    );

    store
}

pub fn order(id: i64, number: &str, status: &str, customer_id: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("number", number)
        .with("status", status)
        .with("customer_id", customer_id)
}

pub fn line_item(id: i64, order_id: i64, product_id: i64, sku: &str, amount: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("order_id", order_id)
        .with("product_id", product_id)
        .with("sku", sku)
        .with("amount", amount)
}

pub fn product(id: i64, name: &str, category: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("category", category)
}

pub fn shipment(id: i64, order_id: i64, carrier: &str, status: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("order_id", order_id)
        .with("carrier", carrier)
        .with("status", status)
}

/// Integer ids of `rows`, sorted.
pub fn sorted_ids(rows: &[Record]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().filter_map(|row| row.value("id").as_int()).collect();
    ids.sort_unstable();
    ids
}

pub fn int(value: &Value) -> i64 {
    value.as_int().expect("integer value")
}
