//! Shared order-book schema and seeded store for unit tests.

use crate::{
    db::store::MemoryStore,
    model::{EntityModel, FieldKind, Schema},
    value::Record,
};
use std::sync::Arc;

pub(crate) fn schema() -> Arc<Schema> {
    let schema = Schema::new([
        EntityModel::new("customers", "id")
            .field("name", FieldKind::Text)
            .field("email", FieldKind::Text)
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
            .field("quantity", FieldKind::Int)
            .belongs_to("order", "orders", "order_id")
            .belongs_to("product", "products", "product_id"),
        EntityModel::new("products", "id")
            .field("name", FieldKind::Text)
            .field("category", FieldKind::Text),
        EntityModel::new("shipments", "id")
            .field("order_id", FieldKind::Int)
            .field("carrier", FieldKind::Text)
            .field("status", FieldKind::Text)
            .has_many("packages", "packages", "shipment_id"),
        EntityModel::new("packages", "id")
            .field("shipment_id", FieldKind::Int)
            .field("weight", FieldKind::Int),
    ])
    .expect("fixture schema is valid");

    Arc::new(schema)
}

pub(crate) fn store() -> MemoryStore {
    let mut store = MemoryStore::new();

    store.insert_all(
        "customers",
        [
            customer(1, "Ada Lovelace", "ada@example.com", "eu"),
            customer(2, "Grace Hopper", "grace@navy.mil", "us"),
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
    store.insert_all(
        "packages",
        [package(1, 1, 2), package(2, 1, 3), package(3, 2, 4), package(4, 3, 10)],
    );

    store
}

fn customer(id: i64, name: &str, email: &str, region: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("email", email)
        .with("region", region)
}

fn order(id: i64, number: &str, status: &str, customer_id: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("number", number)
        .with("status", status)
        .with("customer_id", customer_id)
}

fn line_item(id: i64, order_id: i64, product_id: i64, sku: &str, amount: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("order_id", order_id)
        .with("product_id", product_id)
        .with("sku", sku)
        .with("amount", amount)
        .with("quantity", 1)
}

fn product(id: i64, name: &str, category: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("category", category)
}

fn shipment(id: i64, order_id: i64, carrier: &str, status: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("order_id", order_id)
        .with("carrier", carrier)
        .with("status", status)
}

fn package(id: i64, shipment_id: i64, weight: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("shipment_id", shipment_id)
        .with("weight", weight)
}
