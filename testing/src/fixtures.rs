//! Row and request builders for tests.
//!
//! Values are fixed so assertions can name them: products sell at 12 000 and
//! cost 9 000, every seeded timestamp is the [`test_clock`](crate::test_clock)
//! instant.

use crate::mocks::test_clock;
use kasir_core::cell::{Cell, Row};
use kasir_core::environment::Clock;
use kasir_core::tabular::{Table, customer_col};
use kasir_core::types::{ItemKind, LineItem, Money, Product, Service, TransactionRequest};

/// Unit price of [`product_line`] and [`product_row`].
pub const PRODUCT_PRICE: i64 = 12_000;

/// A products row with the given ID and stock.
#[must_use]
pub fn product_row(id: &str, stock: i64) -> Row {
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        category: "General".to_string(),
        stock,
        price: Money::new(PRODUCT_PRICE),
        buy_price: Money::new(9_000),
        low_stock: 2,
    }
    .to_row()
}

/// A services row with the given ID and price.
#[must_use]
pub fn service_row(id: &str, price: i64) -> Row {
    Service {
        id: id.to_string(),
        name: format!("Service {id}"),
        category: "General".to_string(),
        price: Money::new(price),
    }
    .to_row()
}

/// A customers row.
#[must_use]
pub fn customer_row(name: &str, key: &str, visits: i64, spend: i64, history: &[&str]) -> Row {
    let seen = test_clock().now();
    let mut row = vec![Cell::Empty; Table::Customers.width()];
    row[customer_col::NAME] = Cell::text(name);
    row[customer_col::KEY] = Cell::text(key);
    row[customer_col::VISITS] = Cell::Integer(visits);
    row[customer_col::TOTAL_SPEND] = Cell::Integer(spend);
    row[customer_col::HISTORY] = Cell::Text(serde_json::to_string(history).unwrap_or_default());
    row[customer_col::FIRST_SEEN] = Cell::Timestamp(seen);
    row[customer_col::LAST_SEEN] = Cell::Timestamp(seen);
    row
}

/// A cart line for a cataloged product.
#[must_use]
pub fn product_line(id: &str, quantity: i64) -> LineItem {
    LineItem {
        id: Some(id.to_string()),
        name: format!("Product {id}"),
        kind: ItemKind::Product,
        price: Money::new(PRODUCT_PRICE),
        quantity,
        category: Some("General".to_string()),
    }
}

/// A cart line for a cataloged service.
#[must_use]
pub fn service_line(id: &str, price: i64) -> LineItem {
    LineItem {
        id: Some(id.to_string()),
        name: format!("Service {id}"),
        kind: ItemKind::Service,
        price: Money::new(price),
        quantity: 1,
        category: Some("General".to_string()),
    }
}

/// A custom (ad-hoc) cart line.
#[must_use]
pub fn custom_line(transient_id: Option<&str>, name: &str, price: i64) -> LineItem {
    LineItem {
        id: transient_id.map(str::to_string),
        name: name.to_string(),
        kind: ItemKind::Custom,
        price: Money::new(price),
        quantity: 1,
        category: None,
    }
}

/// A cart with no discount, paid in cash.
#[must_use]
pub fn transaction_request(
    customer_name: &str,
    rme: Option<&str>,
    total: i64,
    items: Vec<LineItem>,
) -> TransactionRequest {
    TransactionRequest {
        datetime: None,
        customer_name: customer_name.to_string(),
        rme: rme.map(str::to_string),
        items,
        subtotal: Money::new(total),
        discount: Money::ZERO,
        total: Money::new(total),
        payment_method: "cash".to_string(),
    }
}
