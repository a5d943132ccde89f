//! Domain types for the point-of-sale backend.
//!
//! Request payload types mirror the JSON the cashier front-end sends (camelCase
//! keys, `type` discriminators). Record types know how to lay themselves out as
//! store rows; the column positions live in [`crate::tabular`].

use crate::cell::{Cell, Row};
use crate::tabular::{
    cash_note_col, customer_col, product_col, service_col, transaction_col, Table,
};
use chrono::{DateTime, Utc};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stock value marking an item as unlimited (never decremented).
pub const UNLIMITED_STOCK: i64 = -1;

/// ID prefix that marks a cart line as a transient, not-yet-cataloged item.
pub const TRANSIENT_ID_PREFIX: &str = "custom-";

/// Category given to materialized custom items that carry none.
pub const DEFAULT_CUSTOM_CATEGORY: &str = "Custom";

/// Customer names that mean "no customer"; compared case-insensitively.
pub const ANONYMOUS_NAMES: [&str; 2] = ["anonymous", "anonim"];

// ============================================================================
// Value objects
// ============================================================================

/// Money amount in the smallest currency unit.
///
/// Deserializes from JSON integers and from integral floats (`5000.0`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create an amount
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Raw amount
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// Read an amount from a cell, treating non-numeric cells as zero.
    #[must_use]
    pub fn from_cell(cell: &Cell) -> Self {
        Self(cell.as_i64().unwrap_or(0))
    }

    /// Sum of two amounts, `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(amount) => Some(Self(amount)),
            None => None,
        }
    }

    /// Difference of two amounts, `None` on overflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(amount) => Some(Self(amount)),
            None => None,
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        integral(deserializer).map(Self)
    }
}

/// Deserialize a whole number sent either as a JSON integer or as a float
/// with no fractional part.
///
/// # Errors
///
/// Fails on fractional or out-of-range numbers and on non-numbers.
pub fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct IntegralVisitor;

    impl Visitor<'_> for IntegralVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a whole number")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
            i64::try_from(value).map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::float_cmp
        )]
        fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                Ok(value as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(value), &self))
            }
        }
    }

    deserializer.deserialize_any(IntegralVisitor)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Money> for Cell {
    fn from(value: Money) -> Self {
        Self::Integer(value.0)
    }
}

// ============================================================================
// Cart
// ============================================================================

/// Classification of a cart line item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Cataloged, stock-tracked product
    Product,
    /// Cataloged service
    Service,
    /// Ad-hoc item with no catalog identity yet
    Custom,
}

/// One line of a shopping cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog ID, or a transient marker for custom items
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Product, service or custom
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Unit price; catalog lines may omit it
    #[serde(default)]
    pub price: Money,
    /// Units sold
    #[serde(deserialize_with = "integral")]
    pub quantity: i64,
    /// Category, if known
    #[serde(default)]
    pub category: Option<String>,
}

impl LineItem {
    /// Whether this line still has to be materialized into the catalog.
    ///
    /// A line is transient when it is typed `custom`, has no ID, or carries
    /// an ID starting with [`TRANSIENT_ID_PREFIX`].
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ItemKind::Custom
            || self
                .id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty() || id.starts_with(TRANSIENT_ID_PREFIX))
    }

    /// Whether this line decrements tracked inventory.
    #[must_use]
    pub fn is_tracked_product(&self) -> bool {
        self.kind == ItemKind::Product && self.catalog_id().is_some()
    }

    /// The catalog ID, if the line has a usable one.
    #[must_use]
    pub fn catalog_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Payload of `recordTransaction`: a cart plus customer and payment metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Time of sale; the commit time is used when absent
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    /// Customer display name (blank or "anonymous" for walk-ins)
    #[serde(default)]
    pub customer_name: String,
    /// Customer reference code (a medical record number in clinic deployments)
    #[serde(default)]
    pub rme: Option<String>,
    /// Cart lines, in order
    pub items: Vec<LineItem>,
    /// Sum of line totals
    pub subtotal: Money,
    /// Discount applied to the subtotal
    #[serde(default)]
    pub discount: Money,
    /// Amount paid (`subtotal - discount`, computed by the caller)
    pub total: Money,
    /// Payment method label
    #[serde(default)]
    pub payment_method: String,
}

impl TransactionRequest {
    /// The customer reference code, if present and not blank.
    #[must_use]
    pub fn customer_ref(&self) -> Option<&str> {
        self.rme.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Key used to find the customer aggregate: reference code, else name.
    #[must_use]
    pub fn customer_key(&self) -> &str {
        self.customer_ref().unwrap_or(&self.customer_name)
    }

    /// Whether the sale belongs to an identifiable customer.
    #[must_use]
    pub fn has_customer(&self) -> bool {
        is_identified_customer(&self.customer_name)
    }
}

/// Whether a display name identifies a customer (not blank, not anonymous).
#[must_use]
pub fn is_identified_customer(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && !ANONYMOUS_NAMES
            .iter()
            .any(|sentinel| name.eq_ignore_ascii_case(sentinel))
}

// ============================================================================
// Records
// ============================================================================

/// One completed sale as written to the transactions table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction ID (`INV-<millis>`)
    pub id: String,
    /// Time of sale
    pub timestamp: DateTime<Utc>,
    /// Customer display name
    pub customer_name: String,
    /// Customer reference code
    pub customer_ref: Option<String>,
    /// Materialized cart lines
    pub items: Vec<LineItem>,
    /// Subtotal
    pub subtotal: Money,
    /// Discount
    pub discount: Money,
    /// Total
    pub total: Money,
    /// Payment method
    pub payment_method: String,
    /// Operator tag
    pub operator: String,
}

impl TransactionRecord {
    /// Lay the record out as a transactions row.
    ///
    /// # Errors
    ///
    /// Returns an error if the line items cannot be encoded as JSON.
    pub fn to_row(&self) -> Result<Row, serde_json::Error> {
        let mut row = vec![Cell::Empty; Table::Transactions.width()];
        row[transaction_col::ID] = Cell::text(&self.id);
        row[transaction_col::TIMESTAMP] = Cell::Timestamp(self.timestamp);
        row[transaction_col::CUSTOMER_NAME] = Cell::text(&self.customer_name);
        row[transaction_col::CUSTOMER_REF] = Cell::optional_text(self.customer_ref.as_deref());
        row[transaction_col::ITEMS] = Cell::Text(serde_json::to_string(&self.items)?);
        row[transaction_col::SUBTOTAL] = self.subtotal.into();
        row[transaction_col::DISCOUNT] = self.discount.into();
        row[transaction_col::TOTAL] = self.total.into();
        row[transaction_col::PAYMENT_METHOD] = Cell::text(&self.payment_method);
        row[transaction_col::OPERATOR] = Cell::text(&self.operator);
        Ok(row)
    }
}

/// Stock-tracked catalog item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID
    pub id: String,
    /// Name
    pub name: String,
    /// Category
    pub category: String,
    /// Units on hand, or [`UNLIMITED_STOCK`]
    pub stock: i64,
    /// Sale price
    pub price: Money,
    /// Cost price
    pub buy_price: Money,
    /// Low-stock notification threshold
    pub low_stock: i64,
}

impl Product {
    /// Whether the product is exempt from stock decrements.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.stock == UNLIMITED_STOCK
    }

    /// Lay the product out as a products row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = vec![Cell::Empty; Table::Products.width()];
        row[product_col::ID] = Cell::text(&self.id);
        row[product_col::NAME] = Cell::text(&self.name);
        row[product_col::CATEGORY] = Cell::text(&self.category);
        row[product_col::STOCK] = Cell::Integer(self.stock);
        row[product_col::PRICE] = self.price.into();
        row[product_col::COST_PRICE] = self.buy_price.into();
        row[product_col::LOW_STOCK] = Cell::Integer(self.low_stock);
        row
    }

    /// Read a product back from a row. Non-numeric numbers read as zero.
    #[must_use]
    pub fn from_row(row: &[Cell]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            id: cell(product_col::ID).to_string(),
            name: cell(product_col::NAME).to_string(),
            category: cell(product_col::CATEGORY).to_string(),
            stock: cell(product_col::STOCK).as_i64().unwrap_or(0),
            price: Money::from_cell(&cell(product_col::PRICE)),
            buy_price: Money::from_cell(&cell(product_col::COST_PRICE)),
            low_stock: cell(product_col::LOW_STOCK).as_i64().unwrap_or(0),
        }
    }
}

/// Catalog service (never stock-tracked).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service ID
    pub id: String,
    /// Name
    pub name: String,
    /// Category
    pub category: String,
    /// Price
    pub price: Money,
}

impl Service {
    /// Lay the service out as a services row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = vec![Cell::Empty; Table::Services.width()];
        row[service_col::ID] = Cell::text(&self.id);
        row[service_col::NAME] = Cell::text(&self.name);
        row[service_col::CATEGORY] = Cell::text(&self.category);
        row[service_col::PRICE] = self.price.into();
        row
    }

    /// Read a service back from a row. A non-numeric price reads as zero.
    #[must_use]
    pub fn from_row(row: &[Cell]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            id: cell(service_col::ID).to_string(),
            name: cell(service_col::NAME).to_string(),
            category: cell(service_col::CATEGORY).to_string(),
            price: Money::from_cell(&cell(service_col::PRICE)),
        }
    }
}

/// Catalog entry as presented to clients, tagged with its `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogItem {
    /// Product entry
    Product(Product),
    /// Service entry
    Service(Service),
}

/// Which catalog table a catalog request addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// The products table
    Product,
    /// The services table
    Service,
}

impl CatalogKind {
    /// Backing table
    #[must_use]
    pub const fn table(self) -> Table {
        match self {
            Self::Product => Table::Products,
            Self::Service => Table::Services,
        }
    }

    /// Prefix of newly minted IDs
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Product => "P",
            Self::Service => "L",
        }
    }
}

/// `itemData` of a `saveItem` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemInput {
    /// Existing ID to update; absent or unknown IDs create a new entry
    #[serde(default)]
    pub id: Option<String>,
    /// Name
    pub name: String,
    /// Category
    #[serde(default)]
    pub category: String,
    /// Stock (products only)
    #[serde(default)]
    pub stock: Option<i64>,
    /// Sale price
    pub price: Money,
    /// Cost price (products only)
    #[serde(default)]
    pub buy_price: Option<Money>,
    /// Low-stock threshold (products only)
    #[serde(default)]
    pub low_stock: Option<i64>,
}

/// Running totals for one customer key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    /// Display name at first visit
    pub name: String,
    /// Matching key (reference code, else name)
    pub key: String,
    /// Number of visits; equals `history.len()`
    pub visits: i64,
    /// Cumulative spend
    pub total_spend: Money,
    /// Transaction IDs, oldest first
    pub history: Vec<String>,
    /// First visit
    pub first_seen: DateTime<Utc>,
    /// Latest visit
    pub last_seen: DateTime<Utc>,
}

impl CustomerAggregate {
    /// Aggregate for a customer's first transaction.
    #[must_use]
    pub fn first_visit(
        name: impl Into<String>,
        key: impl Into<String>,
        transaction_id: impl Into<String>,
        total: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            visits: 1,
            total_spend: total,
            history: vec![transaction_id.into()],
            first_seen: now,
            last_seen: now,
        }
    }

    /// Lay the aggregate out as a customers row.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be encoded as JSON.
    pub fn to_row(&self) -> Result<Row, serde_json::Error> {
        let mut row = vec![Cell::Empty; Table::Customers.width()];
        row[customer_col::NAME] = Cell::text(&self.name);
        row[customer_col::KEY] = Cell::text(&self.key);
        row[customer_col::VISITS] = Cell::Integer(self.visits);
        row[customer_col::TOTAL_SPEND] = self.total_spend.into();
        row[customer_col::HISTORY] = encode_history(&self.history)?;
        row[customer_col::FIRST_SEEN] = Cell::Timestamp(self.first_seen);
        row[customer_col::LAST_SEEN] = Cell::Timestamp(self.last_seen);
        Ok(row)
    }
}

/// Encode a transaction history list for storage.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn encode_history(history: &[String]) -> Result<Cell, serde_json::Error> {
    Ok(Cell::Text(serde_json::to_string(history)?))
}

/// Decode a stored transaction history list.
///
/// Absent or unparseable values decode as an empty history.
#[must_use]
pub fn decode_history(cell: &Cell) -> Vec<String> {
    cell.as_str()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Direction of a cash note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashNoteKind {
    /// Cash into the till
    In,
    /// Cash out of the till
    Out,
}

impl CashNoteKind {
    /// Wire label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for CashNoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `recordCashNote`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashNoteRequest {
    /// Time of the note; the recording time is used when absent
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    /// In or out
    #[serde(rename = "type")]
    pub kind: CashNoteKind,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Amount moved
    pub amount: Money,
}

/// One cash note as written to the cash notes table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashNote {
    /// Note ID (`NOTE-<millis>`)
    pub id: String,
    /// Time of the note
    pub timestamp: DateTime<Utc>,
    /// In or out
    pub kind: CashNoteKind,
    /// Description
    pub description: String,
    /// Amount
    pub amount: Money,
}

impl CashNote {
    /// Lay the note out as a cash notes row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = vec![Cell::Empty; Table::CashNotes.width()];
        row[cash_note_col::ID] = Cell::text(&self.id);
        row[cash_note_col::TIMESTAMP] = Cell::Timestamp(self.timestamp);
        row[cash_note_col::KIND] = Cell::text(self.kind.as_str());
        row[cash_note_col::DESCRIPTION] = Cell::text(&self.description);
        row[cash_note_col::AMOUNT] = self.amount.into();
        row
    }
}
