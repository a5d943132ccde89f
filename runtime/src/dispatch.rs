//! Request envelope and action parsing.
//!
//! Clients send `{action, payload}` and always receive either
//! `{status: "success", data}` or `{status: "error", error}`.

use crate::reports::DateRangeQuery;
use kasir_core::error::PosError;
use kasir_core::tabular::Table;
use kasir_core::types::{CashNoteRequest, CatalogItemInput, CatalogKind, TransactionRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Action name, e.g. `recordTransaction`
    pub action: String,
    /// Action-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RequestEnvelope {
    /// Build an envelope.
    #[must_use]
    pub fn new(action: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

/// Outgoing response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    /// The action succeeded
    Success {
        /// Action result
        data: serde_json::Value,
    },
    /// The action failed; `error` is the first error encountered
    Error {
        /// Human-readable message
        error: String,
    },
}

impl ResponseEnvelope {
    /// Wrap a result.
    #[must_use]
    pub fn from_result(result: Result<serde_json::Value, PosError>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(error) => Self::Error {
                error: error.to_string(),
            },
        }
    }

    /// Whether this is a success response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Status label.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetPayload {
    #[serde(default)]
    sheet_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavePayload {
    item_data: CatalogItemInput,
    #[serde(rename = "type")]
    kind: CatalogKind,
}

#[derive(Deserialize)]
struct DeletePayload {
    id: String,
    #[serde(rename = "type")]
    kind: CatalogKind,
}

/// A parsed, typed action.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Catalog plus raw history
    GetInitialData,
    /// Commit a sale
    RecordTransaction(TransactionRequest),
    /// Raw rows of one table
    GetSheetData(Table),
    /// Create or update a catalog entry
    SaveItem {
        /// Products or services
        kind: CatalogKind,
        /// Entry fields
        input: CatalogItemInput,
    },
    /// Delete a catalog entry
    DeleteItem {
        /// Products or services
        kind: CatalogKind,
        /// Entry ID
        id: String,
    },
    /// Append a cash note
    RecordCashNote(CashNoteRequest),
    /// Rows of a timestamped table within a date range
    GetFilteredData(DateRangeQuery),
    /// Location of the backing store
    GetSpreadsheetUrl,
}

fn payload<T: DeserializeOwned>(action: &str, value: serde_json::Value) -> Result<T, PosError> {
    serde_json::from_value(value)
        .map_err(|e| PosError::validation(format!("invalid payload for {action}: {e}")))
}

impl Action {
    /// Parse an envelope into an action.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown action, a payload that does not match the
    /// action, or an unknown table name.
    pub fn parse(envelope: RequestEnvelope) -> Result<Self, PosError> {
        let RequestEnvelope { action, payload: body } = envelope;
        let name = action.as_str();
        match name {
            "getInitialData" => Ok(Self::GetInitialData),
            "recordTransaction" => Ok(Self::RecordTransaction(payload(name, body)?)),
            "getSheetData" => {
                let SheetPayload { sheet_name } = payload(name, body)?;
                let sheet_name =
                    sheet_name.ok_or_else(|| PosError::validation("sheetName is required"))?;
                Ok(Self::GetSheetData(sheet_name.parse()?))
            },
            "saveItem" => {
                let SavePayload { item_data, kind } = payload(name, body)?;
                Ok(Self::SaveItem { kind, input: item_data })
            },
            "deleteItem" => {
                let DeletePayload { id, kind } = payload(name, body)?;
                Ok(Self::DeleteItem { kind, id })
            },
            "recordCashNote" => Ok(Self::RecordCashNote(payload(name, body)?)),
            "getFilteredData" => Ok(Self::GetFilteredData(payload(name, body)?)),
            "getSpreadsheetUrl" => Ok(Self::GetSpreadsheetUrl),
            other => Err(PosError::validation(format!("invalid action: {other}"))),
        }
    }

    /// Wire name of the action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetInitialData => "getInitialData",
            Self::RecordTransaction(_) => "recordTransaction",
            Self::GetSheetData(_) => "getSheetData",
            Self::SaveItem { .. } => "saveItem",
            Self::DeleteItem { .. } => "deleteItem",
            Self::RecordCashNote(_) => "recordCashNote",
            Self::GetFilteredData(_) => "getFilteredData",
            Self::GetSpreadsheetUrl => "getSpreadsheetUrl",
        }
    }

    /// Whether the action writes to the store and must hold the request lock.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::RecordTransaction(_)
                | Self::SaveItem { .. }
                | Self::DeleteItem { .. }
                | Self::RecordCashNote(_)
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use kasir_core::types::{CashNoteKind, ItemKind, Money};
    use serde_json::json;

    fn parse(action: &str, payload: serde_json::Value) -> Result<Action, PosError> {
        Action::parse(RequestEnvelope::new(action, payload))
    }

    #[test]
    fn parses_record_transaction() {
        let action = parse(
            "recordTransaction",
            json!({
                "customerName": "Budi",
                "items": [
                    {"id": "P1", "type": "product", "name": "Soap", "price": 12000, "quantity": 2}
                ],
                "subtotal": 24000,
                "discount": 0,
                "total": 24000,
                "paymentMethod": "cash"
            }),
        )
        .unwrap();

        let Action::RecordTransaction(request) = action else {
            unreachable!("wrong action");
        };
        assert_eq!(request.items[0].kind, ItemKind::Product);
        assert_eq!(request.total, Money::new(24_000));
    }

    #[test]
    fn accepts_catalog_lines_without_price() {
        let action = parse(
            "recordTransaction",
            json!({
                "customerName": "Budi",
                "items": [{"id": "P1", "type": "product", "quantity": 2}],
                "subtotal": 24000,
                "total": 24000
            }),
        )
        .unwrap();

        let Action::RecordTransaction(request) = action else {
            unreachable!("wrong action");
        };
        assert_eq!(request.items[0].id.as_deref(), Some("P1"));
        assert_eq!(request.items[0].price, Money::ZERO);
        assert_eq!(request.items[0].quantity, 2);
    }

    #[test]
    fn accepts_integral_float_amounts() {
        let action = parse(
            "recordTransaction",
            json!({
                "customerName": "",
                "items": [
                    {
                        "id": "custom-1",
                        "type": "custom",
                        "name": "Gift Wrap",
                        "price": 5000.0,
                        "quantity": 1.0
                    }
                ],
                "subtotal": 5000.0,
                "discount": 0.0,
                "total": 5000.0
            }),
        )
        .unwrap();

        let Action::RecordTransaction(request) = action else {
            unreachable!("wrong action");
        };
        assert_eq!(request.items[0].price, Money::new(5000));
        assert_eq!(request.items[0].quantity, 1);
        assert_eq!(request.total, Money::new(5000));

        assert!(matches!(
            parse(
                "recordTransaction",
                json!({
                    "items": [{"id": "P1", "type": "product", "quantity": 1.5}],
                    "subtotal": 0,
                    "total": 0
                })
            ),
            Err(PosError::Validation(_))
        ));
    }

    #[test]
    fn parses_cash_note_and_catalog_actions() {
        assert!(matches!(
            parse("recordCashNote", json!({"type": "out", "description": "Ice", "amount": 8000}))
                .unwrap(),
            Action::RecordCashNote(CashNoteRequest { kind: CashNoteKind::Out, .. })
        ));
        assert_eq!(
            parse("deleteItem", json!({"id": "L1", "type": "service"})).unwrap(),
            Action::DeleteItem { kind: CatalogKind::Service, id: "L1".to_string() }
        );
        assert!(matches!(
            parse(
                "saveItem",
                json!({"type": "product", "itemData": {"name": "Soap", "price": 1000}})
            )
            .unwrap(),
            Action::SaveItem { kind: CatalogKind::Product, .. }
        ));
        assert_eq!(
            parse("getSheetData", json!({"sheetName": "cash_notes"})).unwrap(),
            Action::GetSheetData(Table::CashNotes)
        );
    }

    #[test]
    fn read_actions_ignore_payload() {
        assert_eq!(
            parse("getInitialData", serde_json::Value::Null).unwrap(),
            Action::GetInitialData
        );
        assert_eq!(parse("getSpreadsheetUrl", json!({})).unwrap(), Action::GetSpreadsheetUrl);
    }

    #[test]
    fn rejects_bad_requests() {
        assert_eq!(
            parse("launchRocket", json!({})),
            Err(PosError::validation("invalid action: launchRocket"))
        );
        assert!(matches!(parse("recordTransaction", json!({})), Err(PosError::Validation(_))));
        assert!(matches!(parse("getSheetData", json!({})), Err(PosError::Validation(_))));
        assert!(matches!(
            parse("getSheetData", json!({"sheetName": "Transaksi"})),
            Err(PosError::Validation(_))
        ));
        assert!(matches!(
            parse("deleteItem", json!({"id": "X", "type": "gadget"})),
            Err(PosError::Validation(_))
        ));
    }

    #[test]
    fn mutating_actions() {
        assert!(parse("deleteItem", json!({"id": "L1", "type": "service"})).unwrap().is_mutating());
        assert!(!Action::GetInitialData.is_mutating());
        assert!(!Action::GetSheetData(Table::Products).is_mutating());
    }

    #[test]
    fn response_wire_format() {
        let ok = ResponseEnvelope::from_result(Ok(json!("INV-1")));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "data": "INV-1"})
        );

        let err = ResponseEnvelope::from_result(Err(PosError::not_found("item L9")));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"status": "error", "error": "Not found: item L9"})
        );
        assert_eq!(err.status(), "error");
    }
}
