//! Cash note recording.
//!
//! Cash in/out notes are independent append-only rows. They share nothing with
//! the commit pipeline except the request lock.

use crate::metrics;
use chrono::{DateTime, Utc};
use kasir_core::environment::IdGenerator;
use kasir_core::error::PosError;
use kasir_core::tabular::{Table, TabularStore};
use kasir_core::types::{CashNote, CashNoteRequest};

/// Prefix of cash note IDs.
pub const CASH_NOTE_ID_PREFIX: &str = "NOTE-";

/// Append one cash note.
///
/// The note time is the request's `datetime`, or `now` when absent.
///
/// # Errors
///
/// - `StoreUnavailable`: the cash notes table does not exist
/// - `Store`: the append failed
pub async fn record_cash_note(
    store: &dyn TabularStore,
    ids: &dyn IdGenerator,
    request: CashNoteRequest,
    now: DateTime<Utc>,
) -> Result<CashNote, PosError> {
    let note = CashNote {
        id: ids.next_id(CASH_NOTE_ID_PREFIX),
        timestamp: request.datetime.unwrap_or(now),
        kind: request.kind,
        description: request.description,
        amount: request.amount,
    };
    store.append_row(Table::CashNotes, note.to_row()).await?;

    metrics::record_cash_note();
    tracing::info!(
        note_id = %note.id,
        kind = %note.kind,
        amount = %note.amount,
        "Cash note recorded"
    );
    Ok(note)
}

/// Confirmation message returned to the client.
#[must_use]
pub fn confirmation(note: &CashNote) -> String {
    format!("{} note saved.", note.kind)
}
