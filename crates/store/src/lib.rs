//! SQLite persistence for Bruin.
//!
//! Two tables share one database file:
//! - `alarms` — scheduled alarms, swept by the scheduler
//! - `user_contexts` — per-user identity and bounded chat history
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microsecond precision,
//! UTC `Z` suffix) so string comparison in SQL matches chronological order.

mod alarms;
mod user_context;

pub use alarms::{AlarmSweep, SqliteAlarmStore};
pub use user_context::SqliteContextStore;

use bruin_core::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Open (creating if necessary) the SQLite database at `path`.
///
/// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for
/// tests).
pub async fn connect(path: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(path)
        .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

    info!("SQLite database opened at {path}");
    Ok(pool)
}

/// Encode a UTC instant as fixed-width RFC 3339 text for storage.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored RFC 3339 timestamp.
pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::MalformedRow(format!("bad timestamp {raw:?}: {e}")))
}
