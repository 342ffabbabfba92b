//! SQLite pools for the embedded stores (report index and settings).

use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Text format of timestamps stored in the embedded databases.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opens (creating if needed) the SQLite database at `path`.
pub async fn open_file(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
}

/// Opens a private in-memory database.
///
/// The pool holds a single connection that never expires, since every SQLite
/// memory connection is its own database.
pub async fn open_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Current local time truncated to seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    NaiveDateTime::parse_from_str(&now.format(TIMESTAMP_FORMAT).to_string(), TIMESTAMP_FORMAT)
        .unwrap_or(now)
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp; accepts a bare date and fractional seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_at_second_precision() {
        let now = now();
        assert_eq!(parse_timestamp(&format_timestamp(now)), Some(now));
    }

    #[test]
    fn legacy_timestamp_shapes_are_accepted() {
        let midnight = parse_timestamp("2024-03-04").unwrap();
        assert_eq!(format_timestamp(midnight), "2024-03-04 00:00:00");
        assert!(parse_timestamp("2024-03-04 10:11:12.345678").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
