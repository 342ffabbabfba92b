//! Index of generated report artifacts.
//!
//! One row per artifact filename. Recording the same filename again replaces
//! the previous row, so the index always describes the latest artifact on disk.
//! Rows are never deleted here. Amounts are stored as decimal text.

use std::path::Path;

use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Transaction};

use crate::db;
use crate::model::{parse_money, AggregateSummary, ReportRecord};
use crate::period::{iso_week_range, ReportType};

/// Filename of the index database inside the reports directory.
pub const INDEX_FILENAME: &str = "reports.db";

/// Number of records [`ReportIndex::list`] returns when callers have no preference.
pub const DEFAULT_LIST_LIMIT: u32 = 60;

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT UNIQUE NOT NULL,
    report_type TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    generated_date TEXT NOT NULL,
    total_stand_value TEXT NOT NULL DEFAULT '0',
    total_stands_sold INTEGER NOT NULL DEFAULT 0,
    total_stands_available INTEGER NOT NULL DEFAULT 0,
    total_deposit TEXT NOT NULL DEFAULT '0',
    total_installment TEXT NOT NULL DEFAULT '0'
)";

const UPSERT: &str = "\
INSERT OR REPLACE INTO reports (
    filename, report_type, start_date, end_date, generated_date,
    total_stand_value, total_stands_sold, total_stands_available,
    total_deposit, total_installment
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SELECT_COLUMNS: &str = "\
SELECT filename, report_type, start_date, end_date, generated_date,
       CAST(total_stand_value AS TEXT) AS total_stand_value,
       total_stands_sold, total_stands_available,
       CAST(total_deposit AS TEXT) AS total_deposit,
       CAST(total_installment AS TEXT) AS total_installment
FROM reports";

#[derive(FromRow)]
struct RecordRow {
    filename: String,
    report_type: String,
    start_date: String,
    end_date: String,
    generated_date: String,
    total_stand_value: Option<String>,
    total_stands_sold: Option<i64>,
    total_stands_available: Option<i64>,
    total_deposit: Option<String>,
    total_installment: Option<String>,
}

impl RecordRow {
    fn into_record(self) -> Option<ReportRecord> {
        let parse_date = |value: &str| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
        let record = ReportRecord {
            report_type: self.report_type.parse::<ReportType>().ok()?,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            generated_date: db::parse_timestamp(&self.generated_date)?,
            summary: AggregateSummary {
                total_stand_value: stored_money(self.total_stand_value.as_deref())?,
                total_stands_sold: self.total_stands_sold.unwrap_or(0),
                total_stands_available: self.total_stands_available.unwrap_or(0),
                total_deposit: stored_money(self.total_deposit.as_deref())?,
                total_installment: stored_money(self.total_installment.as_deref())?,
            },
            filename: self.filename,
        };
        Some(record)
    }
}

#[derive(FromRow)]
struct LegacyRow {
    filename: String,
    year: Option<i64>,
    week_number: Option<i64>,
    generated_date: Option<String>,
    total_stand_value: Option<String>,
    total_stands_sold: Option<i64>,
    total_stands_available: Option<i64>,
    total_deposit: Option<String>,
    total_installment: Option<String>,
}

impl LegacyRow {
    fn summary(&self) -> Option<AggregateSummary> {
        Some(AggregateSummary {
            total_stand_value: stored_money(self.total_stand_value.as_deref())?,
            total_stands_sold: self.total_stands_sold.unwrap_or(0),
            total_stands_available: self.total_stands_available.unwrap_or(0),
            total_deposit: stored_money(self.total_deposit.as_deref())?,
            total_installment: stored_money(self.total_installment.as_deref())?,
        })
    }
}

/// An index write that only becomes visible once committed.
///
/// Dropping it without calling [`PendingRecord::commit`] rolls the write back.
pub struct PendingRecord {
    tx: Transaction<'static, Sqlite>,
}

impl PendingRecord {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

/// SQLite-backed report index.
#[derive(Clone)]
pub struct ReportIndex {
    pool: SqlitePool,
}

impl ReportIndex {
    /// Opens the index stored in `reports_dir`, creating it if needed.
    pub async fn open_in(reports_dir: &Path) -> Result<Self, sqlx::Error> {
        Self::open(&reports_dir.join(INDEX_FILENAME)).await
    }

    /// Opens the index database at `path`, creating it if needed.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        Self::from_pool(db::open_file(path).await?).await
    }

    /// Opens a throwaway in-memory index.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::from_pool(db::open_memory().await?).await
    }

    /// Uses an existing pool; creates the table and migrates a legacy one.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let index = Self { pool };
        if index.has_legacy_schema().await? {
            index.migrate_legacy().await?;
        }
        sqlx::query(CREATE_TABLE).execute(&index.pool).await?;
        Ok(index)
    }

    /// Inserts `record`, replacing any row with the same filename.
    pub async fn record(&self, record: &ReportRecord) -> Result<(), sqlx::Error> {
        upsert(&self.pool, record).await
    }

    /// Writes `record` inside a transaction that the caller commits.
    pub async fn stage(&self, record: &ReportRecord) -> Result<PendingRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        upsert(&mut *tx, record).await?;
        Ok(PendingRecord { tx })
    }

    /// Up to `limit` records, newest first.
    pub async fn list(&self, limit: u32) -> Result<Vec<ReportRecord>, sqlx::Error> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "{} ORDER BY generated_date DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(convert).collect())
    }

    /// The record for `filename`, if indexed.
    pub async fn get(&self, filename: &str) -> Result<Option<ReportRecord>, sqlx::Error> {
        let row: Option<RecordRow> =
            sqlx::query_as(&format!("{} WHERE filename = ?", SELECT_COLUMNS))
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(convert))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn has_legacy_schema(&self) -> Result<bool, sqlx::Error> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('reports')")
                .fetch_all(&self.pool)
                .await?;
        Ok(columns.iter().any(|name| name == "week_number"))
    }

    /// Rewrites a `year`/`week_number` table into the date-range schema.
    ///
    /// Every legacy row becomes a weekly record for its ISO week. Rows whose
    /// week does not exist are dropped with a warning.
    async fn migrate_legacy(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let legacy: Vec<LegacyRow> = sqlx::query_as(
            "SELECT filename, year, week_number, CAST(generated_date AS TEXT) AS generated_date,
                    CAST(total_stand_value AS TEXT) AS total_stand_value,
                    total_stands_sold, total_stands_available,
                    CAST(total_deposit AS TEXT) AS total_deposit,
                    CAST(total_installment AS TEXT) AS total_installment
             FROM reports ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("ALTER TABLE reports RENAME TO reports_legacy")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;

        let fallback_generated = db::now();
        let mut migrated = 0usize;
        for row in &legacy {
            let range = row.year.zip(row.week_number).and_then(|(year, week)| {
                let year = i32::try_from(year).ok()?;
                let week = u32::try_from(week).ok()?;
                iso_week_range(year, week).ok()
            });
            let Some((start, end)) = range else {
                warn!(
                    "Dropping legacy index row '{}': no valid ISO week ({:?}/{:?})",
                    row.filename, row.year, row.week_number
                );
                continue;
            };
            let Some(summary) = row.summary() else {
                warn!(
                    "Dropping legacy index row '{}': unreadable amounts",
                    row.filename
                );
                continue;
            };
            let generated_date = row
                .generated_date
                .as_deref()
                .and_then(db::parse_timestamp)
                .unwrap_or(fallback_generated);

            let record = ReportRecord {
                filename: row.filename.clone(),
                report_type: ReportType::Weekly,
                start_date: start,
                end_date: end,
                generated_date,
                summary,
            };
            upsert(&mut *tx, &record).await?;
            migrated += 1;
        }

        sqlx::query("DROP TABLE reports_legacy")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            "Migrated {} of {} legacy report index rows to date ranges",
            migrated,
            legacy.len()
        );
        Ok(())
    }
}

async fn upsert<'e, E>(executor: E, record: &ReportRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(UPSERT)
        .bind(&record.filename)
        .bind(record.report_type.as_str())
        .bind(record.start_date.format("%Y-%m-%d").to_string())
        .bind(record.end_date.format("%Y-%m-%d").to_string())
        .bind(db::format_timestamp(record.generated_date))
        .bind(record.summary.total_stand_value.to_string())
        .bind(record.summary.total_stands_sold)
        .bind(record.summary.total_stands_available)
        .bind(record.summary.total_deposit.to_string())
        .bind(record.summary.total_installment.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// A stored amount; `NULL` reads as zero, garbage as `None`.
fn stored_money(text: Option<&str>) -> Option<Decimal> {
    match text {
        Some(text) => parse_money(text).ok(),
        None => Some(Decimal::ZERO),
    }
}

fn convert(row: RecordRow) -> Option<ReportRecord> {
    let filename = row.filename.clone();
    let record = row.into_record();
    if record.is_none() {
        warn!("Skipping unreadable report index row '{}'", filename);
    }
    record
}
