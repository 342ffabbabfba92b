//! Access to the upstream sales database.
//!
//! The upstream schema is owned by the sales system; this module only reads
//! `Stands`, `customer_accounts` and `customer_account_invoices`. Queries go
//! through `sqlx`'s `Any` driver so the same statements run against MySQL in
//! production and SQLite in tests. Every statement binds its parameters and
//! casts aggregates to portable types. The `Any` driver cannot decode
//! `DECIMAL`, so monetary sums are selected as text and parsed into
//! [`Decimal`] here.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::model::{parse_money, DailyTrendPoint, RawMetrics, RawProjectRow, RawStandTotals};
use crate::period::ReportRequest;

/// Description of invoice lines that count as instalment payments.
pub const INSTALMENT_DESCRIPTION: &str = "Instalment";

const STAND_TOTALS_SQL: &str = "\
SELECT
    COUNT(stand_number) AS total_stands_sold,
    CAST(SUM(sale_value) AS CHAR) AS total_stand_value,
    COUNT(CASE WHEN available = 0 THEN stand_number END) AS total_stands_available
FROM Stands
WHERE DATE(registration_date) BETWEEN ? AND ?";

const DEPOSIT_SQL: &str = "\
SELECT CAST(SUM(deposit_amount) AS CHAR) AS total_deposit
FROM customer_accounts
WHERE DATE(registration_date) BETWEEN ? AND ?";

const INSTALLMENT_SQL: &str = "\
SELECT CAST(SUM(amount) AS CHAR) AS total_installment
FROM customer_account_invoices
WHERE DATE(transaction_date) BETWEEN ? AND ? AND description = ?";

const PROJECTS_SQL: &str = "\
SELECT
    CAST(project_id AS SIGNED) AS project_id,
    COUNT(stand_number) AS stands_sold,
    CAST(SUM(sale_value) AS CHAR) AS stands_value,
    COUNT(CASE WHEN available = 0 THEN stand_number END) AS stands_available
FROM Stands
WHERE DATE(registration_date) BETWEEN ? AND ?
GROUP BY project_id
ORDER BY stands_sold DESC";

const DAILY_SQL: &str = "\
SELECT
    CAST(DATE(registration_date) AS CHAR) AS sale_date,
    COUNT(stand_number) AS stands_sold
FROM Stands
WHERE DATE(registration_date) BETWEEN ? AND ?
GROUP BY DATE(registration_date)
ORDER BY sale_date";

/// Source of the figures a report is built from.
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// Runs the report's query batch for the request's date range.
    ///
    /// Implementations must not fail as a whole: a metric whose query fails is
    /// left as `None` in the returned record.
    async fn fetch_metrics(&self, request: &ReportRequest) -> RawMetrics;
}

/// [`SalesSource`] backed by an `sqlx` connection pool.
#[derive(Clone)]
pub struct SqlSalesSource {
    pool: AnyPool,
}

impl SqlSalesSource {
    /// Connects to the database at `url` (`mysql://…` or `sqlite:…`).
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(2).connect(url).await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn stand_totals(&self, start: &str, end: &str) -> Result<RawStandTotals, sqlx::Error> {
        let (sold, value, available): (Option<i64>, Option<String>, Option<i64>) =
            sqlx::query_as(STAND_TOTALS_SQL)
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;
        Ok(RawStandTotals {
            total_stand_value: amount(value)?,
            total_stands_sold: sold,
            total_stands_available: available,
        })
    }

    async fn sum(&self, sql: &str, binds: &[&str]) -> Result<Option<Decimal>, sqlx::Error> {
        let mut query = sqlx::query_as::<_, (Option<String>,)>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let row = query.fetch_optional(&self.pool).await?;
        amount(row.and_then(|(sum,)| sum))
    }

    async fn projects(&self, start: &str, end: &str) -> Result<Vec<RawProjectRow>, sqlx::Error> {
        let rows: Vec<(Option<i64>, Option<i64>, Option<String>, Option<i64>)> =
            sqlx::query_as(PROJECTS_SQL)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(project_id, stands_sold, stands_value, stands_available)| {
                Ok(RawProjectRow {
                    project_id,
                    stands_sold,
                    stands_value: amount(stands_value)?,
                    stands_available,
                })
            })
            .collect()
    }

    async fn daily(&self, start: &str, end: &str) -> Result<Vec<DailyTrendPoint>, sqlx::Error> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(DAILY_SQL)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(date, stands_sold)| {
                let date = NaiveDate::parse_from_str(date?.get(..10)?, "%Y-%m-%d").ok()?;
                Some(DailyTrendPoint { date, stands_sold })
            })
            .collect())
    }
}

fn amount(text: Option<String>) -> Result<Option<Decimal>, sqlx::Error> {
    text.map(|text| parse_money(&text).map_err(|err| sqlx::Error::Decode(Box::new(err))))
        .transpose()
}

fn logged<T>(metric: &str, result: Result<T, sqlx::Error>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Query for {} failed, defaulting to zero: {}", metric, err);
            None
        }
    }
}

#[async_trait]
impl SalesSource for SqlSalesSource {
    async fn fetch_metrics(&self, request: &ReportRequest) -> RawMetrics {
        let start = request.start().format("%Y-%m-%d").to_string();
        let end = request.end().format("%Y-%m-%d").to_string();

        RawMetrics {
            stands: logged("stand totals", self.stand_totals(&start, &end).await),
            deposit: logged("deposits", self.sum(DEPOSIT_SQL, &[&start, &end]).await),
            installment: logged(
                "instalments",
                self.sum(INSTALLMENT_SQL, &[&start, &end, INSTALMENT_DESCRIPTION])
                    .await,
            ),
            projects: logged("project breakdown", self.projects(&start, &end).await),
            daily: logged("daily trend", self.daily(&start, &end).await),
        }
    }
}
