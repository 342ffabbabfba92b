//! Data structures describing the content of a sales report.
//!
//! Values arrive from the sales source as [`RawMetrics`], where every
//! aggregate is optional because SQL aggregates over empty ranges yield `NULL`
//! and a failed query yields nothing at all. [`ReportData::from_raw`] is the
//! single place where those gaps are turned into zeros; everything downstream
//! (rendering, the report index, email) works with plain numbers.
//!
//! Monetary amounts are [`Decimal`]s kept to the cent.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::format;
use crate::period::ReportType;

/// Label of the synthetic totals row in the project breakdown.
pub const TOTAL_LABEL: &str = "TOTAL";

/// Decimal places kept for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Headline figures for a reporting period.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregateSummary {
    pub total_stand_value: Decimal,
    pub total_stands_sold: i64,
    pub total_stands_available: i64,
    pub total_deposit: Decimal,
    pub total_installment: Decimal,
}

impl AggregateSummary {
    /// Rows of the two-column summary table: metric name and formatted value.
    pub fn table_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Stand Value", format::currency(self.total_stand_value)),
            ("Total Stands Sold", format::count(self.total_stands_sold)),
            (
                "Total Stands Available",
                format::count(self.total_stands_available),
            ),
            ("Total Deposit", format::currency(self.total_deposit)),
            ("Total Installment", format::currency(self.total_installment)),
        ]
    }
}

/// Per-project figures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectRow {
    /// Project identifier; `None` when the stand row carried no project.
    pub project_id: Option<i64>,
    pub stands_sold: i64,
    pub stands_value: Decimal,
    pub stands_available: i64,
}

/// Projects ordered by stands sold, highest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectBreakdown {
    rows: Vec<ProjectRow>,
}

impl ProjectBreakdown {
    /// Creates a breakdown, sorting `rows` by `stands_sold` descending.
    ///
    /// The sort is stable, so projects with equal sales keep their input order.
    pub fn new(mut rows: Vec<ProjectRow>) -> Self {
        rows.sort_by(|a, b| b.stands_sold.cmp(&a.stands_sold));
        Self { rows }
    }

    pub fn rows(&self) -> &[ProjectRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Sum over all projects; only present when more than one project exists.
    pub fn totals(&self) -> Option<ProjectRow> {
        if self.rows.len() < 2 {
            return None;
        }
        Some(self.rows.iter().fold(ProjectRow::default(), |acc, row| ProjectRow {
            project_id: None,
            stands_sold: acc.stands_sold + row.stands_sold,
            stands_value: acc.stands_value + row.stands_value,
            stands_available: acc.stands_available + row.stands_available,
        }))
    }

    /// Formatted cells of the four-column project table, totals row included.
    pub fn table_rows(&self) -> Vec<[String; 4]> {
        let mut table: Vec<[String; 4]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    row.project_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                    format::count(row.stands_sold),
                    format::currency(row.stands_value),
                    format::count(row.stands_available),
                ]
            })
            .collect();

        if let Some(totals) = self.totals() {
            table.push([
                TOTAL_LABEL.to_string(),
                format::count(totals.stands_sold),
                format::currency(totals.stands_value),
                format::count(totals.stands_available),
            ]);
        }
        table
    }
}

/// Stands sold on a single day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyTrendPoint {
    pub date: NaiveDate,
    pub stands_sold: i64,
}

impl DailyTrendPoint {
    /// Chart label such as `MON 01/06`.
    pub fn label(&self) -> String {
        self.date.format("%a %m/%d").to_string().to_uppercase()
    }
}

/// Stand totals as returned by the source; `None` stands for SQL `NULL`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawStandTotals {
    pub total_stand_value: Option<Decimal>,
    pub total_stands_sold: Option<i64>,
    pub total_stands_available: Option<i64>,
}

/// Project row as returned by the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProjectRow {
    pub project_id: Option<i64>,
    pub stands_sold: Option<i64>,
    pub stands_value: Option<Decimal>,
    pub stands_available: Option<i64>,
}

/// Result of one query batch against the sales source.
///
/// Each field is `None` when its query failed; inner `None`s are SQL `NULL`s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMetrics {
    pub stands: Option<RawStandTotals>,
    pub deposit: Option<Option<Decimal>>,
    pub installment: Option<Option<Decimal>>,
    pub projects: Option<Vec<RawProjectRow>>,
    pub daily: Option<Vec<DailyTrendPoint>>,
}

/// Everything a report needs, with all gaps defaulted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportData {
    pub summary: AggregateSummary,
    pub projects: ProjectBreakdown,
    pub trend: Vec<DailyTrendPoint>,
}

impl ReportData {
    /// Applies the zero defaults to a raw query batch.
    pub fn from_raw(raw: RawMetrics) -> Self {
        let stands = raw.stands.unwrap_or_default();
        let summary = AggregateSummary {
            total_stand_value: money(stands.total_stand_value),
            total_stands_sold: stands.total_stands_sold.unwrap_or(0),
            total_stands_available: stands.total_stands_available.unwrap_or(0),
            total_deposit: money(raw.deposit.flatten()),
            total_installment: money(raw.installment.flatten()),
        };

        let projects = raw
            .projects
            .unwrap_or_default()
            .into_iter()
            .map(|row| ProjectRow {
                project_id: row.project_id,
                stands_sold: row.stands_sold.unwrap_or(0),
                stands_value: money(row.stands_value),
                stands_available: row.stands_available.unwrap_or(0),
            })
            .collect();

        let mut trend: Vec<DailyTrendPoint> = raw
            .daily
            .unwrap_or_default()
            .into_iter()
            .filter(|point| point.stands_sold > 0)
            .collect();
        trend.sort_by_key(|point| point.date);

        Self {
            summary,
            projects: ProjectBreakdown::new(projects),
            trend,
        }
    }

    /// `(label, value)` series for the daily trend chart.
    pub fn trend_series(&self) -> Vec<(String, f64)> {
        self.trend
            .iter()
            .map(|point| (point.label(), point.stands_sold as f64))
            .collect()
    }
}

fn money(value: Option<Decimal>) -> Decimal {
    value.map(to_cents).unwrap_or_default()
}

/// Rounds `value` to the cent, halves away from zero.
pub fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses a monetary amount as rendered by a database, e.g. `1500`, `0.30`
/// or `1.5e3`, rounded to the cent.
pub fn parse_money(text: &str) -> Result<Decimal, rust_decimal::Error> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(to_cents)
}

/// Index entry for a generated report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRecord {
    pub filename: String,
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_date: NaiveDateTime,
    pub summary: AggregateSummary,
}
