//! Reporting periods: report types, validated date ranges and ISO week arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Longest span, in days between start and end, a single report may cover.
pub const MAX_RANGE_DAYS: i64 = 365;

/// Errors raised while validating a report request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The start date lies after the end date.
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    /// The range is wider than [`MAX_RANGE_DAYS`].
    #[error("date range {start} to {end} spans {days} days (maximum {max})", max = MAX_RANGE_DAYS)]
    RangeTooLong {
        start: NaiveDate,
        end: NaiveDate,
        days: i64,
    },

    /// The ISO year/week pair does not exist.
    #[error("ISO week {week} does not exist in {year}")]
    InvalidIsoWeek { year: i32, week: u32 },

    /// A custom report was requested without explicit dates.
    #[error("custom reports need explicit start and end dates")]
    MissingDates,

    /// The report type tag is unknown.
    #[error("unknown report type '{0}'")]
    UnknownReportType(String),
}

/// Kind of report; determines titles, filenames and preset ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl ReportType {
    /// Every report type, in display order.
    pub const ALL: [ReportType; 5] = [
        ReportType::Daily,
        ReportType::Weekly,
        ReportType::Monthly,
        ReportType::Yearly,
        ReportType::Custom,
    ];

    /// Lower-case tag stored in the report index and embedded in filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
            ReportType::Yearly => "yearly",
            ReportType::Custom => "custom",
        }
    }

    /// Capitalised label used in document titles.
    pub fn label(self) -> &'static str {
        match self {
            ReportType::Daily => "Daily",
            ReportType::Weekly => "Weekly",
            ReportType::Monthly => "Monthly",
            ReportType::Yearly => "Yearly",
            ReportType::Custom => "Custom",
        }
    }

    /// Returns the natural range of this report type around `anchor`.
    ///
    /// Weekly ranges run Monday to Sunday of the ISO week containing `anchor`.
    /// Custom reports have no preset and yield `None`.
    pub fn preset_range(self, anchor: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            ReportType::Daily => Some((anchor, anchor)),
            ReportType::Weekly => {
                let monday = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
                Some((monday, monday + Duration::days(6)))
            }
            ReportType::Monthly => {
                let first = anchor.with_day(1)?;
                let next_month = if anchor.month() == 12 {
                    NaiveDate::from_ymd_opt(anchor.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(anchor.year(), anchor.month() + 1, 1)?
                };
                Some((first, next_month - Duration::days(1)))
            }
            ReportType::Yearly => Some((
                NaiveDate::from_ymd_opt(anchor.year(), 1, 1)?,
                NaiveDate::from_ymd_opt(anchor.year(), 12, 31)?,
            )),
            ReportType::Custom => None,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ReportType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| RequestError::UnknownReportType(value.to_string()))
    }
}

/// A validated report request.
///
/// Construction enforces `start <= end` and the [`MAX_RANGE_DAYS`] limit, so a
/// generator receiving a `ReportRequest` never sees an inverted range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    report_type: ReportType,
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportRequest {
    /// Validates and creates a request for the given inclusive range.
    pub fn new(
        report_type: ReportType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, RequestError> {
        if start > end {
            return Err(RequestError::StartAfterEnd { start, end });
        }
        let days = (end - start).num_days();
        if days > MAX_RANGE_DAYS {
            return Err(RequestError::RangeTooLong { start, end, days });
        }
        Ok(Self {
            report_type,
            start,
            end,
        })
    }

    /// Creates a request using the preset range of `report_type` around `anchor`.
    pub fn preset(report_type: ReportType, anchor: NaiveDate) -> Result<Self, RequestError> {
        let (start, end) = report_type
            .preset_range(anchor)
            .ok_or(RequestError::MissingDates)?;
        Self::new(report_type, start, end)
    }

    /// Creates a weekly request covering Monday to Sunday of ISO week `week` in `year`.
    pub fn iso_week(year: i32, week: u32) -> Result<Self, RequestError> {
        let (start, end) = iso_week_range(year, week)?;
        Self::new(ReportType::Weekly, start, end)
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Deterministic artifact filename, e.g. `weekly_report_2025-01-06_to_2025-01-12.pdf`.
    pub fn filename(&self) -> String {
        format!(
            "{}_report_{}_to_{}.pdf",
            self.report_type.as_str(),
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// Human readable period, e.g. `2025-01-06 to 2025-01-12`.
    pub fn period_label(&self) -> String {
        format!(
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Monday and Sunday of ISO week `week` in ISO year `year`.
pub fn iso_week_range(year: i32, week: u32) -> Result<(NaiveDate, NaiveDate), RequestError> {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .ok_or(RequestError::InvalidIsoWeek { year, week })?;
    Ok((monday, monday + Duration::days(6)))
}

/// ISO year and week of the week before the one containing `today`.
///
/// Stepping back seven days and reading the ISO week keeps 53-week years intact.
pub fn previous_iso_week(today: NaiveDate) -> (i32, u32) {
    let iso = (today - Duration::days(7)).iso_week();
    (iso.year(), iso.week())
}
