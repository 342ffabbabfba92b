//! Weekly background generation of the previous week's report.

use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use log::{error, info};

use crate::generator::{GeneratedReport, ReportGenerator};
use crate::period::{previous_iso_week, ReportRequest};

/// Day of the week the job runs on.
pub const RUN_WEEKDAY: Weekday = Weekday::Mon;
/// Local hour of day the job runs at.
pub const RUN_HOUR: u32 = 2;

/// First run time strictly after `now`: the next Monday at 02:00.
pub fn next_run_after(now: NaiveDateTime) -> NaiveDateTime {
    let run_time = NaiveTime::from_hms_opt(RUN_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let days_ahead = (7 + RUN_WEEKDAY.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = (now.date() + Duration::days(days_ahead)).and_time(run_time);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

/// Generates the previous ISO week's report once a week.
pub struct WeeklyReportJob {
    generator: Arc<ReportGenerator>,
}

impl WeeklyReportJob {
    pub fn new(generator: Arc<ReportGenerator>) -> Self {
        Self { generator }
    }

    /// Generates the report for the ISO week before the one containing `today`.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn run_once(&self, today: NaiveDate) -> Option<GeneratedReport> {
        let (year, week) = previous_iso_week(today);
        let request = match ReportRequest::iso_week(year, week) {
            Ok(request) => request,
            Err(err) => {
                error!("Scheduled weekly report skipped: {}", err);
                return None;
            }
        };

        info!("Generating scheduled weekly report for {}-W{:02}", year, week);
        let report = self.generator.generate(&request).await;
        match &report {
            Some(report) => info!("Scheduled weekly report ready: {}", report.path.display()),
            None => error!("Scheduled weekly report for {}-W{:02} failed", year, week),
        }
        report
    }

    /// Runs forever, sleeping until each Monday 02:00 local time.
    pub async fn run(&self) {
        loop {
            let now = Local::now().naive_local();
            let next = next_run_after(now);
            info!("Next weekly report run at {}", next.format("%Y-%m-%d %H:%M"));

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            self.run_once(Local::now().date_naive()).await;
        }
    }
}
