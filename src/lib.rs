//! Sales report generation for stand, deposit and instalment data.
//!
//! A [`ReportGenerator`] collects figures for a validated [`ReportRequest`]
//! from a [`SalesSource`], renders them into a PDF, stores the file under the
//! reports directory and records it in the [`ReportIndex`]. Artifacts can be
//! mailed with the [`EmailDispatcher`], and the [`WeeklyReportJob`] produces
//! the previous week's report every Monday.

pub mod builder;
pub mod chart;
pub mod db;
pub mod elements;
pub mod email;
pub mod error;
pub mod fonts;
pub mod format;
pub mod generator;
pub mod index;
pub mod model;
pub mod period;
pub mod render;
pub mod richtext;
pub mod scheduler;
pub mod settings;
pub mod source;

pub use email::{EmailDispatcher, EmailError};
pub use error::ReportError;
pub use generator::{GeneratedReport, GeneratorConfig, ReportGenerator};
pub use index::ReportIndex;
pub use model::{AggregateSummary, ProjectBreakdown, ReportData, ReportRecord};
pub use period::{ReportRequest, ReportType, RequestError};
pub use scheduler::WeeklyReportJob;
pub use settings::{CompanySettings, EmailSettings, SettingsStore};
pub use source::{SalesSource, SqlSalesSource};
