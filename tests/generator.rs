use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use stand_reports::fonts;
use stand_reports::index::DEFAULT_LIST_LIMIT;
use stand_reports::model::TOTAL_LABEL;
use stand_reports::{
    GeneratorConfig, ReportGenerator, ReportIndex, ReportRequest, ReportType, SettingsStore,
    SqlSalesSource,
};

const UPSTREAM_SCHEMA: &[&str] = &[
    "CREATE TABLE Stands (
        stand_number TEXT,
        project_id INTEGER,
        sale_value REAL,
        available INTEGER,
        registration_date TEXT
    )",
    "CREATE TABLE customer_accounts (
        deposit_amount REAL,
        registration_date TEXT
    )",
    "CREATE TABLE customer_account_invoices (
        amount REAL,
        transaction_date TEXT,
        description TEXT
    )",
];

async fn upstream(statements: &[&str]) -> AnyPool {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open upstream database");
    for statement in statements {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("prepare upstream database");
    }
    pool
}

async fn seeded_upstream() -> AnyPool {
    let mut statements: Vec<&str> = UPSTREAM_SCHEMA.to_vec();
    statements.extend_from_slice(&[
        "INSERT INTO Stands VALUES ('S-1', 1, 100, 0, '2025-01-01 09:15:00')",
        "INSERT INTO Stands VALUES ('S-2', 1, 200, 1, '2025-01-03 11:00:00')",
        "INSERT INTO Stands VALUES ('S-3', 2, 300, 0, '2025-01-03 16:45:00')",
        "INSERT INTO Stands VALUES ('S-4', 2, 999, 0, '2025-01-09 10:00:00')",
        "INSERT INTO customer_accounts VALUES (50.5, '2025-01-02')",
        "INSERT INTO customer_accounts VALUES (49.5, '2025-01-06')",
        "INSERT INTO customer_accounts VALUES (1000, '2024-12-31')",
        "INSERT INTO customer_account_invoices VALUES (75, '2025-01-04', 'Instalment')",
        "INSERT INTO customer_account_invoices VALUES (25, '2025-01-05', 'Instalment')",
        "INSERT INTO customer_account_invoices VALUES (500, '2025-01-05', 'Deposit')",
    ]);
    upstream(&statements).await
}

async fn generator(pool: AnyPool, reports_dir: &Path) -> ReportGenerator {
    ReportGenerator::new(
        Arc::new(SqlSalesSource::from_pool(pool)),
        ReportIndex::in_memory().await.expect("open index"),
        SettingsStore::in_memory().await.expect("open settings"),
        GeneratorConfig::new(reports_dir),
    )
}

fn dollars(text: &str) -> Decimal {
    text.parse().unwrap()
}

fn tmp_leftovers(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "tmp"))
        .collect()
}

fn first_week_of_2025() -> ReportRequest {
    ReportRequest::new(
        ReportType::Weekly,
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn aggregates_are_scoped_to_the_requested_range() {
    let dir = tempfile::tempdir().unwrap();
    let generator = generator(seeded_upstream().await, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    assert_eq!(data.summary.total_stand_value, dollars("600"));
    assert_eq!(data.summary.total_stands_sold, 3);
    assert_eq!(data.summary.total_stands_available, 2);
    assert_eq!(data.summary.total_deposit, dollars("100"));
    assert_eq!(data.summary.total_installment, dollars("100"));
}

#[tokio::test]
async fn fractional_amounts_sum_to_the_cent() {
    let dir = tempfile::tempdir().unwrap();
    let mut statements: Vec<&str> = UPSTREAM_SCHEMA.to_vec();
    statements.extend_from_slice(&[
        "INSERT INTO customer_accounts VALUES (0.1, '2025-01-02')",
        "INSERT INTO customer_accounts VALUES (0.2, '2025-01-03')",
    ]);
    let generator = generator(upstream(&statements).await, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    assert_eq!(data.summary.total_deposit, dollars("0.30"));
    assert_eq!(data.summary.table_rows()[3].1, "$0.30");
}

#[tokio::test]
async fn project_breakdown_is_sorted_with_totals() {
    let dir = tempfile::tempdir().unwrap();
    let generator = generator(seeded_upstream().await, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    let rows = data.projects.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].project_id, Some(1));
    assert_eq!(rows[0].stands_sold, 2);
    assert_eq!(rows[0].stands_value, dollars("300"));
    assert_eq!(rows[1].project_id, Some(2));

    let table = data.projects.table_rows();
    let totals = table.last().unwrap();
    assert_eq!(totals[0], TOTAL_LABEL);
    assert_eq!(totals[1], "3");
}

#[tokio::test]
async fn daily_trend_lists_only_days_with_sales() {
    let dir = tempfile::tempdir().unwrap();
    let generator = generator(seeded_upstream().await, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    let days: Vec<(NaiveDate, i64)> = data
        .trend
        .iter()
        .map(|point| (point.date, point.stands_sold))
        .collect();
    assert_eq!(
        days,
        vec![
            (NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 1),
            (NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(), 2),
        ]
    );
}

#[tokio::test]
async fn empty_range_yields_zero_summary() {
    let dir = tempfile::tempdir().unwrap();
    let generator = generator(upstream(UPSTREAM_SCHEMA).await, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    assert_eq!(data.summary, Default::default());
    assert!(data.projects.is_empty());
    assert!(data.trend.is_empty());
}

#[tokio::test]
async fn failing_metric_defaults_to_zero_without_affecting_others() {
    let dir = tempfile::tempdir().unwrap();
    // No Stands or invoice tables: those queries fail, deposits still work.
    let pool = upstream(&[
        "CREATE TABLE customer_accounts (deposit_amount REAL, registration_date TEXT)",
        "INSERT INTO customer_accounts VALUES (80, '2025-01-02')",
    ])
    .await;
    let generator = generator(pool, dir.path()).await;

    let data = generator.collect(&first_week_of_2025()).await;

    assert_eq!(data.summary.total_deposit, dollars("80"));
    assert_eq!(data.summary.total_stands_sold, 0);
    assert_eq!(data.summary.total_stand_value, Decimal::ZERO);
    assert_eq!(data.summary.total_installment, Decimal::ZERO);
    assert!(data.projects.is_empty());
}

#[tokio::test]
async fn failed_generation_leaves_no_artifact_or_record() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the reports directory should be.
    let blocked = dir.path().join("reports");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let generator = generator(seeded_upstream().await, &blocked).await;

    let request = first_week_of_2025();
    assert!(generator.generate(&request).await.is_none());
    assert!(generator.list_reports(DEFAULT_LIST_LIMIT).await.unwrap().is_empty());
    assert_eq!(std::fs::read(&blocked).unwrap(), b"not a directory");
}

#[tokio::test]
async fn index_failure_after_rendering_leaves_no_new_artifact() {
    if !fonts::fonts_available(None) {
        eprintln!("Skipping index_failure_after_rendering_leaves_no_new_artifact: no report fonts found.");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let reports_dir = dir.path().join("generated_reports");
    let request = first_week_of_2025();
    let artifact = reports_dir.join(request.filename());

    let closed_index = ReportIndex::in_memory().await.expect("open index");
    closed_index.close().await;
    let failing = ReportGenerator::new(
        Arc::new(SqlSalesSource::from_pool(seeded_upstream().await)),
        closed_index,
        SettingsStore::in_memory().await.expect("open settings"),
        GeneratorConfig::new(&reports_dir),
    );

    assert!(failing.generate(&request).await.is_none());
    assert!(!artifact.exists());
    assert!(tmp_leftovers(&reports_dir).is_empty());

    // An earlier artifact survives a failed regeneration untouched.
    let working = generator(seeded_upstream().await, &reports_dir).await;
    let first = working.generate(&request).await.expect("generate report");
    let previous = std::fs::read(&first.path).unwrap();

    assert!(failing.generate(&request).await.is_none());
    assert_eq!(std::fs::read(&artifact).unwrap(), previous);
    assert!(tmp_leftovers(&reports_dir).is_empty());
    assert_eq!(working.list_reports(DEFAULT_LIST_LIMIT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn regeneration_replaces_file_and_index_record() {
    if !fonts::fonts_available(None) {
        eprintln!("Skipping regeneration_replaces_file_and_index_record: no report fonts found.");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let reports_dir = dir.path().join("generated_reports");
    let generator = generator(seeded_upstream().await, &reports_dir).await;
    let request = first_week_of_2025();

    let first = generator.generate(&request).await.expect("first generation");
    let second = generator.generate(&request).await.expect("second generation");

    assert_eq!(first.path, second.path);
    assert_eq!(
        first.path.file_name().unwrap().to_string_lossy(),
        "weekly_report_2025-01-01_to_2025-01-07.pdf"
    );
    assert!(std::fs::read(&second.path).unwrap().starts_with(b"%PDF"));

    let records = generator.list_reports(DEFAULT_LIST_LIMIT).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary.total_stand_value, dollars("600"));
    assert_eq!(records[0].summary.total_stands_sold, 3);
    assert_eq!(records[0].start_date, request.start());
    assert_eq!(records[0].end_date, request.end());

    assert!(tmp_leftovers(&reports_dir).is_empty());

    assert_eq!(
        generator
            .artifact_path("weekly_report_2025-01-01_to_2025-01-07.pdf")
            .unwrap(),
        second.path
    );
}

#[test]
fn inverted_range_is_rejected_before_generation() {
    let err = ReportRequest::new(
        ReportType::Custom,
        NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("after"));
}
