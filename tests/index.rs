use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use stand_reports::index::{ReportIndex, DEFAULT_LIST_LIMIT, INDEX_FILENAME};
use stand_reports::ReportType;

const LEGACY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT UNIQUE,
    year INTEGER,
    week_number INTEGER,
    generated_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    total_stand_value REAL,
    total_stands_sold INTEGER,
    total_stands_available INTEGER,
    total_deposit REAL,
    total_installment REAL
)";

async fn write_legacy_index(path: &std::path::Path) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await
        .unwrap();

    sqlx::query(LEGACY_SCHEMA).execute(&pool).await.unwrap();
    let rows: [(&str, i64, i64, &str, f64, i64); 3] = [
        ("weekly_report_2025_W02.pdf", 2025, 2, "2025-01-13 02:00:05", 1500.0, 4),
        ("weekly_report_2020_W53.pdf", 2020, 53, "2021-01-04 02:00:03", 700.0, 2),
        ("weekly_report_2021_W53.pdf", 2021, 53, "2022-01-03 02:00:01", 10.0, 1),
    ];
    for (filename, year, week, generated, value, sold) in rows {
        sqlx::query(
            "INSERT INTO reports (filename, year, week_number, generated_date,
                total_stand_value, total_stands_sold, total_stands_available,
                total_deposit, total_installment)
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, 12.5)",
        )
        .bind(filename)
        .bind(year)
        .bind(week)
        .bind(generated)
        .bind(value)
        .bind(sold)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn legacy_week_number_index_is_migrated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_index(&dir.path().join(INDEX_FILENAME)).await;

    let index = ReportIndex::open_in(dir.path()).await.unwrap();
    let records = index.list(DEFAULT_LIST_LIMIT).await.unwrap();

    // 2021 has no week 53, so that row is dropped.
    assert_eq!(records.len(), 2);

    let latest = &records[0];
    assert_eq!(latest.filename, "weekly_report_2025_W02.pdf");
    assert_eq!(latest.report_type, ReportType::Weekly);
    assert_eq!(latest.start_date, date(2025, 1, 6));
    assert_eq!(latest.end_date, date(2025, 1, 12));
    assert_eq!(latest.summary.total_stand_value, Decimal::new(1500, 0));
    assert_eq!(latest.summary.total_stands_sold, 4);
    assert_eq!(latest.summary.total_deposit, Decimal::ZERO);
    assert_eq!(latest.summary.total_installment, Decimal::new(125, 1));
    assert_eq!(
        latest.generated_date,
        date(2025, 1, 13).and_hms_opt(2, 0, 5).unwrap()
    );

    let long_year = &records[1];
    assert_eq!(long_year.start_date, date(2020, 12, 28));
    assert_eq!(long_year.end_date, date(2021, 1, 3));
}

#[tokio::test]
async fn migrated_index_reopens_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_index(&dir.path().join(INDEX_FILENAME)).await;

    let first = ReportIndex::open_in(dir.path()).await.unwrap();
    let before = first.list(DEFAULT_LIST_LIMIT).await.unwrap();
    first.close().await;

    let second = ReportIndex::open_in(dir.path()).await.unwrap();
    let after = second.list(DEFAULT_LIST_LIMIT).await.unwrap();
    assert_eq!(before, after);
}
