//! Company branding and SMTP configuration.
//!
//! Both live in singleton rows (`id = 1`) of their own tables and are seeded
//! with defaults the first time the store is opened.

use std::path::Path;

use chrono::NaiveDateTime;
use log::debug;
use sqlx::{FromRow, SqlitePool};

use crate::db;

const SINGLETON_ID: i64 = 1;

pub const DEFAULT_COMPANY_NAME: &str = "AIBES Real Estate";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS company_settings (
        id INTEGER PRIMARY KEY,
        company_name TEXT NOT NULL,
        logo_path TEXT,
        logo_data BLOB,
        updated_date TEXT
    )",
    "CREATE TABLE IF NOT EXISTS email_settings (
        id INTEGER PRIMARY KEY,
        smtp_server TEXT NOT NULL,
        smtp_port INTEGER NOT NULL,
        email_username TEXT,
        email_password TEXT,
        sender_email TEXT,
        sender_name TEXT,
        updated_date TEXT
    )",
];

/// Branding shown in the report header.
#[derive(Clone, Debug, PartialEq)]
pub struct CompanySettings {
    pub company_name: String,
    pub logo_path: Option<String>,
    pub logo_data: Option<Vec<u8>>,
    pub updated_date: Option<NaiveDateTime>,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            logo_path: None,
            logo_data: None,
            updated_date: None,
        }
    }
}

/// SMTP configuration used by the email dispatcher.
#[derive(Clone, PartialEq)]
pub struct EmailSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub email_username: Option<String>,
    pub email_password: Option<String>,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub updated_date: Option<NaiveDateTime>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            email_username: None,
            email_password: None,
            sender_email: None,
            sender_name: None,
            updated_date: None,
        }
    }
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("email_username", &self.email_username)
            .field(
                "email_password",
                &self.email_password.as_ref().map(|_| "********"),
            )
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("updated_date", &self.updated_date)
            .finish()
    }
}

#[derive(FromRow)]
struct CompanyRow {
    company_name: String,
    logo_path: Option<String>,
    logo_data: Option<Vec<u8>>,
    updated_date: Option<String>,
}

#[derive(FromRow)]
struct EmailRow {
    smtp_server: String,
    smtp_port: i64,
    email_username: Option<String>,
    email_password: Option<String>,
    sender_email: Option<String>,
    sender_name: Option<String>,
    updated_date: Option<String>,
}

/// Treats empty strings as unset.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<CompanyRow> for CompanySettings {
    fn from(row: CompanyRow) -> Self {
        Self {
            company_name: row.company_name,
            logo_path: present(row.logo_path),
            logo_data: row.logo_data.filter(|data| !data.is_empty()),
            updated_date: row.updated_date.as_deref().and_then(db::parse_timestamp),
        }
    }
}

impl From<EmailRow> for EmailSettings {
    fn from(row: EmailRow) -> Self {
        Self {
            smtp_server: row.smtp_server,
            smtp_port: u16::try_from(row.smtp_port).unwrap_or(DEFAULT_SMTP_PORT),
            email_username: present(row.email_username),
            email_password: present(row.email_password),
            sender_email: present(row.sender_email),
            sender_name: present(row.sender_name),
            updated_date: row.updated_date.as_deref().and_then(db::parse_timestamp),
        }
    }
}

/// Settings persisted in an embedded SQLite database.
#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    /// Opens the settings database at `path`, creating and seeding it if needed.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        Self::from_pool(db::open_file(path).await?).await
    }

    /// Opens a throwaway in-memory store.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::from_pool(db::open_memory().await?).await
    }

    /// Uses an existing pool, creating and seeding the tables if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        let seeded_company =
            sqlx::query("INSERT OR IGNORE INTO company_settings (id, company_name) VALUES (?, ?)")
                .bind(SINGLETON_ID)
                .bind(DEFAULT_COMPANY_NAME)
                .execute(&pool)
                .await?;
        let seeded_email = sqlx::query(
            "INSERT OR IGNORE INTO email_settings (id, smtp_server, smtp_port) VALUES (?, ?, ?)",
        )
        .bind(SINGLETON_ID)
        .bind(DEFAULT_SMTP_SERVER)
        .bind(i64::from(DEFAULT_SMTP_PORT))
        .execute(&pool)
        .await?;

        if seeded_company.rows_affected() + seeded_email.rows_affected() > 0 {
            debug!("Seeded default company and email settings");
        }

        Ok(Self { pool })
    }

    pub async fn company(&self) -> Result<CompanySettings, sqlx::Error> {
        let row: Option<CompanyRow> = sqlx::query_as(
            "SELECT company_name, logo_path, logo_data, updated_date
             FROM company_settings WHERE id = ?",
        )
        .bind(SINGLETON_ID)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CompanySettings::from).unwrap_or_default())
    }

    pub async fn email(&self) -> Result<EmailSettings, sqlx::Error> {
        let row: Option<EmailRow> = sqlx::query_as(
            "SELECT smtp_server, smtp_port, email_username, email_password,
                    sender_email, sender_name, updated_date
             FROM email_settings WHERE id = ?",
        )
        .bind(SINGLETON_ID)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EmailSettings::from).unwrap_or_default())
    }

    /// Replaces the company settings and stamps `updated_date`.
    pub async fn update_company(
        &self,
        settings: &CompanySettings,
    ) -> Result<CompanySettings, sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO company_settings
                (id, company_name, logo_path, logo_data, updated_date)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(SINGLETON_ID)
        .bind(&settings.company_name)
        .bind(&settings.logo_path)
        .bind(&settings.logo_data)
        .bind(db::format_timestamp(db::now()))
        .execute(&self.pool)
        .await?;
        self.company().await
    }

    /// Replaces the SMTP settings and stamps `updated_date`.
    pub async fn update_email(&self, settings: &EmailSettings) -> Result<EmailSettings, sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO email_settings
                (id, smtp_server, smtp_port, email_username, email_password,
                 sender_email, sender_name, updated_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(SINGLETON_ID)
        .bind(&settings.smtp_server)
        .bind(i64::from(settings.smtp_port))
        .bind(&settings.email_username)
        .bind(&settings.email_password)
        .bind(&settings.sender_email)
        .bind(&settings.sender_name)
        .bind(db::format_timestamp(db::now()))
        .execute(&self.pool)
        .await?;
        self.email().await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
