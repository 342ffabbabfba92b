//! Report generation: data collection, rendering, artifact storage and indexing.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use crate::db;
use crate::error::ReportError;
use crate::index::ReportIndex;
use crate::model::{ReportData, ReportRecord};
use crate::period::ReportRequest;
use crate::render::ReportDocument;
use crate::settings::SettingsStore;
use crate::source::SalesSource;

/// Default directory for generated artifacts.
pub const DEFAULT_REPORTS_DIR: &str = "generated_reports";

/// Where artifacts go and how they are rendered.
#[derive(Clone, Debug, Default)]
pub struct GeneratorConfig {
    pub reports_dir: PathBuf,
    /// Directory searched first for the report font family.
    pub fonts_dir: Option<PathBuf>,
    /// Public base URL; when set, reports carry a share link and QR code.
    pub share_base_url: Option<String>,
}

impl GeneratorConfig {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_fonts_dir(mut self, fonts_dir: Option<PathBuf>) -> Self {
        self.fonts_dir = fonts_dir;
        self
    }

    pub fn with_share_base_url(mut self, base_url: Option<String>) -> Self {
        self.share_base_url = base_url.filter(|url| !url.trim().is_empty());
        self
    }
}

/// A report written to disk and recorded in the index.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub record: ReportRecord,
}

/// Produces report artifacts from a [`SalesSource`].
///
/// Constructed explicitly and shared by reference (or `Arc`) between the CLI,
/// the weekly job and any other caller.
pub struct ReportGenerator {
    source: Arc<dyn SalesSource>,
    index: ReportIndex,
    settings: SettingsStore,
    config: GeneratorConfig,
}

impl ReportGenerator {
    /// Creates the reports directory and opens the index stored inside it.
    pub async fn open(
        source: Arc<dyn SalesSource>,
        settings: SettingsStore,
        config: GeneratorConfig,
    ) -> Result<Self, ReportError> {
        tokio::fs::create_dir_all(&config.reports_dir)
            .await
            .map_err(|err| ReportError::io(&config.reports_dir, err))?;
        let index = ReportIndex::open_in(&config.reports_dir).await?;
        Ok(Self::new(source, index, settings, config))
    }

    pub fn new(
        source: Arc<dyn SalesSource>,
        index: ReportIndex,
        settings: SettingsStore,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            source,
            index,
            settings,
            config,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.config.reports_dir
    }

    pub fn index(&self) -> &ReportIndex {
        &self.index
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Queries the source and applies the zero defaults.
    pub async fn collect(&self, request: &ReportRequest) -> ReportData {
        ReportData::from_raw(self.source.fetch_metrics(request).await)
    }

    /// Public link to `filename`, when a share base URL is configured.
    pub fn share_url(&self, filename: &str) -> Option<String> {
        self.config.share_base_url.as_ref().map(|base| {
            format!(
                "{}/{}/{}",
                base.trim_end_matches('/'),
                DEFAULT_REPORTS_DIR,
                filename
            )
        })
    }

    /// Generates the report for `request`, logging and swallowing any failure.
    pub async fn generate(&self, request: &ReportRequest) -> Option<GeneratedReport> {
        match self.generate_report(request).await {
            Ok(report) => Some(report),
            Err(err) => {
                error!("Failed to generate {}: {}", request.filename(), err);
                None
            }
        }
    }

    /// Generates, writes and indexes the report for `request`.
    ///
    /// The file is rendered in memory and staged next to its final name. The
    /// index row is written in a transaction that commits only after the file
    /// has been moved into place, so a failure at any step leaves neither a new
    /// file nor a new record. Regenerating an existing filename replaces both.
    pub async fn generate_report(
        &self,
        request: &ReportRequest,
    ) -> Result<GeneratedReport, ReportError> {
        let data = self.collect(request).await;
        let company = self.settings.company().await?;
        let filename = request.filename();
        let generated_at = db::now();

        let document = ReportDocument {
            request: *request,
            data,
            company,
            generated_at,
            share_url: self.share_url(&filename),
        };
        let summary = document.data.summary;
        let fonts_dir = self.config.fonts_dir.clone();
        let bytes =
            tokio::task::spawn_blocking(move || document.render(fonts_dir.as_deref())).await??;

        let record = ReportRecord {
            filename,
            report_type: request.report_type(),
            start_date: request.start(),
            end_date: request.end(),
            generated_date: generated_at,
            summary,
        };
        let path = self.store_artifact(&record, &bytes).await?;

        info!("Generated {} ({} bytes)", path.display(), bytes.len());
        Ok(GeneratedReport { path, record })
    }

    async fn store_artifact(
        &self,
        record: &ReportRecord,
        bytes: &[u8],
    ) -> Result<PathBuf, ReportError> {
        let dir = &self.config.reports_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| ReportError::io(dir, err))?;

        let path = dir.join(&record.filename);
        let staging = dir.join(format!("{}.tmp", record.filename));
        if let Err(err) = tokio::fs::write(&staging, bytes).await {
            discard(&staging).await;
            return Err(ReportError::io(&staging, err));
        }

        let pending = match self.index.stage(record).await {
            Ok(pending) => pending,
            Err(err) => {
                discard(&staging).await;
                return Err(err.into());
            }
        };
        if let Err(err) = tokio::fs::rename(&staging, &path).await {
            discard(&staging).await;
            return Err(ReportError::io(&path, err));
        }
        if let Err(err) = pending.commit().await {
            discard(&path).await;
            return Err(err.into());
        }
        Ok(path)
    }

    /// Up to `limit` indexed reports, newest first.
    pub async fn list_reports(&self, limit: u32) -> Result<Vec<ReportRecord>, ReportError> {
        Ok(self.index.list(limit).await?)
    }

    /// Location of an existing artifact for download or preview.
    ///
    /// `filename` must be a bare file name; anything that would resolve
    /// outside the reports directory is rejected.
    pub fn artifact_path(&self, filename: &str) -> Result<PathBuf, ReportError> {
        let mut components = Path::new(filename).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !valid || filename.contains(|c: char| c == '/' || c == '\\') {
            return Err(ReportError::InvalidFilename(filename.to_string()));
        }

        let path = self.config.reports_dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ReportError::NotFound(filename.to_string()))
        }
    }
}

async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), err);
        }
    }
}
