//! PDF layout of a sales report.
//!
//! Sections appear in a fixed order: company header, title and metadata,
//! summary table, project table, daily trend chart and the optional sharing
//! block. Rendering is synchronous and produces the complete file in memory;
//! callers write the bytes out only once rendering succeeded.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Document, Element, Margins, PaperSize};
use image::{DynamicImage, Luma};
use log::warn;
use qrcode::QrCode;

use crate::builder::DocumentBuilder;
use crate::chart;
use crate::elements::{self, mm_from_f64, CaptionedImage, UnderlinedText};
use crate::error::ReportError;
use crate::model::ReportData;
use crate::period::ReportRequest;
use crate::richtext::{self, label_value, Span, StyledSpan};
use crate::settings::CompanySettings;

const PAGE_MARGIN_MM: f64 = 18.0;
const CONTENT_WIDTH_MM: f64 = 210.0 - 2.0 * PAGE_MARGIN_MM;
const FOOTER_HEIGHT_MM: f64 = 8.0;
const LOGO_WIDTH_MM: f64 = 28.0;
const QR_WIDTH_MM: f64 = 35.0;
const QR_MIN_PIXELS: u32 = 240;

const HEADING_COLOR: Color = Color::Rgb(0, 86, 179);
const LINK_COLOR: Color = Color::Rgb(0, 102, 204);
const MUTED_COLOR: Color = Color::Rgb(108, 117, 125);

/// Everything needed to lay out one report document.
#[derive(Clone, Debug)]
pub struct ReportDocument {
    pub request: ReportRequest,
    pub data: ReportData,
    pub company: CompanySettings,
    pub generated_at: NaiveDateTime,
    /// Public URL of the artifact; adds the sharing block when set.
    pub share_url: Option<String>,
}

impl ReportDocument {
    pub fn title(&self) -> String {
        format!("{} Sales Report", self.request.report_type().label())
    }

    /// Renders the document to PDF bytes, loading fonts from `font_dir` first.
    pub fn render(&self, font_dir: Option<&Path>) -> Result<Vec<u8>, ReportError> {
        let mut document = DocumentBuilder::new()
            .with_title(self.title())
            .with_font_directory(font_dir.map(PathBuf::from))
            .with_font_size(10)
            .with_paper_size(PaperSize::A4)
            .with_margins(Margins::all(mm_from_f64(PAGE_MARGIN_MM)))
            .with_footer(mm_from_f64(FOOTER_HEIGHT_MM), |page| {
                Paragraph::new(format!("Page {}", page))
                    .aligned(Alignment::Center)
                    .styled(Style::new().with_font_size(8).with_color(MUTED_COLOR))
            })
            .build()?;

        self.push_company_header(&mut document);
        document.push(Break::new(1));
        document.push(
            Paragraph::new(self.title())
                .aligned(Alignment::Center)
                .styled(Style::new().bold().with_font_size(18).with_color(HEADING_COLOR)),
        );
        document.push(Break::new(1));
        for line in self.metadata_lines() {
            document.push(richtext::paragraph(line));
        }

        document.push(Break::new(1));
        document.push(heading(format!(
            "{} Summary",
            self.request.report_type().label()
        )));
        document.push(self.summary_table()?);

        if !self.data.projects.is_empty() {
            document.push(Break::new(1));
            document.push(heading("Project-wise Analysis"));
            document.push(self.project_table()?);
        }

        document.push(Break::new(1));
        document.push(heading("Daily Trend Analysis"));
        match chart::render_bar_chart(&self.data.trend_series()) {
            Some(image) => {
                let caption = Paragraph::new(StyledString::new(
                    "Stands sold per day",
                    Style::new().italic().with_font_size(8).with_color(MUTED_COLOR),
                ));
                let chart = CaptionedImage::from_dynamic_image(image, caption)
                    .map_err(|err| ReportError::Chart(err.to_string()))?
                    .with_alignment(Alignment::Center)
                    .with_width(mm_from_f64(CONTENT_WIDTH_MM));
                document.push(chart);
            }
            None => document.push(
                Paragraph::new("No stand sales were recorded in this period.")
                    .styled(Style::new().italic().with_color(MUTED_COLOR)),
            ),
        }

        if let Some(url) = &self.share_url {
            document.push(Break::new(1));
            document.push(heading("Share this report"));
            document.push(
                UnderlinedText::from_spans(vec![
                    StyledSpan::from(Span::new("Link: ").bold()),
                    StyledSpan::from(Span::new(url.as_str()).colored(LINK_COLOR).underline()),
                ])
                .with_alignment(Alignment::Left),
            );
            document.push(Break::new(0.5));
            let qr = elements::scaled_image(qr_image(url)?, mm_from_f64(QR_WIDTH_MM))?
                .with_alignment(Alignment::Left);
            document.push(qr);
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes)?;
        Ok(bytes)
    }

    fn push_company_header(&self, document: &mut Document) {
        let name = || {
            Paragraph::new(StyledString::new(
                self.company.company_name.clone(),
                Style::new().bold().with_font_size(16),
            ))
        };

        let logo = self.logo().and_then(|logo| {
            elements::scaled_image(logo, mm_from_f64(LOGO_WIDTH_MM))
                .map_err(|err| warn!("Skipping company logo: {}", err))
                .ok()
        });
        let Some(logo) = logo else {
            document.push(name());
            return;
        };

        let mut table = TableLayout::new(vec![1, 4]);
        let pushed = table
            .row()
            .element(logo)
            .element(name().padded(Margins::trbl(4, 0, 0, 4)))
            .push();
        match pushed {
            Ok(()) => document.push(table),
            Err(err) => {
                warn!("Skipping company logo: {}", err);
                document.push(name());
            }
        }
    }

    /// Decoded logo, preferring stored bytes over the configured path.
    fn logo(&self) -> Option<DynamicImage> {
        let decoded = if let Some(data) = &self.company.logo_data {
            elements::decode_image_from_bytes(data)
        } else if let Some(path) = &self.company.logo_path {
            elements::decode_image_from_path(path)
        } else {
            return None;
        };
        decoded
            .map_err(|err| warn!("Company logo is unreadable, rendering without it: {}", err))
            .ok()
    }

    fn metadata_lines(&self) -> Vec<Vec<Span>> {
        vec![
            label_value("Report Type", self.request.report_type().label()),
            label_value("Period", self.request.period_label()),
            label_value(
                "Generated on",
                self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ]
    }

    fn summary_table(&self) -> Result<TableLayout, ReportError> {
        let mut table = framed_table(vec![3, 2]);
        table
            .row()
            .element(cell("Metric", true))
            .element(cell("Value", true))
            .push()?;
        for (metric, value) in self.data.summary.table_rows() {
            table
                .row()
                .element(cell(metric, false))
                .element(cell(value, false))
                .push()?;
        }
        Ok(table)
    }

    fn project_table(&self) -> Result<TableLayout, ReportError> {
        let mut table = framed_table(vec![2, 2, 3, 2]);
        let mut header = table.row();
        for title in ["Project ID", "Stands Sold", "Value ($)", "Stands Available"] {
            header = header.element(cell(title, true));
        }
        header.push()?;

        let rows = self.data.projects.table_rows();
        let totals_index = self.data.projects.totals().map(|_| rows.len() - 1);
        for (index, row) in rows.into_iter().enumerate() {
            let bold = Some(index) == totals_index;
            let mut table_row = table.row();
            for value in row {
                table_row = table_row.element(cell(value, bold));
            }
            table_row.push()?;
        }
        Ok(table)
    }
}

fn heading(text: impl Into<String>) -> impl Element {
    Paragraph::new(text.into())
        .styled(Style::new().bold().with_font_size(13).with_color(HEADING_COLOR))
        .padded(Margins::trbl(0, 0, 2, 0))
}

fn framed_table(weights: Vec<usize>) -> TableLayout {
    let mut table = TableLayout::new(weights);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    table
}

fn cell(text: impl Into<String>, bold: bool) -> impl Element {
    let style = if bold { Style::new().bold() } else { Style::new() };
    Paragraph::new(StyledString::new(text.into(), style)).padded(1)
}

/// QR code for `data` as a grayscale image.
pub fn qr_image(data: &str) -> Result<DynamicImage, ReportError> {
    let code = QrCode::new(data.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_PIXELS, QR_MIN_PIXELS)
        .build();
    Ok(DynamicImage::ImageLuma8(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::GenericImageView;

    use crate::period::ReportType;

    fn document() -> ReportDocument {
        ReportDocument {
            request: ReportRequest::new(
                ReportType::Weekly,
                NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            )
            .unwrap(),
            data: ReportData::default(),
            company: CompanySettings::default(),
            generated_at: NaiveDate::from_ymd_opt(2025, 1, 13)
                .unwrap()
                .and_hms_opt(2, 0, 0)
                .unwrap(),
            share_url: None,
        }
    }

    #[test]
    fn title_and_metadata_follow_request() {
        let document = document();
        assert_eq!(document.title(), "Weekly Sales Report");

        let lines: Vec<String> = document
            .metadata_lines()
            .iter()
            .map(|spans| spans.iter().map(Span::text).collect())
            .collect();
        assert_eq!(
            lines,
            vec![
                "Report Type: Weekly",
                "Period: 2025-01-06 to 2025-01-12",
                "Generated on: 2025-01-13 02:00:00",
            ]
        );
    }

    #[test]
    fn qr_image_is_square_and_large_enough() {
        let image = qr_image("https://reports.example.com/generated_reports/a.pdf").unwrap();
        let (width, height) = image.dimensions();
        assert_eq!(width, height);
        assert!(width >= QR_MIN_PIXELS);
    }

    #[test]
    fn unreadable_logo_is_skipped() {
        let mut document = document();
        document.company.logo_data = Some(b"definitely not a png".to_vec());
        assert!(document.logo().is_none());

        document.company.logo_data = None;
        document.company.logo_path = Some("/nonexistent/logo.png".into());
        assert!(document.logo().is_none());
    }
}
