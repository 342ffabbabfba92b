use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use stand_reports::fonts;
use stand_reports::model::{DailyTrendPoint, RawMetrics, RawProjectRow, RawStandTotals};
use stand_reports::render::ReportDocument;
use stand_reports::{CompanySettings, ReportData, ReportRequest, ReportType};

const SKIP_HINT: &str = "no report fonts found. Set REPORT_FONTS_DIR or copy assets/fonts next to the binary.";

fn generated_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 13)
        .unwrap()
        .and_hms_opt(2, 0, 0)
        .unwrap()
}

fn sample_data() -> ReportData {
    let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
    ReportData::from_raw(RawMetrics {
        stands: Some(RawStandTotals {
            total_stand_value: Some(Decimal::new(600, 0)),
            total_stands_sold: Some(3),
            total_stands_available: Some(2),
        }),
        deposit: Some(Some(Decimal::new(100, 0))),
        installment: Some(None),
        projects: Some(vec![
            RawProjectRow {
                project_id: Some(1),
                stands_sold: Some(2),
                stands_value: Some(Decimal::new(300, 0)),
                stands_available: Some(1),
            },
            RawProjectRow {
                project_id: None,
                stands_sold: Some(1),
                stands_value: Some(Decimal::new(300, 0)),
                stands_available: Some(1),
            },
        ]),
        daily: Some(vec![
            DailyTrendPoint {
                date: day(1),
                stands_sold: 1,
            },
            DailyTrendPoint {
                date: day(3),
                stands_sold: 2,
            },
        ]),
    })
}

fn sample_document(share_url: Option<&str>) -> ReportDocument {
    ReportDocument {
        request: ReportRequest::new(
            ReportType::Weekly,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
        )
        .unwrap(),
        data: sample_data(),
        company: CompanySettings::default(),
        generated_at: generated_at(),
        share_url: share_url.map(String::from),
    }
}

fn render(document: &ReportDocument) -> Option<Vec<u8>> {
    if !fonts::fonts_available(None) {
        return None;
    }
    Some(document.render(None).expect("render report"))
}

/// Blanks out the parts of a PDF that change on every render (timestamps and IDs).
fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_between(data: &mut [u8], start: &[u8], end: &[u8], keep: &[u8]) {
        let mut offset = 0;
        while let Some(found) = data[offset..]
            .windows(start.len())
            .position(|window| window == start)
        {
            let from = offset + found + start.len();
            let Some(len) = data[from..]
                .windows(end.len())
                .position(|window| window == end)
            else {
                break;
            };
            for byte in &mut data[from..from + len] {
                if !keep.contains(byte) {
                    *byte = b'0';
                }
            }
            offset = from + len + end.len();
        }
    }

    const WHITESPACE: &[u8] = b" \n\r\t";
    let mut normalized = bytes.to_vec();
    let info_tags: [&[u8]; 3] = [b"/CreationDate(", b"/ModDate(", b"/Producer("];
    for tag in info_tags {
        scrub_between(&mut normalized, tag, b")", b"");
    }
    scrub_between(&mut normalized, b"/ID[", b"]", b"<> \n\r\t");
    for element in [
        "xmp:CreateDate",
        "xmp:ModifyDate",
        "xmp:MetadataDate",
        "xmpMM:DocumentID",
        "xmpMM:InstanceID",
        "xmpMM:VersionID",
    ] {
        let open = format!("<{}>", element);
        let close = format!("</{}>", element);
        scrub_between(&mut normalized, open.as_bytes(), close.as_bytes(), WHITESPACE);
    }
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

#[test]
fn renders_a_pdf_document() {
    let Some(bytes) = render(&sample_document(None)) else {
        eprintln!("Skipping renders_a_pdf_document: {}", SKIP_HINT);
        return;
    };
    assert!(bytes.starts_with(b"%PDF"));
    assert!(bytes.len() > 1_000);
}

#[test]
fn share_block_adds_content() {
    let Some(plain) = render(&sample_document(None)) else {
        eprintln!("Skipping share_block_adds_content: {}", SKIP_HINT);
        return;
    };
    let Some(shared) = render(&sample_document(Some(
        "https://reports.example.com/generated_reports/weekly_report_2025-01-01_to_2025-01-07.pdf",
    ))) else {
        return;
    };
    assert!(shared.len() > plain.len());
}

#[test]
fn empty_report_still_renders() {
    let mut document = sample_document(None);
    document.data = ReportData::default();
    let Some(bytes) = render(&document) else {
        eprintln!("Skipping empty_report_still_renders: {}", SKIP_HINT);
        return;
    };
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn unreadable_logo_does_not_fail_rendering() {
    let mut document = sample_document(None);
    document.company.logo_data = Some(b"corrupt".to_vec());
    let Some(bytes) = render(&document) else {
        eprintln!("Skipping unreadable_logo_does_not_fail_rendering: {}", SKIP_HINT);
        return;
    };
    assert!(bytes.starts_with(b"%PDF"));
}

// genpdf does not keep a stable order between several embedded images, so
// this uses the trend chart as the only image.
#[test]
fn rendering_is_deterministic() {
    let document = sample_document(None);
    let (Some(bytes_a), Some(bytes_b)) = (render(&document), render(&document)) else {
        eprintln!("Skipping rendering_is_deterministic: {}", SKIP_HINT);
        return;
    };

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF renders must be deterministic after metadata normalization"
    );
}
