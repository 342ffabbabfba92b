//! Raster bar charts embedded in reports.
//!
//! Charts are drawn straight into an [`image::RgbImage`] so they can be handed
//! to `genpdf` without an intermediate encoding step. Labels use a small
//! built-in 5×7 bitmap font covering digits, upper-case letters and the
//! punctuation that appears in dates and amounts.

use image::{DynamicImage, Rgb, RgbImage};
use log::debug;

use crate::format;

/// Vertical headroom above the tallest bar, as a multiple of the maximum value.
pub const Y_HEADROOM: f64 = 1.2;

const DEFAULT_WIDTH: u32 = 1200;
const DEFAULT_HEIGHT: u32 = 600;
const MARGIN_LEFT: u32 = 90;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 30;
const MARGIN_BOTTOM: u32 = 70;
const GRID_LINES: u32 = 5;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const GRID: Rgb<u8> = Rgb([224, 224, 224]);
const TEXT: Rgb<u8> = Rgb([33, 37, 41]);

/// Configurable bar chart renderer.
#[derive(Clone, Debug)]
pub struct BarChart {
    width: u32,
    height: u32,
    fill: Rgb<u8>,
    edge: Rgb<u8>,
}

impl Default for BarChart {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            // #007bff at 70% opacity over white, with a #0056b3 outline.
            fill: Rgb([77, 163, 255]),
            edge: Rgb([0, 86, 179]),
        }
    }
}

impl BarChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pixel dimensions of the rendered image.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(MARGIN_LEFT + MARGIN_RIGHT + 10);
        self.height = height.max(MARGIN_TOP + MARGIN_BOTTOM + 10);
        self
    }

    /// Renders one bar per `(label, value)` pair; `None` for an empty series.
    pub fn render(&self, series: &[(String, f64)]) -> Option<RgbImage> {
        if series.is_empty() {
            return None;
        }

        let mut canvas = RgbImage::from_pixel(self.width, self.height, WHITE);
        let plot = PlotArea {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: self.width - MARGIN_LEFT - MARGIN_RIGHT,
            height: self.height - MARGIN_TOP - MARGIN_BOTTOM,
        };
        let values: Vec<f64> = series.iter().map(|(_, value)| sanitize(*value)).collect();
        let y_max = y_axis_max(&values);

        for step in 0..=GRID_LINES {
            let tick = y_max * step as f64 / GRID_LINES as f64;
            let y = plot.y_for(tick, y_max);
            fill_rect(&mut canvas, plot.left, y, plot.width, 1, GRID);
            let label = value_label(tick);
            let label_x = plot.left.saturating_sub(text_width(&label, 2) + 8);
            draw_text(&mut canvas, &label, label_x, y.saturating_sub(GLYPH_HEIGHT), 2, TEXT);
        }

        let slot = (plot.width / series.len() as u32).max(1);
        let bar_width = (slot * 3 / 5).clamp(1, 160).min(slot);
        let label_every = label_stride(series, slot);

        for (index, ((label, _), value)) in series.iter().zip(&values).enumerate() {
            let slot_left = plot.left + slot * index as u32;
            let bar_left = slot_left + (slot - bar_width) / 2;
            let bar_top = plot.y_for(*value, y_max);
            let bar_height = plot.bottom() - bar_top;

            if bar_height > 0 {
                fill_rect(&mut canvas, bar_left, bar_top, bar_width, bar_height, self.fill);
                stroke_rect(&mut canvas, bar_left, bar_top, bar_width, bar_height, self.edge);
            }

            let text = value_label(*value);
            let text_x = (slot_left + slot / 2).saturating_sub(text_width(&text, 3) / 2);
            let text_y = bar_top.saturating_sub(GLYPH_HEIGHT * 3 + 6);
            draw_text(&mut canvas, &text, text_x, text_y, 3, TEXT);

            if index % label_every == 0 {
                let label = label.to_uppercase();
                let label_x = (slot_left + slot / 2).saturating_sub(text_width(&label, 2) / 2);
                draw_text(&mut canvas, &label, label_x, plot.bottom() + 14, 2, TEXT);
            }
        }

        fill_rect(&mut canvas, plot.left, plot.top, 2, plot.height + 1, AXIS);
        fill_rect(&mut canvas, plot.left, plot.bottom(), plot.width, 2, AXIS);

        Some(canvas)
    }
}

/// Renders `series` with the default chart settings.
pub fn render_bar_chart(series: &[(String, f64)]) -> Option<DynamicImage> {
    BarChart::new().render(series).map(DynamicImage::ImageRgb8)
}

/// Top of the y axis: [`Y_HEADROOM`] times the largest value, or 1 for all-zero data.
pub fn y_axis_max(values: &[f64]) -> f64 {
    let max = values.iter().copied().map(sanitize).fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * Y_HEADROOM
    } else {
        1.0
    }
}

struct PlotArea {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl PlotArea {
    fn bottom(&self) -> u32 {
        self.top + self.height
    }

    fn y_for(&self, value: f64, y_max: f64) -> u32 {
        let ratio = (value / y_max).clamp(0.0, 1.0);
        self.bottom() - (ratio * self.height as f64).round() as u32
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn value_label(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format::count(value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Draws every n-th x label so that labels never overlap.
fn label_stride(series: &[(String, f64)], slot: u32) -> usize {
    let widest = series
        .iter()
        .map(|(label, _)| text_width(label, 2) + 8)
        .max()
        .unwrap_or(1);
    (widest.div_ceil(slot.max(1)) as usize).max(1)
}

fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let x_end = (x + width).min(canvas.width());
    let y_end = (y + height).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, color);
        }
    }
}

fn stroke_rect(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    fill_rect(canvas, x, y, width, 2, color);
    fill_rect(canvas, x, y, 2, height, color);
    fill_rect(canvas, (x + width).saturating_sub(2), y, 2, height, color);
}

fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        0
    } else {
        chars * (GLYPH_WIDTH + 1) * scale - scale
    }
}

fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    let mut cursor = x;
    for ch in text.chars() {
        let rows = glyph(ch.to_ascii_uppercase());
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_rect(
                        canvas,
                        cursor + col * scale,
                        y + row as u32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
        cursor += (GLYPH_WIDTH + 1) * scale;
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '$' => [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04],
        ' ' => [0x00; 7],
        other => {
            debug!("No chart glyph for {:?}, drawing a blank", other);
            [0x00; 7]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<(String, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("D{}", i), *v))
            .collect()
    }

    #[test]
    fn empty_series_renders_nothing() {
        assert!(BarChart::new().render(&[]).is_none());
        assert!(render_bar_chart(&[]).is_none());
    }

    #[test]
    fn y_axis_has_headroom_above_tallest_bar() {
        assert!((y_axis_max(&[3.0, 5.0, 1.0]) - 6.0).abs() < 1e-9);
        assert_eq!(y_axis_max(&[0.0, f64::NAN]), 1.0);
    }

    #[test]
    fn tallest_bar_stops_below_plot_top() {
        let chart = BarChart::new().with_size(400, 300);
        let image = chart.render(&series(&[10.0])).unwrap();
        assert_eq!(image.dimensions(), (400, 300));

        let plot_height = 300 - MARGIN_TOP - MARGIN_BOTTOM;
        let plot_width = 400 - MARGIN_LEFT - MARGIN_RIGHT;
        let center_x = MARGIN_LEFT + plot_width / 2;
        let expected_top =
            MARGIN_TOP + plot_height - (plot_height as f64 / Y_HEADROOM).round() as u32;

        // Inside the bar just below its top edge.
        let inside = image.get_pixel(center_x, expected_top + 5);
        assert_eq!(*inside, Rgb([77, 163, 255]));
        // Above the value label there is only background.
        let above = image.get_pixel(center_x, MARGIN_TOP + 1);
        assert_ne!(*above, Rgb([77, 163, 255]));
    }

    #[test]
    fn labels_are_thinned_when_slots_are_narrow() {
        let wide = series(&[1.0; 3]);
        assert_eq!(label_stride(&wide, 300), 1);
        let narrow: Vec<(String, f64)> = (0..60)
            .map(|i| (format!("MON 01/{:02}", i % 30), 1.0))
            .collect();
        assert!(label_stride(&narrow, 18) > 1);
    }
}
