//! Styled text fragments used for report headings, metadata lines and links.
//!
//! A [`Span`] carries the inline styling a report needs (bold, italic, color)
//! plus an underline flag. `genpdf`'s [`StyledString`] has no
//! underline support, so the flag travels separately in [`StyledSpan`] and is
//! drawn by [`crate::elements::UnderlinedText`].

use genpdf::elements::Paragraph;
use genpdf::style::{Color, Style, StyledString};

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    color: Option<Color>,
    underline: bool,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_underlined(&self) -> bool {
        self.underline
    }

    /// Marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Marks the span as underlined.
    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Assigns a color to the span.
    pub fn colored(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    fn to_style(&self) -> Style {
        let mut style = Style::new();
        if let Some(color) = self.color {
            style.set_color(color);
        }
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        style
    }

    /// Converts the span to a [`StyledString`], dropping the underline flag.
    pub fn to_styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.to_style())
    }
}

impl From<&Span> for StyledString {
    fn from(span: &Span) -> Self {
        span.to_styled_string()
    }
}

impl From<Span> for StyledString {
    fn from(span: Span) -> Self {
        span.to_styled_string()
    }
}

/// A styled span ready to be consumed by `genpdf` elements together with the underline flag.
#[derive(Clone, Debug)]
pub struct StyledSpan {
    /// The styled text fragment.
    pub string: StyledString,
    /// Whether the fragment should be rendered with an underline.
    pub underline: bool,
}

impl StyledSpan {
    pub fn new(string: StyledString, underline: bool) -> Self {
        Self { string, underline }
    }
}

impl From<&Span> for StyledSpan {
    fn from(span: &Span) -> Self {
        StyledSpan::new(span.to_styled_string(), span.underline)
    }
}

impl From<Span> for StyledSpan {
    fn from(span: Span) -> Self {
        StyledSpan::from(&span)
    }
}

/// Converts a sequence of [`Span`] values into styled strings while keeping underline flags.
pub fn spans_to_styled_strings<'a, I>(spans: I) -> Vec<StyledSpan>
where
    I: IntoIterator<Item = &'a Span>,
{
    spans.into_iter().map(StyledSpan::from).collect()
}

/// Builds a paragraph from spans; underline flags are ignored.
pub fn paragraph<I>(spans: I) -> Paragraph
where
    I: IntoIterator<Item = Span>,
{
    let mut paragraph = Paragraph::default();
    for span in spans {
        paragraph.push(span.to_styled_string());
    }
    paragraph
}

/// `Label: value` line with a bold label, as used in report metadata blocks.
pub fn label_value(label: &str, value: impl Into<String>) -> Vec<Span> {
    vec![Span::new(format!("{}: ", label)).bold(), Span::new(value)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_toggle_styles() {
        let span = Span::new("Week").bold().underline();
        assert!(span.is_bold());
        assert!(span.is_underlined());
        assert_eq!(span.text(), "Week");
    }

    #[test]
    fn styled_span_keeps_underline_flag() {
        let spans = [Span::new("plain"), Span::new("link").underline()];
        let styled = spans_to_styled_strings(spans.iter());
        assert!(!styled[0].underline);
        assert!(styled[1].underline);
        assert_eq!(styled[1].string.s, "link");
    }

    #[test]
    fn label_value_bolds_only_the_label() {
        let spans = label_value("Period", "2025-01-01 to 2025-01-07");
        assert_eq!(spans[0].text(), "Period: ");
        assert!(spans[0].is_bold());
        assert!(!spans[1].is_bold());
    }
}
