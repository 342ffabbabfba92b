//! Document construction helpers for report PDFs.

use std::path::PathBuf;

use crate::fonts;
use genpdf::error::{Error, ErrorKind};
use genpdf::style;
use genpdf::{self, Element, Margins, Mm, PageDecorator, Position, Size};

/// Builder for `genpdf::Document` instances pre-configured with report defaults.
#[derive(Default)]
pub struct DocumentBuilder {
    title: Option<String>,
    font_directory: Option<PathBuf>,
    font_size: Option<u8>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

type ElementFactory = dyn Fn(usize) -> Box<dyn Element>;

impl DocumentBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Searches `directory` first when loading the font family.
    pub fn with_font_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.font_directory = directory;
        self
    }

    /// Sets the default font size in points.
    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Sets the paper size used for newly created documents.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Builds a fully configured `genpdf::Document` instance.
    pub fn build(self) -> Result<genpdf::Document, Error> {
        let font_family = fonts::font_family(self.font_directory.as_deref())?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(title) = self.title {
            document.set_title(title);
        }
        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }
        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }

        let decorator = ConfiguredPageDecorator::new(self.margins, self.footer);
        document.set_page_decorator(decorator);

        Ok(document)
    }
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<ElementFactory>,
}

impl FooterSpec {
    /// Creates a new footer specification.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    page: usize,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl ConfiguredPageDecorator {
    fn new(margins: Option<Margins>, footer: Option<FooterSpec>) -> Self {
        Self {
            page: 0,
            margins,
            footer,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        self.page += 1;

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}
