//! PDF output for a laid-out [`Document`].

use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};

use crate::error::PresentoError;
use crate::render::{Block, Document, PageImage};

// US letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const IMAGE_BOX: (f32, f32) = (400.0, 300.0);
const HEADING_SIZE: f32 = 24.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 1.25;
const SPACER: f32 = 12.0;
const BULLET_INDENT: f32 = 10.0;

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn render_err(e: impl std::fmt::Display) -> PresentoError {
    PresentoError::Render(e.to_string())
}

struct Fonts {
    heading: IndirectFontRef,
    body: IndirectFontRef,
}

/// Current layer and vertical position, measured from the page bottom.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageCursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    /// Move to a fresh page when `height` no longer fits.
    fn reserve(&mut self, height: f32) {
        if self.y - height >= MARGIN || self.y >= PAGE_HEIGHT - MARGIN {
            return;
        }
        tracing::warn!("Slide content overflows its page, continuing on the next");
        let (page, layer) = self.doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn text_lines(&mut self, lines: &[String], font: &IndirectFontRef, size: f32, indent: f32) {
        for line in lines {
            let height = size * LEADING;
            self.reserve(height);
            self.layer
                .use_text(line.as_str(), size, mm(MARGIN + indent), mm(self.y - size), font);
            self.y -= height;
        }
    }

    fn image(&mut self, image: &PageImage) {
        let decoded = match image::load_from_memory(&image.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(error = %e, "Error adding image to document");
                return;
            }
        };
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

        let (box_w, box_h) = IMAGE_BOX;
        let scale = (box_w / image.width.max(1) as f32).min(box_h / image.height.max(1) as f32);
        let height = image.height as f32 * scale;

        self.reserve(height);
        Image::from_dynamic_image(&rgb).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(MARGIN)),
                translate_y: Some(mm(self.y - height)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                // One pixel per point before scaling.
                dpi: Some(72.0),
                ..Default::default()
            },
        );
        self.y -= height;
    }

    fn space(&mut self, points: f32) {
        self.y -= points;
    }
}

/// Greedy word wrap to `width` characters.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Approximate characters per line for Helvetica at `size`.
fn line_width(size: f32, indent: f32) -> usize {
    ((PAGE_WIDTH - 2.0 * MARGIN - indent) / (size * 0.5)).max(10.0) as usize
}

fn write_block(cursor: &mut PageCursor<'_>, fonts: &Fonts, block: &Block) {
    match block {
        Block::Heading(text) => {
            let lines = wrap(text, line_width(HEADING_SIZE, 0.0));
            cursor.text_lines(&lines, &fonts.heading, HEADING_SIZE, 0.0);
            cursor.space(SPACER);
        }
        Block::Image(image) => {
            cursor.image(image);
            cursor.space(SPACER);
        }
        Block::Paragraph(text) => {
            let lines = wrap(text, line_width(BODY_SIZE, 0.0));
            cursor.text_lines(&lines, &fonts.body, BODY_SIZE, 0.0);
            cursor.space(SPACER);
        }
        Block::Bullet(text) => {
            let mut lines = wrap(text, line_width(BODY_SIZE, BULLET_INDENT));
            if let Some(first) = lines.first_mut() {
                *first = format!("- {}", first);
            }
            cursor.text_lines(&lines[..lines.len().min(1)], &fonts.body, BODY_SIZE, 0.0);
            if lines.len() > 1 {
                cursor.text_lines(&lines[1..], &fonts.body, BODY_SIZE, BULLET_INDENT);
            }
        }
    }
}

/// Write `document` as a PDF, one page per [`crate::render::Page`].
pub fn write_pdf(document: &Document, title: &str) -> Result<Vec<u8>, PresentoError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");

    let fonts = Fonts {
        heading: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_err)?,
        body: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_err)?,
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        let mut cursor = PageCursor::new(&doc, layer);
        for block in &page.blocks {
            write_block(&mut cursor, &fonts, block);
        }
    }

    doc.save_to_bytes().map_err(render_err)
}
