//! Page layout for a slide deck.
//!
//! [`layout`] turns slides into a [`Document`] of pages and blocks;
//! [`render`] additionally writes that document as PDF bytes.

use crate::error::PresentoError;
use crate::pdf;
use crate::slide::{SlideDeck, SlideRecord};

/// A decoded image ready for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    /// The encoded bytes as attached to the slide.
    pub data: Vec<u8>,
}

/// One element on a page, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Image(PageImage),
    Paragraph(String),
    Bullet(String),
}

/// The blocks of a single slide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn bullets(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Bullet(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub pages: Vec<Page>,
}

/// Decode an attached image, reporting why it cannot be placed.
pub fn decode_image(data: &[u8]) -> Result<PageImage, PresentoError> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| PresentoError::Render(format!("undecodable image: {}", e)))?;
    Ok(PageImage {
        width: decoded.width(),
        height: decoded.height(),
        data: data.to_vec(),
    })
}

fn layout_slide(index: usize, slide: &SlideRecord) -> Page {
    let mut page = Page::default();

    if !slide.title.is_empty() {
        page.blocks.push(Block::Heading(slide.title.clone()));
    }

    if let Some(data) = slide.image.as_deref() {
        match decode_image(data) {
            Ok(image) => page.blocks.push(Block::Image(image)),
            Err(e) => tracing::error!(slide = index + 1, error = %e, "Error adding image to document"),
        }
    }

    if !slide.description.is_empty() {
        page.blocks.push(Block::Paragraph(slide.description.clone()));
    }

    page.blocks.extend(
        slide
            .takeaways
            .iter()
            .map(|t| Block::Bullet(t.clone())),
    );

    page
}

/// Lay out one page per slide. Empty fields produce no block.
pub fn layout(deck: &SlideDeck) -> Document {
    Document {
        pages: deck
            .iter()
            .enumerate()
            .map(|(i, slide)| layout_slide(i, slide))
            .collect(),
    }
}

/// Lay out the deck and write it as a PDF.
pub fn render(deck: &SlideDeck, title: &str) -> Result<Vec<u8>, PresentoError> {
    let document = layout(deck);
    pdf::write_pdf(&document, title)
}
