//! PDF plumbing for scanned documents.
//!
//! Reads page geometry and the embedded scan image of each page, and draws
//! entity regions back onto the pages as stroked rectangles.

use thiserror::Error;

pub mod document;
pub mod overlay;
pub mod page_image;

pub use document::{PageBox, PageId, PdfDocument};
pub use overlay::{region_to_user_space, OverlaySink, OverlayStyle};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page not found: {0}")]
    PageNotFound(usize),
    #[error("Page object {0} has no image to OCR")]
    NoPageImage(u32),
    #[error("Unsupported page image: {0}")]
    UnsupportedImage(String),
    #[error("Invalid overlay style: {0}")]
    InvalidStyle(String),
    #[error("PDF write error: {0}")]
    Write(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
