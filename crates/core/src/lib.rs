//! Core library for pdfner
//!
//! This crate implements the **Functional Core** of pdfner: everything that
//! turns OCR output and entity spans into rectangles that can be drawn over a
//! scanned PDF page. It performs no I/O.
//!
//! # Architecture Overview
//!
//! - **`pdfner_core`** (this crate): alignment, merging, coordinate transforms
//!   and the page pipeline, plus the collaborator traits
//! - **`pdf`**: reading page images out of a PDF and drawing regions back in
//! - **`pdfner`**: the CLI that runs OCR and NER and wires everything up
//!
//! # Data flow
//!
//! ```text
//! OcrPage ──> CharBoxIndex ──> resolve_entity ──> PageResult ──> RegionSink
//!             (char_boxes)     merge + to_page_space   (pipeline)
//! ```
//!
//! - [`char_boxes`]: aligns the page text with the engine's glyph boxes
//! - [`geometry`]: [`Rect`], [`Region`], [`merge`] and [`to_page_space`]
//! - [`resolve`]: maps [`EntitySpan`]s to regions, rejecting bad spans
//! - [`pipeline`]: runs a document's pages and feeds a [`RegionSink`]
//! - [`ocr`] / [`ner`]: collaborator contracts and their pure helpers
//! - [`records`]: per-page OCR and entity records and how they join into pages
//!
//! # Example Usage
//!
//! ```rust
//! use pdfner_core::{resolve, CharBoxIndex, EntitySpan, Rect, Region};
//!
//! // Glyph boxes come bottom-up from the engine; whitespace has none.
//! let index = CharBoxIndex::build(
//!     "ab cd",
//!     &['a', 'b', 'c', 'd'],
//!     &[
//!         Rect::new(0, 10, 1, 9),
//!         Rect::new(1, 10, 2, 9),
//!         Rect::new(3, 10, 4, 9),
//!         Rect::new(4, 10, 5, 9),
//!     ],
//!     10,
//! );
//!
//! let resolved = resolve(&index, &[EntitySpan::new("ab", 0, 2, "PER")], None).unwrap();
//! assert_eq!(resolved[0].region, Some(Region::new(0.0, 0.0, 2.0, 1.0)));
//! ```

pub mod char_boxes;
pub mod geometry;
pub mod ner;
pub mod ocr;
pub mod pipeline;
pub mod records;
pub mod resolve;

pub use char_boxes::{AlignmentStats, CharBox, CharBoxIndex};
pub use geometry::{merge, to_page_space, PageScale, Rect, Region};
pub use ner::{EntityRecognizer, Gazetteer, GazetteerError};
pub use ocr::{normalize_ocr_text, parse_box_output, BoxParseError, OcrEngine, OcrPage, PageImage};
pub use pipeline::{process_page, run, run_into, Page, PageResult, PipelineError, RegionSink, SpanPolicy};
pub use records::{assemble, assemble_indexed, EntityRecord, OcrRecord};
pub use resolve::{resolve, resolve_entity, EntitySpan, InvalidSpan, ResolvedEntity};
