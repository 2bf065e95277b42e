//! Serializable per-page records exchanged between pipeline stages.
//!
//! `pdfner ocr` writes [`OcrRecord`]s, an external tagger (or `pdfner
//! annotate` itself) produces [`EntityRecord`]s, and [`assemble`] joins the
//! two into pipeline [`Page`]s. Callers that already built each page's
//! [`CharBoxIndex`] hand it to [`assemble_indexed`] instead.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::char_boxes::CharBoxIndex;
use crate::geometry::PageScale;
use crate::ocr::OcrPage;
use crate::pipeline::Page;
use crate::resolve::EntitySpan;

/// OCR output for one page together with the page's size in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRecord {
    pub page_index: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub ocr: OcrPage,
}

impl OcrRecord {
    /// Pixel-to-point scale, assuming the scan covers the whole page.
    pub fn scale(&self) -> Option<PageScale> {
        PageScale::from_dimensions(
            self.ocr.image_width,
            self.ocr.image_height,
            self.page_width,
            self.page_height,
        )
    }
}

/// Entities found on one page, offsets into the page's normalized OCR text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub page_index: usize,
    pub entities: Vec<EntitySpan>,
}

/// Join OCR and entity records into pipeline pages, in OCR record order.
///
/// Pages without an entity record get no entities. Entity records for pages
/// that have no OCR record are dropped with a warning.
pub fn assemble(ocr: Vec<OcrRecord>, entities: Vec<EntityRecord>) -> Vec<Page> {
    let indexed = ocr
        .into_iter()
        .map(|record| {
            let chars = record.ocr.index();
            (record, chars)
        })
        .collect();
    assemble_indexed(indexed, entities)
}

/// Like [`assemble`], for records whose character index is already built.
pub fn assemble_indexed(
    ocr: Vec<(OcrRecord, CharBoxIndex)>,
    entities: Vec<EntityRecord>,
) -> Vec<Page> {
    let mut by_page: BTreeMap<usize, Vec<EntitySpan>> = BTreeMap::new();
    for record in entities {
        by_page
            .entry(record.page_index)
            .or_default()
            .extend(record.entities);
    }

    let pages: Vec<Page> = ocr
        .into_iter()
        .map(|(record, chars)| {
            let stats = chars.stats();
            debug!(
                "page {}: {} glyphs matched, {} whitespace, {} unaligned",
                record.page_index, stats.matched, stats.whitespace, stats.unaligned
            );

            let entities = by_page.remove(&record.page_index).unwrap_or_default();
            for entity in &entities {
                let covered = chars.text_slice(entity.start, entity.end);
                if covered.as_deref() != Some(entity.text.as_str()) {
                    debug!(
                        "page {}: entity {:?} covers {:?}",
                        record.page_index, entity.text, covered
                    );
                }
            }

            Page {
                index: record.page_index,
                scale: record.scale(),
                chars,
                entities,
            }
        })
        .collect();

    for (page_index, orphans) in by_page {
        warn!(
            "dropping {} entit{} for page {} which has no OCR output",
            orphans.len(),
            if orphans.len() == 1 { "y" } else { "ies" },
            page_index
        );
    }

    pages
}
