//! Per-character rectangle index for a page of recognized text.
//!
//! OCR engines report the page text and the glyph boxes through two separate
//! channels. The text contains whitespace, the box list does not. [`CharBoxIndex::build`]
//! walks both at once and produces a single sequence in which every character
//! of the text carries its own optional rectangle.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// One character of page text together with its pixel box, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharBox {
    pub ch: char,
    pub rect: Option<Rect>,
}

/// Alignment counters gathered while building an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentStats {
    /// Characters that received a rectangle.
    pub matched: usize,
    /// Whitespace characters.
    pub whitespace: usize,
    /// Non-whitespace characters that found no matching glyph.
    pub unaligned: usize,
}

/// The character-rectangle array of one page.
///
/// Immutable once built. `text()` and `rects()` always have the same length
/// in characters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharBoxIndex {
    text: String,
    entries: Vec<CharBox>,
    rects: Vec<Option<Rect>>,
    stats: AlignmentStats,
}

impl CharBoxIndex {
    /// Align `raw_text` with the elementary glyph arrays.
    ///
    /// `elementary_boxes` are in the OCR engine's bottom-up convention and are
    /// flipped against `image_height`. A text character that does not match
    /// the glyph under the cursor gets no rectangle and leaves the cursor in
    /// place. If the two elementary arrays differ in length the longer one is
    /// truncated.
    pub fn build(
        raw_text: &str,
        elementary_chars: &[char],
        elementary_boxes: &[Rect],
        image_height: i32,
    ) -> Self {
        let glyphs: Vec<(char, &Rect)> = elementary_chars
            .iter()
            .copied()
            .zip(elementary_boxes.iter())
            .collect();

        let mut cursor = 0;
        let mut stats = AlignmentStats::default();
        let mut entries = Vec::with_capacity(raw_text.len());

        for ch in raw_text.chars() {
            let rect = if ch.is_whitespace() {
                stats.whitespace += 1;
                None
            } else {
                match glyphs.get(cursor) {
                    Some(&(glyph, bx)) if glyph == ch => {
                        cursor += 1;
                        stats.matched += 1;
                        Some(flip_vertical(bx, image_height))
                    }
                    _ => {
                        stats.unaligned += 1;
                        None
                    }
                }
            };
            entries.push(CharBox { ch, rect });
        }

        Self::from_entries(entries, stats)
    }

    /// Build an index from already-aligned `(char, rect)` entries, e.g. a
    /// previously serialized OCR dump.
    pub fn from_char_boxes(entries: Vec<CharBox>) -> Self {
        let stats = entries.iter().fold(AlignmentStats::default(), |mut s, e| {
            match e.rect {
                Some(_) => s.matched += 1,
                None if e.ch.is_whitespace() => s.whitespace += 1,
                None => s.unaligned += 1,
            }
            s
        });
        Self::from_entries(entries, stats)
    }

    fn from_entries(entries: Vec<CharBox>, stats: AlignmentStats) -> Self {
        let text = entries.iter().map(|e| e.ch).collect();
        let rects = entries.iter().map(|e| e.rect).collect();
        Self {
            text,
            entries,
            rects,
            stats,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rects(&self) -> &[Option<Rect>] {
        &self.rects
    }

    pub fn stats(&self) -> AlignmentStats {
        self.stats
    }

    /// Number of characters (not bytes) in the page text.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Characters `[start, end)` of the page text, by character offset.
    pub fn text_slice(&self, start: usize, end: usize) -> Option<String> {
        self.entries
            .get(start..end)
            .map(|slice| slice.iter().map(|e| e.ch).collect())
    }
}

/// Convert a bottom-up glyph box into the top-down pixel convention.
fn flip_vertical(rect: &Rect, image_height: i32) -> Rect {
    Rect {
        left: rect.left,
        top: image_height - rect.top,
        right: rect.right,
        bottom: image_height - rect.bottom,
    }
}
