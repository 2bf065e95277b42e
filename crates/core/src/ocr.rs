//! OCR collaborator contract and pure helpers for tesseract output.
//!
//! The engine itself lives in the shell crate. This module only defines what
//! an engine hands back ([`OcrPage`]) and how raw tesseract output is turned
//! into that shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::char_boxes::CharBoxIndex;
use crate::geometry::Rect;

/// Everything an OCR engine reports for one page image.
///
/// `elementary_chars` and `elementary_boxes` are parallel, contain no
/// whitespace, and follow the order of `raw_text`. Boxes use the engine's
/// bottom-up convention (`top > bottom`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    pub raw_text: String,
    pub elementary_chars: Vec<char>,
    pub elementary_boxes: Vec<Rect>,
    pub image_width: u32,
    pub image_height: u32,
}

impl OcrPage {
    /// Normalize the text and align it with the glyph boxes.
    pub fn index(&self) -> CharBoxIndex {
        let text = normalize_ocr_text(&self.raw_text);
        CharBoxIndex::build(
            &text,
            &self.elementary_chars,
            &self.elementary_boxes,
            self.image_height as i32,
        )
    }
}

/// A page image handed to an OCR engine.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Encoded image bytes (PNG, JPEG, ...).
    pub bytes: Vec<u8>,
    /// File extension matching the encoding, without the dot.
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Recognizes text and glyph boxes on a page image.
pub trait OcrEngine {
    type Error: std::error::Error + Send + Sync + 'static;

    fn recognize(&self, image: &PageImage) -> Result<OcrPage, Self::Error>;
}

/// Flatten raw engine text to a single line.
///
/// Trailing form feeds (page separators) and line-break whitespace at the end
/// are dropped; remaining line breaks become spaces so character offsets stay
/// stable.
pub fn normalize_ocr_text(raw: &str) -> String {
    raw.trim_end_matches(|c: char| c == '\u{000C}' || c == '\n' || c == '\r')
        .chars()
        .map(|c| match c {
            '\r' | '\n' | '\u{000C}' => ' ',
            other => other,
        })
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Malformed box line {line}: {reason}")]
pub struct BoxParseError {
    pub line: usize,
    pub reason: String,
}

/// Parse tesseract "box" output into elementary arrays.
///
/// Each line reads `<char> <left> <bottom> <right> <top> <page>` with the
/// origin at the bottom-left of the image. Blank lines are ignored.
///
/// A glyph made of several code points (a base letter with combining marks,
/// or a script cluster) contributes each code point with the same box, so
/// the text walk in [`CharBoxIndex::build`] can still match it.
pub fn parse_box_output(output: &str) -> Result<(Vec<char>, Vec<Rect>), BoxParseError> {
    let mut chars = Vec::new();
    let mut boxes = Vec::new();

    for (i, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let err = |reason: &str| BoxParseError {
            line: i + 1,
            reason: reason.to_string(),
        };

        // The glyph itself is the first character; split the numbers off the
        // end so a literal space glyph cannot shift the columns.
        let mut fields = line.rsplitn(6, ' ');
        let mut numbers = [0i32; 5];
        for slot in numbers.iter_mut().rev() {
            let field = fields.next().ok_or_else(|| err("too few fields"))?;
            *slot = field
                .parse()
                .map_err(|_| err(&format!("invalid number '{field}'")))?;
        }
        let glyph = fields.next().ok_or_else(|| err("missing glyph"))?;
        if glyph.is_empty() {
            return Err(err("empty glyph"));
        }

        // numbers = [left, bottom, right, top, page]
        let [left, bottom, right, top, _page] = numbers;
        let rect = Rect {
            left,
            top,
            right,
            bottom,
        };
        for ch in glyph.chars() {
            chars.push(ch);
            boxes.push(rect);
        }
    }

    Ok((chars, boxes))
}
