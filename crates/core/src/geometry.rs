//! Rectangle types, merging and the pixel-to-page transform.
//!
//! Two coordinate spaces meet here:
//!
//! - **OCR pixel space** ([`Rect`]): integer pixels of the page image, origin
//!   at the top-left corner, y growing downward.
//! - **Page space** ([`Region`]): PDF points measured from the top-left
//!   corner of the page box, y growing downward.
//!
//! Both are top-down. The conversion to PDF user space (bottom-up) happens in
//! the renderer, which knows the page box.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Axis-aligned box in OCR pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest rectangle enclosing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Axis-aligned box in page space, ready to be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Region {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Per-axis factor from OCR pixels to page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageScale {
    pub x: f32,
    pub y: f32,
}

impl PageScale {
    pub const IDENTITY: Self = PageScale { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale for an image that covers the whole page box.
    ///
    /// Returns `None` when either image dimension is zero.
    pub fn from_dimensions(
        image_width: u32,
        image_height: u32,
        page_width: f32,
        page_height: f32,
    ) -> Option<Self> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        Some(PageScale {
            x: page_width / image_width as f32,
            y: page_height / image_height as f32,
        })
    }
}

impl Default for PageScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Merge a run of optional character rectangles into their enclosing box.
///
/// Absent entries are ignored. Returns `None` when nothing is left to draw.
/// The reduction is a fold over [`Rect::union`], so input order does not
/// matter.
pub fn merge<'a, I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = &'a Option<Rect>>,
{
    rects
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<Rect>, rect| match acc {
            Some(bounds) => Some(bounds.union(rect)),
            None => Some(*rect),
        })
}

/// Convert a pixel rectangle into page space.
///
/// With no scale the two spaces are taken to be 1:1.
pub fn to_page_space(rect: Rect, scale: Option<PageScale>) -> Region {
    let scale = scale.unwrap_or(PageScale::IDENTITY);
    Region {
        left: rect.left as f32 * scale.x,
        top: rect.top as f32 * scale.y,
        right: rect.right as f32 * scale.x,
        bottom: rect.bottom as f32 * scale.y,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
