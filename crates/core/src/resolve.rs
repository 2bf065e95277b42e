//! Entity span to drawable region resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::char_boxes::CharBoxIndex;
use crate::geometry::{merge, to_page_space, PageScale, Region};

/// A labeled, half-open `[start, end)` character range of a page's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl EntitySpan {
    pub fn new(text: impl Into<String>, start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid entity span [{start}, {end}) for text of {len} characters")]
pub struct InvalidSpan {
    pub start: usize,
    pub end: usize,
    pub len: usize,
}

/// An entity paired with its region, or `None` when none of its characters
/// carry a rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub entity: EntitySpan,
    pub region: Option<Region>,
}

/// Resolve a single entity against a page index.
///
/// Out-of-range or inverted spans are rejected, never clamped.
pub fn resolve_entity(
    index: &CharBoxIndex,
    entity: &EntitySpan,
    scale: Option<PageScale>,
) -> Result<Option<Region>, InvalidSpan> {
    let len = index.len();
    if entity.start > entity.end || entity.end > len {
        return Err(InvalidSpan {
            start: entity.start,
            end: entity.end,
            len,
        });
    }

    let rects = &index.rects()[entity.start..entity.end];
    Ok(merge(rects).map(|rect| to_page_space(rect, scale)))
}

/// Resolve every entity of a page, preserving order and count.
///
/// Fails on the first invalid span.
pub fn resolve(
    index: &CharBoxIndex,
    entities: &[EntitySpan],
    scale: Option<PageScale>,
) -> Result<Vec<ResolvedEntity>, InvalidSpan> {
    entities
        .iter()
        .map(|entity| {
            resolve_entity(index, entity, scale).map(|region| ResolvedEntity {
                entity: entity.clone(),
                region,
            })
        })
        .collect()
}
