//! Page-level annotation pipeline.
//!
//! Takes fully materialized pages (OCR and NER already done), resolves every
//! entity and keeps only the regions that can be drawn. Pages never depend on
//! each other; results come back in input order.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::char_boxes::CharBoxIndex;
use crate::geometry::{PageScale, Region};
use crate::resolve::{resolve_entity, EntitySpan, InvalidSpan};

/// One page's worth of input to the pipeline.
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based position of the page in its document.
    pub index: usize,
    pub chars: CharBoxIndex,
    pub entities: Vec<EntitySpan>,
    pub scale: Option<PageScale>,
}

/// Drawable regions for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub page_index: usize,
    pub regions: Vec<Region>,
    /// Number of entities handed to the resolver.
    pub entity_count: usize,
    /// Entities that resolved to nothing drawable.
    pub unlocated: usize,
}

/// What to do with an entity whose span does not fit the page text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpanPolicy {
    /// Stop and report the page and span.
    #[default]
    Abort,
    /// Log the span and carry on with the next entity.
    Skip,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Page {page}: {source}")]
    InvalidSpan {
        page: usize,
        #[source]
        source: InvalidSpan,
    },
    #[error("Renderer failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Consumes the pipeline's output, typically by drawing on the source PDF.
pub trait RegionSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn render(&mut self, results: &[PageResult]) -> Result<(), Self::Error>;
}

/// Resolve one page into its drawable regions.
pub fn process_page(page: &Page, policy: SpanPolicy) -> Result<PageResult, PipelineError> {
    let mut regions = Vec::with_capacity(page.entities.len());
    let mut unlocated = 0;

    for entity in &page.entities {
        match resolve_entity(&page.chars, entity, page.scale) {
            Ok(Some(region)) => regions.push(region),
            Ok(None) => {
                debug!(
                    "page {}: entity {:?} ({}) has no visual box",
                    page.index, entity.text, entity.label
                );
                unlocated += 1;
            }
            Err(source) => match policy {
                SpanPolicy::Abort => {
                    return Err(PipelineError::InvalidSpan {
                        page: page.index,
                        source,
                    })
                }
                SpanPolicy::Skip => {
                    warn!("page {}: skipping entity {:?}: {}", page.index, entity.text, source);
                }
            },
        }
    }

    Ok(PageResult {
        page_index: page.index,
        regions,
        entity_count: page.entities.len(),
        unlocated,
    })
}

/// Resolve all pages, in order.
pub fn run(pages: &[Page], policy: SpanPolicy) -> Result<Vec<PageResult>, PipelineError> {
    pages.iter().map(|page| process_page(page, policy)).collect()
}

/// Resolve all pages and hand the results to `sink`.
pub fn run_into<S: RegionSink>(
    pages: &[Page],
    policy: SpanPolicy,
    sink: &mut S,
) -> Result<Vec<PageResult>, PipelineError> {
    let results = run(pages, policy)?;
    sink.render(&results)
        .map_err(|e| PipelineError::Sink(Box::new(e)))?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn page(index: usize, text: &str, entities: Vec<EntitySpan>) -> Page {
        let glyphs: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        // One 10x10 box per glyph on a 100px tall image, bottom-up.
        let boxes: Vec<Rect> = (0..glyphs.len() as i32)
            .map(|i| Rect::new(i * 10, 100, i * 10 + 10, 90))
            .collect();
        Page {
            index,
            chars: CharBoxIndex::build(text, &glyphs, &boxes, 100),
            entities,
            scale: None,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        received: Vec<PageResult>,
    }

    impl RegionSink for RecordingSink {
        type Error = std::io::Error;

        fn render(&mut self, results: &[PageResult]) -> Result<(), Self::Error> {
            self.received.extend_from_slice(results);
            Ok(())
        }
    }

    struct FailingSink;

    impl RegionSink for FailingSink {
        type Error = std::io::Error;

        fn render(&mut self, _results: &[PageResult]) -> Result<(), Self::Error> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only output",
            ))
        }
    }

    #[test]
    fn test_run_keeps_page_order() {
        let pages = vec![
            page(0, "Anna Berlin", vec![EntitySpan::new("Anna", 0, 4, "PER")]),
            page(1, "nichts", vec![]),
            page(2, "Bonn", vec![EntitySpan::new("Bonn", 0, 4, "LOC")]),
        ];
        let results = run(&pages, SpanPolicy::Abort).unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(results[0].regions, vec![Region::new(0.0, 0.0, 40.0, 10.0)]);
        assert!(results[1].regions.is_empty());
        assert_eq!(results[2].regions.len(), 1);
    }

    #[test]
    fn test_unlocated_entities_are_counted_not_drawn() {
        let pages = vec![page(
            0,
            "a  b",
            vec![
                EntitySpan::new("  ", 1, 3, "MISC"),
                EntitySpan::new("b", 3, 4, "PER"),
            ],
        )];
        let results = run(&pages, SpanPolicy::Abort).unwrap();
        assert_eq!(results[0].entity_count, 2);
        assert_eq!(results[0].unlocated, 1);
        assert_eq!(results[0].regions.len(), 1);
    }

    #[test]
    fn test_abort_policy_reports_page() {
        let pages = vec![
            page(0, "ok", vec![]),
            page(1, "abc", vec![EntitySpan::new("", 3, 2, "PER")]),
        ];
        match run(&pages, SpanPolicy::Abort) {
            Err(PipelineError::InvalidSpan { page, source }) => {
                assert_eq!(page, 1);
                assert_eq!(source.start, 3);
            }
            other => panic!("expected InvalidSpan, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_policy_drops_bad_span() {
        let pages = vec![page(
            0,
            "abc",
            vec![
                EntitySpan::new("", 2, 9, "PER"),
                EntitySpan::new("abc", 0, 3, "ORG"),
            ],
        )];
        let results = run(&pages, SpanPolicy::Skip).unwrap();
        assert_eq!(results[0].regions, vec![Region::new(0.0, 0.0, 30.0, 10.0)]);
        assert_eq!(results[0].unlocated, 0);
    }

    #[test]
    fn test_run_into_hands_results_to_sink() {
        let pages = vec![page(0, "Ulm", vec![EntitySpan::new("Ulm", 0, 3, "LOC")])];
        let mut sink = RecordingSink::default();
        let results = run_into(&pages, SpanPolicy::Abort, &mut sink).unwrap();
        assert_eq!(sink.received, results);
    }

    #[test]
    fn test_sink_failure_surfaces() {
        let pages = vec![page(0, "Ulm", vec![])];
        let err = run_into(&pages, SpanPolicy::Abort, &mut FailingSink).unwrap_err();
        assert!(matches!(err, PipelineError::Sink(_)));
        assert!(err.to_string().contains("read-only output"));
    }

    #[test]
    fn test_page_result_json_shape() {
        let result = PageResult {
            page_index: 2,
            regions: vec![Region::new(1.0, 2.0, 3.0, 4.0)],
            entity_count: 1,
            unlocated: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["page_index"], 2);
        assert_eq!(json["regions"][0]["right"], 3.0);
    }

    #[test]
    fn test_empty_document() {
        assert!(run(&[], SpanPolicy::Abort).unwrap().is_empty());
    }
}
