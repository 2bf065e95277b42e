//! Drawing entity regions back onto PDF pages.
//!
//! The page's existing content is wrapped in `q … Q` so whatever graphics
//! state it leaves behind cannot leak into the overlay, then one stroke-only
//! stream is appended with a rectangle per region.

use std::path::PathBuf;

use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{Object, ObjectId, Stream};
use pdfner_core::{PageResult, Region, RegionSink};

use crate::document::{PageBox, PageId, PdfDocument};
use crate::PdfError;

/// Stroke colour and width for region outlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// RGB components in `0.0..=1.0`.
    pub color: [f32; 3],
    /// Line width in points.
    pub line_width: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 0.0, 0.0],
            line_width: 1.0,
        }
    }
}

impl OverlayStyle {
    /// Parse a `#RRGGBB` (or `RRGGBB`) colour.
    pub fn from_hex(hex: &str, line_width: f32) -> Result<Self, PdfError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(PdfError::InvalidStyle(format!("bad colour '{hex}'")));
        }
        if !(line_width.is_finite() && line_width > 0.0) {
            return Err(PdfError::InvalidStyle(format!(
                "line width must be positive, got {line_width}"
            )));
        }

        let mut color = [0.0; 3];
        for (i, component) in color.iter_mut().enumerate() {
            let byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| PdfError::InvalidStyle(format!("bad colour '{hex}'")))?;
            *component = f32::from(byte) / 255.0;
        }

        Ok(Self { color, line_width })
    }
}

/// Convert a top-left page-space region into a PDF `re` rectangle
/// `[x, y, width, height]` with a bottom-left origin.
pub fn region_to_user_space(region: &Region, page_box: &PageBox) -> [f32; 4] {
    [
        page_box.llx + region.left,
        page_box.ury - region.bottom,
        region.width(),
        region.height(),
    ]
}

impl PdfDocument {
    /// Outline `regions` on a page.
    ///
    /// Does nothing when `regions` is empty.
    pub fn draw_regions(
        &mut self,
        page: PageId,
        regions: &[Region],
        style: &OverlayStyle,
    ) -> Result<(), PdfError> {
        if regions.is_empty() {
            return Ok(());
        }

        let page_box = self.page_box(page)?;
        let existing = self.content_refs(page)?;

        let prefix = Content {
            operations: vec![Operation::new("q", vec![])],
        };
        let overlay = Content {
            operations: overlay_operations(regions, &page_box, style),
        };

        let prefix_id = self.add_content_stream(prefix)?;
        let overlay_id = self.add_content_stream(overlay)?;

        let contents: Vec<Object> = std::iter::once(prefix_id)
            .chain(existing)
            .chain(std::iter::once(overlay_id))
            .map(Object::Reference)
            .collect();

        self.doc
            .get_object_mut(page)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Parse(format!("cannot update page: {e}")))?
            .set("Contents", contents);

        debug!("drew {} region(s) on page {:?}", regions.len(), page);
        Ok(())
    }

    /// References to the page's content streams, in painting order.
    fn content_refs(&mut self, page: PageId) -> Result<Vec<ObjectId>, PdfError> {
        let contents = match self.page_dict(page)?.get(b"Contents") {
            Ok(obj) => obj.clone(),
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Reference(id) => match self.doc.get_object(id) {
                Ok(Object::Array(arr)) => Ok(array_refs(arr)),
                _ => Ok(vec![id]),
            },
            Object::Array(arr) => Ok(array_refs(&arr)),
            // A direct stream has to become an indirect object to share an array.
            Object::Stream(stream) => Ok(vec![self.doc.add_object(stream)]),
            other => Err(PdfError::Parse(format!(
                "unexpected Contents object: {other:?}"
            ))),
        }
    }

    fn add_content_stream(&mut self, content: Content) -> Result<ObjectId, PdfError> {
        let bytes = content
            .encode()
            .map_err(|e| PdfError::Write(format!("cannot encode overlay: {e}")))?;
        Ok(self.doc.add_object(Stream::new(lopdf::Dictionary::new(), bytes)))
    }
}

fn array_refs(arr: &[Object]) -> Vec<ObjectId> {
    arr.iter()
        .filter_map(|obj| obj.as_reference().ok())
        .collect()
}

fn overlay_operations(regions: &[Region], page_box: &PageBox, style: &OverlayStyle) -> Vec<Operation> {
    let [r, g, b] = style.color;
    let mut ops = vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("RG", vec![r.into(), g.into(), b.into()]),
        Operation::new("w", vec![style.line_width.into()]),
    ];

    for region in regions {
        let [x, y, w, h] = region_to_user_space(region, page_box);
        ops.push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
    }

    ops.push(Operation::new("S", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// A [`RegionSink`] that outlines every result on a document and saves it.
pub struct OverlaySink {
    document: PdfDocument,
    output: PathBuf,
    style: OverlayStyle,
    pages_drawn: usize,
}

impl OverlaySink {
    pub fn new(document: PdfDocument, output: impl Into<PathBuf>, style: OverlayStyle) -> Self {
        Self {
            document,
            output: output.into(),
            style,
            pages_drawn: 0,
        }
    }

    /// Number of pages that received at least one outline.
    pub fn pages_drawn(&self) -> usize {
        self.pages_drawn
    }
}

impl RegionSink for OverlaySink {
    type Error = PdfError;

    fn render(&mut self, results: &[PageResult]) -> Result<(), Self::Error> {
        for result in results.iter().filter(|r| !r.regions.is_empty()) {
            let page = self.document.page_id(result.page_index)?;
            self.document.draw_regions(page, &result.regions, &self.style)?;
            self.pages_drawn += 1;
        }
        self.document.save(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{single_page_pdf, to_bytes};
    use lopdf::Dictionary;

    fn load_page_ops(path: &std::path::Path) -> Vec<Operation> {
        let doc = lopdf::Document::load(path).unwrap();
        let page = *doc.get_pages().values().next().unwrap();
        let bytes = doc.get_page_content(page).unwrap();
        Content::decode(&bytes).unwrap().operations
    }

    fn operands_f32(op: &Operation) -> Vec<f32> {
        op.operands.iter().map(|o| o.as_float().unwrap()).collect()
    }

    fn sample_pdf() -> PdfDocument {
        PdfDocument::from_bytes(&to_bytes(single_page_pdf(
            Dictionary::new(),
            b"0 0 1 rg 10 10 50 50 re f\n",
        )))
        .unwrap()
    }

    #[test]
    fn test_style_from_hex() {
        let style = OverlayStyle::from_hex("#00FF00", 2.0).unwrap();
        assert_eq!(style.color, [0.0, 1.0, 0.0]);
        assert_eq!(style.line_width, 2.0);
        assert_eq!(OverlayStyle::from_hex("FF0000", 1.0).unwrap(), OverlayStyle::default());
    }

    #[test]
    fn test_style_rejects_bad_input() {
        assert!(OverlayStyle::from_hex("#FFF", 1.0).is_err());
        assert!(OverlayStyle::from_hex("#GG0000", 1.0).is_err());
        assert!(OverlayStyle::from_hex("#ÄÄÄ", 1.0).is_err());
        assert!(OverlayStyle::from_hex("#FF0000", 0.0).is_err());
    }

    #[test]
    fn test_region_to_user_space_flips_y() {
        let page_box = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        };
        let region = Region::new(100.0, 50.0, 150.0, 70.0);
        assert_eq!(region_to_user_space(&region, &page_box), [100.0, 722.0, 50.0, 20.0]);
    }

    #[test]
    fn test_region_to_user_space_offset_media_box() {
        let page_box = PageBox {
            llx: 10.0,
            lly: 20.0,
            urx: 110.0,
            ury: 220.0,
        };
        let region = Region::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(region_to_user_space(&region, &page_box), [10.0, 210.0, 10.0, 10.0]);
    }

    #[test]
    fn test_draw_regions_wraps_original_content() {
        let mut pdf = sample_pdf();
        let page = pdf.page_id(0).unwrap();
        pdf.draw_regions(
            page,
            &[Region::new(100.0, 50.0, 150.0, 70.0), Region::new(0.0, 0.0, 5.0, 5.0)],
            &OverlayStyle::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        pdf.save(&out).unwrap();

        let ops = load_page_ops(&out);
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(
            names,
            vec!["q", "rg", "re", "f", "Q", "q", "RG", "w", "re", "re", "S", "Q"]
        );

        assert_eq!(operands_f32(&ops[6]), vec![1.0, 0.0, 0.0]);
        assert_eq!(operands_f32(&ops[8]), vec![100.0, 722.0, 50.0, 20.0]);
        assert_eq!(operands_f32(&ops[9]), vec![0.0, 787.0, 5.0, 5.0]);
    }

    #[test]
    fn test_draw_no_regions_leaves_page_untouched() {
        let mut pdf = sample_pdf();
        let page = pdf.page_id(0).unwrap();
        let before = pdf.page_dict(page).unwrap().get(b"Contents").unwrap().clone();
        pdf.draw_regions(page, &[], &OverlayStyle::default()).unwrap();
        let after = pdf.page_dict(page).unwrap().get(b"Contents").unwrap().clone();
        assert_eq!(before, after);
    }

    #[test]
    fn test_draw_twice_keeps_both_overlays() {
        let mut pdf = sample_pdf();
        let page = pdf.page_id(0).unwrap();
        let style = OverlayStyle::default();
        pdf.draw_regions(page, &[Region::new(0.0, 0.0, 1.0, 1.0)], &style).unwrap();
        pdf.draw_regions(page, &[Region::new(2.0, 2.0, 3.0, 3.0)], &style).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        pdf.save(&out).unwrap();

        let ops = load_page_ops(&out);
        assert_eq!(ops.iter().filter(|o| o.operator == "re").count(), 3);
        let pushes = ops.iter().filter(|o| o.operator == "q").count();
        let pops = ops.iter().filter(|o| o.operator == "Q").count();
        assert_eq!(pushes, pops);
    }

    #[test]
    fn test_overlay_sink_saves_document() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated.pdf");
        let mut sink = OverlaySink::new(sample_pdf(), &out, OverlayStyle::default());

        sink.render(&[
            PageResult {
                page_index: 0,
                regions: vec![Region::new(1.0, 2.0, 3.0, 4.0)],
                entity_count: 1,
                unlocated: 0,
            },
        ])
        .unwrap();

        assert_eq!(sink.pages_drawn(), 1);
        let ops = load_page_ops(&out);
        assert!(ops.iter().any(|o| o.operator == "S"));
    }

    #[test]
    fn test_overlay_sink_rejects_unknown_page() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated.pdf");
        let mut sink = OverlaySink::new(sample_pdf(), &out, OverlayStyle::default());

        let err = sink
            .render(&[PageResult {
                page_index: 5,
                regions: vec![Region::new(1.0, 2.0, 3.0, 4.0)],
                entity_count: 1,
                unlocated: 0,
            }])
            .unwrap_err();
        assert!(matches!(err, PdfError::PageNotFound(5)));
        assert!(!out.exists());
    }
}
