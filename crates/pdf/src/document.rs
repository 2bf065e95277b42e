use std::io::Write;
use std::path::Path;

use lopdf::{Dictionary, Object};

use crate::PdfError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// A page's MediaBox in PDF user space (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

/// An open PDF document backed by [`lopdf::Document`].
pub struct PdfDocument {
    pub(crate) doc: lopdf::Document,
}

impl PdfDocument {
    /// Read and parse a PDF file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a PDF from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Page ids in document order; position `i` is page index `i`.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Page id for a zero-based page index.
    pub fn page_id(&self, index: usize) -> Result<PageId, PdfError> {
        self.page_ids()
            .get(index)
            .copied()
            .ok_or(PdfError::PageNotFound(index))
    }

    /// The page's MediaBox, inherited through the page tree if needed.
    pub fn page_box(&self, page: PageId) -> Result<PageBox, PdfError> {
        let page_dict = self.page_dict(page)?;

        let media_box = self
            .find_media_box(page_dict)
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;

        let nums = self.array_to_f32s(&media_box)?;
        let [x0, y0, x1, y1] = nums[..] else {
            return Err(PdfError::Parse(format!(
                "MediaBox has {} elements, expected 4",
                nums.len()
            )));
        };

        // Corners may be given in any order.
        Ok(PageBox {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        })
    }

    /// Serialize the document to `writer`.
    pub fn save_to<W: Write>(&mut self, writer: &mut W) -> Result<(), PdfError> {
        self.doc
            .save_to(writer)
            .map_err(|e| PdfError::Write(e.to_string()))
    }

    /// Serialize the document to a file, creating or truncating it.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.save_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    // -- crate helpers ------------------------------------------------------

    pub(crate) fn page_dict(&self, page: PageId) -> Result<&Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Follow a single level of indirection.
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    pub(crate) fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(obj).as_dict().ok()
    }

    // -- private helpers ----------------------------------------------------

    /// Walk up the page tree to find the MediaBox array.
    fn find_media_box(&self, dict: &Dictionary) -> Option<Vec<Object>> {
        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Ok(arr) = self.resolve(obj).as_array() {
                return Some(arr.clone());
            }
        }

        let parent = dict.get(b"Parent").ok()?;
        let parent_dict = self.resolve_dict(parent)?;
        self.find_media_box(parent_dict)
    }

    fn array_to_f32s(&self, objects: &[Object]) -> Result<Vec<f32>, PdfError> {
        objects
            .iter()
            .map(|obj| match self.resolve(obj) {
                Object::Integer(i) => Ok(*i as f32),
                Object::Real(f) => Ok(*f),
                other => Err(PdfError::Parse(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }
}
