//! Loading a scanned PDF and running OCR over its pages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use pdf::{PdfDocument, PdfError};
use pdfner_core::{OcrEngine, OcrPage, OcrRecord, PageImage};

use crate::prelude::*;
use crate::tesseract::{TesseractOcr, TesseractOptions};

/// A page waiting for OCR.
struct PageJob {
    page_index: usize,
    page_width: f32,
    page_height: f32,
    image: Option<PageImage>,
}

/// Spinner on stderr, or `None` when progress output is disabled.
pub fn spinner(quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .map_err(|e| eyre!("Invalid spinner template: {e}"))?,
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(Some(spinner))
}

/// Helper to set spinner message if spinner is present
pub fn set_spinner_msg(spinner: Option<&ProgressBar>, msg: impl Into<String>) {
    if let Some(s) = spinner {
        s.set_message(msg.into());
    }
}

/// Open `path` and OCR every page, returning the document for later drawing.
///
/// Pages are recognized concurrently, at most `options.jobs` at a time;
/// records come back in page order. Pages without a usable scan image get an
/// empty record.
pub async fn ocr_document(
    path: &Path,
    options: &TesseractOptions,
    spinner: Option<&ProgressBar>,
) -> Result<(PdfDocument, Vec<OcrRecord>)> {
    let engine = Arc::new(TesseractOcr::from_options(options)?);

    set_spinner_msg(spinner, f!("Reading {}", path.display()));
    let path_buf: PathBuf = path.to_path_buf();
    let (document, jobs) = run_blocking(move || {
        let document = PdfDocument::load(&path_buf)
            .with_context(|| f!("Failed to open '{}'", path_buf.display()))?;
        let jobs = page_jobs(&document)?;
        Ok((document, jobs))
    })
    .await?;

    let total = jobs.len();
    info!("{} page(s) to recognize in {}", total, path.display());

    let mut done = 0;
    let mut records = Vec::with_capacity(total);
    let mut results = stream::iter(jobs)
        .map(|job| {
            let engine = Arc::clone(&engine);
            run_blocking(move || recognize_page(engine.as_ref(), job))
        })
        .buffered(options.jobs.max(1));

    while let Some(record) = results.next().await {
        records.push(record?);
        done += 1;
        set_spinner_msg(spinner, f!("OCR {done}/{total} pages"));
    }

    Ok((document, records))
}

fn page_jobs(document: &PdfDocument) -> Result<Vec<PageJob>> {
    document
        .page_ids()
        .into_iter()
        .enumerate()
        .map(|(page_index, page)| {
            let page_box = document.page_box(page)?;
            let image = scan_image(page_index, document.page_image(page))?;
            Ok(PageJob {
                page_index,
                page_width: page_box.width(),
                page_height: page_box.height(),
                image,
            })
        })
        .collect()
}

/// Pages whose scan is missing or cannot be decoded are skipped with a
/// warning; any other error aborts the document.
fn scan_image(
    page_index: usize,
    image: Result<PageImage, PdfError>,
) -> Result<Option<PageImage>> {
    match image {
        Ok(image) => Ok(Some(image)),
        Err(PdfError::NoPageImage(_)) => {
            warn!("page {page_index}: no scan image, nothing to recognize");
            Ok(None)
        }
        Err(PdfError::UnsupportedImage(reason)) => {
            warn!("page {page_index}: skipping undecodable scan image: {reason}");
            Ok(None)
        }
        Err(e) => Err(eyre!("Page {page_index}: {e}")),
    }
}

fn recognize_page<E>(engine: &E, job: PageJob) -> Result<OcrRecord>
where
    E: OcrEngine,
{
    let ocr = match &job.image {
        Some(image) => engine
            .recognize(image)
            .with_context(|| f!("OCR failed on page {}", job.page_index))?,
        None => OcrPage::default(),
    };
    Ok(OcrRecord {
        page_index: job.page_index,
        page_width: job.page_width,
        page_height: job.page_height,
        ocr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfner_core::Rect;

    struct FixedOcr;

    impl OcrEngine for FixedOcr {
        type Error = std::io::Error;

        fn recognize(&self, image: &PageImage) -> Result<OcrPage, Self::Error> {
            Ok(OcrPage {
                raw_text: "A".to_string(),
                elementary_chars: vec!['A'],
                elementary_boxes: vec![Rect::new(0, 10, 5, 0)],
                image_width: image.width,
                image_height: image.height,
            })
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        type Error = std::io::Error;

        fn recognize(&self, _image: &PageImage) -> Result<OcrPage, Self::Error> {
            Err(std::io::Error::other("engine crashed"))
        }
    }

    fn job(image: Option<PageImage>) -> PageJob {
        PageJob {
            page_index: 2,
            page_width: 612.0,
            page_height: 792.0,
            image,
        }
    }

    fn image() -> PageImage {
        PageImage {
            bytes: Vec::new(),
            extension: "png",
            width: 1224,
            height: 1584,
        }
    }

    #[test]
    fn test_recognize_page_keeps_page_geometry() {
        let record = recognize_page(&FixedOcr, job(Some(image()))).unwrap();
        assert_eq!(record.page_index, 2);
        assert_eq!(record.ocr.raw_text, "A");
        assert_eq!(record.scale().map(|s| (s.x, s.y)), Some((0.5, 0.5)));
    }

    #[test]
    fn test_page_without_image_gets_empty_record() {
        let record = recognize_page(&BrokenOcr, job(None)).unwrap();
        assert_eq!(record.ocr, OcrPage::default());
        assert!(record.ocr.index().is_empty());
    }

    #[test]
    fn test_engine_failure_names_page() {
        let err = recognize_page(&BrokenOcr, job(Some(image()))).unwrap_err();
        assert!(err.to_string().contains("page 2"));
    }

    #[test]
    fn test_scan_image_skips_missing_and_undecodable() {
        assert!(scan_image(0, Err(PdfError::NoPageImage(7))).unwrap().is_none());
        let jbig2 = PdfError::UnsupportedImage("Im0: JBIG2Decode".to_string());
        assert!(scan_image(1, Err(jbig2)).unwrap().is_none());
        let kept = scan_image(2, Ok(image())).unwrap();
        assert_eq!(kept.map(|i| (i.width, i.height)), Some((1224, 1584)));
    }

    #[test]
    fn test_scan_image_other_errors_abort() {
        let err = scan_image(3, Err(PdfError::Parse("bad xref".to_string()))).unwrap_err();
        assert!(err.to_string().contains("Page 3"));
    }

    #[test]
    fn test_quiet_has_no_spinner() {
        assert!(spinner(true).unwrap().is_none());
    }
}
