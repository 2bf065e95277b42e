//! OCR through the tesseract command line tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use pdfner_core::{parse_box_output, OcrEngine, OcrPage, PageImage};

use crate::error::Error;

/// Tesseract CLI options shared by the OCR-running subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct TesseractOptions {
    /// Path to the tesseract binary (looked up on PATH when omitted)
    #[clap(long, env = "PDFNER_TESSERACT")]
    pub tesseract: Option<PathBuf>,

    /// Tesseract language pack(s), e.g. "deu" or "deu+eng"
    #[clap(long, env = "PDFNER_LANG", default_value = "deu")]
    pub lang: String,

    /// Number of pages to OCR concurrently
    #[clap(long, short = 'j', default_value = "4")]
    pub jobs: usize,
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    lang: String,
}

impl TesseractOcr {
    /// Use `binary` if given, otherwise find `tesseract` on PATH.
    pub fn locate(binary: Option<PathBuf>, lang: impl Into<String>) -> Result<Self, Error> {
        let binary = match binary {
            Some(path) => path,
            None => which::which("tesseract").map_err(|_| Error::TesseractNotFound)?,
        };
        debug!("using tesseract at {}", binary.display());
        Ok(Self {
            binary,
            lang: lang.into(),
        })
    }

    pub fn from_options(options: &TesseractOptions) -> Result<Self, Error> {
        Self::locate(options.tesseract.clone(), options.lang.clone())
    }

    /// Run tesseract on `input`, writing to stdout, with extra trailing
    /// arguments (config names such as `makebox`).
    fn run(&self, input: &Path, extra: &[&str]) -> Result<String, Error> {
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .args(extra)
            .output()?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: self.binary.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    type Error = Error;

    fn recognize(&self, image: &PageImage) -> Result<OcrPage, Self::Error> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(format!("page.{}", image.extension));
        std::fs::write(&input, &image.bytes)?;

        let raw_text = self.run(&input, &[])?;
        let boxes = self.run(&input, &["makebox"])?;
        let (elementary_chars, elementary_boxes) = parse_box_output(&boxes)?;

        Ok(OcrPage {
            raw_text,
            elementary_chars,
            elementary_boxes,
            image_width: image.width,
            image_height: image.height,
        })
    }
}
