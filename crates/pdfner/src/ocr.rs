//! `pdfner ocr`: dump per-page OCR output as JSON.

use std::path::PathBuf;

use crate::prelude::{println, *};
use crate::scan::{ocr_document, spinner};
use crate::tesseract::TesseractOptions;

#[derive(Debug, clap::Parser)]
#[command(name = "ocr")]
#[command(about = "Run OCR on a scanned PDF and print text and glyph boxes as JSON")]
pub struct App {
    /// Scanned PDF to recognize
    pub input: PathBuf,

    /// Write the JSON to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub tesseract: TesseractOptions,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let spinner = spinner(global.quiet)?;
    let (_document, records) = ocr_document(&app.input, &app.tesseract, spinner.as_ref()).await?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| eyre!("Failed to serialize OCR output: {}", e))?;

    match app.output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| f!("Failed to write '{}'", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
