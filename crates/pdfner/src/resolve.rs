//! `pdfner resolve`: align dumped OCR output with externally tagged entities.

use std::path::{Path, PathBuf};

use pdfner_core::{assemble, pipeline, EntityRecord, OcrRecord, PageResult, SpanPolicy};
use serde::de::DeserializeOwned;

use crate::annotate::SpanOptions;
use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "resolve")]
#[command(about = "Resolve entity spans against saved OCR output and print regions as JSON")]
pub struct App {
    /// JSON written by `pdfner ocr`
    pub ocr: PathBuf,

    /// JSON list of {page_index, entities: [{text, start, end, label}]}
    pub entities: PathBuf,

    #[clap(flatten)]
    pub spans: SpanOptions,
}

pub async fn run(app: App, _global: crate::Global) -> Result<()> {
    let ocr: Vec<OcrRecord> = read_json(&app.ocr)?;
    let entities: Vec<EntityRecord> = read_json(&app.entities)?;

    let results = resolve_records(ocr, entities, app.spans.policy())?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Join the records and run the pipeline over them.
pub fn resolve_records(
    ocr: Vec<OcrRecord>,
    entities: Vec<EntityRecord>,
    policy: SpanPolicy,
) -> Result<Vec<PageResult>> {
    let pages = assemble(ocr, entities);
    Ok(pipeline::run(&pages, policy)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let source = std::fs::read_to_string(path)
        .with_context(|| f!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&source).with_context(|| f!("Invalid JSON in '{}'", path.display()))
}
