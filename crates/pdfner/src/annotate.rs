//! `pdfner annotate`: OCR, tag and outline entities on a scanned PDF.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::owo_colors::OwoColorize;
use futures::stream::{self, StreamExt};
use log::info;
use pdf::{OverlaySink, OverlayStyle};
use pdfner_core::{
    assemble_indexed, run_into, CharBoxIndex, EntityRecord, OcrRecord, PageResult, SpanPolicy,
};

use crate::prelude::{println, *};
use crate::recognizer::{Recognizer, RecognizerOptions};
use crate::scan::{ocr_document, set_spinner_msg, spinner};
use crate::tesseract::TesseractOptions;

#[derive(Debug, clap::Parser)]
#[command(name = "annotate")]
#[command(about = "Outline named entities found on a scanned PDF")]
pub struct App {
    /// Scanned PDF to annotate
    pub input: PathBuf,

    /// Where to write the annotated PDF (defaults to <input>.annotated.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub tesseract: TesseractOptions,

    #[clap(flatten)]
    pub recognizer: RecognizerOptions,

    #[clap(flatten)]
    pub overlay: OverlayOptions,

    #[clap(flatten)]
    pub spans: SpanOptions,

    /// Print the per-page results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct OverlayOptions {
    /// Outline colour as #RRGGBB
    #[clap(long, default_value = "#FF0000")]
    pub color: String,

    /// Outline width in points
    #[clap(long, default_value = "1.0")]
    pub line_width: f32,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SpanOptions {
    /// Skip entities whose offsets fall outside the page text instead of
    /// aborting
    #[clap(long)]
    pub skip_invalid_spans: bool,
}

impl SpanOptions {
    pub fn policy(&self) -> SpanPolicy {
        if self.skip_invalid_spans {
            SpanPolicy::Skip
        } else {
            SpanPolicy::Abort
        }
    }
}

/// Build each page's character index once; it feeds both the tagger and the
/// resolver.
fn index_pages(ocr: Vec<OcrRecord>) -> Vec<(OcrRecord, CharBoxIndex)> {
    ocr.into_iter()
        .map(|record| {
            let chars = record.ocr.index();
            (record, chars)
        })
        .collect()
}

/// `scan.pdf` becomes `scan.annotated.pdf` next to it.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.annotated.pdf"))
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let style = OverlayStyle::from_hex(&app.overlay.color, app.overlay.line_width)?;
    let recognizer = Arc::new(Recognizer::from_options(&app.recognizer)?);
    let output = app
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&app.input));
    let policy = app.spans.policy();

    let spinner = spinner(global.quiet)?;
    let (document, ocr) = ocr_document(&app.input, &app.tesseract, spinner.as_ref()).await?;

    set_spinner_msg(spinner.as_ref(), "Recognizing entities");
    let indexed = index_pages(ocr);
    let texts = indexed
        .iter()
        .map(|(record, chars)| (record.page_index, chars.text().to_string()));
    let entities = stream::iter(texts)
        .map(|(page_index, text)| {
            let recognizer = Arc::clone(&recognizer);
            run_blocking(move || {
                let entities = recognizer
                    .recognize(&text)
                    .with_context(|| f!("Entity recognition failed on page {page_index}"))?;
                Ok(EntityRecord {
                    page_index,
                    entities,
                })
            })
        })
        .buffered(app.tesseract.jobs.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    set_spinner_msg(spinner.as_ref(), f!("Writing {}", output.display()));
    let pages = assemble_indexed(indexed, entities);
    let output_path = output.clone();
    let (results, pages_drawn) = run_blocking(move || {
        let mut sink = OverlaySink::new(document, output_path, style);
        let results = run_into(&pages, policy, &mut sink)?;
        Ok((results, sink.pages_drawn()))
    })
    .await?;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    info!(
        "outlined entities on {} of {} page(s)",
        pages_drawn,
        results.len()
    );

    if app.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    print_summary(&results);
    println!("\nWrote {}", output.display().bold());
    Ok(())
}

fn print_summary(results: &[PageResult]) {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Page".bold().cyan(),
        "Entities".bold().cyan(),
        "Drawn".bold().cyan(),
        "Unlocated".bold().cyan()
    ]);

    for result in results {
        table.add_row(prettytable::row![
            (result.page_index + 1).to_string(),
            result.entity_count.to_string(),
            result.regions.len().to_string().bright_green(),
            if result.unlocated > 0 {
                result.unlocated.to_string().bright_yellow().to_string()
            } else {
                result.unlocated.to_string()
            }
        ]);
    }

    let drawn: usize = results.iter().map(|r| r.regions.len()).sum();
    let found: usize = results.iter().map(|r| r.entity_count).sum();
    println!(
        "\n{} entit{} found, {} outlined:\n",
        found.to_string().bold(),
        if found == 1 { "y" } else { "ies" },
        drawn.to_string().bold()
    );
    table.printstd();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/scans/brief.pdf")),
            PathBuf::from("/scans/brief.annotated.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("brief")),
            PathBuf::from("brief.annotated.pdf")
        );
    }

    #[test]
    fn test_index_pages_feeds_tagger_and_resolver() {
        use pdfner_core::{EntitySpan, OcrPage, Rect, Region};

        let record = OcrRecord {
            page_index: 4,
            page_width: 100.0,
            page_height: 100.0,
            ocr: OcrPage {
                raw_text: "in Ulm\n".to_string(),
                elementary_chars: vec!['i', 'n', 'U', 'l', 'm'],
                elementary_boxes: (0..5).map(|i| Rect::new(i * 10, 100, i * 10 + 10, 90)).collect(),
                image_width: 100,
                image_height: 100,
            },
        };
        let indexed = index_pages(vec![record]);
        assert_eq!(indexed[0].1.text(), "in Ulm");

        let pages = assemble_indexed(
            indexed,
            vec![EntityRecord {
                page_index: 4,
                entities: vec![EntitySpan::new("Ulm", 3, 6, "LOC")],
            }],
        );
        let results = pdfner_core::run(&pages, SpanPolicy::Abort).unwrap();
        assert_eq!(results[0].regions, vec![Region::new(20.0, 0.0, 50.0, 10.0)]);
    }

    #[test]
    fn test_span_policy_flag() {
        let abort = SpanOptions {
            skip_invalid_spans: false,
        };
        let skip = SpanOptions {
            skip_invalid_spans: true,
        };
        assert_eq!(abort.policy(), SpanPolicy::Abort);
        assert_eq!(skip.policy(), SpanPolicy::Skip);
    }

    #[test]
    fn test_cli_parses_annotate_flags() {
        use clap::Parser;

        let app = App::try_parse_from([
            "annotate",
            "scan.pdf",
            "-o",
            "out.pdf",
            "--gazetteer",
            "names.toml",
            "--skip-invalid-spans",
            "--color",
            "#00FF00",
            "-j",
            "2",
        ])
        .unwrap();

        assert_eq!(app.input, PathBuf::from("scan.pdf"));
        assert_eq!(app.output, Some(PathBuf::from("out.pdf")));
        assert_eq!(app.recognizer.gazetteer, Some(PathBuf::from("names.toml")));
        assert_eq!(app.spans.policy(), SpanPolicy::Skip);
        assert_eq!(app.overlay.color, "#00FF00");
        assert_eq!(app.overlay.line_width, 1.0);
        assert_eq!(app.tesseract.jobs, 2);
    }
}
