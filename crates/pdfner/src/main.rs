use crate::prelude::*;
use clap::Parser;

mod annotate;
mod error;
mod ocr;
mod prelude;
mod recognizer;
mod resolve;
mod scan;
mod tesseract;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Find named entities in scanned PDFs and outline them on the page"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Hide the progress spinner.
    #[clap(long, short = 'q', env = "PDFNER_QUIET", global = true, default_value = "false")]
    quiet: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// OCR a scanned PDF, tag entities and outline them
    Annotate(crate::annotate::App),

    /// Dump per-page OCR text and glyph boxes as JSON
    Ocr(crate::ocr::App),

    /// Align saved OCR output with tagged entities
    Resolve(crate::resolve::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Annotate(sub_app) => crate::annotate::run(sub_app, app.global).await,
        SubCommands::Ocr(sub_app) => crate::ocr::run(sub_app, app.global).await,
        SubCommands::Resolve(sub_app) => crate::resolve::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
