use std::process::ExitStatus;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("tesseract not found on PATH; install it or set PDFNER_TESSERACT")]
    TesseractNotFound,

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Invalid NER command: {0}")]
    InvalidCommand(String),

    #[error("NER command output is not a JSON list of entities: {0}")]
    NerOutput(#[from] serde_json::Error),

    #[error("Unreadable tesseract box output: {0}")]
    BoxOutput(#[from] pdfner_core::BoxParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
