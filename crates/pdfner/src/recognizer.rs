//! Entity recognizers available from the command line.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::debug;
use pdfner_core::{EntityRecognizer, EntitySpan, Gazetteer};

use crate::error::Error;
use crate::prelude::*;

#[derive(Debug, Clone, clap::Args)]
pub struct RecognizerOptions {
    /// Gazetteer TOML file with literal terms and patterns per label (takes
    /// precedence over --ner-command)
    #[clap(long, env = "PDFNER_GAZETTEER")]
    pub gazetteer: Option<PathBuf>,

    /// External NER command: reads page text on stdin, prints a JSON list of
    /// {text, start, end, label} with character offsets on stdout
    #[clap(long, env = "PDFNER_NER_COMMAND")]
    pub ner_command: Option<String>,
}

/// Runs an external tagger once per page.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    /// Split a shell-style command line into program and arguments.
    pub fn new(command_line: &str) -> Result<Self, Error> {
        let mut words = shlex::split(command_line)
            .ok_or_else(|| Error::InvalidCommand(format!("unbalanced quotes in '{command_line}'")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidCommand("empty command".to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

impl EntityRecognizer for CommandRecognizer {
    type Error = Error;

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Self::Error> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from another thread so a chatty tagger cannot block on a
        // full stdout pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let text = text.to_owned();
            std::thread::spawn(move || stdin.write_all(text.as_bytes()))
        });

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            // A tagger that exits without reading all input breaks the pipe;
            // its exit status decides success.
            if let Ok(Err(e)) = writer.join() {
                debug!("NER command stopped reading stdin: {e}");
            }
        }

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// The recognizer chosen on the command line.
#[derive(Debug)]
pub enum Recognizer {
    Gazetteer(Gazetteer),
    Command(CommandRecognizer),
}

impl Recognizer {
    pub fn from_options(options: &RecognizerOptions) -> Result<Self> {
        match (&options.gazetteer, &options.ner_command) {
            (Some(path), _) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| f!("Failed to read gazetteer '{}'", path.display()))?;
                let gazetteer = Gazetteer::from_toml(&source)
                    .with_context(|| f!("Failed to load gazetteer '{}'", path.display()))?;
                if gazetteer.is_empty() {
                    log::warn!("gazetteer '{}' defines no entities", path.display());
                }
                Ok(Recognizer::Gazetteer(gazetteer))
            }
            (None, Some(command)) => Ok(Recognizer::Command(CommandRecognizer::new(command)?)),
            (None, None) => Err(eyre!(
                "No entity recognizer configured; pass --gazetteer or --ner-command"
            )),
        }
    }

    pub fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
        match self {
            Recognizer::Gazetteer(gazetteer) => Ok(gazetteer.find(text)),
            Recognizer::Command(command) => Ok(command.recognize(text)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_is_split_like_a_shell() {
        let recognizer = CommandRecognizer::new("python3 -m tagger --model 'de core'").unwrap();
        assert_eq!(recognizer.program, "python3");
        assert_eq!(recognizer.args, vec!["-m", "tagger", "--model", "de core"]);
    }

    #[test]
    fn test_invalid_command_lines() {
        assert!(matches!(CommandRecognizer::new(""), Err(Error::InvalidCommand(_))));
        assert!(matches!(
            CommandRecognizer::new("tagger 'unclosed"),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_no_recognizer_configured() {
        let options = RecognizerOptions {
            gazetteer: None,
            ner_command: None,
        };
        assert!(Recognizer::from_options(&options).is_err());
    }

    #[test]
    fn test_gazetteer_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gazetteer.toml");
        std::fs::write(&path, "[[entity]]\nlabel = \"LOC\"\nterms = [\"Ulm\"]\n").unwrap();

        let recognizer = Recognizer::from_options(&RecognizerOptions {
            gazetteer: Some(path),
            ner_command: None,
        })
        .unwrap();
        let spans = recognizer.recognize("nach Ulm").unwrap();
        assert_eq!(spans, vec![EntitySpan::new("Ulm", 5, 8, "LOC")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_recognizer_reads_json() {
        let recognizer = CommandRecognizer::new(
            r#"sh -c 'cat >/dev/null; echo "[{\"text\":\"Ulm\",\"start\":5,\"end\":8,\"label\":\"LOC\"}]"'"#,
        )
        .unwrap();
        let spans = recognizer.recognize("nach Ulm").unwrap();
        assert_eq!(spans, vec![EntitySpan::new("Ulm", 5, 8, "LOC")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_recognizer_sees_page_text() {
        // Echo the input back as the label of a single entity.
        let recognizer = CommandRecognizer::new(
            r#"sh -c 'read line; printf "[{\"text\":\"\",\"start\":0,\"end\":0,\"label\":\"%s\"}]" "$line"'"#,
        )
        .unwrap();
        let spans = recognizer.recognize("Hallo\n").unwrap();
        assert_eq!(spans[0].label, "Hallo");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_and_bad_output() {
        let failing = CommandRecognizer::new("sh -c 'echo boom >&2; exit 3'").unwrap();
        match failing.recognize("x") {
            Err(Error::CommandFailed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }

        let garbage = CommandRecognizer::new("echo not-json").unwrap();
        assert!(matches!(garbage.recognize("x"), Err(Error::NerOutput(_))));
    }
}
