use std::io::{self, IsTerminal, Write};

use crossterm::style::Stylize;
use serde::Serialize;
use tracing::warn;

use crate::app::{ImportResult, ProgressEvent, ProgressSink};
use crate::preview::CratePreview;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_import(result: &ImportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}

    // stdout carries the JSON document
    fn preview(&self, preview: &CratePreview) {
        let mut stderr = io::stderr();
        if let Err(err) = preview.write_to(&mut stderr, false) {
            warn!(error = %err, "could not print crate preview");
        }
    }
}

/// Human-facing output: progress on stderr, preview and summary on stdout.
pub struct ConsoleOutput {
    color: bool,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self {
            color: io::stdout().is_terminal(),
        }
    }

    pub fn print_import(&self, result: &ImportResult) {
        let mut lines = Vec::new();
        for file in &result.files {
            let verb = if file.uploaded { "Added" } else { "Would add" };
            let target = result.target_refcode.as_deref().unwrap_or(&result.base);
            lines.push(format!("{verb} file {} to item {target}", file.path));
        }
        for id in &result.skipped {
            lines.push(format!("Skipped {id}"));
        }
        let last = match &result.target_refcode {
            Some(refcode) => format!("Updated entry at {refcode}"),
            None => format!(
                "Dry run: {} file(s) would be imported for {}",
                result.files.len(),
                result.child.as_deref().unwrap_or(&result.base)
            ),
        };

        for line in lines {
            println!("{line}");
        }
        if self.color {
            println!("{}", last.green().bold());
        } else {
            println!("{last}");
        }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let message = match event.elapsed {
            Some(elapsed) => format!("{} latency_ms={}", event.message, elapsed.as_millis()),
            None => event.message,
        };
        if self.color {
            eprintln!("{}", format!("› {message}").dim());
        } else {
            eprintln!("› {message}");
        }
    }

    fn preview(&self, preview: &CratePreview) {
        let mut stdout = io::stdout();
        if let Err(err) = preview.write_to(&mut stdout, self.color) {
            warn!(error = %err, "could not print crate preview");
        }
    }
}
