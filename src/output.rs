use std::io::{self, Write};

use serde::Serialize;

use crate::app::{Enrichment, ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_enrichment(enrichment: &Enrichment) -> io::Result<()> {
        Self::print_json(enrichment)
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
}

/// Prints one line per processed title.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}podcast-enricher summary{reset}");
    println!("{green}written: {}{reset}", summary.written);
    println!("{yellow}skipped: {}{reset}", summary.skipped);

    for item in summary.items.iter().filter(|item| !item.is_written()) {
        println!(
            "{yellow}  {} ({}: {}){reset}",
            item.title,
            item.stage
                .map(|stage| stage.to_string())
                .unwrap_or_else(|| "-".to_string()),
            item.reason.as_deref().unwrap_or("-")
        );
    }
}
