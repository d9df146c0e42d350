use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use super::{RelayOutcome, Stage};
use crate::cli::OutputFormat;
use crate::output;

/// Sink for pipeline progress
pub trait Reporter: Send + Sync {
    /// The pipeline entered `stage`
    fn stage(&self, stage: Stage);

    /// A diagnostic line for the user
    fn message(&self, line: &str);

    /// The relay finished; the reporter renders the result
    fn completed(&self, outcome: &RelayOutcome);
}

/// Prints diagnostics to stdout with a spinner on stderr while a stage runs
pub struct ConsoleReporter {
    quiet: bool,
    format: OutputFormat,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool, format: OutputFormat) -> Self {
        Self {
            quiet,
            format,
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: &'static str) {
        if self.quiet {
            return;
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(progress) {
                previous.finish_and_clear();
            }
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(progress) = slot.take() {
                progress.finish_and_clear();
            }
        }
    }

    fn print(&self, line: &str) {
        match self.spinner.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(progress) => progress.suspend(|| println!("{}", line)),
                None => println!("{}", line),
            },
            Err(_) => println!("{}", line),
        }
    }

    /// Report a failure caught at the top-level boundary
    pub fn failed(&self, error: &dyn std::fmt::Display) {
        self.stop_spinner();
        println!("{} {}", style("Something went wrong:").red().bold(), error);
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: Stage) {
        tracing::debug!("Entering stage {:?}", stage);
        match stage {
            Stage::Fetching => self.start_spinner("Fetching audio..."),
            Stage::Uploading => self.start_spinner("Uploading..."),
            Stage::Idle | Stage::Cleanup | Stage::Done | Stage::Failed => self.stop_spinner(),
        }
    }

    fn message(&self, line: &str) {
        self.print(line);
    }

    fn completed(&self, outcome: &RelayOutcome) {
        self.stop_spinner();
        println!("{}", output::render_outcome(outcome, self.format));
    }
}
