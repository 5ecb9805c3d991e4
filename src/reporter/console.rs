//! Colored, indented progress output.
//!
//! Groups print as headings, examples print under them colored by result, and
//! [`ConsoleReporter::print_summary`] prints the final tally.

use std::io;

use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use crate::config::RunConfig;
use crate::reporter::Reporter;
use crate::runtime::outcome::{ExampleResult, Failure, RunSummary};
use crate::tree::{Example, Group, GroupInfo};

pub struct ConsoleReporter<W: WriteColor> {
    out: W,
    depth: usize,
}

impl ConsoleReporter<StandardStream> {
    pub fn stdout(config: &RunConfig) -> Self {
        Self::new(StandardStream::stdout(config.color.resolve()))
    }
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, depth: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let color = if summary.success() {
            Color::Green
        } else {
            Color::Red
        };
        writeln!(self.out)?;
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(
            self.out,
            "{} examples, {} failures",
            summary.total(),
            summary.failed + summary.hook_failed
        )?;
        if summary.skipped > 0 {
            write!(self.out, ", {} skipped", summary.skipped)?;
        }
        self.out.reset()?;
        writeln!(self.out)?;
        for failure in &summary.hook_failures {
            self.line(Some(Color::Red), &format!("cleanup failed: {failure}"))?;
        }
        Ok(())
    }

    fn line(&mut self, color: Option<Color>, text: &str) -> io::Result<()> {
        let indent = "  ".repeat(self.depth);
        self.out.set_color(ColorSpec::new().set_fg(color))?;
        write!(self.out, "{indent}{text}")?;
        self.out.reset()?;
        writeln!(self.out)
    }

    fn report(&mut self, color: Option<Color>, text: &str) {
        if let Err(e) = self.line(color, text) {
            tracing::warn!(error = %e, "console reporter could not write");
        }
    }
}

impl<W: WriteColor> Reporter for ConsoleReporter<W> {
    fn example_started(&mut self, _example: &Example) {}

    fn example_finished(&mut self, example: &Example, result: &ExampleResult) {
        let description = example.description();
        match result {
            ExampleResult::Passed => self.report(Some(Color::Green), description),
            ExampleResult::Skipped => {
                self.report(Some(Color::Yellow), &format!("{description} (skipped)"))
            }
            ExampleResult::Failed(failure) => {
                self.report(Some(Color::Red), &format!("{description} (FAILED: {failure})"))
            }
            ExampleResult::HookFailed(failure) => self.report(
                Some(Color::Red),
                &format!("{description} (HOOK FAILED: {failure})"),
            ),
        }
    }

    fn group_started(&mut self, group: &Group) {
        let title = match group.info().parent() {
            Some(_) => group.info().label(),
            None => group.full_name(),
        };
        let title = title.to_string();
        self.report(None, &title);
        self.depth += 1;
    }

    fn group_finished(&mut self, _group: &Group) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn hook_failed(&mut self, _group: &GroupInfo, failure: &Failure) {
        self.report(Some(Color::Red), &format!("cleanup failed: {failure}"));
    }
}
