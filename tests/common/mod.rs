//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor::{ArborError, ExampleScope, Group, RecordingReporter, Runner, RunSummary};

/// An append-only trace shared between hooks, bodies and the test.
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A hook or example body that appends `entry` to `log` and succeeds.
pub fn push(log: &Log, entry: &str) -> impl Fn(&mut ExampleScope) -> Result<(), ArborError> + 'static {
    let log = Rc::clone(log);
    let entry = entry.to_string();
    move |_| {
        log.borrow_mut().push(entry.clone());
        Ok(())
    }
}

/// Runs `group` with a recording reporter.
pub fn run(group: &Group) -> (RunSummary, RecordingReporter) {
    let mut reporter = RecordingReporter::new();
    let summary = Runner::new(&mut reporter).run(group);
    (summary, reporter)
}
