//! The notification contract between the engine and whoever presents results.
//!
//! The engine calls these methods synchronously and assumes nothing about what they do.

use crate::runtime::outcome::{ExampleResult, Failure};
use crate::tree::{Example, Group, GroupInfo};

pub mod console;

pub trait Reporter {
    /// Sent before the example's scope is created.
    fn example_started(&mut self, example: &Example);

    /// Sent once the example and its after-each hooks are done.
    fn example_finished(&mut self, example: &Example, result: &ExampleResult);

    fn group_started(&mut self, _group: &Group) {}

    fn group_finished(&mut self, _group: &Group) {}

    /// A cleanup hook registered on `group` failed without being attached to an example
    /// result.
    fn hook_failed(&mut self, _group: &GroupInfo, _failure: &Failure) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn example_started(&mut self, _example: &Example) {}

    fn example_finished(&mut self, _example: &Example, _result: &ExampleResult) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReporterEvent {
    GroupStarted(String),
    GroupFinished(String),
    ExampleStarted(String),
    ExampleFinished(String, ExampleResult),
    HookFailed(String, Failure),
}

/// Keeps every notification, keyed by full names.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    pub events: Vec<ReporterEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(full_name, result)` for every finished example, in order.
    pub fn results(&self) -> Vec<(&str, &ExampleResult)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReporterEvent::ExampleFinished(name, result) => Some((name.as_str(), result)),
                _ => None,
            })
            .collect()
    }

    pub fn result_of(&self, full_name: &str) -> Option<&ExampleResult> {
        self.results()
            .into_iter()
            .find(|(name, _)| *name == full_name)
            .map(|(_, result)| result)
    }

    pub fn hook_failures(&self) -> Vec<&Failure> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReporterEvent::HookFailed(_, failure) => Some(failure),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn example_started(&mut self, example: &Example) {
        self.events
            .push(ReporterEvent::ExampleStarted(example.full_name().to_string()));
    }

    fn example_finished(&mut self, example: &Example, result: &ExampleResult) {
        self.events.push(ReporterEvent::ExampleFinished(
            example.full_name().to_string(),
            result.clone(),
        ));
    }

    fn group_started(&mut self, group: &Group) {
        self.events
            .push(ReporterEvent::GroupStarted(group.full_name().to_string()));
    }

    fn group_finished(&mut self, group: &Group) {
        self.events
            .push(ReporterEvent::GroupFinished(group.full_name().to_string()));
    }

    fn hook_failed(&mut self, group: &GroupInfo, failure: &Failure) {
        self.events.push(ReporterEvent::HookFailed(
            group.full_name().to_string(),
            failure.clone(),
        ));
    }
}
