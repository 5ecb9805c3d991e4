use std::any::Any;
use std::fmt;

use serde::Serialize;

use crate::diagnostics::{ArborError, ErrorType};
use crate::hooks::{HookScope, Phase};

/// How a failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    /// A closure returned `Err`.
    Error(ErrorType),
    /// A closure panicked (failed `assert!`, `unwrap`, ...).
    Panic,
}

/// The hook a failure came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSite {
    pub phase: Phase,
    pub scope: HookScope,
    /// Full name of the group that registered the hook.
    pub group: String,
}

impl fmt::Display for HookSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) in \"{}\"", self.phase, self.scope, self.group)
    }
}

/// A captured failure: the reason string handed to reporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub message: String,
    pub cause: FailureCause,
    pub hook: Option<HookSite>,
}

impl Failure {
    pub fn from_error(error: &ArborError) -> Self {
        Self {
            message: error.message().to_string(),
            cause: FailureCause::Error(error.error_type()),
            hook: None,
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self {
            message,
            cause: FailureCause::Panic,
            hook: None,
        }
    }

    pub(crate) fn in_hook(mut self, site: HookSite) -> Self {
        self.hook.get_or_insert(site);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hook {
            Some(site) => write!(f, "{} (in {})", self.message, site),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Outcome of a single example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExampleResult {
    Passed,
    /// The body returned an error or panicked.
    Failed(Failure),
    /// A hook failed before or around the body, or an after-each hook failed on an
    /// otherwise passing example.
    HookFailed(Failure),
    /// An around hook never ran the example.
    Skipped,
}

impl ExampleResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, ExampleResult::Passed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExampleResult::Failed(_) | ExampleResult::HookFailed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ExampleResult::Failed(f) | ExampleResult::HookFailed(f) => Some(f),
            ExampleResult::Passed | ExampleResult::Skipped => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExampleResult::Passed => "passed",
            ExampleResult::Failed(_) => "failed",
            ExampleResult::HookFailed(_) => "hook_failed",
            ExampleResult::Skipped => "skipped",
        }
    }
}

/// Aggregate of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub hook_failed: usize,
    pub skipped: usize,
    /// Cleanup failures that are not attached to any example result.
    pub hook_failures: Vec<Failure>,
}

impl RunSummary {
    pub(crate) fn record(&mut self, result: &ExampleResult) {
        match result {
            ExampleResult::Passed => self.passed += 1,
            ExampleResult::Failed(_) => self.failed += 1,
            ExampleResult::HookFailed(_) => self.hook_failed += 1,
            ExampleResult::Skipped => self.skipped += 1,
        }
    }

    /// True iff no executed example failed.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.hook_failed == 0
    }

    pub fn has_failures(&self) -> bool {
        !self.success()
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.hook_failed + self.skipped
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total() as f64) * 100.0
    }
}
