//! The execution engine.
//!
//! A single depth-first, synchronous traversal in declaration order. Each group with at
//! least one example in its subtree goes through one activation:
//!
//! ```text
//! Idle -> BeforeAllRunning -> ExamplesRunning -> AfterAllRunning -> Done
//!                 \________________________________/
//!                     (before-all hook failed)
//! ```
//!
//! Every closure the engine invokes runs under [`guarded`], so errors and panics are turned
//! into [`Failure`] values at the boundary and never escape a run.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::RunConfig;
use crate::diagnostics::{ArborError, ErrorContext};
use crate::hooks::{HookEntry, HookScope, Phase, Procedure};
use crate::reporter::Reporter;
use crate::runtime::lets::{LetCache, LetDefinitions};
use crate::runtime::outcome::{ExampleResult, Failure, HookSite, RunSummary};
use crate::runtime::scope::{ExampleScope, Variables};
use crate::tree::{Example, Group, GroupInfo};

/// Runs every example under `group`; true iff none of them failed.
pub fn run_examples(group: &Group, reporter: &mut dyn Reporter) -> bool {
    Runner::new(reporter).run(group).success()
}

// ============================================================================
// ACTIVATION STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    BeforeAllRunning,
    ExamplesRunning,
    AfterAllRunning,
    Done,
}

impl ActivationState {
    pub fn can_advance_to(self, next: ActivationState) -> bool {
        use ActivationState::*;
        matches!(
            (self, next),
            (Idle, BeforeAllRunning)
                | (BeforeAllRunning, ExamplesRunning)
                | (BeforeAllRunning, AfterAllRunning)
                | (ExamplesRunning, AfterAllRunning)
                | (AfterAllRunning, Done)
        )
    }
}

struct Activation<'g> {
    group: &'g Group,
    state: ActivationState,
}

impl<'g> Activation<'g> {
    fn new(group: &'g Group) -> Self {
        Self {
            group,
            state: ActivationState::Idle,
        }
    }

    fn advance(&mut self, next: ActivationState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid activation transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            group = %self.group.full_name(),
            from = ?self.state,
            to = ?next,
            "activation"
        );
        self.state = next;
    }
}

// ============================================================================
// LINEAGE: what a group inherits from its ancestors at run time
// ============================================================================

type OwnedHook = (Rc<GroupInfo>, HookEntry);

/// Each-hooks and lets accumulated from the root down to the current group.
#[derive(Clone, Default)]
struct Lineage {
    lets: LetDefinitions,
    /// Root first.
    before_each: Vec<OwnedHook>,
    /// Outermost first.
    around: Vec<OwnedHook>,
    /// Leaf first.
    after_each: Vec<OwnedHook>,
}

impl Lineage {
    fn extend(&self, group: &Rc<GroupInfo>) -> Self {
        let mut next = self.clone();
        for (name, definition) in group.let_definitions() {
            next.lets.insert(name, definition);
        }
        next.before_each.extend(each_hooks(group, Phase::Before));
        next.around.extend(each_hooks(group, Phase::Around));
        next.after_each = each_hooks(group, Phase::After)
            .chain(self.after_each.iter().cloned())
            .collect();
        next
    }

    fn let_cache(&self) -> LetCache {
        LetCache::new(self.lets.clone())
    }
}

fn each_hooks(group: &Rc<GroupInfo>, phase: Phase) -> impl Iterator<Item = OwnedHook> + '_ {
    group
        .hooks_for(phase, HookScope::Each)
        .into_iter()
        .map(move |hook| (Rc::clone(group), hook))
}

fn site(group: &GroupInfo, hook: &HookEntry) -> HookSite {
    HookSite {
        phase: hook.phase,
        scope: hook.scope,
        group: group.full_name().to_string(),
    }
}

/// Runs `f`, converting a returned error or a panic into a [`Failure`].
fn guarded<T>(f: impl FnOnce() -> Result<T, ArborError>) -> Result<T, Failure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(Failure::from_error(&error)),
        Err(payload) => Err(Failure::from_panic(payload)),
    }
}

/// Runs `f` with a silent panic hook. The previous hook is back in place on every exit,
/// including a panic raised by `f` itself, which is then resumed.
fn with_quiet_panics<T>(f: impl FnOnce() -> T) -> T {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);
    outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

// ============================================================================
// RUNNER
// ============================================================================

pub struct Runner<'r> {
    reporter: &'r mut dyn Reporter,
    config: RunConfig,
    summary: RunSummary,
}

impl<'r> Runner<'r> {
    pub fn new(reporter: &'r mut dyn Reporter) -> Self {
        Self::with_config(reporter, RunConfig::default())
    }

    pub fn with_config(reporter: &'r mut dyn Reporter, config: RunConfig) -> Self {
        Self {
            reporter,
            config,
            summary: RunSummary::default(),
        }
    }

    /// Runs `group` and everything under it.
    ///
    /// When `group` is nested, its ancestors' hooks and lets still apply: their before-all
    /// hooks run first, root to leaf, and their after-all hooks run last, leaf to root.
    pub fn run(mut self, group: &Group) -> RunSummary {
        tracing::debug!(
            group = %group.full_name(),
            examples = group.example_count(),
            "run started"
        );
        if self.config.quiet_panics {
            with_quiet_panics(|| self.run_from(group));
        } else {
            self.run_from(group);
        }
        tracing::debug!(
            passed = self.summary.passed,
            failed = self.summary.failed,
            hook_failed = self.summary.hook_failed,
            skipped = self.summary.skipped,
            "run finished"
        );
        self.summary
    }

    fn run_from(&mut self, group: &Group) {
        if group.example_count() == 0 {
            return;
        }
        let mut lineage = Lineage::default();
        let mut snapshot = Variables::new();
        let mut entered = Vec::new();
        let mut failure = None;

        for ancestor in group.info().ancestors() {
            lineage = lineage.extend(&ancestor);
            let (vars, failed) = self.run_before_all(&ancestor, &lineage, &snapshot);
            entered.push((ancestor, lineage.clone(), vars.clone()));
            snapshot = vars;
            if failed.is_some() {
                failure = failed;
                break;
            }
        }

        match failure {
            None => self.run_group(group, &lineage, &snapshot),
            Some(failure) => self.fail_group(group, &failure),
        }

        for (ancestor, lineage, snapshot) in entered.into_iter().rev() {
            self.run_after_all(&ancestor, &lineage, snapshot);
        }
    }

    fn run_group(&mut self, group: &Group, parent: &Lineage, inherited: &Variables) {
        if group.example_count() == 0 {
            tracing::trace!(group = %group.full_name(), "no examples; not activated");
            return;
        }
        let lineage = parent.extend(group.info());
        let mut activation = Activation::new(group);
        self.reporter.group_started(group);

        activation.advance(ActivationState::BeforeAllRunning);
        let (snapshot, before_all_failure) =
            self.run_before_all(group.info(), &lineage, inherited);

        match before_all_failure {
            None => {
                activation.advance(ActivationState::ExamplesRunning);
                for example in group.examples() {
                    self.run_example(example, group, &lineage, &snapshot);
                }
                for child in group.children() {
                    self.run_group(child, &lineage, &snapshot);
                }
            }
            Some(failure) => {
                for example in group.examples() {
                    self.fail_example(example, &failure);
                }
                for child in group.children() {
                    self.fail_group(child, &failure);
                }
            }
        }

        activation.advance(ActivationState::AfterAllRunning);
        self.run_after_all(group.info(), &lineage, snapshot);
        activation.advance(ActivationState::Done);
        self.reporter.group_finished(group);
    }

    /// Runs the group's before-all hooks on top of the inherited snapshot.
    fn run_before_all(
        &mut self,
        group: &GroupInfo,
        lineage: &Lineage,
        inherited: &Variables,
    ) -> (Variables, Option<Failure>) {
        let mut scope = ExampleScope::new(inherited.clone(), lineage.let_cache(), None);
        for hook in group.hooks_for(Phase::Before, HookScope::All) {
            if let Err(failure) = guarded(|| hook.call(&mut scope)) {
                let failure = failure.in_hook(site(group, &hook));
                tracing::warn!(group = %group.full_name(), %failure, "before(all) hook failed");
                return (scope.into_variables(), Some(failure));
            }
        }
        (scope.into_variables(), None)
    }

    fn run_after_all(&mut self, group: &GroupInfo, lineage: &Lineage, snapshot: Variables) {
        let mut scope = ExampleScope::new(snapshot, lineage.let_cache(), None);
        for hook in group.hooks_for(Phase::After, HookScope::All) {
            if let Err(failure) = guarded(|| hook.call(&mut scope)) {
                self.cleanup_failed(group, failure.in_hook(site(group, &hook)));
            }
        }
    }

    fn run_example(
        &mut self,
        example: &Example,
        group: &Group,
        lineage: &Lineage,
        snapshot: &Variables,
    ) {
        tracing::trace!(example = %example.full_name(), "example started");
        self.reporter.example_started(example);

        let running = example.running(group.info());
        let mut scope = ExampleScope::new(snapshot.clone(), lineage.let_cache(), Some(running));

        let (mut result, cleanup) = match run_before_each(lineage, &mut scope) {
            Ok(()) => run_wrapped(example, lineage, &mut scope),
            Err(failure) => (
                ExampleResult::HookFailed(failure),
                run_after_each(lineage, &mut scope),
            ),
        };

        for (owner, failure) in cleanup {
            if result.is_passed() {
                result = ExampleResult::HookFailed(failure);
            } else {
                self.cleanup_failed(&owner, failure);
            }
        }

        tracing::trace!(example = %example.full_name(), result = result.label(), "example finished");
        self.summary.record(&result);
        self.reporter.example_finished(example, &result);
    }

    fn fail_example(&mut self, example: &Example, failure: &Failure) {
        self.reporter.example_started(example);
        let result = ExampleResult::HookFailed(failure.clone());
        self.summary.record(&result);
        self.reporter.example_finished(example, &result);
    }

    /// Reports every example under `group` as failed without running any hook.
    fn fail_group(&mut self, group: &Group, failure: &Failure) {
        if group.example_count() == 0 {
            return;
        }
        self.reporter.group_started(group);
        for example in group.examples() {
            self.fail_example(example, failure);
        }
        for child in group.children() {
            self.fail_group(child, failure);
        }
        self.reporter.group_finished(group);
    }

    fn cleanup_failed(&mut self, group: &GroupInfo, failure: Failure) {
        tracing::warn!(group = %group.full_name(), %failure, "cleanup hook failed");
        self.reporter.hook_failed(group, &failure);
        self.summary.hook_failures.push(failure);
    }
}

// ============================================================================
// PER-EXAMPLE STEPS
// ============================================================================

type CleanupFailures = Vec<(Rc<GroupInfo>, Failure)>;

/// Runs before-each hooks root to leaf, stopping at the first failure.
fn run_before_each(lineage: &Lineage, scope: &mut ExampleScope) -> Result<(), Failure> {
    for (owner, hook) in &lineage.before_each {
        guarded(|| hook.call(scope)).map_err(|failure| failure.in_hook(site(owner, hook)))?;
    }
    Ok(())
}

/// Runs every after-each hook leaf to root, collecting failures.
fn run_after_each(lineage: &Lineage, scope: &mut ExampleScope) -> CleanupFailures {
    let mut failures = Vec::new();
    for (owner, hook) in &lineage.after_each {
        if let Err(failure) = guarded(|| hook.call(scope)) {
            failures.push((Rc::clone(owner), failure.in_hook(site(owner, hook))));
        }
    }
    failures
}

/// Runs the body and the after-each hooks inside the around hooks. An around hook that
/// never runs its procedure skips both.
fn run_wrapped(
    example: &Example,
    lineage: &Lineage,
    scope: &mut ExampleScope,
) -> (ExampleResult, CleanupFailures) {
    let body = example.body();
    let mut body_result: Option<Result<(), Failure>> = None;
    let mut cleanup = Vec::new();
    let mut hook_failure: Option<Failure> = None;

    let mut innermost = |scope: &mut ExampleScope| -> Result<(), ArborError> {
        body_result = Some(guarded(|| body(scope)));
        cleanup = run_after_each(lineage, scope);
        Ok(())
    };
    // Errors returned here were already recorded in `hook_failure` by the failing hook.
    let _ = compose_around(&lineage.around, scope, &mut innermost, &mut hook_failure);

    let result = match (body_result, hook_failure) {
        (Some(Err(failure)), _) => ExampleResult::Failed(failure),
        (_, Some(failure)) => ExampleResult::HookFailed(failure),
        (Some(Ok(())), None) => ExampleResult::Passed,
        (None, None) => ExampleResult::Skipped,
    };
    (result, cleanup)
}

/// Outermost hook first; each hook's procedure runs the rest of the chain.
fn compose_around(
    hooks: &[OwnedHook],
    scope: &mut ExampleScope,
    body: &mut dyn FnMut(&mut ExampleScope) -> Result<(), ArborError>,
    first_failure: &mut Option<Failure>,
) -> Result<(), ArborError> {
    let Some(((owner, hook), inner)) = hooks.split_first() else {
        return body(scope);
    };

    let mut next = |scope: &mut ExampleScope| -> Result<(), ArborError> {
        compose_around(inner, scope, &mut *body, &mut *first_failure)
    };
    let mut procedure = Procedure::new(&mut next);
    let outcome = guarded(|| hook.call_around(scope, &mut procedure));

    match outcome {
        Ok(_) => Ok(()),
        Err(failure) => {
            let message = failure.message.clone();
            if first_failure.is_none() {
                *first_failure = Some(failure.in_hook(site(owner, hook)));
            }
            Err(ArborError::Hook {
                message,
                ctx: ErrorContext::at(hook.location),
                source: None,
            })
        }
    }
}
