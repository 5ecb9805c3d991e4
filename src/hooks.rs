//! Per-group lifecycle hooks.
//!
//! Hooks are first-class closures stored in ordered buckets keyed by `(phase, scope)`.
//! Every hook has the uniform shape `(scope) -> Result<Value, ArborError>`; around hooks
//! additionally receive a [`Procedure`] that runs the rest of the chain.
//!
//! ## Buckets
//!
//! | phase  | each | all |
//! |--------|------|-----|
//! | before | yes  | yes |
//! | after  | yes  | yes |
//! | around | yes  | no  |

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::diagnostics::{ArborError, Location};
use crate::err_msg;
use crate::runtime::scope::ExampleScope;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    After,
    Around,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookScope {
    /// Once per example.
    Each,
    /// Once per group activation.
    All,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::After => write!(f, "after"),
            Phase::Around => write!(f, "around"),
        }
    }
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Each => write!(f, "each"),
            HookScope::All => write!(f, "all"),
        }
    }
}

pub type PlainHook = Rc<dyn Fn(&mut ExampleScope) -> Result<Value, ArborError>>;
pub type AroundHook = Rc<dyn Fn(&mut ExampleScope, &mut Procedure<'_>) -> Result<Value, ArborError>>;

/// The closure stored in a hook entry.
#[derive(Clone)]
pub enum HookFn {
    Plain(PlainHook),
    Around(AroundHook),
}

impl HookFn {
    pub fn plain<V, F>(f: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&mut ExampleScope) -> Result<V, ArborError> + 'static,
    {
        HookFn::Plain(erase_plain(move |scope| f(scope).map(Into::into)))
    }

    pub fn around<V, F>(f: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&mut ExampleScope, &mut Procedure<'_>) -> Result<V, ArborError> + 'static,
    {
        HookFn::Around(erase_around(move |scope, procedure| {
            f(scope, procedure).map(Into::into)
        }))
    }
}

fn erase_plain<F>(f: F) -> PlainHook
where
    F: Fn(&mut ExampleScope) -> Result<Value, ArborError> + 'static,
{
    Rc::new(f)
}

fn erase_around<F>(f: F) -> AroundHook
where
    F: Fn(&mut ExampleScope, &mut Procedure<'_>) -> Result<Value, ArborError> + 'static,
{
    Rc::new(f)
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookFn::Plain(_) => write!(f, "HookFn::Plain(..)"),
            HookFn::Around(_) => write!(f, "HookFn::Around(..)"),
        }
    }
}

/// A registered hook.
#[derive(Debug, Clone)]
pub struct HookEntry {
    pub phase: Phase,
    pub scope: HookScope,
    /// Position within its bucket; defines execution order.
    pub index: usize,
    pub location: Location,
    func: HookFn,
}

impl HookEntry {
    /// Invokes the hook directly.
    ///
    /// Around hooks are handed a procedure that does nothing when run.
    pub fn call(&self, scope: &mut ExampleScope) -> Result<Value, ArborError> {
        match &self.func {
            HookFn::Plain(f) => f(scope),
            HookFn::Around(f) => {
                let mut noop = |_: &mut ExampleScope| -> Result<(), ArborError> { Ok(()) };
                let mut procedure = Procedure::new(&mut noop);
                f(scope, &mut procedure)
            }
        }
    }

    /// Invokes an around hook with `procedure` as the rest of the chain.
    pub(crate) fn call_around(
        &self,
        scope: &mut ExampleScope,
        procedure: &mut Procedure<'_>,
    ) -> Result<Value, ArborError> {
        match &self.func {
            HookFn::Around(f) => f(scope, procedure),
            HookFn::Plain(_) => Err(err_msg!(
                Internal,
                "{} {} hook invoked as an around hook",
                self.phase,
                self.scope
            )),
        }
    }
}

// ============================================================================
// PROCEDURE: the "run the remaining chain" handle
// ============================================================================

/// Handle given to around hooks; running it executes the inner hooks and the example.
pub struct Procedure<'a> {
    next: &'a mut dyn FnMut(&mut ExampleScope) -> Result<(), ArborError>,
    invoked: bool,
}

impl<'a> Procedure<'a> {
    pub fn new(next: &'a mut dyn FnMut(&mut ExampleScope) -> Result<(), ArborError>) -> Self {
        Self {
            next,
            invoked: false,
        }
    }

    /// Runs the wrapped chain. It may run at most once.
    pub fn run(&mut self, scope: &mut ExampleScope) -> Result<(), ArborError> {
        if self.invoked {
            return Err(err_msg!(
                Hook,
                "around hook ran the wrapped example more than once"
            ));
        }
        self.invoked = true;
        (self.next)(scope)
    }

    pub fn invoked(&self) -> bool {
        self.invoked
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    before_each: Vec<HookEntry>,
    before_all: Vec<HookEntry>,
    after_each: Vec<HookEntry>,
    after_all: Vec<HookEntry>,
    around_each: Vec<HookEntry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook to its `(phase, scope)` bucket.
    ///
    /// # Errors
    /// A `Definition` error when `around` is paired with `all`, or when the closure shape
    /// does not match the phase.
    pub fn add(
        &mut self,
        phase: Phase,
        scope: HookScope,
        func: HookFn,
        location: Location,
    ) -> Result<(), ArborError> {
        let shape_ok = matches!(
            (phase, &func),
            (Phase::Around, HookFn::Around(_)) | (Phase::Before | Phase::After, HookFn::Plain(_))
        );
        if !shape_ok {
            return Err(ArborError::definition(
                format!("a {phase} hook was given a closure of the wrong shape"),
                location,
                Some("around hooks take (scope, procedure); before/after hooks take (scope)"),
            ));
        }
        if self.bucket_mut(phase, scope).is_none() {
            return Err(ArborError::definition(
                format!("{phase}({scope}) is not supported"),
                location,
                Some("around hooks only accept HookScope::Each"),
            ));
        }
        self.push(phase, scope, func, location);
        Ok(())
    }

    /// Appends without validation; callers guarantee a matching shape and bucket.
    pub(crate) fn push(&mut self, phase: Phase, scope: HookScope, func: HookFn, location: Location) {
        let Some(bucket) = self.bucket_mut(phase, scope) else {
            debug_assert!(false, "no bucket for {phase}({scope})");
            return;
        };
        let index = bucket.len();
        bucket.push(HookEntry {
            phase,
            scope,
            index,
            location,
            func,
        });
    }

    /// The ordered hooks registered for `(phase, scope)`.
    pub fn hooks_for(&self, phase: Phase, scope: HookScope) -> &[HookEntry] {
        match (phase, scope) {
            (Phase::Before, HookScope::Each) => &self.before_each,
            (Phase::Before, HookScope::All) => &self.before_all,
            (Phase::After, HookScope::Each) => &self.after_each,
            (Phase::After, HookScope::All) => &self.after_all,
            (Phase::Around, HookScope::Each) => &self.around_each,
            (Phase::Around, HookScope::All) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_each.is_empty()
            && self.before_all.is_empty()
            && self.after_each.is_empty()
            && self.after_all.is_empty()
            && self.around_each.is_empty()
    }

    fn bucket_mut(&mut self, phase: Phase, scope: HookScope) -> Option<&mut Vec<HookEntry>> {
        match (phase, scope) {
            (Phase::Before, HookScope::Each) => Some(&mut self.before_each),
            (Phase::Before, HookScope::All) => Some(&mut self.before_all),
            (Phase::After, HookScope::Each) => Some(&mut self.after_each),
            (Phase::After, HookScope::All) => Some(&mut self.after_all),
            (Phase::Around, HookScope::Each) => Some(&mut self.around_each),
            (Phase::Around, HookScope::All) => None,
        }
    }
}

#[cfg(test)]
mod hook_registry_tests {
    use super::*;
    use crate::diagnostics::ErrorType;

    fn here() -> Location {
        Location {
            file: file!(),
            line: line!(),
            column: 1,
        }
    }

    fn values(registry: &HookRegistry, phase: Phase, scope: HookScope) -> Vec<Value> {
        let mut example_scope = ExampleScope::default();
        registry
            .hooks_for(phase, scope)
            .iter()
            .map(|hook| hook.call(&mut example_scope).unwrap())
            .collect()
    }

    #[test]
    fn test_buckets_preserve_insertion_order() {
        let mut registry = HookRegistry::new();
        registry
            .add(Phase::Before, HookScope::Each, HookFn::plain(|_| Ok(15)), here())
            .unwrap();
        registry
            .add(Phase::Before, HookScope::All, HookFn::plain(|_| Ok("all")), here())
            .unwrap();
        registry
            .add(Phase::Before, HookScope::Each, HookFn::plain(|_| Ok("A")), here())
            .unwrap();
        registry
            .add(Phase::Before, HookScope::Each, HookFn::plain(|_| Ok(33.5)), here())
            .unwrap();

        assert_eq!(
            values(&registry, Phase::Before, HookScope::Each),
            vec![Value::from(15), Value::from("A"), Value::from(33.5)]
        );
        assert_eq!(
            values(&registry, Phase::Before, HookScope::All),
            vec![Value::from("all")]
        );
        assert!(registry.hooks_for(Phase::After, HookScope::Each).is_empty());
        let indices: Vec<usize> = registry
            .hooks_for(Phase::Before, HookScope::Each)
            .iter()
            .map(|h| h.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut registry = HookRegistry::new();
        let hook = HookFn::plain(|_| Ok(()));
        registry
            .add(Phase::After, HookScope::All, hook.clone(), here())
            .unwrap();
        registry.add(Phase::After, HookScope::All, hook, here()).unwrap();
        assert_eq!(registry.hooks_for(Phase::After, HookScope::All).len(), 2);
    }

    #[test]
    fn test_around_all_is_rejected() {
        let mut registry = HookRegistry::new();
        let err = registry
            .add(
                Phase::Around,
                HookScope::All,
                HookFn::around(|_, _| Ok(())),
                here(),
            )
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Definition);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mismatched_shape_is_rejected() {
        let mut registry = HookRegistry::new();
        let err = registry
            .add(Phase::Around, HookScope::Each, HookFn::plain(|_| Ok(())), here())
            .unwrap_err();
        assert!(err.message().contains("wrong shape"));
        let err = registry
            .add(
                Phase::Before,
                HookScope::Each,
                HookFn::around(|_, _| Ok(())),
                here(),
            )
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Definition);
    }

    #[test]
    fn test_procedure_runs_at_most_once() {
        let mut calls = 0;
        let mut next = |_: &mut ExampleScope| -> Result<(), ArborError> {
            calls += 1;
            Ok(())
        };
        let mut scope = ExampleScope::default();
        let mut procedure = Procedure::new(&mut next);
        assert!(!procedure.invoked());
        procedure.run(&mut scope).unwrap();
        assert!(procedure.run(&mut scope).is_err());
        assert!(procedure.invoked());
        drop(procedure);
        assert_eq!(calls, 1);
    }
}
