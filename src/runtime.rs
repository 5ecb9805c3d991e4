//! Everything that happens after a tree is defined: scopes, lets, outcomes and the engine.

pub mod engine;
pub mod lets;
pub mod outcome;
pub mod scope;

pub use engine::{run_examples, ActivationState, Runner};
pub use lets::{LetCache, LetDefinitions, LetFn, LetValue};
pub use outcome::{ExampleResult, Failure, FailureCause, HookSite, RunSummary};
pub use scope::{ExampleScope, RunningExample, Variables};
