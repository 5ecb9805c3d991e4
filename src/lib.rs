//! # Arbor
//!
//! An execution engine for behaviour-driven example trees.
//!
//! Groups are defined with [`describe`], nest freely, and carry examples, hooks, memoized
//! lets and metadata. A [`Runner`] walks the tree depth-first, isolates every example in its
//! own [`ExampleScope`], and reports each result to a [`Reporter`].
//!
//! ```rust
//! use arbor::{describe, run_examples, HookScope, RecordingReporter};
//!
//! let root = describe("Stack", |g| {
//!     g.before(HookScope::Each, |scope| {
//!         scope.set("size", 0.0);
//!         Ok(())
//!     });
//!     g.it("starts empty", |scope| {
//!         assert_eq!(scope.get("size").and_then(|v| v.as_number()), Some(0.0));
//!         Ok(())
//!     });
//!     Ok(())
//! })
//! .unwrap();
//!
//! let mut reporter = RecordingReporter::new();
//! assert!(run_examples(&root, &mut reporter));
//! ```

pub mod config;
pub mod diagnostics;
pub mod hooks;
pub mod reporter;
pub mod runtime;
pub mod tree;
pub mod value;

pub use crate::config::{ColorMode, RunConfig};
pub use crate::diagnostics::{ArborError, ErrorContext, ErrorType, Location};
pub use crate::hooks::{HookEntry, HookFn, HookRegistry, HookScope, Phase, Procedure};
pub use crate::reporter::console::ConsoleReporter;
pub use crate::reporter::{NullReporter, RecordingReporter, Reporter, ReporterEvent};
pub use crate::runtime::{
    run_examples, ExampleResult, ExampleScope, Failure, FailureCause, HookSite, LetCache,
    RunSummary, Runner, RunningExample, Variables,
};
pub use crate::tree::{
    define_group, describe, Example, Group, GroupDef, GroupInfo, Metadata, Subject, Target,
};
pub use crate::value::Value;
