//! The definition tree: groups, examples, their metadata and the types they describe.
//!
//! A tree is built eagerly by [`describe`]/[`define_group`]; every body runs exactly once
//! at definition time and the resulting [`Group`] is the single owner of everything below
//! it.

pub mod example;
pub mod group;
pub mod metadata;
pub mod subject;

pub use example::{Example, ExampleBody};
pub use group::{define_group, describe, Group, GroupDef, GroupInfo, Target};
pub use metadata::Metadata;
pub use subject::Subject;
