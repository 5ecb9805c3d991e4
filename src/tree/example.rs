use std::fmt;
use std::rc::{Rc, Weak};

use crate::diagnostics::{ArborError, Location};
use crate::runtime::scope::{ExampleScope, RunningExample};
use crate::tree::group::GroupInfo;
use crate::tree::metadata::Metadata;

pub type ExampleBody = Rc<dyn Fn(&mut ExampleScope) -> Result<(), ArborError>>;

/// A leaf test case.
#[derive(Clone)]
pub struct Example {
    description: String,
    metadata: Metadata,
    body: ExampleBody,
    group: Weak<GroupInfo>,
    location: Location,
}

impl Example {
    pub(crate) fn new(
        group: &Rc<GroupInfo>,
        description: String,
        own: Metadata,
        body: ExampleBody,
        location: Location,
    ) -> Self {
        let full_name = [group.full_name(), description.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let mut metadata = group.metadata().merged_with(&own);
        metadata.stamp(&description, &full_name, location);

        Self {
            description,
            metadata,
            body,
            group: Rc::downgrade(group),
            location,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn full_name(&self) -> &str {
        self.metadata.full_name()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// The owning group, while the tree that holds this example is alive.
    pub fn example_group(&self) -> Option<Rc<GroupInfo>> {
        self.group.upgrade()
    }

    pub(crate) fn body(&self) -> &ExampleBody {
        &self.body
    }

    pub(crate) fn running(&self, group: &Rc<GroupInfo>) -> RunningExample {
        RunningExample {
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            group: Rc::clone(group),
        }
    }
}

impl fmt::Debug for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Example")
            .field("full_name", &self.full_name())
            .field("location", &self.location)
            .finish()
    }
}
