//! Example groups and their definitional API.
//!
//! A [`Group`] owns its children and examples. Everything else about a group (names,
//! subject, merged metadata, hooks and lets) lives in a shared [`GroupInfo`]; children and
//! examples point back at it through `Weak` references, so the tree has exactly one owner,
//! whoever holds the root `Group`, while a run started anywhere in the tree can still reach
//! the hooks and lets of every enclosing group.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::diagnostics::{ArborError, Location};
use crate::hooks::{HookEntry, HookFn, HookRegistry, HookScope, Phase, Procedure};
use crate::runtime::lets::{erase_let, LetFn};
use crate::runtime::scope::ExampleScope;
use crate::tree::example::Example;
use crate::tree::metadata::{self, Metadata};
use crate::tree::subject::Subject;
use crate::value::Value;

const NO_TARGET: &str = "No arguments given. You must at least supply a type or description";
const NO_BODY: &str = "You must supply a body when calling describe";

type GroupBody = Box<dyn FnOnce(&mut Group) -> Result<(), ArborError>>;

// ============================================================================
// TARGET: what a group describes
// ============================================================================

/// The first argument of `describe`: a type or a literal description.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Subject(Subject),
    Text(String),
}

impl From<Subject> for Target {
    fn from(subject: Subject) -> Self {
        Target::Subject(subject)
    }
}

impl From<&str> for Target {
    fn from(text: &str) -> Self {
        Target::Text(text.to_string())
    }
}

impl From<String> for Target {
    fn from(text: String) -> Self {
        Target::Text(text)
    }
}

// ============================================================================
// GROUP DEFINITION
// ============================================================================

/// Everything a `describe` call supplies. Validated by [`define_group`].
pub struct GroupDef {
    target: Option<Target>,
    description: Option<String>,
    metadata: Metadata,
    body: Option<GroupBody>,
    location: Location,
}

impl GroupDef {
    #[track_caller]
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::empty()
        }
    }

    /// A definition with no target; only useful to build one up field by field.
    #[track_caller]
    pub fn empty() -> Self {
        Self {
            target: None,
            description: None,
            metadata: Metadata::new(),
            body: None,
            location: Location::caller(),
        }
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The extra description text following the target.
    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = self.metadata.merged_with(&metadata);
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: FnOnce(&mut Group) -> Result<(), ArborError> + 'static,
    {
        self.body = Some(Box::new(body));
        self
    }
}

/// Defines a root group.
///
/// # Errors
/// A `Definition` error when the definition has no target or no body, or whatever error
/// the body returns.
pub fn define_group(def: GroupDef) -> Result<Group, ArborError> {
    Group::build(def, None)
}

/// Shorthand for `define_group(GroupDef::new(target).body(body))`.
///
/// ```rust
/// use arbor::{describe, Subject};
/// struct Object;
/// let group = describe(Subject::of::<Object>(), |g| {
///     g.it("works", |_| Ok(()));
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(group.full_name(), "Object");
/// ```
#[track_caller]
pub fn describe<F>(target: impl Into<Target>, body: F) -> Result<Group, ArborError>
where
    F: FnOnce(&mut Group) -> Result<(), ArborError> + 'static,
{
    define_group(GroupDef::new(target).body(body))
}

// ============================================================================
// GROUP INFO: the shared, descriptive half of a group
// ============================================================================

pub struct GroupInfo {
    subject: Option<Subject>,
    description: String,
    label: String,
    full_name: String,
    metadata: Metadata,
    location: Location,
    parent: Option<Weak<GroupInfo>>,
    hooks: RefCell<HookRegistry>,
    lets: RefCell<Vec<(String, LetFn)>>,
}

impl GroupInfo {
    fn new(
        target: Target,
        extra: Option<String>,
        own: Metadata,
        location: Location,
        parent: Option<&Rc<GroupInfo>>,
    ) -> Self {
        let extra = extra.unwrap_or_default();
        let (subject, label, description) = match target {
            Target::Subject(subject) => {
                let label = join_nonempty(&[&subject.name(), &extra]);
                (Some(subject), label, extra)
            }
            // Text groups describe whatever their enclosing group describes.
            Target::Text(text) => {
                let joined = join_nonempty(&[&text, &extra]);
                (parent.and_then(|p| p.subject), joined.clone(), joined)
            }
        };
        let full_name = join_nonempty(&[parent.map_or("", |p| p.full_name()), &label]);

        let inherited = parent.map(|p| p.metadata.clone()).unwrap_or_default();
        let mut metadata = inherited.merged_with(&own);
        metadata.stamp(&description, &full_name, location);
        metadata.insert(metadata::EXAMPLE_GROUP, Metadata::group_record(location));
        metadata.insert(metadata::DESCRIBES, subject.map(|s| s.name()));

        Self {
            subject,
            description,
            label,
            full_name,
            metadata,
            location,
            parent: parent.map(Rc::downgrade),
            hooks: RefCell::new(HookRegistry::new()),
            lets: RefCell::new(Vec::new()),
        }
    }

    /// The subject type of this group or, for text groups, of the nearest ancestor with one.
    pub fn describes(&self) -> Option<Subject> {
        self.subject
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// This group's own contribution to `full_name`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Every ancestor's label and this group's, space-joined root to leaf.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        &self.full_name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn file_path(&self) -> &'static str {
        self.location.file
    }

    pub fn line_number(&self) -> u32 {
        self.location.line
    }

    pub fn parent(&self) -> Option<Rc<GroupInfo>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Every enclosing group, root first. Empty for a root group.
    pub fn ancestors(&self) -> Vec<Rc<GroupInfo>> {
        let mut chain = Vec::new();
        let mut next = self.parent();
        while let Some(info) = next {
            next = info.parent();
            chain.push(info);
        }
        chain.reverse();
        chain
    }

    /// The hooks registered on this group for `(phase, scope)`, in insertion order.
    pub fn hooks_for(&self, phase: Phase, scope: HookScope) -> Vec<HookEntry> {
        self.hooks.borrow().hooks_for(phase, scope).to_vec()
    }

    /// Let definitions registered on this group, in registration order.
    pub(crate) fn let_definitions(&self) -> Vec<(String, LetFn)> {
        self.lets.borrow().clone()
    }
}

impl fmt::Debug for GroupInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupInfo")
            .field("full_name", &self.full_name)
            .field("subject", &self.subject)
            .field("location", &self.location)
            .field("hooks", &self.hooks.borrow())
            .finish_non_exhaustive()
    }
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// GROUP
// ============================================================================

pub struct Group {
    info: Rc<GroupInfo>,
    children: Vec<Group>,
    examples: Vec<Example>,
}

impl Group {
    fn build(def: GroupDef, parent: Option<&Rc<GroupInfo>>) -> Result<Group, ArborError> {
        let GroupDef {
            target,
            description,
            metadata,
            body,
            location,
        } = def;
        let Some(target) = target else {
            return Err(ArborError::definition(NO_TARGET, location, None));
        };
        let Some(body) = body else {
            return Err(ArborError::definition(
                NO_BODY,
                location,
                Some("pass a closure with GroupDef::body"),
            ));
        };

        let info = Rc::new(GroupInfo::new(target, description, metadata, location, parent));
        tracing::trace!(group = %info.full_name(), "defining group");
        let mut group = Group {
            info,
            children: Vec::new(),
            examples: Vec::new(),
        };
        body(&mut group)?;
        Ok(group)
    }

    // ------------------------------------------------------------------------
    // Nesting
    // ------------------------------------------------------------------------

    /// Defines a child group. On error the child is not attached.
    pub fn define_group(&mut self, def: GroupDef) -> Result<&mut Group, ArborError> {
        let child = Group::build(def, Some(&self.info))?;
        let index = self.children.len();
        self.children.push(child);
        Ok(&mut self.children[index])
    }

    #[track_caller]
    pub fn describe<F>(
        &mut self,
        target: impl Into<Target>,
        body: F,
    ) -> Result<&mut Group, ArborError>
    where
        F: FnOnce(&mut Group) -> Result<(), ArborError> + 'static,
    {
        self.define_group(GroupDef::new(target).body(body))
    }

    // ------------------------------------------------------------------------
    // Examples
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn define_example<F>(&mut self, description: &str, metadata: Metadata, body: F) -> &Example
    where
        F: Fn(&mut ExampleScope) -> Result<(), ArborError> + 'static,
    {
        let location = Location::caller();
        let example = Example::new(
            &self.info,
            description.to_string(),
            metadata,
            Rc::new(body),
            location,
        );
        let index = self.examples.len();
        self.examples.push(example);
        &self.examples[index]
    }

    #[track_caller]
    pub fn it<F>(&mut self, description: &str, body: F) -> &Example
    where
        F: Fn(&mut ExampleScope) -> Result<(), ArborError> + 'static,
    {
        self.define_example(description, Metadata::new(), body)
    }

    // ------------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn add_hook(
        &mut self,
        phase: Phase,
        scope: HookScope,
        func: HookFn,
    ) -> Result<(), ArborError> {
        self.info
            .hooks
            .borrow_mut()
            .add(phase, scope, func, Location::caller())
    }

    #[track_caller]
    pub fn before<V, F>(&mut self, scope: HookScope, f: F)
    where
        V: Into<Value>,
        F: Fn(&mut ExampleScope) -> Result<V, ArborError> + 'static,
    {
        self.info
            .hooks
            .borrow_mut()
            .push(Phase::Before, scope, HookFn::plain(f), Location::caller());
    }

    #[track_caller]
    pub fn after<V, F>(&mut self, scope: HookScope, f: F)
    where
        V: Into<Value>,
        F: Fn(&mut ExampleScope) -> Result<V, ArborError> + 'static,
    {
        self.info
            .hooks
            .borrow_mut()
            .push(Phase::After, scope, HookFn::plain(f), Location::caller());
    }

    /// Registers an `around(:each)` hook.
    #[track_caller]
    pub fn around<V, F>(&mut self, f: F)
    where
        V: Into<Value>,
        F: Fn(&mut ExampleScope, &mut Procedure<'_>) -> Result<V, ArborError> + 'static,
    {
        self.info.hooks.borrow_mut().push(
            Phase::Around,
            HookScope::Each,
            HookFn::around(f),
            Location::caller(),
        );
    }

    pub fn hooks_for(&self, phase: Phase, scope: HookScope) -> Vec<HookEntry> {
        self.info.hooks_for(phase, scope)
    }

    // ------------------------------------------------------------------------
    // Lets
    // ------------------------------------------------------------------------

    /// Registers a memoized helper, readable with [`ExampleScope::let_value`].
    pub fn define_let<T, F>(&mut self, name: &str, f: F)
    where
        T: 'static,
        F: Fn(&mut ExampleScope) -> Result<T, ArborError> + 'static,
    {
        self.info
            .lets
            .borrow_mut()
            .push((name.to_string(), erase_let(f)));
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn info(&self) -> &Rc<GroupInfo> {
        &self.info
    }

    pub fn describes(&self) -> Option<Subject> {
        self.info.describes()
    }

    pub fn description(&self) -> &str {
        self.info.description()
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn full_name(&self) -> &str {
        self.info.full_name()
    }

    pub fn metadata(&self) -> &Metadata {
        self.info.metadata()
    }

    pub fn file_path(&self) -> &'static str {
        self.info.file_path()
    }

    pub fn line_number(&self) -> u32 {
        self.info.line_number()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn children(&self) -> &[Group] {
        &self.children
    }

    /// Examples in this group and all descendants.
    pub fn example_count(&self) -> usize {
        self.examples.len() + self.children.iter().map(Group::example_count).sum::<usize>()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("full_name", &self.full_name())
            .field("examples", &self.examples)
            .field("children", &self.children)
            .finish()
    }
}
