//! Lazily-evaluated, per-example memoized helpers.
//!
//! A group registers `name -> closure` definitions. The engine folds the definitions of a
//! group and its ancestors into one [`LetDefinitions`] table (descendants override) and
//! hands every example a fresh [`LetCache`] over that table.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use im::HashMap as PersistentMap;

use crate::diagnostics::ArborError;
use crate::runtime::scope::ExampleScope;

pub type LetValue = Rc<dyn Any>;
pub type LetFn = Rc<dyn Fn(&mut ExampleScope) -> Result<LetValue, ArborError>>;

/// All let helpers visible at some point of the tree.
pub type LetDefinitions = PersistentMap<String, LetFn>;

pub(crate) fn erase_let<T, F>(f: F) -> LetFn
where
    T: 'static,
    F: Fn(&mut ExampleScope) -> Result<T, ArborError> + 'static,
{
    Rc::new(move |scope: &mut ExampleScope| f(scope).map(|value| Rc::new(value) as LetValue))
}

#[derive(Clone)]
pub(crate) enum LetSlot {
    /// The closure is running; a nested read of the same name is a cycle.
    Computing,
    Computed(LetValue),
}

/// Per-example memo table.
#[derive(Clone, Default)]
pub struct LetCache {
    definitions: LetDefinitions,
    slots: HashMap<String, LetSlot>,
}

impl LetCache {
    pub fn new(definitions: LetDefinitions) -> Self {
        Self {
            definitions,
            slots: HashMap::new(),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(LetSlot::Computed(_)))
    }

    pub(crate) fn slot(&self, name: &str) -> Option<&LetSlot> {
        self.slots.get(name)
    }

    pub(crate) fn definition(&self, name: &str) -> Option<LetFn> {
        self.definitions.get(name).cloned()
    }

    pub(crate) fn begin(&mut self, name: &str) {
        self.slots.insert(name.to_string(), LetSlot::Computing);
    }

    pub(crate) fn finish(&mut self, name: &str, value: LetValue) {
        self.slots.insert(name.to_string(), LetSlot::Computed(value));
    }

    pub(crate) fn abandon(&mut self, name: &str) {
        self.slots.remove(name);
    }
}

impl std::fmt::Debug for LetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.definitions.keys().collect();
        names.sort();
        f.debug_struct("LetCache")
            .field("definitions", &names)
            .field("computed", &self.slots.len())
            .finish()
    }
}
