//! Explicit state containers shared between hooks and example bodies.
//!
//! [`Variables`] is a persistent map: cloning it is O(1) and later writes to the clone never
//! reach the original. The engine relies on that to hand each example a private copy of its
//! group's before-all snapshot without copying the contents up front.

use std::rc::Rc;

use im::OrdMap;

use crate::diagnostics::ArborError;
use crate::err_msg;
use crate::runtime::lets::{LetCache, LetSlot};
use crate::tree::{GroupInfo, Metadata};
use crate::value::Value;

// ============================================================================
// VARIABLES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: OrdMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// True when every `(name, value)` of `other` is present here.
    pub fn includes(&self, other: &Variables) -> bool {
        other
            .values
            .iter()
            .all(|(name, value)| self.values.get(name) == Some(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Variables {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// RUNNING EXAMPLE
// ============================================================================

/// What a hook or body can see about the example currently executing.
#[derive(Debug, Clone)]
pub struct RunningExample {
    pub(crate) description: String,
    pub(crate) metadata: Metadata,
    pub(crate) group: Rc<GroupInfo>,
}

impl RunningExample {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn full_name(&self) -> &str {
        self.metadata.full_name()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn example_group(&self) -> &GroupInfo {
        &self.group
    }
}

// ============================================================================
// EXAMPLE SCOPE
// ============================================================================

/// The state passed by reference into every hook and example body.
///
/// Before-all hooks receive a scope seeded from the parent activation's snapshot; whatever
/// they leave in it becomes the group's snapshot. Each example receives a scope seeded from
/// that snapshot plus an empty let cache.
#[derive(Debug, Clone, Default)]
pub struct ExampleScope {
    vars: Variables,
    snapshot: Variables,
    lets: LetCache,
    running: Option<RunningExample>,
}

impl ExampleScope {
    pub(crate) fn new(snapshot: Variables, lets: LetCache, running: Option<RunningExample>) -> Self {
        Self {
            vars: snapshot.clone(),
            snapshot,
            lets,
            running,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.set(name, value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    /// The before-all state this scope was seeded from, unaffected by writes to the scope.
    pub fn before_all_snapshot(&self) -> &Variables {
        &self.snapshot
    }

    pub fn running_example(&self) -> Option<&RunningExample> {
        self.running.as_ref()
    }

    pub fn lets(&self) -> &LetCache {
        &self.lets
    }

    /// Reads a let helper, evaluating it on first access within this example.
    ///
    /// # Errors
    /// An `Execution` error when the helper is undefined, holds a different type, reads
    /// itself while being computed, or when its closure fails.
    pub fn let_value<T: 'static>(&mut self, name: &str) -> Result<Rc<T>, ArborError> {
        match self.lets.slot(name) {
            Some(LetSlot::Computed(value)) => return downcast(name, value.clone()),
            Some(LetSlot::Computing) => {
                return Err(err_msg!(
                    Execution,
                    "let `{}` refers to itself while being computed",
                    name
                ))
            }
            None => {}
        }

        let Some(definition) = self.lets.definition(name) else {
            return Err(err_msg!(Execution, "no let named `{}` is defined", name));
        };

        self.lets.begin(name);
        match definition(self) {
            Ok(value) => {
                self.lets.finish(name, value.clone());
                downcast(name, value)
            }
            Err(e) => {
                self.lets.abandon(name);
                Err(e)
            }
        }
    }

    /// Consumes the scope, returning its variables.
    pub(crate) fn into_variables(self) -> Variables {
        self.vars
    }
}

fn downcast<T: 'static>(name: &str, value: crate::runtime::lets::LetValue) -> Result<Rc<T>, ArborError> {
    value.downcast::<T>().map_err(|_| {
        err_msg!(
            Execution,
            "let `{}` does not hold a value of type {}",
            name,
            std::any::type_name::<T>()
        )
    })
}

#[cfg(test)]
mod scope_tests {
    use std::cell::Cell;

    use super::*;
    use crate::runtime::lets::{erase_let, LetDefinitions};

    #[derive(Default)]
    struct Counter {
        count: Cell<u32>,
    }

    impl Counter {
        fn count(&self) -> u32 {
            self.count.set(self.count.get() + 1);
            self.count.get()
        }
    }

    fn definitions() -> LetDefinitions {
        let mut defs = LetDefinitions::new();
        defs.insert(
            "counter".to_string(),
            erase_let(|_| Ok(Counter::default())),
        );
        defs.insert(
            "greeting".to_string(),
            erase_let(|scope| {
                let name = scope
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("nobody")
                    .to_string();
                Ok(format!("hello {name}"))
            }),
        );
        defs.insert(
            "selfish".to_string(),
            erase_let(|scope| scope.let_value::<u32>("selfish").map(|v| *v)),
        );
        defs
    }

    fn scope() -> ExampleScope {
        ExampleScope::new(Variables::new(), LetCache::new(definitions()), None)
    }

    #[test]
    fn test_let_is_memoized_within_a_scope() {
        let mut scope = scope();
        assert!(!scope.lets().is_computed("counter"));
        assert_eq!(scope.let_value::<Counter>("counter").unwrap().count(), 1);
        assert_eq!(scope.let_value::<Counter>("counter").unwrap().count(), 2);
        assert!(scope.lets().is_computed("counter"));

        let mut fresh = self::scope();
        assert_eq!(fresh.let_value::<Counter>("counter").unwrap().count(), 1);
    }

    #[test]
    fn test_let_sees_scope_variables() {
        let mut scope = scope();
        scope.set("name", "arbor");
        assert_eq!(
            *scope.let_value::<String>("greeting").unwrap(),
            "hello arbor"
        );
    }

    #[test]
    fn test_let_errors() {
        let mut scope = scope();
        let undefined = scope.let_value::<u32>("missing").unwrap_err();
        assert!(undefined.message().contains("no let named `missing`"));

        let wrong_type = scope.let_value::<u32>("greeting").unwrap_err();
        assert!(wrong_type.message().contains("does not hold"));

        let cycle = scope.let_value::<u32>("selfish").unwrap_err();
        assert!(cycle.message().contains("refers to itself"));
        assert!(!scope.lets().is_computed("selfish"));
    }

    #[test]
    fn test_writes_do_not_touch_the_snapshot() {
        let snapshot: Variables = [("top", "original")].into_iter().collect();
        let mut scope = ExampleScope::new(snapshot.clone(), LetCache::default(), None);
        scope.set("top", "changed");

        assert_eq!(scope.get("top"), Some(&Value::from("changed")));
        assert_eq!(
            scope.before_all_snapshot().get("top"),
            Some(&Value::from("original"))
        );
        assert_eq!(snapshot.get("top"), Some(&Value::from("original")));
    }
}
