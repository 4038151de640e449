use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::builtins::BUILTINS;
use crate::object::Object;

/// Name-to-value scope used by the evaluator. Scopes chain through `outer`;
/// lookups walk outward, bindings always land in the innermost scope.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: Rc<RefCell<Environment>>) -> Self {
        Self {
            store: HashMap::new(),
            outer: Some(outer),
        }
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer| outer.borrow().get(name)),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.store.insert(name.into(), value);
    }
}

/// Root environment with the builtin functions installed, ready for
/// top-level evaluation.
pub fn global_environment() -> Rc<RefCell<Environment>> {
    let mut env = Environment::new();
    for builtin in BUILTINS.iter() {
        env.set(builtin.name, Object::Builtin(builtin));
    }
    Rc::new(RefCell::new(env))
}
