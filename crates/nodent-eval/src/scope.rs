//! Lexical environments.
//!
//! Only function scopes and catch parameters introduce bindings, so an
//! environment is a flat map with a link to its enclosing environment.

use nodent_runtime::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

struct Bindings {
    vars: FxHashMap<String, Value>,
    parent: Option<Environment>,
}

/// Shared handle to one scope in the chain.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Bindings>>);

impl Environment {
    pub fn global() -> Environment {
        Environment(Rc::new(RefCell::new(Bindings {
            vars: FxHashMap::default(),
            parent: None,
        })))
    }

    /// A new scope whose parent is `self`.
    pub fn extend(&self) -> Environment {
        Environment(Rc::new(RefCell::new(Bindings {
            vars: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    pub fn is_global(&self) -> bool {
        self.0.borrow().parent.is_none()
    }

    /// Create or overwrite a binding in this scope.
    pub fn declare(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// `var` hoisting: an existing binding (a parameter, say) keeps its value.
    pub fn declare_if_absent(&self, name: &str) {
        self.0
            .borrow_mut()
            .vars
            .entry(name.to_string())
            .or_insert(Value::Undefined);
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().vars.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self.clone();
        loop {
            let parent = {
                let bindings = env.0.borrow();
                if let Some(value) = bindings.vars.get(name) {
                    return Some(value.clone());
                }
                bindings.parent.clone()
            };
            env = parent?;
        }
    }

    /// Assign to the nearest binding of `name`; an undeclared name becomes a
    /// global.
    pub fn assign(&self, name: &str, value: Value) {
        let mut env = self.clone();
        loop {
            let parent = {
                let mut bindings = env.0.borrow_mut();
                if let Some(slot) = bindings.vars.get_mut(name) {
                    *slot = value;
                    return;
                }
                match &bindings.parent {
                    Some(parent) => parent.clone(),
                    None => {
                        bindings.vars.insert(name.to_string(), value);
                        return;
                    }
                }
            };
            env = parent;
        }
    }
}
