use crate::types::{Symbol, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),
}

/// Shared handle to a scope. Closures and deferred tails keep their scope
/// alive for as long as they need it.
pub type Env = Rc<RefCell<Environment>>;

// --- Environment Definition ---

#[derive(Debug)]
pub struct Environment {
    outer: Option<Env>,
    bindings: HashMap<Symbol, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Walks the outer chain up to the global environment.
    pub fn root(env: &Env) -> Env {
        let mut current = env.clone();
        while !current.borrow().is_global() {
            let outer = current.borrow().outer.clone();
            if let Some(outer) = outer {
                current = outer;
            }
        }
        current
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    /// Outer frames are never touched.
    pub fn define(&mut self, name: Symbol, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name),
                None => Err(EnvError::UnresolvedReference(name.to_string())),
            }
        }
    }

    /// True for the top-level scope, which has no outer environment.
    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Gets every identifier visible from this environment
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> =
            self.bindings.keys().map(|i| i.to_string()).collect();
        if let Some(ref outer_env_ptr) = self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}
