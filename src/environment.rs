use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use snafu::Snafu;

use crate::value::Value;

type Result<T> = std::result::Result<T, EnvironmentError>;

#[derive(Debug, Default)]
struct Scope {
    enclosing: Option<Environment>,
    values: HashMap<String, Value>,
}

/// Shared handle to one scope of the lexical chain. Clones alias the same
/// scope, which is how closures keep their defining scope alive.
#[derive(Debug, Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// A fresh outermost scope.
    pub fn global() -> Self {
        Self::default()
    }

    /// A child scope whose lookups fall back to `self`.
    pub fn enclosed(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            enclosing: Some(self.clone()),
            values: HashMap::new(),
        })))
    }

    /// Binds in this scope only; redefinition overwrites.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if let Some(value) = scope.values.get(name) {
                    return Ok(value.clone());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => current = enclosing,
                None => return UndefinedVariableSnafu { name }.fail(),
            }
        }
    }

    /// Rebinds the nearest existing binding. Never creates one.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut current = self.clone();
        loop {
            let next = {
                let mut scope = current.0.borrow_mut();
                if let Some(slot) = scope.values.get_mut(name) {
                    *slot = value;
                    return Ok(());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => current = enclosing,
                None => return UndefinedVariableSnafu { name }.fail(),
            }
        }
    }

    /// Number of scopes between this one and the global scope.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.0.borrow().enclosing.clone();
        while let Some(env) = current {
            depth += 1;
            current = env.0.borrow().enclosing.clone();
        }
        depth
    }
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    #[snafu(display("Undefined variable '{name}'."))]
    UndefinedVariable { name: String },
}
