//! Lexically nested name → value bindings.
//!
//! An environment owns a flat symbol table and an optional parent link.
//! Lookups walk upward toward the root; `assign` always writes to the
//! current scope (shadowing); `replace` finds the nearest scope that
//! already defines the name and updates it there, erroring if none do.

use crate::values::Value;
use farr_core::errors::FarrError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Environment {
    symbols: HashMap<String, Value>,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            symbols: HashMap::new(),
            parent: None,
        }))
    }

    pub fn child(parent: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            symbols: HashMap::new(),
            parent: Some(parent),
        }))
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn assign(&mut self, name: impl Into<String>, value: Value) {
        self.symbols.insert(name.into(), value);
    }

    pub fn exists(&self, name: &str) -> bool {
        if self.symbols.contains_key(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow().exists(name),
            None => false,
        }
    }

    pub fn locate(&self, name: &str) -> Result<Value, FarrError> {
        if let Some(value) = self.symbols.get(name) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.borrow().locate(name),
            None => Err(FarrError::name(format!("name '{name}' is not defined"))),
        }
    }

    /// Updates `name` in the nearest enclosing scope that already defines
    /// it. Fails if no scope in the chain defines the name.
    pub fn replace(&mut self, name: &str, value: Value) -> Result<(), FarrError> {
        if self.symbols.contains_key(name) {
            self.symbols.insert(name.to_string(), value);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().replace(name, value),
            None => Err(FarrError::name(format!("name '{name}' is not defined"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn lookup_walks_parents() {
        let root = Environment::new();
        root.borrow_mut().assign("x", Value::Integer(BigInt::from(1)));
        let child = Environment::child(root);
        assert!(child.borrow().locate("x").is_ok());
    }

    #[test]
    fn assign_shadows_without_touching_parent() {
        let root = Environment::new();
        root.borrow_mut().assign("x", Value::Integer(BigInt::from(1)));
        let child = Environment::child(root.clone());
        child.borrow_mut().assign("x", Value::Integer(BigInt::from(2)));
        assert!(matches!(root.borrow().locate("x").unwrap(), Value::Integer(n) if n == BigInt::from(1)));
        assert!(matches!(child.borrow().locate("x").unwrap(), Value::Integer(n) if n == BigInt::from(2)));
    }

    #[test]
    fn replace_updates_defining_scope() {
        let root = Environment::new();
        root.borrow_mut().assign("x", Value::Integer(BigInt::from(1)));
        let child = Environment::child(root.clone());
        child.borrow_mut().replace("x", Value::Integer(BigInt::from(9))).unwrap();
        assert!(matches!(root.borrow().locate("x").unwrap(), Value::Integer(n) if n == BigInt::from(9)));
    }

    #[test]
    fn replace_without_binding_errors() {
        let root = Environment::new();
        assert!(root.borrow_mut().replace("missing", Value::Null).is_err());
    }
}
