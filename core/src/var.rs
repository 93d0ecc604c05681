//! Vars: named, mutable storage cells owned by a module.
//!
//! A var has a root value (absent until first defined) and a stack of
//! dynamic bindings. Bindings are only pushed through [`Var::bind`], whose
//! guard pops on drop, so every exit path (including `?`) restores the
//! previous value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::collections::Dict;
use crate::error::{Error, Result};
use crate::identifier::Symbol;
use crate::language::{Value, next_id};

struct VarCell {
    id: u64,
    package: Rc<str>,
    module: Rc<str>,
    name: Rc<str>,
    root: RefCell<Option<Value>>,
    bindings: RefCell<Vec<Value>>,
    meta: RefCell<Option<Dict>>,
}

/// Shared handle to a var; clones refer to the same cell
#[derive(Clone)]
pub struct Var(Rc<VarCell>);

impl Var {
    /// Vars are created by `ModuleRegistry::intern`
    pub(crate) fn new(package: &str, module: &str, name: &str) -> Var {
        Var(Rc::new(VarCell {
            id: next_id(),
            package: Rc::from(package),
            module: Rc::from(module),
            name: Rc::from(name),
            root: RefCell::new(None),
            bindings: RefCell::new(Vec::new()),
            meta: RefCell::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Var) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn package(&self) -> &str {
        &self.0.package
    }

    pub fn module(&self) -> &str {
        &self.0.module
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The fully qualified symbol naming this var
    pub fn symbol(&self) -> Symbol {
        Symbol::full(self.package(), self.module(), self.name())
    }

    /// Current value: innermost binding, else the root
    pub fn value(&self) -> Option<Value> {
        if let Some(top) = self.0.bindings.borrow().last() {
            return Some(top.clone());
        }
        self.0.root.borrow().clone()
    }

    pub fn deref(&self) -> Result<Value> {
        self.value().ok_or_else(|| Error::unbound(self))
    }

    pub fn is_bound(&self) -> bool {
        self.value().is_some()
    }

    pub fn set_root(&self, value: Value) {
        *self.0.root.borrow_mut() = Some(value);
    }

    /// Assign the innermost binding if one is active, else the root
    pub fn set(&self, value: Value) {
        if let Some(top) = self.0.bindings.borrow_mut().last_mut() {
            *top = value;
            return;
        }
        self.set_root(value);
    }

    /// Dynamically rebind until the returned guard is dropped
    #[must_use = "the binding is popped as soon as the guard is dropped"]
    pub fn bind(&self, value: Value) -> BindingGuard {
        self.0.bindings.borrow_mut().push(value);
        BindingGuard { var: self.clone() }
    }

    pub fn binding_depth(&self) -> usize {
        self.0.bindings.borrow().len()
    }

    pub fn meta(&self) -> Option<Dict> {
        self.0.meta.borrow().clone()
    }

    pub fn set_meta(&self, meta: Option<Dict>) {
        *self.0.meta.borrow_mut() = meta;
    }

    fn flag(&self, key: &str) -> bool {
        self.0
            .meta
            .borrow()
            .as_ref()
            .and_then(|m| m.get_builtin(&Value::keyword(key)).map(Value::is_truthy))
            .unwrap_or(false)
    }

    /// Marked `:macro true` by `defmacro`
    pub fn is_macro(&self) -> bool {
        self.flag("macro")
    }

    pub fn is_private(&self) -> bool {
        self.flag("private")
    }
}

/// Pops the binding pushed by [`Var::bind`]
pub struct BindingGuard {
    var: Var,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.var.0.bindings.borrow_mut().pop();
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package(), self.module(), self.name())
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("name", &self.to_string())
            .field("bound", &self.is_bound())
            .field("depth", &self.binding_depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_unbound_until_defined() {
        let var = Var::new("p", "m", "x");
        assert!(!var.is_bound());
        assert_eq!(var.deref().unwrap_err().kind, ErrorKind::Unbound);
        var.set_root(Value::from(1));
        assert_eq!(var.deref().unwrap(), Value::from(1));
    }

    #[test]
    fn test_bindings_nest_and_pop() {
        let var = Var::new("p", "m", "x");
        var.set_root(Value::from(1));
        {
            let _outer = var.bind(Value::from(2));
            {
                let _inner = var.bind(Value::from(3));
                assert_eq!(var.deref().unwrap(), Value::from(3));
            }
            assert_eq!(var.deref().unwrap(), Value::from(2));
        }
        assert_eq!(var.deref().unwrap(), Value::from(1));
        assert_eq!(var.binding_depth(), 0);
    }

    #[test]
    fn test_binding_popped_on_error_path() {
        fn failing(var: &Var) -> Result<()> {
            let _guard = var.bind(Value::from(2));
            Err(Error::runtime("boom"))
        }
        let var = Var::new("p", "m", "x");
        var.set_root(Value::from(1));
        assert!(failing(&var).is_err());
        assert_eq!(var.deref().unwrap(), Value::from(1));
    }

    #[test]
    fn test_set_targets_innermost_binding() {
        let var = Var::new("p", "m", "x");
        var.set_root(Value::from(1));
        {
            let _g = var.bind(Value::from(2));
            var.set(Value::from(5));
            assert_eq!(var.deref().unwrap(), Value::from(5));
        }
        assert_eq!(var.deref().unwrap(), Value::from(1));
    }

    #[test]
    fn test_macro_flag() {
        let var = Var::new("p", "m", "when");
        assert!(!var.is_macro());
        var.set_meta(Some(
            Dict::new()
                .assoc(Value::keyword("macro"), Value::Bool(true))
                .unwrap(),
        ));
        assert!(var.is_macro());
    }

    #[test]
    fn test_display() {
        assert_eq!(Var::new("cairn", "lang", "map").to_string(), "cairn:lang:map");
    }
}
