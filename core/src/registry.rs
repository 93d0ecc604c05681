//! The module registry: packages own modules, modules own vars.
//!
//! Ownership runs one way. The registry owns packages, a package owns its
//! modules, and a module refers back to its package by name only. Every
//! module except the bootstrap one falls back to the bootstrap module when
//! an unqualified name is not found locally, which is how built-ins are
//! visible everywhere without an import.
//!
//! Nothing is ever removed; packages, modules and vars accumulate as code
//! loads.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::collections::Dict;
use crate::error::{Error, Result};
use crate::identifier::{Context, QSym, Symbol};
use crate::language::Value;
use crate::var::{BindingGuard, Var};

pub const BOOTSTRAP_PACKAGE: &str = "cairn";
pub const BOOTSTRAP_MODULE: &str = "lang";
pub const DEFAULT_PACKAGE: &str = "localpkg";
pub const DEFAULT_MODULE: &str = "user";
pub const CURRENT_MODULE_VAR: &str = "*current-module*";

fn validate_name(kind: &str, name: &str, allow_colon: bool) -> Result<()> {
    if name.is_empty() {
        return Err(Error::assertion(format!("{kind} name must not be empty")));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(Error::assertion(format!(
            "{kind} name must not contain whitespace: {name:?}"
        )));
    }
    if !allow_colon && name.contains(':') {
        return Err(Error::assertion(format!(
            "{kind} name must not contain ':': {name:?}"
        )));
    }
    Ok(())
}

// ============================================================================
// Module
// ============================================================================

#[derive(Debug)]
pub struct Module {
    package: Rc<str>,
    name: Rc<str>,
    vars: RefCell<FxHashMap<Rc<str>, Var>>,
    /// alias -> (package, module)
    aliases: RefCell<FxHashMap<Rc<str>, (Rc<str>, Rc<str>)>>,
    context: RefCell<Context>,
    /// Where unqualified lookups go when the name is not local
    fallback: Option<Rc<Module>>,
}

impl Module {
    fn new(package: &str, name: &str, fallback: Option<Rc<Module>>) -> Module {
        Module {
            package: Rc::from(package),
            name: Rc::from(name),
            vars: RefCell::new(FxHashMap::default()),
            aliases: RefCell::new(FxHashMap::default()),
            context: RefCell::new(Context::well_known()),
            fallback,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `package:module`
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.package, self.name)
    }

    /// The symbol stored in `*current-module*` while this module is current
    pub fn to_value(&self) -> Value {
        Value::from(Symbol::qualified(&self.package, &self.name))
    }

    /// A var defined in this module itself
    pub fn find_var(&self, name: &str) -> Option<Var> {
        self.vars.borrow().get(name).cloned()
    }

    /// A var visible from this module: local first, then the bootstrap module
    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.find_var(name)
            .or_else(|| self.fallback.as_ref().and_then(|m| m.lookup(name)))
    }

    /// Vars defined here, sorted by name
    pub fn vars(&self) -> Vec<Var> {
        let mut vars: Vec<Var> = self.vars.borrow().values().cloned().collect();
        vars.sort_by(|a, b| a.name().cmp(b.name()));
        vars
    }

    fn intern(&self, name: &str) -> Var {
        if let Some(var) = self.find_var(name) {
            return var;
        }
        let var = Var::new(&self.package, &self.name, name);
        self.vars.borrow_mut().insert(Rc::from(name), var.clone());
        var
    }

    pub fn add_alias(&self, alias: &str, package: &str, module: &str) -> Result<()> {
        validate_name("Alias", alias, false)?;
        debug!(module = %self.full_name(), alias, target = %format!("{package}:{module}"), "added alias");
        self.aliases
            .borrow_mut()
            .insert(Rc::from(alias), (Rc::from(package), Rc::from(module)));
        Ok(())
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<(Rc<str>, Rc<str>)> {
        self.aliases.borrow().get(alias).cloned()
    }

    /// Reader context: the well-known prefixes plus this module's overrides
    pub fn context(&self) -> Context {
        self.context.borrow().clone()
    }

    pub fn add_prefix(&self, prefix: &str, base: &str) -> Result<()> {
        validate_name("Prefix", prefix, false)?;
        self.context.borrow_mut().insert(prefix, base);
        Ok(())
    }
}

// ============================================================================
// Package
// ============================================================================

#[derive(Debug)]
pub struct Package {
    name: Rc<str>,
    modules: RefCell<FxHashMap<Rc<str>, Rc<Module>>>,
}

impl Package {
    fn new(name: &str) -> Package {
        Package {
            name: Rc::from(name),
            modules: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_module(&self, name: &str) -> Option<Rc<Module>> {
        self.modules.borrow().get(name).cloned()
    }

    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.borrow().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Root of the namespace tree. One per compiler; shared by the host that
/// executes emitted code.
#[derive(Debug)]
pub struct ModuleRegistry {
    packages: RefCell<FxHashMap<Rc<str>, Rc<Package>>>,
    bootstrap: Rc<Module>,
    current: Var,
}

impl ModuleRegistry {
    pub const BOOTSTRAP_PACKAGE: &'static str = BOOTSTRAP_PACKAGE;
    pub const BOOTSTRAP_MODULE: &'static str = BOOTSTRAP_MODULE;
    pub const DEFAULT_PACKAGE: &'static str = DEFAULT_PACKAGE;
    pub const DEFAULT_MODULE: &'static str = DEFAULT_MODULE;
    pub const CURRENT_MODULE_VAR: &'static str = CURRENT_MODULE_VAR;

    pub fn new() -> Self {
        let bootstrap = Rc::new(Module::new(BOOTSTRAP_PACKAGE, BOOTSTRAP_MODULE, None));
        let package = Package::new(BOOTSTRAP_PACKAGE);
        package
            .modules
            .borrow_mut()
            .insert(Rc::from(BOOTSTRAP_MODULE), bootstrap.clone());

        let current = bootstrap.intern(CURRENT_MODULE_VAR);
        current.set_meta(Dict::new().assoc(Value::keyword("dynamic"), Value::Bool(true)).ok());

        let registry = ModuleRegistry {
            packages: RefCell::new(FxHashMap::default()),
            bootstrap,
            current,
        };
        registry
            .packages
            .borrow_mut()
            .insert(Rc::from(BOOTSTRAP_PACKAGE), Rc::new(package));

        let user = Rc::new(Module::new(
            DEFAULT_PACKAGE,
            DEFAULT_MODULE,
            Some(registry.bootstrap.clone()),
        ));
        let default_package = Package::new(DEFAULT_PACKAGE);
        default_package
            .modules
            .borrow_mut()
            .insert(Rc::from(DEFAULT_MODULE), user.clone());
        registry
            .packages
            .borrow_mut()
            .insert(Rc::from(DEFAULT_PACKAGE), Rc::new(default_package));
        registry.current.set_root(user.to_value());
        registry
    }

    // ------------------------------------------------------------------------
    // Packages and modules
    // ------------------------------------------------------------------------

    pub fn ensure_package(&self, name: &str) -> Result<Rc<Package>> {
        validate_name("Package", name, true)?;
        if let Some(package) = self.find_package(name) {
            return Ok(package);
        }
        debug!(package = name, "created package");
        let package = Rc::new(Package::new(name));
        self.packages
            .borrow_mut()
            .insert(Rc::from(name), package.clone());
        Ok(package)
    }

    pub fn find_package(&self, name: &str) -> Option<Rc<Package>> {
        self.packages.borrow().get(name).cloned()
    }

    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.packages.borrow().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    pub fn ensure_module(&self, package: &str, module: &str) -> Result<Rc<Module>> {
        validate_name("Module", module, false)?;
        let pkg = self.ensure_package(package)?;
        if let Some(existing) = pkg.find_module(module) {
            return Ok(existing);
        }
        debug!(package, module, "created module");
        let created = Rc::new(Module::new(package, module, Some(self.bootstrap.clone())));
        pkg.modules
            .borrow_mut()
            .insert(Rc::from(module), created.clone());
        Ok(created)
    }

    pub fn find_module(&self, package: &str, module: &str) -> Option<Rc<Module>> {
        self.find_package(package)?.find_module(module)
    }

    pub fn bootstrap(&self) -> Rc<Module> {
        self.bootstrap.clone()
    }

    /// Split a module designator into package and module. Accepts
    /// `"pkg:mod"` or `"mod"` strings, symbols and prefix names; a missing
    /// package defaults to the current module's.
    pub fn split_module_name(&self, name: &Value) -> Result<(String, String)> {
        let (package, module) = match name {
            Value::String(s) => match s.rsplit_once(':') {
                Some((p, m)) => (Some(p.to_string()), m.to_string()),
                None => (None, s.to_string()),
            },
            Value::Symbol(s) => match (s.package(), s.module()) {
                (Some(_), Some(_)) => {
                    return Err(Error::assertion(format!(
                        "Module name has too many parts: {s}"
                    )));
                }
                (None, Some(p)) => (Some(p.to_string()), s.name().to_string()),
                _ => (None, s.name().to_string()),
            },
            Value::PrefixName(p) => (Some(p.prefix.to_string()), p.suffix.to_string()),
            other => {
                return Err(Error::assertion(format!(
                    "Expected a module name, got {}",
                    other.type_name()
                )));
            }
        };
        let package = match package {
            Some(p) => p,
            None => self.current_module()?.package().to_string(),
        };
        validate_name("Package", &package, true)?;
        validate_name("Module", &module, false)?;
        Ok((package, module))
    }

    // ------------------------------------------------------------------------
    // Current module
    // ------------------------------------------------------------------------

    pub fn current_module_var(&self) -> Var {
        self.current.clone()
    }

    pub fn current_module(&self) -> Result<Rc<Module>> {
        let value = self.current.deref()?;
        let sym = value.as_symbol().ok_or_else(|| {
            Error::assertion(format!("{CURRENT_MODULE_VAR} does not hold a module: {value}"))
        })?;
        let package = sym.module().unwrap_or(DEFAULT_PACKAGE);
        self.ensure_module(package, sym.name())
    }

    pub fn set_current_module(&self, module: &Module) {
        self.current.set(module.to_value());
    }

    /// Make `module` current until the guard drops
    pub fn bind_current_module(&self, module: &Module) -> BindingGuard {
        self.current.bind(module.to_value())
    }

    // ------------------------------------------------------------------------
    // Vars
    // ------------------------------------------------------------------------

    /// Find or create a var. A given value becomes its root; given metadata
    /// is merged into the existing metadata.
    pub fn intern(
        &self,
        package: &str,
        module: &str,
        name: &str,
        value: Option<Value>,
        meta: Option<&Dict>,
    ) -> Result<Var> {
        validate_name("Var", name, false)?;
        let var = self.ensure_module(package, module)?.intern(name);
        if let Some(extra) = meta {
            let merged = match var.meta() {
                Some(existing) => existing.merge(extra)?,
                None => extra.clone(),
            };
            var.set_meta(Some(merged));
        }
        if let Some(value) = value {
            var.set_root(value);
        }
        Ok(var)
    }

    /// Resolve a symbol relative to the current module. `None` means no such
    /// var exists; an existing var may still be unbound.
    pub fn resolve(&self, sym: &Symbol) -> Result<Option<Var>> {
        let current = self.current_module()?;
        Ok(self.resolve_in(&current, sym))
    }

    pub fn resolve_in(&self, from: &Module, sym: &Symbol) -> Option<Var> {
        match (sym.package(), sym.module()) {
            (Some(package), Some(module)) => self.find_module(package, module)?.find_var(sym.name()),
            (None, Some(qualifier)) => {
                if let Some((package, module)) = from.resolve_alias(qualifier) {
                    return self.find_module(&package, &module)?.find_var(sym.name());
                }
                self.find_module(from.package(), qualifier)
                    .or_else(|| self.find_module(BOOTSTRAP_PACKAGE, qualifier))?
                    .find_var(sym.name())
            }
            _ => from.lookup(sym.name()),
        }
    }

    /// Resolve `https://host/pkg:module:name`
    pub fn resolve_qsym(&self, qsym: &QSym) -> Result<Option<Var>> {
        let (package, module, name) = qsym.parts()?;
        Ok(self
            .find_module(package, module)
            .and_then(|m| m.find_var(name)))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults() {
        let registry = ModuleRegistry::new();
        let current = registry.current_module().unwrap();
        assert_eq!(current.full_name(), "localpkg:user");
        assert!(registry.find_module("cairn", "lang").is_some());
    }

    #[test]
    fn test_bootstrap_visible_everywhere() {
        let registry = ModuleRegistry::new();
        registry
            .intern("cairn", "lang", "inc", Some(Value::from(1)), None)
            .unwrap();
        let m = registry.ensure_module("app", "main").unwrap();
        let var = registry.resolve_in(&m, &Symbol::new("inc")).unwrap();
        assert_eq!(var.to_string(), "cairn:lang:inc");
    }

    #[test]
    fn test_local_shadows_bootstrap() {
        let registry = ModuleRegistry::new();
        registry.intern("cairn", "lang", "x", Some(Value::from(1)), None).unwrap();
        registry.intern("localpkg", "user", "x", Some(Value::from(2)), None).unwrap();
        let var = registry.resolve(&Symbol::new("x")).unwrap().unwrap();
        assert_eq!(var.deref().unwrap(), Value::from(2));
    }

    #[test]
    fn test_alias_resolution() {
        let registry = ModuleRegistry::new();
        let target = registry
            .intern("lib", "strings", "upper", Some(Value::from(1)), None)
            .unwrap();
        let a = registry.ensure_module("app", "a").unwrap();
        a.add_alias("s", "lib", "strings").unwrap();
        let via_alias = registry.resolve_in(&a, &Symbol::qualified("s", "upper")).unwrap();
        let direct = registry
            .resolve_in(&a, &Symbol::full("lib", "strings", "upper"))
            .unwrap();
        assert!(via_alias.ptr_eq(&target));
        assert!(direct.ptr_eq(&target));
    }

    #[test]
    fn test_missing_var_vs_unbound_var() {
        let registry = ModuleRegistry::new();
        assert!(registry.resolve(&Symbol::new("nope")).unwrap().is_none());
        registry.intern("localpkg", "user", "later", None, None).unwrap();
        let var = registry.resolve(&Symbol::new("later")).unwrap().unwrap();
        assert!(!var.is_bound());
    }

    #[test]
    fn test_split_module_name() {
        let registry = ModuleRegistry::new();
        assert_eq!(
            registry.split_module_name(&Value::from("web:routes")).unwrap(),
            ("web".to_string(), "routes".to_string())
        );
        assert_eq!(
            registry.split_module_name(&Value::symbol("routes")).unwrap(),
            ("localpkg".to_string(), "routes".to_string())
        );
    }

    #[test]
    fn test_invalid_names() {
        let registry = ModuleRegistry::new();
        assert_eq!(
            registry.ensure_module("p", "").unwrap_err().kind,
            ErrorKind::Assertion
        );
        assert_eq!(
            registry.ensure_module("p q", "m").unwrap_err().kind,
            ErrorKind::Assertion
        );
    }

    #[test]
    fn test_bind_current_module() {
        let registry = ModuleRegistry::new();
        let m = registry.ensure_module("app", "main").unwrap();
        {
            let _guard = registry.bind_current_module(&m);
            assert_eq!(registry.current_module().unwrap().full_name(), "app:main");
        }
        assert_eq!(registry.current_module().unwrap().full_name(), "localpkg:user");
    }

    #[test]
    fn test_resolve_qsym() {
        let registry = ModuleRegistry::new();
        let var = registry
            .intern("https://example.org/pkg", "util", "f", Some(Value::Nil), None)
            .unwrap();
        let found = registry
            .resolve_qsym(&QSym::new("https://example.org/pkg:util:f"))
            .unwrap()
            .unwrap();
        assert!(found.ptr_eq(&var));
    }

    #[test]
    fn test_intern_merges_meta() {
        let registry = ModuleRegistry::new();
        let m1 = Dict::new().assoc(Value::keyword("a"), Value::from(1)).unwrap();
        let m2 = Dict::new().assoc(Value::keyword("b"), Value::from(2)).unwrap();
        registry.intern("p", "m", "v", None, Some(&m1)).unwrap();
        let var = registry.intern("p", "m", "v", None, Some(&m2)).unwrap();
        assert_eq!(var.meta().unwrap().len(), 2);
    }
}
