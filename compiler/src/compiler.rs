//! The driver: read, analyze, emit, print, execute, one top-level form at
//! a time.
//!
//! Forms are evaluated strictly in order. A form may define a macro that
//! the very next form uses, so the next form is not even analyzed until the
//! previous one has finished executing, including waiting on a pending
//! completion.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use cairn::{Error, ModuleRegistry, Reader, Result, Value, to_vec};

use crate::analyzer::Analyzer;
use crate::ast::Node;
use crate::codegen::CodeGen;
use crate::config::CompilerOptions;
use crate::host::{Completion, Host, Printer, SourceLoader};
use crate::target::Program;

pub struct Compiler {
    registry: Rc<ModuleRegistry>,
    host: Rc<dyn Host>,
    printer: Box<dyn Printer>,
    loader: Box<dyn SourceLoader>,
    options: CompilerOptions,
    loaded: RefCell<FxHashSet<String>>,
}

impl Compiler {
    pub fn new(
        registry: Rc<ModuleRegistry>,
        host: Rc<dyn Host>,
        printer: Box<dyn Printer>,
        loader: Box<dyn SourceLoader>,
    ) -> Self {
        Compiler {
            registry,
            host,
            printer,
            loader,
            options: CompilerOptions::default(),
            loaded: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn analyze(&self, form: &Value) -> Result<Node> {
        Analyzer::new(&self.registry, &self.options).analyze(form)
    }

    pub fn emit(&self, node: &Node) -> Result<Program> {
        CodeGen::new(&self.registry).emit_program(node)
    }

    /// Printed target text for a form, without running it
    pub fn compile_to_string(&self, form: &Value) -> Result<String> {
        let program = self.emit(&self.analyze(form)?)?;
        Ok(self.printer.print(&program))
    }

    /// Evaluate one top-level form in the current module
    pub fn eval_form(&self, form: &Value) -> Result<Value> {
        if let Some(args) = module_directive(form)? {
            return self.enter_module(&args);
        }
        let node = self.analyze(form)?;
        let program = self.emit(&node)?;
        let printed = self.printer.print(&program);
        if self.options.trace_emitted {
            trace!(code = %printed, "emitted unit");
        }
        let completion = self
            .host
            .execute(&program, &printed)
            .map_err(|e| e.with_span(node.span.clone()))?;
        match completion {
            Completion::Value(value) => Ok(value),
            Completion::Pending(handle) => self.host.wait(handle),
        }
    }

    /// Evaluate every form in `source`, returning the last value
    pub fn eval_string(&self, source: &str) -> Result<Value> {
        self.eval_source(source, self.options.file_name.as_deref())
    }

    fn eval_source(&self, source: &str, file: Option<&str>) -> Result<Value> {
        let mut reader = Reader::new(source);
        if let Some(file) = file {
            reader = reader.with_file(file);
        }
        let mut last = Value::Nil;
        while let Some(form) = reader.read()? {
            debug!(form = %form, "evaluating top-level form");
            last = self.eval_form(&form)?;
        }
        Ok(last)
    }

    pub fn is_loaded(&self, package: &str, module: &str) -> bool {
        self.loaded.borrow().contains(&format!("{package}:{module}"))
    }

    /// Load and evaluate a module's source with that module current. The
    /// caller's current module is restored afterwards, even on failure.
    pub fn load_module(&self, package: &str, module: &str) -> Result<Value> {
        let key = format!("{package}:{module}");
        let source = self.loader.load(package, module)?;
        let target = self.registry.ensure_module(package, module)?;
        debug!(module = %key, "loading module");

        // marked up front so a cyclic import does not recurse forever
        self.loaded.borrow_mut().insert(key.clone());
        let _guard = self.registry.bind_current_module(&target);
        let result = self.eval_source(&source.text, source.file.as_deref());
        if result.is_err() {
            self.loaded.borrow_mut().remove(&key);
        }
        result
    }

    /// Load a module once and alias it in the current module
    pub fn require(&self, alias: Option<&str>, package: &str, module: &str) -> Result<()> {
        if !self.is_loaded(package, module) {
            self.load_module(package, module)?;
        }
        self.registry
            .current_module()?
            .add_alias(alias.unwrap_or(module), package, module)
    }

    /// `(module name clause...)` where a clause is `(:import spec...)` or
    /// `(:context {prefix base ...})`. An import spec is a module name or
    /// `[alias name]`.
    fn enter_module(&self, args: &[Value]) -> Result<Value> {
        let Some((name, clauses)) = args.split_first() else {
            return Err(Error::syntax("(module)", "module needs a name"));
        };
        let (package, module) = self.registry.split_module_name(name)?;
        let target = self.registry.ensure_module(&package, &module)?;
        self.registry.set_current_module(&target);
        debug!(package = %package, module = %module, "entered module");

        for clause in clauses {
            let items = to_vec(clause)?;
            let Some((Value::Keyword(kind), specs)) = items.split_first() else {
                return Err(Error::syntax(&clause.to_string(), "module clauses start with a keyword"));
            };
            match kind.name().as_str() {
                "import" => {
                    for spec in specs {
                        let (alias, target) = match spec {
                            Value::Array(pair) => match &pair.items[..] {
                                [Value::Symbol(alias), target] => (Some(alias.name().to_string()), target),
                                _ => {
                                    return Err(Error::syntax(&spec.to_string(), "import pairs are [alias module]"));
                                }
                            },
                            other => (None, other),
                        };
                        let (p, m) = self.registry.split_module_name(target)?;
                        self.require(alias.as_deref(), &p, &m)?;
                    }
                }
                "context" => {
                    for spec in specs {
                        let Value::Dict(prefixes) = spec else {
                            return Err(Error::syntax(&spec.to_string(), ":context takes a dict"));
                        };
                        for (prefix, base) in prefixes.iter() {
                            let prefix = match prefix {
                                Value::Keyword(k) => k.name(),
                                other => other.to_display_string(),
                            };
                            target.add_prefix(&prefix, &base.to_display_string())?;
                        }
                    }
                }
                other => {
                    return Err(Error::syntax(&clause.to_string(), format!("Unknown module clause :{other}")));
                }
            }
        }
        Ok(target.to_value())
    }
}

fn module_directive(form: &Value) -> Result<Option<Vec<Value>>> {
    match form {
        Value::List(list) if list.first().is_some_and(|h| h.is_symbol("module")) => {
            Ok(Some(to_vec(form)?.split_off(1)))
        }
        _ => Ok(None),
    }
}
