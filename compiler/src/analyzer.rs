//! Forms to AST.
//!
//! The analyzer resolves symbols against the registry, expands macros by
//! calling their functions on the unevaluated argument forms, and tracks
//! lexical locals on a stack that is pushed on entry to a binding form and
//! truncated back on exit, whether or not analysis of the body succeeded.
//!
//! Dispatch for a list form, first match wins:
//!
//! 1. special forms (`fn def quote if defmacro array await new do let
//!    syntax-quote` and the infix operators)
//! 2. `(.-field obj)` member access and `(.method obj args...)` calls
//! 3. a local in head position is called like any other value
//! 4. a var marked `:macro` is expanded and the result re-analyzed
//! 5. any other var becomes a direct var invocation
//! 6. otherwise the head is analyzed and invoked dynamically

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use cairn::registry::{BOOTSTRAP_MODULE, BOOTSTRAP_PACKAGE};
use cairn::{
    Dict, Error, ModuleRegistry, Result, Symbol, Value, Var, span_of, to_vec,
};

use crate::ast::{FnNode, InfixOp, Node, NodeKind, VarRef};
use crate::config::CompilerOptions;

/// Module qualifier naming the host's global scope: `js:Math`
pub const HOST_NAMESPACE: &str = "js";

const SPECIAL_FORMS: &[&str] = &[
    "fn",
    "def",
    "quote",
    "if",
    "defmacro",
    "array",
    "await",
    "new",
    "do",
    "let",
    "syntax-quote",
    "unquote",
    "unquote-splice",
];

pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name) || InfixOp::from_name(name).is_some()
}

fn syntax(form: &Value, message: impl std::fmt::Display) -> Error {
    Error::syntax(&form.to_string(), message)
}

fn quoted(value: Value) -> Value {
    Value::list(vec![Value::symbol("quote"), value])
}

fn lang(name: &str) -> Value {
    Value::from(Symbol::full(BOOTSTRAP_PACKAGE, BOOTSTRAP_MODULE, name))
}

pub struct Analyzer<'a> {
    registry: &'a ModuleRegistry,
    locals: Vec<Rc<str>>,
    /// One entry per enclosing function: whether it contains an `await`
    async_frames: Vec<bool>,
    expansion_depth: usize,
    max_macro_depth: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(registry: &'a ModuleRegistry, options: &CompilerOptions) -> Self {
        Analyzer {
            registry,
            locals: Vec::new(),
            async_frames: Vec::new(),
            expansion_depth: 0,
            max_macro_depth: options.max_macro_depth,
        }
    }

    /// Locals currently in scope, innermost last
    pub fn locals(&self) -> &[Rc<str>] {
        &self.locals
    }

    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().rev().any(|l| &**l == name)
    }

    pub fn analyze(&mut self, form: &Value) -> Result<Node> {
        let span = span_of(form);
        match self.analyze_form(form) {
            Ok(mut node) => {
                if node.span.is_none() {
                    node.span = span;
                }
                Ok(node)
            }
            Err(e) => Err(e.with_span(span)),
        }
    }

    fn analyze_all(&mut self, forms: &[Value]) -> Result<Vec<Node>> {
        forms.iter().map(|f| self.analyze(f)).collect()
    }

    fn analyze_form(&mut self, form: &Value) -> Result<Node> {
        let kind = match form {
            Value::Symbol(sym) => return self.analyze_symbol(sym),
            Value::List(l) if l.is_empty() => NodeKind::Constant(form.clone()),
            Value::List(_) | Value::Cons(_) => return self.analyze_list(form, &to_vec(form)?),
            // Macros may expand to lazy seqs; they read as the list they realize to
            Value::LazySeq(_) => match to_vec(form)? {
                items if items.is_empty() => NodeKind::Constant(Value::list(items)),
                items => return self.analyze_list(form, &items),
            },
            Value::Array(a) => NodeKind::Array(self.analyze_all(&a.items)?),
            Value::Dict(d) => {
                let mut entries = Vec::with_capacity(d.len());
                for (k, v) in d.iter() {
                    entries.push((self.analyze(k)?, self.analyze(v)?));
                }
                NodeKind::Dict(entries)
            }
            Value::Set(s) => {
                let items: Vec<Value> = s.iter().cloned().collect();
                NodeKind::Set(self.analyze_all(&items)?)
            }
            Value::PrefixName(name) => {
                let context = self.registry.current_module()?.context();
                NodeKind::Constant(Value::QName(Rc::new(context.expand(name)?)))
            }
            Value::QSym(qsym) => match self.registry.resolve_qsym(qsym)? {
                Some(var) => NodeKind::VarRef(VarRef::from_var(&var)),
                None => return Err(Error::resolution(qsym)),
            },
            _ => NodeKind::Constant(form.clone()),
        };
        Ok(Node::new(kind, None))
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    fn analyze_symbol(&mut self, sym: &Symbol) -> Result<Node> {
        if !sym.is_qualified() {
            if self.is_local(sym.name()) {
                return Ok(Node::new(NodeKind::Local(Rc::from(sym.name())), None));
            }
            if sym.name() == "undefined" {
                return Ok(Node::constant(Value::Nil));
            }
        }
        if sym.package().is_none() && sym.module() == Some(HOST_NAMESPACE) {
            return Ok(Node::new(
                NodeKind::MemberAccess {
                    object: None,
                    member: Rc::from(sym.name()),
                },
                None,
            ));
        }
        match self.registry.resolve(sym)? {
            Some(var) => Ok(Node::new(NodeKind::VarRef(VarRef::from_var(&var)), None)),
            None => Err(Error::resolution(sym)),
        }
    }

    // ========================================================================
    // Lists
    // ========================================================================

    fn analyze_list(&mut self, form: &Value, items: &[Value]) -> Result<Node> {
        let head = &items[0];
        let args = &items[1..];

        if let Value::Symbol(sym) = head {
            let name = sym.name();
            if !sym.is_qualified() {
                if let Some(node) = self.analyze_special(name, form, args)? {
                    return Ok(node);
                }
                if let Some(member) = name.strip_prefix(".-").filter(|m| !m.is_empty()) {
                    return self.analyze_member(form, member, args);
                }
                if let Some(method) = name.strip_prefix('.').filter(|m| !m.is_empty()) {
                    return self.analyze_method(form, method, args);
                }
            }
            let local = !sym.is_qualified() && self.is_local(name);
            let host = sym.package().is_none() && sym.module() == Some(HOST_NAMESPACE);
            if !local && !host {
                if let Some(var) = self.registry.resolve(sym)? {
                    if var.is_macro() {
                        return self.expand_macro(&var, form, args);
                    }
                    let args = self.analyze_all(args)?;
                    return Ok(Node::new(
                        NodeKind::VarInvoke {
                            var: VarRef::from_var(&var),
                            args,
                        },
                        None,
                    ));
                }
            }
        }

        let callee = Box::new(self.analyze(head)?);
        let args = self.analyze_all(args)?;
        Ok(Node::new(NodeKind::Invoke { callee, args }, None))
    }

    fn analyze_member(&mut self, form: &Value, member: &str, args: &[Value]) -> Result<Node> {
        let [object] = args else {
            return Err(syntax(form, format!("(.-{member} obj) takes exactly one object")));
        };
        Ok(Node::new(
            NodeKind::MemberAccess {
                object: Some(Box::new(self.analyze(object)?)),
                member: Rc::from(member),
            },
            None,
        ))
    }

    fn analyze_method(&mut self, form: &Value, method: &str, args: &[Value]) -> Result<Node> {
        let Some((object, rest)) = args.split_first() else {
            return Err(syntax(form, format!("(.{method} obj args...) needs an object")));
        };
        Ok(Node::new(
            NodeKind::MethodCall {
                object: Box::new(self.analyze(object)?),
                method: Rc::from(method),
                args: self.analyze_all(rest)?,
            },
            None,
        ))
    }

    fn expand_macro(&mut self, var: &Var, form: &Value, args: &[Value]) -> Result<Node> {
        if self.expansion_depth >= self.max_macro_depth {
            return Err(syntax(
                form,
                format!(
                    "Macro expansion of {var} exceeded {} levels",
                    self.max_macro_depth
                ),
            ));
        }
        let expanded = var.deref()?.call(args)?;
        trace!(name = %var, expansion = %expanded, "expanded macro");
        self.expansion_depth += 1;
        let result = self.analyze(&expanded);
        self.expansion_depth -= 1;
        result
    }

    // ========================================================================
    // Special Forms
    // ========================================================================

    fn analyze_special(&mut self, name: &str, form: &Value, args: &[Value]) -> Result<Option<Node>> {
        if let Some(op) = InfixOp::from_name(name) {
            return self.analyze_infix(op, form, args).map(Some);
        }
        let kind = match name {
            "quote" => match args {
                [quoted] => NodeKind::Quote(quoted.clone()),
                _ => return Err(syntax(form, "quote takes exactly one form")),
            },
            "if" => match args {
                [test, then] | [test, then, _] => NodeKind::If {
                    test: Box::new(self.analyze(test)?),
                    then: Box::new(self.analyze(then)?),
                    otherwise: match args.get(2) {
                        Some(e) => Some(Box::new(self.analyze(e)?)),
                        None => None,
                    },
                },
                _ => return Err(syntax(form, "if takes a test, a then branch and an optional else branch")),
            },
            "fn" => NodeKind::Fn(self.analyze_fn(form, args)?),
            "def" => self.analyze_def(form, args)?,
            "defmacro" => self.analyze_defmacro(form, args)?,
            "array" => NodeKind::Array(self.analyze_all(args)?),
            "await" => {
                let [expr] = args else {
                    return Err(syntax(form, "await takes exactly one expression"));
                };
                if let Some(frame) = self.async_frames.last_mut() {
                    *frame = true;
                }
                NodeKind::Await(Box::new(self.analyze(expr)?))
            }
            "new" => {
                let Some((class, rest)) = args.split_first() else {
                    return Err(syntax(form, "new needs a type"));
                };
                NodeKind::New {
                    class: Box::new(self.analyze(class)?),
                    args: self.analyze_all(rest)?,
                }
            }
            "do" => return self.analyze_do(args).map(Some),
            "let" => {
                let Some((Value::Array(bindings), body)) = args.split_first() else {
                    return Err(syntax(form, "let needs a binding vector"));
                };
                if bindings.items.len() % 2 != 0 {
                    return Err(syntax(form, "let bindings must come in name/value pairs"));
                }
                return self.analyze_let(form, &bindings.items, body).map(Some);
            }
            "syntax-quote" => {
                let [template] = args else {
                    return Err(syntax(form, "syntax-quote takes exactly one form"));
                };
                let mut gensyms = FxHashMap::default();
                let expanded = self.syntax_quote(template, &mut gensyms)?;
                trace!(template = %template, expansion = %expanded, "expanded syntax-quote");
                return self.analyze(&expanded).map(Some);
            }
            "unquote" | "unquote-splice" => {
                return Err(syntax(form, format!("{name} used outside of syntax-quote")));
            }
            _ => return Ok(None),
        };
        Ok(Some(Node::new(kind, None)))
    }

    fn analyze_infix(&mut self, op: InfixOp, form: &Value, args: &[Value]) -> Result<Node> {
        if op.is_binary_only() && args.len() != 2 {
            return Err(syntax(
                form,
                format!("{} takes exactly two operands, got {}", op.name(), args.len()),
            ));
        }
        if matches!(op, InfixOp::Sub | InfixOp::Div) && args.is_empty() {
            return Err(syntax(form, format!("{} needs at least one operand", op.name())));
        }
        let args = self.analyze_all(args)?;
        Ok(Node::new(NodeKind::Infix { op, args }, None))
    }

    /// `(fn name? [params] body...)`
    fn analyze_fn(&mut self, form: &Value, args: &[Value]) -> Result<FnNode> {
        let (name, rest) = match args.split_first() {
            Some((Value::Symbol(s), rest)) if !s.is_qualified() => (Some(Rc::from(s.name())), rest),
            _ => (None, args),
        };
        let Some((Value::Array(params), body)) = rest.split_first() else {
            return Err(syntax(form, "fn needs a parameter vector"));
        };
        let (params, rest_param) = parse_params(form, &params.items)?;

        let mark = self.locals.len();
        self.locals.extend(name.iter().cloned());
        self.locals.extend(params.iter().cloned());
        self.locals.extend(rest_param.iter().cloned());
        self.async_frames.push(false);
        let analyzed = self.analyze_all(body);
        let is_async = self.async_frames.pop().unwrap_or(false);
        self.locals.truncate(mark);

        Ok(FnNode {
            name,
            params,
            rest: rest_param,
            body: analyzed?,
            is_async,
        })
    }

    /// Run `body` as the body of a nullary-or-more function called on the
    /// spot. Used for `do` and `let`. A body that awaits makes the call
    /// itself a suspend point of the enclosing function.
    fn immediate_call<F>(&mut self, params: Vec<Rc<str>>, inits: Vec<Node>, body: F) -> Result<Node>
    where
        F: FnOnce(&mut Self) -> Result<Vec<Node>>,
    {
        let mark = self.locals.len();
        self.locals.extend(params.iter().cloned());
        self.async_frames.push(false);
        let analyzed = body(self);
        let is_async = self.async_frames.pop().unwrap_or(false);
        self.locals.truncate(mark);

        let function = FnNode {
            name: None,
            params,
            rest: None,
            body: analyzed?,
            is_async,
        };
        let call = Node::new(
            NodeKind::Invoke {
                callee: Box::new(Node::new(NodeKind::Fn(function), None)),
                args: inits,
            },
            None,
        );
        if !is_async {
            return Ok(call);
        }
        if let Some(frame) = self.async_frames.last_mut() {
            *frame = true;
        }
        Ok(Node::new(NodeKind::Await(Box::new(call)), None))
    }

    fn analyze_do(&mut self, body: &[Value]) -> Result<Node> {
        match body {
            [] => Ok(Node::constant(Value::Nil)),
            [single] => self.analyze(single),
            _ => self.immediate_call(Vec::new(), Vec::new(), |this| this.analyze_all(body)),
        }
    }

    /// Each binding scopes over the following ones, so `(let [a 1 b a] ...)`
    /// nests one call per binding.
    fn analyze_let(&mut self, form: &Value, bindings: &[Value], body: &[Value]) -> Result<Node> {
        let [name, init, remaining @ ..] = bindings else {
            return self.analyze_do(body);
        };
        let name = match name {
            Value::Symbol(s) if !s.is_qualified() => Rc::from(s.name()),
            other => return Err(syntax(form, format!("let binding name must be a simple symbol, got {other}"))),
        };
        let init = self.analyze(init)?;
        self.immediate_call(vec![name], vec![init], |this| {
            if remaining.is_empty() {
                this.analyze_all(body)
            } else {
                Ok(vec![this.analyze_let(form, remaining, body)?])
            }
        })
    }

    /// Name symbol, optional docstring, and the metadata the var receives
    fn definition_head<'f>(
        &self,
        form: &Value,
        what: &str,
        args: &'f [Value],
    ) -> Result<(Rc<str>, Dict, &'f [Value])> {
        let Some((Value::Symbol(sym), rest)) = args.split_first() else {
            return Err(syntax(form, format!("{what} needs a name symbol")));
        };
        if sym.is_qualified() {
            return Err(syntax(form, format!("Can't {what} a qualified name: {sym}")));
        }
        let mut meta = sym.meta().cloned().unwrap_or_default();
        let rest = match rest {
            [Value::String(doc), tail @ ..] if !tail.is_empty() => {
                meta = meta.assoc(Value::keyword("doc"), Value::String(doc.clone()))?;
                tail
            }
            _ => rest,
        };
        Ok((Rc::from(sym.name()), meta, rest))
    }

    /// Intern before analyzing the value so it can refer to itself
    fn intern_current(&self, name: &str) -> Result<Var> {
        let module = self.registry.current_module()?;
        self.registry
            .intern(module.package(), module.name(), name, None, None)
    }

    fn analyze_def(&mut self, form: &Value, args: &[Value]) -> Result<NodeKind> {
        let (name, meta, rest) = self.definition_head(form, "def", args)?;
        self.intern_current(&name)?;
        let value = match rest {
            [] => None,
            [init] => Some(Box::new(self.analyze(init)?)),
            _ => return Err(syntax(form, "def takes a name, an optional docstring and one value")),
        };
        Ok(NodeKind::Def {
            name,
            value,
            meta: (!meta.is_empty()).then(|| Value::from(meta)),
        })
    }

    fn analyze_defmacro(&mut self, form: &Value, args: &[Value]) -> Result<NodeKind> {
        let (name, meta, rest) = self.definition_head(form, "defmacro", args)?;
        self.intern_current(&name)?;
        let mut fn_args = vec![Value::symbol(&name)];
        fn_args.extend(rest.iter().cloned());
        let function = self.analyze_fn(form, &fn_args)?;
        let meta = meta.assoc(Value::keyword("macro"), Value::Bool(true))?;
        Ok(NodeKind::Defmacro {
            name,
            function,
            meta: Some(Value::from(meta)),
        })
    }

    // ========================================================================
    // Syntax Quote
    // ========================================================================

    /// Rewrite a template into code that builds it
    fn syntax_quote(&self, form: &Value, gensyms: &mut FxHashMap<String, Symbol>) -> Result<Value> {
        Ok(match form {
            Value::Symbol(sym) => quoted(Value::from(self.qualify(sym, gensyms)?)),
            Value::List(_) | Value::Cons(_) => {
                let items = to_vec(form)?;
                match items.first() {
                    None => quoted(form.clone()),
                    Some(head) if head.is_symbol("unquote") => match items.as_slice() {
                        [_, inner] => inner.clone(),
                        _ => return Err(syntax(form, "unquote takes exactly one form")),
                    },
                    Some(head) if head.is_symbol("unquote-splice") => {
                        return Err(syntax(form, "unquote-splice must appear inside a collection"));
                    }
                    Some(_) => self.build("list", &items, gensyms)?,
                }
            }
            Value::Array(a) => self.build("array", &a.items, gensyms)?,
            Value::Dict(d) => {
                let flat: Vec<Value> = d
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), v.clone()])
                    .collect();
                self.build("dict", &flat, gensyms)?
            }
            Value::Set(s) => {
                let items: Vec<Value> = s.iter().cloned().collect();
                self.build("set", &items, gensyms)?
            }
            Value::Nil
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Keyword(_) => form.clone(),
            other => quoted(other.clone()),
        })
    }

    /// `(apply ctor (concat part...))` where each part is `(list item)` or a
    /// spliced sequence
    fn build(
        &self,
        ctor: &str,
        items: &[Value],
        gensyms: &mut FxHashMap<String, Symbol>,
    ) -> Result<Value> {
        let mut parts = vec![lang("concat")];
        for item in items {
            let is_splice = matches!(item, Value::List(l) if l.first().is_some_and(|h| h.is_symbol("unquote-splice")));
            if is_splice {
                match to_vec(item)?.as_slice() {
                    [_, spliced] => parts.push(spliced.clone()),
                    _ => return Err(syntax(item, "unquote-splice takes exactly one form")),
                }
            } else {
                parts.push(Value::list(vec![lang("list"), self.syntax_quote(item, gensyms)?]));
            }
        }
        Ok(Value::list(vec![lang("apply"), lang(ctor), Value::list(parts)]))
    }

    /// Qualify a template symbol: `x#` becomes a fresh name, special forms
    /// stay bare, known vars get their full name, anything else is placed
    /// in the current module.
    fn qualify(&self, sym: &Symbol, gensyms: &mut FxHashMap<String, Symbol>) -> Result<Symbol> {
        if sym.is_qualified() {
            if sym.package().is_none() && sym.module() == Some(HOST_NAMESPACE) {
                return Ok(sym.with_meta(None));
            }
            return Ok(match self.registry.resolve(sym)? {
                Some(var) => var.symbol(),
                None => sym.with_meta(None),
            });
        }
        let name = sym.name();
        if let Some(stem) = name.strip_suffix('#') {
            return Ok(gensyms
                .entry(name.to_string())
                .or_insert_with(|| Symbol::gensym(&format!("{stem}_auto")))
                .clone());
        }
        if is_special_form(name) || name == "&" || name.starts_with('.') || name == "module" {
            return Ok(Symbol::new(name));
        }
        if let Some(var) = self.registry.resolve(sym)? {
            return Ok(var.symbol());
        }
        let module = self.registry.current_module()?;
        Ok(Symbol::full(module.package(), module.name(), name))
    }
}

/// `[a b & more]`: only `&` followed by exactly one symbol at the end marks
/// a rest parameter.
fn parse_params(form: &Value, items: &[Value]) -> Result<(Vec<Rc<str>>, Option<Rc<str>>)> {
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Symbol(s) if !s.is_qualified() => names.push(Rc::<str>::from(s.name())),
            other => {
                return Err(syntax(form, format!("fn parameters must be simple symbols, got {other}")));
            }
        }
    }
    let n = names.len();
    if n >= 2 && &*names[n - 2] == "&" {
        let rest = names.pop();
        names.pop();
        return Ok((names, rest));
    }
    Ok((names, None))
}
