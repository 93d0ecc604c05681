//! Reference host: evaluates target expression trees directly.
//!
//! The interpreter stands in for a JavaScript engine. It understands the
//! `$cairn` root object (registry navigation and the handful of helper
//! functions emitted code calls), lexical scopes for function parameters,
//! async functions as eagerly resolved promises, and a small set of host
//! globals and methods on strings, arrays and numbers.

use std::fmt;
use std::io::{self, Write};
use std::rc::{Rc, Weak};

use num_traits::ToPrimitive;
use rustc_hash::FxHashMap;
use tracing::trace;

use cairn::abstractions::{dict_of, set_of};
use cairn::{
    Callable, Error, Module, ModuleRegistry, NumericType, Object, Package, Promise,
    Result, Symbol, TypeDef, Value, count,
};
use cairn_compiler::{
    BinaryOp, Completion, Expr, Function, Host, LogicalOp, Program, ROOT, Stmt, UnaryOp,
};

// ============================================================================
// Scope
// ============================================================================

/// Lexical bindings of one function activation, chained to the scope the
/// function was created in
#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: Rc<FxHashMap<Rc<str>, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&self, bindings: FxHashMap<Rc<str>, Value>) -> Self {
        Scope {
            bindings: Rc::new(bindings),
            parent: Some(Rc::new(self.clone())),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.bindings.get(name) {
                return Some(value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }
}

// ============================================================================
// Closures
// ============================================================================

struct Closure {
    function: Function,
    scope: Scope,
    state: Weak<State>,
    /// Bound to the function's own name inside its body
    this: Weak<Closure>,
}

impl Callable for Closure {
    fn call(&self, args: &[Value]) -> Result<Value> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| Error::runtime("Function called after its interpreter was dropped"))?;
        Interpreter { state }.apply(self, args)
    }

    fn name(&self) -> Option<&str> {
        self.function.name.as_deref()
    }
}

// ============================================================================
// Operands
// ============================================================================

/// Intermediate results of member and index chains. Only `Value` escapes
/// into the program; the rest are steps along `$cairn.packages[..]...`.
enum Operand {
    Value(Value),
    Root,
    Packages,
    Package(Rc<Package>),
    Modules(Rc<Package>),
    Module(Rc<Module>),
    Vars(Rc<Module>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v.type_name()),
            Operand::Root => write!(f, "{ROOT}"),
            Operand::Packages => write!(f, "{ROOT}.packages"),
            Operand::Package(p) => write!(f, "package {}", p.name()),
            Operand::Modules(p) => write!(f, "modules of {}", p.name()),
            Operand::Module(m) => write!(f, "module {}", m.full_name()),
            Operand::Vars(m) => write!(f, "vars of {}", m.full_name()),
        }
    }
}

impl Operand {
    fn into_value(self) -> Result<Value> {
        match self {
            Operand::Value(v) => Ok(v),
            other => Err(Error::runtime(format!("{other} is not a value"))),
        }
    }
}

// ============================================================================
// Interpreter
// ============================================================================

struct State {
    registry: Rc<ModuleRegistry>,
    globals: FxHashMap<Rc<str>, Value>,
}

#[derive(Clone)]
pub struct Interpreter {
    state: Rc<State>,
}

impl Interpreter {
    pub fn new(registry: Rc<ModuleRegistry>) -> Self {
        Interpreter {
            state: Rc::new(State {
                registry,
                globals: host_globals(),
            }),
        }
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.state.registry
    }

    /// Evaluate an expression in `scope`
    pub fn eval(&self, expr: &Expr, scope: &Scope) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Identifier(name) => scope
                .lookup(name)
                .ok_or_else(|| Error::runtime(format!("{name} is not defined"))),
            Expr::Global(name) if &**name != ROOT => {
                self.state.globals.get(name).cloned().ok_or_else(|| {
                    Error::runtime(format!("{name} is not defined"))
                })
            }
            Expr::Global(_) | Expr::Member { .. } | Expr::Index { .. } => {
                self.operand(expr, scope)?.into_value()
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::Function(function) => Ok(self.make_closure(function, scope)),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            Expr::Unary { op, argument } => {
                let value = self.eval(argument, scope)?;
                match (op, &value) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(n.neg())),
                    (UnaryOp::Neg, other) => Err(Error::runtime(format!(
                        "Cannot negate {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Array(items) => Ok(Value::array(self.eval_all(items, scope)?)),
            Expr::New { callee, args } => {
                let callee = self.eval(callee, scope)?;
                let args = self.eval_all(args, scope)?;
                match &callee {
                    Value::Type(t) => t.instantiate(&args),
                    Value::Fn(_) | Value::Var(_) => callee.call(&args),
                    other => Err(Error::runtime(format!(
                        "{} is not a constructor",
                        other.type_name()
                    ))),
                }
            }
            Expr::Await(inner) => match self.eval(inner, scope)? {
                Value::Promise(p) => p.force(),
                other => Ok(other),
            },
        }
    }

    fn eval_all(&self, exprs: &[Expr], scope: &Scope) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, scope)).collect()
    }

    fn operand(&self, expr: &Expr, scope: &Scope) -> Result<Operand> {
        match expr {
            Expr::Global(name) if &**name == ROOT => Ok(Operand::Root),
            Expr::Member { object, property } => {
                let target = self.operand(object, scope)?;
                self.member(target, property)
            }
            Expr::Index { object, index } => {
                let target = self.operand(object, scope)?;
                let key = self.eval(index, scope)?;
                self.index(target, &key)
            }
            other => self.eval(other, scope).map(Operand::Value),
        }
    }

    fn member(&self, target: Operand, property: &str) -> Result<Operand> {
        match (target, property) {
            (Operand::Root, "packages") => Ok(Operand::Packages),
            (Operand::Package(p), "modules") => Ok(Operand::Modules(p)),
            (Operand::Module(m), "vars") => Ok(Operand::Vars(m)),
            (Operand::Value(v), property) => host_member(&v, property).map(Operand::Value),
            (other, property) => Err(Error::runtime(format!(
                "{other} has no property {property}"
            ))),
        }
    }

    fn index(&self, target: Operand, key: &Value) -> Result<Operand> {
        let name = || {
            key.as_str()
                .ok_or_else(|| Error::runtime(format!("Registry keys are strings, got {key}")))
        };
        match target {
            Operand::Packages => {
                let name = name()?;
                self.state
                    .registry
                    .find_package(name)
                    .map(Operand::Package)
                    .ok_or_else(|| Error::resolution(format!("package {name}")))
            }
            Operand::Modules(package) => {
                let name = name()?;
                package
                    .find_module(name)
                    .map(Operand::Module)
                    .ok_or_else(|| Error::resolution(format!("module {}:{name}", package.name())))
            }
            Operand::Vars(module) => {
                let name = name()?;
                module
                    .find_var(name)
                    .map(|var| Operand::Value(Value::Var(var)))
                    .ok_or_else(|| Error::resolution(format!("{}:{name}", module.full_name())))
            }
            Operand::Value(v) => host_index(&v, key).map(Operand::Value),
            other => Err(Error::runtime(format!("{other} cannot be indexed"))),
        }
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    fn eval_call(&self, callee: &Expr, args: &[Expr], scope: &Scope) -> Result<Value> {
        if let Expr::Member { object, property } = callee {
            let target = self.operand(object, scope)?;
            let args = self.eval_all(args, scope)?;
            return match target {
                Operand::Root => self.call_root(property, &args),
                Operand::Value(receiver) => call_method(&receiver, property, &args),
                other => Err(Error::runtime(format!("{other}.{property} is not a function"))),
            };
        }
        let f = self.eval(callee, scope)?;
        let args = self.eval_all(args, scope)?;
        f.call(&args)
    }

    /// Helpers emitted code reaches through the root object
    fn call_root(&self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "intern" => {
                let [package, module, var_name, meta, value @ ..] = args else {
                    return Err(Error::runtime(format!(
                        "{ROOT}.intern takes package, module, name, meta and an optional value"
                    )));
                };
                let meta = match meta {
                    Value::Nil => None,
                    Value::Dict(d) => Some(d.as_ref().clone()),
                    other => {
                        return Err(Error::assertion(format!(
                            "Var metadata must be a dict, got {}",
                            other.type_name()
                        )));
                    }
                };
                let var = self.state.registry.intern(
                    root_str(package)?,
                    root_str(module)?,
                    root_str(var_name)?,
                    value.first().cloned(),
                    meta.as_ref(),
                )?;
                Ok(Value::Var(var))
            }
            "truthy" => Ok(Value::Bool(args.first().is_some_and(Value::is_truthy))),
            "dict" => dict_of(args),
            "set" => set_of(args),
            "list" => Ok(Value::list(args.to_vec())),
            "keyword" => Ok(Value::keyword(root_str(first_arg(args)?)?)),
            "symbol" => Ok(Value::from(Symbol::parse(root_str(first_arg(args)?)?)?)),
            other => Err(Error::runtime(format!("{ROOT}.{other} is not a function"))),
        }
    }

    fn make_closure(&self, function: &Function, scope: &Scope) -> Value {
        let closure = Rc::new_cyclic(|this| Closure {
            function: function.clone(),
            scope: scope.clone(),
            state: Rc::downgrade(&self.state),
            this: this.clone(),
        });
        Value::Fn(closure)
    }

    fn apply(&self, closure: &Closure, args: &[Value]) -> Result<Value> {
        let function = &closure.function;
        let mut bindings = FxHashMap::default();
        if let Some(name) = &function.name
            && let Some(this) = closure.this.upgrade()
        {
            bindings.insert(name.clone(), Value::Fn(this));
        }
        // missing arguments are undefined, extra ones ignored
        for (i, param) in function.params.iter().enumerate() {
            bindings.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Nil));
        }
        if let Some(rest) = &function.rest {
            let extra = args.get(function.params.len()..).unwrap_or_default();
            bindings.insert(rest.clone(), Value::array(extra.to_vec()));
        }
        let scope = closure.scope.extend(bindings);

        let result = self.run_body(&function.body, &scope)?;
        if !function.is_async {
            return Ok(result);
        }
        Ok(match result {
            Value::Promise(_) => result,
            other => Value::Promise(Rc::new(Promise::resolved(other))),
        })
    }

    fn run_body(&self, body: &[Stmt], scope: &Scope) -> Result<Value> {
        for stmt in body {
            match stmt {
                Stmt::Expr(expr) => {
                    self.eval(expr, scope)?;
                }
                Stmt::Return(expr) => return self.eval(expr, scope),
            }
        }
        Ok(Value::Nil)
    }
}

impl Host for Interpreter {
    fn execute(&self, program: &Program, printed: &str) -> Result<Completion> {
        trace!(unit = %printed, "executing unit");
        Ok(match self.eval(&program.unit, &Scope::new())? {
            pending @ Value::Promise(_) => Completion::Pending(pending),
            value => Completion::Value(value),
        })
    }
}

fn first_arg(args: &[Value]) -> Result<&Value> {
    args.first()
        .ok_or_else(|| Error::runtime("Missing argument"))
}

fn root_str(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        Error::runtime(format!("Expected a string, got {}", value.type_name()))
    })
}

// ============================================================================
// Operators
// ============================================================================

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use BinaryOp::*;

    let unsupported = || {
        Error::runtime(format!(
            "Cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };
    match (op, left, right) {
        (StrictEq, a, b) => Ok(Value::Bool(a.identical(b))),
        (StrictNotEq, a, b) => Ok(Value::Bool(!a.identical(b))),
        (Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.add(b))),
        (Add, Value::String(_), _) | (Add, _, Value::String(_)) => Ok(Value::from(format!(
            "{}{}",
            left.to_display_string(),
            right.to_display_string()
        ))),
        (Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.sub(b))),
        (Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.mul(b))),
        (Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.div(b)?)),
        (Rem, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.rem(b)?)),
        (Lt | Gt | Le | Ge, Value::Number(a), Value::Number(b)) => {
            Ok(Value::Bool(compare(op, a.partial_cmp(b))))
        }
        (Lt | Gt | Le | Ge, Value::String(a), Value::String(b)) => {
            Ok(Value::Bool(compare(op, a.partial_cmp(b))))
        }
        _ => Err(unsupported()),
    }
}

fn compare(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (_, None) => false,
        (BinaryOp::Lt, Some(o)) => o == Less,
        (BinaryOp::Gt, Some(o)) => o == Greater,
        (BinaryOp::Le, Some(o)) => o != Greater,
        (BinaryOp::Ge, Some(o)) => o != Less,
        _ => false,
    }
}

// ============================================================================
// Host Objects
// ============================================================================

/// `value.property`; unknown properties are undefined
fn host_member(value: &Value, property: &str) -> Result<Value> {
    Ok(match (value, property) {
        (Value::Var(var), "value") => var.deref()?,
        (Value::Object(o), name) => o.get_field(name).unwrap_or(Value::Nil),
        (Value::String(_) | Value::Array(_), "length") => Value::from(count(value)? as i64),
        (Value::Dict(d), name) => match d.get(&Value::keyword(name))? {
            Some(v) => v,
            None => d.get(&Value::from(name))?.unwrap_or(Value::Nil),
        },
        _ => Value::Nil,
    })
}

/// `value[key]`
fn host_index(value: &Value, key: &Value) -> Result<Value> {
    match (value, key) {
        (Value::Object(o), Value::String(name)) => Ok(o.get_field(name).unwrap_or(Value::Nil)),
        (Value::Array(_) | Value::String(_) | Value::Dict(_), _) => {
            cairn::get(value, key, &Value::Nil)
        }
        _ => Ok(Value::Nil),
    }
}

/// `receiver.method(args...)`
fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let no_method = || {
        Error::runtime(format!(
            "{}.{method} is not a function",
            receiver.type_name()
        ))
    };
    match (receiver, method) {
        (Value::Var(var), "value") => var.deref()?.call(args),
        (Value::Object(o), name) => match o.get_field(name) {
            Some(f) => f.call(args),
            None => Err(no_method()),
        },
        (Value::String(s), name) => string_method(s, name, args).ok_or_else(no_method)?,
        (Value::Array(a), name) => array_method(&a.items, name, args).ok_or_else(no_method)?,
        (Value::Number(n), "toFixed") => {
            let digits = match args.first() {
                Some(Value::Number(d)) => d.to_i64().unwrap_or(0).clamp(0, 100) as usize,
                _ => 0,
            };
            Ok(Value::from(format!("{:.*}", digits, n.to_float())))
        }
        (Value::Promise(p), "then") => {
            let settled = p.force()?;
            match args.first() {
                Some(f) => f.call(&[settled]),
                None => Ok(settled),
            }
        }
        (Value::Fn(_), "call") => receiver.call(args.get(1..).unwrap_or_default()),
        (_, "toString") => Ok(Value::from(receiver.to_display_string())),
        _ => Err(no_method()),
    }
}

fn arg_str<'a>(args: &'a [Value], i: usize) -> Result<&'a str> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::runtime(format!(
            "Expected a string argument, got {}",
            other.type_name()
        ))),
        None => Err(Error::runtime("Missing string argument")),
    }
}

fn arg_index(args: &[Value], i: usize, len: usize) -> Option<usize> {
    match args.get(i) {
        Some(Value::Number(n)) => {
            let n = n.to_i64()?;
            let len = len as i64;
            let index = if n < 0 { (len + n).max(0) } else { n.min(len) };
            Some(index as usize)
        }
        _ => None,
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let result = match name {
        "toUpperCase" => Ok(Value::from(s.to_uppercase())),
        "toLowerCase" => Ok(Value::from(s.to_lowercase())),
        "trim" => Ok(Value::from(s.trim())),
        "includes" => arg_str(args, 0).map(|needle| Value::Bool(s.contains(needle))),
        "startsWith" => arg_str(args, 0).map(|p| Value::Bool(s.starts_with(p))),
        "endsWith" => arg_str(args, 0).map(|p| Value::Bool(s.ends_with(p))),
        "indexOf" => arg_str(args, 0).map(|needle| {
            let index = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Value::from(index)
        }),
        "split" => arg_str(args, 0).map(|sep| {
            Value::array(s.split(sep).map(Value::from).collect())
        }),
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = arg_index(args, 0, chars.len()).unwrap_or(0);
            let end = arg_index(args, 1, chars.len()).unwrap_or(chars.len());
            Ok(Value::from(
                chars[start.min(end)..end].iter().collect::<String>(),
            ))
        }
        "concat" => Ok(Value::from(
            std::iter::once(s.to_string())
                .chain(args.iter().map(Value::to_display_string))
                .collect::<String>(),
        )),
        "repeat" => match args.first() {
            Some(Value::Number(n)) => Ok(Value::from(s.repeat(n.to_i64().unwrap_or(0).max(0) as usize))),
            _ => Err(Error::runtime("repeat needs a count")),
        },
        _ => return None,
    };
    Some(result)
}

fn array_method(items: &Rc<[Value]>, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let callback = || {
        args.first()
            .cloned()
            .ok_or_else(|| Error::runtime(format!("{name} needs a function")))
    };
    let result = match name {
        "join" => {
            let sep = args.first().map(Value::to_display_string).unwrap_or_else(|| ",".into());
            let parts: Vec<String> = items.iter().map(Value::to_display_string).collect();
            Ok(Value::from(parts.join(&sep)))
        }
        "map" => callback().and_then(|f| {
            let mapped = items
                .iter()
                .map(|item| f.call(std::slice::from_ref(item)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::array(mapped))
        }),
        "filter" => callback().and_then(|f| {
            let mut kept = Vec::new();
            for item in items.iter() {
                if f.call(std::slice::from_ref(item))?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::array(kept))
        }),
        "includes" => Ok(Value::Bool(match args.first() {
            Some(needle) => items.iter().any(|item| item.identical(needle)),
            None => false,
        })),
        "indexOf" => Ok(Value::from(match args.first() {
            Some(needle) => items
                .iter()
                .position(|item| item.identical(needle))
                .map(|i| i as i64)
                .unwrap_or(-1),
            None => -1,
        })),
        "slice" => {
            let start = arg_index(args, 0, items.len()).unwrap_or(0);
            let end = arg_index(args, 1, items.len()).unwrap_or(items.len());
            Ok(Value::array(items[start.min(end)..end].to_vec()))
        }
        "concat" => {
            let mut all = items.to_vec();
            for arg in args {
                match arg {
                    Value::Array(more) => all.extend(more.items.iter().cloned()),
                    other => all.push(other.clone()),
                }
            }
            Ok(Value::array(all))
        }
        "at" => Ok(arg_index(args, 0, items.len())
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Nil)),
        _ => return None,
    };
    Some(result)
}

// ============================================================================
// Host Globals
// ============================================================================

fn host_object(name: &str, members: Vec<(&str, Value)>) -> Value {
    let type_def = TypeDef::new(name, &[]);
    let object = Object::new(type_def, FxHashMap::default());
    for (member, value) in members {
        object.set_field(member, value);
    }
    Value::Object(Rc::new(object))
}

fn number_arg(args: &[Value], i: usize) -> Result<f64> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(n.to_float()),
        Some(other) => Err(Error::runtime(format!(
            "Expected a number, got {}",
            other.type_name()
        ))),
        None => Ok(f64::NAN),
    }
}

/// Integral results come back as integers when they fit
fn integral(x: f64) -> Value {
    match x.to_i64() {
        Some(n) if n as f64 == x => Value::from(n),
        _ => Value::from(x),
    }
}

fn math_floor(args: &[Value]) -> Result<Value> {
    Ok(integral(number_arg(args, 0)?.floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value> {
    Ok(integral(number_arg(args, 0)?.ceil()))
}

fn math_round(args: &[Value]) -> Result<Value> {
    Ok(integral(number_arg(args, 0)?.round()))
}

fn math_abs(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Number(n)) if n.is_negative() => Ok(Value::Number(n.neg())),
        Some(Value::Number(n)) => Ok(Value::Number(n.clone())),
        _ => Ok(Value::from(number_arg(args, 0)?.abs())),
    }
}

fn math_sqrt(args: &[Value]) -> Result<Value> {
    Ok(Value::from(number_arg(args, 0)?.sqrt()))
}

fn math_pow(args: &[Value]) -> Result<Value> {
    Ok(integral(number_arg(args, 0)?.powf(number_arg(args, 1)?)))
}

fn extremum(args: &[Value], pick_greater: bool) -> Result<Value> {
    let mut best: Option<&NumericType> = None;
    for arg in args {
        let Value::Number(n) = arg else {
            return Err(Error::runtime(format!(
                "Expected a number, got {}",
                arg.type_name()
            )));
        };
        best = match best {
            Some(b) if (n > b) != pick_greater => Some(b),
            _ => Some(n),
        };
    }
    Ok(best.map(|n| Value::Number(n.clone())).unwrap_or_else(|| {
        Value::from(if pick_greater {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    }))
}

fn math_max(args: &[Value]) -> Result<Value> {
    extremum(args, true)
}

fn math_min(args: &[Value]) -> Result<Value> {
    extremum(args, false)
}

fn console_log(args: &[Value]) -> Result<Value> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let line: Vec<String> = args.iter().map(Value::to_display_string).collect();
    writeln!(handle, "{}", line.join(" "))
        .map_err(|e| Error::runtime(format!("console.log: I/O error: {e}")))?;
    Ok(Value::Nil)
}

fn host_globals() -> FxHashMap<Rc<str>, Value> {
    let mut globals = FxHashMap::default();
    globals.insert(
        Rc::from("Math"),
        host_object(
            "Math",
            vec![
                ("PI", Value::from(std::f64::consts::PI)),
                ("E", Value::from(std::f64::consts::E)),
                ("floor", Value::native("floor", math_floor)),
                ("ceil", Value::native("ceil", math_ceil)),
                ("round", Value::native("round", math_round)),
                ("abs", Value::native("abs", math_abs)),
                ("sqrt", Value::native("sqrt", math_sqrt)),
                ("pow", Value::native("pow", math_pow)),
                ("max", Value::native("max", math_max)),
                ("min", Value::native("min", math_min)),
            ],
        ),
    );
    globals.insert(
        Rc::from("console"),
        host_object("Console", vec![("log", Value::native("log", console_log))]),
    );
    globals.insert(Rc::from("NaN"), Value::from(f64::NAN));
    globals.insert(Rc::from("Infinity"), Value::from(f64::INFINITY));
    globals
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_compiler::codegen::var_path;
    use cairn_compiler::VarRef;

    fn interpreter() -> Interpreter {
        Interpreter::new(Rc::new(ModuleRegistry::new()))
    }

    fn eval(interp: &Interpreter, expr: &Expr) -> Result<Value> {
        interp.eval(expr, &Scope::new())
    }

    #[test]
    fn test_scope_lookup_walks_parents() {
        let mut outer = FxHashMap::default();
        outer.insert(Rc::from("a"), Value::from(1));
        let scope = Scope::new().extend(outer);
        let mut inner = FxHashMap::default();
        inner.insert(Rc::from("b"), Value::from(2));
        let scope = scope.extend(inner);
        assert_eq!(scope.lookup("a"), Some(Value::from(1)));
        assert_eq!(scope.lookup("b"), Some(Value::from(2)));
        assert_eq!(scope.lookup("c"), None);
    }

    #[test]
    fn test_var_path_reads_current_value() {
        let interp = interpreter();
        interp
            .registry()
            .intern("localpkg", "user", "x", Some(Value::from(5)), None)
            .unwrap();
        let path = var_path(&VarRef::new("localpkg", "user", "x"));
        assert_eq!(eval(&interp, &path).unwrap(), Value::from(5));

        interp
            .registry()
            .intern("localpkg", "user", "x", Some(Value::from(10)), None)
            .unwrap();
        assert_eq!(eval(&interp, &path).unwrap(), Value::from(10));
    }

    #[test]
    fn test_unbound_var_value() {
        let interp = interpreter();
        interp.registry().intern("localpkg", "user", "y", None, None).unwrap();
        let err = eval(&interp, &var_path(&VarRef::new("localpkg", "user", "y"))).unwrap_err();
        assert_eq!(err.kind, cairn::ErrorKind::Unbound);
    }

    #[test]
    fn test_root_is_not_a_value() {
        let interp = interpreter();
        assert!(eval(&interp, &Expr::root()).is_err());
        assert!(eval(&interp, &Expr::root().member("packages")).is_err());
    }

    #[test]
    fn test_binary_operators() {
        let num = |n: i64| Value::from(n);
        assert_eq!(binary(BinaryOp::Add, &num(2), &num(3)).unwrap(), num(5));
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("a"), &num(1)).unwrap(),
            Value::from("a1")
        );
        assert_eq!(binary(BinaryOp::Le, &num(2), &num(2)).unwrap(), Value::Bool(true));
        assert_eq!(
            binary(BinaryOp::StrictEq, &Value::keyword("k"), &Value::keyword("k")).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinaryOp::Sub, &Value::Nil, &num(1)).is_err());
    }

    #[test]
    fn test_async_unit_is_pending() {
        let interp = interpreter();
        let program = Program::wrap(Expr::literal(1i64));
        let Completion::Pending(handle) = interp.execute(&program, "").unwrap() else {
            panic!("async units complete through a promise");
        };
        assert_eq!(interp.wait(handle).unwrap(), Value::from(1));
    }

    #[test]
    fn test_host_globals_and_methods() {
        let interp = interpreter();
        let floor = Expr::global("Math")
            .member("floor")
            .call(vec![Expr::literal(2.7)]);
        assert_eq!(eval(&interp, &floor).unwrap(), Value::from(2));

        let upper = Expr::literal("abc").member("toUpperCase").call(vec![]);
        assert_eq!(eval(&interp, &upper).unwrap(), Value::from("ABC"));

        let length = Expr::literal("héllo").member("length");
        assert_eq!(eval(&interp, &length).unwrap(), Value::from(5));

        assert!(eval(&interp, &Expr::global("nowhere")).is_err());
    }
}
