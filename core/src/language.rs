use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::abstractions::{self, SeqIter};
use crate::collections::{Cons, Dict, HashSet, LazySeq, List, Range, Repeat};
use crate::error::{Error, Result};
use crate::identifier::{Keyword, PrefixName, QName, QSym, Symbol};
use crate::numeric::NumericType;
use crate::protocol::Protocol;
use crate::var::Var;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Callables
// ============================================================================

/// Anything that can be applied to arguments: native functions, closures
/// produced by an executing host, protocol method tables.
pub trait Callable {
    fn call(&self, args: &[Value]) -> Result<Value>;

    fn name(&self) -> Option<&str> {
        None
    }
}

impl fmt::Debug for dyn Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "#<fn {name}>"),
            None => write!(f, "#<fn>"),
        }
    }
}

pub type NativeFnPtr = fn(&[Value]) -> Result<Value>;

/// A Rust function exposed as a value
#[derive(Clone)]
pub struct NativeFn {
    pub name: &'static str,
    pub func: NativeFnPtr,
}

impl Callable for NativeFn {
    fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    fn name(&self) -> Option<&str> {
        Some(self.name)
    }
}

/// A Rust closure exposed as a value, for natives that capture state
pub struct NativeClosure<F> {
    pub name: Rc<str>,
    pub func: F,
}

impl<F> Callable for NativeClosure<F>
where
    F: Fn(&[Value]) -> Result<Value>,
{
    fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

// ============================================================================
// Objects and Types
// ============================================================================

/// Identifies the dispatch type of a value. Every built-in kind has its
/// own key; user-defined types are keyed by their definition id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Nil,
    Bool,
    Number,
    String,
    Keyword,
    Symbol,
    QName,
    PrefixName,
    QSym,
    List,
    Cons,
    Range,
    Repeat,
    LazySeq,
    Array,
    Dict,
    Set,
    Regex,
    Fn,
    Var,
    Type,
    Protocol,
    Promise,
    Object(u64),
}

impl TypeKey {
    pub const BUILTINS: &'static [TypeKey] = &[
        TypeKey::Nil,
        TypeKey::Bool,
        TypeKey::Number,
        TypeKey::String,
        TypeKey::Keyword,
        TypeKey::Symbol,
        TypeKey::QName,
        TypeKey::PrefixName,
        TypeKey::QSym,
        TypeKey::List,
        TypeKey::Cons,
        TypeKey::Range,
        TypeKey::Repeat,
        TypeKey::LazySeq,
        TypeKey::Array,
        TypeKey::Dict,
        TypeKey::Set,
        TypeKey::Regex,
        TypeKey::Fn,
        TypeKey::Var,
        TypeKey::Type,
        TypeKey::Protocol,
        TypeKey::Promise,
    ];

    pub fn builtin_name(&self) -> &'static str {
        match self {
            TypeKey::Nil => "nil",
            TypeKey::Bool => "boolean",
            TypeKey::Number => "number",
            TypeKey::String => "string",
            TypeKey::Keyword => "keyword",
            TypeKey::Symbol => "symbol",
            TypeKey::QName => "qname",
            TypeKey::PrefixName => "prefix-name",
            TypeKey::QSym => "qsym",
            TypeKey::List => "list",
            TypeKey::Cons => "cons",
            TypeKey::Range => "range",
            TypeKey::Repeat => "repeat",
            TypeKey::LazySeq => "lazy-seq",
            TypeKey::Array => "array",
            TypeKey::Dict => "dict",
            TypeKey::Set => "set",
            TypeKey::Regex => "regex",
            TypeKey::Fn => "fn",
            TypeKey::Var => "var",
            TypeKey::Type => "type",
            TypeKey::Protocol => "protocol",
            TypeKey::Promise => "promise",
            TypeKey::Object(_) => "object",
        }
    }
}

/// A named record type. Built-in kinds get a definition too, so they can
/// be passed around as values and extended with protocols.
#[derive(Debug)]
pub struct TypeDef {
    pub id: u64,
    pub name: Rc<str>,
    pub fields: Vec<Rc<str>>,
    pub parent: Option<Rc<TypeDef>>,
    builtin: Option<TypeKey>,
}

thread_local! {
    static BUILTIN_TYPES: RefCell<FxHashMap<TypeKey, Rc<TypeDef>>> =
        RefCell::new(FxHashMap::default());
}

impl TypeDef {
    pub fn new(name: &str, fields: &[&str]) -> Rc<TypeDef> {
        Self::with_parent(name, fields, None)
    }

    pub fn with_parent(name: &str, fields: &[&str], parent: Option<Rc<TypeDef>>) -> Rc<TypeDef> {
        Rc::new(TypeDef {
            id: next_id(),
            name: Rc::from(name),
            fields: fields.iter().map(|f| Rc::from(*f)).collect(),
            parent,
            builtin: None,
        })
    }

    /// The shared definition standing for a built-in kind
    pub fn builtin(key: TypeKey) -> Rc<TypeDef> {
        BUILTIN_TYPES.with(|types| {
            types
                .borrow_mut()
                .entry(key)
                .or_insert_with(|| {
                    Rc::new(TypeDef {
                        id: next_id(),
                        name: Rc::from(key.builtin_name()),
                        fields: Vec::new(),
                        parent: None,
                        builtin: Some(key),
                    })
                })
                .clone()
        })
    }

    pub fn key(&self) -> TypeKey {
        self.builtin.unwrap_or(TypeKey::Object(self.id))
    }

    /// Build an instance from positional field values
    pub fn instantiate(self: &Rc<Self>, args: &[Value]) -> Result<Value> {
        if self.builtin.is_some() {
            return Err(Error::runtime(format!(
                "Cannot instantiate built-in type {}",
                self.name
            )));
        }
        if args.len() != self.fields.len() {
            return Err(Error::runtime(format!(
                "Wrong number of arguments ({}) passed to {} constructor, expected {}",
                args.len(),
                self.name,
                self.fields.len()
            )));
        }
        let fields = self.fields.iter().cloned().zip(args.iter().cloned()).collect();
        Ok(Value::Object(Rc::new(Object::new(self.clone(), fields))))
    }
}

/// An instance of a user-defined or host type. Fields are mutable, as host
/// objects are.
#[derive(Debug)]
pub struct Object {
    pub id: u64,
    pub type_def: Rc<TypeDef>,
    fields: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl Object {
    pub fn new(type_def: Rc<TypeDef>, fields: FxHashMap<Rc<str>, Value>) -> Self {
        Object {
            id: next_id(),
            type_def,
            fields: RefCell::new(fields),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(Rc::from(name), value);
    }

    pub fn field_names(&self) -> Vec<Rc<str>> {
        self.fields.borrow().keys().cloned().collect()
    }
}

// ============================================================================
// Promises
// ============================================================================

#[derive(Debug)]
enum PromiseState {
    Pending(Value),
    Resolved(Value),
    Rejected(Error),
}

/// A deferred value. Pending promises hold a thunk that is run at most
/// once, on the first `force`.
#[derive(Debug)]
pub struct Promise {
    state: RefCell<PromiseState>,
}

impl Promise {
    pub fn resolved(value: Value) -> Self {
        Promise {
            state: RefCell::new(PromiseState::Resolved(value)),
        }
    }

    pub fn deferred(thunk: Value) -> Self {
        Promise {
            state: RefCell::new(PromiseState::Pending(thunk)),
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(&*self.state.borrow(), PromiseState::Pending(_))
    }

    /// Settle the promise and return its value
    pub fn force(&self) -> Result<Value> {
        let thunk = match &*self.state.borrow() {
            PromiseState::Resolved(v) => return Ok(v.clone()),
            PromiseState::Rejected(e) => return Err(e.clone()),
            PromiseState::Pending(thunk) => thunk.clone(),
        };
        let outcome = thunk.call(&[]).and_then(|v| match v {
            // Promises resolving to promises flatten
            Value::Promise(inner) => inner.force(),
            other => Ok(other),
        });
        *self.state.borrow_mut() = match &outcome {
            Ok(v) => PromiseState::Resolved(v.clone()),
            Err(e) => PromiseState::Rejected(e.clone()),
        };
        outcome
    }
}

// ============================================================================
// Leaf values
// ============================================================================

/// A compiled regular expression that remembers how it was written
#[derive(Debug)]
pub struct RegexValue {
    pub source: Rc<str>,
    pub flags: Rc<str>,
    pub regex: regex::Regex,
}

impl RegexValue {
    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let mut pattern = String::new();
        let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
        if !inline.is_empty() {
            pattern.push_str(&format!("(?{inline})"));
        }
        if flags.contains('x') {
            pattern.push_str(&crate::lexer::strip_freespacing(source));
        } else {
            pattern.push_str(source);
        }
        let regex = regex::Regex::new(&pattern)
            .map_err(|e| Error::parse(format!("Invalid regular expression: {e}")))?;
        Ok(RegexValue {
            source: Rc::from(source),
            flags: Rc::from(flags),
            regex,
        })
    }
}

/// Host array: a fixed sequence with index access
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub items: Rc<[Value]>,
    pub meta: Option<Dict>,
}

impl ArrayValue {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayValue {
            items: Rc::from(items),
            meta: None,
        }
    }
}

// ============================================================================
// Value
// ============================================================================

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(NumericType),
    String(Rc<str>),
    Keyword(Keyword),
    Symbol(Rc<Symbol>),
    QName(Rc<QName>),
    PrefixName(Rc<PrefixName>),
    QSym(Rc<QSym>),
    List(Rc<List>),
    Cons(Rc<Cons>),
    Range(Rc<Range>),
    Repeat(Rc<Repeat>),
    LazySeq(Rc<LazySeq>),
    Array(Rc<ArrayValue>),
    Dict(Rc<Dict>),
    Set(Rc<HashSet>),
    Regex(Rc<RegexValue>),
    Fn(Rc<dyn Callable>),
    Var(Var),
    Object(Rc<Object>),
    Type(Rc<TypeDef>),
    Protocol(Rc<Protocol>),
    Promise(Rc<Promise>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(NumericType::Int(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(NumericType::Float(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumericType> for Value {
    fn from(n: NumericType) -> Self {
        Value::Number(n)
    }
}

impl From<Keyword> for Value {
    fn from(k: Keyword) -> Self {
        Value::Keyword(k)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(Rc::new(s))
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(Rc::new(d))
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(Rc::new(l))
    }
}

impl From<HashSet> for Value {
    fn from(s: HashSet) -> Self {
        Value::Set(Rc::new(s))
    }
}

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::new(Symbol::new(name)))
    }

    pub fn keyword(name: &str) -> Value {
        Value::Keyword(Keyword::new(name))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(List::from_vec(items)))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(ArrayValue::new(items)))
    }

    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Cons(Rc::new(Cons::new(head, tail)))
    }

    pub fn native(name: &'static str, func: NativeFnPtr) -> Value {
        Value::Fn(Rc::new(NativeFn { name, func }))
    }

    pub fn closure<F>(name: &str, func: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Value::Fn(Rc::new(NativeClosure {
            name: Rc::from(name),
            func,
        }))
    }

    /// Everything except nil and false is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if s.is_simple(name))
    }

    /// Kinds that iterate in order and compare elementwise
    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            Value::List(_)
                | Value::Cons(_)
                | Value::Array(_)
                | Value::Range(_)
                | Value::Repeat(_)
                | Value::LazySeq(_)
        )
    }

    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Nil => TypeKey::Nil,
            Value::Bool(_) => TypeKey::Bool,
            Value::Number(_) => TypeKey::Number,
            Value::String(_) => TypeKey::String,
            Value::Keyword(_) => TypeKey::Keyword,
            Value::Symbol(_) => TypeKey::Symbol,
            Value::QName(_) => TypeKey::QName,
            Value::PrefixName(_) => TypeKey::PrefixName,
            Value::QSym(_) => TypeKey::QSym,
            Value::List(_) => TypeKey::List,
            Value::Cons(_) => TypeKey::Cons,
            Value::Range(_) => TypeKey::Range,
            Value::Repeat(_) => TypeKey::Repeat,
            Value::LazySeq(_) => TypeKey::LazySeq,
            Value::Array(_) => TypeKey::Array,
            Value::Dict(_) => TypeKey::Dict,
            Value::Set(_) => TypeKey::Set,
            Value::Regex(_) => TypeKey::Regex,
            Value::Fn(_) => TypeKey::Fn,
            Value::Var(_) => TypeKey::Var,
            Value::Type(_) => TypeKey::Type,
            Value::Protocol(_) => TypeKey::Protocol,
            Value::Promise(_) => TypeKey::Promise,
            Value::Object(o) => o.type_def.key(),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Object(o) => o.type_def.name.to_string(),
            other => other.type_key().builtin_name().to_string(),
        }
    }

    /// The type definition of this value, built-in kinds included
    pub fn type_def(&self) -> Rc<TypeDef> {
        match self {
            Value::Object(o) => o.type_def.clone(),
            other => TypeDef::builtin(other.type_key()),
        }
    }

    /// Same allocation, or equal primitive
    pub fn identical(&self, other: &Value) -> bool {
        fn same<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
            std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => same(a, b),
            (Value::QName(a), Value::QName(b)) => same(a, b),
            (Value::PrefixName(a), Value::PrefixName(b)) => same(a, b),
            (Value::QSym(a), Value::QSym(b)) => same(a, b),
            (Value::List(a), Value::List(b)) => same(a, b),
            (Value::Cons(a), Value::Cons(b)) => same(a, b),
            (Value::Range(a), Value::Range(b)) => same(a, b),
            (Value::Repeat(a), Value::Repeat(b)) => same(a, b),
            (Value::LazySeq(a), Value::LazySeq(b)) => same(a, b),
            (Value::Array(a), Value::Array(b)) => same(a, b),
            (Value::Dict(a), Value::Dict(b)) => same(a, b),
            (Value::Set(a), Value::Set(b)) => same(a, b),
            (Value::Regex(a), Value::Regex(b)) => same(a, b),
            (Value::Fn(a), Value::Fn(b)) => same(a, b),
            (Value::Var(a), Value::Var(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => same(a, b),
            (Value::Type(a), Value::Type(b)) => same(a, b),
            (Value::Protocol(a), Value::Protocol(b)) => same(a, b),
            (Value::Promise(a), Value::Promise(b)) => same(a, b),
            _ => false,
        }
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    pub fn meta(&self) -> Option<&Dict> {
        match self {
            Value::Symbol(s) => s.meta(),
            Value::List(l) => l.meta.as_ref(),
            Value::Cons(c) => c.meta.as_ref(),
            Value::Array(a) => a.meta.as_ref(),
            Value::Dict(d) => d.meta(),
            Value::Set(s) => s.meta(),
            _ => None,
        }
    }

    pub fn supports_meta(&self) -> bool {
        matches!(
            self,
            Value::Symbol(_)
                | Value::List(_)
                | Value::Cons(_)
                | Value::Array(_)
                | Value::Dict(_)
                | Value::Set(_)
        )
    }

    /// A copy of this value carrying `meta`. Equality is unaffected.
    pub fn with_meta(&self, meta: Option<Dict>) -> Result<Value> {
        Ok(match self {
            Value::Symbol(s) => Value::Symbol(Rc::new(s.with_meta(meta))),
            Value::List(l) => Value::List(Rc::new(l.with_meta(meta))),
            Value::Cons(c) => Value::Cons(Rc::new(Cons {
                meta,
                ..c.as_ref().clone()
            })),
            Value::Array(a) => Value::Array(Rc::new(ArrayValue {
                meta,
                ..a.as_ref().clone()
            })),
            Value::Dict(d) => Value::Dict(Rc::new(d.with_meta(meta))),
            Value::Set(s) => Value::Set(Rc::new(s.with_meta(meta))),
            other => {
                return Err(Error::assertion(format!(
                    "Metadata cannot be attached to a {}",
                    other.type_name()
                )));
            }
        })
    }

    /// Merge `extra` over any existing metadata
    pub fn vary_meta(&self, extra: &Dict) -> Result<Value> {
        let merged = match self.meta() {
            Some(existing) => existing.merge(extra)?,
            None => extra.clone(),
        };
        self.with_meta(Some(merged))
    }

    // ------------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------------

    /// Apply this value to arguments. Keywords, dicts and sets act as
    /// lookup functions; vars call through to their current value.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match self {
            Value::Fn(f) => f.call(args),
            Value::Var(var) => var.deref()?.call(args),
            Value::Keyword(_) => match args {
                [coll] => abstractions::get(coll, self, &Value::Nil),
                [coll, default] => abstractions::get(coll, self, default),
                _ => Err(arity_error(&self.to_string(), args.len())),
            },
            Value::Dict(_) | Value::Set(_) => match args {
                [key] => abstractions::get(self, key, &Value::Nil),
                [key, default] => abstractions::get(self, key, default),
                _ => Err(arity_error(&self.type_name(), args.len())),
            },
            Value::Type(t) => t.instantiate(args),
            other => Err(Error::runtime(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    /// The text `str` produces: strings raw, nil empty, everything else
    /// printed.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

fn arity_error(name: &str, n: usize) -> Error {
    Error::runtime(format!("Wrong number of arguments ({n}) passed to {name}"))
}

// ============================================================================
// Built-in Equality
// ============================================================================

// Structural equality without protocol dispatch; used for hashing keys.
// `abstractions::equiv` is the user-visible relation.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::QName(a), Value::QName(b)) => a == b,
            (Value::PrefixName(a), Value::PrefixName(b)) => a == b,
            (Value::QSym(a), Value::QSym(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.source == b.source && a.flags == b.flags,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get_builtin(k).is_some_and(|bv| bv == v))
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.contains_builtin(x))
            }
            (a, b) if a.is_sequential() && b.is_sequential() => {
                abstractions::sequential_eq(a, b, |x, y| Ok(x == y)).unwrap_or(false)
            }
            (a, b) => a.identical(b),
        }
    }
}

impl Eq for Value {}

// ============================================================================
// Display Implementation
// ============================================================================

/// Longest prefix of a sequence that printing will realize
const PRINT_LIMIT: usize = 10_000;

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

fn write_seq(f: &mut fmt::Formatter, open: &str, close: &str, value: &Value) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in SeqIter::new(value.clone()).enumerate() {
        if i >= PRINT_LIMIT {
            write!(f, " ...")?;
            break;
        }
        if i > 0 {
            write!(f, " ")?;
        }
        match item {
            Ok(item) => write!(f, "{item}")?,
            Err(e) => write!(f, "#<error {}>", e.message)?,
        }
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Keyword(k) => write!(f, "{k}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::QName(q) => write!(f, "{q}"),
            Value::PrefixName(p) => write!(f, "{p}"),
            Value::QSym(q) => write!(f, "{q}"),
            Value::List(_)
            | Value::Cons(_)
            | Value::Range(_)
            | Value::Repeat(_)
            | Value::LazySeq(_) => write_seq(f, "(", ")", self),
            Value::Array(_) => write_seq(f, "[", "]", self),
            Value::Dict(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "#{{")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Regex(r) => write!(f, "%r{{{}}}{}", r.source, r.flags),
            Value::Fn(func) => write!(f, "{func:?}"),
            Value::Var(v) => write!(f, "#'{v}"),
            Value::Object(o) => match abstractions::repr_object(self) {
                Some(Ok(text)) => write!(f, "{text}"),
                _ => write!(f, "#<{} {}>", o.type_def.name, o.id),
            },
            Value::Type(t) => write!(f, "#<type {}>", t.name),
            Value::Protocol(p) => write!(f, "#<protocol {}>", p.qualified_name()),
            Value::Promise(p) => {
                if p.is_settled() {
                    write!(f, "#<promise settled>")
                } else {
                    write!(f, "#<promise pending>")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(
            Value::list(vec![Value::from(1), Value::keyword("k")]).to_string(),
            "(1 :k)"
        );
        assert_eq!(Value::array(vec![]).to_string(), "[]");
        assert_eq!(Value::list(vec![]).to_string(), "()");
    }

    #[test]
    fn test_empty_list_is_not_nil() {
        assert_ne!(Value::list(vec![]), Value::Nil);
    }

    #[test]
    fn test_meta_does_not_affect_equality() {
        let meta = Dict::new()
            .assoc(Value::keyword("line"), Value::from(3))
            .unwrap();
        let plain = Value::list(vec![Value::from(1)]);
        let annotated = plain.with_meta(Some(meta)).unwrap();
        assert_eq!(plain, annotated);
        assert!(annotated.meta().is_some());
    }

    #[test]
    fn test_meta_on_unsupported_value() {
        let err = Value::from(1).with_meta(Some(Dict::new())).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Assertion);
    }

    #[test]
    fn test_list_equals_array_elementwise() {
        let l = Value::list(vec![Value::from(1), Value::from(2)]);
        let a = Value::array(vec![Value::from(1), Value::from(2)]);
        assert_eq!(l, a);
    }

    #[test]
    fn test_type_instantiate() {
        let point = TypeDef::new("Point", &["x", "y"]);
        let p = point
            .instantiate(&[Value::from(1), Value::from(2)])
            .unwrap();
        match &p {
            Value::Object(o) => assert_eq!(o.get_field("y"), Some(Value::from(2))),
            other => panic!("expected object, got {other}"),
        }
        assert!(point.instantiate(&[Value::from(1)]).is_err());
        assert_eq!(p.type_name(), "Point");
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let t = TypeDef::new("Box", &["v"]);
        let a = t.instantiate(&[Value::from(1)]).unwrap();
        let b = t.instantiate(&[Value::from(1)]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_builtin_type_defs_are_shared() {
        let a = Value::from(1).type_def();
        let b = Value::from(2.5).type_def();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.key(), TypeKey::Number);
    }

    #[test]
    fn test_promise_runs_thunk_once() {
        use std::cell::Cell;
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let thunk = Value::closure("thunk", move |_| {
            counter.set(counter.get() + 1);
            Ok(Value::from(42))
        });
        let p = Promise::deferred(thunk);
        assert!(!p.is_settled());
        assert_eq!(p.force().unwrap(), Value::from(42));
        assert_eq!(p.force().unwrap(), Value::from(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_keyword_is_a_lookup_function() {
        let d = Dict::new()
            .assoc(Value::keyword("a"), Value::from(1))
            .unwrap();
        let k = Value::keyword("a");
        assert_eq!(k.call(&[Value::from(d)]).unwrap(), Value::from(1));
        assert_eq!(
            Value::keyword("b")
                .call(&[Value::Nil, Value::from(9)])
                .unwrap(),
            Value::from(9)
        );
    }

    #[test]
    fn test_regex_flags() {
        let r = RegexValue::new("abc", "i").unwrap();
        assert!(r.regex.is_match("ABC"));
        assert!(RegexValue::new("(", "").is_err());
    }
}
