//! Standard library native functions
//!
//! Natives are interned into the bootstrap module `cairn:lang`, which every
//! other module falls back to. The prelude at the bottom is cairn source
//! evaluated in that module once the natives are in place; it defines the
//! everyday macros.

use std::io::{self, Write};
use std::rc::{Rc, Weak};

use tracing::debug;

use cairn::abstractions::{dict_of, set_of};
use cairn::registry::{BOOTSTRAP_MODULE, BOOTSTRAP_PACKAGE};
use cairn::{
    Dict, Error, LazySeq, MethodSignature, ModuleRegistry, NumericType, Promise, Protocol,
    Range, Repeat, Result, SeqIter, Symbol, TypeDef, TypeKey, Value, abstractions, hash_code,
};
use cairn_compiler::Compiler;

// ============================================================================
// Argument Helpers
// ============================================================================

fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> Result<()> {
    let n = args.len();
    if n < min || max.is_some_and(|max| n > max) {
        return Err(Error::runtime(format!(
            "Wrong number of arguments ({n}) passed to {name}"
        )));
    }
    Ok(())
}

fn number<'a>(name: &str, value: &'a Value) -> Result<&'a NumericType> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(Error::runtime(format!(
            "{name}: expected number, got {}",
            other.type_name()
        ))),
    }
}

fn string<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::runtime(format!(
            "{name}: expected string, got {}",
            other.type_name()
        ))),
    }
}

fn index(name: &str, value: &Value) -> Result<usize> {
    number(name, value)?
        .to_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::runtime(format!("{name}: expected a non-negative integer, got {value}")))
}

fn protocol<'a>(name: &str, value: &'a Value) -> Result<&'a Rc<Protocol>> {
    match value {
        Value::Protocol(p) => Ok(p),
        other => Err(Error::runtime(format!(
            "{name}: expected protocol, got {}",
            other.type_name()
        ))),
    }
}

/// The name a keyword, symbol or string stands for
fn name_of(value: &Value) -> Result<String> {
    match value {
        Value::Keyword(k) => Ok(k.name()),
        Value::Symbol(s) => Ok(s.name().to_string()),
        Value::String(s) => Ok(s.to_string()),
        other => Err(Error::runtime(format!(
            "Expected a name, got {}",
            other.type_name()
        ))),
    }
}

fn bool_value(b: bool) -> Result<Value> {
    Ok(Value::Bool(b))
}

// ============================================================================
// Sequences
// ============================================================================

/// Usage: (list 1 2 3) => (1 2 3)
pub fn list(args: &[Value]) -> Result<Value> {
    Ok(Value::list(args.to_vec()))
}

/// Usage: (cons 0 '(1 2)) => (0 1 2)
pub fn cons(args: &[Value]) -> Result<Value> {
    arity("cons", args, 2, Some(2))?;
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

pub fn first(args: &[Value]) -> Result<Value> {
    arity("first", args, 1, Some(1))?;
    abstractions::first(&args[0])
}

pub fn rest(args: &[Value]) -> Result<Value> {
    arity("rest", args, 1, Some(1))?;
    abstractions::rest(&args[0])
}

/// Usage: (seq []) => nil
pub fn seq(args: &[Value]) -> Result<Value> {
    arity("seq", args, 1, Some(1))?;
    Ok(abstractions::seq(&args[0])?.unwrap_or(Value::Nil))
}

pub fn count(args: &[Value]) -> Result<Value> {
    arity("count", args, 1, Some(1))?;
    Ok(Value::from(abstractions::count(&args[0])? as i64))
}

/// Usage: (nth [1 2 3] 1) => 2
pub fn nth(args: &[Value]) -> Result<Value> {
    arity("nth", args, 2, Some(3))?;
    let i = index("nth", &args[1])?;
    match (abstractions::nth(&args[0], i), args.get(2)) {
        (Err(_), Some(default)) => Ok(default.clone()),
        (result, _) => result,
    }
}

/// Usage: (concat [1] '(2) nil) => (1 2)
pub fn concat(args: &[Value]) -> Result<Value> {
    let mut items = Vec::new();
    for coll in args {
        for item in SeqIter::new(coll.clone()) {
            items.push(item?);
        }
    }
    Ok(Value::list(items))
}

/// Usage: (range) (range end) (range start end) (range start end step)
pub fn range(args: &[Value]) -> Result<Value> {
    arity("range", args, 0, Some(3))?;
    let num = |i: usize| number("range", &args[i]).cloned();
    let (from, to, step) = match args.len() {
        0 => (NumericType::Int(0), None, NumericType::Int(1)),
        1 => (NumericType::Int(0), Some(num(0)?), NumericType::Int(1)),
        2 => (num(0)?, Some(num(1)?), NumericType::Int(1)),
        _ => (num(0)?, Some(num(1)?), num(2)?),
    };
    Ok(Value::Range(Rc::new(Range::new(from, to, step))))
}

/// Usage: (repeat x) or (repeat n x)
pub fn repeat(args: &[Value]) -> Result<Value> {
    arity("repeat", args, 1, Some(2))?;
    let repeat = match args {
        [x] => Repeat::new(x.clone(), None),
        [n, x] => Repeat::new(x.clone(), Some(index("repeat", n)?)),
        _ => unreachable!("arity checked"),
    };
    Ok(Value::Repeat(Rc::new(repeat)))
}

/// Usage: (lazy-seq* (fn [] ...)); the thunk runs at most once
pub fn lazy_seq(args: &[Value]) -> Result<Value> {
    arity("lazy-seq*", args, 1, Some(1))?;
    Ok(Value::LazySeq(Rc::new(LazySeq::new(args[0].clone()))))
}

/// Usage: (map inc [1 2]) => (2 3)
pub fn map(args: &[Value]) -> Result<Value> {
    arity("map", args, 2, Some(2))?;
    let f = &args[0];
    let mut out = Vec::new();
    for item in SeqIter::new(args[1].clone()) {
        out.push(f.call(&[item?])?);
    }
    Ok(Value::list(out))
}

pub fn filter(args: &[Value]) -> Result<Value> {
    arity("filter", args, 2, Some(2))?;
    let pred = &args[0];
    let mut out = Vec::new();
    for item in SeqIter::new(args[1].clone()) {
        let item = item?;
        if pred.call(std::slice::from_ref(&item))?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

/// Usage: (reduce + [1 2 3]) or (reduce + 10 [1 2 3])
pub fn reduce(args: &[Value]) -> Result<Value> {
    arity("reduce", args, 2, Some(3))?;
    let f = &args[0];
    let (mut acc, items) = match args {
        [_, coll] => {
            let mut items = SeqIter::new(coll.clone());
            match items.next() {
                Some(first) => (first?, items),
                None => return f.call(&[]),
            }
        }
        [_, init, coll] => (init.clone(), SeqIter::new(coll.clone())),
        _ => unreachable!("arity checked"),
    };
    for item in items {
        acc = f.call(&[acc, item?])?;
    }
    Ok(acc)
}

/// Usage: (apply f 1 2 [3 4]) calls (f 1 2 3 4)
pub fn apply(args: &[Value]) -> Result<Value> {
    arity("apply", args, 2, None)?;
    let f = &args[0];
    let Some((spread, fixed)) = args[1..].split_last() else {
        return f.call(&[]);
    };
    let mut call_args = fixed.to_vec();
    for item in SeqIter::new(spread.clone()) {
        call_args.push(item?);
    }
    f.call(&call_args)
}

// ============================================================================
// Collections
// ============================================================================

pub fn get(args: &[Value]) -> Result<Value> {
    arity("get", args, 2, Some(3))?;
    abstractions::get(&args[0], &args[1], args.get(2).unwrap_or(&Value::Nil))
}

/// Usage: (assoc {} :a 1 :b 2)
pub fn assoc(args: &[Value]) -> Result<Value> {
    arity("assoc", args, 3, None)?;
    if args.len() % 2 == 0 {
        return Err(Error::runtime("assoc expects key/value pairs"));
    }
    let mut coll = args[0].clone();
    for kv in args[1..].chunks(2) {
        coll = abstractions::assoc(&coll, kv[0].clone(), kv[1].clone())?;
    }
    Ok(coll)
}

pub fn dissoc(args: &[Value]) -> Result<Value> {
    arity("dissoc", args, 1, None)?;
    let mut coll = args[0].clone();
    for key in &args[1..] {
        coll = abstractions::dissoc(&coll, key)?;
    }
    Ok(coll)
}

pub fn conj(args: &[Value]) -> Result<Value> {
    arity("conj", args, 1, None)?;
    let mut coll = args[0].clone();
    for item in &args[1..] {
        coll = abstractions::conj(&coll, item.clone())?;
    }
    Ok(coll)
}

pub fn disj(args: &[Value]) -> Result<Value> {
    arity("disj", args, 1, None)?;
    let mut coll = args[0].clone();
    for item in &args[1..] {
        coll = abstractions::disj(&coll, item)?;
    }
    Ok(coll)
}

pub fn contains(args: &[Value]) -> Result<Value> {
    arity("contains?", args, 2, Some(2))?;
    bool_value(abstractions::contains(&args[0], &args[1])?)
}

pub fn dict(args: &[Value]) -> Result<Value> {
    dict_of(args)
}

pub fn set(args: &[Value]) -> Result<Value> {
    set_of(args)
}

pub fn array(args: &[Value]) -> Result<Value> {
    Ok(Value::array(args.to_vec()))
}

// ============================================================================
// Equality and Predicates
// ============================================================================

/// Usage: (= 1 1.0 1) => true
pub fn equals(args: &[Value]) -> Result<Value> {
    arity("=", args, 1, None)?;
    for pair in args.windows(2) {
        if !abstractions::equiv(&pair[0], &pair[1])? {
            return bool_value(false);
        }
    }
    bool_value(true)
}

pub fn not_equals(args: &[Value]) -> Result<Value> {
    let Value::Bool(all) = equals(args)? else {
        return bool_value(false);
    };
    bool_value(!all)
}

pub fn not(args: &[Value]) -> Result<Value> {
    arity("not", args, 1, Some(1))?;
    bool_value(!args[0].is_truthy())
}

pub fn identical(args: &[Value]) -> Result<Value> {
    arity("identical?", args, 2, Some(2))?;
    bool_value(args[0].identical(&args[1]))
}

pub fn is_nil(args: &[Value]) -> Result<Value> {
    arity("nil?", args, 1, Some(1))?;
    bool_value(args[0].is_nil())
}

pub fn is_empty(args: &[Value]) -> Result<Value> {
    arity("empty?", args, 1, Some(1))?;
    bool_value(abstractions::seq(&args[0])?.is_none())
}

/// Usage: (seq? '(1)) => true; arrays are not seqs
pub fn is_seq(args: &[Value]) -> Result<Value> {
    arity("seq?", args, 1, Some(1))?;
    bool_value(matches!(
        args[0],
        Value::List(_) | Value::Cons(_) | Value::LazySeq(_) | Value::Range(_) | Value::Repeat(_)
    ))
}

pub fn is_string(args: &[Value]) -> Result<Value> {
    arity("string?", args, 1, Some(1))?;
    bool_value(matches!(args[0], Value::String(_)))
}

pub fn is_symbol(args: &[Value]) -> Result<Value> {
    arity("symbol?", args, 1, Some(1))?;
    bool_value(matches!(args[0], Value::Symbol(_)))
}

pub fn is_keyword(args: &[Value]) -> Result<Value> {
    arity("keyword?", args, 1, Some(1))?;
    bool_value(matches!(args[0], Value::Keyword(_)))
}

pub fn is_fn(args: &[Value]) -> Result<Value> {
    arity("fn?", args, 1, Some(1))?;
    bool_value(matches!(args[0], Value::Fn(_)))
}

pub fn hash(args: &[Value]) -> Result<Value> {
    arity("hash", args, 1, Some(1))?;
    Ok(Value::from(i64::from(hash_code(&args[0])?)))
}

// ============================================================================
// Arithmetic
// ============================================================================

fn fold_numbers(
    name: &str,
    args: &[Value],
    identity: i64,
    op: impl Fn(&NumericType, &NumericType) -> Result<NumericType>,
) -> Result<Value> {
    let mut acc = NumericType::Int(identity);
    for arg in args {
        acc = op(&acc, number(name, arg)?)?;
    }
    Ok(Value::Number(acc))
}

/// Usage: (reduce + [1 2 3]) when `+` is passed as a value
pub fn add(args: &[Value]) -> Result<Value> {
    fold_numbers("+", args, 0, |a, b| Ok(a.add(b)))
}

pub fn mul(args: &[Value]) -> Result<Value> {
    fold_numbers("*", args, 1, |a, b| Ok(a.mul(b)))
}

pub fn sub(args: &[Value]) -> Result<Value> {
    arity("-", args, 1, None)?;
    let first = number("-", &args[0])?;
    if args.len() == 1 {
        return Ok(Value::Number(first.neg()));
    }
    let mut acc = first.clone();
    for arg in &args[1..] {
        acc = acc.sub(number("-", arg)?);
    }
    Ok(Value::Number(acc))
}

pub fn div(args: &[Value]) -> Result<Value> {
    arity("/", args, 1, None)?;
    let first = number("/", &args[0])?;
    if args.len() == 1 {
        return Ok(Value::Number(NumericType::Int(1).div(first)?));
    }
    let mut acc = first.clone();
    for arg in &args[1..] {
        acc = acc.div(number("/", arg)?)?;
    }
    Ok(Value::Number(acc))
}

pub fn modulo(args: &[Value]) -> Result<Value> {
    arity("mod", args, 2, Some(2))?;
    Ok(Value::Number(number("mod", &args[0])?.rem(number("mod", &args[1])?)?))
}

fn compare_chain(
    name: &str,
    args: &[Value],
    holds: impl Fn(&NumericType, &NumericType) -> bool,
) -> Result<Value> {
    arity(name, args, 1, None)?;
    for pair in args.windows(2) {
        if !holds(number(name, &pair[0])?, number(name, &pair[1])?) {
            return bool_value(false);
        }
    }
    bool_value(true)
}

pub fn lt(args: &[Value]) -> Result<Value> {
    compare_chain("<", args, |a, b| a < b)
}

pub fn gt(args: &[Value]) -> Result<Value> {
    compare_chain(">", args, |a, b| a > b)
}

pub fn lte(args: &[Value]) -> Result<Value> {
    compare_chain("<=", args, |a, b| a <= b)
}

pub fn gte(args: &[Value]) -> Result<Value> {
    compare_chain(">=", args, |a, b| a >= b)
}

pub fn inc(args: &[Value]) -> Result<Value> {
    arity("inc", args, 1, Some(1))?;
    Ok(Value::Number(number("inc", &args[0])?.add(&NumericType::Int(1))))
}

pub fn dec(args: &[Value]) -> Result<Value> {
    arity("dec", args, 1, Some(1))?;
    Ok(Value::Number(number("dec", &args[0])?.sub(&NumericType::Int(1))))
}

// ============================================================================
// Strings, Symbols and Keywords
// ============================================================================

/// Usage: (str "a" 1 nil :k) => "a1:k"
pub fn str(args: &[Value]) -> Result<Value> {
    Ok(Value::from(
        args.iter().map(Value::to_display_string).collect::<String>(),
    ))
}

/// Usage: (pr-str "a") => "\"a\""
pub fn pr_str(args: &[Value]) -> Result<Value> {
    let parts = args
        .iter()
        .map(abstractions::repr)
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::from(parts.join(" ")))
}

/// Usage: (symbol "a") or (symbol "mod" "a")
pub fn symbol(args: &[Value]) -> Result<Value> {
    arity("symbol", args, 1, Some(2))?;
    match args {
        [Value::Symbol(_)] => Ok(args[0].clone()),
        [name] => Ok(Value::from(Symbol::parse(string("symbol", name)?)?)),
        [module, name] => Ok(Value::from(Symbol::qualified(
            string("symbol", module)?,
            string("symbol", name)?,
        ))),
        _ => unreachable!("arity checked"),
    }
}

pub fn keyword(args: &[Value]) -> Result<Value> {
    arity("keyword", args, 1, Some(1))?;
    match &args[0] {
        Value::Keyword(_) => Ok(args[0].clone()),
        other => Ok(Value::keyword(&name_of(other)?)),
    }
}

pub fn name(args: &[Value]) -> Result<Value> {
    arity("name", args, 1, Some(1))?;
    Ok(Value::from(name_of(&args[0])?))
}

/// Usage: (gensym) or (gensym "prefix")
pub fn gensym(args: &[Value]) -> Result<Value> {
    arity("gensym", args, 0, Some(1))?;
    let prefix = match args.first() {
        Some(p) => name_of(p)?,
        None => "G".to_string(),
    };
    Ok(Value::from(Symbol::gensym(&prefix)))
}

/// Usage: (read-string "(+ 1 2)") => (+ 1 2)
pub fn read_string(args: &[Value]) -> Result<Value> {
    arity("read-string", args, 1, Some(1))?;
    Ok(cairn::read_string(string("read-string", &args[0])?)?.unwrap_or(Value::Nil))
}

// ============================================================================
// Metadata
// ============================================================================

pub fn meta(args: &[Value]) -> Result<Value> {
    arity("meta", args, 1, Some(1))?;
    Ok(args[0].meta().cloned().map(Value::from).unwrap_or(Value::Nil))
}

fn meta_dict(name: &str, value: &Value) -> Result<Option<Dict>> {
    match value {
        Value::Nil => Ok(None),
        Value::Dict(d) => Ok(Some(d.as_ref().clone())),
        other => Err(Error::assertion(format!(
            "{name}: metadata must be a dict, got {}",
            other.type_name()
        ))),
    }
}

pub fn with_meta(args: &[Value]) -> Result<Value> {
    arity("with-meta", args, 2, Some(2))?;
    args[0].with_meta(meta_dict("with-meta", &args[1])?)
}

/// Usage: (vary-meta x assoc :k v)
pub fn vary_meta(args: &[Value]) -> Result<Value> {
    arity("vary-meta", args, 2, None)?;
    let current = args[0].meta().cloned().map(Value::from).unwrap_or(Value::Nil);
    let mut call_args = vec![current];
    call_args.extend_from_slice(&args[2..]);
    let updated = args[1].call(&call_args)?;
    args[0].with_meta(meta_dict("vary-meta", &updated)?)
}

// ============================================================================
// Types and Protocols
// ============================================================================

/// Usage: (type "a") => the string type
pub fn type_of(args: &[Value]) -> Result<Value> {
    arity("type", args, 1, Some(1))?;
    Ok(Value::Type(args[0].type_def()))
}

/// Usage: (make-type "Point" ["x" "y"]) or with a parent type third
pub fn make_type(args: &[Value]) -> Result<Value> {
    arity("make-type", args, 2, Some(3))?;
    let name = name_of(&args[0])?;
    let fields = SeqIter::new(args[1].clone())
        .map(|f| f.and_then(|f| name_of(&f)))
        .collect::<Result<Vec<_>>>()?;
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    let parent = match args.get(2) {
        None | Some(Value::Nil) => None,
        Some(Value::Type(t)) => Some(t.clone()),
        Some(other) => {
            return Err(Error::runtime(format!(
                "make-type: parent must be a type, got {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Type(TypeDef::with_parent(&name, &fields, parent)))
}

/// Method table from a dict of name to function
fn method_table(value: &Value) -> Result<Vec<(String, Value)>> {
    let Value::Dict(d) = value else {
        return Err(Error::runtime(format!(
            "Protocol implementations must be a dict, got {}",
            value.type_name()
        )));
    };
    d.iter()
        .map(|(k, f)| Ok((name_of(k)?, f.clone())))
        .collect()
}

/// Usage: (extend-type! Greeter (type "") {"greet" (fn [s] ...)}); nil
/// extends nil
pub fn extend_type(args: &[Value]) -> Result<Value> {
    arity("extend-type!", args, 3, Some(3))?;
    let proto = protocol("extend-type!", &args[0])?;
    let key: Option<TypeKey> = match &args[1] {
        Value::Nil => None,
        Value::Type(t) => Some(t.key()),
        other => {
            return Err(Error::runtime(format!(
                "extend-type!: expected a type, got {}",
                other.type_name()
            )));
        }
    };
    let table = method_table(&args[2])?;
    let methods: Vec<(&str, Value)> = table.iter().map(|(n, f)| (n.as_str(), f.clone())).collect();
    proto.extend_type(key, &methods)?;
    Ok(Value::Nil)
}

pub fn extend_instance(args: &[Value]) -> Result<Value> {
    arity("extend-instance!", args, 3, Some(3))?;
    let proto = protocol("extend-instance!", &args[0])?;
    let table = method_table(&args[2])?;
    let methods: Vec<(&str, Value)> = table.iter().map(|(n, f)| (n.as_str(), f.clone())).collect();
    proto.extend_instance(&args[1], &methods)?;
    Ok(args[1].clone())
}

/// Usage: (protocol-invoke Greeter "greet" receiver args...)
pub fn protocol_invoke(args: &[Value]) -> Result<Value> {
    arity("protocol-invoke", args, 3, None)?;
    let proto = protocol("protocol-invoke", &args[0])?;
    proto.invoke(&name_of(&args[1])?, &args[2], &args[3..])
}

pub fn satisfies(args: &[Value]) -> Result<Value> {
    arity("satisfies?", args, 2, Some(2))?;
    bool_value(protocol("satisfies?", &args[0])?.satisfied(&args[1]))
}

// ============================================================================
// Promises and I/O
// ============================================================================

/// Usage: (promise x) is already resolved
pub fn promise(args: &[Value]) -> Result<Value> {
    arity("promise", args, 1, Some(1))?;
    Ok(Value::Promise(Rc::new(Promise::resolved(args[0].clone()))))
}

/// Usage: (deferred (fn [] ...)) runs the thunk when first awaited
pub fn deferred(args: &[Value]) -> Result<Value> {
    arity("deferred", args, 1, Some(1))?;
    Ok(Value::Promise(Rc::new(Promise::deferred(args[0].clone()))))
}

/// Usage: (println "hello" "world") => prints "hello world\n", returns nil
pub fn println(args: &[Value]) -> Result<Value> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let parts: Vec<String> = args.iter().map(Value::to_display_string).collect();
    writeln!(handle, "{}", parts.join(" "))
        .map_err(|e| Error::runtime(format!("println: I/O error: {e}")))?;
    handle
        .flush()
        .map_err(|e| Error::runtime(format!("println: I/O error: {e}")))?;
    Ok(Value::Nil)
}

// ============================================================================
// Registry-aware Natives
// ============================================================================

/// A native that needs the registry. Holds it weakly so vars holding the
/// native do not keep the registry alive.
fn registry_native(
    registry: &Rc<ModuleRegistry>,
    name: &'static str,
    f: fn(&ModuleRegistry, &[Value]) -> Result<Value>,
) -> Value {
    let weak: Weak<ModuleRegistry> = Rc::downgrade(registry);
    Value::closure(name, move |args| {
        let registry = weak
            .upgrade()
            .ok_or_else(|| Error::runtime(format!("{name}: registry is gone")))?;
        f(&registry, args)
    })
}

/// Usage: (make-protocol "Greeter" ["greet" 1] ["lookup" 2 3]); arities
/// count the receiver
fn make_protocol(registry: &ModuleRegistry, args: &[Value]) -> Result<Value> {
    arity("make-protocol", args, 1, None)?;
    let name = name_of(&args[0])?;
    let mut methods = Vec::new();
    for spec in &args[1..] {
        let parts = abstractions::to_vec(spec)?;
        let Some((method, arities)) = parts.split_first() else {
            return Err(Error::runtime("make-protocol: empty method spec"));
        };
        let arities = arities
            .iter()
            .map(|a| index("make-protocol", a))
            .collect::<Result<Vec<_>>>()?;
        methods.push(MethodSignature::new(&name_of(method)?, &arities));
    }
    let module = registry.current_module()?;
    Ok(Value::Protocol(Protocol::define(&module.full_name(), &name, methods)?))
}

/// Usage: (current-module) => localpkg:user
fn current_module(registry: &ModuleRegistry, args: &[Value]) -> Result<Value> {
    arity("current-module", args, 0, Some(0))?;
    Ok(registry.current_module()?.to_value())
}

// ============================================================================
// Registration
// ============================================================================

const NATIVES: &[(&str, cairn::language::NativeFnPtr)] = &[
    ("list", list),
    ("cons", cons),
    ("first", first),
    ("rest", rest),
    ("seq", seq),
    ("count", count),
    ("nth", nth),
    ("concat", concat),
    ("range", range),
    ("repeat", repeat),
    ("lazy-seq*", lazy_seq),
    ("map", map),
    ("filter", filter),
    ("reduce", reduce),
    ("apply", apply),
    ("get", get),
    ("assoc", assoc),
    ("dissoc", dissoc),
    ("conj", conj),
    ("disj", disj),
    ("contains?", contains),
    ("dict", dict),
    ("set", set),
    ("array", array),
    ("=", equals),
    ("not=", not_equals),
    ("not", not),
    ("identical?", identical),
    ("nil?", is_nil),
    ("empty?", is_empty),
    ("seq?", is_seq),
    ("string?", is_string),
    ("symbol?", is_symbol),
    ("keyword?", is_keyword),
    ("fn?", is_fn),
    ("hash", hash),
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("mod", modulo),
    ("<", lt),
    (">", gt),
    ("<=", lte),
    (">=", gte),
    ("inc", inc),
    ("dec", dec),
    ("str", str),
    ("pr-str", pr_str),
    ("symbol", symbol),
    ("keyword", keyword),
    ("name", name),
    ("gensym", gensym),
    ("read-string", read_string),
    ("meta", meta),
    ("with-meta", with_meta),
    ("vary-meta", vary_meta),
    ("type", type_of),
    ("make-type", make_type),
    ("extend-type!", extend_type),
    ("extend-instance!", extend_instance),
    ("protocol-invoke", protocol_invoke),
    ("satisfies?", satisfies),
    ("promise", promise),
    ("deferred", deferred),
    ("println", println),
];

/// Intern every native into `cairn:lang`
pub fn register_natives(registry: &Rc<ModuleRegistry>) -> Result<()> {
    let intern = |name: &str, value: Value| {
        registry.intern(BOOTSTRAP_PACKAGE, BOOTSTRAP_MODULE, name, Some(value), None)
    };
    for &(name, f) in NATIVES {
        intern(name, Value::native(name, f))?;
    }
    intern("make-protocol", registry_native(registry, "make-protocol", make_protocol))?;
    intern("current-module", registry_native(registry, "current-module", current_module))?;
    debug!(count = NATIVES.len() + 2, "registered natives");
    Ok(())
}

/// Macros and helpers written in cairn itself
pub const PRELUDE: &str = r#"
(defmacro defn [name & body]
  (if (string? (first body))
    `(def ~name ~(first body) (fn ~name ~@(rest body)))
    `(def ~name (fn ~name ~@body))))

(defmacro when [test & body]
  `(if ~test (do ~@body)))

(defmacro when-not [test & body]
  `(if ~test nil (do ~@body)))

(defmacro cond [& clauses]
  (if (seq clauses)
    `(if ~(first clauses)
       ~(nth clauses 1)
       (cond ~@(rest (rest clauses))))))

(defmacro -> [x & forms]
  (reduce (fn [acc form]
            (if (seq? form)
              `(~(first form) ~acc ~@(rest form))
              `(~form ~acc)))
          x
          forms))

(defmacro lazy-seq [& body]
  `(lazy-seq* (fn [] ~@body)))

(defmacro deftype [name fields]
  `(def ~name (make-type ~(str name) (array ~@(map str fields)))))

(defmacro defprotocol [name & methods]
  `(do
     (def ~name (make-protocol ~(str name)
                  ~@(map (fn [m] `(array ~(str (first m)) ~@(map count (rest m))))
                         methods)))
     ~@(map (fn [m]
              `(def ~(first m)
                 (fn [this# & args#]
                   (apply protocol-invoke ~name ~(str (first m)) this# args#))))
            methods)))

(defmacro extend-type [t proto & impls]
  `(extend-type! ~proto ~t
     (dict ~@(apply concat
               (map (fn [impl] (array (str (first impl)) `(fn ~@(rest impl))))
                    impls)))))

(defn identity [x] x)

(defn second [coll] (first (rest coll)))
"#;

/// Natives plus the prelude, evaluated in `cairn:lang`
pub fn install(compiler: &Compiler) -> Result<()> {
    let registry = compiler.registry();
    register_natives(registry)?;
    let _guard = registry.bind_current_module(&registry.bootstrap());
    compiler.eval_string(PRELUDE)?;
    debug!("installed prelude");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::from(n)
    }

    #[test]
    fn test_sequence_natives() {
        let l = list(&[num(1), num(2)]).unwrap();
        assert_eq!(first(&[l.clone()]).unwrap(), num(1));
        assert_eq!(rest(&[rest(&[l.clone()]).unwrap()]).unwrap(), Value::Nil);
        assert_eq!(count(&[l.clone()]).unwrap(), num(2));
        assert_eq!(
            concat(&[l.clone(), Value::Nil, Value::array(vec![num(3)])]).unwrap(),
            Value::list(vec![num(1), num(2), num(3)])
        );
        assert_eq!(seq(&[Value::array(vec![])]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_apply_spreads_last_argument() {
        let result = apply(&[
            Value::native("+", add),
            num(1),
            Value::array(vec![num(2), num(3)]),
        ])
        .unwrap();
        assert_eq!(result, num(6));
    }

    #[test]
    fn test_reduce_forms() {
        let plus = Value::native("+", add);
        let xs = Value::array(vec![num(1), num(2), num(3)]);
        assert_eq!(reduce(&[plus.clone(), xs.clone()]).unwrap(), num(6));
        assert_eq!(reduce(&[plus.clone(), num(10), xs]).unwrap(), num(16));
        assert_eq!(reduce(&[plus, Value::Nil]).unwrap(), num(0));
    }

    #[test]
    fn test_equality_is_structural() {
        let a = Value::list(vec![num(1), num(2)]);
        let b = Value::array(vec![num(1), num(2)]);
        assert_eq!(equals(&[a.clone(), b]).unwrap(), Value::Bool(true));
        assert_eq!(not_equals(&[a, num(1)]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic_natives() {
        assert_eq!(sub(&[num(5)]).unwrap(), num(-5));
        assert_eq!(sub(&[num(5), num(2), num(1)]).unwrap(), num(2));
        assert_eq!(lt(&[num(1), num(2), num(3)]).unwrap(), Value::Bool(true));
        assert_eq!(lt(&[num(1), num(3), num(2)]).unwrap(), Value::Bool(false));
        assert!(add(&[num(1), Value::from("x")]).is_err());
    }

    #[test]
    fn test_str_and_names() {
        assert_eq!(
            str(&[Value::from("a"), num(1), Value::Nil, Value::keyword("k")]).unwrap(),
            Value::from("a1:k")
        );
        assert_eq!(name(&[Value::keyword("k")]).unwrap(), Value::from("k"));
        assert_eq!(keyword(&[Value::from("k")]).unwrap(), Value::keyword("k"));
    }

    #[test]
    fn test_wrong_arity_is_reported() {
        let err = cons(&[num(1)]).unwrap_err();
        assert!(err.message.contains("cons"), "{}", err.message);
    }

    #[test]
    fn test_types_and_protocols() {
        let point = make_type(&[Value::from("Point"), Value::array(vec![Value::from("x")])]).unwrap();
        let Value::Type(t) = &point else { panic!() };
        let p = t.instantiate(&[num(1)]).unwrap();
        assert!(type_of(&[p.clone()]).unwrap().identical(&point));

        let registry = Rc::new(ModuleRegistry::new());
        let proto = make_protocol(
            &registry,
            &[Value::from("Shape"), Value::array(vec![Value::from("area"), num(1)])],
        )
        .unwrap();
        let impls = dict(&[
            Value::from("area"),
            Value::closure("area", |_| Ok(Value::from(42))),
        ])
        .unwrap();
        extend_type(&[proto.clone(), point, impls]).unwrap();
        assert_eq!(satisfies(&[proto.clone(), p.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(
            protocol_invoke(&[proto, Value::from("area"), p]).unwrap(),
            num(42)
        );
    }
}
