//! Polymorphic operations over values.
//!
//! Built-in kinds are handled directly; objects go through the core
//! protocols (Seqable, Seq, Counted, Lookup, Equality, Repr). Every
//! operation here is total over `Value` and reports unsupported receivers
//! as errors rather than panicking.

use std::rc::Rc;

use crate::collections::{Dict, HashSet, List};
use crate::error::{Error, Result};
use crate::language::{ArrayValue, Value};
use crate::protocol::core_protocols;

// ============================================================================
// Seq Abstraction
// ============================================================================

fn chars_of(s: &str) -> Value {
    Value::list(s.chars().map(|c| Value::from(c.to_string())).collect())
}

/// A seq over `value`, or None when it is empty. Sequences are returned
/// as-is; arrays, strings, dicts and sets are viewed as lists.
pub fn seq(value: &Value) -> Result<Option<Value>> {
    Ok(match value {
        Value::Nil => None,
        Value::List(l) if l.is_empty() => None,
        Value::List(_) | Value::Cons(_) => Some(value.clone()),
        Value::Range(r) if r.is_empty() => None,
        Value::Repeat(r) if r.is_empty() => None,
        Value::Range(_) | Value::Repeat(_) => Some(value.clone()),
        Value::LazySeq(l) => match l.realize()? {
            Value::Nil => None,
            realized => Some(realized),
        },
        Value::Array(a) if a.items.is_empty() => None,
        Value::Array(a) => Some(Value::List(Rc::new(List::from_shared(a.items.clone(), 0)))),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(chars_of(s)),
        Value::Dict(d) if d.is_empty() => None,
        Value::Dict(d) => Some(Value::list(
            d.iter()
                .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        Value::Set(s) if s.is_empty() => None,
        Value::Set(s) => Some(Value::list(s.iter().cloned().collect())),
        Value::Object(_) => {
            let core = core_protocols();
            if core.seqable.satisfied(value) {
                let produced = core.seqable.invoke("-seq", value, &[])?;
                seq(&produced)?
            } else if core.seq.satisfied(value) {
                Some(value.clone())
            } else {
                // Reports the missing Seqable implementation
                let produced = core.seqable.invoke("-seq", value, &[])?;
                seq(&produced)?
            }
        }
        other => {
            return Err(Error::runtime(format!(
                "Don't know how to create a seq from {}",
                other.type_name()
            )));
        }
    })
}

fn first_of_seq(s: &Value) -> Result<Value> {
    match s {
        Value::List(l) => Ok(l.first().cloned().unwrap_or(Value::Nil)),
        Value::Cons(c) => Ok(c.head.clone()),
        Value::Range(r) => Ok(r.first().unwrap_or(Value::Nil)),
        Value::Repeat(r) => Ok(r.value.clone()),
        Value::Object(_) => core_protocols().seq.invoke("-first", s, &[]),
        other => first(other),
    }
}

fn rest_of_seq(s: &Value) -> Result<Value> {
    let rest = match s {
        Value::List(l) => l.rest().map(|r| Value::List(Rc::new(r))),
        Value::Cons(c) => seq(&c.tail)?,
        Value::Range(r) => r.rest().map(|r| Value::Range(Rc::new(r))),
        Value::Repeat(r) => r.rest().map(|r| Value::Repeat(Rc::new(r))),
        Value::Object(_) => seq(&core_protocols().seq.invoke("-rest", s, &[])?)?,
        other => return rest(other),
    };
    Ok(rest.unwrap_or(Value::Nil))
}

/// First element, nil for empty collections
pub fn first(value: &Value) -> Result<Value> {
    match seq(value)? {
        Some(s) => first_of_seq(&s),
        None => Ok(Value::Nil),
    }
}

/// Everything after the first element, nil when nothing remains
pub fn rest(value: &Value) -> Result<Value> {
    match seq(value)? {
        Some(s) => rest_of_seq(&s),
        None => Ok(Value::Nil),
    }
}

/// Iterator over the elements of any seqable value
pub enum SeqIter {
    Slice { items: Rc<[Value]>, index: usize },
    Walk(Option<Value>),
}

impl SeqIter {
    pub fn new(value: Value) -> Self {
        SeqIter::Walk(Some(value))
    }
}

impl Iterator for SeqIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SeqIter::Slice { items, index } => {
                let item = items.get(*index).cloned();
                *index += 1;
                item.map(Ok)
            }
            SeqIter::Walk(pending) => {
                let current = pending.take()?;
                let s = match seq(&current) {
                    Ok(Some(s)) => s,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                };
                if let Value::List(l) = &s {
                    let (items, offset) = l.parts();
                    let first = items.get(offset).cloned();
                    *self = SeqIter::Slice {
                        items,
                        index: offset + 1,
                    };
                    return first.map(Ok);
                }
                let head = match first_of_seq(&s) {
                    Ok(head) => head,
                    Err(e) => return Some(Err(e)),
                };
                match rest_of_seq(&s) {
                    Ok(tail) => *pending = Some(tail),
                    Err(e) => return Some(Err(e)),
                }
                Some(Ok(head))
            }
        }
    }
}

/// One step along a sequence
pub(crate) enum Step {
    Item(Value, Value),
    End,
    /// An infinite range or repeat; these compare and hash by identity
    Endless(Value),
}

fn is_endless(s: &Value) -> bool {
    match s {
        Value::Range(r) => r.is_infinite(),
        Value::Repeat(r) => r.count.is_none(),
        _ => false,
    }
}

pub(crate) fn step(remaining: &Value) -> Result<Step> {
    let Some(s) = seq(remaining)? else {
        return Ok(Step::End);
    };
    if is_endless(&s) {
        return Ok(Step::Endless(s));
    }
    Ok(Step::Item(first_of_seq(&s)?, rest_of_seq(&s)?))
}

fn slice_of(value: &Value) -> Option<&[Value]> {
    match value {
        Value::List(l) => Some(l.as_slice()),
        Value::Array(a) => Some(&a.items[..]),
        _ => None,
    }
}

/// Visit the elements of a sequential value in order, realizing lazy parts.
/// Returns the endless tail the walk stopped at, if any.
pub(crate) fn walk(
    value: &Value,
    mut visit: impl FnMut(&Value) -> Result<()>,
) -> Result<Option<Value>> {
    let mut remaining = value.clone();
    loop {
        if let Some(items) = slice_of(&remaining) {
            for item in items {
                visit(item)?;
            }
            return Ok(None);
        }
        match step(&remaining)? {
            Step::Item(head, tail) => {
                visit(&head)?;
                remaining = tail;
            }
            Step::End => return Ok(None),
            Step::Endless(s) => return Ok(Some(s)),
        }
    }
}

/// Element-wise comparison of two sequential values, lazy ones included.
/// Endless tails are equal only when they are the same value.
pub(crate) fn sequential_eq(
    a: &Value,
    b: &Value,
    mut eq: impl FnMut(&Value, &Value) -> Result<bool>,
) -> Result<bool> {
    let mut left = a.clone();
    let mut right = b.clone();
    loop {
        if left.identical(&right) {
            return Ok(true);
        }
        if let (Some(xs), Some(ys)) = (slice_of(&left), slice_of(&right)) {
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (x, y) in xs.iter().zip(ys) {
                if !eq(x, y)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        match (step(&left)?, step(&right)?) {
            (Step::End, Step::End) => return Ok(true),
            (Step::Item(x, xs), Step::Item(y, ys)) => {
                if !eq(&x, &y)? {
                    return Ok(false);
                }
                left = xs;
                right = ys;
            }
            (Step::Endless(x), Step::Endless(y)) => return Ok(x.identical(&y)),
            _ => return Ok(false),
        }
    }
}

/// Realize a seqable value into a vector
pub fn to_vec(value: &Value) -> Result<Vec<Value>> {
    SeqIter::new(value.clone()).collect()
}

// ============================================================================
// Counted / Indexed
// ============================================================================

pub fn count(value: &Value) -> Result<usize> {
    let infinite = || Error::runtime("Cannot count an infinite sequence");
    match value {
        Value::Nil => Ok(0),
        Value::List(l) => Ok(l.len()),
        Value::Array(a) => Ok(a.items.len()),
        Value::Dict(d) => Ok(d.len()),
        Value::Set(s) => Ok(s.len()),
        Value::String(s) => Ok(s.chars().count()),
        Value::Range(r) => r.count().ok_or_else(infinite),
        Value::Repeat(r) => r.count.ok_or_else(infinite),
        Value::Object(_) if core_protocols().counted.satisfied(value) => {
            match core_protocols().counted.invoke("-count", value, &[])? {
                Value::Number(n) => n
                    .to_i64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| Error::assertion("-count must return a non-negative integer")),
                other => Err(Error::assertion(format!(
                    "-count must return a number, got {}",
                    other.type_name()
                ))),
            }
        }
        Value::Cons(_) | Value::LazySeq(_) | Value::Object(_) => {
            // Walk until a kind that knows its own length
            let mut n = 0usize;
            let mut current = seq(value)?;
            while let Some(s) = current {
                match &s {
                    Value::List(_) | Value::Range(_) | Value::Repeat(_) => return Ok(n + count(&s)?),
                    _ => {
                        n += 1;
                        current = seq(&rest_of_seq(&s)?)?;
                    }
                }
            }
            Ok(n)
        }
        other => Err(Error::runtime(format!(
            "count not supported on {}",
            other.type_name()
        ))),
    }
}

fn index_of(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) => n.to_i64().and_then(|i| usize::try_from(i).ok()),
        _ => None,
    }
}

/// Element at position `index`
pub fn nth(value: &Value, index: usize) -> Result<Value> {
    let out_of_bounds = || Error::runtime(format!("Index {index} out of bounds"));
    match value {
        Value::Array(a) => a.items.get(index).cloned().ok_or_else(out_of_bounds),
        Value::List(l) => l.as_slice().get(index).cloned().ok_or_else(out_of_bounds),
        _ => SeqIter::new(value.clone())
            .nth(index)
            .unwrap_or_else(|| Err(out_of_bounds())),
    }
}

// ============================================================================
// Associative
// ============================================================================

/// Look `key` up in `coll`, returning `default` when absent
pub fn get(coll: &Value, key: &Value, default: &Value) -> Result<Value> {
    match coll {
        Value::Dict(d) => Ok(d.get(key)?.unwrap_or_else(|| default.clone())),
        Value::Set(s) => Ok(s.find(key)?.unwrap_or_else(|| default.clone())),
        Value::Array(a) => Ok(index_of(key)
            .and_then(|i| a.items.get(i).cloned())
            .unwrap_or_else(|| default.clone())),
        Value::String(s) => Ok(index_of(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::from(c.to_string()))
            .unwrap_or_else(|| default.clone())),
        Value::Object(o) => {
            let lookup = &core_protocols().lookup;
            if lookup.satisfied(coll) {
                return lookup.invoke("-get", coll, &[key.clone(), default.clone()]);
            }
            let field = match key {
                Value::Keyword(k) => o.get_field(&k.name()),
                Value::String(s) => o.get_field(s),
                _ => None,
            };
            Ok(field.unwrap_or_else(|| default.clone()))
        }
        _ => Ok(default.clone()),
    }
}

pub fn contains(coll: &Value, key: &Value) -> Result<bool> {
    match coll {
        Value::Dict(d) => d.contains_key(key),
        Value::Set(s) => s.contains(key),
        Value::Array(a) => Ok(index_of(key).is_some_and(|i| i < a.items.len())),
        Value::Nil => Ok(false),
        other => Err(Error::runtime(format!(
            "contains? not supported on {}",
            other.type_name()
        ))),
    }
}

pub fn assoc(coll: &Value, key: Value, value: Value) -> Result<Value> {
    match coll {
        Value::Nil => Ok(Value::from(Dict::new().assoc(key, value)?)),
        Value::Dict(d) => Ok(Value::Dict(Rc::new(d.assoc(key, value)?))),
        Value::Array(a) => {
            let i = index_of(&key)
                .filter(|i| *i <= a.items.len())
                .ok_or_else(|| Error::runtime(format!("Index {key} out of bounds")))?;
            let mut items = a.items.to_vec();
            if i == items.len() {
                items.push(value);
            } else {
                items[i] = value;
            }
            Ok(Value::Array(Rc::new(ArrayValue {
                items: Rc::from(items),
                meta: a.meta.clone(),
            })))
        }
        other => Err(Error::runtime(format!(
            "assoc not supported on {}",
            other.type_name()
        ))),
    }
}

pub fn dissoc(coll: &Value, key: &Value) -> Result<Value> {
    match coll {
        Value::Nil => Ok(Value::Nil),
        Value::Dict(d) => Ok(Value::Dict(Rc::new(d.dissoc(key)?))),
        other => Err(Error::runtime(format!(
            "dissoc not supported on {}",
            other.type_name()
        ))),
    }
}

/// Add `item` where it is cheapest: front of lists and seqs, end of
/// arrays, into sets and dicts.
pub fn conj(coll: &Value, item: Value) -> Result<Value> {
    match coll {
        Value::Nil => Ok(Value::list(vec![item])),
        Value::List(_)
        | Value::Cons(_)
        | Value::Range(_)
        | Value::Repeat(_)
        | Value::LazySeq(_) => Ok(Value::cons(item, coll.clone())),
        Value::Array(a) => {
            let mut items = a.items.to_vec();
            items.push(item);
            Ok(Value::Array(Rc::new(ArrayValue {
                items: Rc::from(items),
                meta: a.meta.clone(),
            })))
        }
        Value::Set(s) => Ok(Value::Set(Rc::new(s.conj(item)?))),
        Value::Dict(d) => match &item {
            Value::Dict(other) => Ok(Value::Dict(Rc::new(d.merge(other)?))),
            pair if pair.is_sequential() => match to_vec(pair)?.as_slice() {
                [k, v] => Ok(Value::Dict(Rc::new(d.assoc(k.clone(), v.clone())?))),
                _ => Err(Error::runtime("Dict entries must be [key value] pairs")),
            },
            other => Err(Error::runtime(format!(
                "Cannot conj a {} onto a dict",
                other.type_name()
            ))),
        },
        other => Err(Error::runtime(format!(
            "conj not supported on {}",
            other.type_name()
        ))),
    }
}

pub fn disj(coll: &Value, item: &Value) -> Result<Value> {
    match coll {
        Value::Nil => Ok(Value::Nil),
        Value::Set(s) => Ok(Value::Set(Rc::new(s.disj(item)?))),
        other => Err(Error::runtime(format!(
            "disj not supported on {}",
            other.type_name()
        ))),
    }
}

/// Build a dict from alternating keys and values
pub fn dict_of(kvs: &[Value]) -> Result<Value> {
    if kvs.len() % 2 != 0 {
        return Err(Error::runtime("dict requires an even number of arguments"));
    }
    let pairs = kvs.chunks(2).map(|kv| (kv[0].clone(), kv[1].clone()));
    Ok(Value::from(Dict::from_pairs(pairs)?))
}

pub fn set_of(items: &[Value]) -> Result<Value> {
    Ok(Value::from(HashSet::from_values(items.iter().cloned())?))
}

// ============================================================================
// Equality and Printing
// ============================================================================

/// Objects whose type implements the Equality protocol
pub fn has_custom_equality(value: &Value) -> bool {
    matches!(value, Value::Object(_)) && core_protocols().equality.satisfied(value)
}

/// Whether an object appears anywhere inside `value`
pub(crate) fn contains_object(value: &Value) -> Result<bool> {
    Ok(match value {
        Value::Object(_) => true,
        Value::Dict(d) => {
            for (k, v) in d.iter() {
                if contains_object(k)? || contains_object(v)? {
                    return Ok(true);
                }
            }
            false
        }
        Value::Set(s) => {
            for member in s.iter() {
                if contains_object(member)? {
                    return Ok(true);
                }
            }
            false
        }
        v if v.is_sequential() => {
            let mut found = false;
            let endless = walk(v, |item| {
                found = found || contains_object(item)?;
                Ok(())
            })?;
            match endless {
                Some(Value::Repeat(r)) => found || contains_object(&r.value)?,
                _ => found,
            }
        }
        _ => false,
    })
}

/// Value equality. Objects with an Equality implementation decide for
/// themselves; collections compare structurally using `equiv` on elements;
/// everything else compares by value.
pub fn equiv(a: &Value, b: &Value) -> Result<bool> {
    if a.identical(b) {
        return Ok(true);
    }
    match (a, b) {
        (Value::Object(_), _) if has_custom_equality(a) => Ok(core_protocols()
            .equality
            .invoke("-equiv", a, &[b.clone()])?
            .is_truthy()),
        (_, Value::Object(_)) if has_custom_equality(b) => Ok(core_protocols()
            .equality
            .invoke("-equiv", b, &[a.clone()])?
            .is_truthy()),
        (Value::Object(_), _) | (_, Value::Object(_)) => Ok(false),
        (Value::Dict(x), Value::Dict(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (k, v) in x.iter() {
                match y.get(k)? {
                    Some(other) if equiv(v, &other)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (Value::Set(x), Value::Set(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for member in x.iter() {
                if !y.contains(member)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (x, y) if x.is_sequential() && y.is_sequential() => sequential_eq(x, y, equiv),
        _ => Ok(a == b),
    }
}

/// Printed form of an object via the Repr protocol, if implemented
pub fn repr_object(value: &Value) -> Option<Result<String>> {
    let repr = &core_protocols().repr;
    if !repr.satisfied(value) {
        return None;
    }
    Some(
        repr.invoke("-repr", value, &[])
            .map(|printed| printed.to_display_string()),
    )
}

/// Readable printed form of any value
pub fn repr(value: &Value) -> Result<String> {
    match repr_object(value) {
        Some(printed) => printed,
        None => Ok(value.to_string()),
    }
}
