//! Value hashing.
//!
//! Murmur3-style mixing over 32-bit codes. Ordered collections combine
//! element codes positionally, unordered ones by sum, so that a list and an
//! array with the same elements hash alike and dict/set hashes do not depend
//! on iteration order.
//!
//! [`builtin_hash`] never dispatches and treats objects by identity; it
//! backs `std::hash::Hash`. [`hash_code`] consults the Hashable protocol for
//! objects and is what sets and `hash` use.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::abstractions;
use crate::error::{Error, Result};
use crate::language::Value;
use crate::numeric::NumericType;
use crate::protocol;

const SEED: u32 = 0;
const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

fn mix_k1(mut k1: u32) -> u32 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(15);
    k1.wrapping_mul(C2)
}

fn mix_h1(mut h1: u32, k1: u32) -> u32 {
    h1 ^= k1;
    h1 = h1.rotate_left(13);
    h1.wrapping_mul(5).wrapping_add(0xe654_6b64)
}

fn fmix(mut h1: u32, length: u32) -> u32 {
    h1 ^= length;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^ (h1 >> 16)
}

pub fn hash_long(input: i64) -> u32 {
    if input == 0 {
        return 0;
    }
    let low = input as u32;
    let high = (input >> 32) as u32;
    let mut h1 = mix_h1(SEED, mix_k1(low));
    h1 = mix_h1(h1, mix_k1(high));
    fmix(h1, 8)
}

pub fn hash_str(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut h1 = SEED;
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h1 = mix_h1(h1, mix_k1(k1));
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, b) in tail.iter().enumerate() {
            k1 |= (*b as u32) << (8 * i);
        }
        h1 ^= mix_k1(k1);
    }
    fmix(h1, bytes.len() as u32)
}

fn mix_coll_hash(hash: u32, count: u32) -> u32 {
    fmix(mix_h1(SEED, mix_k1(hash)), count)
}

pub fn hash_ordered<I: IntoIterator<Item = u32>>(codes: I) -> u32 {
    let mut n = 0u32;
    let mut hash = 1u32;
    for code in codes {
        hash = hash.wrapping_mul(31).wrapping_add(code);
        n = n.wrapping_add(1);
    }
    mix_coll_hash(hash, n)
}

pub fn hash_unordered<I: IntoIterator<Item = u32>>(codes: I) -> u32 {
    let mut n = 0u32;
    let mut hash = 0u32;
    for code in codes {
        hash = hash.wrapping_add(code);
        n = n.wrapping_add(1);
    }
    mix_coll_hash(hash, n)
}

fn hash_number(n: &NumericType) -> u32 {
    match n.canonical() {
        NumericType::Int(i) => hash_long(i),
        NumericType::BigInt(b) => hash_str(&b.to_string()),
        NumericType::Float(x) => hash_long(x.to_bits() as i64),
    }
}

fn hash_ptr<T: ?Sized>(rc: &Rc<T>) -> u32 {
    hash_long(Rc::as_ptr(rc) as *const u8 as usize as i64)
}

#[derive(Clone, Copy)]
enum Mode {
    Builtin,
    Protocol,
}

fn hash_with(value: &Value, mode: Mode) -> Result<u32> {
    Ok(match value {
        Value::Nil => 0,
        Value::Bool(true) => 1231,
        Value::Bool(false) => 1237,
        Value::Number(n) => hash_number(n),
        Value::String(s) => hash_str(s),
        Value::Keyword(k) => k.with_name(hash_str).wrapping_add(0x9e37_79b9),
        Value::Symbol(s) => hash_str(&s.to_string()) ^ 0x5bd1_e995,
        Value::QName(q) => hash_str(&q.uri).wrapping_add(0x2545_f491),
        Value::PrefixName(p) => hash_ordered([hash_str(&p.prefix), hash_str(&p.suffix)]),
        Value::QSym(q) => hash_str(&q.uri) ^ 0x7f4a_7c15,
        Value::Regex(r) => hash_str(&r.source),
        v if v.is_sequential() => {
            let mut codes = Vec::new();
            let endless = abstractions::walk(v, |item| {
                codes.push(hash_with(item, mode)?);
                Ok(())
            })?;
            match endless {
                Some(Value::Range(r)) => codes.push(hash_ptr(&r)),
                Some(Value::Repeat(r)) => codes.push(hash_ptr(&r)),
                _ => {}
            }
            hash_ordered(codes)
        }
        Value::Dict(d) => {
            let mut codes = Vec::with_capacity(d.len());
            for (k, v) in d.iter() {
                codes.push(hash_ordered([hash_with(k, mode)?, hash_with(v, mode)?]));
            }
            hash_unordered(codes)
        }
        Value::Set(s) => {
            let mut codes = Vec::with_capacity(s.len());
            for member in s.iter() {
                codes.push(hash_with(member, mode)?);
            }
            hash_unordered(codes)
        }
        Value::Object(o) => match mode {
            Mode::Builtin => hash_long(o.id as i64),
            Mode::Protocol => hash_object(value)?,
        },
        Value::Fn(f) => hash_ptr(f),
        Value::Var(v) => hash_long(v.id() as i64),
        Value::Type(t) => hash_long(t.id as i64),
        Value::Protocol(p) => hash_long(p.id() as i64),
        Value::Promise(p) => hash_ptr(p),
        // Sequential kinds are handled above
        Value::List(_)
        | Value::Cons(_)
        | Value::Array(_)
        | Value::Range(_)
        | Value::Repeat(_)
        | Value::LazySeq(_) => 0,
    })
}

fn hash_object(value: &Value) -> Result<u32> {
    let core = protocol::core_protocols();
    if !core.hashable.satisfied(value) {
        return Ok(hash_str(&value.type_name()));
    }
    match core.hashable.invoke("-hash-code", value, &[])? {
        Value::Number(n) => match n.to_i64() {
            Some(i) => Ok(i as u32),
            None => Ok(hash_number(&n)),
        },
        other => Err(Error::assertion(format!(
            "-hash-code must return a number, got {}",
            other.type_name()
        ))),
    }
}

/// Structural hash without protocol dispatch
pub fn builtin_hash(value: &Value) -> u32 {
    // Only lazy realization can fail; such values then share a code.
    // Walking an infinite lazy seq does not terminate.
    hash_with(value, Mode::Builtin).unwrap_or(0)
}

/// Hash honouring Hashable implementations on objects
pub fn hash_code(value: &Value) -> Result<u32> {
    hash_with(value, Mode::Protocol)
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(builtin_hash(self));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_hash_across_types() {
        assert_eq!(builtin_hash(&Value::from(3)), builtin_hash(&Value::from(3.0)));
        assert_ne!(builtin_hash(&Value::from(3)), builtin_hash(&Value::from(3.5)));
    }

    #[test]
    fn test_sequential_kinds_hash_alike() {
        let items = vec![Value::from(1), Value::from("a")];
        assert_eq!(
            builtin_hash(&Value::list(items.clone())),
            builtin_hash(&Value::array(items))
        );
    }

    #[test]
    fn test_keyword_and_string_differ() {
        assert_ne!(
            builtin_hash(&Value::keyword("a")),
            builtin_hash(&Value::from("a"))
        );
    }

    #[test]
    fn test_unordered_is_order_independent() {
        assert_eq!(hash_unordered([1, 2, 3]), hash_unordered([3, 1, 2]));
        assert_ne!(hash_ordered([1, 2, 3]), hash_ordered([3, 1, 2]));
    }

    #[test]
    fn test_str_tail_bytes_matter() {
        assert_ne!(hash_str("abcde"), hash_str("abcdf"));
        assert_eq!(hash_str(""), fmix(SEED, 0));
    }
}
