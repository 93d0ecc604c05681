use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use num_bigint::BigInt as BigInteger;
use num_traits::{FromPrimitive, Num, ToPrimitive, Zero};

use crate::error::{Error, Result};

// ============================================================================
// Numeric Type System
// ============================================================================

#[derive(Debug, Clone)]
pub enum NumericType {
    /// Primary integer type - promotes to BigInt on overflow
    Int(i64),

    /// Arbitrary precision integer, only used when the value does not fit i64
    BigInt(Rc<BigInteger>),

    /// IEEE 754 double precision floating point
    Float(f64),
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NumericType::Int(n) => write!(f, "{n}"),
            NumericType::BigInt(n) => write!(f, "{n}N"),
            NumericType::Float(x) => {
                if x.is_nan() {
                    write!(f, "##NaN")
                } else if x.is_infinite() {
                    let sign = if *x > 0.0 { "##Inf" } else { "##-Inf" };
                    write!(f, "{sign}")
                } else {
                    // Debug keeps the trailing `.0` on integral floats
                    write!(f, "{x:?}")
                }
            }
        }
    }
}

// ============================================================================
// Equality and Comparison
// ============================================================================

impl PartialEq for NumericType {
    fn eq(&self, other: &Self) -> bool {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            (Float(a), Float(b)) => a == b,

            // BigInt never holds an i64-sized value, so these cannot match
            (Int(_), BigInt(_)) | (BigInt(_), Int(_)) => false,

            // A float equals an integer only when it denotes exactly that integer
            (Int(_) | BigInt(_), Float(x)) | (Float(x), Int(_) | BigInt(_)) => {
                let integer = if matches!(self, Float(_)) { other } else { self };
                match Float(*x).canonical() {
                    Float(_) => false,
                    exact => exact == *integer,
                }
            }
        }
    }
}

impl Eq for NumericType {}

impl Hash for NumericType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use NumericType::*;
        // Integral floats hash like the integer they equal
        match self.canonical() {
            Int(n) => n.hash(state),
            BigInt(n) => n.to_string().hash(state),
            Float(x) if x.is_nan() => u64::MAX.hash(state),
            Float(x) => x.to_bits().hash(state),
        }
    }
}

impl PartialOrd for NumericType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (BigInt(a), BigInt(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),

            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),

            (Int(a), BigInt(b)) => BigInteger::from(*a).partial_cmp(b),
            (BigInt(a), Int(b)) => a.as_ref().partial_cmp(&BigInteger::from(*b)),

            (BigInt(a), Float(b)) => a.to_f64().and_then(|a| a.partial_cmp(b)),
            (Float(a), BigInt(b)) => b.to_f64().and_then(|b| a.partial_cmp(&b)),
        }
    }
}

// ============================================================================
// Construction and Conversion
// ============================================================================

impl NumericType {
    /// Wrap a big integer, demoting to Int when it fits
    pub fn from_big(n: BigInteger) -> NumericType {
        match n.to_i64() {
            Some(small) => NumericType::Int(small),
            None => NumericType::BigInt(Rc::new(n)),
        }
    }

    /// Parse digits in the given radix, promoting to BigInt when the value
    /// overflows i64. Returns None for malformed digits.
    pub fn parse_integer(digits: &str, radix: u32, negative: bool) -> Option<NumericType> {
        if digits.is_empty() {
            return None;
        }
        if let Ok(n) = i64::from_str_radix(digits, radix) {
            return Some(NumericType::Int(if negative { -n } else { n }));
        }
        let big = BigInteger::from_str_radix(digits, radix).ok()?;
        Some(NumericType::from_big(if negative { -big } else { big }))
    }

    /// Convert to float (may lose precision)
    pub fn to_float(&self) -> f64 {
        match self {
            NumericType::Int(n) => *n as f64,
            NumericType::BigInt(n) => n.to_f64().unwrap_or(f64::INFINITY),
            NumericType::Float(x) => *x,
        }
    }

    /// Integral value as i64, if it has one
    /// Integral floats as the Int or BigInt they denote, everything else
    /// unchanged
    pub fn canonical(&self) -> NumericType {
        match self {
            NumericType::Float(x) if x.is_finite() && x.fract() == 0.0 => {
                match BigInteger::from_f64(*x) {
                    Some(n) => NumericType::from_big(n),
                    None => self.clone(),
                }
            }
            _ => self.clone(),
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            NumericType::Int(n) => Some(*n),
            NumericType::BigInt(_) => None,
            NumericType::Float(x) if x.fract() == 0.0 => x.to_i64(),
            NumericType::Float(_) => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            NumericType::Int(n) => *n == 0,
            NumericType::BigInt(n) => n.is_zero(),
            NumericType::Float(x) => *x == 0.0,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            NumericType::Int(n) => *n < 0,
            NumericType::BigInt(n) => n.as_ref() < &BigInteger::zero(),
            NumericType::Float(x) => *x < 0.0,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, NumericType::Float(_))
    }
}

// ============================================================================
// Arithmetic Operations
// ============================================================================

fn big(n: &NumericType) -> BigInteger {
    match n {
        NumericType::Int(n) => BigInteger::from(*n),
        NumericType::BigInt(n) => n.as_ref().clone(),
        // Callers only reach this for integer operands
        NumericType::Float(x) => BigInteger::from(*x as i64),
    }
}

impl NumericType {
    /// Addition with automatic type promotion
    pub fn add(&self, other: &NumericType) -> NumericType {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => match a.checked_add(*b) {
                Some(result) => Int(result),
                None => Self::from_big(BigInteger::from(*a) + BigInteger::from(*b)),
            },
            (Float(_), _) | (_, Float(_)) => Float(self.to_float() + other.to_float()),
            _ => Self::from_big(big(self) + big(other)),
        }
    }

    /// Subtraction with automatic type promotion
    pub fn sub(&self, other: &NumericType) -> NumericType {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => match a.checked_sub(*b) {
                Some(result) => Int(result),
                None => Self::from_big(BigInteger::from(*a) - BigInteger::from(*b)),
            },
            (Float(_), _) | (_, Float(_)) => Float(self.to_float() - other.to_float()),
            _ => Self::from_big(big(self) - big(other)),
        }
    }

    /// Multiplication with automatic type promotion
    pub fn mul(&self, other: &NumericType) -> NumericType {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => match a.checked_mul(*b) {
                Some(result) => Int(result),
                None => Self::from_big(BigInteger::from(*a) * BigInteger::from(*b)),
            },
            (Float(_), _) | (_, Float(_)) => Float(self.to_float() * other.to_float()),
            _ => Self::from_big(big(self) * big(other)),
        }
    }

    /// Division. Integers that divide evenly stay integers, anything else
    /// becomes a float.
    pub fn div(&self, other: &NumericType) -> Result<NumericType> {
        use NumericType::*;

        if other.is_zero() && other.is_integer() && self.is_integer() {
            return Err(Error::runtime("Divide by zero"));
        }

        match (self, other) {
            (Int(a), Int(b)) => match (a.checked_rem(*b), a.checked_div(*b)) {
                (Some(0), Some(q)) => Ok(Int(q)),
                (Some(_), _) => Ok(Float(*a as f64 / *b as f64)),
                // i64::MIN / -1
                _ => Ok(Self::from_big(BigInteger::from(*a) / BigInteger::from(*b))),
            },
            (Float(_), _) | (_, Float(_)) => Ok(Float(self.to_float() / other.to_float())),
            _ => {
                let (a, b) = (big(self), big(other));
                if (&a % &b).is_zero() {
                    Ok(Self::from_big(a / b))
                } else {
                    Ok(Float(self.to_float() / other.to_float()))
                }
            }
        }
    }

    /// Remainder with the sign of the dividend
    pub fn rem(&self, other: &NumericType) -> Result<NumericType> {
        use NumericType::*;

        if other.is_zero() && other.is_integer() && self.is_integer() {
            return Err(Error::runtime("Divide by zero"));
        }

        match (self, other) {
            (Int(a), Int(b)) => Ok(a.checked_rem(*b).map(Int).unwrap_or(Int(0))),
            (Float(_), _) | (_, Float(_)) => Ok(Float(self.to_float() % other.to_float())),
            _ => Ok(Self::from_big(big(self) % big(other))),
        }
    }

    pub fn neg(&self) -> NumericType {
        use NumericType::*;

        match self {
            Int(n) => match n.checked_neg() {
                Some(result) => Int(result),
                None => Self::from_big(-BigInteger::from(*n)),
            },
            BigInt(n) => Self::from_big(-n.as_ref()),
            Float(x) => Float(-x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic() {
        let a = NumericType::Int(5);
        let b = NumericType::Int(3);

        assert_eq!(a.add(&b), NumericType::Int(8));
        assert_eq!(a.sub(&b), NumericType::Int(2));
        assert_eq!(a.mul(&b), NumericType::Int(15));
    }

    #[test]
    fn test_int_overflow_promotes() {
        let result = NumericType::Int(i64::MAX).add(&NumericType::Int(1));
        assert!(matches!(result, NumericType::BigInt(_)));
        // and comes back down when it fits again
        assert_eq!(result.sub(&NumericType::Int(1)), NumericType::Int(i64::MAX));
    }

    #[test]
    fn test_division() {
        let six = NumericType::Int(6);
        assert_eq!(six.div(&NumericType::Int(2)).unwrap(), NumericType::Int(3));
        assert_eq!(
            NumericType::Int(5).div(&NumericType::Int(2)).unwrap(),
            NumericType::Float(2.5)
        );
        assert!(six.div(&NumericType::Int(0)).is_err());
        assert_eq!(
            NumericType::Float(1.0).div(&NumericType::Float(0.0)).unwrap(),
            NumericType::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_min_div_minus_one() {
        let result = NumericType::Int(i64::MIN)
            .div(&NumericType::Int(-1))
            .unwrap();
        assert!(matches!(result, NumericType::BigInt(_)));
    }

    #[test]
    fn test_cross_type_equality() {
        assert_eq!(NumericType::Int(5), NumericType::Float(5.0));
        assert_ne!(NumericType::Int(5), NumericType::Float(5.5));
    }

    #[test]
    fn test_display_keeps_float_marker() {
        assert_eq!(NumericType::Float(1.0).to_string(), "1.0");
        assert_eq!(NumericType::Int(1).to_string(), "1");
        assert_eq!(NumericType::Float(f64::NAN).to_string(), "##NaN");
    }

    #[test]
    fn test_parse_integer_radix_and_overflow() {
        assert_eq!(
            NumericType::parse_integer("ff", 16, false),
            Some(NumericType::Int(255))
        );
        assert_eq!(
            NumericType::parse_integer("101", 2, true),
            Some(NumericType::Int(-5))
        );
        assert!(matches!(
            NumericType::parse_integer("99999999999999999999", 10, false),
            Some(NumericType::BigInt(_))
        ));
        assert_eq!(NumericType::parse_integer("zz", 10, false), None);
    }

    #[test]
    fn test_ordering() {
        assert!(NumericType::Int(1) < NumericType::Float(1.5));
        assert!(NumericType::Float(2.5) > NumericType::Int(2));
    }

    #[test]
    fn test_float_equals_int_only_when_exact() {
        use std::collections::hash_map::DefaultHasher;
        let hash_of = |n: &NumericType| {
            let mut state = DefaultHasher::new();
            n.hash(&mut state);
            state.finish()
        };

        let two_pow_53 = 9_007_199_254_740_992i64;
        let rounded = NumericType::Float(two_pow_53 as f64);
        assert_ne!(NumericType::Int(two_pow_53 + 1), rounded);
        assert_eq!(NumericType::Int(two_pow_53), rounded);
        assert_eq!(hash_of(&NumericType::Int(two_pow_53)), hash_of(&rounded));

        // 2^63 is just past i64::MAX
        let big = NumericType::Float(9_223_372_036_854_775_808.0);
        assert_ne!(NumericType::Int(i64::MAX), big);
        let exact = NumericType::parse_integer("9223372036854775808", 10, false).unwrap();
        assert_eq!(exact, big);
        assert_eq!(hash_of(&exact), hash_of(&big));

        assert_eq!(NumericType::Float(-0.0), NumericType::Int(0));
        assert_ne!(NumericType::Float(2.5), NumericType::Int(2));
    }
}
