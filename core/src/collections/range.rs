use crate::language::Value;
use crate::numeric::NumericType;

/// Arithmetic progression from `from` towards `to` (exclusive). With no
/// `to` the range never ends; a zero step repeats `from` forever.
#[derive(Debug, Clone)]
pub struct Range {
    pub from: NumericType,
    pub to: Option<NumericType>,
    pub step: NumericType,
}

impl Range {
    pub fn new(from: NumericType, to: Option<NumericType>, step: NumericType) -> Self {
        Range { from, to, step }
    }

    pub fn is_infinite(&self) -> bool {
        self.to.is_none() || (self.step.is_zero() && !self.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        match &self.to {
            None => false,
            Some(to) => {
                if self.step.is_negative() {
                    self.from <= *to
                } else if self.step.is_zero() {
                    self.from == *to
                } else {
                    self.from >= *to
                }
            }
        }
    }

    pub fn first(&self) -> Option<Value> {
        if self.is_empty() {
            None
        } else {
            Some(Value::Number(self.from.clone()))
        }
    }

    pub fn rest(&self) -> Option<Range> {
        let next = Range {
            from: self.from.add(&self.step),
            to: self.to.clone(),
            step: self.step.clone(),
        };
        if self.is_empty() || next.is_empty() {
            None
        } else {
            Some(next)
        }
    }

    /// Number of elements, None when unbounded
    pub fn count(&self) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }
        if self.is_infinite() {
            return None;
        }
        let to = self.to.as_ref()?;
        let span = to.sub(&self.from).to_float() / self.step.to_float();
        Some(span.ceil().max(0.0) as usize)
    }
}

/// A value repeated `count` times, or forever
#[derive(Debug, Clone)]
pub struct Repeat {
    pub value: Value,
    pub count: Option<usize>,
}

impl Repeat {
    pub fn new(value: Value, count: Option<usize>) -> Self {
        Repeat { value, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == Some(0)
    }

    pub fn rest(&self) -> Option<Repeat> {
        match self.count {
            None => Some(self.clone()),
            Some(n) if n > 1 => Some(Repeat::new(self.value.clone(), Some(n - 1))),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> NumericType {
        NumericType::Int(n)
    }

    #[test]
    fn test_range_walk() {
        let r = Range::new(int(0), Some(int(3)), int(1));
        assert_eq!(r.count(), Some(3));
        let r2 = r.rest().unwrap().rest().unwrap();
        assert_eq!(r2.first(), Some(Value::from(2)));
        assert!(r2.rest().is_none());
    }

    #[test]
    fn test_negative_step() {
        let r = Range::new(int(3), Some(int(0)), int(-1));
        assert_eq!(r.count(), Some(3));
        assert_eq!(r.first(), Some(Value::from(3)));
    }

    #[test]
    fn test_empty_range() {
        let r = Range::new(int(5), Some(int(5)), int(1));
        assert!(r.is_empty());
        assert_eq!(r.first(), None);
        assert_eq!(r.count(), Some(0));
    }

    #[test]
    fn test_float_step_count() {
        let r = Range::new(int(0), Some(int(1)), NumericType::Float(0.25));
        assert_eq!(r.count(), Some(4));
    }

    #[test]
    fn test_infinite_range() {
        let r = Range::new(int(0), None, int(1));
        assert!(r.is_infinite());
        assert_eq!(r.count(), None);
    }

    #[test]
    fn test_repeat() {
        let r = Repeat::new(Value::from("x"), Some(2));
        let tail = r.rest().unwrap();
        assert_eq!(tail.count, Some(1));
        assert!(tail.rest().is_none());
        assert!(Repeat::new(Value::Nil, Some(0)).is_empty());
    }
}
