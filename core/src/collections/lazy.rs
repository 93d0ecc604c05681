use std::cell::RefCell;

use once_cell::unsync::OnceCell;

use crate::abstractions;
use crate::error::{Error, Result};
use crate::language::Value;

/// A sequence produced on demand by a zero-argument function. The thunk
/// runs once; its result is normalised to a seq (or nil) and cached.
#[derive(Debug)]
pub struct LazySeq {
    thunk: RefCell<Option<Value>>,
    realized: OnceCell<Value>,
}

impl LazySeq {
    pub fn new(thunk: Value) -> Self {
        LazySeq {
            thunk: RefCell::new(Some(thunk)),
            realized: OnceCell::new(),
        }
    }

    pub fn is_realized(&self) -> bool {
        self.realized.get().is_some()
    }

    /// The realized seq, or nil when the thunk produced an empty sequence
    pub fn realize(&self) -> Result<Value> {
        if let Some(v) = self.realized.get() {
            return Ok(v.clone());
        }
        let thunk = self
            .thunk
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::runtime("Lazy sequence realized while realizing itself"))?;
        let produced = match thunk.call(&[]) {
            Ok(v) => v,
            Err(e) => {
                // Leave the thunk in place so a later attempt can retry
                *self.thunk.borrow_mut() = Some(thunk);
                return Err(e);
            }
        };
        let normalized = abstractions::seq(&produced)?.unwrap_or(Value::Nil);
        Ok(self.realized.get_or_init(|| normalized).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_realizes_once() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let lazy = LazySeq::new(Value::closure("thunk", move |_| {
            c.set(c.get() + 1);
            Ok(Value::list(vec![Value::from(1)]))
        }));
        assert!(!lazy.is_realized());
        lazy.realize().unwrap();
        lazy.realize().unwrap();
        assert_eq!(calls.get(), 1);
        assert!(lazy.is_realized());
    }

    #[test]
    fn test_empty_result_is_nil() {
        let lazy = LazySeq::new(Value::closure("thunk", |_| Ok(Value::list(vec![]))));
        assert_eq!(lazy.realize().unwrap(), Value::Nil);
    }

    #[test]
    fn test_failure_propagates() {
        let lazy = LazySeq::new(Value::closure("thunk", |_| Err(Error::runtime("nope"))));
        assert!(lazy.realize().is_err());
        assert!(!lazy.is_realized());
    }
}
