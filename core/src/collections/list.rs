use std::rc::Rc;

use super::Dict;
use crate::language::Value;

/// An immutable list backed by a shared slice. `rest` is O(1): it shares
/// the slice and advances the offset.
#[derive(Debug, Clone)]
pub struct List {
    items: Rc<[Value]>,
    offset: usize,
    pub meta: Option<Dict>,
}

impl List {
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        List {
            items: Rc::from(items),
            offset: 0,
            meta: None,
        }
    }

    /// A list view over an existing shared slice
    pub fn from_shared(items: Rc<[Value]>, offset: usize) -> Self {
        List {
            items,
            offset,
            meta: None,
        }
    }

    pub(crate) fn parts(&self) -> (Rc<[Value]>, usize) {
        (self.items.clone(), self.offset)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items[self.offset.min(self.items.len())..]
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn first(&self) -> Option<&Value> {
        self.as_slice().first()
    }

    /// Everything after the head, or None when fewer than two items remain
    pub fn rest(&self) -> Option<List> {
        if self.len() < 2 {
            return None;
        }
        Some(List::from_shared(self.items.clone(), self.offset + 1))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.as_slice().iter()
    }

    /// The same elements carrying `meta`; storage is shared
    pub fn with_meta(&self, meta: Option<Dict>) -> List {
        List {
            items: self.items.clone(),
            offset: self.offset,
            meta,
        }
    }
}

/// A pair of a head and any sequence (or nil) as tail
#[derive(Debug, Clone)]
pub struct Cons {
    pub head: Value,
    pub tail: Value,
    pub meta: Option<Dict>,
}

impl Cons {
    pub fn new(head: Value, tail: Value) -> Self {
        Cons {
            head,
            tail,
            meta: None,
        }
    }
}
