use im::HashMap as ImHashMap;

use crate::abstractions;
use crate::error::Result;
use crate::language::Value;

/// Persistent hash map.
///
/// Keys are found by built-in hashing first. Objects may define their own
/// equality through the Equality protocol, which built-in hashing cannot
/// see, so when either side of a lookup has an object anywhere inside it
/// the entries are also scanned with `equiv`. A dict never holds two
/// equivalent keys.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: ImHashMap<Value, Value>,
    object_keys: usize,
    meta: Option<Box<Dict>>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Dict>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut dict = Dict::new();
        for (k, v) in pairs {
            dict = dict.assoc(k, v)?;
        }
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Lookup by built-in equality only
    pub fn get_builtin(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The stored key equivalent to `key`, if any
    pub fn find_key(&self, key: &Value) -> Result<Option<Value>> {
        if self.entries.contains_key(key) {
            return Ok(Some(key.clone()));
        }
        let key_has_objects = abstractions::contains_object(key)?;
        if !key_has_objects && self.object_keys == 0 {
            return Ok(None);
        }
        for candidate in self.entries.keys() {
            if !key_has_objects && !abstractions::contains_object(candidate)? {
                continue;
            }
            if abstractions::equiv(candidate, key)? {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        if let Some(v) = self.entries.get(key) {
            return Ok(Some(v.clone()));
        }
        Ok(self
            .find_key(key)?
            .and_then(|k| self.entries.get(&k).cloned()))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool> {
        Ok(self.find_key(key)?.is_some())
    }

    /// A new dict with `key` mapped to `value`. An equivalent existing key
    /// keeps its identity and only the value is replaced.
    pub fn assoc(&self, key: Value, value: Value) -> Result<Dict> {
        let mut next = self.clone();
        match self.find_key(&key)? {
            Some(existing) => {
                next.entries.insert(existing, value);
            }
            None => {
                if abstractions::contains_object(&key)? {
                    next.object_keys += 1;
                }
                next.entries.insert(key, value);
            }
        }
        Ok(next)
    }

    pub fn dissoc(&self, key: &Value) -> Result<Dict> {
        let mut next = self.clone();
        if let Some(existing) = self.find_key(key)? {
            if abstractions::contains_object(&existing)? {
                next.object_keys -= 1;
            }
            next.entries.remove(&existing);
        }
        Ok(next)
    }

    /// Entries of `other` win over entries of `self`
    pub fn merge(&self, other: &Dict) -> Result<Dict> {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged = merged.assoc(k.clone(), v.clone())?;
        }
        Ok(merged)
    }

    pub fn meta(&self) -> Option<&Dict> {
        self.meta.as_deref()
    }

    pub fn with_meta(&self, meta: Option<Dict>) -> Dict {
        Dict {
            meta: meta.map(Box::new),
            ..self.clone()
        }
    }
}
