use im::HashMap as ImHashMap;

use super::Dict;
use crate::abstractions;
use crate::error::Result;
use crate::hash;
use crate::language::Value;

/// Persistent hash set.
///
/// Elements are bucketed by their protocol-aware hash code; inside a bucket
/// membership is identity or `equiv`. This makes sets respect Equality and
/// Hashable implementations on objects.
#[derive(Debug, Clone, Default)]
pub struct HashSet {
    buckets: ImHashMap<u32, Vec<Value>>,
    count: usize,
    meta: Option<Box<Dict>>,
}

impl HashSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I>(values: I) -> Result<HashSet>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut set = HashSet::new();
        for v in values {
            set = set.conj(v)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    fn position(bucket: &[Value], value: &Value) -> Result<Option<usize>> {
        for (i, member) in bucket.iter().enumerate() {
            if member.identical(value) || abstractions::equiv(member, value)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// The stored element equivalent to `value`
    pub fn find(&self, value: &Value) -> Result<Option<Value>> {
        let code = hash::hash_code(value)?;
        match self.buckets.get(&code) {
            Some(bucket) => Ok(Self::position(bucket, value)?.map(|i| bucket[i].clone())),
            None => Ok(None),
        }
    }

    pub fn contains(&self, value: &Value) -> Result<bool> {
        Ok(self.find(value)?.is_some())
    }

    /// Membership by built-in equality, without protocol dispatch
    pub fn contains_builtin(&self, value: &Value) -> bool {
        self.iter().any(|member| member == value)
    }

    pub fn conj(&self, value: Value) -> Result<HashSet> {
        let code = hash::hash_code(&value)?;
        let mut next = self.clone();
        let bucket = next.buckets.entry(code).or_default();
        if Self::position(bucket, &value)?.is_none() {
            bucket.push(value);
            next.count += 1;
        }
        Ok(next)
    }

    pub fn disj(&self, value: &Value) -> Result<HashSet> {
        let code = hash::hash_code(value)?;
        let Some(bucket) = self.buckets.get(&code) else {
            return Ok(self.clone());
        };
        let Some(i) = Self::position(bucket, value)? else {
            return Ok(self.clone());
        };
        let mut next = self.clone();
        let mut remaining = bucket.clone();
        remaining.remove(i);
        if remaining.is_empty() {
            next.buckets.remove(&code);
        } else {
            next.buckets.insert(code, remaining);
        }
        next.count -= 1;
        Ok(next)
    }

    pub fn meta(&self) -> Option<&Dict> {
        self.meta.as_deref()
    }

    pub fn with_meta(&self, meta: Option<Dict>) -> HashSet {
        HashSet {
            meta: meta.map(Box::new),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conj_dedupes() {
        let s = HashSet::from_values(vec![Value::from(1), Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.contains(&Value::from(2)).unwrap());
        assert!(!s.contains(&Value::from(3)).unwrap());
    }

    #[test]
    fn test_disj() {
        let s = HashSet::from_values(vec![Value::from("a"), Value::from("b")]).unwrap();
        let s2 = s.disj(&Value::from("a")).unwrap();
        assert_eq!(s2.len(), 1);
        assert!(!s2.contains(&Value::from("a")).unwrap());
        assert_eq!(s.len(), 2);
        // removing an absent element is a no-op
        assert_eq!(s2.disj(&Value::from("zzz")).unwrap().len(), 1);
    }

    #[test]
    fn test_sequential_members_compare_by_content() {
        let s = HashSet::from_values(vec![Value::list(vec![Value::from(1)])]).unwrap();
        assert!(s.contains(&Value::array(vec![Value::from(1)])).unwrap());
    }
}
