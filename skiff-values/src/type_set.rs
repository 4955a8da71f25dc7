//! Deduplicated sets of type values
//!
//! Backed by `im::OrdSet` so that snapshots of an analysis state can clone
//! the whole set cheaply. Ordering is the descriptor ordering, which keeps
//! annotation output deterministic.

use crate::type_value::TypeValue;
use im::OrdSet;
use std::fmt;
use std::sync::Arc;

/// A deduplicated, deterministically ordered set of possible types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet {
    values: OrdSet<Arc<TypeValue>>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set holding a single value
    pub fn single(value: Arc<TypeValue>) -> Self {
        let mut set = Self::new();
        set.insert(value);
        set
    }

    /// Insert one value; returns true if the set grew
    pub fn insert(&mut self, value: Arc<TypeValue>) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.insert(value);
        true
    }

    /// Union another set into this one; returns true if anything was added
    pub fn union_with(&mut self, other: &TypeSet) -> bool {
        let mut changed = false;
        for value in other.values.iter() {
            if !self.values.contains(value) {
                self.values.insert(value.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn contains(&self, value: &TypeValue) -> bool {
        self.values.iter().any(|v| v.as_ref() == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeValue>> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check whether this set contains every value of `other`
    pub fn is_superset_of(&self, other: &TypeSet) -> bool {
        other.values.iter().all(|v| self.values.contains(v))
    }

    /// Annotation form, e.g. `{int, str}`
    pub fn to_annotation(&self) -> String {
        let inner: Vec<String> = self.values.iter().map(|v| v.to_annotation()).collect();
        format!("{{{}}}", inner.join(", "))
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_annotation())
    }
}

impl FromIterator<Arc<TypeValue>> for TypeSet {
    fn from_iter<I: IntoIterator<Item = Arc<TypeValue>>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}
