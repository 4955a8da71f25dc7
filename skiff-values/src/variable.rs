//! Named variable bindings
//!
//! A `Variable` is a name plus the set of types currently believed possible
//! for it. The set only grows through `add_type`/`add_types`; replacing a
//! variable wholesale is the owning analysis state's job during a re-seed.

use crate::type_set::TypeSet;
use crate::type_value::TypeValue;
use std::fmt;
use std::sync::Arc;

/// A name bound to a set of possible types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: Arc<str>,
    types: TypeSet,
}

impl Variable {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            types: TypeSet::new(),
        }
    }

    pub fn with_types(name: impl Into<Arc<str>>, types: TypeSet) -> Self {
        Self {
            name: name.into(),
            types,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &TypeSet {
        &self.types
    }

    /// Add one possible type; returns true if the binding grew
    pub fn add_type(&mut self, value: Arc<TypeValue>) -> bool {
        self.types.insert(value)
    }

    /// Union a set of possible types in; returns true if the binding grew
    pub fn add_types(&mut self, types: &TypeSet) -> bool {
        self.types.union_with(types)
    }

    /// Annotation form, e.g. `x = {int, str}`
    pub fn to_annotation_string(&self) -> String {
        format!("{} = {}", self.name, self.types.to_annotation())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_annotation_string())
    }
}
