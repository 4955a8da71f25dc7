//! Immutable runtime type descriptors
//!
//! A `TypeValue` describes one possible runtime type or shape a name can
//! hold: an instance of a class, a function, a module, or a builtin. Values
//! compare by identity `(kind, name)` so that many variables can share the
//! same descriptor without synchronization.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Kind of runtime type, as a closed variant set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeKind {
    /// A class object itself
    Class,
    /// A callable function
    Function,
    /// A module used as a value
    Module,
    /// An instance of a class
    Instance,
    /// A builtin scalar type (int, str, ...)
    Builtin,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Class => "class",
            TypeKind::Function => "function",
            TypeKind::Module => "module",
            TypeKind::Instance => "instance",
            TypeKind::Builtin => "builtin",
        };
        write!(f, "{}", s)
    }
}

/// An immutable descriptor of one possible runtime type
///
/// Identity (and therefore equality, hashing, and ordering) is the
/// `(kind, name)` pair. The member map is auxiliary data carried by the
/// value and does not participate in identity.
#[derive(Debug, Clone)]
pub struct TypeValue {
    kind: TypeKind,
    name: Arc<str>,
    members: BTreeMap<Arc<str>, Arc<TypeValue>>,
}

impl TypeValue {
    /// Create a value with no members
    pub fn new(kind: TypeKind, name: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Shorthand for a builtin type descriptor
    pub fn builtin(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self::new(TypeKind::Builtin, name))
    }

    /// Shorthand for a class descriptor
    pub fn class(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self::new(TypeKind::Class, name))
    }

    /// Shorthand for a function descriptor
    pub fn function(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self::new(TypeKind::Function, name))
    }

    /// Shorthand for a module-as-a-value descriptor
    pub fn module(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self::new(TypeKind::Module, name))
    }

    /// Shorthand for a class-instance descriptor
    pub fn instance(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self::new(TypeKind::Instance, name))
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a member by name
    pub fn member(&self, name: &str) -> Option<&Arc<TypeValue>> {
        self.members.get(name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&Arc<str>, &Arc<TypeValue>)> {
        self.members.iter()
    }

    /// Annotation form used in dumps and hover text, e.g. `int` or `module m`
    pub fn to_annotation(&self) -> String {
        match self.kind {
            TypeKind::Builtin | TypeKind::Instance => self.name.to_string(),
            _ => format!("{} {}", self.kind, self.name),
        }
    }
}

impl PartialEq for TypeValue {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for TypeValue {}

impl Hash for TypeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for TypeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for TypeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_annotation())
    }
}

/// Builder for type values that carry members
///
/// Members are merged with first-writer-wins semantics unless `overwrite`
/// is requested.
#[derive(Debug)]
pub struct TypeValueBuilder {
    kind: TypeKind,
    name: Arc<str>,
    members: BTreeMap<Arc<str>, Arc<TypeValue>>,
}

impl TypeValueBuilder {
    pub fn new(kind: TypeKind, name: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Add a single member; an existing entry wins
    pub fn add_member(mut self, name: impl Into<Arc<str>>, value: Arc<TypeValue>) -> Self {
        self.members.entry(name.into()).or_insert(value);
        self
    }

    /// Merge a batch of members
    ///
    /// With `overwrite` set, incoming entries replace existing ones;
    /// otherwise the first writer wins.
    pub fn add_members<I>(mut self, entries: I, overwrite: bool) -> Self
    where
        I: IntoIterator<Item = (Arc<str>, Arc<TypeValue>)>,
    {
        for (name, value) in entries {
            if overwrite {
                self.members.insert(name, value);
            } else {
                self.members.entry(name).or_insert(value);
            }
        }
        self
    }

    pub fn build(self) -> Arc<TypeValue> {
        Arc::new(TypeValue {
            kind: self.kind,
            name: self.name,
            members: self.members,
        })
    }
}
