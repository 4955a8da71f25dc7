//! Module identities and the analysis input boundary
//!
//! The engine consumes a structured representation of a module: the
//! bindings its own source introduces and the import directives it makes.
//! Producing that representation from concrete syntax is the surrounding
//! system's job; `ModuleInput` is the contract at that boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name under which a module binds itself as a value in its own namespace
pub const MODULE_SELF_NAME: &str = "$module";

/// Interpreter/language-version context tag
///
/// Two contexts with the same name and version are the same context; a
/// module analyzed under one context is invisible to same-context lookups
/// from another unless the caller asks for a cross-context search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId {
    pub name: String,
    pub version: String,
}

impl ContextId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Stable module identity (moniker)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(moniker: impl Into<Arc<str>>) -> Self {
        Self(moniker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Literal shapes the seeding step can classify without a type system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Bool,
    None,
}

/// What a module-level name is bound to in source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    Literal(LiteralKind),
    Class,
    Function,
}

/// One module-level binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameBinding {
    pub name: String,
    pub kind: BindingKind,
}

impl NameBinding {
    pub fn new(name: impl Into<String>, kind: BindingKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One imported name: `source` in the imported module, bound as `target`
/// here. An empty `source` means the module's own as-a-value binding point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedName {
    pub source: String,
    pub target: String,
}

impl ImportedName {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// `import m` form: bind the module itself under `target`
    pub fn module_as_value(target: impl Into<String>) -> Self {
        Self {
            source: String::new(),
            target: target.into(),
        }
    }
}

/// The name set an import directive requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportNames {
    /// `from m import *` — every exported name
    Wildcard,
    Named(Vec<ImportedName>),
}

/// One import directive against another module's moniker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDirective {
    pub module: String,
    pub names: ImportNames,
}

impl ImportDirective {
    pub fn wildcard(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: ImportNames::Wildcard,
        }
    }

    pub fn named(module: impl Into<String>, names: Vec<ImportedName>) -> Self {
        Self {
            module: module.into(),
            names: ImportNames::Named(names),
        }
    }
}

/// Local alias: `target` takes whatever types `source` has
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDirective {
    pub source: String,
    pub target: String,
}

impl AliasDirective {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Structured per-module analysis input (the parsed-syntax boundary)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInput {
    pub bindings: Vec<NameBinding>,
    pub imports: Vec<ImportDirective>,
    pub aliases: Vec<AliasDirective>,
}

impl ModuleInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, kind: BindingKind) -> Self {
        self.bindings.push(NameBinding::new(name, kind));
        self
    }

    pub fn import(mut self, directive: ImportDirective) -> Self {
        self.imports.push(directive);
        self
    }

    pub fn alias(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push(AliasDirective::new(source, target));
        self
    }
}
