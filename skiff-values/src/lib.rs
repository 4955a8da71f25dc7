//! Skiff value model
//!
//! This crate defines the data model shared by the Skiff analysis engine:
//! immutable type descriptors, deduplicated type sets, and named variable
//! bindings. Values are immutable once constructed and are shared between
//! analysis states as `Arc<TypeValue>`.

pub mod builtins;
pub mod type_set;
pub mod type_value;
pub mod variable;

pub use type_set::TypeSet;
pub use type_value::{TypeKind, TypeValue, TypeValueBuilder};
pub use variable::Variable;
