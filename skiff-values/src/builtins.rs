//! Builtin type descriptors
//!
//! Shared descriptors for the scalar types every analyzed module can
//! produce from literals. Constructed once and shared by reference.

use crate::type_value::TypeValue;
use once_cell::sync::Lazy;
use std::sync::Arc;

static INT: Lazy<Arc<TypeValue>> = Lazy::new(|| TypeValue::builtin("int"));
static FLOAT: Lazy<Arc<TypeValue>> = Lazy::new(|| TypeValue::builtin("float"));
static STR: Lazy<Arc<TypeValue>> = Lazy::new(|| TypeValue::builtin("str"));
static BOOL: Lazy<Arc<TypeValue>> = Lazy::new(|| TypeValue::builtin("bool"));
static NONE: Lazy<Arc<TypeValue>> = Lazy::new(|| TypeValue::builtin("none"));

pub fn int() -> Arc<TypeValue> {
    INT.clone()
}

pub fn float() -> Arc<TypeValue> {
    FLOAT.clone()
}

/// The builtin string type (named `str_` to avoid the keyword-adjacent `str`)
pub fn str_() -> Arc<TypeValue> {
    STR.clone()
}

pub fn bool_() -> Arc<TypeValue> {
    BOOL.clone()
}

pub fn none() -> Arc<TypeValue> {
    NONE.clone()
}
