//! Concrete analysis rules

pub mod import_from;
pub mod name_lookup;

pub use import_from::ImportFromModule;
pub use name_lookup::NameLookup;
