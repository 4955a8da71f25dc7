//! Seeding: structured module input to initial bindings and rules
//!
//! Runs once per (re)parse. Literal bindings get builtin types, class and
//! function bindings get nominal values qualified by the moniker, and the
//! module always binds itself under `$module` so `import m` has something
//! to resolve against. Directives become rules; the actual type flow is
//! the fixpoint driver's job.

use crate::module::{BindingKind, ImportNames, LiteralKind, ModuleInput, MODULE_SELF_NAME};
use crate::rule::AnalysisRule;
use crate::rules::{ImportFromModule, NameLookup};
use im::OrdMap;
use skiff_values::{builtins, TypeValue, Variable};
use std::sync::Arc;

fn literal_type(kind: LiteralKind) -> Arc<TypeValue> {
    match kind {
        LiteralKind::Int => builtins::int(),
        LiteralKind::Float => builtins::float(),
        LiteralKind::Str => builtins::str_(),
        LiteralKind::Bool => builtins::bool_(),
        LiteralKind::None => builtins::none(),
    }
}

/// Build the initial variable table and rule list for one module
pub fn build(
    moniker: &str,
    input: &ModuleInput,
) -> (OrdMap<Arc<str>, Variable>, Vec<Arc<dyn AnalysisRule>>) {
    let mut variables: OrdMap<Arc<str>, Variable> = OrdMap::new();

    let mut self_var = Variable::new(MODULE_SELF_NAME);
    self_var.add_type(TypeValue::module(moniker));
    variables.insert(Arc::from(MODULE_SELF_NAME), self_var);

    for binding in &input.bindings {
        let value = match &binding.kind {
            BindingKind::Literal(kind) => literal_type(*kind),
            BindingKind::Class => TypeValue::class(format!("{}.{}", moniker, binding.name)),
            BindingKind::Function => TypeValue::function(format!("{}.{}", moniker, binding.name)),
        };
        let name: Arc<str> = Arc::from(binding.name.as_str());
        match variables.get_mut(&name) {
            // Rebinding the same name widens its type set.
            Some(var) => {
                var.add_type(value);
            }
            None => {
                let mut var = Variable::new(binding.name.as_str());
                var.add_type(value);
                variables.insert(name, var);
            }
        }
    }

    let mut rules: Vec<Arc<dyn AnalysisRule>> = Vec::new();

    // Aliases first: intra-module facts settle before imports pull on them.
    for alias in &input.aliases {
        rules.push(Arc::new(NameLookup::new(
            alias.source.as_str(),
            [alias.target.as_str()],
        )));
    }

    for import in &input.imports {
        match &import.names {
            ImportNames::Wildcard => {
                rules.push(Arc::new(ImportFromModule::wildcard(import.module.as_str())));
            }
            ImportNames::Named(names) => {
                for name in names {
                    rules.push(Arc::new(ImportFromModule::new(
                        import.module.as_str(),
                        name.source.as_str(),
                        [name.target.as_str()],
                    )));
                }
            }
        }
    }

    (variables, rules)
}
