//! Module source loader
//!
//! Reads the line-oriented module description format into the analyzer's
//! structured input. One declaration per line:
//!
//! ```text
//! x = 1                     integer binding
//! s = "text"                string binding
//! ok = true                 boolean binding
//! n = none                  none binding
//! class C                   class binding
//! fn f                      function binding
//! import m                  bind module m as a value
//! from m import a as b      bind m.a under b (`as b` optional)
//! from m import *           bind every exported name
//! alias y = x               y takes whatever types x has
//! ```
//!
//! Blank lines and `#` comments are skipped. The module's moniker is the
//! file stem.

use anyhow::{bail, Context, Result};
use skiff_analyzer::{BindingKind, ImportDirective, ImportedName, LiteralKind, ModuleInput};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension recognized by the directory loader
pub const MODULE_EXTENSION: &str = "skf";

/// A module description read from disk
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub moniker: String,
    pub path: PathBuf,
    pub input: ModuleInput,
}

fn classify_literal(raw: &str) -> Option<LiteralKind> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(LiteralKind::Str);
    }
    match raw {
        "true" | "false" => return Some(LiteralKind::Bool),
        "none" | "None" => return Some(LiteralKind::None),
        _ => {}
    }
    if raw.parse::<i64>().is_ok() {
        return Some(LiteralKind::Int);
    }
    if raw.parse::<f64>().is_ok() {
        return Some(LiteralKind::Float);
    }
    None
}

fn parse_import_names(raw: &str) -> Result<Vec<ImportedName>> {
    let mut names = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            bail!("empty name in import list `{raw}`");
        }
        match part.split_once(" as ") {
            Some((source, target)) => {
                names.push(ImportedName::new(source.trim(), target.trim()));
            }
            None => names.push(ImportedName::new(part, part)),
        }
    }
    Ok(names)
}

fn parse_line(line: &str, input: &mut ModuleInput) -> Result<()> {
    if let Some(rest) = line.strip_prefix("class ") {
        input.bindings.push(skiff_analyzer::NameBinding::new(
            rest.trim(),
            BindingKind::Class,
        ));
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("fn ") {
        input.bindings.push(skiff_analyzer::NameBinding::new(
            rest.trim(),
            BindingKind::Function,
        ));
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("alias ") {
        let Some((target, source)) = rest.split_once('=') else {
            bail!("alias needs the form `alias y = x`, got `{line}`");
        };
        input
            .aliases
            .push(skiff_analyzer::AliasDirective::new(
                source.trim(),
                target.trim(),
            ));
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("from ") {
        let Some((module, names)) = rest.split_once(" import ") else {
            bail!("import needs the form `from m import a`, got `{line}`");
        };
        let module = module.trim();
        let names = names.trim();
        if names == "*" {
            input.imports.push(ImportDirective::wildcard(module));
        } else {
            input
                .imports
                .push(ImportDirective::named(module, parse_import_names(names)?));
        }
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("import ") {
        let target = rest.trim();
        input.imports.push(ImportDirective::named(
            target,
            vec![ImportedName::module_as_value(target)],
        ));
        return Ok(());
    }
    if let Some((name, value)) = line.split_once('=') {
        let name = name.trim();
        let value = value.trim();
        let Some(kind) = classify_literal(value) else {
            bail!("cannot classify literal `{value}` for `{name}`");
        };
        input
            .bindings
            .push(skiff_analyzer::NameBinding::new(name, BindingKind::Literal(kind)));
        return Ok(());
    }
    bail!("unrecognized declaration `{line}`")
}

/// Parse one module description
pub fn parse_module(source: &str) -> Result<ModuleInput> {
    let mut input = ModuleInput::new();
    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parse_line(line, &mut input).with_context(|| format!("line {}", index + 1))?;
    }
    Ok(input)
}

/// Load one module file; the moniker is the file stem
pub fn load_file(path: &Path) -> Result<LoadedModule> {
    let moniker = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("bad module file name: {}", path.display()))?
        .to_string();
    let source =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let input = parse_module(&source).with_context(|| format!("parsing {}", path.display()))?;
    Ok(LoadedModule {
        moniker,
        path: path.to_path_buf(),
        input,
    })
}

/// Load every `.skf` module under a directory, sorted by moniker
pub fn load_dir(dir: &Path) -> Result<Vec<LoadedModule>> {
    let mut modules = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MODULE_EXTENSION) {
            continue;
        }
        debug!(path = %path.display(), "loading module file");
        modules.push(load_file(&path)?);
    }
    modules.sort_by(|a, b| a.moniker.cmp(&b.moniker));
    Ok(modules)
}
