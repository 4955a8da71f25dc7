//! skiff - incremental module analysis from the command line
//!
//! Loads `.skf` module descriptions, drives them to convergence, and
//! reports the inferred types for every module-level name.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use skiff_analyzer::{AnalyzerConfig, CancellationToken, ContextId, LanguageService};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info};

mod loader;

/// Incremental type inference over a directory of modules
#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Incremental multi-module type analysis")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze every module in a directory and print inferred types
    Analyze {
        /// Directory containing .skf module files
        dir: PathBuf,
        /// Context name the modules are analyzed under
        #[arg(long, default_value = "default")]
        context: String,
        /// Context version tag
        #[arg(long, default_value = "1.0")]
        context_version: String,
        /// Cap on fixpoint passes per module
        #[arg(long, default_value_t = 128)]
        max_passes: usize,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse one module file and print its structured form
    Show {
        /// Module file
        file: PathBuf,
    },
}

/// One module's analysis results, in report form
#[derive(Debug, Serialize)]
struct ModuleReport {
    context: String,
    module: String,
    status: String,
    version: u64,
    bindings: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeReport {
    modules: Vec<ModuleReport>,
    diagnostics: Vec<skiff_analyzer::AnalysisDiagnostic>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            dir,
            context,
            context_version,
            max_passes,
            json,
        } => analyze_command(&dir, &context, &context_version, max_passes, json).await,
        Commands::Show { file } => show_command(&file),
    };

    if let Err(e) = result {
        error!("command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn analyze_command(
    dir: &std::path::Path,
    context: &str,
    context_version: &str,
    max_passes: usize,
    json: bool,
) -> Result<()> {
    let modules = loader::load_dir(dir)?;
    info!(count = modules.len(), dir = %dir.display(), "loaded modules");

    let config = AnalyzerConfig {
        max_passes,
        ..AnalyzerConfig::default()
    };
    let service = LanguageService::new(config);
    let context = ContextId::new(context, context_version);
    let cancel = CancellationToken::new();

    for module in &modules {
        service
            .add_module(&context, &module.moniker, &module.input)
            .await;
    }
    service.run_until_idle(&cancel).await?;

    let report = build_report(&service).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if !report.diagnostics.is_empty() {
        anyhow::bail!(
            "analysis finished with {} diagnostic(s)",
            report.diagnostics.len()
        );
    }
    Ok(())
}

async fn build_report(service: &LanguageService) -> Result<AnalyzeReport> {
    let mut reports = Vec::new();
    for (context, state) in service.modules() {
        let mut bindings = BTreeMap::new();
        for (name, types) in state.export_types().await? {
            bindings.insert(name.to_string(), types.to_annotation());
        }
        reports.push(ModuleReport {
            context: context.to_string(),
            module: state.moniker().to_string(),
            status: state.status().await.to_string(),
            version: state.version(),
            bindings,
        });
    }
    Ok(AnalyzeReport {
        modules: reports,
        diagnostics: service.diagnostics(),
    })
}

fn print_report(report: &AnalyzeReport) {
    for module in &report.modules {
        println!(
            "{} [{}] v{} ({})",
            module.module, module.context, module.version, module.status
        );
        for (name, types) in &module.bindings {
            println!("  {} = {}", name, types);
        }
    }
    for diagnostic in &report.diagnostics {
        println!(
            "warning: {} in {} [{}] after {} passes",
            diagnostic.message, diagnostic.moniker, diagnostic.context, diagnostic.passes
        );
    }
}

fn show_command(file: &std::path::Path) -> Result<()> {
    let module = loader::load_file(file)?;
    println!("{}", serde_json::to_string_pretty(&module.input)?);
    Ok(())
}
