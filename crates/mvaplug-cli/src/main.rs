//! mvaplug
//!
//! Command line companion for the classifier adapters: infer plugin names
//! from weight files, inspect persisted reference records, list the
//! NeuroBayes options and validate a job configuration without the engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mvaplug_methods::method::{Method, MethodArgs};
use mvaplug_methods::neurobayes::{NeuroBayesBackend, NeuroBayesMethod};
use mvaplug_methods::plugin::{infer_method_name, PluginRegistry, PluginResolver, METHOD_FAMILY};
use mvaplug_methods::reference::ReferenceRecord;
use mvaplug_methods::MethodFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod dry_run;

use config::{JobConfig, JobOverrides};
use dry_run::{DryRunEngine, NoExperts};

#[derive(Parser, Debug)]
#[command(name = "mvaplug")]
#[command(about = "Inspect and validate mvaplug classifier jobs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the method name a weight file resolves to
    Infer {
        /// Weight file path, `<job>_<method>.<ext>`
        weight_file: String,
    },

    /// Show the artifact a persisted reference record points at
    Inspect {
        /// XML record or text line file
        file: PathBuf,

        /// Variable count, required for the text form
        #[arg(short, long)]
        n_variables: Option<usize>,

        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// List the NeuroBayes options with their defaults
    Options,

    /// Validate a job's options and preprocessing directives
    Check {
        /// Job configuration file
        #[arg(short, long, default_value = "job.yaml")]
        config: String,

        /// Override the job name
        #[arg(short, long)]
        job: Option<String>,

        /// Override the option string
        #[arg(short, long, env = "MVAPLUG_OPTIONS")]
        options: Option<String>,

        /// Override the variable list (repeatable)
        #[arg(long = "variable")]
        variables: Vec<String>,

        /// Also write the code generator variable set to this path
        #[arg(long)]
        codegen: Option<PathBuf>,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Command::Infer { weight_file } => infer(&weight_file),
        Command::Inspect {
            file,
            n_variables,
            json,
        } => inspect(&file, n_variables, json),
        Command::Options => list_options(),
        Command::Check {
            config,
            job,
            options,
            variables,
            codegen,
            json,
        } => {
            let overrides = JobOverrides {
                job,
                options,
                variables,
            };
            check(&config, &overrides, codegen, json)
        }
    }
}

fn dry_run_backend() -> NeuroBayesBackend {
    NeuroBayesBackend::new(Box::new(DryRunEngine::default()), Arc::new(NoExperts))
}

fn infer(weight_file: &str) -> Result<()> {
    let name = infer_method_name(weight_file)?;

    let backend = dry_run_backend();
    let mut plugins = PluginRegistry::new();
    let mut factory = MethodFactory::new();
    backend.register(&mut plugins, &mut factory)?;
    let resolver = PluginResolver::new(plugins);

    if resolver.registry().find(METHOD_FAMILY, &name).is_some() {
        println!("{}", name);
    } else {
        warn!("No plugin is registered for '{}'", name);
        println!("{} (unregistered)", name);
    }
    Ok(())
}

fn inspect(file: &Path, n_variables: Option<usize>, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let trimmed = content.trim();

    let record = if trimmed.starts_with('<') {
        ReferenceRecord::from_xml(trimmed)?
    } else {
        let n = n_variables.context("--n-variables is required for text records")?;
        ReferenceRecord::from_text_line(trimmed, n)?
    };

    if record.is_untrained() {
        warn!(
            "{} carries the untrained sentinel; the method must be trained again",
            file.display()
        );
    }

    if json {
        let value = serde_json::json!({
            "n_variables": record.n_variables,
            "artifact": record.artifact.display().to_string(),
            "trained": !record.is_untrained(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("variables: {}", record.n_variables);
        println!("artifact:  {}", record.artifact.display());
        println!("trained:   {}", !record.is_untrained());
    }
    Ok(())
}

fn list_options() -> Result<()> {
    let mut method = dry_run_backend().create(MethodArgs::Expert {
        dataset: mvaplug_core::DataSetInfo::new("options", Vec::<String>::new()),
        weight_file: String::new(),
    });
    method.declare_options()?;

    for spec in method.options().specs() {
        let default = spec.default.to_string();
        if spec.allowed.is_empty() {
            println!("{:<32} {:<10} {}", spec.name, default, spec.help);
        } else {
            println!(
                "{:<32} {:<10} {} [{}]",
                spec.name,
                default,
                spec.help,
                spec.allowed.join(", ")
            );
        }
    }
    Ok(())
}

fn check(config_path: &str, overrides: &JobOverrides, codegen: Option<PathBuf>, json: bool) -> Result<()> {
    let config = JobConfig::load(config_path, overrides)?;
    info!(
        "Checking job '{}' ({} variables) for method {}",
        config.job,
        config.variables.len(),
        config.method
    );

    let backend = dry_run_backend().with_config(config.backend.clone());
    let mut method: NeuroBayesMethod = backend.create(MethodArgs::Teacher {
        job: config.job.clone(),
        title: config.method.clone(),
        dataset: config.dataset(),
        options: config.options.clone(),
    });
    method.declare_options()?;
    method
        .process_options()
        .with_context(|| format!("invalid options for job '{}'", config.job))?;

    let labels = method.preprocessing().labels(&config.dataset());
    let report = serde_json::json!({
        "job": config.job,
        "method": method.method_title(),
        "artifact": method.artifact().display().to_string(),
        "settings": method.settings(),
        "variables": labels,
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", serde_yaml::to_string(&report)?);
    }

    if let Some(path) = codegen {
        method.dump_pseudo_codegen(&path)?;
        info!("Wrote variable set to {}", path.display());
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("mvaplug=debug,mvaplug_methods=debug,mvaplug_cli=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mvaplug=info,mvaplug_methods=info,mvaplug_cli=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
