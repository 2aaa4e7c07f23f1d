//! j5build CLI
//!
//! Builds, lints and graphs J5 schema packages.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use j5build::{BuildConfig, BuildError, PackageSet};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "j5build")]
#[command(about = "Compile J5 schemas into protobuf descriptors")]
struct Cli {
    /// Config file layered over j5build.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Source root (overrides source.root)
    #[arg(short, long)]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build packages into a binary FileDescriptorSet
    Build {
        /// Packages to build (defaults to config, then every local package)
        packages: Vec<String>,
        /// Output file (defaults to output.path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report every diagnostic for the given packages
    Lint {
        packages: Vec<String>,
    },

    /// Print the package dependency graph as DOT
    Graph {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found problems.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = BuildConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(source) = cli.source {
        config.source.root = source;
    }

    let mut set = PackageSet::from_config(&config);

    match cli.command {
        Commands::Build { packages, output } => {
            let packages = requested_packages(&set, &config, packages)?;
            let names: Vec<&str> = packages.iter().map(String::as_str).collect();

            let output_file = match set.build(&names) {
                Ok(output_file) => output_file,
                Err(BuildError::Failed(diagnostics)) => {
                    eprint!("{}", diagnostics);
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            if !output_file.diagnostics.is_empty() {
                eprint!("{}", output_file.diagnostics);
            }

            let path = output.unwrap_or_else(|| config.output.path.clone());
            std::fs::write(&path, output_file.encode_descriptor_set())
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), files = output_file.files.len(), "wrote descriptor set");
            println!(
                "Wrote {} file(s) from {} package(s) to {:?}",
                output_file.files.len(),
                names.len(),
                path
            );
            Ok(true)
        }

        Commands::Lint { packages } => {
            let packages = requested_packages(&set, &config, packages)?;
            let names: Vec<&str> = packages.iter().map(String::as_str).collect();
            let diagnostics = set.lint(&names)?;

            if diagnostics.is_empty() {
                println!("No problems found in {} package(s)", names.len());
                return Ok(true);
            }
            print!("{}", diagnostics);

            let failed = diagnostics.has_errors()
                || (config.lint.warnings_as_errors && diagnostics.warning_count() > 0);
            Ok(!failed)
        }

        Commands::Graph { output } => {
            set.load_all()?;
            let graph = set.graph(&[]);
            let dot = graph.to_dot();
            match output {
                Some(path) => {
                    std::fs::write(&path, &dot)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!(
                        "Exported {} package(s), {} edge(s) to {:?}",
                        graph.package_count(),
                        graph.edge_count(),
                        path
                    );
                }
                None => print!("{}", dot),
            }
            Ok(true)
        }
    }
}

fn requested_packages(
    set: &PackageSet,
    config: &BuildConfig,
    packages: Vec<String>,
) -> anyhow::Result<Vec<String>> {
    if !packages.is_empty() {
        return Ok(packages);
    }
    if !config.packages.is_empty() {
        return Ok(config.packages.clone());
    }
    let local = set.local_packages()?;
    if local.is_empty() {
        anyhow::bail!("no packages found under {}", config.source_root().display());
    }
    Ok(local)
}
