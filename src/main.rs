//! Reposcope CLI - build and query repository scope graphs

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use reposcope::config::{config_path_in, load_config, write_config, ReposcopeConfig};
use reposcope::scope::{LocalResolver, NodeKind};
use reposcope::{NodeId, RepoGraph, RepoNode, RepoNodeId};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "reposcope")]
#[command(version = "0.0.1")]
#[command(about = "Repository scope graphs - where is this defined, who imports it")]
#[command(long_about = r#"
Reposcope builds a scope graph per source file and links the scopes that
reference imported names to the scopes that export them.

Example usage:
  reposcope build --path ./myproject
  reposcope missing --path ./myproject
  reposcope goto --path ./myproject --file app/main.py --scope 3
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the repo graph and print statistics
    Build {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List imports that did not resolve to any export
    Missing {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Exporting scopes reached from a referencing scope
    Goto {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// File containing the referencing scope
        #[arg(short, long)]
        file: PathBuf,

        /// Scope id within the file
        #[arg(short, long)]
        scope: usize,
    },

    /// Scopes in other files that use an exporting scope
    Usages {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// File containing the exporting scope
        #[arg(short, long)]
        file: PathBuf,

        /// Scope id within the file
        #[arg(short, long)]
        scope: usize,
    },

    /// Print every import edge of the repo graph
    Dump {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Print the scope graph and local bindings of one file
    Scopes {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// File to inspect
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Write a default reposcope.toml
    Init {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Build { path, json } => {
            let graph = open_graph(&path)?;
            let stats = graph.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats);
                for skipped in graph.skipped() {
                    println!("{} {}", "skipped".yellow(), skipped.display());
                }
            }
        }

        Commands::Missing { path, json } => {
            let graph = open_graph(&path)?;
            let report = graph.missing_imports_report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_empty() {
                println!("{}", "All imports resolved.".green());
            } else {
                for file in &report.files {
                    println!("{}", file.file.display().bold());
                    for namespace in &file.missing {
                        println!("  {} {}", "✗".red(), namespace);
                    }
                }
                println!();
                println!("Missing imports: {}", report.total_missing.red());
                println!("Resolved imports: {}", report.total_resolved.green());
            }
        }

        Commands::Goto { path, file, scope } => {
            let graph = open_graph(&path)?;
            let id = RepoNodeId::new(file, NodeId(scope));
            print_nodes(&graph, &graph.import_to_export_scope(&id), "No exporting scopes found.");
        }

        Commands::Usages { path, file, scope } => {
            let graph = open_graph(&path)?;
            let id = RepoNodeId::new(file, NodeId(scope));
            print_nodes(&graph, &graph.export_to_import_scopes(&id), "No importing scopes found.");
        }

        Commands::Dump { path } => {
            let graph = open_graph(&path)?;
            print!("{}", graph.to_str());
        }

        Commands::Scopes { path, file } => {
            let graph = open_graph(&path)?;
            let scope_graph = graph
                .scope_graph(&file)
                .with_context(|| format!("{} is not part of the repo graph", file.display()))?;

            print!("{}", scope_graph.to_str());
            println!();

            let config = repo_config(&path)?;
            let resolution = LocalResolver::new(scope_graph, config.local_visibility).resolve_all();
            for (reference, definition) in resolution.bindings() {
                println!("{} {} -> {}", label(scope_graph.get_node(reference).map(|n| &n.kind)), reference, definition);
            }
            for reference in resolution.unresolved() {
                println!("{} {} (unresolved)", label(scope_graph.get_node(*reference).map(|n| &n.kind)), reference);
            }
        }

        Commands::Init { path, force } => {
            let config_path = config_path_in(&path);
            write_config(&config_path, &ReposcopeConfig::default(), force)?;
            println!("Wrote {}", config_path.display());
        }
    }

    Ok(())
}

fn repo_config(path: &Path) -> anyhow::Result<ReposcopeConfig> {
    Ok(load_config(Some(&config_path_in(path)))?.unwrap_or_default())
}

fn open_graph(path: &Path) -> anyhow::Result<RepoGraph> {
    let config = repo_config(path)?;
    tracing::info!("Building repo graph for {}", path.display());
    RepoGraph::from_config(path, &config).with_context(|| format!("failed to build repo graph for {}", path.display()))
}

fn label(kind: Option<&NodeKind>) -> String {
    match kind {
        Some(NodeKind::Reference(reference)) => reference.symbol_name.clone().unwrap_or_default(),
        _ => String::from("?"),
    }
}

/// Print repo nodes with the exportable names their scope declares
fn print_nodes(graph: &RepoGraph, nodes: &[&RepoNode], empty: &str) {
    if nodes.is_empty() {
        println!("{}", empty);
        return;
    }
    for node in nodes {
        let names: Vec<String> = graph
            .scope_graph(&node.id.file)
            .map(|scope_graph| {
                scope_graph
                    .definitions(node.id.scope)
                    .into_iter()
                    .filter_map(|def| scope_graph.definition(def))
                    .filter(|def| def.is_exportable())
                    .filter_map(|def| def.symbol_name.clone())
                    .collect()
            })
            .unwrap_or_default();
        println!("- {} {}", node.id.to_string().cyan(), names.join(", "));
    }
}
