use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pbigraph_core::{Config, Report, Severity};
use pbigraph_engine::{extract_graph, ExtractError, Extraction};
use pbigraph_model::{DataModelSchema, DependencyGraph, SchemaError};

const DEFAULT_CONFIG: &str = "pbigraph.toml";

/// pbigraph - dependency graphs for Power BI data models
#[derive(Parser)]
#[command(name = "pbigraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pbigraph.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the dependency graph and write report.json
    Graph {
        /// Path to the extracted DataModelSchema file
        schema: PathBuf,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },

    /// Show everything that depends on a node
    Impact {
        /// Node name (table or expression)
        node: String,

        /// Path to the extracted DataModelSchema file
        schema: PathBuf,
    },

    /// Show everything a node depends on
    Lineage {
        /// Node name (table or expression)
        node: String,

        /// Path to the extracted DataModelSchema file
        schema: PathBuf,
    },

    /// Write a config file with the default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let load = || load_config(cli.config.as_deref(), cli.verbose);

    match cli.command {
        Commands::Graph {
            schema,
            output,
            markdown,
        } => graph_command(&load()?, &schema, &output, markdown.as_deref(), cli.verbose),
        Commands::Impact { node, schema } => impact_command(&load()?, &node, &schema, cli.verbose),
        Commands::Lineage { node, schema } => lineage_command(&load()?, &node, &schema, cli.verbose),
        Commands::InitConfig { force } => init_config_command(cli.config.as_deref(), force),
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        return Ok(Config::from_file(default_path)?);
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

fn load_schema(path: &Path, verbose: bool) -> Result<DataModelSchema, SchemaError> {
    if verbose {
        eprintln!("{} {}", "Loading schema from:".cyan(), path.display());
    }

    DataModelSchema::from_file(path)
}

fn extract(config: &Config, schema_path: &Path, verbose: bool) -> Result<Extraction> {
    let schema = load_schema(schema_path, verbose)
        .with_context(|| format!("Failed to load schema {}", schema_path.display()))?;

    if verbose {
        eprintln!("{}", "Building dependency graph...".cyan());
    }

    Ok(extract_graph(&schema, config)?)
}

/// Build report.json for a schema file
///
/// A schema that cannot be read or has no tables still yields a report,
/// holding a single error diagnostic.
fn build_report(config: &Config, schema_path: &Path, verbose: bool) -> Report {
    let metadata = |schema: Option<&DataModelSchema>| {
        serde_json::json!({
            "schema": schema_path.display().to_string(),
            "model": schema.and_then(|s| s.name.clone()),
            "compatibility_level": schema.and_then(|s| s.compatibility_level),
            "tool_version": env!("CARGO_PKG_VERSION"),
        })
    };

    let schema = match load_schema(schema_path, verbose) {
        Ok(schema) => schema,
        Err(err) => return failure_report(&ExtractError::Schema(err), metadata(None)),
    };

    if verbose {
        eprintln!("{}", "Building dependency graph...".cyan());
    }

    match extract_graph(&schema, config) {
        Ok(extraction) => extraction.to_report(config).with_metadata(metadata(Some(&schema))),
        Err(err) => failure_report(&err, metadata(Some(&schema))),
    }
}

fn failure_report(err: &ExtractError, metadata: serde_json::Value) -> Report {
    tracing::error!("{}", err);

    let mut report = Report::new().with_metadata(metadata);
    report.add_diagnostic(err.to_diagnostic());
    report
}

/// Graph command - extract the graph and save the report
fn graph_command(
    config: &Config,
    schema_path: &Path,
    output: &Path,
    markdown: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let report = build_report(config, schema_path, verbose);

    report.save_to_file(output)?;
    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    if let Some(md_path) = markdown {
        std::fs::write(md_path, generate_markdown_report(&report))?;
        if verbose {
            eprintln!("{} {}", "Markdown report saved to:".green(), md_path.display());
        }
    }

    print_report_summary(&report);

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Impact command - show downstream dependents
fn impact_command(config: &Config, node: &str, schema_path: &Path, verbose: bool) -> Result<()> {
    let extraction = extract(config, schema_path, verbose)?;
    let graph = &extraction.graph;
    let node_id = find_node(graph, node)?;

    if verbose {
        eprintln!("{} {}", "Analyzing impact for:".cyan(), node_id);
    }

    let downstream = in_dependency_order(graph, graph.downstream(&node_id));

    print_banner("Downstream Impact Analysis");
    println!("{} {}", "Node:".bold(), node_id.green());
    println!("{} {}", "Direct dependents:".bold(), graph.children(&node_id).len());
    println!("{} {}", "Downstream nodes:".bold(), downstream.len());
    println!();

    if downstream.is_empty() {
        println!("{}", "✓ No downstream dependencies".green());
        println!("This node can be modified without affecting other nodes.");
    } else {
        println!("{}", "Affected nodes (in dependency order):".bold());
        println!();
        print_node_list(graph, &downstream);
        println!();
        println!("{}", "⚠ Changes to this node may break downstream nodes!".yellow().bold());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Lineage command - show upstream dependencies
fn lineage_command(config: &Config, node: &str, schema_path: &Path, verbose: bool) -> Result<()> {
    let extraction = extract(config, schema_path, verbose)?;
    let graph = &extraction.graph;
    let node_id = find_node(graph, node)?;

    if verbose {
        eprintln!("{} {}", "Tracing lineage for:".cyan(), node_id);
    }

    let upstream = in_dependency_order(graph, graph.upstream(&node_id));

    print_banner("Upstream Lineage");
    println!("{} {}", "Node:".bold(), node_id.green());
    println!("{} {}", "Direct dependencies:".bold(), graph.parents(&node_id).len());
    println!("{} {}", "Upstream nodes:".bold(), upstream.len());
    println!();

    if upstream.is_empty() {
        println!("{}", "✓ No upstream dependencies".green());
    } else {
        println!("{}", "Depends on:".bold());
        println!();
        print_node_list(graph, &upstream);
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Init-config command - write a config file
fn init_config_command(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG));

    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        ));
    }

    Config::default().save_to_file(path)?;
    println!("{} {}", "✓ Config written to".green(), path.display());

    Ok(())
}

/// Find a node by exact id, falling back to a unique case-insensitive match
fn find_node(graph: &DependencyGraph, name: &str) -> Result<String> {
    if graph.contains_node(name) {
        return Ok(name.to_string());
    }

    let matches: Vec<&String> = graph
        .node_ids()
        .filter(|id| id.eq_ignore_ascii_case(name))
        .collect();

    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(anyhow::anyhow!(
            "Node '{}' not found in the model. Available nodes: {}",
            name,
            graph
                .node_ids()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )),
        _ => Err(anyhow::anyhow!(
            "Node '{}' is ambiguous, candidates: {}",
            name,
            matches
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// Sort ids so dependencies come first; a cyclic graph keeps traversal order
fn in_dependency_order(graph: &DependencyGraph, mut ids: Vec<String>) -> Vec<String> {
    if let Some(order) = graph.topological_sort() {
        ids.sort_by_key(|id| order.iter().position(|n| n == id));
    }
    ids
}

fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
}

fn print_node_list(graph: &DependencyGraph, ids: &[String]) {
    for (i, id) in ids.iter().enumerate() {
        let origin = graph
            .nodes()
            .iter()
            .find(|node| &node.id == id)
            .map(|node| format!("{} ({})", id, node.origin))
            .unwrap_or_else(|| id.clone());

        println!("  {}. {}", i + 1, origin.yellow());
    }
}

fn print_report_summary(report: &Report) {
    print_banner("Dependency Graph Report");

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Nodes:    {}", report.summary.nodes);
    println!("  Edges:    {}", report.summary.edges);
    println!("  Isolated: {}", report.summary.isolated);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                println!("    at {}", loc);
            }

            if let Some(snippet) = &diag.snippet {
                println!("    | {}", snippet.lines().next().unwrap_or_default());
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn generate_markdown_report(report: &Report) -> String {
    let mut md = String::new();

    md.push_str("# Dependency Graph Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Nodes: {}\n", report.summary.nodes));
    md.push_str(&format!("- Edges: {}\n", report.summary.edges));
    md.push_str(&format!("- Isolated nodes: {}\n", report.summary.isolated));
    md.push_str(&format!("- Errors: {}\n", report.summary.errors));
    md.push_str(&format!("- Warnings: {}\n", report.summary.warnings));
    md.push_str(&format!("- Info: {}\n", report.summary.info));
    md.push('\n');

    md.push_str("## Edges\n\n");
    if report.edges.is_empty() {
        md.push_str("_No dependencies found._\n\n");
    } else {
        md.push_str("| Source | Target |\n|---|---|\n");
        for edge in &report.edges {
            md.push_str(&format!("| {} | {} |\n", edge.source, edge.target));
        }
        md.push('\n');
    }

    if !report.diagnostics.is_empty() {
        md.push_str("## Diagnostics\n\n");

        for diag in &report.diagnostics {
            let severity_emoji = match diag.severity {
                Severity::Error => "❌",
                Severity::Warn => "⚠️",
                Severity::Info => "ℹ️",
            };

            md.push_str(&format!("### {} {} - {}\n\n", severity_emoji, diag.severity, diag.code));
            md.push_str(&format!("{}\n\n", diag.message));

            if let Some(loc) = &diag.location {
                md.push_str(&format!("**Location:** {}\n\n", loc));
            }

            if let Some(snippet) = &diag.snippet {
                md.push_str(&format!("```\n{}\n```\n\n", snippet));
            }
        }
    }

    md
}
