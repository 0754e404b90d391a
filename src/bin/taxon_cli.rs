//! Taxonomy maintenance CLI.
//!
//! ```bash
//! taxon_cli validate <TAXONOMY_ID>
//! taxon_cli rebuild <TAXONOMY_ID>
//! taxon_cli tree <TAXONOMY_ID> --focus <TAXON_ID> --max-depth 2
//! taxon_cli regenerate <TAXON_ID>
//! taxon_cli list --taxonomy <TAXONOMY_ID> --search shoes -o json
//! ```
//!
//! Connects to `TAXON_DATABASE_URL` (or `--database-url`).

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use taxon_core::projection::{TaxonQuery, TaxonTreeNode, TreeQuery};
use taxon_core::TaxonomyError;
use taxon_hierarchy::bootstrap::build_service;
use taxon_hierarchy::telemetry::init_tracing;
use taxon_hierarchy::AppConfig;

#[derive(Parser)]
#[command(name = "taxon_cli")]
#[command(version)]
#[command(about = "Validate, rebuild, inspect and regenerate taxonomy hierarchies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Postgres connection string
    #[arg(long, global = true, env = "TAXON_DATABASE_URL")]
    database_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the parent graph of a taxonomy
    Validate { taxonomy_id: Uuid },

    /// Recompute depth, materialized path and pretty names
    Rebuild { taxonomy_id: Uuid },

    /// Print the taxonomy as a tree
    Tree {
        taxonomy_id: Uuid,

        /// Taxon to focus (prints its breadcrumbs)
        #[arg(long)]
        focus: Option<Uuid>,

        /// Levels to render below the root
        #[arg(long)]
        max_depth: Option<u32>,
    },

    /// Re-run a taxon's rules against the catalog
    Regenerate { taxon_id: Uuid },

    /// Flat paged listing
    List {
        #[arg(long = "taxonomy")]
        taxonomy_id: Option<Uuid>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.command, cli.database_url, cli.format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<TaxonomyError>() {
                Some(TaxonomyError::Validation(violations)) => {
                    for v in violations {
                        eprintln!("error[{}]: {}", v.code, v.message);
                    }
                }
                _ => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Commands,
    database_url: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    config.database_url = database_url.or(config.database_url);
    if config.database_url.is_none() {
        anyhow::bail!("no database configured: set TAXON_DATABASE_URL or pass --database-url");
    }
    let (service, _) = build_service(&config).await?;

    match command {
        Commands::Validate { taxonomy_id } => {
            service.validate_hierarchy(taxonomy_id).await?;
            emit(format, &serde_json::json!({ "taxonomy_id": taxonomy_id, "valid": true }), || {
                format!("taxonomy {taxonomy_id}: hierarchy is valid")
            })
        }
        Commands::Rebuild { taxonomy_id } => {
            let summary = service.rebuild_hierarchy(taxonomy_id).await?;
            emit(format, &summary, || {
                format!(
                    "taxonomy {}: visited {}, updated {}",
                    summary.taxonomy_id, summary.visited, summary.updated
                )
            })
        }
        Commands::Tree {
            taxonomy_id,
            focus,
            max_depth,
        } => {
            let response = service
                .build_taxon_tree(TreeQuery {
                    taxonomy_id,
                    focus,
                    max_depth,
                })
                .await?;
            emit(format, &response, || {
                let mut out = String::new();
                if !response.breadcrumbs.is_empty() {
                    let trail: Vec<&str> =
                        response.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
                    out.push_str(&format!("focus: {}\n", trail.join(" > ")));
                }
                for node in &response.tree {
                    render_node(node, 0, &mut out);
                }
                out.trim_end().to_string()
            })
        }
        Commands::Regenerate { taxon_id } => {
            let summary = service.regenerate_products_for_taxon(taxon_id).await?;
            emit(format, &summary, || {
                format!(
                    "taxon {}: {} matched, {} added, {} removed",
                    summary.taxon_id, summary.matched, summary.added, summary.removed
                )
            })
        }
        Commands::List {
            taxonomy_id,
            search,
            page,
            page_size,
        } => {
            let listing = service
                .get_flat_taxons(TaxonQuery {
                    taxonomy_id,
                    search,
                    page: Some(page),
                    page_size,
                    ..Default::default()
                })
                .await?;
            emit(format, &listing, || {
                let mut out: Vec<String> = listing
                    .items
                    .iter()
                    .map(|t| format!("{}  {}", t.id, t.pretty_name))
                    .collect();
                out.push(format!(
                    "page {}/{} ({} total)",
                    listing.page, listing.total_pages, listing.total_count
                ));
                out.join("\n")
            })
        }
    }
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn render_node(node: &TaxonTreeNode, indent: usize, out: &mut String) {
    out.push_str(&format!("{}{} ({})\n", "  ".repeat(indent), node.name, node.slug));
    for child in &node.children {
        render_node(child, indent + 1, out);
    }
}
