//! CLI argument parsing for the topictree binary.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use topictree_types::PruneMode;

/// Topic tree generator
///
/// Summarizes a text corpus as a hierarchy of taxonomy concepts.
#[derive(Parser, Debug)]
#[command(name = "topictree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/topictree/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, compress and annotate a topic tree
    Generate(GenerateArgs),

    /// Print the ranked terms of each text
    Terms(TermsArgs),
}

/// Where term counts come from.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Corpus directory: plain-text files (one text each) and TEI files
    /// (one text per `xml:id` section)
    #[arg(long, conflicts_with = "counts", required_unless_present = "counts")]
    pub corpus: Option<PathBuf>,

    /// JSON file of pre-counted terms per text
    #[arg(long)]
    pub counts: Option<PathBuf>,

    /// Taxonomy file, TOML or JSON (default from config)
    #[arg(long)]
    pub taxonomy: Option<PathBuf>,

    /// Terms kept per text
    #[arg(short = 'k', long)]
    pub top_terms: Option<usize>,
}

/// Arguments of `generate`
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Minimum children for an ancestor to survive compression
    #[arg(long)]
    pub min_children: Option<usize>,

    /// Node label to remove after compression (repeatable)
    #[arg(long = "prune")]
    pub prune: Vec<String>,

    /// What happens to the children of pruned nodes (discard, reattach)
    #[arg(long)]
    pub prune_mode: Option<PruneMode>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `terms`
#[derive(Args, Debug, Clone)]
pub struct TermsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Tree output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Node-link JSON
    #[default]
    Json,
    /// Graphviz DOT
    Dot,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
