//! topictree
//!
//! Summarizes a text corpus as a compressed tree of taxonomy concepts.
//!
//! # Usage
//!
//! ```bash
//! topictree generate --corpus texts/ --taxonomy wordnet.toml [--format dot] [--output tree.dot]
//! topictree generate --counts counts.json --taxonomy wordnet.toml --prune entity.n.01
//! topictree terms --corpus texts/ -k 5
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/topictree/config.toml)
//! 3. `--config` file
//! 4. Environment variables (TOPICTREE_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use topictree_cli::{handle_generate, handle_terms, init_logging, load_settings, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level);

    match cli.command {
        Commands::Generate(args) => {
            handle_generate(settings, args).await?;
        }
        Commands::Terms(args) => {
            handle_terms(settings, args)?;
        }
    }

    Ok(())
}
