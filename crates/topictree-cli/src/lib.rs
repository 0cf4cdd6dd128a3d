//! topictree binary library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (generate, terms)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, GenerateArgs, InputArgs, OutputFormat, TermsArgs};
pub use commands::{
    handle_generate, handle_terms, init_logging, load_record, load_settings, load_taxonomy,
    read_corpus, read_counts, CountsFile,
};
