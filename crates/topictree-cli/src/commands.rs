//! Command implementations for the topictree binary.
//!
//! Handles:
//! - generate: read input, build the tree, write JSON or DOT
//! - terms: read input, print ranked terms per text

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use topictree_core::{
    to_dot, to_node_link_json, StaticTaxonomy, Taxonomy, TermExtractor, TermRanker, TopTermSet,
    TopicTreeGenerator,
};
use topictree_types::{CorpusCounts, ExtractionConfig, Settings, TermRecord};

use crate::cli::{GenerateArgs, InputArgs, OutputFormat, TermsArgs};

/// Pre-counted corpus file.
///
/// ```json
/// {"text_count": 3, "texts": {"t1": {"dog": 2, "fox": 1}, "t2": {"dog": 3}}}
/// ```
///
/// `text_count` is optional and only needed when the corpus has texts with
/// no counted terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountsFile {
    #[serde(default)]
    pub text_count: Option<usize>,
    pub texts: CorpusCounts,
}

/// Load settings and apply the global CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level`. Logs go to stderr so stdout stays clean for
/// tree output.
pub fn init_logging(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Tracing subscriber already installed");
    }
}

/// Run `generate`.
pub async fn handle_generate(mut settings: Settings, args: GenerateArgs) -> Result<()> {
    apply_input_overrides(&mut settings, &args.input);
    if let Some(min_children) = args.min_children {
        settings.tree.min_children = min_children;
    }
    if !args.prune.is_empty() {
        settings.tree.prune = args.prune.clone();
    }
    if let Some(mode) = args.prune_mode {
        settings.tree.prune_mode = mode;
    }

    let taxonomy = load_taxonomy(&settings, args.input.taxonomy.as_deref())?
        .context("No taxonomy configured (use --taxonomy or set taxonomy_path)")?;
    let record = load_record(&args.input, &settings.extraction, Some(taxonomy.clone()))?;

    let generator = TopicTreeGenerator::new(taxonomy, settings.tree.clone())
        .context("Invalid tree configuration")?;
    let generated = generator.generate(&record).await;

    let rendered = match args.format {
        OutputFormat::Json => {
            to_node_link_json(&generated.tree).context("Failed to serialize topic tree")?
        }
        OutputFormat::Dot => to_dot(&generated.tree),
    };
    write_output(args.output.as_deref(), &rendered)?;

    info!(
        nodes = generated.report.nodes,
        edges = generated.report.edges,
        texts = generated.report.texts,
        unresolved = generated.report.failures.len(),
        "Topic tree written"
    );
    Ok(())
}

/// Run `terms`.
pub fn handle_terms(mut settings: Settings, args: TermsArgs) -> Result<()> {
    apply_input_overrides(&mut settings, &args.input);
    settings
        .tree
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid tree configuration")?;

    let taxonomy = load_taxonomy(&settings, args.input.taxonomy.as_deref())?;
    let record = load_record(&args.input, &settings.extraction, taxonomy)?;
    let top_terms = TermRanker::new(settings.tree.top_terms).rank(&record);

    let rendered = if args.json {
        serde_json::to_string_pretty(&top_terms).context("Failed to serialize terms")?
    } else {
        format_terms(&top_terms)
    };
    write_output(None, &rendered)
}

fn apply_input_overrides(settings: &mut Settings, input: &InputArgs) {
    if let Some(top_terms) = input.top_terms {
        settings.tree.top_terms = top_terms;
    }
}

/// Load the taxonomy named on the command line or in the settings.
pub fn load_taxonomy(
    settings: &Settings,
    cli_path: Option<&Path>,
) -> Result<Option<Arc<dyn Taxonomy>>> {
    let path = match (cli_path, settings.taxonomy_path.as_deref()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => return Ok(None),
    };

    let taxonomy: Arc<dyn Taxonomy> = Arc::new(
        StaticTaxonomy::load(&path)
            .with_context(|| format!("Failed to load taxonomy from {}", path.display()))?,
    );
    Ok(Some(taxonomy))
}

/// Build the term record from `--corpus` or `--counts`.
pub fn load_record(
    input: &InputArgs,
    extraction: &ExtractionConfig,
    taxonomy: Option<Arc<dyn Taxonomy>>,
) -> Result<TermRecord> {
    match (&input.corpus, &input.counts) {
        (Some(dir), _) => {
            let mut extractor = TermExtractor::new(extraction);
            if extraction.require_known_terms {
                if let Some(taxonomy) = taxonomy {
                    extractor = extractor.with_taxonomy(taxonomy);
                }
            }
            read_corpus(dir, extraction, &extractor)
        }
        (None, Some(path)) => read_counts(path),
        (None, None) => bail!("Either --corpus or --counts is required"),
    }
}

/// Extract terms from every matching file under `dir`.
///
/// A plain-text file is one text, identified by its path relative to `dir`
/// without the extension. A TEI file (by `tei_extensions`) contributes one
/// text per section, identified as `<path>-<xml:id>`.
pub fn read_corpus(
    dir: &Path,
    extraction: &ExtractionConfig,
    extractor: &TermExtractor,
) -> Result<TermRecord> {
    if !dir.is_dir() {
        bail!("Corpus directory not found: {}", dir.display());
    }

    let mut record = TermRecord::new();
    let entries = WalkDir::new(dir).sort_by_file_name().into_iter();

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let is_tei = has_extension(path, &extraction.tei_extensions);
        if !is_tei && !has_extension(path, &extraction.extensions) {
            continue;
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let texts = if is_tei {
            extractor
                .extract_tei(&text_id(dir, path), &content)
                .with_context(|| format!("Failed to parse TEI file {}", path.display()))?
        } else {
            vec![extractor.extract(text_id(dir, path), &content)]
        };

        for text in &texts {
            record
                .add_text(text)
                .with_context(|| format!("Failed to add {}", path.display()))?;
        }
    }

    info!(
        corpus = %dir.display(),
        texts = record.text_count(),
        terms = record.term_count(),
        "Read corpus"
    );
    Ok(record)
}

/// Read a pre-counted corpus file.
pub fn read_counts(path: &Path) -> Result<TermRecord> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let counts: CountsFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse counts file {}", path.display()))?;

    let mut record = TermRecord::from_counts(&counts.texts).context("Invalid counts file")?;
    if let Some(text_count) = counts.text_count {
        record
            .set_text_count(text_count)
            .context("Invalid text_count in counts file")?;
    }
    Ok(record)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

fn text_id(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/")
}

fn format_terms(top_terms: &TopTermSet) -> String {
    let mut out = String::new();
    for (text_id, terms) in top_terms {
        out.push_str(text_id);
        out.push('\n');
        for scored in terms {
            out.push_str(&format!(
                "  {:<24} {:>8.4}  (count {}, tf {:.3})\n",
                scored.term, scored.tf_idf, scored.count, scored.frequency
            ));
        }
    }
    out
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            if !content.ends_with('\n') {
                writeln!(stdout).context("Failed to write to stdout")?;
            }
            Ok(())
        }
    }
}
