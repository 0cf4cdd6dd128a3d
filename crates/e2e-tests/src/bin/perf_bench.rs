use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use e2e_tests::{random_record, random_taxonomy, SyntheticTaxonomy};
use topictree_core::{
    annotate, chains_by_text, HypernymResolver, TermRanker, TopicTree, TreeCompressor,
};
use topictree_types::TermRecord;

const DEFAULT_ITERATIONS: usize = 5;
const SEED: u64 = 0x7091c;

#[derive(Parser, Debug)]
#[command(name = "perf_bench", about = "topictree performance benchmark harness")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, value_enum, default_value = "cold")]
    mode: RunMode,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Medium,
}

/// Cold runs build a fresh resolver each iteration; warm runs reuse its cache.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum RunMode {
    Cold,
    Warm,
}

struct TierShape {
    roots: usize,
    depth: usize,
    fanout: usize,
    texts: usize,
    terms_per_text: usize,
    top_terms: usize,
}

impl DatasetTier {
    fn shape(&self) -> TierShape {
        match self {
            DatasetTier::Small => TierShape {
                roots: 3,
                depth: 5,
                fanout: 3,
                texts: 50,
                terms_per_text: 20,
                top_terms: 5,
            },
            DatasetTier::Medium => TierShape {
                roots: 6,
                depth: 7,
                fanout: 3,
                texts: 400,
                terms_per_text: 40,
                top_terms: 10,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StepMetrics {
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
    samples: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BenchmarkOutput {
    tier: DatasetTier,
    mode: RunMode,
    iterations: usize,
    texts: usize,
    words: usize,
    final_nodes: usize,
    steps: BTreeMap<String, StepMetrics>,
}

#[derive(Default)]
struct SampleCollector {
    samples: BTreeMap<String, Vec<f64>>,
}

impl SampleCollector {
    fn record(&mut self, step: &str, elapsed: Duration) {
        self.samples
            .entry(step.to_string())
            .or_default()
            .push(elapsed.as_secs_f64() * 1000.0);
    }

    fn finish(self) -> BTreeMap<String, StepMetrics> {
        self.samples
            .into_iter()
            .map(|(step, mut durations)| {
                durations.sort_by(|a, b| a.total_cmp(b));
                let metrics = StepMetrics {
                    p50_ms: percentile(&durations, 50.0),
                    p90_ms: percentile(&durations, 90.0),
                    p99_ms: percentile(&durations, 99.0),
                    samples: durations.len(),
                };
                (step, metrics)
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    if args.iterations == 0 {
        return Err("--iterations must be at least 1".to_string());
    }

    let shape = args.tier.shape();
    let mut rng = StdRng::seed_from_u64(SEED);
    let synthetic = random_taxonomy(&mut rng, shape.roots, shape.depth, shape.fanout);
    let record = random_record(&mut rng, &synthetic.words, shape.texts, shape.terms_per_text);
    let words = synthetic.words.len();

    let (steps, final_nodes) = run(&args, &shape, synthetic, &record).await;
    let output = BenchmarkOutput {
        tier: args.tier,
        mode: args.mode,
        iterations: args.iterations,
        texts: record.text_count(),
        words,
        final_nodes,
        steps,
    };

    let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    let table = render_table(&output);
    println!("{}", table);

    if let Some(out_dir) = &args.out_dir {
        fs::create_dir_all(out_dir).map_err(|e| e.to_string())?;
        write_outputs(out_dir, &json, &table)?;
    } else {
        println!("{}", json);
    }
    Ok(())
}

async fn run(
    args: &Args,
    shape: &TierShape,
    synthetic: SyntheticTaxonomy,
    record: &TermRecord,
) -> (BTreeMap<String, StepMetrics>, usize) {
    let taxonomy = Arc::new(synthetic.taxonomy);
    let ranker = TermRanker::new(shape.top_terms);
    let compressor = TreeCompressor::default();
    let mut warm_resolver = Arc::new(HypernymResolver::new(taxonomy.clone()));
    let mut collector = SampleCollector::default();
    let mut final_nodes = 0;

    for _ in 0..args.iterations {
        let started = Instant::now();
        let top_terms = ranker.rank(record);
        collector.record("rank", started.elapsed());

        if args.mode == RunMode::Cold {
            warm_resolver = Arc::new(HypernymResolver::new(taxonomy.clone()));
        }
        let terms = top_terms
            .values()
            .flat_map(|terms| terms.iter().map(|t| t.term.clone()));
        let started = Instant::now();
        let resolution = warm_resolver
            .resolve_many(terms, 4, Duration::from_secs(5))
            .await;
        collector.record("resolve", started.elapsed());

        let started = Instant::now();
        let mut tree = TopicTree::from_chains(resolution.chains.values().map(Arc::as_ref));
        collector.record("assemble", started.elapsed());

        let started = Instant::now();
        compressor.compress(&mut tree);
        collector.record("compress", started.elapsed());

        let started = Instant::now();
        annotate(&mut tree, &chains_by_text(&top_terms, &resolution));
        collector.record("annotate", started.elapsed());

        final_nodes = tree.node_count();
    }

    (collector.finish(), final_nodes)
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let rank = (percentile / 100.0) * (values.len() as f64 - 1.0);
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        values[low]
    } else {
        let weight = rank - low as f64;
        values[low] + (values[high] - values[low]) * weight
    }
}

fn render_table(output: &BenchmarkOutput) -> String {
    let mut lines = vec![
        format!(
            "Benchmark Results (tier={:?}, mode={:?}, iterations={}, nodes={})",
            output.tier, output.mode, output.iterations, output.final_nodes
        ),
        "step\tp50_ms\tp90_ms\tp99_ms".to_string(),
    ];
    for (step, metrics) in &output.steps {
        lines.push(format!(
            "{}\t{:.3}\t{:.3}\t{:.3}",
            step, metrics.p50_ms, metrics.p90_ms, metrics.p99_ms
        ));
    }
    lines.join("\n")
}

fn write_outputs(out_dir: &Path, json: &str, table: &str) -> Result<(), String> {
    fs::write(out_dir.join("latest.json"), json).map_err(|e| e.to_string())?;
    fs::write(out_dir.join("latest.txt"), table).map_err(|e| e.to_string())?;
    Ok(())
}
