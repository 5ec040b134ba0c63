//! filebench binary
//!
//! Benchmarks ingesting local files and directories into the persistent
//! store, printing each result as it finishes.

use std::path::PathBuf;
use std::thread;

use clap::{Parser, ValueEnum};
use crossbeam::channel;
use tracing_subscriber::{fmt, EnvFilter};

use filebench::bench::{format_bytes, BenchmarkSuite, SuiteEvent, SuitePlan, WriteMode};
use filebench::walker::LocalTree;
use filebench::{Config, Implementation};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    Raw,
    Wrapped,
    Both,
}

impl Target {
    fn implementations(self) -> Vec<Implementation> {
        match self {
            Target::Raw => vec![Implementation::Raw],
            Target::Wrapped => vec![Implementation::Wrapped],
            Target::Both => Implementation::ALL.to_vec(),
        }
    }
}

/// filebench
#[derive(Parser, Debug)]
#[command(name = "filebench")]
#[command(about = "Benchmark batched file ingestion into a persistent key-value store")]
#[command(version)]
struct Args {
    /// Files and directories to ingest
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory the stores are created in
    #[arg(short, long, default_value = "./filebench_data")]
    data_dir: PathBuf,

    /// Which store adapter(s) to benchmark
    #[arg(short, long, value_enum, default_value = "both")]
    implementation: Target,

    /// Records per write transaction
    #[arg(short, long, default_value = "500")]
    batch_threshold: usize,

    /// Keys per read transaction
    #[arg(short, long, default_value = "500")]
    read_batch_size: usize,

    /// Entries per directory listing page
    #[arg(short, long, default_value = "100")]
    page_size: usize,

    /// Write over a store left by a previous session instead of a fresh one
    #[arg(long)]
    overwrite: bool,

    /// Keep the stores on disk after the run
    #[arg(long)]
    keep_stores: bool,

    /// Skip the walk-only baseline
    #[arg(long)]
    skip_walk_only: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,filebench=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("filebench v{}", filebench::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .batch_threshold(args.batch_threshold)
        .read_batch_size(args.read_batch_size)
        .list_page_size(args.page_size)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(2);
    }

    let mut roots = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        match LocalTree::root(path) {
            Ok(node) => roots.push(node),
            Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
        }
    }
    if roots.is_empty() {
        tracing::error!("nothing to ingest");
        std::process::exit(2);
    }

    let plan = SuitePlan {
        include_walk_only: !args.skip_walk_only,
        implementations: args.implementation.implementations(),
        write_mode: if args.overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::Fresh
        },
        keep_stores: args.keep_stores,
    };

    let source = LocalTree::new(config.list_page_size);
    let suite = BenchmarkSuite::new(config);
    let (tx, rx) = channel::unbounded();

    let printer = thread::spawn(move || {
        for event in rx {
            match event {
                SuiteEvent::Started { kind, implementation } => match implementation {
                    Some(i) => tracing::debug!("starting {} ({})", kind, i),
                    None => tracing::debug!("starting {}", kind),
                },
                SuiteEvent::Finished(entry) => {
                    println!("{}", entry.result);
                    if let Some(throughput) = entry.result.throughput() {
                        println!("    throughput: {}/s", format_bytes(throughput as u64));
                    }
                    if let Some(error) = entry.error {
                        println!("    failed: {}", error);
                    }
                }
                SuiteEvent::Completed => break,
            }
        }
    });

    let outcome = suite.run(&source, &roots, &plan, &tx);
    drop(tx);
    if printer.join().is_err() {
        tracing::warn!("result printer panicked");
    }

    match outcome {
        Ok(report) => {
            let failed = report.failures().count();
            if failed > 0 {
                tracing::warn!("{} benchmark(s) failed", failed);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            std::process::exit(1);
        }
    }
}
