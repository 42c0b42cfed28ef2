//! TreeScout CLI - prefetch a directory tree into the local cache.
//!
//! Scans the given root in the background worker pool, persisting every
//! directory listing to the on-disk cache so subsequent runs (or an
//! embedding application) start warm.

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use treescout::cache::DirectoryCache;
use treescout::indexer::NullIndexer;
use treescout::loader::{DirectoryLoader, FsDirectoryLoader};
use treescout::logging::init_logging;
use treescout::scan::{CacheAwareCoordinator, CoordinatorConfig, ScanEvents, ScanStatus};
use treescout::store::{DiskStore, MemoryStore, RecordStore};
use treescout::tree::{ScanTarget, TreeNode};

use error::CliError;

#[derive(Parser)]
#[command(name = "treescout")]
#[command(version = treescout::VERSION)]
#[command(about = "Prefetch a directory tree into the local cache", long_about = None)]
struct Args {
    /// Root directory to scan
    path: PathBuf,

    /// Number of concurrent scan workers
    #[arg(long, default_value = "3")]
    workers: usize,

    /// Maximum directory depth to descend
    #[arg(long, default_value = "12")]
    max_depth: u32,

    /// Stop after scanning this many directories
    #[arg(long)]
    max_dirs: Option<u64>,

    /// Cache directory (defaults to the platform cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Scan without reading or writing the disk cache
    #[arg(long)]
    no_cache: bool,

    /// Directory for the session log file (console only when omitted)
    #[arg(long)]
    log_dir: Option<String>,

    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints scan progress milestones and errors to the console.
struct ConsoleEvents;

impl ScanEvents for ConsoleEvents {
    fn on_status(&self, status: &ScanStatus) {
        if let Some(m) = &status.milestone {
            println!(
                "  {} dirs scanned in {:.1}s ({} pending, {} deferred)",
                m.processed_count,
                m.elapsed_ms as f64 / 1000.0,
                m.pending,
                m.deferred
            );
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("  warning: {}", message);
    }
}

fn cache_root(args: &Args) -> PathBuf {
    args.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("treescout")
    })
}

async fn run(args: Args) -> Result<(), CliError> {
    let _guard =
        init_logging(args.log_dir.as_deref(), if args.verbose { "debug" } else { "info" })
            .map_err(CliError::LoggingInit)?;

    let root_path = args
        .path
        .canonicalize()
        .map_err(|error| CliError::InvalidRoot {
            path: args.path.display().to_string(),
            error,
        })?;
    let source = root_path.display().to_string();

    let store: Arc<dyn RecordStore> = if args.no_cache {
        Arc::new(MemoryStore::new())
    } else {
        let cache_path = cache_root(&args);
        let disk = DiskStore::open(&cache_path)
            .await
            .map_err(|error| CliError::CacheOpen {
                path: cache_path.display().to_string(),
                error,
            })?;
        Arc::new(disk)
    };

    let loader = Arc::new(FsDirectoryLoader::new());
    let name = root_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.clone());

    // One synchronous pass over the root gives the seed tree; the
    // coordinator drains everything below it.
    let root_target = ScanTarget {
        path: source.clone(),
        name,
        depth: 0,
        parent_path: None,
    };
    let root: TreeNode = match loader.load_directory(root_target).await {
        Ok(Some(node)) => node,
        Ok(None) => {
            return Err(CliError::InvalidRoot {
                path: source,
                error: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
            })
        }
        Err(e) => return Err(CliError::RootScan(e)),
    };

    let cache = Arc::new(DirectoryCache::new("treescout", Arc::clone(&store)));
    let config = CoordinatorConfig::default()
        .with_worker_count(args.workers)
        .with_max_depth(args.max_depth)
        .with_max_prefetched_dirs(args.max_dirs);
    let coordinator = CacheAwareCoordinator::new(
        loader,
        Arc::new(NullIndexer),
        Arc::new(ConsoleEvents),
        config,
        Arc::clone(&cache),
        Some(store),
    );

    let root_child_names: Vec<String> = root.children.iter().map(|c| c.name.clone()).collect();
    if coordinator.restore_checkpoint(&root_child_names).await {
        println!("Resuming from previous session");
    }

    println!("Scanning {source}");
    let started = Instant::now();
    coordinator.seed_tree(&source, Some(&root)).await;
    coordinator.wait_idle().await;

    let status = coordinator.status().await;
    let stats = coordinator.cache_stats().await;
    let elapsed = started.elapsed();
    println!();
    println!(
        "Done: {} directories, {} files indexed in {:.1}s",
        status.processed_count,
        status.indexed_file_count,
        elapsed.as_secs_f64()
    );
    println!(
        "Cache: {} entries, {:.0}% hit rate, ~{} KiB",
        stats.total_entries,
        stats.hit_rate * 100.0,
        stats.estimated_size_bytes / 1024
    );
    info!(
        processed = status.processed_count,
        indexed = status.indexed_file_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "scan session complete"
    );

    coordinator.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        e.exit();
    }
}
