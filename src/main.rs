//! imagefetch CLI
//!
//! Fetches images through the two-tier cache, or clears cached entries.
//!
//! ```text
//! imagefetch [--config FILE] [--cache-dir DIR] fetch URL... [--force] [--memory] [--no-disk]
//! imagefetch [--config FILE] [--cache-dir DIR] clear URL...
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use image::GenericImageView;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imagefetch::{ByteCount, CoordinatorConfig, FetchCoordinator, FetchOptions, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image fetcher with memory and disk caching
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "IMAGEFETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Disk cache directory (overrides the config file)
    #[arg(long, env = "IMAGEFETCH_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Memory cache budget, e.g. 4MB
    #[arg(long, env = "IMAGEFETCH_MEMORY_CAPACITY")]
    memory_capacity: Option<ByteCount>,

    /// Disk cache budget, e.g. 50MB
    #[arg(long, env = "IMAGEFETCH_DISK_CAPACITY")]
    disk_capacity: Option<ByteCount>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "IMAGEFETCH_HTTP_TIMEOUT_SECS")]
    http_timeout_secs: Option<u64>,

    /// Print counters in Prometheus text format when done
    #[arg(long)]
    metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one or more images
    Fetch {
        /// Image URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Go to the network even on a cache hit
        #[arg(long)]
        force: bool,

        /// Keep fetched images in the memory tier
        #[arg(long)]
        memory: bool,

        /// Do not persist fetched images to disk
        #[arg(long)]
        no_disk: bool,
    },
    /// Invalidate cached copies of one or more images
    Clear {
        /// Image URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "imagefetch failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when any fetch failed
async fn run(args: Args) -> Result<bool> {
    let config = load_config(&args)?;
    info!(
        memory = %config.memory_capacity,
        disk = %config.disk_capacity,
        cache_dir = ?config.cache_dir,
        "starting imagefetch"
    );

    let coordinator = FetchCoordinator::from_config(&config).await?;

    let all_ok = match args.command {
        Command::Fetch {
            urls,
            force,
            memory,
            no_disk,
        } => {
            let options = FetchOptions::default()
                .force_remote(force)
                .in_memory(memory)
                .in_disk(!no_disk);

            let outcomes = join_all(urls.iter().map(|url| {
                let coordinator = &coordinator;
                async move {
                    let mut results = coordinator.updates(url, options);
                    let mut ok = true;
                    while let Some(result) = results.next_result().await {
                        match result {
                            Ok(image) => {
                                let (width, height) = image.dimensions();
                                println!("{}\tok\t{}x{}", url, width, height);
                            }
                            Err(e) => {
                                println!("{}\terror\t{}", url, e);
                                ok = false;
                            }
                        }
                    }
                    ok
                }
            }))
            .await;
            outcomes.into_iter().all(|ok| ok)
        }
        Command::Clear { urls } => {
            let mut ok = true;
            for url in &urls {
                match coordinator.clear_cache(url) {
                    Ok(()) => println!("{}\tcleared", url),
                    Err(e) => {
                        println!("{}\terror\t{}", url, e);
                        ok = false;
                    }
                }
            }
            ok
        }
    };

    // Let queued disk work land before exiting
    coordinator.flush().await;

    if args.metrics {
        match coordinator.metrics().to_prometheus() {
            Ok(text) => print!("{}", text),
            Err(e) => error!(error = %e, "failed to render metrics"),
        }
    }

    Ok(all_ok)
}

/// Config file (if any) with CLI overrides applied
fn load_config(args: &Args) -> Result<CoordinatorConfig> {
    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_yaml_file(path)?,
        None => CoordinatorConfig::default(),
    };

    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(capacity) = args.memory_capacity {
        config.memory_capacity = capacity;
    }
    if let Some(capacity) = args.disk_capacity {
        config.disk_capacity = capacity;
    }
    if let Some(secs) = args.http_timeout_secs {
        config.http_timeout_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries results; logs go to stderr
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
