use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use lv_grid::config::{default_config_path, GridConfig, TriggerPolicy};
use lv_grid::grid::Grid;
use lv_grid::layout;
use lv_grid::manifest::{self, Manifest, ManifestSource};
use lv_grid::observer::SimulatedViewport;
use lv_grid::transport::AutoFetcher;

/// Row height and viewport height used by the headless proximity simulation.
const SIM_ROW_PX: u32 = 300;
const SIM_VIEWPORT_PX: u32 = 900;

#[derive(Parser, Debug)]
#[command(name = "lv-grid", version, about = "Progressive masonry grid loader")]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Config file (default: per-user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the column layout for a manifest
    Plan {
        /// Manifest URL, JSON file or image directory
        #[arg(long)]
        manifest: Option<String>,
        #[arg(long)]
        columns: Option<usize>,
        /// Fixed shuffle seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Drive a grid headless until every tile has loaded or failed
    Run {
        #[arg(long)]
        manifest: Option<String>,
        /// Base URL or directory for full-resolution assets (default: the
        /// manifest directory when scanning one)
        #[arg(long)]
        assets: Option<String>,
        #[arg(long)]
        columns: Option<usize>,
        #[arg(long)]
        batch: Option<usize>,
        /// timer | proximity
        #[arg(long)]
        policy: Option<TriggerPolicy>,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Pixels scrolled per tick under the proximity policy
        #[arg(long, default_value_t = 150)]
        scroll_px: u32,
        #[arg(long, default_value_t = 1000)]
        max_ticks: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = GridConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Plan {
            manifest,
            columns,
            seed,
        } => {
            if let Some(c) = columns {
                config.column_count = c;
            }
            if manifest.is_some() {
                config.manifest = manifest;
            }
            config.validate()?;
            plan(&config, seed);
        }
        Commands::Run {
            manifest,
            assets,
            columns,
            batch,
            policy,
            interval_ms,
            scroll_px,
            max_ticks,
            seed,
        } => {
            if let Some(c) = columns {
                config.column_count = c;
            }
            if let Some(b) = batch {
                config.batch_size = b;
            }
            if let Some(p) = policy {
                config.trigger_policy = p;
            }
            if let Some(ms) = interval_ms {
                config.timer_interval_ms = ms;
            }
            if manifest.is_some() {
                config.manifest = manifest;
            }
            config.validate()?;
            run(config, assets, seed, scroll_px, max_ticks);
        }
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn manifest_source(config: &GridConfig) -> Option<ManifestSource> {
    config.manifest.as_deref().map(ManifestSource::parse)
}

fn load_manifest(config: &GridConfig, source: Option<&ManifestSource>) -> Manifest {
    manifest::load_or_fallback(source, config.fallback_count, config.fetch_timeout())
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

fn plan(config: &GridConfig, seed: Option<u64>) {
    let manifest = load_manifest(config, manifest_source(config).as_ref());
    let planned = layout::plan(&manifest, config.column_count, &mut rng(seed));

    println!(
        "{} images, {} columns, {} rows",
        planned.len(),
        planned.column_count(),
        planned.row_count()
    );
    for (c, cells) in planned.columns().iter().enumerate() {
        let names: Vec<String> = cells
            .iter()
            .filter_map(|&i| planned.entry(i))
            .map(|e| format!("#{} {}", e.visual_index, e.descriptor.processed_filename))
            .collect();
        println!("column {}: {}", c, names.join(", "));
    }
}

fn run(
    mut config: GridConfig,
    assets: Option<String>,
    seed: Option<u64>,
    scroll_px: u32,
    max_ticks: usize,
) {
    let source = manifest_source(&config);
    match (assets, &source) {
        (Some(base), _) => config.asset_base_url = base,
        (None, Some(s)) => {
            config.adopt_source_base(s);
        }
        (None, None) => {}
    }
    let manifest = load_manifest(&config, source.as_ref());
    let fetcher = Arc::new(AutoFetcher::new(config.fetch_timeout()));
    let viewport = SimulatedViewport::new(SIM_ROW_PX, SIM_VIEWPORT_PX);
    let mut grid = Grid::new(config, fetcher, viewport);

    let started = Instant::now();
    grid.mount(&manifest, &mut rng(seed), started);
    println!(
        "Loading {} images ({:?} policy)...",
        grid.layout().len(),
        grid.policy()
    );

    let mut ticks = 0usize;
    while !grid.is_settled() && ticks < max_ticks {
        ticks += 1;
        if grid.policy() == TriggerPolicy::Proximity {
            grid.observer_mut().scroll_by(scroll_px);
        }
        let before = grid.stats();
        grid.pump(Instant::now());

        // Apply fetches until the next timer firing (or a short poll window).
        let until = grid
            .next_timer_due()
            .unwrap_or_else(|| Instant::now() + Duration::from_millis(50));
        loop {
            let now = Instant::now();
            if now >= until || grid.in_flight() == 0 {
                break;
            }
            grid.wait_for_fetch(until - now);
        }
        if grid.in_flight() == 0 {
            if let Some(due) = grid.next_timer_due() {
                std::thread::sleep(due.saturating_duration_since(Instant::now()));
            }
        }

        let after = grid.stats();
        if after != before {
            tracing::info!(
                "tick {}: frontier {}/{}, {} loaded, {} failed, {} loading",
                ticks,
                after.eligible,
                after.total,
                after.loaded,
                after.failed,
                after.loading
            );
        }
    }

    let stats = grid.stats();
    for (c, col) in grid.columns().iter().enumerate() {
        let marks: String = col
            .iter()
            .map(|t| {
                if t.broken {
                    'x'
                } else if t.blurred {
                    '.'
                } else {
                    '#'
                }
            })
            .collect();
        println!("column {}: {}", c, marks);
    }
    println!(
        "Done in {:.1}s, {} ticks. {} loaded, {} failed, {} pending.",
        started.elapsed().as_secs_f64(),
        ticks,
        stats.loaded,
        stats.failed,
        stats.total - stats.settled()
    );
    grid.unmount();
}
