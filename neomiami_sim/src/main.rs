//! Neo-Miami twin harness CLI
//!
//! Runs the telemetry simulator and scene animators headlessly on a virtual
//! clock, or live on the Tokio clock.

use clap::Parser;
use neomiami_env::Viewport;
use neomiami_sim::{run_live, HarnessConfig, HarnessResult, HarnessRunner, LiveConfig, Variant};
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Neo-Miami digital twin harness
#[derive(Parser, Debug)]
#[command(name = "neomiami-sim")]
#[command(about = "Deterministic runs of the Neo-Miami IoT twin", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Variant to run (neo-miami, cube, all)
    #[arg(short = 'V', long, default_value = "all")]
    variant: String,

    /// Telemetry ticks per run (3.2 s each)
    #[arg(short, long, default_value = "10")]
    ticks: u64,

    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Frames per second (1-1000)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=1000))]
    fps: u32,

    /// Surface width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Surface height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Record every Nth frame into the export
    #[arg(long, default_value = "30")]
    capture_every: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the recording to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Run the real drivers on the wall clock
    #[arg(long)]
    live: bool,

    /// Live mode: stop after this many seconds (default: until Ctrl-C)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Live mode: open the terminal dashboard
    #[arg(long)]
    dashboard: bool,

    /// Live mode: stream to a Rerun viewer
    #[arg(long)]
    visualize: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let viewport = Viewport::new(args.width, args.height).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // Parse variants
    let variants: Vec<Variant> = if args.variant == "all" {
        Variant::all()
    } else {
        vec![args.variant.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available variants: neo-miami, cube, all");
            std::process::exit(1);
        })]
    };

    if args.live {
        if variants.len() > 1 {
            eprintln!("Error: --live runs a single variant, not 'all'");
            std::process::exit(1);
        }
        run_live_mode(&args, variants[0], viewport);
        return;
    }

    if !args.json {
        info!("Neo-Miami Twin Harness v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if variants.len() > 1 || args.seeds > 1 {
            eprintln!("Error: --export only supports a single variant and seed");
            std::process::exit(1);
        }

        let runner = HarnessRunner::with_config(harness_config(&args, base_seed, viewport));
        let result = run_or_exit(&runner, variants[0]);

        if let Err(e) = result.recording.write_to_file(export_path) {
            error!("Failed to write export: {:?}", e);
            std::process::exit(1);
        }
        info!(
            "Exported {} snapshots and {} frames to {}",
            result.recording.snapshots.len(),
            result.recording.frames.len(),
            export_path
        );

        if !result.passed {
            error!(
                "✗ {} FAILED: {}",
                result.variant.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        info!("✓ {} (seed={}) PASSED", result.variant.name(), base_seed);
        return;
    }

    // Track results
    let mut all_results: Vec<HarnessResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = HarnessRunner::with_config(harness_config(&args, seed, viewport));

        for variant in &variants {
            let result = run_or_exit(&runner, *variant);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED | {} ticks, {} frames, {:.1}% offline",
                        variant.name(),
                        seed,
                        result.total_ticks,
                        result.total_frames,
                        result.metrics.offline_rate() * 100.0
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        variant.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "variant": r.variant.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "frames": r.total_frames,
                    "time_secs": r.final_time_secs,
                    "offline_rate": r.metrics.offline_rate(),
                    "resources_leaked": r.metrics.resources_leaked,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.variant.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

fn harness_config(args: &Args, seed: u64, viewport: Viewport) -> HarnessConfig {
    HarnessConfig {
        seed,
        ticks: args.ticks,
        fps: args.fps,
        capture_every: args.capture_every,
        viewport,
        ..Default::default()
    }
}

fn run_or_exit(runner: &HarnessRunner, variant: Variant) -> HarnessResult {
    runner.run(variant).unwrap_or_else(|e| {
        error!("{} could not start: {}", variant.name(), e);
        std::process::exit(2);
    })
}

fn run_live_mode(args: &Args, variant: Variant, viewport: Viewport) {
    let config = LiveConfig {
        variant,
        duration: args
            .duration
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64),
        fps: args.fps,
        viewport,
        dashboard: args.dashboard,
        visualize: args.visualize,
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(2);
        }
    };

    match runtime.block_on(run_live(config)) {
        Ok(0) => info!("✓ live session closed cleanly"),
        Ok(leaked) => {
            error!("✗ {} resources leaked", leaked);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Live session failed: {}", e);
            std::process::exit(2);
        }
    }
}
