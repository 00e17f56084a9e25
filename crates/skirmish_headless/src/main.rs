//! Headless skirmish runner.
//!
//! This binary runs matches without graphics, controlled via JSON on
//! stdin/stdout or driven by scenario files.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p skirmish_headless
//!
//! # Play a scenario on the wall clock, printing the board every second
//! cargo run -p skirmish_headless -- play --scenario scenarios/mirror.ron --realtime --board-every 1000
//!
//! # Run a batch of seeded matches
//! cargo run -p skirmish_headless -- batch --count 200 --output results/
//!
//! # Render the board after 300 ticks
//! cargo run -p skirmish_headless -- render --ticks 300
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information; `RUST_LOG` overrides `--verbose`

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skirmish_core::components::Team;
use skirmish_core::snapshot::SnapshotBuffer;
use skirmish_headless::{
    ascii_visualizer::{render_board, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    clock::{drive, realtime_run},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::{Scenario, ScenarioReport, ScenarioRun},
};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless lane-defense skirmish runner for scripting and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a match with JSON commands on stdin
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,
    },

    /// Play a scenario to the end
    Play {
        /// Scenario file (built-in mirror skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Pace ticks, elixir and the match timer on the wall clock
        #[arg(long)]
        realtime: bool,

        /// Speed-up factor for real-time play
        #[arg(long, default_value = "1")]
        speed: u32,

        /// Stop the match after this many wall-clock seconds
        #[arg(long)]
        stop_after: Option<u64>,

        /// Print the board to stderr at this interval (milliseconds)
        #[arg(long)]
        board_every: Option<u64>,

        /// Disable ANSI colors in board output
        #[arg(long)]
        no_color: bool,
    },

    /// Run a batch of seeded matches in parallel
    Batch {
        /// Scenario file (built-in mirror skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Extra seeded deployments per team
        #[arg(long, default_value = "4")]
        extra: u32,

        /// Tick cap for scenarios without one
        #[arg(long, default_value = "3000")]
        max_ticks: u64,
    },

    /// Verify a scenario plays out identically every time
    Verify {
        /// Scenario file (built-in mirror skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },

    /// Print the ASCII board after a number of ticks
    Render {
        /// Scenario file (built-in mirror skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Ticks to simulate before rendering
        #[arg(short, long, default_value = "100")]
        ticks: u64,

        /// Show the grid overlay indices
        #[arg(long)]
        grid: bool,

        /// Disable ANSI colors
        #[arg(long)]
        no_color: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_filter = env_filter
        .is_none()
        .then(|| LevelFilter::from_level(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(env_filter)
        .with(level_filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
        }) => {
            cmd_run(scenario.as_deref(), auto_state);
        }
        Some(Commands::Play {
            scenario,
            realtime,
            speed,
            stop_after,
            board_every,
            no_color,
        }) => {
            let ascii = AsciiConfig {
                use_color: !no_color,
                ..Default::default()
            };
            if realtime {
                cmd_play_realtime(scenario.as_deref(), speed, stop_after, board_every, &ascii);
            } else {
                cmd_play(scenario.as_deref(), &ascii);
            }
        }
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            extra,
            max_ticks,
        }) => {
            cmd_batch(BatchConfig {
                scenario,
                match_count: count,
                parallel,
                output_dir: output,
                seed_start: seed,
                extra_deployments: extra,
                max_ticks,
            });
        }
        Some(Commands::Verify { scenario, runs }) => {
            cmd_verify(scenario.as_deref(), runs);
        }
        Some(Commands::Render {
            scenario,
            ticks,
            grid,
            no_color,
        }) => {
            cmd_render(scenario.as_deref(), ticks, grid, !no_color);
        }
        None => {
            // Default: interactive mode on the empty arena
            cmd_run(None, false);
        }
    }
}

/// Load a scenario or exit with a message.
fn load_scenario(path: Option<&Path>) -> Scenario {
    match Scenario::load_or_default(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load scenario");
            eprintln!("Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    }
}

fn start_run(scenario: &Scenario) -> ScenarioRun {
    match ScenarioRun::new(scenario) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Failed to start scenario: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_report(report: &ScenarioReport) {
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("MATCH REPORT: {}", report.name);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {}", report.ticks);
    match report.outcome {
        Some(outcome) => {
            let winner = outcome
                .winner
                .map_or_else(|| "draw".to_string(), |t| format!("team {}", u8::from(t)));
            eprintln!("Result: {} ({:?} at tick {})", winner, outcome.reason, outcome.tick);
        }
        None => eprintln!("Result: unfinished"),
    }
    eprintln!("Crowns: {} - {}", report.crowns[0], report.crowns[1]);
    eprintln!(
        "Deployments: {} placed, {} rejected",
        report.units_deployed, report.deployments_rejected
    );
    eprintln!("State hash: {:016x}", report.state_hash);
}

/// Run an interactive session on stdin/stdout.
fn cmd_run(scenario: Option<&Path>, auto_state: bool) {
    tracing::info!("Starting interactive session");

    let scenario = match scenario {
        Some(path) => load_scenario(Some(path)),
        None => Scenario::default(),
    };
    let mut runner = match HeadlessRunner::new(&scenario, HeadlessConfig { auto_state }) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start runner: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = runner.serve(stdin.lock(), stdout.lock()) {
        tracing::error!(error = %e, "I/O failure");
        std::process::exit(1);
    }
}

/// Play a scenario as fast as possible.
fn cmd_play(scenario: Option<&Path>, ascii: &AsciiConfig) {
    let scenario = load_scenario(scenario);
    let mut run = start_run(&scenario);
    let report = run.run_to_end();

    println!("{}", render_board(run.game().grid(), &run.game().snapshot(), ascii));
    print_report(&report);
}

/// Play a scenario on the wall clock.
fn cmd_play_realtime(
    scenario: Option<&Path>,
    speed: u32,
    stop_after: Option<u64>,
    board_every: Option<u64>,
    ascii: &AsciiConfig,
) {
    let scenario = load_scenario(scenario);
    let (run, timing) = match realtime_run(&scenario) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Failed to start scenario: {}", e);
            std::process::exit(1);
        }
    };
    let timing = timing.accelerated(speed);
    let grid = run.game().grid().clone();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let buffer = SnapshotBuffer::new(run.game().snapshot());
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let report = runtime.block_on(async {
        if let Some(secs) = stop_after {
            let stop_tx = stop_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                let _ = stop_tx.send(true);
            });
        }

        let viewer = board_every.map(|ms| {
            let buffer = buffer.clone();
            let grid = grid.clone();
            let ascii = ascii.clone();
            tokio::spawn(async move {
                let mut every = tokio::time::interval(Duration::from_millis(ms.max(1)));
                loop {
                    every.tick().await;
                    let snapshot = buffer.latest();
                    eprintln!("{}", render_board(&grid, &snapshot, &ascii));
                    if snapshot.outcome.is_some() {
                        break;
                    }
                }
            })
        });

        let report = drive(run, timing, buffer.clone(), stop_rx).await;
        if let Some(viewer) = viewer {
            viewer.abort();
        }
        report
    });
    drop(stop_tx);

    println!("{}", render_board(&grid, &buffer.latest(), ascii));
    print_report(&report);
}

/// Run a batch of seeded matches and save the results.
fn cmd_batch(config: BatchConfig) {
    let scenario = load_scenario(config.scenario.as_deref());

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        tracing::error!(error = %e, "Failed to create output directory");
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        scenario = %scenario.name,
        count = config.match_count,
        parallel = config.parallel,
        seed = config.seed_start,
        output = %config.output_dir.display(),
        "Starting batch"
    );

    let results_path = config.output_dir.join("batch_results.json");
    let results = run_batch(config, &scenario);

    if let Err(e) = results.save(&results_path) {
        eprintln!("Failed to save results: {}", e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches completed: {}", summary.matches);
    if !results.errors.is_empty() {
        eprintln!("Matches FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} matches/sec",
        f64::from(summary.matches) / results.duration_seconds.max(0.001)
    );
    eprintln!("\nResults:");
    eprintln!(
        "  Team 0 wins: {} ({:.1}%)",
        summary.top_wins,
        summary.win_rate(Team::TOP) * 100.0
    );
    eprintln!(
        "  Team 1 wins: {} ({:.1}%)",
        summary.bottom_wins,
        summary.win_rate(Team::BOTTOM) * 100.0
    );
    eprintln!("  Draws: {}", summary.draws);
    eprintln!("  Unfinished: {}", summary.unfinished);
    eprintln!("  Average length: {:.0} ticks", summary.average_ticks);
    eprintln!("  Distinct outcomes: {}", summary.distinct_outcomes);

    if !results.errors.is_empty() {
        eprintln!("\nFAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!("  Match {} (seed {}): {}", error.index, error.seed, error.message);
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism.
fn cmd_verify(scenario: Option<&Path>, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, runs, "Verifying determinism");

    match verify_determinism(&scenario, runs) {
        Ok(true) => eprintln!("PASS: All {} runs produced identical results", runs),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: {}", e);
            std::process::exit(1);
        }
    }
}

/// Simulate some ticks and print the board.
fn cmd_render(scenario: Option<&Path>, ticks: u64, grid: bool, use_color: bool) {
    let scenario = load_scenario(scenario);
    let mut run = start_run(&scenario);
    for _ in 0..ticks {
        if run.is_done() {
            break;
        }
        if let Err(e) = run.step() {
            tracing::warn!(error = %e, "Render run halted");
            break;
        }
    }
    if grid {
        run.game_mut().toggle_grid_overlay();
    }

    let ascii = AsciiConfig {
        use_color,
        ..Default::default()
    };
    println!("{}", render_board(run.game().grid(), &run.game().snapshot(), &ascii));
}
