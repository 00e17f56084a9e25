//! Batch match runner.
//!
//! Runs many matches in parallel using rayon. Each match plays the base
//! scenario plus a seeded set of extra deployments, so a batch covers
//! varied games while every single game stays reproducible from its seed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use skirmish_core::components::Team;
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioDeployment, ScenarioReport, ScenarioRun};

/// Names drawn from by the seeded deployment generator.
pub const BATCH_ROSTER: [&str; 5] = ["Knight", "Archer", "Skeleton", "Giant", "BabyDragon"];

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario file; the built-in skirmish when absent.
    pub scenario: Option<PathBuf>,
    /// Number of matches to run.
    pub match_count: u32,
    /// Maximum parallel matches (0 = use rayon default).
    pub parallel: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// Starting seed.
    pub seed_start: u64,
    /// Extra seeded deployments per team.
    pub extra_deployments: u32,
    /// Tick cap per match when the scenario has none.
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: None,
            match_count: 100,
            parallel: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            extra_deployments: 4,
            max_ticks: 3_000,
        }
    }
}

impl BatchConfig {
    /// Config for a number of matches of the built-in scenario.
    #[must_use]
    pub fn new(match_count: u32) -> Self {
        Self {
            match_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// One finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMatch {
    /// Position in the batch.
    pub index: u32,
    /// Seed for the extra deployments.
    pub seed: u64,
    /// Match summary.
    pub report: ScenarioReport,
}

/// Error during batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Position in the batch.
    pub index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Matches completed.
    pub matches: u32,
    /// Wins for team 0.
    pub top_wins: u32,
    /// Wins for team 1.
    pub bottom_wins: u32,
    /// Matches ending level.
    pub draws: u32,
    /// Matches still running at the tick cap.
    pub unfinished: u32,
    /// Mean match length in ticks.
    pub average_ticks: f64,
    /// Distinct final state hashes.
    pub distinct_outcomes: usize,
}

impl BatchSummary {
    /// Tally a set of matches.
    #[must_use]
    pub fn from_matches(matches: &[BatchMatch]) -> Self {
        let mut summary = Self {
            matches: u32::try_from(matches.len()).unwrap_or(u32::MAX),
            ..Default::default()
        };
        let mut hashes = BTreeSet::new();
        let mut total_ticks = 0u64;
        for m in matches {
            total_ticks += m.report.ticks;
            hashes.insert(m.report.state_hash);
            match m.report.outcome {
                None => summary.unfinished += 1,
                Some(outcome) => match outcome.winner {
                    Some(Team::TOP) => summary.top_wins += 1,
                    Some(_) => summary.bottom_wins += 1,
                    None => summary.draws += 1,
                },
            }
        }
        summary.distinct_outcomes = hashes.len();
        if !matches.is_empty() {
            summary.average_ticks = total_ticks as f64 / matches.len() as f64;
        }
        summary
    }

    /// Fraction of completed matches won by a team.
    #[must_use]
    pub fn win_rate(&self, team: Team) -> f64 {
        let wins = if team == Team::TOP {
            self.top_wins
        } else {
            self.bottom_wins
        };
        f64::from(wins) / f64::from(self.matches.max(1))
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual matches, in index order.
    pub matches: Vec<BatchMatch>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Matches that could not be set up.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Small deterministic generator for batch variation.
#[derive(Debug, Clone)]
pub struct DeploymentRng {
    state: u64,
}

impl DeploymentRng {
    /// Generator for a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(0x5_DEEC_E66D).wrapping_add(11);
        self.state >> 16
    }

    /// Value in `[min, max)`; `min` when the range is empty.
    pub fn next_range(&mut self, min: i64, max: i64) -> i64 {
        let span = max.saturating_sub(min);
        if span <= 0 {
            return min;
        }
        min + (self.next_u64() % span.unsigned_abs()) as i64
    }
}

/// Seeded deployments: `per_team` units for each team on its own half,
/// mirrored in count and timing.
#[must_use]
pub fn seeded_deployments(seed: u64, per_team: u32, max_tick: u64) -> Vec<ScenarioDeployment> {
    let mut rng = DeploymentRng::new(seed);
    let latest = i64::try_from(max_tick.max(1)).unwrap_or(i64::MAX);
    let mut out = Vec::new();
    for _ in 0..per_team {
        let tick = rng.next_range(0, latest) as u64;
        for team in Team::ALL {
            let template = BATCH_ROSTER[rng.next_range(0, BATCH_ROSTER.len() as i64) as usize];
            let col = rng.next_range(1, 35) as i32;
            let depth = rng.next_range(0, 12) as i32;
            let row = if team == Team::TOP { 16 + depth } else { 47 - depth };
            out.push(ScenarioDeployment::new(tick, template, team, col, row));
        }
    }
    out
}

/// Play one match of the batch.
fn run_single_match(base: &Scenario, seed: u64, config: &BatchConfig) -> Result<ScenarioReport, String> {
    let mut scenario = base.clone();
    if scenario.max_ticks == 0 {
        scenario.max_ticks = config.max_ticks;
    }
    let window = scenario.max_ticks.max(1) / 2;
    scenario
        .deployments
        .extend(seeded_deployments(seed, config.extra_deployments, window));

    let mut run = ScenarioRun::new(&scenario).map_err(|e| e.to_string())?;
    Ok(run.run_to_end())
}

/// Run a batch of matches.
pub fn run_batch(config: BatchConfig, base: &Scenario) -> BatchResults {
    let start = Instant::now();
    info!(
        matches = config.match_count,
        scenario = %base.name,
        "Starting batch run"
    );

    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok();
    }

    let results: Vec<Result<BatchMatch, BatchError>> = (0..config.match_count)
        .into_par_iter()
        .map(|index| {
            let seed = config.seed_start.wrapping_add(u64::from(index));
            match run_single_match(base, seed, &config) {
                Ok(report) => {
                    debug!(index, seed, ticks = report.ticks, "Match complete");
                    Ok(BatchMatch { index, seed, report })
                }
                Err(message) => {
                    warn!(index, seed, error = %message, "Match failed");
                    Err(BatchError {
                        index,
                        seed,
                        message,
                    })
                }
            }
        })
        .collect();

    let (matches, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let matches: Vec<BatchMatch> = matches.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_matches(&matches);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        matches = matches.len(),
        seconds = duration_seconds,
        "Batch complete"
    );

    BatchResults {
        config,
        matches,
        summary,
        duration_seconds,
        errors,
    }
}

/// Play the scenario `runs` times and check every final hash matches.
pub fn verify_determinism(scenario: &Scenario, runs: u32) -> Result<bool, String> {
    let hashes: Vec<u64> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| {
            ScenarioRun::new(scenario)
                .map(|mut run| run.run_to_end().state_hash)
                .map_err(|e| e.to_string())
        })
        .collect::<Result<_, _>>()?;
    Ok(hashes.windows(2).all(|w| w[0] == w[1]))
}
