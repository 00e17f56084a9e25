//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a match produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the harness guards against:
//!
//! - **Floating-point math**: the tick uses [`skirmish_core::math::Fixed`] throughout.
//! - **Hash map iteration order**: units are processed in id order and
//!   A* breaks ties with an insertion counter.
//! - **System randomness**: the core has none.

use std::thread;

use skirmish_core::components::Team;
use skirmish_core::simulation::Match;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::reference_match;
///
/// let result = verify_determinism(
///     5,
///     100,
///     reference_match,
///     |game| { let _ = game.tick(); },
///     |game| game.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a match setup `runs` times for `ticks` ticks and compare final hashes.
///
/// Ticks past the end of the match are ignored.
pub fn verify_match_determinism<F>(setup_fn: F, runs: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Match,
{
    verify_determinism(
        runs,
        ticks,
        setup_fn,
        |game| {
            if !game.is_finished() {
                let _ = game.tick();
            }
        },
        Match::state_hash,
    )
}

/// Run the same setup on scoped threads and collect final hashes.
pub fn run_parallel_matches<F>(setup_fn: F, num_matches: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Match + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_matches)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    game.run_for(ticks);
                    game.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .collect()
    });

    let is_deterministic =
        hashes.len() == num_matches && hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Compare two runs tick by tick and report the first tick they differ.
///
/// `None` when they agree for all `ticks`.
pub fn find_first_divergence<F>(setup_fn: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Match,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        let ra = a.tick();
        let rb = b.tick();
        if ra.is_err() != rb.is_err() || a.state_hash() != b.state_hash() {
            return Some(tick);
        }
        if ra.is_err() {
            break;
        }
    }

    None
}

/// A template deployment at a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Tick at which to deploy.
    pub tick: u64,
    /// Template name.
    pub template: String,
    /// Team.
    pub team: Team,
    /// Cell column.
    pub col: i32,
    /// Cell row.
    pub row: i32,
}

/// Build a reference match that spawns `deployments` at their ticks
/// while running. Failed spawns are skipped.
pub fn run_with_deployments(deployments: &[Deployment], ticks: u64) -> Match {
    let mut game = Match::default();
    for tick in 0..ticks {
        for d in deployments.iter().filter(|d| d.tick == tick) {
            if let Err(err) = game.spawn_from_template(&d.template, d.team, d.col, d.row) {
                tracing::debug!(error = %err, "Deployment skipped");
            }
        }
        if game.tick().is_err() {
            break;
        }
    }
    game
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::components::Team;

    use super::Deployment;

    /// Names in the default roster.
    pub const ROSTER: [&str; 5] = ["Knight", "Archer", "Skeleton", "Giant", "BabyDragon"];

    /// A team.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        prop_oneof![Just(Team::TOP), Just(Team::BOTTOM)]
    }

    /// A deployment on the team's own half of the reference arena.
    pub fn arb_deployment(max_tick: u64) -> impl Strategy<Value = Deployment> {
        (0..max_tick, 0..ROSTER.len(), arb_team(), 0i32..36, 0i32..28).prop_map(
            |(tick, kind, team, col, depth)| Deployment {
                tick,
                template: ROSTER[kind].to_string(),
                team,
                col,
                row: if team == Team::TOP { 2 + depth } else { 61 - depth },
            },
        )
    }

    /// Up to `max_len` deployments.
    pub fn arb_deployments(max_len: usize, max_tick: u64) -> impl Strategy<Value = Vec<Deployment>> {
        prop::collection::vec(arb_deployment(max_tick), 0..=max_len)
    }
}
