//! Headless skirmish runner for scripted play, CI and balance runs.
//!
//! This crate drives a [`skirmish_core`] match without graphics:
//!
//! - **Scripted control**: a controller plays the match over JSON lines
//! - **Scenarios**: RON files with config, templates and timed deployments
//! - **Real-time play**: tokio timers for ticks, elixir and the match clock
//! - **Batch runs**: many seeded matches in parallel with rayon
//! - **Determinism checks**: replay a scenario and compare state hashes
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (tick, deploy, query, ...)
//! - **stdout**: Responses and match state (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full command/response set.
//!
//! # Example
//!
//! ```bash
//! # Drive a match interactively
//! echo '{"cmd":"tick","count":25}' | cargo run -p skirmish_headless -- run
//!
//! # Watch a scenario play out in real time
//! cargo run -p skirmish_headless -- play --scenario scenarios/mirror.ron --realtime
//!
//! # Verify determinism
//! cargo run -p skirmish_headless -- verify --scenario scenarios/mirror.ron --runs 5
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod clock;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ascii_visualizer::{render_board, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use clock::{drive, realtime_run, ClockTiming};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioDeployment, ScenarioError, ScenarioReport, ScenarioRun};
