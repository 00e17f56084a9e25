//! Wall-clock driver for a scenario run.
//!
//! Three timers feed one task: the tick interval, the elixir interval and
//! the match timer. A `watch` channel stops the match from outside. The
//! task owns the [`ScenarioRun`] outright, so the match is only ever
//! advanced from here; after every change it publishes a snapshot to the
//! [`SnapshotBuffer`] for readers.

use std::time::Duration;

use skirmish_core::config::SimConfig;
use skirmish_core::snapshot::SnapshotBuffer;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError, ScenarioReport, ScenarioRun};

/// Wall-clock periods for the three timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTiming {
    /// Time between ticks.
    pub tick_period: Duration,
    /// Time between elixir top-ups.
    pub elixir_period: Duration,
    /// Total match time.
    pub match_duration: Duration,
}

impl ClockTiming {
    /// Periods derived from a config's tick-based values.
    ///
    /// An elixir interval of 0 ticks falls back to one second.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        let tick_period = Duration::from_millis(config.tick_period_ms.max(1));
        let elixir_period = if config.elixir_interval_ticks == 0 {
            Duration::from_secs(1)
        } else {
            tick_period.saturating_mul(u32::try_from(config.elixir_interval_ticks).unwrap_or(u32::MAX))
        };
        let match_duration =
            tick_period.saturating_mul(u32::try_from(config.match_duration_ticks).unwrap_or(u32::MAX));
        Self {
            tick_period,
            elixir_period,
            match_duration,
        }
    }

    /// All periods divided by `factor` (at least 1).
    #[must_use]
    pub fn accelerated(self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            tick_period: (self.tick_period / factor).max(Duration::from_micros(1)),
            elixir_period: (self.elixir_period / factor).max(Duration::from_micros(1)),
            match_duration: self.match_duration / factor,
        }
    }
}

/// Start a scenario for wall-clock play.
///
/// Elixir is left to the elixir timer, so in-tick regeneration is turned
/// off. The tick-count match limit is pushed past the wall-clock timer.
pub fn realtime_run(scenario: &Scenario) -> Result<(ScenarioRun, ClockTiming), ScenarioError> {
    let config = scenario.sim_config();
    let timing = ClockTiming::from_config(&config);
    let run = ScenarioRun::with_config(
        scenario,
        SimConfig {
            elixir_interval_ticks: 0,
            match_duration_ticks: u64::MAX,
            ..config
        },
    )?;
    Ok((run, timing))
}

/// Drive `run` in real time until it ends or `stop` flips to `true`.
pub async fn drive(
    mut run: ScenarioRun,
    timing: ClockTiming,
    buffer: SnapshotBuffer,
    mut stop: watch::Receiver<bool>,
) -> ScenarioReport {
    let mut ticks = time::interval(timing.tick_period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut elixir = time::interval_at(Instant::now() + timing.elixir_period, timing.elixir_period);
    elixir.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let timer = time::sleep(timing.match_duration);
    tokio::pin!(timer);

    info!(
        tick_ms = timing.tick_period.as_millis() as u64,
        elixir_ms = timing.elixir_period.as_millis() as u64,
        match_ms = timing.match_duration.as_millis() as u64,
        "Real-time clock started"
    );
    buffer.publish(run.game().snapshot());

    while !run.is_done() {
        tokio::select! {
            _ = ticks.tick() => {
                if let Err(err) = run.step() {
                    warn!(error = %err, "Tick failed");
                    break;
                }
            }
            _ = elixir.tick() => {
                run.game_mut().regenerate_elixir();
                debug!(tick = run.game().current_tick(), "Elixir timer");
            }
            () = &mut timer => {
                info!(tick = run.game().current_tick(), "Match timer expired");
                run.game_mut().expire_timer();
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!(tick = run.game().current_tick(), "Stop requested");
                    run.game_mut().stop();
                }
            }
        }
        buffer.publish(run.game().snapshot());
    }

    run.report()
}
