//! Scenario loading and scripted deployments.
//!
//! A scenario is a RON file describing the match to run: an optional
//! config override, optional extra templates, and a list of deployments
//! applied at given ticks.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skirmish_core::components::Team;
use skirmish_core::config::SimConfig;
use skirmish_core::error::GameError;
use skirmish_core::simulation::{Match, MatchOutcome, MatchSetup, TickEvents};
use skirmish_core::templates::TemplateRegistry;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario content was rejected by the simulation.
    #[error("Invalid scenario: {0}")]
    Core(#[from] GameError),
}

/// A template placed on the board at a given tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDeployment {
    /// Tick at which the unit appears (applied before that tick advances).
    pub tick: u64,
    /// Unit template name.
    pub template: String,
    /// Owning team.
    pub team: Team,
    /// Cell column.
    pub col: i32,
    /// Cell row.
    pub row: i32,
    /// Charge the template's elixir cost.
    #[serde(default)]
    pub pay: bool,
}

impl ScenarioDeployment {
    /// Free deployment.
    #[must_use]
    pub fn new(tick: u64, template: &str, team: Team, col: i32, row: i32) -> Self {
        Self {
            tick,
            template: template.to_string(),
            team,
            col,
            row,
            pay: false,
        }
    }
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Config override; reference values when absent.
    pub config: Option<SimConfig>,
    /// Template file contents merged over the built-in roster.
    pub templates: Option<String>,
    /// Scripted deployments.
    pub deployments: Vec<ScenarioDeployment>,
    /// Stop after this many ticks; 0 runs until the match ends.
    pub max_ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Empty Arena".to_string(),
            description: "Reference towers, no units".to_string(),
            config: None,
            templates: None,
            deployments: Vec::new(),
            max_ticks: 0,
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Load from a path, or the built-in skirmish when none is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ScenarioError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::skirmish()),
        }
    }

    /// Mirrored lane push on both sides of the arena.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut deployments = Vec::new();
        for (tick, template, col) in [
            (0, "Knight", 6),
            (0, "Archer", 8),
            (50, "Giant", 28),
            (75, "BabyDragon", 27),
            (150, "Skeleton", 7),
        ] {
            deployments.push(ScenarioDeployment::new(tick, template, Team::TOP, col, 18));
            deployments.push(ScenarioDeployment::new(tick, template, Team::BOTTOM, col, 45));
        }
        Self {
            name: "Mirror Skirmish".to_string(),
            description: "Identical pushes down both lanes".to_string(),
            deployments,
            max_ticks: 3_000,
            ..Default::default()
        }
    }

    /// Effective simulation config.
    #[must_use]
    pub fn sim_config(&self) -> SimConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Template registry: built-ins plus this scenario's content.
    pub fn registry(&self) -> Result<TemplateRegistry, ScenarioError> {
        match &self.templates {
            Some(text) => Ok(TemplateRegistry::from_ron_str(text)?),
            None => Ok(TemplateRegistry::with_defaults()),
        }
    }

    /// Build the match at tick 0, before any deployment.
    pub fn build_match(&self, config: SimConfig) -> Result<Match, ScenarioError> {
        let registry = self.registry()?;
        Ok(Match::with_setup(
            config,
            Arc::new(registry),
            &MatchSetup::reference(),
        )?)
    }
}

/// Summary of a finished (or capped) scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Match result, when it ended.
    pub outcome: Option<MatchOutcome>,
    /// Deployments that produced a unit.
    pub units_deployed: u32,
    /// Deployments the match refused.
    pub deployments_rejected: u32,
    /// Crowns per team.
    pub crowns: [u32; 2],
    /// Final state hash.
    pub state_hash: u64,
}

/// A match driven by a scenario's deployment script.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    name: String,
    game: Match,
    deployments: Vec<ScenarioDeployment>,
    next: usize,
    max_ticks: u64,
    deployed: u32,
    rejected: u32,
}

impl ScenarioRun {
    /// Start a run with the scenario's own config.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Self::with_config(scenario, scenario.sim_config())
    }

    /// Start a run with an explicit config.
    pub fn with_config(scenario: &Scenario, config: SimConfig) -> Result<Self, ScenarioError> {
        let game = scenario.build_match(config)?;
        let mut deployments = scenario.deployments.clone();
        deployments.sort_by_key(|d| d.tick);
        info!(
            scenario = %scenario.name,
            deployments = deployments.len(),
            max_ticks = scenario.max_ticks,
            "Scenario loaded"
        );
        Ok(Self {
            name: scenario.name.clone(),
            game,
            deployments,
            next: 0,
            max_ticks: scenario.max_ticks,
            deployed: 0,
            rejected: 0,
        })
    }

    /// The match.
    #[must_use]
    pub fn game(&self) -> &Match {
        &self.game
    }

    /// The match, mutably.
    pub fn game_mut(&mut self) -> &mut Match {
        &mut self.game
    }

    /// Tick cap; 0 for none.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Whether the match ended or the tick cap was reached.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.game.is_finished() || (self.max_ticks > 0 && self.game.current_tick() >= self.max_ticks)
    }

    /// Apply every deployment scheduled at or before the current tick.
    pub fn deploy_due(&mut self) {
        let tick = self.game.current_tick();
        while let Some(d) = self.deployments.get(self.next).filter(|d| d.tick <= tick) {
            let result = if d.pay {
                self.game.deploy(&d.template, d.team, d.col, d.row)
            } else {
                self.game.spawn_from_template(&d.template, d.team, d.col, d.row)
            };
            match result {
                Ok(id) => {
                    debug!(tick, unit = id.0, template = %d.template, "Scripted deployment");
                    self.deployed += 1;
                }
                Err(err) => {
                    warn!(tick, template = %d.template, error = %err, "Deployment rejected");
                    self.rejected += 1;
                }
            }
            self.next += 1;
        }
    }

    /// Deploy what is due, then advance one tick.
    pub fn step(&mut self) -> skirmish_core::error::Result<TickEvents> {
        self.deploy_due();
        self.game.tick()
    }

    /// Step until done.
    pub fn run_to_end(&mut self) -> ScenarioReport {
        while !self.is_done() {
            if let Err(err) = self.step() {
                warn!(error = %err, "Scenario run halted");
                break;
            }
        }
        self.report()
    }

    /// Current summary.
    #[must_use]
    pub fn report(&self) -> ScenarioReport {
        let players = self.game.players();
        ScenarioReport {
            name: self.name.clone(),
            ticks: self.game.current_tick(),
            outcome: self.game.outcome(),
            units_deployed: self.deployed,
            deployments_rejected: self.rejected,
            crowns: [players[0].crowns, players[1].crowns],
            state_hash: self.game.state_hash(),
        }
    }
}
