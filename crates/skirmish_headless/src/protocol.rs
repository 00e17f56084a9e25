//! JSON protocol for headless match control.
//!
//! The runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Match state and responses
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"deploy","template":"Knight","team":0,"col":6,"row":18}
//! <- {"type":"spawned","unit_id":1,"template":"Knight","team":0}
//! -> {"cmd":"tick","count":25}
//! <- {"type":"ack","cmd":"tick"}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":25,"hash":...,"units":[...],...}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use serde::{Deserialize, Serialize};
use skirmish_core::components::StructureKind;
use skirmish_core::math::{decimal_serde, Fixed};
use skirmish_core::simulation::{EndReason, MatchOutcome};
use skirmish_core::snapshot::MatchSnapshot;
use skirmish_core::templates::UnitTemplate;

/// Protocol revision reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the match by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Report the current state without advancing time.
    Query,

    /// Place a named template at a cell.
    Deploy {
        template: String,
        team: u8,
        col: i32,
        row: i32,
        /// Charge the template's elixir cost.
        #[serde(default)]
        pay: bool,
    },

    /// Place a unit with ad-hoc stats at a world position.
    Spawn {
        team: u8,
        #[serde(with = "decimal_serde")]
        x: Fixed,
        #[serde(with = "decimal_serde")]
        y: Fixed,
        #[serde(default)]
        stats: UnitTemplate,
    },

    /// Flip the grid overlay flag.
    ToggleGrid,

    /// Report the state hash (for determinism verification).
    Hash,

    /// Replace the match with a scenario file.
    LoadScenario { path: String },

    /// End the match now.
    Stop,

    /// Shut the runner down.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, tick: u64 },

    /// Acknowledgment of a command.
    Ack { cmd: String },

    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// Current match state.
    State {
        tick: u64,
        hash: u64,
        status: MatchStatus,
        show_grid: bool,
        units: Vec<UnitState>,
        structures: Vec<StructureState>,
        projectiles: Vec<ProjectileState>,
        players: Vec<PlayerState>,
    },

    /// A unit was placed.
    Spawned {
        unit_id: u32,
        template: String,
        team: u8,
    },

    /// State hash for determinism verification.
    StateHash { tick: u64, hash: u64 },

    /// The match has ended.
    GameOver {
        /// Winning team, absent for a draw.
        winner: Option<u8>,
        reason: EndCause,
        tick: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: u32,
    pub team: u8,
    pub template: String,
    pub x: f64,
    pub y: f64,
    pub health: u32,
    pub health_fraction: f64,
    pub attacking: bool,
    pub flying: bool,
}

/// State of a single structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureState {
    pub id: u32,
    pub team: u8,
    pub king: bool,
    pub x: f64,
    pub y: f64,
    pub health: u32,
    pub active: bool,
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub team: u8,
    pub x: f64,
    pub y: f64,
    pub area: bool,
}

/// Per-team resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub team: u8,
    pub elixir: f64,
    pub crowns: u32,
}

/// Whether the match is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    InProgress,
    Finished,
}

/// Why the match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    KingDestroyed,
    TimeExpired,
    Stopped,
}

impl From<EndReason> for EndCause {
    fn from(reason: EndReason) -> Self {
        match reason {
            EndReason::KingDestroyed => Self::KingDestroyed,
            EndReason::TimeExpired => Self::TimeExpired,
            EndReason::Stopped => Self::Stopped,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Create a game-over response.
    pub fn game_over(outcome: &MatchOutcome) -> Self {
        Self::GameOver {
            winner: outcome.winner.map(u8::from),
            reason: outcome.reason.into(),
            tick: outcome.tick,
        }
    }

    /// Build a state response from a snapshot.
    pub fn state(snapshot: &MatchSnapshot, hash: u64) -> Self {
        let units = snapshot
            .units
            .iter()
            .map(|u| UnitState {
                id: u.id.0,
                team: u.team.into(),
                template: u.name.clone(),
                x: u.position.x.to_num(),
                y: u.position.y.to_num(),
                health: u.health,
                health_fraction: u.health_fraction.to_num(),
                attacking: u.is_attacking,
                flying: u.flying,
            })
            .collect();

        let structures = snapshot
            .structures
            .iter()
            .map(|s| StructureState {
                id: s.id.0,
                team: s.team.into(),
                king: s.kind == StructureKind::King,
                x: s.position.x.to_num(),
                y: s.position.y.to_num(),
                health: s.health,
                active: s.active,
            })
            .collect();

        let projectiles = snapshot
            .projectiles
            .iter()
            .map(|p| ProjectileState {
                team: p.team.into(),
                x: p.position.x.to_num(),
                y: p.position.y.to_num(),
                area: p.area,
            })
            .collect();

        let players = snapshot
            .players
            .iter()
            .map(|p| PlayerState {
                team: p.team.into(),
                elixir: p.elixir.amount.to_num(),
                crowns: p.crowns,
            })
            .collect();

        Self::State {
            tick: snapshot.tick,
            hash,
            status: if snapshot.outcome.is_some() {
                MatchStatus::Finished
            } else {
                MatchStatus::InProgress
            },
            show_grid: snapshot.show_grid,
            units,
            structures,
            projectiles,
            players,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Deploy { .. } => "deploy",
            Self::Spawn { .. } => "spawn",
            Self::ToggleGrid => "toggle_grid",
            Self::Hash => "hash",
            Self::LoadScenario { .. } => "load_scenario",
            Self::Stop => "stop",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::components::Team;
    use skirmish_core::simulation::Match;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60 });
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_deploy_defaults_to_free() {
        let cmd =
            Command::from_json(r#"{"cmd":"deploy","template":"Knight","team":1,"col":6,"row":45}"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::Deploy {
                template: "Knight".to_string(),
                team: 1,
                col: 6,
                row: 45,
                pay: false,
            }
        );
        assert_eq!(cmd.name(), "deploy");
    }

    #[test]
    fn test_parse_spawn_with_partial_stats() {
        let cmd = Command::from_json(
            r#"{"cmd":"spawn","team":0,"x":100.5,"y":200,"stats":{"name":"Brute","hitpoints":900,"speed":0}}"#,
        )
        .unwrap();
        let Command::Spawn { team, x, y, stats } = cmd else {
            panic!("expected spawn");
        };
        assert_eq!(team, 0);
        assert_eq!(x, Fixed::from_num(100.5));
        assert_eq!(y, Fixed::from_num(200));
        assert_eq!(stats.hitpoints, 900);
        assert_eq!(stats.speed, Fixed::ZERO);
        assert_eq!(stats.damage, UnitTemplate::default().damage);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_serialize_state_response() {
        let mut game = Match::default();
        game.spawn_from_template("Knight", Team::TOP, 6, 18).unwrap();
        let response = Response::state(&game.snapshot(), game.state_hash());

        let line = response.to_json_line();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["units"][0]["template"], "Knight");
        assert_eq!(value["structures"].as_array().unwrap().len(), 6);
        assert_eq!(value["players"][0]["elixir"], 4.0);
    }

    #[test]
    fn test_game_over_response() {
        let outcome = MatchOutcome {
            winner: Some(Team::BOTTOM),
            reason: EndReason::KingDestroyed,
            tick: 812,
        };
        let line = Response::game_over(&outcome).to_json_line();
        assert_eq!(
            line.trim_end(),
            r#"{"type":"game_over","winner":1,"reason":"king_destroyed","tick":812}"#
        );
    }

    #[test]
    fn test_error_response_shape() {
        let line = Response::error("nope", Some("deploy")).to_json_line();
        assert_eq!(
            line.trim_end(),
            r#"{"type":"error","message":"nope","cmd":"deploy"}"#
        );
    }
}
