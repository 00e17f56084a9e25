//! Owned, serializable views of match state for presentation.
//!
//! A renderer never touches the live collections. The simulation side
//! publishes a [`MatchSnapshot`] after each tick into a
//! [`SnapshotBuffer`] and readers take the latest one.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::components::{StructureId, StructureKind, Team, UnitId};
use crate::economy::ElixirPool;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::projectile::Projectile;
use crate::simulation::{Match, MatchOutcome};

/// One living unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    /// Identity.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Template name.
    pub name: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Mean of the recent position history, for smooth drawing.
    pub smoothed_position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Health as a fraction of max.
    #[serde(with = "fixed_serde")]
    pub health_fraction: Fixed,
    /// Footprint diameter.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Engaged with a target.
    pub is_attacking: bool,
    /// Flying unit.
    pub flying: bool,
}

/// One structure, standing or destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureView {
    /// Identity.
    pub id: StructureId,
    /// Owning team.
    pub team: Team,
    /// Role.
    pub kind: StructureKind,
    /// Footprint center.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Health as a fraction of max.
    #[serde(with = "fixed_serde")]
    pub health_fraction: Fixed,
    /// Footprint radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Footprint width in cells.
    pub width: u32,
    /// Footprint height in cells.
    pub height: u32,
    /// Still standing.
    pub active: bool,
}

/// One projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileView {
    /// World position.
    pub position: Vec2Fixed,
    /// Shooter's team.
    pub team: Team,
    /// Visual size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Area-effect projectile.
    pub area: bool,
}

/// Per-team resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Team.
    pub team: Team,
    /// Elixir pool.
    pub elixir: ElixirPool,
    /// Enemy structures destroyed.
    pub crowns: u32,
}

/// Everything a presentation layer draws for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Tick the snapshot was taken on.
    pub tick: u64,
    /// Living units.
    pub units: Vec<UnitView>,
    /// All structures.
    pub structures: Vec<StructureView>,
    /// Projectiles in flight.
    pub projectiles: Vec<ProjectileView>,
    /// Both players.
    pub players: Vec<PlayerView>,
    /// Grid overlay flag.
    pub show_grid: bool,
    /// Set once the match is over.
    pub outcome: Option<MatchOutcome>,
}

impl MatchSnapshot {
    /// Capture the current state of a match.
    #[must_use]
    pub fn capture(game: &Match) -> Self {
        let units = game
            .active_units()
            .map(|u| UnitView {
                id: u.id,
                team: u.team,
                name: u.template.name.clone(),
                position: u.position,
                smoothed_position: u.history.average(),
                health: u.health.current,
                health_fraction: u.health.fraction(),
                size: u.size,
                is_attacking: u.is_attacking,
                flying: u.is_flying(),
            })
            .collect();

        let structures = game
            .structures()
            .map(|s| StructureView {
                id: s.id,
                team: s.team,
                kind: s.kind,
                position: s.position,
                health: s.health.current,
                health_fraction: s.health.fraction(),
                radius: s.radius,
                width: s.width,
                height: s.height,
                active: s.active,
            })
            .collect();

        let players = game
            .players()
            .iter()
            .map(|p| PlayerView {
                team: p.team,
                elixir: p.elixir,
                crowns: p.crowns,
            })
            .collect();

        Self {
            tick: game.current_tick(),
            units,
            structures,
            projectiles: game.projectiles().iter().map(ProjectileView::from).collect(),
            players,
            show_grid: game.show_grid(),
            outcome: game.outcome(),
        }
    }
}

impl From<&Projectile> for ProjectileView {
    fn from(p: &Projectile) -> Self {
        Self {
            position: p.position,
            team: p.team,
            size: p.size,
            area: p.is_area(),
        }
    }
}

/// Single-writer, multi-reader handoff of the latest snapshot.
///
/// Cloning the buffer shares it. Readers get an `Arc` and never block
/// the writer for longer than a pointer swap.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuffer {
    latest: Arc<RwLock<Arc<MatchSnapshot>>>,
}

impl SnapshotBuffer {
    /// Buffer seeded with an initial snapshot.
    #[must_use]
    pub fn new(initial: MatchSnapshot) -> Self {
        Self {
            latest: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: MatchSnapshot) {
        let mut slot = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(snapshot);
    }

    /// Most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> Arc<MatchSnapshot> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
