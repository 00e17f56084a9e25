//! Entity records: units, structures and the small value types they share.
//!
//! Entities are never removed from their collections. Death flips the
//! `active` flag so ids stay valid for anything still pointing at them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed, Vec2Fixed};
use crate::templates::{UnitTemplate, STRUCTURE_PROJECTILE};

/// Length of the per-unit position history ring.
pub const POSITION_HISTORY_LEN: usize = 5;

// ============================================================================
// Identity
// ============================================================================

/// One of the two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Team(u8);

impl Team {
    /// Team defending the top half.
    pub const TOP: Self = Self(0);
    /// Team defending the bottom half.
    pub const BOTTOM: Self = Self(1);
    /// Both teams in index order.
    pub const ALL: [Self; 2] = [Self::TOP, Self::BOTTOM];

    /// Validate a raw team index.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidTeam`] for anything but 0 or 1.
    pub fn new(index: u8) -> Result<Self> {
        match index {
            0 | 1 => Ok(Self(index)),
            _ => Err(GameError::InvalidTeam(index)),
        }
    }

    /// Raw index (0 or 1).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The opposing team.
    #[must_use]
    pub const fn enemy(self) -> Self {
        Self(1 - self.0)
    }
}

impl TryFrom<u8> for Team {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        team.0
    }
}

/// Unit identifier. Assigned from 1 upward, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Structure identifier, unique across both players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

/// Reference to a live or dead entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A unit.
    Unit(UnitId),
    /// A structure.
    Structure(StructureId),
}

/// Who dealt a blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attacker {
    /// A unit.
    Unit(UnitId),
    /// A structure.
    Structure(StructureId),
    /// A dying unit's death burst.
    DeathBurst(UnitId),
}

// ============================================================================
// Shared value types
// ============================================================================

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create health at full.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the owner is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction so overkill lands on zero.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Remaining health as a fraction of max, in [0, 1].
    #[must_use]
    pub fn fraction(&self) -> Fixed {
        if self.max == 0 {
            return Fixed::ZERO;
        }
        Fixed::from_num(self.current) / Fixed::from_num(self.max)
    }
}

/// Fixed-length ring of recent positions for display smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionHistory {
    slots: [Vec2Fixed; POSITION_HISTORY_LEN],
    next: usize,
}

impl PositionHistory {
    /// Ring filled with a single position.
    #[must_use]
    pub const fn filled(pos: Vec2Fixed) -> Self {
        Self {
            slots: [pos; POSITION_HISTORY_LEN],
            next: 0,
        }
    }

    /// Overwrite the oldest slot.
    pub fn record(&mut self, pos: Vec2Fixed) {
        self.slots[self.next] = pos;
        self.next = (self.next + 1) % POSITION_HISTORY_LEN;
    }

    /// Positions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Vec2Fixed> + '_ {
        (0..POSITION_HISTORY_LEN).map(move |i| self.slots[(self.next + i) % POSITION_HISTORY_LEN])
    }

    /// Most recently recorded position.
    #[must_use]
    pub fn latest(&self) -> Vec2Fixed {
        self.slots[(self.next + POSITION_HISTORY_LEN - 1) % POSITION_HISTORY_LEN]
    }

    /// Mean of all slots.
    #[must_use]
    pub fn average(&self) -> Vec2Fixed {
        let sum = self.iter().fold(Vec2Fixed::ZERO, |acc, p| acc + p);
        let n = Fixed::from_num(POSITION_HISTORY_LEN);
        Vec2Fixed::new(sum.x / n, sum.y / n)
    }
}

// ============================================================================
// Units
// ============================================================================

/// A mobile troop.
///
/// Combat stats come from the shared template; everything that changes
/// during a match lives on the unit itself.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Identity.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Stat template.
    pub template: Arc<UnitTemplate>,
    /// World position.
    pub position: Vec2Fixed,
    /// Position at the start of this unit's last update.
    pub prev_position: Vec2Fixed,
    /// Current velocity (world units per tick).
    pub velocity: Vec2Fixed,
    /// Desired velocity from the last steering pass.
    pub target_velocity: Vec2Fixed,
    /// Velocity responsiveness, fixed at spawn.
    pub max_acceleration: Fixed,
    /// Hit points.
    pub health: Health,
    /// Tick of the last resolved attack; `None` until the first.
    pub last_attack_tick: Option<u64>,
    /// Ticks between attacks.
    pub attack_delay: u64,
    /// Footprint diameter in world units.
    pub size: Fixed,
    /// Engaged with a target this tick.
    pub is_attacking: bool,
    /// Recent positions.
    pub history: PositionHistory,
    /// False once dead; dead units stay in the arena.
    pub active: bool,
}

impl Unit {
    /// Create a unit at full health.
    ///
    /// `cell_extent` is the smaller of the cell width and height.
    #[must_use]
    pub fn new(
        id: UnitId,
        team: Team,
        template: Arc<UnitTemplate>,
        position: Vec2Fixed,
        cell_extent: Fixed,
        cadence_base: u32,
    ) -> Self {
        Self {
            id,
            team,
            position,
            prev_position: position,
            velocity: Vec2Fixed::ZERO,
            target_velocity: Vec2Fixed::ZERO,
            max_acceleration: template.max_acceleration(),
            health: Health::new(template.hitpoints),
            last_attack_tick: None,
            attack_delay: template.attack_delay_ticks(cadence_base),
            size: cell_extent * template.footprint_cells(),
            is_attacking: false,
            history: PositionHistory::filled(position),
            active: true,
            template,
        }
    }

    /// Footprint radius in world units.
    #[must_use]
    pub fn radius(&self) -> Fixed {
        self.size / Fixed::from_num(2)
    }

    /// Whether the unit flies.
    #[must_use]
    pub fn is_flying(&self) -> bool {
        self.template.is_flying()
    }

    /// Attack range in world units.
    #[must_use]
    pub fn range_world(&self, cell_width: Fixed) -> Fixed {
        self.template.range * cell_width
    }

    /// Aggro radius in world units.
    #[must_use]
    pub fn aggro_world(&self, cell_width: Fixed) -> Fixed {
        self.template.sight_range * cell_width
    }

    /// Movement speed in world units per tick.
    #[must_use]
    pub fn speed_world(&self, cell_width: Fixed) -> Fixed {
        self.template.speed * cell_width
    }

    /// Whether the cooldown allows an attack at `tick`.
    #[must_use]
    pub fn cooldown_ready(&self, tick: u64) -> bool {
        match self.last_attack_tick {
            Some(last) => tick.saturating_sub(last) >= self.attack_delay,
            None => true,
        }
    }
}

// ============================================================================
// Structures
// ============================================================================

/// Structure role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Lane tower.
    Regular,
    /// Central tower; losing it loses the match.
    King,
}

/// Placement and stats for a structure at match setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureBlueprint {
    /// Role.
    pub kind: StructureKind,
    /// Anchor column.
    pub col: i32,
    /// Anchor row.
    pub row: i32,
    /// Maximum health.
    pub hitpoints: u32,
    /// Damage per shot.
    pub damage: u32,
    /// Range in cells.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl StructureBlueprint {
    /// Reference King tower at a cell.
    #[must_use]
    pub fn king(col: i32, row: i32) -> Self {
        Self {
            kind: StructureKind::King,
            col,
            row,
            hitpoints: 2000,
            damage: 50,
            range: Fixed::from_num(10),
            width: 6,
            height: 6,
        }
    }

    /// Reference princess tower at a cell.
    #[must_use]
    pub fn princess(col: i32, row: i32) -> Self {
        Self {
            kind: StructureKind::Regular,
            col,
            row,
            hitpoints: 1200,
            damage: 30,
            range: Fixed::from_num(3.5),
            width: 4,
            height: 5,
        }
    }
}

/// A stationary tower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    /// Identity.
    pub id: StructureId,
    /// Owning team.
    pub team: Team,
    /// Role.
    pub kind: StructureKind,
    /// World position of the footprint center.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Damage per shot.
    pub damage: u32,
    /// Range in cells.
    pub range: Fixed,
    /// Tick of the last shot.
    pub last_attack_tick: u64,
    /// Configured attack delay. Firing uses the match-wide structure cadence.
    pub attack_delay: u64,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// Footprint radius in world units.
    pub radius: Fixed,
    /// Projectile template fired.
    pub projectile: String,
    /// False once destroyed.
    pub active: bool,
}

impl Structure {
    /// Build a structure from a blueprint.
    ///
    /// Even-width footprints straddle the anchor cell border, so the
    /// center moves half a cell right and down.
    #[must_use]
    pub fn from_blueprint(
        id: StructureId,
        team: Team,
        blueprint: &StructureBlueprint,
        anchor_center: Vec2Fixed,
        cell_width: Fixed,
        cell_height: Fixed,
    ) -> Self {
        let half = Fixed::from_num(0.5);
        let position = if blueprint.width % 2 == 0 {
            anchor_center + Vec2Fixed::new(cell_width * half, cell_height * half)
        } else {
            anchor_center
        };
        let width_px = Fixed::from_num(blueprint.width) * cell_width;
        let height_px = Fixed::from_num(blueprint.height) * cell_height;

        Self {
            id,
            team,
            kind: blueprint.kind,
            position,
            health: Health::new(blueprint.hitpoints),
            damage: blueprint.damage,
            range: blueprint.range,
            last_attack_tick: 0,
            attack_delay: 60,
            width: blueprint.width,
            height: blueprint.height,
            radius: width_px.max(height_px) * half,
            projectile: STRUCTURE_PROJECTILE.to_string(),
            active: true,
        }
    }

    /// Destroying this structure decides the match.
    #[must_use]
    pub fn ends_match_on_destruction(&self) -> bool {
        self.kind == StructureKind::King
    }

    /// Range in world units.
    #[must_use]
    pub fn range_world(&self, cell_width: Fixed) -> Fixed {
        self.range * cell_width
    }
}
