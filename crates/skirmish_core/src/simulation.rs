//! The match: owner of all simulation state and the tick loop.
//!
//! Each tick runs its systems in a fixed order:
//! 1. **Projectiles** - age, advance, structure sweep, compaction
//! 2. **Units** - engage or move, push apart, record history
//! 3. **Structures** - cadence-gated shots at the nearest enemy unit
//! 4. **Cleanup** - clear stale "is attacking" flags
//! 5. **Elixir** - periodic regeneration
//! 6. **Match end** - King destroyed or timer expired
//!
//! Death effects queued by any system are flushed before the next one
//! runs. Units and structures are never removed; a dead entity keeps
//! its slot with `active == false`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::components::{
    Attacker, EntityRef, Structure, StructureBlueprint, StructureId, StructureKind, Team, Unit,
    UnitId,
};
use crate::config::SimConfig;
use crate::economy::ElixirPool;
use crate::error::{GameError, Result};
use crate::math::Vec2Fixed;
use crate::projectile::Projectile;
use crate::snapshot::MatchSnapshot;
use crate::templates::{TemplateLookup, TemplateRegistry, UnitTemplate};
use crate::terrain::TerrainGrid;

// ============================================================================
// Events and outcome
// ============================================================================

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// A King structure fell.
    KingDestroyed,
    /// The match timer ran out.
    TimeExpired,
    /// Stopped from outside.
    Stopped,
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Winning team; `None` for a draw.
    pub winner: Option<Team>,
    /// Why the match ended.
    pub reason: EndReason,
    /// Tick on which it ended.
    pub tick: u64,
}

/// One application of damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Who dealt it.
    pub attacker: Attacker,
    /// Who took it.
    pub target: EntityRef,
    /// Health actually removed.
    pub amount: u32,
    /// Whether the target died.
    pub killed: bool,
}

/// Events generated during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick these events belong to.
    pub tick: u64,
    /// Damage applied, in order.
    pub damage_events: Vec<DamageEvent>,
    /// Projectiles launched.
    pub projectiles_spawned: u32,
    /// Projectiles that landed.
    pub projectile_impacts: u32,
    /// Projectiles that timed out.
    pub projectiles_expired: u32,
    /// Units that died.
    pub units_killed: Vec<UnitId>,
    /// Structures that were destroyed.
    pub structures_destroyed: Vec<StructureId>,
    /// Set on the tick the match ends.
    pub outcome: Option<MatchOutcome>,
}

// ============================================================================
// Players and setup
// ============================================================================

/// One team's slot: its towers and elixir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Team index.
    pub team: Team,
    /// The King structure.
    pub king: Structure,
    /// Regular structures.
    pub towers: Vec<Structure>,
    /// Deployment resource.
    pub elixir: ElixirPool,
    /// Enemy structures this team has destroyed.
    pub crowns: u32,
}

impl Player {
    /// King first, then towers.
    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        std::iter::once(&self.king).chain(self.towers.iter())
    }

    /// Structure by id.
    #[must_use]
    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures().find(|s| s.id == id)
    }

    fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        std::iter::once(&mut self.king)
            .chain(self.towers.iter_mut())
            .find(|s| s.id == id)
    }
}

/// Structure placement for both teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    /// King per team index.
    pub kings: [StructureBlueprint; 2],
    /// Regular towers per team index.
    pub towers: [Vec<StructureBlueprint>; 2],
}

impl MatchSetup {
    /// Reference arena: top King at (17, 5) with towers at (6, 12) and
    /// (28, 12), mirrored for the bottom team.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            kings: [StructureBlueprint::king(17, 5), StructureBlueprint::king(17, 57)],
            towers: [
                vec![
                    StructureBlueprint::princess(6, 12),
                    StructureBlueprint::princess(28, 12),
                ],
                vec![
                    StructureBlueprint::princess(6, 50),
                    StructureBlueprint::princess(28, 50),
                ],
            ],
        }
    }

    fn blueprints(&self) -> impl Iterator<Item = &StructureBlueprint> {
        self.kings.iter().chain(self.towers.iter().flatten())
    }
}

impl Default for MatchSetup {
    fn default() -> Self {
        Self::reference()
    }
}

/// Raw stats for an explicit unit spawn.
#[derive(Debug, Clone)]
pub struct UnitSpawnParams {
    /// Owning team.
    pub team: Team,
    /// World position.
    pub position: Vec2Fixed,
    /// Stats; `name` labels the unit.
    pub stats: UnitTemplate,
}

impl Default for UnitSpawnParams {
    fn default() -> Self {
        Self {
            team: Team::TOP,
            position: Vec2Fixed::ZERO,
            stats: UnitTemplate::default(),
        }
    }
}

// ============================================================================
// Match
// ============================================================================

/// A running skirmish.
///
/// All state a presentation layer may want is reachable through
/// read-only accessors or [`Match::snapshot`]; only [`Match::tick`] and
/// the spawn operations mutate it.
#[derive(Debug, Clone)]
pub struct Match {
    pub(crate) config: SimConfig,
    pub(crate) grid: TerrainGrid,
    pub(crate) templates: Arc<dyn TemplateLookup>,
    pub(crate) tick: u64,
    /// Unit arena; `units[i].id == UnitId(i + 1)`.
    pub(crate) units: Vec<Unit>,
    pub(crate) players: [Player; 2],
    pub(crate) projectiles: Vec<Projectile>,
    /// Dead units whose death burst has not fired yet.
    pub(crate) pending_deaths: Vec<UnitId>,
    pub(crate) events: TickEvents,
    pub(crate) outcome: Option<MatchOutcome>,
    show_grid: bool,
}

impl Match {
    /// Reference match: default templates, default layout, reference towers.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let templates: Arc<dyn TemplateLookup> = Arc::new(TemplateRegistry::with_defaults());
        let grid = TerrainGrid::from_layout(&config.layout);
        let players = build_players(&config, &grid, &MatchSetup::reference());
        Self::assemble(config, grid, templates, players)
    }

    /// Match with custom templates and structure placement.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] when a King slot holds a regular
    /// tower or a tower slot holds a King, and
    /// [`GameError::CellOutOfBounds`] for structures off the grid.
    pub fn with_setup(
        config: SimConfig,
        templates: Arc<dyn TemplateLookup>,
        setup: &MatchSetup,
    ) -> Result<Self> {
        let grid = TerrainGrid::from_layout(&config.layout);
        if setup.kings.iter().any(|b| b.kind != StructureKind::King)
            || setup.towers.iter().flatten().any(|b| b.kind == StructureKind::King)
        {
            return Err(GameError::InvalidState(
                "each team needs exactly one King".to_string(),
            ));
        }
        if let Some(b) = setup.blueprints().find(|b| !grid.in_bounds(b.col, b.row)) {
            return Err(GameError::CellOutOfBounds {
                col: b.col,
                row: b.row,
            });
        }
        let players = build_players(&config, &grid, setup);
        Ok(Self::assemble(config, grid, templates, players))
    }

    fn assemble(
        config: SimConfig,
        grid: TerrainGrid,
        templates: Arc<dyn TemplateLookup>,
        players: [Player; 2],
    ) -> Self {
        tracing::info!(
            columns = grid.columns(),
            rows = grid.rows(),
            mode = ?config.projectile_mode,
            "Match created"
        );
        Self {
            config,
            grid,
            templates,
            tick: 0,
            units: Vec::new(),
            players,
            projectiles: Vec::new(),
            pending_deaths: Vec::new(),
            events: TickEvents::default(),
            outcome: None,
            show_grid: false,
        }
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    /// Current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Terrain query surface.
    #[must_use]
    pub const fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    /// Mutable terrain, for loading an overlay.
    pub fn grid_mut(&mut self) -> &mut TerrainGrid {
        &mut self.grid
    }

    /// Template lookup in use.
    #[must_use]
    pub fn templates(&self) -> &dyn TemplateLookup {
        self.templates.as_ref()
    }

    /// Every unit ever spawned, dead ones included.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Living units.
    pub fn active_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.active)
    }

    /// Unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(unit_index(id)?)
    }

    /// Unit by id, as an error when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnitNotFound`] for ids never handed out.
    pub fn try_unit(&self, id: UnitId) -> Result<&Unit> {
        self.unit(id).ok_or(GameError::UnitNotFound(id.0))
    }

    /// Structure by id, as an error when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] for unknown ids.
    pub fn try_structure(&self, id: StructureId) -> Result<&Structure> {
        self.structure(id).ok_or(GameError::StructureNotFound(id.0))
    }

    /// Both players.
    #[must_use]
    pub const fn players(&self) -> &[Player; 2] {
        &self.players
    }

    /// One player.
    #[must_use]
    pub const fn player(&self, team: Team) -> &Player {
        &self.players[team.index()]
    }

    /// Every structure of both teams.
    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.players.iter().flat_map(Player::structures)
    }

    /// Structure by id.
    #[must_use]
    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.players.iter().find_map(|p| p.structure(id))
    }

    pub(crate) fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.players.iter_mut().find_map(|p| p.structure_mut(id))
    }

    /// In-flight projectiles.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Set once the match has ended.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    /// Whether the match is over.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether presentation should draw the grid overlay.
    #[must_use]
    pub const fn show_grid(&self) -> bool {
        self.show_grid
    }

    /// Flip the grid overlay flag. No simulation effect.
    pub fn toggle_grid_overlay(&mut self) -> bool {
        self.show_grid = !self.show_grid;
        self.show_grid
    }

    /// Position of a living entity.
    #[must_use]
    pub fn entity_position(&self, entity: EntityRef) -> Option<Vec2Fixed> {
        match entity {
            EntityRef::Unit(id) => self.unit(id).filter(|u| u.active).map(|u| u.position),
            EntityRef::Structure(id) => self
                .structure(id)
                .filter(|s| s.active)
                .map(|s| s.position),
        }
    }

    /// Owned view for presentation.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::capture(self)
    }

    // ------------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------------

    /// Spawn a unit from raw stats at a world position.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CellOutOfBounds`] when the position lies
    /// outside the grid; nothing is spawned.
    pub fn spawn_unit(&mut self, params: UnitSpawnParams) -> Result<UnitId> {
        let cell = self.grid.world_to_cell(params.position);
        if !self.grid.in_bounds(cell.col, cell.row) {
            return Err(GameError::CellOutOfBounds {
                col: cell.col,
                row: cell.row,
            });
        }
        Ok(self.insert_unit(params.team, Arc::new(params.stats), params.position))
    }

    /// Spawn a unit from a named template at a cell center.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownTemplate`] or [`GameError::CellOutOfBounds`];
    /// nothing is spawned in either case.
    pub fn spawn_from_template(&mut self, name: &str, team: Team, col: i32, row: i32) -> Result<UnitId> {
        let template = self
            .templates
            .unit(name)
            .ok_or_else(|| GameError::UnknownTemplate(name.to_string()))?;
        if !self.grid.in_bounds(col, row) {
            return Err(GameError::CellOutOfBounds { col, row });
        }
        let position = self.grid.cell_to_world(col, row);
        Ok(self.insert_unit(team, template, position))
    }

    /// Spawn from a template and pay its elixir cost.
    ///
    /// # Errors
    ///
    /// As [`Match::spawn_from_template`], plus
    /// [`GameError::InsufficientElixir`] when the team cannot pay.
    pub fn deploy(&mut self, name: &str, team: Team, col: i32, row: i32) -> Result<UnitId> {
        let template = self
            .templates
            .unit(name)
            .ok_or_else(|| GameError::UnknownTemplate(name.to_string()))?;
        let pool = &self.players[team.index()].elixir;
        if !pool.can_afford(template.elixir_cost) {
            return Err(GameError::InsufficientElixir {
                required: template.elixir_cost,
                available: pool.amount,
            });
        }
        let id = self.spawn_from_template(name, team, col, row)?;
        self.players[team.index()].elixir.try_spend(template.elixir_cost);
        Ok(id)
    }

    fn insert_unit(&mut self, team: Team, template: Arc<UnitTemplate>, position: Vec2Fixed) -> UnitId {
        let id = UnitId(u32::try_from(self.units.len() + 1).unwrap_or(u32::MAX));
        let extent = self.grid.cell_width().min(self.grid.cell_height());
        tracing::debug!(
            tick = self.tick,
            unit = id.0,
            team = team.index(),
            name = %template.name,
            "Unit spawned"
        );
        self.units.push(Unit::new(
            id,
            team,
            template,
            position,
            extent,
            self.config.attack_cadence_base,
        ));
        id
    }

    // ------------------------------------------------------------------------
    // Tick loop
    // ------------------------------------------------------------------------

    /// Advance the match by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] once the match has ended.
    pub fn tick(&mut self) -> Result<TickEvents> {
        if let Some(outcome) = self.outcome {
            return Err(GameError::InvalidState(format!(
                "match ended at tick {}",
                outcome.tick
            )));
        }

        self.tick += 1;
        self.events = TickEvents {
            tick: self.tick,
            ..Default::default()
        };

        self.run_projectile_system();
        self.flush_death_effects();

        self.run_unit_system();
        self.flush_death_effects();

        self.run_structure_system();
        self.flush_death_effects();

        self.run_cleanup_system();
        self.run_elixir_system();
        self.run_match_end_system();

        #[cfg(feature = "debug-validation")]
        tracing::trace!(tick = self.tick, state_hash = self.state_hash(), "Tick complete");

        Ok(std::mem::take(&mut self.events))
    }

    /// Tick until the match ends or `max_ticks` more ticks have run.
    pub fn run_for(&mut self, max_ticks: u64) -> Vec<TickEvents> {
        let mut all = Vec::new();
        for _ in 0..max_ticks {
            match self.tick() {
                Ok(events) => all.push(events),
                Err(_) => break,
            }
            if self.is_finished() {
                break;
            }
        }
        all
    }

    /// End the match from outside. No effect once ended.
    pub fn stop(&mut self) -> Option<MatchOutcome> {
        if self.outcome.is_none() {
            self.finish(None, EndReason::Stopped);
        }
        self.outcome
    }

    /// Top up both elixir pools once.
    pub fn regenerate_elixir(&mut self) {
        for player in &mut self.players {
            player.elixir.regenerate();
        }
    }

    fn run_unit_system(&mut self) {
        for idx in 0..self.units.len() {
            if !self.units[idx].active {
                continue;
            }
            let position = self.units[idx].position;
            self.units[idx].prev_position = position;

            match self.find_engagement(idx) {
                Some(target) => self.engage(idx, target),
                None => {
                    self.units[idx].is_attacking = false;
                    if self.within_halt_range(idx) {
                        let unit = &mut self.units[idx];
                        unit.velocity = Vec2Fixed::ZERO;
                        unit.target_velocity = Vec2Fixed::ZERO;
                    } else {
                        self.advance_unit(idx);
                    }
                }
            }

            self.apply_push_forces(idx);

            let unit = &mut self.units[idx];
            unit.history.record(unit.position);
        }
    }

    fn run_elixir_system(&mut self) {
        let interval = self.config.elixir_interval_ticks;
        if interval > 0 && self.tick % interval == 0 {
            self.regenerate_elixir();
        }
    }

    fn run_match_end_system(&mut self) {
        if self.tick >= self.config.match_duration_ticks {
            self.expire_timer();
        }
    }

    /// End the match on time: more crowns wins, equal crowns draw.
    ///
    /// Called by the tick once `match_duration_ticks` is reached, or by a
    /// wall-clock match timer. No effect once ended.
    pub fn expire_timer(&mut self) -> Option<MatchOutcome> {
        if self.outcome.is_none() {
            let [top, bottom] = &self.players;
            let winner = match top.crowns.cmp(&bottom.crowns) {
                std::cmp::Ordering::Greater => Some(Team::TOP),
                std::cmp::Ordering::Less => Some(Team::BOTTOM),
                std::cmp::Ordering::Equal => None,
            };
            self.finish(winner, EndReason::TimeExpired);
        }
        self.outcome
    }

    pub(crate) fn finish(&mut self, winner: Option<Team>, reason: EndReason) {
        let outcome = MatchOutcome {
            winner,
            reason,
            tick: self.tick,
        };
        tracing::info!(
            tick = self.tick,
            winner = ?winner.map(Team::index),
            reason = ?reason,
            "Match finished"
        );
        self.outcome = Some(outcome);
        self.events.outcome = Some(outcome);
    }

    /// Deterministic hash of the full simulation state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in &self.units {
            unit.id.hash(&mut hasher);
            unit.active.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.velocity.hash(&mut hasher);
            unit.health.hash(&mut hasher);
            unit.is_attacking.hash(&mut hasher);
            unit.last_attack_tick.hash(&mut hasher);
        }

        for player in &self.players {
            player.elixir.hash(&mut hasher);
            player.crowns.hash(&mut hasher);
            for structure in player.structures() {
                structure.id.hash(&mut hasher);
                structure.active.hash(&mut hasher);
                structure.health.hash(&mut hasher);
                structure.last_attack_tick.hash(&mut hasher);
            }
        }

        self.projectiles.len().hash(&mut hasher);
        for projectile in &self.projectiles {
            projectile.position.hash(&mut hasher);
            projectile.target_position.hash(&mut hasher);
            projectile.damage.hash(&mut hasher);
            projectile.lifetime.hash(&mut hasher);
            projectile.active.hash(&mut hasher);
        }

        self.outcome.hash(&mut hasher);
        hasher.finish()
    }
}

/// Arena index of a unit id.
pub(crate) fn unit_index(id: UnitId) -> Option<usize> {
    usize::try_from(id.0).ok()?.checked_sub(1)
}

fn build_players(config: &SimConfig, grid: &TerrainGrid, setup: &MatchSetup) -> [Player; 2] {
    let mut next_id = 1;
    let mut place = |team: Team, blueprint: &StructureBlueprint| {
        let structure = Structure::from_blueprint(
            StructureId(next_id),
            team,
            blueprint,
            grid.cell_to_world(blueprint.col, blueprint.row),
            grid.cell_width(),
            grid.cell_height(),
        );
        next_id += 1;
        structure
    };
    Team::ALL.map(|team| {
        let king = place(team, &setup.kings[team.index()]);
        let towers = setup.towers[team.index()]
            .iter()
            .map(|b| place(team, b))
            .collect();
        Player {
            team,
            king,
            towers,
            elixir: ElixirPool::from_config(config),
            crowns: 0,
        }
    })
}

impl Default for Match {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}
