//! Test fixtures and helpers.
//!
//! Pre-built terrain and matches for consistent testing.

use skirmish_core::components::{Team, UnitId};
use skirmish_core::config::{MapLayout, SimConfig};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::simulation::{Match, UnitSpawnParams};
use skirmish_core::templates::UnitTemplate;
use skirmish_core::terrain::TerrainGrid;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// World position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::new(fixed(x), fixed(y))
}

/// Layout with one world unit per cell and no water band.
#[must_use]
pub fn open_layout(columns: usize, rows: usize) -> MapLayout {
    MapLayout {
        columns,
        rows,
        world_width: Fixed::from_num(columns),
        world_height: Fixed::from_num(rows),
        water_start_row: -1,
        water_end_row: -1,
        bridges: Vec::new(),
    }
}

/// Grid with no water, for pathfinding tests.
#[must_use]
pub fn open_terrain(columns: usize, rows: usize) -> TerrainGrid {
    TerrainGrid::from_layout(&open_layout(columns, rows))
}

/// The reference arena with default templates.
#[must_use]
pub fn reference_match() -> Match {
    Match::new(SimConfig::default())
}

/// Melee stats used by duel fixtures: range 0.8 cells, no movement.
#[must_use]
pub fn duelist(hitpoints: u32, damage: u32) -> UnitTemplate {
    UnitTemplate {
        name: "Duelist".to_string(),
        hitpoints,
        damage,
        speed: Fixed::ZERO,
        range: fixed_f(0.8),
        sight_range: fixed(5),
        ..Default::default()
    }
}

/// Two melee units facing each other on the same spot, away from towers.
///
/// Returns the match plus the ids of the team 0 and team 1 units.
#[must_use]
pub fn duel_match(a: UnitTemplate, b: UnitTemplate) -> (Match, UnitId, UnitId) {
    let mut game = reference_match();
    let spot = game.grid().cell_to_world(18, 22);
    let first = game.spawn_unit(UnitSpawnParams {
        team: Team::TOP,
        position: spot,
        stats: a,
    })
    .expect("duel spot lies on the grid");
    let second = game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: spot,
        stats: b,
    })
    .expect("duel spot lies on the grid");
    (game, first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_terrain_has_no_water() {
        let grid = open_terrain(10, 10);
        for row in 0..10 {
            for col in 0..10 {
                assert!(grid.is_walkable(col, row));
            }
        }
        assert_eq!(grid.cell_width(), Fixed::ONE);
    }

    #[test]
    fn test_duel_match_places_both_units() {
        let (game, a, b) = duel_match(duelist(100, 10), duelist(100, 10));
        assert_eq!(game.unit(a).unwrap().position, game.unit(b).unwrap().position);
        assert_ne!(game.unit(a).unwrap().team, game.unit(b).unwrap().team);
    }
}
