//! Target acquisition and engagement predicates.
//!
//! Everything here is a pure query over the current unit and structure
//! collections. Nothing is cached between ticks.

use crate::components::{Structure, StructureId, Unit, UnitId};
use crate::math::{Fixed, Vec2Fixed};
use crate::terrain::{TerrainGrid, WaterSide};

/// Structures are noticed from this many times a unit's aggro radius.
pub const STRUCTURE_AGGRO_FACTOR: i32 = 3;

/// Nearest structure found by [`nearest_enemy_structure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureSighting {
    /// Structure id.
    pub id: StructureId,
    /// Whether it is the King.
    pub is_king: bool,
    /// Distance from the unit to the structure's edge.
    pub distance: Fixed,
}

/// Whether two positions can see each other across the water.
///
/// Only matters for ground against ground. A position inside the band is
/// on a bridge and sees both sides.
#[must_use]
pub fn same_side_or_bridge(grid: &TerrainGrid, a: Vec2Fixed, b: Vec2Fixed) -> bool {
    match (grid.side_of(a), grid.side_of(b)) {
        (WaterSide::OnBridge, _) | (_, WaterSide::OnBridge) => true,
        (sa, sb) => sa == sb,
    }
}

fn water_allows(grid: &TerrainGrid, a: Vec2Fixed, a_flying: bool, b: Vec2Fixed, b_flying: bool) -> bool {
    a_flying || b_flying || same_side_or_bridge(grid, a, b)
}

/// Whether `attacker` may currently strike `target`.
///
/// In range means `distance - target radius <= range`, boundary included.
#[must_use]
pub fn can_attack_unit(grid: &TerrainGrid, attacker: &Unit, target: &Unit) -> bool {
    if !attacker.active || !target.active || attacker.team == target.team {
        return false;
    }
    let template = &attacker.template;
    if template.targets_only_structures || !template.can_hit(target.is_flying()) {
        return false;
    }
    if !water_allows(
        grid,
        attacker.position,
        attacker.is_flying(),
        target.position,
        target.is_flying(),
    ) {
        return false;
    }
    let reach = attacker.position.distance(target.position) - target.radius();
    reach <= attacker.range_world(grid.cell_width())
}

/// Whether `attacker` may currently strike `structure`.
#[must_use]
pub fn can_attack_structure(grid: &TerrainGrid, attacker: &Unit, structure: &Structure) -> bool {
    if !attacker.active || !structure.active || attacker.team == structure.team {
        return false;
    }
    if attacker.template.targets_only_units {
        return false;
    }
    if !water_allows(grid, attacker.position, attacker.is_flying(), structure.position, false) {
        return false;
    }
    let reach = attacker.position.distance(structure.position) - structure.radius;
    reach <= attacker.range_world(grid.cell_width())
}

/// Closest visible enemy unit within the aggro radius.
///
/// Ties keep the lower id.
#[must_use]
pub fn nearest_enemy_unit(grid: &TerrainGrid, unit: &Unit, units: &[Unit]) -> Option<UnitId> {
    let template = &unit.template;
    if template.targets_only_structures {
        return None;
    }
    let aggro = unit.aggro_world(grid.cell_width());

    let mut best: Option<(UnitId, Fixed)> = None;
    for other in units {
        if !other.active || other.team == unit.team {
            continue;
        }
        let dist = unit.position.distance(other.position);
        if dist > aggro {
            continue;
        }
        if !template.can_hit(other.is_flying()) {
            continue;
        }
        if !water_allows(grid, unit.position, unit.is_flying(), other.position, other.is_flying()) {
            continue;
        }
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((other.id, dist));
        }
    }
    best.map(|(id, _)| id)
}

/// Closest visible enemy structure within three times the aggro radius.
///
/// Distance is measured to the footprint edge. Regular structures are
/// scanned first; the King wins only when strictly closer.
#[must_use]
pub fn nearest_enemy_structure(
    grid: &TerrainGrid,
    unit: &Unit,
    towers: &[Structure],
    king: &Structure,
) -> Option<StructureSighting> {
    if unit.template.targets_only_units {
        return None;
    }
    let aggro = unit.aggro_world(grid.cell_width()) * Fixed::from_num(STRUCTURE_AGGRO_FACTOR);

    let consider = |structure: &Structure| -> Option<Fixed> {
        if !structure.active || structure.team == unit.team {
            return None;
        }
        let dist = (unit.position.distance(structure.position) - structure.radius).max(Fixed::ZERO);
        if dist > aggro {
            return None;
        }
        if !water_allows(grid, unit.position, unit.is_flying(), structure.position, false) {
            return None;
        }
        Some(dist)
    };

    let mut best: Option<StructureSighting> = None;
    for tower in towers {
        if let Some(distance) = consider(tower) {
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(StructureSighting {
                    id: tower.id,
                    is_king: false,
                    distance,
                });
            }
        }
    }
    if let Some(distance) = consider(king) {
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(StructureSighting {
                id: king.id,
                is_king: true,
                distance,
            });
        }
    }
    best
}

/// Closest active enemy unit a structure can reach.
///
/// Range is measured centre to centre. Structures hit air and ground alike.
#[must_use]
pub fn structure_target(grid: &TerrainGrid, structure: &Structure, units: &[Unit]) -> Option<UnitId> {
    let range = structure.range_world(grid.cell_width());

    let mut best: Option<(UnitId, Fixed)> = None;
    for unit in units {
        if !unit.active || unit.team == structure.team {
            continue;
        }
        let dist = structure.position.distance(unit.position);
        if dist > range {
            continue;
        }
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((unit.id, dist));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{StructureBlueprint, Team};
    use crate::config::MapLayout;
    use crate::templates::{TemplateLookup, TemplateRegistry, UnitTemplate};
    use std::sync::Arc;

    fn grid() -> TerrainGrid {
        TerrainGrid::from_layout(&MapLayout::default())
    }

    fn unit(g: &TerrainGrid, id: u32, team: Team, template: &str, col: i32, row: i32) -> Unit {
        let registry = TemplateRegistry::with_defaults();
        let template = registry.unit(template).expect("default template");
        let extent = g.cell_width().min(g.cell_height());
        Unit::new(UnitId(id), team, template, g.cell_to_world(col, row), extent, 60)
    }

    fn custom(g: &TerrainGrid, id: u32, team: Team, template: UnitTemplate, pos: Vec2Fixed) -> Unit {
        let extent = g.cell_width().min(g.cell_height());
        Unit::new(UnitId(id), team, Arc::new(template), pos, extent, 60)
    }

    fn tower(g: &TerrainGrid, id: u32, team: Team, col: i32, row: i32) -> Structure {
        Structure::from_blueprint(
            StructureId(id),
            team,
            &StructureBlueprint::princess(col, row),
            g.cell_to_world(col, row),
            g.cell_width(),
            g.cell_height(),
        )
    }

    fn king(g: &TerrainGrid, id: u32, team: Team, col: i32, row: i32) -> Structure {
        Structure::from_blueprint(
            StructureId(id),
            team,
            &StructureBlueprint::king(col, row),
            g.cell_to_world(col, row),
            g.cell_width(),
            g.cell_height(),
        )
    }

    #[test]
    fn test_nearest_enemy_unit_picks_closest() {
        let g = grid();
        let me = unit(&g, 1, Team::TOP, "Knight", 10, 10);
        let units = vec![
            me.clone(),
            unit(&g, 2, Team::BOTTOM, "Knight", 12, 10),
            unit(&g, 3, Team::BOTTOM, "Knight", 11, 10),
            unit(&g, 4, Team::TOP, "Knight", 10, 11),
        ];
        assert_eq!(nearest_enemy_unit(&g, &me, &units), Some(UnitId(3)));
    }

    #[test]
    fn test_nearest_enemy_unit_respects_aggro() {
        let g = grid();
        let me = unit(&g, 1, Team::TOP, "Knight", 10, 10);
        // Knight sight is 5 cells.
        let units = vec![me.clone(), unit(&g, 2, Team::BOTTOM, "Knight", 10, 22)];
        assert_eq!(nearest_enemy_unit(&g, &me, &units), None);
    }

    #[test]
    fn test_water_blocks_ground_units() {
        let g = grid();
        let top = unit(&g, 1, Team::TOP, "Archer", 15, 29);
        let bottom = unit(&g, 2, Team::BOTTOM, "Archer", 15, 34);
        let units = vec![top.clone(), bottom.clone()];

        assert_eq!(nearest_enemy_unit(&g, &top, &units), None);
        assert_eq!(nearest_enemy_unit(&g, &bottom, &units), None);
        assert!(!can_attack_unit(&g, &top, &bottom));
    }

    #[test]
    fn test_bridge_and_flight_bypass_water() {
        let g = grid();
        let top = unit(&g, 1, Team::TOP, "Archer", 6, 29);
        let on_bridge = unit(&g, 2, Team::BOTTOM, "Archer", 6, 31);
        let units = vec![top.clone(), on_bridge];
        assert_eq!(nearest_enemy_unit(&g, &top, &units), Some(UnitId(2)));

        let archer = unit(&g, 3, Team::TOP, "Archer", 15, 29);
        let dragon = unit(&g, 4, Team::BOTTOM, "BabyDragon", 15, 34);
        let units = vec![archer.clone(), dragon.clone()];
        assert_eq!(nearest_enemy_unit(&g, &archer, &units), Some(UnitId(4)));
        assert_eq!(nearest_enemy_unit(&g, &dragon, &units), Some(UnitId(3)));
        assert!(can_attack_unit(&g, &archer, &dragon));
    }

    #[test]
    fn test_flight_compatibility() {
        let g = grid();
        let knight = unit(&g, 1, Team::TOP, "Knight", 10, 10);
        let dragon = unit(&g, 2, Team::BOTTOM, "BabyDragon", 10, 10);
        let units = vec![knight.clone(), dragon.clone()];
        assert_eq!(nearest_enemy_unit(&g, &knight, &units), None);
        assert!(!can_attack_unit(&g, &knight, &dragon));

        let air_only = custom(
            &g,
            3,
            Team::TOP,
            UnitTemplate {
                attacks_ground: false,
                attacks_air: true,
                ..Default::default()
            },
            g.cell_to_world(10, 10),
        );
        let units = vec![air_only.clone(), unit(&g, 4, Team::BOTTOM, "Knight", 10, 11), dragon];
        assert_eq!(nearest_enemy_unit(&g, &air_only, &units), Some(UnitId(2)));
    }

    #[test]
    fn test_structure_only_units_ignore_units() {
        let g = grid();
        let giant = unit(&g, 1, Team::TOP, "Giant", 10, 10);
        let knight = unit(&g, 2, Team::BOTTOM, "Knight", 10, 10);
        let units = vec![giant.clone(), knight.clone()];
        assert_eq!(nearest_enemy_unit(&g, &giant, &units), None);
        assert!(!can_attack_unit(&g, &giant, &knight));
    }

    #[test]
    fn test_in_range_boundary_is_inclusive() {
        // One world unit per cell keeps the boundary arithmetic exact.
        let g = TerrainGrid::from_layout(&MapLayout {
            world_width: Fixed::from_num(36),
            world_height: Fixed::from_num(64),
            ..Default::default()
        });
        let template = UnitTemplate {
            range: Fixed::from_num(2),
            collision_radius: Fixed::from_num(0.5),
            ..Default::default()
        };
        let attacker = custom(&g, 1, Team::TOP, template.clone(), g.cell_to_world(10, 10));
        let mut target = custom(&g, 2, Team::BOTTOM, template, g.cell_to_world(10, 10));
        assert_eq!(target.radius(), Fixed::from_num(0.5));

        target.position = attacker.position + Vec2Fixed::new(Fixed::from_num(2.5), Fixed::ZERO);
        assert!(can_attack_unit(&g, &attacker, &target));

        target.position.x += Fixed::from_num(0.01);
        assert!(!can_attack_unit(&g, &attacker, &target));
    }

    #[test]
    fn test_nearest_structure_king_only_when_strictly_closer() {
        let g = grid();
        let towers = vec![tower(&g, 10, Team::TOP, 6, 12), tower(&g, 11, Team::TOP, 28, 12)];
        let k = king(&g, 12, Team::TOP, 17, 5);

        let near_tower = unit(&g, 1, Team::BOTTOM, "Giant", 6, 16);
        let seen = nearest_enemy_structure(&g, &near_tower, &towers, &k).expect("in sight");
        assert_eq!(seen.id, StructureId(10));
        assert!(!seen.is_king);

        let near_king = unit(&g, 2, Team::BOTTOM, "Giant", 17, 10);
        let seen = nearest_enemy_structure(&g, &near_king, &towers, &k).expect("in sight");
        assert!(seen.is_king);
        assert_eq!(seen.id, StructureId(12));
    }

    #[test]
    fn test_structure_sighting_water_rules() {
        let g = grid();
        let towers = vec![tower(&g, 10, Team::TOP, 15, 27)];
        let k = king(&g, 12, Team::TOP, 17, 5);

        let ground = unit(&g, 1, Team::BOTTOM, "Knight", 15, 35);
        assert_eq!(nearest_enemy_structure(&g, &ground, &towers, &k), None);

        let flyer = unit(&g, 2, Team::BOTTOM, "BabyDragon", 15, 35);
        let seen = nearest_enemy_structure(&g, &flyer, &towers, &k);
        assert_eq!(seen.map(|s| s.id), Some(StructureId(10)));

        let unit_only = custom(
            &g,
            3,
            Team::BOTTOM,
            UnitTemplate {
                targets_only_units: true,
                ..Default::default()
            },
            g.cell_to_world(15, 26),
        );
        assert_eq!(nearest_enemy_structure(&g, &unit_only, &towers, &k), None);
    }

    #[test]
    fn test_structure_target_nearest_in_range() {
        let g = grid();
        let t = tower(&g, 10, Team::TOP, 6, 12);
        let units = vec![
            unit(&g, 1, Team::BOTTOM, "Knight", 6, 15),
            unit(&g, 2, Team::BOTTOM, "BabyDragon", 7, 14),
            unit(&g, 3, Team::TOP, "Knight", 6, 13),
            unit(&g, 4, Team::BOTTOM, "Knight", 6, 40),
        ];
        assert_eq!(structure_target(&g, &t, &units), Some(UnitId(2)));
        assert_eq!(structure_target(&g, &t, &units[2..]), None);
    }

    #[test]
    fn test_structure_range_uses_centre_distance() {
        let g = grid();
        let t = tower(&g, 10, Team::TOP, 6, 12);
        let edge = t.position + Vec2Fixed::new(Fixed::ZERO, t.range_world(g.cell_width()));

        let on_edge = custom(&g, 1, Team::BOTTOM, UnitTemplate::default(), edge);
        assert_eq!(structure_target(&g, &t, std::slice::from_ref(&on_edge)), Some(UnitId(1)));

        // Footprint overlaps the range circle but the centre is outside it.
        let beyond = edge + Vec2Fixed::new(Fixed::ZERO, on_edge.radius() / Fixed::from_num(2));
        let overlapping = custom(&g, 2, Team::BOTTOM, UnitTemplate::default(), beyond);
        assert!(overlapping.radius() > Fixed::ZERO);
        assert_eq!(structure_target(&g, &t, &[overlapping]), None);
    }
}
