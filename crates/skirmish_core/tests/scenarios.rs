//! End-to-end match scenarios.

use std::sync::Arc;

use proptest::prelude::*;
use skirmish_core::components::{Team, Unit, UnitId};
use skirmish_core::config::{ProjectileMode, SimConfig};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::pathfinding::find_path;
use skirmish_core::simulation::{EndReason, Match, UnitSpawnParams};
use skirmish_core::steering::push_impulse;
use skirmish_core::targeting::nearest_enemy_unit;
use skirmish_core::templates::UnitTemplate;
use skirmish_core::terrain::TileClass;
use skirmish_test_utils::determinism::{run_with_deployments, strategies::arb_deployments};
use skirmish_test_utils::fixtures::{
    duel_match, duelist, fixed, fixed_f, open_terrain, pos, reference_match,
};

fn dummy(hitpoints: u32) -> UnitTemplate {
    UnitTemplate {
        hitpoints,
        damage: 0,
        speed: Fixed::ZERO,
        range: Fixed::ZERO,
        sight_range: Fixed::ZERO,
        ..Default::default()
    }
}

// ============================================================================
// Combat
// ============================================================================

#[test]
fn test_melee_duel_two_attacks_kill() {
    let (mut game, a, b) = duel_match(duelist(100, 75), duelist(150, 0));

    game.tick().unwrap();
    assert_eq!(game.unit(b).unwrap().health.current, 75);
    assert!(game.unit(a).unwrap().is_attacking);

    let delay = game.unit(a).unwrap().attack_delay;
    for _ in 0..delay {
        game.tick().unwrap();
    }

    let target = game.unit(b).unwrap();
    assert_eq!(target.health.current, 0);
    assert!(!target.active);
    assert!(!game.unit(a).unwrap().is_attacking);
    assert_eq!(game.active_units().count(), 1);
}

#[test]
fn test_archer_projectile_uses_template_damage() {
    let mut game = reference_match();
    game.spawn_from_template("Archer", Team::TOP, 10, 20).unwrap();
    let spot = game.grid().cell_to_world(13, 20);
    game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: spot,
        stats: dummy(500),
    })
    .unwrap();

    let events = game.tick().unwrap();

    assert_eq!(events.projectiles_spawned, 1);
    assert_eq!(game.projectiles().len(), 1);
    assert_eq!(game.projectiles()[0].damage, 40);
}

#[test]
fn test_archer_arrow_lands() {
    let mut game = reference_match();
    game.spawn_from_template("Archer", Team::TOP, 10, 20).unwrap();
    let spot = game.grid().cell_to_world(13, 20);
    let target = game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: spot,
        stats: dummy(500),
    })
    .unwrap();

    for _ in 0..10 {
        game.tick().unwrap();
    }
    assert_eq!(game.unit(target).unwrap().health.current, 460);
}

#[test]
fn test_frozen_mode_arrow_never_lands_on_units() {
    let mut game = Match::new(SimConfig {
        projectile_mode: ProjectileMode::Frozen,
        ..Default::default()
    });
    game.spawn_from_template("Archer", Team::TOP, 10, 20).unwrap();
    let spot = game.grid().cell_to_world(13, 20);
    let target = game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: spot,
        stats: dummy(500),
    })
    .unwrap();

    for _ in 0..10 {
        game.tick().unwrap();
    }
    assert_eq!(game.unit(target).unwrap().health.current, 500);
    assert_eq!(game.projectiles().len(), 1);
}

#[test]
fn test_tower_defends_against_intruder() {
    let mut game = reference_match();
    let tower = game.player(Team::TOP).towers[0].clone();
    let spot = tower.position + Vec2Fixed::new(Fixed::ZERO, tower.radius + fixed(10));
    let intruder = game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: spot,
        stats: dummy(1000),
    })
    .unwrap();

    for _ in 0..80 {
        game.tick().unwrap();
    }
    assert!(game.unit(intruder).unwrap().health.current < 1000);
}

#[test]
fn test_destroying_king_wins() {
    let mut game = reference_match();
    let king = game.player(Team::BOTTOM).king.clone();
    let spot = king.position - Vec2Fixed::new(Fixed::ZERO, king.radius + fixed(2));
    game.spawn_unit(UnitSpawnParams {
        team: Team::TOP,
        position: spot,
        stats: UnitTemplate {
            damage: 2000,
            speed: Fixed::ZERO,
            targets_only_structures: true,
            ..Default::default()
        },
    })
    .unwrap();

    let events = game.tick().unwrap();

    let outcome = events.outcome.unwrap();
    assert_eq!(outcome.winner, Some(Team::TOP));
    assert_eq!(outcome.reason, EndReason::KingDestroyed);
    assert!(game.tick().is_err());
}

// ============================================================================
// Targeting and movement
// ============================================================================

#[test]
fn test_water_hides_ground_enemies() {
    let mut game = reference_match();
    let scout = game.spawn_unit(UnitSpawnParams {
        team: Team::TOP,
        position: game.grid().cell_to_world(15, 28),
        stats: UnitTemplate {
            sight_range: fixed(20),
            attacks_air: true,
            speed: Fixed::ZERO,
            ..Default::default()
        },
    })
    .unwrap();
    game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: game.grid().cell_to_world(15, 35),
        stats: dummy(100),
    })
    .unwrap();

    let scout_unit = game.unit(scout).unwrap();
    assert_eq!(nearest_enemy_unit(game.grid(), scout_unit, game.units()), None);

    let flier = game.spawn_unit(UnitSpawnParams {
        team: Team::BOTTOM,
        position: game.grid().cell_to_world(15, 36),
        stats: UnitTemplate {
            flying_height: Fixed::ONE,
            ..dummy(100)
        },
    })
    .unwrap();
    let scout_unit = game.unit(scout).unwrap();
    assert_eq!(nearest_enemy_unit(game.grid(), scout_unit, game.units()), Some(flier));
}

#[test]
fn test_knight_marches_to_bridge() {
    let mut game = reference_match();
    let knight = game.spawn_from_template("Knight", Team::TOP, 17, 20).unwrap();
    let start = game.unit(knight).unwrap().position;

    for _ in 0..100 {
        game.tick().unwrap();
    }
    let end = game.unit(knight).unwrap().position;
    assert!(end.y > start.y);
    assert_ne!(end, start);
}

#[test]
fn test_out_of_bounds_queries_are_safe() {
    let game = reference_match();
    let grid = game.grid();
    for (col, row) in [(-1, 0), (0, -1), (36, 0), (0, 64), (i32::MAX, i32::MIN)] {
        assert_eq!(grid.tile_at(col, row), TileClass::Boundary);
        assert!(!grid.is_walkable(col, row));
    }
}

// ============================================================================
// Properties
// ============================================================================

fn test_unit(id: u32, team: Team, position: Vec2Fixed) -> Unit {
    Unit::new(
        UnitId(id),
        team,
        Arc::new(UnitTemplate::default()),
        position,
        fixed(10),
        60,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_path_endpoints_are_cell_centers(
        sc in 0i32..20, sr in 0i32..20, gc in 0i32..20, gr in 0i32..20,
    ) {
        let grid = open_terrain(20, 20);
        let path = find_path(&grid, grid.cell_to_world(sc, sr), grid.cell_to_world(gc, gr)).unwrap();
        prop_assert_eq!(path[0], grid.cell_to_world(sc, sr));
        prop_assert_eq!(*path.last().unwrap(), grid.cell_to_world(gc, gr));
    }

    #[test]
    fn prop_out_of_range_tiles_are_boundary(col in -100i32..200, row in -100i32..200) {
        let game = reference_match();
        let grid = game.grid();
        prop_assume!(!grid.in_bounds(col, row));
        prop_assert_eq!(grid.tile_at(col, row), TileClass::Boundary);
        prop_assert!(!grid.is_walkable(col, row));
    }

    #[test]
    fn prop_push_is_mutual(dx in -7.5f64..7.5, dy in -7.5f64..7.5, same_team in any::<bool>()) {
        let a = test_unit(1, Team::TOP, pos(100, 100));
        let team = if same_team { Team::TOP } else { Team::BOTTOM };
        let b = test_unit(2, team, pos(100, 100) + Vec2Fixed::new(fixed_f(dx), fixed_f(dy)));

        let ab = push_impulse(&a, &b, fixed(10), fixed(10));
        let ba = push_impulse(&b, &a, fixed(10), fixed(10));
        prop_assert_eq!(ab.is_some(), ba.is_some());
        if let (Some(ab), Some(ba)) = (ab, ba) {
            let tolerance = fixed_f(1e-6);
            prop_assert!((ab.offset.x + ba.offset.x).abs() <= tolerance);
            prop_assert!((ab.offset.y + ba.offset.y).abs() <= tolerance);
            prop_assert!(ab.offset.dot(b.position - a.position) <= Fixed::ZERO);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_random_deployments_are_deterministic(plan in arb_deployments(6, 30)) {
        let a = run_with_deployments(&plan, 60);
        let b = run_with_deployments(&plan, 60);
        prop_assert_eq!(a.state_hash(), b.state_hash());
        prop_assert_eq!(a.current_tick(), 60);
    }
}
