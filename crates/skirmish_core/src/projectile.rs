//! Projectiles: creation from templates, flight, collision and impact.
//!
//! Projectiles are plain values in a list owned by the match. The list
//! is rebuilt every tick from the entries that are still active.

use std::sync::Arc;

use crate::components::{Attacker, EntityRef, StructureId, Team, Unit, UnitId};
use crate::config::ProjectileMode;
use crate::math::{ratio, Fixed, Vec2Fixed};
use crate::simulation::Match;
use crate::templates::{is_projectile_name, ProjectileTemplate, TemplateLookup};

/// Slowest projectile speed in cells per tick.
pub const MIN_PROJECTILE_SPEED: Fixed = ratio(1, 10);

/// Fastest projectile speed in cells per tick.
pub const MAX_PROJECTILE_SPEED: Fixed = ratio(2, 1);

/// Smallest visual size in world units.
pub const MIN_PROJECTILE_SIZE: Fixed = ratio(4, 1);

/// Visual size per cell of projectile radius.
const SIZE_PER_RADIUS: i32 = 20;

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    /// Where it was launched.
    pub origin: Vec2Fixed,
    /// Current world position.
    pub position: Vec2Fixed,
    /// Aim point; follows the target while homing.
    pub target_position: Vec2Fixed,
    /// Entity it was fired at.
    pub target: Option<EntityRef>,
    /// Unit heading.
    pub direction: Vec2Fixed,
    /// Cells per tick.
    pub speed: Fixed,
    /// Damage on impact.
    pub damage: u32,
    /// Area radius in cells; zero for single target.
    pub radius: Fixed,
    /// Visual size in world units.
    pub size: Fixed,
    /// False once it has hit or expired.
    pub active: bool,
    /// Team of the shooter.
    pub team: Team,
    /// Tracks its target.
    pub homing: bool,
    /// Ticks spent homing.
    pub homing_elapsed: u32,
    /// Homing duration in ticks; 0 is unlimited.
    pub homing_max: u32,
    /// Area damage hits flying units.
    pub aoe_to_air: bool,
    /// Area damage hits ground units.
    pub aoe_to_ground: bool,
    /// Ticks alive.
    pub lifetime: u32,
    /// Ticks before expiry.
    pub max_lifetime: u32,
    /// Who fired it.
    pub source: Attacker,
    /// Stat template.
    pub template: Arc<ProjectileTemplate>,
}

impl Projectile {
    /// Whether impacts damage an area.
    #[must_use]
    pub fn is_area(&self) -> bool {
        self.radius > Fixed::ZERO
    }

    fn homing_active(&self) -> bool {
        self.homing && (self.homing_max == 0 || self.homing_elapsed < self.homing_max)
    }
}

/// Everything needed to launch a projectile.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileLaunch<'a> {
    /// Projectile template name.
    pub template: &'a str,
    /// Launch point.
    pub origin: Vec2Fixed,
    /// Aim point.
    pub target_position: Vec2Fixed,
    /// Entity aimed at.
    pub target: Option<EntityRef>,
    /// Shooter's team.
    pub team: Team,
    /// Shooter.
    pub source: Attacker,
    /// Shooter's damage, used when the template sets none.
    pub damage: u32,
    /// Ticks before expiry.
    pub max_lifetime: u32,
}

/// Build a projectile from a named template.
///
/// Returns `None` for the "no projectile" names. An unknown name falls
/// back to the default projectile and logs a warning.
#[must_use]
pub fn create_projectile(templates: &dyn TemplateLookup, launch: &ProjectileLaunch<'_>) -> Option<Projectile> {
    if !is_projectile_name(launch.template) {
        return None;
    }
    let template = templates.projectile(launch.template).unwrap_or_else(|| {
        tracing::warn!(name = launch.template, "Projectile template missing, using default");
        Arc::new(ProjectileTemplate::fallback(launch.template))
    });

    let mut direction = (launch.target_position - launch.origin).normalize();
    if direction.is_zero() {
        direction = Vec2Fixed::new(Fixed::ZERO, Fixed::ONE);
    }
    let damage = if template.damage > 0 {
        template.damage
    } else {
        launch.damage
    };

    Some(Projectile {
        origin: launch.origin,
        position: launch.origin,
        target_position: launch.target_position,
        target: launch.target,
        direction,
        speed: template.speed.clamp(MIN_PROJECTILE_SPEED, MAX_PROJECTILE_SPEED),
        damage,
        radius: template.radius,
        size: (template.projectile_radius * Fixed::from_num(SIZE_PER_RADIUS)).max(MIN_PROJECTILE_SIZE),
        active: true,
        team: launch.team,
        homing: template.homing,
        homing_elapsed: 0,
        homing_max: template.homing_time,
        aoe_to_air: template.aoe_to_air,
        aoe_to_ground: template.aoe_to_ground,
        lifetime: 0,
        max_lifetime: launch.max_lifetime,
        source: launch.source,
        template,
    })
}

// ============================================================================
// Projectile system
// ============================================================================

impl Match {
    /// Age, move and resolve every projectile, then compact the list.
    pub(crate) fn run_projectile_system(&mut self) {
        let mut flying = std::mem::take(&mut self.projectiles);

        for projectile in &mut flying {
            if !projectile.active {
                continue;
            }
            projectile.lifetime += 1;
            if projectile.lifetime > projectile.max_lifetime {
                projectile.active = false;
                self.events.projectiles_expired += 1;
                tracing::debug!(tick = self.tick, team = projectile.team.index(), "Projectile expired");
                continue;
            }

            if self.config.projectile_mode == ProjectileMode::Advance {
                if let Some(hit) = self.advance_projectile(projectile) {
                    self.resolve_impact(projectile, hit);
                    continue;
                }
            }

            if projectile.active {
                if let Some(structure) = self.structure_in_reach(projectile) {
                    self.resolve_impact(projectile, Some(EntityRef::Structure(structure)));
                }
            }
        }

        let mut kept: Vec<Projectile> = flying.into_iter().filter(|p| p.active).collect();
        kept.append(&mut self.projectiles);
        self.projectiles = kept;
    }

    /// Move one step. Returns `Some` when the projectile lands this tick;
    /// the inner value is the entity it struck, if any.
    fn advance_projectile(&self, projectile: &mut Projectile) -> Option<Option<EntityRef>> {
        let cw = self.grid.cell_width();

        if projectile.homing_active() {
            if let Some(pos) = projectile.target.and_then(|t| self.entity_position(t)) {
                projectile.target_position = pos;
            }
            projectile.homing_elapsed += 1;
        }

        let to_target = projectile.target_position - projectile.position;
        let remaining = to_target.length();
        let step = projectile.speed * cw;

        let arrived = remaining <= step;
        if arrived {
            projectile.position = projectile.target_position;
        } else {
            projectile.direction = to_target.normalize();
            projectile.position += projectile.direction * step;
        }

        if let Some(unit) = self.unit_in_reach(projectile) {
            return Some(Some(EntityRef::Unit(unit)));
        }
        if arrived {
            let live_target = projectile.target.filter(|t| self.entity_position(*t).is_some());
            return Some(live_target);
        }
        None
    }

    /// Enemy unit overlapping the projectile. A live unit target is the
    /// only candidate; otherwise the nearest enemy unit.
    fn unit_in_reach(&self, projectile: &Projectile) -> Option<UnitId> {
        let half = projectile.size / Fixed::from_num(2);
        let overlaps = |unit: &Unit| {
            unit.active
                && unit.team != projectile.team
                && projectile.position.distance(unit.position) <= unit.radius() + half
        };

        if let Some(EntityRef::Unit(id)) = projectile.target {
            if let Some(target) = self.unit(id).filter(|u| u.active) {
                return overlaps(target).then_some(id);
            }
        }

        self.units
            .iter()
            .filter(|u| overlaps(u))
            .min_by_key(|u| projectile.position.distance_squared(u.position))
            .map(|u| u.id)
    }

    /// Enemy structure whose footprint the projectile touches, King first.
    fn structure_in_reach(&self, projectile: &Projectile) -> Option<StructureId> {
        let half = projectile.size / Fixed::from_num(2);
        self.players[projectile.team.enemy().index()]
            .structures()
            .find(|s| s.active && projectile.position.distance(s.position) <= s.radius + half)
            .map(|s| s.id)
    }

    /// Apply a projectile's damage and retire it.
    fn resolve_impact(&mut self, projectile: &mut Projectile, hit: Option<EntityRef>) {
        projectile.active = false;
        self.events.projectile_impacts += 1;
        tracing::debug!(
            tick = self.tick,
            team = projectile.team.index(),
            hit = ?hit,
            area = projectile.is_area(),
            "Projectile impact"
        );

        if !projectile.is_area() {
            if let Some(target) = hit {
                self.apply_damage(target, projectile.damage, projectile.source);
            }
            return;
        }

        let center = projectile.position;
        let radius = projectile.radius * self.grid.cell_width();
        let mut victims: Vec<EntityRef> = self
            .units
            .iter()
            .filter(|u| u.active && u.team != projectile.team)
            .filter(|u| {
                if u.is_flying() {
                    projectile.aoe_to_air
                } else {
                    projectile.aoe_to_ground
                }
            })
            .filter(|u| center.distance(u.position) <= radius)
            .map(|u| EntityRef::Unit(u.id))
            .collect();
        victims.extend(
            self.players[projectile.team.enemy().index()]
                .structures()
                .filter(|s| s.active && center.distance(s.position) - s.radius <= radius)
                .map(|s| EntityRef::Structure(s.id)),
        );
        if let Some(target) = hit {
            if !victims.contains(&target) {
                victims.push(target);
            }
        }

        for victim in victims {
            self.apply_damage(victim, projectile.damage, projectile.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::simulation::UnitSpawnParams;
    use crate::templates::{TemplateRegistry, UnitTemplate};

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn launch(template: &str) -> ProjectileLaunch<'_> {
        ProjectileLaunch {
            template,
            origin: v(100, 100),
            target_position: v(100, 200),
            target: None,
            team: Team::TOP,
            source: Attacker::Structure(StructureId(1)),
            damage: 12,
            max_lifetime: 300,
        }
    }

    #[test]
    fn test_no_projectile_names() {
        let registry = TemplateRegistry::with_defaults();
        assert!(create_projectile(&registry, &launch("")).is_none());
        assert!(create_projectile(&registry, &launch("none")).is_none());
    }

    #[test]
    fn test_template_damage_overrides_attacker() {
        let registry = TemplateRegistry::with_defaults();
        let arrow = create_projectile(&registry, &launch("ArcherArrow")).unwrap();
        assert_eq!(arrow.damage, 40);
        assert_eq!(arrow.speed, Fixed::ONE);
        assert_eq!(arrow.size, Fixed::from_num(4));
        assert_eq!(arrow.direction, v(0, 1));

        let fireball = create_projectile(&registry, &launch("DragonFireball")).unwrap();
        assert_eq!(fireball.damage, 12);
        assert!(fireball.is_area());
        assert_eq!(fireball.size, Fixed::from_num(5));
    }

    #[test]
    fn test_missing_template_falls_back() {
        let registry = TemplateRegistry::empty();
        let p = create_projectile(&registry, &launch("Mystery")).unwrap();
        assert_eq!(p.template.name, "Mystery");
        assert_eq!(p.damage, 45);
        assert_eq!(p.speed, ratio(7, 10));
    }

    #[test]
    fn test_coincident_launch_points_down() {
        let registry = TemplateRegistry::with_defaults();
        let mut params = launch("normal");
        params.target_position = params.origin;
        let p = create_projectile(&registry, &params).unwrap();
        assert_eq!(p.direction, v(0, 1));
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut registry = TemplateRegistry::empty();
        registry.insert_projectile(ProjectileTemplate {
            speed: Fixed::from_num(9),
            ..ProjectileTemplate::fallback("Fast")
        });
        registry.insert_projectile(ProjectileTemplate {
            speed: Fixed::ZERO,
            ..ProjectileTemplate::fallback("Slow")
        });
        let fast = create_projectile(&registry, &launch("Fast")).unwrap();
        let slow = create_projectile(&registry, &launch("Slow")).unwrap();
        assert_eq!(fast.speed, MAX_PROJECTILE_SPEED);
        assert_eq!(slow.speed, MIN_PROJECTILE_SPEED);
    }

    fn dummy(game: &mut Match, team: Team, x: i32, y: i32) -> UnitId {
        game.spawn_unit(UnitSpawnParams {
            team,
            position: v(x, y),
            stats: UnitTemplate {
                hitpoints: 100,
                speed: Fixed::ZERO,
                sight_range: Fixed::ZERO,
                range: Fixed::ZERO,
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[test]
    fn test_projectile_expires_after_lifetime() {
        let mut game = Match::new(SimConfig {
            projectile_lifetime_ticks: 3,
            projectile_mode: ProjectileMode::Frozen,
            ..Default::default()
        });
        let registry = TemplateRegistry::with_defaults();
        let mut params = launch("normal");
        params.max_lifetime = 3;
        game.projectiles.push(create_projectile(&registry, &params).unwrap());

        for _ in 0..3 {
            game.tick().unwrap();
        }
        assert_eq!(game.projectiles().len(), 1);

        let events = game.tick().unwrap();
        assert_eq!(events.projectiles_expired, 1);
        assert!(game.projectiles().is_empty());
    }

    #[test]
    fn test_projectile_travels_and_hits_target() {
        let mut game = Match::new(SimConfig::default());
        let target = dummy(&mut game, Team::BOTTOM, 300, 300);
        let registry = TemplateRegistry::with_defaults();
        let mut params = launch("ArcherArrow");
        params.origin = v(300, 200);
        params.target_position = v(300, 300);
        params.target = Some(EntityRef::Unit(target));
        game.projectiles.push(create_projectile(&registry, &params).unwrap());

        let mut impacts = 0;
        for _ in 0..10 {
            impacts += game.tick().unwrap().projectile_impacts;
        }

        assert_eq!(impacts, 1);
        assert!(game.projectiles().is_empty());
        assert_eq!(game.unit(target).unwrap().health.current, 60);
    }

    #[test]
    fn test_frozen_projectile_does_not_move() {
        let mut game = Match::new(SimConfig {
            projectile_mode: ProjectileMode::Frozen,
            ..Default::default()
        });
        let registry = TemplateRegistry::with_defaults();
        game.projectiles
            .push(create_projectile(&registry, &launch("ArcherArrow")).unwrap());

        game.tick().unwrap();
        assert_eq!(game.projectiles()[0].position, v(100, 100));
        assert_eq!(game.projectiles()[0].lifetime, 1);
    }

    #[test]
    fn test_structure_sweep_hits_enemy_tower() {
        let mut game = Match::new(SimConfig {
            projectile_mode: ProjectileMode::Frozen,
            ..Default::default()
        });
        let tower = game.player(Team::BOTTOM).towers[0].clone();
        let registry = TemplateRegistry::with_defaults();
        let mut params = launch("normal");
        params.origin = tower.position;
        params.target_position = tower.position;
        game.projectiles.push(create_projectile(&registry, &params).unwrap());

        let events = game.tick().unwrap();
        assert_eq!(events.projectile_impacts, 1);
        assert_eq!(game.structure(tower.id).unwrap().health.current, 1200 - 45);
    }

    #[test]
    fn test_area_impact_respects_air_and_ground_flags() {
        let mut game = Match::new(SimConfig::default());
        let ground = dummy(&mut game, Team::BOTTOM, 300, 300);
        let bystander = dummy(&mut game, Team::BOTTOM, 310, 300);
        let friend = dummy(&mut game, Team::TOP, 300, 310);
        let flier = game.spawn_unit(UnitSpawnParams {
            team: Team::BOTTOM,
            position: v(290, 300),
            stats: UnitTemplate {
                flying_height: Fixed::ONE,
                speed: Fixed::ZERO,
                sight_range: Fixed::ZERO,
                range: Fixed::ZERO,
                ..Default::default()
            },
        })
        .unwrap();

        let mut registry = TemplateRegistry::empty();
        registry.insert_projectile(ProjectileTemplate {
            damage: 30,
            radius: Fixed::from_num(2),
            aoe_to_ground: true,
            aoe_to_air: false,
            ..ProjectileTemplate::fallback("Splash")
        });
        let mut params = launch("Splash");
        params.origin = v(300, 300);
        params.target_position = v(300, 300);
        params.target = Some(EntityRef::Unit(ground));
        let mut projectile = create_projectile(&registry, &params).unwrap();

        game.resolve_impact(&mut projectile, Some(EntityRef::Unit(ground)));

        assert!(!projectile.active);
        assert_eq!(game.unit(ground).unwrap().health.current, 70);
        assert_eq!(game.unit(bystander).unwrap().health.current, 70);
        assert_eq!(game.unit(friend).unwrap().health.current, 100);
        assert_eq!(game.unit(flier).unwrap().health.current, 100);
    }
}
