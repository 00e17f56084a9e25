//! Combat resolution: engagement, attacks, damage and death effects.

use crate::components::{Attacker, EntityRef, UnitId};
use crate::math::{Fixed, Vec2Fixed};
use crate::projectile::{create_projectile, ProjectileLaunch};
use crate::simulation::{unit_index, DamageEvent, EndReason, Match};
use crate::targeting::{
    can_attack_structure, can_attack_unit, nearest_enemy_structure, nearest_enemy_unit,
    structure_target,
};
use crate::templates::STRUCTURE_PROJECTILE;

impl Match {
    /// Target the unit at `idx` can strike right now, if any.
    ///
    /// The nearest visible enemy unit wins when it is in range; otherwise
    /// the nearest visible enemy structure when that is in range.
    pub(crate) fn find_engagement(&self, idx: usize) -> Option<EntityRef> {
        let unit = &self.units[idx];

        if let Some(id) = nearest_enemy_unit(&self.grid, unit, &self.units) {
            if self
                .unit(id)
                .is_some_and(|target| can_attack_unit(&self.grid, unit, target))
            {
                return Some(EntityRef::Unit(id));
            }
        }

        let enemy = &self.players[unit.team.enemy().index()];
        let sighting = nearest_enemy_structure(&self.grid, unit, &enemy.towers, &enemy.king)?;
        let structure = enemy.structure(sighting.id)?;
        can_attack_structure(&self.grid, unit, structure).then_some(EntityRef::Structure(sighting.id))
    }

    /// Hold position and attack when the cooldown allows.
    pub(crate) fn engage(&mut self, idx: usize, target: EntityRef) {
        let unit = &mut self.units[idx];
        unit.velocity = Vec2Fixed::ZERO;
        unit.target_velocity = Vec2Fixed::ZERO;
        unit.is_attacking = true;

        if unit.cooldown_ready(self.tick) {
            self.resolve_unit_attack(idx, target);
        }
    }

    /// Fire a projectile or strike directly, plus melee splash.
    fn resolve_unit_attack(&mut self, idx: usize, target: EntityRef) {
        let Some(target_position) = self.entity_position(target) else {
            return;
        };
        let unit = &mut self.units[idx];
        unit.last_attack_tick = Some(self.tick);
        let (id, team, origin) = (unit.id, unit.team, unit.position);
        let template = unit.template.clone();

        tracing::debug!(
            tick = self.tick,
            unit = id.0,
            team = team.index(),
            target = ?target,
            "Attack resolved"
        );

        if template.fires_projectile() {
            let launch = ProjectileLaunch {
                template: &template.projectile,
                origin,
                target_position,
                target: Some(target),
                team,
                source: Attacker::Unit(id),
                damage: template.damage,
                max_lifetime: self.config.projectile_lifetime_ticks,
            };
            if let Some(projectile) = create_projectile(self.templates.as_ref(), &launch) {
                self.events.projectiles_spawned += 1;
                self.projectiles.push(projectile);
                return;
            }
        }

        self.apply_damage(target, template.damage, Attacker::Unit(id));

        if template.is_melee() && template.area_damage_radius > Fixed::ZERO {
            let radius = template.area_damage_radius * self.grid.cell_width();
            let splashed: Vec<UnitId> = self
                .units
                .iter()
                .filter(|u| u.active && u.team != team && EntityRef::Unit(u.id) != target)
                .filter(|u| template.can_hit(u.is_flying()))
                .filter(|u| u.position.distance(target_position) <= radius)
                .map(|u| u.id)
                .collect();
            for victim in splashed {
                self.apply_damage(EntityRef::Unit(victim), template.damage, Attacker::Unit(id));
            }
        }
    }

    /// Deal damage and handle any resulting death. Returns whether the
    /// target died. Dead or unknown targets are ignored.
    pub(crate) fn apply_damage(&mut self, target: EntityRef, amount: u32, attacker: Attacker) -> bool {
        let tick = self.tick;
        let (dealt, killed) = match target {
            EntityRef::Unit(id) => {
                let Some(unit) = unit_index(id).and_then(|i| self.units.get_mut(i)) else {
                    return false;
                };
                if !unit.active {
                    return false;
                }
                let dealt = unit.health.apply_damage(amount);
                let killed = unit.health.is_dead();
                if killed {
                    unit.active = false;
                    unit.is_attacking = false;
                    unit.velocity = Vec2Fixed::ZERO;
                    let template = &unit.template;
                    if template.death_damage > 0 && template.death_damage_radius > Fixed::ZERO {
                        self.pending_deaths.push(id);
                    }
                    self.events.units_killed.push(id);
                    tracing::debug!(tick, unit = id.0, team = unit.team.index(), "Unit killed");
                }
                (dealt, killed)
            }
            EntityRef::Structure(id) => {
                let Some(structure) = self.structure_mut(id) else {
                    return false;
                };
                if !structure.active {
                    return false;
                }
                let dealt = structure.health.apply_damage(amount);
                let killed = structure.health.is_dead();
                if killed {
                    structure.active = false;
                }
                let (owner, is_king) = (structure.team, structure.ends_match_on_destruction());

                if killed {
                    self.players[owner.enemy().index()].crowns += 1;
                    self.events.structures_destroyed.push(id);
                    tracing::debug!(tick, structure = id.0, team = owner.index(), "Structure destroyed");
                    if is_king && self.outcome.is_none() {
                        tracing::info!(tick, team = owner.index(), "King destroyed");
                        self.finish(Some(owner.enemy()), EndReason::KingDestroyed);
                    }
                }
                (dealt, killed)
            }
        };

        if killed {
            if let Attacker::Unit(source) = attacker {
                if let Some(unit) = unit_index(source).and_then(|i| self.units.get_mut(i)) {
                    unit.is_attacking = false;
                }
            }
        }

        self.events.damage_events.push(DamageEvent {
            attacker,
            target,
            amount: dealt,
            killed,
        });
        killed
    }

    /// Let every structure shoot at the nearest enemy unit in range.
    pub(crate) fn run_structure_system(&mut self) {
        let interval = self.config.structure_attack_interval;
        for team in 0..self.players.len() {
            let ids: Vec<_> = self.players[team].structures().map(|s| s.id).collect();
            for id in ids {
                let Some(structure) = self.structure(id) else {
                    continue;
                };
                if !structure.active || self.tick.saturating_sub(structure.last_attack_tick) < interval {
                    continue;
                }
                let Some(target) = structure_target(&self.grid, structure, &self.units) else {
                    continue;
                };
                let Some(target_position) = self.unit(target).map(|u| u.position) else {
                    continue;
                };

                let launch = ProjectileLaunch {
                    template: STRUCTURE_PROJECTILE,
                    origin: structure.position,
                    target_position,
                    target: Some(EntityRef::Unit(target)),
                    team: structure.team,
                    source: Attacker::Structure(id),
                    damage: structure.damage,
                    max_lifetime: self.config.projectile_lifetime_ticks,
                };
                let damage = structure.damage;
                let projectile = create_projectile(self.templates.as_ref(), &launch);

                let tick = self.tick;
                if let Some(structure) = self.structure_mut(id) {
                    structure.last_attack_tick = tick;
                }
                tracing::debug!(tick = self.tick, structure = id.0, unit = target.0, "Structure fired");

                match projectile {
                    Some(projectile) => {
                        self.events.projectiles_spawned += 1;
                        self.projectiles.push(projectile);
                    }
                    None => {
                        self.apply_damage(EntityRef::Unit(target), damage, Attacker::Structure(id));
                    }
                }
            }
        }
    }

    /// Clear `is_attacking` on units with nothing left to hit.
    pub(crate) fn run_cleanup_system(&mut self) {
        for idx in 0..self.units.len() {
            let unit = &self.units[idx];
            if !unit.active || !unit.is_attacking {
                continue;
            }
            let has_unit_target = self
                .units
                .iter()
                .any(|other| can_attack_unit(&self.grid, unit, other));
            let has_structure_target = self
                .structures()
                .any(|s| can_attack_structure(&self.grid, unit, s));
            if !has_unit_target && !has_structure_target {
                self.units[idx].is_attacking = false;
            }
        }
    }

    /// Fire queued death bursts until no new ones are queued.
    pub(crate) fn flush_death_effects(&mut self) {
        while !self.pending_deaths.is_empty() {
            let batch = std::mem::take(&mut self.pending_deaths);
            for id in batch {
                let Some(dead) = self.unit(id) else {
                    continue;
                };
                let (team, center) = (dead.team, dead.position);
                let damage = dead.template.death_damage;
                let radius = dead.template.death_damage_radius * self.grid.cell_width();

                let mut victims: Vec<EntityRef> = self
                    .active_units()
                    .filter(|u| u.team != team)
                    .filter(|u| u.position.distance(center) <= radius + u.radius())
                    .map(|u| EntityRef::Unit(u.id))
                    .collect();
                victims.extend(
                    self.players[team.enemy().index()]
                        .structures()
                        .filter(|s| s.active && s.position.distance(center) <= radius + s.radius)
                        .map(|s| EntityRef::Structure(s.id)),
                );

                tracing::debug!(
                    tick = self.tick,
                    unit = id.0,
                    victims = victims.len(),
                    "Death burst"
                );
                for victim in victims {
                    self.apply_damage(victim, damage, Attacker::DeathBurst(id));
                }
            }
        }
    }
}
