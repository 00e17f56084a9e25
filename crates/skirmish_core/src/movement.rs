//! Unit movement: objective selection, path following, flocking and push.

use crate::math::Vec2Fixed;
use crate::pathfinding::find_path;
use crate::simulation::Match;
use crate::steering::{desired_velocity, ease_velocity, flock_forces, push_impulse};
use crate::targeting::{nearest_enemy_structure, nearest_enemy_unit};

impl Match {
    /// Where the unit at `idx` is heading this tick.
    ///
    /// Nearest visible enemy unit, else nearest visible enemy structure,
    /// else the closest standing enemy tower, else the enemy King. Ground
    /// units that would have to cross the water head for a bridge first.
    pub(crate) fn movement_goal(&self, idx: usize) -> Option<Vec2Fixed> {
        let unit = &self.units[idx];
        let enemy = &self.players[unit.team.enemy().index()];

        let objective = if let Some(id) = nearest_enemy_unit(&self.grid, unit, &self.units) {
            self.unit(id).map(|u| u.position)
        } else if let Some(sighting) =
            nearest_enemy_structure(&self.grid, unit, &enemy.towers, &enemy.king)
        {
            self.structure(sighting.id).map(|s| s.position)
        } else {
            enemy
                .towers
                .iter()
                .filter(|s| s.active)
                .min_by_key(|s| unit.position.distance_squared(s.position))
                .or_else(|| Some(&enemy.king).filter(|k| k.active))
                .map(|s| s.position)
        }?;

        if !unit.is_flying() && self.grid.needs_bridge(unit.position, objective) {
            return Some(self.grid.bridge_entry(unit.position).unwrap_or(objective));
        }
        Some(objective)
    }

    /// Whether the unit at `idx` should hold position this tick.
    ///
    /// True when its nearest sighted enemy unit (or, failing that, enemy
    /// structure) lies within the unit's own half footprint plus that
    /// enemy's attack range.
    pub(crate) fn within_halt_range(&self, idx: usize) -> bool {
        let unit = &self.units[idx];
        let cw = self.grid.cell_width();

        if let Some(enemy) = nearest_enemy_unit(&self.grid, unit, &self.units).and_then(|id| self.unit(id)) {
            return unit.position.distance(enemy.position) <= unit.radius() + enemy.range_world(cw);
        }

        let enemy = &self.players[unit.team.enemy().index()];
        nearest_enemy_structure(&self.grid, unit, &enemy.towers, &enemy.king)
            .and_then(|sighting| self.structure(sighting.id))
            .is_some_and(|s| unit.position.distance(s.position) <= unit.radius() + s.range_world(cw))
    }

    /// Steer the unit at `idx` one step toward its goal.
    pub(crate) fn advance_unit(&mut self, idx: usize) {
        let Some(goal) = self.movement_goal(idx) else {
            self.units[idx].velocity = Vec2Fixed::ZERO;
            return;
        };

        let cw = self.grid.cell_width();
        let ch = self.grid.cell_height();
        let unit = &self.units[idx];

        let waypoint = if unit.is_flying() {
            goal
        } else {
            match find_path(&self.grid, unit.position, goal) {
                Some(path) if path.len() >= 2 => path[1],
                _ => {
                    tracing::trace!(tick = self.tick, unit = unit.id.0, "No path, stepping directly");
                    let dir = (goal - unit.position).normalize();
                    unit.position + Vec2Fixed::new(dir.x * cw, dir.y * ch)
                }
            }
        };

        let forces = flock_forces(unit, &self.units, cw);
        let target = desired_velocity(unit.position, waypoint, unit.speed_world(cw), &forces);

        let unit = &mut self.units[idx];
        unit.target_velocity = target;
        unit.velocity = ease_velocity(unit.velocity, target, unit.max_acceleration);
        unit.position += unit.velocity;
    }

    /// Push the unit at `idx` apart from every other living unit it overlaps.
    pub(crate) fn apply_push_forces(&mut self, idx: usize) {
        let cw = self.grid.cell_width();
        let ch = self.grid.cell_height();

        for other in 0..self.units.len() {
            if other == idx || !self.units[other].active || !self.units[idx].active {
                continue;
            }
            let Some(impulse) = push_impulse(&self.units[idx], &self.units[other], cw, ch) else {
                continue;
            };
            let unit = &mut self.units[idx];
            unit.position += impulse.offset;
            unit.velocity += impulse.velocity;

            let reaction = impulse.opposite();
            let neighbour = &mut self.units[other];
            neighbour.position += reaction.offset;
            neighbour.velocity += reaction.velocity;
        }
    }
}
