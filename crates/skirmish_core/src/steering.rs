//! Flocking and push-apart forces.
//!
//! Forces are computed from a read-only view of all units. Applying
//! them is left to the movement stage.

use crate::components::Unit;
use crate::math::{ratio, Fixed, Vec2Fixed};

/// Separation radius as a fraction of aggro radius.
pub const SEPARATION_RADIUS: Fixed = ratio(1, 2);
/// Alignment radius as a fraction of aggro radius.
pub const ALIGNMENT_RADIUS: Fixed = ratio(7, 10);
/// Cohesion radius as a fraction of aggro radius.
pub const COHESION_RADIUS: Fixed = ratio(9, 10);

/// Share of the velocity gap alignment closes.
pub const ALIGNMENT_RATE: Fixed = ratio(1, 10);
/// Strength of the pull toward the neighbor centroid.
pub const COHESION_RATE: Fixed = ratio(1, 20);

/// Blend weight for separation.
pub const SEPARATION_WEIGHT: Fixed = ratio(3, 5);
/// Blend weight for alignment.
pub const ALIGNMENT_WEIGHT: Fixed = ratio(7, 10);
/// Blend weight for cohesion.
pub const COHESION_WEIGHT: Fixed = ratio(1, 2);

/// Slowest a moving unit may go, as a fraction of its speed.
pub const MIN_SPEED_FRACTION: Fixed = ratio(1, 10);
/// Multiplier on max acceleration when easing toward the desired velocity.
pub const ACCELERATION_SCALE: Fixed = ratio(3, 2);

/// Push radius in cell widths.
pub const PUSH_RADIUS: Fixed = ratio(4, 5);
/// Overall push strength.
pub const PUSH_STRENGTH: Fixed = ratio(4, 5);
/// Push factor between teammates.
pub const SAME_TEAM_PUSH: Fixed = ratio(2, 5);
/// Push factor between enemies.
pub const CROSS_TEAM_PUSH: Fixed = ratio(3, 5);
/// Share of the push that becomes displacement.
pub const PUSH_DAMPING: Fixed = ratio(4, 5);
/// Share of the push that becomes velocity.
pub const MOMENTUM_TRANSFER: Fixed = ratio(3, 10);

/// The three flocking contributions for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlockForces {
    /// Away from crowding neighbors of any team.
    pub separation: Vec2Fixed,
    /// Toward the mean teammate velocity.
    pub alignment: Vec2Fixed,
    /// Toward the teammate centroid.
    pub cohesion: Vec2Fixed,
}

impl FlockForces {
    /// Weighted sum of the three forces.
    #[must_use]
    pub fn combined(&self) -> Vec2Fixed {
        self.separation * SEPARATION_WEIGHT
            + self.alignment * ALIGNMENT_WEIGHT
            + self.cohesion * COHESION_WEIGHT
    }
}

fn mean(sum: Vec2Fixed, count: i32) -> Vec2Fixed {
    if count == 0 {
        return Vec2Fixed::ZERO;
    }
    let n = Fixed::from_num(count);
    Vec2Fixed::new(sum.x / n, sum.y / n)
}

/// Flocking forces acting on `unit` from every other active unit.
#[must_use]
pub fn flock_forces(unit: &Unit, units: &[Unit], cell_width: Fixed) -> FlockForces {
    let aggro = unit.aggro_world(cell_width);
    let separation_radius = aggro * SEPARATION_RADIUS;
    let alignment_radius = aggro * ALIGNMENT_RADIUS;
    let cohesion_radius = aggro * COHESION_RADIUS;

    let mut push_away = Vec2Fixed::ZERO;
    let mut push_count = 0;
    let mut velocity_sum = Vec2Fixed::ZERO;
    let mut velocity_count = 0;
    let mut center_sum = Vec2Fixed::ZERO;
    let mut center_count = 0;

    for other in units {
        if !other.active || other.id == unit.id {
            continue;
        }
        let dist = unit.position.distance(other.position);

        if dist < separation_radius && dist > Fixed::ZERO {
            let strength = (separation_radius - dist) / separation_radius;
            let away = unit.position - other.position;
            push_away += Vec2Fixed::new(away.x / dist, away.y / dist) * strength;
            push_count += 1;
        }

        if other.team != unit.team {
            continue;
        }
        if dist < alignment_radius {
            velocity_sum += other.velocity;
            velocity_count += 1;
        }
        if dist < cohesion_radius {
            center_sum += other.position;
            center_count += 1;
        }
    }

    let alignment = if velocity_count > 0 {
        (mean(velocity_sum, velocity_count) - unit.velocity) * ALIGNMENT_RATE
    } else {
        Vec2Fixed::ZERO
    };
    let cohesion = if center_count > 0 {
        (mean(center_sum, center_count) - unit.position).normalize() * COHESION_RATE
    } else {
        Vec2Fixed::ZERO
    };

    FlockForces {
        separation: mean(push_away, push_count),
        alignment,
        cohesion,
    }
}

/// Desired velocity toward `waypoint` with flocking blended in.
///
/// The result always has magnitude `speed` unless the unit already
/// sits on the waypoint, in which case it is zero.
#[must_use]
pub fn desired_velocity(position: Vec2Fixed, waypoint: Vec2Fixed, speed: Fixed, forces: &FlockForces) -> Vec2Fixed {
    let heading = (waypoint - position).normalize();
    if heading.is_zero() {
        return Vec2Fixed::ZERO;
    }
    let direct = heading * speed;
    let blended = direct + forces.combined() * speed;

    let renormalized = blended.normalize() * speed;
    let floor = speed * MIN_SPEED_FRACTION;
    if renormalized.length() < floor {
        heading * floor
    } else {
        renormalized
    }
}

/// Ease `velocity` toward `target` by the unit's responsiveness.
#[must_use]
pub fn ease_velocity(velocity: Vec2Fixed, target: Vec2Fixed, max_acceleration: Fixed) -> Vec2Fixed {
    velocity + (target - velocity) * (max_acceleration * ACCELERATION_SCALE)
}

/// Displacement and velocity nudges from one push interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushImpulse {
    /// Added to the first unit's position.
    pub offset: Vec2Fixed,
    /// Added to the first unit's velocity.
    pub velocity: Vec2Fixed,
}

impl PushImpulse {
    /// The equal and opposite impulse for the second unit.
    #[must_use]
    pub fn opposite(self) -> Self {
        Self {
            offset: -self.offset,
            velocity: -self.velocity,
        }
    }
}

/// Push between `a` and `b` when their centers sit inside the push radius.
///
/// Returns the impulse for `a`; `b` receives [`PushImpulse::opposite`].
/// Coincident centers produce no push.
#[must_use]
pub fn push_impulse(a: &Unit, b: &Unit, cell_width: Fixed, cell_height: Fixed) -> Option<PushImpulse> {
    let radius = PUSH_RADIUS * cell_width;
    let delta = b.position - a.position;
    let dist = delta.length();
    if dist >= radius || dist == Fixed::ZERO {
        return None;
    }

    let factor = if a.team == b.team {
        SAME_TEAM_PUSH
    } else {
        CROSS_TEAM_PUSH
    };
    let force = (radius - dist) / radius * PUSH_STRENGTH * factor;
    let dir = Vec2Fixed::new(delta.x / dist, delta.y / dist);

    let push = Vec2Fixed::new(dir.x * force * cell_width, dir.y * force * cell_height);
    Some(PushImpulse {
        offset: -(push * PUSH_DAMPING),
        velocity: -(dir * (MOMENTUM_TRANSFER * force)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Team, UnitId};
    use crate::templates::UnitTemplate;
    use std::sync::Arc;

    fn v(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn unit(id: u32, team: Team, pos: Vec2Fixed) -> Unit {
        let template = Arc::new(UnitTemplate {
            sight_range: Fixed::from_num(4),
            ..Default::default()
        });
        Unit::new(UnitId(id), team, template, pos, Fixed::from_num(10), 60)
    }

    #[test]
    fn test_separation_points_away() {
        let cw = Fixed::from_num(10);
        // Aggro 40, separation radius 20.
        let me = unit(1, Team::TOP, v(0.0, 0.0));
        let units = vec![me.clone(), unit(2, Team::BOTTOM, v(10.0, 0.0))];
        let forces = flock_forces(&me, &units, cw);
        assert!(forces.separation.x < Fixed::ZERO);
        assert_eq!(forces.separation.y, Fixed::ZERO);
        // Enemies do not count toward alignment or cohesion.
        assert_eq!(forces.cohesion, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_cohesion_and_alignment_use_teammates() {
        let cw = Fixed::from_num(10);
        let me = unit(1, Team::TOP, v(0.0, 0.0));
        let mut mate = unit(2, Team::TOP, v(0.0, 25.0));
        mate.velocity = v(0.0, 2.0);
        let units = vec![me.clone(), mate];
        let forces = flock_forces(&me, &units, cw);

        let pull = forces.cohesion - v(0.0, 1.0) * COHESION_RATE;
        assert!(pull.length() < Fixed::from_num(0.0001), "got {:?}", forces.cohesion);
        assert_eq!(forces.alignment, v(0.0, 2.0) * ALIGNMENT_RATE);
        // 25 is outside the separation radius.
        assert_eq!(forces.separation, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_inactive_units_are_ignored() {
        let cw = Fixed::from_num(10);
        let me = unit(1, Team::TOP, v(0.0, 0.0));
        let mut dead = unit(2, Team::TOP, v(5.0, 0.0));
        dead.active = false;
        let forces = flock_forces(&me, &[me.clone(), dead], cw);
        assert_eq!(forces, FlockForces::default());
    }

    #[test]
    fn test_desired_velocity_keeps_speed() {
        let forces = FlockForces {
            separation: v(-0.5, 0.0),
            ..Default::default()
        };
        let speed = Fixed::from_num(2);
        let vel = desired_velocity(v(0.0, 0.0), v(0.0, 10.0), speed, &forces);
        let diff = (vel.length() - speed).abs();
        assert!(diff < Fixed::from_num(0.001), "got {}", vel.length());
        assert!(vel.x < Fixed::ZERO);

        let at_goal = desired_velocity(v(1.0, 1.0), v(1.0, 1.0), speed, &forces);
        assert_eq!(at_goal, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_desired_velocity_floor_when_forces_cancel() {
        // Separation exactly opposite the heading, weighted to cancel it.
        let forces = FlockForces {
            separation: v(0.0, -1.0) * (Fixed::ONE / SEPARATION_WEIGHT),
            ..Default::default()
        };
        let speed = Fixed::from_num(2);
        let vel = desired_velocity(v(0.0, 0.0), v(0.0, 10.0), speed, &forces);
        assert_eq!(vel.x, Fixed::ZERO);
        assert!(vel.length() >= speed * MIN_SPEED_FRACTION - Fixed::from_num(0.001));
    }

    #[test]
    fn test_ease_velocity() {
        let eased = ease_velocity(Vec2Fixed::ZERO, v(10.0, 0.0), ratio(1, 5));
        // 0.2 * 1.5 = 0.3 of the gap.
        let diff = (eased.x - Fixed::from_num(3)).abs();
        assert!(diff < Fixed::from_num(0.0001));
    }

    #[test]
    fn test_push_is_equal_and_opposite() {
        let cw = Fixed::from_num(10);
        let a = unit(1, Team::TOP, v(0.0, 0.0));
        let b = unit(2, Team::TOP, v(3.0, 4.0));
        let impulse = push_impulse(&a, &b, cw, cw).expect("overlapping");
        let back = push_impulse(&b, &a, cw, cw).expect("overlapping");

        assert!(impulse.offset.x < Fixed::ZERO && impulse.offset.y < Fixed::ZERO);
        assert_eq!(impulse.opposite().offset, -impulse.offset);
        let drift = (impulse.offset + back.offset).length();
        assert!(drift < Fixed::from_num(0.0001), "net drift {drift}");
    }

    #[test]
    fn test_cross_team_pushes_harder() {
        let cw = Fixed::from_num(10);
        let a = unit(1, Team::TOP, v(0.0, 0.0));
        let mate = unit(2, Team::TOP, v(4.0, 0.0));
        let foe = unit(3, Team::BOTTOM, v(4.0, 0.0));
        let soft = push_impulse(&a, &mate, cw, cw).expect("overlap");
        let hard = push_impulse(&a, &foe, cw, cw).expect("overlap");
        assert!(hard.offset.x < soft.offset.x);
    }

    #[test]
    fn test_no_push_outside_radius_or_coincident() {
        let cw = Fixed::from_num(10);
        let a = unit(1, Team::TOP, v(0.0, 0.0));
        assert!(push_impulse(&a, &unit(2, Team::TOP, v(8.0, 0.0)), cw, cw).is_none());
        assert!(push_impulse(&a, &unit(3, Team::TOP, v(0.0, 0.0)), cw, cw).is_none());
    }
}
