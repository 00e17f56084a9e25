//! Read-only stat templates for units and projectiles.
//!
//! Templates are looked up by name through [`TemplateLookup`] and are
//! never mutated by the simulation. Every derived property (flying,
//! melee, attack delay, footprint) is a pure function of the template.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, ratio, Fixed};

/// Projectile names that mean "this unit fires nothing".
const NO_PROJECTILE: [&str; 2] = ["", "none"];

/// Name of the projectile structures fire.
pub const STRUCTURE_PROJECTILE: &str = "normal";

/// Attack delay used when a template has no positive hit speed.
pub const DEFAULT_ATTACK_DELAY: u64 = 20;

/// Whether a projectile name refers to an actual projectile.
#[must_use]
pub fn is_projectile_name(name: &str) -> bool {
    !NO_PROJECTILE.contains(&name)
}

/// Stats for one kind of unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTemplate {
    /// Lookup key.
    pub name: String,
    /// Maximum health.
    pub hitpoints: u32,
    /// Damage per attack.
    pub damage: u32,
    /// Movement speed in cells per tick.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Attack range in cells.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Aggro radius in cells.
    #[serde(with = "decimal_serde")]
    pub sight_range: Fixed,
    /// Seconds per attack.
    #[serde(with = "decimal_serde")]
    pub hit_speed: Fixed,
    /// Can hit ground units.
    pub attacks_ground: bool,
    /// Can hit flying units.
    pub attacks_air: bool,
    /// Ignores units, only hits structures.
    pub targets_only_structures: bool,
    /// Ignores structures, only hits units.
    pub targets_only_units: bool,
    /// Flight height; positive means flying.
    #[serde(with = "decimal_serde")]
    pub flying_height: Fixed,
    /// Melee splash radius in cells.
    #[serde(with = "decimal_serde")]
    pub area_damage_radius: Fixed,
    /// Damage dealt around the unit when it dies.
    pub death_damage: u32,
    /// Death damage radius in cells.
    #[serde(with = "decimal_serde")]
    pub death_damage_radius: Fixed,
    /// Collision radius in cells.
    #[serde(with = "decimal_serde")]
    pub collision_radius: Fixed,
    /// Visual scale.
    #[serde(with = "decimal_serde")]
    pub scale: Fixed,
    /// Projectile template fired by ranged attacks.
    pub projectile: String,
    /// Elixir needed to deploy.
    #[serde(with = "decimal_serde")]
    pub elixir_cost: Fixed,
}

impl Default for UnitTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            hitpoints: 100,
            damage: 10,
            speed: ratio(15, 100),
            range: Fixed::ONE,
            sight_range: Fixed::from_num(5),
            hit_speed: Fixed::ONE,
            attacks_ground: true,
            attacks_air: false,
            targets_only_structures: false,
            targets_only_units: false,
            flying_height: Fixed::ZERO,
            area_damage_radius: Fixed::ZERO,
            death_damage: 0,
            death_damage_radius: Fixed::ZERO,
            collision_radius: Fixed::ZERO,
            scale: Fixed::ONE,
            projectile: String::new(),
            elixir_cost: Fixed::ZERO,
        }
    }
}

impl UnitTemplate {
    /// Flying units ignore water and are only hit by anti-air attackers.
    #[must_use]
    pub fn is_flying(&self) -> bool {
        self.flying_height > Fixed::ZERO
    }

    /// Melee attackers (range ≤ 1 cell) never fire projectiles.
    #[must_use]
    pub fn is_melee(&self) -> bool {
        self.range <= Fixed::ONE
    }

    /// Whether ranged attacks go through a projectile.
    #[must_use]
    pub fn fires_projectile(&self) -> bool {
        !self.is_melee() && is_projectile_name(&self.projectile)
    }

    /// Whether this unit may attack a unit of the given flight class.
    #[must_use]
    pub fn can_hit(&self, target_flying: bool) -> bool {
        if target_flying {
            self.attacks_air
        } else {
            self.attacks_ground
        }
    }

    /// Ticks between attacks: `floor(cadence_base / hit_speed)`.
    #[must_use]
    pub fn attack_delay_ticks(&self, cadence_base: u32) -> u64 {
        if self.hit_speed <= Fixed::ZERO {
            return DEFAULT_ATTACK_DELAY;
        }
        (Fixed::from_num(cadence_base) / self.hit_speed)
            .floor()
            .saturating_to_num::<u64>()
    }

    /// Footprint diameter in cells.
    #[must_use]
    pub fn footprint_cells(&self) -> Fixed {
        if self.collision_radius > Fixed::ZERO {
            (self.collision_radius * Fixed::from_num(2)).clamp(ratio(1, 2), Fixed::from_num(3))
        } else if self.scale > Fixed::ZERO {
            ratio(4, 5) * self.scale
        } else {
            ratio(4, 5)
        }
    }

    /// Velocity responsiveness derived from base speed.
    #[must_use]
    pub fn max_acceleration(&self) -> Fixed {
        if self.speed > ratio(15, 100) {
            ratio(1, 4)
        } else if self.speed < ratio(1, 10) {
            ratio(1, 10)
        } else {
            ratio(1, 5)
        }
    }
}

/// Stats for one kind of projectile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTemplate {
    /// Lookup key.
    pub name: String,
    /// Travel speed in cells per tick.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Tracks a live target.
    pub homing: bool,
    /// Ticks of homing; 0 means the whole flight.
    pub homing_time: u32,
    /// Damage; 0 means "use the attacker's damage".
    pub damage: u32,
    /// Area-effect radius in cells; 0 means single target.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,
    /// Area effect hits flying units.
    pub aoe_to_air: bool,
    /// Area effect hits ground units.
    pub aoe_to_ground: bool,
    /// Collision radius in cells.
    #[serde(with = "decimal_serde")]
    pub projectile_radius: Fixed,
    /// Visual trail identifier.
    pub trail_effect: String,
}

impl Default for ProjectileTemplate {
    fn default() -> Self {
        Self::fallback(STRUCTURE_PROJECTILE)
    }
}

impl ProjectileTemplate {
    /// Stand-in used when content does not define a projectile.
    #[must_use]
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            speed: ratio(7, 10),
            homing: false,
            homing_time: 0,
            damage: 45,
            radius: Fixed::ZERO,
            aoe_to_air: false,
            aoe_to_ground: false,
            projectile_radius: ratio(1, 5),
            trail_effect: String::new(),
        }
    }

    /// Whether impacts hit an area rather than a single entity.
    #[must_use]
    pub fn is_area(&self) -> bool {
        self.radius > Fixed::ZERO
    }
}

/// Name-keyed, read-only access to stat templates.
pub trait TemplateLookup: Debug + Send + Sync {
    /// Unit template by name.
    fn unit(&self, name: &str) -> Option<Arc<UnitTemplate>>;

    /// Projectile template by name.
    fn projectile(&self, name: &str) -> Option<Arc<ProjectileTemplate>>;
}

/// RON layout of a content file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSet {
    /// Unit templates.
    pub units: Vec<UnitTemplate>,
    /// Projectile templates.
    pub projectiles: Vec<ProjectileTemplate>,
}

/// In-memory template store.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    units: BTreeMap<String, Arc<UnitTemplate>>,
    projectiles: BTreeMap<String, Arc<ProjectileTemplate>>,
}

impl TemplateRegistry {
    /// Registry with no templates.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in roster.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.merge(default_templates());
        registry
    }

    /// Built-in roster overlaid with templates parsed from RON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] when the text is not a valid
    /// [`TemplateSet`].
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let mut registry = Self::with_defaults();
        registry.merge_ron_str(text)?;
        Ok(registry)
    }

    /// Parse RON content and add or replace templates by name.
    pub fn merge_ron_str(&mut self, text: &str) -> Result<()> {
        let set: TemplateSet = ron::from_str(text).map_err(|e| GameError::parse("templates", &e))?;
        self.merge(set);
        Ok(())
    }

    /// Add or replace templates by name.
    pub fn merge(&mut self, set: TemplateSet) {
        for unit in set.units {
            self.insert_unit(unit);
        }
        for projectile in set.projectiles {
            self.insert_projectile(projectile);
        }
    }

    /// Add or replace a unit template.
    pub fn insert_unit(&mut self, template: UnitTemplate) {
        self.units.insert(template.name.clone(), Arc::new(template));
    }

    /// Add or replace a projectile template.
    pub fn insert_projectile(&mut self, template: ProjectileTemplate) {
        self.projectiles
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Registered unit names in sorted order.
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}

impl TemplateLookup for TemplateRegistry {
    fn unit(&self, name: &str) -> Option<Arc<UnitTemplate>> {
        self.units.get(name).cloned()
    }

    fn projectile(&self, name: &str) -> Option<Arc<ProjectileTemplate>> {
        self.projectiles.get(name).cloned()
    }
}

/// The built-in roster.
#[must_use]
pub fn default_templates() -> TemplateSet {
    let unit = |name: &str| UnitTemplate {
        name: name.to_string(),
        ..Default::default()
    };

    TemplateSet {
        units: vec![
            UnitTemplate {
                hitpoints: 150,
                damage: 75,
                speed: ratio(15, 100),
                range: ratio(4, 5),
                sight_range: Fixed::from_num(5),
                hit_speed: ratio(6, 5),
                collision_radius: ratio(7, 10),
                elixir_cost: Fixed::from_num(3),
                ..unit("Knight")
            },
            UnitTemplate {
                hitpoints: 80,
                damage: 40,
                speed: ratio(1, 5),
                range: Fixed::from_num(4),
                sight_range: ratio(11, 2),
                hit_speed: ratio(7, 10),
                attacks_air: true,
                scale: ratio(9, 10),
                collision_radius: ratio(3, 5),
                projectile: "ArcherArrow".to_string(),
                elixir_cost: Fixed::from_num(3),
                ..unit("Archer")
            },
            UnitTemplate {
                hitpoints: 40,
                damage: 25,
                speed: ratio(1, 4),
                range: ratio(1, 2),
                sight_range: Fixed::from_num(4),
                hit_speed: ratio(1, 2),
                scale: ratio(7, 10),
                collision_radius: ratio(2, 5),
                elixir_cost: Fixed::ONE,
                ..unit("Skeleton")
            },
            UnitTemplate {
                hitpoints: 800,
                damage: 100,
                speed: ratio(1, 10),
                range: ratio(4, 5),
                sight_range: Fixed::from_num(5),
                hit_speed: ratio(3, 2),
                targets_only_structures: true,
                scale: ratio(3, 2),
                collision_radius: Fixed::ONE,
                elixir_cost: Fixed::from_num(5),
                ..unit("Giant")
            },
            UnitTemplate {
                hitpoints: 200,
                damage: 60,
                speed: ratio(1, 5),
                range: Fixed::from_num(3),
                sight_range: Fixed::from_num(6),
                hit_speed: ratio(13, 10),
                attacks_air: true,
                area_damage_radius: ratio(3, 2),
                scale: ratio(6, 5),
                collision_radius: ratio(4, 5),
                flying_height: Fixed::ONE,
                projectile: "DragonFireball".to_string(),
                elixir_cost: Fixed::from_num(4),
                ..unit("BabyDragon")
            },
        ],
        projectiles: vec![
            ProjectileTemplate::fallback(STRUCTURE_PROJECTILE),
            ProjectileTemplate {
                speed: Fixed::ONE,
                damage: 40,
                projectile_radius: ratio(3, 20),
                ..ProjectileTemplate::fallback("ArcherArrow")
            },
            ProjectileTemplate {
                speed: ratio(3, 5),
                damage: 0,
                radius: ratio(3, 2),
                aoe_to_air: true,
                aoe_to_ground: true,
                projectile_radius: ratio(1, 4),
                trail_effect: "fire".to_string(),
                ..ProjectileTemplate::fallback("DragonFireball")
            },
        ],
    }
}
