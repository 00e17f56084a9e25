//! Simulation tunables.
//!
//! Everything a match needs to know that is not a unit or projectile
//! stat lives in [`SimConfig`]. The defaults are the reference values;
//! RON text can override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, ratio, Fixed};

/// How in-flight projectiles behave between spawn and impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectileMode {
    /// Projectiles travel, home and collide with units every tick.
    #[default]
    Advance,
    /// Projectiles stay where they were fired and only age.
    ///
    /// The structure sweep is then the only way a projectile lands.
    Frozen,
}

/// Board geometry: grid shape, world size, water band and bridges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapLayout {
    /// Number of columns.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
    /// World width covered by the grid.
    #[serde(with = "decimal_serde")]
    pub world_width: Fixed,
    /// World height covered by the grid.
    #[serde(with = "decimal_serde")]
    pub world_height: Fixed,
    /// First water row (inclusive).
    pub water_start_row: i32,
    /// Last water row (inclusive).
    pub water_end_row: i32,
    /// Inclusive column spans crossing the water.
    pub bridges: Vec<(i32, i32)>,
}

impl Default for MapLayout {
    fn default() -> Self {
        Self {
            columns: 36,
            rows: 64,
            world_width: Fixed::from_num(588),
            world_height: Fixed::from_num(843),
            water_start_row: 30,
            water_end_row: 33,
            bridges: vec![(5, 8), (27, 30)],
        }
    }
}

impl MapLayout {
    /// World width of one cell.
    #[must_use]
    pub fn cell_width(&self) -> Fixed {
        cell_extent(self.world_width, self.columns)
    }

    /// World height of one cell.
    #[must_use]
    pub fn cell_height(&self) -> Fixed {
        cell_extent(self.world_height, self.rows)
    }

    /// Reject layouts that cannot describe a board.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] for an empty grid or a non-positive
    /// world size.
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(GameError::InvalidState(format!(
                "layout needs at least one cell, got {}x{}",
                self.columns, self.rows
            )));
        }
        if self.world_width <= Fixed::ZERO || self.world_height <= Fixed::ZERO {
            return Err(GameError::InvalidState(format!(
                "layout world size must be positive, got {}x{}",
                self.world_width, self.world_height
            )));
        }
        Ok(())
    }
}

/// Size of one cell; unit cells when the extent would not be positive.
fn cell_extent(total: Fixed, count: usize) -> Fixed {
    let extent = match i32::try_from(count) {
        Ok(n) if n > 0 => total / Fixed::from_num(n),
        _ => Fixed::ONE,
    };
    if extent > Fixed::ZERO {
        extent
    } else {
        Fixed::ONE
    }
}

/// Match-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Wall-clock length of one tick, used by real-time drivers.
    pub tick_period_ms: u64,
    /// Ticks before the match timer expires.
    pub match_duration_ticks: u64,
    /// Ticks between elixir top-ups; 0 leaves regeneration to an external timer.
    pub elixir_interval_ticks: u64,
    /// Elixir each team starts with.
    #[serde(with = "decimal_serde")]
    pub elixir_start: Fixed,
    /// Elixir cap.
    #[serde(with = "decimal_serde")]
    pub elixir_max: Fixed,
    /// Elixir added per interval.
    #[serde(with = "decimal_serde")]
    pub elixir_per_interval: Fixed,
    /// Numerator for unit attack delay: `delay = attack_cadence_base / hit_speed`.
    pub attack_cadence_base: u32,
    /// Ticks between structure shots.
    pub structure_attack_interval: u64,
    /// Ticks a projectile lives before it expires.
    pub projectile_lifetime_ticks: u32,
    /// Projectile travel behaviour.
    pub projectile_mode: ProjectileMode,
    /// Board geometry.
    pub layout: MapLayout,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 40,
            match_duration_ticks: 15_000,
            elixir_interval_ticks: 25,
            elixir_start: Fixed::from_num(4),
            elixir_max: Fixed::from_num(10),
            elixir_per_interval: ratio(1, 10),
            attack_cadence_base: 60,
            structure_attack_interval: 60,
            projectile_lifetime_ticks: 300,
            projectile_mode: ProjectileMode::Advance,
            layout: MapLayout::default(),
        }
    }
}

impl SimConfig {
    /// Parse a config from RON text. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// [`GameError::DataParseError`] for malformed text and
    /// [`GameError::InvalidState`] for an unusable layout.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::parse("config", &e))?;
        config.layout.validate()?;
        Ok(config)
    }

    /// Ticks per wall-clock second.
    #[must_use]
    pub fn ticks_per_second(&self) -> u64 {
        if self.tick_period_ms == 0 {
            return 0;
        }
        1000 / self.tick_period_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_cell_size() {
        let layout = MapLayout::default();
        assert_eq!(layout.cell_width(), Fixed::from_num(588) / Fixed::from_num(36));
        assert_eq!(layout.cell_height(), Fixed::from_num(843) / Fixed::from_num(64));
    }

    #[test]
    fn test_degenerate_layout_has_unit_cells() {
        let layout = MapLayout {
            columns: 0,
            ..Default::default()
        };
        assert_eq!(layout.cell_width(), Fixed::ONE);
    }

    #[test]
    fn test_zero_world_size_falls_back_to_unit_cells() {
        let layout = MapLayout {
            world_width: Fixed::ZERO,
            world_height: Fixed::from_num(-5),
            ..Default::default()
        };
        assert_eq!(layout.cell_width(), Fixed::ONE);
        assert_eq!(layout.cell_height(), Fixed::ONE);
    }

    #[test]
    fn test_unusable_layout_rejected_from_ron() {
        let err = SimConfig::from_ron_str("(layout: (world_width: 0.0))").unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        let err = SimConfig::from_ron_str("(layout: (rows: 0))").unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        assert!(MapLayout::default().validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimConfig::from_ron_str("(projectile_mode: Frozen, elixir_start: 7.5)")
            .expect("config should parse");
        assert_eq!(config.projectile_mode, ProjectileMode::Frozen);
        assert_eq!(config.elixir_start, Fixed::from_num(7.5));
        assert_eq!(config.structure_attack_interval, 60);
        assert_eq!(config.layout, MapLayout::default());
        assert_eq!(config.ticks_per_second(), 25);
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let err = SimConfig::from_ron_str("(tick_period_ms: \"fast\")").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
