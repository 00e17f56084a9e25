//! # Skirmish Core
//!
//! Deterministic simulation core for a two-team lane-defense skirmish.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO beyond parsing text handed to it
//! - No randomness
//! - No floating-point math in the tick (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`terrain`] - Cell grid, water band, bridges, tile overlay
//! - [`pathfinding`] - A* over the terrain grid
//! - [`targeting`] - Target acquisition and range predicates
//! - [`steering`] - Flocking, velocity easing, push forces
//! - [`projectile`] - Projectile creation and flight
//! - [`simulation`] - The [`Match`](simulation::Match) and its tick loop
//! - [`snapshot`] - Owned views for presentation
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod combat;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod math;
mod movement;
pub mod pathfinding;
pub mod projectile;
pub mod simulation;
pub mod snapshot;
pub mod steering;
pub mod targeting;
pub mod templates;
pub mod terrain;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{MapLayout, ProjectileMode, SimConfig};
    pub use crate::economy::ElixirPool;
    pub use crate::error::{GameError, Result};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::projectile::Projectile;
    pub use crate::simulation::{
        DamageEvent, EndReason, Match, MatchOutcome, MatchSetup, Player, TickEvents, UnitSpawnParams,
    };
    pub use crate::snapshot::{MatchSnapshot, SnapshotBuffer};
    pub use crate::templates::{ProjectileTemplate, TemplateLookup, TemplateRegistry, UnitTemplate};
    pub use crate::terrain::{GridCell, TerrainGrid, TileClass, WaterSide};
}
