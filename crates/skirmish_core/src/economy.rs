//! Elixir: the per-team deployment resource.
//!
//! Elixir accumulates on a fixed interval up to a cap and is spent to
//! deploy units from templates.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::math::{fixed_serde, Fixed};

/// A team's elixir pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElixirPool {
    /// Current amount.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Cap.
    #[serde(with = "fixed_serde")]
    pub max: Fixed,
    /// Added per regeneration step.
    #[serde(with = "fixed_serde")]
    pub per_interval: Fixed,
}

impl ElixirPool {
    /// Pool at its configured starting amount.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            amount: config.elixir_start.min(config.elixir_max),
            max: config.elixir_max,
            per_interval: config.elixir_per_interval,
        }
    }

    /// Add one interval's worth, capped at max.
    pub fn regenerate(&mut self) {
        self.amount = (self.amount + self.per_interval).min(self.max);
    }

    /// Whether the pool can cover `cost`.
    #[must_use]
    pub fn can_afford(&self, cost: Fixed) -> bool {
        self.amount >= cost
    }

    /// Deduct `cost` if affordable. Returns whether it was spent.
    pub fn try_spend(&mut self, cost: Fixed) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.amount -= cost;
        true
    }
}
