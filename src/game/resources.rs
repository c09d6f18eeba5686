//! Mana and health pools.
//!
//! Health never drops below zero and never rises past the cap the caller
//! passes in; mana stays within `0..=max_mana`. Costs are all-or-nothing.

use serde::{Deserialize, Serialize};

use super::rules::RuleError;
use super::state::CombatantState;
use crate::config::EngineConfig;

/// Which ceiling a heal is clamped against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthCap {
    /// Base defense healing and its bonuses.
    Base,
    /// Special heals and leech.
    Extended,
}

impl HealthCap {
    pub fn value(self, config: &EngineConfig) -> i16 {
        match self {
            HealthCap::Base => config.base_health_cap,
            HealthCap::Extended => config.extended_health_cap,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Mana,
    Stake,
}

/// Health after healing `amount` under `cap`. Healing never lowers health that
/// already sits above the cap.
pub fn healed(health: i16, amount: i16, cap: i16) -> i16 {
    if amount <= 0 || health >= cap {
        return health;
    }
    health.saturating_add(amount).min(cap)
}

/// Health after taking `amount` damage.
pub fn damaged(health: i16, amount: i16) -> i16 {
    if amount <= 0 {
        return health;
    }
    health.saturating_sub(amount).max(0)
}

impl CombatantState {
    pub fn apply_mana_cost(&mut self, amount: u8) -> Result<(), RuleError> {
        if amount > self.mana {
            return Err(RuleError::InsufficientResource {
                resource: Resource::Mana,
                required: u64::from(amount),
                available: u64::from(self.mana),
            });
        }
        self.mana -= amount;
        Ok(())
    }

    /// Turn-start regeneration: one mana, capped.
    pub fn regenerate(&mut self, max_mana: u8) {
        self.mana = self.mana.saturating_add(1).min(max_mana);
    }

    /// Returns the mana actually gained.
    pub fn grant_mana(&mut self, amount: u8, max_mana: u8) -> u8 {
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount).min(max_mana).max(before);
        self.mana - before
    }

    /// Returns the health actually restored.
    pub fn heal(&mut self, amount: i16, cap: i16) -> i16 {
        let before = self.health;
        self.health = healed(before, amount, cap);
        self.health - before
    }

    /// Returns the health actually lost.
    pub fn take_damage(&mut self, amount: i16) -> i16 {
        let before = self.health;
        self.health = damaged(before, amount);
        before - self.health
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }
}
