//! Tunable combat constants.
//!
//! Every number the resolution pipeline and turn machine consult lives here so a
//! host can rebalance a session from JSON without touching the rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub starting_health: i16,
    pub starting_mana: u8,
    /// Ceiling for base defense healing.
    pub base_health_cap: i16,
    /// Ceiling for special heals and leech.
    pub extended_health_cap: i16,
    pub max_mana: u8,

    pub player_combo_fraction: f64,
    pub ai_combo_step: f64,
    pub player_heal_combo_fraction: f64,
    pub low_health_threshold: i16,
    pub low_health_heal_fraction: f64,

    pub epic_crit_chance: f64,
    pub epic_crit_multiplier: f64,
    pub legendary_crit_chance: f64,
    pub legendary_crit_multiplier: f64,

    /// Chance a stun authored by the player lands.
    pub player_stun_chance: f64,

    pub stalemate_threshold: u8,
    pub recent_plays_window: usize,

    pub turn_timer_ms: u64,
    pub ai_turn_delay_ms: u64,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn turn_timer(&self) -> Duration {
        Duration::from_millis(self.turn_timer_ms)
    }

    pub fn ai_turn_delay(&self) -> Duration {
        Duration::from_millis(self.ai_turn_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_health: 20,
            starting_mana: 10,
            base_health_cap: 20,
            extended_health_cap: 30,
            max_mana: 10,

            player_combo_fraction: 0.2,
            ai_combo_step: 0.1,
            player_heal_combo_fraction: 0.15,
            low_health_threshold: 8,
            low_health_heal_fraction: 0.25,

            epic_crit_chance: 0.15,
            epic_crit_multiplier: 1.5,
            legendary_crit_chance: 0.25,
            legendary_crit_multiplier: 2.0,

            player_stun_chance: 1.0,

            stalemate_threshold: 3,
            recent_plays_window: 3,

            turn_timer_ms: 30_000,
            ai_turn_delay_ms: 1_000,
        }
    }
}
