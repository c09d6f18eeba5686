//! Staked power boosts.
//!
//! A stake buys a percentage multiplier on every card in the player's hand for
//! a number of turns. Payout follows a diminishing-returns curve so large
//! stakes are less efficient than small ones.

use serde::{Deserialize, Serialize};

use super::resources::Resource;
use super::rules::RuleError;
use super::state::{BoostSnapshot, Card, CombatSession};

const MIN_DURATION: u8 = 2;
const MAX_DURATION: u8 = 6;
const MAX_DURATION_STAKE: u32 = 32;

/// Unrounded payout curve: `2a / (1 + 0.2 * log10(a + 1))`.
pub fn effect_curve(amount: u32) -> f64 {
    let stake = f64::from(amount);
    2.0 * stake / (1.0 + 0.2 * (stake + 1.0).log10())
}

/// Boost percentage bought by staking `amount`.
pub fn compute_effect(amount: u32) -> u32 {
    effect_curve(amount).round() as u32
}

/// Number of turn ends a boost bought with `amount` lasts.
pub fn compute_duration(amount: u32) -> u8 {
    if amount <= 1 {
        return MIN_DURATION;
    }
    if amount >= MAX_DURATION_STAKE {
        return MAX_DURATION;
    }
    let floor_log2 = (u32::BITS - 1 - amount.leading_zeros()) as u8;
    MIN_DURATION + floor_log2
}

/// Scales a stat by `(100 + percent) / 100`, rounding toward zero.
pub fn scale_stat(value: i16, effect_percent: u32) -> i16 {
    let scaled = i64::from(value) * (100 + i64::from(effect_percent)) / 100;
    scaled.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoostState {
    pub staked_amount: u32,
    pub effect_percent: u32,
    pub duration: u8,
    pub remaining_turns: u8,
}

impl BoostState {
    pub fn for_stake(amount: u32) -> Self {
        let duration = compute_duration(amount);
        Self {
            staked_amount: amount,
            effect_percent: compute_effect(amount),
            duration,
            remaining_turns: duration,
        }
    }

    /// Effect gained per unit staked, in percent.
    pub fn efficiency_percent(&self) -> f64 {
        if self.staked_amount == 0 {
            return 0.0;
        }
        f64::from(self.effect_percent) / f64::from(self.staked_amount) * 100.0
    }
}

/// What happened to an active boost at a turn boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostTick {
    Inactive,
    Running { remaining_turns: u8 },
    Expired,
}

impl Card {
    /// Snapshots the current stats and multiplies them. A card that is already
    /// boosted is left untouched.
    pub fn apply_boost(&mut self, effect_percent: u32) {
        if self.boost.is_some() {
            return;
        }
        self.boost = Some(BoostSnapshot {
            original_attack: self.attack,
            original_defense: self.defense,
            original_special: self.special,
            effect_percent,
        });
        self.attack = self.attack.map(|value| scale_stat(value, effect_percent));
        self.defense = self.defense.map(|value| scale_stat(value, effect_percent));
        self.special = self.special.map(|value| scale_stat(value, effect_percent));
    }

    pub fn revert_boost(&mut self) {
        if let Some(snapshot) = self.boost.take() {
            self.attack = snapshot.original_attack;
            self.defense = snapshot.original_defense;
            self.special = snapshot.original_special;
        }
    }

    /// Scales a special-effect magnitude by this card's own boost, if any.
    pub fn boosted_value(&self, value: i16) -> i16 {
        match &self.boost {
            Some(snapshot) => scale_stat(value, snapshot.effect_percent),
            None => value,
        }
    }
}

/// Debits the stake and boosts every card in the player's hand.
pub fn activate(session: &mut CombatSession, amount: u32) -> Result<BoostState, RuleError> {
    if session.boost.is_some() {
        return Err(RuleError::BoostAlreadyActive);
    }
    if amount == 0 {
        return Err(RuleError::InvalidStake);
    }
    if u64::from(amount) > session.stake_balance {
        return Err(RuleError::InsufficientResource {
            resource: Resource::Stake,
            required: u64::from(amount),
            available: session.stake_balance,
        });
    }

    let boost = BoostState::for_stake(amount);
    session.stake_balance -= u64::from(amount);
    for card in &mut session.player.hand {
        card.apply_boost(boost.effect_percent);
    }
    session.boost = Some(boost);
    Ok(boost)
}

/// Counts down the active boost and reverts every card when it runs out.
pub fn tick(session: &mut CombatSession) -> BoostTick {
    let Some(boost) = session.boost.as_mut() else {
        return BoostTick::Inactive;
    };

    boost.remaining_turns = boost.remaining_turns.saturating_sub(1);
    if boost.remaining_turns > 0 {
        return BoostTick::Running {
            remaining_turns: boost.remaining_turns,
        };
    }

    session.boost = None;
    for card in &mut session.player.hand {
        card.revert_boost();
    }
    BoostTick::Expired
}
