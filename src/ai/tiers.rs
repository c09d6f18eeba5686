use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::{Card, CardId, CardType, Rarity, SpecialKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Novice,
    Veteran,
    Legend,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "novice" | "easy" => Ok(AiDifficulty::Novice),
            "veteran" | "normal" => Ok(AiDifficulty::Veteran),
            "legend" | "legendary" | "hard" => Ok(AiDifficulty::Legend),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AiDifficulty::Novice => "Novice",
            AiDifficulty::Veteran => "Veteran",
            AiDifficulty::Legend => "Legend",
        };
        f.write_str(name)
    }
}

impl AiDifficulty {
    /// Whether an opponent of this tier may hold cards of `rarity`.
    pub fn allows(self, rarity: Rarity) -> bool {
        match self {
            AiDifficulty::Novice => rarity <= Rarity::Rare,
            AiDifficulty::Veteran => rarity <= Rarity::Epic,
            AiDifficulty::Legend => true,
        }
    }

    /// Shards granted to the player for beating this tier.
    pub fn shard_reward(self) -> u32 {
        match self {
            AiDifficulty::Novice => 1,
            AiDifficulty::Veteran => 3,
            AiDifficulty::Legend => 5,
        }
    }

    pub fn opening_message(self) -> &'static str {
        match self {
            AiDifficulty::Novice => "Novice training battle begins. Perfect your strategy!",
            AiDifficulty::Veteran => "Veteran AI activated. This opponent has advanced tactics!",
            AiDifficulty::Legend => "LEGENDARY AI ENGAGED! Prepare for the ultimate challenge!",
        }
    }

    pub fn thinking_message(self) -> &'static str {
        match self {
            AiDifficulty::Novice => "Opponent is considering its options...",
            AiDifficulty::Veteran => "Opponent studies your recent plays...",
            AiDifficulty::Legend => "Opponent calculates the optimal line...",
        }
    }
}

/// Chance an AI-authored stun lands for Novice and Veteran.
pub const AI_STUN_CHANCE: f64 = 0.30;
/// Chance a Legend-authored stun lands.
pub const LEGEND_STUN_CHANCE: f64 = 0.40;

/// Per-tier tuning. Tiers differ only here and in their selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    /// Pacing only; has no effect on the chosen card.
    pub thinking_time: Duration,
    pub stun_chance: f64,
    /// Heal bonus per consecutive defense play.
    pub defense_step: f64,
    pub combo_bonus: bool,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        match difficulty {
            AiDifficulty::Novice => Self {
                difficulty,
                thinking_time: Duration::from_millis(800),
                stun_chance: AI_STUN_CHANCE,
                defense_step: 0.1,
                combo_bonus: false,
            },
            AiDifficulty::Veteran => Self {
                difficulty,
                thinking_time: Duration::from_millis(1_200),
                stun_chance: AI_STUN_CHANCE,
                defense_step: 0.1,
                combo_bonus: true,
            },
            AiDifficulty::Legend => Self {
                difficulty,
                thinking_time: Duration::from_millis(1_600),
                stun_chance: LEGEND_STUN_CHANCE,
                defense_step: 0.2,
                combo_bonus: true,
            },
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Novice)
    }
}

/// Public information a selector may look at.
#[derive(Debug, Clone, Copy)]
pub struct BattleView<'a> {
    pub self_health: i16,
    pub opponent_health: i16,
    pub self_mana: u8,
    /// The opponent's recent plays, most recent first.
    pub opponent_recent: &'a [Card],
    /// The opponent's remaining hand.
    pub opponent_hand: &'a [Card],
    pub combo_streak: u32,
    /// Ceiling for ordinary healing; missing health is measured against it.
    pub health_cap: i16,
    /// At or below this health the Legend tier looks for healing first.
    pub low_health_threshold: i16,
}

/// Picks a card to play from cards the AI can currently afford.
pub trait SelectCard {
    fn select_card<'c>(
        &self,
        playable: &[&'c Card],
        view: &BattleView<'_>,
        rng: &mut SmallRng,
    ) -> Option<&'c Card>;
}

/// Uniformly random.
pub struct NoviceSelector;

/// Value per mana, nudged away from what the opponent has been playing.
pub struct VeteranSelector;

/// Reads the whole board: lethal checks, survival, deck composition, combo streaks.
pub struct LegendSelector;

impl SelectCard for NoviceSelector {
    fn select_card<'c>(
        &self,
        playable: &[&'c Card],
        _view: &BattleView<'_>,
        rng: &mut SmallRng,
    ) -> Option<&'c Card> {
        playable.choose(rng).copied()
    }
}

impl SelectCard for VeteranSelector {
    fn select_card<'c>(
        &self,
        playable: &[&'c Card],
        view: &BattleView<'_>,
        rng: &mut SmallRng,
    ) -> Option<&'c Card> {
        let recent_attacks = view
            .opponent_recent
            .iter()
            .filter(|card| card.card_type == CardType::Attack)
            .count() as f64;
        let recent_defenses = view
            .opponent_recent
            .iter()
            .filter(|card| card.card_type == CardType::Defense)
            .count() as f64;
        let missing_health = f64::from(view.health_cap.saturating_sub(view.self_health).max(0));

        let score = |card: &Card| {
            let cost = f64::from(card.mana_cost.max(1));
            let damage = f64::from(expected_damage(card));
            let heal = f64::from(expected_heal(card));
            // A healing opponent gets burst; an aggressive one gets walls.
            let damage_weight = 3.0 + 0.5 * recent_defenses;
            let heal_weight = (missing_health / 10.0) * (1.0 + 0.5 * recent_attacks);
            let stun = if is_stun(card) { 1.0 + 0.5 * recent_attacks } else { 0.0 };
            (damage * damage_weight + heal * heal_weight) / cost + stun
        };

        pick_best(playable, |card| score(card) + rng.gen_range(0.0..0.01))
    }
}

impl SelectCard for LegendSelector {
    fn select_card<'c>(
        &self,
        playable: &[&'c Card],
        view: &BattleView<'_>,
        _rng: &mut SmallRng,
    ) -> Option<&'c Card> {
        let lethal = playable
            .iter()
            .copied()
            .filter(|card| expected_damage(card) >= view.opponent_health)
            .min_by_key(|card| card.mana_cost);
        if lethal.is_some() {
            return lethal;
        }

        if view.self_health <= view.low_health_threshold {
            let rescue = pick_best(playable, |card| f64::from(expected_heal(card)));
            if rescue.map_or(false, |card| expected_heal(card) > 0) {
                return rescue;
            }
        }

        let threat = view
            .opponent_hand
            .iter()
            .filter(|card| card.card_type == CardType::Attack)
            .count() as f64
            - view
                .opponent_hand
                .iter()
                .filter(|card| card.card_type == CardType::Defense)
                .count() as f64;
        let last_type = view.opponent_recent.first().map(|card| card.card_type);
        let heal_scale = f64::from(view.low_health_threshold.max(1));
        let missing_health = f64::from(view.health_cap.saturating_sub(view.self_health).max(0));

        let score = |card: &Card| {
            let damage = f64::from(expected_damage(card));
            let heal = f64::from(expected_heal(card));
            let mut value = damage * 2.0 + heal * (missing_health / heal_scale);
            if card.card_type == CardType::Attack && view.combo_streak > 0 {
                value += damage * 0.1 * f64::from(view.combo_streak) * 2.0;
            }
            if is_stun(card) {
                value += 2.0 + threat.max(0.0);
            }
            if card.card_type == CardType::Defense {
                value += threat.max(0.0) * 0.5;
            }
            value -= f64::from(card.mana_cost) * 0.25;
            value
        };
        let tie_break = |card: &Card| match (last_type, card.card_type) {
            (Some(CardType::Attack), CardType::Defense) => 0.5,
            (Some(CardType::Attack), _) if is_stun(card) => 0.5,
            (Some(CardType::Defense), CardType::Attack) => 0.5,
            _ => 0.0,
        };

        pick_best(playable, |card| score(card) + tie_break(card))
    }
}

/// Damage a card will deal before combo and crit bonuses.
pub fn expected_damage(card: &Card) -> i16 {
    let special = match &card.special_effect {
        Some(effect) if matches!(effect.kind, SpecialKind::Damage | SpecialKind::ComboDamage) => {
            card.boosted_value(effect.value.unwrap_or(0))
        }
        _ => 0,
    };
    card.attack_value().saturating_add(special)
}

/// Healing a card provides before bonuses.
pub fn expected_heal(card: &Card) -> i16 {
    let special = match &card.special_effect {
        Some(effect) if effect.kind == SpecialKind::Heal => {
            card.boosted_value(effect.value.unwrap_or(0))
        }
        Some(effect) if effect.kind == SpecialKind::Leech => {
            let leech = i32::from(card.attack_value()) * i32::from(effect.value.unwrap_or(0)) / 100;
            leech.clamp(0, i32::from(i16::MAX)) as i16
        }
        _ => 0,
    };
    card.defense_value().saturating_add(special)
}

fn is_stun(card: &Card) -> bool {
    card.special_effect
        .as_ref()
        .map_or(false, |effect| effect.kind == SpecialKind::Stun)
}

fn pick_best<'c, F>(playable: &[&'c Card], mut score: F) -> Option<&'c Card>
where
    F: FnMut(&Card) -> f64,
{
    let mut best: Option<(&'c Card, f64)> = None;
    for card in playable.iter().copied() {
        let value = score(card);
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((card, value));
        }
    }
    best.map(|(card, _)| card)
}

/// Outcome of one AI turn's selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub difficulty: AiDifficulty,
    pub thinking_time_ms: u64,
    pub playable: usize,
}

pub struct AiAgent {
    config: AiConfig,
    selector: Box<dyn SelectCard>,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        let selector: Box<dyn SelectCard> = match config.difficulty {
            AiDifficulty::Novice => Box::new(NoviceSelector),
            AiDifficulty::Veteran => Box::new(VeteranSelector),
            AiDifficulty::Legend => Box::new(LegendSelector),
        };
        Self { config, selector }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// `None` in the decision means nothing is playable.
    pub fn decide(&self, hand: &[Card], view: &BattleView<'_>, rng: &mut SmallRng) -> AiDecision {
        let playable: Vec<&Card> = hand
            .iter()
            .filter(|card| card.mana_cost <= view.self_mana)
            .collect();
        let card_id = self
            .selector
            .select_card(&playable, view, rng)
            .map(|card| card.id);

        tracing::debug!(
            "{} AI chose {:?} from {} playable cards",
            self.config.difficulty,
            card_id,
            playable.len()
        );

        AiDecision {
            card_id,
            difficulty: self.config.difficulty,
            thinking_time_ms: self.config.thinking_time.as_millis() as u64,
            playable: playable.len(),
        }
    }
}
