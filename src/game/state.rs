use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::boost::BoostState;
use super::rules::RuleError;
use crate::ai::AiDifficulty;
use crate::config::EngineConfig;
use crate::ledger::CommitRef;

/// Catalog-wide card identifier.
pub type CardId = u32;
/// Sequence number of a recorded move within one session.
pub type MoveId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Attack,
    Defense,
    Special,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Default for Rarity {
    fn default() -> Self {
        Rarity::Common
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SpecialKind {
    Damage,
    Heal,
    Mana,
    Stun,
    Leech,
    ComboDamage,
}

impl SpecialKind {
    /// Stun is the only kind that carries no magnitude.
    pub fn needs_value(self) -> bool {
        !matches!(self, SpecialKind::Stun)
    }
}

/// Extra behaviour attached to a card on top of its attack/defense stats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialEffect {
    pub kind: SpecialKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i16>,
    /// Cards that trigger a `ComboDamage` effect when played just before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combo_partners: Vec<CardId>,
    #[serde(default)]
    pub description: String,
}

impl SpecialEffect {
    pub fn new(kind: SpecialKind, value: Option<i16>, description: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            combo_partners: Vec::new(),
            description: description.into(),
        }
    }

    pub fn with_combo_partners(mut self, partners: Vec<CardId>) -> Self {
        self.combo_partners = partners;
        self
    }
}

/// Stat values captured when a boost is applied, used to revert it exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoostSnapshot {
    pub original_attack: Option<i16>,
    pub original_defense: Option<i16>,
    pub original_special: Option<i16>,
    pub effect_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub mana_cost: u8,
    pub card_type: CardType,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_effect: Option<SpecialEffect>,
    /// Present exactly while the card is boosted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<BoostSnapshot>,
}

impl Card {
    pub fn new(
        id: CardId,
        name: impl Into<String>,
        mana_cost: u8,
        card_type: CardType,
        rarity: Rarity,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            mana_cost,
            card_type,
            rarity,
            attack: None,
            defense: None,
            special: None,
            special_effect: None,
            boost: None,
        }
    }

    pub fn with_attack(mut self, attack: i16) -> Self {
        self.attack = Some(attack);
        self
    }

    pub fn with_defense(mut self, defense: i16) -> Self {
        self.defense = Some(defense);
        self
    }

    pub fn with_special(mut self, special: i16) -> Self {
        self.special = Some(special);
        self
    }

    pub fn with_effect(mut self, effect: SpecialEffect) -> Self {
        self.special_effect = Some(effect);
        self
    }

    pub fn is_boosted(&self) -> bool {
        self.boost.is_some()
    }

    pub fn attack_value(&self) -> i16 {
        self.attack.unwrap_or(0).max(0)
    }

    pub fn defense_value(&self) -> i16 {
        self.defense.unwrap_or(0).max(0)
    }

    /// Checks the numeric fields required by the card's declared type.
    pub fn validate(&self, max_mana: u8) -> Result<(), RuleError> {
        let malformed = |field: &str| RuleError::MalformedCard {
            card_id: self.id,
            field: field.to_string(),
        };

        if self.mana_cost > max_mana {
            return Err(malformed("mana_cost"));
        }
        match self.card_type {
            CardType::Attack if self.attack.is_none() => return Err(malformed("attack")),
            CardType::Defense if self.defense.is_none() => return Err(malformed("defense")),
            CardType::Special if self.special_effect.is_none() => {
                return Err(malformed("special_effect"))
            }
            _ => {}
        }
        if let Some(effect) = &self.special_effect {
            if effect.kind.needs_value() && effect.value.is_none() {
                return Err(malformed("special_effect.value"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BattleResult {
    Undetermined,
    PlayerWon,
    OpponentWon,
    Draw,
}

impl BattleResult {
    pub fn winner(side: Side) -> Self {
        match side {
            Side::Player => BattleResult::PlayerWon,
            Side::Opponent => BattleResult::OpponentWon,
        }
    }
}

/// Where the turn machine currently stands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    AwaitingPlayerAction,
    ResolvingPlayerMove,
    AwaitingAiMove,
    ResolvingAiMove,
    Finished,
}

/// One side of the battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombatantState {
    pub health: i16,
    pub mana: u8,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub is_stunned: bool,
    /// Most recent play first.
    #[serde(default)]
    pub recent_plays: VecDeque<Card>,
    #[serde(default)]
    pub consecutive_defense_plays: u32,
}

impl CombatantState {
    pub fn new(health: i16, mana: u8, hand: Vec<Card>) -> Self {
        Self {
            health,
            mana,
            hand,
            is_stunned: false,
            recent_plays: VecDeque::new(),
            consecutive_defense_plays: 0,
        }
    }

    pub fn find_card_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn playable_cards(&self) -> Vec<&Card> {
        self.hand
            .iter()
            .filter(|card| card.mana_cost <= self.mana)
            .collect()
    }

    pub fn last_played(&self) -> Option<&Card> {
        self.recent_plays.front()
    }

    pub(crate) fn remember_play(&mut self, card: Card, window: usize) {
        if card.defense_value() > 0 {
            self.consecutive_defense_plays += 1;
        } else {
            self.consecutive_defense_plays = 0;
        }
        self.recent_plays.push_front(card);
        self.recent_plays.truncate(window);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Move {
    pub move_id: MoveId,
    pub card_id: CardId,
    pub side: Side,
    pub move_type: CardType,
    pub timestamp: u64,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<CommitRef>,
}

impl Move {
    pub fn new(move_id: MoveId, card: &Card, side: Side, timestamp: u64) -> Self {
        Self {
            move_id,
            card_id: card.id,
            side,
            move_type: card.card_type,
            timestamp,
            verified: false,
            commit_ref: None,
        }
    }
}

/// Full state of one battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatSession {
    pub player: CombatantState,
    pub opponent: CombatantState,
    pub difficulty: AiDifficulty,
    pub current_turn: Side,
    pub phase: Phase,
    pub turn: u32,
    pub fatigue_damage: i16,
    pub consecutive_skips: u8,
    pub battle_log: Vec<String>,
    #[serde(default)]
    pub pending_moves: Vec<Move>,
    pub ai_combo_counter: u32,
    pub result: BattleResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<BoostState>,
    pub stake_balance: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_selected_card: Option<CardId>,
    next_move_id: MoveId,
}

impl CombatSession {
    /// Builds a fresh battle. Every card in both hands must be well formed.
    pub fn new(
        player_hand: Vec<Card>,
        opponent_hand: Vec<Card>,
        difficulty: AiDifficulty,
        stake_balance: u64,
        config: &EngineConfig,
    ) -> Result<Self, RuleError> {
        for card in player_hand.iter().chain(opponent_hand.iter()) {
            card.validate(config.max_mana)?;
        }

        let player = CombatantState::new(config.starting_health, config.starting_mana, player_hand);
        let opponent =
            CombatantState::new(config.starting_health, config.starting_mana, opponent_hand);

        Ok(Self {
            player,
            opponent,
            difficulty,
            current_turn: Side::Player,
            phase: Phase::AwaitingPlayerAction,
            turn: 1,
            fatigue_damage: 1,
            consecutive_skips: 0,
            battle_log: Vec::new(),
            pending_moves: Vec::new(),
            ai_combo_counter: 0,
            result: BattleResult::Undetermined,
            boost: None,
            stake_balance,
            last_selected_card: None,
            next_move_id: 1,
        })
    }

    pub fn side(&self, side: Side) -> &CombatantState {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut CombatantState {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    /// Attacker and defender borrowed together.
    pub(crate) fn split_mut(&mut self, actor: Side) -> (&mut CombatantState, &mut CombatantState) {
        match actor {
            Side::Player => (&mut self.player, &mut self.opponent),
            Side::Opponent => (&mut self.opponent, &mut self.player),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result != BattleResult::Undetermined
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.battle_log.push(entry.into());
    }

    /// Log entries appended after `cursor`, for incremental display.
    pub fn log_since(&self, cursor: usize) -> &[String] {
        self.battle_log.get(cursor..).unwrap_or(&[])
    }

    pub(crate) fn record_move(&mut self, card: &Card, side: Side, timestamp: u64) -> MoveId {
        let move_id = self.next_move_id;
        self.next_move_id += 1;
        self.pending_moves.push(Move::new(move_id, card, side, timestamp));
        move_id
    }

    pub fn pending_move(&self, move_id: MoveId) -> Option<&Move> {
        self.pending_moves.iter().find(|mv| mv.move_id == move_id)
    }

    /// Marks a move as confirmed by the ledger. Returns false for unknown ids.
    pub fn confirm_move(&mut self, move_id: MoveId, commit_ref: CommitRef) -> bool {
        match self.pending_moves.iter_mut().find(|mv| mv.move_id == move_id) {
            Some(mv) => {
                mv.verified = true;
                mv.commit_ref = Some(commit_ref);
                true
            }
            None => false,
        }
    }

    pub fn has_unverified_moves(&self) -> bool {
        self.pending_moves.iter().any(|mv| !mv.verified)
    }
}
