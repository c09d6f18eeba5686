//! Opponent AI: difficulty tiers, card selection and hand dealing.

pub mod deck;
pub mod tiers;

pub use deck::{draw_opponent_hand, OPPONENT_HAND_SIZE};
pub use tiers::{
    expected_damage, expected_heal, AiAgent, AiConfig, AiDecision, AiDifficulty, BattleView,
    SelectCard,
};
