//! Values exchanged with the ledger service.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::AiDifficulty;
use crate::game::{BattleResult, CombatSession, Move};

/// Participant identity on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an accepted ledger write (e.g. a transaction digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef(pub String);

impl CommitRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block that included a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef(pub u64);

/// Reference pair returned by every ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub commit_ref: CommitRef,
    /// Registration may be acknowledged before it lands in a block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_ref: Option<BlockRef>,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_ref {
            Some(BlockRef(block)) => write!(f, "commit {} in block #{}", self.commit_ref, block),
            None => write!(f, "commit {} (pending)", self.commit_ref),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub address: Address,
    #[serde(default)]
    pub battles_played: u32,
    #[serde(default)]
    pub shards: u64,
}

/// Outcome reported when a battle settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub result: BattleResult,
    pub difficulty: AiDifficulty,
    pub player_health: i16,
    pub opponent_health: i16,
    pub turns: u32,
    pub move_count: usize,
    /// Zero unless the player won.
    pub shard_reward: u32,
}

impl ResultSummary {
    pub fn from_session(session: &CombatSession) -> Self {
        let shard_reward = match session.result {
            BattleResult::PlayerWon => session.difficulty.shard_reward(),
            _ => 0,
        };
        Self {
            result: session.result,
            difficulty: session.difficulty,
            player_health: session.player.health,
            opponent_health: session.opponent.health,
            turns: session.turn,
            move_count: session.pending_moves.len(),
            shard_reward,
        }
    }
}

/// Every recorded move of a finished battle plus its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveBatch {
    pub batch_id: String,
    pub moves: Vec<Move>,
    pub summary: ResultSummary,
}

/// What settlement wrote to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub batch: Receipt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Receipt>,
    pub summary: ResultSummary,
}
