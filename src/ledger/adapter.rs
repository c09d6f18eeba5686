//! Optimistic commits of local combat to the ledger.
//!
//! Local state is never rolled back here. A move's `verified` flag flips only
//! once the ledger confirms it; a failed call leaves the flag false and is
//! reported to the caller as a recoverable [`CommitError::CommitFailure`].

use super::traits::{CommitError, Ledger, LedgerError};
use super::types::{MoveBatch, ParticipantRecord, Receipt, ResultSummary, Settlement};
use crate::game::{BattleResult, CombatSession, Move, MoveId};
use crate::utils::now_millis;

pub struct CommitAdapter<L: Ledger> {
    ledger: L,
    participant: Option<ParticipantRecord>,
}

impl<L: Ledger> CommitAdapter<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            participant: None,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn participant(&self) -> Option<&ParticipantRecord> {
        self.participant.as_ref()
    }

    /// Gate for starting a battle: the connected identity must be registered.
    pub async fn enter_combat(&mut self) -> Result<ParticipantRecord, CommitError> {
        let address = self
            .ledger
            .connect_identity()
            .await
            .map_err(|source| CommitError::CommitFailure {
                move_id: None,
                source,
            })?;

        match self.ledger.get_participant(&address).await {
            Ok(record) => {
                tracing::info!("Participant {} admitted to combat", record.address);
                self.participant = Some(record.clone());
                Ok(record)
            }
            Err(LedgerError::NotRegistered { address }) => {
                tracing::info!("Participant {} is not registered", address);
                Err(CommitError::NotRegistered { address })
            }
            Err(source) => Err(CommitError::CommitFailure {
                move_id: None,
                source,
            }),
        }
    }

    pub async fn register(&mut self) -> Result<Receipt, CommitError> {
        let receipt = self
            .ledger
            .register_participant()
            .await
            .map_err(|source| CommitError::CommitFailure {
                move_id: None,
                source,
            })?;
        tracing::info!("Participant registered: {}", receipt);
        Ok(receipt)
    }

    /// Submits a copy of a recorded move. Nothing borrows the session while the
    /// ledger call is pending, so play continues; apply the answer afterwards
    /// with [`MoveCommit::reconcile`].
    pub async fn commit_move(&self, mv: Move) -> MoveCommit {
        let result = self
            .ledger
            .submit_moves(std::slice::from_ref(&mv))
            .await
            .map_err(|source| {
                tracing::warn!("Failed to commit move {}: {}", mv.move_id, source);
                CommitError::CommitFailure {
                    move_id: Some(mv.move_id),
                    source,
                }
            });
        MoveCommit {
            move_id: mv.move_id,
            result,
        }
    }

    /// Submits the finished battle and claims the reward when the player won.
    pub async fn settle(&self, session: &CombatSession) -> Result<Settlement, CommitError> {
        if !session.is_finished() {
            return Err(CommitError::SessionInProgress);
        }

        let summary = ResultSummary::from_session(session);
        let batch = MoveBatch {
            batch_id: format!("battle-{}", now_millis()),
            moves: session.pending_moves.clone(),
            summary: summary.clone(),
        };
        let failure = |source| CommitError::CommitFailure {
            move_id: None,
            source,
        };

        let batch_receipt = self.ledger.submit_batch(&batch).await.map_err(failure)?;
        tracing::info!(
            "Battle settled: result={:?}, moves={}, {}",
            summary.result,
            summary.move_count,
            batch_receipt
        );

        let reward = if summary.result == BattleResult::PlayerWon {
            let receipt = self
                .ledger
                .claim_reward(&batch_receipt.commit_ref, &summary)
                .await
                .map_err(failure)?;
            tracing::info!("Claimed {} shards: {}", summary.shard_reward, receipt);
            Some(receipt)
        } else {
            None
        };

        Ok(Settlement {
            batch: batch_receipt,
            reward,
            summary,
        })
    }
}

/// Ledger answer for one move, not yet applied to the session.
#[must_use = "the session only learns about the commit through `reconcile`"]
#[derive(Debug)]
pub struct MoveCommit {
    move_id: MoveId,
    result: Result<Receipt, CommitError>,
}

impl MoveCommit {
    pub fn move_id(&self) -> MoveId {
        self.move_id
    }

    /// Marks the move verified on success. On failure the session keeps every
    /// local effect and the move stays unverified.
    pub fn reconcile(self, session: &mut CombatSession) -> Result<Receipt, CommitError> {
        let move_id = self.move_id;
        match self.result {
            Ok(receipt) => {
                if !session.confirm_move(move_id, receipt.commit_ref.clone()) {
                    return Err(CommitError::UnknownMove { move_id });
                }
                tracing::debug!("Move {} verified: {}", move_id, receipt);
                Ok(receipt)
            }
            Err(err) => {
                session.log(
                    "Warning: this move could not be recorded on-chain. The battle continues.",
                );
                Err(err)
            }
        }
    }
}
