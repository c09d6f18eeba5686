//! Ledger collaborator abstraction.

use async_trait::async_trait;

use super::types::{Address, CommitRef, MoveBatch, ParticipantRecord, Receipt, ResultSummary};
use crate::game::{Move, MoveId};

/// Failures reported by the ledger service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Participant not registered: {address}")]
    NotRegistered { address: Address },
}

/// Failures surfaced by the commit adapter.
///
/// Only `NotRegistered` blocks play. Everything else is a soft failure: local
/// combat state has already been applied and stays applied.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("Ledger commit failed (move {move_id:?}): {source}")]
    CommitFailure {
        move_id: Option<MoveId>,
        #[source]
        source: LedgerError,
    },

    #[error("Participant not registered: {address}")]
    NotRegistered { address: Address },

    #[error("Move {move_id} is not recorded in this session")]
    UnknownMove { move_id: MoveId },

    #[error("Battle is still in progress")]
    SessionInProgress,
}

/// Asynchronous ledger service. Every call may fail.
#[async_trait(?Send)]
pub trait Ledger {
    /// Connect the local wallet and return its address.
    async fn connect_identity(&self) -> Result<Address, LedgerError>;

    /// Fails with [`LedgerError::NotRegistered`] for unknown addresses.
    async fn get_participant(&self, address: &Address) -> Result<ParticipantRecord, LedgerError>;

    async fn register_participant(&self) -> Result<Receipt, LedgerError>;

    async fn submit_moves(&self, moves: &[Move]) -> Result<Receipt, LedgerError>;

    async fn submit_batch(&self, batch: &MoveBatch) -> Result<Receipt, LedgerError>;

    async fn claim_reward(
        &self,
        batch_ref: &CommitRef,
        summary: &ResultSummary,
    ) -> Result<Receipt, LedgerError>;
}
