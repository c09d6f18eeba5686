//! Ledger boundary: the collaborator trait and the commit adapter that
//! mirrors local moves and results onto it.

pub mod adapter;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use adapter::{CommitAdapter, MoveCommit};
pub use traits::{CommitError, Ledger, LedgerError};
pub use types::{
    Address, BlockRef, CommitRef, MoveBatch, ParticipantRecord, Receipt, ResultSummary, Settlement,
};

#[cfg(test)]
pub use mock::MockLedger;
