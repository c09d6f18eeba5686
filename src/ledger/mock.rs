//! In-memory ledger for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{Ledger, LedgerError};
use super::types::{
    Address, BlockRef, CommitRef, MoveBatch, ParticipantRecord, Receipt, ResultSummary,
};
use crate::game::Move;

#[derive(Default)]
struct MockState {
    registered: bool,
    fail_writes: bool,
    block_height: u64,
    moves: Vec<Move>,
    batches: Vec<MoveBatch>,
    claims: Vec<(CommitRef, ResultSummary)>,
}

/// Simulates the ledger in memory. Writes can be switched to fail with a
/// network error.
#[derive(Clone)]
pub struct MockLedger {
    address: Address,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            address: Address::new("0xmock"),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn registered() -> Self {
        let ledger = Self::new();
        ledger.state.lock().unwrap().registered = true;
        ledger
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn submitted_moves(&self) -> Vec<Move> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn batches(&self) -> Vec<MoveBatch> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn claims(&self) -> Vec<(CommitRef, ResultSummary)> {
        self.state.lock().unwrap().claims.clone()
    }

    fn write(&self, record: impl FnOnce(&mut MockState)) -> Result<Receipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(LedgerError::Network("connection reset".to_string()));
        }
        record(&mut *state);
        state.block_height += 1;
        Ok(Receipt {
            commit_ref: CommitRef::new(format!("0x{:04x}", state.block_height)),
            block_ref: Some(BlockRef(state.block_height)),
        })
    }
}

#[async_trait(?Send)]
impl Ledger for MockLedger {
    async fn connect_identity(&self) -> Result<Address, LedgerError> {
        Ok(self.address.clone())
    }

    async fn get_participant(&self, address: &Address) -> Result<ParticipantRecord, LedgerError> {
        let state = self.state.lock().unwrap();
        if !state.registered || *address != self.address {
            return Err(LedgerError::NotRegistered {
                address: address.clone(),
            });
        }
        Ok(ParticipantRecord {
            address: address.clone(),
            battles_played: state.batches.len() as u32,
            shards: state.claims.iter().map(|(_, s)| u64::from(s.shard_reward)).sum(),
        })
    }

    async fn register_participant(&self) -> Result<Receipt, LedgerError> {
        self.write(|state| state.registered = true)
    }

    async fn submit_moves(&self, moves: &[Move]) -> Result<Receipt, LedgerError> {
        // Suspends once, like a network round trip.
        tokio::task::yield_now().await;
        self.write(|state| state.moves.extend_from_slice(moves))
    }

    async fn submit_batch(&self, batch: &MoveBatch) -> Result<Receipt, LedgerError> {
        self.write(|state| state.batches.push(batch.clone()))
    }

    async fn claim_reward(
        &self,
        batch_ref: &CommitRef,
        summary: &ResultSummary,
    ) -> Result<Receipt, LedgerError> {
        self.write(|state| state.claims.push((batch_ref.clone(), summary.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiDifficulty;
    use crate::config::EngineConfig;
    use crate::game::{
        BattleResult, Card, CardType, CombatSession, MoveId, Phase, Rarity, RuleEngine,
    };
    use crate::ledger::{CommitAdapter, CommitError};

    fn strike(id: u32, attack: i16) -> Card {
        Card::new(id, format!("Strike {id}"), 2, CardType::Attack, Rarity::Common)
            .with_attack(attack)
    }

    fn pending(session: &CombatSession, move_id: MoveId) -> Move {
        session
            .pending_move(move_id)
            .cloned()
            .expect("move should be recorded")
    }

    #[tokio::test]
    async fn unregistered_participant_cannot_enter_combat() {
        let mut adapter = CommitAdapter::new(MockLedger::new());
        let err = adapter.enter_combat().await.expect_err("gate should reject");
        assert!(matches!(err, CommitError::NotRegistered { .. }));
        assert!(adapter.participant().is_none());

        let receipt = adapter.register().await.expect("registration should succeed");
        assert_eq!(receipt.block_ref, Some(BlockRef(1)));
        let record = adapter.enter_combat().await.expect("gate should admit");
        assert_eq!(record.address, Address::new("0xmock"));
        assert!(adapter.participant().is_some());
    }

    #[tokio::test]
    async fn confirmed_move_is_marked_verified() {
        let adapter = CommitAdapter::new(MockLedger::registered());
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 1);
        let hand = vec![strike(1, 5), strike(2, 3)];
        let mut session = engine
            .start_session(hand, vec![strike(10, 1)], AiDifficulty::Novice, 0)
            .expect("session should start");

        let played = engine.play_card(&mut session, 1).expect("play should succeed");
        let commit = adapter.commit_move(pending(&session, played.move_id)).await;
        assert_eq!(commit.move_id(), played.move_id);
        let receipt = commit.reconcile(&mut session).expect("commit should succeed");

        let mv = session.pending_move(played.move_id).expect("move should exist");
        assert!(mv.verified);
        assert_eq!(mv.commit_ref.as_ref(), Some(&receipt.commit_ref));
        assert_eq!(adapter.ledger().submitted_moves().len(), 1);
    }

    #[tokio::test]
    async fn failed_commit_keeps_local_effect_and_play_continues() {
        let ledger = MockLedger::registered();
        ledger.set_fail_writes(true);
        let adapter = CommitAdapter::new(ledger);
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 2);
        let hand = vec![strike(1, 5), strike(2, 3)];
        let opponent = vec![strike(10, 1), strike(11, 1)];
        let mut session = engine
            .start_session(hand, opponent, AiDifficulty::Novice, 0)
            .expect("session should start");

        let played = engine.play_card(&mut session, 1).expect("play should succeed");
        assert_eq!(session.opponent.health, 15);

        let err = adapter
            .commit_move(pending(&session, played.move_id))
            .await
            .reconcile(&mut session)
            .expect_err("commit should fail");
        assert!(matches!(
            err,
            CommitError::CommitFailure {
                move_id: Some(_),
                source: LedgerError::Network(_)
            }
        ));
        assert_eq!(session.opponent.health, 15, "local damage must stand");
        let mv = session.pending_move(played.move_id).expect("move should exist");
        assert!(!mv.verified);
        assert!(mv.commit_ref.is_none());
        assert!(session
            .battle_log
            .last()
            .map_or(false, |line| line.starts_with("Warning")));

        engine.run_ai_turn(&mut session).expect("next turn should proceed");
        assert_eq!(session.phase, Phase::AwaitingPlayerAction);
        assert!(session.has_unverified_moves());
    }

    #[tokio::test]
    async fn ai_turn_runs_while_commit_is_in_flight() {
        let adapter = CommitAdapter::new(MockLedger::registered());
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 6);
        let hand = vec![strike(1, 5), strike(2, 3)];
        let mut session = engine
            .start_session(hand, vec![strike(10, 1), strike(11, 1)], AiDifficulty::Novice, 0)
            .expect("session should start");
        let played = engine.play_card(&mut session, 1).expect("play should succeed");

        let in_flight = adapter.commit_move(pending(&session, played.move_id));
        let local_turn = async {
            let turn = engine.run_ai_turn(&mut session).expect("AI turn should run");
            let landed = adapter.ledger().submitted_moves().len();
            (turn, landed)
        };
        let (commit, (turn, landed)) = tokio::join!(in_flight, local_turn);

        assert_eq!(landed, 0, "the AI moved before the ledger answered");
        assert_eq!(turn.continuation, engine.continuation(&session));
        assert_eq!(session.phase, Phase::AwaitingPlayerAction);
        assert!(session.has_unverified_moves());

        commit.reconcile(&mut session).expect("commit should succeed");
        assert!(pending(&session, played.move_id).verified);
        assert!(!session.has_unverified_moves());
    }

    #[tokio::test]
    async fn unknown_move_is_reported() {
        let adapter = CommitAdapter::new(MockLedger::registered());
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 3);
        let mut session = engine
            .start_session(vec![strike(1, 5)], vec![strike(10, 1)], AiDifficulty::Novice, 0)
            .expect("session should start");
        let played = engine.play_card(&mut session, 1).expect("play should succeed");
        let mv = pending(&session, played.move_id);

        let mut other = engine
            .start_session(vec![strike(2, 5)], vec![strike(11, 1)], AiDifficulty::Novice, 0)
            .expect("session should start");
        let err = adapter
            .commit_move(mv)
            .await
            .reconcile(&mut other)
            .expect_err("unknown move should fail");
        assert!(matches!(err, CommitError::UnknownMove { move_id } if move_id == played.move_id));
    }

    #[tokio::test]
    async fn settlement_claims_reward_only_on_win() {
        let adapter = CommitAdapter::new(MockLedger::registered());
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 4);
        let hand = vec![strike(1, 5), strike(2, 5)];
        let mut session = engine
            .start_session(hand, vec![strike(10, 1)], AiDifficulty::Veteran, 0)
            .expect("session should start");

        let err = adapter.settle(&session).await.expect_err("unfinished battle");
        assert!(matches!(err, CommitError::SessionInProgress));

        session.opponent.health = 5;
        engine.play_card(&mut session, 1).expect("play should succeed");
        assert_eq!(session.result, BattleResult::PlayerWon);

        let settlement = adapter.settle(&session).await.expect("settlement should succeed");
        assert_eq!(settlement.summary.shard_reward, 3);
        assert_eq!(settlement.summary.move_count, 1);
        assert!(settlement.reward.is_some());
        let claims = adapter.ledger().claims();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].0, settlement.batch.commit_ref);
    }

    #[tokio::test]
    async fn lost_battle_settles_without_claim() {
        let adapter = CommitAdapter::new(MockLedger::registered());
        let mut engine = RuleEngine::with_seed(EngineConfig::default(), 5);
        let hand = vec![strike(1, 1), strike(2, 1)];
        let mut session = engine
            .start_session(hand, vec![strike(10, 4)], AiDifficulty::Novice, 0)
            .expect("session should start");
        session.player.health = 3;
        engine.play_card(&mut session, 1).expect("play should succeed");
        engine.run_ai_turn(&mut session).expect("AI turn should run");
        assert_eq!(session.result, BattleResult::OpponentWon);

        let settlement = adapter.settle(&session).await.expect("settlement should succeed");
        assert!(settlement.reward.is_none());
        assert_eq!(settlement.summary.shard_reward, 0);
        assert_eq!(adapter.ledger().batches().len(), 1);
        assert!(adapter.ledger().claims().is_empty());
    }
}
