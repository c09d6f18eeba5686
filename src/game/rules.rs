use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    boost::{self, BoostState, BoostTick},
    effects::{resolve_card, EffectContext, EffectOutcome},
    resources::Resource,
    state::{BattleResult, Card, CardId, CardType, CombatSession, MoveId, Phase, Side},
};
use crate::ai::{AiAgent, AiConfig, AiDecision, AiDifficulty, BattleView};
use crate::config::EngineConfig;
use crate::utils::now_millis;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("insufficient {resource:?}: required {required}, available {available}")]
    InsufficientResource {
        resource: Resource,
        required: u64,
        available: u64,
    },
    #[error("invalid turn: {reason}")]
    InvalidTurn { reason: String },
    #[error("a boost is already active")]
    BoostAlreadyActive,
    #[error("stake must be greater than zero")]
    InvalidStake,
    #[error("card {card_id} not found")]
    CardNotFound { card_id: CardId },
    #[error("card {card_id} is malformed: missing or invalid {field}")]
    MalformedCard { card_id: CardId, field: String },
    #[error("the battle is already over")]
    GameFinished,
}

/// What the host must do after a transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Continuation {
    /// Wait for a player action; call `timer_expired` if none arrives in time.
    AwaitPlayer { turn_timer_ms: u64 },
    /// Wait `delay_ms`, then call `run_ai_turn`.
    AiMove { delay_ms: u64 },
    Finished { result: BattleResult },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayOutcome {
    pub move_id: MoveId,
    pub continuation: Continuation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiTurn {
    /// Absent when the opponent was stunned or fatigued instead of choosing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<AiDecision>,
    pub continuation: Continuation,
}

/// Read-only snapshot handed to the UI after a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub session: CombatSession,
    /// Battle log entries appended by the mutation.
    pub log: Vec<String>,
    pub result: BattleResult,
    pub continuation: Continuation,
}

impl RuleResolution {
    pub fn new(session: &CombatSession, log_cursor: usize, continuation: Continuation) -> Self {
        Self {
            session: session.clone(),
            log: session.log_since(log_cursor).to_vec(),
            result: session.result,
            continuation,
        }
    }
}

pub struct RuleEngine {
    config: EngineConfig,
    rng: SmallRng,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Opens a battle with the player to act first.
    pub fn start_session(
        &mut self,
        player_hand: Vec<Card>,
        opponent_hand: Vec<Card>,
        difficulty: AiDifficulty,
        stake_balance: u64,
    ) -> Result<CombatSession, RuleError> {
        let mut session = CombatSession::new(
            player_hand,
            opponent_hand,
            difficulty,
            stake_balance,
            &self.config,
        )?;
        session.log(format!("Battle started against a {difficulty} opponent!"));
        session.log(difficulty.opening_message());
        tracing::info!(
            "Combat session started: difficulty={}, player_hand={}, opponent_hand={}",
            difficulty,
            session.player.hand.len(),
            session.opponent.hand.len()
        );

        self.enter_player_turn(&mut session);
        Ok(session)
    }

    /// The pending continuation for the session's current phase.
    pub fn continuation(&self, session: &CombatSession) -> Continuation {
        match session.phase {
            Phase::Finished => Continuation::Finished {
                result: session.result,
            },
            Phase::AwaitingAiMove | Phase::ResolvingAiMove => {
                let tier = AiConfig::from_difficulty(session.difficulty);
                let delay = self.config.ai_turn_delay() + tier.thinking_time;
                Continuation::AiMove {
                    delay_ms: delay.as_millis() as u64,
                }
            }
            Phase::AwaitingPlayerAction | Phase::ResolvingPlayerMove => Continuation::AwaitPlayer {
                turn_timer_ms: self.config.turn_timer().as_millis() as u64,
            },
        }
    }

    fn ensure_player_turn(session: &CombatSession) -> Result<(), RuleError> {
        if session.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if session.phase != Phase::AwaitingPlayerAction || session.current_turn != Side::Player {
            return Err(RuleError::InvalidTurn {
                reason: format!("player cannot act during {:?}", session.phase),
            });
        }
        if session.player.is_stunned {
            return Err(RuleError::InvalidTurn {
                reason: "player is stunned".to_string(),
            });
        }
        Ok(())
    }

    pub fn select_card(
        &self,
        session: &mut CombatSession,
        card_id: CardId,
    ) -> Result<(), RuleError> {
        Self::ensure_player_turn(session)?;
        session
            .player
            .find_card_index(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;
        session.last_selected_card = Some(card_id);
        Ok(())
    }

    pub fn play_card(
        &mut self,
        session: &mut CombatSession,
        card_id: CardId,
    ) -> Result<PlayOutcome, RuleError> {
        Self::ensure_player_turn(session)?;

        let index = session
            .player
            .find_card_index(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;
        let card = session.player.hand[index].clone();
        if card.mana_cost > session.player.mana {
            return Err(RuleError::InsufficientResource {
                resource: Resource::Mana,
                required: u64::from(card.mana_cost),
                available: u64::from(session.player.mana),
            });
        }

        let ctx = EffectContext::player(&self.config);
        let outcome = resolve_card(&card, &session.player, &session.opponent, &ctx, &mut self.rng)?;

        session.phase = Phase::ResolvingPlayerMove;
        self.apply_outcome(session, Side::Player, index, &card, &outcome)?;
        let move_id = session.record_move(&card, Side::Player, now_millis());
        session.consecutive_skips = 0;
        session.log(play_line("You", &card, &outcome));
        tracing::debug!(
            "Player played card {} (move {}), opponent health {}",
            card.id,
            move_id,
            session.opponent.health
        );

        let continuation = match self.check_health(session) {
            Some(finished) => finished,
            None => self.end_turn(session, Side::Opponent),
        };
        Ok(PlayOutcome {
            move_id,
            continuation,
        })
    }

    pub fn skip_turn(&mut self, session: &mut CombatSession) -> Result<Continuation, RuleError> {
        Self::ensure_player_turn(session)?;
        session.log("You skipped your turn.");
        Ok(self.end_turn(session, Side::Opponent))
    }

    /// Turn timer ran out; same transition as [`RuleEngine::skip_turn`].
    pub fn timer_expired(
        &mut self,
        session: &mut CombatSession,
    ) -> Result<Continuation, RuleError> {
        Self::ensure_player_turn(session)?;
        session.log("Time's up! Your turn was skipped.");
        Ok(self.end_turn(session, Side::Opponent))
    }

    pub fn activate_boost(
        &mut self,
        session: &mut CombatSession,
        amount: u32,
    ) -> Result<BoostState, RuleError> {
        Self::ensure_player_turn(session)?;
        let boost = boost::activate(session, amount)?;
        session.log(format!(
            "Boost activated! +{}% power for {} turns",
            boost.effect_percent, boost.duration
        ));
        tracing::info!(
            "Boost activated: stake={}, effect={}%, duration={}",
            amount,
            boost.effect_percent,
            boost.duration
        );
        Ok(boost)
    }

    /// Resolves the opponent's turn. Only legal while the session awaits the AI,
    /// so a stale or duplicate scheduled callback is rejected.
    pub fn run_ai_turn(&mut self, session: &mut CombatSession) -> Result<AiTurn, RuleError> {
        if session.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if session.phase != Phase::AwaitingAiMove {
            return Err(RuleError::InvalidTurn {
                reason: format!("no AI move is scheduled during {:?}", session.phase),
            });
        }

        if session.opponent.is_stunned {
            session.phase = Phase::ResolvingAiMove;
            session.opponent.is_stunned = false;
            session.log("Opponent is stunned and skips a turn!");
            let continuation = self.end_turn(session, Side::Player);
            return Ok(AiTurn {
                decision: None,
                continuation,
            });
        }

        if session.opponent.hand.is_empty() {
            session.phase = Phase::ResolvingAiMove;
            let continuation = match self.apply_fatigue(session, Side::Opponent) {
                Some(finished) => finished,
                None => self.end_turn(session, Side::Player),
            };
            return Ok(AiTurn {
                decision: None,
                continuation,
            });
        }

        let tier = AiConfig::from_difficulty(session.difficulty);
        let agent = AiAgent::new(tier);
        let player_recent: Vec<Card> = session.player.recent_plays.iter().cloned().collect();
        let view = BattleView {
            self_health: session.opponent.health,
            opponent_health: session.player.health,
            self_mana: session.opponent.mana,
            opponent_recent: &player_recent,
            opponent_hand: &session.player.hand,
            combo_streak: session.ai_combo_counter,
            health_cap: self.config.base_health_cap,
            low_health_threshold: self.config.low_health_threshold,
        };
        let decision = agent.decide(&session.opponent.hand, &view, &mut self.rng);

        let Some(card_id) = decision.card_id else {
            session.phase = Phase::ResolvingAiMove;
            session.log("Opponent has no playable cards and passes.");
            let continuation = self.end_turn(session, Side::Player);
            return Ok(AiTurn {
                decision: Some(decision),
                continuation,
            });
        };

        let index = session
            .opponent
            .find_card_index(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;
        let card = session.opponent.hand[index].clone();
        let ctx = EffectContext::ai(&self.config, tier, session.ai_combo_counter);
        let outcome = resolve_card(&card, &session.opponent, &session.player, &ctx, &mut self.rng)?;

        session.phase = Phase::ResolvingAiMove;
        session.log(session.difficulty.thinking_message());
        self.apply_outcome(session, Side::Opponent, index, &card, &outcome)?;
        let extends_combo = card.card_type == CardType::Attack && card.attack_value() > 0;
        session.ai_combo_counter = if extends_combo {
            session.ai_combo_counter + 1
        } else {
            0
        };
        session.consecutive_skips = 0;
        session.log(play_line("Opponent", &card, &outcome));

        let continuation = match self.check_health(session) {
            Some(finished) => finished,
            None => self.end_turn(session, Side::Player),
        };
        Ok(AiTurn {
            decision: Some(decision),
            continuation,
        })
    }

    /// Pays the card, removes it from hand and applies the resolved deltas.
    fn apply_outcome(
        &self,
        session: &mut CombatSession,
        actor: Side,
        index: usize,
        card: &Card,
        outcome: &EffectOutcome,
    ) -> Result<(), RuleError> {
        let max_mana = self.config.max_mana;
        let window = self.config.recent_plays_window;
        let (attacker, defender) = session.split_mut(actor);

        attacker.apply_mana_cost(card.mana_cost)?;
        let refund = outcome.mana_delta_self + i16::from(card.mana_cost);
        if refund > 0 {
            attacker.grant_mana(refund.min(i16::from(u8::MAX)) as u8, max_mana);
        }
        attacker.hand.remove(index);
        attacker.health = attacker.health.saturating_add(outcome.health_delta_self).max(0);
        defender.health = defender.health.saturating_add(outcome.health_delta_opponent).max(0);
        if outcome.flags.stun_opponent {
            defender.is_stunned = true;
        }
        attacker.remember_play(card.clone(), window);
        Ok(())
    }

    fn check_health(&self, session: &mut CombatSession) -> Option<Continuation> {
        if session.opponent.is_defeated() {
            return Some(self.finish(session, BattleResult::PlayerWon));
        }
        if session.player.is_defeated() {
            return Some(self.finish(session, BattleResult::OpponentWon));
        }
        None
    }

    /// Fatigue hits `side`. Returns a finished continuation when it ends the battle.
    fn apply_fatigue(&self, session: &mut CombatSession, side: Side) -> Option<Continuation> {
        let damage = session.fatigue_damage;
        session.side_mut(side).take_damage(damage);
        session.fatigue_damage += 1;
        session.consecutive_skips = session.consecutive_skips.saturating_add(1);
        let who = match side {
            Side::Player => "You have",
            Side::Opponent => "Opponent has",
        };
        session.log(format!("{who} no cards left and takes {damage} fatigue damage!"));
        tracing::debug!(
            "Fatigue on {:?}: damage={}, consecutive_skips={}",
            side,
            damage,
            session.consecutive_skips
        );

        if session.consecutive_skips >= self.config.stalemate_threshold {
            return Some(self.finish(session, BattleResult::Draw));
        }
        self.check_health(session)
    }

    fn end_turn(&mut self, session: &mut CombatSession, next: Side) -> Continuation {
        match boost::tick(session) {
            BoostTick::Running { remaining_turns: 1 } => {
                session.log("Boost expires next turn!");
            }
            BoostTick::Expired => {
                session.log("Boost expired. Your cards return to normal.");
                tracing::info!("Boost expired");
            }
            BoostTick::Running { .. } | BoostTick::Inactive => {}
        }

        session.current_turn = next;
        session.turn += 1;
        session.side_mut(next).regenerate(self.config.max_mana);
        session.last_selected_card = None;
        tracing::debug!("Turn {} passes to {:?}", session.turn, next);

        match next {
            Side::Player => self.enter_player_turn(session),
            Side::Opponent => {
                session.phase = Phase::AwaitingAiMove;
                self.continuation(session)
            }
        }
    }

    /// Settles the start of the player's turn: stun, fatigue and forced passes
    /// hand control straight back to the opponent.
    fn enter_player_turn(&mut self, session: &mut CombatSession) -> Continuation {
        session.current_turn = Side::Player;
        if session.player.is_stunned {
            session.phase = Phase::ResolvingPlayerMove;
            session.player.is_stunned = false;
            session.log("You are stunned and skip this turn!");
            return self.end_turn(session, Side::Opponent);
        }
        if session.player.hand.is_empty() {
            session.phase = Phase::ResolvingPlayerMove;
            if let Some(finished) = self.apply_fatigue(session, Side::Player) {
                return finished;
            }
            return self.end_turn(session, Side::Opponent);
        }
        if session.player.playable_cards().is_empty() {
            session.phase = Phase::ResolvingPlayerMove;
            session.log("No playable cards. Your turn passes.");
            return self.end_turn(session, Side::Opponent);
        }

        session.phase = Phase::AwaitingPlayerAction;
        self.continuation(session)
    }

    fn finish(&self, session: &mut CombatSession, result: BattleResult) -> Continuation {
        session.result = result;
        session.phase = Phase::Finished;
        let line = match result {
            BattleResult::PlayerWon => format!(
                "Victory! You defeated the {} opponent and earned {} shards.",
                session.difficulty,
                session.difficulty.shard_reward()
            ),
            BattleResult::OpponentWon => "Defeat! Your health has been depleted.".to_string(),
            BattleResult::Draw => "Stalemate! The battle ends in a draw.".to_string(),
            BattleResult::Undetermined => String::new(),
        };
        if !line.is_empty() {
            session.log(line);
        }
        tracing::info!(
            "Combat session finished: result={:?}, turn={}, moves={}",
            result,
            session.turn,
            session.pending_moves.len()
        );
        Continuation::Finished { result }
    }
}

fn play_line(actor: &str, card: &Card, outcome: &EffectOutcome) -> String {
    let fragments = outcome.log_line();
    if fragments.is_empty() {
        format!("{actor} played {}.", card.name)
    } else {
        format!("{actor} played {}. {fragments}", card.name)
    }
}
