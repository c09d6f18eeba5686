pub mod ai;
pub mod config;
pub mod game;
pub mod ledger;
pub mod utils;

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    draw_opponent_hand, AiAgent, AiConfig, AiDecision, AiDifficulty, BattleView, SelectCard,
    OPPONENT_HAND_SIZE,
};
pub use config::EngineConfig;
pub use game::{
    AiTurn, BattleResult, BoostState, Card, CardId, CardType, CombatSession, CombatantState,
    Continuation, EffectOutcome, Move, MoveId, Phase, PlayOutcome, Rarity, RuleEngine, RuleError,
    RuleResolution, Side, SpecialEffect, SpecialKind,
};
pub use ledger::{
    CommitAdapter, CommitError, CommitRef, Ledger, LedgerError, MoveCommit, Receipt, ResultSummary,
    Settlement,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    // With no tracing subscriber installed, events are forwarded as `log` records.
    if console_log::init_with_level(log::Level::Debug).is_err() {
        let notice = JsValue::from_str("combat-engine: a logger is already installed");
        web_sys::console::warn_1(&notice);
    }
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn busy_error<E>(_: E) -> JsValue {
    to_js_error(RuleError::InvalidTurn {
        reason: "another transition is still resolving".to_string(),
    })
}

fn parse_difficulty(difficulty: Option<String>) -> AiDifficulty {
    difficulty
        .as_deref()
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or(AiDifficulty::Novice)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

#[derive(Serialize)]
struct PlayResponse {
    move_id: MoveId,
    #[serde(flatten)]
    resolution: RuleResolution,
}

#[derive(Serialize)]
struct AiMoveResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<AiDecision>,
    #[serde(flatten)]
    resolution: RuleResolution,
}

struct Driver {
    engine: RuleEngine,
    session: CombatSession,
}

impl Driver {
    fn transition<F>(&mut self, action: F) -> Result<RuleResolution, RuleError>
    where
        F: FnOnce(&mut RuleEngine, &mut CombatSession) -> Result<Continuation, RuleError>,
    {
        let cursor = self.session.battle_log.len();
        let continuation = action(&mut self.engine, &mut self.session)?;
        Ok(RuleResolution::new(&self.session, cursor, continuation))
    }
}

/// One battle, driven from JavaScript. Scheduled callbacks share the session
/// through `Rc<RefCell<_>>` and never hold the borrow across an await.
#[wasm_bindgen]
pub struct CombatEngine {
    inner: Rc<RefCell<Driver>>,
}

#[wasm_bindgen]
impl CombatEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        player_hand_json: &str,
        opponent_hand_json: &str,
        difficulty: Option<String>,
        stake_balance: Option<u32>,
        seed: Option<u32>,
    ) -> Result<CombatEngine, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => EngineConfig::default(),
        };
        let player_hand: Vec<Card> =
            serde_json::from_str(player_hand_json).map_err(serde_to_js_error)?;
        let opponent_hand: Vec<Card> =
            serde_json::from_str(opponent_hand_json).map_err(serde_to_js_error)?;

        let mut engine = match seed {
            Some(seed) => RuleEngine::with_seed(config, u64::from(seed)),
            None => RuleEngine::new(config),
        };
        let session = engine
            .start_session(
                player_hand,
                opponent_hand,
                parse_difficulty(difficulty),
                u64::from(stake_balance.unwrap_or(0)),
            )
            .map_err(to_js_error)?;

        Ok(CombatEngine {
            inner: Rc::new(RefCell::new(Driver { engine, session })),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        let driver = self.inner.try_borrow().map_err(busy_error)?;
        to_json(&driver.session)
    }

    pub fn continuation_json(&self) -> Result<String, JsValue> {
        let driver = self.inner.try_borrow().map_err(busy_error)?;
        to_json(&driver.engine.continuation(&driver.session))
    }

    /// Battle log entries from `cursor` onward.
    pub fn log_since(&self, cursor: usize) -> Result<String, JsValue> {
        let driver = self.inner.try_borrow().map_err(busy_error)?;
        to_json(&driver.session.log_since(cursor))
    }

    pub fn select_card(&self, card_id: CardId) -> Result<(), JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        let Driver { engine, session } = &mut *driver;
        engine.select_card(session, card_id).map_err(to_js_error)
    }

    pub fn play_card(&self, card_id: CardId) -> Result<String, JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        let mut move_id = 0;
        let resolution = driver
            .transition(|engine, session| {
                let outcome = engine.play_card(session, card_id)?;
                move_id = outcome.move_id;
                Ok(outcome.continuation)
            })
            .map_err(to_js_error)?;
        to_json(&PlayResponse {
            move_id,
            resolution,
        })
    }

    pub fn activate_boost(&self, amount: u32) -> Result<String, JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        let resolution = driver
            .transition(|engine, session| {
                engine.activate_boost(session, amount)?;
                Ok(engine.continuation(session))
            })
            .map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn skip_turn(&self) -> Result<String, JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        let resolution = driver
            .transition(|engine, session| engine.skip_turn(session))
            .map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn timer_expired(&self) -> Result<String, JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        let resolution = driver
            .transition(|engine, session| engine.timer_expired(session))
            .map_err(to_js_error)?;
        to_json(&resolution)
    }

    /// Marks a move as confirmed after the host's ledger call succeeded.
    pub fn confirm_move(&self, move_id: u32, commit_ref: String) -> Result<bool, JsValue> {
        let mut driver = self.inner.try_borrow_mut().map_err(busy_error)?;
        Ok(driver
            .session
            .confirm_move(MoveId::from(move_id), CommitRef::new(commit_ref)))
    }

    /// Summary for settlement; rejects while the battle is still running.
    pub fn result_summary_json(&self) -> Result<String, JsValue> {
        let driver = self.inner.try_borrow().map_err(busy_error)?;
        if !driver.session.is_finished() {
            return Err(to_js_error(RuleError::InvalidTurn {
                reason: "battle is still in progress".to_string(),
            }));
        }
        to_json(&ResultSummary::from_session(&driver.session))
    }

    /// Waits the AI delay, then resolves the opponent's turn.
    pub fn schedule_ai_turn(&self) -> Promise {
        let inner = Rc::clone(&self.inner);

        future_to_promise(async move {
            let delay_ms = {
                let driver = inner.try_borrow().map_err(busy_error)?;
                match driver.engine.continuation(&driver.session) {
                    Continuation::AiMove { delay_ms } => delay_ms,
                    _ => {
                        return Err(to_js_error(RuleError::InvalidTurn {
                            reason: "no AI move is scheduled".to_string(),
                        }))
                    }
                }
            };
            TimeoutFuture::new(delay_ms.min(u64::from(u32::MAX)) as u32).await;

            let mut driver = inner.try_borrow_mut().map_err(busy_error)?;
            let mut decision = None;
            let resolution = driver
                .transition(|engine, session| {
                    let turn = engine.run_ai_turn(session)?;
                    decision = turn.decision;
                    Ok(turn.continuation)
                })
                .map_err(to_js_error)?;
            let json = to_json(&AiMoveResponse {
                decision,
                resolution,
            })?;
            Ok(JsValue::from_str(&json))
        })
    }

    /// Waits the turn timer and skips the player's turn if it is still pending.
    /// Resolves to `null` when the player acted in time.
    pub fn schedule_turn_timer(&self) -> Promise {
        let inner = Rc::clone(&self.inner);

        future_to_promise(async move {
            let (turn, timer_ms) = {
                let driver = inner.try_borrow().map_err(busy_error)?;
                match driver.engine.continuation(&driver.session) {
                    Continuation::AwaitPlayer { turn_timer_ms } => {
                        (driver.session.turn, turn_timer_ms)
                    }
                    _ => return Ok(JsValue::NULL),
                }
            };
            TimeoutFuture::new(timer_ms.min(u64::from(u32::MAX)) as u32).await;

            let mut driver = inner.try_borrow_mut().map_err(busy_error)?;
            if driver.session.turn != turn || driver.session.phase != Phase::AwaitingPlayerAction {
                return Ok(JsValue::NULL);
            }
            let resolution = driver
                .transition(|engine, session| engine.timer_expired(session))
                .map_err(to_js_error)?;
            Ok(JsValue::from_str(&to_json(&resolution)?))
        })
    }
}

/// Boost a stake would buy, without activating it.
#[wasm_bindgen(js_name = "previewBoost")]
pub fn preview_boost(amount: u32) -> Result<JsValue, JsValue> {
    to_value(&BoostState::for_stake(amount)).map_err(JsValue::from)
}

/// Deals an opponent hand from a card catalog, filtered by the tier's rarities.
#[wasm_bindgen(js_name = "drawOpponentHand")]
pub fn draw_opponent_hand_js(
    catalog: JsValue,
    difficulty: Option<String>,
    seed: Option<u32>,
) -> Result<JsValue, JsValue> {
    let catalog: Vec<Card> = from_value(catalog).map_err(JsValue::from)?;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(u64::from(seed)),
        None => SmallRng::from_entropy(),
    };
    let hand = draw_opponent_hand(
        &catalog,
        parse_difficulty(difficulty),
        &mut rng,
        OPPONENT_HAND_SIZE,
    );
    to_value(&hand).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
