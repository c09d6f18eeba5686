//! Combat core: session state, resources, effect resolution, boosts and the turn machine.

pub mod boost;
pub mod effects;
pub mod resources;
pub mod rules;
pub mod state;

pub use boost::{compute_duration, compute_effect, BoostState, BoostTick};
pub use effects::{resolve_card, Author, EffectContext, EffectOutcome, StatusFlags};
pub use resources::{HealthCap, Resource};
pub use rules::{AiTurn, Continuation, PlayOutcome, RuleEngine, RuleError, RuleResolution};
pub use state::{
    BattleResult,
    BoostSnapshot,
    Card,
    CardId,
    CardType,
    CombatSession,
    CombatantState,
    Move,
    MoveId,
    Phase,
    Rarity,
    Side,
    SpecialEffect,
    SpecialKind,
};
