//! Card effect resolution.
//!
//! [`resolve_card`] is a pure computation over the played card and both
//! combatants as they stand before the card's cost is paid. It returns clamped
//! deltas that the turn machine applies verbatim. Evaluation order is fixed:
//! attack with combo, healing with bonuses, critical roll, special effect,
//! then boost bookkeeping.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::resources::{damaged, healed, HealthCap};
use super::rules::RuleError;
use super::state::{Card, CardType, CombatantState, Rarity, SpecialKind};
use crate::ai::AiConfig;
use crate::config::EngineConfig;

/// Who authored the play. Combo, healing and stun odds differ per author.
#[derive(Debug, Clone, Copy)]
pub enum Author {
    Player,
    Ai { tier: AiConfig, combo_streak: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    pub author: Author,
    pub config: &'a EngineConfig,
}

impl<'a> EffectContext<'a> {
    pub fn player(config: &'a EngineConfig) -> Self {
        Self {
            author: Author::Player,
            config,
        }
    }

    pub fn ai(config: &'a EngineConfig, tier: AiConfig, combo_streak: u32) -> Self {
        Self {
            author: Author::Ai { tier, combo_streak },
            config,
        }
    }

    fn stun_chance(&self) -> f64 {
        match self.author {
            Author::Player => self.config.player_stun_chance,
            Author::Ai { tier, .. } => tier.stun_chance,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusFlags {
    pub stun_opponent: bool,
    pub combo: bool,
    pub critical: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectOutcome {
    pub health_delta_self: i16,
    pub health_delta_opponent: i16,
    pub mana_delta_self: i16,
    pub flags: StatusFlags,
    pub log: Vec<String>,
}

impl EffectOutcome {
    pub fn log_line(&self) -> String {
        self.log.join(" ")
    }
}

/// Resolves `card` played by `attacker` against `defender`.
pub fn resolve_card<R: Rng + ?Sized>(
    card: &Card,
    attacker: &CombatantState,
    defender: &CombatantState,
    ctx: &EffectContext<'_>,
    rng: &mut R,
) -> Result<EffectOutcome, RuleError> {
    let config = ctx.config;
    card.validate(config.max_mana)?;

    let base_cap = HealthCap::Base.value(config);
    let extended_cap = HealthCap::Extended.value(config);
    let mut flags = StatusFlags::default();
    let mut log = Vec::new();
    let mut self_health = attacker.health;
    let mut opponent_health = defender.health;
    let mut mana = attacker.mana.saturating_sub(card.mana_cost);

    // Attack with combo bonus.
    let attack = card.attack_value();
    let mut attack_total = 0i16;
    if attack > 0 {
        let combo_bonus = combo_bonus(card, attacker, ctx);
        if combo_bonus > 0 {
            flags.combo = true;
            log.push(format!("Combo bonus: +{combo_bonus} damage!"));
        }
        attack_total = attack.saturating_add(combo_bonus);
    }

    // Defense healing with streak and low-health bonuses.
    let defense = card.defense_value();
    if defense > 0 {
        let streak_bonus = heal_streak_bonus(defense, attacker, ctx);
        if streak_bonus > 0 {
            log.push(format!("Enhanced healing: +{streak_bonus}!"));
        }
        let low_health_bonus = if attacker.health < config.low_health_threshold {
            floor_fraction(defense, config.low_health_heal_fraction)
        } else {
            0
        };
        if low_health_bonus > 0 {
            log.push(format!("Desperate healing: +{low_health_bonus}!"));
        }
        let total = defense
            .saturating_add(streak_bonus)
            .saturating_add(low_health_bonus);
        self_health = healed(self_health, total, base_cap);
        log.push(format!("Gained {total} health."));
    }

    // Critical hit on the combo-inclusive total.
    if attack_total > 0 && card.card_type == CardType::Attack {
        if let Some((chance, multiplier)) = crit_profile(card.rarity, config) {
            if roll(rng, chance) {
                attack_total = (f64::from(attack_total) * multiplier).floor() as i16;
                flags.critical = true;
                log.push(format!("Critical hit! x{multiplier}"));
            }
        }
    }
    if attack_total > 0 {
        opponent_health = damaged(opponent_health, attack_total);
        log.push(format!("Dealt {attack_total} damage."));
    }

    if let Some(effect) = &card.special_effect {
        if !effect.description.is_empty() {
            log.push(effect.description.clone());
        }
        let value = effect.value.unwrap_or(0);
        match effect.kind {
            SpecialKind::Damage => {
                let extra = card.boosted_value(value);
                opponent_health = damaged(opponent_health, extra);
                log.push(format!("({extra} extra damage)"));
            }
            SpecialKind::Heal => {
                let extra = card.boosted_value(value);
                self_health = healed(self_health, extra, extended_cap);
                log.push(format!("({extra} extra healing)"));
            }
            SpecialKind::Mana => {
                let gain = value.clamp(0, i16::from(u8::MAX)) as u8;
                let before = mana;
                mana = mana.saturating_add(gain).min(config.max_mana).max(before);
                log.push(format!("(Gained {} extra mana)", mana - before));
            }
            SpecialKind::Stun => {
                if roll(rng, ctx.stun_chance()) {
                    flags.stun_opponent = true;
                    log.push(match ctx.author {
                        Author::Player => "(Opponent stunned for 1 turn)".to_string(),
                        Author::Ai { .. } => "(Player stunned!)".to_string(),
                    });
                }
            }
            SpecialKind::Leech => {
                let leech = (i32::from(attack_total) * i32::from(value) / 100)
                    .clamp(0, i32::from(i16::MAX)) as i16;
                self_health = healed(self_health, leech, extended_cap);
                log.push(format!("(Leeched {leech} health)"));
            }
            SpecialKind::ComboDamage => {
                let partner = attacker
                    .recent_plays
                    .iter()
                    .find(|played| effect.combo_partners.contains(&played.id));
                if let Some(partner) = partner {
                    let extra = card.boosted_value(value);
                    opponent_health = damaged(opponent_health, extra);
                    flags.combo = true;
                    log.push(format!("(Combo with {}: {extra} extra damage)", partner.name));
                }
            }
        }
    }

    // Boost bookkeeping only; the multiplier is already in the live stats.
    if let Some(snapshot) = &card.boost {
        let deltas = [
            ("ATK", card.attack, snapshot.original_attack),
            ("DEF", card.defense, snapshot.original_defense),
            ("SPC", card.special, snapshot.original_special),
        ];
        for (label, live, original) in deltas {
            let delta = live.unwrap_or(0).saturating_sub(original.unwrap_or(0));
            if delta > 0 {
                log.push(format!("+{delta} {label} from boost"));
            }
        }
    }

    Ok(EffectOutcome {
        health_delta_self: self_health - attacker.health,
        health_delta_opponent: opponent_health - defender.health,
        mana_delta_self: i16::from(mana) - i16::from(attacker.mana),
        flags,
        log,
    })
}

fn combo_bonus(card: &Card, attacker: &CombatantState, ctx: &EffectContext<'_>) -> i16 {
    let attack = card.attack_value();
    match ctx.author {
        Author::Player => match attacker.last_played() {
            Some(previous) if previous.card_type == CardType::Attack => {
                floor_fraction(attack, ctx.config.player_combo_fraction)
            }
            _ => 0,
        },
        Author::Ai { tier, combo_streak } => {
            if !tier.combo_bonus || combo_streak == 0 {
                return 0;
            }
            floor_fraction(attack, f64::from(combo_streak) * ctx.config.ai_combo_step)
        }
    }
}

fn heal_streak_bonus(defense: i16, attacker: &CombatantState, ctx: &EffectContext<'_>) -> i16 {
    match ctx.author {
        Author::Player => match attacker.last_played() {
            Some(previous) if previous.card_type == CardType::Defense => {
                floor_fraction(defense, ctx.config.player_heal_combo_fraction)
            }
            _ => 0,
        },
        Author::Ai { tier, .. } => floor_fraction(
            defense,
            f64::from(attacker.consecutive_defense_plays) * tier.defense_step,
        ),
    }
}

fn crit_profile(rarity: Rarity, config: &EngineConfig) -> Option<(f64, f64)> {
    match rarity {
        Rarity::Epic => Some((config.epic_crit_chance, config.epic_crit_multiplier)),
        Rarity::Legendary => Some((config.legendary_crit_chance, config.legendary_crit_multiplier)),
        Rarity::Common | Rarity::Rare => None,
    }
}

fn floor_fraction(value: i16, fraction: f64) -> i16 {
    (f64::from(value) * fraction).floor() as i16
}

/// Certain events skip the dice so a guaranteed effect never depends on the rng.
fn roll<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> bool {
    if chance >= 1.0 {
        return true;
    }
    if chance <= 0.0 {
        return false;
    }
    rng.gen_bool(chance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiConfig, AiDifficulty};
    use crate::game::state::SpecialEffect;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    fn strike(id: u32, attack: i16) -> Card {
        Card::new(id, "Strike", 2, CardType::Attack, Rarity::Common).with_attack(attack)
    }

    fn ward(id: u32, defense: i16) -> Card {
        Card::new(id, "Ward", 2, CardType::Defense, Rarity::Common).with_defense(defense)
    }

    fn state(health: i16) -> CombatantState {
        CombatantState::new(health, 10, Vec::new())
    }

    #[test]
    fn plain_attack_deals_base_damage() {
        let config = EngineConfig::default();
        let outcome = resolve_card(
            &strike(1, 5),
            &state(20),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");

        assert_eq!(outcome.health_delta_opponent, -5);
        assert_eq!(outcome.health_delta_self, 0);
        assert_eq!(outcome.mana_delta_self, -2);
        assert!(!outcome.flags.combo);
        assert!(!outcome.log_line().contains("Combo"));
    }

    #[test]
    fn player_attack_combo_adds_a_fifth() {
        let config = EngineConfig::default();
        let mut attacker = state(20);
        attacker.remember_play(strike(1, 3), 3);

        let outcome = resolve_card(
            &strike(2, 10),
            &attacker,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, -12);
        assert!(outcome.flags.combo);
        assert!(outcome.log_line().contains("Combo bonus: +2 damage!"));
    }

    #[test]
    fn ai_combo_scales_with_streak_and_skips_novice() {
        let config = EngineConfig::default();
        let veteran = AiConfig::from_difficulty(AiDifficulty::Veteran);
        let novice = AiConfig::from_difficulty(AiDifficulty::Novice);

        let outcome = resolve_card(
            &strike(1, 10),
            &state(20),
            &state(20),
            &EffectContext::ai(&config, veteran, 3),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, -13);

        let outcome = resolve_card(
            &strike(1, 10),
            &state(20),
            &state(20),
            &EffectContext::ai(&config, novice, 3),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, -10);
    }

    #[test]
    fn healing_bonuses_stack() {
        let config = EngineConfig::default();
        let mut attacker = state(5);
        attacker.remember_play(ward(1, 2), 3);

        let outcome = resolve_card(
            &ward(2, 8),
            &attacker,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        // 8 + floor(8 * 0.15) + floor(8 * 0.25)
        assert_eq!(outcome.health_delta_self, 11);
        let line = outcome.log_line();
        assert!(line.contains("Enhanced healing: +1!"));
        assert!(line.contains("Desperate healing: +2!"));
    }

    #[test]
    fn base_heal_clamps_at_base_cap() {
        let config = EngineConfig::default();
        let outcome = resolve_card(
            &ward(1, 9),
            &state(17),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_self, 3);
    }

    #[test]
    fn special_heal_and_leech_use_extended_cap() {
        let config = EngineConfig::default();
        let salve = Card::new(3, "Salve", 3, CardType::Special, Rarity::Rare)
            .with_effect(SpecialEffect::new(SpecialKind::Heal, Some(6), "Restore"));
        let outcome = resolve_card(
            &salve,
            &state(20),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_self, 6);

        let fang = Card::new(4, "Fang", 3, CardType::Attack, Rarity::Rare)
            .with_attack(10)
            .with_effect(SpecialEffect::new(SpecialKind::Leech, Some(50), "Drain"));
        let outcome = resolve_card(
            &fang,
            &state(27),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, -10);
        assert_eq!(outcome.health_delta_self, 3, "leech clamps at the extended cap");
    }

    #[test]
    fn mana_effect_caps_after_cost() {
        let config = EngineConfig::default();
        let surge = Card::new(5, "Surge", 1, CardType::Special, Rarity::Common)
            .with_effect(SpecialEffect::new(SpecialKind::Mana, Some(3), "Channel"));
        let mut attacker = state(20);
        attacker.mana = 9;
        let outcome = resolve_card(
            &surge,
            &attacker,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.mana_delta_self, 1);
    }

    #[test]
    fn player_stun_always_lands_but_zero_chance_never_does() {
        let mut config = EngineConfig::default();
        let daze = Card::new(6, "Daze", 2, CardType::Special, Rarity::Rare)
            .with_effect(SpecialEffect::new(SpecialKind::Stun, None, "Daze"));
        let mut dice = rng();
        for _ in 0..20 {
            let outcome = resolve_card(
                &daze,
                &state(20),
                &state(20),
                &EffectContext::player(&config),
                &mut dice,
            )
            .expect("card should resolve");
            assert!(outcome.flags.stun_opponent);
        }

        config.player_stun_chance = 0.0;
        let outcome = resolve_card(
            &daze,
            &state(20),
            &state(20),
            &EffectContext::player(&config),
            &mut dice,
        )
        .expect("card should resolve");
        assert!(!outcome.flags.stun_opponent);
    }

    #[test]
    fn legendary_crit_doubles_combo_total() {
        let mut config = EngineConfig::default();
        config.legendary_crit_chance = 1.0;
        let mut attacker = state(20);
        attacker.remember_play(strike(1, 1), 3);
        let relic =
            Card::new(7, "Relic Edge", 5, CardType::Attack, Rarity::Legendary).with_attack(10);

        let outcome = resolve_card(
            &relic,
            &attacker,
            &state(30),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert!(outcome.flags.critical);
        assert_eq!(outcome.health_delta_opponent, -24);
    }

    #[test]
    fn combo_damage_needs_partner_in_recent_plays() {
        let config = EngineConfig::default();
        let finisher = Card::new(8, "Finisher", 3, CardType::Special, Rarity::Epic).with_effect(
            SpecialEffect::new(SpecialKind::ComboDamage, Some(4), "Follow through")
                .with_combo_partners(vec![1]),
        );

        let outcome = resolve_card(
            &finisher,
            &state(20),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, 0);

        let mut attacker = state(20);
        attacker.remember_play(strike(1, 2), 3);
        let outcome = resolve_card(
            &finisher,
            &attacker,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_opponent, -4);
    }

    #[test]
    fn boosted_card_reports_boost_delta_once() {
        let config = EngineConfig::default();
        let mut card = Card::new(9, "Flare", 3, CardType::Attack, Rarity::Common)
            .with_attack(10)
            .with_effect(SpecialEffect::new(SpecialKind::Damage, Some(4), ""));
        card.apply_boost(50);

        let outcome = resolve_card(
            &card,
            &state(20),
            &state(30),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        // 15 boosted attack + 6 boosted special damage
        assert_eq!(outcome.health_delta_opponent, -21);
        assert!(outcome.log_line().contains("+5 ATK from boost"));
    }

    #[test]
    fn oversized_stats_saturate_instead_of_wrapping() {
        let config = EngineConfig::default();
        let mut attacker = state(20);
        attacker.remember_play(strike(1, 3), 3);

        let outcome = resolve_card(
            &strike(2, 30_000),
            &attacker,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert!(outcome.flags.combo);
        assert_eq!(outcome.health_delta_opponent, -20);

        let mut healer = state(5);
        healer.remember_play(ward(3, 2), 3);
        let outcome = resolve_card(
            &ward(4, 30_000),
            &healer,
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_self, 15);
    }

    #[test]
    fn leech_on_huge_attack_stays_positive() {
        let config = EngineConfig::default();
        let fang = Card::new(11, "Fang", 3, CardType::Attack, Rarity::Rare)
            .with_attack(30_000)
            .with_effect(SpecialEffect::new(SpecialKind::Leech, Some(200), "Drain"));
        let outcome = resolve_card(
            &fang,
            &state(10),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        )
        .expect("card should resolve");
        assert_eq!(outcome.health_delta_self, 20);
        assert_eq!(outcome.health_delta_opponent, -20);
    }

    #[test]
    fn malformed_card_fails_fast() {
        let config = EngineConfig::default();
        let hollow = Card::new(10, "Hollow", 1, CardType::Attack, Rarity::Common);
        let result = resolve_card(
            &hollow,
            &state(20),
            &state(20),
            &EffectContext::player(&config),
            &mut rng(),
        );
        assert!(matches!(result, Err(RuleError::MalformedCard { card_id: 10, .. })));
    }
}
