use rand::seq::SliceRandom;
use rand::Rng;

use super::tiers::AiDifficulty;
use crate::game::Card;

/// Cards dealt to the AI at the start of a battle.
pub const OPPONENT_HAND_SIZE: usize = 3;

/// Deals the AI a hand from `catalog`, restricted to the rarities its tier may hold.
///
/// Returns fewer than `count` cards when the filtered catalog is smaller.
pub fn draw_opponent_hand<R: Rng + ?Sized>(
    catalog: &[Card],
    difficulty: AiDifficulty,
    rng: &mut R,
    count: usize,
) -> Vec<Card> {
    let eligible: Vec<&Card> = catalog
        .iter()
        .filter(|card| difficulty.allows(card.rarity))
        .collect();

    let hand: Vec<Card> = eligible
        .choose_multiple(rng, count)
        .map(|card| {
            let mut card = (*card).clone();
            card.revert_boost();
            card
        })
        .collect();

    tracing::debug!(
        "dealt {} of {} eligible cards to {} AI",
        hand.len(),
        eligible.len(),
        difficulty
    );
    hand
}
