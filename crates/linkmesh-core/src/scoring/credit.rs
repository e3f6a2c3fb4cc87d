use crate::types::Tier;
use rust_decimal::Decimal;

/// Base credit price before multipliers.
const BASE_CREDITS: i64 = 10;

/// Credit price of one placed link:
/// `base × dr × trust × index × tier`, rounded to 2 decimal places.
///
/// Tier 1 is deliberately priced *lower* (0.5×): money-site slots are
/// scarce and the lower price nudges buyers toward tier-2/3 buffering.
pub fn credit_value(domain_rating: u32, trust_score: u8, is_indexed: bool, tier: Tier) -> Decimal {
    let base = Decimal::from(BASE_CREDITS);
    let value = base
        * dr_multiplier(domain_rating)
        * trust_multiplier(trust_score)
        * index_multiplier(is_indexed)
        * tier_multiplier(tier);
    value.round_dp(2)
}

/// Steps up with domain rating: 0.7× below DR 20 to 2.5× at DR 70+.
fn dr_multiplier(domain_rating: u32) -> Decimal {
    match domain_rating {
        0..=19 => Decimal::new(7, 1),
        20..=34 => Decimal::ONE,
        35..=49 => Decimal::new(14, 1),
        50..=69 => Decimal::new(18, 1),
        _ => Decimal::new(25, 1),
    }
}

/// trust_score / 50 — a score of 50 is price-neutral.
fn trust_multiplier(trust_score: u8) -> Decimal {
    Decimal::from(trust_score) / Decimal::from(50)
}

fn index_multiplier(is_indexed: bool) -> Decimal {
    if is_indexed {
        Decimal::new(15, 1)
    } else {
        Decimal::new(5, 1)
    }
}

fn tier_multiplier(tier: Tier) -> Decimal {
    match tier {
        Tier::One => Decimal::new(5, 1),
        Tier::Two => Decimal::ONE,
        Tier::Three => Decimal::new(13, 1),
    }
}
