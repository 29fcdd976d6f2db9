//! Server-side pricing for candidate and seat purchases.
//!
//! Everything here is pure: the same inputs always produce the same `PricingQuote`, so the
//! preview path and the charge path can both call it and must agree on the amount.

use crate::config::PricingConfig;
use crate::domain::money::Amount;
use crate::error::PaymentError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Daily session allowance a seat can be bought with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionsPerDay {
    Three,
    Five,
    Ten,
    Unlimited,
}

impl SessionsPerDay {
    /// Sessions actually priced per day; `Unlimited` is priced at the configured cap.
    pub fn priced_sessions(&self, unlimited_sessions: u32) -> u32 {
        match self {
            SessionsPerDay::Three => 3,
            SessionsPerDay::Five => 5,
            SessionsPerDay::Ten => 10,
            SessionsPerDay::Unlimited => unlimited_sessions,
        }
    }
}

impl FromStr for SessionsPerDay {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3" => Ok(SessionsPerDay::Three),
            "5" => Ok(SessionsPerDay::Five),
            "10" => Ok(SessionsPerDay::Ten),
            "unlimited" => Ok(SessionsPerDay::Unlimited),
            other => Err(PaymentError::ValidationError(format!(
                "sessions_per_day must be one of 3, 5, 10 or unlimited, got '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for SessionsPerDay {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionsPerDay> for String {
    fn from(value: SessionsPerDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SessionsPerDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionsPerDay::Three => write!(f, "3"),
            SessionsPerDay::Five => write!(f, "5"),
            SessionsPerDay::Ten => write!(f, "10"),
            SessionsPerDay::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Purchasable duration in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DurationMonths {
    One,
    Three,
    Six,
    Twelve,
}

impl DurationMonths {
    pub fn months(&self) -> u32 {
        match self {
            DurationMonths::One => 1,
            DurationMonths::Three => 3,
            DurationMonths::Six => 6,
            DurationMonths::Twelve => 12,
        }
    }
}

impl TryFrom<u32> for DurationMonths {
    type Error = PaymentError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DurationMonths::One),
            3 => Ok(DurationMonths::Three),
            6 => Ok(DurationMonths::Six),
            12 => Ok(DurationMonths::Twelve),
            other => Err(PaymentError::ValidationError(format!(
                "months must be one of 1, 3, 6 or 12, got {}",
                other
            ))),
        }
    }
}

impl From<DurationMonths> for u32 {
    fn from(value: DurationMonths) -> Self {
        value.months()
    }
}

/// A volume discount step: quantities of at least `min_units` pay `multiplier` of base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub min_units: u32,
    pub multiplier: Decimal,
}

impl DiscountTier {
    pub const NONE: Self = Self {
        min_units: 0,
        multiplier: Decimal::ONE,
    };

    pub fn percent_off(&self) -> Decimal {
        (Decimal::ONE - self.multiplier) * Decimal::ONE_HUNDRED
    }
}

/// Itemized computation kept on the ledger entry for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum QuoteBreakdown {
    Candidates {
        base_price_per_unit_per_month: Decimal,
        base_price: Decimal,
        multiplier: Decimal,
    },
    Seats {
        sessions_per_day: SessionsPerDay,
        actual_sessions_per_day: u32,
        monthly_sessions: u32,
        raw_monthly_cost: Decimal,
        marked_up_monthly_cost: Decimal,
        multiplier: Decimal,
        per_unit_per_month: Amount,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub unit_count: u32,
    pub duration_units: u32,
    pub per_unit_price: Amount,
    pub total_price: Amount,
    pub discount_tier: DiscountTier,
    pub breakdown: QuoteBreakdown,
}

/// Deterministic price calculator sharing one tier policy across both quote flavors.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Highest tier whose threshold the quantity reaches.
    pub fn tier_for(&self, unit_count: u32) -> DiscountTier {
        self.config
            .tiers
            .iter()
            .filter(|tier| unit_count >= tier.min_units)
            .max_by_key(|tier| tier.min_units)
            .copied()
            .unwrap_or(DiscountTier::NONE)
    }

    /// Flat per-candidate pricing.
    pub fn quote_candidates(
        &self,
        unit_count: u32,
        months: DurationMonths,
    ) -> Result<PricingQuote, PaymentError> {
        ensure_positive(unit_count)?;
        let tier = self.tier_for(unit_count);
        let base_price =
            self.config.base_price_per_candidate_per_month * Decimal::from(months.months());
        let per_unit_price = round_unit_price(base_price * tier.multiplier)?;
        let total_price = per_unit_price.times(unit_count)?;

        Ok(PricingQuote {
            unit_count,
            duration_units: months.months(),
            per_unit_price,
            total_price,
            discount_tier: tier,
            breakdown: QuoteBreakdown::Candidates {
                base_price_per_unit_per_month: self.config.base_price_per_candidate_per_month,
                base_price,
                multiplier: tier.multiplier,
            },
        })
    }

    /// Seat pricing driven by the daily session allowance.
    pub fn quote_seats(
        &self,
        unit_count: u32,
        sessions_per_day: SessionsPerDay,
        months: DurationMonths,
    ) -> Result<PricingQuote, PaymentError> {
        ensure_positive(unit_count)?;
        let tier = self.tier_for(unit_count);
        let actual_sessions_per_day =
            sessions_per_day.priced_sessions(self.config.unlimited_sessions_per_day);
        let monthly_sessions = actual_sessions_per_day * self.config.sessions_days_per_month;
        let raw_monthly_cost = Decimal::from(monthly_sessions) * self.config.per_session_cost;
        let marked_up_monthly_cost = raw_monthly_cost * self.config.markup;
        let per_unit_per_month = round_unit_price(marked_up_monthly_cost * tier.multiplier)?;
        let per_unit_price = per_unit_per_month.times(months.months())?;
        let total_price = per_unit_price.times(unit_count)?;

        Ok(PricingQuote {
            unit_count,
            duration_units: months.months(),
            per_unit_price,
            total_price,
            discount_tier: tier,
            breakdown: QuoteBreakdown::Seats {
                sessions_per_day,
                actual_sessions_per_day,
                monthly_sessions,
                raw_monthly_cost,
                marked_up_monthly_cost,
                multiplier: tier.multiplier,
                per_unit_per_month,
            },
        })
    }
}

fn ensure_positive(unit_count: u32) -> Result<(), PaymentError> {
    if unit_count == 0 {
        return Err(PaymentError::ValidationError(
            "unit count must be positive".to_string(),
        ));
    }
    Ok(())
}

// Rounding happens only here, at the per-unit step.
fn round_unit_price(value: Decimal) -> Result<Amount, PaymentError> {
    Amount::new(value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rust_decimal_macros::dec;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default())
    }

    #[test]
    fn test_seat_quote_reference_scenario() {
        let quote = engine()
            .quote_seats(12, SessionsPerDay::Five, DurationMonths::One)
            .unwrap();

        match &quote.breakdown {
            QuoteBreakdown::Seats {
                actual_sessions_per_day,
                monthly_sessions,
                raw_monthly_cost,
                marked_up_monthly_cost,
                per_unit_per_month,
                ..
            } => {
                assert_eq!(*actual_sessions_per_day, 5);
                assert_eq!(*monthly_sessions, 150);
                assert_eq!(*raw_monthly_cost, dec!(210));
                assert_eq!(*marked_up_monthly_cost, dec!(304.5));
                assert_eq!(*per_unit_per_month, Amount::from_units(274));
            }
            other => panic!("unexpected breakdown {:?}", other),
        }
        assert_eq!(quote.discount_tier.percent_off(), dec!(10));
        assert_eq!(quote.per_unit_price, Amount::from_units(274));
        assert_eq!(quote.total_price, Amount::from_units(3288));
    }

    #[test]
    fn test_unlimited_sessions_priced_at_cap() {
        let quote = engine()
            .quote_seats(10, SessionsPerDay::Unlimited, DurationMonths::One)
            .unwrap();
        match quote.breakdown {
            QuoteBreakdown::Seats {
                actual_sessions_per_day,
                monthly_sessions,
                ..
            } => {
                assert_eq!(actual_sessions_per_day, 15);
                assert_eq!(monthly_sessions, 450);
            }
            other => panic!("unexpected breakdown {:?}", other),
        }
        // 450 * 1.4 * 1.45 = 913.5; * 0.9 = 822.15 -> 822
        assert_eq!(quote.per_unit_price, Amount::from_units(822));
    }

    #[test]
    fn test_multi_month_rounds_before_multiplying() {
        let quote = engine()
            .quote_seats(12, SessionsPerDay::Five, DurationMonths::Three)
            .unwrap();
        assert_eq!(quote.per_unit_price, Amount::from_units(274 * 3));
        assert_eq!(quote.total_price, Amount::from_units(274 * 3 * 12));
    }

    #[test]
    fn test_tier_boundaries() {
        let engine = engine();
        assert_eq!(engine.tier_for(9).multiplier, dec!(1));
        assert_eq!(engine.tier_for(10).multiplier, dec!(0.90));
        assert_eq!(engine.tier_for(49).multiplier, dec!(0.90));
        assert_eq!(engine.tier_for(50).multiplier, dec!(0.85));
        assert_eq!(engine.tier_for(99).multiplier, dec!(0.85));
        assert_eq!(engine.tier_for(100).multiplier, dec!(0.80));
        assert_eq!(engine.tier_for(5000).multiplier, dec!(0.80));
    }

    #[test]
    fn test_per_unit_price_never_increases_across_tiers() {
        let engine = engine();
        let sessions = [
            SessionsPerDay::Three,
            SessionsPerDay::Five,
            SessionsPerDay::Ten,
            SessionsPerDay::Unlimited,
        ];
        let months = [
            DurationMonths::One,
            DurationMonths::Three,
            DurationMonths::Six,
            DurationMonths::Twelve,
        ];
        for s in sessions {
            for m in months {
                let mut previous = None;
                for units in [1, 9, 10, 49, 50, 99, 100, 250] {
                    let quote = engine.quote_seats(units, s, m).unwrap();
                    if let Some(prev) = previous {
                        assert!(quote.per_unit_price <= prev, "{} {:?} {}", s, m, units);
                    }
                    previous = Some(quote.per_unit_price);
                }
            }
        }
    }

    #[test]
    fn test_quote_is_deterministic() {
        let engine = engine();
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let units = rng.gen_range(10..=500);
            let sessions = match rng.gen_range(0..4) {
                0 => SessionsPerDay::Three,
                1 => SessionsPerDay::Five,
                2 => SessionsPerDay::Ten,
                _ => SessionsPerDay::Unlimited,
            };
            let months = match rng.gen_range(0..4) {
                0 => DurationMonths::One,
                1 => DurationMonths::Three,
                2 => DurationMonths::Six,
                _ => DurationMonths::Twelve,
            };
            let first = engine.quote_seats(units, sessions, months).unwrap();
            let second = engine.quote_seats(units, sessions, months).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.total_price, first.per_unit_price.times(units).unwrap());
        }
    }

    #[test]
    fn test_candidate_quote() {
        let quote = engine()
            .quote_candidates(55, DurationMonths::Three)
            .unwrap();
        // 100 * 3 = 300; * 0.85 = 255
        assert_eq!(quote.per_unit_price, Amount::from_units(255));
        assert_eq!(quote.total_price, Amount::from_units(255 * 55));

        let small = engine().quote_candidates(2, DurationMonths::One).unwrap();
        assert_eq!(small.per_unit_price, Amount::from_units(100));
        assert_eq!(small.discount_tier, DiscountTier::NONE);
    }

    #[test]
    fn test_zero_units_rejected() {
        assert!(matches!(
            engine().quote_candidates(0, DurationMonths::One),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_closed_sets() {
        assert_eq!("unlimited".parse::<SessionsPerDay>().unwrap(), SessionsPerDay::Unlimited);
        assert_eq!(" 10 ".parse::<SessionsPerDay>().unwrap(), SessionsPerDay::Ten);
        assert!("4".parse::<SessionsPerDay>().is_err());
        assert_eq!(DurationMonths::try_from(6).unwrap(), DurationMonths::Six);
        assert!(DurationMonths::try_from(2).is_err());
    }
}
