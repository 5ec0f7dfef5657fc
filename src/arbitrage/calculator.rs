//! Implied-probability, stake and payout calculations.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use smallvec::SmallVec;

use super::filter::{canonical_bookmaker, EligibleBest};
use crate::error::ArbitrageError;
use crate::odds::{EventInfo, MarketType, OddsQuote};

/// Decimal places used for ROI.
pub const ROI_DECIMALS: u32 = 2;

/// Stake and payout inputs for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Total amount to spread across the outcomes.
    pub bankroll: Decimal,
    /// Display currency symbol.
    pub currency: String,
    /// Stakes are rounded to a multiple of this.
    pub rounding_step: Decimal,
    /// Also report the theoretical payout of the unrounded split.
    pub show_equalized: bool,
    /// Commission on winnings per bookmaker (canonical name fragment, rate).
    pub commissions: Vec<(String, Decimal)>,
}

impl EngineSettings {
    /// Settings without commissions.
    pub fn new(bankroll: Decimal, currency: impl Into<String>, rounding_step: Decimal) -> Self {
        Self {
            bankroll,
            currency: currency.into(),
            rounding_step,
            show_equalized: true,
            commissions: Vec::new(),
        }
    }

    /// Commission rate charged by a bookmaker (zero when none configured).
    pub fn commission_for(&self, bookmaker: &str) -> Decimal {
        let name = canonical_bookmaker(bookmaker);
        self.commissions
            .iter()
            .find(|(book, _)| name.contains(book.as_str()))
            .map(|(_, rate)| *rate)
            .unwrap_or(Decimal::ZERO)
    }

    /// Odds after commission.
    pub fn effective_odds(&self, quote: &OddsQuote) -> Result<Decimal, ArbitrageError> {
        if quote.odds <= Decimal::ONE {
            return Err(ArbitrageError::InvalidOdds {
                outcome: quote.outcome.clone(),
                bookmaker: quote.bookmaker.clone(),
                odds: quote.odds,
            });
        }

        let rate = self.commission_for(&quote.bookmaker);
        if rate.is_zero() {
            return Ok(quote.odds);
        }

        let effective = quote
            .odds
            .checked_mul(Decimal::ONE - rate)
            .ok_or(ArbitrageError::Overflow("effective odds"))?;
        if effective <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidCommission {
                bookmaker: quote.bookmaker.clone(),
                rate,
            });
        }

        Ok(effective)
    }
}

/// One outcome's bet in a staking plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StakeLeg {
    /// Outcome label.
    pub outcome: String,
    /// Bookmaker offering the price.
    pub bookmaker: String,
    /// Quoted decimal odds.
    pub odds: Decimal,
    /// Odds after commission (equal to `odds` without commission).
    pub effective_odds: Decimal,
    /// Proportional stake before rounding.
    pub raw_stake: Decimal,
    /// Stake rounded to the configured step.
    pub stake: Decimal,
    /// Return if this outcome wins, from the rounded stake.
    pub payout: Decimal,
}

/// Detected arbitrage opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opportunity {
    /// Event identity.
    pub event: EventInfo,
    /// Market type.
    pub market: MarketType,
    /// Over/under line, if any.
    pub line: Option<Decimal>,
    /// One leg per outcome, in market outcome order.
    pub legs: SmallVec<[StakeLeg; 3]>,
    /// Configured bankroll.
    pub bankroll: Decimal,
    /// Sum of rounded stakes.
    pub total_staked: Decimal,
    /// Sum of implied probabilities (< 1).
    pub implied_sum: Decimal,
    /// ROI percentage, (1/S - 1) * 100, two decimals.
    pub roi_pct: Decimal,
    /// Smallest payout across legs after rounding.
    pub min_payout: Decimal,
    /// `min_payout - total_staked`. Rounding can make this negative.
    pub guaranteed_profit: Decimal,
    /// Payout of the unrounded split, bankroll / S, when requested.
    pub equalized_payout: Option<Decimal>,
    /// Display currency symbol.
    pub currency: String,
    /// Rounding step applied to stakes.
    pub rounding_step: Decimal,
}

impl Opportunity {
    /// Provider event id.
    pub fn event_id(&self) -> &str {
        &self.event.id
    }

    /// Key identifying the market this opportunity belongs to.
    pub fn market_key(&self) -> (&str, MarketType, Option<Decimal>) {
        (&self.event.id, self.market, self.line)
    }
}

/// Round to the nearest multiple of `step`, halves away from zero.
pub fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * step
}

/// ROI percentage implied by a probability sum, unrounded.
pub fn roi_from_sum(implied_sum: Decimal) -> Decimal {
    (Decimal::ONE / implied_sum - Decimal::ONE) * Decimal::ONE_HUNDRED
}

/// ROI percent as reported on an opportunity.
pub fn reported_roi(implied_sum: Decimal) -> Decimal {
    roi_from_sum(implied_sum).round_dp_with_strategy(ROI_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum of implied probabilities over the best quotes.
///
/// Returns `None` unless every outcome has an eligible quote.
pub fn implied_probability_sum(
    best: &EligibleBest,
    settings: &EngineSettings,
) -> Result<Option<Decimal>, ArbitrageError> {
    if !best.is_complete() {
        return Ok(None);
    }

    let mut sum = Decimal::ZERO;
    for quote in best.quotes() {
        let effective = settings.effective_odds(quote)?;
        sum += Decimal::ONE / effective;
    }

    Ok(Some(sum))
}

/// Calculate the staking plan for a market.
///
/// Returns `None` when an outcome lacks an eligible quote or the implied
/// probabilities sum to 1 or more.
pub fn calculate_opportunity(
    best: &EligibleBest,
    settings: &EngineSettings,
) -> Result<Option<Opportunity>, ArbitrageError> {
    let Some(implied_sum) = implied_probability_sum(best, settings)? else {
        return Ok(None);
    };

    if implied_sum >= Decimal::ONE || implied_sum <= Decimal::ZERO {
        return Ok(None);
    }

    let mut legs: SmallVec<[StakeLeg; 3]> = SmallVec::new();

    for quote in best.quotes() {
        let effective_odds = settings.effective_odds(quote)?;
        let raw_stake = settings
            .bankroll
            .checked_div(effective_odds)
            .and_then(|s| s.checked_div(implied_sum))
            .ok_or(ArbitrageError::Overflow("stake"))?;
        let stake = round_to_step(raw_stake, settings.rounding_step);
        let payout = stake
            .checked_mul(effective_odds)
            .ok_or(ArbitrageError::Overflow("payout"))?;

        legs.push(StakeLeg {
            outcome: quote.outcome.clone(),
            bookmaker: quote.bookmaker.clone(),
            odds: quote.odds,
            effective_odds,
            raw_stake,
            stake,
            payout,
        });
    }

    let total_staked: Decimal = legs.iter().map(|l| l.stake).sum();
    let min_payout = legs
        .iter()
        .map(|l| l.payout)
        .min()
        .unwrap_or(Decimal::ZERO);
    let equalized_payout = if settings.show_equalized {
        Some(
            settings
                .bankroll
                .checked_div(implied_sum)
                .ok_or(ArbitrageError::Overflow("equalized payout"))?,
        )
    } else {
        None
    };

    Ok(Some(Opportunity {
        event: best.event.clone(),
        market: best.market,
        line: best.line,
        legs,
        bankroll: settings.bankroll,
        total_staked,
        implied_sum,
        roi_pct: reported_roi(implied_sum),
        min_payout,
        guaranteed_profit: min_payout - total_staked,
        equalized_payout,
        currency: settings.currency.clone(),
        rounding_step: settings.rounding_step,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::filter::BookmakerFilter;
    use crate::odds::{normalize, MockEventBuilder};
    use rust_decimal_macros::dec;

    fn settings() -> EngineSettings {
        EngineSettings::new(dec!(100), "£", dec!(0.05))
    }

    fn two_way(over: Decimal, under: Decimal) -> EligibleBest {
        let feed = MockEventBuilder::new("ev-1", "EPL")
            .teams("Arsenal", "Chelsea")
            .corners_over("Bet365", dec!(9.5), over)
            .corners_under("Coral", dec!(9.5), under)
            .build();
        let snapshots = normalize(&feed);
        BookmakerFilter::allow_all().select(&snapshots[0]).unwrap()
    }

    fn three_way(home: Decimal, draw: Decimal, away: Decimal) -> EligibleBest {
        let feed = MockEventBuilder::new("ev-1", "EPL")
            .h2h("Bet365", home, draw, away)
            .build();
        let snapshots = normalize(&feed);
        BookmakerFilter::allow_all().select(&snapshots[0]).unwrap()
    }

    fn tolerance() -> Decimal {
        dec!(0.000000001)
    }

    #[test]
    fn detect_arbitrage_two_way_scenario() {
        let opp = calculate_opportunity(&two_way(dec!(2.10), dec!(2.05)), &settings())
            .unwrap()
            .unwrap();

        // S = 1/2.10 + 1/2.05 = 0.96400
        assert!((opp.implied_sum - dec!(0.963995)).abs() < dec!(0.000001));
        assert_eq!(opp.roi_pct, dec!(3.73));

        assert_eq!(opp.legs[0].outcome, "Over 9.5");
        assert_eq!(opp.legs[0].stake, dec!(49.40));
        assert_eq!(opp.legs[1].stake, dec!(50.60));
        assert_eq!(opp.legs[0].payout, dec!(103.74));
        assert_eq!(opp.legs[1].payout, dec!(103.73));

        assert_eq!(opp.total_staked, dec!(100.00));
        assert_eq!(opp.min_payout, dec!(103.73));
        assert_eq!(opp.guaranteed_profit, dec!(3.73));

        let equalized = opp.equalized_payout.unwrap();
        assert!((equalized - dec!(103.7349)).abs() < dec!(0.0001));
        assert_eq!(opp.currency, "£");
        assert_eq!(opp.rounding_step, dec!(0.05));
    }

    #[test]
    fn raw_stakes_sum_to_bankroll_with_equal_payouts() {
        let opp = calculate_opportunity(&three_way(dec!(3.2), dec!(3.9), dec!(3.5)), &settings())
            .unwrap()
            .unwrap();

        let raw_total: Decimal = opp.legs.iter().map(|l| l.raw_stake).sum();
        assert!((raw_total - dec!(100)).abs() < tolerance());

        let first = opp.legs[0].raw_stake * opp.legs[0].odds;
        for leg in &opp.legs {
            assert!((leg.raw_stake * leg.odds - first).abs() < tolerance());
        }
        assert!((first - opp.equalized_payout.unwrap()).abs() < tolerance());
    }

    #[test]
    fn rounded_stakes_are_multiples_of_step() {
        let mut settings = settings();
        settings.rounding_step = dec!(0.25);

        let opp = calculate_opportunity(&three_way(dec!(3.2), dec!(3.9), dec!(3.5)), &settings)
            .unwrap()
            .unwrap();

        for leg in &opp.legs {
            assert!((leg.stake % dec!(0.25)).is_zero(), "stake {}", leg.stake);
            assert_eq!(leg.payout, leg.stake * leg.odds);
        }
    }

    #[test]
    fn no_arbitrage_when_sum_reaches_one() {
        assert!(calculate_opportunity(&two_way(dec!(2.0), dec!(2.0)), &settings())
            .unwrap()
            .is_none());
        assert!(calculate_opportunity(&two_way(dec!(1.9), dec!(1.95)), &settings())
            .unwrap()
            .is_none());
    }

    #[test]
    fn incomplete_market_yields_nothing() {
        let feed = MockEventBuilder::new("ev-1", "EPL")
            .quote(MarketType::HeadToHead, None, "Home", "Bet365", dec!(9.0))
            .quote(MarketType::HeadToHead, None, "Away", "Coral", dec!(9.0))
            .build();
        let snapshots = normalize(&feed);
        let best = BookmakerFilter::allow_all().select(&snapshots[0]).unwrap();

        assert_eq!(implied_probability_sum(&best, &settings()).unwrap(), None);
        assert!(calculate_opportunity(&best, &settings()).unwrap().is_none());
    }

    #[test]
    fn invalid_odds_are_an_error() {
        let result = calculate_opportunity(&two_way(dec!(1.0), dec!(50)), &settings());
        assert!(matches!(result, Err(ArbitrageError::InvalidOdds { .. })));
    }

    #[test]
    fn equalized_payout_is_optional() {
        let mut settings = settings();
        settings.show_equalized = false;

        let opp = calculate_opportunity(&two_way(dec!(2.10), dec!(2.05)), &settings)
            .unwrap()
            .unwrap();

        assert_eq!(opp.equalized_payout, None);
    }

    #[test]
    fn commission_reduces_effective_odds() {
        let mut settings = settings();
        settings.commissions = vec![("coral".to_string(), dec!(0.10))];

        // 2.05 * 0.90 = 1.845; 1/2.10 + 1/1.845 > 1
        assert!(calculate_opportunity(&two_way(dec!(2.10), dec!(2.05)), &settings)
            .unwrap()
            .is_none());

        let opp = calculate_opportunity(&two_way(dec!(2.20), dec!(2.30)), &settings)
            .unwrap()
            .unwrap();
        assert_eq!(opp.legs[0].effective_odds, dec!(2.20));
        assert_eq!(opp.legs[1].effective_odds, dec!(2.07));
        assert_eq!(opp.legs[1].payout, opp.legs[1].stake * dec!(2.07));
    }

    #[test]
    fn round_to_step_rounds_half_up() {
        assert_eq!(round_to_step(dec!(49.375), dec!(0.05)), dec!(49.40));
        assert_eq!(round_to_step(dec!(49.3749), dec!(0.05)), dec!(49.35));
        assert_eq!(round_to_step(dec!(0.025), dec!(0.05)), dec!(0.05));
        assert_eq!(round_to_step(dec!(12), dec!(0)), dec!(12));
    }

    #[test]
    fn roi_from_sum_matches_definition() {
        assert_eq!(roi_from_sum(dec!(0.8)), dec!(25));
        assert_eq!(roi_from_sum(dec!(1)), dec!(0));
    }
}
