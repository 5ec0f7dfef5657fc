//! Arbitrage opportunity detection across market snapshots.

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn, Level};

use super::calculator::{calculate_opportunity, implied_probability_sum, reported_roi, EngineSettings, Opportunity};
use super::filter::BookmakerFilter;
use crate::error::ArbitrageError;
use crate::metrics;
use crate::odds::MarketSnapshot;

/// Check one market for an arbitrage opportunity.
///
/// Markets whose reported ROI is below `scan_threshold` are dismissed
/// before stakes are computed.
#[instrument(
    skip(snapshot, filter, settings),
    fields(event_id = %snapshot.event.id, market = %snapshot.market)
)]
pub fn check_market(
    snapshot: &MarketSnapshot,
    filter: &BookmakerFilter,
    settings: &EngineSettings,
    scan_threshold: Decimal,
) -> Result<Option<Opportunity>, ArbitrageError> {
    let Some(best) = filter.select(snapshot) else {
        debug!("No eligible quotes");
        return Ok(None);
    };

    if !best.is_complete() {
        debug!(missing = ?best.missing_outcomes(), "Outcome without eligible quote");
        return Ok(None);
    }

    if !quick_opportunity_check(&best, settings, scan_threshold)? {
        return Ok(None);
    }

    let opportunity = calculate_opportunity(&best, settings)?;

    if let Some(ref opp) = opportunity {
        info!(
            event = %opp.event.title(),
            implied_sum = %opp.implied_sum,
            roi_pct = %opp.roi_pct,
            total_staked = %opp.total_staked,
            min_payout = %opp.min_payout,
            "Arbitrage opportunity detected"
        );
    }

    Ok(opportunity)
}

/// Quick check whether a market clears the threshold (without stakes).
pub fn quick_opportunity_check(
    best: &super::filter::EligibleBest,
    settings: &EngineSettings,
    threshold: Decimal,
) -> Result<bool, ArbitrageError> {
    let Some(sum) = implied_probability_sum(best, settings)? else {
        return Ok(false);
    };

    if sum >= Decimal::ONE {
        if tracing::enabled!(Level::DEBUG) {
            debug!(diagnosis = %MarketDiagnosis::from_best(best, sum), "No arbitrage");
        }
        return Ok(false);
    }

    // Same rounding as the ranker applies to roi_pct.
    let roi = reported_roi(sum);
    if roi < threshold {
        debug!(roi_pct = %roi, threshold = %threshold, "Below scan threshold");
        return Ok(false);
    }

    Ok(true)
}

/// Run the filter and engine over every snapshot.
///
/// A malformed market is logged and skipped; it never aborts the batch.
#[instrument(skip_all, fields(snapshots = snapshots.len()))]
pub fn detect_opportunities(
    snapshots: &[MarketSnapshot],
    filter: &BookmakerFilter,
    settings: &EngineSettings,
    scan_threshold: Decimal,
) -> Vec<Opportunity> {
    let mut found = Vec::new();

    for snapshot in snapshots {
        metrics::inc_snapshots_scanned();
        match check_market(snapshot, filter, settings, scan_threshold) {
            Ok(Some(opp)) => {
                metrics::inc_opportunities_detected();
                found.push(opp);
            }
            Ok(None) => {}
            Err(e) => {
                metrics::inc_markets_failed();
                warn!(
                    event_id = %snapshot.event.id,
                    market = %snapshot.market,
                    error = %e,
                    "Skipping malformed market"
                );
            }
        }
    }

    debug!(found = found.len(), "Detection finished");

    found
}

/// Diagnostic summary of a market's best prices.
#[derive(Debug, Clone)]
pub struct MarketDiagnosis {
    /// Event title.
    pub event: String,
    /// (outcome, bookmaker, odds) per outcome.
    pub best: Vec<(String, String, Decimal)>,
    /// Sum of implied probabilities.
    pub implied_sum: Decimal,
}

impl MarketDiagnosis {
    fn from_best(best: &super::filter::EligibleBest, implied_sum: Decimal) -> Self {
        Self {
            event: best.event.title(),
            best: best
                .quotes()
                .map(|q| (q.outcome.clone(), q.bookmaker.clone(), q.odds))
                .collect(),
            implied_sum,
        }
    }
}

impl std::fmt::Display for MarketDiagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.event)?;
        for (outcome, bookmaker, odds) in &self.best {
            write!(f, " {}={}@{}", outcome, odds, bookmaker)?;
        }
        write!(f, " | sum={}", self.implied_sum.round_dp(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::{normalize, MarketType, MockEventBuilder, OddsFeed};
    use rust_decimal_macros::dec;

    fn settings() -> EngineSettings {
        EngineSettings::new(dec!(100), "£", dec!(0.05))
    }

    fn snapshots(feed: OddsFeed) -> Vec<MarketSnapshot> {
        normalize(&feed)
    }

    #[test]
    fn check_market_finds_opportunity() {
        let snaps = snapshots(
            MockEventBuilder::new("ev-1", "EPL")
                .corners_over("Bet365", dec!(9.5), dec!(2.10))
                .corners_under("Coral", dec!(9.5), dec!(2.05))
                .build(),
        );

        let result =
            check_market(&snaps[0], &BookmakerFilter::allow_all(), &settings(), dec!(0.2)).unwrap();

        assert_eq!(result.unwrap().roi_pct, dec!(3.73));
    }

    #[test]
    fn check_market_respects_scan_threshold() {
        let snaps = snapshots(
            MockEventBuilder::new("ev-1", "EPL")
                .corners_over("Bet365", dec!(9.5), dec!(2.10))
                .corners_under("Coral", dec!(9.5), dec!(2.05))
                .build(),
        );

        let result =
            check_market(&snaps[0], &BookmakerFilter::allow_all(), &settings(), dec!(5)).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn roi_rounding_up_to_threshold_is_kept() {
        // 0.1995% unrounded, reported as 0.20%.
        let snaps = snapshots(
            MockEventBuilder::new("ev-1", "EPL")
                .corners_over("Bet365", dec!(9.5), dec!(2.00399))
                .corners_under("Coral", dec!(9.5), dec!(2.00399))
                .build(),
        );

        let found = detect_opportunities(&snaps, &BookmakerFilter::allow_all(), &settings(), dec!(0.2));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].roi_pct, dec!(0.20));
    }

    #[test]
    fn three_way_missing_outcome_yields_nothing() {
        let snaps = snapshots(
            MockEventBuilder::new("ev-1", "EPL")
                .quote(MarketType::HeadToHead, None, "Home", "Bet365", dec!(10))
                .quote(MarketType::HeadToHead, None, "Away", "Coral", dec!(10))
                .quote(MarketType::HeadToHead, None, "Draw", "Shady Books", dec!(10))
                .build(),
        );
        let filter = BookmakerFilter::new(["bet365", "coral"]);

        let result = check_market(&snaps[0], &filter, &settings(), Decimal::ZERO).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn malformed_market_does_not_abort_batch() {
        let mut feed = MockEventBuilder::new("ev-bad", "EPL")
            .corners_over("Bet365", dec!(9.5), dec!(0.5))
            .corners_under("Coral", dec!(9.5), dec!(2.05))
            .build();
        feed.extend(
            MockEventBuilder::new("ev-good", "EPL")
                .corners_over("Bet365", dec!(9.5), dec!(2.10))
                .corners_under("Coral", dec!(9.5), dec!(2.05))
                .build(),
        );

        let found = detect_opportunities(
            &snapshots(feed),
            &BookmakerFilter::allow_all(),
            &settings(),
            Decimal::ZERO,
        );

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event_id(), "ev-good");
    }

    #[test]
    fn diagnosis_display_lists_best_prices() {
        let snaps = snapshots(
            MockEventBuilder::new("ev-1", "EPL")
                .teams("Arsenal", "Chelsea")
                .corners_over("Bet365", dec!(9.5), dec!(1.9))
                .corners_under("Coral", dec!(9.5), dec!(1.9))
                .build(),
        );
        let best = BookmakerFilter::allow_all().select(&snaps[0]).unwrap();

        let diagnosis = MarketDiagnosis::from_best(&best, dec!(1.0526));

        assert_eq!(
            diagnosis.to_string(),
            "Arsenal vs Chelsea: Over 9.5=1.9@Bet365 Under 9.5=1.9@Coral | sum=1.0526"
        );
    }
}
