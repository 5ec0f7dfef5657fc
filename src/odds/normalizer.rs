//! Groups a flat quote list into per-market snapshots.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::types::{EventInfo, MarketSnapshot, MarketType, OddsFeed, OddsQuote};

type MarketKey = (String, MarketType, Option<Decimal>);

/// Build one snapshot per (event, market type, line).
///
/// Each bookmaker keeps only its best price per outcome. Outcomes nobody
/// quotes are left out of the quote map, but the snapshot keeps the market's
/// full outcome list so a partial market can be recognised downstream.
/// Snapshots come out ordered by event id, market type and line.
#[instrument(skip_all, fields(quotes = feed.quotes.len()))]
pub fn normalize(feed: &OddsFeed) -> Vec<MarketSnapshot> {
    let events: HashMap<&str, &EventInfo> =
        feed.events.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut grouped: BTreeMap<MarketKey, Vec<&OddsQuote>> = BTreeMap::new();
    for quote in &feed.quotes {
        grouped
            .entry((quote.event_id.clone(), quote.market, quote.line))
            .or_default()
            .push(quote);
    }

    let mut snapshots = Vec::with_capacity(grouped.len());

    for ((event_id, market, line), quotes) in grouped {
        let outcomes = market.outcome_labels(line);
        let mut per_outcome: BTreeMap<String, BTreeMap<&str, &OddsQuote>> = BTreeMap::new();

        for quote in quotes {
            if !outcomes.iter().any(|o| *o == quote.outcome) {
                debug!(
                    event_id = %event_id,
                    outcome = %quote.outcome,
                    "Dropping quote with unknown outcome label"
                );
                continue;
            }

            let by_book = per_outcome.entry(quote.outcome.clone()).or_default();
            match by_book.get(quote.bookmaker.as_str()) {
                Some(existing) if existing.odds >= quote.odds => {}
                _ => {
                    by_book.insert(quote.bookmaker.as_str(), quote);
                }
            }
        }

        if per_outcome.is_empty() {
            continue;
        }

        let event = events
            .get(event_id.as_str())
            .map(|e| (*e).clone())
            .unwrap_or_else(|| EventInfo::unknown(event_id.clone()));

        let quotes = per_outcome
            .into_iter()
            .map(|(outcome, by_book)| (outcome, by_book.into_values().cloned().collect()))
            .collect();

        snapshots.push(MarketSnapshot {
            event,
            market,
            line,
            outcomes,
            quotes,
        });
    }

    debug!(snapshots = snapshots.len(), "Normalized odds feed");

    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    fn quote(event: &str, market: MarketType, outcome: &str, book: &str, odds: Decimal) -> OddsQuote {
        OddsQuote {
            event_id: event.to_string(),
            market,
            line: None,
            outcome: outcome.to_string(),
            bookmaker: book.to_string(),
            odds,
            observed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn groups_quotes_per_event_and_market() {
        let feed = OddsFeed {
            events: vec![],
            quotes: vec![
                quote("ev-2", MarketType::HeadToHead, "Home", "Bet365", dec!(2.0)),
                quote("ev-1", MarketType::HeadToHead, "Home", "Bet365", dec!(2.1)),
                quote("ev-1", MarketType::HeadToHead, "Away", "Coral", dec!(3.4)),
            ],
        };

        let snapshots = normalize(&feed);

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].event_id(), "ev-1");
        assert_eq!(snapshots[1].event_id(), "ev-2");
        assert_eq!(snapshots[0].quotes_for("Home").len(), 1);
        assert_eq!(snapshots[0].quotes_for("Away").len(), 1);
    }

    #[test]
    fn partial_market_is_kept_without_empty_outcomes() {
        let feed = OddsFeed {
            events: vec![],
            quotes: vec![
                quote("ev-1", MarketType::HeadToHead, "Home", "Bet365", dec!(2.1)),
                quote("ev-1", MarketType::HeadToHead, "Away", "Coral", dec!(3.4)),
            ],
        };

        let snapshots = normalize(&feed);

        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.outcomes.len(), 3);
        assert!(!snapshot.quotes.contains_key("Draw"));
        assert!(!snapshot.is_complete());
        assert_eq!(snapshot.event, EventInfo::unknown("ev-1"));
    }

    #[test]
    fn keeps_best_price_per_bookmaker() {
        let feed = OddsFeed {
            events: vec![],
            quotes: vec![
                quote("ev-1", MarketType::HeadToHead, "Home", "Bet365", dec!(2.0)),
                quote("ev-1", MarketType::HeadToHead, "Home", "Bet365", dec!(2.2)),
                quote("ev-1", MarketType::HeadToHead, "Home", "Bet365", dec!(2.1)),
            ],
        };

        let snapshots = normalize(&feed);
        let home = snapshots[0].quotes_for("Home");

        assert_eq!(home.len(), 1);
        assert_eq!(home[0].odds, dec!(2.2));
    }

    #[test]
    fn corner_lines_become_separate_markets() {
        let mut over_95 = quote("ev-1", MarketType::CornersOverUnder, "Over 9.5", "Bet365", dec!(1.9));
        over_95.line = Some(dec!(9.5));
        let mut under_105 =
            quote("ev-1", MarketType::CornersOverUnder, "Under 10.5", "Coral", dec!(2.3));
        under_105.line = Some(dec!(10.5));

        let feed = OddsFeed {
            events: vec![],
            quotes: vec![over_95, under_105],
        };

        let snapshots = normalize(&feed);

        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| !s.is_complete()));
    }

    #[test]
    fn unknown_outcome_labels_are_dropped() {
        let feed = OddsFeed {
            events: vec![],
            quotes: vec![quote("ev-1", MarketType::HeadToHead, "Arsenal", "Bet365", dec!(2.0))],
        };

        assert!(normalize(&feed).is_empty());
    }
}
