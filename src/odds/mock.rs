//! Mock odds source for unit and integration testing.
//!
//! This module provides an in-memory [`OddsSource`] and a builder for
//! fixtures so tests can drive the scanner without network requests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::OddsError;

use super::types::{Competition, EventInfo, MarketType, OddsFeed, OddsQuote, AWAY, DRAW, HOME};
use super::OddsSource;

/// Configuration for mock source behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether every fetch fails.
    pub fail_all: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// In-memory odds source keyed by sport key.
#[derive(Debug, Clone, Default)]
pub struct MockOddsSource {
    /// Mock configuration.
    config: MockConfig,
    /// Feeds by sport key.
    feeds: Arc<Mutex<HashMap<String, OddsFeed>>>,
    /// Sport keys whose fetch fails.
    failing: Arc<Mutex<HashSet<String>>>,
    /// Number of fetch calls made.
    calls: Arc<AtomicUsize>,
}

impl MockOddsSource {
    /// Create a new mock source with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock source with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the feed returned for a sport key.
    pub fn set_feed(&self, sport_key: impl Into<String>, feed: OddsFeed) {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.insert(sport_key.into(), feed);
    }

    /// Make fetches for a sport key fail.
    pub fn fail_competition(&self, sport_key: impl Into<String>) {
        let mut failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
        failing.insert(sport_key.into());
    }

    /// Number of fetch calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OddsSource for MockOddsSource {
    async fn fetch_competition(
        &self,
        competition: &Competition,
        markets: &[MarketType],
    ) -> Result<OddsFeed, OddsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&competition.sport_key);
        if self.config.fail_all || failing {
            return Err(OddsError::Unavailable(format!(
                "Mock failure for {}",
                competition.sport_key
            )));
        }

        let feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        let mut feed = feeds.get(&competition.sport_key).cloned().unwrap_or_default();
        feed.quotes.retain(|q| markets.contains(&q.market));

        Ok(feed)
    }
}

/// Builder for one event's quotes.
pub struct MockEventBuilder {
    event: EventInfo,
    quotes: Vec<OddsQuote>,
}

impl MockEventBuilder {
    /// Create a new builder for the given event id and competition.
    pub fn new(event_id: impl Into<String>, competition: impl Into<String>) -> Self {
        let mut event = EventInfo::unknown(event_id);
        event.competition = competition.into();
        Self {
            event,
            quotes: Vec::new(),
        }
    }

    /// Set team names.
    pub fn teams(mut self, home: impl Into<String>, away: impl Into<String>) -> Self {
        self.event.home_team = home.into();
        self.event.away_team = away.into();
        self
    }

    /// Set kickoff time.
    pub fn kickoff(mut self, at: OffsetDateTime) -> Self {
        self.event.commence_time = Some(at);
        self
    }

    /// Add a single quote.
    pub fn quote(
        mut self,
        market: MarketType,
        line: Option<Decimal>,
        outcome: impl Into<String>,
        bookmaker: impl Into<String>,
        odds: Decimal,
    ) -> Self {
        self.quotes.push(OddsQuote {
            event_id: self.event.id.clone(),
            market,
            line,
            outcome: outcome.into(),
            bookmaker: bookmaker.into(),
            odds,
            observed_at: OffsetDateTime::UNIX_EPOCH,
        });
        self
    }

    /// Add a full 1X2 price set from one bookmaker.
    pub fn h2h(self, bookmaker: &str, home: Decimal, draw: Decimal, away: Decimal) -> Self {
        self.quote(MarketType::HeadToHead, None, HOME, bookmaker, home)
            .quote(MarketType::HeadToHead, None, DRAW, bookmaker, draw)
            .quote(MarketType::HeadToHead, None, AWAY, bookmaker, away)
    }

    /// Add an over price on a corners line.
    pub fn corners_over(self, bookmaker: &str, line: Decimal, odds: Decimal) -> Self {
        self.quote(
            MarketType::CornersOverUnder,
            Some(line),
            format!("Over {}", line),
            bookmaker,
            odds,
        )
    }

    /// Add an under price on a corners line.
    pub fn corners_under(self, bookmaker: &str, line: Decimal, odds: Decimal) -> Self {
        self.quote(
            MarketType::CornersOverUnder,
            Some(line),
            format!("Under {}", line),
            bookmaker,
            odds,
        )
    }

    /// Build a feed holding this event.
    pub fn build(self) -> OddsFeed {
        OddsFeed {
            events: vec![self.event],
            quotes: self.quotes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn epl() -> Competition {
        Competition::new("EPL", "soccer_epl")
    }

    #[tokio::test]
    async fn mock_source_returns_configured_feed() {
        let source = MockOddsSource::new();
        source.set_feed(
            "soccer_epl",
            MockEventBuilder::new("ev-1", "EPL")
                .teams("Arsenal", "Chelsea")
                .h2h("Bet365", dec!(2.1), dec!(3.4), dec!(3.6))
                .build(),
        );

        let feed = source
            .fetch_competition(&epl(), &[MarketType::HeadToHead])
            .await
            .unwrap();

        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.quotes.len(), 3);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn mock_source_filters_unrequested_markets() {
        let source = MockOddsSource::new();
        source.set_feed(
            "soccer_epl",
            MockEventBuilder::new("ev-1", "EPL")
                .h2h("Bet365", dec!(2.1), dec!(3.4), dec!(3.6))
                .corners_over("Coral", dec!(9.5), dec!(1.9))
                .build(),
        );

        let feed = source
            .fetch_competition(&epl(), &[MarketType::CornersOverUnder])
            .await
            .unwrap();

        assert_eq!(feed.quotes.len(), 1);
        assert_eq!(feed.quotes[0].outcome, "Over 9.5");
    }

    #[tokio::test]
    async fn mock_source_failure_modes() {
        let source = MockOddsSource::with_config(MockConfig {
            fail_all: true,
            ..Default::default()
        });
        assert!(source
            .fetch_competition(&epl(), &[MarketType::HeadToHead])
            .await
            .is_err());

        let source = MockOddsSource::new();
        source.fail_competition("soccer_epl");
        assert!(source
            .fetch_competition(&epl(), &[MarketType::HeadToHead])
            .await
            .is_err());
    }

    #[test]
    fn unknown_competition_yields_empty_feed() {
        let source = MockOddsSource::new();
        let feed = tokio_test::block_on(
            source.fetch_competition(&Competition::new("FA Cup", "soccer_fa_cup"), &[]),
        )
        .unwrap();
        assert!(feed.is_empty());
    }
}
