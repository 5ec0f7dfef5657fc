//! The Odds API (v4) client.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::OddsError;
use crate::metrics;

use super::types::{Competition, EventInfo, MarketType, OddsFeed, OddsQuote, AWAY, DRAW, HOME};
use super::OddsSource;

/// Provider market keys that may carry corner totals.
const CORNER_MARKET_KEYS: [&str; 5] = [
    "totals",
    "totals_corners",
    "corners",
    "total_corners",
    "corners_totals",
];

/// HTTP client for the-odds-api.com.
#[derive(Debug, Clone)]
pub struct OddsApiClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// API base URL, ending in `/v4/`.
    base_url: Url,
    /// API key.
    api_key: String,
    /// Bookmaker regions (e.g., "uk", "eu").
    regions: Vec<String>,
}

/// One event in the `/sports/{sport}/odds` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    /// Event id.
    pub id: String,
    /// Kickoff time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub commence_time: Option<OffsetDateTime>,
    /// Home team name.
    #[serde(default)]
    pub home_team: Option<String>,
    /// Away team name.
    #[serde(default)]
    pub away_team: Option<String>,
    /// Bookmakers pricing this event.
    #[serde(default)]
    pub bookmakers: Vec<ApiBookmaker>,
}

/// One bookmaker's markets for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBookmaker {
    /// Provider bookmaker key.
    #[serde(default)]
    pub key: Option<String>,
    /// Human-readable bookmaker name.
    #[serde(default)]
    pub title: Option<String>,
    /// Last time any of this bookmaker's markets changed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    /// Markets offered.
    #[serde(default)]
    pub markets: Vec<ApiMarket>,
}

/// One market of one bookmaker.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMarket {
    /// Market key (e.g., "h2h", "totals").
    pub key: String,
    /// Last time this market changed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    /// Priced outcomes.
    #[serde(default)]
    pub outcomes: Vec<ApiOutcome>,
}

/// A priced outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiOutcome {
    /// Outcome name (team name, "Draw", "Over", "Under").
    #[serde(default)]
    pub name: Option<String>,
    /// Decimal price.
    pub price: Decimal,
    /// Line for totals markets.
    #[serde(default)]
    pub point: Option<Decimal>,
    /// Free-text description some bookmakers attach.
    #[serde(default)]
    pub description: Option<String>,
}

impl OddsApiClient {
    /// Create a client for the given base URL, key and regions.
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        regions: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, OddsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            api_key: api_key.into(),
            regions,
        })
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the odds URL for a competition.
    pub fn odds_url(&self, sport_key: &str, markets: &[MarketType]) -> Result<Url, OddsError> {
        let mut url = self.base_url.join(&format!("sports/{}/odds", sport_key))?;

        let mut market_keys: Vec<&str> = markets.iter().map(|m| m.provider_key()).collect();
        market_keys.dedup();

        url.query_pairs_mut()
            .append_pair("apiKey", &self.api_key)
            .append_pair("regions", &self.regions.join(","))
            .append_pair("markets", &market_keys.join(","))
            .append_pair("oddsFormat", "decimal");

        Ok(url)
    }

    /// Fetch raw events for one competition.
    #[instrument(skip(self, markets), fields(sport_key = %competition.sport_key))]
    pub async fn get_events(
        &self,
        competition: &Competition,
        markets: &[MarketType],
    ) -> Result<Vec<ApiEvent>, OddsError> {
        let url = self.odds_url(&competition.sport_key, markets)?;
        let timer = metrics::timer_odds_fetch();

        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(OddsError::Status {
                sport_key: competition.sport_key.clone(),
                status: response.status().as_u16(),
            });
        }

        let events: Vec<ApiEvent> = response
            .json()
            .await
            .map_err(|e| OddsError::ParseError(format!("Failed to parse odds: {}", e)))?;

        debug!(
            events = events.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Fetched competition odds"
        );

        Ok(events)
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch_competition(
        &self,
        competition: &Competition,
        markets: &[MarketType],
    ) -> Result<OddsFeed, OddsError> {
        let events = self.get_events(competition, markets).await?;
        Ok(convert_events(competition, &events, markets, OffsetDateTime::now_utc()))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Convert provider events into a flat quote feed.
///
/// `fetched_at` stamps quotes whose market and bookmaker carry no
/// `last_update`.
pub fn convert_events(
    competition: &Competition,
    events: &[ApiEvent],
    markets: &[MarketType],
    fetched_at: OffsetDateTime,
) -> OddsFeed {
    let want_h2h = markets.contains(&MarketType::HeadToHead);
    let want_corners = markets.contains(&MarketType::CornersOverUnder);
    let mut feed = OddsFeed::default();

    for event in events {
        let info = EventInfo {
            id: event.id.clone(),
            competition: competition.name.clone(),
            home_team: event.home_team.clone().unwrap_or_default(),
            away_team: event.away_team.clone().unwrap_or_default(),
            commence_time: event.commence_time,
        };

        for bookmaker in &event.bookmakers {
            let Some(book_name) = bookmaker.title.as_ref().or(bookmaker.key.as_ref()) else {
                continue;
            };

            for market in &bookmaker.markets {
                let observed_at = market
                    .last_update
                    .or(bookmaker.last_update)
                    .unwrap_or(fetched_at);

                let (market_type, labelled) = if market.key == "h2h" {
                    if !want_h2h {
                        continue;
                    }
                    (MarketType::HeadToHead, label_h2h(&info, &market.outcomes))
                } else if is_corners_market(market) {
                    if !want_corners {
                        continue;
                    }
                    (MarketType::CornersOverUnder, label_corners(&market.outcomes))
                } else {
                    continue;
                };

                for (outcome, line, price) in labelled {
                    feed.quotes.push(OddsQuote {
                        event_id: info.id.clone(),
                        market: market_type,
                        line,
                        outcome,
                        bookmaker: book_name.clone(),
                        odds: price,
                        observed_at,
                    });
                }
            }
        }

        feed.events.push(info);
    }

    if feed.quotes.is_empty() && !events.is_empty() {
        warn!(
            competition = %competition.name,
            events = events.len(),
            "Provider returned events without usable quotes"
        );
    }

    feed
}

fn is_corners_market(market: &ApiMarket) -> bool {
    if !CORNER_MARKET_KEYS.contains(&market.key.as_str()) {
        return false;
    }
    market.key.contains("corner")
        || market.outcomes.iter().any(|o| {
            o.description
                .as_deref()
                .map(|d| d.to_lowercase().contains("corner"))
                .unwrap_or(false)
        })
}

/// Map team-name outcomes to Home / Draw / Away.
fn label_h2h(event: &EventInfo, outcomes: &[ApiOutcome]) -> Vec<(String, Option<Decimal>, Decimal)> {
    let home = event.home_team.to_lowercase();
    let away = event.away_team.to_lowercase();

    outcomes
        .iter()
        .filter_map(|o| {
            let name = o.name.as_deref()?.to_lowercase();
            let label = if name.contains("draw") {
                DRAW
            } else if !home.is_empty() && name.contains(&home) {
                HOME
            } else if !away.is_empty() && name.contains(&away) {
                AWAY
            } else {
                return None;
            };
            Some((label.to_string(), None, o.price))
        })
        .collect()
}

/// Map over/under outcomes to "Over 9.5" / "Under 9.5" style labels.
fn label_corners(outcomes: &[ApiOutcome]) -> Vec<(String, Option<Decimal>, Decimal)> {
    outcomes
        .iter()
        .filter_map(|o| {
            let name = o.name.as_deref()?.trim().to_lowercase();
            let side = match name.as_str() {
                "over" => "Over",
                "under" => "Under",
                _ => return None,
            };
            let label = match o.point {
                Some(point) => format!("{} {}", side, point),
                None => side.to_string(),
            };
            Some((label, o.point, o.price))
        })
        .collect()
}
