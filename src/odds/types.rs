//! Odds-related types: market kinds, quotes, events and snapshots.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Home win outcome label for head-to-head markets.
pub const HOME: &str = "Home";
/// Draw outcome label for head-to-head markets.
pub const DRAW: &str = "Draw";
/// Away win outcome label for head-to-head markets.
pub const AWAY: &str = "Away";

/// Ordered outcome labels of one market. Never more than three.
pub type OutcomeLabels = SmallVec<[String; 3]>;

/// Market kinds scanned for arbitrage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// Full-time result, three-way (home / draw / away).
    #[strum(to_string = "1X2", serialize = "h2h", serialize = "head_to_head")]
    HeadToHead,
    /// Total corners over/under a line, two-way.
    #[strum(to_string = "Corners O/U", serialize = "corners", serialize = "corners_ou")]
    CornersOverUnder,
}

impl MarketType {
    /// Provider market key requested for this market type.
    pub fn provider_key(&self) -> &'static str {
        match self {
            MarketType::HeadToHead => "h2h",
            MarketType::CornersOverUnder => "totals",
        }
    }

    /// Canonical ordered outcome labels for this market.
    pub fn outcome_labels(&self, line: Option<Decimal>) -> OutcomeLabels {
        match self {
            MarketType::HeadToHead => smallvec![HOME.to_string(), DRAW.to_string(), AWAY.to_string()],
            MarketType::CornersOverUnder => match line {
                Some(line) => smallvec![format!("Over {}", line), format!("Under {}", line)],
                None => smallvec!["Over".to_string(), "Under".to_string()],
            },
        }
    }

    /// Number of mutually exclusive outcomes.
    pub fn outcome_count(&self) -> usize {
        match self {
            MarketType::HeadToHead => 3,
            MarketType::CornersOverUnder => 2,
        }
    }
}

/// A competition (league or cup) as known to the odds provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    /// Display name (e.g., "EPL").
    pub name: String,
    /// Provider sport key (e.g., "soccer_epl").
    pub sport_key: String,
}

impl Competition {
    /// Create a competition.
    pub fn new(name: impl Into<String>, sport_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sport_key: sport_key.into(),
        }
    }
}

/// English competitions scanned when none are configured.
pub fn default_competitions() -> Vec<Competition> {
    vec![
        Competition::new("EPL", "soccer_epl"),
        Competition::new("Championship", "soccer_efl_championship"),
        Competition::new("League One", "soccer_england_league1"),
        Competition::new("League Two", "soccer_england_league2"),
        Competition::new("FA Cup", "soccer_fa_cup"),
        Competition::new("EFL Cup", "soccer_efl_cup"),
    ]
}

/// Identity of one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Provider event id.
    pub id: String,
    /// Competition display name.
    pub competition: String,
    /// Home team.
    pub home_team: String,
    /// Away team.
    pub away_team: String,
    /// Scheduled kickoff.
    #[serde(with = "time::serde::rfc3339::option")]
    pub commence_time: Option<OffsetDateTime>,
}

impl EventInfo {
    /// Placeholder for quotes whose event metadata was not supplied.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            competition: String::new(),
            home_team: String::new(),
            away_team: String::new(),
            commence_time: None,
        }
    }

    /// "Home vs Away", or the event id when team names are missing.
    pub fn title(&self) -> String {
        if self.home_team.is_empty() && self.away_team.is_empty() {
            self.id.clone()
        } else {
            format!("{} vs {}", self.home_team, self.away_team)
        }
    }
}

/// One bookmaker's decimal price for one outcome of one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsQuote {
    /// Provider event id.
    pub event_id: String,
    /// Market type.
    pub market: MarketType,
    /// Line for over/under markets.
    pub line: Option<Decimal>,
    /// Outcome label (see [`MarketType::outcome_labels`]).
    pub outcome: String,
    /// Bookmaker display name.
    pub bookmaker: String,
    /// Decimal odds.
    pub odds: Decimal,
    /// When the provider last saw this price.
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// Raw provider output for one or more competitions.
#[derive(Debug, Clone, Default)]
pub struct OddsFeed {
    /// Event metadata.
    pub events: Vec<EventInfo>,
    /// Flat quote list.
    pub quotes: Vec<OddsQuote>,
}

impl OddsFeed {
    /// Append another feed.
    pub fn extend(&mut self, other: OddsFeed) {
        self.events.extend(other.events);
        self.quotes.extend(other.quotes);
    }

    /// Whether the feed holds no quotes.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// All quotes for a single market of a single event.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    /// Event identity.
    pub event: EventInfo,
    /// Market type.
    pub market: MarketType,
    /// Over/under line, if any.
    pub line: Option<Decimal>,
    /// Canonical ordered outcome labels.
    pub outcomes: OutcomeLabels,
    /// Quotes per outcome, best price per bookmaker, sorted by bookmaker name.
    /// Outcomes without quotes are absent.
    pub quotes: BTreeMap<String, Vec<OddsQuote>>,
}

impl MarketSnapshot {
    /// Provider event id.
    pub fn event_id(&self) -> &str {
        &self.event.id
    }

    /// Quotes for an outcome (empty when nobody prices it).
    pub fn quotes_for(&self, outcome: &str) -> &[OddsQuote] {
        self.quotes.get(outcome).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether every outcome has at least one quote.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| !self.quotes_for(o).is_empty())
    }
}
