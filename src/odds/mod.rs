//! Odds module for English football markets.
//!
//! This module handles:
//! - Quote, event and snapshot types
//! - Normalizing flat quotes into per-market snapshots
//! - The Odds API client
//! - Mock source for testing

pub mod client;
pub mod mock;
pub mod normalizer;
pub mod types;

use async_trait::async_trait;

use crate::error::OddsError;

pub use client::OddsApiClient;
pub use mock::{MockEventBuilder, MockOddsSource};
pub use normalizer::normalize;
pub use types::{
    default_competitions, Competition, EventInfo, MarketSnapshot, MarketType, OddsFeed, OddsQuote,
};

/// Anything that can supply raw quotes for a competition.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fetch quotes for one competition, restricted to `markets`.
    async fn fetch_competition(
        &self,
        competition: &Competition,
        markets: &[MarketType],
    ) -> Result<OddsFeed, OddsError>;
}
