//! Arbitrage module for detecting and ranking opportunities.
//!
//! This module handles:
//! - Bookmaker eligibility (allow-list, pair requirement)
//! - Implied probability, stake and payout calculations
//! - Per-market detection with failure isolation
//! - ROI thresholds and ordering

pub mod calculator;
pub mod detector;
pub mod filter;
pub mod ranker;

pub use calculator::{calculate_opportunity, round_to_step, EngineSettings, Opportunity, StakeLeg};
pub use detector::{check_market, detect_opportunities, quick_opportunity_check};
pub use filter::{canonical_bookmaker, BookmakerFilter, EligibleBest, PairRequirement};
pub use ranker::{rank_opportunities, RankedOpportunities, RoiThresholds};
