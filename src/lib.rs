//! English football odds arbitrage scanner and notifier.
//!
//! Scans bookmaker odds for English football markets (full-time result and
//! total corners over/under), finds sets of outcomes whose best prices
//! guarantee a profit when staked proportionally, and alerts on them under
//! a time-window gated schedule.
//!
//! # Strategy
//!
//! For mutually exclusive outcomes with best decimal odds `o_i`, an
//! arbitrage exists when the implied probabilities sum below one:
//!
//! ```text
//! Over 9.5 @ 2.10 (Bet365):  1/2.10 = 0.4762
//! Under 9.5 @ 2.05 (Coral):  1/2.05 = 0.4878
//! ─────────────────────────────────────────
//! Sum:                               0.9640 < 1 ✅
//! ROI:                     (1/0.9640 - 1) = 3.73%
//! ```
//!
//! Staking `bankroll × (1/o_i) / S` on each outcome returns `bankroll / S`
//! whichever outcome wins.
//!
//! # Modules
//!
//! - [`config`]: Environment loading and resolution into settings
//! - [`error`]: Unified error types
//! - [`odds`]: Odds provider client, quote types and normalization
//! - [`arbitrage`]: Bookmaker filters, staking engine, detection and ranking
//! - [`notify`]: Schedule gate, message formatting and Telegram transport
//! - [`runner`]: One scanner invocation end to end
//! - [`metrics`]: Counters and Prometheus textfile output

pub mod arbitrage;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod odds;
pub mod runner;

pub use config::{Config, Settings};
pub use error::{ArbError, Result};
