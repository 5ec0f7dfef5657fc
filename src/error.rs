//! Unified error types for the arbitrage scanner.
//!
//! Missing data (an outcome nobody quotes, a market that fails the bookmaker
//! filters) is never an error here: those paths return `None` or an empty
//! collection. The enums below cover configuration faults, upstream
//! collaborator failures and malformed per-market data.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the arbitrage scanner.
#[derive(Error, Debug)]
pub enum ArbError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Odds provider error.
    #[error("odds error: {0}")]
    Odds(#[from] OddsError),

    /// Notification transport error.
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Per-market arbitrage calculation error.
    #[error("arbitrage error: {0}")]
    Arbitrage(#[from] ArbitrageError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors, raised before any scan runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment could not be deserialized.
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    /// A numeric setting that must be strictly positive is not.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Environment variable name.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },

    /// A setting could not be parsed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Environment variable name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Rapid window start is after its end.
    #[error("rapid window start {start} is after end {end}")]
    InvertedWindow {
        /// Configured start.
        start: String,
        /// Configured end.
        end: String,
    },

    /// Unknown IANA timezone name.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// A setting required by the requested command is missing.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Odds provider (upstream) errors.
#[derive(Error, Debug)]
pub enum OddsError {
    /// Provider returned a non-success status.
    #[error("odds request for {sport_key} failed: HTTP {status}")]
    Status {
        /// Competition sport key.
        sport_key: String,
        /// HTTP status code.
        status: u16,
    },

    /// Failed to parse the provider payload.
    #[error("failed to parse odds payload: {0}")]
    ParseError(String),

    /// Request URL could not be built.
    #[error("invalid odds url: {0}")]
    Url(#[from] url::ParseError),

    /// Provider unreachable (used by mocks and non-HTTP sources).
    #[error("odds source unavailable: {0}")]
    Unavailable(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Notification transport errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transport rejected the message.
    #[error("message rejected: HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Transport unreachable (used by mocks and non-HTTP transports).
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Digest state file could not be read or written.
    #[error("state file error: {0}")]
    State(#[from] std::io::Error),

    /// Notify set could not be serialized for its digest.
    #[error("failed to fingerprint notify set: {0}")]
    Digest(#[from] serde_json::Error),
}

/// Malformed per-market data. The detector logs and skips the market.
#[derive(Error, Debug)]
pub enum ArbitrageError {
    /// Decimal odds must be greater than 1.0.
    #[error("invalid odds {odds} from {bookmaker} on {outcome}")]
    InvalidOdds {
        /// Outcome label.
        outcome: String,
        /// Bookmaker name.
        bookmaker: String,
        /// Offending odds.
        odds: Decimal,
    },

    /// Commission leaves no positive effective odds.
    #[error("commission {rate} for {bookmaker} leaves no effective odds")]
    InvalidCommission {
        /// Bookmaker name.
        bookmaker: String,
        /// Offending rate.
        rate: Decimal,
    },

    /// Decimal arithmetic overflowed.
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ArbError>;
