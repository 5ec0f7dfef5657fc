//! Application configuration loaded from environment variables.
//!
//! [`Config`] is the raw environment as read by `envy`. [`Config::resolve`]
//! validates it once and produces the [`Settings`] passed to every
//! component; nothing downstream reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::warn;
use url::Url;

use crate::arbitrage::{canonical_bookmaker, BookmakerFilter, EngineSettings, PairRequirement, RoiThresholds};
use crate::error::ConfigError;
use crate::notify::{AlertCaps, NotificationGate, RapidWindow};
use crate::odds::{default_competitions, Competition, MarketType};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Odds Provider ===
    /// The Odds API key.
    #[serde(default)]
    pub odds_api_key: Option<String>,

    /// Provider base URL.
    #[serde(default = "default_odds_api_url")]
    pub odds_api_url: String,

    /// Comma-separated provider regions.
    #[serde(default = "default_regions")]
    pub regions: String,

    /// `Name=sport_key` pairs; unset scans the default English competitions.
    #[serde(default)]
    pub competitions: Option<String>,

    /// Also scan corners over/under.
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub include_corners: bool,

    /// Provider and transport request timeout.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    // === Staking ===
    /// Amount spread across the outcomes of one opportunity.
    #[serde(default = "default_bankroll")]
    pub bankroll: Decimal,

    /// Display currency symbol.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Stake rounding step.
    #[serde(default = "default_stake_round")]
    pub stake_round: Decimal,

    /// Report the payout of the unrounded split.
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub show_equalized_payout: bool,

    /// Commission per bookmaker, `name=rate` pairs.
    #[serde(default)]
    pub bookmaker_commissions: Option<String>,

    // === Thresholds ===
    /// Minimum ROI percent to display.
    #[serde(default = "default_min_roi")]
    pub min_roi_pct: Decimal,

    /// Minimum ROI percent to notify; empty falls back to `min_roi_pct`.
    #[serde(default)]
    pub min_roi_pct_notify: Option<String>,

    // === Bookmaker Filters ===
    /// Allowed bookmakers in preference order; empty allows all.
    #[serde(default)]
    pub allowed_bookmakers: Option<String>,

    /// Require an anchor + partner pair on two-outcome markets.
    #[serde(default, deserialize_with = "deserialize_opt_flag")]
    pub require_pair: Option<bool>,

    /// Legacy name for `require_pair`.
    #[serde(default, deserialize_with = "deserialize_opt_flag")]
    pub require_betfair_pair: Option<bool>,

    /// Anchor bookmaker of the pair requirement.
    #[serde(default = "default_pair_anchor")]
    pub pair_anchor: String,

    /// Approved partners of the anchor.
    #[serde(default)]
    pub partner_books: Option<String>,

    /// At least one best quote must come from one of these.
    #[serde(default)]
    pub featured_bookmakers: Option<String>,

    // === Schedule ===
    /// IANA timezone used by the notification gate.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Rapid window date, `YYYY-MM-DD`.
    #[serde(default)]
    pub rapid_day: Option<String>,

    /// Rapid window start, `HH:MM[:SS]` or local ISO datetime.
    #[serde(default)]
    pub rapid_window_start: Option<String>,

    /// Rapid window end (exclusive), same formats as the start.
    #[serde(default)]
    pub rapid_window_end: Option<String>,

    /// Legacy name for `rapid_window_start`.
    #[serde(default)]
    pub rapid_window_start_iso: Option<String>,

    /// Legacy name for `rapid_window_end`.
    #[serde(default)]
    pub rapid_window_end_iso: Option<String>,

    // === Notification ===
    /// Telegram bot token.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat id.
    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    /// Alert cap per competition.
    #[serde(default = "default_max_per_competition")]
    pub max_alerts_per_competition: usize,

    /// Alert cap per message.
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,

    /// File holding the digest of the last notified set.
    #[serde(default)]
    pub arb_state_file: Option<PathBuf>,

    // === Observability ===
    /// Prometheus textfile written at the end of a run.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_odds_api_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

fn default_regions() -> String {
    "uk,eu".to_string()
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    25
}

fn default_bankroll() -> Decimal {
    Decimal::new(100, 0) // £100
}

fn default_currency() -> String {
    "£".to_string()
}

fn default_stake_round() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_min_roi() -> Decimal {
    Decimal::new(2, 1) // 0.2%
}

fn default_pair_anchor() -> String {
    "betfair".to_string()
}

/// Partners approved for the pair requirement when none are configured.
pub fn default_partner_books() -> Vec<String> {
    ["bet365", "ladbrokes", "william hill", "boylesports", "coral"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timezone() -> String {
    "Europe/Dublin".to_string()
}

fn default_max_per_competition() -> usize {
    6
}

fn default_max_alerts() -> usize {
    12
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Parse a boolean flag: 1/true/yes/on or 0/false/no/off.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid flag {:?}", raw)))
}

fn deserialize_opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid flag {:?}", raw))),
        None => Ok(None),
    }
}

/// `Some(trimmed)` for a non-blank value.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Split a comma-separated list, dropping blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `key=value` pairs.
fn split_pairs(field: &'static str, value: &str) -> Result<Vec<(String, String)>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => {
                Ok((k.trim().to_string(), v.trim().to_string()))
            }
            _ => Err(ConfigError::Invalid {
                field,
                reason: format!("expected name=value, got {:?}", entry),
            }),
        })
        .collect()
}

/// A rapid window bound: time of day, optionally with a date.
fn parse_window_bound(
    field: &'static str,
    value: &str,
) -> Result<(Option<NaiveDate>, NaiveTime), ConfigError> {
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok((Some(dt.date()), dt.time()));
        }
    }
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(value, format) {
            return Ok((None, t));
        }
    }

    Err(ConfigError::Invalid {
        field,
        reason: format!("expected HH:MM[:SS] or YYYY-MM-DDTHH:MM[:SS], got {:?}", value),
    })
}

/// Resolved odds provider settings.
#[derive(Debug, Clone)]
pub struct OddsSettings {
    /// Provider key; required only by commands that fetch.
    pub api_key: Option<String>,
    /// Provider base URL.
    pub base_url: Url,
    /// Provider regions.
    pub regions: Vec<String>,
    /// Competitions to scan, in display order.
    pub competitions: Vec<Competition>,
    /// Market types to scan.
    pub markets: Vec<MarketType>,
    /// Request timeout.
    pub timeout: Duration,
}

/// Resolved Telegram credentials.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Bot token.
    pub bot_token: String,
    /// Target chat id.
    pub chat_id: String,
}

/// Fully validated settings, built once per invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Odds provider.
    pub odds: OddsSettings,
    /// Stake and payout engine.
    pub engine: EngineSettings,
    /// Bookmaker eligibility.
    pub filter: BookmakerFilter,
    /// ROI thresholds.
    pub thresholds: RoiThresholds,
    /// Notification gate.
    pub gate: NotificationGate,
    /// Alert message caps.
    pub alerts: AlertCaps,
    /// Telegram transport, when configured.
    pub telegram: Option<TelegramSettings>,
    /// Digest file for change-only notifications.
    pub state_file: Option<PathBuf>,
    /// Prometheus textfile path.
    pub metrics_textfile: Option<PathBuf>,
}

impl Settings {
    /// The provider key, or an error for commands that need it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.odds
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingField("ODDS_API_KEY"))
    }

    /// Telegram settings, or an error for commands that need them.
    pub fn require_telegram(&self) -> Result<&TelegramSettings, ConfigError> {
        self.telegram
            .as_ref()
            .ok_or(ConfigError::MissingField("TELEGRAM_BOT_TOKEN"))
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Build configuration from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(envy::from_iter(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())),
        )?)
    }

    /// Whether logs should be emitted as JSON.
    pub fn json_logs(&self) -> bool {
        self.log_format.trim().eq_ignore_ascii_case("json")
    }

    /// Validate and resolve into [`Settings`].
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            odds: self.resolve_odds()?,
            engine: self.resolve_engine()?,
            filter: self.resolve_filter(),
            thresholds: self.resolve_thresholds()?,
            gate: self.resolve_gate()?,
            alerts: self.resolve_alerts()?,
            telegram: self.resolve_telegram()?,
            state_file: self.arb_state_file.clone(),
            metrics_textfile: self.metrics_textfile.clone(),
        })
    }

    fn resolve_odds(&self) -> Result<OddsSettings, ConfigError> {
        let base_url = Url::parse(self.odds_api_url.trim()).map_err(|e| ConfigError::Invalid {
            field: "ODDS_API_URL",
            reason: e.to_string(),
        })?;

        let regions = split_list(&self.regions);
        if regions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "REGIONS",
                reason: "at least one region is required".to_string(),
            });
        }

        let competitions = match non_blank(&self.competitions) {
            Some(raw) => split_pairs("COMPETITIONS", raw)?
                .into_iter()
                .map(|(name, key)| Competition::new(name, key))
                .collect(),
            None => default_competitions(),
        };

        let mut markets = vec![MarketType::HeadToHead];
        if self.include_corners {
            markets.push(MarketType::CornersOverUnder);
        }

        Ok(OddsSettings {
            api_key: non_blank(&self.odds_api_key).map(str::to_string),
            base_url,
            regions,
            competitions,
            markets,
            timeout: Duration::from_secs(self.http_timeout_secs),
        })
    }

    fn resolve_engine(&self) -> Result<EngineSettings, ConfigError> {
        if self.bankroll <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                field: "BANKROLL",
                value: self.bankroll,
            });
        }
        if self.stake_round <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                field: "STAKE_ROUND",
                value: self.stake_round,
            });
        }

        let mut engine = EngineSettings::new(self.bankroll, self.currency.clone(), self.stake_round);
        engine.show_equalized = self.show_equalized_payout;

        if let Some(raw) = non_blank(&self.bookmaker_commissions) {
            for (book, rate) in split_pairs("BOOKMAKER_COMMISSIONS", raw)? {
                let rate: Decimal = rate.parse().map_err(|_| ConfigError::Invalid {
                    field: "BOOKMAKER_COMMISSIONS",
                    reason: format!("rate for {} is not a number: {:?}", book, rate),
                })?;
                if rate < Decimal::ZERO || rate >= Decimal::ONE {
                    return Err(ConfigError::Invalid {
                        field: "BOOKMAKER_COMMISSIONS",
                        reason: format!("rate for {} must be in [0, 1), got {}", book, rate),
                    });
                }
                engine.commissions.push((canonical_bookmaker(&book), rate));
            }
        }

        Ok(engine)
    }

    fn resolve_filter(&self) -> BookmakerFilter {
        let allowed = non_blank(&self.allowed_bookmakers)
            .map(split_list)
            .unwrap_or_default();
        let mut filter = BookmakerFilter::new(allowed);

        let require_pair = self.require_pair.or(self.require_betfair_pair).unwrap_or(false);
        if require_pair {
            let partners = non_blank(&self.partner_books)
                .map(split_list)
                .unwrap_or_else(default_partner_books);
            filter = filter.with_pair_requirement(PairRequirement::new(&self.pair_anchor, partners));
        }

        if let Some(raw) = non_blank(&self.featured_bookmakers) {
            filter = filter.with_featured(split_list(raw));
        }

        filter
    }

    fn resolve_thresholds(&self) -> Result<RoiThresholds, ConfigError> {
        let notify = match non_blank(&self.min_roi_pct_notify) {
            Some(raw) => Some(raw.parse::<Decimal>().map_err(|_| ConfigError::Invalid {
                field: "MIN_ROI_PCT_NOTIFY",
                reason: format!("not a number: {:?}", raw),
            })?),
            None => None,
        };

        if let Some(notify) = notify {
            if notify < self.min_roi_pct {
                warn!(
                    notify = %notify,
                    scan = %self.min_roi_pct,
                    "MIN_ROI_PCT_NOTIFY is below MIN_ROI_PCT; only displayed opportunities are notified"
                );
            }
        }

        Ok(RoiThresholds::new(self.min_roi_pct, notify))
    }

    fn resolve_gate(&self) -> Result<NotificationGate, ConfigError> {
        let timezone: Tz = self
            .timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))?;

        let start = non_blank(&self.rapid_window_start).or(non_blank(&self.rapid_window_start_iso));
        let end = non_blank(&self.rapid_window_end).or(non_blank(&self.rapid_window_end_iso));

        let window = match (start, end) {
            (None, None) => {
                if non_blank(&self.rapid_day).is_some() {
                    warn!("RAPID_DAY is set without a rapid window; ignoring it");
                }
                None
            }
            (Some(_), None) => return Err(ConfigError::MissingField("RAPID_WINDOW_END")),
            (None, Some(_)) => return Err(ConfigError::MissingField("RAPID_WINDOW_START")),
            (Some(start), Some(end)) => Some(self.resolve_window(start, end)?),
        };

        Ok(NotificationGate::new(timezone, window))
    }

    fn resolve_window(&self, start: &str, end: &str) -> Result<RapidWindow, ConfigError> {
        let (start_date, start_time) = parse_window_bound("RAPID_WINDOW_START", start)?;
        let (end_date, end_time) = parse_window_bound("RAPID_WINDOW_END", end)?;

        let bound_date = match (start_date, end_date) {
            (Some(a), Some(b)) if a != b => {
                return Err(ConfigError::Invalid {
                    field: "RAPID_WINDOW_END",
                    reason: format!("window bounds fall on different dates ({} and {})", a, b),
                })
            }
            (a, b) => a.or(b),
        };

        let explicit_day = match non_blank(&self.rapid_day) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ConfigError::Invalid {
                    field: "RAPID_DAY",
                    reason: format!("expected YYYY-MM-DD, got {:?}", raw),
                }
            })?),
            None => None,
        };

        let day = match (explicit_day, bound_date) {
            (Some(day), Some(date)) if day != date => {
                return Err(ConfigError::Invalid {
                    field: "RAPID_DAY",
                    reason: format!("{} disagrees with window date {}", day, date),
                })
            }
            (Some(day), _) | (None, Some(day)) => day,
            (None, None) => return Err(ConfigError::MissingField("RAPID_DAY")),
        };

        if start_time > end_time {
            return Err(ConfigError::InvertedWindow {
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }
        if start_time == end_time {
            warn!(start = %start_time, "Rapid window is empty and will never be active");
        }

        Ok(RapidWindow::new(day, start_time, end_time))
    }

    fn resolve_alerts(&self) -> Result<AlertCaps, ConfigError> {
        if self.max_alerts_per_competition == 0 {
            return Err(ConfigError::Invalid {
                field: "MAX_ALERTS_PER_COMPETITION",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_alerts == 0 {
            return Err(ConfigError::Invalid {
                field: "MAX_ALERTS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(AlertCaps {
            per_competition: self.max_alerts_per_competition,
            total: self.max_alerts,
        })
    }

    fn resolve_telegram(&self) -> Result<Option<TelegramSettings>, ConfigError> {
        match (non_blank(&self.telegram_bot_token), non_blank(&self.telegram_chat_id)) {
            (Some(token), Some(chat)) => Ok(Some(TelegramSettings {
                bot_token: token.to_string(),
                chat_id: chat.to_string(),
            })),
            (Some(_), None) => Err(ConfigError::MissingField("TELEGRAM_CHAT_ID")),
            (None, Some(_)) => Err(ConfigError::MissingField("TELEGRAM_BOT_TOKEN")),
            (None, None) => Ok(None),
        }
    }
}
