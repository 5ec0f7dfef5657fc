//! One scanner invocation: gate, fetch, scan, rank and notify.

use chrono::{DateTime, Utc};
use strum::Display;
use tracing::{debug, info, instrument, warn};

use crate::arbitrage::{detect_opportunities, rank_opportunities, RankedOpportunities};
use crate::config::{OddsSettings, Settings};
use crate::error::{NotifyError, Result};
use crate::metrics;
use crate::notify::format::{alert_message, TEST_MESSAGE};
use crate::notify::{fingerprint, DigestStore, GateDecision, Notifier};
use crate::odds::{normalize, OddsFeed, OddsSource};

/// Flags for a single cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Ignore the notification gate.
    pub force: bool,
    /// Build the alert but do not send it or touch the digest file.
    pub dry_run: bool,
}

/// Outcome of the odds retrieval stage.
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    /// Merged feed of every competition that answered.
    pub feed: OddsFeed,
    /// Competitions fetched successfully.
    pub fetched: usize,
    /// Competitions that failed and were skipped.
    pub failed: usize,
}

/// What happened to the notify set.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    /// The gate skipped this invocation.
    Gated,
    /// No opportunity cleared the notify threshold.
    NothingToNotify,
    /// Notify set identical to the last one sent.
    Unchanged,
    /// Message built, not sent.
    DryRun,
    /// No transport configured.
    NoTransport,
    /// Message delivered.
    Sent,
    /// Transport failed; the cycle still completed.
    Failed(String),
}

/// Result of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Gate decision at the start of the cycle.
    pub gate: GateDecision,
    /// Whether the gate was bypassed.
    pub forced: bool,
    /// Competitions fetched successfully.
    pub competitions_fetched: usize,
    /// Competitions that failed.
    pub competitions_failed: usize,
    /// Market snapshots evaluated.
    pub snapshots: usize,
    /// Display and notify views.
    pub ranked: RankedOpportunities,
    /// Alert message, when one was built.
    pub message: Option<String>,
    /// Notification outcome.
    pub notification: NotificationStatus,
}

impl CycleReport {
    fn gated(gate: GateDecision) -> Self {
        Self {
            gate,
            forced: false,
            competitions_fetched: 0,
            competitions_failed: 0,
            snapshots: 0,
            ranked: RankedOpportunities::default(),
            message: None,
            notification: NotificationStatus::Gated,
        }
    }
}

/// Fetch every configured competition, one at a time.
///
/// A failing competition is logged and skipped; the others still count.
#[instrument(skip_all, fields(competitions = settings.competitions.len()))]
pub async fn fetch_feed(source: &dyn OddsSource, settings: &OddsSettings) -> FetchSummary {
    let mut summary = FetchSummary::default();

    for competition in &settings.competitions {
        match source.fetch_competition(competition, &settings.markets).await {
            Ok(feed) => {
                debug!(
                    competition = %competition.name,
                    events = feed.events.len(),
                    quotes = feed.quotes.len(),
                    "Competition fetched"
                );
                summary.feed.extend(feed);
                summary.fetched += 1;
            }
            Err(e) => {
                metrics::inc_fetch_failures(&competition.sport_key);
                warn!(competition = %competition.name, error = %e, "Fetch failed; skipping competition");
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Normalize, detect and rank one feed. Pure apart from logging and metrics.
pub fn scan_feed(feed: &OddsFeed, settings: &Settings) -> (usize, RankedOpportunities) {
    let _timer = metrics::timer_scan();

    let snapshots = normalize(feed);
    let candidates = detect_opportunities(
        &snapshots,
        &settings.filter,
        &settings.engine,
        settings.thresholds.scan,
    );
    let ranked = rank_opportunities(candidates, &settings.thresholds);

    (snapshots.len(), ranked)
}

/// Run one invocation.
///
/// Upstream and state file failures degrade the cycle (no data,
/// notification skipped or not de-duplicated) rather than failing it.
#[instrument(skip_all, fields(force = options.force, dry_run = options.dry_run))]
pub async fn run_cycle(
    source: &dyn OddsSource,
    notifier: Option<&dyn Notifier>,
    settings: &Settings,
    now: DateTime<Utc>,
    options: CycleOptions,
) -> Result<CycleReport> {
    let gate = settings.gate.decide(now);
    if !gate.should_run() && !options.force {
        info!(
            local_time = %settings.gate.local_time(now).format("%Y-%m-%d %H:%M"),
            "Skipping this minute per schedule gating"
        );
        return Ok(CycleReport::gated(gate));
    }

    let fetch = fetch_feed(source, &settings.odds).await;
    let (snapshots, ranked) = scan_feed(&fetch.feed, settings);

    info!(
        gate = %gate,
        fetched = fetch.fetched,
        failed = fetch.failed,
        snapshots,
        display = ranked.display.len(),
        notify = ranked.notify.len(),
        "Scan complete"
    );

    let mut report = CycleReport {
        gate,
        forced: options.force && !gate.should_run(),
        competitions_fetched: fetch.fetched,
        competitions_failed: fetch.failed,
        snapshots,
        ranked,
        message: None,
        notification: NotificationStatus::NothingToNotify,
    };

    report.message = alert_message(
        &report.ranked.notify,
        &settings.odds.competitions,
        settings.alerts,
    );
    let Some(message) = report.message.clone() else {
        info!("No arbs meet notify threshold; not sending");
        return Ok(report);
    };

    let store = settings.state_file.as_ref().map(DigestStore::new);
    let digest = match fingerprint(&report.ranked.notify) {
        Ok(digest) => Some(digest),
        Err(e) => {
            warn!(error = %e, "Failed to fingerprint arbs; sending without de-duplication");
            None
        }
    };
    if let (Some(store), Some(digest)) = (&store, &digest) {
        match store.is_unchanged(digest) {
            Ok(true) => {
                info!("Arbs unchanged; not sending");
                report.notification = NotificationStatus::Unchanged;
                return Ok(report);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "Failed to read state file; treating arbs as changed");
            }
        }
    }

    if options.dry_run {
        info!(chars = message.chars().count(), "Dry run; alert not sent");
        report.notification = NotificationStatus::DryRun;
        return Ok(report);
    }

    let (Some(notifier), Some(telegram)) = (notifier, settings.telegram.as_ref()) else {
        warn!("No notification transport configured; alert not sent");
        report.notification = NotificationStatus::NoTransport;
        return Ok(report);
    };

    report.notification = match notifier.send(&telegram.chat_id, &message).await {
        Ok(()) => {
            metrics::inc_notifications_sent();
            if let (Some(store), Some(digest)) = (&store, &digest) {
                if let Err(e) = store.store(digest) {
                    warn!(path = %store.path().display(), error = %e, "Failed to record sent arbs");
                }
            }
            info!(arbs = report.ranked.notify.len(), "Alert sent");
            NotificationStatus::Sent
        }
        Err(e) => {
            metrics::inc_notifications_failed();
            warn!(error = %e, "Alert send failed");
            NotificationStatus::Failed(e.to_string())
        }
    };

    Ok(report)
}

/// Send the fixed test message.
pub async fn send_test_message(notifier: &dyn Notifier, channel: &str) -> std::result::Result<(), NotifyError> {
    notifier.send(channel, TEST_MESSAGE).await?;
    metrics::inc_notifications_sent();
    info!("Test message sent");
    Ok(())
}
