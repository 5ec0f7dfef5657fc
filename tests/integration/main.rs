//! Integration tests for the arbitrage scanner.
//!
//! Most tests drive a full cycle against the in-memory odds source and a
//! recording notifier. The live provider test needs ODDS_API_KEY.
//! Run it with: cargo test --test integration -- --ignored

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use eng_arb::config::{Config, Settings};
use eng_arb::notify::{GateDecision, Notifier, RecordingNotifier};
use eng_arb::odds::{MarketType, MockEventBuilder, MockOddsSource, OddsApiClient};
use eng_arb::runner::{fetch_feed, run_cycle, scan_feed, send_test_message, CycleOptions, NotificationStatus};

const EPL: &str = "soccer_epl";
const CHAMPIONSHIP: &str = "soccer_efl_championship";

fn settings_with(extra: &[(&str, &str)]) -> Settings {
    let base = [
        ("COMPETITIONS", "EPL=soccer_epl,Championship=soccer_efl_championship"),
        ("TELEGRAM_BOT_TOKEN", "token"),
        ("TELEGRAM_CHAT_ID", "-1001"),
    ];
    let mut pairs: Vec<(&str, &str)> = base
        .into_iter()
        .filter(|(key, _)| !extra.iter().any(|(k, _)| k == key))
        .collect();
    pairs.extend_from_slice(extra);
    Config::from_pairs(pairs).unwrap().resolve().unwrap()
}

/// EPL: one corners arb (3.73%) and one 1X2 market without an arb.
/// Championship: one thin 1X2 arb (0.90%).
fn populated_source() -> MockOddsSource {
    let source = MockOddsSource::new();

    let mut epl = MockEventBuilder::new("epl-1", "EPL")
        .teams("Arsenal", "Chelsea")
        .corners_over("Bet365", dec!(9.5), dec!(2.10))
        .corners_under("Coral", dec!(9.5), dec!(2.05))
        .corners_over("Betfair", dec!(9.5), dec!(1.95))
        .build();
    epl.extend(
        MockEventBuilder::new("epl-2", "EPL")
            .teams("Everton", "Fulham")
            .h2h("Bet365", dec!(2.50), dec!(3.20), dec!(2.90))
            .build(),
    );
    source.set_feed(EPL, epl);

    source.set_feed(
        CHAMPIONSHIP,
        MockEventBuilder::new("ch-1", "Championship")
            .teams("Leeds", "Hull")
            .h2h("Bet365", dec!(3.00), dec!(3.40), dec!(2.60))
            .h2h("William Hill", dec!(2.80), dec!(3.30), dec!(2.75))
            .build(),
    );

    source
}

/// 13:30 Dublin time: a half-hour slot.
fn half_hour() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 17, 12, 30, 0).unwrap()
}

/// 13:07 Dublin time: gated outside a rapid window.
fn off_slot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 17, 12, 7, 0).unwrap()
}

#[tokio::test]
async fn full_cycle_sends_grouped_alert() {
    let source = populated_source();
    let notifier = RecordingNotifier::new();
    let settings = settings_with(&[]);

    let report = run_cycle(&source, Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.gate, GateDecision::HalfHour);
    assert_eq!(report.competitions_fetched, 2);
    assert_eq!(report.competitions_failed, 0);
    assert_eq!(report.snapshots, 3);
    assert_eq!(report.notification, NotificationStatus::Sent);

    let ids: Vec<&str> = report.ranked.display.iter().map(|o| o.event_id()).collect();
    assert_eq!(ids, vec!["epl-1", "ch-1"]);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, "-1001");
    let epl = sent[0].text.find("<b>EPL</b>").unwrap();
    let championship = sent[0].text.find("<b>Championship</b>").unwrap();
    assert!(epl < championship);
    assert!(sent[0].text.contains("Over 9.5: 2.10 @ Bet365"));
}

#[tokio::test]
async fn gate_skips_without_fetching() {
    let source = populated_source();
    let notifier = RecordingNotifier::new();

    let report = run_cycle(&source, Some(&notifier), &settings_with(&[]), off_slot(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.gate, GateDecision::Skip);
    assert_eq!(report.notification, NotificationStatus::Gated);
    assert_eq!(source.calls(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn force_bypasses_gate() {
    let source = populated_source();
    let notifier = RecordingNotifier::new();
    let options = CycleOptions {
        force: true,
        dry_run: false,
    };

    let report = run_cycle(&source, Some(&notifier), &settings_with(&[]), off_slot(), options)
        .await
        .unwrap();

    assert!(report.forced);
    assert_eq!(report.notification, NotificationStatus::Sent);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn rapid_window_runs_every_minute() {
    let source = populated_source();
    let notifier = RecordingNotifier::new();
    let settings = settings_with(&[
        ("RAPID_DAY", "2025-08-17"),
        ("RAPID_WINDOW_START", "12:00"),
        ("RAPID_WINDOW_END", "17:00"),
    ]);

    let report = run_cycle(&source, Some(&notifier), &settings, off_slot(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.gate, GateDecision::RapidWindow);
    assert_eq!(report.notification, NotificationStatus::Sent);
}

#[tokio::test]
async fn failing_competition_degrades_to_partial_data() {
    let source = populated_source();
    source.fail_competition(EPL);
    let notifier = RecordingNotifier::new();

    let report = run_cycle(&source, Some(&notifier), &settings_with(&[]), half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.competitions_failed, 1);
    assert_eq!(report.competitions_fetched, 1);
    let ids: Vec<&str> = report.ranked.display.iter().map(|o| o.event_id()).collect();
    assert_eq!(ids, vec!["ch-1"]);
}

#[tokio::test]
async fn unchanged_notify_set_is_sent_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("arb_state");
    let settings = settings_with(&[("ARB_STATE_FILE", state.to_str().unwrap())]);
    let source = populated_source();
    let notifier = RecordingNotifier::new();

    let first = run_cycle(&source, Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();
    let second = run_cycle(&source, Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(first.notification, NotificationStatus::Sent);
    assert_eq!(second.notification, NotificationStatus::Unchanged);
    assert_eq!(notifier.sent().len(), 1);
    assert!(state.exists());
}

#[tokio::test]
async fn failed_send_does_not_record_digest() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("arb_state");
    let settings = settings_with(&[("ARB_STATE_FILE", state.to_str().unwrap())]);
    let source = populated_source();

    let failed = run_cycle(
        &source,
        Some(&RecordingNotifier::failing()),
        &settings,
        half_hour(),
        CycleOptions::default(),
    )
    .await
    .unwrap();

    assert!(matches!(failed.notification, NotificationStatus::Failed(_)));
    assert!(!state.exists());

    let notifier = RecordingNotifier::new();
    let retry = run_cycle(&source, Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(retry.notification, NotificationStatus::Sent);
}

#[tokio::test]
async fn dry_run_builds_message_without_sending() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("arb_state");
    let settings = settings_with(&[("ARB_STATE_FILE", state.to_str().unwrap())]);
    let notifier = RecordingNotifier::new();
    let options = CycleOptions {
        force: false,
        dry_run: true,
    };

    let report = run_cycle(&populated_source(), Some(&notifier), &settings, half_hour(), options)
        .await
        .unwrap();

    assert_eq!(report.notification, NotificationStatus::DryRun);
    assert!(report.message.unwrap().contains("Arsenal vs Chelsea"));
    assert!(notifier.sent().is_empty());
    assert!(!state.exists());
}

#[tokio::test]
async fn notify_threshold_narrows_alert() {
    let notifier = RecordingNotifier::new();
    let settings = settings_with(&[("MIN_ROI_PCT", "0.2"), ("MIN_ROI_PCT_NOTIFY", "2")]);

    let report = run_cycle(&populated_source(), Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.ranked.display.len(), 2);
    assert_eq!(report.ranked.notify.len(), 1);
    let text = &notifier.sent()[0].text;
    assert!(text.contains("Arsenal vs Chelsea"));
    assert!(!text.contains("Leeds vs Hull"));
}

#[tokio::test]
async fn nothing_above_notify_threshold_skips_send() {
    let notifier = RecordingNotifier::new();
    let settings = settings_with(&[("MIN_ROI_PCT_NOTIFY", "10")]);

    let report = run_cycle(&populated_source(), Some(&notifier), &settings, half_hour(), CycleOptions::default())
        .await
        .unwrap();

    assert_eq!(report.ranked.display.len(), 2);
    assert_eq!(report.notification, NotificationStatus::NothingToNotify);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn missing_transport_is_reported() {
    let report = run_cycle(
        &populated_source(),
        None,
        &settings_with(&[]),
        half_hour(),
        CycleOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.notification, NotificationStatus::NoTransport);
    assert!(report.message.is_some());
}

#[tokio::test]
async fn pair_requirement_filters_two_way_markets_only() {
    let source = MockOddsSource::new();
    let mut feed = MockEventBuilder::new("epl-1", "EPL")
        .corners_over("Bet365", dec!(9.5), dec!(2.10))
        .corners_under("Coral", dec!(9.5), dec!(2.05))
        .build();
    feed.extend(
        MockEventBuilder::new("epl-2", "EPL")
            .corners_over("Betfair Exchange", dec!(10.5), dec!(2.10))
            .corners_under("Coral", dec!(10.5), dec!(2.05))
            .build(),
    );
    feed.extend(
        MockEventBuilder::new("epl-3", "EPL")
            .h2h("Bet365", dec!(3.00), dec!(3.40), dec!(2.60))
            .h2h("William Hill", dec!(2.80), dec!(3.30), dec!(2.75))
            .build(),
    );
    source.set_feed(EPL, feed);
    let settings = settings_with(&[("COMPETITIONS", "EPL=soccer_epl"), ("REQUIRE_PAIR", "true")]);

    let fetch = fetch_feed(&source, &settings.odds).await;
    let (_, ranked) = scan_feed(&fetch.feed, &settings);

    let found: Vec<(&str, MarketType)> = ranked.display.iter().map(|o| (o.event_id(), o.market)).collect();
    assert_eq!(
        found,
        vec![
            ("epl-2", MarketType::CornersOverUnder),
            ("epl-3", MarketType::HeadToHead),
        ]
    );
}

#[tokio::test]
async fn allow_list_excludes_other_bookmakers() {
    let settings = settings_with(&[("ALLOWED_BOOKMAKERS", "bet365,william hill")]);
    let fetch = fetch_feed(&populated_source(), &settings.odds).await;

    let (_, ranked) = scan_feed(&fetch.feed, &settings);

    let ids: Vec<&str> = ranked.display.iter().map(|o| o.event_id()).collect();
    assert_eq!(ids, vec!["ch-1"]);
    for opp in &ranked.display {
        for leg in &opp.legs {
            assert!(["Bet365", "William Hill"].contains(&leg.bookmaker.as_str()));
        }
    }
}

#[tokio::test]
async fn identical_input_gives_identical_output() {
    let settings = settings_with(&[]);
    let fetch = fetch_feed(&populated_source(), &settings.odds).await;

    let (_, first) = scan_feed(&fetch.feed, &settings);
    let (_, second) = scan_feed(&fetch.feed, &settings);

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_message_goes_to_channel() {
    let notifier = RecordingNotifier::new();

    send_test_message(&notifier as &dyn Notifier, "-1001").await.unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Telegram is wired up"));
}

/// Fetch live odds from the provider.
#[tokio::test]
#[ignore = "requires ODDS_API_KEY and network access"]
async fn test_live_provider_fetch() {
    dotenvy::dotenv().ok();
    let Ok(config) = Config::load() else {
        println!("Skipping: configuration could not be loaded");
        return;
    };
    let settings = config.resolve().unwrap();
    let Ok(api_key) = settings.require_api_key() else {
        println!("Skipping: ODDS_API_KEY not set");
        return;
    };

    let client = OddsApiClient::new(
        settings.odds.base_url.clone(),
        api_key,
        settings.odds.regions.clone(),
        settings.odds.timeout,
    )
    .unwrap();

    let fetch = fetch_feed(&client, &settings.odds).await;
    let (snapshots, ranked) = scan_feed(&fetch.feed, &settings);

    println!(
        "Fetched {} competitions ({} failed), {} markets, {} arbs",
        fetch.fetched,
        fetch.failed,
        snapshots,
        ranked.display.len()
    );
    assert!(fetch.fetched > 0);
}
