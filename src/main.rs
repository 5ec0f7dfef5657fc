//! English football arbitrage scanner entry point.

use std::io::Write;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eng_arb::config::{Config, Settings};
use eng_arb::metrics;
use eng_arb::notify::format::{csv_header, csv_row, plain_block, table_header, table_row};
use eng_arb::notify::{Notifier, TelegramNotifier};
use eng_arb::odds::OddsApiClient;
use eng_arb::runner::{fetch_feed, run_cycle, scan_feed, send_test_message, CycleOptions};

/// English football odds arbitrage scanner.
#[derive(Parser, Debug)]
#[command(name = "eng-arb")]
#[command(about = "Scan English football odds for arbitrage and send Telegram alerts")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one gated scan and notify cycle (default).
    Run {
        /// Ignore the schedule gate.
        #[arg(long)]
        force: bool,

        /// Build the alert without sending it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Scan now and print every opportunity above the scan threshold.
    Scan {
        /// Print CSV instead of a table.
        #[arg(long)]
        csv: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Send a test message to the configured chat.
    TestNotify,

    /// Show the schedule gate decision.
    Gate {
        /// Instant to evaluate (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration first so it can drive logging
    let config = Config::load();
    let json_logs = args.json_logs || config.as_ref().is_ok_and(Config::json_logs);
    let default_level = config
        .as_ref()
        .map(|c| c.rust_log.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("eng_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    if let Some(Command::CheckConfig) = args.command {
        return cmd_check_config(config);
    }

    let config = config.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let settings = config.resolve().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    // Initialize metrics
    let recorder = settings
        .metrics_textfile
        .as_ref()
        .and_then(|_| metrics::install_recorder());

    let result = match args.command {
        Some(Command::Run { force, dry_run }) => cmd_run(&settings, CycleOptions { force, dry_run }).await,
        Some(Command::Scan { csv }) => cmd_scan(&settings, csv).await,
        Some(Command::TestNotify) => cmd_test_notify(&settings).await,
        Some(Command::Gate { at }) => cmd_gate(&settings, at),
        Some(Command::CheckConfig) => Ok(()),
        None => cmd_run(&settings, CycleOptions::default()).await,
    };

    if let (Some(handle), Some(path)) = (recorder.as_ref(), settings.metrics_textfile.as_ref()) {
        if let Err(e) = metrics::write_textfile(handle, path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    result
}

fn odds_client(settings: &Settings) -> anyhow::Result<OddsApiClient> {
    let api_key = settings.require_api_key()?;
    Ok(OddsApiClient::new(
        settings.odds.base_url.clone(),
        api_key,
        settings.odds.regions.clone(),
        settings.odds.timeout,
    )?)
}

fn telegram(settings: &Settings) -> anyhow::Result<Option<TelegramNotifier>> {
    settings
        .telegram
        .as_ref()
        .map(|t| TelegramNotifier::new(&t.bot_token, settings.odds.timeout))
        .transpose()
        .context("Failed to build Telegram client")
}

/// Run one gated scan and notify cycle.
async fn cmd_run(settings: &Settings, options: CycleOptions) -> anyhow::Result<()> {
    let client = odds_client(settings)?;
    let notifier = telegram(settings)?;

    let report = run_cycle(
        &client,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        settings,
        Utc::now(),
        options,
    )
    .await?;

    info!(
        gate = %report.gate,
        forced = report.forced,
        fetched = report.competitions_fetched,
        failed = report.competitions_failed,
        snapshots = report.snapshots,
        display = report.ranked.display.len(),
        notify = report.ranked.notify.len(),
        notification = %report.notification,
        "Cycle finished"
    );

    if options.dry_run {
        if let Some(message) = &report.message {
            println!("{}", message);
        }
    }

    Ok(())
}

/// Scan now, ignoring the gate, and print the display set.
async fn cmd_scan(settings: &Settings, csv: bool) -> anyhow::Result<()> {
    let client = odds_client(settings)?;

    let fetch = fetch_feed(&client, &settings.odds).await;
    let (snapshots, ranked) = scan_feed(&fetch.feed, settings);
    info!(
        fetched = fetch.fetched,
        failed = fetch.failed,
        snapshots,
        "Scan finished"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if csv {
        writeln!(out, "{}", csv_header())?;
        for opp in &ranked.display {
            writeln!(out, "{}", csv_row(opp))?;
        }
        return Ok(());
    }

    if ranked.is_empty() {
        writeln!(out, "No arbs at ROI >= {}%.", settings.thresholds.scan)?;
        return Ok(());
    }

    writeln!(out, "{}", table_header())?;
    for opp in &ranked.display {
        writeln!(out, "{}", table_row(opp))?;
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        for opp in &ranked.notify {
            writeln!(out, "\n{}", plain_block(opp))?;
        }
    }

    Ok(())
}

/// Check configuration validity.
fn cmd_check_config(config: Result<Config, eng_arb::error::ConfigError>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ENG ARB SCANNER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match config {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    let settings = match config.resolve() {
        Ok(s) => {
            println!("OK");
            s
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    };

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!(
        "  Odds API: {} ({})",
        settings.odds.base_url,
        if settings.odds.api_key.is_some() { "key present" } else { "NO KEY" }
    );
    println!("  Regions: {}", settings.odds.regions.join(","));
    for competition in &settings.odds.competitions {
        println!("  Competition: {} ({})", competition.name, competition.sport_key);
    }
    let markets: Vec<String> = settings.odds.markets.iter().map(|m| m.to_string()).collect();
    println!("  Markets: {}", markets.join(", "));
    println!(
        "  Bankroll: {}{} (step {})",
        settings.engine.currency, settings.engine.bankroll, settings.engine.rounding_step
    );
    println!(
        "  ROI thresholds: scan {}% / notify {}%",
        settings.thresholds.scan, settings.thresholds.notify
    );
    if settings.filter.allowed().is_empty() {
        println!("  Bookmakers: all");
    } else {
        println!("  Bookmakers: {}", settings.filter.allowed().join(", "));
    }
    match settings.filter.pair_requirement() {
        Some(pair) => println!(
            "  Pair requirement: {} + one of {}",
            pair.anchor(),
            pair.partners().join(", ")
        ),
        None => println!("  Pair requirement: off"),
    }
    for (book, rate) in &settings.engine.commissions {
        println!("  Commission: {} {}", book, rate);
    }
    println!("  Timezone: {}", settings.gate.timezone());
    match settings.gate.window() {
        Some(w) => println!("  Rapid window: {} {}-{}", w.day, w.start, w.end),
        None => println!("  Rapid window: none"),
    }
    println!(
        "  Telegram: {}",
        if settings.telegram.is_some() { "Configured" } else { "Not configured" }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Send a test message to the configured chat.
async fn cmd_test_notify(settings: &Settings) -> anyhow::Result<()> {
    let chat_id = settings.require_telegram()?.chat_id.clone();
    let notifier = telegram(settings)?.context("Telegram is not configured")?;

    send_test_message(&notifier, &chat_id).await?;
    println!("Test sent.");

    Ok(())
}

/// Show the gate decision for an instant.
fn cmd_gate(settings: &Settings, at: Option<DateTime<Utc>>) -> anyhow::Result<()> {
    let now = at.unwrap_or_else(Utc::now);
    let decision = settings.gate.decide(now);

    println!(
        "{} -> {} ({})",
        settings.gate.local_time(now).format("%Y-%m-%d %H:%M:%S %Z"),
        if decision.should_run() { "run" } else { "skip" },
        decision
    );

    Ok(())
}
