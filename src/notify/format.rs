//! Text rendering of opportunities: Telegram HTML, console table and CSV.

use rust_decimal::{Decimal, RoundingStrategy};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::UtcOffset;

use crate::arbitrage::Opportunity;
use crate::odds::{Competition, MarketType};

/// Heading of every alert message.
pub const ALERT_HEADER: &str = "<b>New ENG arbs found</b> (filters applied)";

/// Body of the `test-notify` message.
pub const TEST_MESSAGE: &str = "✅ Test from ENG Arb Notifier: your Telegram is wired up.";

/// Limits on how many opportunities one alert lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertCaps {
    /// Per competition.
    pub per_competition: usize,
    /// Across the whole message.
    pub total: usize,
}

impl Default for AlertCaps {
    fn default() -> Self {
        Self {
            per_competition: 6,
            total: 12,
        }
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Two fixed decimals, halves away from zero.
fn fixed2(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Currency amount, e.g. `£49.40`.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-{}{}", currency, fixed2(-amount))
    } else {
        format!("{}{}", currency, fixed2(amount))
    }
}

/// Decimal odds with at least two decimals and no trailing zeros beyond.
pub fn format_odds(odds: Decimal) -> String {
    let mut d = odds.normalize();
    if d.scale() < 2 {
        d.rescale(2);
    }
    d.to_string()
}

/// Market label including the line, e.g. `Corners O/U 9.5`.
pub fn market_label(opp: &Opportunity) -> String {
    match (opp.market, opp.line) {
        (MarketType::CornersOverUnder, Some(line)) => format!("{} {}", opp.market, line.normalize()),
        _ => opp.market.to_string(),
    }
}

/// Kickoff in UTC, e.g. `2025-08-16 11:30 UTC`.
pub fn format_kickoff(opp: &Opportunity) -> Option<String> {
    let kickoff = opp.event.commence_time?.to_offset(UtcOffset::UTC);
    kickoff
        .format(format_description!("[year]-[month]-[day] [hour]:[minute] UTC"))
        .ok()
}

/// HTML betslip block for one opportunity.
pub fn betslip_block(opp: &Opportunity) -> String {
    let mut lines = Vec::with_capacity(opp.legs.len() + 3);

    lines.push(format!("<b>{}</b>", escape_html(&opp.event.title())));

    let mut meta = format!("[{}]", escape_html(&market_label(opp)));
    if let Some(kickoff) = format_kickoff(opp) {
        meta.push_str(&format!(" {}", kickoff));
    }
    lines.push(meta);

    for leg in &opp.legs {
        lines.push(format!(
            "• {}: {} @ {} | stake {} → {}",
            escape_html(&leg.outcome),
            format_odds(leg.odds),
            escape_html(&leg.bookmaker),
            format_money(leg.stake, &opp.currency),
            format_money(leg.payout, &opp.currency),
        ));
    }

    lines.push(summary_line(opp, true));
    lines.join("\n")
}

/// Plain-text betslip block for console output.
pub fn plain_block(opp: &Opportunity) -> String {
    let mut lines = Vec::with_capacity(opp.legs.len() + 2);

    let mut head = format!("{} [{}]", opp.event.title(), market_label(opp));
    if !opp.event.competition.is_empty() {
        head = format!("{} | {}", opp.event.competition, head);
    }
    lines.push(head);

    for leg in &opp.legs {
        lines.push(format!(
            "  {}: {} @ {} | stake {} -> {}",
            leg.outcome,
            format_odds(leg.odds),
            leg.bookmaker,
            format_money(leg.stake, &opp.currency),
            format_money(leg.payout, &opp.currency),
        ));
    }

    lines.push(format!("  {}", summary_line(opp, false)));
    lines.join("\n")
}

fn summary_line(opp: &Opportunity, html: bool) -> String {
    let roi = if html {
        format!("<b>{}%</b>", fixed2(opp.roi_pct))
    } else {
        format!("{}%", fixed2(opp.roi_pct))
    };

    let mut line = format!(
        "ROI {} | staked {} | min return {}",
        roi,
        format_money(opp.total_staked, &opp.currency),
        format_money(opp.min_payout, &opp.currency),
    );
    if let Some(eq) = opp.equalized_payout {
        line.push_str(&format!(" | equalized {}", format_money(eq, &opp.currency)));
    }
    line
}

/// Build the alert message for the notify set.
///
/// Opportunities are grouped by competition in configured order; groups for
/// competitions not in `competitions` follow in first-seen order. Within a
/// group the incoming order is kept. Returns `None` for an empty set.
pub fn alert_message(
    opportunities: &[Opportunity],
    competitions: &[Competition],
    caps: AlertCaps,
) -> Option<String> {
    if opportunities.is_empty() {
        return None;
    }

    let mut order: Vec<&str> = competitions.iter().map(|c| c.name.as_str()).collect();
    for opp in opportunities {
        if !order.contains(&opp.event.competition.as_str()) {
            order.push(&opp.event.competition);
        }
    }

    let mut sections = vec![ALERT_HEADER.to_string()];
    let mut shown = 0usize;

    for name in order {
        if shown >= caps.total {
            break;
        }
        let group: Vec<&Opportunity> = opportunities
            .iter()
            .filter(|o| o.event.competition == name)
            .collect();
        if group.is_empty() {
            continue;
        }

        let heading = if name.is_empty() { "Other" } else { name };
        sections.push(format!("<b>{}</b>", escape_html(heading)));

        for opp in group.into_iter().take(caps.per_competition) {
            if shown >= caps.total {
                break;
            }
            sections.push(betslip_block(opp));
            shown += 1;
        }
    }

    let hidden = opportunities.len() - shown;
    if hidden > 0 {
        sections.push(format!("<i>+{} more not shown</i>", hidden));
    }

    Some(sections.join("\n\n"))
}

/// Console table header.
pub fn table_header() -> String {
    format!(
        "{:>7}  {:<14}  {:<40}  {:<16}  {:>10}  {:>10}",
        "ROI%", "Competition", "Event", "Market", "Staked", "Min return"
    )
}

/// Console table row; legs follow on indented lines.
pub fn table_row(opp: &Opportunity) -> String {
    let mut out = format!(
        "{:>7}  {:<14}  {:<40}  {:<16}  {:>10}  {:>10}",
        fixed2(opp.roi_pct),
        truncate(&opp.event.competition, 14),
        truncate(&opp.event.title(), 40),
        market_label(opp),
        format_money(opp.total_staked, &opp.currency),
        format_money(opp.min_payout, &opp.currency),
    );
    for leg in &opp.legs {
        out.push_str(&format!(
            "\n{:>9}{:<14} {:>7} @ {:<20} {:>10}",
            "",
            leg.outcome,
            format_odds(leg.odds),
            truncate(&leg.bookmaker, 20),
            format_money(leg.stake, &opp.currency),
        ));
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(width.saturating_sub(1)).collect();
        s.push('…');
        s
    }
}

/// CSV column names.
pub const CSV_COLUMNS: [&str; 14] = [
    "competition",
    "event_id",
    "event",
    "kickoff",
    "market",
    "line",
    "roi_pct",
    "implied_sum",
    "total_staked",
    "min_payout",
    "guaranteed_profit",
    "equalized_payout",
    "currency",
    "legs",
];

/// CSV header line.
pub fn csv_header() -> String {
    CSV_COLUMNS.join(",")
}

/// One CSV record. Legs are `outcome@odds bookmaker stake` joined by `;`.
pub fn csv_row(opp: &Opportunity) -> String {
    let kickoff = opp
        .event
        .commence_time
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default();
    let legs = opp
        .legs
        .iter()
        .map(|l| format!("{}@{} {} {}", l.outcome, format_odds(l.odds), l.bookmaker, fixed2(l.stake)))
        .collect::<Vec<_>>()
        .join(";");

    let fields = [
        opp.event.competition.clone(),
        opp.event.id.clone(),
        opp.event.title(),
        kickoff,
        opp.market.to_string(),
        opp.line.map(|l| l.normalize().to_string()).unwrap_or_default(),
        fixed2(opp.roi_pct),
        opp.implied_sum.round_dp(6).to_string(),
        fixed2(opp.total_staked),
        fixed2(opp.min_payout),
        fixed2(opp.guaranteed_profit),
        opp.equalized_payout.map(fixed2).unwrap_or_default(),
        opp.currency.clone(),
        legs,
    ];

    fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
