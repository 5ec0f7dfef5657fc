//! ROI thresholds, ordering and de-duplication of opportunities.

use std::cmp::Ordering;
use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::calculator::Opportunity;

/// Scan and notify ROI thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiThresholds {
    /// Minimum ROI to display.
    pub scan: Decimal,
    /// Minimum ROI to notify.
    pub notify: Decimal,
}

impl RoiThresholds {
    /// Resolve thresholds; an unset notify threshold falls back to scan.
    pub fn new(scan: Decimal, notify: Option<Decimal>) -> Self {
        Self {
            scan,
            notify: notify.unwrap_or(scan),
        }
    }
}

/// The two views handed to presentation and notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedOpportunities {
    /// ROI >= scan threshold.
    pub display: Vec<Opportunity>,
    /// Display entries with ROI >= notify threshold.
    pub notify: Vec<Opportunity>,
}

impl RankedOpportunities {
    /// Whether nothing qualified for display.
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}

/// Ordering: higher ROI first, then event id, market type and line.
pub fn compare_opportunities(a: &Opportunity, b: &Opportunity) -> Ordering {
    b.roi_pct
        .cmp(&a.roi_pct)
        .then_with(|| a.event.id.cmp(&b.event.id))
        .then_with(|| a.market.cmp(&b.market))
        .then_with(|| a.line.cmp(&b.line))
}

/// Filter by thresholds, sort and keep one opportunity per market.
///
/// The notify view is always a subset of the display view, so a notify
/// threshold below the scan threshold behaves like the scan threshold.
pub fn rank_opportunities(
    candidates: Vec<Opportunity>,
    thresholds: &RoiThresholds,
) -> RankedOpportunities {
    let total = candidates.len();

    let mut display: Vec<Opportunity> = candidates
        .into_iter()
        .filter(|o| o.roi_pct >= thresholds.scan)
        .collect();
    display.sort_by(compare_opportunities);

    let mut seen = HashSet::new();
    display.retain(|o| seen.insert((o.event.id.clone(), o.market, o.line)));

    let notify: Vec<Opportunity> = display
        .iter()
        .filter(|o| o.roi_pct >= thresholds.notify)
        .cloned()
        .collect();

    let shown = display.len();
    let notified = notify.len();
    debug!(
        candidates = total,
        display = shown,
        notify = notified,
        "Ranked opportunities"
    );

    RankedOpportunities { display, notify }
}
