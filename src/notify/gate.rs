//! Schedule gate deciding whether an invocation may notify.
//!
//! The scanner is expected to be invoked every minute. Inside the rapid
//! window every invocation runs; outside it only the :00 and :30 minutes do.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use strum::Display;

/// High-frequency window on one local date, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RapidWindow {
    /// Local date the window applies to.
    pub day: NaiveDate,
    /// Inclusive start.
    pub start: NaiveTime,
    /// Exclusive end.
    pub end: NaiveTime,
}

impl RapidWindow {
    /// Create a rapid window.
    pub fn new(day: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    /// Whether the local wall-clock time falls in the window.
    ///
    /// A window whose start is not before its end never matches; there is
    /// no wrap past midnight.
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        local.date() == self.day && self.start <= local.time() && local.time() < self.end
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GateDecision {
    /// Inside the rapid window.
    RapidWindow,
    /// On a :00 or :30 minute.
    HalfHour,
    /// Neither; this invocation does nothing.
    Skip,
}

impl GateDecision {
    /// Whether the invocation should scan and notify.
    pub fn should_run(&self) -> bool {
        !matches!(self, GateDecision::Skip)
    }
}

/// Gate over a timezone and an optional rapid window.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationGate {
    timezone: Tz,
    window: Option<RapidWindow>,
}

impl NotificationGate {
    /// Create a gate.
    pub fn new(timezone: Tz, window: Option<RapidWindow>) -> Self {
        Self { timezone, window }
    }

    /// Configured timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Configured rapid window.
    pub fn window(&self) -> Option<&RapidWindow> {
        self.window.as_ref()
    }

    /// Convert an instant to the gate's local time.
    pub fn local_time(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Evaluate the gate at `now`. Pure; never reads the clock.
    pub fn decide(&self, now: DateTime<Utc>) -> GateDecision {
        let local = self.local_time(now);

        if self
            .window
            .is_some_and(|w| w.contains(local.naive_local()))
        {
            return GateDecision::RapidWindow;
        }

        match local.minute() {
            0 | 30 => GateDecision::HalfHour,
            _ => GateDecision::Skip,
        }
    }

    /// Shorthand for `decide(now).should_run()`.
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        self.decide(now).should_run()
    }
}
