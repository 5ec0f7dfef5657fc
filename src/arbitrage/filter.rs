//! Bookmaker eligibility: allow-lists, pair requirement, featured books.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::odds::{EventInfo, MarketSnapshot, MarketType, OddsQuote};
use crate::odds::types::OutcomeLabels;

use rust_decimal::Decimal;

/// Canonical bookmaker name → spellings seen in provider data and user config.
static BOOKMAKER_ALIASES: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("bet365", &["bet365", "bet 365"][..]),
        ("ladbrokes", &["ladbroke", "ladbrokes"][..]),
        ("william hill", &["william hill", "williamhill", "will hill"][..]),
        ("pinnacle", &["pinnacle", "pinny"][..]),
        ("unibet", &["unibet", "uni bet"][..]),
        ("coral", &["coral"][..]),
        ("boylesports", &["boylesports", "boyle sports", "boyle-sports"][..]),
        ("paddy power", &["paddy power", "paddypower"][..]),
        ("sky bet", &["sky bet", "skybet"][..]),
    ]
});

/// Normalize a bookmaker name: trim, lowercase and fix common misspellings.
pub fn canonical_bookmaker(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace("ladbrooks", "ladbrokes")
        .replace("ladbrook", "ladbroke")
        .replace("uni bet", "unibet")
        .replace("will hill", "william hill")
        .replace("boyle sports", "boylesports")
        .replace("boyle-sports", "boylesports")
}

fn alias_group(canonical: &str) -> Option<&'static str> {
    BOOKMAKER_ALIASES
        .iter()
        .find(|(_, variants)| variants.contains(&canonical))
        .map(|(group, _)| *group)
}

/// Whether two bookmaker names refer to the same book.
pub fn same_bookmaker(a: &str, b: &str) -> bool {
    let (a, b) = (canonical_bookmaker(a), canonical_bookmaker(b));
    if a == b {
        return true;
    }
    match (alias_group(&a), alias_group(&b)) {
        (Some(x), Some(y)) => x == y,
        (Some(x), None) => x == b,
        (None, Some(y)) => a == y,
        (None, None) => false,
    }
}

/// Whether a bookmaker name contains any of the given fragments.
fn name_contains_any(name: &str, fragments: &[String]) -> bool {
    let name = canonical_bookmaker(name);
    fragments.iter().any(|f| name.contains(f.as_str()))
}

/// "One anchor book plus one partner book" rule for two-outcome markets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRequirement {
    /// Anchor bookmaker fragment (canonical form).
    anchor: String,
    /// Partner bookmaker fragments (canonical form).
    partners: Vec<String>,
}

impl PairRequirement {
    /// Create a requirement from an anchor and a partner list.
    pub fn new<I, S>(anchor: &str, partners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            anchor: canonical_bookmaker(anchor),
            partners: partners
                .into_iter()
                .map(|p| canonical_bookmaker(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Anchor fragment.
    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Partner fragments.
    pub fn partners(&self) -> &[String] {
        &self.partners
    }

    /// Whether the bookmaker is the anchor.
    pub fn is_anchor(&self, bookmaker: &str) -> bool {
        !self.anchor.is_empty() && canonical_bookmaker(bookmaker).contains(self.anchor.as_str())
    }

    /// Whether the bookmaker is an acceptable partner. The anchor never
    /// partners itself.
    pub fn is_partner(&self, bookmaker: &str) -> bool {
        !self.is_anchor(bookmaker) && name_contains_any(bookmaker, &self.partners)
    }

    /// Whether a set of best quotes holds both an anchor and a partner.
    pub fn is_satisfied_by<'a>(&self, quotes: impl IntoIterator<Item = &'a OddsQuote>) -> bool {
        let (mut anchor, mut partner) = (false, false);
        for quote in quotes {
            anchor |= self.is_anchor(&quote.bookmaker);
            partner |= self.is_partner(&quote.bookmaker);
        }
        anchor && partner
    }
}

/// Best eligible quote per outcome of one market.
#[derive(Debug, Clone)]
pub struct EligibleBest {
    /// Event identity.
    pub event: EventInfo,
    /// Market type.
    pub market: MarketType,
    /// Over/under line, if any.
    pub line: Option<Decimal>,
    /// Canonical ordered outcome labels of the market.
    pub outcomes: OutcomeLabels,
    /// Best eligible quote per outcome. Outcomes without one are absent.
    pub best: BTreeMap<String, OddsQuote>,
}

impl EligibleBest {
    /// Whether every outcome has an eligible quote.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| self.best.contains_key(o))
    }

    /// Outcomes lacking an eligible quote.
    pub fn missing_outcomes(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !self.best.contains_key(*o))
            .map(String::as_str)
            .collect()
    }

    /// Best quotes in market outcome order.
    pub fn quotes(&self) -> impl Iterator<Item = &OddsQuote> {
        self.outcomes.iter().filter_map(|o| self.best.get(o))
    }
}

/// Decides which bookmakers may contribute to an arbitrage.
#[derive(Debug, Clone, Default)]
pub struct BookmakerFilter {
    /// Allowed bookmakers in declared order. Empty allows all.
    allowed: Vec<String>,
    /// Optional pair requirement for two-outcome markets.
    pair: Option<PairRequirement>,
    /// At least one best quote must come from one of these. Empty disables.
    featured: Vec<String>,
}

impl BookmakerFilter {
    /// A filter that allows every bookmaker.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// A filter restricted to the given bookmakers, in preference order.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|b| canonical_bookmaker(b.as_ref()))
                .filter(|b| !b.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// Require an anchor + partner pair on two-outcome markets.
    pub fn with_pair_requirement(mut self, pair: PairRequirement) -> Self {
        self.pair = Some(pair);
        self
    }

    /// Require at least one featured bookmaker among the best quotes.
    pub fn with_featured<I, S>(mut self, featured: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.featured = featured
            .into_iter()
            .map(|b| canonical_bookmaker(b.as_ref()))
            .filter(|b| !b.is_empty())
            .collect();
        self
    }

    /// Allowed bookmakers (canonical, declared order).
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Configured pair requirement.
    pub fn pair_requirement(&self) -> Option<&PairRequirement> {
        self.pair.as_ref()
    }

    /// Position of a bookmaker in the allow-list, `None` when not allowed.
    /// Every bookmaker ranks 0 when the allow-list is empty.
    pub fn allow_rank(&self, bookmaker: &str) -> Option<usize> {
        if self.allowed.is_empty() {
            return Some(0);
        }
        self.allowed.iter().position(|a| same_bookmaker(a, bookmaker))
    }

    /// Whether a bookmaker passes the allow-list.
    pub fn is_allowed(&self, bookmaker: &str) -> bool {
        self.allow_rank(bookmaker).is_some()
    }

    /// Pick the best eligible quote per outcome.
    ///
    /// Returns `None` when no outcome has an eligible quote, when a
    /// two-outcome market fails the pair requirement, or when no featured
    /// bookmaker made it into the best set. A result may still be partial;
    /// see [`EligibleBest::is_complete`].
    pub fn select(&self, snapshot: &MarketSnapshot) -> Option<EligibleBest> {
        let mut best = BTreeMap::new();

        for outcome in &snapshot.outcomes {
            let winner = snapshot
                .quotes_for(outcome)
                .iter()
                .filter_map(|q| self.allow_rank(&q.bookmaker).map(|rank| (rank, q)))
                .max_by(|(rank_a, a), (rank_b, b)| compare_quotes(*rank_a, a, *rank_b, b));

            if let Some((_, quote)) = winner {
                best.insert(outcome.clone(), quote.clone());
            }
        }

        if best.is_empty() {
            return None;
        }

        let eligible = EligibleBest {
            event: snapshot.event.clone(),
            market: snapshot.market,
            line: snapshot.line,
            outcomes: snapshot.outcomes.clone(),
            best,
        };

        if eligible.outcomes.len() == 2 {
            if let Some(pair) = &self.pair {
                if !pair.is_satisfied_by(eligible.quotes()) {
                    debug!(
                        event_id = %eligible.event.id,
                        market = %eligible.market,
                        anchor = %pair.anchor(),
                        "Pair requirement not met"
                    );
                    return None;
                }
            }
        }

        if !self.featured.is_empty()
            && !eligible
                .quotes()
                .any(|q| name_contains_any(&q.bookmaker, &self.featured))
        {
            debug!(
                event_id = %eligible.event.id,
                market = %eligible.market,
                "No featured bookmaker among best quotes"
            );
            return None;
        }

        Some(eligible)
    }
}

/// Ordering used by `max_by`: higher odds win, then the earlier allow-list
/// entry, then the alphabetically first bookmaker.
fn compare_quotes(rank_a: usize, a: &OddsQuote, rank_b: usize, b: &OddsQuote) -> Ordering {
    a.odds
        .cmp(&b.odds)
        .then_with(|| rank_b.cmp(&rank_a))
        .then_with(|| canonical_bookmaker(&b.bookmaker).cmp(&canonical_bookmaker(&a.bookmaker)))
        .then_with(|| b.bookmaker.cmp(&a.bookmaker))
}
