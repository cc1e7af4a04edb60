//! Daily message quota, tiered by subscription level.
//!
//! The counter resets lazily: the first `allow` check after a UTC day
//! transition zeroes it, there is no scheduled job. The tracker performs no
//! I/O; whoever owns the user row persists the mutated state as part of its
//! own transaction. Under concurrent requests for one user the
//! check-then-record pair is best-effort, not exactly-once — serialization is
//! the caller's transaction boundary.

use chrono::{DateTime, NaiveDate, Utc};

/// Subscription tier determining the daily message cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard,
    Elevated,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Elevated => "elevated",
        }
    }
}

/// Resolve the tier a user is entitled to right now.
///
/// An elevated subscription that has lapsed degrades to standard; nothing is
/// written back, the stored expiry just stops counting.
pub fn effective_tier(elevated_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Tier {
    match elevated_until {
        Some(until) if until > now => Tier::Elevated,
        _ => Tier::Standard,
    }
}

/// Per-user quota counters, persisted by the caller's storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaState {
    pub messages_used_today: u32,
    pub last_message_date: Option<NaiveDate>,
}

impl QuotaState {
    /// Whether the user may send another message today.
    ///
    /// Rolls the counter over first if `today` differs from the last recorded
    /// date (including the never-messaged case), then compares against the
    /// tier limit.
    pub fn allow(&mut self, limit: u32, today: NaiveDate) -> bool {
        if self.last_message_date != Some(today) {
            self.messages_used_today = 0;
            self.last_message_date = Some(today);
        }
        self.messages_used_today < limit
    }

    /// Count one generated message against today's quota.
    pub fn record_message(&mut self, today: NaiveDate) {
        if self.last_message_date != Some(today) {
            self.messages_used_today = 0;
        }
        self.messages_used_today += 1;
        self.last_message_date = Some(today);
    }
}
