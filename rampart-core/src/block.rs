//! Block record domain types.
//!
//! A [`BlockRecord`] is one block episode for a key. Records are never
//! deleted: they transition Active → Expired (sweeper) or Active →
//! ManuallyRemoved (explicit unblock) and remain as an audit trail. A later
//! re-block of the same key starts a brand-new record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Lifecycle status of a [`BlockRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Active,
    Expired,
    ManuallyRemoved,
}

impl BlockStatus {
    /// Storage representation, matching the persisted status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::Active => "active",
            BlockStatus::Expired => "expired",
            BlockStatus::ManuallyRemoved => "manually_removed",
        }
    }

    pub fn parse(s: &str) -> Option<BlockStatus> {
        match s {
            "active" => Some(BlockStatus::Active),
            "expired" => Some(BlockStatus::Expired),
            "manually_removed" => Some(BlockStatus::ManuallyRemoved),
            _ => None,
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block duration in whole seconds, with a `-1` sentinel meaning permanent.
///
/// The named constants are the vocabulary the policy layer works with;
/// arbitrary positive durations are also accepted via [`from_secs`].
///
/// [`from_secs`]: BlockDuration::from_secs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockDuration(i64);

impl BlockDuration {
    pub const ONE_HOUR: Self = Self(3_600);
    pub const SIX_HOURS: Self = Self(21_600);
    pub const ONE_DAY: Self = Self(86_400);
    pub const SEVEN_DAYS: Self = Self(604_800);
    pub const THIRTY_DAYS: Self = Self(2_592_000);
    pub const PERMANENT: Self = Self(-1);

    /// Construct from a number of seconds.
    ///
    /// Accepts any positive value or the permanent sentinel (`-1`); zero and
    /// other negative values are rejected.
    pub fn from_secs(secs: i64) -> Result<Self, ValidationError> {
        if secs > 0 || secs == Self::PERMANENT.0 {
            Ok(Self(secs))
        } else {
            Err(ValidationError::InvalidDuration(secs))
        }
    }

    pub const fn as_secs(self) -> i64 {
        self.0
    }

    pub const fn is_permanent(self) -> bool {
        self.0 == Self::PERMANENT.0
    }

    /// Expiry timestamp for a block applied at `from`; `None` for permanent.
    pub fn expires_at(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_permanent() {
            None
        } else {
            Some(from + Duration::seconds(self.0))
        }
    }

    /// Human-readable duration label for logs and events.
    pub fn label(self) -> String {
        match self {
            Self::ONE_HOUR => "1 hour".to_string(),
            Self::SIX_HOURS => "6 hours".to_string(),
            Self::ONE_DAY => "24 hours".to_string(),
            Self::SEVEN_DAYS => "7 days".to_string(),
            Self::THIRTY_DAYS => "30 days".to_string(),
            Self::PERMANENT => "permanent".to_string(),
            _ => {
                let hours = (self.0 as f64 / 3_600.0 * 10.0).round() / 10.0;
                let text = if hours.fract() == 0.0 {
                    format!("{}", hours as i64)
                } else {
                    format!("{hours:.1}")
                };
                let unit = if hours == 1.0 { "hour" } else { "hours" };
                format!("{text} {unit}")
            }
        }
    }
}

impl fmt::Display for BlockDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One block episode for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Storage-assigned identifier.
    pub id: i64,
    /// The blocked subject (an IP address).
    pub key: String,
    pub status: BlockStatus,
    /// Creation time, also refreshed on escalation.
    pub blocked_at: DateTime<Utc>,
    pub duration: BlockDuration,
    /// Present iff the duration is not permanent; always blocked_at + duration.
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller-supplied, advisory only.
    pub reason: String,
    /// Origin tag ("login", "comment-spam", "manual", ...), advisory only.
    pub source: String,
    /// Starts at 1; incremented each time the block is re-applied while active.
    pub attempts_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlockRecord {
    /// Whether this block denies access at `now`.
    ///
    /// Evaluates expiry directly instead of trusting `status`, so a record
    /// the sweeper has not yet re-labelled never blocks erroneously.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.status == BlockStatus::Active
            && (self.duration.is_permanent() || self.expires_at.is_some_and(|at| at > now))
    }
}

/// Payload for inserting a fresh block episode.
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub key: String,
    pub duration: BlockDuration,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub source: String,
}

impl NewBlock {
    pub fn new(
        key: &str,
        duration: BlockDuration,
        reason: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.to_string(),
            duration,
            blocked_at: now,
            expires_at: duration.expires_at(now),
            reason: reason.to_string(),
            source: source.to_string(),
        }
    }
}

/// Read projection of an active block, for display to the denied caller.
#[derive(Debug, Clone, Serialize)]
pub struct BlockDetails {
    pub key: String,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub duration: BlockDuration,
    pub reason: String,
    pub source: String,
    pub attempts_count: i64,
    pub is_permanent: bool,
    /// Remaining time rendered at call time, e.g. "23 hours, 59 minutes".
    pub time_remaining: String,
}

impl BlockDetails {
    pub fn from_record(record: &BlockRecord, now: DateTime<Utc>) -> Self {
        Self {
            key: record.key.clone(),
            blocked_at: record.blocked_at,
            expires_at: record.expires_at,
            duration: record.duration,
            reason: record.reason.clone(),
            source: record.source.clone(),
            attempts_count: record.attempts_count,
            is_permanent: record.duration.is_permanent(),
            time_remaining: remaining_label(record, now),
        }
    }
}

/// Render the time left on a block as the largest non-zero units.
///
/// Once days are shown, minutes are omitted: "2 days, 3 hours" rather than
/// "2 days, 3 hours, 14 minutes".
fn remaining_label(record: &BlockRecord, now: DateTime<Utc>) -> String {
    if record.duration.is_permanent() {
        return "Permanent".to_string();
    }
    let Some(expires_at) = record.expires_at else {
        return "Unknown".to_string();
    };

    let remaining = (expires_at - now).num_seconds();
    if remaining <= 0 {
        return "Expired".to_string();
    }

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(unit_count(days, "day"));
    }
    if hours > 0 {
        parts.push(unit_count(hours, "hour"));
    }
    if minutes > 0 && days == 0 {
        parts.push(unit_count(minutes, "minute"));
    }

    if parts.is_empty() {
        "Less than 1 minute".to_string()
    } else {
        parts.join(", ")
    }
}

fn unit_count(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
