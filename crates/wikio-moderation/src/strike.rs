//! Strike records and the append-only history they form.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModerationError, Result};

/// A Wiki-O account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Outcome of a resolved violation, as recorded against the offender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeKind {
    /// Looked at and dismissed; never counts
    Ignored,
    /// Blocks promotion for the warning window
    Warning,
    /// Counts toward demotion for the strike window
    Accepted,
}

/// A moderation event against a user. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub kind: StrikeKind,
    pub at: DateTime<Utc>,
    /// Who resolved the violation; `None` when the poll closed on its own
    #[serde(default)]
    pub judge: Option<UserId>,
    /// The poll that produced the record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<u64>,
}

impl StrikeRecord {
    pub fn new(kind: StrikeKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            at,
            judge: None,
            violation: None,
        }
    }

    pub fn judged_by(mut self, judge: UserId) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn from_violation(mut self, id: u64) -> Self {
        self.violation = Some(id);
        self
    }
}

/// Chronologically sorted, deduplicated strike records of one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<StrikeRecord>", into = "Vec<StrikeRecord>")]
pub struct StrikeHistory {
    records: Vec<StrikeRecord>,
}

impl StrikeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records that must already be in order.
    pub fn from_records(records: Vec<StrikeRecord>) -> Result<Self> {
        let mut history = Self::new();
        for record in records {
            history.push(record)?;
        }
        Ok(history)
    }

    /// Append a record. Older-than-last and exact duplicates are refused.
    pub fn push(&mut self, record: StrikeRecord) -> Result<()> {
        if let Some(last) = self.records.last() {
            if record.at < last.at {
                return Err(ModerationError::OutOfOrder {
                    at: record.at,
                    last: last.at,
                });
            }
            let mut same_instant = self.records.iter().rev().take_while(|r| r.at == record.at);
            if same_instant.any(|r| *r == record) {
                return Err(ModerationError::Duplicate(record.at));
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[StrikeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of `kind` in `[now - days, now]`.
    pub fn count_within(&self, kind: StrikeKind, now: DateTime<Utc>, days: i64) -> usize {
        let since = now - Duration::days(days);
        self.records
            .iter()
            .filter(|r| r.kind == kind && r.at >= since && r.at <= now)
            .count()
    }

    pub fn accepted_within(&self, now: DateTime<Utc>, days: i64) -> usize {
        self.count_within(StrikeKind::Accepted, now, days)
    }

    pub fn warnings_within(&self, now: DateTime<Utc>, days: i64) -> usize {
        self.count_within(StrikeKind::Warning, now, days)
    }
}

impl TryFrom<Vec<StrikeRecord>> for StrikeHistory {
    type Error = ModerationError;

    fn try_from(records: Vec<StrikeRecord>) -> Result<Self> {
        Self::from_records(records)
    }
}

impl From<StrikeHistory> for Vec<StrikeRecord> {
    fn from(history: StrikeHistory) -> Self {
        history.records
    }
}
