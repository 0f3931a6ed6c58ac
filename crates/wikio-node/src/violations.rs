//! Open and closed violation polls.
//!
//! Closing a poll hands the resulting strike records to the [`UserLedger`],
//! which serializes them per user. The poll is closed on a copy and only
//! stored once the ledger accepted both records, so a failed commit leaves it
//! open for another attempt. The board lock is held across the commit; the
//! ledger never takes it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use wikio_moderation::{
    Closer, ModerationConfig, PermissionTable, Resolution, UserId, Violation, VoteAction,
};

use crate::error::{Error, Result};
use crate::ledger::{LevelChange, UserLedger};

/// A closed poll and what it did to the users involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub resolution: Resolution,
    pub offender_change: Option<LevelChange>,
    pub reporter_change: Option<LevelChange>,
}

pub struct ViolationBoard {
    ledger: Arc<UserLedger>,
    config: ModerationConfig,
    permissions: PermissionTable,
    polls: RwLock<BTreeMap<u64, Violation>>,
}

impl ViolationBoard {
    pub fn new(ledger: Arc<UserLedger>, config: ModerationConfig, permissions: PermissionTable) -> Self {
        Self {
            ledger,
            config,
            permissions,
            polls: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a poll against `offender`.
    pub async fn report(&self, offender: UserId, reporter: UserId, now: DateTime<Utc>) -> Result<Violation> {
        if offender == reporter {
            return Err(Error::InvalidInput("users cannot report themselves".into()));
        }
        // Both must exist.
        self.ledger.level(offender).await?;
        let reporter_level = self.ledger.level(reporter).await?;

        let mut polls = self.polls.write().await;
        let id = polls.keys().next_back().map_or(1, |last| last + 1);
        let violation = Violation::open(id, offender, reporter, reporter_level, now, &self.permissions)?;
        polls.insert(id, violation.clone());
        Ok(violation)
    }

    pub async fn vote(
        &self,
        id: u64,
        voter: UserId,
        action: VoteAction,
        now: DateTime<Utc>,
    ) -> Result<Violation> {
        let level = self.ledger.level(voter).await?;
        let mut polls = self.polls.write().await;
        let violation = polls
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("violation {}", id)))?;
        violation.cast_vote(voter, level, action, now, &self.config, &self.permissions)?;
        Ok(violation.clone())
    }

    pub async fn comment(
        &self,
        id: u64,
        author: UserId,
        comment: String,
        now: DateTime<Utc>,
    ) -> Result<Violation> {
        let level = self.ledger.level(author).await?;
        let mut polls = self.polls.write().await;
        let violation = polls
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("violation {}", id)))?;
        violation.comment(author, level, comment, now, &self.config, &self.permissions)?;
        Ok(violation.clone())
    }

    /// Staff resolution, possibly before the deadline.
    pub async fn close(
        &self,
        id: u64,
        staff: UserId,
        ruling: Option<VoteAction>,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        let level = self.ledger.level(staff).await?;
        let mut polls = self.polls.write().await;
        let violation = polls
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("violation {}", id)))?;
        let closer = Closer::Staff {
            id: staff,
            level,
            ruling,
        };

        let mut closed = violation.clone();
        let resolution = closed.close(now, closer, &self.config, &self.permissions)?;
        let verdict = self.apply(resolution).await?;
        *violation = closed;
        Ok(verdict)
    }

    /// Close every poll whose period is over. Polls whose result cannot be
    /// recorded stay open for the next sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<Verdict> {
        let mut polls = self.polls.write().await;
        let mut verdicts = Vec::new();
        for violation in polls.values_mut() {
            let mut closed = violation.clone();
            let Some(resolution) = closed.close_if_due(now, &self.config, &self.permissions) else {
                continue;
            };
            match self.apply(resolution).await {
                Ok(verdict) => {
                    *violation = closed;
                    verdicts.push(verdict);
                }
                Err(e) => tracing::warn!(violation = violation.id, "failed to apply poll result: {}", e),
            }
        }
        if !verdicts.is_empty() {
            tracing::info!(closed = verdicts.len(), "swept violation polls");
        }
        verdicts
    }

    pub async fn get(&self, id: u64) -> Result<Violation> {
        self.polls
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("violation {}", id)))
    }

    pub async fn list(&self, open_only: bool) -> Vec<Violation> {
        self.polls
            .read()
            .await
            .values()
            .filter(|v| !open_only || !v.is_closed())
            .cloned()
            .collect()
    }

    async fn apply(&self, resolution: Resolution) -> Result<Verdict> {
        let (offender_change, reporter_change) = self.ledger.record_resolution(&resolution).await?;
        Ok(Verdict {
            resolution,
            offender_change,
            reporter_change,
        })
    }
}
