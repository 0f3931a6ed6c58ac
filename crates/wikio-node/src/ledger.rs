//! In-memory user ledger.
//!
//! Each user sits behind their own async mutex. Every change appends to the
//! user's event history and re-derives the level from scratch with
//! [`StateMachine::replay`] while the lock is held, so two strikes resolved at
//! once can never both read the pre-strike level.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use wikio_moderation::{
    BanCounts, Level, LevelState, ModerationEvent, PermissionTable, Resolution, StateMachine,
    StrikeHistory, StrikeRecord, UserId,
};

use crate::error::{Error, Result};

/// Everything the node knows about one user.
#[derive(Debug)]
struct UserRecord {
    id: UserId,
    joined_at: DateTime<Utc>,
    contributions: Vec<DateTime<Utc>>,
    events: Vec<ModerationEvent>,
    state: LevelState,
    /// Bumped on every committed change
    version: u64,
}

impl UserRecord {
    fn new(id: UserId, joined_at: DateTime<Utc>) -> Self {
        Self {
            id,
            joined_at,
            contributions: Vec::new(),
            events: Vec::new(),
            state: LevelState::default(),
            version: 0,
        }
    }

    fn contributions_within(&self, now: DateTime<Utc>, days: i64) -> usize {
        let since = now - Duration::days(days);
        self.contributions
            .iter()
            .filter(|&&at| at >= since && at <= now)
            .count()
    }

    /// Keep only contributions the trailing window can still see from the
    /// newest one.
    fn push_contribution(&mut self, at: DateTime<Utc>, window_days: i64) {
        self.contributions.push(at);
        if let Some(&newest) = self.contributions.iter().max() {
            let since = newest - Duration::days(window_days);
            self.contributions.retain(|&c| c >= since);
        }
    }

    /// Replay the history with `events` appended, without storing anything.
    fn prepare(&self, machine: &StateMachine, events: Vec<ModerationEvent>) -> Result<PendingCommit> {
        let mut history = self.events.clone();
        history.extend(events);
        let state = machine.replay(&history)?;
        Ok(PendingCommit { history, state })
    }

    fn apply(&mut self, pending: PendingCommit) -> LevelChange {
        let change = LevelChange {
            from: self.state.level,
            to: pending.state.level,
        };
        self.events = pending.history;
        self.state = pending.state;
        self.version += 1;
        change
    }

    /// Append events and recompute. Nothing changes if the new history is
    /// rejected.
    fn commit(&mut self, machine: &StateMachine, events: Vec<ModerationEvent>) -> Result<LevelChange> {
        let pending = self.prepare(machine, events)?;
        Ok(self.apply(pending))
    }

    fn snapshot(&self, machine: &StateMachine, now: DateTime<Utc>) -> UserSnapshot {
        let config = machine.config();
        UserSnapshot {
            id: self.id,
            joined_at: self.joined_at,
            level: self.state.level,
            ban_counts: self.state.ban_counts.clone(),
            strikes: self
                .events
                .iter()
                .filter_map(|event| match event {
                    ModerationEvent::Strike(record) => Some(record.clone()),
                    _ => None,
                })
                .collect(),
            recent_contributions: self.contributions_within(now, config.contribution_window_days),
            version: self.version,
        }
    }
}

/// A replayed history waiting to be stored.
#[derive(Debug)]
struct PendingCommit {
    history: Vec<ModerationEvent>,
    state: LevelState,
}

/// Level before and after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub from: Level,
    pub to: Level,
}

impl LevelChange {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// Read-only view of a user, tagged with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: UserId,
    pub joined_at: DateTime<Utc>,
    pub level: Level,
    pub ban_counts: BanCounts,
    pub strikes: Vec<StrikeRecord>,
    /// Contributions inside the contribution window
    pub recent_contributions: usize,
    pub version: u64,
}

/// All users, each behind their own lock.
pub struct UserLedger {
    machine: StateMachine,
    permissions: PermissionTable,
    users: RwLock<HashMap<UserId, Arc<Mutex<UserRecord>>>>,
}

impl UserLedger {
    pub fn new(machine: StateMachine, permissions: PermissionTable) -> Self {
        Self {
            machine,
            permissions,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    async fn user(&self, id: UserId) -> Result<Arc<Mutex<UserRecord>>> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Create a new account at the default level.
    pub async fn register(&self, id: UserId, joined_at: DateTime<Utc>) -> Result<UserSnapshot> {
        let mut users = self.users.write().await;
        if users.contains_key(&id) {
            return Err(Error::InvalidInput(format!("{} already registered", id)));
        }
        let record = UserRecord::new(id, joined_at);
        let snapshot = record.snapshot(&self.machine, joined_at);
        users.insert(id, Arc::new(Mutex::new(record)));
        tracing::info!(%id, "registered user");
        Ok(snapshot)
    }

    pub async fn snapshot(&self, id: UserId, now: DateTime<Utc>) -> Result<UserSnapshot> {
        let user = self.user(id).await?;
        let record = user.lock().await;
        Ok(record.snapshot(&self.machine, now))
    }

    pub async fn level(&self, id: UserId) -> Result<Level> {
        let user = self.user(id).await?;
        let level = user.lock().await.state.level;
        Ok(level)
    }

    /// Count an edit or new content by the user.
    pub async fn record_contribution(&self, id: UserId, at: DateTime<Utc>) -> Result<usize> {
        let user = self.user(id).await?;
        let mut record = user.lock().await;
        let window = self.machine.config().contribution_window_days;
        record.push_contribution(at, window);
        Ok(record.contributions_within(at, window))
    }

    /// Append a resolved strike and recompute the level.
    pub async fn record_strike(&self, id: UserId, strike: StrikeRecord) -> Result<LevelChange> {
        let user = self.user(id).await?;
        let mut record = user.lock().await;
        let kind = strike.kind;
        let change = record.commit(&self.machine, vec![ModerationEvent::Strike(strike)])?;
        tracing::info!(%id, ?kind, from = %change.from, to = %change.to, "recorded strike");
        Ok(change)
    }

    /// Append both sides of a closed poll, or neither.
    ///
    /// Returns the offender's and the reporter's level changes. The two
    /// users are locked in id order.
    pub async fn record_resolution(
        &self,
        resolution: &Resolution,
    ) -> Result<(Option<LevelChange>, Option<LevelChange>)> {
        let (offender_id, reporter_id) = (resolution.offender, resolution.reporter);
        if offender_id == reporter_id {
            return Err(Error::InvalidInput(format!(
                "violation {} has {} on both sides",
                resolution.violation, offender_id
            )));
        }

        let offender = self.user(offender_id).await?;
        let reporter = self.user(reporter_id).await?;
        let (mut offender_record, mut reporter_record) = if offender_id < reporter_id {
            let o = offender.lock().await;
            let r = reporter.lock().await;
            (o, r)
        } else {
            let r = reporter.lock().await;
            let o = offender.lock().await;
            (o, r)
        };

        let offender_pending = match &resolution.offender_strike {
            Some(strike) => Some(
                offender_record.prepare(&self.machine, vec![ModerationEvent::Strike(strike.clone())])?,
            ),
            None => None,
        };
        let reporter_pending = match &resolution.reporter_strike {
            Some(strike) => Some(
                reporter_record.prepare(&self.machine, vec![ModerationEvent::Strike(strike.clone())])?,
            ),
            None => None,
        };

        let offender_change = offender_pending.map(|p| offender_record.apply(p));
        let reporter_change = reporter_pending.map(|p| reporter_record.apply(p));
        tracing::info!(
            violation = resolution.violation,
            offender = %offender_id,
            reporter = %reporter_id,
            ?offender_change,
            ?reporter_change,
            "recorded poll result"
        );
        Ok((offender_change, reporter_change))
    }

    /// Like [`record_strike`](Self::record_strike), but only if nothing was
    /// committed for the user since `expected_version` was read.
    pub async fn record_strike_at_version(
        &self,
        id: UserId,
        strike: StrikeRecord,
        expected_version: u64,
    ) -> Result<LevelChange> {
        let user = self.user(id).await?;
        let mut record = user.lock().await;
        if record.version != expected_version {
            tracing::debug!(%id, expected_version, actual = record.version, "stale strike commit");
            return Err(Error::Stale {
                user: id,
                expected: expected_version,
                actual: record.version,
            });
        }
        record.commit(&self.machine, vec![ModerationEvent::Strike(strike)])
    }

    /// Promotion check. Only reviews that promote are kept in the history.
    pub async fn review(&self, id: UserId, now: DateTime<Utc>) -> Result<LevelChange> {
        let user = self.user(id).await?;
        let mut record = user.lock().await;
        let config = self.machine.config();

        let account_age_days = (now - record.joined_at).num_days();
        let contributions = record.contributions_within(now, config.contribution_window_days);
        let history = StrikeHistory::from_records(
            record
                .events
                .iter()
                .filter_map(|event| match event {
                    ModerationEvent::Strike(strike) => Some(strike.clone()),
                    _ => None,
                })
                .collect(),
        )?;

        let mut trial = record.state.clone();
        let transition = self
            .machine
            .review(&mut trial, &history, account_age_days, contributions, now);
        if !transition.is_change() {
            let level = record.state.level;
            return Ok(LevelChange { from: level, to: level });
        }

        record.commit(
            &self.machine,
            vec![ModerationEvent::Review {
                at: now,
                account_age_days,
                contributions,
            }],
        )
    }

    /// Staff assignment. `by` is `None` for the local operator, who is
    /// always allowed.
    pub async fn assign_level(
        &self,
        id: UserId,
        level: Level,
        by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<LevelChange> {
        if let Some(actor) = by {
            let actor_level = self.level(actor).await?;
            self.permissions.require(
                self.permissions.can_assign_levels(actor_level),
                actor_level,
                "assign levels",
            )?;
        }

        let user = self.user(id).await?;
        let mut record = user.lock().await;

        let mut trial = record.state.clone();
        self.machine.assign(&mut trial, level)?;

        let change = record.commit(&self.machine, vec![ModerationEvent::Assigned { level, at, by }])?;
        tracing::info!(%id, ?by, from = %change.from, to = %change.to, "assigned level");
        Ok(change)
    }

    /// Registered user ids, unordered.
    pub async fn users(&self) -> Vec<UserId> {
        self.users.read().await.keys().copied().collect()
    }
}
