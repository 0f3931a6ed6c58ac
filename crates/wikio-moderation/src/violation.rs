//! Violation reports and their polls.
//!
//! A report against an offender opens a poll. Eligible users vote, and the
//! poll closes either when staff resolve it or, after the polling period, on
//! its own. Closing turns the winning action into the strike records the
//! caller appends to the users' histories:
//!
//! | Winner | Offender        | Reporter                   |
//! |--------|-----------------|----------------------------|
//! | Ignore | ignored record  | configured penalty, if any |
//! | Warn   | warning         | -                          |
//! | Accept | accepted strike | -                          |
//! | Reject | -               | -                          |

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModerationConfig;
use crate::error::{ModerationError, Result};
use crate::level::Level;
use crate::permissions::{PermissionTable, ReportTarget};
use crate::strike::{StrikeKind, StrikeRecord, UserId};

/// A poll option. Declaration order breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteAction {
    Ignore,
    Warn,
    Accept,
    Reject,
}

impl VoteAction {
    pub const ALL: [VoteAction; 4] = [
        VoteAction::Ignore,
        VoteAction::Warn,
        VoteAction::Accept,
        VoteAction::Reject,
    ];

    /// The record this outcome leaves on the offender.
    pub fn strike_kind(&self) -> Option<StrikeKind> {
        match self {
            VoteAction::Ignore => Some(StrikeKind::Ignored),
            VoteAction::Warn => Some(StrikeKind::Warning),
            VoteAction::Accept => Some(StrikeKind::Accepted),
            VoteAction::Reject => None,
        }
    }
}

impl std::fmt::Display for VoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VoteAction::Ignore => "ignore",
            VoteAction::Warn => "warn",
            VoteAction::Accept => "accept",
            VoteAction::Reject => "reject",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum ViolationStatus {
    Polling,
    Closed(VoteAction),
}

/// Who is closing a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closer {
    /// The periodic sweep; only closes finished polls
    System,
    /// A user with resolve rights, optionally overriding the vote
    Staff {
        id: UserId,
        level: Level,
        ruling: Option<VoteAction>,
    },
}

/// A comment left on a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub author: UserId,
    pub at: DateTime<Utc>,
    pub comment: String,
}

/// What closing a poll produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub violation: u64,
    pub outcome: VoteAction,
    pub offender: UserId,
    pub offender_strike: Option<StrikeRecord>,
    pub reporter: UserId,
    pub reporter_strike: Option<StrikeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub id: u64,
    pub offender: UserId,
    pub reporter: UserId,
    pub opened_at: DateTime<Utc>,
    pub status: ViolationStatus,
    votes: BTreeMap<UserId, VoteAction>,
    #[serde(default)]
    feedback: Vec<Feedback>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_by: Option<UserId>,
}

impl Violation {
    /// File a report. The reporter needs content-report rights.
    pub fn open(
        id: u64,
        offender: UserId,
        reporter: UserId,
        reporter_level: Level,
        now: DateTime<Utc>,
        table: &PermissionTable,
    ) -> Result<Self> {
        table.require(
            table.can_report(reporter_level, ReportTarget::Content),
            reporter_level,
            "report content",
        )?;
        info!(id, %offender, %reporter, "violation reported");
        Ok(Self {
            id,
            offender,
            reporter,
            opened_at: now,
            status: ViolationStatus::Polling,
            votes: BTreeMap::new(),
            feedback: Vec::new(),
            closed_at: None,
            closed_by: None,
        })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, ViolationStatus::Closed(_))
    }

    /// Last second of the final polling day.
    pub fn poll_deadline(&self, config: &ModerationConfig) -> DateTime<Utc> {
        let last_day = self.opened_at.date_naive() + Duration::days(config.poll_days);
        let next_midnight = (last_day + Duration::days(1)).and_time(NaiveTime::default());
        Utc.from_utc_datetime(&next_midnight) - Duration::seconds(1)
    }

    pub fn poll_is_done(&self, now: DateTime<Utc>, config: &ModerationConfig) -> bool {
        self.is_closed() || now > self.poll_deadline(config)
    }

    pub fn votes(&self) -> impl Iterator<Item = (UserId, VoteAction)> + '_ {
        self.votes.iter().map(|(&voter, &action)| (voter, action))
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    /// Vote count per action, in tie-break order.
    pub fn tally(&self) -> [(VoteAction, usize); 4] {
        VoteAction::ALL.map(|action| (action, self.votes.values().filter(|&&v| v == action).count()))
    }

    /// Most votes wins; ties go to the earlier action.
    pub fn winner(&self) -> VoteAction {
        let mut best = (VoteAction::Ignore, 0);
        for (action, count) in self.tally() {
            if count > best.1 {
                best = (action, count);
            }
        }
        best.0
    }

    /// Record or replace `voter`'s vote.
    pub fn cast_vote(
        &mut self,
        voter: UserId,
        voter_level: Level,
        action: VoteAction,
        now: DateTime<Utc>,
        config: &ModerationConfig,
        table: &PermissionTable,
    ) -> Result<()> {
        if self.poll_is_done(now, config) {
            return Err(ModerationError::ViolationClosed(self.id));
        }
        let is_offender = voter == self.offender;
        table.require(
            table.can_vote(voter_level, is_offender, true),
            voter_level,
            "vote on this violation",
        )?;
        self.votes.insert(voter, action);
        Ok(())
    }

    pub fn comment(
        &mut self,
        author: UserId,
        author_level: Level,
        comment: impl Into<String>,
        now: DateTime<Utc>,
        config: &ModerationConfig,
        table: &PermissionTable,
    ) -> Result<()> {
        let open = !self.poll_is_done(now, config);
        table.require(
            table.can_comment(author_level, open),
            author_level,
            "comment on this violation",
        )?;
        self.feedback.push(Feedback {
            author,
            at: now,
            comment: comment.into(),
        });
        Ok(())
    }

    /// Close the poll and produce the records to append.
    pub fn close(
        &mut self,
        now: DateTime<Utc>,
        closer: Closer,
        config: &ModerationConfig,
        table: &PermissionTable,
    ) -> Result<Resolution> {
        if self.is_closed() {
            return Err(ModerationError::ViolationClosed(self.id));
        }

        let (judge, outcome) = match closer {
            Closer::System => {
                let deadline = self.poll_deadline(config);
                if now <= deadline {
                    return Err(ModerationError::PollRunning {
                        id: self.id,
                        deadline,
                    });
                }
                (None, self.winner())
            }
            Closer::Staff { id, level, ruling } => {
                table.require(table.can_resolve(level), level, "resolve violations")?;
                (Some(id), ruling.unwrap_or_else(|| self.winner()))
            }
        };

        self.status = ViolationStatus::Closed(outcome);
        self.closed_at = Some(now);
        self.closed_by = judge;

        let id = self.id;
        let record = |kind: StrikeKind| StrikeRecord {
            kind,
            at: now,
            judge,
            violation: Some(id),
        };
        let offender_strike = outcome.strike_kind().map(record);
        let reporter_strike = match outcome {
            VoteAction::Ignore => config.reporter_penalty.map(record),
            _ => None,
        };

        info!(
            id = self.id,
            %outcome,
            offender = %self.offender,
            judge = ?judge,
            "violation closed"
        );

        Ok(Resolution {
            violation: self.id,
            outcome,
            offender: self.offender,
            offender_strike,
            reporter: self.reporter,
            reporter_strike,
        })
    }

    /// Close on behalf of the system if the polling period is over.
    pub fn close_if_due(
        &mut self,
        now: DateTime<Utc>,
        config: &ModerationConfig,
        table: &PermissionTable,
    ) -> Option<Resolution> {
        if self.is_closed() || now <= self.poll_deadline(config) {
            return None;
        }
        self.close(now, Closer::System, config, table).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn open_violation() -> Violation {
        Violation::open(
            7,
            UserId(1),
            UserId(2),
            Level::NEW_USER,
            at(2024, 5, 1, 15, 30, 0),
            &PermissionTable::default(),
        )
        .unwrap()
    }

    fn vote(v: &mut Violation, voter: u64, action: VoteAction) {
        v.cast_vote(
            UserId(voter),
            Level::MODERATOR,
            action,
            at(2024, 5, 2, 0, 0, 0),
            &ModerationConfig::default(),
            &PermissionTable::default(),
        )
        .unwrap();
    }

    #[test]
    fn deadline_is_end_of_tenth_day() {
        let v = open_violation();
        let config = ModerationConfig::default();
        assert_eq!(v.poll_deadline(&config), at(2024, 5, 11, 23, 59, 59));
        assert!(!v.poll_is_done(at(2024, 5, 11, 23, 59, 59), &config));
        assert!(v.poll_is_done(at(2024, 5, 12, 0, 0, 0), &config));
    }

    #[test]
    fn restricted_users_cannot_report() {
        let err = Violation::open(
            1,
            UserId(1),
            UserId(2),
            Level::RESTRICTED,
            at(2024, 5, 1, 0, 0, 0),
            &PermissionTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::NotPermitted { .. }));
    }

    #[test]
    fn winner_breaks_ties_in_action_order() {
        let mut v = open_violation();
        assert_eq!(v.winner(), VoteAction::Ignore);

        vote(&mut v, 10, VoteAction::Reject);
        vote(&mut v, 11, VoteAction::Accept);
        assert_eq!(v.winner(), VoteAction::Accept);

        vote(&mut v, 12, VoteAction::Reject);
        assert_eq!(v.winner(), VoteAction::Reject);

        // Re-voting replaces.
        vote(&mut v, 12, VoteAction::Warn);
        assert_eq!(v.winner(), VoteAction::Warn);
        assert_eq!(v.votes().count(), 3);
    }

    #[test]
    fn offender_and_low_levels_cannot_vote() {
        let mut v = open_violation();
        let config = ModerationConfig::default();
        let table = PermissionTable::default();
        let now = at(2024, 5, 2, 0, 0, 0);

        assert!(v
            .cast_vote(UserId(1), Level::MODERATOR, VoteAction::Reject, now, &config, &table)
            .is_err());
        assert!(v
            .cast_vote(UserId(5), Level::TRUSTED, VoteAction::Accept, now, &config, &table)
            .is_err());
        assert!(v
            .cast_vote(UserId(1), Level::STAFF, VoteAction::Reject, now, &config, &table)
            .is_ok());
    }

    #[test]
    fn system_close_waits_for_deadline() {
        let mut v = open_violation();
        let config = ModerationConfig::default();
        let table = PermissionTable::default();
        vote(&mut v, 10, VoteAction::Accept);

        let early = v.close(at(2024, 5, 5, 0, 0, 0), Closer::System, &config, &table);
        assert!(matches!(early, Err(ModerationError::PollRunning { id: 7, .. })));
        assert!(v.close_if_due(at(2024, 5, 11, 12, 0, 0), &config, &table).is_none());

        let resolution = v
            .close_if_due(at(2024, 5, 12, 1, 0, 0), &config, &table)
            .unwrap();
        assert_eq!(resolution.outcome, VoteAction::Accept);
        let strike = resolution.offender_strike.unwrap();
        assert_eq!(strike.kind, StrikeKind::Accepted);
        assert_eq!(strike.judge, None);
        assert_eq!(strike.violation, Some(7));
        assert!(v.is_closed());
    }

    #[test]
    fn staff_close_early_and_may_overrule() {
        let mut v = open_violation();
        let config = ModerationConfig::default();
        let table = PermissionTable::default();
        vote(&mut v, 10, VoteAction::Accept);

        let closer = Closer::Staff {
            id: UserId(99),
            level: Level::STAFF,
            ruling: Some(VoteAction::Reject),
        };
        let resolution = v
            .close(at(2024, 5, 3, 0, 0, 0), closer, &config, &table)
            .unwrap();
        assert_eq!(resolution.outcome, VoteAction::Reject);
        assert_eq!(resolution.offender_strike, None);
        assert_eq!(v.closed_by, Some(UserId(99)));

        let again = v.close(at(2024, 5, 4, 0, 0, 0), closer, &config, &table);
        assert_eq!(again, Err(ModerationError::ViolationClosed(7)));
    }

    #[test]
    fn moderators_cannot_resolve() {
        let mut v = open_violation();
        let closer = Closer::Staff {
            id: UserId(50),
            level: Level::MODERATOR,
            ruling: None,
        };
        let result = v.close(
            at(2024, 5, 3, 0, 0, 0),
            closer,
            &ModerationConfig::default(),
            &PermissionTable::default(),
        );
        assert!(matches!(result, Err(ModerationError::NotPermitted { .. })));
        assert!(!v.is_closed());
    }

    #[test]
    fn ignored_report_can_penalize_reporter() {
        let mut v = open_violation();
        let config = ModerationConfig {
            reporter_penalty: Some(StrikeKind::Warning),
            ..ModerationConfig::default()
        };
        let resolution = v
            .close(
                at(2024, 6, 1, 0, 0, 0),
                Closer::System,
                &config,
                &PermissionTable::default(),
            )
            .unwrap();
        assert_eq!(resolution.outcome, VoteAction::Ignore);
        assert_eq!(
            resolution.offender_strike.map(|s| s.kind),
            Some(StrikeKind::Ignored)
        );
        assert_eq!(
            resolution.reporter_strike.map(|s| s.kind),
            Some(StrikeKind::Warning)
        );
        assert_eq!(resolution.reporter, UserId(2));
    }

    #[test]
    fn comments_close_with_the_poll_except_for_staff() {
        let mut v = open_violation();
        let config = ModerationConfig::default();
        let table = PermissionTable::default();
        let late = at(2024, 6, 1, 0, 0, 0);

        v.comment(UserId(3), Level::MODERATOR, "looks fine", at(2024, 5, 2, 0, 0, 0), &config, &table)
            .unwrap();
        assert!(v
            .comment(UserId(3), Level::MODERATOR, "late", late, &config, &table)
            .is_err());
        v.comment(UserId(4), Level::STAFF, "closing note", late, &config, &table)
            .unwrap();
        assert_eq!(v.feedback().len(), 2);
    }
}
