//! The level state machine.
//!
//! # Transitions
//!
//! - **Demotion**: an incoming accepted strike that brings the accepted count
//!   in the strike window to the demotion threshold (itself included). The
//!   count is never reset, so every further accepted strike inside the window
//!   demotes again.
//! - **Promotion**: one rung per review, when the account is old enough, has
//!   enough recent contributions, no warning in the warning window and no
//!   accepted strike in the strike window.
//! - **Assignment**: staff set any level the user is not banned from. The
//!   only way into 0→1 and 3→4.
//!
//! # Bans
//!
//! Each demotion from L bumps the user's counter for L. At the limit, L and
//! every level above it are gone for good.
//!
//! # Recomputation
//!
//! [`StateMachine::replay`] folds a complete event history from the default
//! state. Callers hold the user's lock, read the full history, replay, and
//! store the result; they never patch a level in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ModerationConfig;
use crate::error::{ModerationError, Result};
use crate::level::{BanCounts, Level, LevelState};
use crate::strike::{StrikeHistory, StrikeKind, StrikeRecord, UserId};

/// What an evaluation did to the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Unchanged,
    Promoted { from: Level, to: Level },
    Demoted { from: Level, to: Level, banned: bool },
    Assigned { from: Level, to: Level },
}

impl Transition {
    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}

/// Inputs of one evaluation.
///
/// `history` holds everything already recorded; `incoming` is the strike being
/// resolved right now and is not part of it yet.
#[derive(Debug, Clone)]
pub struct EvaluationInput<'a> {
    pub current: LevelState,
    pub history: &'a StrikeHistory,
    pub incoming: Option<StrikeRecord>,
    pub account_age_days: i64,
    /// Contributions inside the contribution window
    pub contributions: usize,
    pub now: DateTime<Utc>,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub level: Level,
    pub ban_counts: BanCounts,
    pub transition: Transition,
}

/// A recorded fact about a user that can move their level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModerationEvent {
    /// A resolved violation
    Strike(StrikeRecord),
    /// Staff set the level
    Assigned {
        level: Level,
        at: DateTime<Utc>,
        by: Option<UserId>,
    },
    /// Promotion check with the account figures at that time
    Review {
        at: DateTime<Utc>,
        account_age_days: i64,
        contributions: usize,
    },
}

impl ModerationEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ModerationEvent::Strike(record) => record.at,
            ModerationEvent::Assigned { at, .. } => *at,
            ModerationEvent::Review { at, .. } => *at,
        }
    }
}

/// Pure level computation under a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    config: ModerationConfig,
}

impl StateMachine {
    pub fn new(config: ModerationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// React to an incoming strike (if any), then run the promotion check
    /// unless the strike demoted the user.
    pub fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Evaluation> {
        let mut state = input.current;

        let mut transition = match &input.incoming {
            Some(strike) => self.apply_strike(&mut state, input.history, strike)?,
            None => Transition::Unchanged,
        };

        if !transition.is_change() {
            transition = self.review_with(
                &mut state,
                input.history,
                input.incoming.as_ref(),
                input.account_age_days,
                input.contributions,
                input.now,
            );
        }

        Ok(Evaluation {
            level: state.level,
            ban_counts: state.ban_counts,
            transition,
        })
    }

    /// Demote if `strike` is accepted and completes the threshold.
    ///
    /// `history` must not contain `strike` yet, and `strike` may not be older
    /// than its last record.
    pub fn apply_strike(
        &self,
        state: &mut LevelState,
        history: &StrikeHistory,
        strike: &StrikeRecord,
    ) -> Result<Transition> {
        if let Some(last) = history.records().last() {
            if strike.at < last.at {
                return Err(ModerationError::OutOfOrder {
                    at: strike.at,
                    last: last.at,
                });
            }
        }
        if strike.kind != StrikeKind::Accepted {
            return Ok(Transition::Unchanged);
        }
        let count = history.accepted_within(strike.at, self.config.strike_window_days) + 1;
        debug!(count, threshold = self.config.demotion_strikes, "accepted strike");
        if count < self.config.demotion_strikes {
            return Ok(Transition::Unchanged);
        }
        Ok(self.demote(state))
    }

    /// Drop one level, skipping banned levels, and count the demotion.
    pub fn demote(&self, state: &mut LevelState) -> Transition {
        let from = state.level;
        let limit = self.config.ban_after_demotions;

        let Some(below) = from.below() else {
            debug!("demotion at level 0 has no effect");
            return Transition::Unchanged;
        };

        let demotions = state.ban_counts.record_demotion(from);
        let banned = demotions >= limit;
        let to = Level::all()
            .rev()
            .filter(|&level| level <= below)
            .find(|&level| state.ban_counts.allows(level, limit))
            .unwrap_or(Level::RESTRICTED);
        state.level = to;

        info!(%from, %to, demotions, "user demoted");
        if banned {
            info!(level = %from, "user banned from level for life");
        }
        Transition::Demoted { from, to, banned }
    }

    /// Promotion check with no pending strike.
    pub fn review(
        &self,
        state: &mut LevelState,
        history: &StrikeHistory,
        account_age_days: i64,
        contributions: usize,
        now: DateTime<Utc>,
    ) -> Transition {
        self.review_with(state, history, None, account_age_days, contributions, now)
    }

    fn review_with(
        &self,
        state: &mut LevelState,
        history: &StrikeHistory,
        pending: Option<&StrikeRecord>,
        account_age_days: i64,
        contributions: usize,
        now: DateTime<Utc>,
    ) -> Transition {
        let Some(rule) = self.config.promotion_from(state.level) else {
            return Transition::Unchanged;
        };

        let pending_counts = |kind: StrikeKind, days: i64| {
            pending
                .filter(|s| s.kind == kind && s.at <= now && s.at >= now - chrono::Duration::days(days))
                .is_some() as usize
        };
        let warnings = history.warnings_within(now, self.config.warning_window_days)
            + pending_counts(StrikeKind::Warning, self.config.warning_window_days);
        let strikes = history.accepted_within(now, self.config.strike_window_days)
            + pending_counts(StrikeKind::Accepted, self.config.strike_window_days);

        let eligible = account_age_days >= rule.min_account_age_days
            && contributions >= rule.min_contributions
            && warnings == 0
            && strikes == 0;
        if !eligible {
            return Transition::Unchanged;
        }

        if !state
            .ban_counts
            .allows(rule.to, self.config.ban_after_demotions)
        {
            debug!(level = %rule.to, "promotion blocked by lifetime ban");
            return Transition::Unchanged;
        }

        let from = state.level;
        state.level = rule.to;
        info!(%from, to = %rule.to, "user promoted");
        Transition::Promoted { from, to: rule.to }
    }

    /// Staff assignment. Refused for levels the user is banned from.
    pub fn assign(&self, state: &mut LevelState, to: Level) -> Result<Transition> {
        if !state
            .ban_counts
            .allows(to, self.config.ban_after_demotions)
        {
            return Err(ModerationError::LevelBanned(to));
        }
        let from = state.level;
        state.level = to;
        info!(%from, %to, "level assigned");
        Ok(Transition::Assigned { from, to })
    }

    /// Recompute a user's state from the full, chronologically sorted event
    /// history, starting at the default (new user, no bans).
    pub fn replay<'a, I>(&self, events: I) -> Result<LevelState>
    where
        I: IntoIterator<Item = &'a ModerationEvent>,
    {
        let mut state = LevelState::default();
        let mut history = StrikeHistory::new();
        let mut last: Option<DateTime<Utc>> = None;

        for event in events {
            let at = event.at();
            if let Some(last) = last {
                if at < last {
                    return Err(ModerationError::OutOfOrder { at, last });
                }
            }
            last = Some(at);

            match event {
                ModerationEvent::Strike(record) => {
                    self.apply_strike(&mut state, &history, record)?;
                    history.push(record.clone())?;
                }
                ModerationEvent::Assigned { level, by, .. } => {
                    if let Err(e) = self.assign(&mut state, *level) {
                        warn!(?by, "assignment skipped during replay: {}", e);
                    }
                }
                ModerationEvent::Review {
                    at,
                    account_age_days,
                    contributions,
                } => {
                    self.review(&mut state, &history, *account_age_days, *contributions, *at);
                }
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn accepted(n: i64) -> StrikeRecord {
        StrikeRecord::new(StrikeKind::Accepted, day(n))
    }

    fn machine() -> StateMachine {
        StateMachine::default()
    }

    #[test]
    fn third_accepted_strike_demotes_once() {
        let sm = machine();
        let history = StrikeHistory::from_records(vec![accepted(1), accepted(2)]).unwrap();

        let eval = sm.evaluate(EvaluationInput {
            current: LevelState::at(Level::TRUSTED),
            history: &history,
            incoming: Some(accepted(3)),
            account_age_days: 200,
            contributions: 500,
            now: day(3),
        })
        .unwrap();

        assert_eq!(
            eval.transition,
            Transition::Demoted {
                from: Level::TRUSTED,
                to: Level::NEW_USER,
                banned: false
            }
        );
        assert_eq!(eval.level, Level::NEW_USER);
        assert_eq!(eval.ban_counts.demotions_from(Level::TRUSTED), 1);
    }

    #[test]
    fn second_strike_does_not_demote() {
        let sm = machine();
        let history = StrikeHistory::from_records(vec![accepted(1)]).unwrap();
        let mut state = LevelState::at(Level::TRUSTED);
        assert_eq!(
            sm.apply_strike(&mut state, &history, &accepted(2)),
            Ok(Transition::Unchanged)
        );
        assert_eq!(state.level, Level::TRUSTED);
    }

    #[test]
    fn strikes_outside_window_do_not_count() {
        let sm = machine();
        let history = StrikeHistory::from_records(vec![accepted(0), accepted(50)]).unwrap();
        let mut state = LevelState::at(Level::TRUSTED);
        assert_eq!(
            sm.apply_strike(&mut state, &history, &accepted(101)),
            Ok(Transition::Unchanged)
        );
    }

    #[test]
    fn count_is_not_reset_after_demotion() {
        let sm = machine();
        let mut history = StrikeHistory::new();
        let mut state = LevelState::at(Level::MODERATOR);

        for n in 1..=3 {
            sm.apply_strike(&mut state, &history, &accepted(n)).unwrap();
            history.push(accepted(n)).unwrap();
        }
        assert_eq!(state.level, Level::TRUSTED);
        assert_eq!(history.accepted_within(day(3), 100), 3);

        // A fourth strike still sees the previous three.
        let t = sm.apply_strike(&mut state, &history, &accepted(4)).unwrap();
        assert!(matches!(t, Transition::Demoted { to, .. } if to == Level::NEW_USER));
    }

    #[test]
    fn non_accepted_strikes_never_demote() {
        let sm = machine();
        let history = StrikeHistory::from_records(vec![accepted(1), accepted(2)]).unwrap();
        let mut state = LevelState::at(Level::TRUSTED);
        for kind in [StrikeKind::Ignored, StrikeKind::Warning] {
            let strike = StrikeRecord::new(kind, day(3));
            assert_eq!(sm.apply_strike(&mut state, &history, &strike), Ok(Transition::Unchanged));
        }
    }

    #[test]
    fn strike_older_than_history_is_refused() {
        let sm = machine();
        let history = StrikeHistory::from_records(vec![accepted(5), accepted(6)]).unwrap();
        let mut state = LevelState::at(Level::TRUSTED);

        assert!(matches!(
            sm.apply_strike(&mut state, &history, &accepted(4)),
            Err(ModerationError::OutOfOrder { .. })
        ));
        assert_eq!(state, LevelState::at(Level::TRUSTED));

        let stale = sm.evaluate(EvaluationInput {
            current: LevelState::at(Level::TRUSTED),
            history: &history,
            incoming: Some(accepted(4)),
            account_age_days: 200,
            contributions: 500,
            now: day(4),
        });
        assert!(matches!(stale, Err(ModerationError::OutOfOrder { .. })));
    }

    #[test]
    fn demotion_at_zero_is_noop() {
        let sm = machine();
        let mut state = LevelState::at(Level::RESTRICTED);
        assert_eq!(sm.demote(&mut state), Transition::Unchanged);
        assert_eq!(state.ban_counts, BanCounts::new());
    }

    #[test]
    fn promotion_requires_age_threshold() {
        let sm = machine();
        let history = StrikeHistory::new();

        let mut state = LevelState::default();
        assert_eq!(sm.review(&mut state, &history, 9, 15, day(9)), Transition::Unchanged);

        assert_eq!(
            sm.review(&mut state, &history, 10, 15, day(10)),
            Transition::Promoted {
                from: Level::NEW_USER,
                to: Level::TRUSTED
            }
        );
    }

    #[test]
    fn promotion_blocked_by_recent_warning_or_strike() {
        let sm = machine();
        let warned =
            StrikeHistory::from_records(vec![StrikeRecord::new(StrikeKind::Warning, day(5))])
                .unwrap();
        let mut state = LevelState::default();
        assert_eq!(sm.review(&mut state, &warned, 30, 20, day(14)), Transition::Unchanged);
        // Warning window is ten days.
        assert!(sm.review(&mut state, &warned, 30, 20, day(16)).is_change());

        let struck = StrikeHistory::from_records(vec![accepted(0)]).unwrap();
        let mut state = LevelState::default();
        assert_eq!(sm.review(&mut state, &struck, 30, 20, day(99)), Transition::Unchanged);
        assert!(sm.review(&mut state, &struck, 30, 20, day(101)).is_change());
    }

    #[test]
    fn ignored_records_do_not_block_promotion() {
        let sm = machine();
        let history =
            StrikeHistory::from_records(vec![StrikeRecord::new(StrikeKind::Ignored, day(1))])
                .unwrap();
        let mut state = LevelState::default();
        assert!(sm.review(&mut state, &history, 10, 10, day(2)).is_change());
    }

    #[test]
    fn second_rung_needs_hundred_days_and_contributions() {
        let sm = machine();
        let history = StrikeHistory::new();
        let mut state = LevelState::at(Level::TRUSTED);
        assert_eq!(sm.review(&mut state, &history, 99, 150, day(0)), Transition::Unchanged);
        assert_eq!(sm.review(&mut state, &history, 150, 99, day(0)), Transition::Unchanged);
        assert!(sm.review(&mut state, &history, 100, 100, day(0)).is_change());
        assert_eq!(state.level, Level::MODERATOR);
    }

    #[test]
    fn no_automatic_promotion_out_of_zero_or_three() {
        let sm = machine();
        let history = StrikeHistory::new();
        for level in [Level::RESTRICTED, Level::MODERATOR, Level::STAFF] {
            let mut state = LevelState::at(level);
            assert_eq!(
                sm.review(&mut state, &history, 10_000, 10_000, day(0)),
                Transition::Unchanged
            );
        }
    }

    #[test]
    fn evaluate_counts_pending_warning_against_promotion() {
        let sm = machine();
        let history = StrikeHistory::new();
        let eval = sm.evaluate(EvaluationInput {
            current: LevelState::default(),
            history: &history,
            incoming: Some(StrikeRecord::new(StrikeKind::Warning, day(20))),
            account_age_days: 20,
            contributions: 20,
            now: day(20),
        })
        .unwrap();
        assert_eq!(eval.transition, Transition::Unchanged);
        assert_eq!(eval.level, Level::NEW_USER);
    }

    #[test]
    fn assignment_respects_bans() {
        let sm = machine();
        let mut state = LevelState::at(Level::NEW_USER);
        for _ in 0..3 {
            state.ban_counts.record_demotion(Level::MODERATOR);
        }
        assert_eq!(
            sm.assign(&mut state, Level::STAFF),
            Err(ModerationError::LevelBanned(Level::STAFF))
        );
        assert!(sm.assign(&mut state, Level::TRUSTED).is_ok());
        assert_eq!(state.level, Level::TRUSTED);
    }

    #[test]
    fn replay_rejects_unsorted_events() {
        let sm = machine();
        let events = vec![
            ModerationEvent::Strike(accepted(5)),
            ModerationEvent::Strike(accepted(4)),
        ];
        assert!(matches!(
            sm.replay(&events),
            Err(ModerationError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn replay_of_empty_history_is_new_user() {
        let events: Vec<ModerationEvent> = Vec::new();
        let state = machine().replay(&events).unwrap();
        assert_eq!(state, LevelState::default());
    }
}
