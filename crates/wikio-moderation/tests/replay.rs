//! Level recomputation over whole event histories.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use wikio_moderation::{
    Closer, Level, ModerationConfig, ModerationEvent, PermissionTable, StateMachine, StrikeKind,
    StrikeRecord, UserId, Violation, VoteAction,
};

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 8, 0, 0).unwrap() + Duration::days(n)
}

fn strike(kind: StrikeKind, n: i64) -> ModerationEvent {
    ModerationEvent::Strike(StrikeRecord::new(kind, day(n)))
}

fn assign(level: Level, n: i64) -> ModerationEvent {
    ModerationEvent::Assigned {
        level,
        at: day(n),
        by: Some(UserId(1)),
    }
}

fn review(n: i64) -> ModerationEvent {
    ModerationEvent::Review {
        at: day(n),
        account_age_days: 10_000,
        contributions: 10_000,
    }
}

#[test]
fn three_demotions_from_trusted_cap_at_new_user() {
    let sm = StateMachine::default();
    let events = vec![
        assign(Level::TRUSTED, 0),
        strike(StrikeKind::Accepted, 1),
        strike(StrikeKind::Accepted, 2),
        strike(StrikeKind::Accepted, 3),
        assign(Level::TRUSTED, 4),
        strike(StrikeKind::Accepted, 5),
        assign(Level::TRUSTED, 6),
        strike(StrikeKind::Accepted, 7),
        // Refused: banned from 2.
        assign(Level::TRUSTED, 8),
        review(400),
        assign(Level::STAFF, 401),
    ];

    let state = sm.replay(&events).unwrap();
    assert_eq!(state.level, Level::NEW_USER);
    assert_eq!(state.ban_counts.demotions_from(Level::TRUSTED), 3);
    assert_eq!(state.ban_counts.cap(3), Some(Level::NEW_USER));
}

#[test]
fn clean_account_climbs_one_rung_per_review() {
    let sm = StateMachine::default();
    let events = vec![review(10), review(100)];
    let state = sm.replay(&events).unwrap();
    assert_eq!(state.level, Level::MODERATOR);

    let state = sm.replay(&events[..1]).unwrap();
    assert_eq!(state.level, Level::TRUSTED);
}

#[test]
fn warnings_delay_promotion() {
    let sm = StateMachine::default();
    let events = vec![
        strike(StrikeKind::Warning, 20),
        review(25),
        review(31),
    ];
    let state = sm.replay(&events[..2]).unwrap();
    assert_eq!(state.level, Level::NEW_USER);
    let state = sm.replay(&events).unwrap();
    assert_eq!(state.level, Level::TRUSTED);
}

#[test]
fn closed_polls_feed_the_history() {
    let config = ModerationConfig::default();
    let table = PermissionTable::default();
    let sm = StateMachine::new(config.clone());
    let offender = UserId(42);
    let mut events = vec![assign(Level::MODERATOR, 0)];

    for n in 0..3 {
        let opened = day(10 + n * 20);
        let mut violation =
            Violation::open(n as u64, offender, UserId(7), Level::NEW_USER, opened, &table)
                .unwrap();
        violation
            .cast_vote(UserId(8), Level::MODERATOR, VoteAction::Accept, opened, &config, &table)
            .unwrap();
        let resolution = violation
            .close(
                opened + Duration::days(1),
                Closer::Staff {
                    id: UserId(1),
                    level: Level::STAFF,
                    ruling: None,
                },
                &config,
                &table,
            )
            .unwrap();
        if let Some(record) = resolution.offender_strike {
            events.push(ModerationEvent::Strike(record));
        }
    }

    let state = sm.replay(&events).unwrap();
    assert_eq!(state.level, Level::TRUSTED);
    assert_eq!(state.ban_counts.demotions_from(Level::MODERATOR), 1);
}

fn event_strategy() -> impl Strategy<Value = Vec<ModerationEvent>> {
    prop::collection::vec((1i64..15, 0u8..4, 0u8..=4), 0..40).prop_map(|steps| {
        let mut n = 0;
        steps
            .into_iter()
            .map(|(gap, kind, level)| {
                n += gap;
                match kind {
                    0 => strike(StrikeKind::Accepted, n),
                    1 => strike(StrikeKind::Warning, n),
                    2 => assign(Level::try_from(level).unwrap(), n),
                    _ => ModerationEvent::Review {
                        at: day(n),
                        account_age_days: n,
                        contributions: 50,
                    },
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn replay_is_deterministic(events in event_strategy()) {
        let sm = StateMachine::default();
        prop_assert_eq!(sm.replay(&events).unwrap(), sm.replay(&events).unwrap());
    }

    #[test]
    fn level_never_reaches_a_banned_level(events in event_strategy()) {
        let sm = StateMachine::default();
        let state = sm.replay(&events).unwrap();
        let limit = sm.config().ban_after_demotions;
        prop_assert!(state.ban_counts.allows(state.level, limit));
    }

    #[test]
    fn strikes_never_raise_the_level(events in event_strategy()) {
        let sm = StateMachine::default();
        let base = sm.replay(&events).unwrap();
        let last = events.last().map(|e| e.at()).unwrap_or_else(|| day(0));
        let mut more = events.clone();
        more.push(ModerationEvent::Strike(
            StrikeRecord::new(StrikeKind::Accepted, last).judged_by(UserId(999)),
        ));
        let after = sm.replay(&more).unwrap();
        prop_assert!(after.level <= base.level);
    }
}
