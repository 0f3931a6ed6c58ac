//! Declarative permission table.
//!
//! One row per level, consulted by every authorization check. Rows are data:
//! the utilization limits and flags can be changed through configuration
//! without touching the checks.
//!
//! | Level | Edit / remove              | Delete      | Moderation                 |
//! |-------|----------------------------|-------------|----------------------------|
//! | 0     | -                          | -           | -                          |
//! | 1     | own, unused                | own, unused | report content             |
//! | 2     | utilization <= 10          | own, unused | report content             |
//! | 3     | utilization <= 100         | own, unused | vote, comment, report      |
//! | 4     | anything                   | anything    | resolve, assign, override  |

use serde::{Deserialize, Serialize};

use crate::error::{ModerationError, Result};
use crate::level::Level;

/// Which content a level may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "limit", rename_all = "snake_case")]
pub enum EditScope {
    Nothing,
    /// Content the user authored and nobody else uses yet
    OwnUnused,
    /// Own unused content, or anything with utilization up to the limit
    UpTo(u32),
    Anything,
}

impl EditScope {
    pub fn allows(&self, access: ContentAccess) -> bool {
        let own_unused = access.is_author && access.utilization == 0;
        match *self {
            EditScope::Nothing => false,
            EditScope::OwnUnused => own_unused,
            EditScope::UpTo(limit) => own_unused || access.utilization <= limit,
            EditScope::Anything => true,
        }
    }
}

/// The relationship between a user and a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentAccess {
    /// How many users rely on the content (other than the requester)
    pub utilization: u32,
    pub is_author: bool,
}

/// What a report is filed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    Content,
    Violation,
}

/// Permissions of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPermissions {
    /// Titles, merges, conversions and removals
    pub edit: EditScope,
    pub edit_details: bool,
    pub delete: EditScope,
    pub restore: bool,
    pub report_content: bool,
    pub report_violations: bool,
    pub vote_violations: bool,
    pub comment_violations: bool,
    pub resolve_violations: bool,
    pub assign_levels: bool,
    /// Act on polls regardless of state or involvement
    pub override_polls: bool,
}

impl LevelPermissions {
    const NONE: LevelPermissions = LevelPermissions {
        edit: EditScope::Nothing,
        edit_details: false,
        delete: EditScope::Nothing,
        restore: false,
        report_content: false,
        report_violations: false,
        vote_violations: false,
        comment_violations: false,
        resolve_violations: false,
        assign_levels: false,
        override_polls: false,
    };
}

/// Permission rows indexed by level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    rows: [LevelPermissions; 5],
}

impl Default for PermissionTable {
    fn default() -> Self {
        let member = LevelPermissions {
            edit: EditScope::OwnUnused,
            edit_details: true,
            delete: EditScope::OwnUnused,
            report_content: true,
            ..LevelPermissions::NONE
        };
        Self {
            rows: [
                LevelPermissions::NONE,
                member.clone(),
                LevelPermissions {
                    edit: EditScope::UpTo(10),
                    ..member.clone()
                },
                LevelPermissions {
                    edit: EditScope::UpTo(100),
                    report_violations: true,
                    vote_violations: true,
                    comment_violations: true,
                    ..member.clone()
                },
                LevelPermissions {
                    edit: EditScope::Anything,
                    edit_details: true,
                    delete: EditScope::Anything,
                    restore: true,
                    report_content: true,
                    report_violations: true,
                    vote_violations: true,
                    comment_violations: true,
                    resolve_violations: true,
                    assign_levels: true,
                    override_polls: true,
                },
            ],
        }
    }
}

impl PermissionTable {
    pub fn new(rows: [LevelPermissions; 5]) -> Self {
        Self { rows }
    }

    pub fn row(&self, level: Level) -> &LevelPermissions {
        &self.rows[level.value() as usize]
    }

    /// Title edits, swaps, merges, conversions and removals.
    pub fn can_edit(&self, level: Level, access: ContentAccess) -> bool {
        self.row(level).edit.allows(access)
    }

    pub fn can_edit_details(&self, level: Level) -> bool {
        self.row(level).edit_details
    }

    pub fn can_delete(&self, level: Level, access: ContentAccess) -> bool {
        self.row(level).delete.allows(access)
    }

    pub fn can_restore(&self, level: Level) -> bool {
        self.row(level).restore
    }

    /// Opinions belong to their owner at every level.
    pub fn can_edit_opinion(&self, is_owner: bool) -> bool {
        is_owner
    }

    pub fn can_report(&self, level: Level, target: ReportTarget) -> bool {
        let row = self.row(level);
        match target {
            ReportTarget::Content => row.report_content,
            ReportTarget::Violation => row.report_violations,
        }
    }

    pub fn can_vote(&self, level: Level, is_offender: bool, is_open: bool) -> bool {
        let row = self.row(level);
        is_open && row.vote_violations && (!is_offender || row.override_polls)
    }

    pub fn can_comment(&self, level: Level, is_open: bool) -> bool {
        let row = self.row(level);
        row.comment_violations && (is_open || row.override_polls)
    }

    pub fn can_resolve(&self, level: Level) -> bool {
        self.row(level).resolve_violations
    }

    pub fn can_assign_levels(&self, level: Level) -> bool {
        self.row(level).assign_levels
    }

    /// `Ok(())` when `allowed`, else a `NotPermitted` error naming `action`.
    pub fn require(&self, allowed: bool, level: Level, action: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(ModerationError::NotPermitted { action, level })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(utilization: u32, is_author: bool) -> ContentAccess {
        ContentAccess {
            utilization,
            is_author,
        }
    }

    #[test]
    fn edit_scopes_by_level() {
        let table = PermissionTable::default();
        let cases = [
            (Level::RESTRICTED, access(0, true), false),
            (Level::NEW_USER, access(0, true), true),
            (Level::NEW_USER, access(1, true), false),
            (Level::NEW_USER, access(0, false), false),
            (Level::TRUSTED, access(10, false), true),
            (Level::TRUSTED, access(11, false), false),
            (Level::MODERATOR, access(100, false), true),
            (Level::MODERATOR, access(101, false), false),
            (Level::STAFF, access(10_000, false), true),
        ];
        for (level, acc, expected) in cases {
            assert_eq!(
                table.can_edit(level, acc),
                expected,
                "can_edit({}, {:?}) should be {}",
                level,
                acc,
                expected
            );
        }
    }

    #[test]
    fn deletion_is_own_unused_until_staff() {
        let table = PermissionTable::default();
        assert!(table.can_delete(Level::NEW_USER, access(0, true)));
        assert!(!table.can_delete(Level::MODERATOR, access(1, false)));
        assert!(table.can_delete(Level::STAFF, access(50, false)));
        assert!(!table.can_delete(Level::RESTRICTED, access(0, true)));
    }

    #[test]
    fn violation_rights() {
        let table = PermissionTable::default();
        assert!(!table.can_vote(Level::TRUSTED, false, true));
        assert!(table.can_vote(Level::MODERATOR, false, true));
        assert!(!table.can_vote(Level::MODERATOR, true, true));
        assert!(!table.can_vote(Level::MODERATOR, false, false));
        assert!(table.can_vote(Level::STAFF, true, true));

        assert!(table.can_comment(Level::MODERATOR, true));
        assert!(!table.can_comment(Level::MODERATOR, false));
        assert!(table.can_comment(Level::STAFF, false));

        assert!(table.can_resolve(Level::STAFF));
        assert!(!table.can_resolve(Level::MODERATOR));
    }

    #[test]
    fn reporting() {
        let table = PermissionTable::default();
        assert!(!table.can_report(Level::RESTRICTED, ReportTarget::Content));
        assert!(table.can_report(Level::NEW_USER, ReportTarget::Content));
        assert!(!table.can_report(Level::TRUSTED, ReportTarget::Violation));
        assert!(table.can_report(Level::MODERATOR, ReportTarget::Violation));
    }

    #[test]
    fn only_staff_restore_and_assign() {
        let table = PermissionTable::default();
        for level in Level::all() {
            let staff = level == Level::STAFF;
            assert_eq!(table.can_restore(level), staff);
            assert_eq!(table.can_assign_levels(level), staff);
        }
    }

    #[test]
    fn require_names_the_action() {
        let table = PermissionTable::default();
        let err = table
            .require(table.can_restore(Level::NEW_USER), Level::NEW_USER, "restore")
            .unwrap_err();
        assert_eq!(err.to_string(), "level 1 may not restore");
    }
}
