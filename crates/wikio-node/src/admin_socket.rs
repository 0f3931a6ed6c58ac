//! Unix socket server for admin commands.
//!
//! Newline-delimited JSON: one [`AdminCommand`] per line in, one
//! [`AdminResponse`] per line out. Timestamps are optional and default to
//! now, so scripted scenarios can be replayed with fixed dates.

use crate::error::Result;
use crate::ledger::{LevelChange, UserSnapshot};
use crate::node::WikioState;
use crate::opinions::{OpinionReport, TheoryId};
use crate::violations::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use wikio_moderation::{Level, StrikeKind, StrikeRecord, UserId, Violation, VoteAction};
use wikio_opinion::{OpinionSnapshot, PopulationHistogram, Stats, StatsKind};

fn all_opinions() -> StatsKind {
    StatsKind::All
}

/// Admin command sent over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Create an account at the default level
    RegisterUser {
        user: UserId,
        #[serde(default)]
        joined_at: Option<DateTime<Utc>>,
    },
    /// Count a contribution toward promotion
    RecordContribution {
        user: UserId,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Show level, bans and strikes
    GetUser { user: UserId },
    /// Run the promotion check
    Review {
        user: UserId,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Set a level; `by` absent means the local operator
    AssignLevel {
        user: UserId,
        level: Level,
        #[serde(default)]
        by: Option<UserId>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Append a strike directly, optionally guarded by the version last read
    RecordStrike {
        user: UserId,
        kind: StrikeKind,
        #[serde(default)]
        judge: Option<UserId>,
        #[serde(default)]
        version: Option<u64>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Open a violation poll
    ReportViolation {
        offender: UserId,
        reporter: UserId,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Vote {
        violation: u64,
        voter: UserId,
        action: VoteAction,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Comment {
        violation: u64,
        author: UserId,
        comment: String,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Staff resolution
    CloseViolation {
        violation: u64,
        by: UserId,
        #[serde(default)]
        ruling: Option<VoteAction>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Close every expired poll now
    SweepViolations {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    GetViolation { violation: u64 },
    ListViolations {
        #[serde(default)]
        open_only: bool,
    },
    CreateTheory { theory: TheoryId, author: UserId },
    /// Store an opinion; `by` absent means the owner
    SubmitOpinion {
        theory: TheoryId,
        user: UserId,
        opinion: OpinionSnapshot,
        #[serde(default)]
        by: Option<UserId>,
    },
    RemoveOpinion {
        theory: TheoryId,
        user: UserId,
        #[serde(default)]
        by: Option<UserId>,
    },
    AnalyzeOpinion {
        theory: TheoryId,
        user: UserId,
        #[serde(default = "all_opinions")]
        kind: StatsKind,
    },
    TheoryStats {
        theory: TheoryId,
        #[serde(default = "all_opinions")]
        kind: StatsKind,
    },
    Histogram { theory: TheoryId },
    SwapTrueFalse { theory: TheoryId, by: UserId },
    EditTheoryDetails {
        theory: TheoryId,
        by: UserId,
        details: String,
    },
    DeleteTheory { theory: TheoryId, by: UserId },
    RestoreTheory { theory: TheoryId, by: UserId },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    User { user: UserSnapshot },
    Level { change: LevelChange },
    Count { value: usize },
    Violation { violation: Violation },
    Violations { items: Vec<Violation> },
    Verdict { verdict: Verdict },
    Verdicts { items: Vec<Verdict> },
    Report { report: OpinionReport },
    Stats { stats: Stats },
    Histogram { histogram: PopulationHistogram },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    state: Arc<WikioState>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(state: Arc<WikioState>, socket_path: &Path) -> Self {
        Self {
            state,
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Bind the socket, replacing a stale socket file.
    pub fn bind(&self) -> Result<UnixListener> {
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);
        Ok(listener)
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<WikioState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &state).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn respond<T>(result: Result<T>, ok: impl FnOnce(T) -> AdminResponse) -> AdminResponse {
    match result {
        Ok(value) => ok(value),
        Err(e) => {
            tracing::warn!("Admin command failed: {}", e);
            AdminResponse::Error {
                error: e.to_string(),
            }
        }
    }
}

/// Execute one command against the node state.
pub async fn execute_command(cmd: AdminCommand, state: &WikioState) -> AdminResponse {
    let now = Utc::now();
    match cmd {
        AdminCommand::RegisterUser { user, joined_at } => respond(
            state.ledger.register(user, joined_at.unwrap_or(now)).await,
            |user| AdminResponse::User { user },
        ),

        AdminCommand::RecordContribution { user, at } => respond(
            state.ledger.record_contribution(user, at.unwrap_or(now)).await,
            |value| AdminResponse::Count { value },
        ),

        AdminCommand::GetUser { user } => respond(state.ledger.snapshot(user, now).await, |user| {
            AdminResponse::User { user }
        }),

        AdminCommand::Review { user, at } => respond(
            state.ledger.review(user, at.unwrap_or(now)).await,
            |change| AdminResponse::Level { change },
        ),

        AdminCommand::AssignLevel { user, level, by, at } => respond(
            state
                .ledger
                .assign_level(user, level, by, at.unwrap_or(now))
                .await,
            |change| AdminResponse::Level { change },
        ),

        AdminCommand::RecordStrike {
            user,
            kind,
            judge,
            version,
            at,
        } => {
            let strike = StrikeRecord {
                kind,
                at: at.unwrap_or(now),
                judge,
                violation: None,
            };
            let result = match version {
                Some(expected) => {
                    state
                        .ledger
                        .record_strike_at_version(user, strike, expected)
                        .await
                }
                None => state.ledger.record_strike(user, strike).await,
            };
            respond(result, |change| AdminResponse::Level { change })
        }

        AdminCommand::ReportViolation {
            offender,
            reporter,
            at,
        } => respond(
            state
                .violations
                .report(offender, reporter, at.unwrap_or(now))
                .await,
            |violation| AdminResponse::Violation { violation },
        ),

        AdminCommand::Vote {
            violation,
            voter,
            action,
            at,
        } => respond(
            state
                .violations
                .vote(violation, voter, action, at.unwrap_or(now))
                .await,
            |violation| AdminResponse::Violation { violation },
        ),

        AdminCommand::Comment {
            violation,
            author,
            comment,
            at,
        } => respond(
            state
                .violations
                .comment(violation, author, comment, at.unwrap_or(now))
                .await,
            |violation| AdminResponse::Violation { violation },
        ),

        AdminCommand::CloseViolation {
            violation,
            by,
            ruling,
            at,
        } => respond(
            state
                .violations
                .close(violation, by, ruling, at.unwrap_or(now))
                .await,
            |verdict| AdminResponse::Verdict { verdict },
        ),

        AdminCommand::SweepViolations { at } => AdminResponse::Verdicts {
            items: state.violations.sweep(at.unwrap_or(now)).await,
        },

        AdminCommand::GetViolation { violation } => {
            respond(state.violations.get(violation).await, |violation| {
                AdminResponse::Violation { violation }
            })
        }

        AdminCommand::ListViolations { open_only } => AdminResponse::Violations {
            items: state.violations.list(open_only).await,
        },

        AdminCommand::CreateTheory { theory, author } => respond(
            state.opinions.create_theory(theory, author).await,
            |()| AdminResponse::Ok {
                message: format!("Created {}", theory),
            },
        ),

        AdminCommand::SubmitOpinion {
            theory,
            user,
            opinion,
            by,
        } => {
            let actor = by.unwrap_or(user);
            let result = match state.ledger.level(actor).await {
                Ok(level) => state.opinions.submit(theory, user, actor, level, opinion).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Stored opinion of {} on {}", user, theory),
            })
        }

        AdminCommand::RemoveOpinion { theory, user, by } => {
            let actor = by.unwrap_or(user);
            let result = match state.ledger.level(actor).await {
                Ok(level) => state.opinions.remove(theory, user, actor, level).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Removed opinion of {} on {}", user, theory),
            })
        }

        AdminCommand::AnalyzeOpinion { theory, user, kind } => respond(
            state.opinions.analyze(theory, user, kind).await,
            |report| AdminResponse::Report { report },
        ),

        AdminCommand::TheoryStats { theory, kind } => {
            respond(state.opinions.stats(theory, kind).await, |stats| {
                AdminResponse::Stats { stats }
            })
        }

        AdminCommand::Histogram { theory } => {
            respond(state.opinions.histogram(theory).await, |histogram| {
                AdminResponse::Histogram { histogram }
            })
        }

        AdminCommand::SwapTrueFalse { theory, by } => {
            let result = match state.ledger.level(by).await {
                Ok(level) => state.opinions.swap_true_false(theory, by, level).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Swapped true and false on {}", theory),
            })
        }

        AdminCommand::EditTheoryDetails { theory, by, details } => {
            let result = match state.ledger.level(by).await {
                Ok(level) => state.opinions.edit_details(theory, by, level, details).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Updated details of {}", theory),
            })
        }

        AdminCommand::DeleteTheory { theory, by } => {
            let result = match state.ledger.level(by).await {
                Ok(level) => state.opinions.delete_theory(theory, by, level).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Deleted {}", theory),
            })
        }

        AdminCommand::RestoreTheory { theory, by } => {
            let result = match state.ledger.level(by).await {
                Ok(level) => state.opinions.restore_theory(theory, by, level).await,
                Err(e) => Err(e),
            };
            respond(result, |()| AdminResponse::Ok {
                message: format!("Restored {}", theory),
            })
        }

        AdminCommand::Ping => AdminResponse::Pong,
    }
}
