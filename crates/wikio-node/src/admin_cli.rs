//! wikio-admin CLI tool
//!
//! Drives a running wikio-node over its admin socket.
//!
//! Usage:
//!   wikio-admin register <user>
//!   wikio-admin assign <user> <level> [by]
//!   wikio-admin report <offender> <reporter>
//!   wikio-admin stats <theory> [kind]
//!   wikio-admin ping
//!   ...

use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use wikio_moderation::{Level, UserId};
use wikio_node::{AdminCommand, AdminResponse, TheoryId};
use wikio_opinion::StatsKind;

fn print_usage() {
    eprintln!("wikio-admin - Manage a Wiki-O node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  wikio-admin register <user>                   Create an account");
    eprintln!("  wikio-admin contribute <user>                 Count a contribution");
    eprintln!("  wikio-admin user <user>                       Show level, bans and strikes");
    eprintln!("  wikio-admin review <user>                     Run the promotion check");
    eprintln!("  wikio-admin assign <user> <level> [by]        Set a level (0-4)");
    eprintln!("  wikio-admin strike <user> <kind> [version]    Record ignored|warning|accepted");
    eprintln!("  wikio-admin report <offender> <reporter>      Open a violation poll");
    eprintln!("  wikio-admin vote <violation> <voter> <action> Vote ignore|warn|accept|reject");
    eprintln!("  wikio-admin comment <violation> <author> <text>");
    eprintln!("  wikio-admin close <violation> <by> [ruling]   Resolve a poll");
    eprintln!("  wikio-admin sweep                             Close expired polls");
    eprintln!("  wikio-admin violations [--open]               List polls");
    eprintln!("  wikio-admin violation <id>                    Show a poll");
    eprintln!("  wikio-admin create-theory <theory> <author>");
    eprintln!("  wikio-admin submit <theory> <user> <json>     Store an opinion snapshot");
    eprintln!("  wikio-admin remove-opinion <theory> <user> [by]");
    eprintln!("  wikio-admin analyze <theory> <user> [kind]    Compare with Stats");
    eprintln!("  wikio-admin stats <theory> [kind]             all|supporters|moderates|opposers");
    eprintln!("  wikio-admin histogram <theory>");
    eprintln!("  wikio-admin swap <theory> <by>                Swap true and false");
    eprintln!("  wikio-admin details <theory> <by> <text>      Replace the description");
    eprintln!("  wikio-admin delete-theory <theory> <by>");
    eprintln!("  wikio-admin restore-theory <theory> <by>");
    eprintln!("  wikio-admin ping                              Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WIKIO_SOCKET  Path to admin socket (default: ./wikio-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("WIKIO_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./wikio-data/admin.sock"))
}

fn send_command(cmd: &AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to wikio-node at {:?}: {}\n\
             Is the wikio-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn arg<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a {} argument", args[1], name))
}

fn id(args: &[String], i: usize, name: &str) -> Result<u64, String> {
    let raw = arg(args, i, name)?;
    raw.parse()
        .map_err(|_| format!("{} must be a number, got {:?}", name, raw))
}

fn user(args: &[String], i: usize, name: &str) -> Result<UserId, String> {
    id(args, i, name).map(UserId)
}

fn theory(args: &[String], i: usize) -> Result<TheoryId, String> {
    id(args, i, "theory").map(TheoryId)
}

/// Parse a snake_case enum name the way the socket expects it.
fn named<T: DeserializeOwned>(args: &[String], i: usize, name: &str) -> Result<T, String> {
    let raw = arg(args, i, name)?;
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unknown {}: {}", name, raw))
}

fn optional<T>(args: &[String], i: usize, parse: impl Fn(&[String], usize) -> Result<T, String>) -> Result<Option<T>, String> {
    if args.len() > i {
        parse(args, i).map(Some)
    } else {
        Ok(None)
    }
}

fn stats_kind(args: &[String], i: usize) -> Result<StatsKind, String> {
    match args.get(i) {
        Some(raw) => raw.parse().map_err(|e| format!("{}", e)),
        None => Ok(StatsKind::All),
    }
}

fn parse_command(args: &[String]) -> Result<AdminCommand, String> {
    let cmd = match args[1].as_str() {
        "register" => AdminCommand::RegisterUser {
            user: user(args, 2, "user")?,
            joined_at: None,
        },
        "contribute" => AdminCommand::RecordContribution {
            user: user(args, 2, "user")?,
            at: None,
        },
        "user" => AdminCommand::GetUser {
            user: user(args, 2, "user")?,
        },
        "review" => AdminCommand::Review {
            user: user(args, 2, "user")?,
            at: None,
        },
        "assign" => {
            let raw = id(args, 3, "level")?;
            let level = u8::try_from(raw)
                .ok()
                .and_then(|l| Level::try_from(l).ok())
                .ok_or_else(|| format!("level must be 0-4, got {}", raw))?;
            AdminCommand::AssignLevel {
                user: user(args, 2, "user")?,
                level,
                by: optional(args, 4, |a, i| user(a, i, "by"))?,
                at: None,
            }
        }
        "strike" => AdminCommand::RecordStrike {
            user: user(args, 2, "user")?,
            kind: named(args, 3, "kind")?,
            judge: None,
            version: optional(args, 4, |a, i| id(a, i, "version"))?,
            at: None,
        },
        "report" => AdminCommand::ReportViolation {
            offender: user(args, 2, "offender")?,
            reporter: user(args, 3, "reporter")?,
            at: None,
        },
        "vote" => AdminCommand::Vote {
            violation: id(args, 2, "violation")?,
            voter: user(args, 3, "voter")?,
            action: named(args, 4, "action")?,
            at: None,
        },
        "comment" => {
            if args.len() < 5 {
                return Err("comment requires a text argument".to_string());
            }
            AdminCommand::Comment {
                violation: id(args, 2, "violation")?,
                author: user(args, 3, "author")?,
                comment: args[4..].join(" "),
                at: None,
            }
        }
        "close" => AdminCommand::CloseViolation {
            violation: id(args, 2, "violation")?,
            by: user(args, 3, "by")?,
            ruling: optional(args, 4, |a, i| named(a, i, "ruling"))?,
            at: None,
        },
        "sweep" => AdminCommand::SweepViolations { at: None },
        "violations" => AdminCommand::ListViolations {
            open_only: args.get(2).map(String::as_str) == Some("--open"),
        },
        "violation" => AdminCommand::GetViolation {
            violation: id(args, 2, "violation")?,
        },
        "create-theory" => AdminCommand::CreateTheory {
            theory: theory(args, 2)?,
            author: user(args, 3, "author")?,
        },
        "submit" => AdminCommand::SubmitOpinion {
            theory: theory(args, 2)?,
            user: user(args, 3, "user")?,
            opinion: serde_json::from_str(arg(args, 4, "json")?)
                .map_err(|e| format!("Invalid opinion: {}", e))?,
            by: None,
        },
        "remove-opinion" => AdminCommand::RemoveOpinion {
            theory: theory(args, 2)?,
            user: user(args, 3, "user")?,
            by: optional(args, 4, |a, i| user(a, i, "by"))?,
        },
        "analyze" => AdminCommand::AnalyzeOpinion {
            theory: theory(args, 2)?,
            user: user(args, 3, "user")?,
            kind: stats_kind(args, 4)?,
        },
        "stats" => AdminCommand::TheoryStats {
            theory: theory(args, 2)?,
            kind: stats_kind(args, 3)?,
        },
        "histogram" => AdminCommand::Histogram {
            theory: theory(args, 2)?,
        },
        "swap" => AdminCommand::SwapTrueFalse {
            theory: theory(args, 2)?,
            by: user(args, 3, "by")?,
        },
        "details" => {
            if args.len() < 5 {
                return Err("details requires a text argument".to_string());
            }
            AdminCommand::EditTheoryDetails {
                theory: theory(args, 2)?,
                by: user(args, 3, "by")?,
                details: args[4..].join(" "),
            }
        }
        "delete-theory" => AdminCommand::DeleteTheory {
            theory: theory(args, 2)?,
            by: user(args, 3, "by")?,
        },
        "restore-theory" => AdminCommand::RestoreTheory {
            theory: theory(args, 2)?,
            by: user(args, 3, "by")?,
        },
        "ping" => AdminCommand::Ping,
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(cmd)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    if matches!(args[1].as_str(), "-h" | "--help" | "help") {
        print_usage();
        std::process::exit(0);
    }

    let cmd = match parse_command(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(&cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => println!("{}", message),
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::Level { change } => {
                if change.is_change() {
                    println!("level {} -> {}", change.from, change.to);
                } else {
                    println!("level {} (unchanged)", change.to);
                }
            }
            AdminResponse::Count { value } => println!("{}", value),
            AdminResponse::Violations { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    print_json(&items);
                }
            }
            AdminResponse::Pong => println!("pong - wikio-node is running"),
            other => print_json(&other),
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
