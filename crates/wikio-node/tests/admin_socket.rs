//! End-to-end scenarios over the admin socket.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use wikio_node::admin_socket::execute_command;
use wikio_node::{AdminCommand, AdminResponse, AdminSocket, CoreConfig, WikioState};

struct Client {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl Client {
    async fn send(&mut self, cmd: Value) -> Value {
        let line = cmd.to_string() + "\n";
        self.writer.write_all(line.as_bytes()).await.unwrap();
        let mut response = String::new();
        self.reader.read_line(&mut response).await.unwrap();
        serde_json::from_str(&response).unwrap()
    }
}

async fn start() -> (Client, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin.sock");
    let state = Arc::new(WikioState::new(CoreConfig::default()));
    let socket = AdminSocket::new(state, &path);
    let listener = socket.bind().unwrap();
    tokio::spawn(async move {
        let _ = socket.serve(listener).await;
    });

    let stream = UnixStream::connect(&path).await.unwrap();
    let (reader, writer) = stream.into_split();
    (
        Client {
            reader: BufReader::new(reader),
            writer,
        },
        dir,
    )
}

#[tokio::test]
async fn ping_and_bad_input() {
    let (mut client, _dir) = start().await;
    assert_eq!(client.send(json!({"cmd": "ping"})).await["status"], "pong");

    let bad = client.send(json!({"cmd": "launch_rockets"})).await;
    assert_eq!(bad["status"], "error");
    assert!(bad["error"].as_str().unwrap().starts_with("Invalid command"));
}

#[tokio::test]
async fn moderation_scenario() {
    let (mut client, _dir) = start().await;
    let joined = "2024-01-01T00:00:00Z";

    for user in [1, 2, 3, 4] {
        let r = client
            .send(json!({"cmd": "register_user", "user": user, "joined_at": joined}))
            .await;
        assert_eq!(r["status"], "user");
        assert_eq!(r["user"]["level"], 1);
    }
    client
        .send(json!({"cmd": "assign_level", "user": 1, "level": 4, "at": "2024-01-02T00:00:00Z"}))
        .await;
    client
        .send(json!({"cmd": "assign_level", "user": 2, "level": 3, "by": 1, "at": "2024-01-02T00:00:00Z"}))
        .await;

    for day in 3..6 {
        let at = format!("2024-01-{:02}T10:00:00Z", day);
        let report = client
            .send(json!({"cmd": "report_violation", "offender": 3, "reporter": 4, "at": at}))
            .await;
        assert_eq!(report["status"], "violation");
        let id = report["violation"]["id"].clone();

        let vote = client
            .send(json!({"cmd": "vote", "violation": id, "voter": 2, "action": "accept", "at": at}))
            .await;
        assert_eq!(vote["status"], "violation");

        let verdict = client
            .send(json!({"cmd": "close_violation", "violation": id, "by": 1, "at": at}))
            .await;
        assert_eq!(verdict["status"], "verdict");
        assert_eq!(verdict["verdict"]["resolution"]["outcome"], "accept");
    }

    // Three accepted strikes at level 1 drop the offender to 0.
    let user = client.send(json!({"cmd": "get_user", "user": 3})).await;
    assert_eq!(user["user"]["level"], 0);
    assert_eq!(user["user"]["strikes"].as_array().unwrap().len(), 3);

    // Moderators may not assign levels.
    let refused = client
        .send(json!({"cmd": "assign_level", "user": 3, "level": 2, "by": 2}))
        .await;
    assert_eq!(refused["status"], "error");
}

#[tokio::test]
async fn stale_strike_is_reported() {
    let (mut client, _dir) = start().await;
    client
        .send(json!({"cmd": "register_user", "user": 7, "joined_at": "2024-01-01T00:00:00Z"}))
        .await;
    client
        .send(json!({"cmd": "record_strike", "user": 7, "kind": "warning", "at": "2024-01-02T00:00:00Z"}))
        .await;

    let stale = client
        .send(json!({"cmd": "record_strike", "user": 7, "kind": "accepted", "version": 0, "at": "2024-01-03T00:00:00Z"}))
        .await;
    assert_eq!(stale["status"], "error");
    assert!(stale["error"].as_str().unwrap().contains("Stale"));

    let fresh = client
        .send(json!({"cmd": "record_strike", "user": 7, "kind": "accepted", "version": 1, "at": "2024-01-03T00:00:00Z"}))
        .await;
    assert_eq!(fresh["status"], "level");
}

#[tokio::test]
async fn opinion_scenario() {
    let (mut client, _dir) = start().await;
    for user in [1, 2] {
        client.send(json!({"cmd": "register_user", "user": user})).await;
    }
    client
        .send(json!({"cmd": "create_theory", "theory": 10, "author": 1}))
        .await;

    let mine = json!({"dependencies": [
        {"id": 1, "points": {"true_points": 80.0, "false_points": 20.0}},
        {"id": 2, "points": {"true_points": 0.0, "false_points": 0.0}}
    ]});
    let other = json!({"dependencies": [
        {"id": 1, "points": {"true_points": 90.0, "false_points": 10.0}},
        {"id": 2, "points": {"true_points": 5.0, "false_points": 0.0}}
    ]});
    assert_eq!(
        client
            .send(json!({"cmd": "submit_opinion", "theory": 10, "user": 1, "opinion": mine}))
            .await["status"],
        "ok"
    );
    client
        .send(json!({"cmd": "submit_opinion", "theory": 10, "user": 2, "opinion": other}))
        .await;

    let report = client
        .send(json!({"cmd": "analyze_opinion", "theory": 10, "user": 1}))
        .await;
    assert_eq!(report["status"], "report");
    let analysis = &report["report"]["analysis"];
    assert_eq!(analysis["percentages"]["true_pct"], 80.0);
    assert_eq!(analysis["percentages"]["false_pct"], 20.0);
    let labels = analysis["classifications"].as_array().unwrap();
    assert!(labels.contains(&json!([1, "collaborative"])));
    assert!(labels.contains(&json!([2, "unaccounted"])));

    let bad = json!({"dependencies": [
        {"id": 1, "points": {"true_points": -1.0, "false_points": 0.0}}
    ]});
    let refused = client
        .send(json!({"cmd": "submit_opinion", "theory": 10, "user": 1, "opinion": bad}))
        .await;
    assert_eq!(refused["status"], "error");

    let stats = client
        .send(json!({"cmd": "theory_stats", "theory": 10, "kind": "supporters"}))
        .await;
    assert_eq!(stats["stats"]["members"], 2);

    // Nobody writes another user's opinion.
    let foreign = client
        .send(json!({"cmd": "remove_opinion", "theory": 10, "user": 2, "by": 1}))
        .await;
    assert_eq!(foreign["status"], "error");
}

#[tokio::test]
async fn sweep_records_every_expired_poll() {
    let (mut client, _dir) = start().await;
    for user in [1, 2, 3, 4] {
        client
            .send(json!({"cmd": "register_user", "user": user, "joined_at": "2024-01-01T00:00:00Z"}))
            .await;
    }
    client
        .send(json!({"cmd": "assign_level", "user": 2, "level": 3, "at": "2024-01-02T00:00:00Z"}))
        .await;

    for _ in 0..3 {
        let report = client
            .send(json!({"cmd": "report_violation", "offender": 3, "reporter": 4, "at": "2024-01-03T10:00:00Z"}))
            .await;
        let id = report["violation"]["id"].clone();
        client
            .send(json!({"cmd": "vote", "violation": id, "voter": 2, "action": "accept", "at": "2024-01-03T10:00:00Z"}))
            .await;
    }

    let swept = client
        .send(json!({"cmd": "sweep_violations", "at": "2024-01-20T00:00:00Z"}))
        .await;
    assert_eq!(swept["status"], "verdicts");
    assert_eq!(swept["items"].as_array().unwrap().len(), 3);

    let user = client.send(json!({"cmd": "get_user", "user": 3})).await;
    assert_eq!(user["user"]["strikes"].as_array().unwrap().len(), 3);
    assert_eq!(user["user"]["level"], 0);
}

#[test]
fn commands_run_without_a_socket() {
    let state = WikioState::new(CoreConfig::default());
    let response = tokio_test::block_on(execute_command(AdminCommand::Ping, &state));
    assert!(matches!(response, AdminResponse::Pong));

    let missing = tokio_test::block_on(execute_command(
        AdminCommand::GetViolation { violation: 42 },
        &state,
    ));
    assert!(matches!(missing, AdminResponse::Error { .. }));
}
