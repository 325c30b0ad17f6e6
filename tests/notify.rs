//! Readiness protocol transports: socket roundtrips, size limits, and
//! the log file transport.

use procvisor::notify::{self, Client, LogClient, Server, SocketClient};
use procvisor::{Message, NotifyError};

#[tokio::test]
async fn socket_roundtrip_yields_canonical_messages() {
    let server = Server::generate();
    let bound = server.bind().unwrap();

    let mut client = SocketClient::open(server.path());
    client
        .send(&Message::new().with_ready(true).with_status("ok"))
        .await
        .unwrap();

    let received = bound.receive().await.unwrap();
    assert!(received.is_ready());
    assert_eq!(received.status(), Some("ok"));
}

#[tokio::test]
async fn socket_helpers_carry_the_field_conventions() {
    let server = Server::generate();
    let bound = server.bind().unwrap();
    let mut client = SocketClient::open(server.path());

    client.reloading().await.unwrap();
    let reloading = bound.receive().await.unwrap();
    assert!(reloading.is_reloading());
    assert!(!reloading.is_ready());
    assert_eq!(reloading.status(), Some("reloading"));

    client.error("bind failed", None).await.unwrap();
    let error = bound.receive().await.unwrap();
    assert_eq!(error.status(), Some("bind failed"));
    assert_eq!(error.errno(), Some(-1));
}

#[tokio::test]
async fn oversized_messages_are_rejected_locally() {
    let server = Server::generate();
    let _bound = server.bind().unwrap();
    let mut client = SocketClient::open(server.path());

    let huge = "x".repeat(notify::MAXIMUM_MESSAGE_SIZE);
    let result = client.send(&Message::new().with_status(huge)).await;
    match result {
        Err(NotifyError::MessageTooLarge { size, limit }) => {
            assert!(size > limit);
            assert_eq!(limit, notify::MAXIMUM_MESSAGE_SIZE);
        }
        other => panic!("expected MessageTooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn bound_server_unlinks_its_socket_on_drop() {
    let server = Server::generate();
    let bound = server.bind().unwrap();
    assert!(server.path().exists());

    drop(bound);
    assert!(!server.path().exists());
}

#[tokio::test]
async fn log_transport_appends_one_json_object_per_line() {
    let path = std::env::temp_dir().join(format!(
        "procvisor-notify-test-{}-{}.log",
        std::process::id(),
        line!()
    ));
    let _ = std::fs::remove_file(&path);

    let mut client = LogClient::open(&path);
    client.ready().await.unwrap();
    client.status("serving").await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Message> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].is_ready());
    assert_eq!(lines[1].status(), Some("serving"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn pid_field_identifies_the_sender() {
    let server = Server::generate();
    let bound = server.bind().unwrap();
    let mut client = SocketClient::open(server.path());

    client
        .send(&Message::new().with_ready(true).with_pid(std::process::id()))
        .await
        .unwrap();

    let received = bound.receive().await.unwrap();
    assert_eq!(received.pid(), Some(std::process::id()));
}
