//! End-to-end transport layer tests.
//!
//! A scripted authority listens on a loopback socket and speaks the
//! newline-delimited frame format, so these exercise real sockets end to end.

use std::time::Duration;

use authlink::client::{AutoAck, Client};
use authlink::protocol::{
    Credentials, Direction, LoginResult, Packet, PacketKind, SessionConfig, SessionId,
    SessionState,
};
use authlink::transport::{TcpTransport, Transport, TransportEvent};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn write_frame(writer: &mut OwnedWriteHalf, packet: &Packet) {
    writer
        .write_all(packet.to_frame().unwrap().as_bytes())
        .await
        .unwrap();
}

fn reply(kind: PacketKind, payload: Value) -> Packet {
    Packet::inbound(kind, Some(SessionId::new("tok-1")), payload.to_string())
}

#[tokio::test]
async fn test_full_handshake_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Authority: assign a token, check the device, accept the login.
    let authority = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();

        write_frame(
            &mut writer,
            &Packet::inbound(PacketKind::Session, Some(SessionId::new("tok-1")), ""),
        )
        .await;

        let hwid = Packet::from_frame(&lines.next_line().await.unwrap().unwrap()).unwrap();
        write_frame(&mut writer, &reply(PacketKind::HwidResp, json!({"status": 1}))).await;
        received.push(hwid);

        let login = Packet::from_frame(&lines.next_line().await.unwrap().unwrap()).unwrap();
        write_frame(
            &mut writer,
            &reply(
                PacketKind::LoginResp,
                json!({"result": 1, "games": {
                    "Zeta": {"id": 9, "x64": true, "version": "0.9", "process": "zeta.exe"},
                    "Alpha": {"id": 3, "x64": false, "version": "1.1", "process": "alpha.exe"}
                }}),
            ),
        )
        .await;
        received.push(login);

        // Client hangs up once it has acknowledged.
        assert!(lines.next_line().await.unwrap().is_none());
        received
    });

    let (mut transport, events) = TcpTransport::connect(addr).await.unwrap();
    let client = Client::new(
        SessionConfig::default().with_client_version("2.0"),
        Credentials::new("alice", "secret"),
    );

    let report = timeout(
        Duration::from_secs(5),
        client.run(&mut transport, events, &mut AutoAck),
    )
    .await
    .expect("handshake timed out")
    .unwrap();

    assert!(report.is_success());
    assert_eq!(report.state, SessionState::Shutdown);
    assert_eq!(report.login_result, LoginResult::Success);
    let names: Vec<_> = report.games.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha"]);
    assert!(!transport.is_open());

    let received = timeout(Duration::from_secs(5), authority)
        .await
        .expect("authority timed out")
        .unwrap();

    let hwid = &received[0];
    assert_eq!(hwid.kind, PacketKind::Hwid);
    assert_eq!(hwid.direction, Direction::Write);
    assert_eq!(hwid.session_id, Some(SessionId::new("tok-1")));
    let body: Value = serde_json::from_str(&hwid.payload).unwrap();
    assert_eq!(body["ver"], "2.0");
    assert!(body["hwid"].is_string());

    let login = &received[1];
    assert_eq!(login.kind, PacketKind::LoginReq);
    assert_eq!(login.payload, "alice,secret");
}

#[tokio::test]
async fn test_ban_closes_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let authority = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_frame(
            &mut writer,
            &Packet::inbound(PacketKind::Session, Some(SessionId::new("tok-1")), ""),
        )
        .await;
        let _hwid = lines.next_line().await.unwrap();
        write_frame(&mut writer, &Packet::inbound(PacketKind::Ban, None, "")).await;

        // Next read sees EOF: the client tore the connection down.
        lines.next_line().await.unwrap()
    });

    let (mut transport, events) = TcpTransport::connect(addr).await.unwrap();
    let client = Client::new(SessionConfig::default(), Credentials::new("user", "pass"));

    let report = timeout(
        Duration::from_secs(5),
        client.run(&mut transport, events, &mut AutoAck),
    )
    .await
    .expect("session timed out")
    .unwrap();

    assert_eq!(report.state, SessionState::Shutdown);
    assert!(report.failure.is_some());
    assert_eq!(report.login_result, LoginResult::Unknown);

    let trailing = timeout(Duration::from_secs(5), authority)
        .await
        .expect("authority timed out")
        .unwrap();
    assert!(trailing.is_none());
}

#[tokio::test]
async fn test_malformed_frame_and_close_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (_transport, mut events) = TcpTransport::connect(addr).await.unwrap();
    let (mut stream, _) = listener.accept().await.unwrap();

    stream.write_all(b"this is not a frame\n\n").await.unwrap();
    stream
        .write_all(
            Packet::inbound(PacketKind::Ban, None, "")
                .to_frame()
                .unwrap()
                .as_bytes(),
        )
        .await
        .unwrap();
    drop(stream);

    let mut collected = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_secs(5), events.recv()).await {
        let closed = event == TransportEvent::Closed;
        collected.push(event);
        if closed {
            break;
        }
    }

    assert_eq!(collected.len(), 4);
    assert_eq!(collected[0], TransportEvent::Connected);
    assert!(matches!(collected[1], TransportEvent::Malformed(_)));
    assert!(matches!(
        &collected[2],
        TransportEvent::Packet(packet) if packet.kind == PacketKind::Ban
    ));
    assert_eq!(collected[3], TransportEvent::Closed);
}

#[tokio::test]
async fn test_server_hangup_fails_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let authority = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let (mut transport, events) = TcpTransport::connect(addr).await.unwrap();
    let client = Client::new(SessionConfig::default(), Credentials::new("user", "pass"));

    let report = timeout(
        Duration::from_secs(5),
        client.run(&mut transport, events, &mut AutoAck),
    )
    .await
    .expect("session timed out")
    .unwrap();

    authority.await.unwrap();
    assert!(!report.is_success());
    assert!(report.session_id.is_none());
    assert_eq!(transport.name(), "TCP");
}
