//! End-to-end attempts over real TCP sockets on loopback.
//!
//! A tiny server thread plays the peer: it accepts one connection, reads the
//! request line, and answers according to the scenario.  The client side is
//! the production stack, `TcpAdapter` → `Transport` → `ConnectionOrchestrator`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pairlink_client::application::connect_to_peer::{AttemptConfig, ConnectionOrchestrator};
use pairlink_client::application::ports::LineTransport;
use pairlink_client::infrastructure::adapter::TcpAdapter;
use pairlink_client::infrastructure::transport::Transport;
use pairlink_core::{
    AttemptState, FailureReason, HandshakeOutcome, PeerIdentifier, RejectReason, ServiceId,
};
use uuid::Uuid;

/// What the server does after reading the request.
enum Server {
    Reply(&'static str),
    /// Holds the socket open without answering until the client leaves.
    Silent,
}

fn spawn_server(script: Server) -> (PeerIdentifier, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let peer = PeerIdentifier::new("loopback", listener.local_addr().unwrap().to_string());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request = String::new();
        reader.read_line(&mut request).unwrap();

        match script {
            Server::Reply(reply) => {
                let mut stream: &TcpStream = &stream;
                stream.write_all(reply.as_bytes()).unwrap();
                // Wait for the client to close so the reply is not lost to a reset.
                let mut rest = String::new();
                let _ = reader.read_line(&mut rest);
            }
            Server::Silent => {
                let mut rest = String::new();
                let _ = reader.read_line(&mut rest);
            }
        }
        request
    });
    (peer, handle)
}

fn orchestrator_for(peer: &PeerIdentifier, timeout: Duration) -> ConnectionOrchestrator {
    let adapter = TcpAdapter::new(vec![peer.clone()])
        .with_connect_timeout(Some(Duration::from_secs(2)));
    let transport = Arc::new(Transport::new(Arc::new(adapter)));
    ConnectionOrchestrator::new(
        transport,
        AttemptConfig {
            handshake_timeout: Some(timeout),
            ..AttemptConfig::default()
        },
    )
}

#[test]
fn test_tcp_server_acknowledging_request_is_accepted() {
    // Arrange
    let (peer, server) = spawn_server(Server::Reply("$ConAck$\n"));
    let orchestrator = orchestrator_for(&peer, Duration::from_secs(2));

    // Act
    let outcome = orchestrator.start(peer.clone()).unwrap().blocking_outcome();

    // Assert
    assert_eq!(outcome, HandshakeOutcome::Succeeded { peer: peer.clone() });
    let transport = orchestrator.transport();
    assert_eq!(transport.connected_peer(), Some(peer));
    transport.close();
    assert_eq!(server.join().unwrap(), "$ConReq$\n");
}

#[test]
fn test_tcp_server_replying_garbage_is_rejected() {
    let (peer, server) = spawn_server(Server::Reply("garbage\n"));
    let orchestrator = orchestrator_for(&peer, Duration::from_secs(2));

    let outcome = orchestrator.start(peer).unwrap().blocking_outcome();

    assert!(matches!(
        outcome,
        HandshakeOutcome::Rejected { reason: RejectReason::UnexpectedReply(ref s), .. } if s == "garbage"
    ));
    assert!(!orchestrator.transport().is_connected());
    server.join().unwrap();
}

#[test]
fn test_tcp_silent_server_is_rejected_after_timeout() {
    let (peer, server) = spawn_server(Server::Silent);
    let orchestrator = orchestrator_for(&peer, Duration::from_millis(200));

    let outcome = orchestrator.start(peer).unwrap().blocking_outcome();

    assert!(matches!(
        outcome,
        HandshakeOutcome::Rejected {
            reason: RejectReason::NoReply,
            ..
        }
    ));
    server.join().unwrap();
}

#[test]
fn test_tcp_unreachable_peer_fails() {
    // Arrange: a port with no listener.
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let peer = PeerIdentifier::new("gone", address);
    let orchestrator = orchestrator_for(&peer, Duration::from_secs(1));

    // Act
    let outcome = orchestrator.start(peer).unwrap().blocking_outcome();

    // Assert
    assert_eq!(outcome.terminal_state(), AttemptState::Failed);
    assert!(!orchestrator.transport().is_connected());
}

#[test]
fn test_tcp_nil_service_id_fails_at_socket_allocation() {
    // Arrange: a live listener that must never see a connection.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let peer = PeerIdentifier::new("loopback", listener.local_addr().unwrap().to_string());
    let transport = Arc::new(Transport::new(Arc::new(TcpAdapter::new(vec![peer.clone()]))));
    let orchestrator = ConnectionOrchestrator::new(
        transport,
        AttemptConfig {
            service_id: ServiceId::from_uuid(Uuid::nil()),
            handshake_timeout: Some(Duration::from_secs(1)),
        },
    );

    // Act
    let outcome = orchestrator.start(peer.clone()).unwrap().blocking_outcome();

    // Assert
    match outcome {
        HandshakeOutcome::Failed {
            peer: failed,
            reason: FailureReason::Transport(message),
        } => {
            assert_eq!(failed, peer);
            assert!(message.contains("nil"), "got {message}");
        }
        other => panic!("expected a transport failure, got {other}"),
    }
    assert!(listener.accept().is_err());
}

#[test]
fn test_tcp_cancel_during_handshake_read() {
    // Arrange: no reply and a long timeout, so only cancel ends the read.
    let (peer, server) = spawn_server(Server::Silent);
    let orchestrator = orchestrator_for(&peer, Duration::from_secs(30));
    let handle = orchestrator.start(peer).unwrap();
    while orchestrator.state() != AttemptState::Handshaking {
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(50));

    // Act
    assert!(orchestrator.cancel());
    let outcome = handle.blocking_outcome();

    // Assert
    assert!(outcome.was_cancelled());
    server.join().unwrap();
}
