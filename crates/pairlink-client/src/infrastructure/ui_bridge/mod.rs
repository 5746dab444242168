//! Command bridge between the pairing client and a UI front end.
//!
//! A presentation layer (a Tauri WebView, a mobile shell, a test harness)
//! calls these async commands and receives serializable DTOs:
//!
//! ```text
//! UI                               Rust backend
//! ─────────────────────────────────────────────────────────────
//! invoke("start_connection", q) ──>  start_connection(state, q)
//!                               <──  ClientCommandResult<AttemptStartedDto>
//! invoke("get_connection_state")──>  get_connection_state(state)
//!                               <──  ClientCommandResult<ConnectionStateDto>
//! ```
//!
//! # `ClientCommandResult<T>`
//!
//! Every command returns the same envelope:
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "..."  }
//! ```
//!
//! # Outcomes
//!
//! `start_connection` returns as soon as the attempt is running.  A spawned
//! task waits for the outcome and records it in `ClientAppState`; the UI
//! polls `get_connection_state` to learn how the attempt ended.  The record
//! is keyed by attempt id: an outcome is only stored while its attempt is
//! still the latest one started.
//!
//! # Adapter status
//!
//! `subscribe_adapter_status` pushes the adapter's "On/Off" status whenever
//! it changes, so the status panel does not have to poll.

use std::sync::Arc;
use std::time::Duration;

use pairlink_core::{HandshakeOutcome, PeerIdentifier};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tracing::debug;
use uuid::Uuid;

use crate::application::connect_to_peer::ConnectionOrchestrator;
use crate::application::query_adapter::{AdapterCapabilities, AdapterStatus};

// ── Shared application state ──────────────────────────────────────────────────

/// Buffered status updates per subscriber.
const STATUS_CHANNEL_CAPACITY: usize = 8;

/// The latest attempt started from the UI and, once it ended, its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_id: Option<Uuid>,
    pub outcome: Option<HandshakeOutcome>,
}

/// Runtime state shared between UI commands.
pub struct ClientAppState {
    pub capabilities: AdapterCapabilities,
    pub orchestrator: ConnectionOrchestrator,
    pub last_attempt: Mutex<AttemptRecord>,
}

impl ClientAppState {
    pub fn new(
        capabilities: AdapterCapabilities,
        orchestrator: ConnectionOrchestrator,
    ) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            orchestrator,
            last_attempt: Mutex::new(AttemptRecord::default()),
        })
    }
}

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Returned by `start_connection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStartedDto {
    pub attempt_id: Uuid,
    pub peer: PeerIdentifier,
}

/// Snapshot for the connection status display.
///
/// `state` is the lowercase phase name (`"idle"`, `"connecting"`,
/// `"handshaking"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStateDto {
    pub state: String,
    pub connected_peer: Option<PeerIdentifier>,
    pub last_attempt_id: Option<Uuid>,
    /// Outcome of `last_attempt_id`; `None` while it is still running.
    pub last_outcome: Option<HandshakeOutcome>,
}

/// Unified response wrapper for client commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientCommandResult<T: Serialize> {
    /// `true` if the command completed successfully; `false` on error.
    pub success: bool,
    /// The command's return value, present only when `success` is `true`.
    pub data: Option<T>,
    /// A human-readable error message, present only when `success` is `false`.
    pub error: Option<String>,
}

impl<T: Serialize> ClientCommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// "Bluetooth available" and "State: On/Off" for the status panel.
pub async fn get_adapter_status(state: Arc<ClientAppState>) -> ClientCommandResult<AdapterStatus> {
    ClientCommandResult::ok(state.capabilities.snapshot())
}

/// Paired peers for the device list; empty while the adapter is off.
pub async fn list_paired_peers(
    state: Arc<ClientAppState>,
) -> ClientCommandResult<Vec<PeerIdentifier>> {
    ClientCommandResult::ok(state.capabilities.list_known_peers())
}

/// Starts an attempt to the paired peer whose name or address is `query`.
pub async fn start_connection(
    state: Arc<ClientAppState>,
    query: String,
) -> ClientCommandResult<AttemptStartedDto> {
    if !state.capabilities.is_enabled() {
        return ClientCommandResult::err("wireless adapter is missing or switched off");
    }
    let Some(peer) = state
        .capabilities
        .list_known_peers()
        .into_iter()
        .find(|peer| peer.matches(&query))
    else {
        return ClientCommandResult::err(format!("no paired peer matches '{query}'"));
    };

    let handle = match state.orchestrator.start(peer) {
        Ok(handle) => handle,
        Err(e) => return ClientCommandResult::err(e.to_string()),
    };
    let started = AttemptStartedDto {
        attempt_id: handle.id(),
        peer: handle.peer().clone(),
    };

    *state.last_attempt.lock().await = AttemptRecord {
        attempt_id: Some(started.attempt_id),
        outcome: None,
    };
    let recorder = Arc::clone(&state);
    tokio::spawn(async move {
        let attempt_id = handle.id();
        let outcome = handle.outcome().await;
        let mut record = recorder.last_attempt.lock().await;
        if record.attempt_id == Some(attempt_id) {
            debug!(%attempt_id, %outcome, "recording attempt outcome for the UI");
            record.outcome = Some(outcome);
        } else {
            debug!(%attempt_id, "dropping outcome of a superseded attempt");
        }
    });

    ClientCommandResult::ok(started)
}

/// Cancels the attempt in flight; `data` is `false` when there was none.
pub async fn cancel_connection(state: Arc<ClientAppState>) -> ClientCommandResult<bool> {
    ClientCommandResult::ok(state.orchestrator.cancel())
}

pub async fn get_connection_state(
    state: Arc<ClientAppState>,
) -> ClientCommandResult<ConnectionStateDto> {
    let record = state.last_attempt.lock().await.clone();
    ClientCommandResult::ok(ConnectionStateDto {
        state: state.orchestrator.state().to_string(),
        connected_peer: state.orchestrator.transport().connected_peer(),
        last_attempt_id: record.attempt_id,
        last_outcome: record.outcome,
    })
}

/// Streams the adapter status: the current value first, then every change.
///
/// The adapter is sampled every `period`.  The background task stops once the
/// receiver is dropped.  Must be called from within a Tokio runtime.
pub fn subscribe_adapter_status(
    state: Arc<ClientAppState>,
    period: Duration,
) -> mpsc::Receiver<AdapterStatus> {
    let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        let mut last: Option<AdapterStatus> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }

            let status = state.capabilities.snapshot();
            if last == Some(status) {
                continue;
            }
            debug!(enabled = status.enabled, "adapter status changed");
            if tx.send(status).await.is_err() {
                break;
            }
            last = Some(status);
        }
        debug!("adapter status subscriber went away");
    });

    rx
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pairlink_core::AttemptState;

    use super::*;
    use crate::application::connect_to_peer::AttemptConfig;
    use crate::application::ports::PlatformAdapter;
    use crate::infrastructure::adapter::{MockAdapter, MockSocket};
    use crate::infrastructure::transport::Transport;

    fn server() -> PeerIdentifier {
        PeerIdentifier::new("bench-server", "00:11:22:33:44:55")
    }

    fn make_state(socket: MockSocket) -> (Arc<MockAdapter>, Arc<ClientAppState>) {
        let adapter = Arc::new(MockAdapter::new().with_peer(server(), Arc::new(socket)));
        let platform: Arc<dyn PlatformAdapter> = adapter.clone();
        let transport = Arc::new(Transport::new(Arc::clone(&platform)));
        let state = ClientAppState::new(
            AdapterCapabilities::new(platform),
            ConnectionOrchestrator::new(
                transport,
                AttemptConfig {
                    handshake_timeout: Some(Duration::from_millis(200)),
                    ..AttemptConfig::default()
                },
            ),
        );
        (adapter, state)
    }

    async fn wait_for_outcome(state: &Arc<ClientAppState>) -> HandshakeOutcome {
        for _ in 0..200 {
            if let Some(outcome) = state.last_attempt.lock().await.outcome.clone() {
                return outcome;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no outcome recorded");
    }

    #[tokio::test]
    async fn test_get_adapter_status_reports_enabled_mock() {
        let (_adapter, state) = make_state(MockSocket::silent());

        let result = get_adapter_status(state).await;

        assert!(result.success);
        let status = result.data.unwrap();
        assert!(status.has_hardware);
        assert!(status.enabled);
    }

    #[tokio::test]
    async fn test_list_paired_peers_is_empty_when_adapter_off() {
        // Arrange
        let (adapter, state) = make_state(MockSocket::silent());
        adapter.set_enabled(false);

        // Act
        let result = list_paired_peers(state).await;

        // Assert
        assert!(result.success);
        assert!(result.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_connection_records_success_and_keeps_connection() {
        // Arrange
        let (_adapter, state) = make_state(MockSocket::replying("$ConAck$"));

        // Act
        let started = start_connection(Arc::clone(&state), "bench-server".into()).await;
        let outcome = wait_for_outcome(&state).await;

        // Assert
        assert!(started.success);
        assert_eq!(started.data.unwrap().peer, server());
        assert!(outcome.is_success());
        let snapshot = get_connection_state(state).await.data.unwrap();
        assert_eq!(snapshot.state, "idle");
        assert_eq!(snapshot.connected_peer, Some(server()));
    }

    #[tokio::test]
    async fn test_start_connection_accepts_address_query() {
        let (_adapter, state) = make_state(MockSocket::replying("$ConAck$"));

        let started = start_connection(Arc::clone(&state), "00:11:22:33:44:55".into()).await;

        assert!(started.success);
        wait_for_outcome(&state).await;
    }

    #[tokio::test]
    async fn test_start_connection_unknown_peer_is_an_error() {
        let (_adapter, state) = make_state(MockSocket::silent());

        let result = start_connection(state, "nobody".into()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_start_connection_refused_while_in_flight() {
        // Arrange
        let (_adapter, state) = make_state(MockSocket::silent().with_connect_gate());
        assert!(start_connection(Arc::clone(&state), "bench-server".into()).await.success);

        // Act
        let second = start_connection(Arc::clone(&state), "bench-server".into()).await;

        // Assert
        assert!(!second.success);
        assert!(cancel_connection(Arc::clone(&state)).await.data.unwrap());
        assert!(wait_for_outcome(&state).await.was_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_connection_when_idle_returns_false() {
        let (_adapter, state) = make_state(MockSocket::silent());

        let result = cancel_connection(state).await;

        assert!(result.success);
        assert_eq!(result.data, Some(false));
    }

    #[tokio::test]
    async fn test_connection_state_serializes_outcome_for_ui() {
        // Arrange
        let (_adapter, state) = make_state(MockSocket::replying("garbage"));
        start_connection(Arc::clone(&state), "bench-server".into()).await;
        wait_for_outcome(&state).await;

        // Act
        let dto = get_connection_state(state).await.data.unwrap();
        let json = serde_json::to_value(&dto).unwrap();

        // Assert
        assert_eq!(json["state"], "idle");
        assert_eq!(json["last_outcome"]["kind"], "rejected");
        assert!(json["connected_peer"].is_null());
    }

    #[tokio::test]
    async fn test_outcome_of_superseded_attempt_is_not_recorded() {
        // Arrange: "fast" acks at once, "slow" is held at connect.
        let fast = PeerIdentifier::new("fast", "00:00:00:00:00:01");
        let slow = PeerIdentifier::new("slow", "00:00:00:00:00:02");
        let adapter = Arc::new(
            MockAdapter::new()
                .with_peer(fast, Arc::new(MockSocket::replying("$ConAck$")))
                .with_peer(slow, Arc::new(MockSocket::silent().with_connect_gate())),
        );
        let platform: Arc<dyn PlatformAdapter> = adapter.clone();
        let state = ClientAppState::new(
            AdapterCapabilities::new(Arc::clone(&platform)),
            ConnectionOrchestrator::new(
                Arc::new(Transport::new(platform)),
                AttemptConfig::default(),
            ),
        );

        // Let the first attempt finish without yielding, so its recorder
        // task has not run yet when the second attempt starts.
        assert!(start_connection(Arc::clone(&state), "fast".into()).await.success);
        for _ in 0..500 {
            if state.orchestrator.state() == AttemptState::Idle {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(state.orchestrator.state(), AttemptState::Idle);

        // Act
        let second = start_connection(Arc::clone(&state), "slow".into()).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let during = get_connection_state(Arc::clone(&state)).await.data.unwrap();

        // Assert
        let second_id = second.data.unwrap().attempt_id;
        assert_eq!(during.state, "connecting");
        assert_eq!(during.last_attempt_id, Some(second_id));
        assert!(during.last_outcome.is_none());

        assert!(cancel_connection(Arc::clone(&state)).await.data.unwrap());
        assert!(wait_for_outcome(&state).await.was_cancelled());
    }

    #[tokio::test]
    async fn test_subscribe_adapter_status_sends_current_then_changes() {
        // Arrange
        let (adapter, state) = make_state(MockSocket::silent());
        let mut updates = subscribe_adapter_status(state, Duration::from_millis(10));
        let wait = Duration::from_secs(5);

        // Act
        let first = tokio::time::timeout(wait, updates.recv()).await.unwrap();
        adapter.set_enabled(false);
        let second = tokio::time::timeout(wait, updates.recv()).await.unwrap();

        // Assert
        assert_eq!(
            first,
            Some(AdapterStatus {
                has_hardware: true,
                enabled: true,
            })
        );
        assert_eq!(
            second,
            Some(AdapterStatus {
                has_hardware: true,
                enabled: false,
            })
        );
    }

    #[tokio::test]
    async fn test_subscribe_adapter_status_is_quiet_while_unchanged() {
        let (_adapter, state) = make_state(MockSocket::silent());
        let mut updates = subscribe_adapter_status(state, Duration::from_millis(5));
        assert!(updates.recv().await.is_some());

        let next = tokio::time::timeout(Duration::from_millis(100), updates.recv()).await;

        assert!(next.is_err(), "no update expected while the status is unchanged");
    }

    #[test]
    fn test_client_command_result_ok_sets_success_true() {
        let r: ClientCommandResult<u32> = ClientCommandResult::ok(99);
        assert!(r.success);
        assert_eq!(r.data.unwrap(), 99);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_client_command_result_err_sets_success_false() {
        let r: ClientCommandResult<u32> = ClientCommandResult::err("oops");
        assert!(!r.success);
        assert!(r.data.is_none());
        assert_eq!(r.error.unwrap(), "oops");
    }
}
