//! ConnectionOrchestrator: runs one connection attempt at a time.
//!
//! # State machine
//!
//! ```text
//! Idle ─start─> Connecting ─ok─> Handshaking ─$ConAck$─> Succeeded ─┐
//!                   │                 │ other reply ───> Rejected  ─┤─> Idle, then deliver
//!                   └─error/cancel────┴─cancel─────────> Failed    ─┘
//! ```
//!
//! The attempt runs on its own `pairlink-attempt` thread because every step
//! (connect, handshake write, handshake read) blocks.  The caller gets an
//! [`AttemptHandle`] immediately and receives the outcome through a
//! single-shot channel, so each attempt delivers exactly one outcome.
//!
//! # Cancellation
//!
//! [`ConnectionOrchestrator::cancel`] flags the attempt and closes the
//! transport.  Closing the socket unblocks whatever call the attempt thread
//! is stuck in; the thread sees the I/O error, notices the flag, and reports
//! `Failed(Cancelled)`.  The thread is never killed.
//!
//! # Delivery order
//!
//! The orchestrator is back in `Idle` before the outcome is sent, so `start`
//! may be called from the code that receives it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use pairlink_core::{
    AttemptState, FailureReason, HandshakeOutcome, PeerIdentifier, ServiceId,
    DEFAULT_HANDSHAKE_TIMEOUT,
};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::perform_handshake::perform_handshake;
use super::ports::LineTransport;

/// Error type for [`ConnectionOrchestrator::start`].
#[derive(Debug, Error)]
pub enum StartError {
    /// Another attempt is still in flight.
    #[error("a connection attempt is already in progress ({0})")]
    AlreadyConnecting(AttemptState),
    /// The background thread could not be spawned.
    #[error("could not spawn the attempt thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Per-attempt settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptConfig {
    /// Service identifier every valid server listens on.
    pub service_id: ServiceId,
    /// Bound on the handshake read.  `None` waits until the stream closes.
    pub handshake_timeout: Option<Duration>,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            service_id: ServiceId::default(),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

/// Caller's end of one attempt.
///
/// Await [`AttemptHandle::outcome`] from async code or call
/// [`AttemptHandle::blocking_outcome`] from a plain thread.  Dropping the
/// handle does not cancel the attempt.
#[derive(Debug)]
pub struct AttemptHandle {
    id: Uuid,
    peer: PeerIdentifier,
    receiver: oneshot::Receiver<HandshakeOutcome>,
}

impl AttemptHandle {
    /// Identifier used in this attempt's log span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The peer being connected to.
    pub fn peer(&self) -> &PeerIdentifier {
        &self.peer
    }

    /// Waits for the terminal outcome.
    pub async fn outcome(self) -> HandshakeOutcome {
        let peer = self.peer;
        self.receiver.await.unwrap_or_else(|_| lost_outcome(peer))
    }

    /// Blocks the current thread until the terminal outcome arrives.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime context, like
    /// [`oneshot::Receiver::blocking_recv`].
    pub fn blocking_outcome(self) -> HandshakeOutcome {
        let peer = self.peer;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| lost_outcome(peer))
    }
}

/// Outcome reported if the attempt thread died without sending one.
fn lost_outcome(peer: PeerIdentifier) -> HandshakeOutcome {
    HandshakeOutcome::Failed {
        peer,
        reason: FailureReason::Transport("attempt ended without reporting an outcome".into()),
    }
}

/// Cancellation flag shared between the orchestrator and one attempt thread.
#[derive(Debug)]
struct AttemptControl {
    id: Uuid,
    cancelled: AtomicBool,
}

impl AttemptControl {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancelled: AtomicBool::new(false),
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Inner {
    state: AttemptState,
    current: Option<Arc<AttemptControl>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The Connect To Peer use case.
pub struct ConnectionOrchestrator {
    transport: Arc<dyn LineTransport>,
    config: AttemptConfig,
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionOrchestrator {
    /// Creates an idle orchestrator driving `transport`.
    pub fn new(transport: Arc<dyn LineTransport>, config: AttemptConfig) -> Self {
        Self {
            transport,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: AttemptState::Idle,
                current: None,
            })),
        }
    }

    /// The transport the attempts run on.  After a successful attempt the
    /// caller reads, writes and eventually closes the connection through it.
    pub fn transport(&self) -> Arc<dyn LineTransport> {
        Arc::clone(&self.transport)
    }

    pub fn config(&self) -> &AttemptConfig {
        &self.config
    }

    /// Current phase.  Always `Idle`, `Connecting` or `Handshaking`; terminal
    /// phases are reported through the outcome instead.
    pub fn state(&self) -> AttemptState {
        lock(&self.inner).state
    }

    /// Starts a connection attempt to `peer` and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::AlreadyConnecting`] while another attempt is in
    /// flight (that attempt is left untouched), or [`StartError::Spawn`] if
    /// the background thread could not be created.
    pub fn start(&self, peer: PeerIdentifier) -> Result<AttemptHandle, StartError> {
        let control = {
            let mut inner = lock(&self.inner);
            if inner.state != AttemptState::Idle {
                warn!(%peer, state = %inner.state, "refusing to start: already connecting");
                return Err(StartError::AlreadyConnecting(inner.state));
            }
            let control = Arc::new(AttemptControl::new());
            inner.state = AttemptState::Connecting;
            inner.current = Some(Arc::clone(&control));
            control
        };

        let (sender, receiver) = oneshot::channel();
        let id = control.id;
        let worker = AttemptWorker {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            control,
            peer: peer.clone(),
        };

        let spawned = thread::Builder::new()
            .name("pairlink-attempt".into())
            .spawn(move || worker.run(sender));

        if let Err(e) = spawned {
            let mut inner = lock(&self.inner);
            inner.state = AttemptState::Idle;
            inner.current = None;
            return Err(StartError::Spawn(e));
        }

        info!(%peer, attempt = %id, "connection attempt started");
        Ok(AttemptHandle { id, peer, receiver })
    }

    /// Cancels the attempt in flight, if any.
    ///
    /// Closes the transport, which makes the attempt report
    /// `Failed(Cancelled)`.  Returns `false` (and touches nothing) when no
    /// attempt is in flight, so a connection already handed to the caller is
    /// never closed by a late cancel.
    pub fn cancel(&self) -> bool {
        let inner = lock(&self.inner);
        match &inner.current {
            Some(control) if inner.state.is_in_flight() => {
                info!(attempt = %control.id, state = %inner.state, "cancelling connection attempt");
                control.cancel();
                // Closed under the lock so the attempt cannot finish and hand
                // over a fresh connection between the flag and the close.
                self.transport.close();
                true
            }
            _ => {
                debug!("cancel requested with no attempt in flight");
                false
            }
        }
    }
}

/// Everything the attempt thread owns.
struct AttemptWorker {
    transport: Arc<dyn LineTransport>,
    config: AttemptConfig,
    inner: Arc<Mutex<Inner>>,
    control: Arc<AttemptControl>,
    peer: PeerIdentifier,
}

impl AttemptWorker {
    fn run(self, sender: oneshot::Sender<HandshakeOutcome>) {
        let span = info_span!("attempt", id = %self.control.id, peer = %self.peer);
        let _entered = span.enter();

        let outcome = self.drive();
        self.finish(outcome, sender);
    }

    fn drive(&self) -> HandshakeOutcome {
        debug!(service = %self.config.service_id, "connecting");
        if let Err(e) = self.transport.connect(&self.peer, &self.config.service_id) {
            if self.control.is_cancelled() {
                return self.failed(FailureReason::Cancelled);
            }
            warn!(error = %e, "transport connect failed");
            return self.failed(FailureReason::Transport(e.to_string()));
        }

        if !self.advance(AttemptState::Handshaking) {
            self.transport.close();
            return self.failed(FailureReason::Cancelled);
        }

        match perform_handshake(self.transport.as_ref(), self.config.handshake_timeout) {
            Ok(()) => HandshakeOutcome::Succeeded {
                peer: self.peer.clone(),
            },
            Err(_) if self.control.is_cancelled() => self.failed(FailureReason::Cancelled),
            Err(reason) => HandshakeOutcome::Rejected {
                peer: self.peer.clone(),
                reason,
            },
        }
    }

    /// Moves to `next` unless the attempt was cancelled meanwhile.
    fn advance(&self, next: AttemptState) -> bool {
        let mut inner = lock(&self.inner);
        if self.control.is_cancelled() {
            return false;
        }
        debug!(from = %inner.state, to = %next, "attempt state change");
        inner.state = next;
        true
    }

    /// Resets to Idle, then delivers the outcome.
    fn finish(self, outcome: HandshakeOutcome, sender: oneshot::Sender<HandshakeOutcome>) {
        let outcome = {
            let mut inner = lock(&self.inner);
            // A cancel that raced a successful handshake still wins.
            let outcome = if outcome.is_success() && self.control.is_cancelled() {
                self.transport.close();
                self.failed(FailureReason::Cancelled)
            } else {
                outcome
            };
            debug!(terminal = %outcome.terminal_state(), "attempt reached terminal state");
            inner.state = AttemptState::Idle;
            inner.current = None;
            outcome
        };

        info!(%outcome, "connection attempt finished");
        if sender.send(outcome).is_err() {
            debug!("attempt handle was dropped before the outcome arrived");
        }
    }

    fn failed(&self, reason: FailureReason) -> HandshakeOutcome {
        HandshakeOutcome::Failed {
            peer: self.peer.clone(),
            reason,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
