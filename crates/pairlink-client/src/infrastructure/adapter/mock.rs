//! In-memory platform adapter with scripted peers.
//!
//! Used by the test suites and by `--mock` runs of the CLI.  Each paired
//! peer owns one [`MockSocket`] whose behaviour is fixed up front:
//!
//! | Behaviour    | After the client writes a line            |
//! |--------------|-------------------------------------------|
//! | `Reply(s)`   | the peer sends `s` followed by `\n`       |
//! | `Silent`     | nothing; reads block until timeout/close  |
//! | `HangUp`     | the stream ends (read returns 0 bytes)    |
//!
//! Individual connect steps can be made to fail, and `connect` can be held
//! at a gate so tests can act while it is in progress.  The adapter has a
//! gate of its own that holds `create_socket` the same way.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pairlink_core::{PeerIdentifier, ServiceId};
use tracing::debug;

use crate::application::ports::{PeerSocket, PlatformAdapter};

/// What the scripted peer does once it receives a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behaviour {
    Reply(String),
    Silent,
    HangUp,
}

/// A connect step that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    Output,
    Input,
    Connect,
}

#[derive(Default)]
struct SocketState {
    closed: bool,
    connecting: bool,
    connect_released: bool,
    waiting_readers: usize,
    hung_up: bool,
    inbound: VecDeque<u8>,
    partial_line: Vec<u8>,
    written_lines: Vec<String>,
    read_timeout: Option<Duration>,
    connect_calls: usize,
    close_calls: usize,
}

struct Shared {
    behaviour: Behaviour,
    state: Mutex<SocketState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SocketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until(
        &self,
        timeout: Duration,
        mut ready: impl FnMut(&SocketState) -> bool,
    ) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| !ready(&*state))
            .unwrap_or_else(PoisonError::into_inner);
        ready(&*guard)
    }
}

/// A scripted stream socket.
pub struct MockSocket {
    shared: Arc<Shared>,
    fail_at: Option<ConnectStep>,
    gated: bool,
}

impl MockSocket {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            shared: Arc::new(Shared {
                behaviour,
                state: Mutex::new(SocketState::default()),
                changed: Condvar::new(),
            }),
            fail_at: None,
            gated: false,
        }
    }

    /// A peer that answers every line with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::new(Behaviour::Reply(reply.into()))
    }

    pub fn silent() -> Self {
        Self::new(Behaviour::Silent)
    }

    pub fn hanging_up() -> Self {
        Self::new(Behaviour::HangUp)
    }

    /// Makes `step` fail with an I/O error.
    pub fn failing_at(mut self, step: ConnectStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Holds `connect` until [`release_connect`](Self::release_connect) or
    /// `close` is called.
    pub fn with_connect_gate(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn release_connect(&self) {
        self.shared.lock().connect_released = true;
        self.shared.changed.notify_all();
    }

    /// Waits until a gated `connect` has started.
    pub fn wait_until_connecting(&self, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |s| s.connecting)
    }

    /// Waits until a read is blocked on this socket.
    pub fn wait_until_reading(&self, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |s| s.waiting_readers > 0)
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.shared.lock().written_lines.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn connect_calls(&self) -> usize {
        self.shared.lock().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.shared.lock().close_calls
    }

    /// Clears per-connection state so the socket can be handed out again.
    /// Counters and the written-line history are kept.
    fn reopen(&self) {
        let mut state = self.shared.lock();
        state.closed = false;
        state.connecting = false;
        state.hung_up = false;
        state.inbound.clear();
        state.partial_line.clear();
        state.read_timeout = None;
    }

    fn injected(&self, step: ConnectStep) -> io::Result<()> {
        if self.fail_at == Some(step) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected {step:?} failure"),
            ));
        }
        Ok(())
    }
}

impl PeerSocket for MockSocket {
    fn output_stream(&self) -> io::Result<Box<dyn Write + Send>> {
        self.injected(ConnectStep::Output)?;
        Ok(Box::new(MockWriter {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        self.injected(ConnectStep::Input)?;
        Ok(Box::new(MockReader {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn connect(&self) -> io::Result<()> {
        let mut state = self.shared.lock();
        state.connect_calls += 1;
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        drop(state);
        self.injected(ConnectStep::Connect)?;

        if self.gated {
            let mut state = self.shared.lock();
            state.connecting = true;
            self.shared.changed.notify_all();
            let state = self
                .shared
                .changed
                .wait_while(state, |s| !s.connect_released && !s.closed)
                .unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "socket closed while connecting",
                ));
            }
        }
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        let mut state = self.shared.lock();
        state.close_calls += 1;
        state.closed = true;
        self.shared.changed.notify_all();
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        if timeout == Some(Duration::ZERO) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot set a 0 duration timeout",
            ));
        }
        self.shared.lock().read_timeout = timeout;
        Ok(())
    }
}

struct MockWriter {
    shared: Arc<Shared>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }

        for &byte in buf {
            if byte != b'\n' {
                state.partial_line.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&state.partial_line).into_owned();
            state.partial_line.clear();
            debug!(%line, "mock peer received line");
            state.written_lines.push(line);

            match &self.shared.behaviour {
                Behaviour::Reply(reply) => {
                    state.inbound.extend(reply.as_bytes());
                    state.inbound.push_back(b'\n');
                }
                Behaviour::HangUp => state.hung_up = true,
                Behaviour::Silent => {}
            }
        }
        self.shared.changed.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MockReader {
    shared: Arc<Shared>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        let deadline = state.read_timeout.map(|t| Instant::now() + t);

        state.waiting_readers += 1;
        self.shared.changed.notify_all();

        let result = loop {
            if state.closed {
                break Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "socket closed",
                ));
            }
            if !state.inbound.is_empty() {
                let n = buf.len().min(state.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                break Ok(n);
            }
            if state.hung_up {
                break Ok(0);
            }

            state = match deadline {
                None => self
                    .shared
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(io::ErrorKind::TimedOut.into());
                    }
                    self.shared
                        .changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        };

        state.waiting_readers -= 1;
        result
    }
}

#[derive(Default)]
struct AllocationGate {
    held: bool,
    waiting: bool,
}

/// In-memory [`PlatformAdapter`].
pub struct MockAdapter {
    hardware: bool,
    enabled: AtomicBool,
    peers: Vec<(PeerIdentifier, Arc<MockSocket>)>,
    discovery_cancels: AtomicUsize,
    sockets_created: AtomicUsize,
    allocation: Mutex<AllocationGate>,
    allocation_changed: Condvar,
}

impl MockAdapter {
    /// An adapter with hardware present, switched on, and no paired peers.
    pub fn new() -> Self {
        Self {
            hardware: true,
            enabled: AtomicBool::new(true),
            peers: Vec::new(),
            discovery_cancels: AtomicUsize::new(0),
            sockets_created: AtomicUsize::new(0),
            allocation: Mutex::new(AllocationGate::default()),
            allocation_changed: Condvar::new(),
        }
    }

    /// A device with no short-range wireless hardware at all.
    pub fn without_hardware() -> Self {
        Self {
            hardware: false,
            enabled: AtomicBool::new(false),
            ..Self::new()
        }
    }

    /// Pairs `peer`; sockets created for it are backed by `socket`.
    pub fn with_peer(mut self, peer: PeerIdentifier, socket: Arc<MockSocket>) -> Self {
        self.peers.push((peer, socket));
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn discovery_cancels(&self) -> usize {
        self.discovery_cancels.load(Ordering::SeqCst)
    }

    pub fn sockets_created(&self) -> usize {
        self.sockets_created.load(Ordering::SeqCst)
    }

    /// Holds every `create_socket` call until [`release_allocation`] is called.
    ///
    /// [`release_allocation`]: MockAdapter::release_allocation
    pub fn with_allocation_gate(self) -> Self {
        self.lock_allocation().held = true;
        self
    }

    /// Waits until a `create_socket` call is held at the gate.
    pub fn wait_until_allocating(&self, timeout: Duration) -> bool {
        let guard = self.lock_allocation();
        let (guard, _) = self
            .allocation_changed
            .wait_timeout_while(guard, timeout, |gate| !gate.waiting)
            .unwrap_or_else(PoisonError::into_inner);
        guard.waiting
    }

    pub fn release_allocation(&self) {
        self.lock_allocation().held = false;
        self.allocation_changed.notify_all();
    }

    fn lock_allocation(&self) -> MutexGuard<'_, AllocationGate> {
        self.allocation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pass_allocation_gate(&self) {
        let mut gate = self.lock_allocation();
        if !gate.held {
            return;
        }
        gate.waiting = true;
        self.allocation_changed.notify_all();
        let mut gate = self
            .allocation_changed
            .wait_while(gate, |gate| gate.held)
            .unwrap_or_else(PoisonError::into_inner);
        gate.waiting = false;
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for MockAdapter {
    fn has_hardware(&self) -> bool {
        self.hardware
    }

    fn is_enabled(&self) -> bool {
        self.hardware && self.enabled.load(Ordering::SeqCst)
    }

    fn bonded_peers(&self) -> Vec<PeerIdentifier> {
        self.peers.iter().map(|(peer, _)| peer.clone()).collect()
    }

    fn cancel_discovery(&self) {
        self.discovery_cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn create_socket(
        &self,
        peer: &PeerIdentifier,
        service_id: &ServiceId,
    ) -> io::Result<Arc<dyn PeerSocket>> {
        self.pass_allocation_gate();
        if !self.is_enabled() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "adapter is disabled",
            ));
        }
        let socket = self
            .peers
            .iter()
            .find(|(known, _)| known.address().eq_ignore_ascii_case(peer.address()))
            .map(|(_, socket)| Arc::clone(socket))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{peer} is not paired"))
            })?;

        debug!(%peer, %service_id, "mock socket created");
        socket.reopen();
        self.sockets_created.fetch_add(1, Ordering::SeqCst);
        Ok(socket)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
