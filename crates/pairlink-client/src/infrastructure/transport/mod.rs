//! Transport: the single line-oriented connection to one peer.
//!
//! `Transport` implements [`LineTransport`] on top of any
//! [`PlatformAdapter`].  It owns at most one connection at a time:
//!
//! ```text
//!            connect()                      socket.connect() ok
//!   Idle ───────────────> Connecting{gen} ──────────────────> Connected(conn)
//!    ▲                          │                                  │
//!    └───────── close() ────────┴───────────── close() ────────────┘
//! ```
//!
//! # Connect steps
//!
//! 1. allocate a socket bound to the service identifier
//! 2. derive the write channel (release 1 on failure)
//! 3. derive the read channel (release 1 and 2 on failure)
//! 4. cancel peer discovery
//! 5. transport-level connect (release everything on failure)
//!
//! The slot is marked `Connecting` with a fresh generation before step 1,
//! and the socket is attached to it once steps 1-3 succeed.  A `close()`
//! from another thread at any point clears the slot: before the socket is
//! attached, connect notices the cleared generation, releases what it
//! allocated and stops before step 4; afterwards, `close()` closes the
//! socket itself, which unblocks step 5.
//!
//! # Close racing I/O
//!
//! `read_line` clones the connection out of the slot and blocks on its
//! reader lock without holding the slot lock.  `close()` empties the slot,
//! closes the socket (which makes the pending read fail), and only
//! `try_lock`s the reader and writer, so it never waits behind I/O.  A
//! channel still held by in-flight I/O is dropped when that I/O returns.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use pairlink_core::{decode_line, encode_line, PeerIdentifier, ServiceId};
use tracing::{debug, info, warn};

use crate::application::ports::{LineTransport, PeerSocket, PlatformAdapter, TransportError};

type LineReader = BufReader<Box<dyn Read + Send>>;
type LineWriter = Box<dyn Write + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes the value out of `mutex` unless another thread is using it.
fn try_take<T>(mutex: &Mutex<Option<T>>) -> Result<Option<T>, ()> {
    match mutex.try_lock() {
        Ok(mut guard) => Ok(guard.take()),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner().take()),
        Err(TryLockError::WouldBlock) => Err(()),
    }
}

fn release_socket(socket: &dyn PeerSocket) {
    if let Err(e) = socket.close() {
        warn!("could not close socket: {e}");
    }
}

/// A live session with one peer.
struct Connection {
    peer: PeerIdentifier,
    socket: Arc<dyn PeerSocket>,
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<Option<LineWriter>>,
}

impl Connection {
    /// Best-effort teardown; each resource is released independently.
    fn release(&self) {
        info!(peer = %self.peer, "closing connection");

        // Socket first: it unblocks a read or write stuck on another thread.
        release_socket(self.socket.as_ref());

        match try_take(&self.writer) {
            Ok(Some(mut writer)) => {
                if let Err(e) = writer.flush() {
                    debug!("discarding unflushed output: {e}");
                }
            }
            Ok(None) => {}
            Err(()) => debug!("write in progress; writer released when it returns"),
        }

        if try_take(&self.reader).is_err() {
            debug!("read in progress; reader released when it returns");
        }
    }
}

enum Link {
    Idle,
    Connecting {
        generation: u64,
        socket: Option<Arc<dyn PeerSocket>>,
    },
    Connected(Arc<Connection>),
}

/// Line transport over a platform socket.
pub struct Transport {
    adapter: Arc<dyn PlatformAdapter>,
    link: Mutex<Link>,
    generation: AtomicU64,
}

impl Transport {
    /// Creates a transport with no connection.
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            adapter,
            link: Mutex::new(Link::Idle),
            generation: AtomicU64::new(0),
        }
    }

    fn current(&self) -> Option<Arc<Connection>> {
        match &*lock(&self.link) {
            Link::Connected(connection) => Some(Arc::clone(connection)),
            _ => None,
        }
    }

    /// Claims the slot for a new connect and returns its generation.
    fn begin_pending(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.link) = Link::Connecting {
            generation,
            socket: None,
        };
        generation
    }

    /// Attaches `socket` to the pending slot.  `false` if `close()` cleared
    /// the slot since `generation` was claimed.
    fn attach_socket(&self, generation: u64, socket: &Arc<dyn PeerSocket>) -> bool {
        let mut link = lock(&self.link);
        match &mut *link {
            Link::Connecting {
                generation: g,
                socket: slot,
            } if *g == generation => {
                *slot = Some(Arc::clone(socket));
                true
            }
            _ => false,
        }
    }

    /// Clears the `Connecting` slot if it still belongs to `generation`.
    fn abandon_pending(&self, generation: u64) {
        let mut link = lock(&self.link);
        if matches!(&*link, Link::Connecting { generation: g, .. } if *g == generation) {
            *link = Link::Idle;
        }
    }
}

impl LineTransport for Transport {
    fn connect(&self, peer: &PeerIdentifier, service_id: &ServiceId) -> Result<(), TransportError> {
        if !matches!(&*lock(&self.link), Link::Idle) {
            warn!("connect requested while a connection exists; closing it first");
            self.close();
        }

        let generation = self.begin_pending();

        debug!(%peer, %service_id, "allocating socket");
        let socket = match self.adapter.create_socket(peer, service_id) {
            Ok(socket) => socket,
            Err(source) => {
                self.abandon_pending(generation);
                return Err(TransportError::SocketUnavailable {
                    peer: peer.clone(),
                    source,
                });
            }
        };

        let writer = match socket.output_stream() {
            Ok(writer) => writer,
            Err(e) => {
                self.abandon_pending(generation);
                release_socket(socket.as_ref());
                return Err(TransportError::OutputUnavailable(e));
            }
        };

        let reader = match socket.input_stream() {
            Ok(reader) => reader,
            Err(e) => {
                self.abandon_pending(generation);
                drop(writer);
                release_socket(socket.as_ref());
                return Err(TransportError::InputUnavailable(e));
            }
        };

        if !self.attach_socket(generation, &socket) {
            debug!(%peer, "closed while allocating; not connecting");
            drop(reader);
            drop(writer);
            release_socket(socket.as_ref());
            return Err(TransportError::Closed);
        }

        self.adapter.cancel_discovery();

        debug!(%peer, "connecting socket");
        if let Err(source) = socket.connect() {
            self.abandon_pending(generation);
            drop(reader);
            drop(writer);
            release_socket(socket.as_ref());
            return Err(TransportError::ConnectFailed {
                peer: peer.clone(),
                source,
            });
        }

        let connection = Arc::new(Connection {
            peer: peer.clone(),
            socket,
            reader: Mutex::new(Some(BufReader::new(reader))),
            writer: Mutex::new(Some(writer)),
        });

        {
            let mut link = lock(&self.link);
            if matches!(&*link, Link::Connecting { generation: g, .. } if *g == generation) {
                *link = Link::Connected(connection);
                info!(%peer, "transport connected");
                return Ok(());
            }
        }

        debug!(%peer, "socket was closed while connecting");
        connection.release();
        Err(TransportError::Closed)
    }

    fn read_line(&self) -> Option<String> {
        let connection = self.current()?;
        let mut guard = lock(&connection.reader);
        let reader = guard.as_mut()?;

        let mut raw = String::new();
        match reader.read_line(&mut raw) {
            Ok(0) => {
                debug!(peer = %connection.peer, "stream closed by peer");
                None
            }
            Ok(_) => Some(decode_line(&raw).to_string()),
            Err(e) => {
                warn!(peer = %connection.peer, "could not read the next line: {e}");
                None
            }
        }
    }

    fn write_line(&self, text: &str) -> bool {
        let Some(connection) = self.current() else {
            return false;
        };
        let framed = match encode_line(text) {
            Ok(framed) => framed,
            Err(e) => {
                warn!("refusing to write record: {e}");
                return false;
            }
        };

        let mut guard = lock(&connection.writer);
        let Some(writer) = guard.as_mut() else {
            return false;
        };
        match writer
            .write_all(framed.as_bytes())
            .and_then(|()| writer.flush())
        {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %connection.peer, "could not send line: {e}");
                false
            }
        }
    }

    fn close(&self) {
        let previous = std::mem::replace(&mut *lock(&self.link), Link::Idle);
        match previous {
            Link::Idle => debug!("close requested with no connection"),
            Link::Connecting {
                socket: Some(socket),
                ..
            } => {
                info!("closing socket while connect is in progress");
                release_socket(socket.as_ref());
            }
            Link::Connecting { socket: None, .. } => {
                info!("abandoning connect while the socket is being allocated");
            }
            Link::Connected(connection) => connection.release(),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> bool {
        let Some(connection) = self.current() else {
            return false;
        };
        match connection.socket.set_read_timeout(timeout) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not set read timeout {timeout:?}: {e}");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    fn connected_peer(&self) -> Option<PeerIdentifier> {
        self.current().map(|connection| connection.peer.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
