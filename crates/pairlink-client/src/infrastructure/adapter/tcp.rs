//! TCP stand-in for a short-range wireless adapter.
//!
//! Lets the client talk to a server on the local network (or loopback)
//! when no radio stack is available.  The "paired" peers come from the
//! configuration file; a peer address is a `host:port` pair.  The service
//! identifier has no meaning over TCP beyond being non-nil.
//!
//! # Closing during a dial
//!
//! A blocking TCP dial cannot be interrupted from another thread.  `close()`
//! marks the socket closed; the dial checks that mark before each address it
//! tries, and discards a stream that arrives after it.  A close therefore
//! lands at most one `connect_timeout` after it was issued.  With no connect
//! timeout (`connect_timeout_ms = 0`) that bound is the OS dial timeout.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use pairlink_core::{PeerIdentifier, ServiceId};
use tracing::{debug, info};

use crate::application::ports::{PeerSocket, PlatformAdapter};

/// [`PlatformAdapter`] backed by plain TCP sockets.
#[derive(Debug, Clone)]
pub struct TcpAdapter {
    peers: Vec<PeerIdentifier>,
    enabled: bool,
    connect_timeout: Option<Duration>,
}

impl TcpAdapter {
    pub fn new(peers: Vec<PeerIdentifier>) -> Self {
        Self {
            peers,
            enabled: true,
            connect_timeout: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Bounds each connect attempt; `None` uses the OS default.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl PlatformAdapter for TcpAdapter {
    fn has_hardware(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bonded_peers(&self) -> Vec<PeerIdentifier> {
        self.peers.clone()
    }

    fn cancel_discovery(&self) {
        // TCP has no discovery to cancel.
    }

    fn create_socket(
        &self,
        peer: &PeerIdentifier,
        service_id: &ServiceId,
    ) -> io::Result<Arc<dyn PeerSocket>> {
        if !self.enabled {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "adapter is disabled",
            ));
        }
        if service_id.as_uuid().is_nil() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "service identifier must not be nil",
            ));
        }
        debug!(%peer, "allocating TCP socket");
        Ok(Arc::new(TcpPeerSocket::new(
            peer.address(),
            self.connect_timeout,
        )))
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    closed: bool,
    read_timeout: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    address: String,
    connect_timeout: Option<Duration>,
    stream: OnceLock<TcpStream>,
    lifecycle: Mutex<Lifecycle>,
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stream(&self) -> io::Result<&TcpStream> {
        self.stream
            .get()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }

    fn dial(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in self.address.to_socket_addrs()? {
            if self.lifecycle().closed {
                return Err(closed_while_connecting());
            }
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, "connect failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} resolved to no addresses", self.address),
            )
        }))
    }
}

fn closed_while_connecting() -> io::Error {
    io::Error::new(
        io::ErrorKind::ConnectionAborted,
        "socket closed while connecting",
    )
}

/// One TCP connection; the stream exists only after `connect`.
///
/// The read and write halves handed out before `connect` resolve the
/// stream lazily, and fail with `NotConnected` until it exists.  `close`
/// shuts the stream down, which ends any blocked read with EOF.  A close
/// issued while the dial is in flight takes effect as soon as the dial
/// returns.
#[derive(Debug)]
pub struct TcpPeerSocket {
    inner: Arc<Inner>,
}

impl TcpPeerSocket {
    pub fn new(address: impl Into<String>, connect_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                address: address.into(),
                connect_timeout,
                stream: OnceLock::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }
}

impl PeerSocket for TcpPeerSocket {
    fn output_stream(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(TcpHalf {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(TcpHalf {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn connect(&self) -> io::Result<()> {
        let stream = self.inner.dial()?;

        let lifecycle = self.inner.lifecycle();
        if lifecycle.closed {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(closed_while_connecting());
        }
        stream.set_read_timeout(lifecycle.read_timeout)?;
        stream.set_nodelay(true)?;
        self.inner.stream.set(stream).map_err(|_| {
            io::Error::new(io::ErrorKind::AlreadyExists, "socket is already connected")
        })?;
        info!(address = %self.inner.address, "TCP connection established");
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.closed {
            return Ok(());
        }
        lifecycle.closed = true;

        match self.inner.stream.get().map(|s| s.shutdown(Shutdown::Both)) {
            Some(Err(e)) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let mut lifecycle = self.inner.lifecycle();
        lifecycle.read_timeout = timeout;
        match self.inner.stream.get() {
            Some(stream) => stream.set_read_timeout(timeout),
            None => Ok(()),
        }
    }
}

/// A read or write view of the shared stream.
struct TcpHalf {
    inner: Arc<Inner>,
}

impl Read for TcpHalf {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self.inner.stream()?;
        stream.read(buf)
    }
}

impl Write for TcpHalf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut stream = self.inner.stream()?;
        stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.inner.stream()?;
        stream.flush()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
