//! Framed byte I/O, abstracted over the concrete connection type.
//!
//! The reference implementation backs [`Transport`] with blocking
//! `std::net::TcpStream`/`TcpListener`, the way `hdbconnect_impl`'s
//! `SyncPlainTcpClient` wraps a plain blocking socket.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::fd::AsRawFd;

use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::readiness::fd_readable;

/// A reliable, ordered, byte-oriented duplex connection.
///
/// Every operation blocks. `read_exact`/`write_all` never return partial
/// success: either the full count is transferred or an error is raised.
pub trait Transport: std::fmt::Debug + Send {
    /// Reads exactly `buf.len()` bytes, or fails with `Eof` if the peer
    /// closes mid-read.
    fn read_exact(&mut self, buf: &mut [u8]) -> RpcResult<()>;

    /// Writes all of `buf`.
    fn write_all(&mut self, buf: &[u8]) -> RpcResult<()>;

    /// Non-blocking readiness poll. For a listening transport, `true` means
    /// `accept` would not block.
    fn readable(&self) -> RpcResult<bool>;

    /// Idempotent; transitions to the closed state.
    fn close(&mut self);

    /// Whether this transport is still open.
    fn is_open(&self) -> bool;
}

fn verify_open(open: bool) -> RpcResult<()> {
    if open {
        Ok(())
    } else {
        Err(RpcError::fatal(ErrorKind::Closed))
    }
}

/// A blocking TCP transport, used for both client connections and accepted
/// server sessions.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Wraps an already-connected stream (used for accepted sessions).
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Opens an outgoing connection.
    pub fn connect(addr: impl ToSocketAddrs) -> RpcResult<Self> {
        let stream = TcpStream::connect(addr).map_err(RpcError::from)?;
        stream.set_nodelay(true).map_err(RpcError::from)?;
        Ok(Self::from_stream(stream))
    }

    fn stream_mut(&mut self) -> RpcResult<&mut TcpStream> {
        verify_open(self.stream.is_some())?;
        Ok(self.stream.as_mut().expect("checked open above"))
    }
}

impl Transport for TcpTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> RpcResult<()> {
        self.stream_mut()?.read_exact(buf).map_err(RpcError::from)
    }

    fn write_all(&mut self, buf: &[u8]) -> RpcResult<()> {
        self.stream_mut()?.write_all(buf).map_err(RpcError::from)
    }

    #[cfg(unix)]
    fn readable(&self) -> RpcResult<bool> {
        let Some(stream) = &self.stream else {
            return Ok(false);
        };
        fd_readable(stream.as_raw_fd()).map_err(RpcError::from)
    }

    #[cfg(not(unix))]
    fn readable(&self) -> RpcResult<bool> {
        Ok(self.stream.is_some())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// A listening TCP transport, bound and waiting for `accept`.
#[derive(Debug)]
pub struct TcpListenerTransport {
    listener: Option<TcpListener>,
}

impl TcpListenerTransport {
    /// Binds to `addr` and starts listening with the given backlog.
    ///
    /// `std::net::TcpListener` does not expose the backlog parameter
    /// directly; it is honored by the OS default, matching the teacher's
    /// treatment of platform socket options it cannot tune portably.
    pub fn bind_listen(addr: impl ToSocketAddrs, _backlog: i32) -> RpcResult<Self> {
        let listener = TcpListener::bind(addr).map_err(RpcError::from)?;
        listener.set_nonblocking(false).map_err(RpcError::from)?;
        Ok(Self {
            listener: Some(listener),
        })
    }

    /// The bound local address, useful for tests that bind to port 0.
    pub fn local_addr(&self) -> RpcResult<SocketAddr> {
        verify_open(self.listener.is_some())?;
        self.listener
            .as_ref()
            .expect("checked open above")
            .local_addr()
            .map_err(RpcError::from)
    }

    /// Blocks for one incoming connection.
    pub fn accept(&mut self) -> RpcResult<TcpTransport> {
        verify_open(self.listener.is_some())?;
        let (stream, _peer) = self
            .listener
            .as_ref()
            .expect("checked open above")
            .accept()
            .map_err(RpcError::from)?;
        stream.set_nodelay(true).map_err(RpcError::from)?;
        Ok(TcpTransport::from_stream(stream))
    }

    /// Non-blocking readiness poll: `true` if `accept` would not block.
    #[cfg(unix)]
    pub fn readable(&self) -> RpcResult<bool> {
        let Some(listener) = &self.listener else {
            return Ok(false);
        };
        fd_readable(listener.as_raw_fd()).map_err(RpcError::from)
    }

    #[cfg(not(unix))]
    pub fn readable(&self) -> RpcResult<bool> {
        Ok(self.listener.is_some())
    }

    pub fn close(&mut self) {
        self.listener = None;
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }
}
