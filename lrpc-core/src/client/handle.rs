//! The client connection handle, grounded on `luarpc.c`'s
//! `Handle`/`rpc_connect` and, for the shared-clonable-state shape, on
//! `hdbconnect_impl`'s `AmConnCore` (`Arc<Mutex<ConnectionCore>>`).

use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex};

use crate::client::accessor::Accessor;
use crate::config::RpcConfig;
use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::opcode;
use crate::transport::{TcpTransport, Transport};
use crate::wire::codec::{read_u8, write_u8};
use crate::wire::negotiate::{client_negotiate, SessionProfile};
use crate::wire::value::Value;
use crate::wire::{codec, negotiate};

pub(crate) struct Inner {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) profile: SessionProfile,
    pub(crate) asynchronous: bool,
    /// Number of `CALL` replies left unread on the wire because they were
    /// issued while `asynchronous` was set (asynchronous pipelining).
    pub(crate) pending_replies: u32,
    pub(crate) config: RpcConfig,
}

/// A connection to a server, cheaply clonable (all clones share one
/// underlying transport and session).
#[derive(Clone)]
pub struct Handle {
    pub(crate) inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect("handle mutex poisoned");
        f.debug_struct("Handle")
            .field("is_open", &inner.transport.is_open())
            .field("asynchronous", &inner.asynchronous)
            .field("pending_replies", &inner.pending_replies)
            .finish()
    }
}

impl Handle {
    /// Opens a TCP connection and negotiates a session.
    pub fn connect(addr: impl ToSocketAddrs, config: RpcConfig) -> RpcResult<Self> {
        let mut transport = TcpTransport::connect(addr)?;
        write_u8(&mut transport, opcode::CMD_CON)?;
        let profile = client_negotiate(&mut transport, config.protocol_version())?;
        log::info!("lrpc client connected, profile = {profile:?}");

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                transport: Box::new(transport),
                profile,
                asynchronous: false,
                pending_replies: 0,
                config,
            })),
        })
    }

    /// Re-runs negotiation in-band over the existing transport. `CMD_CON`
    /// is usable mid-session, not just at first contact.
    pub fn renegotiate(&self) -> RpcResult<()> {
        let mut inner = self.inner.lock().expect("handle mutex poisoned");
        let version = inner.config.protocol_version();
        write_u8(inner.transport.as_mut(), opcode::CMD_CON)?;
        inner.profile = negotiate::client_negotiate(inner.transport.as_mut(), version)?;
        Ok(())
    }

    /// Closes the underlying transport. Idempotent.
    pub fn close(&self) {
        self.inner
            .lock()
            .expect("handle mutex poisoned")
            .transport
            .close();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().expect("handle mutex poisoned").transport.is_open()
    }

    /// Enables or disables asynchronous pipelining for subsequent `CALL`s.
    /// Does not itself drain anything outstanding; the next synchronous
    /// call will.
    pub fn set_async(&self, enabled: bool) {
        self.inner.lock().expect("handle mutex poisoned").asynchronous = enabled;
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.inner.lock().expect("handle mutex poisoned").asynchronous
    }

    /// The accessor rooted at this handle, with an empty path.
    #[must_use]
    pub fn root(&self) -> Accessor {
        Accessor::root(self.inner.clone())
    }

    /// Shorthand for `self.root().path(segment)`.
    pub fn path(&self, segment: &str) -> RpcResult<Accessor> {
        self.root().path(segment)
    }
}

/// Drains any `CALL` replies left unread from previous asynchronous
/// invocations, in FIFO order, discarding their payload. Errors
/// encountered while draining are nonfatal and swallowed via the process
/// hook, matching the original's `deal_with_error` plus continue.
pub(crate) fn drain_pending_replies(inner: &mut Inner) -> RpcResult<()> {
    while inner.pending_replies > 0 {
        inner.pending_replies -= 1;
        match read_call_reply(inner.transport.as_mut(), &inner.profile) {
            Ok(_) => {}
            Err(err) => {
                crate::hook::notify(&format!("dropped pending async reply: {err}"));
                if err.is_fatal() {
                    return Err(err);
                }
            }
        }
    }
    Ok(())
}

/// Reads one `CALL` reply frame: a status byte, then either `nret` values
/// or an error payload.
pub(crate) fn read_call_reply(
    tpt: &mut dyn Transport,
    profile: &SessionProfile,
) -> RpcResult<Vec<Value>> {
    let status = read_u8(tpt)?;
    if status == 0 {
        let nret = codec::read_len(tpt, profile)?;
        let mut values = Vec::with_capacity(nret);
        for _ in 0..nret {
            values.push(codec::decode_value(tpt, profile)?);
        }
        Ok(values)
    } else {
        let _code = codec::read_len(tpt, profile)?;
        let message = codec::read_bytes(tpt, profile)?;
        Err(RpcError::nonfatal(ErrorKind::Remote(
            String::from_utf8_lossy(&message).into_owned(),
        )))
    }
}

/// Writes a command byte and waits for the `READY` acknowledgement. A
/// non-`READY` response is a nonfatal protocol-level rejection.
pub(crate) fn send_command(tpt: &mut dyn Transport, cmd: u8) -> RpcResult<()> {
    write_u8(tpt, cmd)?;
    let resp = read_u8(tpt)?;
    if resp != opcode::READY {
        return Err(RpcError::nonfatal(ErrorKind::Command));
    }
    Ok(())
}

/// Writes the dotted path as a raw length-prefixed string, replaying the
/// accessor chain to the server (`helper_remote_index`).
pub(crate) fn write_path(tpt: &mut dyn Transport, profile: &SessionProfile, path: &str) -> RpcResult<()> {
    codec::write_bytes(tpt, profile, path.as_bytes())
}
