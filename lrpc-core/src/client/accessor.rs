//! Dotted-path accessor chain, grounded on `luarpc.c`'s
//! `Helper`/`helper_remote_index`: indexing builds a path with no network
//! effect; only `get`/`call`/`set` issue traffic.

use std::sync::{Arc, Mutex};

use crate::client::handle::{self, Inner};
use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::opcode;
use crate::wire::codec;
use crate::wire::value::Value;

/// A (possibly empty) dotted path rooted at a [`super::Handle`].
/// Cloning is cheap; it shares the handle's connection state.
#[derive(Clone)]
pub struct Accessor {
    inner: Arc<Mutex<Inner>>,
    segments: Vec<String>,
}

impl std::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor")
            .field("path", &self.segments.join("."))
            .finish()
    }
}

impl Accessor {
    pub(crate) fn root(inner: Arc<Mutex<Inner>>) -> Self {
        Self {
            inner,
            segments: Vec::new(),
        }
    }

    fn joined(&self) -> String {
        self.segments.join(".")
    }

    /// Extends the path by one dotted segment. Pure local bookkeeping: no
    /// traffic is sent until a terminal operation is invoked. A segment
    /// longer than the configured maximum is rejected locally as `BadName`
    /// without touching the network.
    pub fn path(&self, segment: &str) -> RpcResult<Self> {
        let max_len = self
            .inner
            .lock()
            .expect("handle mutex poisoned")
            .config
            .max_segment_len();
        if segment.is_empty() || segment.len() > max_len {
            return Err(RpcError::nonfatal(ErrorKind::BadName));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self {
            inner: self.inner.clone(),
            segments,
        })
    }

    /// `GET`: resolves this path on the server and returns its value.
    /// Resolution failures (missing global, indexing a non-table) come
    /// back as `Nil`, not as an error (matches `read_cmd_get`, which never
    /// writes a protocol-level error frame).
    pub fn get(&self) -> RpcResult<Value> {
        let mut inner = self.inner.lock().expect("handle mutex poisoned");
        let profile = inner.profile;
        let tpt = inner.transport.as_mut();
        handle::send_command(tpt, opcode::CMD_GET)?;
        handle::write_path(tpt, &profile, &self.joined())?;
        codec::decode_value(tpt, &profile)
    }

    /// `CALL`: resolves this path and invokes it with `args`.
    ///
    /// Before issuing the command, drains any replies left over from
    /// earlier asynchronous calls, regardless of whether this call itself
    /// is asynchronous. If the handle is in asynchronous mode, this
    /// call's own reply is deferred too and an empty result is returned
    /// immediately.
    pub fn call(&self, args: Vec<Value>) -> RpcResult<Vec<Value>> {
        let mut inner = self.inner.lock().expect("handle mutex poisoned");
        handle::drain_pending_replies(&mut inner)?;

        let profile = inner.profile;
        let tpt = inner.transport.as_mut();
        handle::send_command(tpt, opcode::CMD_CALL)?;
        handle::write_path(tpt, &profile, &self.joined())?;

        codec::write_len(tpt, &profile, args.len())?;
        for arg in &args {
            codec::encode_value(tpt, &profile, arg)?;
        }

        if inner.asynchronous {
            inner.pending_replies += 1;
            return Ok(Vec::new());
        }

        handle::read_call_reply(inner.transport.as_mut(), &profile)
    }

    /// `NEWINDEX`: assigns `value` at `key` on this path (i.e. `self` is
    /// the parent table and `key` is the field being set, mirroring the
    /// Lua `__newindex` metamethod firing one level up from the full
    /// path).
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> RpcResult<()> {
        let mut inner = self.inner.lock().expect("handle mutex poisoned");
        let profile = inner.profile;
        let tpt = inner.transport.as_mut();
        handle::send_command(tpt, opcode::CMD_NEWINDEX)?;
        handle::write_path(tpt, &profile, &self.joined())?;
        codec::encode_value(tpt, &profile, &key.into())?;
        codec::encode_value(tpt, &profile, &value.into())
    }
}
