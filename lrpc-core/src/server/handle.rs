//! The server-side single-accept-slot dispatcher, grounded on
//! `luarpc.c`'s `ServerHandle`/`rpc_dispatch_helper`.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use crate::config::RpcConfig;
use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::host::Host;
use crate::opcode;
use crate::server::dispatch;
use crate::transport::{TcpListenerTransport, TcpTransport, Transport};
use crate::wire::codec::{read_u8, write_u8};
use crate::wire::negotiate::{self, SessionProfile};

/// One listening socket, at most one accepted session at a time, and a
/// running count of consecutive nonfatal errors on that session.
pub struct Server {
    listener: TcpListenerTransport,
    accepted: Option<(TcpTransport, SessionProfile)>,
    error_count: u32,
    config: RpcConfig,
    host: Arc<dyn Host>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("has_session", &self.accepted.is_some())
            .field("error_count", &self.error_count)
            .finish()
    }
}

impl Server {
    /// Binds and starts listening. Does not accept until the first
    /// [`Self::serve_one`] call.
    pub fn bind(addr: impl ToSocketAddrs, config: RpcConfig, host: Arc<dyn Host>) -> RpcResult<Self> {
        let listener = TcpListenerTransport::bind_listen(addr, config.listen_backlog())?;
        Ok(Self {
            listener,
            accepted: None,
            error_count: 0,
            config,
            host,
        })
    }

    pub fn local_addr(&self) -> RpcResult<SocketAddr> {
        self.listener.local_addr()
    }

    /// Non-blocking poll: true if [`Self::serve_one`] would not block,
    /// either because the accepted session has a command waiting, or
    /// because, with no session accepted, the listener has a connection
    /// waiting.
    pub fn readable(&self) -> RpcResult<bool> {
        match &self.accepted {
            Some((tpt, _)) => tpt.readable(),
            None => self.listener.readable(),
        }
    }

    /// Runs one dispatch cycle, blocking until there is something to do.
    /// Returns `Ok(())` when a nonfatal error was absorbed (and logged via
    /// the process hook), and `Err` when either a fatal error occurred or
    /// the session's nonfatal error count crossed `max_link_errs`. A fatal
    /// error (or escalation past `max_link_errs`) closes both the accepted
    /// session and the listener, the same as `server_handle_shutdown`
    /// closing both `ltpt` and `atpt`, and is delivered to the global hook
    /// before `Err` is returned, so a caller driving `serve_one` step by
    /// step (rather than through `serve_forever`) cannot keep calling it
    /// and keep accepting connections once the server is down.
    pub fn serve_one(&mut self) -> RpcResult<()> {
        match self.dispatch_step() {
            Ok(()) => {
                self.error_count = 0;
                Ok(())
            }
            Err(err) => {
                if let Some((tpt, _)) = &mut self.accepted {
                    tpt.close();
                }
                self.accepted = None;

                if err.is_fatal() {
                    self.error_count = 0;
                    self.listener.close();
                    crate::hook::notify(&format!("server shut down on fatal error: {err}"));
                    return Err(err);
                }

                self.error_count += 1;
                if self.error_count > self.config.max_link_errs() {
                    self.error_count = 0;
                    self.listener.close();
                    crate::hook::notify(&format!(
                        "server shut down after exceeding max_link_errs: {err}"
                    ));
                    return Err(err);
                }
                crate::hook::notify(&format!("server absorbed nonfatal error: {err}"));
                Ok(())
            }
        }
    }

    /// Dispatches cycles forever, until a fatal or escalated error occurs.
    pub fn serve_forever(&mut self) -> RpcResult<()> {
        loop {
            self.serve_one()?;
        }
    }

    fn dispatch_step(&mut self) -> RpcResult<()> {
        if self.accepted.is_none() {
            let mut tpt = self.listener.accept()?;
            return match read_u8(&mut tpt)? {
                opcode::CMD_CON => {
                    let profile = negotiate::server_negotiate(&mut tpt, self.config.protocol_version())?;
                    log::info!("lrpc server accepted session, profile = {profile:?}");
                    self.accepted = Some((tpt, profile));
                    Ok(())
                }
                _ => Err(RpcError::nonfatal(ErrorKind::Command)),
            };
        }

        let (tpt, profile) = self.accepted.as_mut().expect("checked above");
        let host = self.host.as_ref();
        match read_u8(tpt)? {
            opcode::CMD_CALL => {
                write_u8(tpt, opcode::READY)?;
                dispatch::handle_call(tpt, profile, host)
            }
            opcode::CMD_GET => {
                write_u8(tpt, opcode::READY)?;
                dispatch::handle_get(tpt, profile, host)
            }
            opcode::CMD_NEWINDEX => {
                write_u8(tpt, opcode::READY)?;
                dispatch::handle_newindex(tpt, profile, host)
            }
            opcode::CMD_CON => {
                *profile = negotiate::server_negotiate(tpt, self.config.protocol_version())?;
                Ok(())
            }
            _ => {
                write_u8(tpt, opcode::UNSUPPORTED_CMD)?;
                Err(RpcError::nonfatal(ErrorKind::Command))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TableHost;

    #[test]
    fn readable_reports_a_pending_connection_before_any_session_is_accepted() {
        let host: Arc<dyn Host> = Arc::new(TableHost::new());
        let server = Server::bind("127.0.0.1:0", RpcConfig::default(), host).unwrap();
        let addr = server.local_addr().unwrap();

        assert!(!server.readable().unwrap());

        let _client = TcpTransport::connect(addr).unwrap();
        // The listener backlog makes the pending connection visible almost
        // immediately, but give the OS a moment under load.
        let mut waited = false;
        for _ in 0..50 {
            if server.readable().unwrap() {
                waited = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(waited, "listener never reported a pending connection");
    }
}
