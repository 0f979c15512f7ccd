//! A blocking, TCP-based remote procedure call client and server for a
//! small tagged value domain, modeled on the Lua-RPC wire protocol.
//!
//! A server exposes values under named globals through a [`Host`], and a
//! client addresses them with a dotted [`Accessor`] chain:
//!
//! ```rust,no_run
//! use lrpc::{Handle, RpcConfig, Value};
//!
//! # fn main() -> lrpc::RpcResult<()> {
//! let handle = Handle::connect("127.0.0.1:7890", RpcConfig::default())?;
//! let greeting = handle.path("greet")?.call(vec![Value::str("world")])?;
//! # let _ = greeting;
//! # Ok(())
//! # }
//! ```

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub use lrpc_core::client::{Accessor, Handle};
pub use lrpc_core::config::RpcConfig;
pub use lrpc_core::error::{ErrorKind, Grade, RpcError, RpcResult};
pub use lrpc_core::host::{Host, HostValue, NamedCallable, TableHost};
pub use lrpc_core::hook;
pub use lrpc_core::server::Server;
pub use lrpc_core::transport::{TcpListenerTransport, TcpTransport, Transport};
pub use lrpc_core::wire::{SessionProfile, Value, PROTOCOL_VERSION};
