//! Do not use this crate directly.
//!
//! This is the implementation crate behind `lrpc`. It provides a
//! blocking, TCP-based remote procedure call runtime for a small tagged
//! value domain (nil, boolean, number, string, table, and a portable
//! callable chunk), modeled on the Lua-RPC wire protocol.
//!
//! If you want a client or server, use `lrpc`.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod host;
mod opcode;
mod readiness;
pub mod server;
pub mod transport;
pub mod wire;

pub use client::{Accessor, Handle};
pub use config::RpcConfig;
pub use error::{ErrorKind, RpcError, RpcResult};
pub use host::{Host, HostValue, TableHost};
pub use server::Server;
pub use transport::{TcpListenerTransport, TcpTransport, Transport};
pub use wire::Value;
