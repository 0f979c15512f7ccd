//! The server side: the single-session [`Server`] dispatcher.

pub mod dispatch;
pub mod handle;

pub use handle::Server;
