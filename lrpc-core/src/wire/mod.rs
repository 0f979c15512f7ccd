//! The wire layer: value domain, session negotiation, and codec.

pub mod codec;
pub mod negotiate;
pub mod value;

pub use codec::{decode_value, encode_value};
pub use negotiate::{client_negotiate, server_negotiate, SessionProfile, PROTOCOL_VERSION};
pub use value::Value;
