//! Command opcodes exchanged between client and server, grounded on
//! `luarpc.c`'s `RPC_CMD_*`/`RPC_READY` enum.

pub(crate) const CMD_CALL: u8 = 1;
pub(crate) const CMD_GET: u8 = 2;
pub(crate) const CMD_CON: u8 = 3;
pub(crate) const CMD_NEWINDEX: u8 = 4;

pub(crate) const READY: u8 = 64;
pub(crate) const UNSUPPORTED_CMD: u8 = 65;
