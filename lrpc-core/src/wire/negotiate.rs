//! Session negotiation.
//!
//! One-shot on session establishment, and re-run on `CMD_CON` for an
//! in-band reconnect, deliberately retained for symmetry with first
//! contact.

use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::transport::Transport;

pub const MAGIC: [u8; 4] = *b"LRPC";
pub const PROTOCOL_VERSION: u8 = 3;

/// Per-session wire parameters agreed during negotiation.
#[derive(Debug, Clone, Copy)]
pub struct SessionProfile {
    pub net_little: bool,
    pub loc_little: bool,
    pub lnum_bytes: u8,
    pub net_intnum: bool,
    pub loc_intnum: bool,
}

impl SessionProfile {
    /// This host's native parameters, before any peer is involved: native
    /// byte order, 8-byte floating point numbers.
    #[must_use]
    fn local() -> Self {
        Self {
            net_little: cfg!(target_endian = "little"),
            loc_little: cfg!(target_endian = "little"),
            lnum_bytes: 8,
            net_intnum: false,
            loc_intnum: false,
        }
    }
}

fn header_bytes(magic_ok: bool, version: u8, little: bool, lnum_bytes: u8, intnum: bool) -> [u8; 8] {
    let _ = magic_ok;
    [
        MAGIC[0],
        MAGIC[1],
        MAGIC[2],
        MAGIC[3],
        version,
        u8::from(little),
        lnum_bytes,
        u8::from(intnum),
    ]
}

fn parse_header(header: &[u8; 8], expected_version: u8) -> RpcResult<(u8, bool, u8, bool)> {
    if header[0..4] != MAGIC {
        return Err(RpcError::nonfatal(ErrorKind::Protocol("bad negotiation magic")));
    }
    if header[4] != expected_version {
        return Err(RpcError::nonfatal(ErrorKind::Protocol("protocol version mismatch")));
    }
    Ok((header[4], header[5] != 0, header[6], header[7] != 0))
}

/// Client side of negotiation: send our parameters first, then adopt
/// whatever profile the server echoes back. `version` is the protocol
/// version this side advertises and requires the peer to match
/// (`RpcConfig::protocol_version`).
pub fn client_negotiate(tpt: &mut dyn Transport, version: u8) -> RpcResult<SessionProfile> {
    let local = SessionProfile::local();
    let out = header_bytes(true, version, local.loc_little, local.lnum_bytes, local.loc_intnum);
    tpt.write_all(&out)?;

    let mut response = [0_u8; 8];
    tpt.read_exact(&mut response)?;
    let (_version, net_little, lnum_bytes, net_intnum) = parse_header(&response, version)?;

    Ok(SessionProfile {
        net_little,
        loc_little: local.loc_little,
        lnum_bytes,
        net_intnum,
        loc_intnum: local.loc_intnum,
    })
}

/// Server side of negotiation: read the client's parameters, compute the
/// deterministic tie-break profile, and echo it back. `version` is the
/// protocol version this side advertises and requires the peer to match.
pub fn server_negotiate(tpt: &mut dyn Transport, version: u8) -> RpcResult<SessionProfile> {
    let local = SessionProfile::local();

    let mut request = [0_u8; 8];
    tpt.read_exact(&mut request)?;
    let (_version, client_little, client_lnum_bytes, client_intnum) = parse_header(&request, version)?;

    // Big-endian on the wire if the two sides disagree; otherwise keep the
    // client's byte order (it's already equal to ours in that branch).
    let net_little = if client_little != local.loc_little {
        false
    } else {
        client_little
    };

    // Lowest common denominator width.
    let lnum_bytes = client_lnum_bytes.min(local.lnum_bytes);

    // Prefer integer representation if either side is integer-native.
    let net_intnum = client_intnum || local.loc_intnum;

    let profile = SessionProfile {
        net_little,
        loc_little: local.loc_little,
        lnum_bytes,
        net_intnum,
        loc_intnum: local.loc_intnum,
    };

    let out = header_bytes(true, version, net_little, lnum_bytes, net_intnum);
    tpt.write_all(&out)?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TcpListenerTransport, TcpTransport};
    use std::thread;

    #[test]
    fn negotiation_homogeneous_peers_exchanges_16_bytes_total() {
        let mut listener = TcpListenerTransport::bind_listen("127.0.0.1:0", 4).unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let mut accepted = listener.accept().unwrap();
            server_negotiate(&mut accepted, PROTOCOL_VERSION).unwrap()
        });

        let mut client = TcpTransport::connect(addr).unwrap();
        let client_profile = client_negotiate(&mut client, PROTOCOL_VERSION).unwrap();
        let server_profile = server.join().unwrap();

        assert_eq!(client_profile.net_little, server_profile.net_little);
        assert_eq!(client_profile.lnum_bytes, 8);
        assert!(!client_profile.net_intnum);
    }

    #[test]
    fn mismatched_protocol_version_is_rejected() {
        let mut listener = TcpListenerTransport::bind_listen("127.0.0.1:0", 4).unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let mut accepted = listener.accept().unwrap();
            server_negotiate(&mut accepted, PROTOCOL_VERSION)
        });

        let mut client = TcpTransport::connect(addr).unwrap();
        let client_result = client_negotiate(&mut client, PROTOCOL_VERSION + 1);

        assert!(server.join().unwrap().is_err());
        assert!(client_result.is_err());
    }
}
