//! Per-command dispatch against a [`Host`], grounded on `luarpc.c`'s
//! `read_cmd_call`/`read_cmd_get`/`read_cmd_newindex`.

use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::host::{Host, HostValue};
use crate::transport::Transport;
use crate::wire::codec;
use crate::wire::negotiate::SessionProfile;
use crate::wire::value::Value;

/// Reads a length-prefixed dotted path off the wire (replay of
/// `helper_remote_index`).
fn read_path(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<String> {
    let bytes = codec::read_bytes(tpt, profile)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Resolves a dotted path against the host's global namespace. An empty
/// path resolves to `Nil` (used by a bare `GET` on the root accessor); a
/// path with an empty interior segment (`"a..b"`) is rejected outright
/// rather than silently skipped, since the tokenizer it replaces is not
/// reentrant in the original and such paths have no defined meaning there.
fn resolve_path(host: &dyn Host, path: &str) -> RpcResult<HostValue> {
    if path.is_empty() {
        return Ok(HostValue::Nil);
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(RpcError::nonfatal(ErrorKind::Protocol("path contains an empty segment")));
    }
    let mut iter = segments.into_iter();
    let first = iter.next().expect("non-empty path has at least one segment");
    let mut current = host.get_global(first);
    for segment in iter {
        current = host.index(&current, &Value::str(segment));
    }
    Ok(current)
}

/// `GET`: resolves `path` and writes its value back. An unresolvable path
/// simply yields `Nil` (matches the original, which never writes an error
/// frame for `read_cmd_get`), but a value that resolves to something the
/// host refuses to put on the wire (a foreign reference) fails the command
/// instead of silently reporting `Nil` in its place.
pub fn handle_get(tpt: &mut dyn Transport, profile: &SessionProfile, host: &dyn Host) -> RpcResult<()> {
    let path = read_path(tpt, profile)?;
    let resolved = resolve_path(host, &path)?;
    let wire_value = host.to_wire(&resolved)?;
    codec::encode_value(tpt, profile, &wire_value)
}

/// `CALL`: resolves `path`, reads `nargs` arguments, invokes it, and
/// writes back either the return values or an error frame.
pub fn handle_call(tpt: &mut dyn Transport, profile: &SessionProfile, host: &dyn Host) -> RpcResult<()> {
    let path = read_path(tpt, profile)?;
    let target = resolve_path(host, &path)?;

    let nargs = codec::read_len(tpt, profile)?;
    let mut args = Vec::with_capacity(nargs);
    for _ in 0..nargs {
        args.push(codec::decode_value(tpt, profile)?);
    }

    if !host.is_callable(&target) {
        let message = format!("undefined function: {path}");
        codec::write_u8(tpt, 1)?;
        codec::write_len(tpt, profile, 1)?;
        codec::write_bytes(tpt, profile, message.as_bytes())?;
        return Ok(());
    }

    match host.call(&target, args) {
        Ok(rets) => {
            codec::write_u8(tpt, 0)?;
            codec::write_len(tpt, profile, rets.len())?;
            for ret in &rets {
                codec::encode_value(tpt, profile, ret)?;
            }
            Ok(())
        }
        Err((code, message)) => {
            let code = u32::try_from(code).unwrap_or(1);
            codec::write_u8(tpt, 1)?;
            codec::write_len(tpt, profile, code as usize)?;
            codec::write_bytes(tpt, profile, message.as_bytes())
        }
    }
}

/// `NEWINDEX`: an empty path assigns directly into globals (mirrors a
/// bare `x = v` at the top level); otherwise `path` names the parent
/// table.
pub fn handle_newindex(tpt: &mut dyn Transport, profile: &SessionProfile, host: &dyn Host) -> RpcResult<()> {
    let path = read_path(tpt, profile)?;
    let key = codec::decode_value(tpt, profile)?;
    let value = codec::decode_value(tpt, profile)?;
    let host_value = host.from_wire(value);

    if path.is_empty() {
        let name = key
            .as_str()
            .ok_or_else(|| RpcError::nonfatal(ErrorKind::Remote("global name must be a string".to_string())))?;
        host.set_global(name, host_value);
        return Ok(());
    }

    let table = resolve_path(host, &path)?;
    host.set_index(&table, key, host_value)
}
