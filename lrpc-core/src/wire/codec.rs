//! Encoding and decoding of [`Value`] over a [`Transport`].
//!
//! Tags and the chunked-streaming shape of `TABLE`/`FUNCTION` are grounded
//! on `original_source/luarpc.c`'s `send_value`/`read_variable`; numeric
//! conversion is grounded on its `transport_write_number`/
//! `transport_read_number`, reworked here around `byteorder`'s `ByteOrder`
//! trait rather than hand-rolled shifts.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::transport::Transport;
use crate::wire::negotiate::SessionProfile;
use crate::wire::value::Value;

const TAG_NIL: u8 = 0;
const TAG_NUMBER: u8 = 1;
const TAG_BOOLEAN: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_TABLE: u8 = 4;
const TAG_TABLE_END: u8 = 5;
const TAG_FUNCTION: u8 = 6;
const TAG_FUNCTION_END: u8 = 7;

/// Decode-time-only event: either a nested item, or the sentinel closing a
/// `TABLE`/`FUNCTION` stream. Kept out of [`Value`] deliberately.
enum DecodeEvent {
    Item(Value),
    End,
}

pub(crate) fn write_u8(tpt: &mut dyn Transport, b: u8) -> RpcResult<()> {
    tpt.write_all(&[b])
}

pub(crate) fn read_u8(tpt: &mut dyn Transport) -> RpcResult<u8> {
    let mut b = [0_u8; 1];
    tpt.read_exact(&mut b)?;
    Ok(b[0])
}

pub(crate) fn write_len(tpt: &mut dyn Transport, profile: &SessionProfile, len: usize) -> RpcResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| RpcError::fatal(ErrorKind::Protocol("string or chunk too long to encode")))?;
    let mut buf = [0_u8; 4];
    if profile.net_little {
        LittleEndian::write_u32(&mut buf, len);
    } else {
        BigEndian::write_u32(&mut buf, len);
    }
    tpt.write_all(&buf)
}

pub(crate) fn read_len(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<usize> {
    let mut buf = [0_u8; 4];
    tpt.read_exact(&mut buf)?;
    let len = if profile.net_little {
        LittleEndian::read_u32(&buf)
    } else {
        BigEndian::read_u32(&buf)
    };
    Ok(len as usize)
}

pub(crate) fn write_bytes(tpt: &mut dyn Transport, profile: &SessionProfile, bytes: &[u8]) -> RpcResult<()> {
    write_len(tpt, profile, bytes.len())?;
    tpt.write_all(bytes)
}

pub(crate) fn read_bytes(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<Vec<u8>> {
    let len = read_len(tpt, profile)?;
    let mut bytes = vec![0_u8; len];
    tpt.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Writes a number using the session's negotiated width, byte order, and
/// integer/float representation.
fn write_number(tpt: &mut dyn Transport, profile: &SessionProfile, value: f64) -> RpcResult<()> {
    if profile.net_intnum {
        #[allow(clippy::cast_possible_truncation)]
        let i = value as i64;
        match profile.lnum_bytes {
            1 => write_u8(tpt, i as u8),
            2 => {
                let mut buf = [0_u8; 2];
                if profile.net_little {
                    LittleEndian::write_i16(&mut buf, i as i16);
                } else {
                    BigEndian::write_i16(&mut buf, i as i16);
                }
                tpt.write_all(&buf)
            }
            4 => {
                let mut buf = [0_u8; 4];
                if profile.net_little {
                    LittleEndian::write_i32(&mut buf, i as i32);
                } else {
                    BigEndian::write_i32(&mut buf, i as i32);
                }
                tpt.write_all(&buf)
            }
            8 => {
                let mut buf = [0_u8; 8];
                if profile.net_little {
                    LittleEndian::write_i64(&mut buf, i);
                } else {
                    BigEndian::write_i64(&mut buf, i);
                }
                tpt.write_all(&buf)
            }
            other => Err(RpcError::fatal(ErrorKind::Protocol(
                int_width_message(other),
            ))),
        }
    } else {
        match profile.lnum_bytes {
            4 => {
                let mut buf = [0_u8; 4];
                #[allow(clippy::cast_possible_truncation)]
                let v = value as f32;
                if profile.net_little {
                    LittleEndian::write_f32(&mut buf, v);
                } else {
                    BigEndian::write_f32(&mut buf, v);
                }
                tpt.write_all(&buf)
            }
            8 => {
                let mut buf = [0_u8; 8];
                if profile.net_little {
                    LittleEndian::write_f64(&mut buf, value);
                } else {
                    BigEndian::write_f64(&mut buf, value);
                }
                tpt.write_all(&buf)
            }
            other => Err(RpcError::fatal(ErrorKind::Protocol(
                float_width_message(other),
            ))),
        }
    }
}

fn int_width_message(width: u8) -> &'static str {
    match width {
        3 | 5 | 6 | 7 => "unsupported integer width",
        _ => "unsupported integer width",
    }
}

fn float_width_message(_width: u8) -> &'static str {
    "unsupported float width"
}

fn read_number(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<f64> {
    if profile.net_intnum {
        let value = match profile.lnum_bytes {
            1 => f64::from(read_u8(tpt)? as i8),
            2 => {
                let mut buf = [0_u8; 2];
                tpt.read_exact(&mut buf)?;
                f64::from(if profile.net_little {
                    LittleEndian::read_i16(&buf)
                } else {
                    BigEndian::read_i16(&buf)
                })
            }
            4 => {
                let mut buf = [0_u8; 4];
                tpt.read_exact(&mut buf)?;
                f64::from(if profile.net_little {
                    LittleEndian::read_i32(&buf)
                } else {
                    BigEndian::read_i32(&buf)
                })
            }
            8 => {
                let mut buf = [0_u8; 8];
                tpt.read_exact(&mut buf)?;
                #[allow(clippy::cast_precision_loss)]
                let v = (if profile.net_little {
                    LittleEndian::read_i64(&buf)
                } else {
                    BigEndian::read_i64(&buf)
                }) as f64;
                v
            }
            other => return Err(RpcError::fatal(ErrorKind::Protocol(int_width_message(other)))),
        };
        Ok(value)
    } else {
        let value = match profile.lnum_bytes {
            4 => {
                let mut buf = [0_u8; 4];
                tpt.read_exact(&mut buf)?;
                f64::from(if profile.net_little {
                    LittleEndian::read_f32(&buf)
                } else {
                    BigEndian::read_f32(&buf)
                })
            }
            8 => {
                let mut buf = [0_u8; 8];
                tpt.read_exact(&mut buf)?;
                if profile.net_little {
                    LittleEndian::read_f64(&buf)
                } else {
                    BigEndian::read_f64(&buf)
                }
            }
            other => {
                return Err(RpcError::fatal(ErrorKind::Protocol(
                    float_width_message(other),
                )))
            }
        };
        Ok(value)
    }
}

/// Encodes one value, including any nested table/function streams.
pub fn encode_value(tpt: &mut dyn Transport, profile: &SessionProfile, value: &Value) -> RpcResult<()> {
    match value {
        Value::Nil => write_u8(tpt, TAG_NIL),
        Value::Bool(b) => {
            write_u8(tpt, TAG_BOOLEAN)?;
            write_u8(tpt, u8::from(*b))
        }
        Value::Number(n) => {
            write_u8(tpt, TAG_NUMBER)?;
            write_number(tpt, profile, *n)
        }
        Value::String(bytes) => {
            write_u8(tpt, TAG_STRING)?;
            write_bytes(tpt, profile, bytes)
        }
        Value::Table(entries) => {
            write_u8(tpt, TAG_TABLE)?;
            for (k, v) in entries {
                encode_value(tpt, profile, k)?;
                encode_value(tpt, profile, v)?;
            }
            write_u8(tpt, TAG_TABLE_END)
        }
        Value::Function(chunk) => {
            write_u8(tpt, TAG_FUNCTION)?;
            write_u8(tpt, TAG_STRING)?;
            write_bytes(tpt, profile, chunk)?;
            write_u8(tpt, TAG_FUNCTION_END)
        }
    }
}

/// Decodes one value from the wire.
pub fn decode_value(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<Value> {
    let tag = read_u8(tpt)?;
    decode_value_with_tag(tag, tpt, profile)
}

fn decode_event(tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<DecodeEvent> {
    let tag = read_u8(tpt)?;
    if tag == TAG_TABLE_END || tag == TAG_FUNCTION_END {
        return Ok(DecodeEvent::End);
    }
    Ok(DecodeEvent::Item(decode_value_with_tag(tag, tpt, profile)?))
}

fn decode_value_with_tag(tag: u8, tpt: &mut dyn Transport, profile: &SessionProfile) -> RpcResult<Value> {
    match tag {
        TAG_NIL => Ok(Value::Nil),
        TAG_BOOLEAN => Ok(Value::Bool(read_u8(tpt)? != 0)),
        TAG_NUMBER => Ok(Value::Number(read_number(tpt, profile)?)),
        TAG_STRING => Ok(Value::String(read_bytes(tpt, profile)?)),
        TAG_TABLE => {
            let mut entries = Vec::new();
            loop {
                match decode_event(tpt, profile)? {
                    DecodeEvent::End => break,
                    DecodeEvent::Item(key) => {
                        let value = decode_value(tpt, profile)?;
                        entries.push((key, value));
                    }
                }
            }
            Ok(Value::Table(entries))
        }
        TAG_FUNCTION => {
            let mut chunk = Vec::new();
            loop {
                let chunk_tag = read_u8(tpt)?;
                if chunk_tag == TAG_FUNCTION_END {
                    break;
                }
                if chunk_tag != TAG_STRING {
                    return Err(RpcError::fatal(ErrorKind::Protocol(
                        "expected string chunk inside function stream",
                    )));
                }
                chunk.extend(read_bytes(tpt, profile)?);
            }
            Ok(Value::Function(chunk))
        }
        TAG_TABLE_END | TAG_FUNCTION_END => Err(RpcError::fatal(ErrorKind::Protocol(
            "unexpected end-of-stream sentinel",
        ))),
        _ => Err(RpcError::fatal(ErrorKind::Protocol("unknown value tag"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TcpListenerTransport, TcpTransport};
    use std::thread;

    fn loopback_profile() -> SessionProfile {
        SessionProfile {
            net_little: true,
            loc_little: true,
            lnum_bytes: 8,
            net_intnum: false,
            loc_intnum: false,
        }
    }

    fn roundtrip(value: Value, profile: SessionProfile) -> Value {
        let mut listener = TcpListenerTransport::bind_listen("127.0.0.1:0", 4).unwrap();
        let addr = listener.local_addr().unwrap();
        let server_profile = profile;
        let server = thread::spawn(move || {
            let mut accepted = listener.accept().unwrap();
            decode_value(&mut accepted, &server_profile).unwrap()
        });

        let mut client = TcpTransport::connect(addr).unwrap();
        encode_value(&mut client, &profile, &value).unwrap();
        server.join().unwrap()
    }

    #[test]
    fn scalars_roundtrip() {
        let profile = loopback_profile();
        assert_eq!(roundtrip(Value::Nil, profile), Value::Nil);
        assert_eq!(roundtrip(Value::Bool(true), profile), Value::Bool(true));
        assert_eq!(roundtrip(Value::Number(3.5), profile), Value::Number(3.5));
        assert_eq!(roundtrip(Value::str("hi"), profile), Value::str("hi"));
    }

    #[test]
    fn nested_table_roundtrips() {
        let profile = loopback_profile();
        let table = Value::Table(vec![
            (Value::str("a"), Value::Number(1.0)),
            (
                Value::str("nested"),
                Value::Table(vec![(Value::Number(1.0), Value::Bool(false))]),
            ),
        ]);
        assert_eq!(roundtrip(table.clone(), profile), table);
    }

    #[test]
    fn function_chunk_roundtrips() {
        let profile = loopback_profile();
        let func = Value::Function(vec![1, 2, 3, 4, 5]);
        assert_eq!(roundtrip(func.clone(), profile), func);
    }

    #[test]
    fn integer_representation_truncates_toward_zero() {
        let mut profile = loopback_profile();
        profile.net_intnum = true;
        profile.lnum_bytes = 4;
        assert_eq!(roundtrip(Value::Number(42.0), profile), Value::Number(42.0));
    }

    #[test]
    fn narrow_float_width_loses_precision_without_erroring() {
        let mut profile = loopback_profile();
        profile.lnum_bytes = 4;
        let result = roundtrip(Value::Number(1.0 / 3.0), profile);
        let narrowed = result.as_f64().unwrap();
        assert!((narrowed - 1.0 / 3.0).abs() < 1e-6);
        assert_ne!(narrowed.to_bits(), (1.0_f64 / 3.0).to_bits());
    }
}
