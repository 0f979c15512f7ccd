//! End-to-end client/server scenarios over real loopback TCP.

use std::sync::Arc;
use std::thread;

use lrpc::{Handle, Host, RpcConfig, Server, TableHost, Value};

fn spawn_server(host: Arc<TableHost>) -> std::net::SocketAddr {
    let mut server = Server::bind("127.0.0.1:0", RpcConfig::default(), host).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.serve_forever();
    });
    addr
}

fn echo_host() -> Arc<TableHost> {
    let host = TableHost::new();
    host.register_callable("echo", |args| Ok(args.to_vec()));
    host.register_callable("boom", |_args| Err((1, "deliberate failure".to_string())));
    host.set_global("answer", lrpc::HostValue::Number(42.0));
    let table = lrpc::HostValue::table();
    host.set_global("config", table);
    Arc::new(host)
}

#[test]
fn call_roundtrips_arguments() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let result = handle
        .path("echo")
        .unwrap()
        .call(vec![Value::str("hi"), Value::Number(3.0), Value::Bool(true)])
        .unwrap();

    assert_eq!(
        result,
        vec![Value::str("hi"), Value::Number(3.0), Value::Bool(true)]
    );
}

#[test]
fn get_resolves_a_plain_global() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let value = handle.path("answer").unwrap().get().unwrap();
    assert_eq!(value, Value::Number(42.0));
}

#[test]
fn get_on_unknown_global_yields_nil() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let value = handle.path("does_not_exist").unwrap().get().unwrap();
    assert_eq!(value, Value::Nil);
}

#[test]
fn get_on_a_foreign_backed_global_fails_instead_of_returning_nil() {
    let host = echo_host();
    host.set_global("live_ref", lrpc::HostValue::Foreign("file handle"));
    let addr = spawn_server(host);
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    // `GET` carries no status byte, so a value the host refuses to encode
    // fails the command by closing the session rather than by delivering
    // an error frame; either way the caller must not see a silent `Nil`.
    let result = handle.path("live_ref").unwrap().get();
    assert!(result.is_err());
}

#[test]
fn call_on_unknown_function_returns_remote_error() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let err = handle.path("nope").unwrap().call(vec![]).unwrap_err();
    assert!(matches!(err.kind, lrpc::ErrorKind::Remote(_)));
    assert!(!err.is_fatal());
}

#[test]
fn call_propagates_application_error() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let err = handle.path("boom").unwrap().call(vec![]).unwrap_err();
    match err.kind {
        lrpc::ErrorKind::Remote(msg) => assert!(msg.contains("deliberate failure")),
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn newindex_assigns_a_field_then_get_reads_it_back() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    handle
        .path("config")
        .unwrap()
        .set("retries", Value::Number(5.0))
        .unwrap();

    let value = handle.path("config").unwrap().path("retries").unwrap().get().unwrap();
    assert_eq!(value, Value::Number(5.0));
}

#[test]
fn newindex_on_empty_path_sets_a_new_global() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    handle.root().set("greeting", Value::str("hello")).unwrap();

    let value = handle.path("greeting").unwrap().get().unwrap();
    assert_eq!(value, Value::str("hello"));
}

#[test]
fn nested_table_argument_roundtrips() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();

    let table = Value::Table(vec![
        (Value::str("x"), Value::Number(1.0)),
        (
            Value::str("nested"),
            Value::Table(vec![(Value::Number(1.0), Value::Bool(true))]),
        ),
    ]);

    let result = handle.path("echo").unwrap().call(vec![table.clone()]).unwrap();
    assert_eq!(result, vec![table]);
}

#[test]
fn asynchronous_calls_defer_replies_until_drained() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();
    let echo = handle.path("echo").unwrap();

    handle.set_async(true);
    let immediate = echo.call(vec![Value::Number(1.0)]).unwrap();
    assert!(immediate.is_empty());
    let immediate2 = echo.call(vec![Value::Number(2.0)]).unwrap();
    assert!(immediate2.is_empty());

    handle.set_async(false);
    // The next synchronous call first drains both outstanding replies,
    // then reads its own reply.
    let result = echo.call(vec![Value::Number(3.0)]).unwrap();
    assert_eq!(result, vec![Value::Number(3.0)]);
}

#[test]
fn path_segment_over_limit_is_rejected_locally_without_network_traffic() {
    let addr = spawn_server(echo_host());
    let handle = Handle::connect(addr, RpcConfig::default().with_max_segment_len(4)).unwrap();

    let err = handle.path("much_too_long_a_segment").unwrap_err();
    assert!(matches!(err.kind, lrpc::ErrorKind::BadName));
}

#[test]
fn server_recovers_after_an_unsupported_command_and_accepts_a_new_session() {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    let addr = spawn_server(echo_host());

    // First connection: negotiate, then send a bogus opcode. The server
    // rejects it and closes that session, but stays listening (a single
    // bad command is well under the default link-error threshold).
    {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(&[3]).unwrap(); // CMD_CON
        raw.write_all(b"LRPC\x03\x01\x08\x00").unwrap();
        let mut response = [0_u8; 8];
        raw.read_exact(&mut response).unwrap();
        raw.write_all(&[99]).unwrap(); // not a recognized opcode
    }

    // Second connection still works, proving the listener kept serving.
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();
    let result = handle.path("echo").unwrap().call(vec![Value::Bool(false)]).unwrap();
    assert_eq!(result, vec![Value::Bool(false)]);
}

#[test]
fn get_on_path_with_empty_segment_is_rejected_and_session_closed() {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    let addr = spawn_server(echo_host());

    // A conforming client can never build a path with an empty interior
    // segment (`Accessor::path` rejects empty segments locally), so drive
    // the wire directly to exercise the server's defense.
    {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(&[3]).unwrap(); // CMD_CON
        raw.write_all(b"LRPC\x03\x01\x08\x00").unwrap();
        let mut response = [0_u8; 8];
        raw.read_exact(&mut response).unwrap();

        raw.write_all(&[2]).unwrap(); // CMD_GET
        raw.read_exact(&mut response[..1]).unwrap(); // READY
        let path = b"a..b";
        raw.write_all(&(path.len() as u32).to_le_bytes()).unwrap();
        raw.write_all(path).unwrap();

        // The server closes the session without a reply.
        let mut buf = [0_u8; 1];
        assert_eq!(raw.read(&mut buf).unwrap(), 0);
    }

    // The listener is still serving afterward.
    let handle = Handle::connect(addr, RpcConfig::default()).unwrap();
    let value = handle.path("answer").unwrap().get().unwrap();
    assert_eq!(value, Value::Number(42.0));
}
