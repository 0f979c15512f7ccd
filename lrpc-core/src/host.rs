//! The host capability the core consumes, plus a reference in-process
//! implementation used by the integration tests and examples.
//! `luarpc.c`'s `read_cmd_call`/`read_cmd_get`/`read_cmd_newindex` show the
//! shape a concrete one takes: a global namespace keyed by the first
//! dotted segment, field lookup thereafter.
//!
//! A server's accepting transport runs on whatever thread calls
//! [`crate::server::Server::serve_one`], so the host must be safely
//! shareable across threads even though only one ever touches it at a
//! time; `TableHost` uses `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>`
//! for that reason.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, RpcError, RpcResult};
use crate::wire::value::Value;

/// A value as the host actually stores it: a strict superset of the wire
/// [`Value`] domain, since the host may also hold references the wire
/// cannot carry (userdata, threads, light pointers, collapsed here into
/// `Foreign`).
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Number(f64),
    String(Vec<u8>),
    Table(Arc<Mutex<Vec<(HostValue, HostValue)>>>),
    Callable(Arc<NamedCallable>),
    /// A live reference that cannot be marshaled onto the wire.
    Foreign(&'static str),
}

type CallResult = Result<Vec<Value>, (i32, String)>;
type CallableFn = dyn Fn(&[Value]) -> CallResult + Send + Sync;

pub struct NamedCallable {
    pub name: String,
    pub func: Box<CallableFn>,
}

impl std::fmt::Debug for NamedCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCallable").field("name", &self.name).finish()
    }
}

impl std::fmt::Debug for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Table(entries) => f
                .debug_tuple("Table")
                .field(&entries.lock().expect("table mutex poisoned").len())
                .finish(),
            Self::Callable(nc) => f.debug_tuple("Callable").field(&nc.name).finish(),
            Self::Foreign(kind) => f.debug_tuple("Foreign").field(kind).finish(),
        }
    }
}

impl HostValue {
    #[must_use]
    pub fn table() -> Self {
        Self::Table(Arc::new(Mutex::new(Vec::new())))
    }
}

/// The capability the dispatcher needs from the script runtime.
pub trait Host: Send + Sync {
    fn get_global(&self, name: &str) -> HostValue;
    fn set_global(&self, name: &str, value: HostValue);
    /// Looks up `key` on `table`; returns `Nil` if `table` isn't a table or
    /// has no such key (matches a failed field lookup falling through to
    /// "not callable" at the call site, as the original does).
    fn index(&self, table: &HostValue, key: &Value) -> HostValue;
    fn set_index(&self, table: &HostValue, key: Value, value: HostValue) -> RpcResult<()>;
    fn is_callable(&self, value: &HostValue) -> bool;
    fn call(&self, target: &HostValue, args: Vec<Value>) -> Result<Vec<Value>, (i32, String)>;
    /// Converts a host value to its wire representation, dumping callables
    /// via their portable chunk and rejecting anything foreign with a
    /// human-readable error.
    fn to_wire(&self, value: &HostValue) -> RpcResult<Value>;
    /// Converts a decoded wire value into a host value, loading `Function`
    /// chunks back into callables.
    #[allow(clippy::wrong_self_convention)]
    fn from_wire(&self, value: Value) -> HostValue;
}

/// A reference [`Host`]: an in-process tree of named values, with
/// callables backed by ordinary Rust closures registered ahead of time.
#[derive(Default)]
pub struct TableHost {
    globals: Mutex<HashMap<String, HostValue>>,
    callables: Mutex<HashMap<String, Arc<NamedCallable>>>,
}

fn value_eq(key: &Value, host_key: &HostValue) -> bool {
    match (key, host_key) {
        (Value::Nil, HostValue::Nil) => true,
        (Value::Bool(a), HostValue::Bool(b)) => a == b,
        (Value::Number(a), HostValue::Number(b)) => a == b,
        (Value::String(a), HostValue::String(b)) => a == b,
        _ => false,
    }
}

impl TableHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named Rust closure as a callable global. `name` doubles
    /// as the portable "chunk" dumped onto the wire, and is looked back up
    /// by [`Host::from_wire`] on the receiving side.
    pub fn register_callable(
        &self,
        global_name: &str,
        func: impl Fn(&[Value]) -> Result<Vec<Value>, (i32, String)> + Send + Sync + 'static,
    ) {
        let named = Arc::new(NamedCallable {
            name: global_name.to_string(),
            func: Box::new(func),
        });
        self.callables
            .lock()
            .expect("callables mutex poisoned")
            .insert(global_name.to_string(), named.clone());
        self.globals
            .lock()
            .expect("globals mutex poisoned")
            .insert(global_name.to_string(), HostValue::Callable(named));
    }
}

impl Host for TableHost {
    fn get_global(&self, name: &str) -> HostValue {
        self.globals
            .lock()
            .expect("globals mutex poisoned")
            .get(name)
            .cloned()
            .unwrap_or(HostValue::Nil)
    }

    fn set_global(&self, name: &str, value: HostValue) {
        self.globals
            .lock()
            .expect("globals mutex poisoned")
            .insert(name.to_string(), value);
    }

    fn index(&self, table: &HostValue, key: &Value) -> HostValue {
        match table {
            HostValue::Table(entries) => entries
                .lock()
                .expect("table mutex poisoned")
                .iter()
                .find(|(k, _)| value_eq(key, k))
                .map(|(_, v)| v.clone())
                .unwrap_or(HostValue::Nil),
            _ => HostValue::Nil,
        }
    }

    fn set_index(&self, table: &HostValue, key: Value, value: HostValue) -> RpcResult<()> {
        match table {
            HostValue::Table(entries) => {
                let mut entries = entries.lock().expect("table mutex poisoned");
                let key_host = self.from_wire(key.clone());
                if let Some(slot) = entries.iter_mut().find(|(k, _)| value_eq(&key, k)) {
                    slot.1 = value;
                } else {
                    entries.push((key_host, value));
                }
                Ok(())
            }
            _ => Err(RpcError::nonfatal(ErrorKind::Remote(
                "attempt to index a non-table value".to_string(),
            ))),
        }
    }

    fn is_callable(&self, value: &HostValue) -> bool {
        matches!(value, HostValue::Callable(_))
    }

    fn call(&self, target: &HostValue, args: Vec<Value>) -> Result<Vec<Value>, (i32, String)> {
        match target {
            HostValue::Callable(nc) => (nc.func)(&args),
            _ => Err((1, "attempt to call a non-function value".to_string())),
        }
    }

    fn to_wire(&self, value: &HostValue) -> RpcResult<Value> {
        match value {
            HostValue::Nil => Ok(Value::Nil),
            HostValue::Bool(b) => Ok(Value::Bool(*b)),
            HostValue::Number(n) => Ok(Value::Number(*n)),
            HostValue::String(s) => Ok(Value::String(s.clone())),
            HostValue::Table(entries) => {
                let mut out = Vec::new();
                for (k, v) in entries.lock().expect("table mutex poisoned").iter() {
                    out.push((self.to_wire(k)?, self.to_wire(v)?));
                }
                Ok(Value::Table(out))
            }
            HostValue::Callable(nc) => Ok(Value::Function(nc.name.clone().into_bytes())),
            HostValue::Foreign(kind) => Err(RpcError::nonfatal(ErrorKind::Remote(format!(
                "can't pass {kind} to a remote function"
            )))),
        }
    }

    fn from_wire(&self, value: Value) -> HostValue {
        match value {
            Value::Nil => HostValue::Nil,
            Value::Bool(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Number(n),
            Value::String(s) => HostValue::String(s),
            Value::Table(entries) => HostValue::Table(Arc::new(Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (self.from_wire(k), self.from_wire(v)))
                    .collect(),
            ))),
            Value::Function(chunk) => {
                let name = String::from_utf8_lossy(&chunk).to_string();
                self.callables
                    .lock()
                    .expect("callables mutex poisoned")
                    .get(&name)
                    .map(|nc| HostValue::Callable(nc.clone()))
                    .unwrap_or(HostValue::Foreign("unresolvable function chunk"))
            }
        }
    }
}

impl std::fmt::Debug for TableHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHost")
            .field(
                "globals",
                &self
                    .globals
                    .lock()
                    .expect("globals mutex poisoned")
                    .keys()
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
