use thiserror::Error;

/// Whether an error requires the transport it occurred on to be torn down.
///
/// Grading is a property of the error *value*, established at the point the
/// error is raised, not inferred later from unwind state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    /// Mandates closing the affected transport.
    Fatal,
    /// May be reported to the caller without tearing down the transport.
    Nonfatal,
}

/// Errors raised by the lrpc runtime.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed unexpectedly (\"end of file\")")]
    Eof,

    /// An operation was attempted on a transport that is already closed.
    #[error("operation requested on a closed transport")]
    Closed,

    /// A malformed frame: bad magic, version mismatch, or an unknown value tag.
    #[error("error in the received lrpc protocol: {0}")]
    Protocol(&'static str),

    /// An unknown or forbidden command opcode was received.
    #[error("undefined rpc command")]
    Command,

    /// A transport-layer I/O failure.
    #[error("transmission error at data link level")]
    DataLink(#[source] std::io::Error),

    /// A read was attempted but no data was available.
    #[error("no data received when attempting to read")]
    NoData,

    /// A path segment exceeded [`crate::config::RpcConfig::max_segment_len`]. Never sent over the wire.
    #[error("segment name is too long")]
    BadName,

    /// The remote call target was not callable, or raised during execution.
    #[error("{0}")]
    Remote(String),
}

/// A graded [`ErrorKind`]: carries the fatal/nonfatal classification the
/// point of failure assigned it.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub grade: Grade,
}

impl RpcError {
    #[must_use]
    pub fn fatal(kind: ErrorKind) -> Self {
        Self {
            kind,
            grade: Grade::Fatal,
        }
    }

    #[must_use]
    pub fn nonfatal(kind: ErrorKind) -> Self {
        Self {
            kind,
            grade: Grade::Nonfatal,
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.grade == Grade::Fatal
    }
}

/// I/O failures on the transport are always fatal: `Closed` and `EOF` are
/// always fatal, and any other I/O failure is `DataLink`, also fatal.
impl From<std::io::Error> for RpcError {
    fn from(source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::fatal(ErrorKind::Eof),
            _ => Self::fatal(ErrorKind::DataLink(source)),
        }
    }
}

/// Abbreviation of `Result<T, RpcError>`.
pub type RpcResult<T> = std::result::Result<T, RpcError>;
