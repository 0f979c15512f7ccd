//! Runtime configuration, grounded on `hdbconnect_impl`'s
//! `ConnectionConfiguration`: const defaults plus the getter/`set_`/`with_`
//! trio for each knob.

#[derive(Debug, Clone)]
pub struct RpcConfig {
    max_segment_len: usize,
    max_link_errs: u32,
    listen_backlog: i32,
    protocol_version: u8,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_segment_len: Self::DEFAULT_MAX_SEGMENT_LEN,
            max_link_errs: Self::DEFAULT_MAX_LINK_ERRS,
            listen_backlog: Self::DEFAULT_LISTEN_BACKLOG,
            protocol_version: crate::wire::PROTOCOL_VERSION,
        }
    }
}

impl RpcConfig {
    /// Default maximum length, in bytes, of a single dotted-path segment.
    /// A segment over this length is rejected locally as `BadName`.
    pub const DEFAULT_MAX_SEGMENT_LEN: usize = 32;

    /// Default number of consecutive nonfatal errors a server session
    /// tolerates before escalating to fatal.
    pub const DEFAULT_MAX_LINK_ERRS: u32 = 20;

    /// Default backlog passed to the listening socket.
    pub const DEFAULT_LISTEN_BACKLOG: i32 = 32;

    /// Returns the configured maximum segment length.
    #[must_use]
    pub fn max_segment_len(&self) -> usize {
        self.max_segment_len
    }
    /// Sets the maximum segment length.
    pub fn set_max_segment_len(&mut self, len: usize) {
        self.max_segment_len = len;
    }
    /// Builder-method for the maximum segment length.
    #[must_use]
    pub fn with_max_segment_len(mut self, len: usize) -> Self {
        self.max_segment_len = len;
        self
    }

    /// Returns the configured link-error escalation threshold.
    #[must_use]
    pub fn max_link_errs(&self) -> u32 {
        self.max_link_errs
    }
    /// Sets the link-error escalation threshold.
    pub fn set_max_link_errs(&mut self, count: u32) {
        self.max_link_errs = count;
    }
    /// Builder-method for the link-error escalation threshold.
    #[must_use]
    pub fn with_max_link_errs(mut self, count: u32) -> Self {
        self.max_link_errs = count;
        self
    }

    /// Returns the configured listen backlog.
    #[must_use]
    pub fn listen_backlog(&self) -> i32 {
        self.listen_backlog
    }
    /// Sets the listen backlog.
    pub fn set_listen_backlog(&mut self, backlog: i32) {
        self.listen_backlog = backlog;
    }
    /// Builder-method for the listen backlog.
    #[must_use]
    pub fn with_listen_backlog(mut self, backlog: i32) -> Self {
        self.listen_backlog = backlog;
        self
    }

    /// Returns the protocol version this side advertises during
    /// negotiation, and requires the peer to match.
    #[must_use]
    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }
    /// Sets the advertised protocol version.
    pub fn set_protocol_version(&mut self, version: u8) {
        self.protocol_version = version;
    }
    /// Builder-method for the advertised protocol version.
    #[must_use]
    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }
}
