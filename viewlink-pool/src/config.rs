use std::time::Duration;

#[derive(Debug, Clone)]
/// Tunables applied to every connection a pool opens against its node.
///
/// The defaults mirror the configuration the transport is normally deployed
/// with: a single persistent connection per node, 5 second connect and
/// exchange deadlines and small socket buffers suited to view responses.
pub struct PoolConfig {
    /// The maximum number of live connections the pool will hold for one node.
    ///
    /// Checked-out and idle connections both count towards the limit.
    pub max_connections: usize,

    /// How long a connect attempt may take before it is abandoned.
    pub connect_timeout: Duration,

    /// The deadline applied to a single request/response exchange on an
    /// established connection.
    ///
    /// The pool itself keeps no clock; the connector bakes this into the
    /// sessions it produces.
    pub idle_read_timeout: Duration,

    /// Socket send/receive buffer size in bytes.
    pub socket_buffer_size: usize,

    /// Disable Nagle's algorithm on new connections.
    pub tcp_nodelay: bool,

    /// Enable TCP keep-alive probes on new connections.
    pub tcp_keepalive: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_read_timeout: Duration::from_secs(5),
            socket_buffer_size: 8 << 10,
            tcp_nodelay: true,
            tcp_keepalive: false,
        }
    }
}

impl PoolConfig {
    /// Set the maximum number of live connections held per node.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the deadline for establishing new connections.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline for a single exchange on an established connection.
    pub fn with_idle_read_timeout(mut self, timeout: Duration) -> Self {
        self.idle_read_timeout = timeout;
        self
    }

    /// Set the socket send/receive buffer size in bytes.
    pub fn with_socket_buffer_size(mut self, size: usize) -> Self {
        self.socket_buffer_size = size;
        self
    }

    /// Enable or disable `TCP_NODELAY` on new connections.
    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Enable or disable TCP keep-alive probes on new connections.
    pub fn with_tcp_keepalive(mut self, enabled: bool) -> Self {
        self.tcp_keepalive = enabled;
        self
    }
}
