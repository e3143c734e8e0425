//! Hub configuration

use std::net::SocketAddr;
use std::path::PathBuf;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address the observer channel binds to
    pub bind_addr: SocketAddr,

    /// Directory session logs are written under
    pub log_dir: PathBuf,

    /// Maximum concurrent observer connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY on observer sockets
    pub tcp_nodelay: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3401".parse().unwrap(),
            log_dir: PathBuf::from("testlogs"),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are small and latency-sensitive
        }
    }
}

impl HubConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the session log directory
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set maximum observer connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Disable TCP_NODELAY
    pub fn disable_nodelay(mut self) -> Self {
        self.tcp_nodelay = false;
        self
    }
}
