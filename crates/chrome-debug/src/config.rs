use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Tuning knobs for a debugger connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied to discovery sidecar HTTP requests.
    pub http_timeout: Duration,
    /// Capacity of each delivery channel. A full channel stalls the dispatch
    /// loop, and with it all inbound traffic for the connection.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
