use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behavior of `Connection::submit` when the per-connection outbound queue
/// is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferOverflowStrategy {
    /// The caller suspends until space is available or the queue closes.
    Block,
    /// The message is dropped and logged; the caller never suspends.
    Discard,
}

impl Default for BufferOverflowStrategy {
    fn default() -> Self {
        BufferOverflowStrategy::Block
    }
}

/// Every field this core consults. Loading this value
/// from a file, environment, or CLI is explicitly out of scope; callers
/// construct it however suits their deployment and hand it to `Server`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reject CONNECT without username+password when `false`.
    pub allow_anonymous_connect: bool,
    /// Caps active sessions when `> 0`; `0` means unbounded.
    pub max_connections: usize,
    /// Upper bound on accepted client id length (lower bound is always 1).
    pub max_client_id_length: usize,
    /// Per-write socket deadline.
    pub io_timeout: Duration,
    /// Writes exceeding this elapsed time are counted and logged as slow.
    pub client_slow_threshold: Duration,
    /// Behavior of `submit` against a full outbound queue.
    pub buff_overflow_strategy: BufferOverflowStrategy,
    /// Bound on the per-connection outbound job queue.
    pub outbound_queue_capacity: usize,
    /// Log every inbound and outbound message at debug level when `true`.
    pub echo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_anonymous_connect: true,
            max_connections: 0,
            max_client_id_length: 23,
            io_timeout: Duration::from_secs(5),
            client_slow_threshold: Duration::from_secs(1),
            buff_overflow_strategy: BufferOverflowStrategy::Block,
            outbound_queue_capacity: 100,
            echo: false,
        }
    }
}
