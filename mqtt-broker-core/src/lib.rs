//! Core per-connection protocol engine for an embeddable MQIsdp/3 message
//! broker. This crate owns the hard concurrency: the
//! inbound/outbound loop pair per connection, the keep-alive watchdog, the
//! subscription registry and topic matcher, the client-identity table with
//! duplicate-takeover, and the persistence hook. Configuration *loading*,
//! on-disk stores, cluster replication, auth backends and metrics sinks are
//! external collaborators reached through the narrow traits in this crate
//! (`stats`, `auth`, `persistence`, `peer`) — each has a no-op default so
//! the broker runs standalone.
//!
//! [`server::Server`] is the typical entry point: it owns the shared state
//! (`client_table`, `registry`, the adapter trait objects) and spawns an
//! [`engine::run_connection`] task per accepted socket.

pub mod auth;
pub mod client_table;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod peer;
pub mod persistence;
pub mod registry;
pub mod server;
pub mod stats;
pub mod topic;

pub use config::{BufferOverflowStrategy, Config};
pub use engine::Shared;
pub use error::Error;
pub use server::Server;
