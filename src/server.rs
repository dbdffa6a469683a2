//! TCP server for line-delimited JSON connections.
//!
//! This module provides the network layer that accepts client connections,
//! drives the request/response cycle on each of them, and tracks which VM
//! each connection has authenticated as.
//!
//! ## Architecture
//!
//! ```text
//! +--------+
//! | Server |  <- Accepts TCP connections
//! +--------+
//!      |
//!      v
//! +------------+     +------------+     +---------+
//! | Connection | --> | Dispatcher | --> | VmStore |
//! +------------+     +------------+     +---------+
//!      |                   |
//!      v                   v
//! +--------------+
//! | SessionStore |  <- connection -> authenticated VM
//! +--------------+
//! ```
//!
//! ## Terminology
//!
//! - **Server**: TCP listener that spawns one task per connection
//! - **Connection**: Per-client frame loop (read, dispatch, write)
//! - **Dispatcher**: Routes a request to a store operation
//! - **SessionStore**: Process-wide map from connection to VM identifier
//!
//! ## Concurrency
//!
//! Connections are tokio tasks. The binary runs them on a single-threaded
//! runtime, but nothing here depends on that: the session store is
//! mutex-guarded, and `PgStore` serializes database access itself.
//!
//! `list_authorized_vms` reports VMs authenticated on *any* connection.
//! Sessions are visible to every client.

pub mod connection;
pub mod dispatcher;
pub mod listener;
pub mod sessions;

pub use connection::{Connection, ConnectionError};
pub use dispatcher::Dispatcher;
pub use listener::Server;
pub use sessions::{ConnectionId, SessionStore};
