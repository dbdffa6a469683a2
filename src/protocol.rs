//! Line-delimited JSON wire protocol.
//!
//! Requests and responses are single JSON objects, each terminated by `\n`.
//! There is no length prefix and no framing beyond the newline, so payload
//! values must not contain raw newlines.
//!
//! ## Architecture
//!
//! ```text
//! +----------+                     +----------+
//! |  Client  |  --- Request  -->   |  Server  |
//! |          |  <-- Response ---   |          |
//! +----------+                     +----------+
//!               ^               ^
//!               | JsonLineCodec |
//!               +---------------+
//! ```
//!
//! ## Terminology
//!
//! - **Frame**: one newline-terminated JSON object
//! - **Request**: `{"command": <string>, "data": <object, optional>}`
//! - **Response**: `{"success": ...}`, `{"error": <string>}`, or a listing
//!   under a named key (`vms`, `disks`)

pub mod codec;
pub mod error;
pub mod request;
pub mod response;

pub use codec::{DEFAULT_MAX_FRAME_LENGTH, JsonLineCodec};
pub use error::ProtocolError;
pub use request::{Command, Request};
pub use response::{Response, reason};
