//! Per-connection glue between the framing layer and the compression
//! processor.
//!
//! ## Message flow
//!
//! 1. **Send** - [`MessageWriter`] compresses a message and fragments it,
//!    setting RSV1 on the first frame only
//! 2. **Receive** - [`MessageReader`] checks RSV1 usage, reassembles
//!    fragments and decompresses under the configured size ceiling
//!
//! ## Example
//!
//! ```rust
//! use pmce::{Config, Message, Role, Session};
//!
//! let config = Config::default();
//! let mut client = Session::new(Role::Client, None, &config);
//! let mut server = Session::new(Role::Server, None, &config);
//!
//! let mut received = None;
//! for frame in client.send(&Message::text("hello")).unwrap() {
//!     received = server.receive(frame).unwrap();
//! }
//! assert_eq!(received, Some(Message::text("hello")));
//! ```

mod fragmenter;
mod role;
mod session;
mod state;
mod stats;

pub use fragmenter::MessageFragmenter;
pub use role::Role;
pub use session::{MessageReader, MessageWriter, Session};
pub use state::StreamState;
pub use stats::{OctetCounter, TrafficStats};
