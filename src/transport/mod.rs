//! The `transport` module is responsible for datagram communication between
//! the broker and its peers.
//!
//! It defines the endpoint type, the text wire format, and the `Session`
//! wrapper around a UDP socket that both roles build on.

pub mod endpoint;
pub mod message;
pub mod session;

pub use endpoint::Endpoint;
pub use message::{Message, MessageKind};
pub use session::Session;
