//! The `client` module holds the peer side of the system.
//!
//! A [`Peer`] talks to one broker over its own ephemeral UDP socket. It keeps
//! its subscription alive and then either listens for fan-out or submits data.

pub mod peer;
pub use peer::{Peer, PeerState, PeerStats};

#[cfg(test)]
mod tests;
