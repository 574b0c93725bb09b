//! # udp-pubsub
//!
//! `udp-pubsub` is a small publish/subscribe system over UDP. One broker
//! process keeps a registry of topic subscriptions and fans submitted data out
//! to every live subscriber; peer processes either subscribe to topics or
//! submit data to them.
//!
//! ## Core Modules
//!
//! - `broker`: The subscription registry, expiry sweep and dispatch loop.
//! - `client`: The peer: subscribe handshake, then listen or publish.
//! - `config`: Settings structs, validation, and file/environment loading.
//! - `transport`: Endpoints, the datagram wire format, and the UDP session.
//! - `utils`: Errors, logging setup, and the clock/randomness environment.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
