//! The `error` module defines the error types used within `udp-pubsub`.
//!
//! Errors are split by layer so callers can decide what is fatal:
//! - [`ConfigurationError`]: raised while building settings, before any loop runs.
//! - [`MalformedMessage`]: a datagram that does not decode. Never fatal on its own.
//! - [`TransportError`]: socket failures (fatal) or a malformed datagram surfaced
//!   by a receive.

use std::io;

use thiserror::Error;

/// Invalid or inconsistent settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("invalid port: {0}")]
    InvalidPort(i64),

    #[error("invalid socket timeout: {0} s")]
    InvalidSocketTimeout(f64),

    #[error("invalid buffer size: {0}")]
    InvalidBufferSize(i64),

    #[error("invalid subscriber timeout: {0} s")]
    InvalidSubscriberTimeout(f64),

    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    #[error("cannot have both subscriptions and publications")]
    SubscriptionsAndPublications,

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// A datagram that could not be decoded into a `Message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("datagram is not valid UTF-8")]
    NotUtf8,

    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    #[error("message has no timestamp")]
    MissingTimestamp,

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// Errors raised by a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed message: {0}")]
    Malformed(#[from] MalformedMessage),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether the remote side reset the exchange (ICMP port unreachable and friends).
    pub fn is_remote_reset(&self) -> bool {
        match self {
            TransportError::Io(e) => is_remote_reset(e),
            TransportError::Malformed(_) => false,
        }
    }
}

/// Top-level error returned by the binary's run functions.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub(crate) fn is_remote_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
