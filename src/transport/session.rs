//! Datagram session
//!
//! A `Session` owns one UDP socket and everything both roles share on top of
//! it: the bounded receive wait, message encoding on send, decoding on receive,
//! and the sent/received counters.
//!
//! Timeouts and remote resets are transient: `poll` reports them as "nothing
//! arrived" and `receive` simply waits again. Decode failures come back as
//! `TransportError::Malformed` so the caller can log and move on. Every other
//! socket error is returned as `TransportError::Io` and is meant to end the
//! caller's loop. The socket closes when the session is dropped.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::transport::endpoint::Endpoint;
use crate::transport::message::Message;
use crate::utils::error::{TransportError, is_remote_reset};

#[derive(Debug)]
pub struct Session {
    socket: UdpSocket,
    timeout: Duration,
    buffer: Vec<u8>,
    sent: u64,
    received: u64,
}

impl Session {
    /// Bind to a known endpoint (broker side).
    pub async fn bind(
        endpoint: &Endpoint,
        timeout: Duration,
        buffer_size: usize,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(endpoint.socket_addr()).await?;
        Ok(Self::from_socket(socket, timeout, buffer_size))
    }

    /// Bind an OS-assigned port of the same address family as `remote`
    /// (peer side).
    pub async fn ephemeral(
        remote: &Endpoint,
        timeout: Duration,
        buffer_size: usize,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(remote.wildcard_for()).await?;
        Ok(Self::from_socket(socket, timeout, buffer_size))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket, timeout: Duration, buffer_size: usize) -> Self {
        Self {
            socket,
            timeout,
            buffer: vec![0; buffer_size],
            sent: 0,
            received: 0,
        }
    }

    pub fn local_endpoint(&self) -> Result<Endpoint, TransportError> {
        let addr = self.socket.local_addr()?;
        Endpoint::try_from(addr).map_err(|e| {
            TransportError::Io(std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, e))
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn received_count(&self) -> u64 {
        self.received
    }

    pub async fn send(&mut self, message: &Message, endpoint: &Endpoint) -> Result<(), TransportError> {
        info!("Sending message to {endpoint} [#{:5}]: {message}", self.sent);
        self.socket
            .send_to(&message.to_bytes(), endpoint.socket_addr())
            .await?;
        self.sent += 1;
        Ok(())
    }

    /// Wait at most one timeout for a datagram.
    ///
    /// `Ok(None)` means nothing usable arrived in this tick.
    pub async fn poll(&mut self) -> Result<Option<(Message, Endpoint)>, TransportError> {
        let (len, addr) = match time::timeout(self.timeout, self.socket.recv_from(&mut self.buffer)).await {
            Err(_elapsed) => return Ok(None),
            Ok(Err(e)) if is_remote_reset(&e) => {
                trace!("remote reset while receiving: {e}");
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(received)) => received,
        };

        let sender = match Endpoint::try_from(addr) {
            Ok(sender) => sender,
            Err(e) => {
                warn!("Ignoring datagram from {addr}: {e}");
                return Ok(None);
            }
        };

        let message = Message::from_bytes(&self.buffer[..len]).inspect_err(|e| {
            debug!("Undecodable datagram from {sender} ({len} bytes): {e}");
        })?;

        self.received += 1;
        info!("Received message from {sender} [#{:5}]: {message}", self.received);
        Ok(Some((message, sender)))
    }

    /// Block until a datagram arrives, retrying across ticks. A datagram that
    /// does not decode is still returned, as `TransportError::Malformed`.
    pub async fn receive(&mut self) -> Result<(Message, Endpoint), TransportError> {
        loop {
            if let Some(received) = self.poll().await? {
                return Ok(received);
            }
        }
    }
}
