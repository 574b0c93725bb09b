//! Broker engine
//!
//! This module contains the broker loop responsible for:
//! - registering (and re-registering) subscriptions per topic
//! - fanning out submitted data to every live subscriber of its topic
//! - evicting subscriptions that were not refreshed within the subscriber timeout
//!
//! Concurrency and usage notes:
//! - The broker is a single loop over one socket. Each `step` waits at most one
//!   socket timeout for a datagram, sweeps expired subscriptions, then handles
//!   the datagram if one arrived. The registry is only touched from here, so no
//!   locking is involved.
//! - Sweeping happens before dispatch, so a submit never reaches a subscription
//!   that had already expired when the submit was taken off the socket. An idle
//!   broker still sweeps once per timeout.
//! - Fan-out is fire-and-forget: a failed send to one subscriber is logged and
//!   the remaining subscribers are still served.

use std::mem;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::broker::topic::Registry;
use crate::config::BrokerSettings;
use crate::transport::{Endpoint, Message, MessageKind, Session};
use crate::utils::env::{Environment, SystemEnv};
use crate::utils::error::TransportError;

#[derive(Debug)]
pub struct Broker<E: Environment = SystemEnv> {
    session: Session,
    registry: Registry,
    subscriber_timeout: Duration,
    env: E,
}

impl Broker<SystemEnv> {
    /// Bind the configured endpoint using the system clock.
    pub async fn bind(settings: &BrokerSettings) -> Result<Self, TransportError> {
        Self::bind_with_env(settings, SystemEnv).await
    }
}

impl<E: Environment> Broker<E> {
    pub async fn bind_with_env(settings: &BrokerSettings, env: E) -> Result<Self, TransportError> {
        let session = Session::bind(
            &settings.endpoint,
            settings.socket.timeout,
            settings.socket.buffer_size,
        )
        .await?;

        info!("Initialized broker");
        info!("  Endpoint:           {}", settings.endpoint);
        info!("  Buffer size:        {}", settings.socket.buffer_size);
        info!("  Subscriber timeout: {:?}", settings.subscriber_timeout);

        Ok(Self::with_session(session, settings.subscriber_timeout, env))
    }

    /// Build a broker around an already bound session.
    pub fn with_session(session: Session, subscriber_timeout: Duration, env: E) -> Self {
        Self {
            session,
            registry: Registry::new(),
            subscriber_timeout,
            env,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn local_endpoint(&self) -> Result<Endpoint, TransportError> {
        self.session.local_endpoint()
    }

    pub fn sent_count(&self) -> u64 {
        self.session.sent_count()
    }

    pub fn received_count(&self) -> u64 {
        self.session.received_count()
    }

    /// Register `sender` for every topic named in `message` and build the
    /// acknowledgment, which echoes the requested topics.
    pub fn handle_subscribe(&mut self, message: &Message, sender: Endpoint) -> Message {
        let now = self.env.now();
        for topic in message.fields() {
            info!("  Added subscription to {topic} for {sender}");
            self.registry.subscribe(topic, sender, now);
        }
        Message::subscribe(self.env.now(), message.fields().to_vec())
    }

    /// Publish the payload of `message` to every subscriber of its topic.
    pub async fn handle_submit(&mut self, message: &Message, sender: Endpoint) {
        let Some(topic) = message.topic() else {
            warn!("Invalid submit message from {sender}: {message}");
            return;
        };

        let publish = Message::publish(self.env.now(), topic, message.payload());
        for subscriber in self.registry.subscribers(topic) {
            if let Err(e) = self.session.send(&publish, &subscriber).await {
                warn!("Failed to send to {subscriber}: {e}");
            }
        }
    }

    /// Drop every subscription that is `subscriber_timeout` old or older at `now`.
    pub fn sweep_expired(&mut self, now: NaiveDateTime) {
        let before = self.registry.len();
        self.registry = mem::take(&mut self.registry).swept(now, self.subscriber_timeout);
        let evicted = before - self.registry.len();
        if evicted > 0 {
            info!("Evicted {evicted} expired subscription(s)");
        }
    }

    async fn dispatch(&mut self, message: Message, sender: Endpoint) -> Option<Message> {
        debug!("Processing message from {sender}: {message}...");
        let started = Instant::now();

        let reply = match message.kind() {
            MessageKind::Subscribe => Some(self.handle_subscribe(&message, sender)),
            MessageKind::Submit => {
                self.handle_submit(&message, sender).await;
                None
            }
            MessageKind::Publish => {
                warn!("Unhandled message kind: {}", message.kind());
                None
            }
        };

        debug!(
            "Processed message in {:.3} seconds: {message}",
            started.elapsed().as_secs_f64()
        );
        reply
    }

    /// One loop iteration: wait a tick, sweep, handle what arrived.
    pub async fn step(&mut self) -> Result<(), TransportError> {
        let received = match self.session.poll().await {
            Ok(received) => received,
            Err(TransportError::Malformed(e)) => {
                warn!("Dropping malformed datagram: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        self.sweep_expired(self.env.now());

        let Some((message, sender)) = received else {
            return Ok(());
        };
        if let Some(reply) = self.dispatch(message, sender).await {
            match self.session.send(&reply, &sender).await {
                Err(e) if e.is_remote_reset() => warn!("Could not reply to {sender}: {e}"),
                other => other?,
            }
        }
        Ok(())
    }

    /// Run until a fatal transport error. The socket is closed on return.
    pub async fn run(mut self) -> Result<(), TransportError> {
        info!("Running broker...");
        loop {
            if let Err(e) = self.step().await {
                error!("Broker loop failed, closing socket: {e}");
                return Err(e);
            }
        }
    }
}
