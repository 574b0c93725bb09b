//! Peer
//!
//! A peer first subscribes with the broker, retrying once per socket timeout
//! until the acknowledgment arrives. After that it either waits for fan-out
//! (subscriber) or submits random readings to its topics on a jittered
//! schedule (publisher). A peer configured with neither just idles.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{PeerRole, PeerSettings};
use crate::transport::{Endpoint, Message, MessageKind, Session};
use crate::utils::env::{Environment, SystemEnv};
use crate::utils::error::TransportError;

/// Upper bound of the publisher's sleep after each submission.
pub const MAX_PUBLISH_JITTER: Duration = Duration::from_secs(10);

/// Number of random values attached to each submission.
pub const FIELDS_PER_SUBMISSION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeerStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub submissions_sent: u64,
    pub publications_received: u64,
}

#[derive(Debug)]
pub struct Peer<E: Environment = SystemEnv> {
    session: Session,
    broker: Endpoint,
    role: PeerRole,
    state: PeerState,
    stats: PeerStats,
    env: E,
}

impl Peer<SystemEnv> {
    pub async fn connect(settings: &PeerSettings) -> Result<Self, TransportError> {
        Self::connect_with_env(settings, SystemEnv).await
    }
}

impl<E: Environment> Peer<E> {
    pub async fn connect_with_env(settings: &PeerSettings, env: E) -> Result<Self, TransportError> {
        let session = Session::ephemeral(
            &settings.broker,
            settings.socket.timeout,
            settings.socket.buffer_size,
        )
        .await?;

        info!("Initialized peer");
        info!("  Broker:        {}", settings.broker);
        info!("  Subscriptions: {:?}", settings.subscriptions());
        info!("  Publications:  {:?}", settings.publications());

        Ok(Self::with_session(
            session,
            settings.broker,
            settings.role().clone(),
            env,
        ))
    }

    pub fn with_session(session: Session, broker: Endpoint, role: PeerRole, env: E) -> Self {
        Self {
            session,
            broker,
            role,
            state: PeerState::Unsubscribed,
            stats: PeerStats::default(),
            env,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    pub fn role(&self) -> &PeerRole {
        &self.role
    }

    pub fn local_endpoint(&self) -> Result<Endpoint, TransportError> {
        self.session.local_endpoint()
    }

    fn subscription_topics(&self) -> Vec<String> {
        match &self.role {
            PeerRole::Subscriber(topics) => topics.clone(),
            PeerRole::Publisher(_) | PeerRole::Idle => Vec::new(),
        }
    }

    /// Send one Subscribe request and wait a single tick for the reply.
    ///
    /// Returns whether the peer is subscribed afterwards.
    pub async fn subscribe(&mut self) -> Result<bool, TransportError> {
        let request = Message::subscribe(self.env.now(), self.subscription_topics());
        self.session.send(&request, &self.broker).await?;
        self.stats.requests_sent += 1;

        if let Some((message, sender)) = self.session.poll().await? {
            self.dispatch(message, sender);
        }
        Ok(self.state == PeerState::Subscribed)
    }

    /// Submit `fields` to `topic`. No reply is expected.
    pub async fn submit(&mut self, topic: &str, fields: &[String]) -> Result<(), TransportError> {
        let message = Message::submit(self.env.now(), topic, fields);
        self.session.send(&message, &self.broker).await?;
        self.stats.submissions_sent += 1;
        Ok(())
    }

    fn dispatch(&mut self, message: Message, sender: Endpoint) {
        match message.kind() {
            MessageKind::Subscribe if sender != self.broker => {
                warn!("Ignoring acknowledgment from {sender}, expected {}", self.broker);
            }
            MessageKind::Subscribe => {
                self.stats.responses_received += 1;
                if self.state == PeerState::Unsubscribed {
                    info!("Subscribed via {sender}: {:?}", message.fields());
                }
                self.state = PeerState::Subscribed;
            }
            MessageKind::Publish => {
                self.stats.publications_received += 1;
                debug!("Publication from {sender}: {message}");
            }
            MessageKind::Submit => {
                warn!("Unhandled message kind: {}", message.kind());
            }
        }
    }

    async fn ensure_subscribed(&mut self) -> Result<(), TransportError> {
        while self.state == PeerState::Unsubscribed {
            match self.subscribe().await {
                Ok(_) => {}
                Err(e) if e.is_remote_reset() => debug!("Broker unreachable, retrying: {e}"),
                Err(TransportError::Malformed(e)) => warn!("Dropping malformed datagram: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn publish_round(&mut self, topics: &[String]) -> Result<(), TransportError> {
        for topic in topics {
            let fields: Vec<String> = (0..FIELDS_PER_SUBMISSION)
                .map(|_| format!("{:.6}", self.env.random_unit()))
                .collect();
            self.submit(topic, &fields).await?;

            let pause = self.env.random_jitter(MAX_PUBLISH_JITTER);
            debug!("Next submission in {}s", pause.as_secs());
            self.env.sleep(pause).await;
        }
        Ok(())
    }

    /// One loop iteration: make sure the subscription stands, then act
    /// according to the configured role.
    pub async fn step(&mut self) -> Result<(), TransportError> {
        self.ensure_subscribed().await?;

        match self.role.clone() {
            PeerRole::Subscriber(_) => match self.session.receive().await {
                Ok((message, sender)) => self.dispatch(message, sender),
                Err(TransportError::Malformed(e)) => warn!("Dropping malformed datagram: {e}"),
                Err(e) => return Err(e),
            },
            PeerRole::Publisher(topics) => self.publish_round(&topics).await?,
            PeerRole::Idle => self.env.sleep(self.session.timeout()).await,
        }
        Ok(())
    }

    /// Run until a fatal transport error. The socket is closed on return.
    pub async fn run(mut self) -> Result<(), TransportError> {
        info!("Running peer...");
        loop {
            if let Err(e) = self.step().await {
                error!("Peer loop failed, closing socket: {e}");
                return Err(e);
            }
        }
    }
}
