use std::time::Duration;

use serde::Deserialize;

use crate::transport::Endpoint;
use crate::transport::message::is_valid_field;
use crate::utils::error::ConfigurationError;

pub const DEFAULT_IP_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5005;
pub const DEFAULT_SOCKET_TIMEOUT_S: f64 = 0.1;
pub const MAX_SOCKET_TIMEOUT_S: f64 = 1.0;
pub const DEFAULT_BUFFER_SIZE_B: usize = 1024;
pub const MAX_BUFFER_SIZE_B: usize = 16384;
pub const DEFAULT_SUBSCRIBER_TIMEOUT_S: f64 = 5.0;
pub const MAX_SUBSCRIBER_TIMEOUT_S: f64 = 10.0;

/// Socket parameters shared by the broker and the peer.
///
/// The timeout lies in `(0, 1] s` and the buffer size in `(0, 16384]` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketSettings {
    pub timeout: Duration,
    pub buffer_size: usize,
}

impl SocketSettings {
    pub fn new(socket_timeout_s: f64, buffer_size_b: i64) -> Result<Self, ConfigurationError> {
        if !within(socket_timeout_s, MAX_SOCKET_TIMEOUT_S) {
            return Err(ConfigurationError::InvalidSocketTimeout(socket_timeout_s));
        }
        let buffer_size = usize::try_from(buffer_size_b)
            .ok()
            .filter(|size| (1..=MAX_BUFFER_SIZE_B).contains(size))
            .ok_or(ConfigurationError::InvalidBufferSize(buffer_size_b))?;

        Ok(Self {
            timeout: Duration::from_secs_f64(socket_timeout_s),
            buffer_size,
        })
    }
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_SOCKET_TIMEOUT_S),
            buffer_size: DEFAULT_BUFFER_SIZE_B,
        }
    }
}

/// Broker configuration: where to bind, socket parameters, and how long a
/// subscription lives without being refreshed (`(0, 10] s`).
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub endpoint: Endpoint,
    pub socket: SocketSettings,
    pub subscriber_timeout: Duration,
}

impl BrokerSettings {
    pub fn new(
        ip_address: &str,
        port: i64,
        socket_timeout_s: f64,
        buffer_size_b: i64,
        subscriber_timeout_s: f64,
    ) -> Result<Self, ConfigurationError> {
        let endpoint = Endpoint::parse(ip_address, port)?;
        let socket = SocketSettings::new(socket_timeout_s, buffer_size_b)?;
        if !within(subscriber_timeout_s, MAX_SUBSCRIBER_TIMEOUT_S) {
            return Err(ConfigurationError::InvalidSubscriberTimeout(subscriber_timeout_s));
        }

        Ok(Self {
            endpoint,
            socket,
            subscriber_timeout: Duration::from_secs_f64(subscriber_timeout_s),
        })
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            socket: SocketSettings::default(),
            subscriber_timeout: Duration::from_secs_f64(DEFAULT_SUBSCRIBER_TIMEOUT_S),
        }
    }
}

/// What a peer does once subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRole {
    /// Wait for fan-out on these topics.
    Subscriber(Vec<String>),
    /// Submit random data to these topics.
    Publisher(Vec<String>),
    /// Nothing configured.
    Idle,
}

/// Peer configuration. A peer either subscribes or publishes, never both.
/// Topic names may not contain the wire field separator.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSettings {
    pub broker: Endpoint,
    pub socket: SocketSettings,
    role: PeerRole,
}

impl PeerSettings {
    pub fn new(
        broker_ip_address: &str,
        broker_port: i64,
        socket_timeout_s: f64,
        buffer_size_b: i64,
        subscriptions: Vec<String>,
        publications: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        let broker = Endpoint::parse(broker_ip_address, broker_port)?;
        let socket = SocketSettings::new(socket_timeout_s, buffer_size_b)?;
        if let Some(topic) = subscriptions
            .iter()
            .chain(&publications)
            .find(|topic| !is_valid_field(topic))
        {
            return Err(ConfigurationError::InvalidTopic(topic.clone()));
        }
        let role = match (subscriptions.is_empty(), publications.is_empty()) {
            (false, false) => return Err(ConfigurationError::SubscriptionsAndPublications),
            (false, true) => PeerRole::Subscriber(subscriptions),
            (true, false) => PeerRole::Publisher(publications),
            (true, true) => PeerRole::Idle,
        };

        Ok(Self {
            broker,
            socket,
            role,
        })
    }

    pub fn role(&self) -> &PeerRole {
        &self.role
    }

    pub fn subscriptions(&self) -> &[String] {
        match &self.role {
            PeerRole::Subscriber(topics) => topics,
            _ => &[],
        }
    }

    pub fn publications(&self) -> &[String] {
        match &self.role {
            PeerRole::Publisher(topics) => topics,
            _ => &[],
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            broker: default_endpoint(),
            socket: SocketSettings::default(),
            role: PeerRole::Idle,
        }
    }
}

/// Partial broker settings as read from files or the environment.
///
/// Missing values are filled from the defaults in [`PartialBrokerSettings::resolve`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartialBrokerSettings {
    #[serde(alias = "ip_address")]
    pub ip_address: Option<String>,
    pub port: Option<i64>,
    #[serde(alias = "socket_timeout_s")]
    pub socket_timeout_s: Option<f64>,
    #[serde(alias = "buffer_size_b")]
    pub buffer_size_b: Option<i64>,
    #[serde(alias = "subscriber_timeout_s")]
    pub subscriber_timeout_s: Option<f64>,
}

impl PartialBrokerSettings {
    pub fn resolve(self) -> Result<BrokerSettings, ConfigurationError> {
        BrokerSettings::new(
            self.ip_address.as_deref().unwrap_or(DEFAULT_IP_ADDRESS),
            self.port.unwrap_or(i64::from(DEFAULT_PORT)),
            self.socket_timeout_s.unwrap_or(DEFAULT_SOCKET_TIMEOUT_S),
            self.buffer_size_b.unwrap_or(DEFAULT_BUFFER_SIZE_B as i64),
            self.subscriber_timeout_s.unwrap_or(DEFAULT_SUBSCRIBER_TIMEOUT_S),
        )
    }
}

/// Partial peer settings as read from files or the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartialPeerSettings {
    #[serde(alias = "publisher_ip_address")]
    pub publisher_ip_address: Option<String>,
    #[serde(alias = "publisher_port")]
    pub publisher_port: Option<i64>,
    #[serde(alias = "socket_timeout_s")]
    pub socket_timeout_s: Option<f64>,
    #[serde(alias = "buffer_size_b")]
    pub buffer_size_b: Option<i64>,
    pub subscriptions: Option<Vec<String>>,
    pub publications: Option<Vec<String>>,
}

impl PartialPeerSettings {
    pub fn resolve(self) -> Result<PeerSettings, ConfigurationError> {
        PeerSettings::new(
            self.publisher_ip_address.as_deref().unwrap_or(DEFAULT_IP_ADDRESS),
            self.publisher_port.unwrap_or(i64::from(DEFAULT_PORT)),
            self.socket_timeout_s.unwrap_or(DEFAULT_SOCKET_TIMEOUT_S),
            self.buffer_size_b.unwrap_or(DEFAULT_BUFFER_SIZE_B as i64),
            self.subscriptions.unwrap_or_default(),
            self.publications.unwrap_or_default(),
        )
    }
}

fn default_endpoint() -> Endpoint {
    Endpoint::from_parts(
        std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        DEFAULT_PORT,
    )
    .unwrap_or_else(|_| unreachable!("default port is non-zero"))
}

/// `value` in the half-open interval `(0, max]`.
fn within(value: f64, max: f64) -> bool {
    value > 0.0 && value <= max
}
