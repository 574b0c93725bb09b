mod settings;

use std::path::Path;

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;

use crate::utils::error::ConfigurationError;

pub use settings::{
    BrokerSettings, PartialBrokerSettings, PartialPeerSettings, PeerRole, PeerSettings,
    SocketSettings,
};
pub use settings::{
    DEFAULT_BUFFER_SIZE_B, DEFAULT_IP_ADDRESS, DEFAULT_PORT, DEFAULT_SOCKET_TIMEOUT_S,
    DEFAULT_SUBSCRIBER_TIMEOUT_S, MAX_BUFFER_SIZE_B, MAX_SOCKET_TIMEOUT_S,
    MAX_SUBSCRIBER_TIMEOUT_S,
};

/// Prefix of environment variables overriding broker settings, e.g. `PUBSUB_BROKER_PORT`.
pub const BROKER_ENV_PREFIX: &str = "PUBSUB_BROKER";

/// Prefix of environment variables overriding peer settings, e.g. `PUBSUB_PEER_SUBSCRIPTIONS`.
pub const PEER_ENV_PREFIX: &str = "PUBSUB_PEER";

/// Loads the broker configuration from `path` (or `config/broker.*` when no
/// path is given) and `PUBSUB_BROKER_*` environment variables.
/// Merges it with default values and validates the result.
pub fn load_broker_settings(path: Option<&Path>) -> Result<BrokerSettings, ConfigurationError> {
    let partial: PartialBrokerSettings = load_partial(path, "config/broker", BROKER_ENV_PREFIX)?;
    partial.resolve()
}

/// Loads the peer configuration from `path` (or `config/peer.*`) and
/// `PUBSUB_PEER_*` environment variables. List values in the environment are
/// comma separated.
pub fn load_peer_settings(path: Option<&Path>) -> Result<PeerSettings, ConfigurationError> {
    let partial: PartialPeerSettings = load_partial(path, "config/peer", PEER_ENV_PREFIX)?;
    partial.resolve()
}

fn load_partial<T: DeserializeOwned>(
    path: Option<&Path>,
    default_name: &str,
    env_prefix: &str,
) -> Result<T, ConfigurationError> {
    // an explicitly named file must exist, the default one is optional
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(default_name).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(env_prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("subscriptions")
                .with_list_parse_key("publications"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
