//! Subscription registry
//!
//! Maps each topic name to the ordered list of subscriptions for it. List
//! order is insertion order, which is also fan-out order.
//!
//! Subscribing twice from the same endpoint appends a second record; nothing
//! is deduplicated, so that endpoint receives each publish twice until the
//! records expire. Topics are never removed, even once every subscription has
//! expired.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use crate::transport::Endpoint;

/// One subscriber of one topic, as of its last refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub endpoint: Endpoint,
    pub refreshed_at: NaiveDateTime,
}

impl Subscription {
    /// Still live at `now` given a subscriber timeout of `ttl`.
    pub fn is_live(&self, now: NaiveDateTime, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.refreshed_at) < ttl
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registry {
    topics: HashMap<String, Vec<Subscription>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription for `endpoint`, creating the topic if needed.
    pub fn subscribe(&mut self, topic: &str, endpoint: Endpoint, now: NaiveDateTime) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscription {
                endpoint,
                refreshed_at: now,
            });
    }

    /// Subscriptions for `topic` in fan-out order. Unknown topics have none.
    pub fn subscriptions(&self, topic: &str) -> &[Subscription] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or_default()
    }

    /// Endpoints to deliver a publish on `topic` to, in fan-out order.
    pub fn subscribers(&self, topic: &str) -> Vec<Endpoint> {
        self.subscriptions(topic).iter().map(|s| s.endpoint).collect()
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Total number of subscription records across all topics.
    pub fn len(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry as it stands at `now`: every subscription older than
    /// `ttl` dropped, every topic kept.
    pub fn swept(self, now: NaiveDateTime, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let topics = self
            .topics
            .into_iter()
            .map(|(topic, subscriptions)| {
                let live = subscriptions
                    .into_iter()
                    .filter(|s| s.is_live(now, ttl))
                    .collect();
                (topic, live)
            })
            .collect();
        Self { topics }
    }
}
