//! Wire message
//!
//! Every datagram carries exactly one message, encoded as comma-separated
//! UTF-8 text:
//!
//! ```text
//! <kind>,<YYYYMMDDHHMMSSffffff>,<field>,<field>,...
//! ```
//!
//! - `kind`: `subscribe`, `submit` or `publish` (case-insensitive on decode)
//! - timestamp: local time, fixed 20 digits, microsecond resolution
//! - fields: for `submit`/`publish` the first field is the topic and the rest
//!   is payload; for `subscribe` every field is a topic
//!
//! Fields are not escaped, so a field must never contain `,`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound};

use crate::utils::error::MalformedMessage;

pub const FIELD_SEPARATOR: char = ',';

/// `strftime` form of the wire timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// Number of digits in an encoded timestamp.
pub const TIMESTAMP_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Subscribe,
    Submit,
    Publish,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Subscribe => "subscribe",
            MessageKind::Submit => "submit",
            MessageKind::Publish => "publish",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = MalformedMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subscribe" => Ok(MessageKind::Subscribe),
            "submit" => Ok(MessageKind::Submit),
            "publish" => Ok(MessageKind::Publish),
            _ => Err(MalformedMessage::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    timestamp: NaiveDateTime,
    fields: Vec<String>,
}

impl Message {
    /// Build a message. The timestamp is truncated to microseconds so that
    /// the value survives an encode/decode cycle unchanged.
    pub fn new(kind: MessageKind, timestamp: NaiveDateTime, fields: Vec<String>) -> Self {
        Self {
            kind,
            timestamp: timestamp.trunc_subsecs(6),
            fields,
        }
    }

    /// Subscribe request (or acknowledgment) naming `topics`.
    pub fn subscribe(timestamp: NaiveDateTime, topics: Vec<String>) -> Self {
        Self::new(MessageKind::Subscribe, timestamp, topics)
    }

    pub fn submit(timestamp: NaiveDateTime, topic: &str, data: &[String]) -> Self {
        Self::new(MessageKind::Submit, timestamp, with_topic(topic, data))
    }

    pub fn publish(timestamp: NaiveDateTime, topic: &str, payload: &[String]) -> Self {
        Self::new(MessageKind::Publish, timestamp, with_topic(topic, payload))
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// First field, the topic of a `submit` or `publish`.
    pub fn topic(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }

    /// Fields after the topic.
    pub fn payload(&self) -> &[String] {
        self.fields.get(1..).unwrap_or_default()
    }

    /// Wire form of the message.
    ///
    /// Fields are joined without escaping, so a field containing
    /// [`FIELD_SEPARATOR`] comes back as several fields after decoding.
    /// Check untrusted fields with [`is_valid_field`] first.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}{FIELD_SEPARATOR}{}",
            self.kind,
            self.timestamp.format(TIMESTAMP_FORMAT)
        );
        for field in &self.fields {
            out.push(FIELD_SEPARATOR);
            out.push_str(field);
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self, MalformedMessage> {
        let mut tokens = text.split(FIELD_SEPARATOR);
        let kind: MessageKind = tokens.next().unwrap_or_default().parse()?;
        let timestamp = parse_timestamp(tokens.next().ok_or(MalformedMessage::MissingTimestamp)?)?;
        let fields = tokens.map(str::to_owned).collect();
        Ok(Self {
            kind,
            timestamp,
            fields,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedMessage> {
        let text = std::str::from_utf8(bytes).map_err(|_| MalformedMessage::NotUtf8)?;
        Self::decode(text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Message {
    type Err = MalformedMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Whether `field` can be carried on the wire as a single field.
pub fn is_valid_field(field: &str) -> bool {
    !field.contains(FIELD_SEPARATOR)
}

fn with_topic(topic: &str, rest: &[String]) -> Vec<String> {
    let mut fields = Vec::with_capacity(rest.len() + 1);
    fields.push(topic.to_string());
    fields.extend_from_slice(rest);
    fields
}

/// Strict inverse of formatting with [`TIMESTAMP_FORMAT`]: exactly
/// [`TIMESTAMP_WIDTH`] ASCII digits forming a valid date and time.
pub fn parse_timestamp(token: &str) -> Result<NaiveDateTime, MalformedMessage> {
    let invalid = || MalformedMessage::InvalidTimestamp(token.to_string());

    if token.len() != TIMESTAMP_WIDTH || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let digits = |range: std::ops::Range<usize>| -> u32 {
        token[range]
            .bytes()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let year = digits(0..4) as i32;
    NaiveDate::from_ymd_opt(year, digits(4..6), digits(6..8))
        .and_then(|date| {
            date.and_hms_micro_opt(digits(8..10), digits(10..12), digits(12..14), digits(14..20))
        })
        .ok_or_else(invalid)
}
