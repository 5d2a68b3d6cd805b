/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Client-facing projection of store events.
//!
//! The store itself is format-agnostic; a gateway that exposes it over the network serializes
//! events as JSON objects with the fields defined here. Actions collapse to the client
//! vocabulary: both creations and updates surface as `set`, compare-and-swaps as `testAndSet`.
//! Expirations are rendered as ISO-8601 instants, and `newKey` marks events that brought a path
//! into existence.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::events::{Event, EventKind};
use crate::types::basic::Timestamp;

/// The `action` string a given event kind serializes as.
pub const fn action_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Get => "get",
        EventKind::Create | EventKind::Update => "set",
        EventKind::CompareAndSwap => "testAndSet",
        EventKind::Delete => "delete",
        EventKind::Expire => "expire",
    }
}

/// A store [`Event`] in the shape the client gateway serializes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub action: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_value: Option<String>,
    pub dir: bool,
    /// ISO-8601 rendering of the node's expiration, when it carries a TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    /// Remaining whole seconds until expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    pub index: u64,
    pub term: u64,
    /// Whether this event brought the path into existence.
    pub new_key: bool,
}

impl WireEvent {
    pub fn from_event(event: &Event) -> WireEvent {
        WireEvent {
            action: action_name(event.kind).to_string(),
            key: event.path.clone(),
            value: event.value.clone(),
            prev_value: event.prev_value.clone(),
            dir: event.dir,
            expiration: event.expiration.map(format_expiration),
            ttl: event.ttl,
            index: event.index.int(),
            term: event.term.int(),
            new_key: matches!(event.kind, EventKind::Create),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn format_expiration(instant: Timestamp) -> String {
    match OffsetDateTime::from_unix_timestamp_nanos(instant.millis() as i128 * 1_000_000) {
        Ok(datetime) => datetime
            .format(&Rfc3339)
            .unwrap_or_else(|_| instant.millis().to_string()),
        Err(_) => instant.millis().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::basic::{LogIndex, Term};

    #[test]
    fn actions_collapse_to_client_vocabulary() {
        assert_eq!(action_name(EventKind::Get), "get");
        assert_eq!(action_name(EventKind::Create), "set");
        assert_eq!(action_name(EventKind::Update), "set");
        assert_eq!(action_name(EventKind::CompareAndSwap), "testAndSet");
        assert_eq!(action_name(EventKind::Delete), "delete");
        assert_eq!(action_name(EventKind::Expire), "expire");
    }

    #[test]
    fn serializes_with_client_field_names() {
        let mut event = Event::new(
            EventKind::CompareAndSwap,
            String::from("/k"),
            LogIndex::new(3),
            Term::new(1),
        );
        event.prev_value = Some(String::from("v1"));
        event.value = Some(String::from("v2"));

        let json = WireEvent::from_event(&event).to_json().unwrap();
        assert!(json.contains("\"action\":\"testAndSet\""));
        assert!(json.contains("\"key\":\"/k\""));
        assert!(json.contains("\"prevValue\":\"v1\""));
        assert!(json.contains("\"value\":\"v2\""));
        assert!(json.contains("\"index\":3"));
        assert!(json.contains("\"newKey\":false"));
        // Unset TTL fields are omitted entirely.
        assert!(!json.contains("expiration"));
        assert!(!json.contains("ttl"));
    }

    #[test]
    fn renders_expiration_as_iso8601() {
        let mut event = Event::new(
            EventKind::Create,
            String::from("/tmp"),
            LogIndex::new(10),
            Term::new(1),
        );
        event.expiration = Some(Timestamp::new(1_700_000_000_000));
        event.ttl = Some(1);

        let wire = WireEvent::from_event(&event);
        assert_eq!(wire.expiration.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert!(wire.new_key);
    }
}
