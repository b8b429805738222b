use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::routing::AuthRoutingKey;

/// Errors building or (de)serializing a [`DomainEvent`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The payload was not a JSON object.
    #[error("event payload must be a JSON object, got {0}")]
    InvalidPayload(String),

    /// The event could not be serialized to JSON.
    #[error("event serialization failed: {0}")]
    Serialization(String),

    /// Bytes did not decode into an event.
    #[error("event deserialization failed: {0}")]
    Deserialization(String),
}

/// A typed integration event.
///
/// Implementors are the payload structs of [`crate::auth`]; the trait pins
/// each payload to its `eventType` string and routing key so neither can drift
/// at call sites.
pub trait IntegrationEvent: Serialize + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable `eventType` value (e.g. `USER_REGISTERED`).
    const EVENT_TYPE: &'static str;

    /// Routing key the event is published under.
    const ROUTING_KEY: AuthRoutingKey;
}

/// Wire-level domain event.
///
/// Immutable once constructed. Serializes as
/// `{"eventType": .., "occurredOn": <ISO-8601>, "payload": {..}}`.
///
/// `occurredOn` is kept at millisecond precision so the JSON form and the
/// in-memory value compare equal after a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    event_type: String,
    #[serde(with = "crate::event::iso_millis")]
    occurred_on: DateTime<Utc>,
    payload: JsonValue,
}

impl DomainEvent {
    /// Build an event from an untyped payload.
    ///
    /// The payload must be a JSON object (a mapping of fields).
    pub fn new(
        event_type: impl Into<String>,
        occurred_on: DateTime<Utc>,
        payload: JsonValue,
    ) -> Result<Self, EventError> {
        if !payload.is_object() {
            return Err(EventError::InvalidPayload(json_kind(&payload).to_string()));
        }

        Ok(Self {
            event_type: event_type.into(),
            occurred_on: occurred_on.trunc_subsecs(3),
            payload,
        })
    }

    /// Build an event from a typed payload.
    ///
    /// Serialization happens here, at the boundary, so a payload that cannot
    /// be represented as JSON is rejected before any publish is attempted.
    pub fn from_typed<E: IntegrationEvent>(
        event: &E,
        occurred_on: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        let payload =
            serde_json::to_value(event).map_err(|e| EventError::Serialization(e.to_string()))?;
        Self::new(E::EVENT_TYPE, occurred_on, payload)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Canonical JSON encoding used as the message body.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::Serialization(e.to_string()))
    }

    /// Decode a message body produced by [`DomainEvent::to_json_bytes`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let event: DomainEvent = serde_json::from_slice(bytes)
            .map_err(|e| EventError::Deserialization(e.to_string()))?;
        if !event.payload.is_object() {
            return Err(EventError::InvalidPayload(json_kind(&event.payload).to_string()));
        }
        Ok(event)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
pub(crate) mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
