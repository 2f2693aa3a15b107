use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::game::UserState;

/// Actions a client can request over its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    /// A click worth `value` points
    Increment { value: i64 },
    /// Change the per-tick counter growth
    SetIncrement { new_increment_value: i64 },
}

/// Why an inbound frame produced no action. Never reported to the client.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("missing action")]
    MissingAction,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("field {field} is not an integer")]
    InvalidNumber { field: &'static str },

    #[error("click value must not be negative: {0}")]
    NegativeClick(i64),
}

/// Coerce a JSON value to an integer: integers as-is, floats truncated,
/// decimal strings parsed.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// An absent field defaults to 1; an explicit `null` is not a number.
fn int_field(object: &Map<String, Value>, field: &'static str) -> Result<i64, DecodeError> {
    match object.get(field) {
        None => Ok(1),
        Some(v) => coerce_int(v).ok_or(DecodeError::InvalidNumber { field }),
    }
}

impl ClientAction {
    /// Decode one text frame. Missing `value`/`new_increment_value` default to 1.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(object) = value else {
            return Err(DecodeError::NotAnObject);
        };

        match object.get("action") {
            Some(Value::String(action)) if action == "increment" => {
                let value = int_field(&object, "value")?;
                if value < 0 {
                    return Err(DecodeError::NegativeClick(value));
                }
                Ok(ClientAction::Increment { value })
            }
            Some(Value::String(action)) if action == "set_increment" => {
                Ok(ClientAction::SetIncrement {
                    new_increment_value: int_field(&object, "new_increment_value")?,
                })
            }
            Some(Value::String(action)) => Err(DecodeError::UnknownAction(action.clone())),
            Some(Value::Null) | None => Err(DecodeError::MissingAction),
            Some(other) => Err(DecodeError::UnknownAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientAction::Increment { .. } => "increment",
            ClientAction::SetIncrement { .. } => "set_increment",
        }
    }
}

/// Messages sent from server to client. Plain objects without a type tag;
/// the field set identifies the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Sent once when the connection becomes active
    Snapshot {
        counter: i64,
        energy: i64,
        increment_value: i64,
        user_id: String,
    },
    /// Broadcast to every connection of the user each tick
    TickUpdate {
        counter: i64,
        energy: i64,
        increment_value: i64,
    },
    /// Reply to a click, originating connection only
    ClickResult { counter: i64, energy: i64 },
    IncrementSet { increment_value: i64 },
}

impl ServerMessage {
    pub fn snapshot(user_id: impl Into<String>, state: &UserState) -> Self {
        Self::Snapshot {
            counter: state.counter,
            energy: state.energy,
            increment_value: state.increment,
            user_id: user_id.into(),
        }
    }

    pub fn tick(state: &UserState) -> Self {
        Self::TickUpdate {
            counter: state.counter,
            energy: state.energy,
            increment_value: state.increment,
        }
    }

    pub fn click(state: &UserState) -> Self {
        Self::ClickResult {
            counter: state.counter,
            energy: state.energy,
        }
    }

    pub fn increment_set(increment_value: i64) -> Self {
        Self::IncrementSet { increment_value }
    }
}

/// What travels through a connection's outbound channel
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Raw(ServerMessage),
    /// Serialized once and shared by every recipient of a broadcast
    Preserialized(Arc<str>),
}

impl OutboundMessage {
    pub fn preserialize(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        Ok(Self::Preserialized(serde_json::to_string(message)?.into()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            OutboundMessage::Raw(message) => serde_json::to_string(message),
            OutboundMessage::Preserialized(text) => Ok(text.to_string()),
        }
    }
}
