// ABOUTME: Wire messages exchanged with the pose-analysis backend over the WebSocket
// ABOUTME: Outbound control strings and frame payloads, inbound JSON analysis results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Backend wire protocol
//!
//! Outbound traffic is plain text: either a JPEG data URL or one of the control
//! strings (`mode_beginner`, `mode_pro`, `heartbeat`). Inbound traffic is a JSON
//! object whose fields are all optional; unknown fields are ignored.

use crate::capture::EncodedFrame;
use crate::constants::protocol;
use crate::errors::{AppError, AppResult};
use crate::models::{FeedbackEvent, Mode, RepCounters};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A message sent from the client to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Encoded camera frame
    Frame(EncodedFrame),
    /// Select an analysis mode
    Mode(Mode),
    /// Keep-alive
    Heartbeat,
}

impl ClientMessage {
    /// Whether this message may be dropped under backpressure
    #[must_use]
    pub const fn is_droppable(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    /// Text sent on the wire
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Frame(frame) => frame.into_data_url(),
            Self::Mode(mode) => mode.control_message().to_owned(),
            Self::Heartbeat => protocol::HEARTBEAT.to_owned(),
        }
    }
}

/// An analysis result pushed by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    /// Annotated frame as a data URL
    #[serde(default)]
    pub image: Option<String>,
    /// Feedback code for the latest rep
    #[serde(default, deserialize_with = "feedback_field")]
    pub feedback: Option<FeedbackEvent>,
    /// Authoritative correct-rep count
    #[serde(default)]
    pub squats_correct: Option<u32>,
    /// Authoritative incorrect-rep count
    #[serde(default)]
    pub squats_incorrect: Option<u32>,
    /// Mode acknowledgement
    #[serde(default)]
    pub mode_changed: Option<String>,
    /// Heartbeat acknowledgement
    #[serde(default)]
    pub status: Option<String>,
}

impl ServerMessage {
    /// Parse one inbound text payload
    ///
    /// # Errors
    ///
    /// Returns a `MalformedMessage` error when the payload is not a JSON object
    /// or a known field has the wrong type
    pub fn parse(raw: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::malformed_message(format!("invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(AppError::malformed_message(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| AppError::malformed_message(format!("unexpected field type: {e}")))
    }

    /// Counter snapshot carried by this message
    ///
    /// Present when either count is; the missing one is reported as zero.
    #[must_use]
    pub fn counters(&self) -> Option<RepCounters> {
        if self.squats_correct.is_none() && self.squats_incorrect.is_none() {
            return None;
        }
        Some(RepCounters::new(
            self.squats_correct.unwrap_or(0),
            self.squats_incorrect.unwrap_or(0),
        ))
    }

    /// Non-empty annotated image
    #[must_use]
    pub fn annotated_image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    /// Mode the backend reports as active
    #[must_use]
    pub fn acknowledged_mode(&self) -> Option<Mode> {
        self.mode_changed.as_deref().and_then(Mode::parse)
    }

    /// Whether this is only a heartbeat acknowledgement
    #[must_use]
    pub fn is_heartbeat_ack(&self) -> bool {
        self.status.is_some()
            && self.image.is_none()
            && self.feedback.is_none()
            && self.counters().is_none()
            && self.mode_changed.is_none()
    }
}

fn feedback_field<'de, D>(deserializer: D) -> Result<Option<FeedbackEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(code)) => FeedbackEvent::parse(&code),
        Some(Value::Number(number)) => Some(
            number
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map_or_else(
                    || FeedbackEvent::Unrecognized(number.to_string()),
                    FeedbackEvent::RepCount,
                ),
        ),
        Some(other) => Some(FeedbackEvent::Unrecognized(other.to_string())),
    })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
