//! Call-control seam and platform event normalization.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use quorum_core::CapabilityStatus;

use crate::error::CallError;

const EVENT_PREFIX: &str = "Microsoft.Communication.";

/// What a platform event means for a tracked session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CallAction {
    #[serde(rename = "call_connected")]
    Connected,
    #[serde(rename = "call_disconnected")]
    Disconnected,
    ParticipantsUpdated { participant_count: usize },
    SpeechRecognized { speech_text: String },
    SpeechFailed { message: String },
    PlayCompleted,
    CallFailed { message: String },
    None,
}

impl CallAction {
    pub fn name(&self) -> &'static str {
        match self {
            CallAction::Connected => "call_connected",
            CallAction::Disconnected => "call_disconnected",
            CallAction::ParticipantsUpdated { .. } => "participants_updated",
            CallAction::SpeechRecognized { .. } => "speech_recognized",
            CallAction::SpeechFailed { .. } => "speech_failed",
            CallAction::PlayCompleted => "play_completed",
            CallAction::CallFailed { .. } => "call_failed",
            CallAction::None => "none",
        }
    }
}

/// A platform payload reduced to `{event_type, call_connection_id, action}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    pub event_type: String,
    pub call_connection_id: String,
    #[serde(flatten)]
    pub action: CallAction,
}

/// Outbound call control plus inbound event normalization.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Join the meeting at `target`, asking the platform to post events to `callback`.
    async fn join(&self, target: &str, callback: &str) -> Result<String, CallError>;

    async fn hangup(&self, call_id: &str) -> Result<(), CallError>;

    /// Speak `text` into the call.
    async fn play_text(&self, call_id: &str, text: &str) -> Result<(), CallError>;

    fn status(&self) -> CapabilityStatus;

    fn normalize(&self, raw: &Value) -> Result<NormalizedEvent, CallError> {
        normalize_acs_event(raw)
    }
}

/// Normalize an ACS Call Automation event, flat or CloudEvents-wrapped.
pub fn normalize_acs_event(raw: &Value) -> Result<NormalizedEvent, CallError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CallError::MalformedEvent("event is not an object".into()))?;
    let event_type = obj
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CallError::MalformedEvent("missing event type".into()))?;
    let short_type = event_type.strip_prefix(EVENT_PREFIX).unwrap_or(event_type);

    let data = obj.get("data").filter(|d| d.is_object()).unwrap_or(raw);
    let call_id = data
        .get("callConnectionId")
        .or_else(|| obj.get("callConnectionId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CallError::MalformedEvent(format!("{} has no callConnectionId", short_type)))?;

    let action = match short_type {
        "CallConnected" => CallAction::Connected,
        "CallDisconnected" => CallAction::Disconnected,
        "ParticipantsUpdated" => CallAction::ParticipantsUpdated {
            participant_count: data
                .get("participants")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        },
        "RecognizeCompleted" => {
            let speech = data
                .pointer("/recognitionResult/speech")
                .or_else(|| data.pointer("/speechResult/speech"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            CallAction::SpeechRecognized {
                speech_text: speech.to_string(),
            }
        }
        "RecognizeFailed" => CallAction::SpeechFailed {
            message: result_message(data),
        },
        "PlayCompleted" => CallAction::PlayCompleted,
        "CreateCallFailed" | "ConnectFailed" => CallAction::CallFailed {
            message: result_message(data),
        },
        _ => CallAction::None,
    };

    Ok(NormalizedEvent {
        event_type: short_type.to_string(),
        call_connection_id: call_id.to_string(),
        action,
    })
}

fn result_message(data: &Value) -> String {
    data.pointer("/resultInformation/message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string()
}

/// Stand-in used when the call platform has no credentials.
pub struct UnconfiguredCallControl {
    reason: String,
}

impl UnconfiguredCallControl {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail(&self) -> CallError {
        CallError::NotConfigured(self.reason.clone())
    }
}

#[async_trait]
impl CallControl for UnconfiguredCallControl {
    async fn join(&self, _target: &str, _callback: &str) -> Result<String, CallError> {
        Err(self.fail())
    }

    async fn hangup(&self, _call_id: &str) -> Result<(), CallError> {
        Err(self.fail())
    }

    async fn play_text(&self, _call_id: &str, _text: &str) -> Result<(), CallError> {
        Err(self.fail())
    }

    fn status(&self) -> CapabilityStatus {
        CapabilityStatus::missing(self.reason.clone())
    }
}
