//! Call session state and its bounded logs.
//!
//! Status transitions:
//! - any -> Connected (platform reports the call connected)
//! - any -> Disconnected (platform hangup or leave request)
//! - Connecting/Connected -> Error (platform reports the call failed)

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quorum_core::BoundedLog;

/// Events shown in a call summary.
pub const SUMMARY_EVENTS: usize = 10;
/// Transcript entries shown in a call summary.
pub const SUMMARY_TRANSCRIPT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Connecting => write!(f, "connecting"),
            CallStatus::Connected => write!(f, "connected"),
            CallStatus::Disconnected => write!(f, "disconnected"),
            CallStatus::Error => write!(f, "error"),
        }
    }
}

impl CallStatus {
    pub fn can_transition_to(&self, target: &CallStatus) -> bool {
        matches!(
            (self, target),
            (_, CallStatus::Connected)
                | (_, CallStatus::Disconnected)
                | (CallStatus::Connecting, CallStatus::Error)
                | (CallStatus::Connected, CallStatus::Error)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub speaker: String,
    pub text: String,
    pub is_bot: bool,
}

/// One tracked call.
#[derive(Debug, Clone)]
pub struct CallSession {
    id: String,
    target: String,
    pub status: CallStatus,
    pub joined_at: DateTime<Utc>,
    pub participant_count: usize,
    events: BoundedLog<CallEvent>,
    transcript: Vec<TranscriptEntry>,
}

impl CallSession {
    /// A freshly joined session in `Connecting`.
    pub fn new(id: impl Into<String>, target: impl Into<String>, max_events: usize) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            status: CallStatus::Connecting,
            joined_at: Utc::now(),
            participant_count: 0,
            events: BoundedLog::new(max_events),
            transcript: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Move to `target` if the transition is allowed. Returns whether it moved.
    pub fn transition(&mut self, target: CallStatus) -> bool {
        if self.status.can_transition_to(&target) {
            self.status = target;
            true
        } else {
            false
        }
    }

    pub fn record(&mut self, event_type: &str, message: impl Into<String>) {
        self.record_with(event_type, message, None);
    }

    pub fn record_with(
        &mut self,
        event_type: &str,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        self.events.push(CallEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            message: message.into(),
            data,
        });
    }

    pub fn add_transcript(&mut self, speaker: &str, text: &str, is_bot: bool) {
        self.transcript.push(TranscriptEntry {
            timestamp: Utc::now(),
            speaker: speaker.to_string(),
            text: text.to_string(),
            is_bot,
        });
    }

    pub fn events(&self) -> &BoundedLog<CallEvent> {
        &self.events
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Retained events from index `since` onward. Empty when out of range.
    pub fn events_since(&self, since: usize) -> Vec<CallEvent> {
        self.events.since(since).cloned().collect()
    }

    pub fn summary(&self) -> CallSummary {
        let skip = self.transcript.len().saturating_sub(SUMMARY_TRANSCRIPT);
        CallSummary {
            call_connection_id: self.id.clone(),
            meeting_url: self.target.clone(),
            status: self.status,
            joined_at: self.joined_at,
            participant_count: self.participant_count,
            event_count: self.events.len(),
            recent_events: self
                .events
                .last_n(SUMMARY_EVENTS)
                .map(|e| EventDigest {
                    timestamp: e.timestamp,
                    event_type: e.event_type.clone(),
                    message: e.message.clone(),
                })
                .collect(),
            transcript: self.transcript[skip..].to_vec(),
        }
    }
}

/// An event without its structured data, as shown in summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDigest {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
}

/// External projection of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_connection_id: String,
    pub meeting_url: String,
    pub status: CallStatus,
    pub joined_at: DateTime<Utc>,
    pub participant_count: usize,
    pub event_count: usize,
    pub recent_events: Vec<EventDigest>,
    pub transcript: Vec<TranscriptEntry>,
}
