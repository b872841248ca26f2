//! Registry of tracked calls, driven by platform webhooks.
//!
//! The session map sits behind one mutex. The lock is taken for each
//! read-modify-append step and released before any call to the platform
//! or the answerer, so slow answers never block other sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use quorum_core::{excerpt, AnswerMode, AnswerResult, Capabilities, CapabilityStatus, QuorumConfig};
use quorum_rag::{AskRequest, RagOrchestrator};

use crate::control::{CallAction, CallControl, NormalizedEvent};
use crate::error::CallError;
use crate::session::{CallEvent, CallSession, CallStatus, CallSummary};

/// Characters of speech or answer text quoted in event messages.
const QUOTE_CHARS: usize = 50;

/// Answers a recognized voice question.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str, history_key: &str) -> Result<AnswerResult, CallError>;
}

#[async_trait]
impl Answerer for RagOrchestrator {
    async fn answer(&self, question: &str, history_key: &str) -> Result<AnswerResult, CallError> {
        let request = AskRequest::new(question).with_history_key(history_key);
        Ok(self.ask(&request).await)
    }
}

#[derive(Debug, Clone)]
pub struct CallSettings {
    /// Base URL the platform reaches this service on.
    pub callback_url: String,
    pub bot_label: String,
    pub participant_label: String,
    pub max_events: usize,
    pub speak_answers: bool,
    pub speech_status: CapabilityStatus,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            callback_url: String::new(),
            bot_label: "RAG Bot".to_string(),
            participant_label: "Participant".to_string(),
            max_events: 100,
            speak_answers: false,
            speech_status: CapabilityStatus::missing("speech not configured"),
        }
    }
}

impl CallSettings {
    pub fn from_config(config: &QuorumConfig) -> Self {
        let call = &config.call;
        Self {
            callback_url: call.callback_url.clone(),
            bot_label: call.bot_label.clone(),
            participant_label: call.participant_label.clone(),
            max_events: call.max_events,
            speak_answers: call.speak_answers,
            speech_status: Capabilities::evaluate(config).speech,
        }
    }

    /// Webhook address handed to the platform on join.
    pub fn webhook_url(&self) -> String {
        format!("{}/teams/callback", self.callback_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JoinOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            call_connection_id: None,
            meeting_url: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveOutcome {
    pub success: bool,
    pub call_connection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying one webhook event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventOutcome {
    #[serde(flatten)]
    pub event: Option<NormalizedEvent>,
    /// Whether the event addressed a tracked session.
    pub tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_mode: Option<AnswerMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventOutcome {
    fn applied(event: NormalizedEvent, tracked: bool) -> Self {
        Self {
            event: Some(event),
            tracked,
            answer_mode: None,
            error: None,
        }
    }

    fn rejected(err: &CallError) -> Self {
        Self {
            event: None,
            tracked: false,
            answer_mode: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookAck {
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<EventOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub bot_status: CapabilityStatus,
    pub speech_status: CapabilityStatus,
    pub active_calls: Vec<CallSummary>,
    pub total_active_calls: usize,
}

pub struct CallRegistry {
    sessions: Mutex<HashMap<String, CallSession>>,
    control: Arc<dyn CallControl>,
    answerer: Arc<dyn Answerer>,
    settings: CallSettings,
}

impl CallRegistry {
    pub fn new(
        control: Arc<dyn CallControl>,
        answerer: Arc<dyn Answerer>,
        settings: CallSettings,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            control,
            answerer,
            settings,
        }
    }

    pub fn settings(&self) -> &CallSettings {
        &self.settings
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, CallSession>> {
        self.sessions.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Run `f` against a tracked session under the lock.
    fn with_session<R>(&self, call_id: &str, f: impl FnOnce(&mut CallSession) -> R) -> Option<R> {
        self.sessions().get_mut(call_id).map(f)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Join / leave
    // =========================================================================

    pub async fn join_meeting(&self, target: &str) -> JoinOutcome {
        let target = target.trim();
        if target.is_empty() {
            return JoinOutcome::failed("Failed to join meeting: meeting url is empty");
        }

        match self.control.join(target, &self.settings.webhook_url()).await {
            Ok(call_id) => {
                let mut session = CallSession::new(&call_id, target, self.settings.max_events);
                session.record("join_requested", format!("Joining meeting: {}", target));
                self.sessions().insert(call_id.clone(), session);
                info!(call_id = %call_id, meeting_url = %target, "Call session created");
                JoinOutcome {
                    success: true,
                    call_connection_id: Some(call_id),
                    meeting_url: Some(target.to_string()),
                    error: None,
                }
            }
            Err(e) => {
                error!(meeting_url = %target, error = %e, "Failed to join meeting");
                JoinOutcome::failed(format!("Failed to join meeting: {}", e))
            }
        }
    }

    /// Hang up and mark the session disconnected.
    ///
    /// A tracked session that is already disconnected is left alone and the
    /// platform is not contacted.
    pub async fn leave_meeting(&self, call_id: &str) -> LeaveOutcome {
        if self.with_session(call_id, |s| s.status) == Some(CallStatus::Disconnected) {
            debug!(call_id = %call_id, "Leave requested for disconnected call");
            return LeaveOutcome {
                success: true,
                call_connection_id: call_id.to_string(),
                error: None,
            };
        }

        let hangup = self.control.hangup(call_id).await;

        let tracked = self.with_session(call_id, |session| {
            if session.transition(CallStatus::Disconnected) {
                session.record("leave_requested", "Bot leaving meeting");
            }
        });
        if tracked.is_none() {
            warn!(call_id = %call_id, "Leave requested for untracked call");
        }

        match hangup {
            Ok(()) => LeaveOutcome {
                success: true,
                call_connection_id: call_id.to_string(),
                error: None,
            },
            Err(e) => {
                error!(call_id = %call_id, error = %e, "Hangup failed");
                LeaveOutcome {
                    success: false,
                    call_connection_id: call_id.to_string(),
                    error: Some(format!("Failed to leave meeting: {}", e)),
                }
            }
        }
    }

    // =========================================================================
    // Webhook events
    // =========================================================================

    /// Apply every event in a webhook delivery, in order.
    ///
    /// `payload` is a single event object or an array of them. A bad event
    /// yields an error record and processing continues with the next one.
    pub async fn handle_webhook(&self, payload: &Value) -> WebhookAck {
        let events: Vec<&Value> = match payload {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut results = Vec::with_capacity(events.len());
        for raw in events {
            results.push(self.handle_call_event(raw).await);
        }
        let failed = results.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            warn!(processed = results.len(), failed, "Webhook delivery had failed events");
        }
        WebhookAck {
            processed: results.len(),
            failed,
            results,
        }
    }

    /// Apply one raw platform event. Never fails; problems land in the outcome.
    pub async fn handle_call_event(&self, raw: &Value) -> EventOutcome {
        let event = match self.control.normalize(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Rejected call event");
                return EventOutcome::rejected(&e);
            }
        };

        if let CallAction::SpeechRecognized { speech_text } = &event.action {
            if !speech_text.trim().is_empty() {
                let text = speech_text.clone();
                return self.handle_speech(event, &text).await;
            }
        }
        self.apply(event)
    }

    fn apply(&self, event: NormalizedEvent) -> EventOutcome {
        let call_id = event.call_connection_id.clone();
        let action = event.action.clone();
        let tracked = self.with_session(&call_id, |session| match action {
            CallAction::Connected => {
                session.transition(CallStatus::Connected);
                session.record("connected", "Bot connected to meeting");
            }
            CallAction::Disconnected => {
                if session.status != CallStatus::Disconnected {
                    session.transition(CallStatus::Disconnected);
                    session.record("disconnected", "Bot disconnected from meeting");
                }
            }
            CallAction::ParticipantsUpdated { participant_count } => {
                session.participant_count = participant_count;
                session.record("participants", format!("Participants updated: {}", participant_count));
            }
            CallAction::SpeechFailed { message } => {
                session.record("error", format!("Speech recognition failed: {}", message));
            }
            CallAction::PlayCompleted => {
                session.record("play_completed", "Finished speaking answer");
            }
            CallAction::CallFailed { message } => {
                session.transition(CallStatus::Error);
                session.record("error", format!("Call failed: {}", message));
            }
            CallAction::SpeechRecognized { .. } => {
                debug!(call_id = %session.id(), "Ignoring empty speech result");
            }
            CallAction::None => {}
        });

        match tracked {
            Some(()) => {
                debug!(call_id = %call_id, event_type = %event.event_type, "Applied call event");
                EventOutcome::applied(event, true)
            }
            None => {
                warn!(call_id = %call_id, event_type = %event.event_type, "Event for unknown call");
                EventOutcome::applied(event, false)
            }
        }
    }

    async fn handle_speech(&self, event: NormalizedEvent, text: &str) -> EventOutcome {
        let call_id = event.call_connection_id.clone();
        let participant = self.settings.participant_label.clone();
        let tracked = self.with_session(&call_id, |session| {
            session.add_transcript(&participant, text, false);
            session.record("speech", format!("Heard: {}", excerpt(text, QUOTE_CHARS)));
            session.record(
                "processing",
                format!("Processing question: {}", excerpt(text, QUOTE_CHARS)),
            );
        });
        if tracked.is_none() {
            warn!(call_id = %call_id, "Speech for unknown call");
            return EventOutcome::applied(event, false);
        }

        info!(call_id = %call_id, "Answering voice question");
        let mut outcome = EventOutcome::applied(event, true);
        let result = match self.answerer.answer(text, &call_id).await {
            Ok(result) => result,
            Err(e) => {
                error!(call_id = %call_id, error = %e, "Voice query failed");
                self.with_session(&call_id, |s| s.record("error", e.to_string()));
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        let bot = self.settings.bot_label.clone();
        self.with_session(&call_id, |session| {
            session.add_transcript(&bot, &result.answer, true);
            session.record_with(
                "answered",
                format!("Answered ({}): {}", result.mode, excerpt(&result.answer, QUOTE_CHARS)),
                Some(json!({
                    "mode": result.mode,
                    "source_count": result.sources.len(),
                })),
            );
        });
        outcome.answer_mode = Some(result.mode);

        if self.settings.speak_answers {
            if let Err(e) = self.control.play_text(&call_id, &result.answer).await {
                warn!(call_id = %call_id, error = %e, "Failed to speak answer");
                self.with_session(&call_id, |s| {
                    s.record("error", format!("Failed to speak answer: {}", e))
                });
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn get_call_info(&self, call_id: &str) -> Option<CallSummary> {
        self.sessions().get(call_id).map(CallSession::summary)
    }

    /// Events from index `since` onward; empty for unknown calls.
    pub fn get_call_events(&self, call_id: &str, since: usize) -> Vec<CallEvent> {
        self.sessions()
            .get(call_id)
            .map(|s| s.events_since(since))
            .unwrap_or_default()
    }

    pub fn get_status(&self) -> RegistryStatus {
        let mut active_calls: Vec<CallSummary> =
            self.sessions().values().map(CallSession::summary).collect();
        active_calls.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        RegistryStatus {
            bot_status: self.control.status(),
            speech_status: self.settings.speech_status.clone(),
            total_active_calls: active_calls.len(),
            active_calls,
        }
    }
}
