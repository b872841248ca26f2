use serde::{Deserialize, Serialize};

use crate::config::{QuorumConfig, RetrievalBackend};

/// Whether one collaborator is usable, and why not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CapabilityStatus {
    pub fn ready() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }

    /// The reason text, or a generic one when available.
    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("unavailable")
    }
}

/// Fixed capability descriptor, evaluated once from configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub generation: CapabilityStatus,
    pub retrieval: CapabilityStatus,
    pub call_control: CapabilityStatus,
    /// Speech recognition and playback are performed by the call platform,
    /// so they follow call control.
    pub speech: CapabilityStatus,
}

impl Capabilities {
    pub fn evaluate(config: &QuorumConfig) -> Self {
        let generation = if config.generation.api_key.trim().is_empty() {
            CapabilityStatus::missing("GOOGLE_API_KEY is not set")
        } else {
            CapabilityStatus::ready()
        };

        let retrieval = match config.retrieval.backend {
            RetrievalBackend::Memory => CapabilityStatus::ready(),
            RetrievalBackend::Qdrant if config.retrieval.qdrant_url.trim().is_empty() => {
                CapabilityStatus::missing("retrieval.qdrant_url is not set")
            }
            RetrievalBackend::Qdrant if config.generation.api_key.trim().is_empty() => {
                CapabilityStatus::missing("Qdrant embeddings need GOOGLE_API_KEY")
            }
            RetrievalBackend::Qdrant => CapabilityStatus::ready(),
        };

        let call_control = if config.call.acs_endpoint.trim().is_empty()
            || config.call.acs_access_token.trim().is_empty()
        {
            CapabilityStatus::missing("ACS_ENDPOINT and ACS_ACCESS_TOKEN must both be set")
        } else if config.call.callback_url.trim().is_empty() {
            CapabilityStatus::missing("BOT_CALLBACK_URL is not set")
        } else {
            CapabilityStatus::ready()
        };

        let speech = if call_control.available {
            CapabilityStatus::ready()
        } else {
            CapabilityStatus::missing("speech runs through call control, which is unavailable")
        };

        Self {
            generation,
            retrieval,
            call_control,
            speech,
        }
    }
}
