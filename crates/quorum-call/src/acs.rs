//! Azure Communication Services Call Automation over REST.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use quorum_core::CapabilityStatus;

use crate::control::CallControl;
use crate::error::CallError;

const API_VERSION: &str = "2024-09-15";

pub struct AcsCallControl {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    voice: String,
}

impl AcsCallControl {
    pub fn new(endpoint: &str, access_token: &str) -> Result<Self, CallError> {
        if endpoint.trim().is_empty() {
            return Err(CallError::NotConfigured("ACS endpoint is empty".into()));
        }
        if access_token.trim().is_empty() {
            return Err(CallError::NotConfigured("ACS access token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            voice: "en-US-JennyNeural".to_string(),
        })
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, API_VERSION)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, CallError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Upstream(format!("{}: {}", status, body)));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| CallError::Upstream(format!("invalid response body: {}", e)))
    }
}

pub(crate) fn join_body(target: &str, callback: &str) -> Value {
    json!({
        "callbackUri": callback,
        "callLocator": {
            "kind": "teamsMeetingLinkLocator",
            "teamsMeetingLink": target,
        },
    })
}

pub(crate) fn play_body(text: &str, voice: &str) -> Value {
    json!({
        "playSources": [{
            "kind": "text",
            "text": {
                "text": text,
                "voiceName": voice,
            },
        }],
    })
}

#[async_trait]
impl CallControl for AcsCallControl {
    async fn join(&self, target: &str, callback: &str) -> Result<String, CallError> {
        info!(meeting_url = %target, "Joining meeting");
        let body = self
            .send(
                self.client
                    .post(self.url("/calling:connect"))
                    .json(&join_body(target, callback)),
            )
            .await?
            .unwrap_or(Value::Null);
        body.get("callConnectionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CallError::Upstream("connect response has no callConnectionId".into()))
    }

    async fn hangup(&self, call_id: &str) -> Result<(), CallError> {
        info!(call_id = %call_id, "Hanging up call");
        self.send(
            self.client
                .delete(self.url(&format!("/calling/callConnections/{}", call_id))),
        )
        .await?;
        Ok(())
    }

    async fn play_text(&self, call_id: &str, text: &str) -> Result<(), CallError> {
        debug!(call_id = %call_id, chars = text.chars().count(), "Playing answer");
        self.send(
            self.client
                .post(self.url(&format!("/calling/callConnections/{}:play", call_id)))
                .json(&play_body(text, &self.voice)),
        )
        .await?;
        Ok(())
    }

    fn status(&self) -> CapabilityStatus {
        CapabilityStatus::ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_credentials() {
        assert!(matches!(
            AcsCallControl::new("", "token"),
            Err(CallError::NotConfigured(_))
        ));
        assert!(matches!(
            AcsCallControl::new("https://acs.example", " "),
            Err(CallError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_url_has_api_version() {
        let acs = AcsCallControl::new("https://acs.example/", "token").unwrap();
        assert_eq!(
            acs.url("/calling:connect"),
            "https://acs.example/calling:connect?api-version=2024-09-15"
        );
        assert!(acs.status().available);
    }

    #[test]
    fn test_join_body_shape() {
        let body = join_body("https://meet.example/abc", "https://bot.example/teams/callback");
        assert_eq!(body["callbackUri"], "https://bot.example/teams/callback");
        assert_eq!(body["callLocator"]["kind"], "teamsMeetingLinkLocator");
        assert_eq!(body["callLocator"]["teamsMeetingLink"], "https://meet.example/abc");
    }

    #[test]
    fn test_play_body_shape() {
        let body = play_body("Support is open 9 to 5.", "en-US-JennyNeural");
        assert_eq!(body["playSources"][0]["kind"], "text");
        assert_eq!(body["playSources"][0]["text"]["text"], "Support is open 9 to 5.");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_error() {
        let acs = AcsCallControl::new("http://127.0.0.1:1", "token").unwrap();
        assert!(matches!(
            acs.join("https://meet.example/abc", "http://cb").await,
            Err(CallError::Upstream(_))
        ));
    }
}
