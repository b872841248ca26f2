//! Integration tests for the Quorum API.
//!
//! Each test builds its own in-memory state: mock embeddings, a scripted
//! generation backend and a fake call platform.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use quorum_api::create_router;
use quorum_api::state::AppState;
use quorum_call::{CallControl, CallError, CallRegistry, CallSettings};
use quorum_core::{CapabilityStatus, QuorumConfig};
use quorum_rag::{
    ConversationMemory, FileIngestor, GenerationError, GenerationGateway, PromptMessage,
    RagOrchestrator, RagSettings, RetryPolicy, TextChunker,
};
use quorum_vector::InMemoryStore;

// =============================================================================
// Helpers
// =============================================================================

/// Answers with the last user message, or fails when `fail` is set.
struct EchoGeneration {
    fail: bool,
}

#[async_trait]
impl GenerationGateway for EchoGeneration {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        if self.fail {
            return Err(GenerationError::Permanent("offline".into()));
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(format!("echo: {}", last))
    }
}

#[derive(Default)]
struct FakeControl {
    hangups: Mutex<Vec<String>>,
}

#[async_trait]
impl CallControl for FakeControl {
    async fn join(&self, _target: &str, _callback: &str) -> Result<String, CallError> {
        Ok("call-1".to_string())
    }

    async fn hangup(&self, call_id: &str) -> Result<(), CallError> {
        self.hangups.lock().unwrap().push(call_id.to_string());
        Ok(())
    }

    async fn play_text(&self, _call_id: &str, _text: &str) -> Result<(), CallError> {
        Ok(())
    }

    fn status(&self) -> CapabilityStatus {
        CapabilityStatus::ready()
    }
}

struct TestApp {
    state: AppState,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}

fn make_app_with(fail_generation: bool) -> TestApp {
    let config = QuorumConfig::default();
    let settings = RagSettings {
        retry: RetryPolicy::with_unit(3, 0),
        store_retry: RetryPolicy::with_unit(2, 0),
        batch_pause: std::time::Duration::ZERO,
        ..RagSettings::default()
    };
    let orchestrator = Arc::new(RagOrchestrator::new(
        Arc::new(InMemoryStore::with_mock_embeddings("test_docs")),
        Arc::new(EchoGeneration {
            fail: fail_generation,
        }),
        Arc::new(FileIngestor::new(TextChunker::default())),
        ConversationMemory::new(10),
        settings,
    ));
    let calls = Arc::new(CallRegistry::new(
        Arc::new(FakeControl::default()),
        orchestrator.clone(),
        CallSettings {
            callback_url: "https://bot.example".into(),
            ..CallSettings::default()
        },
    ));
    let uploads = tempfile::tempdir().unwrap();
    let state = AppState::new(config, orchestrator, calls).with_upload_dir(uploads.path());
    TestApp {
        state,
        _uploads: uploads,
    }
}

fn make_app() -> TestApp {
    make_app_with(false)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn multipart_upload(filename: &str, content: &str, conversation_id: Option<&str>) -> Request<Body> {
    let boundary = "quorum-test-boundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n",
        b = boundary,
        f = filename,
        c = content
    );
    if let Some(id) = conversation_id {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"conversation_id\"\r\n\r\n{id}\r\n",
            b = boundary,
            id = id
        ));
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    Request::post("/upload/document")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.router().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_root() {
    let app = make_app();
    let (status, json) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Welcome to Company RAG Agent");
    assert_eq!(json["status"], "running");
}

#[tokio::test]
async fn test_health_reports_store_and_capabilities() {
    let app = make_app();
    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["vector_store"]["name"], "test_docs");
    assert_eq!(json["capabilities"]["generation"]["available"], false);
    assert_eq!(json["capabilities"]["retrieval"]["available"], true);
}

// =============================================================================
// Ask
// =============================================================================

#[tokio::test]
async fn test_ask_empty_question_is_bad_request() {
    let app = make_app();
    let (status, json) = send(&app, post_json("/ask", &json!({"question": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_ask_without_documents_is_general() {
    let app = make_app();
    let (status, json) = send(&app, post_json("/ask", &json!({"question": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "general");
    assert_eq!(json["sources"].as_array().unwrap().len(), 0);
    assert!(json["answer"].as_str().unwrap().starts_with("echo: "));
}

#[tokio::test]
async fn test_ask_after_text_upload_uses_sources() {
    let app = make_app();
    let (status, json) = send(
        &app,
        post_json(
            "/upload/text",
            &json!({"text": "Support hours are 9am to 5pm.", "source": "support.md", "conversation_id": "conv-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["chunks"], 1);

    let (status, json) = send(
        &app,
        post_json(
            "/ask",
            &json!({"question": "what are the support hours", "conversation_id": "conv-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "rag");
    assert_eq!(json["sources"][0]["metadata"]["source"], "support.md");

    // other conversations do not see the upload
    let (_, json) = send(
        &app,
        post_json("/ask", &json!({"question": "support hours?", "conversation_id": "conv-2"})),
    )
    .await;
    assert_eq!(json["mode"], "general");
}

#[tokio::test]
async fn test_ask_generation_outage_still_answers_200() {
    let app = make_app_with(true);
    let (status, json) = send(&app, post_json("/ask", &json!({"question": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "general");
    assert_eq!(
        json["answer"],
        "I'm having trouble connecting to the AI service. Please try again in a moment."
    );
}

#[tokio::test]
async fn test_clear_memory_with_and_without_body() {
    let app = make_app();
    send(&app, post_json("/ask", &json!({"question": "hello", "conversation_id": "c"}))).await;
    assert!(!app.state.orchestrator.memory().is_empty(Some("c")));

    let (status, json) = send(&app, post_json("/clear-memory", &json!({"conversation_id": "c"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Conversation memory cleared for 'c'");
    assert!(app.state.orchestrator.memory().is_empty(Some("c")));

    let req = Request::post("/clear-memory").body(Body::empty()).unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Conversation memory cleared");
}

// =============================================================================
// Uploads and sources
// =============================================================================

#[tokio::test]
async fn test_upload_document_saves_and_ingests() {
    let app = make_app();
    let (status, json) = send(
        &app,
        multipart_upload("handbook.md", "# Handbook\n\nVacation is 25 days.", Some("conv-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["filename"], "handbook.md");
    assert_eq!(json["chunks"], 1);
    assert!(app.state.upload_dir.join("handbook.md").exists());

    let (status, json) = send(&app, get("/sources/conv-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sources"], json!([{"name": "handbook.md", "chunks": 1}]));
}

#[tokio::test]
async fn test_upload_unsupported_type_is_400() {
    let app = make_app();
    let (status, json) = send(&app, multipart_upload("tool.exe", "MZ", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Unsupported file type: .exe");
    assert_eq!(json["file"], "tool.exe");
}

#[tokio::test]
async fn test_upload_strips_directories_from_filename() {
    let app = make_app();
    let (status, json) = send(&app, multipart_upload("../../notes.txt", "some notes", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "notes.txt");
    assert!(app.state.upload_dir.join("notes.txt").exists());
}

#[tokio::test]
async fn test_upload_empty_text_is_400() {
    let app = make_app();
    let (status, json) = send(&app, post_json("/upload/text", &json!({"text": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json.get("file").is_none());
}

#[tokio::test]
async fn test_delete_source_with_slashes() {
    let app = make_app();
    send(
        &app,
        post_json(
            "/upload/text",
            &json!({"text": "Quarterly numbers.", "source": "reports/q3.txt", "conversation_id": "conv-1"}),
        ),
    )
    .await;

    let req = Request::delete("/sources/conv-1/reports/q3.txt")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted_chunks"], 1);
    assert_eq!(json["message"], "Deleted 1 chunks for 'reports/q3.txt'");

    let (_, json) = send(&app, get("/sources/conv-1")).await;
    assert_eq!(json["sources"], json!([]));
}

#[tokio::test]
async fn test_collection_info() {
    let app = make_app();
    let (status, json) = send(&app, get("/collection/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "test_docs");
    assert_eq!(json["points_count"], 0);
}

// =============================================================================
// Calls
// =============================================================================

#[tokio::test]
async fn test_join_then_connected_callback() {
    let app = make_app();
    let (status, json) = send(
        &app,
        post_json("/teams/join", &json!({"meeting_url": "https://meet.example/abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["call_connection_id"], "call-1");

    let (status, json) = send(&app, get("/teams/calls/call-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "connecting");

    let (status, json) = send(
        &app,
        post_json(
            "/teams/callback",
            &json!([{
                "type": "Microsoft.Communication.CallConnected",
                "data": {"callConnectionId": "call-1"}
            }]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["processed"], 1);

    let (_, json) = send(&app, get("/teams/calls/call-1")).await;
    assert_eq!(json["status"], "connected");
    assert_eq!(json["event_count"], 2);
}

#[tokio::test]
async fn test_voice_question_is_answered() {
    let app = make_app();
    send(&app, post_json("/teams/join", &json!({"meeting_url": "https://meet.example/abc"}))).await;
    let (status, json) = send(
        &app,
        post_json(
            "/teams/callback",
            &json!({
                "type": "Microsoft.Communication.RecognizeCompleted",
                "data": {
                    "callConnectionId": "call-1",
                    "speechResult": {"speech": "what are the support hours"}
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["answer_mode"], "general");

    let (_, json) = send(&app, get("/teams/calls/call-1")).await;
    let transcript = json["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1]["is_bot"], true);
    // voice history is keyed by call id
    assert!(!app.state.orchestrator.memory().is_empty(Some("call-1")));
}

#[tokio::test]
async fn test_callback_isolates_bad_events_and_bad_json() {
    let app = make_app();
    send(&app, post_json("/teams/join", &json!({"meeting_url": "https://meet.example/abc"}))).await;
    let (status, json) = send(
        &app,
        post_json(
            "/teams/callback",
            &json!([
                {"type": "CallConnected", "callConnectionId": "call-1"},
                {"callConnectionId": "call-1"},
                {"type": "ParticipantsUpdated", "callConnectionId": "call-1", "participants": [{}]}
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["processed"], 3);
    assert_eq!(json["failed"], 1);

    let req = Request::post("/teams/callback")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["processed"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_call_is_404() {
    let app = make_app();
    let (status, json) = send(&app, get("/teams/calls/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_call_events_since() {
    let app = make_app();
    send(&app, post_json("/teams/join", &json!({"meeting_url": "https://meet.example/abc"}))).await;
    let (_, json) = send(&app, get("/teams/calls/call-1/events?since=0")).await;
    assert_eq!(json["events"].as_array().unwrap().len(), 1);
    assert_eq!(json["events"][0]["type"], "join_requested");

    let (status, json) = send(&app, get("/teams/calls/call-1/events?since=1000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["events"], json!([]));
}

#[tokio::test]
async fn test_leave_and_status() {
    let app = make_app();
    send(&app, post_json("/teams/join", &json!({"meeting_url": "https://meet.example/abc"}))).await;
    let (status, json) = send(
        &app,
        post_json("/teams/leave", &json!({"call_connection_id": "call-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = send(&app, get("/teams/status")).await;
    assert_eq!(json["total_active_calls"], 1);
    assert_eq!(json["active_calls"][0]["status"], "disconnected");
    assert_eq!(json["bot_status"]["available"], true);
}

#[tokio::test]
async fn test_join_requires_meeting_url() {
    let app = make_app();
    let (status, _) = send(&app, post_json("/teams/join", &json!({"meeting_url": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
