//! Route handler functions for all API endpoints.

use std::path::Path as FsPath;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use quorum_call::{CallEvent, CallSummary, EventOutcome, JoinOutcome, LeaveOutcome, RegistryStatus, WebhookAck};
use quorum_core::{AnswerResult, Capabilities, CollectionInfo, SourceSummary};
use quorum_rag::AskRequest;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_TEXT_SOURCE: &str = "manual_input";

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
    pub conversation_id: Option<String>,
    pub selected_sources: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct TextUploadBody {
    pub text: String,
    pub source: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearMemoryBody {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub meeting_url: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveBody {
    pub call_connection_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub since: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub vector_store: CollectionInfo,
    pub capabilities: Capabilities,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSourceResponse {
    pub message: String,
    pub deleted_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct CallEventsResponse {
    pub call_connection_id: String,
    pub since: usize,
    pub events: Vec<CallEvent>,
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET / - welcome message.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("Welcome to {}", state.config.general.app_name),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

/// GET /health - collection status and capabilities.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        vector_store: state.orchestrator.collection_info().await,
        capabilities: (*state.capabilities).clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Question answering
// =============================================================================

/// POST /ask - answer a question, optionally scoped to a conversation.
pub async fn ask(
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<Json<AnswerResult>, ApiError> {
    if body.question.trim().is_empty() {
        return Err(ApiError::BadRequest("'question' must not be empty".to_string()));
    }

    let mut request = AskRequest::new(body.question);
    if let Some(conversation_id) = body.conversation_id.filter(|c| !c.is_empty()) {
        request = request.in_conversation(conversation_id);
    }
    if let Some(sources) = body.selected_sources {
        request = request.with_sources(sources);
    }

    Ok(Json(state.orchestrator.ask(&request).await))
}

/// POST /clear-memory - drop history for one conversation, or all.
pub async fn clear_memory(
    State(state): State<AppState>,
    body: Option<Json<ClearMemoryBody>>,
) -> Json<MessageResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let conversation_id = body.conversation_id.filter(|c| !c.is_empty());
    state.orchestrator.clear_memory(conversation_id.as_deref());
    let message = match conversation_id {
        Some(c) => format!("Conversation memory cleared for '{}'", c),
        None => "Conversation memory cleared".to_string(),
    };
    Json(MessageResponse { message })
}

// =============================================================================
// Knowledge base
// =============================================================================

/// POST /upload/document - multipart `file` plus optional `conversation_id`.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut conversation_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::upload(format!("Invalid multipart body: {}", e), None))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::upload(format!("Failed to read upload: {}", e), Some(name.clone())))?;
                file = Some((name, data));
            }
            "conversation_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::upload(format!("Invalid conversation_id: {}", e), None))?;
                conversation_id = Some(value).filter(|c| !c.trim().is_empty());
            }
            _ => {}
        }
    }

    let (raw_name, data) = file.ok_or_else(|| ApiError::upload("No file provided", None))?;
    // Only the final path component is kept.
    let filename = FsPath::new(&raw_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::upload("Upload has no file name", None))?;

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::upload(format!("Failed to prepare upload dir: {}", e), Some(filename.clone())))?;
    let path = state.upload_dir.join(&filename);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::upload(format!("Failed to save upload: {}", e), Some(filename.clone())))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Saved upload");

    match state
        .orchestrator
        .add_documents(&path, conversation_id.as_deref())
        .await
    {
        Ok(report) => Ok(Json(UploadResponse {
            success: true,
            message: "Document uploaded and processed successfully".to_string(),
            filename: Some(filename),
            chunks: report.chunks,
        })),
        Err(e) => {
            tracing::warn!(file = %filename, error = %e, "Document upload failed");
            Err(ApiError::upload(e.to_string(), Some(filename)))
        }
    }
}

/// POST /upload/text - raw text under a source label.
pub async fn upload_text(
    State(state): State<AppState>,
    Json(body): Json<TextUploadBody>,
) -> Result<Json<UploadResponse>, ApiError> {
    let source = body
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEXT_SOURCE.to_string());
    let conversation_id = body.conversation_id.filter(|c| !c.is_empty());

    match state
        .orchestrator
        .add_text(&body.text, &source, conversation_id.as_deref())
        .await
    {
        Ok(report) => Ok(Json(UploadResponse {
            success: true,
            message: "Text uploaded and processed successfully".to_string(),
            filename: None,
            chunks: report.chunks,
        })),
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Text upload failed");
            Err(ApiError::upload(e.to_string(), None))
        }
    }
}

/// GET /collection/info - vector collection status; never an error status.
pub async fn collection_info(State(state): State<AppState>) -> Json<CollectionInfo> {
    Json(state.orchestrator.collection_info().await)
}

/// GET /sources/{conversation_id}
pub async fn list_sources(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state.orchestrator.list_sources(&conversation_id).await?;
    Ok(Json(SourcesResponse { sources }))
}

/// DELETE /sources/{conversation_id}/{*source}
pub async fn delete_source(
    State(state): State<AppState>,
    Path((conversation_id, source)): Path<(String, String)>,
) -> Result<Json<DeleteSourceResponse>, ApiError> {
    let deleted = state
        .orchestrator
        .delete_source(&conversation_id, &source)
        .await?;
    Ok(Json(DeleteSourceResponse {
        message: format!("Deleted {} chunks for '{}'", deleted, source),
        deleted_chunks: deleted,
    }))
}

// =============================================================================
// Calls
// =============================================================================

/// POST /teams/join
pub async fn teams_join(
    State(state): State<AppState>,
    Json(body): Json<JoinBody>,
) -> Result<Json<JoinOutcome>, ApiError> {
    if body.meeting_url.trim().is_empty() {
        return Err(ApiError::BadRequest("'meeting_url' must not be empty".to_string()));
    }
    Ok(Json(state.calls.join_meeting(&body.meeting_url).await))
}

/// POST /teams/leave
pub async fn teams_leave(
    State(state): State<AppState>,
    Json(body): Json<LeaveBody>,
) -> Result<Json<LeaveOutcome>, ApiError> {
    if body.call_connection_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "'call_connection_id' must not be empty".to_string(),
        ));
    }
    Ok(Json(state.calls.leave_meeting(&body.call_connection_id).await))
}

/// POST /teams/callback - platform webhook; always answers 200.
pub async fn teams_callback(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => Json(state.calls.handle_webhook(&payload).await),
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not JSON");
            Json(WebhookAck {
                processed: 1,
                failed: 1,
                results: vec![EventOutcome {
                    event: None,
                    tracked: false,
                    answer_mode: None,
                    error: Some(format!("invalid JSON body: {}", e)),
                }],
            })
        }
    }
}

/// GET /teams/status
pub async fn teams_status(State(state): State<AppState>) -> Json<RegistryStatus> {
    Json(state.calls.get_status())
}

/// GET /teams/calls/{id}
pub async fn call_info(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallSummary>, ApiError> {
    state
        .calls
        .get_call_info(&call_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Call not found: {}", call_id)))
}

/// GET /teams/calls/{id}/events?since=N
pub async fn call_events(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Query(params): Query<EventsParams>,
) -> Json<CallEventsResponse> {
    let since = params.since.unwrap_or(0);
    let events = state.calls.get_call_events(&call_id, since);
    Json(CallEventsResponse {
        call_connection_id: call_id,
        since,
        events,
    })
}
