use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};

use taxwise_core::{detect_image_mime_type, is_image, TaxwiseError, UploadedDocument};
use taxwise_session::{render_insights, Session, SessionSnapshot};

const INDEX_HTML: &str = include_str!("../static/index.html");
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state for API handlers.
pub struct AppState {
    pub session: Session,
    pub export_name: String,
    pub provider: String,
    pub model: String,
}

/// Structured error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Insights are still being generated")]
    Busy,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Unsupported document: {0}")]
    UnsupportedMedia(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TaxwiseError> for ApiError {
    fn from(err: TaxwiseError) -> Self {
        match err {
            TaxwiseError::InvalidJson(msg) => ApiError::InvalidJson(msg),
            TaxwiseError::InvalidDocument(msg) => ApiError::UnsupportedMedia(msg),
            TaxwiseError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "PROCESSING",
                "Insights are still being generated, try again when they finish".to_string(),
            ),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::InvalidJson(detail) => (StatusCode::BAD_REQUEST, "INVALID_JSON", detail.clone()),
            ApiError::UnsupportedMedia(detail) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/state", get(get_state))
        .route(
            "/api/document",
            post(upload_document).delete(clear_document),
        )
        .route("/api/record", put(save_record))
        .route("/api/user-info", put(set_user_info))
        .route("/api/export", get(export_record))
        .route("/api/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "taxwise",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider,
        "model": state.model,
    }))
}

fn state_body(snapshot: &SessionSnapshot) -> Value {
    json!({
        "snapshot": snapshot,
        "insights": render_insights(snapshot),
    })
}

/// Current snapshot plus the rendered insights panel.
async fn get_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.session.snapshot();
    let mut body = state_body(&snapshot);
    body["working_record"] = Value::String(state.session.working_record());
    Json(body)
}

/// Accept an uploaded image and start a new insight cycle.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if state.session.is_processing() {
        return Err(ApiError::Busy);
    }

    let mut upload: Option<(Option<String>, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((file_name, content_type, bytes.to_vec()));
    }

    let (file_name, content_type, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field `file`".into()))?;

    let mime_type = content_type
        .filter(|ct| is_image(ct))
        .or_else(|| {
            file_name
                .as_deref()
                .and_then(|name| detect_image_mime_type(Path::new(name)))
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::UnsupportedMedia("please upload an image file".into()))?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".into()));
    }

    let document = UploadedDocument::from_bytes(&mime_type, &bytes, file_name)?;
    let document_id = document.id;

    // Another upload may have started while the body streamed in.
    let generation = state
        .session
        .try_select_document(document)
        .ok_or(ApiError::Busy)?;
    info!(generation, document_id = %document_id, "Upload accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "generation": generation, "document_id": document_id })),
    ))
}

/// Deselect the current document. Always allowed.
async fn clear_document(State(state): State<Arc<AppState>>) -> Json<Value> {
    let generation = state.session.select_document(None);
    Json(json!({ "generation": generation }))
}

#[derive(Debug, Deserialize)]
struct SaveRecordRequest {
    text: String,
}

async fn save_record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveRecordRequest>,
) -> Result<Json<Value>, ApiError> {
    if state.session.is_processing() {
        return Err(ApiError::Busy);
    }
    let outcome = state.session.save_record(request.text)?;
    Ok(Json(json!({ "status": outcome })))
}

#[derive(Debug, Deserialize)]
struct UserInfoRequest {
    user_info: Option<String>,
}

async fn set_user_info(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserInfoRequest>,
) -> Json<Value> {
    state.session.set_user_info(request.user_info);
    Json(json!({ "user_info": state.session.snapshot().user_info }))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    file_name: Option<String>,
}

/// Download the committed record as a JSON file.
async fn export_record(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let requested = query.file_name.as_deref().unwrap_or(&state.export_name);
    let file = state.session.export_record(Some(requested))?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// WebSocket handler for snapshot and notification updates.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // The watch stream yields the current snapshot first.
    let snapshots = WatchStream::new(state.session.subscribe()).map(|snapshot| {
        let mut body = state_body(&snapshot);
        body["type"] = Value::String("snapshot".into());
        body
    });
    let notifications = BroadcastStream::new(state.session.notifications()).filter_map(|msg| async move {
        match msg {
            Ok(notification) => Some(json!({ "type": "notification", "notification": notification })),
            Err(e) => {
                warn!(error = %e, "Notification stream lagged");
                None
            }
        }
    });
    let mut updates = futures::stream::select(snapshots.boxed(), notifications.boxed());

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else { break };
                if sender.send(Message::Text(update.to_string().into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use taxwise_core::ExtractedRecord;
    use taxwise_llm::providers::mock::MockProvider;
    use taxwise_llm::CompletionService;
    use taxwise_prompts::PromptActions;
    use tower::ServiceExt;

    const BOUNDARY: &str = "taxwise-test-boundary";

    fn test_state(delay: Option<Duration>) -> Arc<AppState> {
        let mut provider = MockProvider::new("mock").with_response(
            r#"{"simplifiedExplanation": "Wages.", "suggestions": ["Consider X"], "riskAssessment": "Low"}"#,
        );
        if let Some(delay) = delay {
            provider = provider.with_delay(delay);
        }
        let service = CompletionService::new(Arc::new(provider), "mock-model");
        let session = Session::new(
            Arc::new(PromptActions::new(service)),
            ExtractedRecord::unchecked(r#"{"a":1}"#),
        );
        Arc::new(AppState {
            session,
            export_name: "taxwise_ai_data.json".into(),
            provider: "mock".into(),
            model: "mock-model".into(),
        })
    }

    fn upload_request(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/document")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(None));
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "taxwise");
        assert_eq!(body["provider"], "mock");
    }

    #[tokio::test]
    async fn test_index_served() {
        let app = build_router(test_state(None));
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_state_without_document_shows_placeholder() {
        let app = build_router(test_state(None));
        let req = Request::builder().uri("/api/state").body(Body::empty()).unwrap();
        let body = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(body["snapshot"]["processing"], false);
        assert_eq!(body["insights"]["placeholder"]["title"], "AI Insights");
        assert_eq!(body["working_record"], r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_upload_runs_insights() {
        let state = test_state(None);
        let app = build_router(state.clone());
        let response = app
            .oneshot(upload_request("w2.png", "image/png", b"\x89PNG fake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let snapshot = state.session.wait_until_idle().await;
        assert_eq!(
            snapshot.deductions.value().unwrap().suggestions,
            vec!["Consider X"]
        );
    }

    #[tokio::test]
    async fn test_upload_detects_type_from_extension() {
        let state = test_state(None);
        let app = build_router(state.clone());
        let response = app
            .oneshot(upload_request("scan.jpg", "application/octet-stream", b"jpeg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let snapshot = state.session.snapshot();
        assert_eq!(snapshot.document.unwrap().data_uri.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_non_image_upload_rejected() {
        let state = test_state(None);
        let app = build_router(state.clone());
        let response = app
            .oneshot(upload_request("notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(state.session.snapshot().document.is_none());
    }

    #[tokio::test]
    async fn test_upload_and_save_conflict_while_processing() {
        let state = test_state(Some(Duration::from_millis(300)));
        let app = build_router(state.clone());

        let first = app
            .clone()
            .oneshot(upload_request("a.png", "image/png", b"a"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app
            .clone()
            .oneshot(upload_request("b.png", "image/png", b"b"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let save = app
            .clone()
            .oneshot(json_request("PUT", "/api/record", json!({ "text": "{}" })))
            .await
            .unwrap();
        assert_eq!(save.status(), StatusCode::CONFLICT);

        // Deselecting is always allowed.
        let clear = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/document")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(clear.status(), StatusCode::OK);
        assert!(!state.session.is_processing());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_accept_exactly_one() {
        let state = test_state(Some(Duration::from_millis(300)));
        let app = build_router(state.clone());

        let (a, b) = tokio::join!(
            app.clone().oneshot(upload_request("a.png", "image/png", b"a")),
            app.clone().oneshot(upload_request("b.png", "image/png", b"b")),
        );
        let mut statuses = vec![a.unwrap().status(), b.unwrap().status()];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::ACCEPTED, StatusCode::CONFLICT]);
        assert_eq!(state.session.snapshot().generation, 1);
    }

    #[tokio::test]
    async fn test_save_record() {
        let state = test_state(None);
        let app = build_router(state.clone());

        let bad = app
            .clone()
            .oneshot(json_request("PUT", "/api/record", json!({ "text": "{oops" })))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(bad).await["error"]["code"], "INVALID_JSON");

        let good = app
            .oneshot(json_request("PUT", "/api/record", json!({ "text": r#"{"b":2}"# })))
            .await
            .unwrap();
        assert_eq!(good.status(), StatusCode::OK);
        assert_eq!(body_json(good).await["status"], "saved");
        assert_eq!(state.session.snapshot().record, r#"{"b":2}"#);
    }

    #[tokio::test]
    async fn test_user_info() {
        let state = test_state(None);
        let app = build_router(state.clone());
        let response = app
            .oneshot(json_request("PUT", "/api/user-info", json!({ "user_info": " nurse " })))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["user_info"], "nurse");
    }

    #[tokio::test]
    async fn test_export_download() {
        let app = build_router(test_state(None));
        let req = Request::builder()
            .uri("/api/export?file_name=my-return.json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"my-return.json\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_export_of_invalid_record_toasts_without_download() {
        let service = CompletionService::new(Arc::new(MockProvider::new("mock")), "mock-model");
        let state = Arc::new(AppState {
            session: Session::new(
                Arc::new(PromptActions::new(service)),
                ExtractedRecord::unchecked(r#"{"a":"#),
            ),
            export_name: "taxwise_ai_data.json".into(),
            provider: "mock".into(),
            model: "mock-model".into(),
        });
        let mut notifications = state.session.notifications();
        let app = build_router(state);

        let req = Request::builder().uri("/api/export").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_JSON");

        let toast = notifications.try_recv().unwrap();
        assert_eq!(toast.title, "Export Error");

        // The page fetches the export so a failure leaves it in place for the toast.
        assert!(INDEX_HTML.contains(r#"await fetch("/api/export")"#));
        assert!(!INDEX_HTML.contains(r#"window.location = "/api/export""#));
    }

    #[tokio::test]
    async fn test_export_default_name() {
        let app = build_router(test_state(None));
        let req = Request::builder().uri("/api/export").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"taxwise_ai_data.json\""
        );
    }
}
