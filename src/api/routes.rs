//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{ProxyClient, RetryConfig, TextGenerator};
use crate::sandbox::{ProcessSandbox, Sandbox, SyncController};
use crate::session::{ProjectSession, SessionSnapshot};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The single project session
    pub session: Arc<ProjectSession>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    // Boot the sandbox once per process; the controller is the only holder.
    let sandbox: Arc<dyn Sandbox> = ProcessSandbox::boot(
        config.workspace_path.clone(),
        config.install_command.clone(),
        config.run_command.clone(),
    )
    .await?;
    let controller = SyncController::new(sandbox);

    let generator: Arc<dyn TextGenerator> = Arc::new(ProxyClient::with_retry_config(
        config.proxy_url.clone(),
        RetryConfig {
            max_retries: config.max_retries,
        },
    ));

    let session = Arc::new(ProjectSession::new(generator, controller));
    let state = Arc::new(AppState {
        config: config.clone(),
        session,
    });

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/project", post(create_project))
        .route("/api/project/follow-up", post(follow_up))
        .route("/api/project/steps", get(get_steps))
        .route("/api/project/steps/:index", patch(update_step))
        .route("/api/project/tree", get(get_tree))
        .route("/api/project/file", get(get_file))
        .route("/api/project/preview", get(get_preview))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(bad_request("prompt is required"));
    }

    state
        .session
        .create(prompt)
        .await
        .map_err(internal_error)?;

    Ok(Json(state.session.snapshot().await))
}

async fn follow_up(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FollowUpRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(bad_request("prompt is required"));
    }

    state
        .session
        .follow_up(prompt)
        .await
        .map_err(internal_error)?;

    Ok(Json(state.session.snapshot().await))
}

async fn get_steps(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

async fn update_step(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<UpdateStepRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .session
        .set_step_status(index, request.status, request.error)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(ErrorResponse { error: e.to_string() })))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_tree(State(state): State<Arc<AppState>>) -> Json<TreeResponse> {
    let tree = state.session.tree().await;
    Json(TreeResponse::from_tree(&tree))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileResponse>, ApiError> {
    match state.session.file_content(&query.path).await {
        Some(content) => Ok(Json(FileResponse {
            path: query.path,
            content,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No file at path {}", query.path),
            }),
        )),
    }
}

async fn get_preview(State(state): State<Arc<AppState>>) -> Json<PreviewResponse> {
    Json(PreviewResponse {
        url: state.session.preview_address(),
    })
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error(e: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
