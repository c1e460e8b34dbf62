//! HTTP surface: the capture page and the identification form handlers.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use rollcall_core::blobs::BlobStore;
use rollcall_core::faces::FaceComparator;
use rollcall_core::records::RecordStore;
use rollcall_core::IdentifyEngine;
use serde::Deserialize;
use tower_http::limit::RequestBodyLimitLayer;

use crate::staging::{self, StagedProbe, Staging};
use crate::views;

/// Shared handles, built once at startup.
pub struct AppState<B, F, R> {
    engine: IdentifyEngine<B, F, R>,
    staging: Staging,
}

impl<B, F, R> AppState<B, F, R> {
    pub fn new(engine: IdentifyEngine<B, F, R>, staging: Staging) -> Arc<Self> {
        Arc::new(Self { engine, staging })
    }
}

/// Captured frame posted by the capture page.
#[derive(Deserialize)]
pub struct CaptureForm {
    #[serde(default)]
    pub image_data: String,
}

/// Internal failure collapsed to a plain 500.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("identification failed: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router<B, F, R>(state: Arc<AppState<B, F, R>>) -> Router
where
    B: BlobStore + Send + Sync + 'static,
    F: FaceComparator + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index).post(identify::<B, F, R>))
        .route("/upload", post(upload::<B, F, R>))
        .layer(DefaultBodyLimit::disable())
        // Upload cap: a full-resolution PNG frame stays well under 10M.
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(views::capture_page())
}

/// POST / with a captured frame. An empty field re-renders the capture
/// page.
async fn identify<B, F, R>(
    State(state): State<Arc<AppState<B, F, R>>>,
    Form(form): Form<CaptureForm>,
) -> Result<Response, AppError>
where
    B: BlobStore + Send + Sync + 'static,
    F: FaceComparator + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    if form.image_data.is_empty() {
        return Ok(Html(views::capture_page()).into_response());
    }
    run_identification(&state, &form.image_data).await
}

/// POST /upload runs the same workflow, but an empty field bounces back
/// to `/`.
async fn upload<B, F, R>(
    State(state): State<Arc<AppState<B, F, R>>>,
    Form(form): Form<CaptureForm>,
) -> Result<Response, AppError>
where
    B: BlobStore + Send + Sync + 'static,
    F: FaceComparator + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    if form.image_data.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }
    run_identification(&state, &form.image_data).await
}

async fn run_identification<B, F, R>(
    state: &AppState<B, F, R>,
    image_data: &str,
) -> Result<Response, AppError>
where
    B: BlobStore + Send + Sync + 'static,
    F: FaceComparator + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    let staged = match state.staging.stage(image_data).await {
        Ok(staged) => staged,
        Err(err) if err.is_client_error() => {
            tracing::warn!(error = %err, "rejecting malformed capture payload");
            return Ok((
                StatusCode::BAD_REQUEST,
                format!("bad capture payload: {err}"),
            )
                .into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let StagedProbe { probe, path } = staged;
    let outcome = state.engine.identify(probe).await;
    staging::discard(&path);

    Ok(match outcome?.identification {
        Some(identification) => Html(views::result_page(&identification)).into_response(),
        None => Html(views::no_match_page()).into_response(),
    })
}
