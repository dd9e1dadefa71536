use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analyzer::VideoAnalyzer;
use crate::pages;
use crate::settings::Settings;
use crate::upload::{FILE_FIELD, TempUpload, UploadRejection, validate_filename};

/// Where annotated frames are served from.
pub const RESULTS_ROUTE: &str = "/static/results";

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub settings: Arc<Settings>,
}

enum UploadError {
    Rejected(UploadRejection),
    Failed(anyhow::Error),
}

impl From<UploadRejection> for UploadError {
    fn from(rejection: UploadRejection) -> Self {
        Self::Rejected(rejection)
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = match state.settings.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(upload_form).post(upload_video))
        .route("/health", get(health_check))
        .nest_service(RESULTS_ROUTE, ServeDir::new(&state.settings.results_dir))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn upload_form() -> Html<String> {
    Html(pages::upload_page(None))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            warn!("Request is not a multipart upload: {e}");
            return rejected(UploadRejection::MissingFile);
        }
    };

    let (upload, filename) = match receive_upload(&state.settings.upload_dir, multipart).await {
        Ok(received) => received,
        Err(UploadError::Rejected(rejection)) => {
            info!("Rejected upload: {rejection}");
            return rejected(rejection);
        }
        Err(UploadError::Failed(e)) => {
            error!("Failed to store upload: {e:#}");
            return failed();
        }
    };
    info!("Saved file {filename:?} to {:?}", upload.path());

    let analyzer = Arc::clone(&state.analyzer);
    let video = upload.path().to_path_buf();
    let analyzed = tokio::task::spawn_blocking(move || analyzer.analyze(&video)).await;
    drop(upload);

    let count = match analyzed {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            error!("Failed to process {filename:?}: {e:#}");
            return failed();
        }
        Err(e) => {
            error!("Processing task for {filename:?} did not complete: {e}");
            return failed();
        }
    };
    let num_people = count.people;

    let results_dir = state.settings.results_dir.clone();
    let saved =
        tokio::task::spawn_blocking(move || save_result_image(&results_dir, &count.annotated))
            .await;
    let image_path = match saved {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => {
            error!("Failed to save result image: {e:#}");
            return failed();
        }
        Err(e) => {
            error!("Saving result image did not complete: {e}");
            return failed();
        }
    };

    info!("Counted {num_people} people on {filename:?}, image {image_path:?}");
    let image_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Html(pages::result_page(
        num_people,
        &image_path.display().to_string(),
        &format!("{RESULTS_ROUTE}/{image_name}"),
    ))
    .into_response()
}

/// Streams the `file` part into a fresh temporary upload.
async fn receive_upload(
    upload_dir: &Path,
    mut multipart: Multipart,
) -> Result<(TempUpload, String), UploadError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(UploadRejection::MissingFile.into()),
            Err(e) if is_too_large(&e) => return Err(UploadRejection::TooLarge.into()),
            Err(e) => {
                warn!("Malformed multipart body: {e}");
                return Err(UploadRejection::MissingFile.into());
            }
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_owned);
        validate_filename(filename.as_deref())?;

        let upload = TempUpload::new(upload_dir);
        let written = write_field(field, upload.path()).await?;
        tracing::debug!("Received {written} bytes into {:?}", upload.path());
        return Ok((upload, filename.unwrap_or_default()));
    }
}

async fn write_field(mut field: Field<'_>, path: &Path) -> Result<u64, UploadError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {path:?}"))
        .map_err(UploadError::Failed)?;
    let mut written = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) if is_too_large(&e) => return Err(UploadRejection::TooLarge.into()),
            Err(e) => {
                return Err(UploadError::Failed(
                    anyhow::Error::new(e).context("Failed to read upload body"),
                ));
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| UploadError::Failed(e.into()))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| UploadError::Failed(e.into()))?;
    Ok(written)
}

fn is_too_large(e: &MultipartError) -> bool {
    e.status() == StatusCode::PAYLOAD_TOO_LARGE
}

/// Saves the annotated frame as `<unix seconds>.jpg`.
fn save_result_image(results_dir: &Path, image: &RgbImage) -> anyhow::Result<PathBuf> {
    let path = results_dir.join(format!("{}.jpg", Utc::now().timestamp()));
    image
        .save(&path)
        .with_context(|| format!("Failed to write {path:?}"))?;
    Ok(path)
}

fn rejected(rejection: UploadRejection) -> Response {
    (
        rejection.status(),
        Html(pages::upload_page(Some(rejection.message()))),
    )
        .into_response()
}

fn failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::failure_page())).into_response()
}
