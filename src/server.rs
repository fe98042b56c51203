//! HTTP surface of the restoration service.
//!
//! - `GET /` lists the restoration endpoints.
//! - `POST /{task}` restores an image. A JSON body `{"image": "<base64>"}` is
//!   answered with `{"enhanced_image": "<base64 PNG>"}`; a multipart upload with
//!   a `file` field is answered with the raw PNG.

use crate::{
    codec::{self, Rgb8Image},
    engine::{RestorationEngine, RestorationOutput},
    error::{ErrorKind, RestoreError},
    messages::{ErrorResponse, RestoreRequest, RestoreResponse},
    model::ModelLoader,
    task::Task,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

/// Default request body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

impl IntoResponse for RestoreError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Client if matches!(self, RestoreError::PayloadTooLarge(_)) => {
                log::warn!("Rejected request: {self}");
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ErrorKind::Client => {
                log::warn!("Rejected request: {self}");
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Server => {
                log::error!("Error processing request: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Converts a body limit given in megabytes to bytes.
pub fn body_limit_bytes(megabytes: usize) -> Result<usize, RestoreError> {
    megabytes.checked_mul(1024 * 1024).ok_or_else(|| {
        RestoreError::InvalidConfig(format!("body limit of {megabytes} MB does not fit in memory"))
    })
}

/// Keeps the body limit status of an extractor rejection, anything else is malformed.
fn rejection_error(status: StatusCode, message: String) -> RestoreError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        RestoreError::PayloadTooLarge(message)
    } else {
        RestoreError::MalformedRequest(message)
    }
}

/// Builds the service router around `engine`.
pub fn router<L>(engine: Arc<RestorationEngine<L>>, max_body_bytes: usize) -> Router
where
    L: ModelLoader + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/{task}", post(post_restore::<L>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .with_state(engine)
}

async fn index() -> Json<Value> {
    let endpoints: Map<String, Value> = Task::ALL
        .into_iter()
        .map(|task| (format!("/{}", task.slug()), json!(task.description())))
        .collect();

    Json(json!({ "status": "ok", "endpoints": endpoints }))
}

async fn post_restore<L>(
    State(engine): State<Arc<RestorationEngine<L>>>,
    Path(task): Path<String>,
    request: Request,
) -> Result<Response, RestoreError>
where
    L: ModelLoader + 'static,
{
    log::info!("Received request for task: {task}");
    let task: Task = task.parse()?;

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| rejection_error(e.status(), e.body_text()))?;
        let image = codec::decode_bytes(&read_upload(multipart).await?)?;
        let output = restore_blocking(engine, task, image).await?;
        let png = codec::encode_png(&output.image)?;

        Ok((
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}.png\"", task.slug()),
                ),
            ],
            png,
        )
            .into_response())
    } else if content_type.starts_with("application/json") {
        let Json(payload) = Json::<RestoreRequest>::from_request(request, &())
            .await
            .map_err(|e| rejection_error(e.status(), e.body_text()))?;
        let image = codec::decode_base64(&payload.image)?;
        let output = restore_blocking(engine, task, image).await?;
        let enhanced_image = codec::encode_base64_png(&output.image)?;
        log::info!("Processed image size: {} bytes", enhanced_image.len());

        Ok(Json(RestoreResponse { enhanced_image }).into_response())
    } else {
        Err(RestoreError::UnsupportedContentType(if content_type.is_empty() {
            "<none>".to_string()
        } else {
            content_type
        }))
    }
}

/// Returns the bytes of the `file` field of an upload.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, RestoreError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(RestoreError::NotAnImage(content_type.to_string()));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejection_error(e.status(), e.body_text()))?;
        if bytes.is_empty() {
            return Err(RestoreError::EmptyPayload);
        }
        return Ok(bytes.to_vec());
    }

    Err(RestoreError::MissingFile(UPLOAD_FIELD))
}

/// Runs the restoration on the blocking pool so the reactor keeps serving.
async fn restore_blocking<L>(
    engine: Arc<RestorationEngine<L>>,
    task: Task,
    image: Rgb8Image,
) -> Result<RestorationOutput, RestoreError>
where
    L: ModelLoader + 'static,
{
    log::info!(
        "Processing {task} for a {}x{} image",
        image.width(),
        image.height()
    );

    let output = tokio::task::spawn_blocking(move || engine.restore(task, &image))
        .await
        .map_err(|e| RestoreError::Worker(e.to_string()))??;

    log::info!(
        "Restored {} in {:?} ({}x{} -> {}x{})",
        output.task,
        output.duration,
        output.input_size.width,
        output.input_size.height,
        output.image.width(),
        output.image.height()
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_converts_megabytes() {
        assert_eq!(body_limit_bytes(100).unwrap(), DEFAULT_MAX_BODY_BYTES);
        assert_eq!(body_limit_bytes(0).unwrap(), 0);
    }

    #[test]
    fn body_limit_overflow_is_a_config_error() {
        let err = body_limit_bytes(usize::MAX).unwrap_err();
        assert!(matches!(err, RestoreError::InvalidConfig(_)));
    }

    #[test]
    fn rejections_keep_the_body_limit_status() {
        assert!(matches!(
            rejection_error(StatusCode::PAYLOAD_TOO_LARGE, "too big".into()),
            RestoreError::PayloadTooLarge(_)
        ));
        assert!(matches!(
            rejection_error(StatusCode::BAD_REQUEST, "bad json".into()),
            RestoreError::MalformedRequest(_)
        ));
        let response = RestoreError::PayloadTooLarge("too big".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
