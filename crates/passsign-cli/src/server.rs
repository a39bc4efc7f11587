//! HTTP signing service.
//!
//! Routes:
//!
//! - `GET /health` reports liveness and the service version.
//! - `POST /sign-pass` takes a pass as JSON (base64 payloads) or as
//!   `multipart/form-data` (a `pass.json` part plus `files` parts) and
//!   answers with the `.pkpass` archive.
//!
//! Errors are returned as `{"code": ..., "message": ...}` with `400` for
//! caller mistakes and `500` for everything else.

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use passsign::bundle::PASS_JSON;
use passsign::{DecodedRequest, Error, ErrorCode, Fault, PassSigner, SignRequest, SignedPass};
use serde::Serialize;
use std::net::SocketAddr;

/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Multipart part name carrying assets.
const FILES_PART: &str = "files";

/// Build the service router.
pub fn router(signer: PassSigner, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sign-pass", post(sign_pass))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(signer)
}

/// Serve `app` on `addr` until interrupted.
pub async fn serve(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to wait for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await
        .context("http server failed")
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Failure rendered as a JSON response.
#[derive(Debug)]
enum ApiError {
    Sign(Error),
    /// The body could not be read; keeps the extractor's status (e.g. 413).
    Body { status: StatusCode, message: String },
}

impl ApiError {
    fn body(status: StatusCode, message: String) -> Self {
        ApiError::Body { status, message }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Sign(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Sign(err) => {
                let status = match err.fault() {
                    Fault::Client => {
                        tracing::warn!(code = %err.code(), error = %err, "rejected sign request");
                        StatusCode::BAD_REQUEST
                    }
                    Fault::Server => {
                        tracing::error!(code = %err.code(), error = %err, "sign request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let body = ErrorBody {
                    code: err.code().as_str(),
                    message: err.public_message(),
                };
                (status, body)
            }
            ApiError::Body { status, message } => {
                tracing::warn!(%status, error = %message, "unreadable request body");
                let body = ErrorBody {
                    code: ErrorCode::InvalidRequest.as_str(),
                    message,
                };
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

async fn sign_pass(State(signer): State<PassSigner>, request: Request) -> Result<Response, ApiError> {
    signer.config().validate()?;

    let decoded = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::body(e.status(), e.body_text()))?;
        decode_multipart(multipart).await?
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| ApiError::body(e.status(), e.body_text()))?;
        decode_json(&body)?
    };

    let signed = tokio::task::spawn_blocking(move || signer.sign_request(decoded))
        .await
        .map_err(|e| Error::SignFailed(Box::new(Error::Signing(format!("signing task failed: {e}")))))??;

    Ok((
        [
            (header::CONTENT_TYPE, SignedPass::CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"pass.pkpass\""),
        ],
        signed.archive,
    )
        .into_response())
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn decode_json(body: &[u8]) -> Result<DecodedRequest, Error> {
    let request: SignRequest = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidRequest(format!("Invalid request body: {e}")))?;
    request.decode()
}

async fn decode_multipart(mut multipart: Multipart) -> Result<DecodedRequest, ApiError> {
    let mut decoded = DecodedRequest::default();
    let mut descriptor = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::body(e.status(), e.body_text()))?
    {
        let part = field.name().unwrap_or_default().to_string();
        match part.as_str() {
            PASS_JSON => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::body(e.status(), e.body_text()))?;
                descriptor = Some(data.to_vec());
            }
            FILES_PART => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidRequest("File part without a file name".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::body(e.status(), e.body_text()))?;
                decoded.insert_asset(name, data.to_vec())?;
            }
            other => tracing::debug!(part = other, "ignoring multipart part"),
        }
    }

    decoded.descriptor = descriptor.ok_or_else(|| Error::InvalidRequest("Missing pass.json".into()))?;
    Ok(decoded)
}
