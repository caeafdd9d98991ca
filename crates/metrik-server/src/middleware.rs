use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrik_common::crypto::{ENCRYPTION_HEADER, ENCRYPTION_SCHEME};

use crate::logging::TraceId;
use crate::state::AppState;

/// Largest encrypted body accepted.
const MAX_ENCRYPTED_BYTES: usize = 8 * 1024 * 1024;

fn reject(trace_id: &str, msg: &str) -> Response {
    tracing::warn!(trace_id = %trace_id, reason = msg, "Encrypted request rejected");
    (StatusCode::BAD_REQUEST, msg.to_string()).into_response()
}

/// Decrypts bodies flagged with `x-encryption: rsa` before the handlers see
/// them. Unflagged requests pass through untouched.
pub async fn decrypt_body(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(scheme) = req.headers().get(ENCRYPTION_HEADER) else {
        return next.run(req).await;
    };

    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let supported = scheme
        .to_str()
        .map(|s| s.trim().eq_ignore_ascii_case(ENCRYPTION_SCHEME))
        .unwrap_or(false);
    if !supported {
        return reject(&trace_id, "unsupported encryption scheme");
    }
    let Some(decryptor) = state.decryptor.clone() else {
        return reject(&trace_id, "encrypted payload but no private key is configured");
    };

    let (mut parts, body) = req.into_parts();
    let sealed = match axum::body::to_bytes(body, MAX_ENCRYPTED_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return reject(&trace_id, "unreadable encrypted payload"),
    };
    let plain = match decryptor.decrypt(&sealed) {
        Ok(plain) => plain,
        Err(e) => {
            tracing::debug!(trace_id = %trace_id, error = %e, "Decryption failed");
            return reject(&trace_id, "payload could not be decrypted");
        }
    };

    parts.headers.remove(ENCRYPTION_HEADER);
    parts.headers.remove(header::CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(plain))).await
}
