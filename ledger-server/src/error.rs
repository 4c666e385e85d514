//! Error-to-status translation (SPEC §6), the adaptor's single boundary
//! crossing. `LedgerError` never escapes this crate as anything but an HTTP
//! response; nothing re-wraps it further up the call stack.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger_core::LedgerError;
use serde::Serialize;

/// Wraps a [`LedgerError`] so it can be returned directly from an axum
/// handler. Constructed once, at the boundary, via `From<LedgerError>`.
pub struct ApiError(LedgerError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = status_for(&self.0);
        let body = ErrorBody {
            error: kind.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Maps each [`LedgerError`] variant to the HTTP status analogous to the
/// gRPC status SPEC §6 names (`already_exists` -> 409, `invalid_argument`
/// -> 400, `data_loss` -> 422, `resource_exhausted` -> 413, `internal` ->
/// 500), centralized here rather than scattered across handlers, following
/// the teacher's practice in `ubl-server/src/main.rs`.
fn status_for(err: &LedgerError) -> (StatusCode, &'static str) {
    match err {
        LedgerError::ContextAlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
        LedgerError::InvalidSnapshotFormat(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        LedgerError::UnsupportedSnapshotVersion { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_argument")
        }
        LedgerError::IntegrityVerificationFailed { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "data_loss")
        }
        LedgerError::HashMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "data_loss"),
        LedgerError::InvalidIndex { .. } => (StatusCode::BAD_REQUEST, "invalid_argument"),
        LedgerError::PayloadTooLarge { .. } => {
            (StatusCode::PAYLOAD_TOO_LARGE, "resource_exhausted")
        }
        LedgerError::AppendFailed(_)
        | LedgerError::GetFailed(_)
        | LedgerError::SnapshotFailed(_)
        | LedgerError::LoadFailed(_)
        | LedgerError::SequenceFailed(_)
        | LedgerError::LamportTimeFailed(_)
        | LedgerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_already_exists_maps_to_409() {
        let err = LedgerError::ContextAlreadyExists("ctx".to_string());
        assert_eq!(status_for(&err).0, StatusCode::CONFLICT);
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        let err = LedgerError::PayloadTooLarge { actual: 10, max: 5 };
        assert_eq!(status_for(&err).0, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn integrity_failure_maps_to_422() {
        let err = LedgerError::IntegrityVerificationFailed {
            context_id: "ctx".to_string(),
            expected: "a".to_string(),
            computed: "b".to_string(),
        };
        assert_eq!(status_for(&err).0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_maps_to_500() {
        let err = LedgerError::Internal("boom".to_string());
        assert_eq!(status_for(&err).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
