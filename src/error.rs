use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::session::SessionError;
use crate::spotify::DataError;

/// Errors surfaced by HTTP handlers. Upstream auth failures are reduced to an
/// opaque message; the cause is logged where it happens.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("{0}")]
    Upstream(#[from] DataError),
    #[error("{0}")]
    InvalidQuery(String),
    #[error("Internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::AuthenticationFailed | ApiError::Upstream(_) | ApiError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery(rejection.body_text())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unauthenticated => ApiError::Unauthenticated,
            SessionError::Backend(msg) => {
                tracing::error!(error = %msg, "session store failure");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::AuthenticationFailed.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        let upstream = ApiError::Upstream(DataError::Upstream {
            status: 429,
            body: "slow down".into(),
        });
        assert_eq!(upstream.to_string(), "429 - slow down");
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidQuery("bad limit".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SessionError::Backend("down".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
