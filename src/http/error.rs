//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::CardioError;

/// An error ready to leave the process as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CardioError> for ApiError {
    fn from(err: CardioError) -> Self {
        let (status, message) = match &err {
            CardioError::Validation(_) | CardioError::UserExists | CardioError::MissingFeatures(_) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            CardioError::InvalidCredentials | CardioError::Unauthenticated(_) => {
                (StatusCode::UNAUTHORIZED, err.to_string())
            }
            CardioError::ModelUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Model not available".to_string())
            }
            CardioError::StoreUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database not connected".to_string(),
            ),
            CardioError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string()),
            CardioError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{err}");
        }
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map() {
        let cases = [
            (CardioError::Validation("x".into()), 400),
            (CardioError::UserExists, 400),
            (CardioError::MissingFeatures(vec!["ca".into()]), 400),
            (CardioError::InvalidCredentials, 401),
            (CardioError::Unauthenticated("Invalid token"), 401),
            (CardioError::ModelUnavailable("x".into()), 500),
            (CardioError::StoreUnavailable("x".into()), 500),
            (CardioError::Timeout("User store"), 504),
            (CardioError::Internal("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status().as_u16(), status);
        }
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = ApiError::from(CardioError::StoreUnavailable("/var/lib/secret.db locked".into()));
        assert_eq!(err.message(), "Database not connected");

        let err = ApiError::from(CardioError::ModelUnavailable("bad coefficients".into()));
        assert_eq!(err.message(), "Model not available");
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = ApiError::from(CardioError::MissingFeatures(vec!["thal".into()]));
        assert_eq!(err.message(), "Missing features: ['thal']");
    }
}
