use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loan_flow::LoanError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Loan(err) => match err {
                LoanError::InvalidInput(_) | LoanError::ClassificationUndefined(_) => {
                    StatusCode::BAD_REQUEST
                }
                LoanError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                LoanError::StageViolation { .. } => StatusCode::CONFLICT,
                LoanError::Provider(_) => StatusCode::BAD_GATEWAY,
                LoanError::Storage(_) | LoanError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = %status, "Request failed");
        }

        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Loan(LoanError::StageViolation { stage, event }) = &self {
            body["stage"] = json!(stage);
            body["event"] = json!(event);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
