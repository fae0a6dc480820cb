use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use vouch_identity::VerificationError;

use crate::models::ErrorBody;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalServerError(String),
    Verification(VerificationError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Verification(err) => match err {
                VerificationError::MalformedToken(_) => StatusCode::BAD_REQUEST,
                VerificationError::UnresolvableIssuer { .. }
                | VerificationError::UnsupportedAlgorithm(_) => StatusCode::UNPROCESSABLE_ENTITY,
                VerificationError::SignatureInvalid(_)
                | VerificationError::NotYetValid { .. }
                | VerificationError::Expired { .. } => StatusCode::UNAUTHORIZED,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg) | ApiError::InternalServerError(msg) => ErrorBody {
                error: msg,
                reason: None,
            },
            ApiError::Verification(err) => ErrorBody {
                error: err.to_string(),
                reason: Some(err.reason().to_string()),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        ApiError::Verification(err)
    }
}
