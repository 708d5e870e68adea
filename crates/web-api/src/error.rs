//! DomainError 到 HTTP 响应的翻译
//!
//! 响应体为 {code, message}, 错误码前三位即 HTTP 状态码。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::errors::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

fn http_status(code: i32) -> StatusCode {
    StatusCode::from_u16((code / 10_000) as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let body = ErrorBody {
            code,
            message: self.0.to_string(),
        };
        (http_status(code), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derived_from_code() {
        assert_eq!(http_status(DomainError::SessionInvalid.code()), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(DomainError::Unauthorized.code()), StatusCode::UNAUTHORIZED);
        assert_eq!(http_status(DomainError::Forbidden.code()), StatusCode::FORBIDDEN);
        assert_eq!(
            http_status(DomainError::ServerBusy.code()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            http_status(DomainError::MessageDeliveryFailed.code()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
