use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthVerdict;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream responded with status {0}")]
    UpstreamStatus(u16),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed plan document: {0}")]
    Parse(String),

    #[error("{0} could not be converted according to yyyy-MM-dd")]
    InvalidDate(String),

    #[error("A plan for {0} was not found")]
    PlanNotFound(NaiveDate),

    #[error("A class with the name {0} was not found")]
    ClassNotFound(String),

    #[error("A teacher with the shorthand {0} was not found")]
    TeacherNotFound(String),

    #[error("A room with the name {0} was not found")]
    RoomNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The requested content type ({0}) is not available")]
    TypeNotAvailable(String),

    #[error("Failed to render response: {0}")]
    Render(String),

    #[error("Token check failed: {0:?}")]
    Unauthorized(AuthVerdict),
}

impl AppError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Transport(_) | AppError::UpstreamStatus(_) => "UPSTREAM_UNAVAILABLE",
            AppError::Xml(_) | AppError::Parse(_) => "UPSTREAM_MALFORMED",
            AppError::InvalidDate(_) => "REFDATE_FORMAT_ERROR",
            AppError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            AppError::ClassNotFound(_) => "CLASS_NOT_FOUND",
            AppError::TeacherNotFound(_) => "TEACHER_NOT_FOUND",
            AppError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            AppError::Config(_) => "CONFIGURATION_ERROR",
            AppError::TypeNotAvailable(_) => "TYPE_NOT_AVAILABLE",
            AppError::Render(_) => "FORMAT_FAILURE",
            AppError::Unauthorized(AuthVerdict::Missing) => "MISSING_TOKEN_HEADER",
            AppError::Unauthorized(AuthVerdict::Unauthorized) => "UNAUTHORIZED",
            AppError::Unauthorized(_) => "UNKNOWN_TOKEN",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Transport(_) | AppError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            AppError::Xml(_) | AppError::Parse(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidDate(_) => StatusCode::BAD_REQUEST,
            AppError::PlanNotFound(_)
            | AppError::ClassNotFound(_)
            | AppError::TeacherNotFound(_)
            | AppError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TypeNotAvailable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Unauthorized(AuthVerdict::Missing) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(AuthVerdict::Unauthorized) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_errors_map_to_not_found() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(AppError::PlanNotFound(date).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ClassNotFound("10a".into()).code(), "CLASS_NOT_FOUND");
        assert_eq!(AppError::InvalidDate("2024-02-30".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_auth_verdicts_have_distinct_statuses() {
        assert_eq!(AppError::Unauthorized(AuthVerdict::Missing).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized(AuthVerdict::Failed).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthorized(AuthVerdict::Unauthorized).status(), StatusCode::FORBIDDEN);
    }
}
