use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{domain}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: User errors
/// - E2xxx: Mod and catalog errors
/// - E3xxx: Review errors
/// - E4xxx: Forum errors
/// - E5xxx: Notification errors
/// - E6xxx: Moderation errors
/// - E7xxx: Collection errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    BadRequest,
    Conflict,

    // User (E1xxx)
    UsernameTaken,
    EmailAlreadyExists,
    PasswordTooWeak,
    ResetTokenInvalid,
    TokenExpired,
    TokenInvalid,
    UserNotFound,
    InvalidUsername,

    // Mod & catalog (E2xxx)
    ModNotFound,
    CategoryNotFound,
    SlugTaken,
    InvalidStatusTransition,
    FileNotAvailable,
    UnknownGameVersion,
    UnknownDlc,
    ImageNotFound,
    CannotConflictWithSelf,
    GameVersionExists,

    // Review (E3xxx)
    ReviewNotFound,
    AlreadyReviewed,
    InvalidRating,

    // Forum (E4xxx)
    ForumCategoryNotFound,
    ThreadNotFound,
    ThreadLocked,
    PostNotFound,
    ParentPostMismatch,

    // Notification (E5xxx)
    NotificationNotFound,

    // Moderation (E6xxx)
    ReportNotFound,
    ReportAlreadyResolved,
    InvalidReportReason,

    // Collection (E7xxx)
    CollectionNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::BadRequest => "E0008",
            Self::Conflict => "E0010",

            // User
            Self::UsernameTaken => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::PasswordTooWeak => "E1003",
            Self::ResetTokenInvalid => "E1004",
            Self::TokenExpired => "E1005",
            Self::TokenInvalid => "E1006",
            Self::UserNotFound => "E1007",
            Self::InvalidUsername => "E1008",

            // Mod & catalog
            Self::ModNotFound => "E2001",
            Self::CategoryNotFound => "E2002",
            Self::SlugTaken => "E2003",
            Self::InvalidStatusTransition => "E2004",
            Self::FileNotAvailable => "E2005",
            Self::UnknownGameVersion => "E2006",
            Self::UnknownDlc => "E2007",
            Self::ImageNotFound => "E2008",
            Self::CannotConflictWithSelf => "E2009",
            Self::GameVersionExists => "E2010",

            // Review
            Self::ReviewNotFound => "E3001",
            Self::AlreadyReviewed => "E3002",
            Self::InvalidRating => "E3003",

            // Forum
            Self::ForumCategoryNotFound => "E4001",
            Self::ThreadNotFound => "E4002",
            Self::ThreadLocked => "E4003",
            Self::PostNotFound => "E4004",
            Self::ParentPostMismatch => "E4005",

            // Notification
            Self::NotificationNotFound => "E5001",

            // Moderation
            Self::ReportNotFound => "E6001",
            Self::ReportAlreadyResolved => "E6002",
            Self::InvalidReportReason => "E6003",

            // Collection
            Self::CollectionNotFound => "E7001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::InvalidUsername | Self::ResetTokenInvalid | Self::InvalidStatusTransition
            | Self::UnknownGameVersion | Self::UnknownDlc | Self::CannotConflictWithSelf
            | Self::InvalidRating | Self::ParentPostMismatch
            | Self::InvalidReportReason => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::ModNotFound | Self::CategoryNotFound
            | Self::FileNotAvailable | Self::ImageNotFound | Self::ReviewNotFound
            | Self::ForumCategoryNotFound | Self::ThreadNotFound | Self::PostNotFound
            | Self::NotificationNotFound | Self::ReportNotFound
            | Self::CollectionNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::ThreadLocked => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict | Self::UsernameTaken | Self::EmailAlreadyExists | Self::SlugTaken
            | Self::GameVersionExists | Self::AlreadyReviewed
            | Self::ReportAlreadyResolved => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// 429 carrying the number of seconds until the current window closes.
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::with_details(
            ErrorCode::RateLimited,
            format!("rate limit exceeded, retry in {retry_after_secs} seconds"),
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = serde_json::Map::new();
        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<serde_json::Value> = field_errors
                .iter()
                .map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", e.code));
                    serde_json::Value::String(message)
                })
                .collect();
            fields.insert(field.to_string(), serde_json::Value::Array(messages));
        }

        Self::with_details(
            ErrorCode::ValidationError,
            "validation failed",
            serde_json::Value::Object(fields),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    if *code == ErrorCode::RateLimited {
                        retry_after = d.get("retry_after").and_then(|v| v.as_u64());
                    }
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        let mut response = (status, Json(error_response)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let value = body_json(AppError::new(ErrorCode::ModNotFound, "mod not found")).await;

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E2001");
        assert_eq!(value["error"]["message"], "mod not found");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("internal server error"));
        assert!(!text.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = AppError::rate_limited(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");

        let value = body_json(AppError::rate_limited(42)).await;
        assert_eq!(value["error"]["details"]["retry_after"], 42);
    }

    #[derive(Validate)]
    struct Upload {
        #[validate(length(min = 1, message = "title is required"))]
        title: String,
    }

    #[tokio::test]
    async fn validation_errors_are_per_field() {
        let err: AppError = Upload { title: String::new() }.validate().unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let value = body_json(err).await;
        assert_eq!(value["error"]["code"], "E0002");
        assert_eq!(value["error"]["details"]["title"][0], "title is required");
    }

    #[test]
    fn conflict_codes_map_to_409() {
        for code in [ErrorCode::SlugTaken, ErrorCode::AlreadyReviewed, ErrorCode::UsernameTaken] {
            assert_eq!(code.status_code(), StatusCode::CONFLICT);
        }
        assert_eq!(ErrorCode::ThreadLocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::FileNotAvailable.status_code(), StatusCode::NOT_FOUND);
    }
}
