use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

/// Failure raised by a `Store` or one of its units of work.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} was modified or deleted by another writer")]
    ConcurrencyConflict { entity: &'static str, id: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stable discriminator carried by `ServiceError::NotValidItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    ItemNotExists,
    PersonNameExists,
    PersonDefault,
    CompanyNotExists,
    TimeRecordOverlappingExists,
    InvalidTimeRange,
    InvalidPagination,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ItemNotExists => "ItemNotExists",
            ErrorCode::PersonNameExists => "PersonNameExists",
            ErrorCode::PersonDefault => "PersonDefault",
            ErrorCode::CompanyNotExists => "CompanyNotExists",
            ErrorCode::TimeRecordOverlappingExists => "TimeRecordOverlappingExists",
            ErrorCode::InvalidTimeRange => "InvalidTimeRange",
            ErrorCode::InvalidPagination => "InvalidPagination",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ItemNotExists => StatusCode::NOT_FOUND,
            ErrorCode::InvalidTimeRange | ErrorCode::InvalidPagination => StatusCode::BAD_REQUEST,
            ErrorCode::PersonNameExists
            | ErrorCode::PersonDefault
            | ErrorCode::CompanyNotExists
            | ErrorCode::TimeRecordOverlappingExists => StatusCode::CONFLICT,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{code}: {description}")]
    NotValidItem {
        code: ErrorCode,
        description: String,
    },
    #[error("forbidden action")]
    ForbiddenAction,
    #[error("user registration failed: {0}")]
    UserRegister(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_valid(code: ErrorCode, description: impl Into<String>) -> Self {
        ServiceError::NotValidItem {
            code,
            description: description.into(),
        }
    }

    pub fn item_not_exists(item: &str, id: i64) -> Self {
        Self::not_valid(ErrorCode::ItemNotExists, format!("{item} {id} does not exist"))
    }

    /// Outcome is fixed by business rules; retrying cannot change it.
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            ServiceError::NotValidItem { .. }
                | ServiceError::ForbiddenAction
                | ServiceError::UserRegister(_)
        )
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServiceError::NotValidItem { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Store(StoreError::ConcurrencyConflict { .. })
        )
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    ConcurrencyConflict(String),
    RateLimited(String),
    Rejected { code: ErrorCode, message: String },
    Internal(String),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::ConcurrencyConflict(msg) => write!(f, "Concurrency Conflict: {msg}"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Rejected { code, message } => write!(f, "{code}: {message}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Store(err) => write!(f, "Store Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::ConcurrencyConflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": msg, "code": "ConcurrencyConflict" }),
            ),
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, json!({ "error": msg }))
            }
            AppError::Rejected { code, message } => {
                (code.status(), json!({ "error": message, "code": code }))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Store(err) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict { .. } => {
                AppError::ConcurrencyConflict(err.to_string())
            }
            other => AppError::Store(other),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotValidItem { code, description } => AppError::Rejected {
                code,
                message: description,
            },
            ServiceError::ForbiddenAction => {
                AppError::Forbidden("You are not allowed to perform this action".to_string())
            }
            ServiceError::UserRegister(msg) => AppError::BadRequest(msg),
            ServiceError::Store(err) => err.into(),
        }
    }
}
