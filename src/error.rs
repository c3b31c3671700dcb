use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Invalid {field}: {message}")] Validation {
        field: String,
        message: String,
    },

    #[error("Missing or invalid user identity")]
    Unauthorized,

    #[error("{0} not found")] NotFound(String),

    #[error("Conflict: {0}")] Conflict(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Provider error: {0}")] Provider(String),

    #[error("Provider request timed out")]
    ProviderTimeout,

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message, field) = match self {
            AppError::Database(e) => ("DATABASE_ERROR", e.to_string(), None),
            AppError::Validation { field, message } =>
                ("INVALID_INPUT", message.clone(), Some(field.clone())),
            AppError::Unauthorized =>
                ("UNAUTHORIZED", "Missing or invalid user identity".to_string(), None),
            AppError::NotFound(what) => ("NOT_FOUND", format!("{} not found", what), None),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone(), None),
            AppError::InsufficientBalance =>
                ("INSUFFICIENT_BALANCE", "Insufficient wallet balance".to_string(), None),
            AppError::Provider(msg) => ("PROVIDER_ERROR", msg.clone(), None),
            AppError::ProviderTimeout =>
                ("PROVIDER_ERROR", "Provider request timed out".to_string(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::Validation { .. } => axum::http::StatusCode::BAD_REQUEST,
            AppError::Unauthorized => axum::http::StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => axum::http::StatusCode::CONFLICT,
            AppError::InsufficientBalance => axum::http::StatusCode::PAYMENT_REQUIRED,
            AppError::Provider(_) | AppError::ProviderTimeout => axum::http::StatusCode::BAD_GATEWAY,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
