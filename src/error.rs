use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown blockchain: {0}")]
    UnknownChain(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("All {attempts} proxy attempts failed")]
    ProxiesExhausted { attempts: usize },

    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),

    #[error("Search superseded by a newer search")]
    Superseded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Transport-level failures are retried on the next proxy; everything
    /// else is terminal for the attempt loop.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::Http(_) | AppError::Transport(_) | AppError::UnexpectedBody(_) | AppError::Json(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnknownChain(_) | AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProxiesExhausted { .. } | AppError::Transport(_) | AppError::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Superseded => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
