// src/error.rs
//! Error types for provider fetches, the chat assistant and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure while fetching from a single news provider.
/// Never crosses the adapter boundary; see `NewsSource::fetch`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("provider reported an error: {0}")]
    Provider(String),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Classified failure of the AI chat upstream.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("rate limited by chat provider")]
    RateLimited,

    #[error("chat provider rejected credentials")]
    Unauthorized,

    #[error("chat provider overloaded (status {0})")]
    Overloaded(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("chat provider returned status {0}")]
    Upstream(u16),

    #[error("chat provider returned an unreadable body: {0}")]
    Decode(String),

    #[error("chat provider returned an empty reply")]
    EmptyReply,
}

impl ChatError {
    /// Map an upstream HTTP status into a classified error.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ChatError::RateLimited,
            401 | 403 => ChatError::Unauthorized,
            500 | 502 | 503 | 504 | 529 => ChatError::Overloaded(status),
            other => ChatError::Upstream(other),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::RateLimited | ChatError::Overloaded(_) | ChatError::Network(_)
        )
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::RateLimited => "rate_limit",
            ChatError::Unauthorized => "auth",
            ChatError::Overloaded(_) => "overload",
            ChatError::Network(_) => "network",
            ChatError::Upstream(_) => "upstream",
            ChatError::Decode(_) => "decode",
            ChatError::EmptyReply => "empty",
        }
    }
}

/// Errors surfaced to HTTP clients. Always rendered as
/// `{success: false, message}` with a Thai message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("chat failed: {0}")]
    Chat(#[from] ChatError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Chat(ChatError::Overloaded(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Chat(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn localized_message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "คำขอไม่ถูกต้อง",
            ApiError::Chat(ChatError::RateLimited) => {
                "ผู้ช่วย AI มีผู้ใช้งานจำนวนมาก กรุณาลองใหม่อีกครั้งในภายหลัง"
            }
            ApiError::Chat(ChatError::Unauthorized) => "ผู้ช่วย AI ยังไม่พร้อมใช้งาน",
            ApiError::Chat(ChatError::Overloaded(_)) => {
                "ผู้ช่วย AI ไม่สามารถให้บริการได้ชั่วคราว กรุณาลองใหม่อีกครั้ง"
            }
            ApiError::Chat(ChatError::Network(_)) => "ไม่สามารถเชื่อมต่อผู้ช่วย AI ได้",
            ApiError::Chat(_) => "ผู้ช่วย AI ไม่สามารถตอบคำถามได้ในขณะนี้",
            ApiError::Internal(_) => "เกิดข้อผิดพลาดในการดึงข่าว",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = json!({
            "success": false,
            "message": self.localized_message(),
        });
        (status, Json(body)).into_response()
    }
}
