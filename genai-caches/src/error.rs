//! Error definitions for the client.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP client error: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Auth error: {message}")]
    Auth { message: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// 是否为配置或认证错误（重试无意义）。
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::Auth { .. })
    }

    /// 非 2xx 响应对应的 HTTP 状态码。
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// 将非成功响应转换为 `Error::ApiError`，优先取 `{"error": {...}}` 中的消息。
pub(crate) async fn api_error_from_response(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::ApiError {
        status,
        message: api_error_message(&body),
    }
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error:
                ErrorBody {
                    message: Some(message),
                    status,
                },
        }) => match status {
            Some(status) => format!("{status}: {message}"),
            None => message,
        },
        _ => body.to_string(),
    }
}
