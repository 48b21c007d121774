use alloy::{
    primitives::Bytes,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Failure of a raw RPC call against a chain node.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited by the RPC node")]
    RateLimited,

    #[error("Bad gateway")]
    BadGateway,

    #[error("Network error: {0}")]
    Network(String),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        revert_data: Option<Bytes>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Network configuration error: {0}")]
    NetworkConfiguration(String),

    #[error("Other provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether retrying the same request on the same node may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout
            | ProviderError::RateLimited
            | ProviderError::BadGateway
            | ProviderError::Network(_) => true,
            ProviderError::Rpc { code, message, .. } => {
                // -32005: request limit exceeded, -32603: internal node error
                *code == -32005 || *code == -32603 || message.to_lowercase().contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for ProviderError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => ProviderError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
                revert_data: payload.as_revert_data(),
            },
            RpcError::Transport(TransportErrorKind::HttpError(http)) => match http.status {
                429 => ProviderError::RateLimited,
                502 => ProviderError::BadGateway,
                504 => ProviderError::Timeout,
                status => ProviderError::Network(format!("HTTP {}: {}", status, http.body)),
            },
            RpcError::Transport(kind) => {
                let text = kind.to_string();
                if text.to_lowercase().contains("timed out") {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(text)
                }
            }
            RpcError::NullResp => ProviderError::InvalidResponse("null response".to_string()),
            RpcError::SerError(e) => ProviderError::Other(e.to_string()),
            RpcError::DeserError { err, text } => {
                ProviderError::InvalidResponse(format!("{}: {}", err, text))
            }
            other => ProviderError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Network("reset".to_string()).is_transient());
        assert!(ProviderError::Rpc {
            code: -32005,
            message: "limit exceeded".to_string(),
            revert_data: None
        }
        .is_transient());
        assert!(!ProviderError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            revert_data: None
        }
        .is_transient());
        assert!(!ProviderError::InvalidAddress("0x".to_string()).is_transient());
    }

    #[test]
    fn test_from_http_status() {
        let err: ProviderError = RpcError::Transport(TransportErrorKind::HttpError(
            alloy::transports::HttpError {
                status: 429,
                body: "too many requests".to_string(),
            },
        ))
        .into();
        assert_eq!(err, ProviderError::RateLimited);
    }

    #[test]
    fn test_from_null_response() {
        let err: ProviderError = RpcError::<TransportErrorKind>::NullResp.into();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
