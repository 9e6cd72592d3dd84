//! RPC error types.

use thiserror::Error;

/// Wallet-rpc error codes the harness reacts to.
pub mod codes {
    /// `WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR`.
    pub const UNKNOWN: i64 = -1;
    /// `WALLET_RPC_ERROR_CODE_NOT_ENOUGH_MONEY`.
    pub const NOT_ENOUGH_MONEY: i64 = -17;
    /// `WALLET_RPC_ERROR_CODE_WALLET_ALREADY_EXISTS`.
    pub const WALLET_ALREADY_EXISTS: i64 = -21;
    /// `WALLET_RPC_ERROR_CODE_INVALID_PASSWORD`, returned by `open_wallet`.
    pub const INVALID_PASSWORD: i64 = -22;
    /// `WALLET_RPC_ERROR_CODE_ATTRIBUTE_NOT_FOUND`.
    pub const ATTRIBUTE_NOT_FOUND: i64 = -45;
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error calling {method} at {url}: {source}")]
    Http {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {method} at {url}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code} from {method}: {message}")]
    Rpc {
        code: i64,
        message: String,
        method: String,
    },

    #[error("no result in response to {context}")]
    NoResult { context: String },

    #[error("authentication failed at {url}")]
    AuthFailed { url: String },

    #[error("daemon busy during {context}")]
    Busy { context: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures and busy daemons are transient. Protocol-level
    /// errors and malformed responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http { source, .. } => source.is_connect() || source.is_timeout(),
            RpcError::HttpStatus { status, .. } => *status >= 500,
            RpcError::Busy { .. } => true,
            _ => false,
        }
    }

    /// The JSON-RPC error code, if the server returned one.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            RpcError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_is_transient() {
        let err = RpcError::Busy {
            context: "get_height".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_rpc_error_not_transient() {
        let err = RpcError::Rpc {
            code: codes::INVALID_PASSWORD,
            message: "invalid password".into(),
            method: "open_wallet".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.rpc_code(), Some(-22));
    }

    #[test]
    fn test_server_error_status_is_transient() {
        let err = RpcError::HttpStatus {
            method: "get_info".into(),
            url: "http://127.0.0.1:1/get_info".into(),
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
        assert_eq!(err.rpc_code(), None);
    }
}
