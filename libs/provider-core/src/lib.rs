//! Shared error type and adapter contract implemented by every
//! transaction-history provider (Ankr, Blockscout, Blockscan) and consumed
//! by the multi-provider fan-out and the aggregation service.

use async_trait::async_trait;
use thiserror::Error;
use tx_model::{TransactionQueryParams, TransactionResponse};

/// Result type alias used throughout the aggregation pipeline.
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Error type shared by adapters, the multi-provider, the cache layer, and
/// the aggregation service. Each variant maps to one of the four envelope
/// codes at the HTTP boundary (`ResponseCode`); `classify` performs that
/// mapping.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Query Parser rejected the request before it reached any provider.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// HTTP transport failure talking to an upstream explorer or RPC node.
    #[error("request to {source} failed: {error}")]
    Transport {
        source: String,
        #[source]
        error: reqwest::Error,
    },

    /// Upstream responded but with a non-2xx status or an explicit
    /// status/error field in its own envelope (e.g. Etherscan `status="0"`).
    #[error("upstream {source} returned an error: {message}")]
    UpstreamStatus { source: String, message: String },

    /// A JSON payload from an upstream did not match the shape the adapter
    /// expected.
    #[error("failed to decode response from {source}: {error}")]
    Decode {
        source: String,
        #[source]
        error: serde_json::Error,
    },

    /// Every adapter failed, or the request timeout elapsed before any
    /// adapter completed.
    #[error("failed to get transactions from provider: {0}")]
    ProviderFailed(String),

    /// The per-request deadline elapsed. Surfaced at the HTTP boundary with
    /// the fixed message "Request timed out".
    #[error("request timed out")]
    DeadlineExceeded,

    /// Cache read/write failure, registry inconsistency, or any other
    /// failure not attributable to the caller or an upstream.
    #[error("internal error: {0}")]
    Internal(String),

    /// Transparent wrapper for ad hoc contextual errors (`anyhow`-style),
    /// used sparingly where a dedicated variant isn't warranted.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AggregatorError {
    /// Maps this error onto one of the three HTTP-boundary envelope codes
    /// `response_code` can produce. Deadline-exceeded folds into
    /// `ProviderFailed` with the fixed "Request timed out" message, per
    /// spec; the envelope code table's separate timeout literal is not
    /// distinguished at this layer.
    pub fn response_code(&self) -> tx_model::ResponseCode {
        use tx_model::ResponseCode;
        match self {
            AggregatorError::InvalidParam(_) => ResponseCode::InvalidParams,
            AggregatorError::DeadlineExceeded
            | AggregatorError::ProviderFailed(_)
            | AggregatorError::Transport { .. }
            | AggregatorError::UpstreamStatus { .. } => ResponseCode::ProviderFailed,
            AggregatorError::Decode { .. } | AggregatorError::Internal(_) | AggregatorError::Other(_) => {
                ResponseCode::InternalError
            }
        }
    }

    /// The message the client sees. Deadline exceeded always uses the exact
    /// fixed wording the external contract requires.
    pub fn client_message(&self) -> String {
        match self {
            AggregatorError::DeadlineExceeded => "Request timed out".to_string(),
            other => other.to_string(),
        }
    }
}

/// A source of transaction history for one address query. Implemented by
/// each upstream adapter (Ankr, Blockscout, Blockscan) and by the
/// multi-provider fan-out that composes them.
#[async_trait]
pub trait TransactionAdapter: Send + Sync {
    /// Human-readable identifier for logging and error attribution, e.g.
    /// `"ankr"` or `"blockscout:ETH"`.
    fn name(&self) -> &str;

    /// Fetch every sub-stream this adapter covers and normalize the result
    /// into canonical `Transaction` records. Any sub-stream failure aborts
    /// the whole call with the first error encountered.
    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_exceeded_maps_to_provider_failed_code_and_fixed_message() {
        let err = AggregatorError::DeadlineExceeded;
        assert_eq!(err.response_code().code(), 1003);
        assert_eq!(err.client_message(), "Request timed out");
    }

    #[test]
    fn invalid_param_maps_to_1001() {
        let err = AggregatorError::InvalidParam("missing address".into());
        assert_eq!(err.response_code().code(), 1001);
    }

    #[test]
    fn upstream_status_maps_to_provider_failed() {
        let err = AggregatorError::UpstreamStatus {
            source: "blockscan".into(),
            message: "NOTOK".into(),
        };
        assert_eq!(err.response_code().code(), 1003);
    }

    #[test]
    fn internal_maps_to_1002() {
        let err = AggregatorError::Internal("cache write failed".into());
        assert_eq!(err.response_code().code(), 1002);
    }
}
