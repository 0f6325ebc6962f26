//! Orchestrates one request: cache lookup, upstream fan-out on miss,
//! involvement filtering, cache write-through, and the final
//! post-processing pipeline.

use crate::postprocess::{self, ResponseSettings};
use cache::CacheClient;
use chain_registry::ChainRegistry;
use provider_core::{AggregatorError, TransactionAdapter};
use std::sync::Arc;
use tracing::{info, warn};
use tx_model::{ResponseCode, Transaction, TransactionQueryParams, TransactionResponse};

/// Everything the HTTP boundary needs to build a `ResponseEnvelope`. Unlike
/// the adapters and the cache layer, the service never propagates a plain
/// `Result` — a failed cache write still carries whatever was already
/// assembled, per the contract in spec §4.6/§7, so every path returns one
/// of these instead of an `Err`.
#[derive(Debug)]
pub struct ServiceResponse {
    pub code: ResponseCode,
    pub message: String,
    pub transactions: Vec<Transaction>,
}

impl ServiceResponse {
    fn success(transactions: Vec<Transaction>) -> Self {
        Self {
            code: ResponseCode::Success,
            message: "success".to_string(),
            transactions,
        }
    }

    fn error(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            transactions: Vec::new(),
        }
    }

    fn error_with_partial(code: ResponseCode, message: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            code,
            message: message.into(),
            transactions,
        }
    }
}

pub struct AggregationService {
    provider: Arc<dyn TransactionAdapter>,
    cache: CacheClient,
    registry: Arc<ChainRegistry>,
    settings: ResponseSettings,
}

impl AggregationService {
    pub fn new(
        provider: Arc<dyn TransactionAdapter>,
        cache: CacheClient,
        registry: Arc<ChainRegistry>,
        settings: ResponseSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            registry,
            settings,
        }
    }

    pub async fn get_transactions(&self, params: &TransactionQueryParams) -> ServiceResponse {
        let cached = self.cache.query(params).await.unwrap_or_else(|e| {
            warn!(error = %e, "cache read failed, falling through to upstream fetch");
            TransactionResponse::default()
        });

        let working = if !cached.transactions.is_empty() {
            info!(address = %params.address, count = cached.transactions.len(), "served from cache");
            cached.transactions
        } else {
            match self.fetch_and_cache(params).await {
                Ok(transactions) => transactions,
                Err(outcome) => return outcome,
            }
        };

        ServiceResponse::success(postprocess::post_process(working, params, &self.registry, self.settings))
    }

    /// Fetches from upstream, involvement-filters, and writes through to
    /// cache. Returns the involvement-filtered (not yet post-processed) set
    /// on success. On cache-write failure, returns an `Err` carrying that
    /// same not-yet-post-processed set, per spec §4.6/§7.
    async fn fetch_and_cache(&self, params: &TransactionQueryParams) -> Result<Vec<Transaction>, ServiceResponse> {
        let fetched = self.provider.get_transactions(params).await.map_err(|e| {
            warn!(error = %e, "upstream fetch failed");
            ServiceResponse::error(e.response_code(), e.client_message())
        })?;

        let mut transactions = fetched.transactions;
        postprocess::apply_tran_type(&mut transactions, &params.address);

        let involved = postprocess::involvement_filter(transactions, params);

        let to_cache = TransactionResponse {
            transactions: involved.clone(),
        };
        if let Err(e) = self.cache.parse_and_save(&to_cache, &params.address, &self.registry).await {
            warn!(error = %e, "cache write failed");
            return Err(ServiceResponse::error_with_partial(
                ResponseCode::InternalError,
                AggregatorError::Internal(e.to_string()).client_message(),
                involved,
            ));
        }

        Ok(involved)
    }
}
