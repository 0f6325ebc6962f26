//! Fans a single address query out to every registered adapter
//! concurrently, merges their results, and tolerates partial failure.
//!
//! No deduplication happens at this layer — overlapping records from two
//! adapters covering the same chain are expected to be prevented by
//! `providers.chain_providers` routing each chain to exactly one adapter,
//! enforced here via [`ChainScopedAdapter`].

use async_trait::async_trait;
use provider_core::{AggregatorError, Result, TransactionAdapter};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;
use tx_model::{TransactionQueryParams, TransactionResponse};

/// Restricts an adapter to a configured set of chain names, per
/// `providers.chain_providers` routing. Chains outside `allowed` are
/// dropped from the query before it reaches the inner adapter; if nothing
/// in the query routes here, the inner adapter is skipped entirely.
pub struct ChainScopedAdapter {
    inner: Arc<dyn TransactionAdapter>,
    allowed: BTreeSet<String>,
}

impl ChainScopedAdapter {
    pub fn new(inner: Arc<dyn TransactionAdapter>, allowed: BTreeSet<String>) -> Self {
        Self { inner, allowed }
    }
}

#[async_trait]
impl TransactionAdapter for ChainScopedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse> {
        let scoped_chain_names = if query.chain_names.is_empty() {
            self.allowed.clone()
        } else {
            query.chain_names.intersection(&self.allowed).cloned().collect()
        };

        if scoped_chain_names.is_empty() {
            return Ok(TransactionResponse::default());
        }

        let scoped_query = TransactionQueryParams {
            chain_names: scoped_chain_names,
            ..query.clone()
        };
        self.inner.get_transactions(&scoped_query).await
    }
}

pub struct MultiProvider {
    adapters: Vec<Arc<dyn TransactionAdapter>>,
    deadline: Duration,
}

impl MultiProvider {
    pub fn new(adapters: Vec<Arc<dyn TransactionAdapter>>, deadline: Duration) -> Self {
        Self { adapters, deadline }
    }
}

#[async_trait]
impl TransactionAdapter for MultiProvider {
    fn name(&self) -> &str {
        "multi-provider"
    }

    /// Spawns one task per adapter under a single overall deadline. If the
    /// deadline elapses before the fan-out drains, still-running tasks are
    /// aborted (dropping the `JoinSet`) and every partial result so far is
    /// discarded — the upstream path is all-or-nothing. Otherwise, returns
    /// the concatenation of every adapter that succeeded; if none did,
    /// returns the last error encountered.
    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse> {
        if self.adapters.is_empty() {
            return Ok(TransactionResponse::default());
        }

        let mut join_set: JoinSet<(String, Result<TransactionResponse>)> = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let query = query.clone();
            join_set.spawn(async move {
                let name = adapter.name().to_string();
                let result = adapter.get_transactions(&query).await;
                (name, result)
            });
        }

        let drain = async {
            let mut merged = Vec::new();
            let mut last_error: Option<AggregatorError> = None;
            let mut any_success = false;

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((_name, Ok(response))) => {
                        any_success = true;
                        merged.extend(response.transactions);
                    }
                    Ok((name, Err(error))) => {
                        warn!(adapter = %name, error = %error, "adapter failed");
                        last_error = Some(error);
                    }
                    Err(join_error) => {
                        last_error = Some(AggregatorError::Internal(join_error.to_string()));
                    }
                }
            }

            (any_success, merged, last_error)
        };

        match tokio::time::timeout(self.deadline, drain).await {
            Ok((true, merged, _)) => Ok(TransactionResponse { transactions: merged }),
            Ok((false, _, Some(error))) => Err(error),
            Ok((false, _, None)) => Ok(TransactionResponse::default()),
            Err(_) => Err(AggregatorError::DeadlineExceeded),
        }
    }
}
