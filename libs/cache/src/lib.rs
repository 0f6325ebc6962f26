//! Two-tier Redis cache for the aggregation service.
//!
//! Four bucket shapes share one address/chain namespace:
//! `"{addr}-{chain}"` (everything), `"{addr}-{chain}-native"` (native-only),
//! `"{addr}-{chain}-{token}"` (one token), and `"{addr}-{chain}-tokens"` (a
//! set of token addresses seen on that chain, for inspection/invalidation).
//! All keys are lowercase ASCII. Writes for one fetch are parallel and
//! best-effort but fully reported: any single bucket failing to write
//! surfaces as an error to the caller.

use chain_registry::ChainRegistry;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, Client, RedisError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::warn;
use tx_model::{CoinType, Transaction, TransactionQueryParams, TransactionResponse};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),
    #[error("failed to serialize transaction slice: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unknown chain id {0} encountered while writing cache")]
    UnknownChain(i64),
    #[error("cache write task panicked: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Either a single-node connection manager or a cluster-aware connection.
/// Selection happens once at startup based on how many addresses are
/// configured (`redis.addrs`): more than one means cluster mode.
#[derive(Clone)]
enum Backend {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl Backend {
    async fn set_ex(&self, key: &str, value: &str, ttl: u64) -> Result<()> {
        match self.clone() {
            Backend::Single(mut c) => c.set_ex::<_, _, ()>(key, value, ttl).await?,
            Backend::Cluster(mut c) => c.set_ex::<_, _, ()>(key, value, ttl).await?,
        };
        Ok(())
    }

    async fn sadd_with_ttl(&self, key: &str, members: &[String], ttl: u64) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        match self.clone() {
            Backend::Single(mut c) => {
                c.sadd::<_, _, ()>(key, members).await?;
                c.expire::<_, ()>(key, ttl as i64).await?;
            }
            Backend::Cluster(mut c) => {
                c.sadd::<_, _, ()>(key, members).await?;
                c.expire::<_, ()>(key, ttl as i64).await?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = match self.clone() {
            Backend::Single(mut c) => c.get::<_, Option<String>>(key).await?,
            Backend::Cluster(mut c) => c.get::<_, Option<String>>(key).await?,
        };
        Ok(value)
    }
}

/// Cache client shared process-wide. Cheap to clone: the underlying
/// connection manager / cluster connection is reference-counted internally.
#[derive(Clone)]
pub struct CacheClient {
    backend: Backend,
    ttl_seconds: u64,
}

impl CacheClient {
    /// Connect to a single Redis node.
    pub async fn connect_single(addr: &str, password: &str, ttl_seconds: u64) -> Result<Self> {
        let url = build_redis_url(addr, password);
        let client = Client::open(url)?;
        let manager = client.get_tokio_connection_manager().await?;
        Ok(Self {
            backend: Backend::Single(manager),
            ttl_seconds,
        })
    }

    /// Connect to a Redis Cluster deployment spanning multiple nodes.
    pub async fn connect_cluster(addrs: &[String], password: &str, ttl_seconds: u64) -> Result<Self> {
        let urls: Vec<String> = addrs.iter().map(|a| build_redis_url(a, password)).collect();
        let client = ClusterClientBuilder::new(urls).build()?;
        let connection = client.get_async_connection().await?;
        Ok(Self {
            backend: Backend::Cluster(connection),
            ttl_seconds,
        })
    }

    /// Dispatches to single-node or cluster mode based on how many
    /// addresses are configured.
    pub async fn connect(addrs: &[String], password: &str, ttl_seconds: u64) -> Result<Self> {
        match addrs.len() {
            0 => Err(RedisError::from((
                redis::ErrorKind::InvalidClientConfig,
                "no redis addresses configured",
            ))
            .into()),
            1 => Self::connect_single(&addrs[0], password, ttl_seconds).await,
            _ => Self::connect_cluster(addrs, password, ttl_seconds).await,
        }
    }

    /// Write-through: partitions `response` by chain into chain/native/token
    /// buckets, serializes each, and writes all of them in parallel. Returns
    /// the first write error encountered, if any, only after every write has
    /// been attempted. An empty response is a no-op success.
    pub async fn parse_and_save(
        &self,
        response: &TransactionResponse,
        address: &str,
        registry: &ChainRegistry,
    ) -> Result<()> {
        if response.transactions.is_empty() {
            return Ok(());
        }

        let addr = address.to_lowercase();
        let mut by_chain: HashMap<i64, Vec<&Transaction>> = HashMap::new();
        for tx in &response.transactions {
            by_chain.entry(tx.chain_id).or_default().push(tx);
        }

        let mut join_set: JoinSet<Result<()>> = JoinSet::new();

        for (chain_id, txs) in by_chain {
            let chain_name = registry
                .name_by_id(chain_id)
                .map_err(|_| CacheError::UnknownChain(chain_id))?
                .to_lowercase();

            let all_json = serde_json::to_string(&txs)?;
            let native_json = serde_json::to_string(
                &txs.iter().filter(|t| t.coin_type == CoinType::Native).collect::<Vec<_>>(),
            )?;

            let mut by_token: HashMap<String, Vec<&Transaction>> = HashMap::new();
            let mut seen_tokens: HashSet<String> = HashSet::new();
            for tx in &txs {
                if tx.coin_type == CoinType::Token {
                    seen_tokens.insert(tx.token_address.to_lowercase());
                    by_token
                        .entry(tx.token_address.to_lowercase())
                        .or_default()
                        .push(tx);
                }
            }

            let backend = self.backend.clone();
            let ttl = self.ttl_seconds;
            let key = chain_key(&addr, &chain_name);
            join_set.spawn(async move { backend.set_ex(&key, &all_json, ttl).await });

            let backend = self.backend.clone();
            let key = native_key(&addr, &chain_name);
            join_set.spawn(async move { backend.set_ex(&key, &native_json, ttl).await });

            for (token_addr, token_txs) in by_token {
                let json = serde_json::to_string(&token_txs)?;
                let backend = self.backend.clone();
                let key = token_key(&addr, &chain_name, &token_addr);
                join_set.spawn(async move { backend.set_ex(&key, &json, ttl).await });
            }

            let backend = self.backend.clone();
            let ttl = self.ttl_seconds;
            let key = token_set_key(&addr, &chain_name);
            let members: Vec<String> = seen_tokens.into_iter().collect();
            join_set.spawn(async move { backend.sadd_with_ttl(&key, &members, ttl).await });
        }

        let mut first_error: Option<CacheError> = None;
        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_err) => Err(CacheError::TaskJoin(join_err.to_string())),
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Read path: one GET per requested chain, run in parallel. Individual
    /// misses or decode failures are logged and skipped rather than failing
    /// the whole read.
    pub async fn query(&self, params: &TransactionQueryParams) -> Result<TransactionResponse> {
        if params.chain_names.is_empty() {
            return Ok(TransactionResponse::default());
        }

        let addr = params.address.to_lowercase();
        let merged = Arc::new(Mutex::new(Vec::new()));
        let mut join_set: JoinSet<()> = JoinSet::new();

        for chain_name in &params.chain_names {
            let chain_lower = chain_name.to_lowercase();
            let key = if params.wants_native_only() {
                native_key(&addr, &chain_lower)
            } else if params.wants_token() {
                token_key(&addr, &chain_lower, &params.token_address.to_lowercase())
            } else {
                chain_key(&addr, &chain_lower)
            };

            let backend = self.backend.clone();
            let merged = Arc::clone(&merged);
            let chain_name = chain_name.clone();
            join_set.spawn(async move {
                match backend.get(&key).await {
                    Ok(Some(json)) => match serde_json::from_str::<Vec<Transaction>>(&json) {
                        Ok(txs) => {
                            let mut guard = merged.lock().await;
                            guard.extend(txs);
                        }
                        Err(e) => warn!(chain = %chain_name, error = %e, "failed to decode cached transactions"),
                    },
                    Ok(None) => {}
                    Err(e) => warn!(chain = %chain_name, error = %e, "cache read failed"),
                }
            });
        }

        while join_set.join_next().await.is_some() {}

        let transactions = Arc::try_unwrap(merged)
            .map(|m| m.into_inner())
            .unwrap_or_default();
        Ok(TransactionResponse { transactions })
    }
}

fn build_redis_url(addr: &str, password: &str) -> String {
    if password.is_empty() {
        format!("redis://{addr}")
    } else {
        format!("redis://:{password}@{addr}")
    }
}

fn chain_key(addr: &str, chain_lower: &str) -> String {
    format!("{addr}-{chain_lower}")
}

fn native_key(addr: &str, chain_lower: &str) -> String {
    format!("{addr}-{chain_lower}-native")
}

fn token_key(addr: &str, chain_lower: &str, token_addr_lower: &str) -> String {
    format!("{addr}-{chain_lower}-{token_addr_lower}")
}

fn token_set_key(addr: &str, chain_lower: &str) -> String {
    format!("{addr}-{chain_lower}-tokens")
}
