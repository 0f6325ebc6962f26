//! Adapter for a Blockscout-style per-chain REST explorer.
//!
//! Fetches normal transactions, token transfers, internal transactions, and
//! event logs concurrently, then — when an RPC URL is configured — tops up
//! log coverage with batched `eth_getBlockReceipts` calls sharded across a
//! bounded number of in-flight requests. The merged log set re-classifies
//! every normal transaction, upgrading plain transfers into approvals where
//! the classifier recognizes the event.

use async_trait::async_trait;
use chain_registry::ChainRegistry;
use event_classifier::{classify_many, EventType, LogEntry};
use numeric::{divide_by_decimals, normalize_numeric, parse_int64_or, parse_iso8601_to_unix};
use provider_core::{AggregatorError, Result, TransactionAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;
use tx_model::{CoinType, TranType, Transaction, TransactionQueryParams, TransactionResponse, TxState, TxType};

const RECEIPT_SHARD_SIZE: usize = 50;
const MAX_CONCURRENT_SHARDS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockscoutAdapterConfig {
    pub url: String,
    pub chain_name: String,
    pub request_page_size: u32,
    #[serde(default)]
    pub rpc_url: String,
    pub rpc_request_timeout: u64,
}

pub struct BlockscoutAdapter {
    client: reqwest::Client,
    config: BlockscoutAdapterConfig,
    registry: Arc<ChainRegistry>,
}

impl BlockscoutAdapter {
    pub fn new(client: reqwest::Client, config: BlockscoutAdapterConfig, registry: Arc<ChainRegistry>) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }

    fn chain_id(&self) -> i64 {
        self.registry.id_by_name(&self.config.chain_name).unwrap_or(0)
    }

    async fn fetch_items<T: for<'de> Deserialize<'de>>(&self, path: &str, address: &str) -> Result<Vec<T>> {
        let url = format!(
            "{}/addresses/{}/{}?limit={}",
            self.config.url.trim_end_matches('/'),
            address,
            path,
            self.config.request_page_size
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| AggregatorError::Transport {
                source: format!("blockscout:{path}"),
                error,
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamStatus {
                source: format!("blockscout:{path}"),
                message: format!("HTTP {}", response.status()),
            });
        }

        let page: BlockscoutPage<T> = response.json().await.map_err(|error| AggregatorError::Transport {
            source: format!("blockscout:{path}"),
            error,
        })?;

        Ok(page.items)
    }

    fn transform_normal(&self, raw: &BlockscoutTx) -> Transaction {
        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: if raw.status == "ok" { TxState::Success } else { TxState::Fail },
            height: raw.block,
            tx_index: raw.position.unwrap_or(0),
            hash: raw.hash.to_lowercase(),
            block_hash: raw.block_hash.clone().unwrap_or_default().to_lowercase(),
            from_address: raw.from.hash.to_lowercase(),
            to_address: raw.to.as_ref().map(|t| t.hash.to_lowercase()).unwrap_or_default(),
            token_address: String::new(),
            amount: divide_by_decimals(&balance, 18),
            balance,
            gas_used: normalize_numeric(&raw.gas_used).unwrap_or_default(),
            gas_limit: normalize_numeric(&raw.gas_limit).unwrap_or_default(),
            gas_price: normalize_numeric(&raw.gas_price).unwrap_or_default(),
            nonce: normalize_numeric(&raw.nonce.to_string()).unwrap_or_default(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Native,
            token_display_name: String::new(),
            decimals: 18,
            icon_url: String::new(),
            created_time: parse_iso8601_to_unix(&raw.timestamp),
            modified_time: parse_iso8601_to_unix(&raw.timestamp),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    fn transform_token_transfer(&self, raw: &BlockscoutTokenTransfer) -> Transaction {
        let decimals = parse_int64_or(&raw.token.decimals, 18);
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: TxState::Success,
            height: raw.block_number,
            tx_index: 0,
            hash: raw.transaction_hash.to_lowercase(),
            block_hash: String::new(),
            from_address: raw.from.hash.to_lowercase(),
            to_address: raw.to.hash.to_lowercase(),
            token_address: raw.token.address.to_lowercase(),
            amount: divide_by_decimals(&raw.total.value, decimals as u32),
            balance: raw.total.value.clone(),
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Token,
            token_display_name: raw.token.symbol.clone().unwrap_or_default(),
            decimals,
            icon_url: raw.token.icon_url.clone().unwrap_or_default(),
            created_time: parse_iso8601_to_unix(&raw.timestamp),
            modified_time: parse_iso8601_to_unix(&raw.timestamp),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    fn transform_internal(&self, raw: &BlockscoutInternalTx) -> Transaction {
        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: TxState::Success,
            height: raw.block_number,
            tx_index: 0,
            hash: raw.transaction_hash.to_lowercase(),
            block_hash: String::new(),
            from_address: raw.from.hash.to_lowercase(),
            to_address: raw.to.as_ref().map(|t| t.hash.to_lowercase()).unwrap_or_default(),
            token_address: String::new(),
            amount: divide_by_decimals(&balance, 18),
            balance,
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            tx_type: TxType::Internal,
            coin_type: CoinType::Internal,
            token_display_name: String::new(),
            decimals: 18,
            icon_url: String::new(),
            created_time: parse_iso8601_to_unix(&raw.timestamp),
            modified_time: parse_iso8601_to_unix(&raw.timestamp),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    /// Fetches receipts for every distinct block number via batched
    /// `eth_getBlockReceipts`, sharded into groups of `RECEIPT_SHARD_SIZE`
    /// with at most `MAX_CONCURRENT_SHARDS` shards in flight, bounded by a
    /// single overall deadline. A shard failure is logged and its logs are
    /// simply absent from the merged map — Blockscout's own `/logs`
    /// endpoint still covers the transaction.
    async fn fetch_receipt_logs(&self, block_numbers: &[i64]) -> HashMap<String, Vec<LogEntry>> {
        let merged: Arc<Mutex<HashMap<String, Vec<LogEntry>>>> = Arc::new(Mutex::new(HashMap::new()));

        if self.config.rpc_url.is_empty() || block_numbers.is_empty() {
            return Arc::try_unwrap(merged).unwrap().into_inner().unwrap();
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_SHARDS));
        let deadline = Duration::from_secs(self.config.rpc_request_timeout);
        let mut join_set: JoinSet<()> = JoinSet::new();

        for shard in block_numbers.chunks(RECEIPT_SHARD_SIZE) {
            let shard = shard.to_vec();
            let client = self.client.clone();
            let rpc_url = self.config.rpc_url.clone();
            let semaphore = Arc::clone(&semaphore);
            let merged = Arc::clone(&merged);

            join_set.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };

                let body: Vec<serde_json::Value> = shard
                    .iter()
                    .enumerate()
                    .map(|(idx, block)| {
                        serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": idx,
                            "method": "eth_getBlockReceipts",
                            "params": [format!("0x{:x}", block)],
                        })
                    })
                    .collect();

                let call = client.post(&rpc_url).json(&body).send();
                let result = tokio::time::timeout(deadline, call).await;
                drop(permit);

                let response = match result {
                    Ok(Ok(r)) => r,
                    Ok(Err(e)) => {
                        warn!(error = %e, "eth_getBlockReceipts shard request failed");
                        return;
                    }
                    Err(_) => {
                        warn!("eth_getBlockReceipts shard timed out");
                        return;
                    }
                };

                let batches: Vec<BatchReceiptEnvelope> = match response.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, "failed to decode eth_getBlockReceipts response");
                        return;
                    }
                };

                let mut guard = merged.lock().unwrap();
                for batch in batches {
                    for receipt in batch.result.unwrap_or_default() {
                        for (idx, log) in receipt.logs.into_iter().enumerate() {
                            guard.entry(receipt.transaction_hash.to_lowercase()).or_default().push(LogEntry {
                                address: log.address,
                                topics: log.topics,
                                data: log.data,
                                log_index: log.log_index.unwrap_or(idx as u64),
                            });
                        }
                    }
                }
            });
        }

        while join_set.join_next().await.is_some() {}

        Arc::try_unwrap(merged).unwrap().into_inner().unwrap()
    }
}

#[async_trait]
impl TransactionAdapter for BlockscoutAdapter {
    fn name(&self) -> &str {
        "blockscout"
    }

    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse> {
        let (normal_raw, token_raw, internal_raw, log_raw) = tokio::try_join!(
            self.fetch_items::<BlockscoutTx>("transactions", &query.address),
            self.fetch_items::<BlockscoutTokenTransfer>("token-transfers", &query.address),
            self.fetch_items::<BlockscoutInternalTx>("internal-transactions", &query.address),
            self.fetch_items::<BlockscoutLog>("logs", &query.address),
        )?;

        let mut logs_by_hash: HashMap<String, Vec<LogEntry>> = HashMap::new();
        for (idx, log) in log_raw.iter().enumerate() {
            logs_by_hash
                .entry(log.transaction_hash.to_lowercase())
                .or_default()
                .push(LogEntry {
                    address: log.address.hash.clone(),
                    topics: log.topics.clone(),
                    data: log.data.clone(),
                    log_index: log.index.unwrap_or(idx as u64),
                });
        }

        let mut native_txs: Vec<Transaction> = normal_raw.iter().map(|r| self.transform_normal(r)).collect();

        if !self.config.rpc_url.is_empty() && !native_txs.is_empty() {
            let blocks: Vec<i64> = {
                let mut set: Vec<i64> = native_txs.iter().map(|t| t.height).collect();
                set.sort_unstable();
                set.dedup();
                set
            };
            let rpc_logs = self.fetch_receipt_logs(&blocks).await;
            for (hash, mut logs) in rpc_logs {
                logs_by_hash.entry(hash).or_default().append(&mut logs);
            }
        }

        for tx in &mut native_txs {
            if let Some(logs) = logs_by_hash.get(&tx.hash) {
                let classification = classify_many(logs);
                if classification.event_type == EventType::Approval {
                    tx.tx_type = TxType::Approve;
                    tx.token_address = classification.token_address;
                    tx.approve_show = classification.approve_amount_hex;
                }
            }
        }

        let native_by_hash: HashMap<&str, &Transaction> = native_txs.iter().map(|t| (t.hash.as_str(), t)).collect();

        let mut token_txs: Vec<Transaction> = token_raw.iter().map(|r| self.transform_token_transfer(r)).collect();
        for tx in &mut token_txs {
            if let Some(native) = native_by_hash.get(tx.hash.as_str()) {
                tx.gas_used = native.gas_used.clone();
                tx.gas_limit = native.gas_limit.clone();
                tx.gas_price = native.gas_price.clone();
                tx.nonce = native.nonce.clone();
                tx.state = native.state;
                tx.block_hash = native.block_hash.clone();
            }
        }

        let internal_txs: Vec<Transaction> = internal_raw.iter().map(|r| self.transform_internal(r)).collect();

        let mut all = native_txs;
        all.extend(token_txs);
        all.extend(internal_txs);
        Ok(TransactionResponse { transactions: all })
    }
}

#[derive(Debug, Deserialize)]
struct BlockscoutPage<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct BlockscoutAddressRef {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutTx {
    hash: String,
    block: i64,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    position: Option<i64>,
    from: BlockscoutAddressRef,
    to: Option<BlockscoutAddressRef>,
    #[serde(default)]
    value: String,
    #[serde(default)]
    gas_used: String,
    #[serde(default)]
    gas_limit: String,
    #[serde(default)]
    gas_price: String,
    #[serde(default)]
    nonce: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutTokenMeta {
    address: String,
    #[serde(default)]
    decimals: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockscoutTotal {
    value: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutTokenTransfer {
    transaction_hash: String,
    block_number: i64,
    from: BlockscoutAddressRef,
    to: BlockscoutAddressRef,
    token: BlockscoutTokenMeta,
    total: BlockscoutTotal,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutInternalTx {
    transaction_hash: String,
    block_number: i64,
    from: BlockscoutAddressRef,
    to: Option<BlockscoutAddressRef>,
    #[serde(default)]
    value: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutLog {
    transaction_hash: String,
    address: BlockscoutAddressRef,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    #[serde(default)]
    index: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BatchReceiptEnvelope {
    result: Option<Vec<BlockReceipt>>,
}

#[derive(Debug, Deserialize)]
struct BlockReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(default)]
    logs: Vec<ReceiptLog>,
}

#[derive(Debug, Deserialize)]
struct ReceiptLog {
    address: String,
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    #[serde(rename = "logIndex", default)]
    log_index: Option<u64>,
}
