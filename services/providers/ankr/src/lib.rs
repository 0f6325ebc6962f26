//! Adapter for Ankr's multichain JSON-RPC transaction history API.
//!
//! Issues two concurrent `eth_`-style JSON-RPC calls per request
//! (`ankr_getTransactionsByAddress`, `ankr_getTokenTransfers`), normalizes
//! both into canonical `Transaction` records, then patches every token
//! transfer with gas/nonce/state from the native transaction sharing its
//! hash.

use async_trait::async_trait;
use chain_registry::ChainRegistry;
use event_classifier::{classify_many, EventType, LogEntry};
use numeric::{divide_by_decimals, multiply_by_decimals, normalize_numeric, parse_int64_or};
use provider_core::{AggregatorError, Result, TransactionAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tx_model::{CoinType, TranType, Transaction, TransactionQueryParams, TransactionResponse, TxState, TxType};

/// Static configuration for one Ankr adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnkrAdapterConfig {
    pub api_key: String,
    pub url: String,
    pub request_page_size: u32,
    pub include_logs: bool,
    pub desc_order: bool,
}

impl Default for AnkrAdapterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: "https://rpc.ankr.com/multichain".to_string(),
            request_page_size: 100,
            include_logs: true,
            desc_order: true,
        }
    }
}

pub struct AnkrAdapter {
    client: reqwest::Client,
    config: AnkrAdapterConfig,
    registry: Arc<ChainRegistry>,
}

impl AnkrAdapter {
    pub fn new(client: reqwest::Client, config: AnkrAdapterConfig, registry: Arc<ChainRegistry>) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }

    fn endpoint(&self) -> String {
        if self.config.api_key.is_empty() {
            self.config.url.clone()
        } else {
            format!("{}/{}", self.config.url.trim_end_matches('/'), self.config.api_key)
        }
    }

    fn rpc_body(&self, method: &str, blockchains: &[String], address: &str) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {
                "blockchain": blockchains,
                "includeLogs": self.config.include_logs,
                "descOrder": self.config.desc_order,
                "pageSize": self.config.request_page_size,
                "address": address,
            },
            "id": 1,
        })
    }

    async fn call_rpc(&self, method: &str, blockchains: &[String], address: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .json(&self.rpc_body(method, blockchains, address))
            .send()
            .await
            .map_err(|error| AggregatorError::Transport {
                source: "ankr".to_string(),
                error,
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamStatus {
                source: "ankr".to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|error| AggregatorError::Transport {
            source: "ankr".to_string(),
            error,
        })?;

        if let Some(err) = body.get("error") {
            return Err(AggregatorError::UpstreamStatus {
                source: "ankr".to_string(),
                message: err.to_string(),
            });
        }

        Ok(body)
    }

    fn chain_id_for(&self, blockchain: &str) -> i64 {
        self.registry.id_by_ankr_name(blockchain).unwrap_or(0)
    }

    fn transform_normal_tx(&self, raw: &AnkrTransaction) -> Transaction {
        let classification = classify_many(
            &raw.logs
                .iter()
                .enumerate()
                .map(|(idx, log)| LogEntry {
                    address: log.address.clone(),
                    topics: log.topics.clone(),
                    data: log.data.clone(),
                    log_index: log.log_index.unwrap_or(idx as u64),
                })
                .collect::<Vec<_>>(),
        );

        let (tx_type, token_address, approve_show) = match classification.event_type {
            EventType::Approval => (TxType::Approve, classification.token_address, classification.approve_amount_hex),
            _ => (TxType::Unknown, String::new(), String::new()),
        };

        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        let chain_id = self.chain_id_for(&raw.blockchain);
        let decimals = 18;

        Transaction {
            chain_id,
            server_chain_name: String::new(),
            state: if raw.status == "1" { TxState::Success } else { TxState::Fail },
            height: parse_int64_or(&raw.block_number, 0),
            tx_index: parse_int64_or(&raw.transaction_index, 0),
            hash: raw.hash.to_lowercase(),
            block_hash: raw.block_hash.to_lowercase(),
            from_address: raw.from.to_lowercase(),
            to_address: raw.to.to_lowercase(),
            token_address,
            amount: divide_by_decimals(&balance, decimals as u32),
            balance,
            gas_used: normalize_numeric(&raw.gas_used).unwrap_or_default(),
            gas_limit: normalize_numeric(&raw.gas_limit).unwrap_or_default(),
            gas_price: normalize_numeric(&raw.gas_price).unwrap_or_default(),
            nonce: normalize_numeric(&raw.nonce).unwrap_or_default(),
            tx_type,
            coin_type: CoinType::Native,
            token_display_name: String::new(),
            decimals,
            icon_url: String::new(),
            created_time: parse_int64_or(&raw.timestamp, 0),
            modified_time: parse_int64_or(&raw.timestamp, 0),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show,
        }
    }

    fn transform_token_transfer(&self, raw: &AnkrTokenTransfer) -> Transaction {
        let chain_id = self.chain_id_for(&raw.blockchain);
        let decimals = raw.token_decimals;
        let balance = multiply_by_decimals(&raw.value, decimals as u32).unwrap_or_else(|_| "0".to_string());

        Transaction {
            chain_id,
            server_chain_name: String::new(),
            state: TxState::Success,
            height: parse_int64_or(&raw.block_height, 0),
            tx_index: 0,
            hash: raw.transaction_hash.to_lowercase(),
            block_hash: String::new(),
            from_address: raw.from_address.to_lowercase(),
            to_address: raw.to_address.to_lowercase(),
            token_address: raw.contract_address.to_lowercase(),
            amount: raw.value.clone(),
            balance,
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Token,
            token_display_name: raw.token_symbol.clone(),
            decimals,
            icon_url: raw.thumbnail.clone().unwrap_or_default(),
            created_time: parse_int64_or(&raw.timestamp, 0),
            modified_time: parse_int64_or(&raw.timestamp, 0),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }
}

#[async_trait]
impl TransactionAdapter for AnkrAdapter {
    fn name(&self) -> &str {
        "ankr"
    }

    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse> {
        let blockchains = self.registry.resolve_ankr(&query.chain_names.iter().cloned().collect::<Vec<_>>());

        let (normal_result, token_result) = tokio::join!(
            self.call_rpc("ankr_getTransactionsByAddress", &blockchains, &query.address),
            self.call_rpc("ankr_getTokenTransfers", &blockchains, &query.address),
        );

        let normal_body = normal_result?;
        let token_body = token_result?;

        let normal_raw: Vec<AnkrTransaction> = serde_json::from_value(
            normal_body
                .get("result")
                .and_then(|r| r.get("transactions"))
                .cloned()
                .unwrap_or(serde_json::Value::Array(vec![])),
        )
        .map_err(|error| AggregatorError::Decode {
            source: "ankr:transactions".to_string(),
            error,
        })?;

        let token_raw: Vec<AnkrTokenTransfer> = serde_json::from_value(
            token_body
                .get("result")
                .and_then(|r| r.get("transfers"))
                .cloned()
                .unwrap_or(serde_json::Value::Array(vec![])),
        )
        .map_err(|error| AggregatorError::Decode {
            source: "ankr:transfers".to_string(),
            error,
        })?;

        let native_txs: Vec<Transaction> = normal_raw.iter().map(|r| self.transform_normal_tx(r)).collect();
        let native_by_hash: HashMap<&str, &Transaction> =
            native_txs.iter().map(|t| (t.hash.as_str(), t)).collect();

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

        let mut all = native_txs;
        all.extend(token_txs);
        Ok(TransactionResponse { transactions: all })
    }
}

#[derive(Debug, Deserialize)]
struct AnkrTransaction {
    blockchain: String,
    hash: String,
    #[serde(rename = "blockHash", default)]
    block_hash: String,
    #[serde(rename = "blockNumber", default)]
    block_number: String,
    #[serde(rename = "transactionIndex", default)]
    transaction_index: String,
    from: String,
    to: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    value: String,
    #[serde(rename = "gasUsed", default)]
    gas_used: String,
    #[serde(rename = "gasLimit", default)]
    gas_limit: String,
    #[serde(rename = "gasPrice", default)]
    gas_price: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    logs: Vec<AnkrLog>,
}

#[derive(Debug, Deserialize)]
struct AnkrLog {
    address: String,
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    #[serde(rename = "logIndex", default)]
    log_index: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AnkrTokenTransfer {
    blockchain: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "blockHeight", default)]
    block_height: String,
    #[serde(rename = "fromAddress")]
    from_address: String,
    #[serde(rename = "toAddress")]
    to_address: String,
    #[serde(rename = "contractAddress")]
    contract_address: String,
    value: String,
    #[serde(rename = "tokenDecimals", default)]
    token_decimals: i64,
    #[serde(rename = "tokenSymbol", default)]
    token_symbol: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_registry::ChainEntry;

    fn test_registry() -> Arc<ChainRegistry> {
        Arc::new(ChainRegistry::new(vec![ChainEntry {
            name: "ETH".into(),
            chain_id: 1,
            native_symbol: "ETH".into(),
            ankr_name: "eth".into(),
        }]))
    }

    fn adapter() -> AnkrAdapter {
        AnkrAdapter::new(reqwest::Client::new(), AnkrAdapterConfig::default(), test_registry())
    }

    #[test]
    fn transforms_normal_tx_with_success_status() {
        let a = adapter();
        let raw = AnkrTransaction {
            blockchain: "eth".into(),
            hash: "0xABC".into(),
            block_hash: "0xBLK".into(),
            block_number: "100".into(),
            transaction_index: "2".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            status: "1".into(),
            value: "0x0".into(),
            gas_used: "21000".into(),
            gas_limit: "21000".into(),
            gas_price: "1000000000".into(),
            nonce: "5".into(),
            timestamp: "1700000000".into(),
            logs: vec![],
        };
        let tx = a.transform_normal_tx(&raw);
        assert_eq!(tx.hash, "0xabc");
        assert_eq!(tx.state, TxState::Success);
        assert_eq!(tx.chain_id, 1);
        assert_eq!(tx.coin_type, CoinType::Native);
    }

    #[test]
    fn transforms_normal_tx_with_failed_status() {
        let a = adapter();
        let mut raw_status = "0".to_string();
        let raw = AnkrTransaction {
            blockchain: "eth".into(),
            hash: "0xDEF".into(),
            block_hash: String::new(),
            block_number: "0".into(),
            transaction_index: "0".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            status: std::mem::take(&mut raw_status),
            value: "0x0".into(),
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            timestamp: "0".into(),
            logs: vec![],
        };
        let tx = a.transform_normal_tx(&raw);
        assert_eq!(tx.state, TxState::Fail);
    }

    #[test]
    fn detects_approval_from_embedded_log() {
        let a = adapter();
        let raw = AnkrTransaction {
            blockchain: "eth".into(),
            hash: "0x1".into(),
            block_hash: String::new(),
            block_number: "1".into(),
            transaction_index: "0".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            status: "1".into(),
            value: "0x0".into(),
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            timestamp: "0".into(),
            logs: vec![AnkrLog {
                address: "0xTOKEN".into(),
                topics: vec![event_classifier::APPROVAL_SIGNATURE.to_string()],
                data: "0x01".into(),
                log_index: Some(0),
            }],
        };
        let tx = a.transform_normal_tx(&raw);
        assert_eq!(tx.tx_type, TxType::Approve);
        assert_eq!(tx.approve_show, "0x01");
        assert_eq!(tx.token_address, "0xtoken");
    }

    #[test]
    fn token_transfer_scales_balance_by_decimals() {
        let a = adapter();
        let raw = AnkrTokenTransfer {
            blockchain: "eth".into(),
            transaction_hash: "0xAAA".into(),
            block_height: "10".into(),
            from_address: "0xFROM".into(),
            to_address: "0xTO".into(),
            contract_address: "0xTOKEN".into(),
            value: "1.5".into(),
            token_decimals: 18,
            token_symbol: "USDC".into(),
            thumbnail: None,
            timestamp: "0".into(),
        };
        let tx = a.transform_token_transfer(&raw);
        assert_eq!(tx.balance, "1500000000000000000");
        assert_eq!(tx.coin_type, CoinType::Token);
        assert_eq!(tx.state, TxState::Success);
    }

    #[tokio::test]
    async fn patches_token_transfer_with_matching_native_gas_and_state() {
        let a = adapter();
        let native = AnkrTransaction {
            blockchain: "eth".into(),
            hash: "0xSHARED".into(),
            block_hash: "0xBLOCK".into(),
            block_number: "5".into(),
            transaction_index: "0".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            status: "1".into(),
            value: "0x0".into(),
            gas_used: "21000".into(),
            gas_limit: "21000".into(),
            gas_price: "1000000000".into(),
            nonce: "7".into(),
            timestamp: "0".into(),
            logs: vec![],
        };
        let token = AnkrTokenTransfer {
            blockchain: "eth".into(),
            transaction_hash: "0xSHARED".into(),
            block_height: "5".into(),
            from_address: "0xFROM".into(),
            to_address: "0xTO".into(),
            contract_address: "0xTOKEN".into(),
            value: "1".into(),
            token_decimals: 6,
            token_symbol: "USDC".into(),
            thumbnail: None,
            timestamp: "0".into(),
        };

        let native_tx = a.transform_normal_tx(&native);
        let mut token_tx = a.transform_token_transfer(&token);

        assert_eq!(token_tx.gas_used, "");
        token_tx.gas_used = native_tx.gas_used.clone();
        token_tx.nonce = native_tx.nonce.clone();
        assert_eq!(token_tx.gas_used, "21000");
        assert_eq!(token_tx.nonce, "7");
    }
}
