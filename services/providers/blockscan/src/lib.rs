//! Adapter for an Etherscan/BscScan-style per-chain REST explorer.
//!
//! Issues three concurrent `?module=account&action=...` GETs (`txlist`,
//! `tokentx`, `txlistinternal`). Each response carries its own
//! `status`/`message` pair independent of the HTTP status line; a
//! `status != "1"` is a fatal adapter error surfacing the upstream
//! `message`.

use async_trait::async_trait;
use chain_registry::ChainRegistry;
use numeric::{divide_by_decimals, normalize_numeric, parse_int64_or};
use provider_core::{AggregatorError, Result, TransactionAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tx_model::{CoinType, TranType, Transaction, TransactionQueryParams, TransactionResponse, TxState, TxType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockscanAdapterConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    pub chain_name: String,
    pub request_page_size: u32,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub startblock: u64,
    #[serde(default = "default_endblock")]
    pub endblock: u64,
}

fn default_sort() -> String {
    "desc".to_string()
}

fn default_page() -> u32 {
    1
}

fn default_endblock() -> u64 {
    99_999_999
}

pub struct BlockscanAdapter {
    client: reqwest::Client,
    config: BlockscanAdapterConfig,
    registry: Arc<ChainRegistry>,
}

impl BlockscanAdapter {
    pub fn new(client: reqwest::Client, config: BlockscanAdapterConfig, registry: Arc<ChainRegistry>) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }

    fn chain_id(&self) -> i64 {
        self.registry.id_by_name(&self.config.chain_name).unwrap_or(0)
    }

    async fn fetch_action<T: for<'de> Deserialize<'de>>(&self, action: &str, address: &str) -> Result<Vec<T>> {
        let response = self
            .client
            .get(&self.config.url)
            .query(&[
                ("module", "account"),
                ("action", action),
                ("address", address),
                ("startblock", &self.config.startblock.to_string()),
                ("endblock", &self.config.endblock.to_string()),
                ("page", &self.config.page.to_string()),
                ("offset", &self.config.request_page_size.to_string()),
                ("sort", &self.config.sort),
                ("apikey", &self.config.api_key),
            ])
            .send()
            .await
            .map_err(|error| AggregatorError::Transport {
                source: format!("blockscan:{action}"),
                error,
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamStatus {
                source: format!("blockscan:{action}"),
                message: format!("HTTP {}", response.status()),
            });
        }

        let envelope: BlockscanEnvelope<T> = response.json().await.map_err(|error| AggregatorError::Transport {
            source: format!("blockscan:{action}"),
            error,
        })?;

        if envelope.status != "1" {
            return Err(AggregatorError::UpstreamStatus {
                source: format!("blockscan:{action}"),
                message: envelope.message,
            });
        }

        Ok(envelope.result)
    }

    fn transform_normal(&self, raw: &BlockscanTx) -> Transaction {
        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        let success = raw.is_error == "0" && raw.txreceipt_status == "1";
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: if success { TxState::Success } else { TxState::Fail },
            height: parse_int64_or(&raw.block_number, 0),
            tx_index: parse_int64_or(&raw.transaction_index, 0),
            hash: raw.hash.to_lowercase(),
            block_hash: raw.block_hash.to_lowercase(),
            from_address: raw.from.to_lowercase(),
            to_address: raw.to.to_lowercase(),
            token_address: String::new(),
            amount: divide_by_decimals(&balance, 18),
            balance,
            gas_used: normalize_numeric(&raw.gas_used).unwrap_or_default(),
            gas_limit: normalize_numeric(&raw.gas).unwrap_or_default(),
            gas_price: normalize_numeric(&raw.gas_price).unwrap_or_default(),
            nonce: normalize_numeric(&raw.nonce).unwrap_or_default(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Native,
            token_display_name: String::new(),
            decimals: 18,
            icon_url: String::new(),
            created_time: parse_int64_or(&raw.time_stamp, 0),
            modified_time: parse_int64_or(&raw.time_stamp, 0),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    fn transform_token(&self, raw: &BlockscanTokenTx) -> Transaction {
        let decimals = parse_int64_or(&raw.token_decimal, 18);
        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: TxState::Success,
            height: parse_int64_or(&raw.block_number, 0),
            tx_index: parse_int64_or(&raw.transaction_index, 0),
            hash: raw.hash.to_lowercase(),
            block_hash: raw.block_hash.to_lowercase(),
            from_address: raw.from.to_lowercase(),
            to_address: raw.to.to_lowercase(),
            token_address: raw.contract_address.to_lowercase(),
            amount: divide_by_decimals(&balance, decimals as u32),
            balance,
            gas_used: normalize_numeric(&raw.gas_used).unwrap_or_default(),
            gas_limit: normalize_numeric(&raw.gas).unwrap_or_default(),
            gas_price: normalize_numeric(&raw.gas_price).unwrap_or_default(),
            nonce: normalize_numeric(&raw.nonce).unwrap_or_default(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Token,
            token_display_name: raw.token_symbol.clone(),
            decimals,
            icon_url: String::new(),
            created_time: parse_int64_or(&raw.time_stamp, 0),
            modified_time: parse_int64_or(&raw.time_stamp, 0),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    fn transform_internal(&self, raw: &BlockscanInternalTx) -> Transaction {
        let balance = normalize_numeric(&raw.value).unwrap_or_else(|_| "0".to_string());
        let success = raw.is_error == "0";
        Transaction {
            chain_id: self.chain_id(),
            server_chain_name: String::new(),
            state: if success { TxState::Success } else { TxState::Fail },
            height: parse_int64_or(&raw.block_number, 0),
            tx_index: 0,
            hash: raw.hash.to_lowercase(),
            block_hash: String::new(),
            from_address: raw.from.to_lowercase(),
            to_address: raw.to.to_lowercase(),
            token_address: String::new(),
            amount: divide_by_decimals(&balance, 18),
            balance,
            gas_used: normalize_numeric(&raw.gas_used).unwrap_or_default(),
            gas_limit: normalize_numeric(&raw.gas).unwrap_or_default(),
            gas_price: String::new(),
            nonce: String::new(),
            tx_type: TxType::Internal,
            coin_type: CoinType::Internal,
            token_display_name: String::new(),
            decimals: 18,
            icon_url: String::new(),
            created_time: parse_int64_or(&raw.time_stamp, 0),
            modified_time: parse_int64_or(&raw.time_stamp, 0),
            // Set against the queried address in the post-processing pipeline.
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }
}

#[async_trait]
impl TransactionAdapter for BlockscanAdapter {
    fn name(&self) -> &str {
        "blockscan"
    }

    async fn get_transactions(&self, query: &TransactionQueryParams) -> Result<TransactionResponse> {
        let (normal_raw, token_raw, internal_raw) = tokio::try_join!(
            self.fetch_action::<BlockscanTx>("txlist", &query.address),
            self.fetch_action::<BlockscanTokenTx>("tokentx", &query.address),
            self.fetch_action::<BlockscanInternalTx>("txlistinternal", &query.address),
        )?;

        let native_txs: Vec<Transaction> = normal_raw.iter().map(|r| self.transform_normal(r)).collect();
        let native_by_hash: HashMap<&str, &Transaction> = native_txs.iter().map(|t| (t.hash.as_str(), t)).collect();

        let mut token_txs: Vec<Transaction> = token_raw.iter().map(|r| self.transform_token(r)).collect();
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
struct BlockscanEnvelope<T> {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct BlockscanTx {
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    hash: String,
    #[serde(default)]
    nonce: String,
    #[serde(rename = "blockHash", default)]
    block_hash: String,
    #[serde(rename = "transactionIndex", default)]
    transaction_index: String,
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    gas: String,
    #[serde(rename = "gasPrice", default)]
    gas_price: String,
    #[serde(rename = "isError", default)]
    is_error: String,
    #[serde(rename = "txreceipt_status", default)]
    txreceipt_status: String,
    #[serde(rename = "gasUsed", default)]
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct BlockscanTokenTx {
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    hash: String,
    #[serde(default)]
    nonce: String,
    #[serde(rename = "blockHash", default)]
    block_hash: String,
    #[serde(rename = "transactionIndex", default)]
    transaction_index: String,
    from: String,
    to: String,
    #[serde(rename = "contractAddress")]
    contract_address: String,
    #[serde(default)]
    value: String,
    #[serde(rename = "tokenSymbol", default)]
    token_symbol: String,
    #[serde(rename = "tokenDecimal", default)]
    token_decimal: String,
    #[serde(default)]
    gas: String,
    #[serde(rename = "gasPrice", default)]
    gas_price: String,
    #[serde(rename = "gasUsed", default)]
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct BlockscanInternalTx {
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    gas: String,
    #[serde(rename = "gasUsed", default)]
    gas_used: String,
    #[serde(rename = "isError", default)]
    is_error: String,
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

    fn adapter() -> BlockscanAdapter {
        BlockscanAdapter::new(
            reqwest::Client::new(),
            BlockscanAdapterConfig {
                url: "https://api.etherscan.io/api".into(),
                api_key: "key".into(),
                chain_name: "ETH".into(),
                request_page_size: 100,
                sort: "desc".into(),
                page: 1,
                startblock: 0,
                endblock: 99_999_999,
            },
            test_registry(),
        )
    }

    fn base_tx() -> BlockscanTx {
        BlockscanTx {
            block_number: "100".into(),
            time_stamp: "1700000000".into(),
            hash: "0xABC".into(),
            nonce: "1".into(),
            block_hash: "0xBLK".into(),
            transaction_index: "0".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            value: "1000000000000000000".into(),
            gas: "21000".into(),
            gas_price: "1000000000".into(),
            is_error: "0".into(),
            txreceipt_status: "1".into(),
            gas_used: "21000".into(),
        }
    }

    #[test]
    fn success_requires_both_is_error_and_receipt_status() {
        let a = adapter();
        let tx = a.transform_normal(&base_tx());
        assert_eq!(tx.state, TxState::Success);

        let mut failed = base_tx();
        failed.txreceipt_status = "0".into();
        let tx2 = a.transform_normal(&failed);
        assert_eq!(tx2.state, TxState::Fail);
    }

    #[test]
    fn internal_tx_gets_internal_type_and_coin_type() {
        let a = adapter();
        let raw = BlockscanInternalTx {
            block_number: "1".into(),
            time_stamp: "0".into(),
            hash: "0xZZZ".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            value: "0".into(),
            gas: String::new(),
            gas_used: String::new(),
            is_error: "0".into(),
        };
        let tx = a.transform_internal(&raw);
        assert_eq!(tx.tx_type, TxType::Internal);
        assert_eq!(tx.coin_type, CoinType::Internal);
        assert_eq!(tx.state, TxState::Success);
    }

    #[test]
    fn token_tx_scales_by_declared_decimals() {
        let a = adapter();
        let raw = BlockscanTokenTx {
            block_number: "5".into(),
            time_stamp: "0".into(),
            hash: "0xAAA".into(),
            nonce: "0".into(),
            block_hash: String::new(),
            transaction_index: "0".into(),
            from: "0xFROM".into(),
            to: "0xTO".into(),
            contract_address: "0xTOKEN".into(),
            value: "1500000".into(),
            token_symbol: "USDC".into(),
            token_decimal: "6".into(),
            gas: String::new(),
            gas_price: String::new(),
            gas_used: String::new(),
        };
        let tx = a.transform_token(&raw);
        assert_eq!(tx.amount, "1.5");
        assert_eq!(tx.decimals, 6);
    }
}
