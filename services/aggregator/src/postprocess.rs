//! The pure post-processing pipeline applied to a transaction set after
//! cache/upstream retrieval, independent of how that set was obtained.
//! Kept free of I/O so it can be exercised directly in tests.

use crate::sort::sort_transactions;
use chain_registry::ChainRegistry;
use std::collections::HashSet;
use tx_model::{CoinType, TranType, Transaction, TransactionQueryParams};

#[derive(Debug, Clone, Copy)]
pub struct ResponseSettings {
    pub max: usize,
    pub ascending: bool,
}

/// Chain filter → shadow-dedup → native/token filter → sort → cap →
/// chain-name fill-in, per spec §4.7 step 5.
pub fn post_process(
    mut transactions: Vec<Transaction>,
    params: &TransactionQueryParams,
    registry: &ChainRegistry,
    settings: ResponseSettings,
) -> Vec<Transaction> {
    if !params.chain_names.is_empty() {
        let wanted_ids: HashSet<i64> = params
            .chain_names
            .iter()
            .filter_map(|name| registry.id_by_name(name).ok())
            .collect();
        transactions.retain(|tx| wanted_ids.contains(&tx.chain_id));
    }

    let shadowed_hashes: HashSet<String> = transactions
        .iter()
        .filter(|tx| tx.coin_type == CoinType::Token)
        .map(|tx| tx.hash.clone())
        .collect();
    transactions.retain(|tx| !(tx.coin_type == CoinType::Native && shadowed_hashes.contains(&tx.hash)));

    if params.wants_native_only() {
        transactions.retain(|tx| tx.coin_type == CoinType::Native);
    } else if params.wants_token() {
        let wanted_token = params.token_address.to_lowercase();
        transactions.retain(|tx| tx.coin_type == CoinType::Token && tx.token_address.eq_ignore_ascii_case(&wanted_token));
    }

    sort_transactions(&mut transactions, settings.ascending);
    transactions.truncate(settings.max);

    for tx in &mut transactions {
        tx.server_chain_name = registry.name_by_id(tx.chain_id).unwrap_or_default();
    }

    transactions
}

/// Sets `tran_type` against the queried address: `In` iff the record's
/// `to_address` is the queried address, `Out` otherwise. Applied once, right
/// after a canonical record set is assembled from upstream, so the derived
/// value is what gets cached and what every later read sees.
pub fn apply_tran_type(transactions: &mut [Transaction], queried_address: &str) {
    for tx in transactions {
        tx.tran_type = if tx.is_incoming(queried_address) {
            TranType::In
        } else {
            TranType::Out
        };
    }
}

/// Keep a record iff it refers to the queried address (as sender or
/// recipient) or the queried token contract.
pub fn involvement_filter(transactions: Vec<Transaction>, params: &TransactionQueryParams) -> Vec<Transaction> {
    transactions
        .into_iter()
        .filter(|tx| tx.is_involved(&params.address, &params.token_address))
        .collect()
}
