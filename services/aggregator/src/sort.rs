//! Deterministic multi-key ordering for the final transaction list.
//!
//! The comparator always walks the same tie-break chain; callers flip the
//! whole chain by reversing the compared pair rather than reversing the
//! chain itself, so equal elements (ties all the way down) keep their
//! original insertion order under the stable sort.

use std::cmp::Ordering;
use tx_model::Transaction;

/// Stable-sort `transactions` by the canonical comparator. `ascending`
/// selects direction; post-processing defaults to descending (newest
/// first).
pub fn sort_transactions(transactions: &mut [Transaction], ascending: bool) {
    transactions.sort_by(|a, b| {
        let ord = compare(a, b);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn compare(a: &Transaction, b: &Transaction) -> Ordering {
    a.height
        .cmp(&b.height)
        .then_with(|| a.tx_index.cmp(&b.tx_index))
        .then_with(|| compare_nonce_if_same_sender(a, b))
        .then_with(|| a.hash.cmp(&b.hash))
        .then_with(|| a.from_address.cmp(&b.from_address))
}

fn compare_nonce_if_same_sender(a: &Transaction, b: &Transaction) -> Ordering {
    if !a.from_address.eq_ignore_ascii_case(&b.from_address) {
        return Ordering::Equal;
    }
    match (a.nonce.parse::<u64>(), b.nonce.parse::<u64>()) {
        (Ok(an), Ok(bn)) => an.cmp(&bn),
        _ => Ordering::Equal,
    }
}
