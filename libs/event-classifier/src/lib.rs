//! Classifies event logs into `Transfer`/`Approval` so adapters can upgrade
//! a plain native transaction into an approval record, or correlate token
//! transfers with the log that produced them.
//!
//! Recognizes exactly the two 32-byte topic-0 signatures the canonical data
//! model cares about (ERC-20 `Transfer` and `Approval`); everything else is
//! `Unknown`. These are the same well-known keccak256 signatures the
//! teacher's DEX ABI decoders hardcode for Uniswap-family events — public,
//! deterministic, and never renumbered once published.

/// `Transfer(address indexed from, address indexed to, uint256 value)`
pub const TRANSFER_SIGNATURE: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// `Approval(address indexed owner, address indexed spender, uint256 value)`
pub const APPROVAL_SIGNATURE: &str =
    "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

/// What an event log was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventType {
    #[default]
    Unknown,
    Transfer,
    Approval,
}

/// The result of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub event_type: EventType,
    /// Lowercased contract address that emitted the log (empty for `Unknown`).
    pub token_address: String,
    /// Hex-encoded approval amount, non-empty only for `Approval`.
    pub approve_amount_hex: String,
}

/// A single log entry as returned by an upstream explorer or
/// `eth_getBlockReceipts`. `log_index` is the log's position within its
/// transaction (used to break ties deterministically).
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: u64,
}

/// Classify a single (contract, topics, data) tuple.
///
/// An empty `topics` slice is always `Unknown` (there's no topic-0 to match
/// against).
pub fn classify(contract_addr: &str, topics: &[String], data: &str) -> Classification {
    let Some(topic0) = topics.first() else {
        return Classification::default();
    };

    let topic0 = topic0.to_lowercase();
    let token_address = contract_addr.to_lowercase();

    if topic0 == TRANSFER_SIGNATURE {
        Classification {
            event_type: EventType::Transfer,
            token_address,
            approve_amount_hex: String::new(),
        }
    } else if topic0 == APPROVAL_SIGNATURE {
        Classification {
            event_type: EventType::Approval,
            token_address,
            approve_amount_hex: data.to_string(),
        }
    } else {
        Classification::default()
    }
}

/// Classify every log belonging to one transaction and return the first
/// recognized event, where "first" means lowest `log_index` among the
/// recognized (non-`Unknown`) entries. Ties — including multiple approvals
/// in one transaction — resolve to the earliest log index.
pub fn classify_many(logs: &[LogEntry]) -> Classification {
    logs.iter()
        .map(|log| (log.log_index, classify(&log.address, &log.topics, &log.data)))
        .filter(|(_, c)| c.event_type != EventType::Unknown)
        .min_by_key(|(idx, _)| *idx)
        .map(|(_, c)| c)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_topics_is_unknown() {
        let c = classify("0xAbC", &[], "0x");
        assert_eq!(c.event_type, EventType::Unknown);
    }

    #[test]
    fn recognizes_transfer() {
        let c = classify(
            "0xAbCdEf0000000000000000000000000000000001",
            &[TRANSFER_SIGNATURE.to_string()],
            "0x00",
        );
        assert_eq!(c.event_type, EventType::Transfer);
        assert_eq!(c.token_address, "0xabcdef0000000000000000000000000000000001");
    }

    #[test]
    fn recognizes_approval_and_captures_amount() {
        let c = classify(
            "0xDEAD",
            &[APPROVAL_SIGNATURE.to_string()],
            "0x01",
        );
        assert_eq!(c.event_type, EventType::Approval);
        assert_eq!(c.token_address, "0xdead");
        assert_eq!(c.approve_amount_hex, "0x01");
    }

    #[test]
    fn unrecognized_signature_is_unknown() {
        let c = classify("0xAbC", &["0xdeadbeef".to_string()], "0x");
        assert_eq!(c.event_type, EventType::Unknown);
    }

    #[test]
    fn classify_many_picks_earliest_recognized_log() {
        let logs = vec![
            LogEntry {
                address: "0x1".into(),
                topics: vec!["0xunrelated".into()],
                data: "0x".into(),
                log_index: 0,
            },
            LogEntry {
                address: "0xaaa".into(),
                topics: vec![APPROVAL_SIGNATURE.to_string()],
                data: "0x05".into(),
                log_index: 2,
            },
            LogEntry {
                address: "0xbbb".into(),
                topics: vec![APPROVAL_SIGNATURE.to_string()],
                data: "0x09".into(),
                log_index: 1,
            },
        ];

        let result = classify_many(&logs);
        assert_eq!(result.event_type, EventType::Approval);
        assert_eq!(result.token_address, "0xbbb");
        assert_eq!(result.approve_amount_hex, "0x09");
    }

    #[test]
    fn classify_many_with_no_recognized_logs_is_unknown() {
        let logs = vec![LogEntry {
            address: "0x1".into(),
            topics: vec!["0xunrelated".into()],
            data: "0x".into(),
            log_index: 0,
        }];
        assert_eq!(classify_many(&logs).event_type, EventType::Unknown);
    }
}
