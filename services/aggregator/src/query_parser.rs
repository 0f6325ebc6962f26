//! Validates and normalizes the raw strings the HTTP boundary pulls out of
//! the query string into a [`TransactionQueryParams`].

use provider_core::{AggregatorError, Result};
use std::collections::BTreeSet;
use tx_model::TransactionQueryParams;

const HEX40_LEN: usize = 40;

/// Raw, unvalidated query-string values as the HTTP boundary extracts them.
#[derive(Debug, Default)]
pub struct RawQuery {
    pub address: Option<String>,
    pub token_address: Option<String>,
    pub chain_name: Option<String>,
}

/// Parse and validate a raw query into canonical [`TransactionQueryParams`].
///
/// `known_chain_names` is the set of chain names the registry actually
/// knows (uppercase), used to reject unknown names with one combined error
/// rather than silently dropping them the way `resolve_ankr` does — the
/// HTTP boundary is the one place a typo should be reported back to the
/// caller.
pub fn parse(raw: &RawQuery, known_chain_names: &BTreeSet<String>) -> Result<TransactionQueryParams> {
    let address = parse_address(raw.address.as_deref())?;
    let token_address = parse_token_address(raw.token_address.as_deref())?;
    let chain_names = parse_chain_names(raw.chain_name.as_deref(), known_chain_names)?;

    Ok(TransactionQueryParams {
        address,
        token_address,
        chain_names,
    })
}

fn parse_address(raw: Option<&str>) -> Result<String> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AggregatorError::InvalidParam("address is required".to_string()))?;

    if !is_hex40(raw) {
        return Err(AggregatorError::InvalidParam(format!(
            "address must match ^0x[0-9a-f]{{40}}$ (case-insensitive): {raw}"
        )));
    }

    Ok(raw.to_lowercase())
}

fn parse_token_address(raw: Option<&str>) -> Result<String> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(String::new()),
    };

    if raw.eq_ignore_ascii_case("native") {
        return Ok("native".to_string());
    }

    if !is_hex40(raw) {
        return Err(AggregatorError::InvalidParam(format!(
            "tokenAddress must be 40 hex characters or the literal \"native\": {raw}"
        )));
    }

    Ok(raw.to_lowercase())
}

fn parse_chain_names(raw: Option<&str>, known: &BTreeSet<String>) -> Result<BTreeSet<String>> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(BTreeSet::new()),
    };

    let mut names = BTreeSet::new();
    let mut unknown = Vec::new();

    for token in raw.split(',') {
        let name = token.trim().to_uppercase();
        if name.is_empty() {
            continue;
        }
        if known.contains(&name) {
            names.insert(name);
        } else {
            unknown.push(name);
        }
    }

    if !unknown.is_empty() {
        unknown.sort();
        unknown.dedup();
        return Err(AggregatorError::InvalidParam(format!(
            "unknown chain name(s): {}",
            unknown.join(", ")
        )));
    }

    Ok(names)
}

fn is_hex40(s: &str) -> bool {
    let body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    match body {
        Some(hex) => hex.len() == HEX40_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chains() -> BTreeSet<String> {
        ["ETH", "BSC"].into_iter().map(str::to_string).collect()
    }

    #[test]
    fn rejects_missing_address() {
        let raw = RawQuery::default();
        let err = parse(&raw, &chains()).unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidParam(_)));
    }

    #[test]
    fn rejects_malformed_address() {
        let raw = RawQuery {
            address: Some("0xnothex".to_string()),
            ..Default::default()
        };
        assert!(parse(&raw, &chains()).is_err());
    }

    #[test]
    fn lowercases_valid_address() {
        let raw = RawQuery {
            address: Some(format!("0x{}", "AB".repeat(20))),
            ..Default::default()
        };
        let params = parse(&raw, &chains()).unwrap();
        assert_eq!(params.address, format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn token_address_native_literal_is_case_insensitive() {
        let raw = RawQuery {
            address: Some(format!("0x{}", "ab".repeat(20))),
            token_address: Some("NATIVE".to_string()),
            ..Default::default()
        };
        let params = parse(&raw, &chains()).unwrap();
        assert_eq!(params.token_address, "native");
    }

    #[test]
    fn chain_names_are_trimmed_uppercased_and_deduped() {
        let raw = RawQuery {
            address: Some(format!("0x{}", "ab".repeat(20))),
            chain_name: Some(" eth, bsc ,eth".to_string()),
            ..Default::default()
        };
        let params = parse(&raw, &chains()).unwrap();
        assert_eq!(params.chain_names.len(), 2);
        assert!(params.chain_names.contains("ETH"));
        assert!(params.chain_names.contains("BSC"));
    }

    #[test]
    fn unknown_chain_names_produce_one_combined_error() {
        let raw = RawQuery {
            address: Some(format!("0x{}", "ab".repeat(20))),
            chain_name: Some("eth,mars,venus".to_string()),
            ..Default::default()
        };
        let err = parse(&raw, &chains()).unwrap_err();
        match err {
            AggregatorError::InvalidParam(msg) => {
                assert!(msg.contains("MARS"));
                assert!(msg.contains("VENUS"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
