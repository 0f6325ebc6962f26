//! Canonical transaction record and query/response types shared by every
//! adapter, the multi-provider fan-out, the cache layer, and the
//! aggregation service.
//!
//! All amounts and addresses are plain `String`s rather than fixed-width
//! wire types: unlike the teacher codebase's TLV protocol, nothing here is
//! serialized to a binary, zero-copy wire format — the cache stores JSON
//! and the HTTP boundary returns JSON, so the canonical representation is
//! the JSON-friendly one described in the data model.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Boilerplate macro: give a `#[repr(i32)]` + `num_enum` enum
/// `serde::Serialize`/`Deserialize` impls that (de)serialize through its
/// `i32` discriminant, since the wire format is JSON integers, not enum
/// variant names.
macro_rules! impl_serde_via_i32 {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                let v: i32 = (*self).into();
                serializer.serialize_i32(v)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let v = i32::deserialize(deserializer)?;
                <$ty>::try_from(v).map_err(|_| {
                    serde::de::Error::custom(format!(
                        "invalid {} discriminant: {v}",
                        stringify!($ty)
                    ))
                })
            }
        }
    };
}

/// Execution state of a transaction.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum TxState {
    Fail = 0,
    Success = 1,
}

impl_serde_via_i32!(TxState);

/// Kind of activity a record represents.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum TxType {
    /// Plain transfer, or not yet classified as anything more specific.
    Unknown = 0,
    Approve = 1,
    Internal = 2,
}

impl_serde_via_i32!(TxType);

/// Which "lane" a record belongs to for cache partitioning and filtering.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum CoinType {
    Native = 1,
    Token = 2,
    Internal = 3,
}

impl_serde_via_i32!(CoinType);

/// Direction of a transaction relative to the queried address.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum TranType {
    In = 0,
    Out = 1,
}

impl_serde_via_i32!(TranType);

/// The canonical transaction record. Unique within a response by
/// `(chain_id, hash, coin_type, token_address)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain_id: i64,
    /// Filled late in post-processing from the chain registry; uppercase.
    #[serde(default)]
    pub server_chain_name: String,
    pub state: TxState,
    pub height: i64,
    pub tx_index: i64,
    /// Lowercase hex.
    pub hash: String,
    /// Lowercase hex; may be empty.
    #[serde(default)]
    pub block_hash: String,
    pub from_address: String,
    pub to_address: String,
    /// Lowercase hex; empty for native.
    #[serde(default)]
    pub token_address: String,
    /// Canonical decimal-string raw integer units.
    pub balance: String,
    /// Human decimal string, `balance / 10^decimals`.
    pub amount: String,
    #[serde(default)]
    pub gas_used: String,
    #[serde(default)]
    pub gas_limit: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub coin_type: CoinType,
    #[serde(default)]
    pub token_display_name: String,
    #[serde(default = "default_decimals")]
    pub decimals: i64,
    #[serde(default)]
    pub icon_url: String,
    pub created_time: i64,
    pub modified_time: i64,
    pub tran_type: TranType,
    /// Hex amount; non-empty only when `tx_type == Approve`.
    #[serde(default)]
    pub approve_show: String,
}

fn default_decimals() -> i64 {
    18
}

impl Transaction {
    /// `true` iff the record's `to_address` is the queried address.
    pub fn is_incoming(&self, queried_address: &str) -> bool {
        self.to_address.eq_ignore_ascii_case(queried_address)
    }

    /// `true` iff the record refers to the queried address (as sender or
    /// recipient) or the queried token contract.
    pub fn is_involved(&self, address: &str, token_address: &str) -> bool {
        self.from_address.eq_ignore_ascii_case(address)
            || self.to_address.eq_ignore_ascii_case(address)
            || (!token_address.is_empty() && self.token_address.eq_ignore_ascii_case(token_address))
    }
}

/// A validated, normalized query against the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionQueryParams {
    /// Lowercase `0x`-hex-40.
    pub address: String,
    /// Lowercase `0x`-hex-40, the literal `"native"`, or `""`.
    pub token_address: String,
    /// Sorted, uppercase chain names. Empty means "all configured chains".
    pub chain_names: BTreeSet<String>,
}

impl TransactionQueryParams {
    pub fn wants_native_only(&self) -> bool {
        self.token_address == "native"
    }

    pub fn wants_token(&self) -> bool {
        !self.token_address.is_empty() && !self.wants_native_only()
    }
}

/// The `result` payload of the HTTP envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transactions: Vec<Transaction>,
}

/// Error/success codes carried in the envelope, per the external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    InvalidParams,
    InternalError,
    ProviderFailed,
    RequestTimedOut,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::InvalidParams => 1001,
            ResponseCode::InternalError => 1002,
            ResponseCode::ProviderFailed => 1003,
            ResponseCode::RequestTimedOut => 1004,
        }
    }
}

/// The full HTTP response envelope: `{code, message, result, id}`. Always
/// returned with HTTP 200 — errors live in `code`/`message`, never in the
/// HTTP status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub code: i32,
    pub message: String,
    pub result: T,
    pub id: i64,
}

impl ResponseEnvelope<TransactionResponse> {
    pub fn success(transactions: Vec<Transaction>) -> Self {
        Self {
            code: ResponseCode::Success.code(),
            message: "success".to_string(),
            result: TransactionResponse { transactions },
            id: 1,
        }
    }

    pub fn error(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            result: TransactionResponse::default(),
            id: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            chain_id: 1,
            server_chain_name: "ETH".into(),
            state: TxState::Success,
            height: 100,
            tx_index: 0,
            hash: "0xabc".into(),
            block_hash: String::new(),
            from_address: "0xfrom".into(),
            to_address: "0xto".into(),
            token_address: String::new(),
            balance: "1000000000000000000".into(),
            amount: "1".into(),
            gas_used: String::new(),
            gas_limit: String::new(),
            gas_price: String::new(),
            nonce: String::new(),
            tx_type: TxType::Unknown,
            coin_type: CoinType::Native,
            token_display_name: String::new(),
            decimals: 18,
            icon_url: String::new(),
            created_time: 0,
            modified_time: 0,
            tran_type: TranType::In,
            approve_show: String::new(),
        }
    }

    #[test]
    fn enums_serialize_as_integers() {
        let tx = sample();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["state"], 1);
        assert_eq!(json["type"], 0);
        assert_eq!(json["coin_type"], 1);
        assert_eq!(json["tran_type"], 0);
    }

    #[test]
    fn round_trips_through_json() {
        let tx = sample();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn invalid_discriminant_fails_deserialize() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["state"] = serde_json::json!(42);
        let result: Result<Transaction, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn involvement_predicate() {
        let tx = sample();
        assert!(tx.is_involved("0xFROM", ""));
        assert!(tx.is_involved("0xto", ""));
        assert!(!tx.is_involved("0xsomeoneelse", ""));

        let mut token_tx = sample();
        token_tx.token_address = "0xtoken".into();
        token_tx.from_address = "0xother".into();
        token_tx.to_address = "0xother2".into();
        assert!(token_tx.is_involved("0xnotinvolved", "0xTOKEN"));
    }

    #[test]
    fn envelope_error_has_empty_result() {
        let env = ResponseEnvelope::error(ResponseCode::ProviderFailed, "Request timed out");
        assert_eq!(env.code, 1003);
        assert!(env.result.transactions.is_empty());
    }
}
