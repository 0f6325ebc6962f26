//! Black-box tests over the multi-provider fan-out that don't require any
//! external service: fake adapters stand in for Ankr/Blockscout/Blockscan.

use async_trait::async_trait;
use multi_provider::MultiProvider;
use provider_core::{AggregatorError, Result, TransactionAdapter};
use std::sync::Arc;
use std::time::Duration;
use tx_model::{
    CoinType, TranType, Transaction, TransactionQueryParams, TransactionResponse, TxState, TxType,
};

struct FakeAdapter {
    name: &'static str,
    delay: Duration,
    outcome: fn() -> Result<TransactionResponse>,
}

#[async_trait]
impl TransactionAdapter for FakeAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn get_transactions(&self, _query: &TransactionQueryParams) -> Result<TransactionResponse> {
        tokio::time::sleep(self.delay).await;
        (self.outcome)()
    }
}

fn sample_tx(hash: &str) -> Transaction {
    Transaction {
        chain_id: 1,
        server_chain_name: String::new(),
        state: TxState::Success,
        height: 1,
        tx_index: 0,
        hash: hash.to_string(),
        block_hash: String::new(),
        from_address: "0xfrom".into(),
        to_address: "0xto".into(),
        token_address: String::new(),
        balance: "0".into(),
        amount: "0".into(),
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

/// Property 11: when every adapter sleeps longer than the request timeout,
/// the fan-out returns within `timeout + epsilon` with a deadline-exceeded
/// error mapping to the fixed "Request timed out" message.
#[tokio::test]
async fn deadline_elapses_before_any_adapter_completes() {
    let slow = Arc::new(FakeAdapter {
        name: "slow",
        delay: Duration::from_millis(300),
        outcome: || Ok(TransactionResponse::default()),
    });

    let provider = MultiProvider::new(vec![slow as Arc<dyn TransactionAdapter>], Duration::from_millis(30));

    let started = std::time::Instant::now();
    let err = provider
        .get_transactions(&TransactionQueryParams::default())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, AggregatorError::DeadlineExceeded));
    assert_eq!(err.client_message(), "Request timed out");
    assert!(elapsed < Duration::from_millis(300), "deadline should cut the wait short");
}

/// Multi-provider succeeds as long as at least one adapter returns data,
/// even if every other registered adapter fails outright.
#[tokio::test]
async fn succeeds_when_at_least_one_of_several_adapters_returns_data() {
    let good = Arc::new(FakeAdapter {
        name: "good",
        delay: Duration::from_millis(1),
        outcome: || {
            Ok(TransactionResponse {
                transactions: vec![sample_tx("0xgood")],
            })
        },
    });
    let broken_a = Arc::new(FakeAdapter {
        name: "broken-a",
        delay: Duration::from_millis(1),
        outcome: || Err(AggregatorError::UpstreamStatus {
            source: "broken-a".into(),
            message: "NOTOK".into(),
        }),
    });
    let broken_b = Arc::new(FakeAdapter {
        name: "broken-b",
        delay: Duration::from_millis(1),
        outcome: || Err(AggregatorError::ProviderFailed("no reachable endpoint".into())),
    });

    let provider = MultiProvider::new(
        vec![
            good as Arc<dyn TransactionAdapter>,
            broken_a as Arc<dyn TransactionAdapter>,
            broken_b as Arc<dyn TransactionAdapter>,
        ],
        Duration::from_secs(5),
    );

    let response = provider
        .get_transactions(&TransactionQueryParams::default())
        .await
        .unwrap();

    assert_eq!(response.transactions.len(), 1);
    assert_eq!(response.transactions[0].hash, "0xgood");
}
