use aggregator::http::{self, AppState};
use aggregator::logging;
use aggregator::postprocess::ResponseSettings;
use aggregator::service::AggregationService;
use ankr_provider::{AnkrAdapter, AnkrAdapterConfig};
use blockscan_provider::{BlockscanAdapter, BlockscanAdapterConfig};
use blockscout_provider::{BlockscoutAdapter, BlockscoutAdapterConfig};
use cache::CacheClient;
use chain_registry::{ChainEntry, ChainRegistry};
use config::AppConfig;
use multi_provider::{ChainScopedAdapter, MultiProvider};
use provider_core::TransactionAdapter;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let _log_guard = logging::init(&config.log);
    info!("starting aggregator on port {}", config.server.port);

    let registry = Arc::new(build_registry(&config));
    let cache = CacheClient::connect(&config.redis.addrs, &config.redis.password, config.redis.ttl_seconds).await?;
    let provider = build_multi_provider(&config, Arc::clone(&registry));

    let settings = ResponseSettings {
        max: config.response.max,
        ascending: config.response.ascending,
    };
    let service = AggregationService::new(provider, cache, Arc::clone(&registry), settings);

    let known_chain_names = config.chain_names.keys().map(|n| n.to_uppercase()).collect();
    let state = Arc::new(AppState {
        service,
        known_chain_names,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    http::serve(addr, state).await
}

fn build_registry(config: &AppConfig) -> ChainRegistry {
    let entries = config
        .chain_names
        .iter()
        .map(|(name, &chain_id)| ChainEntry {
            name: name.clone(),
            chain_id,
            native_symbol: config
                .native_tokens
                .get(&chain_id.to_string())
                .cloned()
                .unwrap_or_default(),
            // The Ankr JSON-RPC provider's own chain vocabulary is not
            // separately configured; it matches the lowercased chain name
            // for every chain this workspace targets.
            ankr_name: name.to_lowercase(),
        })
        .collect();

    ChainRegistry::new(entries)
}

/// Chain names configured to be served by `provider_key` in
/// `providers.chain_providers`. An empty `chain_providers` table means no
/// routing is configured at all, so every adapter serves every chain it's
/// otherwise set up for (`None`).
fn allowed_chains_for(chain_providers: &HashMap<String, String>, provider_key: &str) -> Option<BTreeSet<String>> {
    if chain_providers.is_empty() {
        return None;
    }
    Some(
        chain_providers
            .iter()
            .filter(|(_, v)| v.eq_ignore_ascii_case(provider_key))
            .map(|(chain_name, _)| chain_name.to_uppercase())
            .collect(),
    )
}

/// Whether `chain_providers` routes `chain_name` to `provider_key`. An empty
/// table means no routing is configured, so every configured adapter serves
/// its own chain.
fn routes_to(chain_providers: &HashMap<String, String>, chain_name: &str, provider_key: &str) -> bool {
    chain_providers.is_empty()
        || chain_providers
            .get(&chain_name.to_uppercase())
            .is_some_and(|v| v.eq_ignore_ascii_case(provider_key))
}

fn build_multi_provider(config: &AppConfig, registry: Arc<ChainRegistry>) -> Arc<dyn TransactionAdapter> {
    let timeout = Duration::from_secs(config.providers.request_timeout);
    let chain_providers = &config.providers.chain_providers;
    let mut adapters: Vec<Arc<dyn TransactionAdapter>> = Vec::new();

    if !config.ankr.chain_ids.is_empty() {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build ankr http client");
        let ankr_config = AnkrAdapterConfig {
            api_key: config.ankr.api_key.clone(),
            url: config.ankr.url.clone(),
            request_page_size: config.ankr.request_page_size,
            include_logs: config.ankr.include_logs,
            desc_order: config.ankr.desc_order,
        };
        let ankr: Arc<dyn TransactionAdapter> = Arc::new(AnkrAdapter::new(client, ankr_config, Arc::clone(&registry)));
        adapters.push(match allowed_chains_for(chain_providers, "ankr") {
            Some(allowed) => Arc::new(ChainScopedAdapter::new(ankr, allowed)),
            None => ankr,
        });
    }

    for entry in &config.blockscout {
        if !routes_to(chain_providers, &entry.chain_name, "blockscout") {
            continue;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(entry.rpc_request_timeout))
            .build()
            .expect("failed to build blockscout http client");
        let adapter_config = BlockscoutAdapterConfig {
            url: entry.url.clone(),
            chain_name: entry.chain_name.clone(),
            request_page_size: entry.request_page_size,
            rpc_url: entry.rpc_url.clone(),
            rpc_request_timeout: entry.rpc_request_timeout,
        };
        adapters.push(Arc::new(BlockscoutAdapter::new(client, adapter_config, Arc::clone(&registry))));
    }

    for entry in &config.blockscan {
        if !routes_to(chain_providers, &entry.chain_name, "blockscan") {
            continue;
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build blockscan http client");
        let adapter_config = BlockscanAdapterConfig {
            url: entry.url.clone(),
            api_key: entry.api_key.clone(),
            chain_name: entry.chain_name.clone(),
            request_page_size: entry.request_page_size,
            sort: entry.sort.clone(),
            page: entry.page,
            startblock: entry.startblock,
            endblock: entry.endblock,
        };
        adapters.push(Arc::new(BlockscanAdapter::new(client, adapter_config, Arc::clone(&registry))));
    }

    Arc::new(MultiProvider::new(adapters, timeout))
}
