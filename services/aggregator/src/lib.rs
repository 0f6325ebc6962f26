//! Query parsing, pipeline orchestration, and HTTP boundary for the
//! transaction-history aggregation service. The binary entry point
//! (`main.rs`) wires configuration, the chain registry, the cache client,
//! the provider adapters, and the multi-provider fan-out into an
//! [`AggregationService`](service::AggregationService) and serves it over
//! HTTP.

pub mod http;
pub mod logging;
pub mod postprocess;
pub mod query_parser;
pub mod service;
pub mod sort;
