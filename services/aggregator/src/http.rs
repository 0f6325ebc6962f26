//! Thin HTTP boundary: `GET /transactions` and `GET /health`, built directly
//! on `hyper` rather than a full web framework, following the same
//! `make_service_fn`/`service_fn` shape the teacher codebase uses for its
//! own health-check server.

use crate::query_parser::{self, RawQuery};
use crate::service::AggregationService;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tx_model::ResponseEnvelope;

pub struct AppState {
    pub service: AggregationService,
    pub known_chain_names: BTreeSet<String>,
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(service_fn(move |req| handle_request(req, Arc::clone(&state)))) }
    });

    let server = Server::bind(&addr).serve(make_svc);
    info!("aggregator listening on http://{addr}");

    if let Err(err) = server.await {
        error!(error = %err, "http server error");
    }

    Ok(())
}

async fn handle_request(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(status_only(StatusCode::METHOD_NOT_ALLOWED));
    }

    match req.uri().path() {
        "/transactions" => Ok(handle_transactions(req, &state).await),
        "/health" => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain")
            .body(Body::from("ok"))
            .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR))),
        _ => Ok(status_only(StatusCode::NOT_FOUND)),
    }
}

async fn handle_transactions(req: Request<Body>, state: &AppState) -> Response<Body> {
    let raw = extract_raw_query(req.uri().query().unwrap_or(""));

    let params = match query_parser::parse(&raw, &state.known_chain_names) {
        Ok(params) => params,
        Err(err) => {
            let envelope = ResponseEnvelope::error(err.response_code(), err.client_message());
            return json_response(StatusCode::OK, &envelope);
        }
    };

    let outcome = state.service.get_transactions(&params).await;
    let envelope = ResponseEnvelope {
        code: outcome.code.code(),
        message: outcome.message,
        result: tx_model::TransactionResponse {
            transactions: outcome.transactions,
        },
        id: 1,
    };
    json_response(StatusCode::OK, &envelope)
}

/// Query-string keys are matched case-insensitively, per spec §4.9.
fn extract_raw_query(query: &str) -> RawQuery {
    let mut raw = RawQuery::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.to_lowercase().as_str() {
            "address" => raw.address = Some(value.into_owned()),
            "tokenaddress" => raw.token_address = Some(value.into_owned()),
            "chainname" => raw.chain_name = Some(value.into_owned()),
            _ => {}
        }
    }
    raw
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(_) => status_only(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn status_only(status: StatusCode) -> Response<Body> {
    Response::builder().status(status).body(Body::empty()).unwrap()
}
