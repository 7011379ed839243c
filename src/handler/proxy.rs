use super::errors::ProxyError;
use super::state::{http_client_builder, ProxyState};
use crate::metrics::consts as crate_metrics;

use anyhow::Context;
use axum::{
    body::{Body, HttpBody},
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{self, header},
    response::{IntoResponse, Response},
};
use reqwest::Url;
use serde::Deserialize;
use std::time::Instant;
use tracing::instrument;

// The query key carrying the target URL
pub(crate) const QUERY_KEY: &str = "q";

#[derive(Deserialize, Debug)]
pub(crate) struct ProxyQuery {
    q: Option<String>,
}

fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn usage_hint() -> Response {
    (
        http::StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        format!("usage: /proxy?{QUERY_KEY}=<absolute target URL>"),
    )
        .into_response()
}

#[instrument(skip_all, err(level = "warn"), fields(request_id=uuid()))]
pub(crate) async fn proxy(
    State(state): State<ProxyState>,
    query: Result<Query<ProxyQuery>, QueryRejection>,
    client_request: Request<Body>,
) -> Result<Response, ProxyError> {
    let Query(query) = query?;
    let Some(target) = query.q.filter(|q| !q.is_empty()) else {
        return Ok(usage_hint());
    };

    let target_url =
        Url::parse(&target).with_context(|| format!("Couldn't parse target URL {target:?}"))?;

    let proxy_request_method = client_request.method().clone();
    let client_user_agent = client_request.headers().get(header::USER_AGENT).cloned();
    let client_request_body = client_request.into_body();

    let mut proxy_request = state
        .http_client
        .request(proxy_request_method.clone(), target_url.clone());
    // Upstream sees the caller's identity, never ours.
    if let Some(user_agent) = client_user_agent {
        proxy_request = proxy_request.header(header::USER_AGENT, user_agent);
    }
    if client_request_body.size_hint().exact() != Some(0) {
        proxy_request = proxy_request.body(reqwest::Body::wrap_stream(
            client_request_body.into_data_stream(),
        ));
    }
    let proxy_request = proxy_request
        .build()
        .with_context(|| format!("Couldn't build {proxy_request_method} request to {target_url}"))?;

    tracing::debug!(?proxy_request);

    let reqwest_start = Instant::now();
    let server_response = state
        .http_client
        .execute(proxy_request)
        .await
        .with_context(|| format!("{proxy_request_method} request to {target_url} failed"))?;
    metrics::histogram!(crate_metrics::UPSTREAM_REQUEST_DURATION_SECS)
        .record(reqwest_start.elapsed().as_secs_f64());

    let server_response_status = server_response.status();

    tracing::info!(
        %server_response_status,
        %proxy_request_method,
        %target_url,
    );

    let proxy_response_body_stream = Body::from_stream(server_response.bytes_stream());

    Ok((server_response_status, proxy_response_body_stream).into_response())
}
