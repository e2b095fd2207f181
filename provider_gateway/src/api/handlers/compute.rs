//! Compute endpoints: job control forwarded to the compute cluster, plus
//! result retrieval streamed through the download gateway.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use reqwest::Method;
use serde_json::{json, Value};

use crate::api::errors::{service_unavailable, validation_error};
use crate::api::server::AppState;
use crate::api::validation::{
    validate_address, ComputeQuery, ComputeResultQuery, ComputeStartRequest,
};
use crate::crypto::verify_signature;
use crate::errors::GatewayResult;

/// Keys stripped from status responses when the caller's signature is absent
/// or fails verification.
const REDACTED_KEYS: &[&str] = &["resultsUrl", "algorithmLogUrl", "resultsDid"];

/// Build the provider-signed parameter set forwarded to the cluster.
///
/// The gateway countersigns `{providerAddress}{jobId}{documentId}` so the
/// cluster can check the request came through an authorized gateway.
fn compute_request_params(state: &AppState, params: &ComputeQuery) -> Vec<(&'static str, String)> {
    let job_id = params.job_id.clone().unwrap_or_default();
    let document_id = params.document_id.clone().unwrap_or_default();
    let msg_to_sign = format!("{}{}{}", state.wallet.address(), job_id, document_id);

    let mut body = vec![
        ("providerAddress", state.wallet.address().to_string()),
        ("providerSignature", state.wallet.sign_message(&msg_to_sign)),
        ("owner", params.consumer_address.clone()),
    ];
    if let Some(job_id) = &params.job_id {
        body.push(("jobId", job_id.clone()));
    }
    if let Some(tx_id) = &params.transfer_tx_id {
        body.push(("agreementId", tx_id.clone()));
    }
    if let Some(did) = &params.document_id {
        body.push(("documentId", did.clone()));
    }
    body
}

/// Relay a cluster response verbatim.
fn relay(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(axum::body::Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("application/json"),
    );
    response
}

fn to_axum_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// DELETE /compute: delete a job.
pub async fn compute_delete(
    State(state): State<AppState>,
    Query(params): Query<ComputeQuery>,
) -> Response {
    log::info!("computeDelete called");
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }

    let body = compute_request_params(&state, &params);
    match state.compute.forward(Method::DELETE, &body).await {
        Ok((status, content)) => {
            state.nonces.increment(&params.consumer_address);
            relay(to_axum_status(status), content)
        }
        Err(e) => service_unavailable(&e, context_of(&params)),
    }
}

/// PUT /compute: stop a running job.
pub async fn compute_stop(
    State(state): State<AppState>,
    Query(params): Query<ComputeQuery>,
) -> Response {
    log::info!("computeStop called");
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }

    let body = compute_request_params(&state, &params);
    match state.compute.forward(Method::PUT, &body).await {
        Ok((status, content)) => {
            state.nonces.increment(&params.consumer_address);
            relay(to_axum_status(status), content)
        }
        Err(e) => service_unavailable(&e, context_of(&params)),
    }
}

/// GET /compute: job status. Result locations are redacted unless the
/// caller presented a valid signature over `{owner}{jobId}{documentId}` and
/// their current nonce.
pub async fn compute_status(
    State(state): State<AppState>,
    Query(params): Query<ComputeQuery>,
) -> Response {
    log::info!("computeStatus called");
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }

    let body = compute_request_params(&state, &params);
    let (status, content) = match state.compute.forward(Method::GET, &body).await {
        Ok(reply) => reply,
        Err(e) => return service_unavailable(&e, context_of(&params)),
    };

    // Graceful degradation: a failed or absent signature filters the
    // response instead of rejecting the request.
    let mut signed_request = params.signature.is_some();
    if let Some(signature) = &params.signature {
        let owner = &params.consumer_address;
        let original_msg = format!(
            "{}{}{}",
            owner,
            params.job_id.clone().unwrap_or_default(),
            params.document_id.clone().unwrap_or_default()
        );
        if verify_signature(owner, signature, &original_msg, state.nonces.get(owner)).is_err() {
            signed_request = false;
        }
        state.nonces.increment(owner);
    }

    if signed_request {
        return relay(to_axum_status(status), content);
    }

    match redact_status_body(&content) {
        Ok(filtered) => relay(to_axum_status(status), filtered),
        Err(e) => service_unavailable(&e, context_of(&params)),
    }
}

fn redact_status_body(content: &[u8]) -> GatewayResult<Vec<u8>> {
    let parsed: Value = serde_json::from_slice(content)?;
    let jobs = match parsed {
        Value::Array(jobs) => jobs,
        other => vec![other],
    };

    let filtered: Vec<Value> = jobs
        .into_iter()
        .map(|mut job| {
            if let Value::Object(map) = &mut job {
                for key in REDACTED_KEYS {
                    map.remove(*key);
                }
            }
            job
        })
        .collect();

    Ok(serde_json::to_vec(&filtered)?)
}

/// POST /compute: start a job by pushing a workflow to the cluster.
pub async fn compute_start(
    State(state): State<AppState>,
    Json(payload): Json<ComputeStartRequest>,
) -> Response {
    log::info!("computeStart called");
    if let Err(message) = validate_address(&payload.consumer_address) {
        return validation_error(message);
    }

    let did = payload.document_id.clone().unwrap_or_default();
    let msg_to_sign = format!("{}{}", state.wallet.address(), did);

    let body = json!({
        "workflow": payload.workflow,
        "providerSignature": state.wallet.sign_message(&msg_to_sign),
        "documentId": payload.document_id,
        "agreementId": payload.transfer_tx_id,
        "owner": payload.consumer_address,
        "providerAddress": state.wallet.address(),
    });
    log::info!("Sending workflow to compute cluster");

    match state.compute.start(&body).await {
        Ok((status, content)) => {
            state.nonces.increment(&payload.consumer_address);
            relay(to_axum_status(status), content)
        }
        Err(e) => service_unavailable(
            &e,
            json!({
                "documentId": payload.document_id,
                "consumerAddress": payload.consumer_address,
            }),
        ),
    }
}

/// GET /computeResult: re-sign the request with the gateway credential and
/// stream the job result back through the download gateway.
pub async fn compute_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ComputeResultQuery>,
) -> Response {
    log::info!("computeResult endpoint called");
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }

    // Same message the consumer signed, countersigned with the gateway key.
    let msg_to_sign = format!(
        "{}{}{}",
        params.job_id, params.index, params.consumer_address
    );
    let provider_signature = state.wallet.sign_message(&msg_to_sign);

    let result_url = state.compute.result_url(&[
        ("index", params.index.to_string()),
        ("consumerAddress", params.consumer_address.clone()),
        ("jobId", params.job_id.clone()),
        (
            "consumerSignature",
            params.signature.clone().unwrap_or_default(),
        ),
        ("providerSignature", provider_signature),
    ]);
    log::debug!("Done processing computeResult, url: {}", result_url);
    state.nonces.increment(&params.consumer_address);

    match state
        .downloader
        .build_download_response(&headers, &result_url, &result_url, None)
        .await
    {
        Ok(response) => response,
        Err(e) => service_unavailable(
            &e,
            json!({
                "jobId": params.job_id,
                "index": params.index,
                "consumerAddress": params.consumer_address,
            }),
        ),
    }
}

fn context_of(params: &ComputeQuery) -> Value {
    json!({
        "documentId": params.document_id,
        "consumerAddress": params.consumer_address,
        "jobId": params.job_id,
    })
}
