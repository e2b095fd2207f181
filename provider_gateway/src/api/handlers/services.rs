//! Service endpoints: nonce retrieval, document encryption, file probing,
//! service initialization and asset download.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::api::errors::{service_unavailable, validation_error};
use crate::api::server::AppState;
use crate::api::validation::{
    validate_address, validate_signature, DownloadQuery, EncryptRequest, FileInfoRequest,
    InitializeQuery, NonceQuery,
};
use crate::clients::ledger::{record_consume_request, validate_transfer_not_used_for_other_service};
use crate::clients::{files_list_from_json, url_at_index};
use crate::crypto::verify_signature;
use crate::errors::{GatewayError, GatewayResult};
use crate::fetch::append_userdata;

/// Provider info served at the root, used by peers to identify this gateway.
pub async fn provider_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "providerAddress": state.wallet.address(),
        "serviceName": "provider_gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Returns the current nonce for an account address.
pub async fn nonce(State(state): State<AppState>, Query(params): Query<NonceQuery>) -> Response {
    log::info!("nonce endpoint called");
    if let Err(message) = validate_address(&params.user_address) {
        return validation_error(message);
    }

    let nonce = state.nonces.get(&params.user_address);
    log::info!("nonce for user {} is {}", params.user_address, nonce);
    Json(json!({ "nonce": nonce })).into_response()
}

/// Encrypt a file-location document on behalf of a publisher.
pub async fn encrypt(
    State(state): State<AppState>,
    Json(payload): Json<EncryptRequest>,
) -> Response {
    log::info!("encrypt endpoint called, documentId {}", payload.document_id);
    if let Err(message) = validate_address(&payload.publisher_address) {
        return validation_error(message);
    }

    let result = async {
        // Re-serialize compactly so equivalent documents encrypt identically.
        let document: Value = serde_json::from_str(&payload.document)?;
        let compact = serde_json::to_string(&document)?;
        state.codec.encrypt(&compact).await
    }
    .await;

    match result {
        Ok(encrypted_document) => {
            log::info!(
                "encrypted urls {}, publisher {}, documentId {}",
                encrypted_document,
                payload.publisher_address,
                payload.document_id
            );
            state.nonces.increment(&payload.publisher_address);
            (
                StatusCode::CREATED,
                Json(json!({ "encryptedDocument": encrypted_document })),
            )
                .into_response()
        }
        Err(e) => service_unavailable(
            &e,
            json!({
                "providerAddress": state.wallet.address(),
                "documentId": payload.document_id,
                "publisherAddress": payload.publisher_address,
            }),
        ),
    }
}

/// Probe the file(s) of a URL or asset for content type/length and an
/// optional checksum.
pub async fn fileinfo(
    State(state): State<AppState>,
    Json(payload): Json<FileInfoRequest>,
) -> Response {
    log::info!("fileinfo endpoint called");
    if let Err(message) = payload.validate() {
        return validation_error(message);
    }

    let urls: GatewayResult<Vec<String>> = match &payload.did {
        Some(did) => {
            match state.assets.get_asset(did).await {
                Ok(asset) => files_list_from_json(state.codec.as_ref(), &asset.encrypted_files)
                    .await
                    .map(|files| files.into_iter().map(|f| f.url).collect()),
                Err(e) => Err(e),
            }
        }
        None => Ok(vec![payload.url.clone().unwrap_or_default()]),
    };

    let urls = match urls {
        Ok(urls) => urls,
        Err(e) => {
            return service_unavailable(&e, json!({ "did": payload.did, "url": payload.url }))
        }
    };

    let mut files_info = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let (valid, details) = state.probe.check_url_details(url, payload.checksum).await;
        let mut entry = serde_json::Map::new();
        entry.insert("index".to_string(), json!(index));
        entry.insert("valid".to_string(), json!(valid));
        if let Ok(Value::Object(map)) = serde_json::to_value(&details) {
            entry.extend(map);
        }
        files_info.push(Value::Object(entry));
    }

    Json(files_info).into_response()
}

/// Prepare the token-transfer parameters a consumer must sign to pay for a
/// service.
pub async fn initialize(
    State(state): State<AppState>,
    Query(params): Query<InitializeQuery>,
) -> Response {
    log::info!("initialize endpoint called, documentId {}", params.document_id);
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }

    let context = json!({
        "documentId": params.document_id,
        "serviceId": params.service_id,
        "consumerAddress": params.consumer_address,
        "dataToken": params.data_token,
    });

    let result: GatewayResult<Response> = async {
        let asset = state.assets.get_asset(&params.document_id).await?;
        let service = asset.service_by_index(params.service_id)?;

        if !asset.consumable {
            let message = format!("Error: Access to asset {} was denied.", asset.did);
            log::error!("{}", message);
            return Ok(validation_error(message));
        }

        let url = url_at_index(state.codec.as_ref(), &asset.encrypted_files, 0).await?;
        let download_url = append_userdata(&url, params.userdata.as_ref());
        let (valid, _) = state.probe.check_url_details(&download_url, false).await;
        if !valid {
            log::error!("Error: Asset URL not found or not available.");
            return Ok(validation_error("Asset URL not found or not available."));
        }

        let (compute_address, _limits) = state.compute.compute_info().await;
        let minter = state.ledger.datatoken_minter(&params.data_token).await?;

        Ok(Json(json!({
            "from": params.consumer_address,
            "to": minter,
            "numTokens": service.cost,
            "dataToken": params.data_token,
            "nonce": state.nonces.get(&params.consumer_address),
            "computeAddress": compute_address,
        }))
        .into_response())
    }
    .await;

    match result {
        Ok(response) => response,
        Err(e) => service_unavailable(&e, context),
    }
}

/// Stream an asset file to an authorized consumer.
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DownloadQuery>,
) -> Response {
    log::info!(
        "download endpoint called, documentId {}, consumer {}",
        params.document_id,
        params.consumer_address
    );
    if let Err(message) = validate_address(&params.consumer_address) {
        return validation_error(message);
    }
    if let Err(message) = validate_signature(&params.signature) {
        return validation_error(message);
    }

    // Replay-resistant authorization: the consumer signs the document id
    // plus their current nonce.
    let nonce = state.nonces.get(&params.consumer_address);
    if let Err(e) = verify_signature(
        &params.consumer_address,
        &params.signature,
        &params.document_id,
        nonce,
    ) {
        return e.into_response();
    }

    let context = json!({
        "documentId": params.document_id,
        "consumerAddress": params.consumer_address,
        "serviceId": params.service_id,
        "serviceType": params.service_type,
    });

    let result: GatewayResult<Response> = async {
        let asset = state.assets.get_asset(&params.document_id).await?;
        let service = asset.service_by_index(params.service_id)?;

        if !asset.consumable {
            let message = format!("Error: Access to asset {} was denied.", asset.did);
            log::error!("{}", message);
            return Ok(validation_error(message));
        }

        log::info!("validate_order called from download endpoint.");
        state
            .ledger
            .validate_order(
                &params.transfer_tx_id,
                &params.document_id,
                params.service_id,
                &service.cost,
                &params.consumer_address,
            )
            .await?;
        validate_transfer_not_used_for_other_service(
            &params.document_id,
            params.service_id,
            &params.transfer_tx_id,
            &params.consumer_address,
            &params.data_token,
        );
        record_consume_request(
            &params.document_id,
            params.service_id,
            &params.transfer_tx_id,
            &params.consumer_address,
            &params.data_token,
            &service.cost,
        );

        if service.service_type != "access" {
            return Err(GatewayError::MalformedRequest(format!(
                "service {} is not an access service",
                params.service_id
            )));
        }

        let content_type = asset.content_type_at_index(params.file_index);
        let url = url_at_index(
            state.codec.as_ref(),
            &asset.encrypted_files,
            params.file_index,
        )
        .await?;
        let download_url = append_userdata(&url, params.userdata.as_ref());

        log::info!(
            "Done processing consume request for asset {}, url {}",
            params.document_id,
            download_url
        );
        state.nonces.increment(&params.consumer_address);
        state
            .downloader
            .build_download_response(&headers, &url, &download_url, content_type)
            .await
    }
    .await;

    match result {
        Ok(response) => response,
        Err(e) => {
            log::error!("Error preparing file download response: {}", e);
            service_unavailable(&e, context)
        }
    }
}
