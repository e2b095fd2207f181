//! Router, shared application state and server startup.

use std::sync::Arc;

use anyhow::Result;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{compute, services};
use crate::clients::{
    AssetDirectoryClient, ComputeClusterClient, DocumentCodec, HttpLedgerClient, LedgerClient,
    RemoteCodec,
};
use crate::config::Config;
use crate::crypto::ProviderWallet;
use crate::errors::GatewayResult;
use crate::fetch::{ContentProbe, DownloadGateway};
use crate::nonce::NonceStore;
use crate::urlcheck::SafeUrlValidator;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub nonces: Arc<NonceStore>,
    pub wallet: Arc<ProviderWallet>,
    pub probe: Arc<ContentProbe>,
    pub downloader: Arc<DownloadGateway>,
    pub assets: Arc<AssetDirectoryClient>,
    pub ledger: Arc<dyn LedgerClient>,
    pub compute: Arc<ComputeClusterClient>,
    pub codec: Arc<dyn DocumentCodec>,
}

impl AppState {
    /// Wire up all components from configuration.
    pub fn new(config: Config) -> GatewayResult<Self> {
        let wallet = Arc::new(ProviderWallet::from_private_key(
            &config.provider_private_key,
        )?);
        let validator = Arc::new(SafeUrlValidator::new(config.allow_non_public_ip));
        let probe = Arc::new(ContentProbe::new(
            Arc::clone(&validator),
            config.requests_timeout,
        ));
        let downloader = Arc::new(DownloadGateway::new(
            Arc::clone(&validator),
            config.download_timeout,
            config.requests_chunk_size,
        ));
        let assets = Arc::new(AssetDirectoryClient::new(
            &config.aquarius_url,
            config.requests_timeout,
        ));
        let ledger: Arc<dyn LedgerClient> = Arc::new(HttpLedgerClient::new(
            &config.ledger_service_url,
            config.requests_timeout,
        ));
        let compute = Arc::new(ComputeClusterClient::new(
            &config.operator_service_url,
            config.requests_timeout,
        ));
        let codec: Arc<dyn DocumentCodec> = Arc::new(RemoteCodec::new(
            &config.codec_service_url,
            config.requests_timeout,
        ));

        Ok(Self {
            config: Arc::new(config),
            nonces: Arc::new(NonceStore::new()),
            wallet,
            probe,
            downloader,
            assets,
            ledger,
            compute,
            codec,
        })
    }
}

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(services::provider_info))
        .route("/nonce", get(services::nonce))
        .route("/encrypt", post(services::encrypt))
        .route("/fileinfo", post(services::fileinfo))
        .route("/initialize", get(services::initialize))
        .route("/download", get(services::download))
        .route(
            "/compute",
            get(compute::compute_status)
                .post(compute::compute_start)
                .put(compute::compute_stop)
                .delete(compute::compute_delete),
        )
        .route("/computeResult", get(compute::compute_result))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn start_server(config: Config) -> Result<()> {
    let listen_address = config.listen_address.clone();
    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    log::info!("provider gateway listening on http://{}", listen_address);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
