//! Payment ledger interface.
//!
//! Given a transaction id, the ledger either confirms or denies that the
//! expected token transfer happened. Settlement itself is out of scope.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{GatewayError, GatewayResult};

/// Order verification and token metadata lookups.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Confirm that `tx_id` paid `amount` tokens from `sender` for the given
    /// document/service. Errors when the transfer cannot be confirmed.
    async fn validate_order(
        &self,
        tx_id: &str,
        did: &str,
        service_id: u32,
        amount: &str,
        sender: &str,
    ) -> GatewayResult<()>;

    /// Account address of the datatoken minter (the payment receiver).
    async fn datatoken_minter(&self, token_address: &str) -> GatewayResult<String>;
}

/// HTTP implementation against the configured ledger verification service.
pub struct HttpLedgerClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct OrderReply {
    confirmed: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct MinterReply {
    minter: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn validate_order(
        &self,
        tx_id: &str,
        did: &str,
        service_id: u32,
        amount: &str,
        sender: &str,
    ) -> GatewayResult<()> {
        log::debug!(
            "validate_order: did={}, service_id={}, tx_id={}, sender={}, amount={}",
            did,
            service_id,
            tx_id,
            sender,
            amount
        );

        let response = self
            .client
            .post(format!("{}/validateOrder", self.base_url))
            .json(&json!({
                "txId": tx_id,
                "did": did,
                "serviceId": service_id,
                "amount": amount,
                "sender": sender,
            }))
            .send()
            .await?
            .error_for_status()?;

        let reply: OrderReply = response.json().await?;
        if reply.confirmed {
            Ok(())
        } else {
            Err(GatewayError::UpstreamUnavailable(format!(
                "order {} not confirmed: {}",
                tx_id,
                reply.reason.unwrap_or_else(|| "unknown".to_string())
            )))
        }
    }

    async fn datatoken_minter(&self, token_address: &str) -> GatewayResult<String> {
        let response = self
            .client
            .get(format!("{}/minter/{}", self.base_url, token_address))
            .send()
            .await?
            .error_for_status()?;
        let reply: MinterReply = response.json().await?;
        Ok(reply.minter)
    }
}

/// Order bookkeeping hooks. The original service only logs these; kept as
/// explicit call sites so the behavior stays visible.
pub fn validate_transfer_not_used_for_other_service(
    did: &str,
    service_id: u32,
    transfer_tx_id: &str,
    consumer_address: &str,
    token_address: &str,
) {
    log::debug!(
        "validate_transfer_not_used_for_other_service: did={}, service_id={}, transfer_tx_id={}, consumer_address={}, token_address={}",
        did,
        service_id,
        transfer_tx_id,
        consumer_address,
        token_address
    );
}

pub fn record_consume_request(
    did: &str,
    service_id: u32,
    order_tx_id: &str,
    consumer_address: &str,
    token_address: &str,
    amount: &str,
) {
    log::debug!(
        "record_consume_request: did={}, service_id={}, transfer_tx_id={}, consumer_address={}, token_address={}, amount={}",
        did,
        service_id,
        order_tx_id,
        consumer_address,
        token_address,
        amount
    );
}
