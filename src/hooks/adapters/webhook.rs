use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::WebhookConfig;
use crate::error::{BridgeError, Result};

use super::super::types::{DeliverySink, WebhookEnvelope};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-bridge-signature";

/// WebHook 投递客户端（不做重试）
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    endpoint: String,
    secret: Option<String>,
    headers: HashMap<String, String>,
}

impl WebhookClient {
    pub fn new(
        endpoint: impl Into<String>,
        secret: Option<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|err| BridgeError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            secret,
            headers,
        })
    }

    /// 从配置构建，未配置 URL 时返回 None
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>> {
        let Some(url) = config.url.as_deref().filter(|url| !url.is_empty()) else {
            return Ok(None);
        };
        Self::new(
            url,
            config.secret.clone(),
            config.headers.clone(),
            Duration::from_millis(config.timeout_ms),
        )
        .map(Some)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 计算请求体签名：`sha256=<hex>`
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| BridgeError::Config(format!("invalid webhook secret: {err}")))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

fn build_headers(
    request_builder: reqwest::RequestBuilder,
    signature: Option<String>,
    headers: &HashMap<String, String>,
) -> reqwest::RequestBuilder {
    let mut builder = request_builder.header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    for (key, value) in headers {
        builder = builder.header(key, value);
    }
    builder
}

#[async_trait]
impl DeliverySink for WebhookClient {
    async fn deliver(&self, envelope: &WebhookEnvelope) -> Result<()> {
        let body = serde_json::to_vec(envelope)?;
        let signature = match self.secret.as_deref() {
            Some(secret) => Some(sign_payload(secret, &body)?),
            None => None,
        };

        let builder = build_headers(self.client.post(&self.endpoint), signature, &self.headers);
        let response = builder.body(body).send().await?;

        if response.status().is_success() {
            debug!(
                endpoint = %self.endpoint,
                message_id = ?envelope.data.id,
                "webhook_delivered"
            );
            Ok(())
        } else {
            warn!(
                endpoint = %self.endpoint,
                status = %response.status(),
                message_id = ?envelope.data.id,
                "webhook_rejected"
            );
            Err(BridgeError::Delivery(format!(
                "webhook responded with {}",
                response.status()
            )))
        }
    }
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient")
            .field("endpoint", &self.endpoint)
            .field("signed", &self.secret.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}
