//! HTTP client for the Luffa robot API

use super::types::GatewayReply;
use super::{GatewayError, MessageSink, MessageSource};
use crate::config::GatewayConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LuffaClient {
    client: Client,
    base_url: String,
    secret: String,
}

impl LuffaClient {
    pub fn new(base_url: &str, secret: String) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    /// `None` when no robot secret is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        config
            .secret
            .clone()
            .map(|secret| Self::new(&config.base_url, secret))
            .transpose()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn receive_body(&self) -> Value {
        json!({ "secret": self.secret })
    }

    fn send_body(&self, uid: &str, text: &str) -> Value {
        // The API expects `msg` as a JSON-encoded string, not an object.
        json!({
            "secret": self.secret,
            "uid": uid,
            "msg": json!({ "text": text }).to_string(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(reqwest::StatusCode, String), GatewayError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to read response: {e}")))?;
        Ok((status, text))
    }
}

#[async_trait]
impl MessageSource for LuffaClient {
    async fn receive(&self) -> Result<GatewayReply, GatewayError> {
        let (status, body) = self.post("receive", &self.receive_body()).await?;

        if !status.is_success() {
            // Error objects can arrive with a non-2xx status; keep them classifiable.
            return match serde_json::from_str::<Value>(&body) {
                Ok(value @ Value::Object(_)) => Ok(GatewayReply::from_value(value)),
                _ => Err(GatewayError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        let value = serde_json::from_str::<Value>(&body)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(GatewayReply::from_value(value))
    }
}

#[async_trait]
impl MessageSink for LuffaClient {
    async fn send(&self, uid: &str, text: &str) -> Result<(), GatewayError> {
        let (status, body) = self.post("send", &self.send_body(uid, text)).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
