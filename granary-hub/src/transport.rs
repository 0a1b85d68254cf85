//! RPC transport seam.
//!
//! The hub speaks method-name-plus-positional-params RPC. The trait keeps
//! the client testable against an in-memory transport; the shipped
//! implementation posts a JSON envelope over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::error::HubError;

/// Connect timeout for hub calls. No read timeout is imposed on top of the
/// transport default: long-running builds are polled, never awaited on one
/// call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` with positional `params` against `endpoint`.
    async fn call(
        &self,
        endpoint: &Url,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, HubError>;
}

/// HTTP transport: `{"method", "params"}` request envelope, `{"result"}`
/// or `{"fault": {"code", "string"}}` response envelope.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HubError::client_with_source("failed to build HTTP client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(
        &self,
        endpoint: &Url,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, HubError> {
        let envelope = json!({ "method": method, "params": params });
        tracing::trace!(method, endpoint = %endpoint, "issuing hub call");

        let response = self
            .client
            .post(endpoint.clone())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| HubError::client_with_source(format!("call to '{method}' failed"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HubError::client(format!(
                "call to '{method}' returned HTTP {status}"
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            HubError::client_with_source(format!("unreadable response to '{method}'"), e)
        })?;

        if let Some(fault) = body.get("fault") {
            let code = fault.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = fault
                .get("string")
                .and_then(Value::as_str)
                .unwrap_or("unspecified hub fault")
                .to_owned();
            return Err(HubError::Fault { code, message });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| HubError::protocol(format!("response to '{method}' carries neither result nor fault")))
    }
}
