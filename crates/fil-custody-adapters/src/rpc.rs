use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fil_custody_core::PortError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

/// Minimal JSON-RPC 2.0 client over HTTP POST.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: String,
    token: Option<String>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            token,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Calls `method`. A `null` result is passed to `T`, so nullable results
    /// should be requested as `Option<_>`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "json-rpc request");

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| map_reqwest(method, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest(method, e))?;

        let envelope: RpcResponse = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(PortError::Transport(format!("{method}: http status {status}")))
            }
            Err(e) => return Err(PortError::Decode(format!("{method}: invalid response: {e}"))),
        };
        if let Some(error) = envelope.error {
            return Err(PortError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| PortError::Decode(format!("{method}: unexpected result: {e}")))
    }
}

fn map_reqwest(context: &str, err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout(format!("{context}: {err}"))
    } else {
        PortError::Transport(format!("{context}: {err}"))
    }
}
