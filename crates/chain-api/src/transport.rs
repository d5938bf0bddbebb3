use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::TransportError;

/// Node access used by adapters.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// JSON-RPC 2.0 call; returns the `result` member.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// REST `GET {endpoint}/{path}` returning JSON.
    async fn get_json(&self, path: &str) -> Result<Value, TransportError>;

    /// REST `POST {endpoint}/{path}` with a plain-text body.
    async fn post_text(&self, path: &str, body: String) -> Result<String, TransportError>;

    fn endpoint(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// `reqwest`-backed transport. Cloning shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    inner: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let inner = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        Ok(Self {
            inner,
            url: url.into().trim_end_matches('/').to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn path_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

fn map_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(endpoint = %self.url, method, id, "json-rpc request");

        let response = self
            .inner
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response).await?;
        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))?;

        if let Some(error) = body.error {
            let message = match error.data {
                Some(Value::String(detail)) if !error.message.contains(&detail) => {
                    format!("{}: {detail}", error.message)
                }
                _ => error.message,
            };
            return Err(TransportError::Rpc {
                code: error.code,
                message,
            });
        }
        body.result
            .ok_or_else(|| TransportError::Decode(format!("{method}: response has no result")))
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.path_url(path);
        debug!(%url, "GET");
        let response = self.inner.get(&url).send().await.map_err(map_send_error)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn post_text(&self, path: &str, body: String) -> Result<String, TransportError> {
        let url = self.path_url(path);
        debug!(%url, body_len = body.len(), "POST");
        let response = self
            .inner
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response)
            .await?
            .text()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let t = HttpTransport::new("https://blockstream.info/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(t.endpoint(), "https://blockstream.info/api");
        assert_eq!(t.path_url("/address/x/utxo"), "https://blockstream.info/api/address/x/utxo");
        assert_eq!(t.path_url("tx"), "https://blockstream.info/api/tx");
    }

    #[test]
    fn clones_share_request_ids() {
        let a = HttpTransport::new("http://localhost:8545", Duration::from_secs(1)).unwrap();
        let b = a.clone();
        a.next_id.fetch_add(5, Ordering::Relaxed);
        assert_eq!(b.next_id.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn json_rpc_error_parses() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "nonce too low");
        assert!(resp.result.is_none());
    }
}
