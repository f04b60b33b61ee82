//! HTTP client for the internal RPC endpoints of peer nodes.

use crate::error::{ClusterError, ClusterResult};
use crate::membership::types::Node;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
const REQUEST_ATTEMPTS: usize = 3;

#[derive(Clone, Default)]
pub struct PeerClient {
    http_client: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// POSTs `payload` with a short timeout and bounded retries.
    pub async fn post<T, R>(&self, node: &Node, endpoint: &str, payload: &T) -> ClusterResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = url(node, endpoint);
        let response = self
            .send_with_retry(
                || {
                    self.http_client
                        .post(url.as_str())
                        .json(payload)
                        .timeout(REQUEST_TIMEOUT)
                },
                REQUEST_ATTEMPTS,
            )
            .await?;

        decode(endpoint, response).await
    }

    /// POSTs once and waits for as long as the peer takes to answer.
    ///
    /// Used for requests that legitimately block on the remote side (lock
    /// acquisition) and must not be replayed.
    pub async fn post_blocking<T, R>(
        &self,
        node: &Node,
        endpoint: &str,
        payload: &T,
    ) -> ClusterResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(url(node, endpoint))
            .json(payload)
            .send()
            .await?;

        decode(endpoint, response).await
    }

    pub async fn get<R>(&self, node: &Node, endpoint: &str) -> ClusterResult<R>
    where
        R: DeserializeOwned,
    {
        let url = url(node, endpoint);
        let response = self
            .send_with_retry(
                || self.http_client.get(url.as_str()).timeout(REQUEST_TIMEOUT),
                REQUEST_ATTEMPTS,
            )
            .await?;

        decode(endpoint, response).await
    }

    async fn send_with_retry<F>(
        &self,
        request: F,
        attempts: usize,
    ) -> ClusterResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            match request().send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(ClusterError::Http(e));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(ClusterError::Rpc {
            endpoint: "<none>".to_string(),
            status: "Retry attempts exhausted".to_string(),
        })
    }
}

fn url(node: &Node, endpoint: &str) -> String {
    format!("http://{}{}", node.rpc_addr, endpoint)
}

async fn decode<R: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> ClusterResult<R> {
    if !response.status().is_success() {
        return Err(ClusterError::Rpc {
            endpoint: endpoint.to_string(),
            status: response.status().to_string(),
        });
    }

    Ok(response.json().await?)
}
