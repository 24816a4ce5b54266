//! HTTP client for communicating with the Mindcraft server.

use anyhow::{Context, Result};
use mindcraft_core::api::ApiResponse;
use mindcraft_core::config::ConfigEntry;
use mindcraft_core::events::{Event, Instance, NewEvent};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// HTTP client for the Mindcraft API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL of the push channel.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws", base)
    }

    // ── Endpoints ───────────────────────────────────────────────────────────

    /// The experiment catalog.
    pub async fn config(&self) -> Result<Vec<ConfigEntry>> {
        self.get_raw("/config").await
    }

    /// One experiment's history, grouped into instances.
    pub async fn experiment(&self, name: &str) -> Result<Vec<Instance>> {
        let url = format!("{}/experiment", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        Self::decode(check_status(resp).await?, &url).await
    }

    /// Submit one event; returns the stored form.
    pub async fn save(&self, event: &NewEvent) -> Result<Event> {
        let url = format!("{}/save", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let api_resp: ApiResponse<Event> = Self::decode(check_status(resp).await?, &url).await?;
        unwrap_data(api_resp)
    }

    // ── Generic requests ────────────────────────────────────────────────────

    /// Perform a GET request and unwrap the `ApiResponse` envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let api_resp: ApiResponse<T> = self.get_raw(path).await?;
        unwrap_data(api_resp)
    }

    /// Perform a GET request for an endpoint that answers with a bare body.
    pub async fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        Self::decode(check_status(resp).await?, &url).await
    }

    async fn decode<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T> {
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or(body);
    anyhow::bail!("API error ({}): {}", status, message)
}

fn unwrap_data<T>(api_resp: ApiResponse<T>) -> Result<T> {
    if api_resp.success {
        api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    } else {
        Err(anyhow::anyhow!(
            "API error: {}",
            api_resp.error.unwrap_or_else(|| "Unknown error".into())
        ))
    }
}
