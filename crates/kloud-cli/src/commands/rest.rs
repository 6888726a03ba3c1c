//! 피드 서비스 REST 호출.

use anyhow::{anyhow, Context, Result};
use kloud_core::{Project, Rig, TokenMetrics};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// 피드 서비스 REST 클라이언트.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("Invalid service URL: {base}"))?;
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("Invalid request path: {path}"))
    }

    pub async fn rigs(&self) -> Result<Vec<Rig>> {
        self.get("/api/rigs").await
    }

    pub async fn rig(&self, id: &str) -> Result<Rig> {
        self.get(&format!("/api/rigs/{id}")).await
    }

    pub async fn command(&self, id: &str, command: &str) -> Result<Rig> {
        self.post(&format!("/api/rigs/{id}/command"), json!({ "command": command }))
            .await
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        self.get("/api/projects").await
    }

    pub async fn project(&self, id: &str) -> Result<Project> {
        self.get(&format!("/api/projects/{id}")).await
    }

    pub async fn fund(&self, id: &str, amount: Decimal) -> Result<Project> {
        self.post(&format!("/api/projects/{id}/fund"), json!({ "amount": amount }))
            .await
    }

    pub async fn token_metrics(&self) -> Result<TokenMetrics> {
        self.get("/api/token/metrics").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(&body).send().await?;
        decode(response).await
    }
}

/// 성공 응답은 본문을 디코드하고, 실패 응답은 `{"error": ...}` 메시지를 에러로 바꿉니다.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(anyhow!("{} {}", status.as_u16(), message))
}
