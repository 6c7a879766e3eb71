use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::ComponentFile;
use crate::error::{PublishError, Result};
use crate::platform::http_client;

/// Component section of an upload
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentUpload {
    #[serde(flatten)]
    pub file: ComponentFile,
    /// Example page file names, `index*.html`
    pub example_list: Vec<String>,
    /// Absolute directory holding the example pages
    pub example_real_path: String,
}

/// Where the component's source lives
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GitDescriptor {
    #[serde(rename = "type")]
    pub platform: String,
    pub remote: String,
    pub version: String,
    pub branch: String,
    pub login: String,
    pub owner: String,
}

/// Body of `POST /api/v1/components`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComponentDescriptor {
    pub component: ComponentUpload,
    pub git: GitDescriptor,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    data: Value,
}

/// Registry that records published components
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// `Some(data)` when accepted, `None` when the registry declined
    async fn create_component(&self, descriptor: &ComponentDescriptor) -> Result<Option<Value>>;
}

pub struct HttpComponentRegistry {
    base_url: String,
    http: Client,
}

impl HttpComponentRegistry {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(HttpComponentRegistry {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl ComponentRegistry for HttpComponentRegistry {
    async fn create_component(&self, descriptor: &ComponentDescriptor) -> Result<Option<Value>> {
        let url = format!("{}/api/v1/components", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(descriptor)
            .send()
            .await
            .map_err(|e| PublishError::registry(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::registry(format!("{} returned {}", url, status)));
        }
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| PublishError::registry(e.to_string()))?;
        debug!(code = body.code, "component registry response");

        Ok((body.code == 0).then_some(body.data))
    }
}
