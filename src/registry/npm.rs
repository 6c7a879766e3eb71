//! npm registry metadata lookups.

use reqwest::{Client, StatusCode};
use semver::{Version, VersionReq};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{PublishError, Result};
use crate::platform::http_client;

#[derive(Debug, Deserialize)]
struct PackageInfo {
    #[serde(default)]
    versions: Map<String, Value>,
}

pub struct NpmRegistry {
    base_url: String,
    http: Client,
}

impl NpmRegistry {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(NpmRegistry {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    /// Every published version of `name`; unknown packages have none
    pub async fn versions(&self, name: &str) -> Result<Vec<Version>> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PublishError::registry(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(PublishError::registry(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let info: PackageInfo = response
            .json()
            .await
            .map_err(|e| PublishError::registry(e.to_string()))?;
        Ok(info
            .versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect())
    }

    /// Highest published version compatible with `^current`
    pub async fn latest_compatible(&self, name: &str, current: &Version) -> Result<Option<Version>> {
        let versions = self.versions(name).await?;
        Ok(latest_compatible(current, &versions))
    }
}

/// Highest of `versions` matching `^current`
pub fn latest_compatible(current: &Version, versions: &[Version]) -> Option<Version> {
    let req = VersionReq::parse(&format!("^{}", current)).ok()?;
    versions.iter().filter(|v| req.matches(v)).max().cloned()
}
