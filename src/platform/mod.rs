//! Git hosting platforms.
//!
//! The workflow needs the same handful of calls from every host: who owns
//! the token, which organisations they belong to, whether a repository
//! exists, and how to create one. [GitPlatform] covers those; each host is
//! an independent client holding only its token and HTTP client.

pub mod gitee;
pub mod github;
pub mod gitlab;

pub use gitee::GiteeClient;
pub use github::GithubClient;
pub use gitlab::GitlabClient;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{PublishError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Hosting platform of the remote repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Github,
    Gitee,
    Gitlab,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 3] = [
        PlatformKind::Github,
        PlatformKind::Gitee,
        PlatformKind::Gitlab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Github => "github",
            PlatformKind::Gitee => "gitee",
            PlatformKind::Gitlab => "gitlab",
        }
    }

    /// Client for this platform authenticated with `token`
    pub fn client(&self, token: &str, config: &Config) -> Result<Box<dyn GitPlatform>> {
        Ok(match self {
            PlatformKind::Github => Box::new(GithubClient::new(token)?),
            PlatformKind::Gitee => Box::new(GiteeClient::new(token)?),
            PlatformKind::Gitlab => Box::new(GitlabClient::new(
                token,
                &config.gitlab.api_url,
                &config.gitlab.host,
            )?),
        })
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "github" => Ok(PlatformKind::Github),
            "gitee" => Ok(PlatformKind::Gitee),
            "gitlab" => Ok(PlatformKind::Gitlab),
            other => Err(PublishError::platform(format!(
                "unsupported platform '{}'",
                other
            ))),
        }
    }
}

/// Whether the repository lives under the user or an organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    User,
    Org,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::User => "user",
            OwnerKind::Org => "org",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "user" => Ok(OwnerKind::User),
            "org" => Ok(OwnerKind::Org),
            other => Err(PublishError::config(format!("unknown owner kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrgInfo {
    pub login: String,
    /// Numeric namespace id, needed by hosts that create by id
    #[serde(default)]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(default)]
    pub ssh_url: Option<String>,
}

/// REST surface of a git hosting platform
#[async_trait]
pub trait GitPlatform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Owner of the token
    async fn user(&self) -> Result<UserInfo>;

    /// Organisations the token owner belongs to
    async fn orgs(&self) -> Result<Vec<OrgInfo>>;

    /// `None` when the repository does not exist
    async fn repo(&self, login: &str, name: &str) -> Result<Option<RepoInfo>>;

    async fn create_repo(&self, name: &str) -> Result<RepoInfo>;

    async fn create_org_repo(&self, name: &str, org: &OrgInfo) -> Result<RepoInfo>;

    /// SSH remote of `login/name`
    fn remote_url(&self, login: &str, name: &str) -> String;

    /// Where the user creates a token
    fn token_url(&self) -> String;
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("cloud-publish/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PublishError::platform(format!("cannot build HTTP client: {}", e)))
}

/// Decode a successful response, anything else is a platform error
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::platform(format!(
            "{} returned {}: {}",
            url, status, body
        )));
    }
    Ok(response.json().await?)
}

/// Like [read_json] but a 404 is `None`
pub(crate) async fn read_optional_json<T: DeserializeOwned>(
    response: Response,
) -> Result<Option<T>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    read_json(response).await.map(Some)
}
