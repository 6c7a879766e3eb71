use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;

use super::{
    http_client, read_json, read_optional_json, GitPlatform, OrgInfo, PlatformKind, RepoInfo,
    UserInfo,
};
use crate::error::Result;

pub const GITHUB_API: &str = "https://api.github.com";

pub struct GithubClient {
    token: String,
    base_url: String,
    http: Client,
}

impl GithubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        Ok(GithubClient {
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }
}

#[async_trait]
impl GitPlatform for GithubClient {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Github
    }

    async fn user(&self) -> Result<UserInfo> {
        read_json(self.get("/user").send().await?).await
    }

    async fn orgs(&self) -> Result<Vec<OrgInfo>> {
        let response = self
            .get("/user/orgs")
            .query(&[("page", "1"), ("per_page", "100")])
            .send()
            .await?;
        read_json(response).await
    }

    async fn repo(&self, login: &str, name: &str) -> Result<Option<RepoInfo>> {
        let response = self
            .get(&format!("/repos/{}/{}", login, name))
            .send()
            .await?;
        read_optional_json(response).await
    }

    async fn create_repo(&self, name: &str) -> Result<RepoInfo> {
        let response = self
            .post("/user/repos")
            .json(&json!({ "name": name }))
            .send()
            .await?;
        read_json(response).await
    }

    async fn create_org_repo(&self, name: &str, org: &OrgInfo) -> Result<RepoInfo> {
        let response = self
            .post(&format!("/orgs/{}/repos", org.login))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        read_json(response).await
    }

    fn remote_url(&self, login: &str, name: &str) -> String {
        format!("git@github.com:{}/{}.git", login, name)
    }

    fn token_url(&self) -> String {
        "https://github.com/settings/tokens".to_string()
    }
}
