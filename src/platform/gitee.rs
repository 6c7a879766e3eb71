use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;

use super::{
    http_client, read_json, read_optional_json, GitPlatform, OrgInfo, PlatformKind, RepoInfo,
    UserInfo,
};
use crate::error::Result;

pub const GITEE_API: &str = "https://gitee.com/api/v5";

/// Gitee v5 API; the token travels as `access_token` parameter
pub struct GiteeClient {
    token: String,
    base_url: String,
    http: Client,
}

impl GiteeClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITEE_API)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        Ok(GiteeClient {
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("access_token", self.token.as_str())])
    }

    fn post(&self, path: &str, name: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .json(&json!({ "access_token": self.token, "name": name }))
    }
}

#[async_trait]
impl GitPlatform for GiteeClient {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Gitee
    }

    async fn user(&self) -> Result<UserInfo> {
        read_json(self.get("/user").send().await?).await
    }

    async fn orgs(&self) -> Result<Vec<OrgInfo>> {
        let user = self.user().await?;
        let response = self
            .get(&format!("/users/{}/orgs", user.login))
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
        read_json(self.post("/user/repos", name).send().await?).await
    }

    async fn create_org_repo(&self, name: &str, org: &OrgInfo) -> Result<RepoInfo> {
        let path = format!("/orgs/{}/repos", org.login);
        read_json(self.post(&path, name).send().await?).await
    }

    fn remote_url(&self, login: &str, name: &str) -> String {
        format!("git@gitee.com:{}/{}.git", login, name)
    }

    fn token_url(&self) -> String {
        "https://gitee.com/personal_access_tokens".to_string()
    }
}
