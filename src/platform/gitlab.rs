use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use super::{
    http_client, read_json, read_optional_json, GitPlatform, OrgInfo, PlatformKind, RepoInfo,
    UserInfo,
};
use crate::error::{PublishError, Result};

/// Self-hosted or gitlab.com v4 API
pub struct GitlabClient {
    token: String,
    api_url: String,
    host: String,
    http: Client,
}

#[derive(Deserialize)]
struct GitlabUser {
    username: String,
}

#[derive(Deserialize)]
struct GitlabGroup {
    id: u64,
    full_path: String,
}

#[derive(Deserialize)]
struct GitlabProject {
    path: String,
    #[serde(default)]
    ssh_url_to_repo: Option<String>,
}

impl From<GitlabProject> for RepoInfo {
    fn from(project: GitlabProject) -> Self {
        RepoInfo {
            name: project.path,
            ssh_url: project.ssh_url_to_repo,
        }
    }
}

impl GitlabClient {
    pub fn new(token: &str, api_url: &str, host: &str) -> Result<Self> {
        Ok(GitlabClient {
            token: token.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            host: host.to_string(),
            http: http_client()?,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.api_url, path))
            .header("PRIVATE-TOKEN", &self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.api_url, path))
            .header("PRIVATE-TOKEN", &self.token)
    }
}

#[async_trait]
impl GitPlatform for GitlabClient {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Gitlab
    }

    async fn user(&self) -> Result<UserInfo> {
        let user: GitlabUser = read_json(self.get("/user").send().await?).await?;
        Ok(UserInfo {
            login: user.username,
        })
    }

    async fn orgs(&self) -> Result<Vec<OrgInfo>> {
        // 30 is developer access, the minimum to create projects
        let response = self
            .get("/groups")
            .query(&[("min_access_level", "30"), ("per_page", "100")])
            .send()
            .await?;
        let groups: Vec<GitlabGroup> = read_json(response).await?;
        Ok(groups
            .into_iter()
            .map(|g| OrgInfo {
                login: g.full_path,
                id: Some(g.id),
            })
            .collect())
    }

    async fn repo(&self, login: &str, name: &str) -> Result<Option<RepoInfo>> {
        let id = format!("{}/{}", login, name).replace('/', "%2F");
        let response = self.get(&format!("/projects/{}", id)).send().await?;
        let project: Option<GitlabProject> = read_optional_json(response).await?;
        Ok(project.map(RepoInfo::from))
    }

    async fn create_repo(&self, name: &str) -> Result<RepoInfo> {
        let response = self
            .post("/projects")
            .json(&json!({ "name": name, "path": name }))
            .send()
            .await?;
        let project: GitlabProject = read_json(response).await?;
        Ok(project.into())
    }

    async fn create_org_repo(&self, name: &str, org: &OrgInfo) -> Result<RepoInfo> {
        let namespace = org.id.ok_or_else(|| {
            PublishError::platform(format!("group '{}' has no namespace id", org.login))
        })?;
        let response = self
            .post("/projects")
            .json(&json!({ "name": name, "path": name, "namespace_id": namespace }))
            .send()
            .await?;
        let project: GitlabProject = read_json(response).await?;
        Ok(project.into())
    }

    fn remote_url(&self, login: &str, name: &str) -> String {
        format!("git@{}:{}/{}.git", self.host, login, name)
    }

    fn token_url(&self) -> String {
        format!("https://{}/-/profile/personal_access_tokens", self.host)
    }
}
