//! Hosting provider releases (GitHub, GitLab).

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{HostedReleaseConfig, Provider};
use crate::error::{Result, ShipwrightError};

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub tag: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

/// A release as it exists on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedRelease {
    /// Provider-specific identifier used for deletion.
    pub id: String,
    pub tag: String,
    #[serde(default)]
    pub url: String,
}

/// A hosting provider able to publish releases for a tag.
pub trait ReleaseHost: Send + Sync {
    fn provider(&self) -> Provider;

    fn create_release(&self, request: &ReleaseRequest) -> Result<HostedRelease>;

    fn find_release(&self, tag: &str) -> Result<Option<HostedRelease>>;

    fn delete_release(&self, release: &HostedRelease) -> Result<()>;
}

/// Build the client for the configured provider.
///
/// The API token is read from the environment variable named by the
/// configuration. A missing token is a `VALIDATION` error unless `dry_run`
/// is set.
pub fn client_for(config: &HostedReleaseConfig, dry_run: bool) -> Result<Box<dyn ReleaseHost>> {
    let repository = config.repository.clone().ok_or_else(|| {
        ShipwrightError::validation("release.repository is required to publish releases")
            .in_component("host")
    })?;
    let token = match std::env::var(config.token_env()) {
        Ok(token) if !token.trim().is_empty() => token,
        _ if dry_run => String::new(),
        _ => {
            return Err(ShipwrightError::validation(format!(
                "{} is not set; it must hold a {} API token",
                config.token_env(),
                config.provider
            ))
            .in_component("host"))
        }
    };

    let http = HttpApi::new(config.api_url(), token, dry_run)?;
    Ok(match config.provider {
        Provider::Github => Box::new(GitHubClient::new(http, repository)),
        Provider::Gitlab => Box::new(GitLabClient::new(http, repository)),
    })
}

/// Shared HTTP plumbing for the provider clients.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: String,
    dry_run: bool,
}

impl HttpApi {
    pub fn new(base_url: &str, token: impl Into<String>, dry_run: bool) -> Result<Self> {
        Self::with_timeout(base_url, token, dry_run, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: &str,
        token: impl Into<String>,
        dry_run: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shipwright/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            dry_run,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn status_error(provider: Provider, action: &str, response: Response) -> ShipwrightError {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("{} {} failed: HTTP {}", provider, action, status)
    } else {
        format!("{} {} failed: HTTP {}: {}", provider, action, status, detail)
    };
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ShipwrightError::validation(message),
        StatusCode::NOT_FOUND => ShipwrightError::not_found(message),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => ShipwrightError::conflict(message),
        s if s.is_server_error() => ShipwrightError::io(message).retryable(),
        _ => ShipwrightError::failed(message),
    };
    err.in_component("host")
}

fn send(provider: Provider, action: &str, request: RequestBuilder) -> Result<Response> {
    let response = request.send().map_err(|e| {
        ShipwrightError::from(e)
            .context(format!("{} {}", provider, action))
            .in_component("host")
    })?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(provider, action, response))
    }
}

fn dry_run_release(request: &ReleaseRequest) -> HostedRelease {
    info!("[dry-run] would publish release {}", request.tag);
    HostedRelease {
        id: "dry-run".to_string(),
        tag: request.tag.clone(),
        url: String::new(),
    }
}

#[derive(Debug, Serialize)]
struct GitHubCreate<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    id: u64,
    tag_name: String,
    #[serde(default)]
    html_url: String,
}

impl From<GitHubRelease> for HostedRelease {
    fn from(r: GitHubRelease) -> Self {
        Self {
            id: r.id.to_string(),
            tag: r.tag_name,
            url: r.html_url,
        }
    }
}

/// GitHub REST API client for `owner/repo`.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: HttpApi,
    repository: String,
}

impl GitHubClient {
    pub fn new(api: HttpApi, repository: impl Into<String>) -> Self {
        Self {
            api,
            repository: repository.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api.token)
            .header("Accept", "application/vnd.github+json")
    }
}

impl ReleaseHost for GitHubClient {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn create_release(&self, request: &ReleaseRequest) -> Result<HostedRelease> {
        if self.api.dry_run {
            return Ok(dry_run_release(request));
        }
        let url = self.api.url(&format!("/repos/{}/releases", self.repository));
        debug!("POST {}", url);
        let payload = GitHubCreate {
            tag_name: &request.tag,
            name: &request.name,
            body: &request.body,
            draft: request.draft,
            prerelease: request.prerelease,
        };
        let response = send(
            self.provider(),
            "create release",
            self.authorized(self.api.client.post(&url)).json(&payload),
        )?;
        Ok(response.json::<GitHubRelease>()?.into())
    }

    fn find_release(&self, tag: &str) -> Result<Option<HostedRelease>> {
        let url = self.api.url(&format!(
            "/repos/{}/releases/tags/{}",
            self.repository,
            encode_segment(tag)
        ));
        debug!("GET {}", url);
        match send(
            self.provider(),
            "find release",
            self.authorized(self.api.client.get(&url)),
        ) {
            Ok(response) => Ok(Some(response.json::<GitHubRelease>()?.into())),
            Err(err) if err.code() == crate::error::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn delete_release(&self, release: &HostedRelease) -> Result<()> {
        if self.api.dry_run {
            info!("[dry-run] would delete release {}", release.tag);
            return Ok(());
        }
        let url = self
            .api
            .url(&format!("/repos/{}/releases/{}", self.repository, release.id));
        debug!("DELETE {}", url);
        send(
            self.provider(),
            "delete release",
            self.authorized(self.api.client.delete(&url)),
        )
        .map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct GitLabCreate<'a> {
    tag_name: &'a str,
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitLabRelease {
    tag_name: String,
    #[serde(default, rename = "_links")]
    links: GitLabLinks,
}

#[derive(Debug, Default, Deserialize)]
struct GitLabLinks {
    #[serde(rename = "self", default)]
    web: String,
}

impl From<GitLabRelease> for HostedRelease {
    fn from(r: GitLabRelease) -> Self {
        Self {
            id: r.tag_name.clone(),
            tag: r.tag_name,
            url: r.links.web,
        }
    }
}

/// GitLab REST API client for a `group/project` path.
///
/// GitLab has no draft releases; `draft` is ignored.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    api: HttpApi,
    project: String,
}

impl GitLabClient {
    pub fn new(api: HttpApi, project: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
        }
    }

    fn releases_url(&self) -> String {
        self.api
            .url(&format!("/projects/{}/releases", encode_segment(&self.project)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.api.token)
    }
}

impl ReleaseHost for GitLabClient {
    fn provider(&self) -> Provider {
        Provider::Gitlab
    }

    fn create_release(&self, request: &ReleaseRequest) -> Result<HostedRelease> {
        if self.api.dry_run {
            return Ok(dry_run_release(request));
        }
        let url = self.releases_url();
        debug!("POST {}", url);
        let payload = GitLabCreate {
            tag_name: &request.tag,
            name: &request.name,
            description: &request.body,
        };
        let response = send(
            self.provider(),
            "create release",
            self.authorized(self.api.client.post(&url)).json(&payload),
        )?;
        Ok(response.json::<GitLabRelease>()?.into())
    }

    fn find_release(&self, tag: &str) -> Result<Option<HostedRelease>> {
        let url = format!("{}/{}", self.releases_url(), encode_segment(tag));
        debug!("GET {}", url);
        match send(
            self.provider(),
            "find release",
            self.authorized(self.api.client.get(&url)),
        ) {
            Ok(response) => Ok(Some(response.json::<GitLabRelease>()?.into())),
            Err(err) if err.code() == crate::error::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn delete_release(&self, release: &HostedRelease) -> Result<()> {
        if self.api.dry_run {
            info!("[dry-run] would delete release {}", release.tag);
            return Ok(());
        }
        let url = format!("{}/{}", self.releases_url(), encode_segment(&release.id));
        debug!("DELETE {}", url);
        send(
            self.provider(),
            "delete release",
            self.authorized(self.api.client.delete(&url)),
        )
        .map(|_| ())
    }
}

/// Percent-encode a single URL path segment.
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> ReleaseRequest {
        ReleaseRequest {
            tag: "v1.2.0".to_string(),
            name: "v1.2.0".to_string(),
            body: "notes".to_string(),
            draft: false,
            prerelease: false,
        }
    }

    fn github(server: &MockServer, dry_run: bool) -> GitHubClient {
        let api = HttpApi::new(&server.base_url(), "secret-token", dry_run).unwrap();
        GitHubClient::new(api, "acme/widgets")
    }

    fn gitlab(server: &MockServer) -> GitLabClient {
        let api = HttpApi::new(&server.base_url(), "secret-token", false).unwrap();
        GitLabClient::new(api, "4242")
    }

    #[test]
    fn github_create_release() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/releases")
                .header("Authorization", "Bearer secret-token")
                .body_includes("\"tag_name\":\"v1.2.0\"");
            then.status(201).json_body(json!({
                "id": 42,
                "tag_name": "v1.2.0",
                "html_url": "https://github.com/acme/widgets/releases/tag/v1.2.0"
            }));
        });

        let release = github(&server, false).create_release(&request()).unwrap();

        mock.assert();
        assert_eq!(release.id, "42");
        assert_eq!(release.tag, "v1.2.0");
        assert!(release.url.ends_with("/v1.2.0"));
    }

    #[test]
    fn github_existing_release_is_conflict() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/repos/acme/widgets/releases");
            then.status(422).body("already_exists");
        });

        let err = github(&server, false).create_release(&request()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(err.message().contains("422"));
    }

    #[test]
    fn github_bad_token_is_validation() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/repos/acme/widgets/releases");
            then.status(401).body("Bad credentials");
        });

        let err = github(&server, false).create_release(&request()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn github_server_error_is_retryable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/repos/acme/widgets/releases");
            then.status(502);
        });

        let err = github(&server, false).create_release(&request()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Io);
        assert!(err.is_retryable());
    }

    #[test]
    fn github_find_missing_release() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets/releases/tags/v9.9.9");
            then.status(404);
        });

        assert_eq!(github(&server, false).find_release("v9.9.9").unwrap(), None);
    }

    #[test]
    fn github_delete_release() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/repos/acme/widgets/releases/42");
            then.status(204);
        });

        let release = HostedRelease {
            id: "42".to_string(),
            tag: "v1.2.0".to_string(),
            url: String::new(),
        };
        github(&server, false).delete_release(&release).unwrap();
        mock.assert();
    }

    #[test]
    fn dry_run_does_not_call_api() {
        // nothing listens on the discard port
        let api = HttpApi::new("http://127.0.0.1:9", "", true).unwrap();
        let client = GitHubClient::new(api, "acme/widgets");

        let release = client.create_release(&request()).unwrap();
        assert_eq!(release.id, "dry-run");
        assert_eq!(release.tag, "v1.2.0");
        client.delete_release(&release).unwrap();
    }

    #[test]
    fn gitlab_create_and_delete() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/projects/4242/releases")
                .header("PRIVATE-TOKEN", "secret-token")
                .body_includes("\"description\":\"notes\"");
            then.status(201).json_body(json!({
                "tag_name": "v1.2.0",
                "name": "v1.2.0",
                "_links": { "self": "https://gitlab.com/acme/widgets/-/releases/v1.2.0" }
            }));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/projects/4242/releases/v1.2.0");
            then.status(200).json_body(json!({ "tag_name": "v1.2.0" }));
        });

        let client = gitlab(&server);
        let release = client.create_release(&request()).unwrap();
        assert_eq!(release.id, "v1.2.0");
        client.delete_release(&release).unwrap();

        create.assert();
        delete.assert();
    }

    #[test]
    fn missing_token_is_validation_error() {
        let config = HostedReleaseConfig {
            enabled: true,
            repository: Some("acme/widgets".to_string()),
            token_env: Some("SHIPWRIGHT_TEST_TOKEN_THAT_IS_NOT_SET".to_string()),
            ..Default::default()
        };
        let err = client_for(&config, false).err().unwrap();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert!(err.message().contains("SHIPWRIGHT_TEST_TOKEN_THAT_IS_NOT_SET"));

        assert!(client_for(&config, true).is_ok());
    }

    #[test]
    fn encodes_path_segments() {
        assert_eq!(encode_segment("acme/widgets"), "acme%2Fwidgets");
        assert_eq!(encode_segment("v1.0.0+build.1"), "v1.0.0%2Bbuild.1");
    }
}
