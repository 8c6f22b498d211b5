//! GitHub repository backend.
//!
//! Keeps the record map as a JSON file in a repository through the REST
//! contents API:
//!
//! - `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}` returns the
//!   base64 content and the blob `sha`.
//! - `PUT` on the same path with `{message, content, sha, branch}` commits a
//!   new version. The `sha` must be the current one or GitHub answers 409.
//!
//! Writes send the `sha` of the version this store last read or wrote. If
//! another writer committed in between, the write fails with
//! [`StoreError::Conflict`]; the caller re-reads, merges and writes again.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{decode_records, encode_records, DurableStore, RecordMap, StoreError};
use crate::provider::{AsyncHttpClient, BoxFuture, ProviderError};

/// Public GitHub REST endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Location and credentials of the cache file.
#[derive(Clone)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub token: String,
    pub api_url: String,
}

impl GithubConfig {
    /// `cache.json` on `main` of `owner/repo`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: "cache.json".to_string(),
            branch: "main".to_string(),
            token: token.into(),
            api_url: GITHUB_API_URL.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.owner,
            self.repo,
            self.path.trim_start_matches('/')
        )
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

/// Durable store backed by a file in a GitHub repository.
pub struct GithubStore<C: AsyncHttpClient> {
    http: C,
    config: GithubConfig,
    /// Blob sha of the last version seen; `None` before any read or when
    /// the file does not exist.
    last_sha: Mutex<Option<String>>,
}

impl<C: AsyncHttpClient> GithubStore<C> {
    pub fn new(http: C, config: GithubConfig) -> Result<Self, StoreError> {
        if config.token.trim().is_empty() {
            return Err(StoreError::Config(
                "GitHub backend requires a token (set GITHUB_TOKEN)".to_string(),
            ));
        }
        if config.owner.is_empty() || config.repo.is_empty() {
            return Err(StoreError::Config(
                "GitHub backend requires owner and repo".to_string(),
            ));
        }
        Ok(Self {
            http,
            config,
            last_sha: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    /// Version token the next write will be based on.
    pub fn last_sha(&self) -> Option<String> {
        self.last_sha.lock().clone()
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", format!("Bearer {}", self.config.token)),
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", "2022-11-28".to_string()),
        ]
    }

    /// Fetches the current file metadata, `None` when the file does not exist.
    async fn fetch_contents(&self) -> Result<Option<ContentsResponse>, StoreError> {
        let url = format!(
            "{}?ref={}",
            self.config.contents_url(),
            self.config.branch
        );
        match self.http.get_with_headers(&url, &self.headers()).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(ProviderError::Rejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(map_http_error(e)),
        }
    }

    async fn decode_contents(&self, contents: &ContentsResponse) -> Result<RecordMap, StoreError> {
        let inline = contents
            .content
            .as_deref()
            .filter(|c| !c.is_empty() && contents.encoding.as_deref() == Some("base64"));

        let bytes = match (inline, contents.download_url.as_deref()) {
            (Some(encoded), _) => {
                // GitHub wraps base64 at 60 columns
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| StoreError::Format(format!("invalid base64 content: {}", e)))?
            }
            // Files over 1 MB come without inline content
            (None, Some(download_url)) => self
                .http
                .get_with_headers(download_url, &self.headers())
                .await
                .map_err(map_http_error)?,
            (None, None) => Vec::new(),
        };

        decode_records(&bytes)
    }
}

fn map_http_error(error: ProviderError) -> StoreError {
    match error {
        ProviderError::Rejected { status: 409, message } | ProviderError::Rejected { status: 422, message } => {
            StoreError::Conflict(message)
        }
        ProviderError::Rejected { status: 401, message } | ProviderError::Rejected { status: 403, message } => {
            StoreError::Config(format!("GitHub refused credentials: {}", message))
        }
        other => StoreError::Unreachable(other.to_string()),
    }
}

impl<C: AsyncHttpClient> DurableStore for GithubStore<C> {
    fn read_all(&self) -> BoxFuture<'_, Result<RecordMap, StoreError>> {
        Box::pin(async move {
            let Some(contents) = self.fetch_contents().await? else {
                *self.last_sha.lock() = None;
                info!(
                    repo = %format!("{}/{}", self.config.owner, self.config.repo),
                    path = %self.config.path,
                    "No cache file in repository, starting fresh"
                );
                return Ok(RecordMap::new());
            };

            let records = self.decode_contents(&contents).await?;
            debug!(sha = %contents.sha, records = records.len(), "Read cache from GitHub");
            *self.last_sha.lock() = Some(contents.sha);
            Ok(records)
        })
    }

    fn write_all<'a>(&'a self, records: &'a RecordMap) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let sha = self.last_sha();
            let content = STANDARD.encode(encode_records(records)?);

            let mut body = json!({
                "message": format!("Update {} ({} records)", self.config.path, records.len()),
                "content": content,
                "branch": self.config.branch,
            });
            if let Some(sha) = &sha {
                body["sha"] = json!(sha);
            }

            let response = self
                .http
                .put_json(&self.config.contents_url(), &self.headers(), &body)
                .await
                .map_err(map_http_error)?;

            let new_sha = match serde_json::from_slice::<PutResponse>(&response) {
                Ok(r) => Some(r.content.sha),
                Err(e) => {
                    // Committed, but the next write must re-read to learn the version
                    warn!(error = %e, "Commit response without sha");
                    None
                }
            };
            info!(
                records = records.len(),
                previous_sha = sha.as_deref().unwrap_or("-"),
                sha = new_sha.as_deref().unwrap_or("-"),
                "Cache committed to GitHub"
            );
            *self.last_sha.lock() = new_sha;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "github"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRecord;
    use crate::provider::MockAsyncHttpClient;
    use chrono::Utc;
    use std::sync::Arc;

    fn config() -> GithubConfig {
        GithubConfig::new("octo", "geo-cache", "t0ken").with_api_url("http://gh.test/")
    }

    fn records() -> RecordMap {
        RecordMap::from([(
            "10.919700,106.735300".to_string(),
            CacheRecord {
                display_name: Some("WP9P+V4F Thuan An, Binh Duong".to_string()),
                address_components: Default::default(),
                plus_code: None,
                stored_at: Utc::now(),
            },
        )])
    }

    fn contents_body(records: &RecordMap) -> Vec<u8> {
        let encoded = STANDARD.encode(encode_records(records).unwrap());
        // Wrap like GitHub does
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        serde_json::to_vec(&json!({
            "sha": "abc123",
            "encoding": "base64",
            "content": wrapped.join("\n"),
        }))
        .unwrap()
    }

    fn not_found() -> ProviderError {
        ProviderError::Rejected {
            status: 404,
            message: "Not Found".to_string(),
        }
    }

    #[test]
    fn test_requires_token() {
        let config = GithubConfig::new("o", "r", "");
        let result = GithubStore::new(MockAsyncHttpClient::new(Ok(Vec::new())), config);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        assert!(!format!("{:?}", config()).contains("t0ken"));
    }

    #[tokio::test]
    async fn test_read_decodes_wrapped_base64() {
        let http = MockAsyncHttpClient::new(Ok(contents_body(&records())));
        let store = GithubStore::new(http, config()).unwrap();

        assert_eq!(store.read_all().await.unwrap(), records());
        assert_eq!(
            store.http.calls(),
            vec!["http://gh.test/repos/octo/geo-cache/contents/cache.json?ref=main".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let store = GithubStore::new(MockAsyncHttpClient::new(Err(not_found())), config()).unwrap();
        assert!(store.read_all().await.unwrap().is_empty());
    }

    fn committed(sha: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(serde_json::to_vec(&json!({"content": {"sha": sha}})).unwrap())
    }

    #[tokio::test]
    async fn test_write_sends_sha_from_last_read() {
        let http = MockAsyncHttpClient::scripted(
            vec![Ok(contents_body(&RecordMap::new())), committed("def456")],
            Err(ProviderError::Transport("unexpected".to_string())),
        );
        let store = GithubStore::new(http, config()).unwrap();

        store.read_all().await.unwrap();
        store.write_all(&records()).await.unwrap();

        // No extra lookup between read and write
        assert_eq!(store.http.call_count(), 2);
        assert_eq!(store.http.put_bodies()[0]["sha"], "abc123");
        assert_eq!(store.last_sha().as_deref(), Some("def456"));
    }

    #[tokio::test]
    async fn test_consecutive_writes_chain_shas() {
        let http = MockAsyncHttpClient::scripted(
            vec![
                Ok(contents_body(&RecordMap::new())),
                committed("v2"),
                committed("v3"),
            ],
            Err(ProviderError::Transport("unexpected".to_string())),
        );
        let store = GithubStore::new(http, config()).unwrap();

        store.read_all().await.unwrap();
        store.write_all(&records()).await.unwrap();
        store.write_all(&records()).await.unwrap();

        let bodies = store.http.put_bodies();
        assert_eq!(bodies[0]["sha"], "abc123");
        assert_eq!(bodies[1]["sha"], "v2");
    }

    #[tokio::test]
    async fn test_write_creates_file_when_absent() {
        let http = MockAsyncHttpClient::scripted(
            vec![Err(not_found()), committed("new")],
            Err(ProviderError::Transport("unexpected".to_string())),
        );
        let store = GithubStore::new(http, config()).unwrap();

        store.read_all().await.unwrap();
        assert!(store.write_all(&records()).await.is_ok());
        assert!(store.http.put_bodies()[0].get("sha").is_none());
    }

    #[tokio::test]
    async fn test_foreign_commit_surfaces_as_conflict() {
        let http = MockAsyncHttpClient::scripted(
            vec![
                Ok(contents_body(&RecordMap::new())),
                // Someone else committed after our read
                Err(ProviderError::Rejected {
                    status: 409,
                    message: "is at 999fff but expected abc123".to_string(),
                }),
            ],
            Err(ProviderError::Transport("connection refused".to_string())),
        );
        let store = GithubStore::new(http, config()).unwrap();

        store.read_all().await.unwrap();
        assert!(matches!(
            store.write_all(&records()).await,
            Err(StoreError::Conflict(_))
        ));
        // The stale token is kept until the next read
        assert_eq!(store.last_sha().as_deref(), Some("abc123"));
        assert!(matches!(
            store.write_all(&records()).await,
            Err(StoreError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_tier_merges_foreign_commit_after_conflict() {
        use crate::cache::durable::DurableTier;
        use crate::cache::FlushOutcome;
        use crate::coord::CoordinateKey;
        use crate::extract::AddressResult;

        let mut theirs = records();
        theirs.insert(
            "1.000000,1.000000".to_string(),
            CacheRecord {
                display_name: Some("written elsewhere".to_string()),
                address_components: Default::default(),
                plus_code: None,
                stored_at: Utc::now(),
            },
        );
        let http = MockAsyncHttpClient::scripted(
            vec![
                Ok(contents_body(&records())),
                Err(ProviderError::Rejected {
                    status: 409,
                    message: "sha mismatch".to_string(),
                }),
                Ok(contents_body(&theirs)),
                committed("merged"),
            ],
            Err(ProviderError::Transport("unexpected".to_string())),
        );
        let store = Arc::new(GithubStore::new(http, config()).unwrap());
        let tier = DurableTier::new(store.clone());

        tier.load().await.unwrap();
        let ours = CoordinateKey::new(2.0, 2.0).unwrap();
        tier.put(
            &ours,
            &AddressResult {
                display_name: Some("written here".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(tier.flush().await, Err(StoreError::Conflict(_))));
        assert!(tier.is_dirty());
        assert_eq!(
            tier.flush().await.unwrap(),
            FlushOutcome::Written { records: 3 }
        );

        let body = &store.http.put_bodies()[1];
        let content = STANDARD.decode(body["content"].as_str().unwrap()).unwrap();
        let committed = decode_records(&content).unwrap();
        assert!(committed.contains_key("1.000000,1.000000"));
        assert!(committed.contains_key(ours.as_str()));
        assert_eq!(store.last_sha().as_deref(), Some("merged"));
    }
}
