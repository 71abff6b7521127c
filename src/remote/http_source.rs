use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{CommitInfo, DiffEntry, RemoteError, RemoteSource, Result};

/// Wire shape of a listing response.
#[derive(Deserialize)]
struct TreeResponse {
    paths: Vec<String>,
}

/// Wire shape of a diff response.
#[derive(Deserialize)]
struct DiffResponse {
    entries: Vec<DiffEntry>,
}

/// An HTTP-based implementation of `RemoteSource`.
///
/// Operates against an HTTP service exposing the repository browsing
/// protocol under a base URL.
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    /// Create a new HTTP remote pointing to the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a new HTTP remote with a custom reqwest client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn commit_url(&self, repo: &str, specifier: &str) -> String {
        format!(
            "{}/repos/{}/commits/{}",
            self.base_url,
            repo,
            percent_encode(specifier.as_bytes(), NON_ALPHANUMERIC)
        )
    }

    fn tree_url(&self, repo: &str, revision_id: &str) -> String {
        format!("{}/repos/{}/tree/{}", self.base_url, repo, revision_id)
    }

    fn blob_url(&self, repo: &str, revision_id: &str, path: &str) -> String {
        format!(
            "{}/repos/{}/blob/{}/{}",
            self.base_url, repo, revision_id, path
        )
    }

    fn diff_url(&self, repo: &str, base_id: &str, head_id: &str) -> String {
        format!(
            "{}/repos/{}/diff/{}/{}",
            self.base_url, repo, base_id, head_id
        )
    }
}

/// Map a non-success response status to a typed error.
fn status_error(status: StatusCode) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::SERVICE_UNAVAILABLE => RemoteError::Unavailable,
        status => RemoteError::Http(format!("unexpected status code: {}", status)),
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn list_files(&self, repo: &str, revision_id: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.tree_url(repo, revision_id))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let tree: TreeResponse = response
                    .json()
                    .await
                    .map_err(|e| RemoteError::Http(format!("failed to parse listing: {}", e)))?;
                Ok(tree.paths)
            }
            status => Err(status_error(status)),
        }
    }

    async fn get_file_content(&self, repo: &str, revision_id: &str, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.blob_url(repo, revision_id, path))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .bytes()
                .await
                .map_err(|e| RemoteError::Http(e.to_string())),
            status => Err(status_error(status)),
        }
    }

    async fn get_commit(&self, repo: &str, specifier: &str) -> Result<CommitInfo> {
        let response = self
            .client
            .get(self.commit_url(repo, specifier))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| RemoteError::Http(format!("failed to parse commit: {}", e))),
            status => Err(status_error(status)),
        }
    }

    async fn get_diff(&self, repo: &str, base_id: &str, head_id: &str) -> Result<Vec<DiffEntry>> {
        let response = self
            .client
            .get(self.diff_url(repo, base_id, head_id))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let diff: DiffResponse = response
                    .json()
                    .await
                    .map_err(|e| RemoteError::Http(format!("failed to parse diff: {}", e)))?;
                Ok(diff.entries)
            }
            status => Err(status_error(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_encode_specifiers() {
        let remote = HttpRemote::new("https://api.codehost.example/");
        assert_eq!(
            remote.commit_url("h.io/acme/widget", "feature/x"),
            "https://api.codehost.example/repos/h.io/acme/widget/commits/feature%2Fx"
        );
        assert_eq!(
            remote.blob_url("h.io/acme/widget", "c0ffee", "src/lib.rs"),
            "https://api.codehost.example/repos/h.io/acme/widget/blob/c0ffee/src/lib.rs"
        );
        assert_eq!(
            remote.diff_url("h.io/acme/widget", "a1", "b2"),
            "https://api.codehost.example/repos/h.io/acme/widget/diff/a1/b2"
        );
    }
}
