//! WebDAV provider: the payload is a single JSON file on a WebDAV server,
//! addressed by `server_url + file_path` with Basic authentication.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::contract::{Provider, ProviderError, ProviderResult, SyncPayload, Validation};
use crate::status;
use crate::transport::{webdav_error, Auth, HttpClient, Method, Transport};

#[derive(Debug)]
pub struct WebDavProvider {
    id: String,
    name: String,
    http: HttpClient,
    file_path: String,
}

/// Drops trailing slashes so paths can be appended directly.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Ensures a leading slash.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl WebDavProvider {
    pub fn new(
        id: &str,
        name: &str,
        server_url: &str,
        username: &str,
        password: &str,
        file_path: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let http = HttpClient::new(normalize_url(server_url), transport).with_auth(Auth::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
        Self {
            id: id.to_string(),
            name: name.to_string(),
            http,
            file_path: normalize_path(file_path),
        }
    }

    pub fn server_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Every ancestor collection of the file, shallowest first.
    /// `/a/b/file.json` gives `["/a", "/a/b"]`.
    pub fn ancestor_dirs(&self) -> Vec<String> {
        let segments: Vec<&str> = self
            .file_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((_, dirs)) = segments.split_last() else {
            return Vec::new();
        };
        let mut current = String::new();
        dirs.iter()
            .map(|segment| {
                current.push('/');
                current.push_str(segment);
                current.clone()
            })
            .collect()
    }

    /// MKCOL each ancestor. Existing collections answer 405 and other
    /// failures surface on the following PUT, so every outcome is ignored.
    async fn ensure_directories(&self) {
        for dir in self.ancestor_dirs() {
            match self.http.request(Method::Mkcol, &dir, None, &[]).await {
                Ok(response) => {
                    debug!(dir = %dir, status = response.status, "[WEBDAV] MKCOL answered")
                }
                Err(e) => warn!(dir = %dir, error = %e, "[WEBDAV] MKCOL failed, continuing"),
            }
        }
    }
}

#[async_trait]
impl Provider for WebDavProvider {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn is_valid(&self) -> ProviderResult<Validation> {
        let response = self
            .http
            .request(Method::Propfind, &self.file_path, None, &[("Depth", "0")])
            .await?;

        match response.status {
            status::MULTI_STATUS => Ok(Validation::valid()),
            // Nothing uploaded yet, or the parent collection is missing: both are fine before the first upload.
            status::NOT_FOUND | status::CONFLICT => {
                debug!(status = response.status, file_path = %self.file_path, "[WEBDAV] Remote file not present yet");
                Ok(Validation::valid())
            }
            other => {
                warn!(status = other, server_url = %self.server_url(), "[WEBDAV] PROPFIND rejected");
                Ok(Validation::invalid(status::webdav_message(other)))
            }
        }
    }

    async fn upload(&self, payload: &SyncPayload) -> ProviderResult<()> {
        self.ensure_directories().await;

        let body = payload
            .to_json()
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;
        info!(
            server_url = %self.server_url(),
            file_path = %self.file_path,
            num_bookmarks = payload.num_bookmarks,
            "[WEBDAV] Uploading payload"
        );
        let response = self
            .http
            .request(
                Method::Put,
                &self.file_path,
                Some(body),
                &[("Content-Type", "application/json; charset=utf-8")],
            )
            .await?;

        if response.is_success() {
            Ok(())
        } else {
            error!(status = response.status, "[WEBDAV][ERROR] PUT rejected");
            Err(webdav_error(response.status))
        }
    }

    async fn download(&self) -> ProviderResult<SyncPayload> {
        let response = self
            .http
            .request(Method::Get, &self.file_path, None, &[])
            .await?;

        if response.status == status::NOT_FOUND {
            return Err(ProviderError::NotUploaded);
        }
        if !response.is_success() {
            return Err(webdav_error(response.status));
        }

        let payload = SyncPayload::from_json(&response.body)
            .map_err(|e| ProviderError::Format(e.to_string()))?;
        debug!(updated_at = payload.updated_at, num_bookmarks = payload.num_bookmarks, "[WEBDAV] Downloaded payload");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn provider(server_url: &str, file_path: &str) -> WebDavProvider {
        WebDavProvider::new(
            "custom",
            "Custom",
            server_url,
            "user",
            "pass",
            file_path,
            Arc::new(MockTransport::new()),
        )
    }

    #[test]
    fn construction_normalizes_url_and_path() {
        let p = provider("https://dav.example.test/dav/", "bookmarks.json");
        assert_eq!(p.server_url(), "https://dav.example.test/dav");
        assert_eq!(p.file_path(), "/bookmarks.json");
    }

    #[test]
    fn ancestor_dirs_cover_every_segment() {
        assert_eq!(
            provider("https://x", "/a/b/c.json").ancestor_dirs(),
            vec!["/a".to_string(), "/a/b".to_string()]
        );
        assert!(provider("https://x", "/c.json").ancestor_dirs().is_empty());
    }
}
