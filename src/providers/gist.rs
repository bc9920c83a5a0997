//! GitHub Gist provider: the payload lives as the JSON content of one named
//! file inside a (usually secret) Gist.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::GistConfig;
use crate::contract::{Provider, ProviderError, ProviderResult, SyncPayload, Validation};
use crate::transport::{http_error, Auth, HttpClient, Method, Transport};

pub const GIST_PATH: &str = "/gists";
pub const USER_PATH: &str = "/user";

#[derive(Debug, Deserialize)]
struct GistDocument {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug)]
pub struct GistProvider {
    http: HttpClient,
    gist_id: String,
    file_name: String,
}

impl GistProvider {
    pub fn new(
        api_url: &str,
        access_token: &str,
        gist_id: &str,
        file_name: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let http = HttpClient::new(api_url.trim_end_matches('/'), transport)
            .with_base_header("Accept", "application/vnd.github+json")
            .with_base_header("X-GitHub-Api-Version", "2022-11-28")
            .with_auth(Auth::Bearer(access_token.to_string()));
        Self {
            http,
            gist_id: gist_id.to_string(),
            file_name: file_name.to_string(),
        }
    }

    pub fn from_config(config: &GistConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            &config.api_url,
            &config.access_token,
            &config.gist_id,
            &config.file_name,
            transport,
        )
    }

    fn gist_path(&self) -> String {
        format!("{GIST_PATH}/{}", self.gist_id)
    }

    /// Contents of the named file; large files are truncated inline and must be fetched from `raw_url`.
    async fn file_content(&self, file: &GistFile) -> ProviderResult<String> {
        match (&file.raw_url, file.truncated) {
            (Some(raw_url), true) => {
                debug!(raw_url = %raw_url, "[GIST] File truncated, fetching raw content");
                let response = self
                    .http
                    .request_url(Method::Get, raw_url.clone(), None, &[])
                    .await?;
                if !response.is_success() {
                    return Err(http_error(response.status));
                }
                Ok(response.body)
            }
            _ => Ok(file.content.clone().unwrap_or_default()),
        }
    }
}

#[async_trait]
impl Provider for GistProvider {
    fn id(&self) -> String {
        "gist".to_string()
    }

    fn name(&self) -> String {
        "GitHub Gist".to_string()
    }

    async fn is_valid(&self) -> ProviderResult<Validation> {
        let gist_response = self
            .http
            .request(Method::Get, &self.gist_path(), None, &[])
            .await?;
        if !gist_response.is_success() {
            let reason = http_error(gist_response.status).to_string();
            warn!(gist_id = %self.gist_id, status = gist_response.status, "[GIST] Gist lookup failed");
            return Ok(Validation::invalid(reason));
        }

        let user_response = self.http.request(Method::Get, USER_PATH, None, &[]).await?;
        if !user_response.is_success() {
            warn!(status = user_response.status, "[GIST] Access token rejected");
            return Ok(Validation::invalid("invalid access token"));
        }

        match serde_json::from_str::<GistDocument>(&gist_response.body) {
            Ok(doc) if !doc.files.contains_key(&self.file_name) => {
                info!(file_name = %self.file_name, "[GIST] File not present yet; it will be created on first upload");
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "[GIST] Could not inspect Gist files"),
        }
        Ok(Validation::valid())
    }

    async fn upload(&self, payload: &SyncPayload) -> ProviderResult<()> {
        let content = payload
            .to_json()
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;
        let body = serde_json::json!({
            "files": {
                self.file_name.as_str(): { "content": content }
            }
        });
        info!(
            gist_id = %self.gist_id,
            file_name = %self.file_name,
            num_bookmarks = payload.num_bookmarks,
            "[GIST] Uploading payload"
        );

        let response = self
            .http
            .request(
                Method::Patch,
                &self.gist_path(),
                Some(body.to_string()),
                &[("Content-Type", "application/json; charset=utf-8")],
            )
            .await?;
        if !response.is_success() {
            error!(status = response.status, "[GIST][ERROR] Upload rejected");
            return Err(http_error(response.status));
        }
        Ok(())
    }

    async fn download(&self) -> ProviderResult<SyncPayload> {
        let response = self
            .http
            .request(Method::Get, &self.gist_path(), None, &[])
            .await?;
        if !response.is_success() {
            return Err(http_error(response.status));
        }

        let doc: GistDocument = serde_json::from_str(&response.body)
            .map_err(|e| ProviderError::Format(e.to_string()))?;
        let file = doc
            .files
            .get(&self.file_name)
            .ok_or_else(|| ProviderError::FileNotFound(self.file_name.clone()))?;

        let content = self.file_content(file).await?;
        let payload =
            SyncPayload::from_json(&content).map_err(|e| ProviderError::Format(e.to_string()))?;
        debug!(updated_at = payload.updated_at, num_bookmarks = payload.num_bookmarks, "[GIST] Downloaded payload");
        Ok(payload)
    }
}
