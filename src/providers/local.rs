//! Local-file provider: export to and import from a JSON file chosen through
//! the host's save-as / open-file interactions.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{error, info};

use crate::contract::{
    FileHost, FileSelection, HostError, PayloadError, Provider, ProviderError, ProviderResult,
    SyncPayload, Validation,
};

pub struct LocalFileProvider {
    host: Box<dyn FileHost>,
}

impl LocalFileProvider {
    pub fn new(host: Box<dyn FileHost>) -> Self {
        Self { host }
    }

    /// Name offered to the save dialog, dated so successive exports do not collide.
    pub fn export_file_name() -> String {
        format!("CloudLeaf-{}.json", chrono::Local::now().format("%Y-%m-%d"))
    }
}

#[async_trait]
impl Provider for LocalFileProvider {
    fn id(&self) -> String {
        "local".to_string()
    }

    fn name(&self) -> String {
        "Local file".to_string()
    }

    async fn is_valid(&self) -> ProviderResult<Validation> {
        Ok(Validation::valid())
    }

    async fn upload(&self, payload: &SyncPayload) -> ProviderResult<()> {
        let contents = serde_json::to_string_pretty(payload)
            .map_err(|e| ProviderError::Host(e.to_string()))?;
        let file_name = Self::export_file_name();
        self.host.save(&file_name, &contents).await.map_err(|e| {
            error!(error = %e, file_name = %file_name, "[LOCAL][ERROR] Save failed");
            ProviderError::Host(e.to_string())
        })?;
        info!(file_name = %file_name, num_bookmarks = payload.num_bookmarks, "[LOCAL] Exported bookmarks");
        Ok(())
    }

    async fn download(&self) -> ProviderResult<SyncPayload> {
        let selection = self
            .host
            .open()
            .await
            .map_err(|e| ProviderError::Host(e.to_string()))?;
        let contents = match selection {
            FileSelection::Selected(contents) => contents,
            FileSelection::Nothing => return Err(ProviderError::NoFileSelected),
            FileSelection::Canceled => return Err(ProviderError::Canceled),
        };

        SyncPayload::from_json(&contents).map_err(|e| match e {
            PayloadError::Json(detail) => ProviderError::Parse(detail),
            other => ProviderError::InvalidData(other.to_string()),
        })
    }
}

/// Filesystem-backed [`FileHost`]: saves into a directory and opens one
/// preselected path.
#[derive(Debug, Clone, Default)]
pub struct FsFileHost {
    save_dir: Option<PathBuf>,
    selection: Option<PathBuf>,
}

impl FsFileHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn with_selection(mut self, path: impl Into<PathBuf>) -> Self {
        self.selection = Some(path.into());
        self
    }
}

#[async_trait]
impl FileHost for FsFileHost {
    async fn save(&self, file_name: &str, contents: &str) -> Result<(), HostError> {
        let dir = self
            .save_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), "[LOCAL] File written");
        Ok(())
    }

    async fn open(&self) -> Result<FileSelection, HostError> {
        let Some(path) = &self.selection else {
            return Ok(FileSelection::Nothing);
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(FileSelection::Selected(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileSelection::Nothing),
            Err(e) => Err(Box::new(e)),
        }
    }
}
