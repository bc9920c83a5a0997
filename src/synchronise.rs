//! Coordinating module for the snapshot-probe-upload pipeline.
//!
//! Providers are built from [`UserConfig`] in priority order and driven
//! strictly sequentially. Conflict detection is by timestamp only: the
//! orchestrator never merges trees, and overwriting a newer remote requires
//! an explicit force.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bookmark::{self, ApplyReport};
use crate::config::{CustomVendorConfig, UserConfig};
use crate::contract::{
    BookmarkStore, ConfigStore, Provider, ProviderError, ProviderResult, StoreError, SyncPayload,
    Validation,
};
use crate::providers::{GistProvider, VendorRegistry};
use crate::transport::Transport;

/// How the local snapshot relates to a remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Local is newer.
    Ahead,
    /// Remote is newer.
    Behind,
    Synced,
    /// No provider is configured.
    None,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Ahead => "ahead",
            SyncStatus::Behind => "behind",
            SyncStatus::Synced => "synced",
            SyncStatus::None => "none",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub payload: Option<SyncPayload>,
}

impl SyncOutcome {
    fn none() -> Self {
        Self {
            status: SyncStatus::None,
            payload: None,
        }
    }

    fn with(status: SyncStatus, payload: SyncPayload) -> Self {
        Self {
            status,
            payload: Some(payload),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{provider}: {message}")]
    ProbeFailed { provider: String, message: String },
    #[error("{0}")]
    AllProvidersFailed(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("local file: {0}")]
    Local(ProviderError),
}

/// A provider with its effective sort key.
pub struct RankedProvider {
    pub provider: Box<dyn Provider>,
    pub priority: i64,
}

impl RankedProvider {
    pub fn new(provider: Box<dyn Provider>, priority: Option<i64>) -> Self {
        Self {
            provider,
            priority: priority.unwrap_or(i64::MAX),
        }
    }
}

pub fn get_sync_status(local: &SyncPayload, remote: &SyncPayload) -> SyncStatus {
    match local.updated_at.cmp(&remote.updated_at) {
        Ordering::Greater => SyncStatus::Ahead,
        Ordering::Less => SyncStatus::Behind,
        Ordering::Equal => SyncStatus::Synced,
    }
}

/// Builds every enabled provider from `config`, lowest priority first.
///
/// The registry's custom vendors are reloaded from `config` first. WebDAV
/// accounts that cannot be turned into a provider are skipped.
pub fn build_providers(
    config: &UserConfig,
    registry: &VendorRegistry,
    transport: Arc<dyn Transport>,
) -> Vec<RankedProvider> {
    registry.load_custom_vendors(config);
    let mut providers = Vec::new();

    if let Some(gist) = config.gist.as_ref().filter(|g| g.enabled) {
        providers.push(RankedProvider::new(
            Box::new(GistProvider::from_config(gist, transport.clone())),
            gist.priority,
        ));
    }

    for (index, account) in config.webdav.iter().enumerate().filter(|(_, a)| a.enabled) {
        match registry.create_provider_for(account, transport.clone()) {
            Ok(provider) => providers.push(RankedProvider::new(Box::new(provider), account.priority)),
            Err(e) => {
                warn!(index, username = %account.username, error = %e, "[SYNC] Skipping WebDAV account")
            }
        }
    }

    // Stable: equal priorities keep configuration order.
    providers.sort_by_key(|p| p.priority);
    info!(
        count = providers.len(),
        providers = ?providers.iter().map(|p| p.provider.name()).collect::<Vec<_>>(),
        "[SYNC] Providers built"
    );
    providers
}

fn describe(provider: &dyn Provider, error: &ProviderError) -> String {
    format!("{}: {}", provider.name(), error)
}

/// Uploads `local` to every provider.
///
/// Unless `force` is set, providers are first probed in order. A remote newer
/// than `local` aborts with [`SyncStatus::Behind`] before anything is
/// written; a 404/409 probe ends probing; any other probe failure aborts.
pub async fn upload(
    providers: &[RankedProvider],
    force: bool,
    local: &SyncPayload,
) -> Result<SyncOutcome, SyncError> {
    if providers.is_empty() {
        info!("[SYNC][UPLOAD] No providers configured");
        return Ok(SyncOutcome::none());
    }

    if !force {
        for ranked in providers {
            let provider = ranked.provider.as_ref();
            match provider.download().await {
                Ok(remote) => {
                    debug!(
                        provider = %provider.name(),
                        local = local.updated_at,
                        remote = remote.updated_at,
                        "[SYNC][UPLOAD] Probed remote"
                    );
                    if remote.updated_at > local.updated_at {
                        info!(provider = %provider.name(), "[SYNC][UPLOAD] Remote is newer, not uploading");
                        return Ok(SyncOutcome::with(SyncStatus::Behind, local.clone()));
                    }
                }
                Err(e) if e.is_absent() => {
                    info!(provider = %provider.name(), error = %e, "[SYNC][UPLOAD] No remote data, stopping probe");
                    break;
                }
                Err(e) => {
                    error!(provider = %provider.name(), error = %e, "[SYNC][UPLOAD][ERROR] Probe failed");
                    return Err(SyncError::ProbeFailed {
                        provider: provider.name(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    let mut succeeded = 0;
    let mut failures = Vec::new();
    for ranked in providers {
        let provider = ranked.provider.as_ref();
        match provider.upload(local).await {
            Ok(()) => {
                info!(provider = %provider.name(), "[SYNC][UPLOAD] Upload succeeded");
                succeeded += 1;
            }
            Err(e) => {
                error!(provider = %provider.name(), error = %e, "[SYNC][UPLOAD][ERROR] Upload failed");
                failures.push(describe(provider, &e));
            }
        }
    }

    if succeeded == 0 {
        return Err(SyncError::AllProvidersFailed(failures.join("\n")));
    }
    info!(succeeded, failed = failures.len(), "[SYNC][UPLOAD] Upload pass complete");
    Ok(SyncOutcome::with(SyncStatus::Synced, local.clone()))
}

/// Returns the first remote that downloads successfully, compared to `local`.
pub async fn download(
    providers: &[RankedProvider],
    local: &SyncPayload,
) -> Result<SyncOutcome, SyncError> {
    if providers.is_empty() {
        info!("[SYNC][DOWNLOAD] No providers configured");
        return Ok(SyncOutcome::none());
    }

    let mut failures = Vec::new();
    for ranked in providers {
        let provider = ranked.provider.as_ref();
        match provider.download().await {
            Ok(remote) => {
                let status = get_sync_status(local, &remote);
                info!(provider = %provider.name(), ?status, "[SYNC][DOWNLOAD] Download succeeded");
                return Ok(SyncOutcome::with(status, remote));
            }
            Err(e) => {
                error!(provider = %provider.name(), error = %e, "[SYNC][DOWNLOAD][ERROR] Download failed");
                failures.push(describe(provider, &e));
            }
        }
    }
    Err(SyncError::AllProvidersFailed(failures.join("\n")))
}

/// Outcome of one provider's [`Provider::is_valid`].
#[derive(Debug)]
pub struct ProviderCheck {
    pub provider: String,
    pub result: ProviderResult<Validation>,
}

/// Wires the configuration, the local bookmark store and the providers together.
pub struct Synchroniser {
    config: Arc<dyn ConfigStore>,
    bookmarks: Arc<dyn BookmarkStore>,
    registry: Arc<VendorRegistry>,
    transport: Arc<dyn Transport>,
    local_file: Box<dyn Provider>,
}

impl Synchroniser {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        bookmarks: Arc<dyn BookmarkStore>,
        registry: Arc<VendorRegistry>,
        transport: Arc<dyn Transport>,
        local_file: Box<dyn Provider>,
    ) -> Self {
        Self {
            config,
            bookmarks,
            registry,
            transport,
            local_file,
        }
    }

    async fn load_config(&self) -> Result<UserConfig, SyncError> {
        self.config.load().await.map_err(|e| {
            error!(error = %e, "[SYNC][ERROR] Failed to load configuration");
            SyncError::Config(e.to_string())
        })
    }

    pub async fn providers(&self) -> Result<Vec<RankedProvider>, SyncError> {
        let config = self.load_config().await?;
        Ok(build_providers(&config, &self.registry, self.transport.clone()))
    }

    /// Uploads `snapshot`, or a fresh local snapshot when none is given.
    pub async fn upload(
        &self,
        force: bool,
        snapshot: Option<SyncPayload>,
    ) -> Result<SyncOutcome, SyncError> {
        let providers = self.providers().await?;
        if providers.is_empty() {
            return Ok(SyncOutcome::none());
        }
        let local = match snapshot {
            Some(snapshot) => snapshot,
            None => bookmark::read_local(self.bookmarks.as_ref()).await?,
        };
        info!(force, num_bookmarks = local.num_bookmarks, "[SYNC] Upload starting");
        upload(&providers, force, &local).await
    }

    pub async fn download(&self) -> Result<SyncOutcome, SyncError> {
        let providers = self.providers().await?;
        if providers.is_empty() {
            return Ok(SyncOutcome::none());
        }
        let local = bookmark::read_local(self.bookmarks.as_ref()).await?;
        info!("[SYNC] Download starting");
        download(&providers, &local).await
    }

    /// Writes the local snapshot through the local-file provider.
    pub async fn export(&self) -> Result<SyncOutcome, SyncError> {
        let local = bookmark::read_local(self.bookmarks.as_ref()).await?;
        self.local_file.upload(&local).await.map_err(SyncError::Local)?;
        info!(num_bookmarks = local.num_bookmarks, "[SYNC] Exported local snapshot");
        Ok(SyncOutcome::with(SyncStatus::Synced, local))
    }

    /// Reads a payload through the local-file provider. The payload is
    /// returned for the caller to [`apply`](Self::apply); nothing is changed.
    pub async fn import(&self) -> Result<SyncOutcome, SyncError> {
        let remote = self.local_file.download().await.map_err(SyncError::Local)?;
        let local = bookmark::read_local(self.bookmarks.as_ref()).await?;
        let status = get_sync_status(&local, &remote);
        info!(?status, num_bookmarks = remote.num_bookmarks, "[SYNC] Imported payload");
        Ok(SyncOutcome::with(status, remote))
    }

    /// Replaces the local tree with `payload`.
    pub async fn apply(&self, payload: &SyncPayload) -> Result<ApplyReport, SyncError> {
        Ok(bookmark::apply_payload(self.bookmarks.as_ref(), payload).await?)
    }

    /// Runs `is_valid` on every configured provider, in priority order.
    pub async fn validate(&self) -> Result<Vec<ProviderCheck>, SyncError> {
        let providers = self.providers().await?;
        let mut checks = Vec::with_capacity(providers.len());
        for ranked in &providers {
            let provider = ranked.provider.as_ref();
            let result = provider.is_valid().await;
            match &result {
                Ok(v) if v.valid => info!(provider = %provider.name(), "[SYNC][CHECK] Valid"),
                Ok(v) => warn!(provider = %provider.name(), reason = ?v.reason, "[SYNC][CHECK] Invalid"),
                Err(e) => error!(provider = %provider.name(), error = %e, "[SYNC][CHECK][ERROR] Check failed"),
            }
            checks.push(ProviderCheck {
                provider: provider.name(),
                result,
            });
        }
        Ok(checks)
    }

    /// Preset and configured custom vendors.
    pub async fn vendors(&self) -> Result<Vec<CustomVendorConfig>, SyncError> {
        let config = self.load_config().await?;
        self.registry.load_custom_vendors(&config);
        Ok(self.registry.all_vendors())
    }

    /// Registers `vendor` and persists it into the configuration.
    pub async fn add_custom_vendor(&self, vendor: CustomVendorConfig) -> Result<(), SyncError> {
        let mut config = self.load_config().await?;
        self.registry.load_custom_vendors(&config);
        self.registry
            .add_custom_vendor(vendor.clone())
            .map_err(|e| SyncError::Config(e.to_string()))?;
        config.custom_vendors.push(vendor);
        self.save_config(&config).await
    }

    /// Returns whether a vendor with `id` was configured.
    pub async fn remove_custom_vendor(&self, id: &str) -> Result<bool, SyncError> {
        let mut config = self.load_config().await?;
        let before = config.custom_vendors.len();
        config.custom_vendors.retain(|v| v.id != id);
        let removed = config.custom_vendors.len() != before;
        if removed {
            self.save_config(&config).await?;
        }
        self.registry.load_custom_vendors(&config);
        Ok(removed)
    }

    async fn save_config(&self, config: &UserConfig) -> Result<(), SyncError> {
        self.config.save(config).await.map_err(|e| {
            error!(error = %e, "[SYNC][ERROR] Failed to save configuration");
            SyncError::Config(e.to_string())
        })
    }
}
