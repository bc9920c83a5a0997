//! # registry: WebDAV vendor catalog and provider factory
//!
//! The registry keeps two disjoint lists:
//! - preset vendors that ship with the crate (read-only),
//! - custom vendors loaded from [`UserConfig::custom_vendors`].
//!
//! A single registry value is constructed once and shared by reference.
//! Reloading from configuration always clears the custom list before
//! repopulating it, so calling [`VendorRegistry::load_custom_vendors`] after
//! every config change is idempotent.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CustomVendorConfig, UserConfig, WebDavUserConfig};
use crate::providers::webdav::WebDavProvider;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("vendor id \"{0}\" already exists")]
    DuplicateVendor(String),
    #[error("unknown WebDAV vendor: {0}")]
    UnknownVendor(String),
    #[error("WebDAV account {0} does not reference a vendor")]
    MissingVendor(String),
    #[error("vendor {0} requires a server URL")]
    MissingServerUrl(String),
    #[error("WebDAV account {0} has no file path")]
    MissingFilePath(String),
}

fn preset_vendors() -> Vec<CustomVendorConfig> {
    vec![CustomVendorConfig {
        id: "jianguoyun".to_string(),
        name: "Jianguoyun".to_string(),
        server_url: "https://dav.jianguoyun.com/dav".to_string(),
    }]
}

#[derive(Debug)]
pub struct VendorRegistry {
    presets: Vec<CustomVendorConfig>,
    customs: RwLock<Vec<CustomVendorConfig>>,
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self {
            presets: preset_vendors(),
            customs: RwLock::new(Vec::new()),
        }
    }

    // The custom list is plain data; a panic mid-update cannot leave it inconsistent.
    fn customs(&self) -> RwLockReadGuard<'_, Vec<CustomVendorConfig>> {
        self.customs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn customs_mut(&self) -> RwLockWriteGuard<'_, Vec<CustomVendorConfig>> {
        self.customs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Presets first, then custom vendors in insertion order.
    pub fn all_vendors(&self) -> Vec<CustomVendorConfig> {
        let mut all = self.presets.clone();
        all.extend(self.customs().iter().cloned());
        all
    }

    pub fn vendor(&self, id: &str) -> Option<CustomVendorConfig> {
        self.presets
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .or_else(|| self.customs().iter().find(|v| v.id == id).cloned())
    }

    pub fn preset_vendors(&self) -> Vec<CustomVendorConfig> {
        self.presets.clone()
    }

    pub fn custom_vendors(&self) -> Vec<CustomVendorConfig> {
        self.customs().clone()
    }

    /// Fails when `vendor.id` is already taken by a preset or custom vendor.
    pub fn add_custom_vendor(&self, vendor: CustomVendorConfig) -> Result<(), RegistryError> {
        if self.presets.iter().any(|v| v.id == vendor.id) {
            return Err(RegistryError::DuplicateVendor(vendor.id));
        }
        let mut customs = self.customs_mut();
        if customs.iter().any(|v| v.id == vendor.id) {
            return Err(RegistryError::DuplicateVendor(vendor.id));
        }
        info!(vendor_id = %vendor.id, vendor_name = %vendor.name, "[REGISTRY] Custom vendor added");
        customs.push(vendor);
        Ok(())
    }

    /// Returns whether a vendor was removed.
    pub fn remove_custom_vendor(&self, id: &str) -> bool {
        let mut customs = self.customs_mut();
        let before = customs.len();
        customs.retain(|v| v.id != id);
        customs.len() != before
    }

    pub fn clear_custom_vendors(&self) {
        self.customs_mut().clear();
    }

    /// Replaces the custom list with the vendors in `config`. Entries whose
    /// id is already taken are skipped. Returns how many were loaded.
    pub fn load_custom_vendors(&self, config: &UserConfig) -> usize {
        self.clear_custom_vendors();
        let mut loaded = 0;
        for vendor in &config.custom_vendors {
            match self.add_custom_vendor(vendor.clone()) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(vendor_id = %vendor.id, error = %e, "[REGISTRY] Skipping custom vendor"),
            }
        }
        loaded
    }

    /// Builds a WebDAV provider for `user` against the vendor `vendor_id`.
    ///
    /// The server URL is the account's override when set, otherwise the vendor's.
    pub fn create_provider(
        &self,
        vendor_id: &str,
        user: &WebDavUserConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<WebDavProvider, RegistryError> {
        let vendor = self
            .vendor(vendor_id)
            .ok_or_else(|| RegistryError::UnknownVendor(vendor_id.to_string()))?;

        let server_url = user
            .server_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| Some(vendor.server_url.as_str()).filter(|url| !url.trim().is_empty()))
            .ok_or_else(|| RegistryError::MissingServerUrl(vendor.name.clone()))?
            .to_string();

        if user.file_path.trim().is_empty() {
            return Err(RegistryError::MissingFilePath(user.username.clone()));
        }

        Ok(WebDavProvider::new(
            &vendor.id,
            &format!("{} ({})", vendor.name, user.username),
            &server_url,
            &user.username,
            &user.password,
            &user.file_path,
            transport,
        ))
    }

    /// [`Self::create_provider`] for the vendor the account itself references.
    pub fn create_provider_for(
        &self,
        user: &WebDavUserConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<WebDavProvider, RegistryError> {
        let vendor_id = user
            .vendor_id
            .as_deref()
            .ok_or_else(|| RegistryError::MissingVendor(user.username.clone()))?;
        self.create_provider(vendor_id, user, transport)
    }
}
