use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default file name inside a Gist.
pub const DEFAULT_FILENAME: &str = "CloudLeaf.json";

/// Default file path on a WebDAV server.
pub const DEFAULT_WEBDAV_FILEPATH: &str = "/CloudLeaf/CloudLeaf.json";

/// Default Gist API root.
pub const DEFAULT_GIST_API_URL: &str = "https://api.github.com";

/// Everything the user configured: remote sources and custom WebDAV vendors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist: Option<GistConfig>,
    #[serde(default)]
    pub webdav: Vec<WebDavUserConfig>,
    #[serde(default)]
    pub custom_vendors: Vec<CustomVendorConfig>,
}

impl UserConfig {
    pub fn trace_loaded(&self) {
        info!(
            gist_configured = self.gist.is_some(),
            gist_enabled = self.gist.as_ref().map(|g| g.enabled).unwrap_or(false),
            webdav_accounts = self.webdav.len(),
            custom_vendors = self.custom_vendors.len(),
            "Loaded UserConfig"
        );
        for (index, account) in self.webdav.iter().enumerate() {
            account.trace_loaded(index);
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistConfig {
    #[serde(default)]
    pub access_token: String,
    pub gist_id: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// A Gist source is only used once explicitly enabled.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// API root, for GitHub Enterprise installations.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl std::fmt::Debug for GistConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistConfig")
            .field("access_token_set", &!self.access_token.is_empty())
            .field("gist_id", &self.gist_id)
            .field("file_name", &self.file_name)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// One WebDAV account. Server details come from the referenced vendor
/// unless `server_url` overrides them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDavUserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default = "default_file_path")]
    pub file_path: String,
    /// Accounts are used unless explicitly disabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl WebDavUserConfig {
    pub fn trace_loaded(&self, index: usize) {
        debug!(
            index,
            vendor_id = self.vendor_id.as_deref().unwrap_or("<none>"),
            username = %self.username,
            server_url = self.server_url.as_deref().unwrap_or("<vendor default>"),
            file_path = %self.file_path,
            enabled = self.enabled,
            "Loaded WebDAV account"
        );
    }
}

impl std::fmt::Debug for WebDavUserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavUserConfig")
            .field("vendor_id", &self.vendor_id)
            .field("username", &self.username)
            .field("password_set", &!self.password.is_empty())
            .field("server_url", &self.server_url)
            .field("file_path", &self.file_path)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .finish()
    }
}

/// WebDAV vendor metadata without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVendorConfig {
    pub id: String,
    pub name: String,
    pub server_url: String,
}

fn default_file_name() -> String {
    DEFAULT_FILENAME.to_string()
}

fn default_file_path() -> String {
    DEFAULT_WEBDAV_FILEPATH.to_string()
}

fn default_api_url() -> String {
    DEFAULT_GIST_API_URL.to_string()
}

fn default_true() -> bool {
    true
}
