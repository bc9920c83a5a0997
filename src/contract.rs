//! # contract: portable data model and collaborator interfaces
//!
//! This module defines the shapes that travel between the bookmark store,
//! the providers and the orchestrator, plus the traits at every seam where
//! a real backend can be swapped for a test double.
//!
//! ## Types
//! - [`SyncPayload`] / [`BookmarkNode`] / [`SystemRole`]: the engine-agnostic snapshot
//!   exchanged with every provider.
//! - [`NativeNode`] / [`NewNode`]: the engine-specific tree as exposed by the browser.
//! - [`ProviderError`] / [`ProviderResult`]: the one result shape used by all providers.
//!
//! ## Traits
//! - [`Provider`]: `is_valid` / `upload` / `download` for one storage backend.
//! - [`BookmarkStore`]: the native bookmark tree (read, create, remove subtree).
//! - [`ConfigStore`]: persisted user configuration.
//! - [`FileHost`]: the host's save-as and open-file interactions.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; the generated `Mock*` types are
//! exported under the default `test-export-mocks` feature so integration
//! tests can script provider and store behaviour.

use std::str::FromStr;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::config::UserConfig;

/// Portable tag for a browser's reserved top-level folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Menu,
    Bar,
    Other,
    Mobile,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Menu => "menu",
            SystemRole::Bar => "bar",
            SystemRole::Other => "other",
            SystemRole::Mobile => "mobile",
        }
    }
}

impl FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(SystemRole::Menu),
            "bar" => Ok(SystemRole::Bar),
            "other" => Ok(SystemRole::Other),
            "mobile" => Ok(SystemRole::Mobile),
            other => Err(format!("unknown system role: {other}")),
        }
    }
}

/// Unknown or non-string role values are read as "no role" so that payloads
/// written by other tools still load.
fn lenient_role<'de, D>(deserializer: D) -> Result<Option<SystemRole>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok()))
}

/// One node of the portable bookmark tree.
///
/// A node is a leaf (`url`, no `children`), a folder (`children`, no `url`)
/// or an empty folder (neither). Only top-level nodes carry `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkNode {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_role"
    )]
    pub id: Option<SystemRole>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    pub fn leaf(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: Some(url.into()),
            children: None,
        }
    }

    pub fn folder(title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: None,
            children: Some(children),
        }
    }

    pub fn empty_folder(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: None,
            children: None,
        }
    }

    pub fn with_role(mut self, role: SystemRole) -> Self {
        self.id = Some(role);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.url.is_some() && self.children.is_none()
    }
}

/// Snapshot of the whole bookmark tree, as exchanged with providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    /// Epoch milliseconds of the most recent local modification.
    pub updated_at: i64,
    /// Number of leaf bookmarks in `bookmarks`. Older payloads omit it.
    #[serde(default)]
    pub num_bookmarks: usize,
    pub bookmarks: Vec<BookmarkNode>,
}

/// Why a serialized payload could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("missing bookmarks field")]
    MissingBookmarks,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl SyncPayload {
    /// Parses and validates a serialized payload: the text must be JSON and
    /// its `bookmarks` field must be a sequence.
    pub fn from_json(text: &str) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| PayloadError::Json(e.to_string()))?;
        match value.get("bookmarks") {
            Some(serde_json::Value::Array(_)) => {}
            _ => return Err(PayloadError::MissingBookmarks),
        }
        serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Outcome of a read-only configuration/connectivity probe.
///
/// `valid == false` is a *soft* failure: the probe itself ran, but the
/// configuration is not usable. Transport failures are reported as
/// [`ProviderError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Every failure a provider can report. Providers return these, never panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unknown error: {0}")]
    Unknown(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("file {0} not found")]
    FileNotFound(String),
    #[error("remote file does not exist: upload bookmarks first")]
    NotUploaded,
    #[error("invalid file format: {0}")]
    Format(String),
    #[error("no file selected")]
    NoFileSelected,
    #[error("file selection canceled")]
    Canceled,
    #[error("failed to parse file: {0}")]
    Parse(String),
    #[error("invalid bookmark data: {0}")]
    InvalidData(String),
    #[error("file host error: {0}")]
    Host(String),
}

impl ProviderError {
    /// Numeric status associated with the failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            ProviderError::FileNotFound(_) | ProviderError::NotUploaded => Some(404),
            _ => None,
        }
    }

    /// True when the remote document or its parent simply does not exist yet.
    pub fn is_absent(&self) -> bool {
        matches!(self.status(), Some(404) | Some(409))
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A pluggable storage backend for [`SyncPayload`] snapshots.
///
/// Implementations are side-effect isolated: every failure is returned as a
/// [`ProviderError`], and `is_valid` never mutates remote state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, e.g. `gist` or a vendor id.
    fn id(&self) -> String;

    /// Display name used to prefix user-visible errors.
    fn name(&self) -> String;

    /// Read-only probe of configuration and connectivity.
    async fn is_valid(&self) -> ProviderResult<Validation>;

    /// Replace the remote snapshot with `payload`.
    async fn upload(&self, payload: &SyncPayload) -> ProviderResult<()>;

    /// Fetch and validate the remote snapshot.
    async fn download(&self) -> ProviderResult<SyncPayload>;
}

/// A node of the browser's native bookmark tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NativeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_group_modified: Option<i64>,
}

/// Creation request for [`BookmarkStore::create`]. No `url` means folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub title: String,
    pub url: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bookmark node not found: {0}")]
    NotFound(String),
    #[error("bookmark node {0} cannot be modified")]
    Forbidden(String),
    #[error("bookmark store unavailable: {0}")]
    Unavailable(String),
    #[error("bookmark store I/O error: {0}")]
    Io(String),
}

/// The browser's native bookmark tree.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Returns the root node with its full subtree.
    async fn get_tree(&self) -> Result<NativeNode, StoreError>;

    /// Creates a node under `parent_id` and returns it with its new id.
    async fn create(&self, parent_id: &str, node: NewNode) -> Result<NativeNode, StoreError>;

    /// Removes the node `id` and everything below it.
    async fn remove_tree(&self, id: &str) -> Result<(), StoreError>;
}

/// Error type for config persistence (simple boxed error, as for other collaborators).
pub type ConfigError = Box<dyn std::error::Error + Send + Sync>;

/// Persisted user configuration.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<UserConfig, ConfigError>;

    async fn save(&self, config: &UserConfig) -> Result<(), ConfigError>;
}

/// What the host's open-file interaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// A file was picked; its UTF-8 contents.
    Selected(String),
    /// The dialog closed without a file.
    Nothing,
    /// The user canceled the dialog.
    Canceled,
}

/// Error type for host file interactions.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// The host's save-as and open-file mechanisms.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Offer `contents` to the user as a downloadable file named `file_name`.
    async fn save(&self, file_name: &str, contents: &str) -> Result<(), HostError>;

    /// Ask the user for a file to open.
    async fn open(&self) -> Result<FileSelection, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_bookmarks_sequence() {
        assert_eq!(
            SyncPayload::from_json(r#"{"updatedAt": 1, "bookmarks": {}}"#),
            Err(PayloadError::MissingBookmarks)
        );
        assert_eq!(
            SyncPayload::from_json(r#"{"updatedAt": 1}"#),
            Err(PayloadError::MissingBookmarks)
        );
        assert!(matches!(
            SyncPayload::from_json("not json"),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn legacy_payload_without_count_and_unknown_role_loads() {
        let payload = SyncPayload::from_json(
            r#"{"updatedAt": 5, "bookmarks": [{"id": "toolbar_____", "title": "Bar", "children": []}]}"#,
        )
        .unwrap();
        assert_eq!(payload.num_bookmarks, 0);
        assert_eq!(payload.bookmarks[0].id, None);
    }

    #[test]
    fn absent_statuses() {
        assert!(ProviderError::NotUploaded.is_absent());
        assert!(ProviderError::Http {
            status: 409,
            message: "conflict".into()
        }
        .is_absent());
        assert!(!ProviderError::Timeout.is_absent());
        assert!(!ProviderError::Http {
            status: 401,
            message: "auth".into()
        }
        .is_absent());
    }

    #[test]
    fn serialized_node_omits_absent_fields() {
        let json = serde_json::to_string(&BookmarkNode::empty_folder("Empty")).unwrap();
        assert_eq!(json, r#"{"title":"Empty"}"#);
        let json =
            serde_json::to_string(&BookmarkNode::folder("Bar", vec![]).with_role(SystemRole::Bar))
                .unwrap();
        assert_eq!(json, r#"{"id":"bar","title":"Bar","children":[]}"#);
    }
}
