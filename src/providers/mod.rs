//! Concrete [`Provider`](crate::contract::Provider) implementations and the
//! WebDAV vendor registry.
//!
//! - [`gist`]: GitHub Gist over the REST API (Bearer token).
//! - [`webdav`]: any WebDAV server (Basic auth).
//! - [`local`]: local JSON file through the host's file dialogs.
//! - [`registry`]: preset and custom WebDAV vendors, and the WebDAV factory.

pub mod gist;
pub mod local;
pub mod registry;
pub mod webdav;

pub use gist::GistProvider;
pub use local::{FsFileHost, LocalFileProvider};
pub use registry::{RegistryError, VendorRegistry};
pub use webdav::WebDavProvider;
