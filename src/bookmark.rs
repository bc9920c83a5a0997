//! # bookmark: native tree <-> portable payload
//!
//! Export walks the browser's native tree and produces a [`SyncPayload`];
//! import destructively rebuilds the native tree from a payload.
//!
//! Two engine families are recognised by their root id:
//! - Chromium: root `0`, reserved `1` (bar), `2` (other), `3` (mobile); no menu.
//! - Gecko: root `root________`, reserved `menu________`, `toolbar_____`,
//!   `unfiled_____`, `mobile______`.
//!
//! Import is not transactional: the local tree is cleared first and then
//! recreated node by node. An interruption leaves a partially rebuilt tree.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::contract::{
    BookmarkNode, BookmarkStore, NativeNode, NewNode, StoreError, SyncPayload, SystemRole,
};

pub const CHROMIUM_ROOT_ID: &str = "0";
pub const GECKO_ROOT_ID: &str = "root________";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Chromium,
    Gecko,
}

impl Engine {
    pub fn detect(root: &NativeNode) -> Self {
        if root.id == GECKO_ROOT_ID {
            Engine::Gecko
        } else {
            Engine::Chromium
        }
    }

    /// Native id of the reserved folder playing `role`, if the engine has one.
    pub fn native_id(&self, role: SystemRole) -> Option<&'static str> {
        match (self, role) {
            (Engine::Chromium, SystemRole::Menu) => None,
            (Engine::Chromium, SystemRole::Bar) => Some("1"),
            (Engine::Chromium, SystemRole::Other) => Some("2"),
            (Engine::Chromium, SystemRole::Mobile) => Some("3"),
            (Engine::Gecko, SystemRole::Menu) => Some("menu________"),
            (Engine::Gecko, SystemRole::Bar) => Some("toolbar_____"),
            (Engine::Gecko, SystemRole::Other) => Some("unfiled_____"),
            (Engine::Gecko, SystemRole::Mobile) => Some("mobile______"),
        }
    }

    pub fn role_of(&self, native_id: &str) -> Option<SystemRole> {
        [
            SystemRole::Menu,
            SystemRole::Bar,
            SystemRole::Other,
            SystemRole::Mobile,
        ]
        .into_iter()
        .find(|role| self.native_id(*role) == Some(native_id))
    }

    pub fn is_reserved(&self, native_id: &str) -> bool {
        self.role_of(native_id).is_some()
    }

    pub fn has_menu(&self) -> bool {
        self.native_id(SystemRole::Menu).is_some()
    }
}

/// Running totals threaded through the export walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Walk {
    max_timestamp: i64,
    count: usize,
}

/// Folders are kept whatever their title, so an untitled folder still
/// carries its bookmarks; only untitled leaves are dropped.
fn normalize_node(node: &NativeNode, mut acc: Walk) -> (Option<BookmarkNode>, Walk) {
    if let Some(children) = &node.children {
        acc.max_timestamp = acc.max_timestamp.max(node.date_group_modified.unwrap_or(0));
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            let (normalized, next) = normalize_node(child, acc);
            acc = next;
            kept.extend(normalized);
        }
        return (Some(BookmarkNode::folder(node.title.clone(), kept)), acc);
    }

    match &node.url {
        Some(url) if !node.title.is_empty() && !url.is_empty() => {
            acc.count += 1;
            (Some(BookmarkNode::leaf(node.title.clone(), url.clone())), acc)
        }
        None if !node.title.is_empty() => (Some(BookmarkNode::empty_folder(node.title.clone())), acc),
        _ => (None, acc),
    }
}

/// Converts a native tree into a payload.
///
/// `updated_at` is the newest folder modification time in the tree, or now
/// when the tree carries none.
pub fn export_tree(root: &NativeNode) -> SyncPayload {
    let engine = Engine::detect(root);
    let mut acc = Walk::default();
    let mut bookmarks = Vec::new();
    let mut menu = None;

    for child in root.children.iter().flatten() {
        let (normalized, next) = normalize_node(child, acc);
        acc = next;
        let Some(mut node) = normalized else {
            continue;
        };
        node.id = engine.role_of(&child.id);
        if node.id == Some(SystemRole::Menu) {
            menu = Some(node);
        } else {
            bookmarks.push(node);
        }
    }
    // Engines without a menu list bar/other/mobile first; keep that order.
    bookmarks.extend(menu);

    let updated_at = if acc.max_timestamp > 0 {
        acc.max_timestamp
    } else {
        chrono::Utc::now().timestamp_millis()
    };
    SyncPayload {
        updated_at,
        num_bookmarks: acc.count,
        bookmarks,
    }
}

/// Reads the store and exports it.
pub async fn read_local(store: &dyn BookmarkStore) -> Result<SyncPayload, StoreError> {
    let root = store.get_tree().await?;
    let payload = export_tree(&root);
    debug!(
        engine = ?Engine::detect(&root),
        updated_at = payload.updated_at,
        num_bookmarks = payload.num_bookmarks,
        "[BOOKMARKS] Local snapshot taken"
    );
    Ok(payload)
}

/// Where a top-level payload node lands on import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement<'a> {
    /// The node's children are created inside an existing reserved folder.
    IntoReserved {
        folder_id: &'static str,
        node: &'a BookmarkNode,
    },
    /// The node itself is created under the tree root. Hosts that refuse
    /// writes to the root (Chromium does) reject this placement, and the
    /// import then fails at that node.
    UnderRoot(&'a BookmarkNode),
}

/// Decides where every top-level node goes.
///
/// Tagged payloads map by role; a role the engine lacks falls back to the
/// root. Payloads without any role use the legacy positional layout: the
/// first three nodes are bar, other and mobile.
pub fn plan_import(engine: Engine, bookmarks: &[BookmarkNode]) -> Vec<Placement<'_>> {
    let tagged = bookmarks.iter().any(|n| n.id.is_some());
    if tagged {
        return bookmarks
            .iter()
            .map(|node| match node.id.and_then(|role| engine.native_id(role)) {
                Some(folder_id) => Placement::IntoReserved { folder_id, node },
                None => Placement::UnderRoot(node),
            })
            .collect();
    }

    let positional = [SystemRole::Bar, SystemRole::Other, SystemRole::Mobile];
    bookmarks
        .iter()
        .enumerate()
        .map(|(index, node)| {
            match positional.get(index).and_then(|role| engine.native_id(*role)) {
                Some(folder_id) => Placement::IntoReserved { folder_id, node },
                None => Placement::UnderRoot(node),
            }
        })
        .collect()
}

/// Counts from one [`apply_payload`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub removed: usize,
    pub created: usize,
}

/// Deletes user folders whole and empties the reserved ones.
async fn clear_local(store: &dyn BookmarkStore, root: &NativeNode, engine: Engine) -> usize {
    let mut removed = 0;
    for child in root.children.iter().flatten() {
        let targets: Vec<&NativeNode> = if engine.is_reserved(&child.id) {
            child.children.iter().flatten().collect()
        } else {
            vec![child]
        };
        for target in targets {
            match store.remove_tree(&target.id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(id = %target.id, error = %e, "[BOOKMARKS] Failed to remove subtree, continuing")
                }
            }
        }
    }
    removed
}

/// Depth-first creation of `nodes` under `parent_id`. Returns the number of nodes created.
fn create_nodes<'a>(
    store: &'a dyn BookmarkStore,
    parent_id: &'a str,
    nodes: &'a [BookmarkNode],
) -> BoxFuture<'a, Result<usize, StoreError>> {
    async move {
        let mut created = 0;
        for node in nodes {
            match &node.children {
                Some(children) if !children.is_empty() => {
                    let folder = store
                        .create(
                            parent_id,
                            NewNode {
                                title: node.title.clone(),
                                url: None,
                            },
                        )
                        .await?;
                    created += 1;
                    created += create_nodes(store, &folder.id, children).await?;
                }
                _ => {
                    store
                        .create(
                            parent_id,
                            NewNode {
                                title: node.title.clone(),
                                url: node.url.clone(),
                            },
                        )
                        .await?;
                    created += 1;
                }
            }
        }
        Ok(created)
    }
    .boxed()
}

/// Replaces the local tree with `payload`.
pub async fn apply_payload(
    store: &dyn BookmarkStore,
    payload: &SyncPayload,
) -> Result<ApplyReport, StoreError> {
    let root = store.get_tree().await?;
    let engine = Engine::detect(&root);
    info!(engine = ?engine, num_bookmarks = payload.num_bookmarks, "[BOOKMARKS] Applying payload");

    let removed = clear_local(store, &root, engine).await;
    let mut created = 0;
    for placement in plan_import(engine, &payload.bookmarks) {
        match placement {
            Placement::IntoReserved { folder_id, node } => {
                if let Some(children) = &node.children {
                    created += create_nodes(store, folder_id, children).await?;
                }
            }
            Placement::UnderRoot(node) => {
                created += create_nodes(store, &root.id, std::slice::from_ref(node)).await?;
            }
        }
    }

    info!(removed, created, "[BOOKMARKS] Payload applied");
    Ok(ApplyReport { removed, created })
}

/// In-memory native tree, optionally persisted as JSON. It answers like the
/// browser API: reserved folders and the root cannot be removed.
pub struct MemoryBookmarkStore {
    inner: Mutex<MemoryTree>,
}

struct MemoryTree {
    root: NativeNode,
    next_id: u64,
}

fn folder(id: &str, parent_id: Option<&str>, title: &str, children: Vec<NativeNode>) -> NativeNode {
    NativeNode {
        id: id.to_string(),
        parent_id: parent_id.map(str::to_string),
        title: title.to_string(),
        url: None,
        children: Some(children),
        date_added: None,
        date_group_modified: None,
    }
}

fn max_numeric_id(node: &NativeNode) -> u64 {
    let own = node.id.parse::<u64>().unwrap_or(0);
    node.children
        .iter()
        .flatten()
        .map(max_numeric_id)
        .fold(own, u64::max)
}

fn find_mut<'a>(node: &'a mut NativeNode, id: &str) -> Option<&'a mut NativeNode> {
    if node.id == id {
        return Some(node);
    }
    node.children
        .iter_mut()
        .flatten()
        .find_map(|child| find_mut(child, id))
}

/// Removes the descendant `id` from under `node`; returns its former parent's id.
fn detach(node: &mut NativeNode, id: &str, now: i64) -> Option<String> {
    let children = node.children.as_mut()?;
    if let Some(index) = children.iter().position(|c| c.id == id) {
        children.remove(index);
        node.date_group_modified = Some(now);
        return Some(node.id.clone());
    }
    children.iter_mut().find_map(|child| detach(child, id, now))
}

impl MemoryBookmarkStore {
    pub fn new(root: NativeNode) -> Self {
        let next_id = max_numeric_id(&root) + 1;
        Self {
            inner: Mutex::new(MemoryTree { root, next_id }),
        }
    }

    /// Empty tree shaped like a Chromium profile.
    pub fn chromium() -> Self {
        let root = CHROMIUM_ROOT_ID;
        Self::new(folder(
            root,
            None,
            "",
            vec![
                folder("1", Some(root), "Bookmarks bar", vec![]),
                folder("2", Some(root), "Other bookmarks", vec![]),
                folder("3", Some(root), "Mobile bookmarks", vec![]),
            ],
        ))
    }

    /// Empty tree shaped like a Gecko profile.
    pub fn gecko() -> Self {
        let root = GECKO_ROOT_ID;
        Self::new(folder(
            root,
            None,
            "",
            vec![
                folder("menu________", Some(root), "Bookmarks Menu", vec![]),
                folder("toolbar_____", Some(root), "Bookmarks Toolbar", vec![]),
                folder("unfiled_____", Some(root), "Other Bookmarks", vec![]),
                folder("mobile______", Some(root), "Mobile Bookmarks", vec![]),
            ],
        ))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        let root: NativeNode = serde_json::from_str(&text)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), engine = ?Engine::detect(&root), "[BOOKMARKS] Loaded native tree");
        Ok(Self::new(root))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.snapshot()?)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "[BOOKMARKS] Saved native tree");
        Ok(())
    }

    pub fn snapshot(&self) -> Result<NativeNode, StoreError> {
        Ok(self.lock()?.root.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryTree>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("bookmark tree lock poisoned".to_string()))
    }
}

#[async_trait]
impl BookmarkStore for MemoryBookmarkStore {
    async fn get_tree(&self) -> Result<NativeNode, StoreError> {
        self.snapshot()
    }

    async fn create(&self, parent_id: &str, node: NewNode) -> Result<NativeNode, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut tree = self.lock()?;
        let id = tree.next_id.to_string();
        tree.next_id += 1;

        let parent = find_mut(&mut tree.root, parent_id)
            .ok_or_else(|| StoreError::NotFound(parent_id.to_string()))?;
        if parent.url.is_some() {
            return Err(StoreError::Forbidden(parent_id.to_string()));
        }

        let created = NativeNode {
            id,
            parent_id: Some(parent_id.to_string()),
            title: node.title,
            children: if node.url.is_some() { None } else { Some(Vec::new()) },
            url: node.url,
            date_added: Some(now),
            date_group_modified: None,
        };
        parent.children.get_or_insert_with(Vec::new).push(created.clone());
        parent.date_group_modified = Some(now);
        Ok(created)
    }

    async fn remove_tree(&self, id: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut tree = self.lock()?;
        let engine = Engine::detect(&tree.root);
        if id == tree.root.id || engine.is_reserved(id) {
            return Err(StoreError::Forbidden(id.to_string()));
        }
        detach(&mut tree.root, id, now)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
