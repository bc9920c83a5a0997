use std::collections::BTreeSet;

use cloudleaf::bookmark::{
    apply_payload, export_tree, plan_import, read_local, Engine, MemoryBookmarkStore, Placement,
};
use cloudleaf::contract::{
    BookmarkNode, BookmarkStore, MockBookmarkStore, NativeNode, NewNode, StoreError, SyncPayload,
    SystemRole,
};
use tempfile::tempdir;

fn native(id: &str, title: &str, url: Option<&str>, children: Option<Vec<NativeNode>>) -> NativeNode {
    NativeNode {
        id: id.to_string(),
        parent_id: None,
        title: title.to_string(),
        url: url.map(str::to_string),
        children,
        date_added: None,
        date_group_modified: None,
    }
}

fn modified(mut node: NativeNode, at: i64) -> NativeNode {
    node.date_group_modified = Some(at);
    node
}

fn chromium_tree() -> NativeNode {
    native(
        "0",
        "",
        None,
        Some(vec![
            modified(
                native(
                    "1",
                    "Bookmarks bar",
                    None,
                    Some(vec![
                        native("10", "Rust", Some("https://www.rust-lang.org/"), None),
                        modified(
                            native(
                                "11",
                                "Work",
                                None,
                                Some(vec![
                                    native("12", "Tracker", Some("https://tracker.test/"), None),
                                    native("13", "", Some("https://untitled.test/"), None),
                                ]),
                            ),
                            1_700_000_000_500,
                        ),
                        native("14", "Later", None, None),
                    ]),
                ),
                1_700_000_000_000,
            ),
            native(
                "2",
                "Other bookmarks",
                None,
                Some(vec![native("20", "Docs", Some("https://docs.rs/"), None)]),
            ),
            native("3", "Mobile bookmarks", None, Some(vec![])),
        ]),
    )
}

fn leaves(nodes: &[BookmarkNode], out: &mut BTreeSet<(String, String)>) {
    for node in nodes {
        if let Some(url) = &node.url {
            out.insert((node.title.clone(), url.clone()));
        }
        if let Some(children) = &node.children {
            leaves(children, out);
        }
    }
}

fn leaf_set(payload: &SyncPayload) -> BTreeSet<(String, String)> {
    let mut out = BTreeSet::new();
    leaves(&payload.bookmarks, &mut out);
    out
}

#[test]
fn engines_are_detected_from_the_root() {
    assert_eq!(Engine::detect(&chromium_tree()), Engine::Chromium);
    assert_eq!(
        Engine::detect(&native("root________", "", None, Some(vec![]))),
        Engine::Gecko
    );
    assert!(!Engine::Chromium.has_menu());
    assert_eq!(Engine::Gecko.role_of("toolbar_____"), Some(SystemRole::Bar));
    assert_eq!(Engine::Chromium.native_id(SystemRole::Mobile), Some("3"));
    assert!(!Engine::Chromium.is_reserved("10"));
}

#[test]
fn export_normalizes_and_counts() {
    let payload = export_tree(&chromium_tree());

    assert_eq!(payload.updated_at, 1_700_000_000_500);
    assert_eq!(payload.num_bookmarks, 3);
    assert_eq!(payload.bookmarks.len(), 3);

    let bar = &payload.bookmarks[0];
    assert_eq!(bar.id, Some(SystemRole::Bar));
    let children = bar.children.as_ref().unwrap();
    assert_eq!(children.len(), 3);
    // Untitled leaves are dropped.
    assert_eq!(children[1].children.as_ref().unwrap().len(), 1);
    // Title-only nodes become empty folders without a children key.
    assert_eq!(children[2], BookmarkNode::empty_folder("Later"));

    assert_eq!(payload.bookmarks[1].id, Some(SystemRole::Other));
    assert_eq!(payload.bookmarks[2].id, Some(SystemRole::Mobile));
}

#[test]
fn export_without_timestamps_uses_the_clock() {
    let before = chrono::Utc::now().timestamp_millis();
    let payload = export_tree(&native("0", "", None, Some(vec![])));
    assert!(payload.updated_at >= before);
    assert!(payload.bookmarks.is_empty());
}

#[test]
fn untitled_folders_keep_their_bookmarks() {
    let tree = native(
        "0",
        "",
        None,
        Some(vec![native(
            "1",
            "Bookmarks bar",
            None,
            Some(vec![native(
                "10",
                "",
                None,
                Some(vec![native("11", "Kept", Some("https://kept.test/"), None)]),
            )]),
        )]),
    );
    let payload = export_tree(&tree);

    assert_eq!(payload.num_bookmarks, 1);
    let untitled = &payload.bookmarks[0].children.as_ref().unwrap()[0];
    assert_eq!(
        *untitled,
        BookmarkNode::folder("", vec![BookmarkNode::leaf("Kept", "https://kept.test/")])
    );
}

#[test]
fn gecko_menu_moves_to_the_end() {
    let tree = native(
        "root________",
        "",
        None,
        Some(vec![
            native(
                "menu________",
                "Bookmarks Menu",
                None,
                Some(vec![native("a", "Mozilla", Some("https://mozilla.org/"), None)]),
            ),
            native("toolbar_____", "Bookmarks Toolbar", None, Some(vec![])),
            native("unfiled_____", "Other Bookmarks", None, Some(vec![])),
            native("mobile______", "Mobile Bookmarks", None, Some(vec![])),
        ]),
    );
    let roles: Vec<Option<SystemRole>> = export_tree(&tree).bookmarks.iter().map(|n| n.id).collect();
    assert_eq!(
        roles,
        vec![
            Some(SystemRole::Bar),
            Some(SystemRole::Other),
            Some(SystemRole::Mobile),
            Some(SystemRole::Menu),
        ]
    );
}

#[test]
fn legacy_payloads_map_by_position() {
    let bookmarks = vec![
        BookmarkNode::folder("Bar", vec![]),
        BookmarkNode::folder("Other", vec![]),
        BookmarkNode::folder("Mobile", vec![]),
        BookmarkNode::folder("Extra", vec![]),
    ];
    let plan = plan_import(Engine::Gecko, &bookmarks);
    assert_eq!(
        plan,
        vec![
            Placement::IntoReserved { folder_id: "toolbar_____", node: &bookmarks[0] },
            Placement::IntoReserved { folder_id: "unfiled_____", node: &bookmarks[1] },
            Placement::IntoReserved { folder_id: "mobile______", node: &bookmarks[2] },
            Placement::UnderRoot(&bookmarks[3]),
        ]
    );
}

#[test]
fn roles_the_engine_lacks_land_under_the_root() {
    let bookmarks = vec![
        BookmarkNode::folder("Menu", vec![]).with_role(SystemRole::Menu),
        BookmarkNode::folder("Bar", vec![]).with_role(SystemRole::Bar),
        BookmarkNode::folder("Loose", vec![]),
    ];
    let plan = plan_import(Engine::Chromium, &bookmarks);
    assert_eq!(
        plan,
        vec![
            Placement::UnderRoot(&bookmarks[0]),
            Placement::IntoReserved { folder_id: "1", node: &bookmarks[1] },
            Placement::UnderRoot(&bookmarks[2]),
        ]
    );
}

#[tokio::test]
async fn apply_then_export_keeps_every_leaf() {
    let original = export_tree(&chromium_tree());

    let store = MemoryBookmarkStore::gecko();
    let report = apply_payload(&store, &original).await.unwrap();
    assert_eq!(report.removed, 0);

    let restored = read_local(&store).await.unwrap();
    assert_eq!(restored.num_bookmarks, original.num_bookmarks);
    assert_eq!(leaf_set(&restored), leaf_set(&original));

    let bar = &restored.bookmarks[0];
    assert_eq!(bar.id, Some(SystemRole::Bar));
    assert_eq!(bar.title, "Bookmarks Toolbar");
    assert_eq!(bar.children.as_ref().unwrap()[0].title, "Rust");
}

#[tokio::test]
async fn apply_replaces_existing_bookmarks() {
    let store = MemoryBookmarkStore::chromium();
    let first = SyncPayload {
        updated_at: 1,
        num_bookmarks: 1,
        bookmarks: vec![
            BookmarkNode::folder("Bar", vec![BookmarkNode::leaf("Old", "https://old.test/")])
                .with_role(SystemRole::Bar),
            BookmarkNode::folder("Loose", vec![BookmarkNode::leaf("Gone", "https://gone.test/")]),
        ],
    };
    apply_payload(&store, &first).await.unwrap();

    let second = SyncPayload {
        updated_at: 2,
        num_bookmarks: 1,
        bookmarks: vec![BookmarkNode::folder(
            "Bar",
            vec![BookmarkNode::leaf("New", "https://new.test/")],
        )
        .with_role(SystemRole::Bar)],
    };
    let report = apply_payload(&store, &second).await.unwrap();
    // One bookmark emptied out of the bar, one user folder removed whole.
    assert_eq!(report.removed, 2);
    assert_eq!(report.created, 1);

    let tree = store.snapshot().unwrap();
    let top: Vec<&str> = tree.children.as_ref().unwrap().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(top, vec!["1", "2", "3"]);
    let after = export_tree(&tree);
    assert_eq!(
        leaf_set(&after),
        BTreeSet::from([("New".to_string(), "https://new.test/".to_string())])
    );
}

#[tokio::test]
async fn failed_removals_do_not_stop_the_import() {
    let mut store = MockBookmarkStore::new();
    store.expect_get_tree().returning(|| {
        Ok(native(
            "0",
            "",
            None,
            Some(vec![native(
                "1",
                "Bookmarks bar",
                None,
                Some(vec![
                    native("10", "Locked", Some("https://locked.test/"), None),
                    native("11", "Free", Some("https://free.test/"), None),
                ]),
            )]),
        ))
    });
    store
        .expect_remove_tree()
        .withf(|id| id == "10")
        .returning(|id| Err(StoreError::Forbidden(id.to_string())));
    store
        .expect_remove_tree()
        .withf(|id| id == "11")
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_create()
        .withf(|parent, node| {
            parent == "1"
                && *node
                    == NewNode {
                        title: "Fresh".to_string(),
                        url: Some("https://fresh.test/".to_string()),
                    }
        })
        .times(1)
        .returning(|parent, node| {
            Ok(NativeNode {
                id: "20".to_string(),
                parent_id: Some(parent.to_string()),
                title: node.title,
                url: node.url,
                children: None,
                date_added: None,
                date_group_modified: None,
            })
        });

    let payload = SyncPayload {
        updated_at: 1,
        num_bookmarks: 1,
        bookmarks: vec![BookmarkNode::folder(
            "Bar",
            vec![BookmarkNode::leaf("Fresh", "https://fresh.test/")],
        )
        .with_role(SystemRole::Bar)],
    };
    let report = apply_payload(&store, &payload).await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn root_placement_fails_on_hosts_that_refuse_it() {
    let mut store = MockBookmarkStore::new();
    store
        .expect_get_tree()
        .returning(|| Ok(native("0", "", None, Some(vec![native("1", "Bookmarks bar", None, Some(vec![]))]))));
    store.expect_remove_tree().never();
    store
        .expect_create()
        .withf(|parent, _| parent == "0")
        .times(1)
        .returning(|parent, _| Err(StoreError::Forbidden(parent.to_string())));

    let payload = SyncPayload {
        updated_at: 1,
        num_bookmarks: 0,
        bookmarks: vec![BookmarkNode::folder("Menu", vec![]).with_role(SystemRole::Menu)],
    };
    let err = apply_payload(&store, &payload).await.unwrap_err();
    assert!(matches!(err, StoreError::Forbidden(id) if id == "0"));
}

#[tokio::test]
async fn memory_store_guards_reserved_folders() {
    let store = MemoryBookmarkStore::chromium();
    assert!(matches!(store.remove_tree("1").await, Err(StoreError::Forbidden(_))));
    assert!(matches!(store.remove_tree("0").await, Err(StoreError::Forbidden(_))));
    assert!(matches!(store.remove_tree("99").await, Err(StoreError::NotFound(_))));

    let leaf = store
        .create("2", NewNode { title: "Leaf".into(), url: Some("https://leaf.test/".into()) })
        .await
        .unwrap();
    assert!(matches!(
        store.create(&leaf.id, NewNode { title: "Child".into(), url: None }).await,
        Err(StoreError::Forbidden(_))
    ));
}

#[tokio::test]
async fn memory_store_persists_as_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bookmarks.json");

    let store = MemoryBookmarkStore::chromium();
    store
        .create("1", NewNode { title: "Saved".into(), url: Some("https://saved.test/".into()) })
        .await
        .unwrap();
    store.save(&path).unwrap();

    let reloaded = MemoryBookmarkStore::load(&path).unwrap();
    assert_eq!(reloaded.snapshot().unwrap(), store.snapshot().unwrap());
    // Fresh ids never collide with loaded ones.
    let next = reloaded
        .create("1", NewNode { title: "Next".into(), url: None })
        .await
        .unwrap();
    assert_eq!(next.id, "5");
}
