use cloudleaf::contract::{
    BookmarkNode, FileSelection, MockFileHost, Provider, ProviderError, SyncPayload,
};
use cloudleaf::providers::{FsFileHost, LocalFileProvider};
use tempfile::tempdir;

fn sample() -> SyncPayload {
    SyncPayload {
        updated_at: 7,
        num_bookmarks: 1,
        bookmarks: vec![BookmarkNode::folder(
            "Other bookmarks",
            vec![BookmarkNode::leaf("Tokio", "https://tokio.rs/")],
        )],
    }
}

fn opening(selection: FileSelection) -> LocalFileProvider {
    let mut host = MockFileHost::new();
    host.expect_open()
        .times(1)
        .returning(move || Ok(selection.clone()));
    LocalFileProvider::new(Box::new(host))
}

#[tokio::test]
async fn upload_saves_a_dated_json_file() {
    let mut host = MockFileHost::new();
    host.expect_save()
        .withf(|name, contents| {
            name.starts_with("CloudLeaf-")
                && name.ends_with(".json")
                && SyncPayload::from_json(contents).is_ok()
        })
        .times(1)
        .returning(|_, _| Ok(()));

    LocalFileProvider::new(Box::new(host))
        .upload(&sample())
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_maps_host_failures() {
    let mut host = MockFileHost::new();
    host.expect_save()
        .returning(|_, _| Err("disk full".into()));

    let err = LocalFileProvider::new(Box::new(host))
        .upload(&sample())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Host("disk full".into()));
}

#[tokio::test]
async fn download_distinguishes_selection_outcomes() {
    assert_eq!(
        opening(FileSelection::Nothing).download().await,
        Err(ProviderError::NoFileSelected)
    );
    assert_eq!(
        opening(FileSelection::Canceled).download().await,
        Err(ProviderError::Canceled)
    );
}

#[tokio::test]
async fn download_distinguishes_bad_json_from_bad_data() {
    let err = opening(FileSelection::Selected("not json".into()))
        .download()
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));

    let err = opening(FileSelection::Selected(r#"{"updatedAt": 1}"#.into()))
        .download()
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidData(_)));

    let err = opening(FileSelection::Selected(
        r#"{"updatedAt": "yesterday", "bookmarks": []}"#.into(),
    ))
    .download()
    .await
    .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidData(_)));
}

#[tokio::test]
async fn is_valid_always_holds() {
    let provider = LocalFileProvider::new(Box::new(MockFileHost::new()));
    assert!(provider.is_valid().await.unwrap().valid);
    assert_eq!(provider.id(), "local");
}

#[tokio::test]
async fn filesystem_host_round_trips_an_export() {
    let dir = tempdir().unwrap();
    let exporter = LocalFileProvider::new(Box::new(FsFileHost::new().with_save_dir(dir.path())));
    exporter.upload(&sample()).await.unwrap();

    let exported = dir.path().join(LocalFileProvider::export_file_name());
    assert!(exported.exists());

    let importer = LocalFileProvider::new(Box::new(FsFileHost::new().with_selection(&exported)));
    assert_eq!(importer.download().await.unwrap(), sample());
}

#[tokio::test]
async fn filesystem_host_without_file_selects_nothing() {
    let dir = tempdir().unwrap();
    let missing = LocalFileProvider::new(Box::new(
        FsFileHost::new().with_selection(dir.path().join("absent.json")),
    ));
    assert_eq!(missing.download().await, Err(ProviderError::NoFileSelected));

    let unset = LocalFileProvider::new(Box::new(FsFileHost::new()));
    assert_eq!(unset.download().await, Err(ProviderError::NoFileSelected));
}
