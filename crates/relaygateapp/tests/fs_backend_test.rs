use relaygateapp::keys::{device_logs_key, APP_DATA_KEY};
use relaygateapp::model::{NewDevice, NewUser};
use relaygateapp::store::fs_backend::FsBackend;
use relaygateapp::store::{AppStore, InitOutcome, KeyValueStore};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FsBackend) {
    let dir = TempDir::new().unwrap();
    let backend = FsBackend::new(dir.path().join("store"));
    (dir, backend)
}

#[tokio::test]
async fn test_fs_backend_basic_io() {
    let (_dir, backend) = setup();

    backend.set(APP_DATA_KEY, "{}").await.unwrap();
    assert_eq!(backend.get(APP_DATA_KEY).await.unwrap(), Some("{}".into()));

    backend.remove(APP_DATA_KEY).await.unwrap();
    assert_eq!(backend.get(APP_DATA_KEY).await.unwrap(), None);

    // Removing a missing key is not an error.
    backend.remove(APP_DATA_KEY).await.unwrap();
}

#[tokio::test]
async fn test_fs_backend_atomic_write_artifacts() {
    let (dir, backend) = setup();
    backend.set("@unit_number", "0400000000").await.unwrap();
    backend.set("@unit_number", "0400000001").await.unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path().join("store"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 1);
    for name in &entries {
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
    assert_eq!(
        backend.get("@unit_number").await.unwrap().as_deref(),
        Some("0400000001")
    );
}

#[tokio::test]
async fn test_fs_backend_lists_original_key_names() {
    let (dir, backend) = setup();
    let logs_key = device_logs_key("1700000000000");
    backend.set(APP_DATA_KEY, "{}").await.unwrap();
    backend.set(&logs_key, "[]").await.unwrap();
    // Files the backend did not write are not keys.
    fs::write(dir.path().join("store").join("notes.txt"), "x").unwrap();

    let keys = backend.list_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&APP_DATA_KEY.to_string()));
    assert!(keys.contains(&logs_key));

    backend
        .multi_remove(&[APP_DATA_KEY.to_string(), logs_key])
        .await
        .unwrap();
    assert!(backend.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_keys_on_missing_dir_is_empty() {
    let (_dir, backend) = setup();
    assert!(backend.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_round_trips_through_disk() {
    let (dir, backend) = setup();
    let store = AppStore::new(backend);
    assert_eq!(store.initialize().await, InitOutcome::Empty);

    let gate = store
        .add_device(NewDevice::new("Gate", "0400000000").with_password("1234"))
        .await
        .unwrap();
    let ann = store
        .add_user(NewUser::new("Ann", "0411222333", "001"))
        .await
        .unwrap();
    assert!(store.authorize_user_for_device(&gate.id, &ann.id).await);
    store.log_command(&gate.id, "1234CC", true).await;
    assert!(store.flush().await);

    let reopened = AppStore::new(FsBackend::new(dir.path().join("store")));
    assert_eq!(reopened.initialize().await, InitOutcome::Loaded);
    assert_eq!(reopened.get_devices(), store.get_devices());
    assert_eq!(reopened.get_device_users(&gate.id)[0].name, "Ann");
    assert_eq!(reopened.get_device_logs(&gate.id)[0].action, "Gate Open");
}

#[tokio::test]
async fn test_corrupt_document_on_disk_starts_empty() {
    let (dir, backend) = setup();
    backend.set(APP_DATA_KEY, "{\"devices\": [").await.unwrap();

    let store = AppStore::new(FsBackend::new(dir.path().join("store")));
    assert!(matches!(
        store.initialize().await,
        InitOutcome::Unreadable(_)
    ));
    assert!(store.get_devices().is_empty());
}

#[tokio::test]
async fn test_fs_backend_handles_keys_too_long_for_a_file_name() {
    let (dir, backend) = setup();
    let long_key = format!("@legacy_{}", "k".repeat(400));
    backend.set(&long_key, "first\nsecond").await.unwrap();
    backend.set(APP_DATA_KEY, "{}").await.unwrap();

    assert_eq!(
        backend.get(&long_key).await.unwrap().as_deref(),
        Some("first\nsecond")
    );
    let keys = backend.list_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&long_key));
    for entry in fs::read_dir(dir.path().join("store")).unwrap() {
        assert!(entry.unwrap().file_name().len() <= 255);
    }

    backend.remove(&long_key).await.unwrap();
    assert_eq!(backend.get(&long_key).await.unwrap(), None);
}
