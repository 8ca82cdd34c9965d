use relaygateapp::backup::{
    create_backup, restore_from_backup, restore_from_file, write_backup_file, ParseTier,
};
use relaygateapp::error::GateError;
use relaygateapp::keys::{APP_DATA_KEY, LEGACY_LOGS_KEY};
use relaygateapp::model::{DeviceUpdate, GlobalSettingsUpdate, NewDevice, NewUser};
use relaygateapp::store::fs_backend::FsBackend;
use relaygateapp::store::{AppStore, KeyValueStore};
use tempfile::TempDir;

fn fs_store(dir: &TempDir, name: &str) -> AppStore<FsBackend> {
    AppStore::new(FsBackend::new(dir.path().join(name)))
}

async fn populated(dir: &TempDir, name: &str) -> AppStore<FsBackend> {
    let store = fs_store(dir, name);
    store.initialize().await;
    let gate = store
        .add_device(NewDevice::new("Gate", "0400000000").with_password("1234"))
        .await
        .unwrap();
    let ann = store
        .add_user(NewUser::new("Ann", "0411222333", "001"))
        .await
        .unwrap();
    store.authorize_user_for_device(&gate.id, &ann.id).await;
    store.log_command(&gate.id, "1234CC", true).await;
    assert!(store.set_active_device(&gate.id).await);
    store
        .update_global_settings(GlobalSettingsUpdate {
            admin_number: Some("0499000000".into()),
            ..Default::default()
        })
        .await;
    assert!(store.complete_step("welcome").await);
    store
}

#[tokio::test]
async fn backup_restores_into_empty_store() {
    let dir = TempDir::new().unwrap();
    let source = populated(&dir, "source").await;
    let backup = create_backup(&source).await.unwrap();

    let target = fs_store(&dir, "target");
    let report = restore_from_backup(&target, &backup).await.unwrap();

    assert_eq!(report.tier, ParseTier::Strict);
    assert!(!report.merged);
    assert_eq!(target.get_devices(), source.get_devices());
    assert_eq!(target.get_users(), source.get_users());
    assert_eq!(target.get_all_logs(), source.get_all_logs());

    let settings = target.get_global_settings();
    assert_eq!(settings, source.get_global_settings());
    assert_eq!(settings.admin_number, "0499000000");
    assert_eq!(settings.active_device_id, Some(source.get_devices()[0].id.clone()));
    assert_eq!(settings.completed_steps, vec!["welcome".to_string()]);
}

#[tokio::test]
async fn restore_from_backup_file() {
    let dir = TempDir::new().unwrap();
    let source = populated(&dir, "source").await;
    let path = write_backup_file(&source, &dir.path().join("backups"))
        .await
        .unwrap();
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("relaygate-backup-"));

    let target = fs_store(&dir, "target");
    restore_from_file(&target, &path).await.unwrap();
    assert_eq!(target.get_devices().len(), 1);
}

#[tokio::test]
async fn restore_merges_without_losing_on_device_data() {
    let dir = TempDir::new().unwrap();
    let source = populated(&dir, "source").await;
    let target = fs_store(&dir, "target");
    restore_from_backup(&target, &create_backup(&source).await.unwrap())
        .await
        .unwrap();
    let gate = target.get_devices()[0].clone();

    // The two installs drift apart.
    let garage = target
        .add_device(NewDevice::new("Garage", "0400000001"))
        .await
        .unwrap();
    target.log_command(&gate.id, "1234DD", true).await;

    source
        .update_device(
            &gate.id,
            DeviceUpdate {
                name: Some("Front Gate".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    source
        .add_device(NewDevice::new("Shed", "0400000002"))
        .await
        .unwrap();
    source.log_command(&gate.id, "1234GOT005#", true).await;

    let report = restore_from_backup(&target, &create_backup(&source).await.unwrap())
        .await
        .unwrap();
    assert!(report.merged);
    assert_eq!(report.devices_added, 1);
    assert_eq!(report.devices_skipped, 1);
    assert_eq!(report.logs_adopted, 1);

    let names: Vec<_> = target.get_devices().into_iter().map(|d| d.name).collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"Gate".to_string()), "on-device copy wins");
    assert!(names.contains(&"Garage".to_string()));
    assert!(names.contains(&"Shed".to_string()));
    assert!(target.get_device_by_id(&garage.id).is_some());

    let actions: Vec<_> = target
        .get_device_logs(&gate.id)
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert!(actions.contains(&"Gate Open".to_string()));
    assert!(actions.contains(&"Gate Close".to_string()));
    assert_eq!(actions.len(), 3);
}

#[tokio::test]
async fn restore_survives_noise_around_the_backup() {
    let dir = TempDir::new().unwrap();
    let source = populated(&dir, "source").await;
    let backup = create_backup(&source).await.unwrap();
    let noisy = format!("0123456789{}9876543210", backup);

    let target = fs_store(&dir, "target");
    restore_from_backup(&target, &noisy).await.unwrap();
    assert_eq!(target.get_devices(), source.get_devices());
}

#[tokio::test]
async fn restore_repairs_trailing_commas() {
    let dir = TempDir::new().unwrap();
    let target = fs_store(&dir, "target");
    let text = r#"{"version": "1.0", "data": {"@unit_number": "0400000000", "@device_password": "4321",},}"#;

    let report = restore_from_backup(&target, text).await.unwrap();
    assert_eq!(report.tier, ParseTier::Repaired);
    // Legacy keys migrate on the reload that ends the restore.
    let devices = target.get_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].unit_number, "0400000000");
    assert_eq!(devices[0].password, "4321");
}

#[tokio::test]
async fn unrecoverable_input_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let target = populated(&dir, "target").await;
    let before = target.backend().list_keys().await.unwrap();

    let result = restore_from_backup(&target, "this is not a backup").await;
    assert!(matches!(result, Err(GateError::BackupFormat(_))));
    assert_eq!(target.backend().list_keys().await.unwrap(), before);
    assert_eq!(target.get_devices().len(), 1);
}

#[tokio::test]
async fn on_device_log_keys_survive_restore() {
    let dir = TempDir::new().unwrap();
    let target = fs_store(&dir, "target");
    target
        .backend()
        .set(LEGACY_LOGS_KEY, r#"[{"id":"1","action":"old"}]"#)
        .await
        .unwrap();
    target.backend().set(APP_DATA_KEY, "{}").await.unwrap();

    let text = r#"{"version": "1.0", "data": {"@gsm_app_data": {"devices": []}}}"#;
    let report = restore_from_backup(&target, text).await.unwrap();
    assert_eq!(report.preserved_log_keys, 1);
    assert!(target
        .backend()
        .get(LEGACY_LOGS_KEY)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn records_that_would_not_load_are_dropped_not_written() {
    let dir = TempDir::new().unwrap();
    let target = fs_store(&dir, "target");
    target.initialize().await;
    target
        .add_device(NewDevice::new("Mine", "0400000000"))
        .await
        .unwrap();

    let text = r#"{"version": "1.0", "data": {"@gsm_app_data": {
        "devices": [
            {"name": "NoId", "unitNumber": "0400000009"},
            {"id": "x", "name": "Odd relay", "relaySettings": {"accessControl": "sometimes", "latchTime": "005"}}
        ],
        "logs": {"x": [{"action": "no id"}]}
    }}}"#;
    let report = restore_from_backup(&target, text).await.unwrap();
    assert!(report.merged);
    assert_eq!(report.entries_dropped, 2);
    assert_eq!(report.devices_added, 1);

    let mut names: Vec<_> = target.get_devices().into_iter().map(|d| d.name).collect();
    names.sort();
    assert_eq!(names, vec!["Mine".to_string(), "Odd relay".to_string()]);
    assert!(target.get_device_by_id("x").unwrap().relay_settings.is_none());

    // A later save must not wipe what was on disk.
    target
        .add_device(NewDevice::new("Later", "0400000001"))
        .await
        .unwrap();
    assert!(target.flush().await);
    let reopened = fs_store(&dir, "target");
    reopened.initialize().await;
    assert_eq!(reopened.get_devices().len(), 3);
}

#[tokio::test]
async fn app_data_that_is_not_a_document_is_rejected_before_clearing() {
    let dir = TempDir::new().unwrap();
    let target = populated(&dir, "target").await;
    let before = target.backend().list_keys().await.unwrap();

    let result = restore_from_backup(&target, r#"{"data": {"@gsm_app_data": [1, 2]}}"#).await;
    assert!(matches!(result, Err(GateError::BackupFormat(_))));
    assert_eq!(target.backend().list_keys().await.unwrap(), before);
    assert_eq!(target.get_devices().len(), 1);
}

#[tokio::test]
async fn merge_keeps_users_of_on_device_devices() {
    let dir = TempDir::new().unwrap();
    let target = populated(&dir, "target").await;
    let gate = target.get_devices()[0].clone();

    let other = fs_store(&dir, "other");
    other.initialize().await;
    let barn = other
        .add_device(NewDevice::new("Barn", "0400000005"))
        .await
        .unwrap();
    let vic = other
        .add_user(NewUser::new("Vic", "0411000000", "002"))
        .await
        .unwrap();
    other.authorize_user_for_device(&barn.id, &vic.id).await;

    let report = restore_from_backup(&target, &create_backup(&other).await.unwrap())
        .await
        .unwrap();
    assert!(report.merged);
    assert_eq!(report.users_added, 1);

    let mut names: Vec<_> = target.get_users().into_iter().map(|u| u.name).collect();
    names.sort();
    assert_eq!(names, vec!["Ann".to_string(), "Vic".to_string()]);

    // Every edge of every device still points at a user.
    for device in target.get_devices() {
        for edge in &device.authorized_users {
            assert!(target.get_user_by_id(&edge.user_id).is_some());
        }
    }
    assert_eq!(target.get_device_users(&gate.id)[0].name, "Ann");
    assert_eq!(target.get_device_users(&barn.id)[0].name, "Vic");
}
