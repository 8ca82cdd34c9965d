use super::{CmdMessage, CmdResult};
use crate::backup::{restore_from_backup, restore_from_file, write_backup_file, RestoreReport};
use crate::error::Result;
use crate::store::{AppStore, KeyValueStore};
use std::path::Path;

pub async fn export<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    dir: &Path,
) -> Result<CmdResult> {
    let path = write_backup_file(store, dir).await?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Backup written to {}",
        path.display()
    )));
    result.backup_path = Some(path);
    Ok(result)
}

pub async fn import_file<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    path: &Path,
) -> Result<CmdResult> {
    let report = restore_from_file(store, path).await?;
    Ok(report_result(store, report))
}

pub async fn import_text<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    text: &str,
) -> Result<CmdResult> {
    let report = restore_from_backup(store, text).await?;
    Ok(report_result(store, report))
}

fn report_result<B: KeyValueStore + 'static>(store: &AppStore<B>, report: RestoreReport) -> CmdResult {
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Restored {} key(s)",
        report.keys_written
    )));
    if report.tier != crate::backup::ParseTier::Strict {
        result.add_message(CmdMessage::warning(format!(
            "Backup was damaged; recovered with the {} parser",
            report.tier.as_str()
        )));
    }
    if report.merged {
        result.add_message(CmdMessage::info(format!(
            "Merged with existing data: {} device(s) added, {} kept as on this device, {} user(s) added, {} log entries adopted",
            report.devices_added, report.devices_skipped, report.users_added, report.logs_adopted
        )));
    }
    if report.entries_dropped > 0 {
        result.add_message(CmdMessage::warning(format!(
            "Skipped {} unreadable record(s) in the backup",
            report.entries_dropped
        )));
    }
    if report.preserved_log_keys > 0 {
        result.add_message(CmdMessage::info(format!(
            "Kept {} log key(s) the backup did not include",
            report.preserved_log_keys
        )));
    }
    result.restore_report = Some(report);
    result
        .with_listed_devices(store.get_devices())
        .with_settings(store.get_global_settings())
}

/// Remove every stored key.
pub async fn reset<B: KeyValueStore + 'static>(store: &AppStore<B>) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if store.reset().await {
        result.add_message(CmdMessage::success("All data removed"));
    } else {
        result.add_message(CmdMessage::warning(
            "Data cleared in memory, but some stored keys could not be removed",
        ));
    }
    Ok(result)
}
