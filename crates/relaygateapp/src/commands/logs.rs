use super::helpers::resolve_device;
use super::{CmdMessage, CmdResult};
use crate::error::{GateError, Result};
use crate::model::{LogCategory, SYSTEM_LOG_BUCKET};
use crate::store::{AppStore, KeyValueStore};

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// A device selector, `"system"`, or `None` for every bucket.
    pub device: Option<String>,
    pub category: Option<LogCategory>,
    pub limit: Option<usize>,
    pub failures_only: bool,
}

pub fn list<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    filter: LogFilter,
) -> Result<CmdResult> {
    let mut logs = match filter.device.as_deref() {
        Some(SYSTEM_LOG_BUCKET) => store.get_device_logs(SYSTEM_LOG_BUCKET),
        Some(selector) => {
            let device = resolve_device(store, Some(selector))?;
            store.get_device_logs(&device.id)
        }
        None => store.get_all_logs(),
    };

    logs.retain(|entry| {
        filter.category.map_or(true, |c| entry.category == c)
            && (!filter.failures_only || !entry.success)
    });
    if let Some(limit) = filter.limit {
        logs.truncate(limit);
    }

    let mut result = CmdResult::default()
        .with_listed_devices(store.get_devices())
        .with_listed_logs(logs);
    if result.listed_logs.is_empty() {
        result.add_message(CmdMessage::info("No log entries"));
    }
    Ok(result)
}

pub async fn clear<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    device: &str,
) -> Result<CmdResult> {
    let (bucket, label) = if device == SYSTEM_LOG_BUCKET {
        (SYSTEM_LOG_BUCKET.to_string(), SYSTEM_LOG_BUCKET.to_string())
    } else {
        let device = resolve_device(store, Some(device))?;
        (device.id, device.name)
    };

    if !store.clear_device_logs(&bucket).await {
        return Err(GateError::Api(format!("No log bucket for {}", label)));
    }
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Cleared logs for {}", label)));
    Ok(result)
}
