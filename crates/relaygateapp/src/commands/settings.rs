use super::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::{GlobalSettingsUpdate, LogCategory};
use crate::sms::RelayCommand;
use crate::store::{AppStore, KeyValueStore};
use crate::validation::validate_phone_number;

pub fn show<B: KeyValueStore + 'static>(store: &AppStore<B>) -> Result<CmdResult> {
    Ok(CmdResult::default()
        .with_settings(store.get_global_settings())
        .with_listed_devices(store.get_devices()))
}

/// Record the admin number. When there is an active device, also build the
/// SMS that registers the number on the relay.
pub async fn set_admin<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    number: &str,
) -> Result<CmdResult> {
    let number = number.trim();
    validate_phone_number(number)?;

    let settings = store
        .update_global_settings(GlobalSettingsUpdate {
            admin_number: Some(number.to_string()),
            ..Default::default()
        })
        .await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Admin number set to {}", number)));

    match store.get_active_device() {
        Some(device) => {
            let body = RelayCommand::RegisterAdmin(number.to_string()).encode(&device.password)?;
            store.log_command(&device.id, &body, true).await;
            result = result.with_sms(device.unit_number, body);
        }
        None => {
            store
                .add_device_log(
                    "",
                    "Admin Number",
                    format!("Admin number set to {}", number),
                    true,
                    LogCategory::Settings,
                )
                .await;
            result.add_message(CmdMessage::info(
                "No active device; register the number on the relay later",
            ));
        }
    }
    Ok(result.with_settings(settings))
}

pub async fn complete_step<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    step: &str,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if store.complete_step(step).await {
        result.add_message(CmdMessage::success(format!("Step completed: {}", step)));
    } else {
        result.add_message(CmdMessage::info(format!("Step already completed: {}", step)));
    }
    Ok(result.with_settings(store.get_global_settings()))
}
