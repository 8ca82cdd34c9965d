use super::helpers::resolve_device;
use super::{CmdMessage, CmdResult};
use crate::error::{GateError, Result};
use crate::model::{AccessControl, DeviceUpdate, LogCategory, NewDevice, RelaySettings};
use crate::sms::RelayCommand;
use crate::store::{AppStore, KeyValueStore};
use crate::validation::{validate_latch_time, validate_phone_number};

pub async fn add<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    fields: NewDevice,
) -> Result<CmdResult> {
    validate_phone_number(fields.unit_number.trim())?;
    let device = store.add_device(fields).await?;

    let mut result = CmdResult::default();
    // The first device becomes active so commands have a default target.
    if store.get_global_settings().active_device_id.is_none() {
        store.set_active_device(&device.id).await;
        result.add_message(CmdMessage::info(format!("{} is now the active device", device.name)));
    }
    store
        .add_device_log(
            &device.id,
            "Device Added",
            format!("Added {} ({})", device.name, device.unit_number),
            true,
            LogCategory::Settings,
        )
        .await;

    result.add_message(CmdMessage::success(format!("Device added: {}", device.name)));
    Ok(result.with_affected_devices(vec![device]))
}

pub fn list<B: KeyValueStore + 'static>(store: &AppStore<B>) -> Result<CmdResult> {
    let devices = store.get_devices();
    let mut result = CmdResult::default()
        .with_settings(store.get_global_settings())
        .with_listed_devices(devices);
    if result.listed_devices.is_empty() {
        result.add_message(CmdMessage::info("No devices yet. Add one with `device add`"));
    }
    Ok(result)
}

pub async fn update<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: Option<&str>,
    update: DeviceUpdate,
) -> Result<CmdResult> {
    let device = resolve_device(store, selector)?;
    if let Some(unit) = &update.unit_number {
        validate_phone_number(unit.trim())?;
    }
    let password_changed = update.password.is_some();

    let updated = store
        .update_device(&device.id, update)
        .await?
        .ok_or_else(|| GateError::Api(format!("Device not found: {}", device.id)))?;

    let details = if password_changed {
        format!("Updated {} (password changed)", updated.name)
    } else {
        format!("Updated {}", updated.name)
    };
    store
        .add_device_log(&updated.id, "Device Updated", details, true, LogCategory::Settings)
        .await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Device updated: {}", updated.name)));
    Ok(result.with_affected_devices(vec![updated]))
}

pub async fn delete<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: &str,
) -> Result<CmdResult> {
    let device = resolve_device(store, Some(selector))?;
    if !store.delete_device(&device.id).await {
        return Err(GateError::Api(format!("Device not found: {}", device.id)));
    }
    store
        .add_device_log(
            "",
            "Device Deleted",
            format!("Deleted {} ({})", device.name, device.unit_number),
            true,
            LogCategory::Settings,
        )
        .await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Device deleted: {}", device.name)));
    if let Some(active) = store.get_active_device() {
        result.add_message(CmdMessage::info(format!("Active device is now {}", active.name)));
    }
    Ok(result.with_affected_devices(vec![device]))
}

pub async fn activate<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: &str,
) -> Result<CmdResult> {
    let device = resolve_device(store, Some(selector))?;
    if !store.set_active_device(&device.id).await {
        return Err(GateError::Api(format!("Device not found: {}", device.id)));
    }
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Active device: {}", device.name)));
    Ok(result.with_affected_devices(vec![device]))
}

/// Build a relay SMS for a device and log it.
pub async fn send<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: Option<&str>,
    command: RelayCommand,
) -> Result<CmdResult> {
    let device = resolve_device(store, selector)?;
    let body = command.encode(&device.password)?;
    store.log_command(&device.id, &body, true).await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "{} for {}",
        command.action(),
        device.name
    )));
    Ok(result.with_sms(device.unit_number, body))
}

/// Change the relay's access mode and latch time, and emit the SMS for each
/// setting that changed.
pub async fn configure_relay<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: Option<&str>,
    access_control: Option<AccessControl>,
    latch_time: Option<String>,
) -> Result<CmdResult> {
    if let Some(latch) = &latch_time {
        validate_latch_time(latch)?;
    }
    let device = resolve_device(store, selector)?;
    let current = device.relay_settings.clone().unwrap_or(RelaySettings {
        access_control: AccessControl::AuthorizedOnly,
        latch_time: "000".to_string(),
    });
    let settings = RelaySettings {
        access_control: access_control.unwrap_or(current.access_control),
        latch_time: latch_time.clone().unwrap_or(current.latch_time),
    };

    let update = DeviceUpdate {
        relay_settings: Some(settings),
        ..Default::default()
    };
    let updated = store
        .update_device(&device.id, update)
        .await?
        .ok_or_else(|| GateError::Api(format!("Device not found: {}", device.id)))?;

    // One SMS per setting; the relay accepts a single operation per message.
    let mut commands = Vec::new();
    if let Some(mode) = access_control {
        commands.push(RelayCommand::AccessControl(mode));
    }
    if let Some(latch) = latch_time {
        commands.push(RelayCommand::LatchTime(latch));
    }

    let mut result = CmdResult::default();
    if commands.is_empty() {
        result.add_message(CmdMessage::info("Nothing to change"));
    }
    for command in commands {
        let body = command.encode(&updated.password)?;
        store.log_command(&updated.id, &body, true).await;
        result.add_message(CmdMessage::success(format!("{} set", command.action())));
        result = result.with_sms(updated.unit_number.clone(), body);
    }
    Ok(result.with_affected_devices(vec![updated]))
}
