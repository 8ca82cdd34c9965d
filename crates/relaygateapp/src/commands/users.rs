use super::helpers::{resolve_device, resolve_user};
use super::{CmdMessage, CmdResult};
use crate::error::{GateError, Result};
use crate::model::{LogCategory, NewUser, UserUpdate};
use crate::sms::{AccessWindow, RelayCommand};
use crate::store::{AppStore, KeyValueStore};

pub async fn add<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    fields: NewUser,
) -> Result<CmdResult> {
    let user = store.add_user(fields).await?;
    store
        .add_device_log(
            "",
            "User Added",
            format!("Added {} ({})", user.name, user.phone_number),
            true,
            LogCategory::User,
        )
        .await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("User added: {}", user.name)));
    Ok(result.with_listed_users(vec![user]))
}

/// Users on a device (with that device's serials), or every user.
pub fn list<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    device: Option<&str>,
) -> Result<CmdResult> {
    let users = match device {
        Some(selector) => {
            let device = resolve_device(store, Some(selector))?;
            store.get_device_users(&device.id)
        }
        None => store.get_users(),
    };
    let mut result = CmdResult::default().with_listed_users(users);
    if result.listed_users.is_empty() {
        result.add_message(CmdMessage::info("No users"));
    }
    Ok(result)
}

pub async fn update<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: &str,
    update: UserUpdate,
) -> Result<CmdResult> {
    let user = resolve_user(store, selector)?;
    let updated = store
        .update_user(&user.id, update)
        .await?
        .ok_or_else(|| GateError::Api(format!("User not found: {}", user.id)))?;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("User updated: {}", updated.name)));
    let authorized_on = store
        .get_devices()
        .iter()
        .filter(|d| d.is_authorized(&updated.id))
        .count();
    if authorized_on > 0 {
        result.add_message(CmdMessage::info(format!(
            "Re-authorize on {} device(s) to push the change to the relay",
            authorized_on
        )));
    }
    Ok(result.with_listed_users(vec![updated]))
}

/// Delete a user everywhere. The relay tables still hold the number until a
/// removal SMS is sent, so each affected device is reported.
pub async fn delete<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: &str,
) -> Result<CmdResult> {
    let user = resolve_user(store, selector)?;
    let devices: Vec<_> = store
        .get_devices()
        .into_iter()
        .filter(|d| d.is_authorized(&user.id))
        .collect();

    if !store.delete_user(&user.id).await {
        return Err(GateError::Api(format!("User not found: {}", user.id)));
    }
    store
        .add_device_log(
            "",
            "User Deleted",
            format!("Deleted {} ({})", user.name, user.phone_number),
            true,
            LogCategory::User,
        )
        .await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("User deleted: {}", user.name)));
    for device in &devices {
        result.add_message(CmdMessage::warning(format!(
            "{} still holds {} until you deauthorize on the relay",
            device.name, user.phone_number
        )));
    }
    Ok(result.with_affected_devices(devices))
}

/// Authorize a user on a device and build the add-user SMS.
///
/// The serial is, in order: the explicit one, the user's default if free on
/// this device, or the lowest free position.
pub async fn authorize<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    device: Option<&str>,
    user: &str,
    serial: Option<String>,
) -> Result<CmdResult> {
    let device = resolve_device(store, device)?;
    let user = resolve_user(store, user)?;
    if device.is_authorized(&user.id) {
        return Err(GateError::Api(format!(
            "{} is already authorized on {}",
            user.name, device.name
        )));
    }

    let taken: Vec<String> = store
        .get_device_users(&device.id)
        .into_iter()
        .map(|u| u.serial_number)
        .collect();
    let serial = match serial {
        Some(s) => s,
        None if !user.serial_number.is_empty() && !taken.contains(&user.serial_number) => {
            user.serial_number.clone()
        }
        None => store
            .next_free_serial(&device.id)
            .ok_or_else(|| GateError::Api(format!("{} has no free positions", device.name)))?,
    };
    if taken.contains(&serial) {
        return Err(GateError::Api(format!(
            "Position {} is already taken on {}",
            serial, device.name
        )));
    }

    let window = match (&user.start_time, &user.end_time) {
        (Some(start), Some(end)) => Some(AccessWindow {
            start: start.clone(),
            end: end.clone(),
        }),
        _ => None,
    };
    let command = RelayCommand::AddUser {
        serial: serial.clone(),
        phone: user.phone_number.clone(),
        window,
    };
    let body = command.encode(&device.password)?;

    store
        .authorize_user_with_serial(&device.id, &user.id, Some(serial.clone()))
        .await?;
    store.log_command(&device.id, &body, true).await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "{} authorized on {} at position {}",
        user.name, device.name, serial
    )));
    Ok(result.with_sms(device.unit_number, body))
}

/// Remove a user from a device and build the removal SMS.
pub async fn deauthorize<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    device: Option<&str>,
    user: &str,
) -> Result<CmdResult> {
    let device = resolve_device(store, device)?;
    let user = resolve_user(store, user)?;
    let serial = store
        .get_device_users(&device.id)
        .into_iter()
        .find(|u| u.id == user.id)
        .map(|u| u.serial_number)
        .ok_or_else(|| {
            GateError::Api(format!("{} is not authorized on {}", user.name, device.name))
        })?;

    store.deauthorize_user_for_device(&device.id, &user.id).await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "{} removed from {}",
        user.name, device.name
    )));

    // Without a position the relay can't be told; the local change stands.
    match (RelayCommand::RemoveUser { serial }).encode(&device.password) {
        Ok(body) => {
            store.log_command(&device.id, &body, true).await;
            Ok(result.with_sms(device.unit_number, body))
        }
        Err(e) => {
            result.add_message(CmdMessage::warning(format!(
                "No removal SMS built: {}",
                e
            )));
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::devices;
    use crate::model::NewDevice;
    use crate::store::mem_backend::MemBackend;

    async fn setup() -> AppStore<MemBackend> {
        let store = AppStore::new(MemBackend::new());
        devices::add(&store, NewDevice::new("Gate", "0400000000").with_password("1234"))
            .await
            .unwrap();
        add(&store, NewUser::new("Ann", "0411222333", "005"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn authorize_uses_default_serial_and_builds_sms() {
        let store = setup().await;
        let result = authorize(&store, None, "ann", None).await.unwrap();
        assert_eq!(result.sms[0].body, "1234A005#0411222333#");

        let device = store.get_active_device().unwrap();
        let users = store.get_device_users(&device.id);
        assert_eq!(users[0].serial_number, "005");
    }

    #[tokio::test]
    async fn authorize_falls_back_to_next_free_serial() {
        let store = setup().await;
        add(&store, NewUser::new("Bob", "0422333444", "005"))
            .await
            .unwrap();
        authorize(&store, None, "ann", None).await.unwrap();
        let result = authorize(&store, None, "bob", None).await.unwrap();
        assert_eq!(result.sms[0].body, "1234A001#0422333444#");
    }

    #[tokio::test]
    async fn authorize_rejects_taken_explicit_serial() {
        let store = setup().await;
        add(&store, NewUser::new("Bob", "0422333444", ""))
            .await
            .unwrap();
        authorize(&store, None, "ann", None).await.unwrap();
        let err = authorize(&store, None, "bob", Some("005".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already taken"));
    }

    #[tokio::test]
    async fn authorize_twice_is_an_error() {
        let store = setup().await;
        authorize(&store, None, "ann", None).await.unwrap();
        assert!(authorize(&store, None, "ann", None).await.is_err());
    }

    #[tokio::test]
    async fn authorize_includes_access_window() {
        let store = AppStore::new(MemBackend::new());
        devices::add(&store, NewDevice::new("Gate", "0400000000").with_password("1234"))
            .await
            .unwrap();
        let mut fields = NewUser::new("Ann", "0411222333", "002");
        fields.start_time = Some("2405010000".into());
        fields.end_time = Some("2412312359".into());
        add(&store, fields).await.unwrap();

        let result = authorize(&store, None, "ann", None).await.unwrap();
        assert_eq!(
            result.sms[0].body,
            "1234A002#0411222333#2405010000#2412312359#"
        );
    }

    #[tokio::test]
    async fn deauthorize_builds_removal_sms() {
        let store = setup().await;
        authorize(&store, None, "ann", None).await.unwrap();
        let result = deauthorize(&store, None, "ann").await.unwrap();
        assert_eq!(result.sms[0].body, "1234A005##");
        let device = store.get_active_device().unwrap();
        assert!(store.get_device_users(&device.id).is_empty());
    }

    #[tokio::test]
    async fn deauthorize_unauthorized_user_fails() {
        let store = setup().await;
        assert!(deauthorize(&store, None, "ann").await.is_err());
    }

    #[tokio::test]
    async fn delete_warns_about_devices_still_holding_the_number() {
        let store = setup().await;
        authorize(&store, None, "ann", None).await.unwrap();
        let result = delete(&store, "ann").await.unwrap();
        assert_eq!(result.affected_devices.len(), 1);
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("still holds 0411222333")));
        assert!(store.get_users().is_empty());
    }

    #[tokio::test]
    async fn list_for_device_shows_only_authorized() {
        let store = setup().await;
        add(&store, NewUser::new("Bob", "0422333444", "006"))
            .await
            .unwrap();
        authorize(&store, None, "bob", None).await.unwrap();

        let result = list(&store, Some("gate")).unwrap();
        assert_eq!(result.listed_users.len(), 1);
        assert_eq!(result.listed_users[0].name, "Bob");
        assert_eq!(list(&store, None).unwrap().listed_users.len(), 2);
    }
}
