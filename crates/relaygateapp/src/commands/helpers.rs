use crate::error::{GateError, Result};
use crate::model::{Device, User};
use crate::store::{AppStore, KeyValueStore};

/// Resolve what the user typed into a device.
///
/// Tries, in order: exact id, case-insensitive name, unique id prefix.
/// `None` means the active device.
pub fn resolve_device<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    selector: Option<&str>,
) -> Result<Device> {
    let Some(selector) = selector.map(str::trim).filter(|s| !s.is_empty()) else {
        return store
            .get_active_device()
            .ok_or_else(|| GateError::Api("No active device. Pass a device or activate one".into()));
    };

    let devices = store.get_devices();
    pick(
        "device",
        selector,
        &devices,
        |d| d.id.as_str(),
        |d, term| d.name.eq_ignore_ascii_case(term),
    )
}

/// Resolve what the user typed into a user.
///
/// Tries, in order: exact id, exact phone number or case-insensitive name,
/// unique id prefix.
pub fn resolve_user<B: KeyValueStore + 'static>(store: &AppStore<B>, selector: &str) -> Result<User> {
    let users = store.get_users();
    pick(
        "user",
        selector.trim(),
        &users,
        |u| u.id.as_str(),
        |u, term| u.phone_number == term || u.name.eq_ignore_ascii_case(term),
    )
}

fn pick<T: Clone>(
    kind: &str,
    term: &str,
    items: &[T],
    id: impl Fn(&T) -> &str,
    matches: impl Fn(&T, &str) -> bool,
) -> Result<T> {
    if let Some(item) = items.iter().find(|&i| id(i) == term) {
        return Ok(item.clone());
    }

    let by_label: Vec<&T> = items.iter().filter(|&i| matches(i, term)).collect();
    let candidates = if by_label.is_empty() {
        items.iter().filter(|&i| id(i).starts_with(term)).collect()
    } else {
        by_label
    };

    match candidates.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(GateError::Api(format!("No {} matches '{}'", kind, term))),
        many => Err(GateError::Api(format!(
            "'{}' matches {} {}s; use the id",
            term,
            many.len(),
            kind
        ))),
    }
}
