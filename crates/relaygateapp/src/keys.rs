//! Storage key names.
//!
//! Everything the app persists goes through the key-value adapter under one of
//! these keys. Only [`APP_DATA_KEY`] is written by current releases; the rest
//! are read during legacy migration and may still show up inside old backups.

/// Canonical key holding the serialized [`crate::model::AppData`].
pub const APP_DATA_KEY: &str = "@gsm_app_data";

pub const LEGACY_UNIT_NUMBER_KEY: &str = "@unit_number";
pub const LEGACY_PASSWORD_KEY: &str = "@device_password";
pub const LEGACY_ADMIN_NUMBER_KEY: &str = "@admin_number";
pub const LEGACY_AUTHORIZED_USERS_KEY: &str = "@authorized_users";
pub const LEGACY_LOGS_KEY: &str = "@app_logs";
pub const LEGACY_COMPLETED_STEPS_KEY: &str = "@completed_steps";

/// System-wide log list kept by the logging collaborator.
pub const SYSTEM_LOGS_KEY: &str = "@system_logs";

/// Synthetic key that receives a bare-array backup (the oldest export format).
pub const LEGACY_ARRAY_BACKUP_KEY: &str = "@legacy_backup_data";

const DEVICE_LOGS_PREFIX: &str = "@device_logs_";

/// Per-device log key used by the logging collaborator.
pub fn device_logs_key(device_id: &str) -> String {
    format!("{}{}", DEVICE_LOGS_PREFIX, device_id)
}

/// Device id encoded in a per-device log key, if `key` is one.
pub fn device_id_from_logs_key(key: &str) -> Option<&str> {
    key.strip_prefix(DEVICE_LOGS_PREFIX).filter(|id| !id.is_empty())
}

/// Whether a top-level storage key holds log history.
pub fn is_log_key(key: &str) -> bool {
    key.contains("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_logs_key_round_trip() {
        let key = device_logs_key("abc");
        assert_eq!(key, "@device_logs_abc");
        assert_eq!(device_id_from_logs_key(&key), Some("abc"));
        assert_eq!(device_id_from_logs_key("@device_logs_"), None);
    }

    #[test]
    fn test_is_log_key() {
        assert!(is_log_key(LEGACY_LOGS_KEY));
        assert!(is_log_key(SYSTEM_LOGS_KEY));
        assert!(is_log_key(&device_logs_key("d1")));
        assert!(!is_log_key(APP_DATA_KEY));
        assert!(!is_log_key(LEGACY_UNIT_NUMBER_KEY));
    }
}
