use super::backend::KeyValueStore;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const FILE_PREFIX: &str = "kv-";
const HASHED_PREFIX: &str = "kvh-";
const FILE_EXT: &str = ".val";
/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME: usize = 255;

/// Directory-backed key-value store: one file per key.
///
/// Keys are percent-encoded into file names (`@gsm_app_data` →
/// `kv-%40gsm_app_data.val`) so any key survives the trip through the
/// filesystem and `list_keys` can decode it back.
///
/// Keys whose encoded name would be too long are stored as
/// `kvh-<uuid v5 of the key>.val`, with the encoded name on the first line of
/// the file ahead of the value.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(file_name(key))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(GateError::Io)
    }
}

/// Encode a storage key as a file name.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(FILE_PREFIX.len() + key.len() + FILE_EXT.len());
    out.push_str(FILE_PREFIX);
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out.push_str(FILE_EXT);
    out
}

/// The file a key lives in: its encoded name, or a hashed one when that is too long.
fn file_name(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_FILE_NAME {
        return encoded;
    }
    let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
    format!("{}{}{}", HASHED_PREFIX, hash.simple(), FILE_EXT)
}

fn is_hashed(file_name: &str) -> bool {
    file_name.starts_with(HASHED_PREFIX) && file_name.ends_with(FILE_EXT)
}

/// Decode a file name produced by [`encode_key`]. Returns None for foreign files.
pub fn decode_key(file_name: &str) -> Option<String> {
    let encoded = file_name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXT)?;
    let mut bytes = Vec::with_capacity(encoded.len());
    let raw = encoded.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl KeyValueStore for FsBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let name = file_name(key);
        let content = match fs::read_to_string(self.root.join(&name)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GateError::Io(e)),
        };
        if !is_hashed(&name) {
            return Ok(Some(content));
        }
        match content.split_once('\n') {
            Some((header, value)) if header == encode_key(key) => Ok(Some(value.to_string())),
            _ => Err(GateError::Storage(format!(
                "hashed file for key {} holds another key",
                key
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir().await?;
        let target = self.key_path(key);

        let content = if is_hashed(&file_name(key)) {
            format!("{}\n{}", encode_key(key), value)
        } else {
            value.to_string()
        };

        // Atomic Write
        let tmp = self.root.join(format!(".kv-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content).await.map_err(GateError::Io)?;
        fs::rename(&tmp, target).await.map_err(GateError::Io)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GateError::Io(e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        if fs::metadata(&self.root).await.is_err() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(GateError::Io)?;
        while let Some(entry) = entries.next_entry().await.map_err(GateError::Io)? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_hashed(&name) {
                let content = fs::read_to_string(entry.path()).await.map_err(GateError::Io)?;
                let header = content.split_once('\n').map_or(content.as_str(), |(h, _)| h);
                if let Some(key) = decode_key(header) {
                    keys.push(key);
                }
            } else if let Some(key) = decode_key(&name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_round_trip() {
        for key in ["@gsm_app_data", "@device_logs_1700000000000", "plain", "a/b c"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'));
            assert!(!encoded.contains('@'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_long_keys_get_short_file_names() {
        let key = format!("@device_logs_{}", "x".repeat(300));
        let name = file_name(&key);
        assert!(name.len() <= MAX_FILE_NAME);
        assert!(is_hashed(&name));
        assert_eq!(name, file_name(&key));
        assert_eq!(file_name("@gsm_app_data"), encode_key("@gsm_app_data"));
    }

    #[test]
    fn test_decode_rejects_foreign_files() {
        assert_eq!(decode_key("notes.txt"), None);
        assert_eq!(decode_key(".kv-1234.tmp"), None);
        assert_eq!(decode_key("kv-%4.val"), None);
    }
}
