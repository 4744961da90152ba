//! Encrypted on-disk settings store.
//!
//! The whole key-value map is serialized as one JSON object and sealed with
//! AES-256-GCM. The file holds a small envelope:
//!
//! ```text
//! {"version": 1, "nonce": "<base64>", "ciphertext": "<base64>"}
//! ```
//!
//! A fresh nonce is drawn for every write. Writes go to a sibling temporary
//! file that is renamed over the target, so readers never see a torn file.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::prelude::*;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{KeychainAccess, KeychainError, Result, SettingsStore, StorageError};

/// Length in bytes of the store key.
pub const KEY_LEN: usize = 32;

const ENVELOPE_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    nonce: String,
    ciphertext: String,
}

/// Settings store sealed with AES-256-GCM.
///
/// The decrypted map is cached in memory after [`open`](Self::open); every
/// mutation re-seals and rewrites the file before it becomes visible.
pub struct EncryptedFileStore {
    path: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
    entries: Mutex<Map<String, Value>>,
}

impl fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Opens the store at `path` with an explicit key.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encryption`] if the file was sealed with a
    /// different key or has been tampered with.
    pub async fn open(path: impl AsRef<Path>, key: &[u8; KEY_LEN]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let key = LessSafeKey::new(
            UnboundKey::new(&AES_256_GCM, key)
                .map_err(|_| StorageError::Encryption("construct AES-256-GCM key".to_string()))?,
        );

        let entries = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let envelope: Envelope = serde_json::from_slice(&raw)?;
                let plaintext = unseal(&key, envelope)?;
                serde_json::from_slice(&plaintext)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened settings store");

        Ok(Self {
            path,
            key,
            rng: SystemRandom::new(),
            entries: Mutex::new(entries),
        })
    }

    /// Opens the store using the key held in the OS keychain, creating and
    /// saving a new random key on first use.
    pub async fn open_with_keychain(
        path: impl AsRef<Path>,
        keychain: &KeychainAccess,
    ) -> Result<Self> {
        let key = match keychain.retrieve(KeychainAccess::STORE_KEY_ENTRY).await? {
            Some(encoded) => decode_key(&encoded)?,
            None => {
                let key = generate_key()?;
                keychain
                    .store(KeychainAccess::STORE_KEY_ENTRY, &BASE64_STANDARD.encode(key))
                    .await?;
                tracing::info!(service = %keychain.service_name(), "Generated settings store key");
                key
            }
        };

        Self::open(path, &key).await
    }

    /// Returns the path of the sealed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, entries: &Map<String, Value>) -> Result<Vec<u8>> {
        let mut buffer = serde_json::to_vec(entries)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StorageError::Encryption("generate random nonce".to_string()))?;

        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut buffer,
            )
            .map_err(|_| StorageError::Encryption("seal settings".to_string()))?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            nonce: BASE64_STANDARD.encode(nonce_bytes),
            ciphertext: BASE64_STANDARD.encode(&buffer),
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    async fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        let sealed = self.seal(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &sealed))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        mutate(&mut next);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if !self.entries.lock().await.contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }
}

/// Generates a random store key.
pub(crate) fn generate_key() -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| StorageError::Encryption("generate store key".to_string()))?;
    Ok(key)
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN]> {
    let malformed = || KeychainError::Malformed(KeychainAccess::STORE_KEY_ENTRY.to_string());
    let bytes = BASE64_STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    Ok(bytes.try_into().map_err(|_| malformed())?)
}

fn unseal(key: &LessSafeKey, envelope: Envelope) -> Result<Vec<u8>> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(StorageError::Encryption(format!(
            "unsupported envelope version {}",
            envelope.version
        )));
    }

    let nonce_bytes: [u8; NONCE_LEN] = BASE64_STANDARD
        .decode(&envelope.nonce)
        .map_err(|e| StorageError::Encryption(format!("decode nonce: {}", e)))?
        .try_into()
        .map_err(|_| StorageError::Encryption("invalid nonce length".to_string()))?;
    let mut ciphertext = BASE64_STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|e| StorageError::Encryption(format!("decode ciphertext: {}", e)))?;

    let plaintext = key
        .open_in_place(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut ciphertext,
        )
        .map_err(|_| StorageError::Encryption("wrong key or corrupted settings".to_string()))?;

    Ok(plaintext.to_vec())
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
