//! Per-owner persistence of handshake artifacts: raw thread snapshots,
//! reference bundles, assembled transcripts, the inferred profile, and the
//! encrypted mailbox token.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde_json::json;

use crate::{
    email::{extractor::ReferenceBundle, thread::EmailThread},
    error::{AppError, AppResult},
    prompt::ChatMessage,
};

/// Percent-encode an owner address for use as a directory or collection
/// name (`owner@gmail.com` -> `owner%40gmail.com`).
pub fn safe_owner(owner_address: &str) -> String {
    url::form_urlencoded::byte_serialize(owner_address.as_bytes()).collect()
}

pub struct OwnerStorage {
    owner_dir: PathBuf,
}

impl OwnerStorage {
    /// Open (creating if needed) the artifact directory for one owner.
    pub fn open(data_dir: &Path, owner_address: &str) -> AppResult<Self> {
        let owner_dir = data_dir.join(safe_owner(owner_address));
        for dir in [
            owner_dir.clone(),
            owner_dir.join("references"),
            owner_dir.join("messages"),
        ] {
            fs::create_dir_all(&dir)
                .context(format!("Failed to create directory {}", dir.display()))?;
        }

        Ok(Self { owner_dir })
    }

    pub fn save_threads(&self, threads: &[EmailThread]) -> AppResult<()> {
        let path = self.owner_dir.join("threads.json");
        let json = serde_json::to_string_pretty(threads).context("Failed to serialize threads")?;
        fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved {} threads to {}", threads.len(), path.display());
        Ok(())
    }

    pub fn load_threads(&self) -> AppResult<Vec<EmailThread>> {
        let path = self.owner_dir.join("threads.json");
        if !path.exists() {
            return Err(AppError::NotFound(
                "No thread snapshot for this owner; run the handshake first".to_string(),
            ));
        }
        let json =
            fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&json).context("Failed to parse threads.json")?)
    }

    pub fn save_bundles(&self, bundles: &[ReferenceBundle]) -> AppResult<()> {
        for bundle in bundles {
            let path = self
                .owner_dir
                .join("references")
                .join(format!("{}.json", bundle.thread_id));
            let json =
                serde_json::to_string_pretty(bundle).context("Failed to serialize bundle")?;
            fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
        }
        tracing::info!("Saved {} reference bundles", bundles.len());
        Ok(())
    }

    pub fn save_transcript(&self, thread_id: &str, messages: &[ChatMessage]) -> AppResult<()> {
        let path = self
            .owner_dir
            .join("messages")
            .join(format!("{}.json", thread_id));
        let json = serde_json::to_string_pretty(&json!({
            "thread_id": thread_id,
            "messages": messages,
        }))
        .context("Failed to serialize transcript")?;
        fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn save_profile(&self, profile: &str) -> AppResult<()> {
        let path = self.owner_dir.join("profile.json");
        let json = serde_json::to_string_pretty(&json!({"profile": profile}))
            .context("Failed to serialize profile")?;
        fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved profile to {}", path.display());
        Ok(())
    }

    /// Encrypt and persist a mailbox token.
    pub fn store_token(&self, token: &str, key: &str) -> AppResult<()> {
        let encrypted = lib_utils::crypt::encrypt(token, key)?;
        let path = self.owner_dir.join("token.json");
        fs::write(&path, serde_json::to_string(&json!({"token": encrypted}))?.as_bytes())
            .context(format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load and decrypt the stored mailbox token. Absent credentials are a
    /// not-found condition, not an internal failure.
    pub fn load_token(&self, key: &str) -> AppResult<String> {
        let path = self.owner_dir.join("token.json");
        if !path.exists() {
            return Err(AppError::NotFound(
                "No stored token for this owner".to_string(),
            ));
        }
        let json =
            fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&json).context("Failed to parse token.json")?;
        let encrypted = value["token"]
            .as_str()
            .context("token.json missing token field")?;
        Ok(lib_utils::crypt::decrypt(encrypted, key)?)
    }

    pub fn remove_token(&self) -> AppResult<()> {
        let path = self.owner_dir.join("token.json");
        if path.exists() {
            fs::remove_file(&path).context(format!("Failed to remove {}", path.display()))?;
            tracing::info!("Token removed at {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::extractor::ReferencePassage;

    fn temp_data_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mailsona-storage-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_safe_owner_encoding() {
        assert_eq!(safe_owner("owner@gmail.com"), "owner%40gmail.com");
        assert_eq!(safe_owner("a b@gmail.com"), "a+b%40gmail.com");
    }

    #[test]
    fn test_threads_round_trip() {
        let dir = temp_data_dir("threads");
        let storage = OwnerStorage::open(&dir, "owner@gmail.com").unwrap();

        let threads = vec![EmailThread {
            thread_id: "t1".to_string(),
            message_count: 0,
            messages: vec![],
        }];
        storage.save_threads(&threads).unwrap();

        let loaded = storage.load_threads().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].thread_id, "t1");
    }

    #[test]
    fn test_load_threads_missing_is_not_found() {
        let dir = temp_data_dir("nothreads");
        let storage = OwnerStorage::open(&dir, "owner@gmail.com").unwrap();
        assert!(matches!(
            storage.load_threads(),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_bundles_written_per_thread() {
        let dir = temp_data_dir("bundles");
        let storage = OwnerStorage::open(&dir, "owner@gmail.com").unwrap();

        let bundles = vec![ReferenceBundle {
            thread_id: "t42".to_string(),
            passages: vec![ReferencePassage {
                position: 1,
                content: "body".to_string(),
                cost: 1,
                message_id: "m1".to_string(),
                date: String::new(),
                from: String::new(),
                to: String::new(),
                subject: String::new(),
                label_ids: vec![],
                is_forwarded: false,
            }],
        }];
        storage.save_bundles(&bundles).unwrap();

        let path = dir
            .join("owner%40gmail.com")
            .join("references")
            .join("t42.json");
        assert!(path.exists());
    }

    #[test]
    fn test_token_round_trip_and_removal() {
        let dir = temp_data_dir("token");
        let storage = OwnerStorage::open(&dir, "owner@gmail.com").unwrap();

        assert!(matches!(
            storage.load_token("key"),
            Err(AppError::NotFound(_))
        ));

        storage.store_token("ya29.secret", "key").unwrap();
        assert_eq!(storage.load_token("key").unwrap(), "ya29.secret");

        // Stored form is encrypted, not the raw token.
        let raw = fs::read_to_string(
            dir.join("owner%40gmail.com").join("token.json"),
        )
        .unwrap();
        assert!(!raw.contains("ya29.secret"));

        storage.remove_token().unwrap();
        assert!(matches!(
            storage.load_token("key"),
            Err(AppError::NotFound(_))
        ));
        // Removing twice is fine.
        storage.remove_token().unwrap();
    }
}
