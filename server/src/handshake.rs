//! The initial handshake: fetch the owner's sent threads, extract reference
//! passages, reseed the owner's index collection, and infer the user
//! profile.
//!
//! Stages run strictly in sequence; the first failure is terminal for the
//! run. Partial progress (e.g. a half-indexed collection) is acceptable
//! because the next run recreates the collection from scratch.

use std::path::Path;

use crate::{
    email::{client::EmailClient, extractor::PassageExtractor},
    error::AppResult,
    index::{PassagePayload, VectorStore},
    prompt::{context::thread_transcript, profile::create_user_profile},
    server_config::cfg,
    storage::{safe_owner, OwnerStorage},
    HttpClient,
};

pub struct InitialHandshake {
    http_client: HttpClient,
    owner_address: String,
}

impl InitialHandshake {
    pub fn new(http_client: HttpClient, owner_address: impl Into<String>) -> Self {
        let owner_address = owner_address.into();
        tracing::info!("Starting handshake process for {}", owner_address);
        Self {
            http_client,
            owner_address,
        }
    }

    /// Run the full pipeline and return the inferred profile.
    ///
    /// Callers must not run concurrent handshakes for the same owner: the
    /// run destructively recreates the owner's collection.
    pub async fn run(&self) -> AppResult<String> {
        let storage = OwnerStorage::open(Path::new(&cfg.settings.data_dir), &self.owner_address)?;
        let token = storage.load_token(&cfg.token_key)?;

        // Fetch and snapshot raw threads.
        let client = EmailClient::new(
            self.http_client.clone(),
            &self.owner_address,
            token,
        );
        let threads = client.list_threads(cfg.settings.max_threads).await?;
        storage.save_threads(&threads)?;

        // Extract and persist reference bundles.
        let extractor = PassageExtractor::new(&self.owner_address);
        let bundles = extractor.extract(&threads)?;
        storage.save_bundles(&bundles)?;

        // Persist role-tagged transcripts for the reply-drafting path.
        for thread in &threads {
            if thread.messages.is_empty() {
                tracing::warn!("Skipping empty thread: {}", thread.thread_id);
                continue;
            }
            let transcript = thread_transcript(thread, &self.owner_address);
            storage.save_transcript(&thread.thread_id, &transcript)?;
        }

        // Reseed the owner's collection from scratch (create-new, swap,
        // delete-old; the alias never dangles).
        let store = VectorStore::new(self.http_client.clone(), safe_owner(&self.owner_address));

        let mut texts = Vec::new();
        let mut payloads = Vec::new();
        for bundle in &bundles {
            for passage in &bundle.passages {
                texts.push(passage.content.clone());
                payloads.push(PassagePayload {
                    thread_id: bundle.thread_id.clone(),
                    message_id: passage.message_id.clone(),
                    date: passage.date.clone(),
                    from: passage.from.clone(),
                    to: passage.to.clone(),
                    subject: passage.subject.clone(),
                    label_ids: passage.label_ids.clone(),
                    is_forwarded: passage.is_forwarded,
                });
            }
        }
        store.reseed(&texts, &payloads).await?;

        // Infer and persist the profile over the freshly indexed history.
        let profile = create_user_profile(&self.http_client, &store).await?;
        storage.save_profile(&profile)?;

        tracing::info!("Handshake complete for {}", self.owner_address);
        Ok(profile)
    }
}
