//! Vector index gateway: one Qdrant collection per mailbox owner, accessed
//! over REST.
//!
//! Each handshake run fully owns and replaces the owner's passages. The
//! replacement is transactional: a fresh generation collection is created
//! and indexed, the owner alias is swapped onto it atomically, and stale
//! generations are dropped afterwards. Readers never observe a window where
//! the alias is absent. Callers must still not run concurrent handshakes
//! for the same owner.

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    embed::embed_text,
    error::AppResult,
    index::{PassagePayload, RetrievedPassage},
    server_config::cfg,
    HttpClient,
};

/// Full scans page through the collection in batches of this size.
const SCROLL_PAGE_SIZE: usize = 100;

/// AND-combined exact-match conditions on payload fields.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, serde_json::Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must_match(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((key.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn to_qdrant(&self) -> serde_json::Value {
        let must: Vec<serde_json::Value> = self
            .conditions
            .iter()
            .map(|(key, value)| json!({"key": key, "match": {"value": value}}))
            .collect();
        json!({"must": must})
    }
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    http_client: HttpClient,
    /// Stable per-owner alias; queries always go through it. Physical
    /// generation collections live underneath and rotate on reseed.
    alias: String,
}

impl VectorStore {
    pub fn new(http_client: HttpClient, alias: impl Into<String>) -> Self {
        Self {
            http_client,
            alias: alias.into(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.alias
    }

    fn base_url(&self) -> &str {
        cfg.index.url.trim_end_matches('/')
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url(), collection, suffix)
    }

    /// Replace the owner's passages wholesale: create-new, index, swap,
    /// delete-old. The alias only ever points at a fully indexed
    /// generation.
    pub async fn reseed(&self, texts: &[String], payloads: &[PassagePayload]) -> AppResult<()> {
        let generation = generation_name(&self.alias);
        tracing::info!(
            "Reseeding {} into generation {}",
            self.alias,
            generation
        );

        self.create_collection(&generation).await?;
        self.index_into(&generation, texts, payloads).await?;

        let previous = self.current_generation().await?;
        self.swap_alias(&generation, previous.as_deref()).await?;
        self.drop_stale_generations(&generation).await?;

        Ok(())
    }

    async fn create_collection(&self, collection: &str) -> AppResult<()> {
        self.http_client
            .put(self.collection_url(collection, ""))
            .json(&json!({
                "vectors": {
                    "size": cfg.embedding.dimension,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?
            .error_for_status()
            .context(format!("Failed to create collection {}", collection))?;
        Ok(())
    }

    /// Embed and upsert one point per (text, payload) pair. Point ids are
    /// positional: the generation is fresh, there is nothing to collide
    /// with.
    async fn index_into(
        &self,
        collection: &str,
        texts: &[String],
        payloads: &[PassagePayload],
    ) -> AppResult<()> {
        tracing::info!("Indexing {} texts into {}", texts.len(), collection);

        let mut points = Vec::with_capacity(texts.len());
        for (i, (text, payload)) in texts.iter().zip(payloads).enumerate() {
            let embedding = embed_text(&self.http_client, text)
                .await
                .context(format!("Failed to embed text {}", i))?;

            let mut point_payload =
                serde_json::to_value(payload).context("Failed to serialize payload")?;
            point_payload["text"] = json!(text);

            points.push(json!({
                "id": i,
                "vector": embedding,
                "payload": point_payload,
            }));
        }

        if points.is_empty() {
            tracing::warn!("No points to index into {}", collection);
            return Ok(());
        }

        self.http_client
            .put(self.collection_url(collection, "/points?wait=true"))
            .json(&json!({"points": points}))
            .send()
            .await?
            .error_for_status()
            .context("Failed to upsert points")?;

        tracing::info!("Indexed {} points", texts.len());
        Ok(())
    }

    /// The physical collection the owner alias currently points at, if any.
    async fn current_generation(&self) -> AppResult<Option<String>> {
        let resp = self
            .http_client
            .get(format!("{}/aliases", self.base_url()))
            .send()
            .await?
            .error_for_status()?
            .json::<AliasListResponse>()
            .await?;

        Ok(resp
            .result
            .aliases
            .into_iter()
            .find(|a| a.alias_name == self.alias)
            .map(|a| a.collection_name))
    }

    /// Atomically re-point the owner alias at the new generation.
    async fn swap_alias(&self, generation: &str, previous: Option<&str>) -> AppResult<()> {
        let mut actions = Vec::new();
        if previous.is_some() {
            actions.push(json!({"delete_alias": {"alias_name": self.alias}}));
        }
        actions.push(json!({
            "create_alias": {
                "collection_name": generation,
                "alias_name": self.alias,
            }
        }));

        self.http_client
            .post(format!("{}/collections/aliases", self.base_url()))
            .json(&json!({"actions": actions}))
            .send()
            .await?
            .error_for_status()
            .context(format!("Failed to swap alias {}", self.alias))?;

        tracing::info!(
            "Alias {} now points at {} (was {:?})",
            self.alias,
            generation,
            previous
        );
        Ok(())
    }

    /// Drop every generation of this owner except `keep`. Also sweeps
    /// orphans left behind by runs that failed before the swap.
    async fn drop_stale_generations(&self, keep: &str) -> AppResult<()> {
        let resp = self
            .http_client
            .get(format!("{}/collections", self.base_url()))
            .send()
            .await?
            .error_for_status()?
            .json::<CollectionListResponse>()
            .await?;

        for collection in resp.result.collections {
            if collection.name != keep && is_generation_of(&collection.name, &self.alias) {
                let dropped = self
                    .http_client
                    .delete(self.collection_url(&collection.name, ""))
                    .send()
                    .await;
                match dropped.and_then(|r| r.error_for_status()) {
                    Ok(_) => tracing::info!("Dropped stale generation {}", collection.name),
                    Err(e) => {
                        tracing::warn!("Could not drop generation {}: {}", collection.name, e)
                    }
                }
            }
        }

        Ok(())
    }

    /// Nearest-neighbor query. Results carry the provider's similarity score.
    pub async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        metadata_filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievedPassage>> {
        let query_vector = embed_text(&self.http_client, query)
            .await
            .context("Failed to embed query")?;

        let mut body = json!({
            "vector": query_vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filter) = metadata_filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter.to_qdrant();
        }

        let resp = self
            .http_client
            .post(self.collection_url(&self.alias, "/points/search"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        resp.result
            .into_iter()
            .map(|point| parse_payload(point.payload, Some(point.score)))
            .collect()
    }

    /// Page through every point matching the filter. Results carry no
    /// similarity score; they are meant for whole-history ranking.
    pub async fn scan(
        &self,
        metadata_filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievedPassage>> {
        let mut all = Vec::new();
        let mut offset: Option<serde_json::Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(filter) = metadata_filter.filter(|f| !f.is_empty()) {
                body["filter"] = filter.to_qdrant();
            }
            if let Some(cursor) = offset.take() {
                body["offset"] = cursor;
            }

            let resp = self
                .http_client
                .post(self.collection_url(&self.alias, "/points/scroll"))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<ScrollResponse>()
                .await?;

            for point in resp.result.points {
                all.push(parse_payload(point.payload, None)?);
            }

            match resp.result.next_page_offset {
                Some(cursor) if !cursor.is_null() => offset = Some(cursor),
                _ => break,
            }
        }

        tracing::info!("Scan of {} returned {} passages", self.alias, all.len());
        Ok(all)
    }
}

/// Physical name for a new generation of an owner's collection.
fn generation_name(alias: &str) -> String {
    format!("{}-gen-{}", alias, Utc::now().timestamp_millis())
}

fn is_generation_of(collection: &str, alias: &str) -> bool {
    collection
        .strip_prefix(alias)
        .and_then(|rest| rest.strip_prefix("-gen-"))
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    next_page_offset: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollPoint {
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AliasListResponse {
    result: AliasList,
}

#[derive(Debug, Deserialize)]
struct AliasList {
    aliases: Vec<AliasDescription>,
}

#[derive(Debug, Deserialize)]
struct AliasDescription {
    alias_name: String,
    collection_name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionListResponse {
    result: CollectionList,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

/// Split a stored point payload back into text + typed metadata.
fn parse_payload(
    mut payload: serde_json::Value,
    similarity: Option<f32>,
) -> AppResult<RetrievedPassage> {
    let text = payload
        .as_object_mut()
        .and_then(|map| map.remove("text"))
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();

    let meta: PassagePayload =
        serde_json::from_value(payload).context("Failed to parse point payload")?;

    Ok(RetrievedPassage {
        text,
        similarity,
        payload: meta,
    })
}
