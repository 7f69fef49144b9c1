use anyhow::Context;
use serde_json::json;

use crate::{server_config::cfg, HttpClient};

/// Embed a single text through the embeddings API. Dimensionality is fixed
/// per collection and configured alongside the model.
pub async fn embed_text(http_client: &HttpClient, text: &str) -> anyhow::Result<Vec<f32>> {
    let resp = http_client
        .post(&cfg.embedding.endpoint)
        .bearer_auth(&cfg.api.key)
        .json(&json!(
          {
            "model": &cfg.embedding.model,
            "input": text,
          }
        ))
        .send()
        .await?
        .error_for_status()?
        .json::<serde_json::Value>()
        .await?;

    let data = resp["data"].as_array().context("No data array")?;
    let first = data.first().context("No first element")?;
    let embedding: Vec<f32> = serde_json::from_value(first["embedding"].clone())
        .context("Failed to parse embedding as Vec<f32>")?;

    if embedding.len() != cfg.embedding.dimension {
        anyhow::bail!(
            "Embedding dimension mismatch: expected {}, got {}",
            cfg.embedding.dimension,
            embedding.len()
        );
    }

    Ok(embedding)
}
