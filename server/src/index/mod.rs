pub mod ranking;
pub mod store;

use serde::{Deserialize, Serialize};

pub use ranking::RankedPassage;
pub use store::VectorStore;

/// Metadata stored next to each indexed vector. Always carries at least the
/// thread identifier and date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassagePayload {
    pub thread_id: String,
    pub message_id: String,
    pub date: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub is_forwarded: bool,
}

/// A passage returned by the index, from either retrieval path.
///
/// `similarity` is present only when the passage came back from a
/// similarity query; full scans carry no base score.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub text: String,
    pub similarity: Option<f32>,
    pub payload: PassagePayload,
}
