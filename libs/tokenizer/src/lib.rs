use std::sync::OnceLock;

pub use kitoken::{Kitoken, TokenId};

/// Rough estimation ratio used when the real tokenizer is unavailable:
/// one token per four characters.
pub const FALLBACK_CHARS_PER_TOKEN: usize = 4;

static TOKENIZER: OnceLock<Result<Kitoken, String>> = OnceLock::new();

fn get_tokenizer() -> Result<&'static Kitoken, TokenizeError> {
    TOKENIZER
        .get_or_init(|| {
            let tokenizer_path = std::env::var("TOKENIZER_PATH")
                .unwrap_or_else(|_| concat!(env!("CARGO_MANIFEST_DIR"), "/cl100k.json").to_string());
            Kitoken::from_file(&tokenizer_path).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| TokenizeError(e.clone()))
}

#[derive(Debug, Clone)]
pub struct TokenizeError(String);

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tokenizer unavailable or failed to encode: {}", self.0)
    }
}

impl std::error::Error for TokenizeError {}

pub fn encode(text: &str) -> Result<Vec<TokenId>, TokenizeError> {
    let tokenizer = get_tokenizer()?;
    tokenizer
        .encode(text, true)
        .map_err(|e| TokenizeError(e.to_string()))
}

pub fn token_count(text: &str) -> Result<usize, TokenizeError> {
    encode(text).map(|tokens| tokens.len())
}

/// Character-based estimate for when the tokenizer definition file is
/// missing or encoding fails. Callers are expected to log the degradation.
pub fn estimate_token_count(text: &str) -> usize {
    text.len() / FALLBACK_CHARS_PER_TOKEN
}
