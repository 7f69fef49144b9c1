/// Token cost of a text, degrading to a character-based estimate when the
/// tokenizer definition is unavailable or encoding fails. The degradation is
/// logged, never raised.
pub fn token_cost(text: &str) -> usize {
    match tokenizer::token_count(text) {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(
                "Token count failed ({}), falling back to {} chars per token",
                e,
                tokenizer::FALLBACK_CHARS_PER_TOKEN
            );
            tokenizer::estimate_token_count(text)
        }
    }
}
