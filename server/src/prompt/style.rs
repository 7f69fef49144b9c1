//! Style-matched reply drafting: the owner's strongest reference passages
//! become style examples, the thread transcript carries the conversation.

use indoc::formatdoc;

use crate::{
    email::thread::EmailThread,
    error::{AppError, AppResult},
    index::{ranking, store::MetadataFilter, VectorStore},
    prompt::{complete, context::thread_transcript, ChatMessage},
    server_config::cfg,
    HttpClient,
};

const DRAFT_INSTRUCTION: &str =
    "Write the next reply in this thread as the mailbox owner. Match the owner's writing style. Respond with the reply body only.";

/// The owner's top style references: full scan of non-forwarded passages,
/// ranked with the style weights, texts only.
pub async fn get_style_references(store: &VectorStore) -> AppResult<Vec<String>> {
    let metadata_filter = MetadataFilter::new().must_match("is_forwarded", false);
    let passages = store.scan(Some(&metadata_filter)).await?;

    let ranked = ranking::rank(
        passages,
        Some(cfg.style.top_k),
        cfg.style.weight_recency,
        cfg.style.weight_length,
    );

    let references: Vec<String> = ranked
        .into_iter()
        .map(|r| r.passage.text)
        .filter(|text| !text.trim().is_empty())
        .collect();

    if references.is_empty() {
        return Err(AppError::EmptyContext(
            "No style references available for this owner".to_string(),
        ));
    }

    Ok(references)
}

fn style_system_prompt(references: &[String]) -> String {
    let examples = references
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Example {}:\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n");

    formatdoc! {r#"
        You are a professional email assistant drafting replies on behalf of
        the mailbox owner. The owner's writing style is shown in the examples
        below; mirror their tone, greetings, sign-offs, and sentence length.

        {examples}"#,
        examples = examples
    }
}

/// Draft a reply to `thread` in the owner's voice. The whole thread is
/// included in original order; no ranking is applied to the transcript.
pub async fn draft_reply(
    http_client: &HttpClient,
    store: &VectorStore,
    thread: &EmailThread,
    owner_address: &str,
) -> AppResult<String> {
    let references = get_style_references(store).await?;

    let mut messages = vec![ChatMessage::system(style_system_prompt(&references))];
    // The transcript's own preamble is replaced by the style-aware one.
    messages.extend(thread_transcript(thread, owner_address).into_iter().skip(1));
    messages.push(ChatMessage::user(DRAFT_INSTRUCTION));

    complete(http_client, &messages).await
}
