//! User-profile inference over the owner's full recent history.

use indoc::formatdoc;

use crate::{
    error::AppResult,
    index::{ranking, store::MetadataFilter, VectorStore},
    prompt::{complete, context::numbered_context, ChatMessage},
    server_config::cfg,
    HttpClient,
};

const PROFILE_SYSTEM_PROMPT: &str =
    "You are an expert at extracting user information from emails.";

fn profile_user_prompt(emails: &str) -> String {
    formatdoc! {r#"
        Analyze the emails below, all written by the same person, and produce
        a profile of the author.

        Cover:
        - name and how they sign off
        - role and organization, if they can be inferred
        - recurring topics and responsibilities
        - frequent correspondents and relationships
        - tone, formality, and writing habits

        Only state what the emails support. Respond with a JSON object with
        the keys name, sign_off, role, topics, correspondents, and style.

        Emails:

        {emails}"#,
        emails = emails
    }
}

/// Build a user profile from the owner's indexed passages: full scan of
/// non-forwarded passages, ranked, assembled under the context budget, then
/// one chat completion.
pub async fn create_user_profile(
    http_client: &HttpClient,
    store: &VectorStore,
) -> AppResult<String> {
    let metadata_filter = MetadataFilter::new().must_match("is_forwarded", false);
    let passages = store.scan(Some(&metadata_filter)).await?;
    tracing::info!(
        "Building profile for {} from {} passages",
        store.collection_name(),
        passages.len()
    );

    let ranked = ranking::rank(
        passages,
        Some(cfg.profile.top_k),
        cfg.profile.weight_recency,
        cfg.profile.weight_length,
    );

    let emails = numbered_context(&ranked, cfg.context.max_tokens)?;

    let messages = [
        ChatMessage::system(PROFILE_SYSTEM_PROMPT),
        ChatMessage::user(profile_user_prompt(&emails)),
    ];

    complete(http_client, &messages).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_prompt_embeds_emails() {
        let prompt = profile_user_prompt("Email 1:\nhello\n");
        assert!(prompt.contains("Email 1:\nhello"));
        assert!(prompt.ends_with("hello\n"));
        assert!(prompt.contains("sign_off"));
    }
}
