//! Assembly of ranked passages and thread transcripts into prompt content.

use crate::{
    email::{
        normalize::{clean, split_sender},
        thread::EmailThread,
    },
    error::{AppError, AppResult},
    index::RankedPassage,
    prompt::ChatMessage,
    util::token_cost,
};

const SYSTEM_PREAMBLE: &str = "You are a professional email assistant.";

/// Render ranked passages as numbered "Email N:" blocks joined by blank
/// lines, bounded by `token_budget`.
///
/// Passages are taken in ranked order; the first usable passage is always
/// included, later ones only while the cumulative token count stays within
/// budget. Numbering follows the ranked position, so skipped entries leave
/// gaps rather than renumbering the rest.
pub fn numbered_context(passages: &[RankedPassage], token_budget: usize) -> AppResult<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut spent_tokens = 0usize;

    for (i, ranked) in passages.iter().enumerate() {
        let text = sanitize(&ranked.passage.text);
        if text.is_empty() {
            continue;
        }

        let block = format!("Email {}:\n{}\n", i + 1, text);
        let block_cost = token_cost(&block);

        if !blocks.is_empty() && spent_tokens + block_cost > token_budget {
            tracing::debug!(
                "Context budget reached after {} passages ({} tokens)",
                blocks.len(),
                spent_tokens
            );
            break;
        }

        spent_tokens += block_cost;
        blocks.push(block);
    }

    let joined = blocks.join("\n\n");
    if joined.trim().is_empty() {
        return Err(AppError::EmptyContext(
            "No valid email content found after sanitization".to_string(),
        ));
    }

    Ok(joined)
}

/// Strip null bytes and collapse all whitespace runs to single spaces.
fn sanitize(text: &str) -> String {
    text.replace('\0', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a full thread as role-tagged messages, in original order and
/// without ranking: a fixed system preamble, a synthetic subject line, then
/// one entry per email. Messages the owner sent speak as the assistant.
pub fn thread_transcript(thread: &EmailThread, owner_address: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PREAMBLE)];

    if let Some(first) = thread.messages.first() {
        messages.push(ChatMessage::user(format!("Subject: {}", first.subject)));
    }

    for (counter, email) in thread.messages.iter().enumerate() {
        let (_, sender_address) = split_sender(&email.from);
        let content = format!(
            "Email {}:\n\nFrom: {}\nTo: {}\nDate: {}\n\nBody: {}",
            counter + 1,
            email.from,
            email.to,
            email.date,
            clean(&email.body),
        );

        if sender_address == owner_address {
            messages.push(ChatMessage::assistant(content));
        } else {
            messages.push(ChatMessage::user(content));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::thread::EmailMessage;
    use crate::index::{PassagePayload, RetrievedPassage};

    fn ranked(text: &str) -> RankedPassage {
        RankedPassage {
            passage: RetrievedPassage {
                text: text.to_string(),
                similarity: None,
                payload: PassagePayload::default(),
            },
            rank_score: 0.0,
        }
    }

    fn message(from: &str, body: &str) -> EmailMessage {
        EmailMessage {
            message_id: "m".to_string(),
            subject: "Project plan".to_string(),
            from: from.to_string(),
            to: "to@example.com".to_string(),
            date: "Mon, 06 Jan 2025 10:00:00 +0000".to_string(),
            body: body.to_string(),
            label_ids: vec![],
            is_forwarded: false,
        }
    }

    const BUDGET: usize = 100_000;

    #[test]
    fn test_numbered_blocks_with_collapsed_whitespace() {
        let passages = vec![ranked("hello   world\n\nagain"), ranked("second one")];
        let context = numbered_context(&passages, BUDGET).unwrap();
        assert_eq!(
            context,
            "Email 1:\nhello world again\n\n\nEmail 2:\nsecond one\n"
        );
    }

    #[test]
    fn test_skips_empty_passages_keeping_numbering() {
        let passages = vec![ranked("first"), ranked("   \0  "), ranked("third")];
        let context = numbered_context(&passages, BUDGET).unwrap();
        assert!(context.contains("Email 1:\nfirst"));
        assert!(!context.contains("Email 2:"));
        assert!(context.contains("Email 3:\nthird"));
    }

    #[test]
    fn test_strips_null_bytes() {
        let passages = vec![ranked("he\0llo")];
        let context = numbered_context(&passages, BUDGET).unwrap();
        assert!(context.contains("hello"));
        assert!(!context.contains('\0'));
    }

    #[test]
    fn test_all_empty_passages_is_an_error() {
        let passages = vec![ranked(""), ranked("  \0 \n ")];
        assert!(matches!(
            numbered_context(&passages, BUDGET),
            Err(AppError::EmptyContext(_))
        ));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            numbered_context(&[], BUDGET),
            Err(AppError::EmptyContext(_))
        ));
    }

    #[test]
    fn test_budget_bounds_passage_count() {
        let long = "lorem ipsum dolor sit amet ".repeat(50);
        let passages = vec![ranked(&long), ranked(&long), ranked(&long)];

        // A budget of one token still takes the first passage.
        let context = numbered_context(&passages, 1).unwrap();
        assert!(context.contains("Email 1:"));
        assert!(!context.contains("Email 2:"));

        // A generous budget takes everything.
        let context = numbered_context(&passages, BUDGET).unwrap();
        assert!(context.contains("Email 3:"));
    }

    #[test]
    fn test_transcript_roles_and_ordering() {
        let owner = "owner@gmail.com";
        let thread = EmailThread {
            thread_id: "t1".to_string(),
            message_count: 2,
            messages: vec![
                message("Peer <peer@example.com>", "question?"),
                message("Owner <owner@gmail.com>", "answer."),
            ],
        };

        let transcript = thread_transcript(&thread, owner);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].role, "system");
        assert_eq!(transcript[0].content, SYSTEM_PREAMBLE);
        assert_eq!(transcript[1].role, "user");
        assert_eq!(transcript[1].content, "Subject: Project plan");
        assert_eq!(transcript[2].role, "user");
        assert!(transcript[2].content.contains("Email 1:"));
        assert_eq!(transcript[3].role, "assistant");
        assert!(transcript[3].content.contains("Body: answer."));
    }

    #[test]
    fn test_transcript_of_empty_thread_has_no_subject_line() {
        let thread = EmailThread {
            thread_id: "t1".to_string(),
            message_count: 0,
            messages: vec![],
        };
        let transcript = thread_transcript(&thread, "owner@gmail.com");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, "system");
    }

    #[test]
    fn test_transcript_bodies_are_cleaned() {
        let thread = EmailThread {
            thread_id: "t1".to_string(),
            message_count: 1,
            messages: vec![message(
                "Owner <owner@gmail.com>",
                "see http://example.com/x",
            )],
        };
        let transcript = thread_transcript(&thread, "owner@gmail.com");
        assert!(transcript[2].content.contains("Body: see <URL>"));
    }
}
