//! Extraction of reference passages from a mailbox owner's threads.
//!
//! One bundle per thread, one passage per message that survived filtering.
//! Extraction is fail-fast: downstream indexing assumes a complete,
//! consistent reference set, so the first per-thread failure aborts the
//! whole batch.

use serde::{Deserialize, Serialize};

use crate::{
    email::{
        normalize::{clean, split_sender},
        thread::{EmailMessage, EmailThread},
    },
    error::{AppError, AppResult},
    util::token_cost,
};

const PROHIBITED_SUBJECTS: [&str; 2] = ["unsubscribe", "list-unsubscribe"];
const MIN_BODY_LENGTH: usize = 1;

/// A cleaned message written by the mailbox owner, ready for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePassage {
    /// 1-based position within the thread's kept subset.
    pub position: usize,
    /// Cleaned body text.
    pub content: String,
    /// Token cost of `content`.
    pub cost: usize,
    pub message_id: String,
    pub date: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub label_ids: Vec<String>,
    pub is_forwarded: bool,
}

/// All passages extracted from one thread. A thread with zero kept messages
/// produces no bundle at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceBundle {
    pub thread_id: String,
    pub passages: Vec<ReferencePassage>,
}

pub struct PassageExtractor {
    owner_address: String,
}

impl PassageExtractor {
    pub fn new(owner_address: impl Into<String>) -> Self {
        Self {
            owner_address: owner_address.into(),
        }
    }

    /// Walk `threads` and extract one bundle per thread with at least one
    /// valid owner-authored message.
    pub fn extract(&self, threads: &[EmailThread]) -> AppResult<Vec<ReferenceBundle>> {
        if threads.is_empty() {
            return Err(AppError::InvalidInput(
                "Threads list cannot be empty".to_string(),
            ));
        }

        tracing::info!("Starting extraction for {} threads", threads.len());
        let mut bundles = Vec::new();

        for thread in threads {
            if let Some(bundle) = self.process_thread(thread)? {
                tracing::debug!(
                    "Thread {} yielded {} passages",
                    bundle.thread_id,
                    bundle.passages.len()
                );
                bundles.push(bundle);
            }
        }

        tracing::info!(
            "Extraction completed: {} threads with valid content",
            bundles.len()
        );
        Ok(bundles)
    }

    fn process_thread(&self, thread: &EmailThread) -> AppResult<Option<ReferenceBundle>> {
        if thread.thread_id.is_empty() {
            return Err(AppError::InvalidInput("Thread missing thread_id".to_string()));
        }

        let mut passages = Vec::new();

        for message in &thread.messages {
            let (_, sender_address) = split_sender(&message.from);
            if sender_address != self.owner_address {
                continue;
            }

            if !is_valid_message(message) {
                tracing::debug!(
                    "Skipping invalid message {} in thread {}",
                    message.message_id,
                    thread.thread_id
                );
                continue;
            }

            let content = clean(&message.body);
            let cost = token_cost(&content);

            passages.push(ReferencePassage {
                position: passages.len() + 1,
                content,
                cost,
                message_id: message.message_id.clone(),
                date: message.date.clone(),
                from: message.from.clone(),
                to: message.to.clone(),
                subject: message.subject.clone(),
                label_ids: message.label_ids.clone(),
                is_forwarded: message.is_forwarded,
            });
        }

        if passages.is_empty() {
            return Ok(None);
        }

        Ok(Some(ReferenceBundle {
            thread_id: thread.thread_id.clone(),
            passages,
        }))
    }
}

fn is_valid_message(message: &EmailMessage) -> bool {
    let subject = message.subject.to_lowercase();
    !PROHIBITED_SUBJECTS.iter().any(|p| subject.contains(p))
        && !message.is_forwarded
        && clean(&message.body).len() >= MIN_BODY_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, subject: &str, body: &str) -> EmailMessage {
        EmailMessage {
            message_id: "m1".to_string(),
            subject: subject.to_string(),
            from: from.to_string(),
            to: "other@example.com".to_string(),
            date: "Mon, 06 Jan 2025 10:00:00 +0000".to_string(),
            body: body.to_string(),
            label_ids: vec!["SENT".to_string()],
            is_forwarded: false,
        }
    }

    fn thread(id: &str, messages: Vec<EmailMessage>) -> EmailThread {
        EmailThread {
            thread_id: id.to_string(),
            message_count: messages.len(),
            messages,
        }
    }

    const OWNER: &str = "owner@gmail.com";

    #[test]
    fn test_empty_threads_list_is_rejected() {
        let extractor = PassageExtractor::new(OWNER);
        assert!(matches!(
            extractor.extract(&[]),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_extracts_owner_messages_only() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [thread(
            "t1",
            vec![
                message("Owner <owner@gmail.com>", "Hi", "mine"),
                message("Peer <peer@example.com>", "Hi", "theirs"),
            ],
        )];

        let bundles = extractor.extract(&threads).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].passages.len(), 1);
        assert_eq!(bundles[0].passages[0].content, "mine");
    }

    #[test]
    fn test_forwarded_message_never_kept() {
        let extractor = PassageExtractor::new(OWNER);
        let mut fwd = message(OWNER, "Quarterly numbers", "a perfectly good body");
        fwd.is_forwarded = true;
        let threads = [thread("t1", vec![fwd])];

        assert!(extractor.extract(&threads).unwrap().is_empty());
    }

    #[test]
    fn test_prohibited_subject_never_kept() {
        let extractor = PassageExtractor::new(OWNER);
        for subject in ["Please UNSUBSCRIBE me", "list-unsubscribe follow-up"] {
            let threads = [thread("t1", vec![message(OWNER, subject, "body text")])];
            assert!(
                extractor.extract(&threads).unwrap().is_empty(),
                "subject {:?} should be excluded",
                subject
            );
        }
    }

    #[test]
    fn test_empty_body_never_kept() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [thread("t1", vec![message(OWNER, "Hi", "   \n\n  ")])];
        assert!(extractor.extract(&threads).unwrap().is_empty());
    }

    #[test]
    fn test_thread_with_no_kept_messages_contributes_nothing() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [
            thread("t1", vec![message("peer@example.com", "Hi", "theirs")]),
            thread("t2", vec![message(OWNER, "Hi", "kept body")]),
        ];

        let bundles = extractor.extract(&threads).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].thread_id, "t2");
    }

    #[test]
    fn test_numbering_is_within_kept_subset() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [thread(
            "t1",
            vec![
                message("peer@example.com", "Hi", "skipped"),
                message(OWNER, "Hi", "first kept"),
                message("peer@example.com", "Hi", "skipped too"),
                message(OWNER, "Hi", "second kept"),
            ],
        )];

        let bundles = extractor.extract(&threads).unwrap();
        let positions: Vec<usize> = bundles[0].passages.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(bundles[0].passages[1].content, "second kept");
    }

    #[test]
    fn test_passage_carries_message_fields_and_cleaned_content() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [thread(
            "t1",
            vec![message(
                "Owner <owner@gmail.com>",
                "Plans",
                "see http://example.com/x for details",
            )],
        )];

        let bundles = extractor.extract(&threads).unwrap();
        let passage = &bundles[0].passages[0];
        assert_eq!(passage.content, "see <URL> for details");
        assert_eq!(passage.cost, token_cost(&passage.content));
        assert_eq!(passage.subject, "Plans");
        assert_eq!(passage.from, "Owner <owner@gmail.com>");
        assert_eq!(passage.label_ids, vec!["SENT".to_string()]);
        assert!(!passage.is_forwarded);
    }

    #[test]
    fn test_missing_thread_id_aborts_batch() {
        let extractor = PassageExtractor::new(OWNER);
        let threads = [
            thread("t1", vec![message(OWNER, "Hi", "kept body")]),
            thread("", vec![message(OWNER, "Hi", "kept body")]),
        ];
        assert!(matches!(
            extractor.extract(&threads),
            Err(AppError::InvalidInput(_))
        ));
    }
}
