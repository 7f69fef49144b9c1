//! Thread and message records, parsed once from the provider's wire shapes.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use serde::{Deserialize, Serialize};

const MIME_TYPE_PLAIN: &str = "text/plain";
const MIME_TYPE_HTML: &str = "text/html";
const HTML_RENDER_WIDTH: usize = 400;

/// An immutable snapshot of one mailbox thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailThread {
    pub thread_id: String,
    pub messages: Vec<EmailMessage>,
    pub message_count: usize,
}

/// A single message within a thread. `is_forwarded` is derived once at
/// ingestion and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub body: String,
    pub label_ids: Vec<String>,
    pub is_forwarded: bool,
}

// Wire shapes for the Gmail REST API (threads.list / threads.get?format=full).

#[derive(Debug, Deserialize)]
pub struct ListThreadsResponse {
    #[serde(default)]
    pub threads: Vec<ThreadRef>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailThread {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<GmailMessage>,
}

#[derive(Debug, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    #[serde(rename = "labelIds", default)]
    pub label_ids: Vec<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

impl EmailThread {
    pub fn from_gmail_thread(thread: GmailThread) -> Self {
        let messages: Vec<EmailMessage> = thread
            .messages
            .into_iter()
            .map(EmailMessage::from_gmail_message)
            .collect();

        Self {
            thread_id: thread.id,
            message_count: messages.len(),
            messages,
        }
    }
}

impl EmailMessage {
    pub fn from_gmail_message(msg: GmailMessage) -> Self {
        let payload = msg.payload.unwrap_or_default();

        let subject = get_header(&payload, "subject").unwrap_or_else(|| "No Subject".to_string());
        let from = get_header(&payload, "from").unwrap_or_default();
        let to = get_header(&payload, "to").unwrap_or_default();
        let date = get_header(&payload, "date").unwrap_or_default();

        let is_forwarded = derive_forwarded(&subject, &payload.headers);
        let body = extract_body(&payload);

        Self {
            message_id: msg.id,
            subject,
            from,
            to,
            date,
            body,
            label_ids: msg.label_ids,
            is_forwarded,
        }
    }
}

/// A message counts as forwarded when its subject carries a forward prefix
/// or the provider attached forwarding headers.
fn derive_forwarded(subject: &str, headers: &[Header]) -> bool {
    let subject = subject.to_lowercase();
    subject.starts_with("fwd:")
        || subject.starts_with("fw:")
        || headers.iter().any(|h| {
            let name = h.name.to_lowercase();
            name == "x-forwarded-for" || name == "x-forwarded-from"
        })
}

fn get_header(part: &MessagePart, name: &str) -> Option<String> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Extract a plain-text body from the payload tree, preferring `text/plain`
/// parts over `text/html`, recursing into the first part when neither
/// matches directly.
fn extract_body(payload: &MessagePart) -> String {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
        let content = decode_body_data(data);
        return if payload.mime_type.as_deref() == Some(MIME_TYPE_HTML) {
            html_to_text(&content)
        } else {
            content
        };
    }

    let Some(parts) = payload.parts.as_ref() else {
        return String::new();
    };

    for mime_type in [MIME_TYPE_PLAIN, MIME_TYPE_HTML] {
        for part in parts {
            if part.mime_type.as_deref() == Some(mime_type) {
                if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
                    let content = decode_body_data(data);
                    return if mime_type == MIME_TYPE_HTML {
                        html_to_text(&content)
                    } else {
                        content
                    };
                }
            }
        }
    }

    parts.first().map(extract_body).unwrap_or_default()
}

/// Gmail encodes body data as base64url, sometimes padded.
fn decode_body_data(data: &str) -> String {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_RENDER_WIDTH)
}
