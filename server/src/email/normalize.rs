//! Text normalization shared by the passage extractor and prompt builders.

use lazy_static::lazy_static;
use regex::Regex;

const RE_URL_STR: &str = r"https?://[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_\+.~#?&/=]*|www\.[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_\+.~#?&/=]*";
const RE_EXCESS_NEWLINES_STR: &str = r"\n{3,}";
const RE_SENDER_STR: &str = r"^(.*?)\s*<(.+?)>$";

lazy_static! {
    static ref RE_URL: Regex = Regex::new(RE_URL_STR).unwrap();
    static ref RE_EXCESS_NEWLINES: Regex = Regex::new(RE_EXCESS_NEWLINES_STR).unwrap();
    static ref RE_SENDER: Regex = Regex::new(RE_SENDER_STR).unwrap();
}

/// The placeholder every URL-like substring is masked with.
pub const URL_TOKEN: &str = "<URL>";

/// Clean a raw message body: mask URLs, collapse runs of 3+ newlines down to
/// exactly 2, and strip surrounding whitespace. Idempotent.
pub fn clean(text: &str) -> String {
    let masked = RE_URL.replace_all(text, URL_TOKEN);
    let collapsed = RE_EXCESS_NEWLINES.replace_all(&masked, "\n\n");
    collapsed.trim().to_string()
}

/// Split a `From` header into display name and address.
///
/// `"Jane Doe <jane@x.com>"` yields `("Jane Doe", "jane@x.com")`; a header
/// without angle brackets is treated as a bare address with no name.
pub fn split_sender(header: &str) -> (String, String) {
    let header = header.trim();
    if header.is_empty() {
        return (String::new(), String::new());
    }

    match RE_SENDER.captures(header) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
        ),
        None => (String::new(), header.to_string()),
    }
}
