use std::path::Path;

use axum::{extract::State, Json};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppJsonResult},
    handshake::InitialHandshake,
    index::VectorStore,
    prompt::style,
    server_config::cfg,
    storage::{safe_owner, OwnerStorage},
    ServerState,
};

lazy_static! {
    static ref RE_GMAIL_ADDRESS: Regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@gmail\.com$").unwrap();
}

fn validate_gmail_address(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::InvalidInput("Email cannot be empty".to_string()));
    }
    if !RE_GMAIL_ADDRESS.is_match(email) {
        return Err(AppError::InvalidInput(format!(
            "Invalid Gmail address: {}",
            email
        )));
    }
    Ok(())
}

fn open_storage(email: &str) -> Result<OwnerStorage, AppError> {
    OwnerStorage::open(Path::new(&cfg.settings.data_dir), email)
}

#[derive(Debug, Deserialize)]
pub struct StoreTokenRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftReplyRequest {
    pub email: String,
    pub thread_id: String,
}

/// Encrypt and store a mailbox token handed over by the extension.
pub async fn store_gmail_token(
    Json(req): Json<StoreTokenRequest>,
) -> AppJsonResult<Value> {
    validate_gmail_address(&req.email)?;

    let storage = open_storage(&req.email)?;
    storage.store_token(&req.token, &cfg.token_key)?;

    Ok(Json(json!({
        "status": "success",
        "message": "Token stored",
    })))
}

/// Run the full handshake for one owner. Takes as long as the pipeline
/// takes; concurrency control per owner is the caller's responsibility.
pub async fn connect_gmail(
    State(state): State<ServerState>,
    Json(req): Json<OwnerRequest>,
) -> AppJsonResult<Value> {
    validate_gmail_address(&req.email)?;

    let handshake = InitialHandshake::new(state.http_client.clone(), &req.email);
    handshake.run().await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Gmail connection and analysis complete",
    })))
}

pub async fn logout_gmail(Json(req): Json<OwnerRequest>) -> AppJsonResult<Value> {
    validate_gmail_address(&req.email)?;

    let storage = open_storage(&req.email)?;
    storage.remove_token()?;

    Ok(Json(json!({
        "status": "success",
        "message": "Successfully logged out",
    })))
}

/// Draft a style-matched reply to one of the owner's snapshotted threads.
pub async fn draft_reply(
    State(state): State<ServerState>,
    Json(req): Json<DraftReplyRequest>,
) -> AppJsonResult<Value> {
    validate_gmail_address(&req.email)?;

    let storage = open_storage(&req.email)?;
    let threads = storage.load_threads()?;
    let thread = threads
        .iter()
        .find(|t| t.thread_id == req.thread_id)
        .ok_or_else(|| AppError::NotFound(format!("No such thread: {}", req.thread_id)))?;

    let store = VectorStore::new(state.http_client.clone(), safe_owner(&req.email));
    let draft = style::draft_reply(&state.http_client, &store, thread, &req.email).await?;

    Ok(Json(json!({
        "status": "success",
        "draft": draft,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_gmail_addresses() {
        for email in ["jane@gmail.com", "jane.doe+tag@gmail.com", "a_b%c@gmail.com"] {
            assert!(validate_gmail_address(email).is_ok(), "{} rejected", email);
        }
    }

    #[test]
    fn test_rejects_non_gmail_and_malformed_addresses() {
        for email in [
            "",
            "   ",
            "jane@example.com",
            "jane@gmail.com extra",
            "@gmail.com",
            "jane@gmailXcom",
        ] {
            assert!(
                matches!(validate_gmail_address(email), Err(AppError::InvalidInput(_))),
                "{:?} accepted",
                email
            );
        }
    }
}
