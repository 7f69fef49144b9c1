//! Thin Gmail REST adapter: list the owner's threads and fetch each one in
//! full. All parsing into domain records happens in [`crate::email::thread`].

use anyhow::Context;
use futures::future::join_all;

use crate::{
    email::thread::{EmailThread, GmailThread, ListThreadsResponse},
    error::AppResult,
    HttpClient,
};

macro_rules! gmail_url {
    ($($params:expr),*) => {
        {
            const GMAIL_ENDPOINT: &str = "https://www.googleapis.com/gmail/v1/users/me";
            let list_params = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", GMAIL_ENDPOINT, path)
        }
    };
}

#[derive(Debug, Clone)]
pub struct EmailClient {
    http_client: HttpClient,
    email_address: String,
    access_token: String,
}

impl EmailClient {
    pub fn new(
        http_client: HttpClient,
        email_address: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            email_address: email_address.into(),
            access_token: access_token.into(),
        }
    }

    /// List up to `max_results` threads containing mail the owner sent, then
    /// fetch each thread in full. Detail fetches run concurrently; the
    /// result preserves the provider's thread order.
    pub async fn list_threads(&self, max_results: u32) -> AppResult<Vec<EmailThread>> {
        let query = format!("from:{} in:anywhere", self.email_address);
        let resp = self
            .http_client
            .get(gmail_url!("threads"))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("maxResults", &max_results.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ListThreadsResponse>()
            .await
            .context("Could not parse thread list response")?;

        tracing::info!(
            "Thread list for {} returned {} threads",
            self.email_address,
            resp.threads.len()
        );

        let fetches = resp
            .threads
            .iter()
            .map(|thread_ref| self.get_thread(&thread_ref.id));

        join_all(fetches).await.into_iter().collect()
    }

    /// Fetch a single thread with full payloads and parse it into a domain
    /// record.
    pub async fn get_thread(&self, thread_id: &str) -> AppResult<EmailThread> {
        let resp = self
            .http_client
            .get(gmail_url!("threads", thread_id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?
            .error_for_status()?
            .json::<GmailThread>()
            .await
            .context(format!("Could not parse thread {}", thread_id))?;

        Ok(EmailThread::from_gmail_thread(resp))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_gmail_url_macro_joins_path_segments() {
        assert_eq!(
            gmail_url!("threads"),
            "https://www.googleapis.com/gmail/v1/users/me/threads"
        );
        assert_eq!(
            gmail_url!("threads", "abc123"),
            "https://www.googleapis.com/gmail/v1/users/me/threads/abc123"
        );
    }
}
