//! Forwarding of decoded books to the loans API.

use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::{info, warn};
use url::Url;

use crate::error::ForwardError;
use crate::queue::Book;

/// Posts books to a fixed endpoint, one request per book.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    url: Url,
}

impl Forwarder {
    /// Create a forwarder for the given endpoint.
    ///
    /// The HTTP client keeps reqwest's defaults; no request timeout is set.
    pub fn new(url: Url) -> Result<Self, ForwardError> {
        let client = Client::builder().build().map_err(ForwardError::Client)?;
        Ok(Self { client, url })
    }

    /// The endpoint books are posted to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send one book as a JSON `POST`.
    ///
    /// Any HTTP response counts as forwarded and its status is returned.
    /// Only a failure to get a response at all is an error.
    pub async fn forward(&self, book: &Book) -> Result<StatusCode, ForwardError> {
        let body = serde_json::to_vec(book)?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            info!(
                url = %self.url,
                status_code = status.as_u16(),
                title = %book.title,
                "book_forwarded"
            );
        } else {
            warn!(
                url = %self.url,
                status_code = status.as_u16(),
                title = %book.title,
                "book_forwarded_non_success"
            );
        }

        Ok(status)
    }
}
