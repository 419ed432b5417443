//! API client for communicating with the bookstore catalog REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against the catalog: authentication, books, genres, and the
//! transaction/order purchase flow.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::normalize;
use crate::models::{Book, Genre, NewBook, NewTransaction, Transaction, TransactionStatistics};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the catalog API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds.
/// The backend can take a while to assemble large catalog pages.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the bookstore catalog.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given base URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Drop the bearer token; subsequent requests go out unauthenticated.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token when one is set.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get_value(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.get(&url);
            if !query.is_empty() {
                request = request.query(query);
            }
            let response = self.authorize(request).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.json().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn post_value<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = self.client.post(&url).json(body);
            let response = self.authorize(request).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.json().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn delete_path(&self, path: &str) -> Result<(), ApiError> {
        let response = self.authorize(self.client.delete(self.url(path))).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Decode a possibly `{data: ...}`-wrapped body into a typed value.
    fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, ApiError> {
        serde_json::from_value(normalize::unwrap_data(value))
            .map_err(|e| ApiError::InvalidResponse(format!("failed to decode {}: {}", what, e)))
    }

    // ===== Authentication =====
    //
    // Auth requests are sent directly, outside the retry helpers: a failed
    // login is re-invoked by the user, never by the client.

    /// Send credentials to the login endpoint, returning the raw body for
    /// the normalization layer.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let request = self.client.post(self.url("/auth/login")).json(&body);
        let response = self.authorize(request).send().await?;
        let response = Self::check_response(response).await?;
        debug!("Login response received");
        Ok(response.json().await?)
    }

    /// Send credentials to the register endpoint, returning the raw body.
    pub async fn register(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let request = self.client.post(self.url("/auth/register")).json(&body);
        let response = self.authorize(request).send().await?;
        let response = Self::check_response(response).await?;
        debug!("Register response received");
        Ok(response.json().await?)
    }

    /// Fetch the authenticated user's profile, returning the raw body.
    pub async fn me(&self) -> Result<Value, ApiError> {
        let response = self.authorize(self.client.get(self.url("/auth/me"))).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    // ===== Catalog =====

    /// Fetch the catalog, optionally filtered by a title search term.
    pub async fn list_books(&self, search: Option<&str>) -> Result<Vec<Book>, ApiError> {
        let query = Self::search_query(search);
        let value = self.get_value("/books", &query).await?;
        Ok(normalize::list_of(value))
    }

    /// Fetch the catalog restricted to one genre.
    pub async fn books_by_genre(
        &self,
        genre_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Book>, ApiError> {
        let query = Self::search_query(search);
        let value = self
            .get_value(&format!("/books/genre/{}", genre_id), &query)
            .await?;
        Ok(normalize::list_of(value))
    }

    /// The backend variants disagree on the search parameter name, so the
    /// term goes out under every key they recognize; unknown keys are
    /// ignored server-side.
    fn search_query(search: Option<&str>) -> Vec<(&'static str, String)> {
        match search {
            Some(term) if !term.trim().is_empty() => ["q", "title", "search"]
                .iter()
                .map(|key| (*key, term.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub async fn get_book(&self, id: &str) -> Result<Book, ApiError> {
        let value = self.get_value(&format!("/books/{}", id), &[]).await?;
        Self::decode(value, "book")
    }

    /// Create a book, returning the new book's id.
    pub async fn create_book(&self, book: &NewBook) -> Result<String, ApiError> {
        let value = self.post_value("/books", book).await?;
        normalize::entity_id(&value)
            .ok_or_else(|| ApiError::InvalidResponse("book id missing from response".to_string()))
    }

    pub async fn delete_book(&self, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("/books/{}", id)).await
    }

    pub async fn list_genres(&self) -> Result<Vec<Genre>, ApiError> {
        let value = self.get_value("/genre", &[]).await?;
        Ok(normalize::list_of(value))
    }

    pub async fn get_genre(&self, id: &str) -> Result<Genre, ApiError> {
        let value = self.get_value(&format!("/genre/{}", id), &[]).await?;
        Self::decode(value, "genre")
    }

    // ===== Transactions =====
    //
    // One backend variant serves the purchase flow under /transactions, the
    // other under /orders. A 404 means the route is absent in that variant,
    // so each call falls back to the sibling route once.

    /// Create a transaction from the given items, returning its id.
    pub async fn create_transaction(&self, tx: &NewTransaction) -> Result<String, ApiError> {
        let value = match self.post_value("/transactions", tx).await {
            Err(ApiError::NotFound(_)) => {
                debug!("POST /transactions not found, retrying against /orders");
                self.post_value("/orders", tx).await?
            }
            other => other?,
        };
        normalize::entity_id(&value).ok_or_else(|| {
            ApiError::InvalidResponse("transaction id missing from response".to_string())
        })
    }

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        let value = self.get_value("/transactions", &[]).await?;
        Ok(normalize::list_of(value))
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Transaction, ApiError> {
        let value = match self.get_value(&format!("/transactions/{}", id), &[]).await {
            Err(ApiError::NotFound(_)) => {
                debug!(id, "GET /transactions/{{id}} not found, retrying against /orders");
                self.get_value(&format!("/orders/{}", id), &[]).await?
            }
            other => other?,
        };
        Self::decode(value, "transaction")
    }

    pub async fn transaction_statistics(&self) -> Result<TransactionStatistics, ApiError> {
        let value = self.get_value("/transactions/statistics", &[]).await?;
        Self::decode(value, "transaction statistics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8080/").expect("client");
        assert_eq!(client.url("/books"), "http://localhost:8080/books");
    }

    #[test]
    fn test_search_query_fans_out_over_known_keys() {
        let query = ApiClient::search_query(Some("dune"));
        assert_eq!(query.len(), 3);
        assert!(query.iter().all(|(_, term)| term == "dune"));

        assert!(ApiClient::search_query(None).is_empty());
        assert!(ApiClient::search_query(Some("   ")).is_empty());
    }

    #[test]
    fn test_decode_unwraps_data_envelope() {
        let wrapped = json!({"data": {"id": "g1", "name": "Sci-Fi"}});
        let genre: Genre = ApiClient::decode(wrapped, "genre").expect("wrapped");
        assert_eq!(genre.name, "Sci-Fi");

        let flat = json!({"id": "g1", "name": "Sci-Fi"});
        let genre: Genre = ApiClient::decode(flat, "genre").expect("flat");
        assert_eq!(genre.id, "g1");
    }

    #[test]
    fn test_decode_reports_what_failed() {
        let err = ApiClient::decode::<Genre>(json!({"nope": true}), "genre").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(msg) if msg.contains("genre")));
    }

    #[test]
    fn test_token_lifecycle() {
        let mut client = ApiClient::new(DEFAULT_BASE_URL).expect("client");
        assert!(client.token().is_none());

        client.set_token("T1".to_string());
        assert_eq!(client.token(), Some("T1"));

        client.clear_token();
        assert!(client.token().is_none());
    }
}
