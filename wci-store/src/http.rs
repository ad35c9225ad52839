//! Durable tier: a remote object store spoken to over plain HTTP.
//!
//! `GET {base_url}/{key}` reads an object (404 means absent) and
//! `PUT {base_url}/{key}` writes one. An optional bearer token is sent with
//! every request.

use crate::{validate_key, ObjectStore, Result, StoreError};
use reqwest::{Client, StatusCode};

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(client: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn url_for(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(format!("{}/{}", self.base_url, key))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "remote"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url_for(key)?;
        let response = self.authorize(self.client.get(&url)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(StoreError::HttpStatus {
                status: status.as_u16(),
                key: key.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.url_for(key)?;
        let size = body.len();
        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                key: key.to_string(),
            });
        }
        log::debug!("[WCI] store: uploaded {} bytes to {}", size, url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_key() {
        let store = HttpObjectStore::new("https://objects.example.org/bucket/", None);
        assert_eq!(
            store.url_for("wci/history.json").unwrap(),
            "https://objects.example.org/bucket/wci/history.json"
        );
    }

    #[test]
    fn url_rejects_bad_keys() {
        let store = HttpObjectStore::new("https://objects.example.org", None);
        assert!(store.url_for("../secret").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let store = HttpObjectStore::new("http://127.0.0.1:9", Some("token".to_string()));
        let err = store.get("wci/indices.json").await.unwrap_err();
        assert!(matches!(err, StoreError::HttpRequest(_)));
    }
}
