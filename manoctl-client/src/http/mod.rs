//! Thin HTTP transport against the orchestrator's northbound interface.
//!
//! Every verb wrapper returns the raw `(status_code, body)` pair without
//! retrying or interpreting the response; protocol decisions belong to the
//! resource clients and the wait loop.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::RwLock;

use crate::error::{ClientError, ClientResult};
use crate::wait::StatusFetcher;

pub struct HttpClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpClient {
    /// Create a client against the given base URL, e.g. `https://mano.example:9999/osm`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        url::Url::parse(base_url)
            .map_err(|e| ClientError::InvalidInput(format!("invalid base URL '{base_url}': {e}")))?;
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Obtain a bearer token from `/admin/v1/tokens` and keep it for all
    /// subsequent requests.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        project: &str,
    ) -> ClientResult<()> {
        let credentials = json!({
            "username": username,
            "password": password,
            "project_id": project,
        });
        let (http_code, body) = self.post_cmd("/admin/v1/tokens", &credentials).await?;
        if !(200..300).contains(&http_code) {
            return Err(ClientError::Server(body.unwrap_or_default()));
        }
        let resp: Value = serde_json::from_str(&body.unwrap_or_default())?;
        let token = resp
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::UnexpectedResponse(resp.to_string()))?;
        *self
            .token
            .write()
            .map_err(|_| poisoned_token_lock())? = Some(token.to_string());
        Ok(())
    }

    pub async fn get_cmd(&self, path: &str) -> ClientResult<(u16, Option<String>)> {
        self.send(self.http.get(self.endpoint(path))).await
    }

    pub async fn post_cmd<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> ClientResult<(u16, Option<String>)> {
        self.send(self.http.post(self.endpoint(path)).json(body)).await
    }

    pub async fn put_cmd<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> ClientResult<(u16, Option<String>)> {
        self.send(self.http.put(self.endpoint(path)).json(body)).await
    }

    pub async fn delete_cmd(&self, path: &str) -> ClientResult<(u16, Option<String>)> {
        self.send(self.http.delete(self.endpoint(path))).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> ClientResult<Option<String>> {
        Ok(self
            .token
            .read()
            .map_err(|_| poisoned_token_lock())?
            .clone())
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<(u16, Option<String>)> {
        let request = match self.bearer()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let http_code = response.status().as_u16();
        debug!("-> {http_code}");
        let body = response.text().await?;
        Ok((http_code, if body.is_empty() { None } else { Some(body) }))
    }
}

// Poison means a thread panicked while holding the token; requests must not
// silently fall back to unauthenticated.
fn poisoned_token_lock() -> ClientError {
    ClientError::Transport("authentication token lock poisoned".to_string())
}

#[async_trait]
impl StatusFetcher for HttpClient {
    async fn fetch_status(&self, path: &str) -> ClientResult<(u16, Option<String>)> {
        self.get_cmd(path).await
    }
}
