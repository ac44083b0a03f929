//! Profile store collaborator.
//!
//! `ProfileStore` is the seam between the synchronizer and wherever player
//! profiles live. `HttpProfileStore` talks to the bakery REST backend:
//!
//! | call | endpoint |
//! |---|---|
//! | `fetch_profile` | `GET /players/{id}` |
//! | `update_profile` | `PUT /players/{id}` |
//! | `list_players` | `GET /players` |
//! | `list_tiles` | `GET /tiles` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::SyncError;
use super::identity::ProfileId;
use crate::state::{parse_tile_table, StatsSnapshot, TileDefinition};

/// Default backend location.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5130/api";

/// Entry of the player listing, used to resolve a username to a profile id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: ProfileId,
    pub username: String,
}

/// Merge applied to the freshly fetched snapshot during a blocking flush.
pub type MergeFn<'a> = &'a (dyn Fn(&StatsSnapshot) -> StatsSnapshot + Send + Sync);

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<StatsSnapshot, SyncError>;

    async fn update_profile(
        &self,
        id: &ProfileId,
        snapshot: &StatsSnapshot,
    ) -> Result<(), SyncError>;

    async fn list_players(&self) -> Result<Vec<PlayerSummary>, SyncError>;

    async fn list_tiles(&self) -> Result<Vec<TileDefinition>, SyncError>;

    /// Fetch, merge and write back without an async runtime.
    ///
    /// Only for the exit path. Must not be called from inside an async task;
    /// use `tokio::task::spawn_blocking`.
    fn flush_blocking(&self, id: &ProfileId, merge: MergeFn<'_>)
        -> Result<StatsSnapshot, SyncError>;
}

/// REST client for the bakery backend.
pub struct HttpProfileStore {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpProfileStore {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn player_url(&self, id: &ProfileId) -> String {
        self.url(&format!("/players/{}", id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a response into its body text, mapping failures to `SyncError`.
    async fn read_body(response: reqwest::Response, resource: &str) -> Result<String, SyncError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::from_status(status.as_u16(), &body, resource));
        }
        Ok(body)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> Result<T, SyncError> {
        tracing::debug!(url = %url, "GET");
        let response = self.authorize(self.client.get(url)).send().await?;
        let body = Self::read_body(response, resource).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn blocking_client(&self) -> Result<reqwest::blocking::Client, SyncError> {
        Ok(reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?)
    }

    fn blocking_authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn blocking_body(
        response: reqwest::blocking::Response,
        resource: &str,
    ) -> Result<String, SyncError> {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::from_status(status.as_u16(), &body, resource));
        }
        Ok(body)
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<StatsSnapshot, SyncError> {
        self.get_json(&self.player_url(id), id.as_str()).await
    }

    async fn update_profile(
        &self,
        id: &ProfileId,
        snapshot: &StatsSnapshot,
    ) -> Result<(), SyncError> {
        let url = self.player_url(id);
        tracing::debug!(url = %url, "PUT");
        let response = self
            .authorize(self.client.put(&url))
            .json(snapshot)
            .send()
            .await?;
        // 204 and 200 both count; any body is ignored.
        Self::read_body(response, id.as_str()).await?;
        Ok(())
    }

    async fn list_players(&self) -> Result<Vec<PlayerSummary>, SyncError> {
        self.get_json(&self.url("/players"), "players").await
    }

    async fn list_tiles(&self) -> Result<Vec<TileDefinition>, SyncError> {
        let records: Vec<serde_json::Value> = self.get_json(&self.url("/tiles"), "tiles").await?;
        Ok(parse_tile_table(records))
    }

    fn flush_blocking(
        &self,
        id: &ProfileId,
        merge: MergeFn<'_>,
    ) -> Result<StatsSnapshot, SyncError> {
        let client = self.blocking_client()?;
        let url = self.player_url(id);

        let response = self.blocking_authorize(client.get(&url)).send()?;
        let remote: StatsSnapshot =
            serde_json::from_str(&Self::blocking_body(response, id.as_str())?)?;

        let merged = merge(&remote);
        let response = self
            .blocking_authorize(client.put(&url))
            .json(&merged)
            .send()?;
        Self::blocking_body(response, id.as_str())?;
        Ok(merged)
    }
}
