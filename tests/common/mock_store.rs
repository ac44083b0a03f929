//! In-process stand-in for the bakery REST backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const VALID_TOKEN: &str = "valid-token";

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Data {
    players: HashMap<String, Value>,
    tiles: Vec<Value>,
    requests: Vec<CapturedRequest>,
    fail_with: Option<u16>,
}

#[derive(Clone, Default)]
struct MockState {
    data: Arc<Mutex<Data>>,
}

impl MockState {
    /// Record the request and check credentials.
    fn admit(
        &self,
        method: &str,
        path: String,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Result<(), Response> {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut data = self.data.lock();
        data.requests.push(CapturedRequest {
            method: method.to_string(),
            path,
            authorization: authorization.clone(),
            body,
        });

        if let Some(status) = data.fail_with {
            let status = StatusCode::from_u16(status).unwrap();
            return Err((status, Json(json!({"message": "backend failure"}))).into_response());
        }
        let expected = format!("Bearer {}", VALID_TOKEN);
        if authorization.as_deref() != Some(expected.as_str()) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Unauthorized"})),
            )
                .into_response());
        }
        Ok(())
    }
}

pub struct MockStore {
    pub addr: SocketAddr,
    state: MockState,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl MockStore {
    pub async fn start() -> Self {
        let state = MockState::default();
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

        let app = Router::new()
            .route("/api/players", get(list_players))
            .route("/api/players/{id}", get(get_player).put(put_player))
            .route("/api/tiles", get(list_tiles))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock store");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown: shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn insert_player(&self, id: u64, record: Value) {
        let mut record = record;
        record["id"] = json!(id);
        self.state
            .data
            .lock()
            .players
            .insert(id.to_string(), record);
    }

    pub fn set_tiles(&self, tiles: Vec<Value>) {
        self.state.data.lock().tiles = tiles;
    }

    /// Answer every request with this status.
    pub fn fail_with(&self, status: u16) {
        self.state.data.lock().fail_with = Some(status);
    }

    pub fn player(&self, id: u64) -> Option<Value> {
        self.state.data.lock().players.get(&id.to_string()).cloned()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.data.lock().requests.clone()
    }
}

impl Drop for MockStore {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn list_players(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.admit("GET", "/api/players".to_string(), &headers, None) {
        return response;
    }
    let players: Vec<Value> = state.data.lock().players.values().cloned().collect();
    Json(players).into_response()
}

async fn get_player(
    State(state): State<MockState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/api/players/{}", id);
    if let Err(response) = state.admit("GET", path, &headers, None) {
        return response;
    }
    match state.data.lock().players.get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Player not found"})),
        )
            .into_response(),
    }
}

async fn put_player(
    State(state): State<MockState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/api/players/{}", id);
    if let Err(response) = state.admit("PUT", path, &headers, Some(body.clone())) {
        return response;
    }

    let mut data = state.data.lock();
    let Some(record) = data.players.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let (Some(record), Some(update)) = (record.as_object_mut(), body.as_object()) {
        for (key, value) in update {
            record.insert(key.clone(), value.clone());
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_tiles(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.admit("GET", "/api/tiles".to_string(), &headers, None) {
        return response;
    }
    Json(state.data.lock().tiles.clone()).into_response()
}
