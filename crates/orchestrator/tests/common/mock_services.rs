//! Mock job-management service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct MockState {
    /// Statuses returned by successive GETs; the last one repeats.
    statuses: Vec<String>,
    output_url: String,
    destination: String,
    get_calls: usize,
    fail_with: Option<u16>,
    malformed: bool,
    created: Vec<Value>,
    contract_updates: Vec<(String, String)>,
    cancelled: Vec<String>,
}

/// Job service on an ephemeral local port.
#[derive(Clone)]
pub struct JobServiceMock {
    url: String,
    state: Arc<Mutex<MockState>>,
}

impl JobServiceMock {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState {
            statuses: vec!["APPROVED".to_string()],
            output_url: "https://cdn.example/hls/index.m3u8".to_string(),
            destination: "tcp://ingest.example:1936/live".to_string(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/v1/job", post(create_job))
            .route("/api/v1/stream/:id", get(get_job))
            .route("/api/v1/contract_address/:id/:address", post(update_contract))
            .route("/api/v1/stream/stop/:id", post(cancel_job))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn set_statuses(&self, statuses: &[&str]) {
        self.state.lock().unwrap().statuses = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_destination(&self, destination: &str) {
        self.state.lock().unwrap().destination = destination.to_string();
    }

    pub fn fail_with(&self, code: u16) {
        self.state.lock().unwrap().fail_with = Some(code);
    }

    pub fn return_malformed(&self) {
        self.state.lock().unwrap().malformed = true;
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    pub fn created(&self) -> Vec<Value> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn contract_updates(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().contract_updates.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

type Shared = State<Arc<Mutex<MockState>>>;

fn failure(state: &MockState) -> Option<StatusCode> {
    state
        .fail_with
        .and_then(|code| StatusCode::from_u16(code).ok())
}

async fn create_job(State(state): Shared, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    if let Some(code) = failure(&state) {
        return Err(code);
    }
    state.created.push(body);
    Ok(Json(json!({ "rtmpInputUrl": state.destination })))
}

async fn get_job(State(state): Shared, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    if let Some(code) = failure(&state) {
        return Err(code);
    }
    if state.malformed {
        return Ok(Json(json!({ "status": 7 })));
    }

    let index = state.get_calls.min(state.statuses.len().saturating_sub(1));
    state.get_calls += 1;
    let status = state.statuses.get(index).cloned().unwrap_or_default();
    Ok(Json(json!({
        "status": status,
        "output_url": format!("{}?stream={}", state.output_url, id),
        "profile": "720p",
    })))
}

async fn update_contract(State(state): Shared, Path((id, address)): Path<(String, String)>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if let Some(code) = failure(&state) {
        return code;
    }
    state.contract_updates.push((id, address));
    StatusCode::OK
}

async fn cancel_job(State(state): Shared, Path(id): Path<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.cancelled.push(id);
    StatusCode::OK
}
