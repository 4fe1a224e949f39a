// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use cookie_hunt::error::{AppError, Result};
use cookie_hunt::models::{Coordinate, CoordinateValue, RaceLocation, RawPosition, Racer};
use cookie_hunt::services::{CompletionOracle, DoneState, RecordOutcome};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Test racer.
#[allow(dead_code)]
pub fn racer() -> Racer {
    Racer {
        racer_id: "r-42".to_string(),
        number: "118".to_string(),
        racer_client_id: "c-7".to_string(),
        race_slug: "geneva-2026".to_string(),
        email: "runner@example.com".to_string(),
    }
}

/// Checkpoint A1 position.
#[allow(dead_code)]
pub const A1: Coordinate = Coordinate {
    latitude: 46.2000,
    longitude: 6.1500,
};

/// Checkpoint B2 position, about 1.1 km north of A1.
#[allow(dead_code)]
pub const B2: Coordinate = Coordinate {
    latitude: 46.2100,
    longitude: 6.1500,
};

/// A point `meters` due north of `target`.
#[allow(dead_code)]
pub fn north_of(target: Coordinate, meters: f64) -> Coordinate {
    let dlat = (meters / cookie_hunt::geodesy::EARTH_RADIUS_M).to_degrees();
    Coordinate::new(target.latitude + dlat, target.longitude)
}

#[allow(dead_code)]
fn location(code: &str, latitude: CoordinateValue, longitude: CoordinateValue) -> RaceLocation {
    RaceLocation {
        code: code.to_string(),
        name: format!("Cookie {}", code),
        description: String::new(),
        points: 10,
        position: RawPosition {
            latitude: Some(latitude),
            longitude: Some(longitude),
        },
    }
}

/// A1 and B2 with numeric coordinates, X3 with unparseable ones.
#[allow(dead_code)]
pub fn race_locations() -> Vec<RaceLocation> {
    vec![
        location(
            "A1",
            CoordinateValue::Number(A1.latitude),
            CoordinateValue::Number(A1.longitude),
        ),
        location(
            "B2",
            CoordinateValue::Text(B2.latitude.to_string()),
            CoordinateValue::Text(B2.longitude.to_string()),
        ),
        location(
            "X3",
            CoordinateValue::Text("somewhere near the lake".to_string()),
            CoordinateValue::Number(6.15),
        ),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory completion oracle
// ─────────────────────────────────────────────────────────────────────────────

/// Oracle keeping completions in memory.
///
/// Recording a checkpoint twice answers `EXISTS`, like the real CRM.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeOracle {
    done: Mutex<HashSet<String>>,
    pub record_calls: Mutex<Vec<(String, i64)>>,
    pub done_calls: AtomicUsize,
    /// Done-state queries fail with a network error
    pub fail_done_queries: AtomicBool,
    /// Done-state queries always answer `false`
    pub stale_reads: AtomicBool,
    /// Record calls fail with a network error
    pub fail_records: AtomicBool,
}

#[allow(dead_code)]
impl FakeOracle {
    pub fn mark_done(&self, code: &str) {
        self.done.lock().unwrap().insert(code.to_string());
    }

    pub fn recorded_codes(&self) -> Vec<String> {
        self.record_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(code, _)| code.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionOracle for FakeOracle {
    async fn is_location_done(&self, _racer: &Racer, code: &str) -> Result<DoneState> {
        self.done_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_done_queries.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".to_string()));
        }
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(DoneState::Known(false));
        }
        Ok(DoneState::Known(self.done.lock().unwrap().contains(code)))
    }

    async fn record_location_time(
        &self,
        _racer: &Racer,
        code: &str,
        timestamp_ms: i64,
    ) -> Result<RecordOutcome> {
        self.record_calls
            .lock()
            .unwrap()
            .push((code.to_string(), timestamp_ms));
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(AppError::Network("timed out".to_string()));
        }
        if self.done.lock().unwrap().insert(code.to_string()) {
            Ok(RecordOutcome::Recorded)
        } else {
            Ok(RecordOutcome::AlreadyRecorded)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake CRM HTTP server
// ─────────────────────────────────────────────────────────────────────────────

/// A request the fake CRM received.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SeenRequest {
    pub endpoint: &'static str,
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
}

/// Canned CRM responses, keyed by endpoint and action.
#[allow(dead_code)]
pub struct CrmScript {
    pub status: StatusCode,
    pub login_body: String,
    pub race_body: String,
    pub done_body: String,
    /// Record responses in order; `SUCCESS` once empty
    pub record_bodies: VecDeque<String>,
    pub seen: Vec<SeenRequest>,
}

impl Default for CrmScript {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            login_body: r#"{"racerId":"r-42","racerClientId":"c-7","raceSlug":"geneva-2026"}"#
                .to_string(),
            race_body: r#"{"slug":"geneva-2026","name":"Geneva","date":"2026-10-16","locations":[]}"#
                .to_string(),
            done_body: "false".to_string(),
            record_bodies: VecDeque::new(),
            seen: Vec::new(),
        }
    }
}

pub type SharedScript = Arc<Mutex<CrmScript>>;

#[allow(dead_code)]
fn respond(
    script: &SharedScript,
    endpoint: &'static str,
    headers: &HeaderMap,
    query: HashMap<String, String>,
) -> (StatusCode, String) {
    let mut s = script.lock().unwrap();
    let action = query
        .get("getAction")
        .or_else(|| query.get("setAction"))
        .cloned()
        .unwrap_or_default();

    s.seen.push(SeenRequest {
        endpoint,
        query,
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let body = match (endpoint, action.as_str()) {
        ("Racer", "login") => s.login_body.clone(),
        ("Racer", "raceLocationDone") => s.done_body.clone(),
        ("Race", _) => s.race_body.clone(),
        ("CRMRaceLog", _) => s
            .record_bodies
            .pop_front()
            .unwrap_or_else(|| "SUCCESS".to_string()),
        _ => return (StatusCode::NOT_FOUND, "unknown action".to_string()),
    };
    (s.status, body)
}

/// Start a fake CRM on an ephemeral port; returns its base URL.
#[allow(dead_code)]
pub async fn spawn_crm(script: SharedScript) -> String {
    async fn racer_handler(
        State(script): State<SharedScript>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        respond(&script, "Racer", &headers, query)
    }

    async fn race_handler(
        State(script): State<SharedScript>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        respond(&script, "Race", &headers, query)
    }

    async fn log_handler(
        State(script): State<SharedScript>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        respond(&script, "CRMRaceLog", &headers, query)
    }

    let app = Router::new()
        .route("/Racer", get(racer_handler))
        .route("/Race", get(race_handler))
        .route("/CRMRaceLog", get(log_handler))
        .with_state(script);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake CRM");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake CRM server");
    });

    format!("http://{}", addr)
}
