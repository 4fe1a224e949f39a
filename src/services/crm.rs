// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race CRM client.
//!
//! Handles:
//! - Racer login (email + bib number)
//! - Race details with checkpoint list
//! - "Is this checkpoint done" queries
//! - Recording a checkpoint as done
//!
//! Every request carries the static API key header. The done-state and
//! record endpoints answer in loosely typed bodies, so those responses are
//! read as text and classified by the parsers at the bottom of this file.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Race, Racer};
use async_trait::async_trait;
use serde::Deserialize;

/// Completion state reported by the CRM for one racer and checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneState {
    Known(bool),
    Unknown,
}

impl DoneState {
    /// Treat anything other than an explicit `true` as not done.
    pub fn is_done(self) -> bool {
        matches!(self, DoneState::Known(true))
    }
}

/// Successful outcomes of a record-done call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The CRM stored a new completion (`SUCCESS`).
    Recorded,
    /// A completion already existed (`EXISTS`).
    AlreadyRecorded,
}

/// The two calls the confirmation flow makes against the remote store.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Ask whether `code` is already marked done for `racer`.
    async fn is_location_done(&self, racer: &Racer, code: &str) -> Result<DoneState>;

    /// Mark `code` done for `racer` at `timestamp_ms` (milliseconds since epoch).
    async fn record_location_time(
        &self,
        racer: &Racer,
        code: &str,
        timestamp_ms: i64,
    ) -> Result<RecordOutcome>;
}

/// Racer record returned by the login lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRecord {
    racer_id: String,
    racer_client_id: String,
    race_slug: String,
}

/// HTTP client for the race CRM.
#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    api_key_header: String,
    api_key: String,
}

impl CrmClient {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.crm_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.crm_base_url.clone(),
            api_key_header: config.crm_api_key_header.clone(),
            api_key: config.crm_api_key.clone(),
        })
    }

    /// Look up a racer by email and bib number.
    ///
    /// The CRM answers `null` when no racer matches.
    pub async fn login(&self, email: &str, number: &str) -> Result<Racer> {
        let record: Option<LoginRecord> = self
            .get_json(
                "Racer",
                &[
                    ("action", "get"),
                    ("getAction", "login"),
                    ("email", email),
                    ("number", number),
                ],
            )
            .await?;

        let record = record.ok_or_else(|| AppError::UnknownRacer(email.to_string()))?;
        tracing::info!(racer_id = %record.racer_id, race = %record.race_slug, "Racer logged in");

        Ok(Racer {
            racer_id: record.racer_id,
            number: number.to_string(),
            racer_client_id: record.racer_client_id,
            race_slug: record.race_slug,
            email: email.to_string(),
        })
    }

    /// Fetch a race definition with its checkpoints.
    pub async fn get_race(&self, slug: &str) -> Result<Race> {
        let race: Race = self
            .get_json(
                "Race",
                &[("action", "get"), ("getAction", "raceDetails"), ("slug", slug)],
            )
            .await?;
        tracing::debug!(slug, locations = race.locations.len(), "Fetched race");
        Ok(race)
    }

    /// GET an endpoint and return the raw body.
    async fn get_text(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .http
            .get(&url)
            .header(self.api_key_header.as_str(), self.api_key.as_str())
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("{} body read failed: {}", endpoint, e)))?;

        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "CRM returned error status");
            return Err(AppError::Network(format!("HTTP {}: {}", status, body)));
        }

        Ok(body)
    }

    /// GET an endpoint and parse the body as JSON.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get_text(endpoint, query).await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::MalformedResponse(format!("{} JSON parse error: {}", endpoint, e)))
    }
}

#[async_trait]
impl CompletionOracle for CrmClient {
    async fn is_location_done(&self, racer: &Racer, code: &str) -> Result<DoneState> {
        let body = self
            .get_text(
                "Racer",
                &[
                    ("action", "get"),
                    ("getAction", "raceLocationDone"),
                    ("racerId", racer.racer_id.as_str()),
                    ("clientId", racer.racer_client_id.as_str()),
                    ("raceLocationCode", code),
                ],
            )
            .await?;

        let state = parse_done_state(&body);
        if state == DoneState::Unknown {
            tracing::warn!(code, body = %body, "Unrecognized done-state response");
        }
        Ok(state)
    }

    async fn record_location_time(
        &self,
        racer: &Racer,
        code: &str,
        timestamp_ms: i64,
    ) -> Result<RecordOutcome> {
        let timestamp = timestamp_ms.to_string();
        let body = self
            .get_text(
                "CRMRaceLog",
                &[
                    ("action", "set"),
                    ("setAction", "setRacerLocationTime"),
                    ("racerId", racer.racer_id.as_str()),
                    ("clientId", racer.racer_client_id.as_str()),
                    ("raceLocationCode", code),
                    ("timestamp", timestamp.as_str()),
                ],
            )
            .await?;

        parse_record_outcome(&body)
    }
}

/// Classify a done-state body.
///
/// Accepts a JSON boolean, a JSON object with a boolean `done` field, or the
/// bare text `true`/`false`. Anything else is `Unknown`.
pub fn parse_done_state(body: &str) -> DoneState {
    let text = body.trim();

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Bool(b)) => DoneState::Known(b),
        Ok(serde_json::Value::Object(map)) => map
            .get("done")
            .and_then(serde_json::Value::as_bool)
            .map_or(DoneState::Unknown, DoneState::Known),
        Ok(serde_json::Value::String(s)) => literal_bool(s.trim()),
        Ok(_) => DoneState::Unknown,
        Err(_) => literal_bool(text),
    }
}

fn literal_bool(text: &str) -> DoneState {
    if text.eq_ignore_ascii_case("true") {
        DoneState::Known(true)
    } else if text.eq_ignore_ascii_case("false") {
        DoneState::Known(false)
    } else {
        DoneState::Unknown
    }
}

/// Classify a record-done body: `SUCCESS`, `EXISTS`, or an error.
pub fn parse_record_outcome(body: &str) -> Result<RecordOutcome> {
    match body.trim().trim_matches('"') {
        "SUCCESS" => Ok(RecordOutcome::Recorded),
        "EXISTS" => Ok(RecordOutcome::AlreadyRecorded),
        other => Err(AppError::MalformedResponse(format!(
            "unexpected record response: {:?}",
            other
        ))),
    }
}
