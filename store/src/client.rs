use crate::wire::{self, ScoreRow};
use crate::{CompetitorScore, ScoreUpdate};
use chrono::{DateTime, Utc};
use log::warn;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

const SCORES_TABLE: &str = "event_scores";
const ENTRIES_TABLE: &str = "event_entries";

#[derive(Debug)]
pub enum StoreError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    /// The store refused the write (constraint violation, bad filter, stale row).
    Rejected(String),
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            StoreError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            StoreError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            StoreError::Rejected(msg) => write!(f, "Rejected: {msg}"),
            StoreError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// The record store the engine runs against.
///
/// Implemented by [`RestStore`] for the hosted backend and by
/// [`crate::memory::MemoryStore`] for tests. Constructor-injected into the
/// engine so nothing depends on a module-level client.
// Futures here don't need Send bounds: the whole engine runs on a
// single-threaded cooperative scheduler (UI event handlers).
#[allow(async_fn_in_trait)]
pub trait ScoreStore {
    /// All score rows for one event, mapped into the domain model.
    async fn fetch_scores(&self, event_id: &str) -> StoreResult<Vec<CompetitorScore>>;

    /// The event's full roster count — every registered competitor, not just
    /// those with scores. Input to the Class C points schedule.
    async fn fetch_participant_count(&self, event_id: &str) -> StoreResult<u32>;

    /// Partial update of one score row.
    async fn update_score_row(&self, score_id: &str, fields: &ScoreUpdate) -> StoreResult<()>;

    /// Remove a competitor from an event. Callers must follow with a
    /// recompute pass over the remaining rows (removal closes rank gaps).
    async fn delete_participant(&self, event_id: &str, competitor_id: &str) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// REST client
// ---------------------------------------------------------------------------

/// Client for the hosted row store's PostgREST-style endpoints.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("shiai-store/0.1 (tournament scoring)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .timeout(self.timeout)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(&self, url: &str) -> StoreResult<Vec<T>> {
        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Network(e, url.to_owned()))?;

        match response.error_for_status() {
            Ok(res) => res
                .json::<Vec<T>>()
                .await
                .map_err(|e| StoreError::Parsing(e, url.to_owned())),
            Err(e) => Err(StoreError::Api(e, url.to_owned())),
        }
    }
}

impl ScoreStore for RestStore {
    async fn fetch_scores(&self, event_id: &str) -> StoreResult<Vec<CompetitorScore>> {
        let url = format!(
            "{}?event_id=eq.{event_id}&select=*&order=total_score.desc.nullslast",
            self.endpoint(SCORES_TABLE)
        );
        let rows: Vec<ScoreRow> = self.get_rows(&url).await?;
        Ok(rows.into_iter().filter_map(map_score_row).collect())
    }

    async fn fetch_participant_count(&self, event_id: &str) -> StoreResult<u32> {
        let url = format!(
            "{}?event_id=eq.{event_id}&select=id",
            self.endpoint(ENTRIES_TABLE)
        );
        let response = self
            .request(self.client.get(&url))
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .send()
            .await
            .map_err(|e| StoreError::Network(e, url.clone()))?;

        let response = response
            .error_for_status()
            .map_err(|e| StoreError::Api(e, url.clone()))?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        total.ok_or_else(|| StoreError::Other(format!("missing row count in response for {url}")))
    }

    async fn update_score_row(&self, score_id: &str, fields: &ScoreUpdate) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let url = format!("{}?id=eq.{score_id}", self.endpoint(SCORES_TABLE));
        let body = wire::update_body(fields);
        let response = self
            .request(self.client.patch(&url))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e, url.clone()))?;

        match response.error_for_status() {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.status().map(|s| s.is_client_error()).unwrap_or(false) {
                    Err(StoreError::Rejected(format!("update of row {score_id} refused: {e}")))
                } else {
                    Err(StoreError::Api(e, url))
                }
            }
        }
    }

    async fn delete_participant(&self, event_id: &str, competitor_id: &str) -> StoreResult<()> {
        let url = format!(
            "{}?event_id=eq.{event_id}&competitor_id=eq.{competitor_id}",
            self.endpoint(ENTRIES_TABLE)
        );
        let response = self
            .request(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| StoreError::Network(e, url.clone()))?;

        response
            .error_for_status()
            .map(|_| ())
            .map_err(|e| StoreError::Api(e, url))
    }
}

// ---------------------------------------------------------------------------
// Mapping: wire rows → clean domain types
// ---------------------------------------------------------------------------

/// Map one raw row. Rows without both id columns are unusable and skipped;
/// everything else defaults leniently (missing score → 0, bad rank → none).
fn map_score_row(row: ScoreRow) -> Option<CompetitorScore> {
    let (id, competitor_id) = match (row.id, row.competitor_id) {
        (Some(id), Some(competitor_id)) => (id, competitor_id),
        _ => {
            warn!("score row missing id columns; skipping");
            return None;
        }
    };

    let judge_scores = match (row.judge1_score, row.judge2_score, row.judge3_score) {
        (Some(a), Some(b), Some(c)) => Some([a, b, c]),
        _ => None,
    };

    Some(CompetitorScore {
        id,
        competitor_id,
        name: row.competitor_name.unwrap_or_default(),
        total_score: row.total_score.unwrap_or(0.0),
        judge_scores,
        rank: wire::normalize_rank(row.rank.as_ref()),
        final_rank: wire::normalize_rank(row.final_rank.as_ref()),
        medal: wire::decode_medal(row.medal.as_deref()),
        points: row.points.unwrap_or(0).max(0) as u32,
        tie_break: wire::decode_status(row.tie_breaker_status.as_deref()),
        updated_at: row
            .updated_at
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// Extract the total from a `Content-Range` header ("0-0/57" or "*/57").
fn parse_content_range_total(header: &str) -> Option<u32> {
    header.rsplit('/').next()?.trim().parse().ok()
}
