use crate::client::{ScoreStore, StoreError, StoreResult};
use crate::{CompetitorScore, Field, ScoreUpdate};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory [`ScoreStore`] for tests and offline use.
///
/// Update semantics mirror the REST PATCH exactly: kept columns are
/// untouched, cleared columns are nulled, and the `placement` mirror is
/// stored separately from `final_rank` so tests can observe that the two
/// never diverge after a coordinator write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// score row id → stored row
    scores: HashMap<String, StoredScore>,
    /// event id → registered competitor ids (the roster, scored or not)
    rosters: HashMap<String, HashSet<String>>,
    /// score row ids whose updates are rejected
    fail_updates: HashSet<String>,
}

/// A stored row plus the wire-only columns the domain model hides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredScore {
    pub event_id: String,
    pub score: CompetitorScore,
    pub placement: Option<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a score row and register its competitor into the event roster.
    pub fn insert_score(&self, event_id: &str, score: CompetitorScore) {
        let mut inner = self.lock();
        inner
            .rosters
            .entry(event_id.to_owned())
            .or_default()
            .insert(score.competitor_id.clone());
        inner.scores.insert(
            score.id.clone(),
            StoredScore { event_id: event_id.to_owned(), score, placement: None },
        );
    }

    /// Register a competitor with no score row yet (counts toward the roster).
    pub fn register_entry(&self, event_id: &str, competitor_id: &str) {
        self.lock()
            .rosters
            .entry(event_id.to_owned())
            .or_default()
            .insert(competitor_id.to_owned());
    }

    /// Make every subsequent update of this row fail.
    pub fn fail_updates_for(&self, score_id: &str) {
        self.lock().fail_updates.insert(score_id.to_owned());
    }

    pub fn row(&self, score_id: &str) -> Option<StoredScore> {
        self.lock().scores.get(score_id).cloned()
    }

    /// All stored rows for an event, in insertion-independent id order.
    pub fn rows(&self, event_id: &str) -> Vec<StoredScore> {
        let inner = self.lock();
        let mut rows: Vec<StoredScore> = inner
            .scores
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.score.id.cmp(&b.score.id));
        rows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScoreStore for MemoryStore {
    async fn fetch_scores(&self, event_id: &str) -> StoreResult<Vec<CompetitorScore>> {
        let inner = self.lock();
        let mut rows: Vec<&StoredScore> = inner
            .scores
            .values()
            .filter(|r| r.event_id == event_id)
            .collect();
        // Stable order, best score first, the way the REST endpoint sorts.
        rows.sort_by(|a, b| {
            b.score
                .total_score
                .total_cmp(&a.score.total_score)
                .then_with(|| a.score.id.cmp(&b.score.id))
        });
        Ok(rows.into_iter().map(|r| r.score.clone()).collect())
    }

    async fn fetch_participant_count(&self, event_id: &str) -> StoreResult<u32> {
        Ok(self.lock().rosters.get(event_id).map(|r| r.len() as u32).unwrap_or(0))
    }

    async fn update_score_row(&self, score_id: &str, fields: &ScoreUpdate) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.fail_updates.contains(score_id) {
            return Err(StoreError::Rejected(format!("injected failure for row {score_id}")));
        }
        let Some(stored) = inner.scores.get_mut(score_id) else {
            return Err(StoreError::Rejected(format!("no score row {score_id}")));
        };

        apply_opt(&fields.rank, &mut stored.score.rank);
        apply_opt(&fields.final_rank, &mut stored.score.final_rank);
        apply_opt(&fields.placement, &mut stored.placement);
        match &fields.medal {
            Field::Keep => {}
            Field::Clear => stored.score.medal = None,
            Field::Set(m) => stored.score.medal = Some(*m),
        }
        match &fields.points {
            Field::Keep => {}
            Field::Clear => stored.score.points = 0,
            Field::Set(p) => stored.score.points = *p,
        }
        match &fields.tie_break {
            Field::Keep => {}
            Field::Clear => stored.score.tie_break = Default::default(),
            Field::Set(s) => stored.score.tie_break = s.clone(),
        }
        Ok(())
    }

    async fn delete_participant(&self, event_id: &str, competitor_id: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(roster) = inner.rosters.get_mut(event_id) {
            roster.remove(competitor_id);
        }
        inner
            .scores
            .retain(|_, r| !(r.event_id == event_id && r.score.competitor_id == competitor_id));
        Ok(())
    }
}

fn apply_opt(field: &Field<u32>, slot: &mut Option<u32>) {
    match field {
        Field::Keep => {}
        Field::Clear => *slot = None,
        Field::Set(v) => *slot = Some(*v),
    }
}
