use crate::points::points_for;
use futures_util::future::join_all;
use log::{debug, error};
use shiai_store::client::{ScoreStore, StoreError};
use shiai_store::{CompetitorScore, Medal, ScoreUpdate, TournamentClass};

/// One pending write against a score row.
///
/// Built only through the constructors below, which keep the wire-level
/// `placement` mirror welded to `final_rank`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub id: String,
    pub fields: ScoreUpdate,
}

impl RowUpdate {
    /// Write-through of one resolved member: final rank, its `placement`
    /// mirror, medal, points, and tie-break status. `None` when the score
    /// has no final rank to write.
    pub fn placement(score: &CompetitorScore) -> Option<Self> {
        let final_rank = score.final_rank?;
        Some(Self {
            id: score.id.clone(),
            fields: ScoreUpdate::new()
                .final_placement(final_rank)
                .medal(score.medal)
                .points(score.points)
                .tie_break(score.tie_break.clone()),
        })
    }

    /// Clear a row back to its pre-tie-break state.
    pub fn reset(score_id: &str) -> Self {
        Self {
            id: score_id.to_owned(),
            fields: ScoreUpdate::new()
                .clear_final_placement()
                .medal(None)
                .clear_points()
                .clear_tie_break(),
        }
    }

    /// Fresh standing for an untied row after a roster change: the computed
    /// rank is authoritative, so it is written as the final placement too.
    pub fn standing(
        score_id: &str,
        rank: u32,
        class: Option<TournamentClass>,
        field_size: u32,
    ) -> Self {
        Self {
            id: score_id.to_owned(),
            fields: ScoreUpdate::new()
                .rank(rank)
                .final_placement(rank)
                .medal(Medal::from_rank(rank))
                .points(points_for(class, rank, field_size)),
        }
    }

    /// Fresh standing for a still-tied row after a roster change: the shared
    /// rank is written and any stale resolution is cleared, pending a new
    /// operator tie-break.
    pub fn tied_standing(score_id: &str, rank: u32) -> Self {
        Self {
            id: score_id.to_owned(),
            fields: ScoreUpdate::new()
                .rank(rank)
                .clear_final_placement()
                .medal(None)
                .clear_points()
                .clear_tie_break(),
        }
    }
}

/// A row the store refused, with the underlying error.
#[derive(Debug)]
pub struct RowFailure {
    pub id: String,
    pub error: StoreError,
}

/// Aggregate result of one persistence batch.
///
/// Absence of a row from `failures` is the only evidence that its write
/// landed; rows that succeeded are never rolled back when siblings fail.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub failures: Vec<RowFailure>,
}

impl PersistOutcome {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write a batch of row updates.
///
/// Writes are dispatched concurrently — the store offers no multi-row
/// transaction — and the batch settles completely before reporting, so a
/// caller awaiting this call holds the ordering invariant between
/// consecutive batches. Per-row failures are collected, never swallowed.
pub async fn persist_updates<S: ScoreStore>(store: &S, updates: &[RowUpdate]) -> PersistOutcome {
    let results = join_all(updates.iter().map(|update| async move {
        (update.id.clone(), store.update_score_row(&update.id, &update.fields).await)
    }))
    .await;

    let mut failures = Vec::new();
    for (id, result) in results {
        if let Err(err) = result {
            error!("score row {id} update failed: {err}");
            failures.push(RowFailure { id, error: err });
        }
    }
    debug!(
        "persisted {}/{} row(s)",
        updates.len() - failures.len(),
        updates.len()
    );
    PersistOutcome { failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiai_store::TieBreakStatus;
    use shiai_store::memory::MemoryStore;

    fn entrant(id: &str, total: f64) -> CompetitorScore {
        CompetitorScore {
            id: id.to_owned(),
            competitor_id: format!("c-{id}"),
            name: id.to_owned(),
            total_score: total,
            ..Default::default()
        }
    }

    fn resolved(id: &str, final_rank: u32, points: u32, order: u32) -> CompetitorScore {
        CompetitorScore {
            final_rank: Some(final_rank),
            medal: Medal::from_rank(final_rank),
            points,
            tie_break: TieBreakStatus::Selected { order },
            ..entrant(id, 27.0)
        }
    }

    #[tokio::test]
    async fn placement_always_mirrors_final_rank() {
        let store = MemoryStore::new();
        for id in ["s-1", "s-2"] {
            store.insert_score("ev", entrant(id, 27.0));
        }
        let updates = [
            RowUpdate::placement(&resolved("s-1", 1, 20, 1)).unwrap(),
            RowUpdate::placement(&resolved("s-2", 2, 15, 2)).unwrap(),
        ];
        let outcome = persist_updates(&store, &updates).await;
        assert!(outcome.success());

        for row in store.rows("ev") {
            assert_eq!(row.placement, row.score.final_rank);
        }
    }

    #[tokio::test]
    async fn partial_failure_reports_only_the_failed_row() {
        let store = MemoryStore::new();
        for id in ["s-1", "s-2", "s-3"] {
            store.insert_score("ev", entrant(id, 27.0));
        }
        store.fail_updates_for("s-2");

        let updates: Vec<RowUpdate> = [("s-1", 1u32), ("s-2", 2), ("s-3", 3)]
            .iter()
            .map(|&(id, rank)| RowUpdate::placement(&resolved(id, rank, 0, rank)).unwrap())
            .collect();
        let outcome = persist_updates(&store, &updates).await;

        assert!(!outcome.success());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id, "s-2");

        // The siblings landed and stay landed.
        assert_eq!(store.row("s-1").unwrap().score.final_rank, Some(1));
        assert_eq!(store.row("s-3").unwrap().score.final_rank, Some(3));
        assert_eq!(store.row("s-2").unwrap().score.final_rank, None);
    }

    #[tokio::test]
    async fn reset_clears_every_tie_break_column() {
        let store = MemoryStore::new();
        store.insert_score("ev", resolved("s-1", 1, 20, 1));

        let outcome = persist_updates(&store, &[RowUpdate::reset("s-1")]).await;
        assert!(outcome.success());

        let row = store.row("s-1").unwrap();
        assert_eq!(row.score.final_rank, None);
        assert_eq!(row.placement, None);
        assert_eq!(row.score.medal, None);
        assert_eq!(row.score.points, 0);
        assert_eq!(row.score.tie_break, TieBreakStatus::Unset);
    }

    #[test]
    fn placement_update_requires_a_final_rank() {
        assert!(RowUpdate::placement(&entrant("s-1", 27.0)).is_none());
    }

    #[tokio::test]
    async fn empty_batch_succeeds_trivially() {
        let store = MemoryStore::new();
        let outcome = persist_updates(&store, &[]).await;
        assert!(outcome.success());
    }
}
