use crate::persist::{self, PersistOutcome, RowUpdate};
use crate::ranking::{self, TieGroup};
use crate::tiebreak::{self, ResolveError, WinnerRef};
use log::{debug, warn};
use shiai_store::client::{ScoreStore, StoreError};
use shiai_store::{CompetitorScore, TournamentClass};
use std::collections::HashSet;
use std::fmt;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Debug)]
pub enum FlowError {
    Store(StoreError),
    /// No tie group shares the requested rank in the current standings.
    GroupNotFound { rank: u32 },
    Resolve(ResolveError),
    /// The reset batch for a redo left rows unwritten; resolution was not
    /// started. Retry the whole tie-break rather than resuming.
    ResetIncomplete(PersistOutcome),
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::Store(e) => write!(f, "store error: {e}"),
            FlowError::GroupNotFound { rank } => {
                write!(f, "no tie group at rank {rank} in the current standings")
            }
            FlowError::Resolve(e) => write!(f, "tie-break not applied: {e}"),
            FlowError::ResetIncomplete(outcome) => write!(
                f,
                "tie-break reset left {} row(s) unwritten",
                outcome.failures.len()
            ),
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(e: StoreError) -> Self {
        FlowError::Store(e)
    }
}

impl From<ResolveError> for FlowError {
    fn from(e: ResolveError) -> Self {
        FlowError::Resolve(e)
    }
}

/// Event standings as derived from the store on one load.
#[derive(Debug, Clone)]
pub struct Standings {
    /// All score rows, best first, with freshly computed ranks.
    pub scores: Vec<CompetitorScore>,
    pub tie_groups: Vec<TieGroup>,
    /// Podium tie groups still awaiting an operator decision.
    pub unresolved_podium: Vec<TieGroup>,
    /// Whether a prior podium tie-break exists to redo.
    pub can_redo: bool,
}

/// Result of one tie-break action: what was computed, and how the writes went.
#[derive(Debug)]
pub struct TieBreakReport {
    pub resolved: Vec<CompetitorScore>,
    pub outcome: PersistOutcome,
}

// ---------------------------------------------------------------------------
// Scoring flow
// ---------------------------------------------------------------------------

/// The single entry point UI event handlers call into.
///
/// One instance per injected store; all rank state is re-derived from the
/// store on every call, so two operators editing the same event converge on
/// whatever the rows say after their last writes (last-write-wins per row).
/// Callers are expected to reload standings after any mutating call instead
/// of trusting in-memory results.
#[derive(Debug)]
pub struct ScoringService<S> {
    store: S,
}

impl<S: ScoreStore> ScoringService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load an event's standings, recomputing ranks and tie groups from the
    /// score rows.
    pub async fn load_standings(&self, event_id: &str) -> FlowResult<Standings> {
        let rows = self.store.fetch_scores(event_id).await?;
        debug!("loaded {} score row(s) for event {event_id}", rows.len());
        Ok(Standings {
            scores: ranking::compute_ranks(&rows),
            tie_groups: ranking::tie_groups(&rows),
            unresolved_podium: tiebreak::unresolved_podium_groups(&rows),
            can_redo: tiebreak::has_resolved_podium_ties(&rows),
        })
    }

    /// Resolve the tie group sharing `group_rank` with the operator's winner
    /// order, and persist the result.
    ///
    /// Redo is implicit: if any member was resolved before, the group is
    /// first reset in the store, and the reset batch must fully land before
    /// any resolve write is issued — a failed reset aborts the action so
    /// final ranks can never compound.
    pub async fn resolve_tie_break(
        &self,
        event_id: &str,
        group_rank: u32,
        winners: &[WinnerRef],
        class_label: &str,
    ) -> FlowResult<TieBreakReport> {
        let class = class_from_label(class_label);
        let rows = self.store.fetch_scores(event_id).await?;
        let ranked = ranking::compute_ranks(&rows);
        let members: Vec<CompetitorScore> = ranked
            .iter()
            .filter(|s| s.rank == Some(group_rank))
            .cloned()
            .collect();
        if members.len() < 2 {
            return Err(FlowError::GroupNotFound { rank: group_rank });
        }

        let resets: Vec<RowUpdate> = members
            .iter()
            .filter(|m| m.final_rank.is_some() || m.tie_break.is_set())
            .map(|m| RowUpdate::reset(&m.id))
            .collect();
        if !resets.is_empty() {
            debug!(
                "resetting {} previously resolved row(s) at rank {group_rank} before redo",
                resets.len()
            );
            let outcome = persist::persist_updates(&self.store, &resets).await;
            if !outcome.success() {
                return Err(FlowError::ResetIncomplete(outcome));
            }
        }

        let field_size = self.store.fetch_participant_count(event_id).await?;
        let resolved = tiebreak::resolve_tie(&members, winners, class, field_size)?;
        let updates: Vec<RowUpdate> =
            resolved.iter().filter_map(RowUpdate::placement).collect();
        let outcome = persist::persist_updates(&self.store, &updates).await;
        Ok(TieBreakReport { resolved, outcome })
    }

    /// Remove a competitor from an event, then recompute and re-persist the
    /// remaining standings — removal can close gaps in the rank sequence.
    ///
    /// Untied rows get their fresh rank written through as the final
    /// placement; rows still tied after the removal have any stale
    /// resolution cleared and wait for a new tie-break.
    pub async fn remove_competitor(
        &self,
        event_id: &str,
        competitor_id: &str,
        class_label: &str,
    ) -> FlowResult<PersistOutcome> {
        let class = class_from_label(class_label);
        self.store.delete_participant(event_id, competitor_id).await?;

        let rows = self.store.fetch_scores(event_id).await?;
        let field_size = self.store.fetch_participant_count(event_id).await?;
        let ranked = ranking::compute_ranks(&rows);
        let tied_ids: HashSet<String> = ranking::tie_groups(&rows)
            .into_iter()
            .flat_map(|g| g.member_ids)
            .collect();

        let updates: Vec<RowUpdate> = ranked
            .iter()
            .filter_map(|s| {
                let rank = s.rank?;
                Some(if tied_ids.contains(&s.id) {
                    RowUpdate::tied_standing(&s.id, rank)
                } else {
                    RowUpdate::standing(&s.id, rank, class, field_size)
                })
            })
            .collect();
        debug!(
            "recomputing {} remaining row(s) for event {event_id} after removing {competitor_id}",
            updates.len()
        );
        Ok(persist::persist_updates(&self.store, &updates).await)
    }
}

/// Parse the event's stored class label, logging the unknown-class case the
/// points table silently zeroes.
fn class_from_label(label: &str) -> Option<TournamentClass> {
    let class = TournamentClass::parse(label);
    if class.is_none() {
        warn!("unknown tournament class label {label:?}; points will be zero");
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiai_store::memory::MemoryStore;
    use shiai_store::{Medal, TieBreakStatus};

    const EVENT: &str = "ev-1";
    const CLASS: &str = "AAA - Nationals";

    fn entrant(id: &str, total: f64) -> CompetitorScore {
        CompetitorScore {
            id: id.to_owned(),
            competitor_id: format!("c-{id}"),
            name: id.to_owned(),
            total_score: total,
            ..Default::default()
        }
    }

    fn seeded() -> ScoringService<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_score(EVENT, entrant("s-lead", 27.5));
        store.insert_score(EVENT, entrant("s-a", 26.0));
        store.insert_score(EVENT, entrant("s-b", 26.0));
        store.insert_score(EVENT, entrant("s-c", 26.0));
        ScoringService::new(store)
    }

    #[tokio::test]
    async fn standings_recompute_ranks_from_scores() {
        let store = MemoryStore::new();
        // Stored rank state is stale on purpose; only totals matter.
        store.insert_score(EVENT, CompetitorScore { rank: Some(99), ..entrant("s-1", 24.0) });
        store.insert_score(EVENT, CompetitorScore { rank: Some(1), ..entrant("s-2", 26.0) });
        let service = ScoringService::new(store);

        let standings = service.load_standings(EVENT).await.unwrap();
        assert_eq!(standings.scores[0].id, "s-2");
        assert_eq!(standings.scores[0].rank, Some(1));
        assert_eq!(standings.scores[1].rank, Some(2));
        assert!(standings.tie_groups.is_empty());
        assert!(!standings.can_redo);
    }

    #[tokio::test]
    async fn standings_surface_unresolved_podium_ties() {
        let service = seeded();
        let standings = service.load_standings(EVENT).await.unwrap();
        assert_eq!(standings.unresolved_podium.len(), 1);
        assert_eq!(standings.unresolved_podium[0].rank, 2);
        assert_eq!(
            standings.unresolved_podium[0].member_ids,
            vec!["s-a", "s-b", "s-c"]
        );
    }

    #[tokio::test]
    async fn resolve_writes_ranks_points_and_mirror() {
        let service = seeded();
        let winners = [WinnerRef::from("s-b"), WinnerRef::from("s-a")];
        let report = service
            .resolve_tie_break(EVENT, 2, &winners, CLASS)
            .await
            .unwrap();
        assert!(report.outcome.success());

        let row = |id: &str| service.store.row(id).unwrap();
        assert_eq!(row("s-b").score.final_rank, Some(2));
        assert_eq!(row("s-b").score.points, 15);
        assert_eq!(row("s-b").score.medal, Some(Medal::Silver));
        assert_eq!(row("s-b").score.tie_break, TieBreakStatus::Selected { order: 1 });
        assert_eq!(row("s-a").score.final_rank, Some(3));
        assert_eq!(row("s-a").score.points, 10);
        assert_eq!(row("s-c").score.final_rank, Some(4));
        assert_eq!(row("s-c").score.points, 0);
        assert_eq!(row("s-c").score.tie_break, TieBreakStatus::Unselected);

        for id in ["s-a", "s-b", "s-c"] {
            let stored = row(id);
            assert_eq!(stored.placement, stored.score.final_rank);
        }

        let standings = service.load_standings(EVENT).await.unwrap();
        assert!(standings.unresolved_podium.is_empty());
        assert!(standings.can_redo);
    }

    #[tokio::test]
    async fn redo_matches_a_fresh_resolution() {
        let service = seeded();
        let first = [WinnerRef::from("s-a"), WinnerRef::from("s-b")];
        service.resolve_tie_break(EVENT, 2, &first, CLASS).await.unwrap();

        let redo = [WinnerRef::from("s-b"), WinnerRef::from("s-a")];
        service.resolve_tie_break(EVENT, 2, &redo, CLASS).await.unwrap();

        let fresh = seeded();
        fresh.resolve_tie_break(EVENT, 2, &redo, CLASS).await.unwrap();

        for id in ["s-a", "s-b", "s-c"] {
            let redone = service.store.row(id).unwrap();
            let baseline = fresh.store.row(id).unwrap();
            assert_eq!(redone.score.final_rank, baseline.score.final_rank, "row {id}");
            assert_eq!(redone.score.points, baseline.score.points, "row {id}");
            assert_eq!(redone.score.tie_break, baseline.score.tie_break, "row {id}");
        }
    }

    #[tokio::test]
    async fn failed_reset_aborts_the_redo() {
        let service = seeded();
        let first = [WinnerRef::from("s-a"), WinnerRef::from("s-b")];
        service.resolve_tie_break(EVENT, 2, &first, CLASS).await.unwrap();

        service.store.fail_updates_for("s-b");
        let redo = [WinnerRef::from("s-c")];
        let err = service
            .resolve_tie_break(EVENT, 2, &redo, CLASS)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ResetIncomplete(_)), "got {err}");

        // The sibling resets landed (no rollback), but no resolve write was
        // issued: nothing in the group carries a fresh selection.
        let cleared = service.store.row("s-c").unwrap();
        assert_eq!(cleared.score.final_rank, None);
        assert_eq!(cleared.score.tie_break, TieBreakStatus::Unset);
        let failed = service.store.row("s-b").unwrap();
        assert_eq!(failed.score.tie_break, TieBreakStatus::Selected { order: 2 });
    }

    #[tokio::test]
    async fn missing_group_and_empty_winners_are_reported() {
        let service = seeded();
        let err = service
            .resolve_tie_break(EVENT, 1, &[WinnerRef::from("s-lead")], CLASS)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::GroupNotFound { rank: 1 }), "got {err}");

        let err = service.resolve_tie_break(EVENT, 2, &[], CLASS).await.unwrap_err();
        assert!(
            matches!(err, FlowError::Resolve(ResolveError::NoMatchedWinners)),
            "got {err}"
        );
    }

    #[tokio::test]
    async fn removal_recomputes_the_remaining_standings() {
        let store = MemoryStore::new();
        store.insert_score(EVENT, entrant("s-1", 27.0));
        store.insert_score(EVENT, entrant("s-2", 26.0));
        store.insert_score(EVENT, entrant("s-3", 26.0));
        store.insert_score(EVENT, entrant("s-4", 25.0));
        let service = ScoringService::new(store);

        // Removing the leader promotes the tied pair to rank 1.
        let outcome = service.remove_competitor(EVENT, "c-s-1", CLASS).await.unwrap();
        assert!(outcome.success());

        let row = |id: &str| service.store.row(id).unwrap();
        assert_eq!(row("s-2").score.rank, Some(1));
        assert_eq!(row("s-2").score.final_rank, None, "tied rows await a tie-break");
        assert_eq!(row("s-3").score.rank, Some(1));
        assert_eq!(row("s-4").score.rank, Some(3));
        assert_eq!(row("s-4").score.final_rank, Some(3));
        assert_eq!(row("s-4").placement, Some(3));
        assert_eq!(row("s-4").score.medal, Some(Medal::Bronze));
        assert_eq!(row("s-4").score.points, 10);

        let standings = service.load_standings(EVENT).await.unwrap();
        assert_eq!(standings.unresolved_podium.len(), 1);
        assert_eq!(standings.unresolved_podium[0].rank, 1);
    }

    #[tokio::test]
    async fn removal_clears_stale_resolutions_of_still_tied_rows() {
        let store = MemoryStore::new();
        store.insert_score(EVENT, entrant("s-1", 27.0));
        store.insert_score(EVENT, entrant("s-2", 26.0));
        store.insert_score(EVENT, entrant("s-3", 26.0));
        let service = ScoringService::new(store);

        let winners = [WinnerRef::from("s-2")];
        service.resolve_tie_break(EVENT, 2, &winners, CLASS).await.unwrap();
        assert_eq!(service.store.row("s-2").unwrap().score.final_rank, Some(2));

        // s-2 and s-3 stay tied after the removal; their old resolution is
        // for a rank that no longer exists.
        service.remove_competitor(EVENT, "c-s-1", CLASS).await.unwrap();
        let row = service.store.row("s-2").unwrap();
        assert_eq!(row.score.rank, Some(1));
        assert_eq!(row.score.final_rank, None);
        assert_eq!(row.score.tie_break, TieBreakStatus::Unset);
    }
}
