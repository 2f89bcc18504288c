use crate::points::points_for;
use crate::ranking::{self, PODIUM_SIZE, TieGroup};
use log::warn;
use serde_json::Value;
use shiai_store::{CompetitorScore, Medal, TieBreakStatus, TournamentClass};
use std::fmt;

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Tie groups that intersect the podium, best score first.
///
/// The scan walks the standings downward and stops once the running
/// competitor count passes the podium; a group straddling the rank-3
/// boundary is still included because its starting rank is inside it.
pub fn podium_tie_groups(scores: &[CompetitorScore]) -> Vec<TieGroup> {
    let mut podium = Vec::new();
    for group in ranking::tie_groups(scores) {
        if group.rank > PODIUM_SIZE {
            break;
        }
        podium.push(group);
    }
    podium
}

/// Podium tie groups where at least one member has never been through a
/// tie-break. These are the groups the operator still has to resolve.
pub fn unresolved_podium_groups(scores: &[CompetitorScore]) -> Vec<TieGroup> {
    podium_tie_groups(scores)
        .into_iter()
        .filter(|group| !group_resolved(scores, group))
        .collect()
}

/// One resolved/unresolved flag per podium tie group, best score first.
pub fn group_resolution_flags(scores: &[CompetitorScore]) -> Vec<bool> {
    podium_tie_groups(scores)
        .iter()
        .map(|group| group_resolved(scores, group))
        .collect()
}

/// Whether any podium competitor carries a recorded winner order. Drives the
/// "redo tie-break" affordance: something was resolved here before.
pub fn has_resolved_podium_ties(scores: &[CompetitorScore]) -> bool {
    ranking::compute_ranks(scores).iter().any(|s| {
        s.rank.is_some_and(|r| r <= PODIUM_SIZE)
            && matches!(s.tie_break, TieBreakStatus::Selected { .. })
    })
}

fn group_resolved(scores: &[CompetitorScore], group: &TieGroup) -> bool {
    group.member_ids.iter().all(|id| {
        scores
            .iter()
            .find(|s| &s.id == id)
            .is_some_and(|s| s.tie_break.is_set())
    })
}

// ---------------------------------------------------------------------------
// Winner references
// ---------------------------------------------------------------------------

/// An operator-supplied winner pick.
///
/// UI layers hand these over either as raw score-row id strings or as JSON
/// objects carrying the id under `id`/`score_id`/`scoreId`; both forms
/// resolve to the same reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerRef(String);

impl WinnerRef {
    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Object(map) => ["id", "score_id", "scoreId"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(|s| Self(s.to_owned())),
            _ => None,
        }
    }
}

impl From<&str> for WinnerRef {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for WinnerRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Extract winner references from raw UI input, dropping malformed entries.
pub fn winner_refs(values: &[Value]) -> Vec<WinnerRef> {
    values
        .iter()
        .filter_map(|value| {
            let parsed = WinnerRef::from_value(value);
            if parsed.is_none() {
                warn!("ignoring malformed winner reference: {value}");
            }
            parsed
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// None of the supplied winner references matched a member of the group.
    NoMatchedWinners,
    /// Fewer than two members — there is no tie to break.
    NotATie,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoMatchedWinners => {
                write!(f, "no winner reference matched a tie-group member")
            }
            ResolveError::NotATie => write!(f, "tie group needs at least two members"),
        }
    }
}

/// Resolve one tie group with the operator's winner order.
///
/// Winners receive consecutive final ranks starting at the group's shared
/// rank, in the chosen order; the remaining members continue the sequence in
/// their pre-existing relative order as `Unselected`. Medals and points
/// derive from each assigned final rank. Unmatched or duplicate winner
/// references are logged and skipped; a winner list that matches nothing is
/// an error so callers can report the no-op.
///
/// The working copy is cleared to its pre-tie-break state before anything is
/// assigned, so re-resolving an already-resolved group can never compound
/// earlier final ranks. Callers persisting the result must still await the
/// persisted reset of the group before writing (see `flow`).
pub fn resolve_tie(
    members: &[CompetitorScore],
    winners: &[WinnerRef],
    class: Option<TournamentClass>,
    field_size: u32,
) -> Result<Vec<CompetitorScore>, ResolveError> {
    if members.len() < 2 {
        return Err(ResolveError::NotATie);
    }
    let base_rank = members.iter().filter_map(|m| m.rank).min().unwrap_or(1);

    let mut resolved: Vec<CompetitorScore> =
        members.iter().cloned().map(clear_resolution).collect();

    // Winner order as indices into the group, bad references dropped.
    let mut order: Vec<usize> = Vec::new();
    for winner in winners {
        match resolved.iter().position(|m| m.id == winner.id()) {
            Some(idx) if !order.contains(&idx) => order.push(idx),
            Some(_) => warn!("duplicate winner reference {}; ignoring", winner.id()),
            None => warn!("winner reference {} is not in the tie group; skipping", winner.id()),
        }
    }
    if order.is_empty() {
        return Err(ResolveError::NoMatchedWinners);
    }

    let mut next_rank = base_rank;
    for (position, &idx) in order.iter().enumerate() {
        let status = TieBreakStatus::Selected { order: position as u32 + 1 };
        assign(&mut resolved[idx], next_rank, status, class, field_size);
        next_rank += 1;
    }
    for idx in 0..resolved.len() {
        if order.contains(&idx) {
            continue;
        }
        assign(&mut resolved[idx], next_rank, TieBreakStatus::Unselected, class, field_size);
        next_rank += 1;
    }

    Ok(resolved)
}

fn clear_resolution(mut score: CompetitorScore) -> CompetitorScore {
    score.final_rank = None;
    score.medal = None;
    score.points = 0;
    score.tie_break = TieBreakStatus::Unset;
    score
}

fn assign(
    score: &mut CompetitorScore,
    final_rank: u32,
    status: TieBreakStatus,
    class: Option<TournamentClass>,
    field_size: u32,
) {
    score.final_rank = Some(final_rank);
    score.medal = Medal::from_rank(final_rank);
    score.points = points_for(class, final_rank, field_size);
    score.tie_break = status;
}
