use shiai_store::CompetitorScore;

/// Competitors sharing one score at one rank. Derived on every load, never
/// persisted; only groups of two or more exist.
#[derive(Debug, Clone, PartialEq)]
pub struct TieGroup {
    /// The competition rank all members share.
    pub rank: u32,
    /// The shared total score.
    pub score: f64,
    /// Score row ids of the members, in standings order.
    pub member_ids: Vec<String>,
}

impl TieGroup {
    /// Whether the group starts inside the podium (ranks 1–3). A group
    /// straddling the rank-3 boundary still counts.
    pub fn is_podium(&self) -> bool {
        self.rank <= PODIUM_SIZE
    }
}

pub const PODIUM_SIZE: u32 = 3;

/// Score used for ordering: non-finite and negative values count as zero.
pub(crate) fn effective_score(total: f64) -> f64 {
    if total.is_finite() && total > 0.0 { total } else { 0.0 }
}

/// Standard competition ranking over a copy of the input.
///
/// Sorted best score first; equal scores share a rank; the next distinct
/// score's rank is one plus the number of competitors strictly ahead of it
/// ([90, 90, 80] ranks as [1, 1, 3]). Pure — callers re-run this from
/// source rows on every load rather than trusting stored rank state.
pub fn compute_ranks(scores: &[CompetitorScore]) -> Vec<CompetitorScore> {
    let mut ranked = scores.to_vec();
    // Stable: equal scores keep their incoming relative order.
    ranked.sort_by(|a, b| effective_score(b.total_score).total_cmp(&effective_score(a.total_score)));

    let mut current_rank = 0;
    let mut last_score = f64::NAN;
    for (position, row) in ranked.iter_mut().enumerate() {
        let score = effective_score(row.total_score);
        if score != last_score {
            current_rank = position as u32 + 1;
            last_score = score;
        }
        row.rank = Some(current_rank);
    }
    ranked
}

/// All tie groups in the standings, best score first.
pub fn tie_groups(scores: &[CompetitorScore]) -> Vec<TieGroup> {
    let ranked = compute_ranks(scores);
    let mut groups = Vec::new();

    let mut start = 0;
    while start < ranked.len() {
        let rank = ranked[start].rank.unwrap_or(start as u32 + 1);
        let mut end = start + 1;
        while end < ranked.len() && ranked[end].rank == ranked[start].rank {
            end += 1;
        }
        if end - start >= 2 {
            groups.push(TieGroup {
                rank,
                score: effective_score(ranked[start].total_score),
                member_ids: ranked[start..end].iter().map(|s| s.id.clone()).collect(),
            });
        }
        start = end;
    }
    groups
}
