pub mod client;
pub mod memory;
pub mod wire;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Domain types — clean model, independent of the row store's wire format
// ---------------------------------------------------------------------------

/// One competitor's score row in one event.
///
/// Rows are created when a competitor registers into an event (score fields
/// zero) and updated in place as judges submit scores and as tie-breaks
/// resolve. The wire-level `placement` column is a write-time mirror of
/// `final_rank` and is deliberately absent here — it is never read back as a
/// second source of truth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitorScore {
    /// Score row id, store-assigned.
    pub id: String,
    /// The competitor/participant entity this row scores (distinct from `id`).
    pub competitor_id: String,
    pub name: String,
    /// Aggregate judge score; source of truth for initial ranking.
    pub total_score: f64,
    /// Individual judge scores, kept for display and audit only.
    pub judge_scores: Option<[f64; 3]>,
    /// Competition rank derived from `total_score`. Ties share a rank.
    pub rank: Option<u32>,
    /// The rank persisted as authoritative after a tie-break resolution.
    pub final_rank: Option<u32>,
    pub medal: Option<Medal>,
    /// Seasonal points earned from (tournament class, final rank, field size).
    pub points: u32,
    pub tie_break: TieBreakStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CompetitorScore {
    /// Whether this row has been through a tie-break (selected or not).
    pub fn has_tie_break(&self) -> bool {
        self.tie_break.is_set()
    }
}

/// Per-competitor tie-break state.
///
/// `Unset` means the row has never been through a tie-break. `Selected`
/// records the operator-chosen order among the tie-break winners (1-based).
/// The string forms stored by the backend (`"selected_2"`, `"unselected"`)
/// exist only at the wire boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TieBreakStatus {
    #[default]
    Unset,
    Unselected,
    Selected {
        order: u32,
    },
}

impl TieBreakStatus {
    /// True for any state other than `Unset`.
    pub fn is_set(&self) -> bool {
        !matches!(self, TieBreakStatus::Unset)
    }

    pub fn selected_order(&self) -> Option<u32> {
        match self {
            TieBreakStatus::Selected { order } => Some(*order),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    /// Medal for a final rank: 1–3 earn one, everything below none.
    pub fn from_rank(final_rank: u32) -> Option<Self> {
        match final_rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Medal::Gold => "🥇",
            Medal::Silver => "🥈",
            Medal::Bronze => "🥉",
        }
    }
}

/// Competition tier, determining the points schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentClass {
    AAA,
    AA,
    A,
    B,
    C,
}

impl TournamentClass {
    /// Parse a stored class label.
    ///
    /// Labels may be composite ("AA - Nationals"); the leading token is
    /// extracted and upper-cased before lookup, so parsing its own output is
    /// a no-op. Empty or unrecognized input yields `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let token = label
            .split(|c: char| c == '-' || c.is_whitespace())
            .find(|t| !t.is_empty())?;
        match token.to_ascii_uppercase().as_str() {
            "AAA" => Some(TournamentClass::AAA),
            "AA" => Some(TournamentClass::AA),
            "A" => Some(TournamentClass::A),
            "B" => Some(TournamentClass::B),
            "C" => Some(TournamentClass::C),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TournamentClass::AAA => "AAA",
            TournamentClass::AA => "AA",
            TournamentClass::A => "A",
            TournamentClass::B => "B",
            TournamentClass::C => "C",
        }
    }
}

/// Aggregate three judge scores into a row's `total_score`.
///
/// Sum, rounded to one decimal so entry and recomputation agree.
pub fn total_of(judges: [f64; 3]) -> f64 {
    let sum: f64 = judges.iter().sum();
    (sum * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Row updates
// ---------------------------------------------------------------------------

/// Tri-state change to one column: leave it alone, null it out, or set it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Field::Keep)
    }
}

/// A partial update to one score row.
///
/// Built through the setter methods only: `final_rank` and the wire-level
/// `placement` mirror always change together, so a coordinator write cannot
/// make them diverge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreUpdate {
    pub(crate) rank: Field<u32>,
    pub(crate) final_rank: Field<u32>,
    pub(crate) placement: Field<u32>,
    pub(crate) medal: Field<Medal>,
    pub(crate) points: Field<u32>,
    pub(crate) tie_break: Field<TieBreakStatus>,
}

impl ScoreUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rank(mut self, rank: u32) -> Self {
        self.rank = Field::Set(rank);
        self
    }

    /// Set the authoritative final rank. Writes `placement` to the same value.
    pub fn final_placement(mut self, final_rank: u32) -> Self {
        self.final_rank = Field::Set(final_rank);
        self.placement = Field::Set(final_rank);
        self
    }

    /// Null out the final rank and its `placement` mirror together.
    pub fn clear_final_placement(mut self) -> Self {
        self.final_rank = Field::Clear;
        self.placement = Field::Clear;
        self
    }

    pub fn medal(mut self, medal: Option<Medal>) -> Self {
        self.medal = match medal {
            Some(m) => Field::Set(m),
            None => Field::Clear,
        };
        self
    }

    pub fn points(mut self, points: u32) -> Self {
        self.points = Field::Set(points);
        self
    }

    pub fn clear_points(mut self) -> Self {
        self.points = Field::Clear;
        self
    }

    pub fn tie_break(mut self, status: TieBreakStatus) -> Self {
        self.tie_break = Field::Set(status);
        self
    }

    pub fn clear_tie_break(mut self) -> Self {
        self.tie_break = Field::Clear;
        self
    }

    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.rank.is_keep()
            && self.final_rank.is_keep()
            && self.placement.is_keep()
            && self.medal.is_keep()
            && self.points.is_keep()
            && self.tie_break.is_keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_parse_extracts_leading_token() {
        assert_eq!(TournamentClass::parse("AA - Nationals"), Some(TournamentClass::AA));
        assert_eq!(TournamentClass::parse("aaa"), Some(TournamentClass::AAA));
        assert_eq!(TournamentClass::parse("  b regional"), Some(TournamentClass::B));
    }

    #[test]
    fn class_parse_is_idempotent() {
        for label in ["AAA", "AA", "A", "B", "C"] {
            let class = TournamentClass::parse(label).unwrap();
            assert_eq!(TournamentClass::parse(class.label()), Some(class));
        }
    }

    #[test]
    fn class_parse_rejects_unknown_and_empty() {
        assert_eq!(TournamentClass::parse(""), None);
        assert_eq!(TournamentClass::parse("   "), None);
        assert_eq!(TournamentClass::parse("D - Open"), None);
    }

    #[test]
    fn medal_from_rank_covers_podium_only() {
        assert_eq!(Medal::from_rank(1), Some(Medal::Gold));
        assert_eq!(Medal::from_rank(2), Some(Medal::Silver));
        assert_eq!(Medal::from_rank(3), Some(Medal::Bronze));
        assert_eq!(Medal::from_rank(4), None);
        assert_eq!(Medal::from_rank(0), None);
    }

    #[test]
    fn judge_total_rounds_to_one_decimal() {
        assert_eq!(total_of([9.1, 9.2, 9.3]), 27.6);
        assert_eq!(total_of([8.05, 8.05, 8.0]), 24.1);
    }

    #[test]
    fn final_placement_moves_both_columns() {
        let update = ScoreUpdate::new().final_placement(2);
        assert_eq!(update.final_rank, Field::Set(2));
        assert_eq!(update.placement, Field::Set(2));

        let cleared = ScoreUpdate::new().clear_final_placement();
        assert_eq!(cleared.final_rank, Field::Clear);
        assert_eq!(cleared.placement, Field::Clear);
    }
}
