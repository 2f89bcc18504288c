//! Scoring, ranking, and tie-break engine for martial-arts tournament events.
//!
//! The engine turns a set of competitor score rows into stable competition
//! ranks, surfaces score ties on the podium for an operator to resolve,
//! computes seasonal points, and persists the result back to the record
//! store row by row:
//!
//! 1. [`flow::ScoringService::load_standings`] fetches rows and re-derives
//!    ranks and tie groups from the scores (stored rank state is never
//!    trusted across loads).
//! 2. [`tiebreak`] flags unresolved tie groups within the podium and, once
//!    the operator has picked winners in order, assigns consecutive final
//!    ranks, medals, and points.
//! 3. [`persist`] writes the resolved state back field by field per row,
//!    collecting per-row failures without rolling back rows that succeeded.
//!
//! Ranking and resolution are pure; only the store round-trips are async.
//! The record store is injected via [`store::client::ScoreStore`], so the
//! whole engine runs against the in-memory fake in tests.

pub mod flow;
pub mod persist;
pub mod points;
pub mod ranking;
pub mod tiebreak;

pub use shiai_store as store;
pub use shiai_store::{CompetitorScore, Medal, TieBreakStatus, TournamentClass};
