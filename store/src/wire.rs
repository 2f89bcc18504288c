/// Row-store wire types — serde shapes for the hosted row store's REST rows.
/// These map to the clean domain types via the mapping fns in client.rs.
use crate::{Field, Medal, ScoreUpdate, TieBreakStatus};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// A raw score row as returned by the store.
///
/// Every column is optional; rows written by older app versions can miss any
/// of them. Rank columns arrive as arbitrary JSON because legacy rows carry
/// ordinal strings ("1st") where newer rows carry numbers.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ScoreRow {
    pub id: Option<String>,
    pub event_id: Option<String>,
    pub competitor_id: Option<String>,
    pub competitor_name: Option<String>,
    pub total_score: Option<f64>,
    pub judge1_score: Option<f64>,
    pub judge2_score: Option<f64>,
    pub judge3_score: Option<f64>,
    pub rank: Option<Value>,
    pub final_rank: Option<Value>,
    /// Write-time mirror of `final_rank`. Deserialized for completeness but
    /// never mapped into the domain model.
    pub placement: Option<Value>,
    pub medal: Option<String>,
    pub points: Option<i64>,
    pub tie_breaker_status: Option<String>,
    pub updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Rank normalization
// ---------------------------------------------------------------------------

/// Coerce a stored rank value into a canonical rank.
///
/// The single gate through which any externally-sourced rank passes before
/// being compared, stored, or displayed:
/// - null/absent → `None`
/// - numbers → floored; zero or below is "no rank", not a valid rank
/// - strings → all non-digit characters stripped, remainder parsed
pub fn normalize_rank(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => {
            let floored = n.as_f64()?.floor();
            if floored >= 1.0 { Some(floored as u32) } else { None }
        }
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            match digits.parse::<u32>() {
                Ok(0) | Err(_) => None,
                Ok(rank) => Some(rank),
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Encode a tie-break status to its stored string form. `Unset` encodes to
/// nothing (the column is nulled).
pub fn encode_status(status: &TieBreakStatus) -> Option<String> {
    match status {
        TieBreakStatus::Unset => None,
        TieBreakStatus::Unselected => Some("unselected".to_owned()),
        TieBreakStatus::Selected { order } => Some(format!("selected_{order}")),
    }
}

/// Decode a stored tie-break status string.
///
/// Legacy rows carry a bare "resolved" marker with no recorded winner order;
/// those decode as `Unselected` (been through a tie-break, order unknown).
/// Anything else unrecognized decodes as `Unset`.
pub fn decode_status(raw: Option<&str>) -> TieBreakStatus {
    let Some(raw) = raw else {
        return TieBreakStatus::Unset;
    };
    match raw {
        "" => TieBreakStatus::Unset,
        "unselected" => TieBreakStatus::Unselected,
        "resolved" => TieBreakStatus::Unselected,
        _ => match raw.strip_prefix("selected_").and_then(|k| k.parse::<u32>().ok()) {
            Some(order) if order >= 1 => TieBreakStatus::Selected { order },
            _ => {
                debug!("unrecognized tie-break status {raw:?}; treating as unset");
                TieBreakStatus::Unset
            }
        },
    }
}

/// Encode a medal to the display glyph the store keeps.
pub fn encode_medal(medal: Medal) -> &'static str {
    medal.glyph()
}

/// Decode a stored medal column. Accepts glyphs and legacy word forms.
pub fn decode_medal(raw: Option<&str>) -> Option<Medal> {
    match raw?.trim() {
        "🥇" => Some(Medal::Gold),
        "🥈" => Some(Medal::Silver),
        "🥉" => Some(Medal::Bronze),
        other => match other.to_ascii_lowercase().as_str() {
            "gold" => Some(Medal::Gold),
            "silver" => Some(Medal::Silver),
            "bronze" => Some(Medal::Bronze),
            _ => None,
        },
    }
}

// ---------------------------------------------------------------------------
// Patch bodies
// ---------------------------------------------------------------------------

/// Render a `ScoreUpdate` as a PATCH body: kept columns are omitted, cleared
/// columns become JSON null.
pub fn update_body(update: &ScoreUpdate) -> Map<String, Value> {
    let mut body = Map::new();
    put_u32(&mut body, "rank", &update.rank);
    put_u32(&mut body, "final_rank", &update.final_rank);
    put_u32(&mut body, "placement", &update.placement);
    match &update.medal {
        Field::Keep => {}
        Field::Clear => {
            body.insert("medal".to_owned(), Value::Null);
        }
        Field::Set(medal) => {
            body.insert("medal".to_owned(), Value::from(encode_medal(*medal)));
        }
    }
    put_u32(&mut body, "points", &update.points);
    match &update.tie_break {
        Field::Keep => {}
        Field::Clear => {
            body.insert("tie_breaker_status".to_owned(), Value::Null);
        }
        Field::Set(status) => {
            let encoded = encode_status(status).map(Value::from).unwrap_or(Value::Null);
            body.insert("tie_breaker_status".to_owned(), encoded);
        }
    }
    body
}

fn put_u32(body: &mut Map<String, Value>, key: &str, field: &Field<u32>) {
    match field {
        Field::Keep => {}
        Field::Clear => {
            body.insert(key.to_owned(), Value::Null);
        }
        Field::Set(v) => {
            body.insert(key.to_owned(), Value::from(*v));
        }
    }
}
