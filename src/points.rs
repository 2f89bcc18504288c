use shiai_store::TournamentClass;

/// Seasonal points for a final rank.
///
/// Classes AAA through B use fixed podium tables. Class C depends on the
/// field size: small fields award less, and a field of two or fewer awards
/// nothing. Ranks below the podium and unknown classes earn zero — an
/// unknown class is a silent zero, not an error (callers that want to alert
/// on it log at parse time).
pub fn points_for(
    class: Option<TournamentClass>,
    final_rank: u32,
    competitor_count: u32,
) -> u32 {
    let Some(class) = class else { return 0 };
    match class {
        TournamentClass::AAA => podium(final_rank, [20, 15, 10]),
        TournamentClass::AA => podium(final_rank, [15, 10, 8]),
        TournamentClass::A => podium(final_rank, [8, 5, 2]),
        TournamentClass::B => podium(final_rank, [5, 3, 1]),
        TournamentClass::C => class_c(final_rank, competitor_count),
    }
}

fn podium(final_rank: u32, table: [u32; 3]) -> u32 {
    match final_rank {
        1..=3 => table[(final_rank - 1) as usize],
        _ => 0,
    }
}

fn class_c(final_rank: u32, competitor_count: u32) -> u32 {
    if competitor_count >= 4 {
        match final_rank {
            1 => 2,
            2 => 1,
            _ => 0,
        }
    } else if competitor_count == 3 {
        if final_rank == 1 { 1 } else { 0 }
    } else {
        0
    }
}
