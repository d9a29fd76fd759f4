//! Progression calculator: growth stages, dew rewards and streaks.
//!
//! Everything here is pure; callers supply the clock-derived dates.

use crate::{GardenLedger, GrowthStage, UnlockRequirement};
use chrono::NaiveDate;

/// Minutes of focus per unit of dew
pub const MINUTES_PER_DEW: u32 = 5;

/// Lowest stage a plant can be at
pub const FLOOR_STAGE: u32 = 1;

/// Highest stage whose session and minute thresholds are both met
///
/// Stages are expected in ascending order. Falls back to the floor stage
/// when nothing qualifies.
pub fn growth_stage(stages: &[GrowthStage], sessions: u32, total_minutes: u64) -> u32 {
    stages
        .iter()
        .rev()
        .find(|s| sessions >= s.min_sessions && total_minutes >= u64::from(s.min_total_minutes))
        .map(|s| s.stage.max(FLOOR_STAGE))
        .unwrap_or(FLOOR_STAGE)
}

/// Recompute a plant's stage without ever moving it backwards
pub fn advance_stage(current: u32, stages: &[GrowthStage], sessions: u32, total_minutes: u64) -> u32 {
    current.max(growth_stage(stages, sessions, total_minutes))
}

/// Minutes credited for a session: never less than the declared target
pub fn credited_minutes(actual_minutes: u32, target_minutes: u32) -> u32 {
    actual_minutes.max(target_minutes)
}

/// Dew earned for a session, rounding half up (0-2 min → 0, 3-7 → 1, ...)
pub fn dew_for_minutes(minutes: u32) -> u64 {
    (u64::from(minutes) + u64::from(MINUTES_PER_DEW / 2)) / u64::from(MINUTES_PER_DEW)
}

/// Advance the ledger's daily streak for a session completed on `today`
pub fn update_streak(ledger: &mut GardenLedger, today: NaiveDate) {
    match ledger.last_session_date {
        None => {
            ledger.current_streak = 1;
        }
        Some(last) => match (today - last).num_days() {
            gap if gap < 0 => {
                tracing::warn!("Session date {} precedes last session {}", today, last);
                return;
            }
            0 => {}
            1 => ledger.current_streak += 1,
            gap => {
                tracing::debug!("Streak broken after {} day gap", gap);
                ledger.current_streak = 1;
            }
        },
    }

    // A ledger carried over with a zero streak still counts today
    ledger.current_streak = ledger.current_streak.max(1);
    ledger.longest_streak = ledger.longest_streak.max(ledger.current_streak);
    ledger.last_session_date = Some(today);
}

/// Whether the ledger has met a species' unlock requirement
pub fn is_unlocked(requirement: Option<&UnlockRequirement>, ledger: &GardenLedger) -> bool {
    match requirement {
        None => true,
        Some(UnlockRequirement::TotalMinutes { minutes }) => ledger.total_focus_minutes >= *minutes,
        Some(UnlockRequirement::TotalSessions { sessions }) => ledger.total_sessions >= *sessions,
        Some(UnlockRequirement::LongestStreak { days }) => ledger.longest_streak >= *days,
    }
}
