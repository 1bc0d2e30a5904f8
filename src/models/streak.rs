use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted streak counters for a user.
///
/// `longest_streak` only ever grows; `current_streak` is recomputed from the
/// contribution calendar on every status check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_commit_date: Option<NaiveDate>,
}
