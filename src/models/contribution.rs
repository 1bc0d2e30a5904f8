use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar day of commit activity for a user.
///
/// Calendars are ordered by date with at most one entry per day; a missing
/// day means zero contributions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: i32,
}

impl ContributionDay {
    /// Whether this day keeps a streak alive.
    pub fn counts(&self) -> bool {
        self.count > 0
    }
}
