use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository metadata the suggestion scorer works from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoCandidate {
    /// "owner/name", unique per platform.
    pub full_name: String,
    pub pushed_at: DateTime<Utc>,
    pub open_issues_count: i32,
}

/// User-authored notes attached to a repository. All fields optional;
/// priority and difficulty are on a 1-5 scale and default to 3.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RepoNote {
    pub priority: Option<i32>,
    pub difficulty: Option<i32>,
    pub note: Option<String>,
}

/// The repository the scorer picked, with the signals shown to the user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suggestion {
    pub full_name: String,
    pub days_since_push: i64,
    pub score: f64,
}
