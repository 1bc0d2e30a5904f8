use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::models::repo::{RepoCandidate, RepoNote, Suggestion};

// Component weights. They sum to 1.0; each component is scored 0-100 before
// weighting, so the total score is also 0-100.
const WEIGHT_DAYS: f64 = 0.30;
const WEIGHT_ISSUES: f64 = 0.20;
const WEIGHT_PRIORITY: f64 = 0.25;
const WEIGHT_DIFFICULTY: f64 = 0.15;
const WEIGHT_RANDOM: f64 = 0.10;

// A year without a push, or 50 open issues, maxes out that component.
const DAYS_SATURATION: f64 = 365.0;
const ISSUES_SATURATION: f64 = 50.0;

const DEFAULT_PRIORITY: i32 = 3;
const DEFAULT_DIFFICULTY: i32 = 3;

/// Pick the repository most worth a commit today, or `None` when every
/// candidate is excluded.
///
/// Blends how long a repo has sat untouched and its open issue load with the
/// user's own priority/difficulty notes, plus a small random term so the
/// nudge does not fixate on a single repository. The RNG is injected so
/// tests can seed it.
pub fn suggest<R: Rng>(
    repos: &[RepoCandidate],
    excluded: &HashSet<String>,
    notes: &HashMap<String, RepoNote>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<Suggestion> {
    let mut best: Option<Suggestion> = None;

    for repo in repos {
        if excluded.contains(&repo.full_name) {
            continue;
        }

        let note = notes.get(&repo.full_name);
        let priority = note.and_then(|n| n.priority).unwrap_or(DEFAULT_PRIORITY);
        let difficulty = note.and_then(|n| n.difficulty).unwrap_or(DEFAULT_DIFFICULTY);

        let days_since_push = (now - repo.pushed_at).num_days().max(0);

        let day_score = (days_since_push as f64 / DAYS_SATURATION).min(1.0) * 100.0 * WEIGHT_DAYS;
        let issue_score = (repo.open_issues_count.max(0) as f64 / ISSUES_SATURATION).min(1.0)
            * 100.0
            * WEIGHT_ISSUES;
        let priority_score = (priority as f64 / 5.0) * 100.0 * WEIGHT_PRIORITY;
        // Easier repos score higher: difficulty 1 -> 100, difficulty 5 -> 20.
        let difficulty_score = ((6 - difficulty) as f64 / 5.0) * 100.0 * WEIGHT_DIFFICULTY;
        let random_score = rng.gen::<f64>() * 100.0 * WEIGHT_RANDOM;

        let score = day_score + issue_score + priority_score + difficulty_score + random_score;

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Suggestion {
                full_name: repo.full_name.clone(),
                days_since_push,
                score,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidate(full_name: &str, days_ago: i64, issues: i32, now: DateTime<Utc>) -> RepoCandidate {
        RepoCandidate {
            full_name: full_name.to_string(),
            pushed_at: now - Duration::days(days_ago),
            open_issues_count: issues,
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_neglected_repo_wins() {
        // "a/a" saturates both the recency and issue components; "b/b" can
        // only win through the 10-point random term, which is not enough to
        // cover the gap, so the winner is stable for any seed.
        let now = now();
        let repos = vec![
            candidate("a/a", 400, 60, now),
            candidate("b/b", 1, 0, now),
        ];
        let mut rng = StdRng::seed_from_u64(7);

        let suggestion =
            suggest(&repos, &HashSet::new(), &HashMap::new(), now, &mut rng).unwrap();
        assert_eq!(suggestion.full_name, "a/a");
        assert_eq!(suggestion.days_since_push, 400);
        assert!(suggestion.score > 70.0);
    }

    #[test]
    fn test_no_repos_yields_no_suggestion() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(suggest(&[], &HashSet::new(), &HashMap::new(), now(), &mut rng).is_none());
    }

    #[test]
    fn test_excluding_only_repo_yields_no_suggestion() {
        let now = now();
        let repos = vec![candidate("a/a", 10, 0, now)];
        let excluded: HashSet<String> = ["a/a".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(suggest(&repos, &excluded, &HashMap::new(), now, &mut rng).is_none());
    }

    #[test]
    fn test_notes_shift_the_ranking() {
        // Identical repos except for user priority: the 20-point priority
        // spread dominates the 10-point random term.
        let now = now();
        let repos = vec![
            candidate("low/prio", 30, 5, now),
            candidate("high/prio", 30, 5, now),
        ];
        let mut notes = HashMap::new();
        notes.insert(
            "low/prio".to_string(),
            RepoNote {
                priority: Some(1),
                ..Default::default()
            },
        );
        notes.insert(
            "high/prio".to_string(),
            RepoNote {
                priority: Some(5),
                ..Default::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(42);

        let suggestion = suggest(&repos, &HashSet::new(), &notes, now, &mut rng).unwrap();
        assert_eq!(suggestion.full_name, "high/prio");
    }

    #[test]
    fn test_future_pushed_at_clamps_to_zero_days() {
        let now = now();
        let repos = vec![candidate("c/c", -2, 0, now)];
        let mut rng = StdRng::seed_from_u64(0);

        let suggestion =
            suggest(&repos, &HashSet::new(), &HashMap::new(), now, &mut rng).unwrap();
        assert_eq!(suggestion.days_since_push, 0);
    }
}
