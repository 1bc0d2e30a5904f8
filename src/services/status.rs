use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::contribution::ContributionDay;
use crate::models::streak::StreakState;
use crate::models::user::UserRecord;
use crate::services::github::GithubApi;
use crate::services::store::Store;
use crate::services::streak;

/// Outcome of a per-user status refresh.
#[derive(Clone, Debug)]
pub struct UserStatus {
    pub streak: StreakState,
    pub committed_today: bool,
}

/// Reconciles a user's streak counters against GitHub.
///
/// Upstream failure degrades instead of propagating: the calendar query
/// falls back to the events approximation, then to the cached days from the
/// last successful fetch. Counters only come out 0/0 when nothing was ever
/// cached.
pub struct StatusService {
    github: Arc<dyn GithubApi>,
    store: Arc<dyn Store>,
}

impl StatusService {
    pub fn new(github: Arc<dyn GithubApi>, store: Arc<dyn Store>) -> Self {
        Self { github, store }
    }

    /// Fetch contribution data, recompute the streak, persist it, and report
    /// whether today already has a commit. "Today" is evaluated in `tz`.
    pub async fn refresh_user(
        &self,
        user: &UserRecord,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<UserStatus> {
        let token = self
            .store
            .access_token(user.id)
            .await?
            .ok_or_else(|| anyhow!("no access token for {}", user.github_username))?;

        let days = self.fetch_contribution_days(user, &token).await?;

        let today = now.with_timezone(&tz).date_naive();
        let persisted = self.store.streak_state(user.id).await?.unwrap_or_default();
        let state = streak::compute_streak(&days, today, persisted.longest_streak);
        self.store.put_streak_state(user.id, state.clone()).await?;

        let committed_today = streak::committed_on(&days, today);

        Ok(UserStatus {
            streak: state,
            committed_today,
        })
    }

    async fn fetch_contribution_days(
        &self,
        user: &UserRecord,
        token: &str,
    ) -> Result<Vec<ContributionDay>> {
        match self
            .github
            .contribution_calendar(&user.github_username, token)
            .await
        {
            Ok(days) => {
                self.store
                    .put_cached_contributions(user.id, days.clone())
                    .await?;
                Ok(days)
            }
            Err(e) => {
                log::warn!(
                    "Contribution calendar failed for {}, trying events fallback: {}",
                    user.github_username,
                    e
                );
                match self.github.events_fallback(&user.github_username, token).await {
                    Ok(days) => Ok(days),
                    Err(e) => {
                        log::warn!(
                            "Events fallback failed for {}, using cached days: {}",
                            user.github_username,
                            e
                        );
                        Ok(self
                            .store
                            .cached_contributions(user.id)
                            .await?
                            .unwrap_or_default())
                    }
                }
            }
        }
    }
}
