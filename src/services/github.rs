use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::contribution::ContributionDay;
use crate::models::repo::RepoCandidate;
use crate::utils::http_client::create_http_client;
use crate::utils::validators::validate_username;

/// GitHub endpoints the habit tracker depends on.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Repositories the token can reach, with recency and issue load.
    async fn list_repos(&self, token: &str) -> Result<Vec<RepoCandidate>>;

    /// Full contribution calendar for a user (typically ~365 days).
    async fn contribution_calendar(
        &self,
        username: &str,
        token: &str,
    ) -> Result<Vec<ContributionDay>>;

    /// Degraded per-day approximation built from the events feed, used when
    /// the calendar query fails.
    async fn events_fallback(&self, username: &str, token: &str)
        -> Result<Vec<ContributionDay>>;
}

pub struct GitHubClient {
    api_base_url: String,
}

impl GitHubClient {
    pub fn new(api_base_url: String) -> Self {
        Self { api_base_url }
    }
}

#[async_trait]
impl GithubApi for GitHubClient {
    async fn list_repos(&self, token: &str) -> Result<Vec<RepoCandidate>> {
        let client = create_http_client();
        let mut candidates = Vec::new();
        let mut page = 1;

        // Paged fetch; a short page means we are done. Five pages covers 500
        // repositories, far beyond what the scorer meaningfully ranks.
        while page <= 5 {
            let page_str = page.to_string();
            let response = client
                .get(format!("{}/user/repos", self.api_base_url))
                .header("Authorization", format!("Bearer {}", token))
                .query(&[
                    ("per_page", "100"),
                    ("page", page_str.as_str()),
                    ("affiliation", "owner,collaborator"),
                    ("sort", "pushed"),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(anyhow!("Failed to fetch repositories: status {}", status));
            }

            let repos: Vec<GitHubRepo> = response.json().await?;
            let fetched = repos.len();

            for repo in repos {
                // Repositories that were never pushed to carry no recency
                // signal and cannot be suggested.
                let Some(pushed_at_str) = repo.pushed_at else {
                    continue;
                };
                let pushed_at = chrono::DateTime::parse_from_rfc3339(&pushed_at_str)
                    .map_err(|e| anyhow!("Failed to parse pushed_at: {}", e))?
                    .with_timezone(&chrono::Utc);

                candidates.push(RepoCandidate {
                    full_name: repo.full_name,
                    pushed_at,
                    open_issues_count: repo.open_issues_count,
                });
            }

            if fetched < 100 {
                break;
            }
            page += 1;
        }

        log::info!("Fetched {} repository candidates from GitHub", candidates.len());

        Ok(candidates)
    }

    async fn contribution_calendar(
        &self,
        username: &str,
        token: &str,
    ) -> Result<Vec<ContributionDay>> {
        validate_username(username)?;

        let client = create_http_client();

        let query = r#"
            query($username: String!) {
                user(login: $username) {
                    contributionsCollection {
                        contributionCalendar {
                            weeks {
                                contributionDays {
                                    date
                                    contributionCount
                                }
                            }
                        }
                    }
                }
            }
        "#;

        let response = client
            .post(format!("{}/graphql", self.api_base_url))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({
                "query": query,
                "variables": json!({ "username": username }),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!(
                "GitHub GraphQL request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let response_data: serde_json::Value = response.json().await?;

        if let Some(errors) = response_data.get("errors") {
            return Err(anyhow!("GitHub GraphQL errors: {:?}", errors));
        }

        let days = parse_contribution_calendar(&response_data)?;

        log::info!(
            "Fetched contribution calendar for {}: {} days",
            username,
            days.len()
        );

        Ok(days)
    }

    async fn events_fallback(
        &self,
        username: &str,
        token: &str,
    ) -> Result<Vec<ContributionDay>> {
        validate_username(username)?;

        let client = create_http_client();
        let mut all_events = Vec::new();
        let mut page = 1;

        // The events API serves at most 300 events (3 pages of 100).
        while page <= 3 {
            let page_str = page.to_string();
            let response = client
                .get(format!("{}/users/{}/events", self.api_base_url, username))
                .header("Authorization", format!("Bearer {}", token))
                .query(&[("per_page", "100"), ("page", page_str.as_str())])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(anyhow!("Failed to fetch GitHub events: status {}", status));
            }

            let events: Vec<GitHubEvent> = response.json().await?;

            if events.is_empty() {
                break;
            }

            all_events.extend(events);
            page += 1;
        }

        let days = group_push_events(&all_events)?;

        log::info!(
            "Built events fallback for {}: {} events -> {} days",
            username,
            all_events.len(),
            days.len()
        );

        Ok(days)
    }
}

/// Extract per-day counts from a contributionCalendar GraphQL response.
fn parse_contribution_calendar(response: &serde_json::Value) -> Result<Vec<ContributionDay>> {
    let weeks = response
        .get("data")
        .and_then(|d| d.get("user"))
        .and_then(|u| u.get("contributionsCollection"))
        .and_then(|c| c.get("contributionCalendar"))
        .and_then(|c| c.get("weeks"))
        .and_then(|w| w.as_array())
        .ok_or_else(|| anyhow!("Invalid contribution calendar response structure"))?;

    let mut days = Vec::new();

    for week in weeks {
        let Some(week_days) = week.get("contributionDays").and_then(|d| d.as_array()) else {
            continue;
        };
        for day in week_days {
            let date_str = day
                .get("date")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("Missing date in contribution day"))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| anyhow!("Failed to parse date: {}", e))?;
            let count = day
                .get("contributionCount")
                .and_then(|v| v.as_i64())
                .unwrap_or(0) as i32;

            days.push(ContributionDay { date, count });
        }
    }

    days.sort_by_key(|d| d.date);
    Ok(days)
}

/// Collapse PushEvents into per-day commit counts.
///
/// The events payload carries a `size` field with the number of commits in
/// the push; a missing payload still counts as one. This undercounts next to
/// the calendar (events expire after 90 days) but is good enough to answer
/// "did anything happen today".
fn group_push_events(events: &[GitHubEvent]) -> Result<Vec<ContributionDay>> {
    let mut per_day: HashMap<NaiveDate, i32> = HashMap::new();

    for event in events {
        if event.event_type != "PushEvent" {
            continue;
        }

        let created_at = chrono::DateTime::parse_from_rfc3339(&event.created_at)
            .map_err(|e| anyhow!("Failed to parse event date: {}", e))?;
        let date = created_at.naive_utc().date();

        let commits = event
            .payload
            .as_ref()
            .and_then(|p| p.get("size"))
            .and_then(|v| v.as_i64())
            .unwrap_or(1) as i32;

        *per_day.entry(date).or_insert(0) += commits.max(1);
    }

    let mut days: Vec<ContributionDay> = per_day
        .into_iter()
        .map(|(date, count)| ContributionDay { date, count })
        .collect();
    days.sort_by_key(|d| d.date);

    Ok(days)
}

// GitHub API response types

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    full_name: String,
    pushed_at: Option<String>,
    #[serde(default)]
    open_issues_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GitHubEvent {
    #[serde(rename = "type")]
    event_type: String,
    created_at: String,
    payload: Option<serde_json::Value>,
}
