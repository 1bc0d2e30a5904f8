use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use futures_util::stream::{self, StreamExt};
use tokio::time::{sleep, Duration as TokioDuration};

use crate::models::reminder::{DayPeriod, ReminderSpec};
use crate::models::repo::Suggestion;
use crate::models::user::{NotificationPrefs, UserRecord};
use crate::services::github::GithubApi;
use crate::services::notifier::{Notifier, NotifyError};
use crate::services::status::StatusService;
use crate::services::store::Store;
use crate::services::suggestion;
use crate::utils::config::Config;

pub struct ReminderScheduler {
    store: Arc<dyn Store>,
    github: Arc<dyn GithubApi>,
    notifier: Arc<dyn Notifier>,
    status: StatusService,
    frontend_url: String,
    check_interval_seconds: u64,
    notify_concurrency: usize,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        github: Arc<dyn GithubApi>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            status: StatusService::new(github.clone(), store.clone()),
            store,
            github,
            notifier,
            frontend_url: config.frontend_url.clone(),
            check_interval_seconds: config.scan_interval_seconds,
            notify_concurrency: config.notify_concurrency,
        }
    }

    /// Start the background scheduler
    pub async fn start(self: Arc<Self>) {
        log::info!(
            "Starting reminder scheduler (checking every {} seconds)",
            self.check_interval_seconds
        );

        loop {
            if let Err(e) = self.scan_tick(Utc::now()).await {
                log::error!("Error in reminder scheduler: {}", e);
            }

            sleep(TokioDuration::from_secs(self.check_interval_seconds)).await;
        }
    }

    /// One scan over all users at `now`. A single user's failure is logged
    /// and never stops the scan; fan-out is bounded so a large user list
    /// cannot stampede the GitHub API.
    pub async fn scan_tick(&self, now: DateTime<Utc>) -> Result<()> {
        let users = self.store.list_users().await?;

        stream::iter(users)
            .for_each_concurrent(self.notify_concurrency, |user| async move {
                if let Err(e) = self.process_user(&user, now).await {
                    log::error!(
                        "Reminder scan failed for user {}: {}",
                        user.github_username,
                        e
                    );
                }
            })
            .await;

        Ok(())
    }

    async fn process_user(&self, user: &UserRecord, now: DateTime<Utc>) -> Result<()> {
        let reminders = self.store.reminders(user.id).await?;
        let Some(period) = due_period(&reminders, now) else {
            return Ok(());
        };

        let prefs = self.store.notification_prefs(user.id).await?;
        let user_tz: Tz = user.timezone.parse().unwrap_or_else(|_| {
            log::warn!(
                "User {} has invalid timezone {:?}, falling back to UTC",
                user.github_username,
                user.timezone
            );
            chrono_tz::UTC
        });

        let local_now = now.with_timezone(&user_tz);
        if prefs.weekends_off && matches!(local_now.weekday(), Weekday::Sat | Weekday::Sun) {
            log::debug!("Skipping weekend reminder for {}", user.github_username);
            return Ok(());
        }

        let status = self.status.refresh_user(user, user_tz, now).await?;
        if status.committed_today && !prefs.notify_when_committed {
            log::debug!(
                "{} already committed today, skipping reminder",
                user.github_username
            );
            return Ok(());
        }

        let suggestion = self.compute_suggestion(user, now).await?;

        log::info!(
            "Dispatching {} reminder for {} (streak {}, suggestion {:?})",
            period.label(),
            user.github_username,
            status.streak.current_streak,
            suggestion.as_ref().map(|s| s.full_name.as_str())
        );

        self.dispatch(user, &prefs, status.streak.current_streak, period, suggestion.as_ref())
            .await;

        Ok(())
    }

    /// Rank the user's repositories. A repo-listing failure degrades to "no
    /// suggestion" rather than swallowing the whole reminder.
    async fn compute_suggestion(
        &self,
        user: &UserRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<Suggestion>> {
        let Some(token) = self.store.access_token(user.id).await? else {
            return Ok(None);
        };

        let repos = match self.github.list_repos(&token).await {
            Ok(repos) => repos,
            Err(e) => {
                log::warn!(
                    "Repository listing failed for {}: {}",
                    user.github_username,
                    e
                );
                return Ok(None);
            }
        };

        let excluded = self.store.excluded_repos(user.id).await?;
        let notes = self.store.repo_notes(user.id).await?;

        let mut rng = rand::thread_rng();
        Ok(suggestion::suggest(&repos, &excluded, &notes, now, &mut rng))
    }

    /// Dispatch through each enabled channel. Channel failures are
    /// independent: a broken SMTP relay never blocks push, and vice versa.
    async fn dispatch(
        &self,
        user: &UserRecord,
        prefs: &NotificationPrefs,
        streak: i32,
        period: DayPeriod,
        suggestion: Option<&Suggestion>,
    ) {
        let repo_name = suggestion.map(|s| s.full_name.as_str());

        if prefs.email_enabled {
            if let Some(address) = prefs.email_address.as_deref() {
                if let Err(e) = self
                    .notifier
                    .send_email(address, streak, period, repo_name)
                    .await
                {
                    log::error!("Email reminder failed for {}: {}", user.github_username, e);
                }
            } else {
                log::debug!(
                    "Email enabled but no address on file for {}",
                    user.github_username
                );
            }
        }

        if prefs.push_enabled {
            let subscription = match self.store.push_subscription(user.id).await {
                Ok(Some(sub)) => sub,
                Ok(None) => return,
                Err(e) => {
                    log::error!(
                        "Failed to load push subscription for {}: {}",
                        user.github_username,
                        e
                    );
                    return;
                }
            };

            let (title, body) = push_copy(streak, suggestion);
            match self
                .notifier
                .send_push(&subscription, &title, &body, &self.frontend_url)
                .await
            {
                Ok(()) => {}
                Err(NotifyError::SubscriptionGone) => {
                    log::info!(
                        "Purging stale push subscription for {}",
                        user.github_username
                    );
                    if let Err(e) = self.store.remove_push_subscription(user.id).await {
                        log::error!(
                            "Failed to purge push subscription for {}: {}",
                            user.github_username,
                            e
                        );
                    }
                }
                Err(e) => {
                    log::error!("Push reminder failed for {}: {}", user.github_username, e);
                }
            }
        }
    }
}

/// Return the period of the first enabled reminder whose configured HH:MM
/// equals `now` rendered into the reminder's timezone.
///
/// Matching is exact string equality on the zero-padded local minute, which
/// is why the scan interval must stay at one minute.
pub fn due_period(reminders: &[ReminderSpec], now: DateTime<Utc>) -> Option<DayPeriod> {
    for reminder in reminders.iter().filter(|r| r.enabled) {
        let tz: Tz = match reminder.timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                log::warn!(
                    "Skipping reminder {} with invalid timezone {:?}",
                    reminder.id,
                    reminder.timezone
                );
                continue;
            }
        };

        let local = now.with_timezone(&tz);
        let rendered = format!("{:02}:{:02}", local.hour(), local.minute());
        if rendered == reminder.time {
            return Some(DayPeriod::from_hour(local.hour()));
        }
    }
    None
}

/// Push notification title and body.
fn push_copy(streak: i32, suggestion: Option<&Suggestion>) -> (String, String) {
    let title = "Daily commit reminder".to_string();

    let mut body = if streak > 0 {
        format!("You're on a {}-day streak. A commit today keeps it alive.", streak)
    } else {
        "No active streak. A commit today starts one.".to_string()
    };

    if let Some(s) = suggestion {
        body.push_str(&format!(
            " Try {} ({} days since the last push).",
            s.full_name, s.days_since_push
        ));
    }

    (title, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::models::contribution::ContributionDay;
    use crate::models::repo::RepoCandidate;
    use crate::models::user::PushSubscription;
    use crate::services::store::MemoryStore;

    fn reminder(time: &str, timezone: &str) -> ReminderSpec {
        ReminderSpec {
            id: Uuid::new_v4(),
            time: time.to_string(),
            enabled: true,
            timezone: timezone.to_string(),
        }
    }

    #[test]
    fn test_due_period_exact_minute_in_zone() {
        // 13:00 UTC is 09:00 in New York during DST.
        let reminders = vec![reminder("09:00", "America/New_York")];

        let matching: DateTime<Utc> = "2024-06-10T13:00:00Z".parse().unwrap();
        assert_eq!(due_period(&reminders, matching), Some(DayPeriod::Morning));

        let off_by_one: DateTime<Utc> = "2024-06-10T13:01:00Z".parse().unwrap();
        assert_eq!(due_period(&reminders, off_by_one), None);
    }

    #[test]
    fn test_due_period_classifies_by_local_hour() {
        let evening = vec![reminder("19:30", "Asia/Tokyo")];
        // 10:30 UTC is 19:30 in Tokyo.
        let now: DateTime<Utc> = "2024-06-10T10:30:00Z".parse().unwrap();
        assert_eq!(due_period(&evening, now), Some(DayPeriod::Evening));
    }

    #[test]
    fn test_due_period_ignores_disabled_and_invalid() {
        let mut disabled = reminder("12:00", "UTC");
        disabled.enabled = false;
        let invalid = reminder("12:00", "Mars/Olympus_Mons");

        let now: DateTime<Utc> = "2024-06-10T12:00:00Z".parse().unwrap();
        assert_eq!(due_period(&[disabled, invalid], now), None);
    }

    #[test]
    fn test_push_copy_mentions_streak_and_suggestion() {
        let suggestion = Suggestion {
            full_name: "octocat/spoon-knife".to_string(),
            days_since_push: 412,
            score: 80.0,
        };
        let (_, body) = push_copy(7, Some(&suggestion));
        assert!(body.contains("7-day streak"));
        assert!(body.contains("octocat/spoon-knife"));
        assert!(body.contains("412 days"));

        let (_, fresh) = push_copy(0, None);
        assert!(fresh.contains("starts one"));
    }

    // End-to-end scan tests with fake collaborators.

    struct FakeGithub {
        calendar: Vec<ContributionDay>,
        repos: Vec<RepoCandidate>,
    }

    #[async_trait]
    impl GithubApi for FakeGithub {
        async fn list_repos(&self, _token: &str) -> Result<Vec<RepoCandidate>> {
            Ok(self.repos.clone())
        }

        async fn contribution_calendar(
            &self,
            _username: &str,
            _token: &str,
        ) -> Result<Vec<ContributionDay>> {
            Ok(self.calendar.clone())
        }

        async fn events_fallback(
            &self,
            _username: &str,
            _token: &str,
        ) -> Result<Vec<ContributionDay>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        emails: Mutex<Vec<(String, i32, DayPeriod, Option<String>)>>,
        pushes: Mutex<Vec<String>>,
        push_gone: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_email(
            &self,
            address: &str,
            streak: i32,
            period: DayPeriod,
            suggested_repo: Option<&str>,
        ) -> Result<(), NotifyError> {
            self.emails.lock().unwrap().push((
                address.to_string(),
                streak,
                period,
                suggested_repo.map(|s| s.to_string()),
            ));
            Ok(())
        }

        async fn send_push(
            &self,
            subscription: &PushSubscription,
            _title: &str,
            body: &str,
            _url: &str,
        ) -> Result<(), NotifyError> {
            if self.push_gone {
                return Err(NotifyError::SubscriptionGone);
            }
            self.pushes
                .lock()
                .unwrap()
                .push(format!("{}: {}", subscription.endpoint, body));
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            github_api_base_url: "https://api.github.com".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            scan_interval_seconds: 60,
            notify_concurrency: 4,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from_address: None,
            smtp_from_name: "streakd".to_string(),
            smtp_use_tls: true,
            vapid_subject: None,
            vapid_public_key: None,
            vapid_private_key: None,
        }
    }

    fn day(y: i32, m: u32, d: u32, count: i32) -> ContributionDay {
        ContributionDay {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            count,
        }
    }

    async fn seed_user(
        store: &MemoryStore,
        timezone: &str,
        reminder_time: &str,
        prefs: NotificationPrefs,
    ) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            github_username: "octocat".to_string(),
            timezone: timezone.to_string(),
        };
        store.upsert_user(user.clone()).await.unwrap();
        store
            .put_access_token(user.id, "ghp_test".to_string())
            .await
            .unwrap();
        store
            .put_reminders(user.id, vec![reminder(reminder_time, timezone)])
            .await
            .unwrap();
        store.put_notification_prefs(user.id, prefs).await.unwrap();
        user
    }

    fn email_prefs() -> NotificationPrefs {
        NotificationPrefs {
            email_enabled: true,
            push_enabled: false,
            weekends_off: false,
            notify_when_committed: false,
            email_address: Some("octocat@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_scan_fires_email_on_matching_minute() {
        let store = Arc::new(MemoryStore::new());
        // Monday 2024-06-10, no commit today (06-09 was the last one).
        seed_user(&store, "America/New_York", "09:00", email_prefs()).await;

        let github = Arc::new(FakeGithub {
            calendar: vec![day(2024, 6, 8, 1), day(2024, 6, 9, 2)],
            repos: vec![RepoCandidate {
                full_name: "octocat/spoon-knife".to_string(),
                pushed_at: "2023-05-01T00:00:00Z".parse().unwrap(),
                open_issues_count: 3,
            }],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler =
            ReminderScheduler::new(store, github, notifier.clone(), &test_config());

        // 13:00 UTC == 09:00 EDT.
        scheduler
            .scan_tick("2024-06-10T13:00:00Z".parse().unwrap())
            .await
            .unwrap();

        let emails = notifier.emails.lock().unwrap();
        assert_eq!(emails.len(), 1);
        let (address, streak, period, suggested) = &emails[0];
        assert_eq!(address, "octocat@example.com");
        assert_eq!(*streak, 2);
        assert_eq!(*period, DayPeriod::Morning);
        assert_eq!(suggested.as_deref(), Some("octocat/spoon-knife"));
    }

    #[tokio::test]
    async fn test_scan_is_quiet_off_the_minute() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "America/New_York", "09:00", email_prefs()).await;

        let github = Arc::new(FakeGithub {
            calendar: Vec::new(),
            repos: Vec::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler =
            ReminderScheduler::new(store, github, notifier.clone(), &test_config());

        scheduler
            .scan_tick("2024-06-10T13:01:00Z".parse().unwrap())
            .await
            .unwrap();

        assert!(notifier.emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_weekend_skip() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = email_prefs();
        prefs.weekends_off = true;
        // Saturday 2024-06-08.
        seed_user(&store, "America/New_York", "09:00", prefs).await;

        let github = Arc::new(FakeGithub {
            calendar: Vec::new(),
            repos: Vec::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler =
            ReminderScheduler::new(store, github, notifier.clone(), &test_config());

        scheduler
            .scan_tick("2024-06-08T13:00:00Z".parse().unwrap())
            .await
            .unwrap();

        assert!(notifier.emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_committed_today_suppresses_unless_opted_in() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "UTC", "12:00", email_prefs()).await;

        let github = Arc::new(FakeGithub {
            calendar: vec![day(2024, 6, 10, 5)],
            repos: Vec::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = ReminderScheduler::new(
            store.clone(),
            github,
            notifier.clone(),
            &test_config(),
        );

        let now: DateTime<Utc> = "2024-06-10T12:00:00Z".parse().unwrap();
        scheduler.scan_tick(now).await.unwrap();
        assert!(notifier.emails.lock().unwrap().is_empty());

        let mut prefs = email_prefs();
        prefs.notify_when_committed = true;
        store.put_notification_prefs(user.id, prefs).await.unwrap();

        scheduler.scan_tick(now).await.unwrap();
        assert_eq!(notifier.emails.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_push_subscription_is_purged() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = email_prefs();
        prefs.email_enabled = false;
        prefs.push_enabled = true;
        let user = seed_user(&store, "UTC", "12:00", prefs).await;
        store
            .put_push_subscription(
                user.id,
                PushSubscription {
                    endpoint: "https://push.example/sub/1".to_string(),
                    p256dh: "key".to_string(),
                    auth: "auth".to_string(),
                },
            )
            .await
            .unwrap();

        let github = Arc::new(FakeGithub {
            calendar: Vec::new(),
            repos: Vec::new(),
        });
        let notifier = Arc::new(RecordingNotifier {
            push_gone: true,
            ..Default::default()
        });
        let scheduler = ReminderScheduler::new(
            store.clone(),
            github,
            notifier,
            &test_config(),
        );

        scheduler
            .scan_tick("2024-06-10T12:00:00Z".parse().unwrap())
            .await
            .unwrap();

        assert!(store.push_subscription(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_failing_user_does_not_stop_the_scan() {
        let store = Arc::new(MemoryStore::new());

        // First user has a reminder due but no access token, so their
        // refresh errors; the second user must still be notified.
        let broken = UserRecord {
            id: Uuid::new_v4(),
            github_username: "broken".to_string(),
            timezone: "UTC".to_string(),
        };
        store.upsert_user(broken.clone()).await.unwrap();
        store
            .put_reminders(broken.id, vec![reminder("12:00", "UTC")])
            .await
            .unwrap();
        store
            .put_notification_prefs(broken.id, email_prefs())
            .await
            .unwrap();

        seed_user(&store, "UTC", "12:00", email_prefs()).await;

        let github = Arc::new(FakeGithub {
            calendar: Vec::new(),
            repos: Vec::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler =
            ReminderScheduler::new(store, github, notifier.clone(), &test_config());

        scheduler
            .scan_tick("2024-06-10T12:00:00Z".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(notifier.emails.lock().unwrap().len(), 1);
    }
}
