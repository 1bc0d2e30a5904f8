use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::contribution::ContributionDay;
use crate::models::reminder::ReminderSpec;
use crate::models::repo::RepoNote;
use crate::models::streak::StreakState;
use crate::models::user::{NotificationPrefs, PushSubscription, UserRecord};
use crate::utils::validators::{validate_reminder_time, validate_timezone};

/// Per-user persistence the core depends on.
///
/// Implementations provide reads and writes keyed by user id with
/// last-write-wins semantics; nothing here assumes a physical storage
/// format. Updates are keyed per user, so no cross-user locking exists.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>>;
    async fn upsert_user(&self, user: UserRecord) -> Result<()>;

    async fn access_token(&self, user_id: Uuid) -> Result<Option<String>>;
    async fn put_access_token(&self, user_id: Uuid, token: String) -> Result<()>;

    async fn streak_state(&self, user_id: Uuid) -> Result<Option<StreakState>>;
    async fn put_streak_state(&self, user_id: Uuid, state: StreakState) -> Result<()>;

    async fn reminders(&self, user_id: Uuid) -> Result<Vec<ReminderSpec>>;
    async fn put_reminders(&self, user_id: Uuid, reminders: Vec<ReminderSpec>) -> Result<()>;

    async fn notification_prefs(&self, user_id: Uuid) -> Result<NotificationPrefs>;
    async fn put_notification_prefs(&self, user_id: Uuid, prefs: NotificationPrefs) -> Result<()>;

    async fn excluded_repos(&self, user_id: Uuid) -> Result<HashSet<String>>;
    async fn put_excluded_repos(&self, user_id: Uuid, excluded: HashSet<String>) -> Result<()>;

    async fn repo_notes(&self, user_id: Uuid) -> Result<HashMap<String, RepoNote>>;
    async fn put_repo_notes(&self, user_id: Uuid, notes: HashMap<String, RepoNote>) -> Result<()>;

    async fn push_subscription(&self, user_id: Uuid) -> Result<Option<PushSubscription>>;
    async fn put_push_subscription(&self, user_id: Uuid, sub: PushSubscription) -> Result<()>;
    async fn remove_push_subscription(&self, user_id: Uuid) -> Result<()>;

    async fn cached_contributions(&self, user_id: Uuid) -> Result<Option<Vec<ContributionDay>>>;
    async fn put_cached_contributions(
        &self,
        user_id: Uuid,
        days: Vec<ContributionDay>,
    ) -> Result<()>;
}

/// Everything one user carries, as seeded from the state file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedUser {
    pub user: UserRecord,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub reminders: Vec<ReminderSpec>,
    #[serde(default)]
    pub prefs: NotificationPrefs,
    #[serde(default)]
    pub excluded_repos: HashSet<String>,
    #[serde(default)]
    pub repo_notes: HashMap<String, RepoNote>,
    #[serde(default)]
    pub push_subscription: Option<PushSubscription>,
    #[serde(default)]
    pub streak: Option<StreakState>,
}

/// Serialized form of the whole store, used to seed a fresh process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    tokens: HashMap<Uuid, String>,
    streaks: HashMap<Uuid, StreakState>,
    reminders: HashMap<Uuid, Vec<ReminderSpec>>,
    prefs: HashMap<Uuid, NotificationPrefs>,
    excluded: HashMap<Uuid, HashSet<String>>,
    notes: HashMap<Uuid, HashMap<String, RepoNote>>,
    push_subs: HashMap<Uuid, PushSubscription>,
    cached_contributions: HashMap<Uuid, Vec<ContributionDay>>,
}

/// In-process store. A SQL-backed store would implement the same trait; the
/// scheduler and services never see the difference.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = Inner::default();

        for seed in snapshot.users {
            let user_id = seed.user.id;
            inner.users.insert(user_id, seed.user);
            if let Some(token) = seed.access_token {
                inner.tokens.insert(user_id, token);
            }
            inner.reminders.insert(user_id, seed.reminders);
            inner.prefs.insert(user_id, seed.prefs);
            inner.excluded.insert(user_id, seed.excluded_repos);
            inner.notes.insert(user_id, seed.repo_notes);
            if let Some(sub) = seed.push_subscription {
                inner.push_subs.insert(user_id, sub);
            }
            if let Some(streak) = seed.streak {
                inner.streaks.insert(user_id, streak);
            }
        }

        Self {
            inner: RwLock::new(inner),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let inner = self.inner.read().await;
        let mut users: Vec<UserRecord> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.github_username.cmp(&b.github_username));
        Ok(users)
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<()> {
        self.inner.write().await.users.insert(user.id, user);
        Ok(())
    }

    async fn access_token(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.inner.read().await.tokens.get(&user_id).cloned())
    }

    async fn put_access_token(&self, user_id: Uuid, token: String) -> Result<()> {
        self.inner.write().await.tokens.insert(user_id, token);
        Ok(())
    }

    async fn streak_state(&self, user_id: Uuid) -> Result<Option<StreakState>> {
        Ok(self.inner.read().await.streaks.get(&user_id).cloned())
    }

    async fn put_streak_state(&self, user_id: Uuid, state: StreakState) -> Result<()> {
        self.inner.write().await.streaks.insert(user_id, state);
        Ok(())
    }

    async fn reminders(&self, user_id: Uuid) -> Result<Vec<ReminderSpec>> {
        Ok(self
            .inner
            .read()
            .await
            .reminders
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_reminders(&self, user_id: Uuid, reminders: Vec<ReminderSpec>) -> Result<()> {
        for reminder in &reminders {
            validate_reminder_time(&reminder.time)?;
            validate_timezone(&reminder.timezone)?;
        }
        self.inner.write().await.reminders.insert(user_id, reminders);
        Ok(())
    }

    async fn notification_prefs(&self, user_id: Uuid) -> Result<NotificationPrefs> {
        Ok(self
            .inner
            .read()
            .await
            .prefs
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_notification_prefs(&self, user_id: Uuid, prefs: NotificationPrefs) -> Result<()> {
        self.inner.write().await.prefs.insert(user_id, prefs);
        Ok(())
    }

    async fn excluded_repos(&self, user_id: Uuid) -> Result<HashSet<String>> {
        Ok(self
            .inner
            .read()
            .await
            .excluded
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_excluded_repos(&self, user_id: Uuid, excluded: HashSet<String>) -> Result<()> {
        self.inner.write().await.excluded.insert(user_id, excluded);
        Ok(())
    }

    async fn repo_notes(&self, user_id: Uuid) -> Result<HashMap<String, RepoNote>> {
        Ok(self
            .inner
            .read()
            .await
            .notes
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_repo_notes(&self, user_id: Uuid, notes: HashMap<String, RepoNote>) -> Result<()> {
        self.inner.write().await.notes.insert(user_id, notes);
        Ok(())
    }

    async fn push_subscription(&self, user_id: Uuid) -> Result<Option<PushSubscription>> {
        Ok(self.inner.read().await.push_subs.get(&user_id).cloned())
    }

    async fn put_push_subscription(&self, user_id: Uuid, sub: PushSubscription) -> Result<()> {
        self.inner.write().await.push_subs.insert(user_id, sub);
        Ok(())
    }

    async fn remove_push_subscription(&self, user_id: Uuid) -> Result<()> {
        self.inner.write().await.push_subs.remove(&user_id);
        Ok(())
    }

    async fn cached_contributions(&self, user_id: Uuid) -> Result<Option<Vec<ContributionDay>>> {
        Ok(self
            .inner
            .read()
            .await
            .cached_contributions
            .get(&user_id)
            .cloned())
    }

    async fn put_cached_contributions(
        &self,
        user_id: Uuid,
        days: Vec<ContributionDay>,
    ) -> Result<()> {
        self.inner
            .write()
            .await
            .cached_contributions
            .insert(user_id, days);
        Ok(())
    }
}
