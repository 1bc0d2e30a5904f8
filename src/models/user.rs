use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked user. Registration and the OAuth token exchange happen
/// upstream; the core only needs the GitHub identity and home timezone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub github_username: String,
    /// IANA zone used for streak evaluation and the weekend gate.
    pub timezone: String,
}

/// Per-user notification switches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub email_enabled: bool,
    pub push_enabled: bool,
    /// Suppress reminders on Saturday and Sunday (user-local).
    pub weekends_off: bool,
    /// Send the reminder even when today's commit is already in.
    pub notify_when_committed: bool,
    pub email_address: Option<String>,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email_enabled: true,
            push_enabled: false,
            weekends_off: false,
            notify_when_committed: false,
            email_address: None,
        }
    }
}

/// Browser push subscription as registered by the frontend. The key
/// material is opaque to the core and forwarded as-is to the push service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}
