use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;

use crate::models::reminder::DayPeriod;
use crate::models::user::PushSubscription;
use crate::utils::config::Config;
use crate::utils::http_client::create_http_client;

/// Errors a notification channel can produce.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The channel is not configured (no SMTP relay, no VAPID keys).
    #[error("channel not configured: {0}")]
    Config(String),

    /// Invalid sender or recipient address.
    #[error("invalid address: {0}")]
    Address(String),

    /// Delivery failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The push service reports the subscription no longer exists; the
    /// caller should purge the stored record.
    #[error("push subscription is gone")]
    SubscriptionGone,
}

/// Outbound notification channels the scheduler dispatches through.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(
        &self,
        address: &str,
        streak: i32,
        period: DayPeriod,
        suggested_repo: Option<&str>,
    ) -> Result<(), NotifyError>;

    async fn send_push(
        &self,
        subscription: &PushSubscription,
        title: &str,
        body: &str,
        url: &str,
    ) -> Result<(), NotifyError>;
}

/// Production notifier: SMTP email plus Web Push delivery.
pub struct NotificationClient {
    email: Option<SmtpMailer>,
    push: WebPushSender,
}

impl NotificationClient {
    /// Build from configuration. Email is only wired up when an SMTP host
    /// and sender address are configured; push works without VAPID keys
    /// against push services that do not require them.
    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let email = match (&config.smtp_host, &config.smtp_from_address) {
            (Some(host), Some(from)) => Some(SmtpMailer::new(
                host,
                config.smtp_port,
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                from,
                &config.smtp_from_name,
                config.smtp_use_tls,
            )?),
            _ => None,
        };

        let push = WebPushSender {
            vapid_subject: config.vapid_subject.clone(),
            vapid_public_key: config.vapid_public_key.clone(),
            vapid_private_key: config.vapid_private_key.clone(),
        };

        Ok(Self { email, push })
    }
}

#[async_trait]
impl Notifier for NotificationClient {
    async fn send_email(
        &self,
        address: &str,
        streak: i32,
        period: DayPeriod,
        suggested_repo: Option<&str>,
    ) -> Result<(), NotifyError> {
        let mailer = self
            .email
            .as_ref()
            .ok_or_else(|| NotifyError::Config("SMTP is not configured".to_string()))?;

        let subject = email_subject(streak, period);
        let body = email_body(streak, period, suggested_repo);
        mailer.send(address, &subject, &body).await
    }

    async fn send_push(
        &self,
        subscription: &PushSubscription,
        title: &str,
        body: &str,
        url: &str,
    ) -> Result<(), NotifyError> {
        self.push.send(subscription, title, body, url).await
    }
}

/// Reminder email subject line.
fn email_subject(streak: i32, period: DayPeriod) -> String {
    if streak > 0 {
        format!(
            "{}! Keep your {}-day commit streak alive",
            period.greeting(),
            streak
        )
    } else {
        format!("{}! Time to start a new commit streak", period.greeting())
    }
}

/// Reminder email plain-text body.
fn email_body(streak: i32, period: DayPeriod, suggested_repo: Option<&str>) -> String {
    let mut lines = vec![format!(
        "This is your {} reminder: no commit on record for today yet.",
        period.label()
    )];

    if streak > 0 {
        lines.push(format!(
            "You are on a {}-day streak. One commit today keeps it going.",
            streak
        ));
    } else {
        lines.push("A single commit today starts a fresh streak.".to_string());
    }

    if let Some(repo) = suggested_repo {
        lines.push(format!("Suggestion: {} could use some attention.", repo));
    }

    lines.join("\n\n")
}

/// Async SMTP mailer, connection pooled by lettre.
struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl SmtpMailer {
    fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from_address: &str,
        from_name: &str,
        use_tls: bool,
    ) -> Result<Self, NotifyError> {
        let from_mailbox: Mailbox = format!("{} <{}>", from_name, from_address)
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}", e)))?;

        let builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Send(format!("{}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder.port(port);
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from_mailbox,
        })
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to
                .parse()
                .map_err(|e| NotifyError::Address(format!("{}: {}", to, e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Send(format!("{}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Send(format!("{}", e)))?;

        Ok(())
    }
}

/// Thin Web Push delivery: POST the payload to the subscription endpoint.
///
/// The VAPID material is forwarded as-is in the legacy header scheme; the
/// push service validates it. Key handling beyond that lives with the
/// subscription registrar, not here.
struct WebPushSender {
    vapid_subject: Option<String>,
    vapid_public_key: Option<String>,
    vapid_private_key: Option<String>,
}

impl WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        title: &str,
        body: &str,
        url: &str,
    ) -> Result<(), NotifyError> {
        let client = create_http_client();

        let payload = json!({
            "title": title,
            "body": body,
            "url": url,
            "keys": {
                "p256dh": subscription.p256dh,
                "auth": subscription.auth,
            },
        });

        let mut request = client
            .post(&subscription.endpoint)
            .header("TTL", "3600")
            .header("Urgency", "normal")
            .json(&payload);

        if let (Some(subject), Some(public), Some(private)) = (
            &self.vapid_subject,
            &self.vapid_public_key,
            &self.vapid_private_key,
        ) {
            request = request
                .header("Authorization", format!("WebPush {}", private))
                .header(
                    "Crypto-Key",
                    format!("p256ecdsa={}; sub={}", public, subject),
                );
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Send(format!("{}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(NotifyError::SubscriptionGone);
        }
        if !status.is_success() {
            return Err(NotifyError::Send(format!(
                "push service returned status {}",
                status
            )));
        }

        Ok(())
    }
}
