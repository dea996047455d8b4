use axum::async_trait;
use tracing::info;

use crate::config::MailConfig;

/// Outbound email capability. Transport details stay behind this trait;
/// callers never wait on delivery and never see delivery errors.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()>;
}

/// Writes every email to the log instead of sending it. This is the
/// console-delivery mode used in development and the default wiring.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: String) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        let preview: String = html_body.chars().take(100).collect();
        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            preview = %preview,
            "email console delivery"
        );
        Ok(())
    }
}

/// Records sent mail for assertions. Shares the fake-collaborator role with
/// the in-memory credential store.
#[derive(Default)]
pub struct RecordingMailer {
    sent: tokio::sync::Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        self.sent.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

pub struct MailContent {
    pub subject: String,
    pub html_body: String,
}

pub fn verification_email(cfg: &MailConfig, username: &str, token: &str) -> MailContent {
    let name = &cfg.from_name;
    let link = format!("{}/verify-email?token={}", cfg.frontend_url, token);
    MailContent {
        subject: format!("{name} - Verify Your Email Address"),
        html_body: format!(
            "<p>Hello {username},</p>\n\
             <p>Thanks for signing up with {name}! Please verify your email address by clicking the link below:</p>\n\
             <p><a href=\"{link}\">{link}</a></p>\n\
             <p>If you did not sign up for this account, please ignore this email.</p>\n\
             <p>Thanks,</p>\n\
             <p>The {name} Team</p>"
        ),
    }
}

pub fn password_reset_email(cfg: &MailConfig, username: &str, token: &str) -> MailContent {
    let name = &cfg.from_name;
    let link = format!("{}/reset-password?token={}", cfg.frontend_url, token);
    MailContent {
        subject: format!("{name} - Password Reset Request"),
        html_body: format!(
            "<p>Hello {username},</p>\n\
             <p>You requested a password reset for your account with {name}.</p>\n\
             <p>Click this link to reset your password: <a href=\"{link}\">{link}</a></p>\n\
             <p>If you did not request this, please ignore this email.</p>\n\
             <p>Thanks,</p>\n\
             <p>The {name} Team</p>"
        ),
    }
}
