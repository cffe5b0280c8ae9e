//! Outbound transactional email: share invitations, completion notices, and a
//! configuration self-test.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::MailConfig;

const MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("mail transport not configured: set MAILGUN_API_KEY and MAILGUN_DOMAIN")]
    NotConfigured,
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("mail provider rejected the request for {recipient}: http {status}: {body}")]
    Rejected {
        recipient: String,
        status: u16,
        body: String,
    },
    #[error("{failed} of {attempted} completion notices failed: {details}")]
    PartialSend {
        failed: usize,
        attempted: usize,
        details: String,
    },
}

/// Seam for dispatching transactional email. Callers treat every send as
/// fire-and-forget: a failure never rolls back the mutation that triggered it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_share_invitation(
        &self,
        task_id: Uuid,
        task_title: &str,
        recipient_email: &str,
        sender_name: &str,
        sender_email: &str,
    ) -> Result<(), NotificationError>;

    /// One message per recipient; a failed recipient must not block the rest.
    async fn send_completion_notice(
        &self,
        task_title: &str,
        owner_display_name: &str,
        recipient_emails: &[String],
    ) -> Result<(), NotificationError>;

    /// Sends a throwaway message to verify the mail configuration.
    async fn send_test(&self, recipient_email: &str) -> Result<(), NotificationError>;
}

/// Mailgun-backed dispatcher.
pub struct MailgunMailer {
    http: Client,
    config: Option<MailConfig>,
}

impl MailgunMailer {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: Option<MailConfig>) -> Result<Self, NotificationError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("daytally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn config(&self) -> Result<&MailConfig, NotificationError> {
        self.config.as_ref().ok_or(NotificationError::NotConfigured)
    }

    async fn send_message(
        &self,
        recipient: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), NotificationError> {
        let config = self.config()?;
        let from = format!("{} <mailgun@{}>", config.sender_name, config.domain);
        let params = [
            ("from", from.as_str()),
            ("to", recipient),
            ("subject", subject),
            ("html", html),
        ];

        let res = self
            .http
            .post(format!("{MAILGUN_API_BASE}/{}/messages", config.domain))
            .basic_auth("api", Some(&config.api_key))
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            status if status.is_success() => Ok(()),
            status => {
                let status = status.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(NotificationError::Rejected {
                    recipient: recipient.to_string(),
                    status,
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send_share_invitation(
        &self,
        task_id: Uuid,
        task_title: &str,
        recipient_email: &str,
        sender_name: &str,
        sender_email: &str,
    ) -> Result<(), NotificationError> {
        info!(
            task_id = %task_id,
            recipient = %recipient_email,
            "sending share invitation"
        );
        self.send_message(
            recipient_email,
            &share_invitation_subject(sender_name),
            &share_invitation_body(task_title, sender_name, sender_email),
        )
        .await
    }

    async fn send_completion_notice(
        &self,
        task_title: &str,
        owner_display_name: &str,
        recipient_emails: &[String],
    ) -> Result<(), NotificationError> {
        let subject = completion_notice_subject(owner_display_name);
        let body = completion_notice_body(task_title, owner_display_name);

        let mut failures = Vec::new();
        for recipient in recipient_emails {
            if let Err(e) = self.send_message(recipient, &subject, &body).await {
                warn!(recipient = %recipient, error = %e, "completion notice failed");
                failures.push((recipient.clone(), e));
            }
        }

        if failures.is_empty() {
            info!(
                recipients = recipient_emails.len(),
                "completion notices sent"
            );
            Ok(())
        } else {
            Err(partial_send_error(&failures, recipient_emails.len()))
        }
    }

    async fn send_test(&self, recipient_email: &str) -> Result<(), NotificationError> {
        self.send_message(
            recipient_email,
            "Daytally test email",
            "<p>Your Daytally mail configuration works.</p>",
        )
        .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> NotificationError {
    if e.is_timeout() {
        NotificationError::Timeout
    } else {
        NotificationError::Transport(e.to_string())
    }
}

fn partial_send_error(
    failures: &[(String, NotificationError)],
    attempted: usize,
) -> NotificationError {
    let details = failures
        .iter()
        .map(|(recipient, error)| format!("{recipient}: {error}"))
        .collect::<Vec<_>>()
        .join("; ");
    NotificationError::PartialSend {
        failed: failures.len(),
        attempted,
        details,
    }
}

fn share_invitation_subject(sender_name: &str) -> String {
    format!("{sender_name} wants your help staying accountable")
}

fn share_invitation_body(task_title: &str, sender_name: &str, sender_email: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Help {sender_name} stay accountable</h2>
  <p>{sender_name} has shared a task with you for accountability:</p>
  <div style="background-color: #f7f7f7; padding: 15px; border-radius: 5px; margin: 20px 0;">
    <strong>Task:</strong> {task_title}
  </div>
  <p>They've asked for your support in making sure they complete this task.</p>
  <p>You'll receive updates when they complete it!</p>
  <p>Reply directly to {sender_email} if you have any questions.</p>
</div>"#
    )
}

fn completion_notice_subject(owner_display_name: &str) -> String {
    format!("{owner_display_name} has completed a task")
}

fn completion_notice_body(task_title: &str, owner_display_name: &str) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Task Completed!</h2>
  <p>Good news! {owner_display_name} has successfully completed a task you were keeping them accountable for:</p>
  <div style="border-left: 4px solid #10b981; padding: 12px 16px; background-color: #f9fafb; margin: 24px 0;">
    <h3 style="margin: 0; color: #064e3b;">{task_title}</h3>
  </div>
  <p>Thank you for helping keep them accountable!</p>
</div>"#
    )
}
