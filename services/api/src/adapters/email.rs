//! services/api/src/adapters/email.rs
//!
//! Email delivery adapter implementing the `NotificationService` port.
//!
//! Providers:
//! - `console`: logs the message (development)
//! - `sendgrid`: posts to the SendGrid v3 API
//! - `disabled`: refuses every message

use crate::config::{EmailConfig, EmailProvider};
use async_trait::async_trait;
use lms_core::{EmailMessage, NotificationService, PortError, PortResult};
use tracing::{error, info, warn};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
pub struct EmailAdapter {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailAdapter {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn send_console(&self, message: EmailMessage) -> PortResult<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body");
        Ok(())
    }

    async fn send_sendgrid(&self, api_key: &str, message: EmailMessage) -> PortResult<()> {
        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/plain",
                "value": message.body_text
            }]
        });

        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(PortError::Unexpected(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[async_trait]
impl NotificationService for EmailAdapter {
    async fn send_email(&self, message: EmailMessage) -> PortResult<()> {
        match &self.config.provider {
            EmailProvider::Console => self.send_console(message).await,
            EmailProvider::SendGrid { api_key } => self.send_sendgrid(api_key, message).await,
            EmailProvider::Disabled => {
                warn!(to = %message.to, "Email delivery is disabled; message dropped");
                Err(PortError::Unexpected("Email delivery is disabled".to_string()))
            }
        }
    }
}
