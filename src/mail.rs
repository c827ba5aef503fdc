//! Mailing the report to the development list and affected maintainers.

use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build mail: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Failed to send mail via {host}: {source}")]
    Smtp {
        host: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("Mail task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: Vec<String>,
    /// Delivered through the envelope only, never listed in the headers.
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// `Orphaned Packages in <release> (<YYYY-MM-DD>)`
pub fn subject(release: &str, date: DateTime<Utc>) -> String {
    format!(
        "Orphaned Packages in {} ({})",
        release,
        date.format("%Y-%m-%d")
    )
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

impl Mail {
    pub fn build_message(&self) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(mailbox(&self.from)?)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(mailbox(to)?);
        }
        for bcc in &self.bcc {
            builder = builder.bcc(mailbox(bcc)?);
        }
        Ok(builder.body(self.body.clone())?)
    }
}

/// Unencrypted SMTP relay.
#[derive(Debug, Clone)]
pub struct Mailer {
    host: String,
    port: u16,
}

impl Mailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let message = mail.build_message()?;
        let recipients = message.envelope().to().len();
        let host = self.host.clone();
        let port = self.port;

        debug!(host = %host, port, recipients, "Sending mail");
        let result = tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::builder_dangerous(host.as_str())
                .port(port)
                .build();
            transport
                .send(&message)
                .map(|_| ())
                .map_err(|source| MailError::Smtp { host, source })
        })
        .await
        .map_err(|e| MailError::Task(e.to_string()))?;

        result?;
        info!(subject = %mail.subject, recipients, "Mail sent");
        Ok(())
    }
}
