//! Delivery of generated reports over SMTP.
//!
//! Credentials and the sender address come from the [`SettingsStore`] at send
//! time, so changes to the email settings apply to the next message. All
//! preconditions are checked before a connection is opened.

use std::io;
use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};

use crate::settings::{EmailSettings, SettingsStore};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Reasons an email could not be sent. `Display` yields the user-facing reason.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP credentials are not configured")]
    MissingCredentials,

    #[error("sender email address is not configured")]
    MissingSender,

    #[error("no recipients were provided")]
    NoRecipients,

    #[error("attachment not found: {}", .0.display())]
    AttachmentMissing(PathBuf),

    #[error("invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build email message: {0}")]
    Message(String),

    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    #[error("recipient address refused by the server: {0}")]
    RecipientsRefused(String),

    #[error("SMTP server disconnected: {0}")]
    Disconnected(String),

    #[error("failed to send email: {0}")]
    Transport(String),

    #[error("email settings unavailable: {0}")]
    Settings(#[from] sqlx::Error),
}

impl EmailError {
    /// Classifies an SMTP failure by reply code and underlying I/O error.
    fn from_smtp(err: lettre::transport::smtp::Error) -> Self {
        let code = err.status().map(|code| code.to_string());
        let io_kind = io_error_kind(&err);
        classify(code.as_deref(), io_kind, err.to_string())
    }
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(error) = current {
        if let Some(io_err) = error.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = error.source();
    }
    None
}

fn classify(code: Option<&str>, io_kind: Option<io::ErrorKind>, detail: String) -> EmailError {
    match code {
        Some("530") | Some("534") | Some("535") => return EmailError::Authentication(detail),
        Some("550") | Some("551") | Some("552") | Some("553") => {
            return EmailError::RecipientsRefused(detail)
        }
        _ => {}
    }
    match io_kind {
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected,
        ) => EmailError::Disconnected(detail),
        _ => EmailError::Transport(detail),
    }
}

/// Body of a report email: the caller's message, the attachment name and a sign-off.
pub fn compose_body(message: &str, filename: &str, signature: &str) -> String {
    let mut body = String::new();
    let message = message.trim();
    if !message.is_empty() {
        body.push_str(message);
        body.push_str("\n\n");
    }
    body.push_str(&format!("Please find attached the report: {}\n\n", filename));
    body.push_str("Best regards,\n");
    body.push_str(signature);
    body.push('\n');
    body
}

/// Everything checked before any network activity.
struct Prepared {
    username: String,
    password: String,
    sender: String,
    recipients: Vec<String>,
    attachment: PathBuf,
    filename: String,
}

fn check_preconditions(
    settings: &EmailSettings,
    filepath: &Path,
    recipients: &[String],
) -> Result<Prepared, EmailError> {
    let (username, password) = match (&settings.email_username, &settings.email_password) {
        (Some(username), Some(password)) => (username.clone(), password.clone()),
        _ => return Err(EmailError::MissingCredentials),
    };
    let sender = settings
        .sender_email
        .clone()
        .ok_or(EmailError::MissingSender)?;

    let recipients: Vec<String> = recipients
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        return Err(EmailError::NoRecipients);
    }

    if !filepath.is_file() {
        return Err(EmailError::AttachmentMissing(filepath.to_path_buf()));
    }
    let filename = filepath
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| EmailError::AttachmentMissing(filepath.to_path_buf()))?;

    Ok(Prepared {
        username,
        password,
        sender,
        recipients,
        attachment: filepath.to_path_buf(),
        filename,
    })
}

fn mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| EmailError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

/// Sends report artifacts with the SMTP settings from a [`SettingsStore`].
#[derive(Clone)]
pub struct EmailDispatcher {
    settings: SettingsStore,
}

impl EmailDispatcher {
    pub fn new(settings: SettingsStore) -> Self {
        Self { settings }
    }

    /// Sends `filepath` to `recipients` and reports `(success, reason)`.
    pub async fn send(
        &self,
        filepath: &Path,
        recipients: &[String],
        subject: &str,
        message: &str,
    ) -> (bool, String) {
        match self.try_send(filepath, recipients, subject, message).await {
            Ok(count) => (
                true,
                format!("Email sent successfully to {} recipient(s)", count),
            ),
            Err(err) => {
                error!("Failed to email {}: {}", filepath.display(), err);
                (false, err.to_string())
            }
        }
    }

    /// Sends `filepath` as a PDF attachment; returns the number of recipients.
    pub async fn try_send(
        &self,
        filepath: &Path,
        recipients: &[String],
        subject: &str,
        message: &str,
    ) -> Result<usize, EmailError> {
        let settings = self.settings.email().await?;
        let prepared = check_preconditions(&settings, filepath, recipients)?;

        let signature = match &settings.sender_name {
            Some(name) => name.clone(),
            None => self.settings.company().await?.company_name,
        };

        let from = match &settings.sender_name {
            Some(name) => mailbox(&format!("{} <{}>", name, prepared.sender))?,
            None => mailbox(&prepared.sender)?,
        };
        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in &prepared.recipients {
            builder = builder.to(mailbox(recipient)?);
        }

        let bytes = tokio::fs::read(&prepared.attachment)
            .await
            .map_err(|source| EmailError::Attachment {
                path: prepared.attachment.clone(),
                source,
            })?;
        let pdf = ContentType::parse(PDF_CONTENT_TYPE)
            .map_err(|err| EmailError::Message(err.to_string()))?;
        let body = compose_body(message, &prepared.filename, &signature);

        let email = builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body))
                    .singlepart(Attachment::new(prepared.filename.clone()).body(bytes, pdf)),
            )
            .map_err(|err| EmailError::Message(err.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
            .map_err(EmailError::from_smtp)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(prepared.username, prepared.password))
            .build();

        transport.send(email).await.map_err(EmailError::from_smtp)?;

        info!(
            "Emailed {} to {} recipient(s)",
            prepared.filename,
            prepared.recipients.len()
        );
        Ok(prepared.recipients.len())
    }
}
