use std::str::FromStr;

use lettre::{
    Message, SmtpTransport, Transport,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use scratch_app::ports::email::{EmailMessage, EmailPort, SendEmailError};

#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerSetupError {
    #[error("Invalid sender address {0}: {1}")]
    InvalidSender(String, String),
    #[error("Failed to create SMTP transport: {0}")]
    Transport(String),
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendEmailError> {
    Mailbox::from_str(address)
        .map_err(|e| SendEmailError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Builds the MIME message: text with an optional HTML alternative, wrapped in
/// a mixed part when there are attachments.
pub fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message, SendEmailError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(message.subject.clone());
    for to in &message.to {
        builder = builder.to(parse_mailbox(to)?);
    }

    let body = match &message.html_body {
        Some(html) => MultiPart::alternative_plain_html(message.text_body.clone(), html.clone()),
        None => MultiPart::alternative().singlepart(SinglePart::plain(message.text_body.clone())),
    };
    let body = if message.attachments.is_empty() {
        body
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| SendEmailError::Build(e.to_string()))?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        mixed
    };

    builder
        .multipart(body)
        .map_err(|e| SendEmailError::Build(e.to_string()))
}

pub struct LettreEmailAdapter {
    transport: SmtpTransport,
    from: Mailbox,
}

impl LettreEmailAdapter {
    pub fn new(settings: &SmtpSettings, from: &str) -> Result<Self, MailerSetupError> {
        let from = Mailbox::from_str(from)
            .map_err(|e| MailerSetupError::InvalidSender(from.to_string(), e.to_string()))?;
        let transport = SmtpTransport::relay(&settings.host)
            .map_err(|e| MailerSetupError::Transport(e.to_string()))?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

impl EmailPort for LettreEmailAdapter {
    fn send_email(&self, message: &EmailMessage) -> Result<(), SendEmailError> {
        let email = build_message(&self.from, message)?;
        self.transport
            .send(&email)
            .map_err(|e| SendEmailError::Transport(e.to_string()))?;
        log::info!("Sent '{}' to {:?}", message.subject, message.to);
        Ok(())
    }
}

/// Used when no mail server is configured. Messages are only logged.
pub struct LogEmailAdapter;

impl EmailPort for LogEmailAdapter {
    fn send_email(&self, message: &EmailMessage) -> Result<(), SendEmailError> {
        log::warn!(
            "No mail server configured, dropping '{}' to {:?}",
            message.subject,
            message.to
        );
        log::debug!("{}", message.text_body);
        Ok(())
    }
}

pub enum MailerAdapter {
    Smtp(LettreEmailAdapter),
    Log(LogEmailAdapter),
}

impl MailerAdapter {
    /// SMTP when settings are given, otherwise log-only.
    pub fn from_settings(
        settings: Option<&SmtpSettings>,
        from: &str,
    ) -> Result<Self, MailerSetupError> {
        match settings {
            Some(settings) => Ok(Self::Smtp(LettreEmailAdapter::new(settings, from)?)),
            None => Ok(Self::Log(LogEmailAdapter)),
        }
    }
}

impl EmailPort for MailerAdapter {
    fn send_email(&self, message: &EmailMessage) -> Result<(), SendEmailError> {
        match self {
            Self::Smtp(adapter) => adapter.send_email(message),
            Self::Log(adapter) => adapter.send_email(message),
        }
    }
}
