use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

impl EmailMessage {
    pub fn new(to: &str, subject: &str, text_body: String) -> Self {
        Self {
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text_body,
            html_body: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_html(mut self, html_body: String) -> Self {
        self.html_body = Some(html_body);
        self
    }

    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SendEmailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Sending blocks on the mail transport.
pub trait EmailPort {
    fn send_email(&self, message: &EmailMessage) -> Result<(), SendEmailError>;
}

/// Hands the message to a blocking worker thread and returns immediately.
pub fn send_email_async<E: EmailPort + Send + Sync + 'static>(
    email_port: Arc<E>,
    message: EmailMessage,
) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = email_port.send_email(&message) {
            log::error!("Failed to send email '{}': {}", message.subject, e);
        }
    });
}
