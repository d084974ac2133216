//! Notification backends.
//!
//! Each backend is polymorphic over the same two operations: compose a
//! message from sender/recipients/subject/body, and deliver a composed
//! message. The orchestrator never branches on which backend is active; "no
//! backend configured" is simply `None` at the pipeline level.

pub mod gmail;
pub mod smtp;

pub use gmail::GmailNotifier;
pub use smtp::SmtpNotifier;

use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::Message;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build failed: {0}")]
    Compose(#[from] lettre::error::Error),

    #[error("message was not composed by this backend")]
    UnsupportedMessage,

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("mail API error: {0}")]
    Api(String),
}

/// A composed message, in whichever form the backend delivers.
pub enum OutboundMessage {
    /// Plain MIME message for transports that speak it directly.
    Mime(Box<Message>),
    /// Base64url-encoded MIME, as mail APIs expect it on the wire.
    Encoded(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn compose(
        &self,
        sender: &str,
        recipients: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<OutboundMessage, NotifyError>;

    async fn deliver(&self, message: OutboundMessage) -> Result<(), NotifyError>;
}

/// Build the multipart HTML message both backends start from. `recipients` is
/// the comma-joined contact list.
pub(crate) fn build_mime(
    sender: &str,
    recipients: &str,
    subject: &str,
    html_body: &str,
) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(sender.parse::<Mailbox>()?)
        .subject(subject);

    for recipient in recipients.split(',') {
        let recipient = recipient.trim();
        if !recipient.is_empty() {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
    }

    let message = builder.multipart(
        MultiPart::alternative().singlepart(
            SinglePart::builder()
                .header(header::ContentType::TEXT_HTML)
                .body(html_body.to_string()),
        ),
    )?;
    Ok(message)
}
