use super::{build_mime, Notifier, NotifyError, OutboundMessage};
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

/// SMTP backend: authenticated session to a configured host/port.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpNotifier {
    pub fn new(host: &str, port: u16, login: String, password: String) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .port(port)
            .credentials(Credentials::new(login, password))
            .build();
        Ok(Self {
            transport,
            host: host.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn compose(
        &self,
        sender: &str,
        recipients: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<OutboundMessage, NotifyError> {
        let message = build_mime(sender, recipients, subject, html_body)?;
        Ok(OutboundMessage::Mime(Box::new(message)))
    }

    async fn deliver(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        let OutboundMessage::Mime(message) = message else {
            return Err(NotifyError::UnsupportedMessage);
        };
        let response = self.transport.send(*message).await?;
        info!("SMTP delivery via {} accepted: {:?}", self.host, response.code());
        Ok(())
    }
}
