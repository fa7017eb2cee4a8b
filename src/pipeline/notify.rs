use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use super::domain::Obituary;
use crate::config::NotifierConfig;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid mail address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("mail channel unavailable: {0}")]
    Channel(#[from] lettre::transport::smtp::Error),
    #[error("unable to assemble message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// How a notification fared across the configured recipients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
}

/// Outbound delivery seam. Today's variant is authenticated SMTP; anything
/// that can turn an obituary into a delivered message fits here.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, obituary: &Obituary) -> Result<DeliveryReport, NotifyError>;
}

/// Subject line, derived only from record fields.
pub fn subject(obituary: &Obituary) -> String {
    format!("Nachruf {}", obituary.name)
}

/// Plain-text body, derived only from record fields.
pub fn body(obituary: &Obituary) -> String {
    format!(
        "{}\nVerstorben am {}\n{}",
        obituary.name,
        obituary.date_of_death.format("%d.%m.%Y"),
        obituary.detail_link
    )
}

/// Mails every configured recipient over STARTTLS-secured SMTP.
pub struct EmailNotifier {
    config: NotifierConfig,
}

impl EmailNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }
}

impl Notifier for EmailNotifier {
    async fn notify(&self, obituary: &Obituary) -> Result<DeliveryReport, NotifyError> {
        let sender: Mailbox =
            self.config
                .sender_address
                .parse()
                .map_err(|err| NotifyError::Address {
                    address: self.config.sender_address.clone(),
                    reason: format!("{err}"),
                })?;

        // The channel is scoped to this one notification: built here, dropped
        // on every exit path below.
        let channel = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
            &self.config.server_address,
        )?
        .port(self.config.server_port)
        .credentials(Credentials::new(
            self.config.sender_address.clone(),
            self.config.sender_password.clone(),
        ))
        .build();

        let mut report = DeliveryReport::default();
        for recipient in &self.config.receiver_addresses {
            report.attempted += 1;

            let receiver: Mailbox = match recipient.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    warn!(recipient = %recipient, error = %err, "skipping unparsable recipient");
                    continue;
                }
            };
            let message = Message::builder()
                .from(sender.clone())
                .to(receiver)
                .subject(subject(obituary))
                .body(body(obituary))?;

            // One failed recipient must not cost the remaining ones their
            // notification.
            match channel.send(message).await {
                Ok(_) => report.delivered += 1,
                Err(error) => {
                    warn!(recipient = %recipient, %error, "delivery failed, trying remaining recipients");
                }
            }
        }

        Ok(report)
    }
}
