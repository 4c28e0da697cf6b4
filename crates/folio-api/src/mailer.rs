use anyhow::Result;
use tracing::info;

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail delivery.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Writes every message to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(from = %mail.from, to = %mail.to, subject = %mail.subject, "Outgoing mail:\n{}", mail.body);
        Ok(())
    }
}
