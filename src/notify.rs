//! Outbound notification collaborator boundary.

use tracing::info;

pub trait Mailer: Send + Sync {
    fn send(&self, address: &str, subject: &str, body: &str);
}

/// Development stand-in that writes the message to the server log instead of
/// dispatching email. Must be replaced by a real channel in production.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, address: &str, subject: &str, body: &str) {
        info!(to = %address, subject = %subject, body = %body, "Outbound mail (logged, not sent)");
    }
}
