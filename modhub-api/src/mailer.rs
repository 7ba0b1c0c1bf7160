/// Outgoing account mail. Delivery itself is handled outside this service.
pub trait Mailer: Send + Sync {
    fn send_password_reset(&self, email: &str, reset_link: &str) -> anyhow::Result<()>;
}

/// Records the dispatch in the log instead of sending anything.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_password_reset(&self, email: &str, _reset_link: &str) -> anyhow::Result<()> {
        tracing::info!(email = %email, "password reset mail dispatched");
        Ok(())
    }
}
