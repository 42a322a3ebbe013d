use tandem_shared::clients::email::EmailClient;

/// Outbound message delivery. Errors carry a human-readable cause.
#[axum::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), String>;
}

#[axum::async_trait]
impl Notifier for EmailClient {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), String> {
        self.send_email(to, subject, html).await
    }
}

/// Logs the envelope instead of delivering. Bodies may hold tokens and are not logged.
pub struct ConsoleNotifier;

#[axum::async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), String> {
        tracing::info!(to = %to, subject = %subject, body_len = html.len(), "notification (console mailer)");
        Ok(())
    }
}

pub fn password_reset_email(link: &str, valid_minutes: i64) -> (String, String) {
    let subject = "Reset your Tandem password".to_string();
    let html = format!(
        "<p>We received a request to reset your password.</p>\
         <p><a href=\"{link}\">Choose a new password</a></p>\
         <p>This link expires in {valid_minutes} minutes. If you did not ask for it, ignore this email.</p>"
    );
    (subject, html)
}
