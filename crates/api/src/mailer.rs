//! Outbound notification delivery (verification codes, reset links).
//!
//! [`SmtpNotifier`] wraps the `lettre` async SMTP transport to send
//! plain-text emails. Configuration is loaded from environment variables; if
//! `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and the
//! app falls back to [`NoopNotifier`], which only logs. Delivery is always
//! fire-and-forget from the caller's perspective: a failed send never fails
//! the request that triggered it.

use async_trait::async_trait;

/// Error type for notification delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

/// Delivers out-of-band notifications to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a one-time verification code.
    async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        context: &str,
    ) -> Result<(), NotifyError>;

    /// Send a password-reset token.
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@canopy.local";

/// Configuration for the SMTP notifier.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | --                       |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@canopy.local`  |
    /// | `SMTP_USER`     | no       | --                       |
    /// | `SMTP_PASSWORD` | no       | --                       |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpNotifier
// ---------------------------------------------------------------------------

/// Sends notification emails via SMTP.
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn deliver(&self, to_email: &str, subject: &str, body: String) -> Result<(), NotifyError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(to = to_email, subject, "Notification email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        context: &str,
    ) -> Result<(), NotifyError> {
        let subject = format!("[Canopy] Verification code ({context})");
        let body = format!(
            "Your verification code is: {code}\n\nIt expires in a few minutes. \
             If you did not request this, you can ignore this message."
        );
        self.deliver(to, &subject, body).await
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), NotifyError> {
        let body = format!(
            "Use the following token to reset your password: {token}\n\n\
             If you did not request a reset, you can ignore this message."
        );
        self.deliver(to, "[Canopy] Password reset", body).await
    }
}

// ---------------------------------------------------------------------------
// NoopNotifier
// ---------------------------------------------------------------------------

/// Fallback notifier when SMTP is not configured: logs and discards.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_verification_code(
        &self,
        to: &str,
        _code: &str,
        context: &str,
    ) -> Result<(), NotifyError> {
        tracing::warn!(to, context, "SMTP not configured, verification code not delivered");
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, _token: &str) -> Result<(), NotifyError> {
        tracing::warn!(to, "SMTP not configured, password reset token not delivered");
        Ok(())
    }
}
