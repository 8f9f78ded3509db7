//! Verification email dispatch.
//!
//! Delivery is a best-effort side channel: the token write is durable before
//! any send is attempted, and a failed send degrades the response (the caller
//! gets the raw link back) instead of failing the request. When SMTP is not
//! configured the dispatcher logs the link so local development and broken
//! deployments stay self-serviceable.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;

/// Errors that can occur when building the mail transport or a message.
///
/// Send-time errors are deliberately not part of any public signature —
/// dispatch absorbs them into a non-delivered [`Dispatch`].
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Whether the message was handed to the SMTP transport successfully.
    pub delivered: bool,
    /// The verification link, always available so a non-delivered outcome
    /// can still surface it to the caller.
    pub verification_link: String,
}

/// Capability for sending verification emails.
///
/// Injected into the auth service; handlers never branch on SMTP
/// configuration themselves.
pub enum Mailer {
    /// Real delivery over SMTP.
    Smtp(SmtpMailer),
    /// No transport configured: log the link instead.
    LinkLog,
}

/// SMTP-backed mailer using STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Build a mailer from optional SMTP configuration.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Smtp` if the relay parameters are unusable.
    pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Self, EmailError> {
        match smtp {
            Some(config) => {
                let credentials = Credentials::new(
                    config.username.clone(),
                    config.password.expose_secret().to_string(),
                );

                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
                        .port(config.port)
                        .credentials(credentials)
                        .build();

                Ok(Self::Smtp(SmtpMailer {
                    transport,
                    from_address: config.from_address.clone(),
                }))
            }
            None => Ok(Self::LinkLog),
        }
    }

    /// Whether a real SMTP transport is configured.
    #[must_use]
    pub const fn is_smtp(&self) -> bool {
        matches!(self, Self::Smtp(_))
    }

    /// Probe the SMTP connection at startup. Warn-only: a broken relay must
    /// not prevent the server from starting, since dispatch degrades to
    /// logged links anyway.
    pub async fn check_connection(&self) {
        match self {
            Self::Smtp(mailer) => match mailer.transport.test_connection().await {
                Ok(true) => tracing::info!("SMTP connection verified"),
                Ok(false) => tracing::warn!("SMTP connection test failed; mail may not send"),
                Err(e) => {
                    tracing::warn!(error = %e, "SMTP connection test failed; mail may not send");
                }
            },
            Self::LinkLog => {
                tracing::info!("SMTP not configured; verification links will be logged");
            }
        }
    }

    /// Send a verification email, best-effort.
    ///
    /// Never fails: a send error is logged and reported as a non-delivered
    /// outcome carrying the link.
    pub async fn send_verification(
        &self,
        to: &str,
        username: &str,
        verification_link: &str,
        ttl_minutes: i64,
    ) -> Dispatch {
        match self {
            Self::Smtp(mailer) => {
                match mailer
                    .send_verification(to, username, verification_link, ttl_minutes)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(to = %to, "verification email sent");
                        Dispatch {
                            delivered: true,
                            verification_link: verification_link.to_string(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(to = %to, error = %e, "verification email send failed");
                        Dispatch {
                            delivered: false,
                            verification_link: verification_link.to_string(),
                        }
                    }
                }
            }
            Self::LinkLog => {
                tracing::info!(to = %to, link = %verification_link, "verification link (SMTP not configured)");
                Dispatch {
                    delivered: false,
                    verification_link: verification_link.to_string(),
                }
            }
        }
    }
}

impl SmtpMailer {
    async fn send_verification(
        &self,
        to: &str,
        username: &str,
        verification_link: &str,
        ttl_minutes: i64,
    ) -> Result<(), EmailError> {
        let text = format!(
            "Hi {username},\n\nOpen this link to verify your account: {verification_link}\n\n\
             The link expires in {ttl_minutes} minutes."
        );
        let html = format!(
            "<p>Hi <strong>{username}</strong>,</p>\
             <p>Click the link below to verify your account:</p>\
             <p><a href=\"{verification_link}\">{verification_link}</a></p>\
             <p>The link expires in {ttl_minutes} minutes.</p>"
        );

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject("Verify your Copperleaf account")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.transport.send(email).await?;
        Ok(())
    }
}
