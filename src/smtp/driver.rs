use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use log::{debug, info, warn};
use std::fmt::Display;
use std::time::Duration;

use crate::compose::builder::{MessageParts, build_message};
use crate::config::SendConfig;
use crate::domain::email::DeliveryResult;
use crate::error::{EzmailError, Result};
use crate::smtp::rate_limit::{Cancelled, RateLimiter};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the authenticated SMTP session used for a whole batch.
///
/// Port 587 upgrades with STARTTLS, any other port uses implicit TLS. The
/// session is verified here so that bad credentials fail the batch up front.
pub fn connect(config: &SendConfig) -> Result<SmtpTransport> {
    let wrap = |e: &dyn Display| {
        EzmailError::Connection(format!("failed to prepare or connect to the SMTP server: {e}"))
    };

    let relay = if config.uses_starttls() {
        SmtpTransport::starttls_relay(&config.smtp.server)
    } else {
        SmtpTransport::relay(&config.smtp.server)
    };
    let builder = relay.map_err(|e| wrap(&e))?;

    let creds = Credentials::new(config.sender.email.clone(), config.sender.password.clone());
    let transport = builder
        .port(config.smtp.port)
        .credentials(creds)
        .timeout(Some(CONNECT_TIMEOUT))
        .build();

    match transport.test_connection() {
        Ok(true) => {
            info!("connected to {}:{}", config.smtp.server, config.smtp.port);
            Ok(transport)
        }
        Ok(false) => Err(wrap(&"server closed the session")),
        Err(e) => Err(wrap(&e)),
    }
}

/// Sends one message per recipient over `transport`.
///
/// A failure for one recipient is recorded and the loop moves on. Cancellation
/// (through the limiter's token) marks every recipient not yet attempted as
/// failed, so each recipient still ends up in exactly one bucket.
pub fn deliver<T>(
    transport: &T,
    parts: &MessageParts<'_>,
    recipients: &[String],
    limiter: &mut RateLimiter,
) -> DeliveryResult
where
    T: Transport,
    T::Error: Display,
{
    let mut result = DeliveryResult::default();

    for (idx, recipient) in recipients.iter().enumerate() {
        if limiter.is_cancelled() {
            mark_cancelled(&mut result, &recipients[idx..]);
            break;
        }

        let outcome = build_message(parts, recipient)
            .map_err(|e| e.to_string())
            .and_then(|msg| transport.send(&msg).map(|_| ()).map_err(|e| e.to_string()));

        match outcome {
            Ok(()) => {
                debug!("sent to {recipient}");
                result.sent.push(recipient.clone());
                if let Err(Cancelled) = limiter.record_send() {
                    mark_cancelled(&mut result, &recipients[idx + 1..]);
                    break;
                }
            }
            Err(e) => {
                warn!("delivery to {recipient} failed: {e}");
                result.failed.insert(recipient.clone(), e);
            }
        }
    }

    info!(
        "batch finished: {} sent, {} failed",
        result.sent.len(),
        result.failed.len()
    );
    result
}

fn mark_cancelled(result: &mut DeliveryResult, rest: &[String]) {
    for r in rest {
        result.failed.insert(r.clone(), Cancelled.to_string());
    }
}
