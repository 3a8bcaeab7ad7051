//! Message composition and sending.
//!
//! [`EzSender`] accumulates body blocks and attachments, then delivers one
//! message per recipient over a single SMTP session.
//!
//! ```ignore
//! let config = SendConfig::new(
//!     ServerConfig::new("smtp.domain.com", 587),
//!     SenderCredentials::new("me@domain.com", "secret"),
//! )?;
//! let mut ez = EzSender::new(config);
//! ez.set_subject("Welcome!");
//! ez.add_text("<h1>Hello!</h1><p>Welcome to our platform.</p>");
//! ez.add_attachment("report.pdf")?;
//! let result = ez.send(vec!["a@domain.com", "b@domain.com"])?;
//! ```

pub mod body;
pub mod builder;

use lettre::Transport;
use log::info;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::config::SendConfig;
use crate::domain::email::{ContentBlock, DeliveryResult, ImageBlock, Recipients};
use crate::error::{EzmailError, Result};
use crate::smtp::driver;
use crate::smtp::rate_limit::{CancelToken, RateLimiter};
use crate::template::render_template;

use builder::MessageParts;

/// Optional sizing and content-id for [`EzSender::add_image`].
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub width: Option<String>,
    pub height: Option<String>,
    pub cid: Option<String>,
}

/// Composes and sends emails.
///
/// The body and attachment list are owned by the sender and must not change
/// while a `send` is running; `&mut self` enforces that within one thread.
pub struct EzSender {
    config: SendConfig,
    subject: Option<String>,
    body: Vec<ContentBlock>,
    attachments: Vec<PathBuf>,
    cancel: CancelToken,
}

impl EzSender {
    pub fn new(config: SendConfig) -> Self {
        Self {
            config,
            subject: None,
            body: Vec::new(),
            attachments: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &SendConfig {
        &self.config
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = Some(subject.into());
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> &[ContentBlock] {
        &self.body
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Appends text or HTML to the body.
    pub fn add_text(&mut self, html: impl Into<String>) {
        self.body.push(ContentBlock::Text(html.into()));
    }

    /// Renders a `.html` template with `tera` and appends the result.
    pub fn use_template(&mut self, file: impl AsRef<Path>, context: &tera::Context) -> Result<()> {
        let html = render_template(file.as_ref(), context)?;
        self.add_text(html);
        Ok(())
    }

    /// Queues an inline image. The file must exist now; if it disappears
    /// before sending it is skipped.
    pub fn add_image(&mut self, path: impl AsRef<Path>, options: ImageOptions) -> Result<()> {
        let path = existing_file(path.as_ref())?;
        self.body.push(ContentBlock::Image(ImageBlock {
            path,
            width: options.width,
            height: options.height,
            cid: options.cid,
        }));
        Ok(())
    }

    /// Queues a file attachment. It is read at send time, once per recipient.
    pub fn add_attachment(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = existing_file(path.as_ref())?;
        self.attachments.push(path);
        Ok(())
    }

    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// Token that aborts the current or next batch, including a pending
    /// rate-limit pause. It is cleared once that batch returns.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sends the composed message to every recipient individually.
    ///
    /// Only a failure to open the SMTP session is returned as an error;
    /// per-recipient failures are collected in the result.
    pub fn send(&mut self, recipients: impl Into<Recipients>) -> Result<DeliveryResult> {
        // the pooled connection closes when `transport` drops
        let transport = driver::connect(&self.config)?;
        Ok(self.send_with(&transport, recipients))
    }

    /// Same as [`send`](Self::send) over an already established transport.
    pub fn send_with<T>(&mut self, transport: &T, recipients: impl Into<Recipients>) -> DeliveryResult
    where
        T: Transport,
        T::Error: Display,
    {
        let recipients = recipients.into().normalized();
        info!("sending to {} recipient(s)", recipients.len());

        let assembled = body::assemble(&self.body);
        let parts = MessageParts {
            from: &self.config.sender.email,
            subject: self.subject.as_deref(),
            html: &assembled.html,
            inline_images: &assembled.inline_images,
            attachments: &self.attachments,
        };
        let mut limiter = RateLimiter::hourly(self.config.max_emails_per_hour, self.cancel.clone());

        let result = driver::deliver(transport, &parts, &recipients, &mut limiter);
        self.cancel.reset();
        result
    }
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(EzmailError::InvalidInput("the path/file must not be empty".into()));
    }
    if !path.is_file() {
        return Err(EzmailError::NotFound(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}
