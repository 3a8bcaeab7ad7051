//! Email composition, delivery and retrieval over SMTP and IMAP.
//!
//! Sending goes through [`EzSender`]: add text, templates, inline images and
//! attachments, then deliver one message per recipient. Reading goes through
//! [`EzReader`]: connect, search with a [`SearchQuery`] and get back
//! [`EzMail`] values with their attachments in memory.

pub mod auth;
pub mod compose;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod smtp;
pub mod template;

pub use compose::{EzSender, ImageOptions};
pub use config::{AccountCredentials, AuthType, ReadConfig, SendConfig, SenderCredentials, ServerConfig};
pub use domain::email::{DeliveryResult, EzMail, MailAttachment, Recipients};
pub use error::{EzmailError, Result};
pub use mail::imap_client::EzReader;
pub use mail::query::SearchQuery;
pub use smtp::rate_limit::CancelToken;
