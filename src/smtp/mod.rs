//! SMTP delivery: one session per batch, one message per recipient.

pub mod driver;
pub mod rate_limit;
