//! Mailbox reading: IMAP search expressions, sessions and message decoding.

pub mod decoders;
pub mod imap_client;
pub mod query;
