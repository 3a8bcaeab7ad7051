pub mod secret_store;
pub mod xoauth2;
