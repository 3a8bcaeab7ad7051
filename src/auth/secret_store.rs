use keyring::{Entry, Error as KeyringError};

use crate::error::{EzmailError, Result};

const SERVICE: &str = "ezmail";

/// Save a password or OAuth2 access token into the OS keyring for the given email
pub fn save_secret(email: &str, secret: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, email).map_err(|e| EzmailError::Secret(e.to_string()))?;
    entry
        .set_password(secret)
        .map_err(|e| EzmailError::Secret(e.to_string()))?;
    Ok(())
}

/// Load the secret stored for the given email, if any
pub fn load_secret(email: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, email).map_err(|e| EzmailError::Secret(e.to_string()))?;
    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(EzmailError::Secret(e.to_string())),
    }
}
