use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::auth::secret_store;
use crate::error::{EzmailError, Result};

/// Host and port of an SMTP or IMAP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() || self.port == 0 {
            return Err(EzmailError::Config(
                "the keys 'server' and 'port' must be provided".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCredentials {
    pub email: String,
    pub password: String,
}

impl SenderCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// keep passwords out of debug logs
impl fmt::Debug for SenderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Everything the delivery side needs, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendConfig {
    pub smtp: ServerConfig,
    pub sender: SenderCredentials,
    pub max_emails_per_hour: Option<u32>,
}

impl SendConfig {
    pub fn new(smtp: ServerConfig, sender: SenderCredentials) -> Result<Self> {
        smtp.validate()?;
        if sender.email.trim().is_empty() || sender.password.is_empty() {
            return Err(EzmailError::Config(
                "the keys 'email' and 'password' must be provided".into(),
            ));
        }
        sender
            .email
            .parse::<lettre::Address>()
            .map_err(|e| EzmailError::Config(format!("invalid sender '{}': {e}", sender.email)))?;

        Ok(Self {
            smtp,
            sender,
            max_emails_per_hour: None,
        })
    }

    /// Pause delivery for an hour after this many successful sends.
    /// Zero disables the limit.
    pub fn with_max_emails_per_hour(mut self, max: u32) -> Self {
        self.max_emails_per_hour = (max > 0).then_some(max);
        self
    }

    /// Port 587 negotiates STARTTLS after connecting; anything else is implicit TLS.
    pub fn uses_starttls(&self) -> bool {
        self.smtp.port == 587
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "oauth2")]
    OAuth2,
}

impl FromStr for AuthType {
    type Err = EzmailError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "password" => Ok(AuthType::Password),
            "oauth2" => Ok(AuthType::OAuth2),
            other => Err(EzmailError::Config(format!(
                "invalid authentication type '{other}'; use 'password' or 'oauth2'"
            ))),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Password => f.write_str("password"),
            AuthType::OAuth2 => f.write_str("oauth2"),
        }
    }
}

/// Mailbox login: a password or an OAuth2 access token, depending on `auth_type`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub email: String,
    pub auth_value: String,
    pub auth_type: AuthType,
}

impl AccountCredentials {
    pub fn new(email: impl Into<String>, auth_value: impl Into<String>, auth_type: AuthType) -> Self {
        Self {
            email: email.into(),
            auth_value: auth_value.into(),
            auth_type,
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("email", &self.email)
            .field("auth_value", &"***")
            .field("auth_type", &self.auth_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadConfig {
    pub imap: ServerConfig,
    pub account: AccountCredentials,
}

impl ReadConfig {
    pub fn new(imap: ServerConfig, account: AccountCredentials) -> Result<Self> {
        imap.validate()?;
        if account.email.trim().is_empty() || account.auth_value.is_empty() {
            return Err(EzmailError::Config(
                "the keys 'email', 'auth_value' and 'auth_type' must be provided".into(),
            ));
        }
        Ok(Self { imap, account })
    }
}

/// On-disk configuration, `~/.config/ezmail/config.toml` by default.
///
/// Secrets may be left out of the file; they are then looked up in the OS
/// keyring under the account's email address.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub max_emails_per_hour: Option<u32>,
    pub smtp: Option<ServerConfig>,
    pub sender: Option<SenderSection>,
    pub imap: Option<ServerConfig>,
    pub account: Option<AccountSection>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SenderSection {
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountSection {
    pub email: String,
    pub auth_type: AuthType,
    pub auth_value: Option<String>,
}

impl Config {
    pub fn send_config(&self) -> Result<SendConfig> {
        let smtp = self
            .smtp
            .clone()
            .ok_or_else(|| EzmailError::Config("[smtp] section missing".into()))?;
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| EzmailError::Config("[sender] section missing".into()))?;
        let password = resolve_secret(&sender.email, sender.password.as_deref())?;

        let cfg = SendConfig::new(smtp, SenderCredentials::new(&sender.email, password))?;
        Ok(match self.max_emails_per_hour {
            Some(max) => cfg.with_max_emails_per_hour(max),
            None => cfg,
        })
    }

    pub fn read_config(&self) -> Result<ReadConfig> {
        let imap = self
            .imap
            .clone()
            .ok_or_else(|| EzmailError::Config("[imap] section missing".into()))?;
        let account = self
            .account
            .as_ref()
            .ok_or_else(|| EzmailError::Config("[account] section missing".into()))?;
        let auth_value = resolve_secret(&account.email, account.auth_value.as_deref())?;

        ReadConfig::new(
            imap,
            AccountCredentials::new(&account.email, auth_value, account.auth_type),
        )
    }
}

fn resolve_secret(email: &str, inline: Option<&str>) -> Result<String> {
    if let Some(v) = inline.filter(|v| !v.is_empty()) {
        return Ok(v.to_string());
    }
    secret_store::load_secret(email)?.ok_or_else(|| {
        EzmailError::Config(format!(
            "no secret for {email} in config file or keyring (see `ezmail set-secret`)"
        ))
    })
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| EzmailError::Config("no config dir available".into()))?
        .join("ezmail"))
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Loads the config file, writing a template for the user to edit when it is missing.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    if !path.exists() {
        let sample = Config {
            max_emails_per_hour: None,
            smtp: Some(ServerConfig::new("smtp.example.com", 587)),
            sender: Some(SenderSection {
                email: "you@example.com".to_string(),
                password: None,
            }),
            imap: Some(ServerConfig::new("imap.example.com", 993)),
            account: Some(AccountSection {
                email: "you@example.com".to_string(),
                auth_type: AuthType::Password,
                auth_value: None,
            }),
        };
        let tom = toml::to_string_pretty(&sample)
            .map_err(|e| EzmailError::Config(e.to_string()))?;
        fs::write(&path, tom)?;
        return Err(EzmailError::Config(format!(
            "created template config at {}, edit it and run again",
            path.display()
        )));
    }
    let s = fs::read_to_string(&path)?;
    toml::from_str(&s).map_err(|e| EzmailError::Config(format!("{}: {e}", path.display())))
}
