use log::{debug, info, warn};
use native_tls::{TlsConnector, TlsStream};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::auth::xoauth2::XOAuth2;
use crate::config::{AuthType, ReadConfig};
use crate::domain::email::EzMail;
use crate::error::{EzmailError, Result};
use crate::mail::decoders::decompose;
use crate::mail::query::SearchQuery;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// The IMAP commands the reader relies on.
///
/// Implemented for [`imap::Session`]; anything else speaking IMAP (a STARTTLS
/// session, a test double) can be plugged in through [`EzReader::with_session`].
pub trait MailboxOps {
    fn list_mailboxes(&mut self) -> imap::error::Result<Vec<String>>;
    fn select(&mut self, mailbox: &str) -> imap::error::Result<()>;
    /// Matching sequence numbers, ascending.
    fn search(&mut self, criteria: &str) -> imap::error::Result<Vec<u32>>;
    /// Full RFC 822 message, `None` when the server returned no body.
    fn fetch_rfc822(&mut self, id: u32) -> imap::error::Result<Option<Vec<u8>>>;
    fn close(&mut self) -> imap::error::Result<()>;
    fn logout(&mut self) -> imap::error::Result<()>;
}

impl<T: Read + Write> MailboxOps for imap::Session<T> {
    fn list_mailboxes(&mut self) -> imap::error::Result<Vec<String>> {
        let names = self.list(Some(""), Some("*"))?;
        Ok(names.iter().map(|n| n.name().to_string()).collect())
    }

    fn select(&mut self, mailbox: &str) -> imap::error::Result<()> {
        let mb = imap::Session::select(self, mailbox)?;
        debug!("{mailbox} has {} messages", mb.exists);
        Ok(())
    }

    fn search(&mut self, criteria: &str) -> imap::error::Result<Vec<u32>> {
        let mut ids: Vec<u32> = imap::Session::search(self, criteria)?.into_iter().collect();
        ids.sort_unstable(); // ascending, i.e. oldest first
        Ok(ids)
    }

    fn fetch_rfc822(&mut self, id: u32) -> imap::error::Result<Option<Vec<u8>>> {
        let fetches = self.fetch(id.to_string(), "RFC822")?;
        Ok(fetches.iter().next().and_then(|f| f.body()).map(|b| b.to_vec()))
    }

    fn close(&mut self) -> imap::error::Result<()> {
        imap::Session::close(self)
    }

    fn logout(&mut self) -> imap::error::Result<()> {
        imap::Session::logout(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Selected(String),
}

/// Reads mail over IMAP: connect, list, search + fetch, disconnect.
///
/// ```ignore
/// let mut reader = EzReader::new(read_config);
/// reader.connect()?;
/// let mails = reader.fetch_messages("INBOX", Some(5), &SearchQuery::unseen().since("01-Oct-2025"))?;
/// reader.disconnect();
/// ```
pub struct EzReader {
    config: ReadConfig,
    session: Option<Box<dyn MailboxOps>>,
    selected: Option<String>,
}

impl EzReader {
    pub fn new(config: ReadConfig) -> Self {
        Self {
            config,
            session: None,
            selected: None,
        }
    }

    /// Starts out connected over a session established elsewhere.
    pub fn with_session(config: ReadConfig, session: impl MailboxOps + 'static) -> Self {
        Self {
            config,
            session: Some(Box::new(session)),
            selected: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.session, &self.selected) {
            (None, _) => SessionState::Disconnected,
            (Some(_), None) => SessionState::Connected,
            (Some(_), Some(mb)) => SessionState::Selected(mb.clone()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Opens the TLS session and authenticates with a password or an OAuth2 token.
    ///
    /// On failure nothing is kept and the reader stays disconnected.
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("already connected to {}", self.config.imap.server);
            return Ok(());
        }
        let session = open_session(&self.config).map_err(|e| {
            EzmailError::Connection(format!(
                "failed to connect or authenticate to IMAP server: {e}"
            ))
        })?;
        info!(
            "connected to {}:{} as {}",
            self.config.imap.server, self.config.imap.port, self.config.account.email
        );
        self.session = Some(Box::new(session));
        self.selected = None;
        Ok(())
    }

    pub fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        let session = self.session.as_mut().ok_or(EzmailError::NotConnected)?;
        session
            .list_mailboxes()
            .map_err(|e| EzmailError::Connection(format!("failed to list mailboxes: {e}")))
    }

    /// Selects `mailbox`, searches it and fetches every match (up to `limit`).
    ///
    /// Matches keep the server's order, so `limit` keeps the oldest ones. A
    /// message that cannot be fetched or parsed is skipped.
    pub fn fetch_messages(
        &mut self,
        mailbox: &str,
        limit: Option<usize>,
        query: &SearchQuery,
    ) -> Result<Vec<EzMail>> {
        let session = self.session.as_mut().ok_or(EzmailError::NotConnected)?;
        let criteria = query.build()?;

        let search_err = |e: imap::error::Error| EzmailError::Search {
            criteria: criteria.clone(),
            message: e.to_string(),
        };

        session.select(mailbox).map_err(search_err)?;
        self.selected = Some(mailbox.to_string());

        let mut ids = session.search(&criteria).map_err(search_err)?;
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        debug!("{criteria} matched, fetching {} message(s)", ids.len());

        let mut emails = Vec::with_capacity(ids.len());
        for id in ids {
            match session.fetch_rfc822(id) {
                Ok(Some(raw)) => match decompose(&raw) {
                    Ok(mail) => emails.push(mail),
                    Err(e) => warn!("message {id}: {e}, skipping"),
                },
                Ok(None) => warn!("message {id}: server returned no body, skipping"),
                Err(e) => warn!("message {id}: fetch failed: {e}, skipping"),
            }
        }
        Ok(emails)
    }

    /// Shortcut for `fetch_messages` with status `UNSEEN`.
    pub fn fetch_unread(&mut self, mailbox: &str, limit: Option<usize>) -> Result<Vec<EzMail>> {
        self.fetch_messages(mailbox, limit, &SearchQuery::unseen())
    }

    /// Best-effort CLOSE + LOGOUT. Errors are logged and ignored.
    pub fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(mailbox) = self.selected.take() {
            if let Err(e) = session.close() {
                warn!("closing {mailbox} failed: {e}");
            }
        }
        if let Err(e) = session.logout() {
            warn!("logout failed: {e}");
        }
        info!("disconnected from {}", self.config.imap.server);
    }
}

impl Drop for EzReader {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn open_session(config: &ReadConfig) -> std::result::Result<ImapSession, String> {
    let server = config.imap.server.as_str();
    let addrs: Vec<SocketAddr> = (server, config.imap.port)
        .to_socket_addrs()
        .map_err(|e| e.to_string())?
        .collect();
    let tcp = connect_any(&addrs, CONNECT_TIMEOUT).map_err(|e| format!("{server}: {e}"))?;
    let tls = TlsConnector::builder().build().map_err(|e| e.to_string())?;
    let stream = tls.connect(server, tcp).map_err(|e| e.to_string())?;

    let mut client = imap::Client::new(stream);
    client.read_greeting().map_err(|e| e.to_string())?;

    let account = &config.account;
    match account.auth_type {
        AuthType::Password => client
            .login(&account.email, &account.auth_value)
            .map_err(|(e, _)| e.to_string()),
        AuthType::OAuth2 => authenticate_xoauth2(client, &account.email, &account.auth_value),
    }
}

/// Tries each address in turn until one accepts, all within `budget`.
fn connect_any(addrs: &[SocketAddr], budget: Duration) -> std::result::Result<TcpStream, String> {
    let deadline = Instant::now() + budget;
    let mut last_err = String::from("no address resolved");
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            last_err = format!("connect timed out after {}s", budget.as_secs());
            break;
        }
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_err = e.to_string();
            }
        }
    }
    Err(last_err)
}

fn authenticate_xoauth2(
    client: imap::Client<TlsStream<TcpStream>>,
    user: &str,
    access_token: &str,
) -> std::result::Result<ImapSession, String> {
    client
        .authenticate("XOAUTH2", &XOAuth2::new(user, access_token))
        .map_err(|(e, _)| format!("XOAUTH2 rejected: {e}"))
}
