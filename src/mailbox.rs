use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};
use native_tls::{TlsConnector, TlsStream};

use crate::models::email::MessageId;

const INBOX: &str = "INBOX";
// PEEK keeps the fetch read-only: no \Seen flag is set.
const FETCH_QUERY: &str = "BODY.PEEK[]";

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Message {0} not found")]
    NotFound(MessageId),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Mailbox login. The password is an application-scoped credential, never the
/// account password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session with the inbox selected.
pub trait MailSession {
    /// All message ids, in ascending server order.
    fn list_ids(&mut self) -> Result<Vec<MessageId>, MailboxError>;

    fn fetch_raw(&mut self, id: &MessageId) -> Result<Vec<u8>, MailboxError>;

    fn logout(&mut self) -> Result<(), MailboxError>;
}

pub trait MailboxConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailSession>, MailboxError>;
}

/// Owns a session and logs it out exactly once, either through [`SessionGuard::close`]
/// or on drop.
pub struct SessionGuard {
    session: Box<dyn MailSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn MailSession>) -> Self {
        SessionGuard { session, closed: false }
    }

    pub fn session(&mut self) -> &mut dyn MailSession {
        self.session.as_mut()
    }

    pub fn close(mut self) -> Result<(), MailboxError> {
        self.closed = true;
        self.session.logout()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.session.logout() {
            warn!("Logout after aborted mailbox operation failed: {}", e);
        }
    }
}

/// Opens a session, runs `op`, and logs out on every exit path.
///
/// A logout failure after a successful `op` is logged and does not discard the
/// result, since all operations here are read-only.
pub fn with_session<T, F>(
    connector: &dyn MailboxConnector,
    credentials: &Credentials,
    op: F,
) -> Result<T, MailboxError>
where
    F: FnOnce(&mut dyn MailSession) -> Result<T, MailboxError>,
{
    let mut guard = SessionGuard::new(connector.connect(credentials)?);
    let result = op(guard.session());
    if let Err(e) = guard.close() {
        warn!("Mailbox logout failed: {}", e);
    }
    result
}

/// The last `limit` ids, still most-recent-last.
pub fn list_recent_ids(session: &mut dyn MailSession, limit: usize) -> Result<Vec<MessageId>, MailboxError> {
    let mut ids = session.list_ids()?;
    let start = ids.len().saturating_sub(limit);
    Ok(ids.split_off(start))
}

pub fn fetch_raw(session: &mut dyn MailSession, id: &MessageId) -> Result<Vec<u8>, MailboxError> {
    session.fetch_raw(id)
}

/// IMAP over implicit TLS.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl ImapConnector {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        ImapConnector { host: host.into(), port, timeout }
    }

    fn open_stream(&self) -> Result<TlsStream<TcpStream>, MailboxError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| MailboxError::Network(format!("Failed to resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| MailboxError::Network(format!("No address found for {}", self.host)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| MailboxError::Network(format!("Failed to connect to {}: {}", addr, e)))?;
        tcp.set_read_timeout(Some(self.timeout))
            .and_then(|_| tcp.set_write_timeout(Some(self.timeout)))
            .map_err(|e| MailboxError::Network(e.to_string()))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| MailboxError::Network(format!("Failed to build TLS connector: {}", e)))?;
        tls.connect(&self.host, tcp)
            .map_err(|e| MailboxError::Network(format!("TLS handshake with {} failed: {}", self.host, e)))
    }
}

impl MailboxConnector for ImapConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailSession>, MailboxError> {
        info!("Connecting to {}:{} as {}", self.host, self.port, credentials.username);
        let stream = self.open_stream()?;

        let mut client = imap::Client::new(stream);
        client.read_greeting()
            .map_err(|e| MailboxError::Network(format!("No greeting from {}: {}", self.host, e)))?;

        let mut session = client
            .login(&credentials.username, &credentials.password)
            .map_err(|(e, _client)| MailboxError::Auth(e.to_string()))?;

        // EXAMINE selects the mailbox read-only.
        if let Err(e) = session.examine(INBOX) {
            let _ = session.logout();
            return Err(imap_error(e));
        }

        Ok(Box::new(ImapSession { inner: session }))
    }
}

struct ImapSession {
    inner: imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    // UIDs survive expunges between sessions; sequence numbers do not.
    fn list_ids(&mut self) -> Result<Vec<MessageId>, MailboxError> {
        let mut uids: Vec<u32> = self.inner.uid_search("ALL").map_err(imap_error)?.into_iter().collect();
        uids.sort_unstable();
        debug!("Inbox holds {} messages", uids.len());
        Ok(uids.into_iter().map(|uid| MessageId::new(uid.to_string())).collect())
    }

    fn fetch_raw(&mut self, id: &MessageId) -> Result<Vec<u8>, MailboxError> {
        if !is_uid(id.as_str()) {
            return Err(MailboxError::NotFound(id.clone()));
        }

        let fetches = self.inner.uid_fetch(id.as_str(), FETCH_QUERY).map_err(|e| match e {
            imap::error::Error::No(_) | imap::error::Error::Bad(_) => MailboxError::NotFound(id.clone()),
            other => imap_error(other),
        })?;

        fetches.iter()
            .next()
            .and_then(|fetch| fetch.body())
            .map(|body| body.to_vec())
            .ok_or_else(|| MailboxError::NotFound(id.clone()))
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        self.inner.logout().map_err(imap_error)
    }
}

/// A single non-zero UID. Ranges and sets are refused.
fn is_uid(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && id.bytes().any(|b| b != b'0')
}

fn imap_error(e: imap::error::Error) -> MailboxError {
    match e {
        imap::error::Error::Io(io) => MailboxError::Network(io.to_string()),
        imap::error::Error::ConnectionLost => MailboxError::Network("connection lost".to_string()),
        other => MailboxError::Protocol(other.to_string()),
    }
}
