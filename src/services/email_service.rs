use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::decoder;
use crate::mailbox::{self, Credentials, MailboxConnector, MailboxError};
use crate::models::email::{MailboxMessage, MessageId};

/// Fetches and decodes the last `limit` messages, newest first, in one session.
///
/// A message whose fetch fails is skipped; session-level failures (login,
/// connection) abort the whole operation.
pub fn fetch_recent(
    connector: &dyn MailboxConnector,
    credentials: &Credentials,
    limit: usize,
) -> Result<Vec<MailboxMessage>, MailboxError> {
    mailbox::with_session(connector, credentials, |session| {
        let ids = mailbox::list_recent_ids(session, limit)?;
        info!("Fetching {} recent emails", ids.len());

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids.into_iter().rev() {
            match mailbox::fetch_raw(session, &id) {
                Ok(raw) => messages.push(decoder::decode(id, &raw)),
                Err(MailboxError::NotFound(id)) => warn!("Message {} vanished before fetch", id),
                Err(e @ (MailboxError::Network(_) | MailboxError::Auth(_))) => return Err(e),
                Err(e) => warn!("Skipping message {}: {}", id, e),
            }
        }
        Ok(messages)
    })
}

/// Fetches and decodes a single message by id in its own session.
pub fn fetch_message(
    connector: &dyn MailboxConnector,
    credentials: &Credentials,
    id: &MessageId,
) -> Result<MailboxMessage, MailboxError> {
    mailbox::with_session(connector, credentials, |session| {
        let raw = mailbox::fetch_raw(session, id)?;
        Ok(decoder::decode(id.clone(), &raw))
    })
}

/// Runs a blocking mailbox operation off the async executor, bounded by `timeout`.
/// Expiry is reported as a network error.
pub async fn run_blocking<T, F>(timeout: Duration, op: F) -> Result<T, MailboxError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MailboxError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(op)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(MailboxError::Protocol(format!("Mailbox task failed: {}", join_error))),
        Err(_) => Err(MailboxError::Network(format!("Mailbox operation timed out after {:?}", timeout))),
    }
}

pub async fn load_recent(
    connector: Arc<dyn MailboxConnector>,
    credentials: Credentials,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<MailboxMessage>, MailboxError> {
    run_blocking(timeout, move || fetch_recent(connector.as_ref(), &credentials, limit)).await
}

pub async fn load_message(
    connector: Arc<dyn MailboxConnector>,
    credentials: Credentials,
    id: MessageId,
    timeout: Duration,
) -> Result<MailboxMessage, MailboxError> {
    run_blocking(timeout, move || fetch_message(connector.as_ref(), &credentials, &id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::testing::{credentials, InMemoryMailbox};

    fn raw(n: usize) -> String {
        format!(
            "From: Sender {n} <s{n}@example.com>\r\n\
             Subject: Message {n}\r\n\
             Content-Type: multipart/alternative; boundary=\"B\"\r\n\r\n\
             --B\r\n\
             Content-Type: text/html\r\n\r\n\
             <p>html {n}</p>\r\n\
             --B\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\r\n\
             plain {n}\r\n\
             --B--\r\n",
            n = n
        )
    }

    fn mailbox(count: usize) -> InMemoryMailbox {
        (1..=count).fold(InMemoryMailbox::new(), |mb, n| mb.with_message(&n.to_string(), &raw(n)))
    }

    #[test]
    fn recent_messages_are_newest_first() {
        let mb = mailbox(7);
        let messages = fetch_recent(&mb, &credentials(), 5).unwrap();
        let subjects: Vec<&str> = messages.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Message 7", "Message 6", "Message 5", "Message 4", "Message 3"]);
        assert_eq!(messages[0].body.trim(), "plain 7");
        assert_eq!(messages[0].sender, "Sender 7 <s7@example.com>");
        assert_eq!(mb.logout_count(), 1);
    }

    #[test]
    fn small_mailbox_returns_everything_without_error() {
        let mb = mailbox(3);
        let messages = fetch_recent(&mb, &credentials(), 5).unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn empty_mailbox_is_an_empty_batch() {
        let mb = InMemoryMailbox::new();
        assert!(fetch_recent(&mb, &credentials(), 10).unwrap().is_empty());
        assert_eq!(mb.logout_count(), 1);
    }

    #[test]
    fn transport_failure_mid_batch_aborts_and_still_logs_out() {
        let mb = mailbox(4).with_broken_fetch("3");
        let result = fetch_recent(&mb, &credentials(), 10);
        assert!(matches!(result, Err(MailboxError::Network(_))));
        assert_eq!(mb.logout_count(), 1);
    }

    #[test]
    fn corrupt_message_does_not_fail_the_batch() {
        let mb = mailbox(2).with_message("3", "\u{0}\u{1}garbage without headers");
        let messages = fetch_recent(&mb, &credentials(), 10).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].subject, "Message 2");
    }

    #[test]
    fn fetching_the_same_message_twice_is_stable() {
        let mb = mailbox(3);
        let id = MessageId::new("2");
        let first = fetch_message(&mb, &credentials(), &id).unwrap();
        let second = fetch_message(&mb, &credentials(), &id).unwrap();
        assert_eq!(first, second);
        assert_eq!(mb.connect_count(), 2);
        assert_eq!(mb.logout_count(), 2);
    }

    #[test]
    fn listed_ids_still_resolve_after_an_expunge() {
        let mb = mailbox(5);
        let listed = fetch_recent(&mb, &credentials(), 5).unwrap();
        assert_eq!(listed[1].id.as_str(), "4");

        let mb = mb.without_message("2");
        let message = fetch_message(&mb, &credentials(), &listed[1].id).unwrap();
        assert_eq!(message.subject, "Message 4");
        let gone = fetch_message(&mb, &credentials(), &MessageId::new("2")).unwrap_err();
        assert!(matches!(gone, MailboxError::NotFound(_)));
    }

    #[test]
    fn unknown_message_is_not_found() {
        let mb = mailbox(1);
        let err = fetch_message(&mb, &credentials(), &MessageId::new("404")).unwrap_err();
        assert!(matches!(err, MailboxError::NotFound(ref id) if id.as_str() == "404"));
        assert_eq!(mb.logout_count(), 1);
    }

    #[test]
    fn rejected_login_is_an_auth_error() {
        let mb = mailbox(1).rejecting_login();
        assert!(matches!(fetch_recent(&mb, &credentials(), 5), Err(MailboxError::Auth(_))));
    }

    #[tokio::test]
    async fn blocking_load_runs_off_the_executor() {
        let mb: Arc<dyn MailboxConnector> = Arc::new(mailbox(2));
        let messages = load_recent(mb, credentials(), 10, Duration::from_secs(5)).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn slow_mailbox_times_out_as_network_error() {
        let result: Result<(), MailboxError> = run_blocking(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(MailboxError::Network(_))));
    }
}
