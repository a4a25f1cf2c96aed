//! Link-level transport
//!
//! Keeps a TCP connection to the server open and reports when it drops.
//! It carries no voice or presence data: channel moves fail and the only
//! member of the "channel" is ourselves. A voice protocol plugs in by
//! implementing [`Dialer`] and [`Session`] in its place.

use std::io;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{DialError, DialTarget, Dialer, DisconnectReason, Session, SessionEvent, SessionEvents};

pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Dialer for TcpDialer {
    type Session = TcpSession;

    async fn dial(
        &self,
        target: &DialTarget,
        events: SessionEvents,
    ) -> Result<TcpSession, DialError> {
        if target.tls.certificate.is_some() || !target.tls.insecure_skip_verify {
            debug!("link transport does not negotiate TLS, options ignored");
        }

        let connect = TcpStream::connect(&target.address);
        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| DialError::Timeout(self.connect_timeout.as_secs()))?
            .map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => DialError::Refused(target.address.clone()),
                _ => DialError::Io(e),
            })?;

        let remote = stream.peer_addr()?.to_string();
        let (mut reader, writer) = stream.into_split();

        let reader_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let reason = loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break DisconnectReason::Server,
                    Ok(_) => continue,
                    Err(_) => break DisconnectReason::Error,
                }
            };
            events.emit(SessionEvent::Disconnected(reason));
        });

        info!(
            %remote,
            user = %target.username,
            has_password = !target.password.is_empty(),
            "link established"
        );

        Ok(TcpSession {
            remote,
            writer: Some(writer),
            reader_task,
        })
    }
}

pub struct TcpSession {
    remote: String,
    writer: Option<OwnedWriteHalf>,
    reader_task: JoinHandle<()>,
}

impl Session for TcpSession {
    fn remote_addr(&self) -> String {
        self.remote.clone()
    }

    fn welcome_message(&self) -> Option<String> {
        None
    }

    fn move_to_channel(&mut self, _name: &str) -> bool {
        false
    }

    fn current_channel_name(&self) -> Option<String> {
        None
    }

    fn current_channel_members(&self) -> usize {
        1
    }

    fn disconnect(&mut self) {
        self.reader_task.abort();
        if self.writer.take().is_some() {
            debug!(remote = %self.remote, "link closed");
        }
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use crate::session::TlsOptions;

    fn target(address: String) -> DialTarget {
        DialTarget {
            address,
            username: "tester".into(),
            password: String::new(),
            tls: TlsOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_server_close_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let dialer = TcpDialer::default();
        let target = target(address);
        let (session, accepted) = tokio::join!(
            dialer.dial(&target, SessionEvents::new(3, tx)),
            listener.accept()
        );
        let session = session.unwrap();
        assert_eq!(session.current_channel_members(), 1);

        drop(accepted.unwrap());

        let (generation, event) = rx.recv().await.unwrap();
        assert_eq!(generation, 3);
        assert_eq!(event, SessionEvent::Disconnected(DisconnectReason::Server));
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let (tx, _rx) = mpsc::unbounded_channel();

        let target = target(address);
        let result = TcpDialer::default()
            .dial(&target, SessionEvents::new(1, tx))
            .await;
        assert!(matches!(result, Err(DialError::Refused(_))));
    }
}
