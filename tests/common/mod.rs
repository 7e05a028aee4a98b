//! Test helpers for integration tests.
//!
//! Provides TestServer, TestClient, and helpers for driving SMTP sessions
//! against an in-memory store.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use voidmail::config::SmtpConfig;
use voidmail::mailbox::{MailboxRepository, NewMailbox};
use voidmail::{Database, DomainAuthority, Mailbox, MailboxSettings, SmtpServer};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Hostname announced by test servers.
pub const TEST_HOSTNAME: &str = "mx.voidmail.test";

/// Create an in-memory database with the given active domains.
pub async fn setup_db(domains: &[&str]) -> Database {
    let db = Database::open_in_memory().await.unwrap();
    let authority = DomainAuthority::new(&db);
    for domain in domains {
        authority.add(domain, true).await.unwrap();
    }
    db
}

/// Insert a mailbox that expired an hour ago.
pub async fn create_expired_mailbox(db: &Database, address: &str) -> Mailbox {
    let created = Utc::now() - chrono::Duration::hours(2);
    MailboxRepository::new(db.pool())
        .create(&NewMailbox::with_ttl(address, None, created, chrono::Duration::hours(1)))
        .await
        .unwrap()
}

/// A running SMTP server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub db: Database,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<voidmail::Result<()>>>,
}

impl TestServer {
    /// Start a server with default settings.
    pub async fn start(db: Database) -> Self {
        Self::start_with(db, 300).await
    }

    /// Start a server with the given idle timeout in seconds.
    pub async fn start_with(db: Database, idle_timeout_secs: u64) -> Self {
        let config = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            hostname: TEST_HOSTNAME.to_string(),
            max_connections: 16,
            idle_timeout_secs,
        };
        let server = SmtpServer::bind(&config, db.clone(), MailboxSettings::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            db,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Connect a client and consume the greeting.
    pub async fn connect(&self) -> TestClient {
        let (client, greeting) = TestClient::connect(self.addr).await.unwrap();
        assert_eq!(greeting.code, 220, "unexpected greeting: {greeting:?}");
        client
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
    }
}

/// A reply as seen by the client.
#[derive(Debug, Clone)]
pub struct TestReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl TestReply {
    /// Text of the last line.
    pub fn text(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }
}

/// Raw SMTP client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect and read the greeting.
    pub async fn connect(addr: SocketAddr) -> std::io::Result<(Self, TestReply)> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        let greeting = client.read_reply().await?;
        Ok((client, greeting))
    }

    /// Send raw bytes.
    pub async fn send_raw(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await
    }

    /// Send a line terminated by CRLF.
    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.send_raw(format!("{line}\r\n").as_bytes()).await
    }

    /// Read one (possibly multi-line) reply.
    pub async fn read_reply(&mut self) -> std::io::Result<TestReply> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no reply"))??;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                ));
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if line.len() < 4 {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, line));
            }
            let code: u16 = line[..3]
                .parse()
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, line.clone()))?;
            let last = line.as_bytes()[3] == b' ';
            lines.push(line[4..].to_string());
            if last {
                return Ok(TestReply { code, lines });
            }
        }
    }

    /// Send a command and read its reply.
    pub async fn command(&mut self, line: &str) -> TestReply {
        self.send_line(line).await.unwrap();
        self.read_reply().await.unwrap()
    }

    /// Whether the server has closed the connection.
    pub async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(
            timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }

    /// Run a full transaction and return the final DATA reply.
    ///
    /// `body` is sent as is (lines separated by CRLF) followed by the
    /// terminating dot.
    pub async fn send_mail(&mut self, from: &str, recipients: &[&str], body: &str) -> TestReply {
        let reply = self.command(&format!("MAIL FROM:<{from}>")).await;
        assert_eq!(reply.code, 250, "MAIL rejected: {reply:?}");
        for rcpt in recipients {
            self.command(&format!("RCPT TO:<{rcpt}>")).await;
        }
        let reply = self.command("DATA").await;
        if reply.code != 354 {
            return reply;
        }
        self.send_raw(body.as_bytes()).await.unwrap();
        if !body.ends_with("\r\n") {
            self.send_raw(b"\r\n").await.unwrap();
        }
        self.send_raw(b".\r\n").await.unwrap();
        self.read_reply().await.unwrap()
    }
}
