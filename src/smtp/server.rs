//! SMTP listener and connection driver.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use super::delivery::Deliverer;
use super::error::{SmtpError, MAX_COMMAND_LINE};
use super::message::ParsedMessage;
use super::response::Reply;
use super::session::{Session, Step};
use crate::config::SmtpConfig;
use crate::db::Database;
use crate::domain::DomainAuthority;
use crate::mailbox::MailboxSettings;
use crate::{Result, VoidmailError};

/// State shared by every connection.
struct SmtpContext {
    db: Database,
    hostname: String,
    idle_timeout: Duration,
    settings: MailboxSettings,
}

/// SMTP server accepting mail for the active domains.
pub struct SmtpServer {
    listener: TcpListener,
    semaphore: Arc<Semaphore>,
    context: Arc<SmtpContext>,
}

impl SmtpServer {
    /// Bind to `config.host:config.port`.
    pub async fn bind(config: &SmtpConfig, db: Database, settings: MailboxSettings) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            "SMTP server listening on {} (max {} connections)",
            local_addr, config.max_connections
        );

        Ok(Self {
            listener,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            context: Arc::new(SmtpContext {
                db,
                hostname: config.hostname.clone(),
                idle_timeout: Duration::from_secs(config.idle_timeout_secs),
                settings,
            }),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the next connection once a slot is free.
    async fn accept(&self) -> Result<(TcpStream, SocketAddr, tokio::sync::OwnedSemaphorePermit)> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| VoidmailError::Smtp("connection semaphore closed".to_string()))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);
        Ok((stream, addr, permit))
    }

    /// Serve connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve connections until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("SMTP server shutting down");
                    return Ok(());
                }
                accepted = self.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let context = self.context.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, context).await;
                            drop(permit);
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }
    }
}

async fn handle_connection<S>(stream: S, peer: SocketAddr, context: Arc<SmtpContext>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = info_span!("smtp", session = %Uuid::new_v4(), peer = %peer);
    async move {
        info!("Session started");
        match serve(stream, &context).await {
            Ok(()) => info!("Session ended"),
            Err(e) => debug!("Session aborted: {}", e),
        }
    }
    .instrument(span)
    .await
}

enum LineRead {
    Line,
    TooLong,
    Eof,
}

enum DataRead {
    Complete(Vec<u8>),
    Eof,
    TimedOut,
}

async fn serve<S>(stream: S, context: &SmtpContext) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut session = Session::new(context.hostname.as_str());
    let mut line = Vec::new();

    send(&mut writer, &session.greeting()).await?;

    loop {
        let read = timeout(
            context.idle_timeout,
            read_line(&mut reader, &mut line, Some(MAX_COMMAND_LINE)),
        )
        .await;
        match read {
            Err(_) => {
                info!("Idle timeout");
                return send(&mut writer, &session.timeout_reply()).await;
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(LineRead::Eof)) => {
                debug!("Client disconnected in state {:?}", session.state());
                return Ok(());
            }
            Ok(Ok(LineRead::TooLong)) => {
                send(&mut writer, &SmtpError::LineTooLong.to_reply()).await?;
                continue;
            }
            Ok(Ok(LineRead::Line)) => {}
        }

        let command = String::from_utf8_lossy(strip_line_ending(&line)).into_owned();
        match session.handle_line(&command) {
            Step::Reply(reply) => send(&mut writer, &reply).await?,
            Step::CheckRecipient { address, domain } => {
                let authority = DomainAuthority::new(&context.db);
                let reply = match authority.is_accepted_recipient_domain(&domain).await {
                    Ok(false) => {
                        info!("Rejected recipient {}: domain {} not accepted", address, domain);
                        session.recipient_verdict(address, &domain, false)
                    }
                    Ok(true) => {
                        let reply = session.recipient_verdict(address, &domain, true);
                        debug!(
                            "Recipient accepted, {} in envelope",
                            session.envelope().recipients.len()
                        );
                        reply
                    }
                    Err(e) => {
                        error!("Domain lookup for {} failed: {}", domain, e);
                        Reply::local_error()
                    }
                };
                send(&mut writer, &reply).await?;
            }
            Step::ReadData(reply) => {
                send(&mut writer, &reply).await?;
                let body = match read_data(&mut reader, &mut line, context.idle_timeout).await? {
                    DataRead::Complete(body) => body,
                    DataRead::Eof => {
                        debug!("Client disconnected during DATA");
                        return Ok(());
                    }
                    DataRead::TimedOut => {
                        info!("Idle timeout during DATA");
                        return send(&mut writer, &session.timeout_reply()).await;
                    }
                };
                let Some(envelope) = session.take_envelope() else {
                    continue;
                };

                let message = ParsedMessage::parse(&body, envelope.sender.as_deref());
                let report = Deliverer::new(&context.db, context.settings)
                    .deliver(&envelope, &message)
                    .await;
                debug!(
                    "Delivery for {} finished: {} stored, {} discarded, {} failed",
                    session.client_name().unwrap_or("unknown client"),
                    report.stored,
                    report.discarded,
                    report.failed
                );
                send(&mut writer, &Reply::message_accepted()).await?;
            }
            Step::Close(reply) => return send(&mut writer, &reply).await,
        }
    }
}

/// Read the message body up to the terminating `.` line.
///
/// Leading dots are unstuffed and lines are rejoined with CRLF.
async fn read_data<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    idle_timeout: Duration,
) -> std::io::Result<DataRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        match timeout(idle_timeout, read_line(reader, line, None)).await {
            Err(_) => return Ok(DataRead::TimedOut),
            Ok(Err(e)) => return Err(e),
            Ok(Ok(LineRead::Eof)) => return Ok(DataRead::Eof),
            Ok(Ok(_)) => {}
        }

        let content = strip_line_ending(line.as_slice());
        if content == b"." {
            return Ok(DataRead::Complete(body));
        }
        let content = content.strip_prefix(b".").unwrap_or(content);
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
}

/// Read one LF-terminated line into `buf`.
///
/// With a `limit`, an over-long line is drained up to its end and reported
/// as [`LineRead::TooLong`]. A partial line at end of stream counts as EOF.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: Option<usize>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Eof);
        }

        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if !overflow {
            buf.extend_from_slice(&available[..used]);
            if limit.is_some_and(|limit| buf.len() > limit) {
                overflow = true;
                buf.clear();
            }
        }
        reader.consume(used);

        if done {
            return Ok(if overflow { LineRead::TooLong } else { LineRead::Line });
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn send<W>(writer: &mut W, reply: &Reply) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.to_wire().as_bytes()).await?;
    writer.flush().await
}
