//! Configurable mock SMTP server for delivery tests.
//!
//! Speaks just enough SMTP to stand in for a relay: greeting, HELO,
//! MAIL FROM, RCPT TO, DATA, QUIT. Replies are configurable per command
//! and the first N message bodies can be rejected with a transient code
//! to exercise the retry path. Accepted message bodies and the raw
//! command lines are recorded for assertions.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    fn line(&self) -> String {
        format!("{} {}\r\n", self.code, self.text)
    }
}

#[derive(Debug, Clone)]
struct Replies {
    greeting: Reply,
    helo: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    accepted: Reply,
    quit: Reply,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock ESMTP ready"),
            helo: Reply::new(250, "mock"),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            accepted: Reply::new(250, "OK message accepted"),
            quit: Reply::new(221, "Bye"),
        }
    }
}

#[derive(Debug)]
struct ServerState {
    replies: Replies,
    // Message bodies rejected with 451 before the server starts accepting.
    failures_remaining: AtomicUsize,
    messages: Mutex<Vec<Vec<u8>>>,
    commands: Mutex<Vec<String>>,
}

/// A running mock server bound to an ephemeral port.
#[derive(Debug)]
pub struct MockSmtpServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            replies: Replies::default(),
            fail_first_deliveries: 0,
        }
    }

    /// Start a server that accepts everything.
    pub async fn start() -> Self {
        Self::builder().build().await
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Message bodies the server has accepted, in order.
    pub async fn messages(&self) -> Vec<Vec<u8>> {
        self.state.messages.lock().await.clone()
    }

    /// Raw command lines received, in order.
    pub async fn commands(&self) -> Vec<String> {
        self.state.commands.lock().await.clone()
    }

    async fn handle_client(stream: TcpStream, state: Arc<ServerState>) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer
            .write_all(state.replies.greeting.line().as_bytes())
            .await?;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let command = line.trim_end().to_string();
            state.commands.lock().await.push(command.clone());

            let verb = command
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_uppercase();

            let reply = match verb.as_str() {
                "HELO" | "EHLO" => state.replies.helo.clone(),
                "MAIL" => state.replies.mail_from.clone(),
                "RCPT" => state.replies.rcpt_to.clone(),
                "DATA" => {
                    writer
                        .write_all(state.replies.data.line().as_bytes())
                        .await?;

                    if state.replies.data.code != 354 {
                        continue;
                    }

                    let body = Self::read_body(&mut reader).await?;

                    let rejections = &state.failures_remaining;
                    let reply = if rejections
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        Reply::new(451, "Requested action aborted, try again")
                    } else {
                        state.messages.lock().await.push(body);
                        state.replies.accepted.clone()
                    };

                    writer.write_all(reply.line().as_bytes()).await?;
                    continue;
                }
                "QUIT" => {
                    writer
                        .write_all(state.replies.quit.line().as_bytes())
                        .await?;
                    return Ok(());
                }
                _ => Reply::new(500, "Unknown command"),
            };

            writer.write_all(reply.line().as_bytes()).await?;
        }
    }

    /// Read DATA content until the lone-dot terminator, undoing
    /// dot-stuffing.
    async fn read_body(
        reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    ) -> std::io::Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(body);
            }

            if line == ".\r\n" || line == ".\n" {
                return Ok(body);
            }

            let unstuffed = line.strip_prefix('.').unwrap_or(&line);
            body.extend_from_slice(unstuffed.as_bytes());
        }
    }
}

/// Builder for [`MockSmtpServer`].
#[derive(Debug)]
pub struct MockSmtpServerBuilder {
    replies: Replies,
    fail_first_deliveries: usize,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, text: impl Into<String>) -> Self {
        self.replies.greeting = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_reply(mut self, code: u16, text: impl Into<String>) -> Self {
        self.replies.rcpt_to = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_mail_from_reply(mut self, code: u16, text: impl Into<String>) -> Self {
        self.replies.mail_from = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_data_reply(mut self, code: u16, text: impl Into<String>) -> Self {
        self.replies.data = Reply::new(code, text);
        self
    }

    /// Reject the first `count` message bodies with a transient 451.
    #[must_use]
    pub const fn with_fail_first_deliveries(mut self, count: usize) -> Self {
        self.fail_first_deliveries = count;
        self
    }

    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind; tests have no use for a
    /// server that failed to start.
    pub async fn build(self) -> MockSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState {
            replies: self.replies,
            failures_remaining: AtomicUsize::new(self.fail_first_deliveries),
            messages: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        });

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let state = Arc::clone(&server_state);
                tokio::spawn(async move {
                    let _ = MockSmtpServer::handle_client(stream, state).await;
                });
            }
        });

        MockSmtpServer { addr, state }
    }
}
