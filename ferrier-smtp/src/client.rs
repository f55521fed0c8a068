use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use crate::{
    error::{ClientError, Result},
    response::Response,
};

/// Cap on a single reply line, enforced while reading so a server that
/// never sends a newline cannot grow the buffer without bound.
const MAX_LINE_LENGTH: usize = 8192;

/// Cap on the number of lines in one multi-line reply.
const MAX_REPLY_LINES: usize = 64;

/// A connected SMTP client.
///
/// Each command method sends one command and reads the complete (possibly
/// multi-line) reply. Callers decide how to interpret non-2xx codes; only
/// protocol violations surface as errors here.
#[derive(Debug)]
pub struct SmtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SmtpClient {
    /// Connect to `host:port` and read the server greeting.
    ///
    /// # Errors
    ///
    /// Fails if the TCP connection cannot be established, or the greeting
    /// is missing or malformed.
    pub async fn connect(host: &str, port: u16) -> Result<(Self, Response)> {
        let stream = TcpStream::connect((host, port)).await?;
        let (read, write) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
        };

        let greeting = client.read_response().await?;
        tracing::trace!(code = greeting.code, host, "Received greeting");

        Ok((client, greeting))
    }

    /// Send `HELO` with the given hostname.
    pub async fn helo(&mut self, hostname: &str) -> Result<Response> {
        self.command(&format!("HELO {hostname}")).await
    }

    /// Send `EHLO` with the given hostname.
    pub async fn ehlo(&mut self, hostname: &str) -> Result<Response> {
        self.command(&format!("EHLO {hostname}")).await
    }

    /// Send `MAIL FROM` with the envelope sender.
    pub async fn mail_from(&mut self, sender: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{sender}>")).await
    }

    /// Send `RCPT TO` with the envelope recipient.
    pub async fn rcpt_to(&mut self, recipient: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{recipient}>")).await
    }

    /// Send `DATA` and return the server's go-ahead reply.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Send the message body followed by the end-of-data marker.
    ///
    /// Lines starting with a dot are dot-stuffed per RFC 5321 §4.5.2.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<Response> {
        let mut wire = Vec::with_capacity(message.len() + 8);
        for line in message.split_inclusive(|&b| b == b'\n') {
            if line.first() == Some(&b'.') {
                wire.push(b'.');
            }
            wire.extend_from_slice(line);
        }
        if !wire.ends_with(b"\r\n") {
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b".\r\n");

        self.writer.write_all(&wire).await?;
        self.writer.flush().await?;

        self.read_response().await
    }

    /// Send `QUIT`.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    /// Send a single command line and read the reply.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        tracing::trace!(command, "Sending command");

        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;

        self.read_response().await
    }

    /// Read one reply line, refusing to buffer past [`MAX_LINE_LENGTH`].
    async fn read_reply_line(&mut self) -> Result<String> {
        const LIMIT: u64 = MAX_LINE_LENGTH as u64 + 1;

        let mut raw = Vec::new();
        let n = (&mut self.reader)
            .take(LIMIT)
            .read_until(b'\n', &mut raw)
            .await?;

        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        if raw.len() > MAX_LINE_LENGTH {
            return Err(ClientError::Parse("reply line too long".to_string()));
        }
        if !raw.ends_with(b"\n") {
            // EOF before the line terminator.
            return Err(ClientError::ConnectionClosed);
        }

        Ok(std::str::from_utf8(&raw)?.to_string())
    }

    async fn read_response(&mut self) -> Result<Response> {
        let mut lines = Vec::new();
        let mut code = None;

        loop {
            let line = self.read_reply_line().await?;
            let parsed = Response::parse_line(&line)?;

            match code {
                None => code = Some(parsed.code),
                Some(code) if code != parsed.code => {
                    return Err(ClientError::Parse(format!(
                        "reply code changed mid-response: {code} then {}",
                        parsed.code
                    )));
                }
                Some(_) => {}
            }

            lines.push(parsed.text);

            if parsed.is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(ClientError::Parse("reply has too many lines".to_string()));
            }
        }

        match code {
            Some(code) => Ok(Response::new(code, lines)),
            None => Err(ClientError::ConnectionClosed),
        }
    }
}
