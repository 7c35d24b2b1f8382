// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP line transport for the KSHELL protocol.
//!
//! One [`LineTransport`] owns one socket. The session layer recreates the
//! whole transport on reconnect rather than reusing it.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// A buffered, timeout-bounded line connection to one device.
#[derive(Debug)]
pub struct LineTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    read_timeout: Duration,
}

impl LineTransport {
    /// Opens a TCP connection with a bounded connect timeout.
    ///
    /// # Errors
    ///
    /// Establishment failures map onto the session error taxonomy:
    ///
    /// - the timer elapsing → [`Error::ConnectTimeout`]
    /// - a refused connection → [`Error::ConnectionRefused`]
    /// - an unresolvable name or missing route → [`Error::UnreachableHost`]
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let stream = match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    host: host.to_string(),
                });
            }
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
                return Err(Error::ConnectionRefused {
                    host: host.to_string(),
                });
            }
            // Resolution failures and missing routes both land here; either
            // way the host cannot be reached as given.
            Ok(Err(err)) => {
                return Err(Error::UnreachableHost {
                    host: host.to_string(),
                    source: err,
                });
            }
            Ok(Ok(stream)) => stream,
        };

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            read_timeout,
        })
    }

    /// Sends one pre-framed request line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on any send fault.
    pub async fn send(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads one `\n`-terminated response line, terminator included.
    ///
    /// The device frames every answer with CR LF, so the returned string
    /// normally ends in `\r\n`. Bytes that are not valid UTF-8 are replaced
    /// rather than dropped so that error messages can still show the raw
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the read times out, the peer
    /// closes the connection, or any other receive fault occurs.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::with_capacity(64);
        loop {
            let byte = match timeout(self.read_timeout, self.reader.read_u8()).await {
                Err(_) => {
                    return Err(Error::Transport(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "timed out waiting for response line",
                    )));
                }
                Ok(Err(err)) => return Err(Error::Transport(err)),
                Ok(Ok(byte)) => byte,
            };
            buf.push(byte);
            if byte == b'\n' {
                return Ok(String::from_utf8_lossy(&buf).into_owned());
            }
        }
    }

    /// Shuts the socket down, ignoring errors. Consumes the transport.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
