// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire codec for the KSHELL line protocol.
//!
//! Pure functions that build outgoing command lines and parse incoming
//! response lines. No I/O happens here; [`LineTransport`] owns the socket
//! and [`DeviceSession`] drives the exchange.
//!
//! Device responses are CR LF terminated. Request lines are terminated by a
//! single `\n` on the wire — that asymmetry is what the NETIO-230A firmware
//! expects and must not be "fixed".
//!
//! [`LineTransport`]: crate::protocol::LineTransport
//! [`DeviceSession`]: crate::DeviceSession

use std::fmt::Write as _;

use md5::{Digest, Md5};

use crate::error::{Error, Result};

/// Line terminator used by the device for every response.
pub const LINE_ENDING: &str = "\r\n";

/// Leading token of the greeting banner.
const GREETING_PREFIX: &str = "100 HELLO ";

/// Length of the hex challenge embedded in the greeting.
const CHALLENGE_LEN: usize = 8;

/// Success prefix of a generic command response.
const SUCCESS_PREFIX: &str = "250 ";

/// The exact login success line.
const LOGIN_OK: &str = "250 OK\r\n";

/// Builds the raw bytes for one request line.
///
/// The command is ASCII; the request framing appends `\n` only.
#[must_use]
pub fn build_command(command: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(command.len() + 1);
    line.extend_from_slice(command.as_bytes());
    line.push(b'\n');
    line
}

/// Parses the greeting banner and extracts the login challenge.
///
/// Exactly three forms are accepted, case-sensitive and anchored to the
/// full line including the terminator:
///
/// - `100 HELLO XXXXXXXX\r\n`
/// - `100 HELLO XXXXXXXX - KSHELL V1.1\r\n`
/// - `100 HELLO XXXXXXXX - KSHELL V1.2\r\n`
///
/// where `XXXXXXXX` is eight uppercase hex digits.
///
/// # Errors
///
/// Returns [`Error::ProtocolMismatch`] carrying the raw line for any other
/// content.
pub fn parse_greeting(line: &str) -> Result<&str> {
    let mismatch = || Error::ProtocolMismatch {
        greeting: line.to_string(),
    };

    let body = line
        .strip_prefix(GREETING_PREFIX)
        .and_then(|rest| rest.strip_suffix(LINE_ENDING))
        .ok_or_else(mismatch)?;

    if body.len() < CHALLENGE_LEN || !body.is_char_boundary(CHALLENGE_LEN) {
        return Err(mismatch());
    }
    let (challenge, tail) = body.split_at(CHALLENGE_LEN);

    let is_upper_hex = |c: char| c.is_ascii_digit() || ('A'..='F').contains(&c);
    if !challenge.chars().all(is_upper_hex) {
        return Err(mismatch());
    }

    match tail {
        "" | " - KSHELL V1.1" | " - KSHELL V1.2" => Ok(challenge),
        _ => Err(mismatch()),
    }
}

/// Builds the hashed login command.
///
/// The digest is the lowercase hex MD5 of the ASCII concatenation
/// `username + password + challenge`, with the challenge taken verbatim
/// from the greeting. Only the hash crosses the wire, never the password.
#[must_use]
pub fn build_secure_login(username: &str, password: &str, challenge: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(username.as_bytes());
    hasher.update(password.as_bytes());
    hasher.update(challenge.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }

    format!("clogin {username} {hex}")
}

/// Builds the cleartext login command.
#[must_use]
pub fn build_plain_login(username: &str, password: &str) -> String {
    format!("login {username} {password}")
}

/// Checks the response to a login command.
///
/// # Errors
///
/// Returns [`Error::AuthFailed`] with the raw line unless it is exactly
/// `250 OK\r\n`.
pub fn parse_login_result(line: &str) -> Result<()> {
    if line == LOGIN_OK {
        Ok(())
    } else {
        Err(Error::AuthFailed {
            response: line.to_string(),
        })
    }
}

/// Checks and strips a generic command response.
///
/// With `expect_success`, the line must start with `250 `; the returned
/// payload is the line with that prefix and the terminator stripped.
/// Without it (used for commands such as `reboot` whose reply may not be a
/// `250`), the trimmed raw line is returned unconditionally and
/// classification is left to the caller.
///
/// # Errors
///
/// Returns [`Error::CommandFailed`] carrying the command and the raw line
/// when a `250` was expected but not received.
pub fn parse_command_result(command: &str, line: &str, expect_success: bool) -> Result<String> {
    let trimmed = line.strip_suffix(LINE_ENDING).unwrap_or(line);
    if !expect_success {
        return Ok(trimmed.to_string());
    }
    match trimmed.strip_prefix(SUCCESS_PREFIX) {
        Some(payload) => Ok(payload.to_string()),
        None => Err(Error::CommandFailed {
            command: command.to_string(),
            response: line.to_string(),
        }),
    }
}

/// Splits a response line on whitespace, honoring quoted substrings.
///
/// A `port setup` answer quotes socket names that contain spaces, e.g.
/// `"Table Lamp" manual 5 1` is four fields. Both double and single quotes
/// group; the quotes themselves are not part of the field.
#[must_use]
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_field = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                in_field = true;
                quote = Some(c);
            }
            None if c.is_whitespace() => {
                if in_field {
                    fields.push(std::mem::take(&mut current));
                    in_field = false;
                }
            }
            None => {
                in_field = true;
                current.push(c);
            }
        }
    }
    if in_field {
        fields.push(current);
    }
    fields
}
