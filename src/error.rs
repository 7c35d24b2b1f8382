// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `netio230a` library.
//!
//! Every fatal error carries enough context (command text and/or the raw
//! response line) to diagnose a device or firmware mismatch without having
//! to reproduce the session.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connect attempt did not complete within the timeout.
    #[error("timeout while connecting to {host}")]
    ConnectTimeout {
        /// Host the connection was attempted against.
        host: String,
    },

    /// The hostname could not be resolved, or there is no route to it.
    #[error("unable to reach host {host}: {source}")]
    UnreachableHost {
        /// Host the connection was attempted against.
        host: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The remote host refused the connection.
    ///
    /// Usually a wrong IP or TCP port, or the KSHELL server on the device
    /// is not running.
    #[error("connection refused by {host}")]
    ConnectionRefused {
        /// Host the connection was attempted against.
        host: String,
    },

    /// The greeting line was not a valid `100 HELLO` banner.
    #[error("unexpected greeting from device: {greeting:?}")]
    ProtocolMismatch {
        /// The raw greeting line as received.
        greeting: String,
    },

    /// The device rejected the login.
    #[error("login failed, device answered: {response:?}")]
    AuthFailed {
        /// The raw login response line.
        response: String,
    },

    /// A command expecting a `250` response received something else.
    #[error("command {command:?} failed, device answered: {response:?}")]
    CommandFailed {
        /// The command line that was sent.
        command: String,
        /// The raw response line.
        response: String,
    },

    /// A response did not have the structure the command implies.
    ///
    /// Raised for example when a `port setup` line does not tokenize into
    /// exactly four fields, or a numeric reply does not parse.
    #[error("malformed response to {command:?}: {response:?}")]
    MalformedResponse {
        /// The command line that was sent.
        command: String,
        /// The raw response payload.
        response: String,
    },

    /// A generic send/receive fault on the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl Error {
    /// Returns true for mid-session faults that warrant the one-shot
    /// reconnect-and-replay policy.
    ///
    /// Command-level protocol violations are deliberately excluded: they
    /// indicate a semantic mismatch, not a transient fault.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
