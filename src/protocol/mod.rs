// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! KSHELL protocol layer.
//!
//! Split in two:
//!
//! - [`codec`]: pure build/parse functions for the line protocol, no I/O
//! - [`LineTransport`]: the TCP connection with its timeout handling
//!
//! The session layer composes the two; nothing in here knows about login
//! state or the retry policy.

pub mod codec;
mod transport;

pub use transport::LineTransport;
