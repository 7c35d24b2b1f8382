// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware address of a discovered device.

use std::fmt;

use serde::Serialize;

/// A 6-byte MAC address.
///
/// # Examples
///
/// ```
/// use netio230a::types::MacAddr;
///
/// let mac = MacAddr::new([0x00, 0x50, 0xC2, 0x8B, 0x12, 0x34]);
/// assert_eq!(mac.to_string(), "00:50:c2:8b:12:34");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Creates a MAC address from its raw bytes.
    #[must_use]
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}
