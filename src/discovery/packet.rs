// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary codec for the UDP discovery protocol.
//!
//! The probe payload and the response layout were reverse engineered from
//! the vendor's discovery tool; the bytes are opaque to semantics and must
//! be reproduced bit-for-bit for device compatibility.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Serialize;

use crate::types::MacAddr;

/// UDP port the discovery protocol uses for both probe and response.
pub const DISCOVERY_PORT: u16 = 4000;

/// Fixed length of both the probe and a valid response datagram.
pub const PACKET_LEN: usize = 61;

/// ASCII marker a valid response begins with.
const RESPONSE_MARKER: &[u8] = b"IPCam";

/// Byte sequence terminating the device name field.
const NAME_TERMINATOR: [u8; 5] = [0x00, 0x30, 0x30, 0x38, 0x30];

/// Offset of the device name within a response.
const NAME_OFFSET: usize = 38;

/// The probe datagram broadcast to solicit responses.
const PROBE: [u8; PACKET_LEN] = [
    b'P', b'C', b'E', b'd', b'i', b't', 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

/// Returns the fixed probe payload.
#[must_use]
pub fn probe() -> &'static [u8; PACKET_LEN] {
    &PROBE
}

/// One device that answered a discovery probe.
///
/// Ephemeral: no identity beyond the field values, and the protocol layer
/// does not de-duplicate repeated answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Device name extracted from the response packet.
    pub name: String,
    /// Device IP address.
    pub ip: Ipv4Addr,
    /// Subnet mask.
    pub subnet_mask: Ipv4Addr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// Hardware address.
    pub mac: MacAddr,
    /// Elapsed time between the start of listening and this response.
    pub latency: Duration,
}

/// Decodes a candidate response datagram.
///
/// Returns `None` unless the payload is exactly 61 bytes and begins with
/// the `IPCam` marker; a truncated or foreign datagram is never an error,
/// just not a matching device. The name terminator is searched from the
/// name offset onwards — a packet without it is likewise rejected instead
/// of reading past the bound.
#[must_use]
pub fn try_decode_response(data: &[u8], latency: Duration) -> Option<DiscoveredDevice> {
    if data.len() != PACKET_LEN || !data.starts_with(RESPONSE_MARKER) {
        return None;
    }

    let name_end = data[NAME_OFFSET..]
        .windows(NAME_TERMINATOR.len())
        .position(|window| window == NAME_TERMINATOR)
        .map(|pos| NAME_OFFSET + pos)?;
    let name = String::from_utf8_lossy(&data[NAME_OFFSET..name_end]).into_owned();

    let ipv4_at = |offset: usize| Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    );

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[14..20]);

    Some(DiscoveredDevice {
        name,
        ip: ipv4_at(10),
        subnet_mask: ipv4_at(20),
        gateway: ipv4_at(27),
        mac: MacAddr::new(mac),
        latency,
    })
}
