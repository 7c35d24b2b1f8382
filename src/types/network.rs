// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network configuration for the device's ethernet interface.

use std::net::Ipv4Addr;

use serde::Serialize;

/// Ethernet settings accepted by `system eth`.
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use netio230a::types::NetworkConfig;
///
/// let dhcp = NetworkConfig::Dhcp;
/// let fixed = NetworkConfig::Static {
///     ip: Ipv4Addr::new(192, 168, 1, 2),
///     subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
///     gateway: Ipv4Addr::new(192, 168, 1, 1),
/// };
/// # let _ = (dhcp, fixed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkConfig {
    /// Obtain the address via DHCP.
    Dhcp,
    /// Fixed address configuration.
    Static {
        /// Device IP address.
        ip: Ipv4Addr,
        /// Subnet mask.
        subnet_mask: Ipv4Addr,
        /// Default gateway.
        gateway: Ipv4Addr,
    },
}

impl NetworkConfig {
    /// Renders the argument part of the `system eth` command.
    #[must_use]
    pub(crate) fn to_command_args(self) -> String {
        match self {
            NetworkConfig::Dhcp => "dhcp".to_string(),
            NetworkConfig::Static {
                ip,
                subnet_mask,
                gateway,
            } => format!("manual {ip} {subnet_mask} {gateway}"),
        }
    }
}
