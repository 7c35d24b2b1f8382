// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Rust library to control the Koukaam NETIO-230A networked power
//! sockets.
//!
//! The NETIO-230A exposes a line-oriented KSHELL/telnet protocol for
//! control and a UDP broadcast protocol for discovery. This crate covers
//! both:
//!
//! - **Session control**: authenticated TCP session, typed command API for
//!   the four power sockets and the system settings
//! - **Discovery**: enumerate devices on the local network without knowing
//!   their addresses
//!
//! # Quick Start
//!
//! ## Switching a power socket
//!
//! ```no_run
//! use netio230a::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> netio230a::Result<()> {
//!     let mut session = SessionBuilder::new("192.168.1.2")
//!         .credentials("admin", "secret")
//!         .secure_login(true) // hash credentials instead of cleartext
//!         .connect()
//!         .await?;
//!
//!     // Switch socket 0 on and inspect all four sockets
//!     session.set_outlet_power(0, true).await?;
//!     for outlet in session.refresh_outlets().await? {
//!         println!("{}: {}", outlet.name, if outlet.power_on { "on" } else { "off" });
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Finding devices on the LAN
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> netio230a::Result<()> {
//!     for device in netio230a::discovery::discover().await? {
//!         println!(
//!             "{} at {} (mac {}, answered in {:?})",
//!             device.name, device.ip, device.mac, device.latency
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Reconnect behavior
//!
//! A transport fault in the middle of a session triggers exactly one
//! automatic reconnect-and-reauthenticate, after which the failed command
//! is replayed once. A second fault, or any command-level protocol
//! violation, is surfaced to the caller immediately.

pub mod discovery;
pub mod error;
mod outlet;
pub mod protocol;
mod session;
pub mod types;

pub use discovery::{DiscoveredDevice, DiscoveryOptions};
pub use error::{Error, Result};
pub use outlet::{OUTLET_COUNT, OutletState};
pub use session::{DeviceSession, SessionBuilder};
pub use types::{MacAddr, NetworkConfig};
