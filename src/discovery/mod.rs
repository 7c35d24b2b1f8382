// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UDP broadcast discovery of NETIO-230A devices on the local network.
//!
//! The device answers a fixed probe datagram sent to the well-known
//! discovery port. Discovery binds a listener first, then broadcasts the
//! probe from every local IPv4 interface, and keeps receiving until an idle
//! window passes with no datagram. Each received datagram resets the
//! window; a device that never stops replying would keep discovery running,
//! which is the protocol's inherent shape.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> netio230a::Result<()> {
//! let devices = netio230a::discovery::discover().await?;
//! for device in &devices {
//!     println!("{} at {} ({})", device.name, device.ip, device.mac);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For streaming consumption, [`discover_into`] pushes devices into a
//! caller-owned channel as they arrive; dropping the receiver cancels the
//! listen loop.

mod packet;

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

use crate::error::{Error, Result};

pub use packet::{DISCOVERY_PORT, DiscoveredDevice, PACKET_LEN, probe, try_decode_response};

/// Default idle window after which listening stops.
///
/// Devices usually answer within a few milliseconds.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(200);

/// Capacity of the channel between the listen loop and the collector.
const CHANNEL_CAPACITY: usize = 32;

/// Options for a discovery run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use netio230a::discovery::DiscoveryOptions;
///
/// let options = DiscoveryOptions::new()
///     .with_idle_timeout(Duration::from_millis(500))
///     .with_port(4000);
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    port: u16,
    idle_timeout: Duration,
}

impl DiscoveryOptions {
    /// Creates options with the well-known port and default idle window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the UDP port to probe and listen on.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the idle window that ends listening.
    ///
    /// This is not a hard deadline: every received datagram resets it.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the idle window.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            port: DISCOVERY_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Discovers devices with default options.
///
/// # Errors
///
/// Returns error if the listener socket cannot be bound.
pub async fn discover() -> Result<Vec<DiscoveredDevice>> {
    discover_with(DiscoveryOptions::default()).await
}

/// Discovers devices and collects the answers in arrival order.
///
/// Duplicate answers are kept; de-duplication, if wanted, belongs to the
/// caller.
///
/// # Errors
///
/// Returns error if the listener socket cannot be bound.
pub async fn discover_with(options: DiscoveryOptions) -> Result<Vec<DiscoveredDevice>> {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let run = tokio::spawn(discover_into(options, tx));

    let mut devices = Vec::new();
    while let Some(device) = rx.recv().await {
        devices.push(device);
    }

    match run.await {
        Ok(result) => result?,
        Err(err) => return Err(Error::Transport(std::io::Error::other(err))),
    }
    Ok(devices)
}

/// Runs one discovery pass, pushing decoded devices into `tx`.
///
/// The listener is bound before any probe goes out so that even the
/// fastest answer is caught. Probes are sent as a limited broadcast from
/// every local interface with an IPv4 address; a send failure on one
/// interface is logged and skipped. Latency on each device is measured
/// from the moment listening begins.
///
/// The loop ends when the idle window elapses with no datagram or when the
/// receiving side of `tx` is dropped.
///
/// # Errors
///
/// Returns error if the listener socket cannot be bound; everything after
/// that is best-effort.
pub async fn discover_into(
    options: DiscoveryOptions,
    tx: mpsc::Sender<DiscoveredDevice>,
) -> Result<()> {
    let listener = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, options.port)).await?;
    tracing::debug!(port = options.port, "discovery listener bound");

    let probes_sent = send_probes(options.port).await;
    if probes_sent == 0 {
        tracing::warn!("no interface accepted the discovery probe");
    }

    let started = Instant::now();
    let mut buf = [0u8; 512];
    loop {
        let (len, addr) = match timeout(options.idle_timeout, listener.recv_from(&mut buf)).await {
            Err(_) => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "discovery idle window elapsed"
                );
                return Ok(());
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "discovery receive failed");
                return Err(Error::Transport(err));
            }
            Ok(Ok(received)) => received,
        };

        match try_decode_response(&buf[..len], started.elapsed()) {
            Some(device) => {
                tracing::debug!(name = %device.name, ip = %device.ip, from = %addr, "device answered");
                if tx.send(device).await.is_err() {
                    tracing::debug!("discovery consumer gone, stopping");
                    return Ok(());
                }
            }
            // Our own probe echoes back here too; everything that is not a
            // valid response is silently ignored.
            None => tracing::trace!(len, from = %addr, "ignoring datagram"),
        }
    }
}

/// Broadcasts the probe from every local IPv4 interface address.
///
/// Returns the number of interfaces the probe was actually sent from.
async fn send_probes(port: u16) -> usize {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            tracing::warn!(error = %err, "could not enumerate network interfaces");
            return 0;
        }
    };

    let mut sent = 0;
    for interface in interfaces {
        let std::net::IpAddr::V4(source) = interface.ip() else {
            continue;
        };
        match send_probe_from(source, port).await {
            Ok(()) => {
                tracing::trace!(interface = %interface.name, %source, "probe sent");
                sent += 1;
            }
            Err(err) => {
                tracing::warn!(interface = %interface.name, %source, error = %err, "probe send failed");
            }
        }
    }
    sent
}

async fn send_probe_from(source: Ipv4Addr, port: u16) -> std::io::Result<()> {
    let socket = UdpSocket::bind((source, 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(probe(), (Ipv4Addr::BROADCAST, port)).await?;
    Ok(())
}
