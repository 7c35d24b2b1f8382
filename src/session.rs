// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authenticated KSHELL session with one NETIO-230A device.
//!
//! A [`DeviceSession`] owns exactly one TCP connection and moves through
//! the states `Disconnected -> Connected -> Authenticated`. Commands may
//! only be issued while authenticated; a transport fault mid-session drops
//! the connection, reconnects and re-authenticates once, and replays the
//! failed command once. A second fault is fatal.
//!
//! Sessions are single-outstanding-request: issue one command, read its
//! answer, then issue the next. The API takes `&mut self` throughout, so
//! the borrow checker enforces this.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::outlet::{OUTLET_COUNT, OutletState};
use crate::protocol::{LineTransport, codec};
use crate::types::NetworkConfig;

/// Format of the device clock in `system time` exchanges.
const TIME_FORMAT: &str = "%Y/%m/%d,%H:%M:%S";

/// Grace period before returning from a confirmed reboot, so that socket
/// teardown does not race the device's own restart.
const REBOOT_GRACE: Duration = Duration::from_millis(50);

/// Connection lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// No transport, or the previous one faulted.
    Disconnected,
    /// Transport open, greeting being validated, not yet logged in.
    Connected,
    /// Login accepted; commands may be issued.
    Authenticated,
}

/// Builder for a [`DeviceSession`].
///
/// # Examples
///
/// ```no_run
/// use netio230a::SessionBuilder;
///
/// # async fn example() -> netio230a::Result<()> {
/// let mut session = SessionBuilder::new("192.168.1.2")
///     .credentials("admin", "secret")
///     .secure_login(true)
///     .connect()
///     .await?;
///
/// session.set_outlet_power(0, true).await?;
/// session.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: String,
    password: String,
    secure_login: bool,
    read_timeout: Duration,
}

impl SessionBuilder {
    /// Default KSHELL TCP port.
    pub const DEFAULT_PORT: u16 = 23;
    /// Default connect and read timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a builder for the given host name or address.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            secure_login: false,
            read_timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Selects hashed login instead of cleartext.
    ///
    /// Strongly recommended on untrusted networks: only an MD5 digest of
    /// the credentials and the per-connection challenge crosses the wire.
    #[must_use]
    pub fn secure_login(mut self, secure: bool) -> Self {
        self.secure_login = secure;
        self
    }

    /// Sets a custom TCP port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect/read timeout.
    #[must_use]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Connects and authenticates, returning a ready session.
    ///
    /// # Errors
    ///
    /// Establishment failures are fatal for this call and are not retried:
    /// [`Error::ConnectTimeout`], [`Error::UnreachableHost`],
    /// [`Error::ConnectionRefused`], [`Error::ProtocolMismatch`],
    /// [`Error::AuthFailed`].
    pub async fn connect(self) -> Result<DeviceSession> {
        let mut session = DeviceSession {
            config: self,
            state: SessionState::Disconnected,
            transport: None,
            outlets: std::array::from_fn(|_| OutletState::default()),
        };
        session.establish().await?;
        Ok(session)
    }
}

/// One authenticated, stateful connection to a single device.
///
/// Construct via [`SessionBuilder`]. See the [module docs](self) for the
/// reconnect policy.
#[derive(Debug)]
pub struct DeviceSession {
    config: SessionBuilder,
    state: SessionState,
    transport: Option<LineTransport>,
    outlets: [OutletState; OUTLET_COUNT],
}

impl DeviceSession {
    // ========== Connection lifecycle ==========

    /// Opens the transport and runs the login handshake.
    async fn establish(&mut self) -> Result<()> {
        self.drop_transport();

        tracing::debug!(host = %self.config.host, port = self.config.port, "connecting");
        let mut transport = LineTransport::connect(
            &self.config.host,
            self.config.port,
            self.config.read_timeout,
            self.config.read_timeout,
        )
        .await?;
        self.state = SessionState::Connected;

        let greeting = transport.read_line().await?;
        let challenge = codec::parse_greeting(&greeting)?;

        let login = if self.config.secure_login {
            codec::build_secure_login(&self.config.username, &self.config.password, challenge)
        } else {
            codec::build_plain_login(&self.config.username, &self.config.password)
        };
        transport.send(&codec::build_command(&login)).await?;

        let answer = transport.read_line().await?;
        codec::parse_login_result(&answer)?;

        tracing::debug!(host = %self.config.host, user = %self.config.username, "authenticated");
        self.transport = Some(transport);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    fn drop_transport(&mut self) {
        self.transport = None;
        self.state = SessionState::Disconnected;
    }

    /// Sends `quit` best-effort and closes the transport.
    ///
    /// Errors are ignored; calling this on an already disconnected session
    /// is a no-op.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.send(&codec::build_command("quit")).await;
            transport.close().await;
        }
        self.state = SessionState::Disconnected;
    }

    // ========== Request core ==========

    /// One send/read exchange on the current transport.
    async fn exchange(&mut self, command: &str) -> Result<String> {
        let transport = self.transport.as_mut().ok_or_else(|| {
            Error::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "session has no open transport",
            ))
        })?;
        transport.send(&codec::build_command(command)).await?;
        transport.read_line().await
    }

    /// Sends a command, applying the retry-once reconnect policy.
    ///
    /// A transport fault on the first attempt triggers exactly one
    /// reconnect-and-reauthenticate followed by one replay; any failure
    /// after that is surfaced as fatal. Protocol violations are never
    /// retried, and neither is a failure to (re)establish the connection.
    async fn request(&mut self, command: &str, expect_success: bool) -> Result<String> {
        if self.state != SessionState::Authenticated {
            self.establish().await?;
        }
        let line = match self.exchange(command).await {
            Ok(line) => line,
            Err(err) if err.is_transport() => {
                tracing::warn!(command, error = %err, "transport fault, reconnecting once");
                self.drop_transport();
                self.establish().await?;
                self.exchange(command).await?
            }
            Err(err) => return Err(err),
        };
        codec::parse_command_result(command, &line, expect_success)
    }

    /// Parses a numeric response payload.
    fn parse_number<T: std::str::FromStr>(command: &str, payload: &str) -> Result<T> {
        payload.trim().parse().map_err(|_| Error::MalformedResponse {
            command: command.to_string(),
            response: payload.to_string(),
        })
    }

    // ========== Power sockets ==========

    /// Asks for the power status of all four sockets.
    ///
    /// Returns the raw 4-character status string, one `'0'`/`'1'` per
    /// socket in fixed index order, e.g. `"1001"`.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_outlet_list(&mut self) -> Result<String> {
        self.request("port list", true).await
    }

    /// Asks for the raw `port setup` string of one socket.
    ///
    /// The public API is 0-indexed; the device is 1-indexed on the wire
    /// for this command.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_outlet_setup(&mut self, index: usize) -> Result<String> {
        self.request(&format!("port setup {}", index + 1), true).await
    }

    /// Switches one socket on or off.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_outlet_power(&mut self, index: usize, on: bool) -> Result<()> {
        self.request(&format!("port {} {}", index, u8::from(on)), true)
            .await?;
        Ok(())
    }

    /// Interrupts one socket temporarily for its configured delay.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_outlet_temp_interrupt(&mut self, index: usize) -> Result<()> {
        self.request(&format!("port {index} int"), true).await?;
        Ok(())
    }

    /// Puts one socket into manual switching mode.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_outlet_manual_mode(&mut self, index: usize) -> Result<()> {
        self.request(&format!("port {index} manual"), true).await?;
        Ok(())
    }

    /// Asks for the raw watchdog settings string of one socket.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_watchdog_settings(&mut self, index: usize) -> Result<String> {
        self.request(&format!("port wd {index}"), true).await
    }

    /// Refreshes all four [`OutletState`] records in place.
    ///
    /// Issues one `port list` and one `port setup` per socket. Each setup
    /// line must tokenize into exactly four fields: name, mode keyword,
    /// interrupt delay, power-on-after-loss flag. Sockets updated before a
    /// failing index keep their newly parsed values; a partial update is
    /// not rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the status string is not
    /// four characters or a setup line does not have four fields.
    pub async fn refresh_outlets(&mut self) -> Result<&[OutletState; OUTLET_COUNT]> {
        let status = self.get_outlet_list().await?;
        let power: Vec<char> = status.chars().collect();
        if power.len() != OUTLET_COUNT {
            return Err(Error::MalformedResponse {
                command: "port list".to_string(),
                response: status,
            });
        }

        for index in 0..OUTLET_COUNT {
            let setup = self.get_outlet_setup(index).await?;
            let fields = codec::split_fields(&setup);
            let [name, mode, delay, after_loss] = fields.as_slice() else {
                return Err(Error::MalformedResponse {
                    command: format!("port setup {}", index + 1),
                    response: setup,
                });
            };

            let delay: u32 = Self::parse_number(&format!("port setup {}", index + 1), delay)?;
            let after_loss: u8 =
                Self::parse_number(&format!("port setup {}", index + 1), after_loss)?;

            let outlet = &mut self.outlets[index];
            outlet.name = name.clone();
            outlet.manual_mode = mode == "manual";
            outlet.interrupt_delay = delay;
            outlet.power_on_after_loss = after_loss != 0;
            outlet.power_on = power[index] == '1';
        }
        Ok(&self.outlets)
    }

    /// Returns the last refreshed state of all four sockets.
    ///
    /// Call [`refresh_outlets`](Self::refresh_outlets) first; until then
    /// these hold construction defaults.
    #[must_use]
    pub fn outlets(&self) -> &[OutletState; OUTLET_COUNT] {
        &self.outlets
    }

    /// Returns the last refreshed state of one socket, if the index is in
    /// range.
    #[must_use]
    pub fn outlet(&self, index: usize) -> Option<&OutletState> {
        self.outlets.get(index)
    }

    // ========== Device identity ==========

    /// Asks for the firmware version string.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_firmware_version(&mut self) -> Result<String> {
        self.request("version", true).await
    }

    /// Asks for the device alias.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_alias(&mut self) -> Result<String> {
        self.request("alias", true).await
    }

    /// Sets the device alias.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_alias(&mut self, alias: &str) -> Result<()> {
        self.request(&format!("alias {alias}"), true).await?;
        Ok(())
    }

    /// Reboots the device.
    ///
    /// The answer is not required to be a `250`; a `120 Rebooting` reply
    /// is the expected confirmation, and on that reply only the connection
    /// is held open briefly before returning, so that closing the socket
    /// does not race the device's restart. This command is operation-safe:
    /// the sockets keep their state across the reboot.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange fails.
    pub async fn reboot(&mut self) -> Result<()> {
        let answer = self.request("reboot", false).await?;
        if answer.starts_with("120 Rebooting") {
            tokio::time::sleep(REBOOT_GRACE).await;
        }
        Ok(())
    }

    // ========== Network settings ==========

    /// Asks for the raw `system eth` settings string.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_network_settings(&mut self) -> Result<String> {
        self.request("system eth", true).await
    }

    /// Configures the ethernet interface.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_network_settings(&mut self, config: NetworkConfig) -> Result<()> {
        self.request(&format!("system eth {}", config.to_command_args()), true)
            .await?;
        Ok(())
    }

    /// Asks for the configured DNS server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the answer is not an IPv4
    /// address.
    pub async fn get_dns_server(&mut self) -> Result<std::net::Ipv4Addr> {
        let payload = self.request("system dns", true).await?;
        Self::parse_number("system dns", &payload)
    }

    /// Sets the DNS server.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_dns_server(&mut self, server: std::net::Ipv4Addr) -> Result<()> {
        self.request(&format!("system dns {server}"), true).await?;
        Ok(())
    }

    /// Asks whether the device answers discovery probes.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_discoverable(&mut self) -> Result<bool> {
        Ok(self.request("system discover", true).await? == "enable")
    }

    /// Enables or disables answering discovery probes.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_discoverable(&mut self, discoverable: bool) -> Result<()> {
        let keyword = if discoverable { "enable" } else { "disable" };
        self.request(&format!("system discover {keyword}"), true)
            .await?;
        Ok(())
    }

    // ========== System settings ==========

    /// Asks for the switching delay between sockets, in seconds.
    ///
    /// The device stores deciseconds; one decimal of precision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the answer is not a number.
    pub async fn get_switch_delay(&mut self) -> Result<f64> {
        let payload = self.request("system swdelay", true).await?;
        let deciseconds: i64 = Self::parse_number("system swdelay", &payload)?;
        #[allow(clippy::cast_precision_loss)]
        Ok(deciseconds as f64 / 10.0)
    }

    /// Sets the switching delay between sockets, in seconds.
    ///
    /// Transmitted in deciseconds, rounded up.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_switch_delay(&mut self, seconds: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let deciseconds = (seconds * 10.0).ceil() as i64;
        self.request(&format!("system swdelay {deciseconds}"), true)
            .await?;
        Ok(())
    }

    /// Asks for the raw SNTP settings string.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn get_sntp_settings(&mut self) -> Result<String> {
        self.request("system sntp", true).await
    }

    /// Enables or disables SNTP synchronization against the given server.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_sntp_settings(&mut self, enable: bool, server: &str) -> Result<()> {
        let command = if enable {
            format!("system sntp enable {server}")
        } else {
            "system sntp disable".to_string()
        };
        self.request(&command, true).await?;
        Ok(())
    }

    /// Asks for the device clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the answer does not match
    /// the `YYYY/MM/DD,HH:MM:SS` wire format.
    pub async fn get_system_time(&mut self) -> Result<NaiveDateTime> {
        let payload = self.request("system time", true).await?;
        NaiveDateTime::parse_from_str(&payload, TIME_FORMAT).map_err(|_| {
            Error::MalformedResponse {
                command: "system time".to_string(),
                response: payload,
            }
        })
    }

    /// Sets the device clock.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_system_time(&mut self, time: NaiveDateTime) -> Result<()> {
        self.request(&format!("system time {}", time.format(TIME_FORMAT)), true)
            .await?;
        Ok(())
    }

    /// Asks for the timezone offset from UTC, in hours.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the answer is not a number.
    pub async fn get_system_timezone(&mut self) -> Result<f64> {
        let payload = self.request("system timezone", true).await?;
        let seconds: i64 = Self::parse_number("system timezone", &payload)?;
        #[allow(clippy::cast_precision_loss)]
        Ok(seconds as f64 / 3600.0)
    }

    /// Sets the timezone offset from UTC, in hours.
    ///
    /// Transmitted in seconds, rounded up.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange or the response check fails.
    pub async fn set_system_timezone(&mut self, hours_offset: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let seconds = (hours_offset * 3600.0).ceil() as i64;
        self.request(&format!("system timezone {seconds}"), true)
            .await?;
        Ok(())
    }
}
