// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the KSHELL session against an in-process fake
//! device.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::NaiveDate;
use netio230a::{Error, SessionBuilder};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const GREETING: &str = "100 HELLO 3F2A9C11 - KSHELL V1.2\r\n";
// md5("adminsecret3F2A9C11")
const SECURE_LOGIN: &str = "clogin admin 43a15722218ed9e0341425ff18dce2af";
const PLAIN_LOGIN: &str = "login admin secret";

type Device = BufReader<TcpStream>;

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Reads one `\n`-terminated request line, terminator stripped.
async fn read_request(device: &mut Device) -> String {
    let mut line = String::new();
    device.read_line(&mut line).await.unwrap();
    line.trim_end_matches('\n').to_string()
}

async fn respond(device: &mut Device, line: &str) {
    device.get_mut().write_all(line.as_bytes()).await.unwrap();
}

/// Accepts one connection and walks it through a successful handshake.
async fn accept_and_login(listener: &TcpListener, expected_login: &str) -> Device {
    let (stream, _) = listener.accept().await.unwrap();
    let mut device = BufReader::new(stream);
    respond(&mut device, GREETING).await;
    assert_eq!(read_request(&mut device).await, expected_login);
    respond(&mut device, "250 OK\r\n").await;
    device
}

fn builder(addr: SocketAddr) -> SessionBuilder {
    SessionBuilder::new(addr.ip().to_string())
        .port(addr.port())
        .credentials("admin", "secret")
        .read_timeout(Duration::from_secs(2))
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn secure_login_sends_challenge_digest() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, SECURE_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "quit");
    });

    let mut session = builder(addr).secure_login(true).connect().await.unwrap();
    session.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn plain_login_sends_cleartext() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "quit");
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn bare_greeting_without_kshell_suffix_is_accepted() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut device = BufReader::new(stream);
        respond(&mut device, "100 HELLO 00FF00FF\r\n").await;
        read_request(&mut device).await;
        respond(&mut device, "250 OK\r\n").await;
        assert_eq!(read_request(&mut device).await, "quit");
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn foreign_greeting_is_a_protocol_mismatch() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut device = BufReader::new(stream);
        respond(&mut device, "220 FTP server ready\r\n").await;
    });

    let err = builder(addr).connect().await.unwrap_err();
    match err {
        Error::ProtocolMismatch { greeting } => {
            assert_eq!(greeting, "220 FTP server ready\r\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_login_is_auth_failed() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut device = BufReader::new(stream);
        respond(&mut device, GREETING).await;
        read_request(&mut device).await;
        respond(&mut device, "501 INVALID PARAMETR\r\n").await;
    });

    let err = builder(addr).connect().await.unwrap_err();
    assert!(matches!(err, Error::AuthFailed { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_reported_as_such() {
    // Bind a listener to claim a free port, then close it again.
    let (listener, addr) = bind().await;
    drop(listener);

    let err = builder(addr).connect().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionRefused { .. }));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn outlet_list_returns_status_string() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port list");
        respond(&mut device, "250 1001\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    assert_eq!(session.get_outlet_list().await.unwrap(), "1001");
    server.await.unwrap();
}

#[tokio::test]
async fn set_outlet_power_wire_format() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port 0 1");
        respond(&mut device, "250 OK\r\n").await;
        assert_eq!(read_request(&mut device).await, "port 3 0");
        respond(&mut device, "250 OK\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.set_outlet_power(0, true).await.unwrap();
    session.set_outlet_power(3, false).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn outlet_setup_is_one_indexed_on_the_wire() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port setup 1");
        respond(&mut device, "250 Lamp manual 5 1\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    assert_eq!(session.get_outlet_setup(0).await.unwrap(), "Lamp manual 5 1");
    server.await.unwrap();
}

#[tokio::test]
async fn non_250_response_is_command_failed() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "alias");
        respond(&mut device, "502 UNKNOWN COMMAND\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    let err = session.get_alias().await.unwrap_err();
    match err {
        Error::CommandFailed { command, response } => {
            assert_eq!(command, "alias");
            assert_eq!(response, "502 UNKNOWN COMMAND\r\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn switch_delay_uses_deciseconds() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "system swdelay 23");
        respond(&mut device, "250 OK\r\n").await;
        assert_eq!(read_request(&mut device).await, "system swdelay");
        respond(&mut device, "250 23\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.set_switch_delay(2.3).await.unwrap();
    let delay = session.get_switch_delay().await.unwrap();
    assert!((delay - 2.3).abs() < f64::EPSILON);
    server.await.unwrap();
}

#[tokio::test]
async fn timezone_uses_seconds() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "system timezone 7200");
        respond(&mut device, "250 OK\r\n").await;
        assert_eq!(read_request(&mut device).await, "system timezone");
        respond(&mut device, "250 7200\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.set_system_timezone(2.0).await.unwrap();
    let offset = session.get_system_timezone().await.unwrap();
    assert!((offset - 2.0).abs() < f64::EPSILON);
    server.await.unwrap();
}

#[tokio::test]
async fn system_time_round_trips_the_wire_format() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "system time");
        respond(&mut device, "250 2026/08/25,13:37:00\r\n").await;
        assert_eq!(
            read_request(&mut device).await,
            "system time 2026/08/25,13:37:00"
        );
        respond(&mut device, "250 OK\r\n").await;
    });

    let expected = NaiveDate::from_ymd_opt(2026, 8, 25)
        .unwrap()
        .and_hms_opt(13, 37, 0)
        .unwrap();

    let mut session = builder(addr).connect().await.unwrap();
    assert_eq!(session.get_system_time().await.unwrap(), expected);
    session.set_system_time(expected).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn discoverable_maps_enable_keyword() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "system discover");
        respond(&mut device, "250 enable\r\n").await;
        assert_eq!(read_request(&mut device).await, "system discover disable");
        respond(&mut device, "250 OK\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    assert!(session.get_discoverable().await.unwrap());
    session.set_discoverable(false).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn reboot_accepts_120_response() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "reboot");
        respond(&mut device, "120 Rebooting\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.reboot().await.unwrap();
    server.await.unwrap();
}

// ============================================================================
// Outlet refresh
// ============================================================================

#[tokio::test]
async fn refresh_outlets_parses_all_four_setups() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port list");
        respond(&mut device, "250 1001\r\n").await;
        let setups = [
            "250 Lamp manual 5 1\r\n",
            "250 Heater timer 2 0\r\n",
            "250 Fan manual 0 0\r\n",
            "250 Router timer 10 1\r\n",
        ];
        for (i, setup) in setups.iter().enumerate() {
            assert_eq!(read_request(&mut device).await, format!("port setup {}", i + 1));
            respond(&mut device, setup).await;
        }
    });

    let mut session = builder(addr).connect().await.unwrap();
    let outlets = session.refresh_outlets().await.unwrap();

    assert_eq!(outlets[0].name, "Lamp");
    assert!(outlets[0].manual_mode);
    assert_eq!(outlets[0].interrupt_delay, 5);
    assert!(outlets[0].power_on_after_loss);
    assert!(outlets[0].power_on);

    assert_eq!(outlets[1].name, "Heater");
    assert!(!outlets[1].manual_mode);
    assert_eq!(outlets[1].interrupt_delay, 2);
    assert!(!outlets[1].power_on_after_loss);
    assert!(!outlets[1].power_on);

    assert_eq!(outlets[2].name, "Fan");
    assert!(!outlets[2].power_on);
    assert_eq!(outlets[3].name, "Router");
    assert!(outlets[3].power_on);
    server.await.unwrap();
}

#[tokio::test]
async fn refresh_outlets_handles_quoted_names() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        read_request(&mut device).await;
        respond(&mut device, "250 0000\r\n").await;
        for i in 0..4 {
            assert_eq!(read_request(&mut device).await, format!("port setup {}", i + 1));
            respond(&mut device, "250 \"Table Lamp\" manual 5 0\r\n").await;
        }
    });

    let mut session = builder(addr).connect().await.unwrap();
    let outlets = session.refresh_outlets().await.unwrap();
    assert_eq!(outlets[0].name, "Table Lamp");
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_setup_keeps_earlier_updates() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        read_request(&mut device).await;
        respond(&mut device, "250 0110\r\n").await;
        read_request(&mut device).await;
        respond(&mut device, "250 Lamp manual 5 1\r\n").await;
        read_request(&mut device).await;
        // Three fields instead of four.
        respond(&mut device, "250 Heater timer 2\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    let err = session.refresh_outlets().await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));

    // Outlet 0 was updated before the failure and keeps its new values.
    let outlet = session.outlet(0).unwrap();
    assert_eq!(outlet.name, "Lamp");
    assert_eq!(outlet.interrupt_delay, 5);
    server.await.unwrap();
}

// ============================================================================
// Reconnect policy
// ============================================================================

#[tokio::test]
async fn transport_fault_reconnects_and_replays_once() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        // First connection: authenticate, read the command, drop without
        // answering.
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port 2 1");
        drop(device);

        // Second connection: the command is replayed exactly once.
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port 2 1");
        respond(&mut device, "250 OK\r\n").await;
        assert_eq!(read_request(&mut device).await, "port list");
        respond(&mut device, "250 0010\r\n").await;
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.set_outlet_power(2, true).await.unwrap();
    // The session stays usable after the reconnect.
    assert_eq!(session.get_outlet_list().await.unwrap(), "0010");
    server.await.unwrap();
}

#[tokio::test]
async fn second_transport_fault_is_fatal() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port 0 1");
        drop(device);

        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "port 0 1");
        drop(device);
    });

    let mut session = builder(addr).connect().await.unwrap();
    let err = session.set_outlet_power(0, true).await.unwrap_err();
    assert!(err.is_transport());
    server.await.unwrap();
}

#[tokio::test]
async fn command_failed_is_not_retried() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "version");
        respond(&mut device, "502 UNKNOWN COMMAND\r\n").await;
        // The session must not reconnect; the next read on this connection
        // is the quit from disconnect.
        assert_eq!(read_request(&mut device).await, "quit");
    });

    let mut session = builder(addr).connect().await.unwrap();
    assert!(matches!(
        session.get_firmware_version().await,
        Err(Error::CommandFailed { .. })
    ));
    session.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let mut device = accept_and_login(&listener, PLAIN_LOGIN).await;
        assert_eq!(read_request(&mut device).await, "quit");
    });

    let mut session = builder(addr).connect().await.unwrap();
    session.disconnect().await;
    session.disconnect().await;
    server.await.unwrap();
}
