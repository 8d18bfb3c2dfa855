//! Forwards an operation to the peer bank that actually owns the
//! target account, and relays its response back verbatim.

use super::common::DEFAULT_PORT;
use super::events::{EventKind, EventPublisher};
use super::store::{KnownBank, Store};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Cannot connect to bank {target}")]
pub struct Error {
    pub target: String,
}

/// Splits a target bank code into `(host, port)`, defaulting to
/// `DEFAULT_PORT` when no `:port` suffix is present.
fn split_target(target: &str) -> (&str, u16) {
    match target.rsplit_once(':') {
        Some((host, port)) => port.parse().map(|p| (host, p)).unwrap_or((target, DEFAULT_PORT)),
        None => (target, DEFAULT_PORT),
    }
}

/// Opens a fresh TCP session to `target`, sends one line built from
/// `opcode`/`account_info`/`amount`, and returns the peer's response
/// with the trailing newline stripped. On success, records the peer in
/// `store`'s known-banks directory.
pub fn forward(
    store: &Store,
    events: &EventPublisher,
    opcode: &str,
    account_info: &str,
    amount: Option<&str>,
    target: &str,
    timeout: Duration,
    now: i64,
) -> Result<String, Error> {
    let (host, port) = split_target(target);
    let addr = format!("{host}:{port}");

    let request = match amount {
        Some(amount) => format!("{opcode} {account_info} {amount}\n"),
        None => format!("{opcode} {account_info}\n"),
    };

    let response = (|| -> std::io::Result<String> {
        use std::net::ToSocketAddrs;
        let socket_addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved")
        })?;
        let mut stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.write_all(request.as_bytes())?;

        let mut buf = [0u8; super::common::MAX_LINE_BYTES];
        let mut total = 0usize;
        loop {
            let n = stream.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
            if buf[..total].contains(&b'\n') || total >= buf.len() {
                break;
            }
        }
        let text = String::from_utf8_lossy(&buf[..total]);
        Ok(text.trim_end_matches('\n').trim_end_matches('\r').to_string())
    })()
    .map_err(|_| Error {
        target: target.to_string(),
    })?;

    events.emit(
        EventKind::Proxy,
        format!("{opcode} {account_info} -> {target}"),
        now,
    );

    if let Ok(txn) = store.write() {
        let bank = KnownBank {
            bank_code: target.to_string(),
            ip_address: host.to_string(),
            port,
            last_seen: now,
            is_active: true,
        };
        if txn.upsert_known_bank(&bank).is_ok() {
            let _ = txn.commit();
        }
    }

    Ok(response)
}
