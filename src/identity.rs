//! Determines this node's own bank code: the outward-facing IPv4
//! address it advertises to clients and peers.

use std::net::UdpSocket;
use tracing::{info, warn};

const FALLBACK_BANK_CODE: &str = "127.0.0.1";

/// Opens a UDP socket toward a public address and reads back the local
/// endpoint the OS picked for it. No packet is actually delivered —
/// UDP `connect` only binds the route, it never sends anything.
pub fn resolve_outward_ipv4() -> String {
    match try_resolve() {
        Ok(ip) => {
            info!(bank_code = %ip, "resolved outward IPv4");
            ip
        }
        Err(err) => {
            warn!(%err, fallback = FALLBACK_BANK_CODE, "could not resolve outward IPv4, falling back");
            FALLBACK_BANK_CODE.to_string()
        }
    }
}

fn try_resolve() -> std::io::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}
