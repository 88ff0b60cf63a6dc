// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::discovery::net::InterfaceInfo;

/// Discovery multicast group.
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// Gateways listen for discovery datagrams on this port.
pub const SEND_PORT: u16 = 1900;
/// Preferred local port for replies.
pub const LISTEN_PORT: u16 = 50569;
/// Ports tried after [`LISTEN_PORT`] before falling back to ephemeral.
const LISTEN_PORT_FALLBACKS: u16 = 9;

/// UDP listener joined to the discovery group on every interface.
///
/// Dropping the listener leaves the groups; [`MulticastListener::close`]
/// does it eagerly and logs per-interface failures.
pub struct MulticastListener {
    socket: UdpSocket,
    joined: Vec<Ipv4Addr>,
}

impl MulticastListener {
    /// Binds the reply socket and joins the group per interface.
    pub fn open(interfaces: &[InterfaceInfo]) -> std::io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        if let Err(e) = socket.set_reuse_port(true) {
            warn!("failed to set SO_REUSEPORT: {e}");
        }

        bind_with_fallback(&socket)?;
        socket.set_nonblocking(true)?;

        let socket = UdpSocket::from_std(socket.into())?;

        let mut joined = Vec::with_capacity(interfaces.len());
        for iface in interfaces {
            // A stale membership from an earlier run blocks the join on
            // some stacks; drop it first and ignore the error.
            let _ = socket.leave_multicast_v4(MULTICAST_ADDR, iface.address);
            match socket.join_multicast_v4(MULTICAST_ADDR, iface.address) {
                Ok(()) => joined.push(iface.address),
                Err(e) => {
                    warn!(
                        "failed to join multicast group on {} ({}): {e}",
                        iface.name, iface.address
                    );
                },
            }
        }

        Ok(Self { socket, joined })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Receives one datagram.
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Drops group memberships and closes the socket.
    pub fn close(self) {
        for address in &self.joined {
            if let Err(e) = self.socket.leave_multicast_v4(MULTICAST_ADDR, *address) {
                debug!("failed to leave multicast group on {address}: {e}");
            }
        }
    }
}

fn bind_with_fallback(socket: &Socket) -> std::io::Result<()> {
    let mut last_err = None;
    for port in (LISTEN_PORT..=LISTEN_PORT + LISTEN_PORT_FALLBACKS).chain([0]) {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        match socket.bind(&SocketAddr::from(addr).into()) {
            Ok(()) => {
                debug!("discovery listener bound to port {port}");
                return Ok(());
            },
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::other("unable to bind discovery listener")
    }))
}

/// Sends one datagram to the discovery group from each interface.
///
/// Per-interface failures are logged and skipped so one broken
/// interface cannot hide gateways reachable through the others.
pub fn send_to_all(interfaces: &[InterfaceInfo], message: &[u8]) {
    for iface in interfaces {
        if let Err(e) = send_on_interface(iface, message) {
            warn!(
                "discovery send failed on {} ({}): {e}",
                iface.name, iface.address
            );
        }
    }
}

fn send_on_interface(iface: &InterfaceInfo, message: &[u8]) -> std::io::Result<()> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    let bind = SocketAddrV4::new(iface.address, 0);
    socket.bind(&SocketAddr::from(bind).into())?;
    socket.set_multicast_if_v4(&iface.address)?;

    let target = SocketAddrV4::new(MULTICAST_ADDR, SEND_PORT);
    socket.send_to(message, &SocketAddr::from(target).into())?;
    Ok(())
}
