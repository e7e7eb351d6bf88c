// net.rs — ENet transport wrapper
//
// The only module that talks to the transport crate. The host runs one
// channel with range-coder compression, matching what 0.75 clients
// expect; everything above works with PeerHandle and byte frames.

use ironspade_game::player::PeerHandle;
use rusty_enet as enet;
use std::fmt;
use std::net::{IpAddr, SocketAddr, UdpSocket};

#[derive(Debug)]
pub enum NetError {
    Bind(std::io::Error),
    Host(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Bind(e) => write!(f, "failed to bind server socket: {}", e),
            NetError::Host(e) => write!(f, "failed to create transport host: {}", e),
        }
    }
}

impl std::error::Error for NetError {}

#[derive(Debug)]
pub enum NetEvent {
    Connect { peer: PeerHandle },
    Disconnect { peer: PeerHandle },
    Receive { peer: PeerHandle, data: Vec<u8> },
}

pub struct NetServer {
    host: enet::Host<UdpSocket>,
}

impl NetServer {
    pub fn bind(port: u16, max_peers: usize) -> Result<Self, NetError> {
        let socket =
            UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port))).map_err(NetError::Bind)?;
        let host = enet::Host::new(
            socket,
            enet::HostSettings {
                peer_limit: max_peers,
                channel_limit: 1,
                compressor: Some(Box::new(enet::RangeCoder::new())),
                ..Default::default()
            },
        )
        .map_err(|e| NetError::Host(e.to_string()))?;
        Ok(Self { host })
    }

    /// Poll the host once without blocking. Returns the next pending
    /// event, if any.
    pub fn service(&mut self) -> Option<NetEvent> {
        match self.host.service() {
            Ok(Some(event)) => Some(match event.no_ref() {
                enet::EventNoRef::Connect { peer, .. } => NetEvent::Connect {
                    peer: PeerHandle(peer.0),
                },
                enet::EventNoRef::Disconnect { peer, .. } => NetEvent::Disconnect {
                    peer: PeerHandle(peer.0),
                },
                enet::EventNoRef::Receive {
                    peer,
                    packet,
                    ..
                } => NetEvent::Receive {
                    peer: PeerHandle(peer.0),
                    data: packet.data().to_vec(),
                },
            }),
            Ok(None) => None,
            Err(err) => {
                log::error!("transport service error: {}", err);
                None
            }
        }
    }

    fn packet_for(data: &[u8], reliable: bool) -> enet::Packet {
        if reliable {
            enet::Packet::reliable(data)
        } else {
            enet::Packet::unreliable_unsequenced(data)
        }
    }

    pub fn send(&mut self, peer: PeerHandle, data: &[u8], reliable: bool) -> Result<(), String> {
        let peer = self.host.peer_mut(enet::PeerID(peer.0));
        peer.send(0, &Self::packet_for(data, reliable))
            .map_err(|e| format!("failed to send packet: {}", e))
    }

    /// Send to every connected peer on channel 0.
    pub fn broadcast(&mut self, data: &[u8], reliable: bool) {
        self.host.broadcast(0, &Self::packet_for(data, reliable));
    }

    /// Queue a graceful disconnect; queued reliable traffic flushes
    /// first.
    pub fn disconnect_later(&mut self, peer: PeerHandle, reason: u32) {
        self.host.peer_mut(enet::PeerID(peer.0)).disconnect_later(reason);
    }

    pub fn disconnect(&mut self, peer: PeerHandle, reason: u32) {
        self.host.peer_mut(enet::PeerID(peer.0)).disconnect(reason);
    }

    /// Drop the peer without a farewell.
    pub fn disconnect_now(&mut self, peer: PeerHandle, reason: u32) {
        self.host.peer_mut(enet::PeerID(peer.0)).disconnect_now(reason);
    }

    pub fn peer_ip(&mut self, peer: PeerHandle) -> Option<IpAddr> {
        self.host
            .peer_mut(enet::PeerID(peer.0))
            .address()
            .map(|addr| addr.ip())
    }
}
