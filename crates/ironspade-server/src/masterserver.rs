// masterserver.rs — master-server announce client
//
// Each configured master host gets its own thread owning a small ENet
// client. On connect it sends a major update (capacity, port, name,
// mode, map); afterwards it pushes one-byte player-count updates and
// re-sends the major update when the map changes.

use crate::shutdown::ShutdownToken;
use crossbeam::channel::{unbounded, Receiver, Sender};
use ironspade_common::stream::PacketWriter;
use rusty_enet as enet;
use std::net::{ToSocketAddrs, UdpSocket};
use std::thread::JoinHandle;
use std::time::Duration;

const SERVICE_INTERVAL: Duration = Duration::from_millis(100);
/// Connect data the master protocol expects (protocol revision 31).
const CONNECT_DATA: u32 = 31;

#[derive(Debug, Clone)]
pub enum MasterUpdate {
    PlayerCount(u8),
    MapName(String),
}

#[derive(Debug, Clone)]
pub struct Announce {
    pub server_name: String,
    pub game_mode: String,
    pub map_name: String,
    pub server_port: u16,
    pub max_players: u8,
}

pub struct MasterClient {
    tx: Sender<MasterUpdate>,
    handle: Option<JoinHandle<()>>,
}

impl MasterClient {
    pub fn update(&self, update: MasterUpdate) {
        let _ = self.tx.send(update);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn spawn(
    host: String,
    port: u16,
    announce: Announce,
    shutdown: ShutdownToken,
) -> MasterClient {
    let (tx, rx) = unbounded();
    let handle = std::thread::Builder::new()
        .name(format!("master-{}", host))
        .spawn(move || run(host, port, announce, rx, shutdown))
        .ok();
    MasterClient { tx, handle }
}

fn major_update_packet(announce: &Announce) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.write_u8(announce.max_players);
    w.write_u16(announce.server_port);
    w.write_bytes(announce.server_name.as_bytes());
    w.write_u8(0);
    w.write_bytes(announce.game_mode.as_bytes());
    w.write_u8(0);
    w.write_bytes(announce.map_name.as_bytes());
    w.write_u8(0);
    w.into_bytes()
}

fn run(
    host_name: String,
    port: u16,
    mut announce: Announce,
    rx: Receiver<MasterUpdate>,
    shutdown: ShutdownToken,
) {
    let addr = match (host_name.as_str(), port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                log::error!("master server {} resolved to no addresses", host_name);
                return;
            }
        },
        Err(e) => {
            log::error!("failed to resolve master server {}: {}", host_name, e);
            return;
        }
    };

    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("failed to bind master client socket: {}", e);
            return;
        }
    };
    let mut host = match enet::Host::new(
        socket,
        enet::HostSettings {
            peer_limit: 1,
            channel_limit: 1,
            compressor: Some(Box::new(enet::RangeCoder::new())),
            ..Default::default()
        },
    ) {
        Ok(host) => host,
        Err(e) => {
            log::error!("failed to create master client host: {}", e);
            return;
        }
    };

    let mut peer: Option<enet::PeerID> = None;
    let mut connected = false;

    loop {
        if shutdown.is_shutdown() {
            if let Some(id) = peer {
                if connected {
                    host.peer_mut(id).disconnect(0);
                    let _ = host.service();
                }
            }
            log::info!("master server client for {} stopped", host_name);
            return;
        }

        if peer.is_none() {
            match host.connect(addr, 1, CONNECT_DATA) {
                Ok(p) => peer = Some(p.id()),
                Err(e) => {
                    log::error!("failed to connect to master server {}: {}", host_name, e);
                    std::thread::sleep(Duration::from_secs(30));
                    continue;
                }
            }
        }

        match host.service() {
            Ok(Some(event)) => match event.no_ref() {
                enet::EventNoRef::Connect { .. } => {
                    log::info!("connected to master server {}", host_name);
                    connected = true;
                    let packet = major_update_packet(&announce);
                    if let Some(id) = peer {
                        let _ = host.peer_mut(id).send(0, &enet::Packet::reliable(packet));
                    }
                }
                enet::EventNoRef::Disconnect { .. } => {
                    log::warn!("disconnected from master server {}", host_name);
                    connected = false;
                    peer = None;
                }
                enet::EventNoRef::Receive { .. } => {}
            },
            Ok(None) => {}
            Err(e) => log::debug!("master server {} service error: {}", host_name, e),
        }

        let mut resend_major = false;
        while let Ok(update) = rx.try_recv() {
            match update {
                MasterUpdate::PlayerCount(count) => {
                    if connected {
                        if let Some(id) = peer {
                            let _ = host.peer_mut(id).send(0, &enet::Packet::reliable(&[count][..]));
                        }
                    }
                }
                MasterUpdate::MapName(name) => {
                    announce.map_name = name;
                    resend_major = true;
                }
            }
        }
        if resend_major && connected {
            let packet = major_update_packet(&announce);
            if let Some(id) = peer {
                let _ = host.peer_mut(id).send(0, &enet::Packet::reliable(packet));
            }
        }

        std::thread::sleep(SERVICE_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_update_layout() {
        let packet = major_update_packet(&Announce {
            server_name: "srv".to_string(),
            game_mode: "ctf".to_string(),
            map_name: "classic".to_string(),
            server_port: 32887,
            max_players: 32,
        });
        // capacity byte, little-endian port, then three NUL-terminated
        // strings.
        assert_eq!(packet[0], 32);
        assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 32887);
        let tail = &packet[3..];
        let parts: Vec<&[u8]> = tail.split(|&b| b == 0).collect();
        assert_eq!(parts[0], b"srv");
        assert_eq!(parts[1], b"ctf");
        assert_eq!(parts[2], b"classic");
    }
}
