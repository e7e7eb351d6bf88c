// ping.rs — plain-UDP info responder
//
// Listens on server_port + 1 and answers two literal probes: "HELLO"
// with "HI" for liveness, "HELLOLAN" with a JSON info document for LAN
// browsers. Runs on its own thread; the socket is dropped on shutdown.

use crate::shutdown::ShutdownToken;
use parking_lot::Mutex;
use serde::Serialize;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub players_current: usize,
    pub players_max: usize,
    pub map: String,
    pub game_mode: String,
    pub game_version: String,
}

pub type SharedServerInfo = Arc<Mutex<ServerInfo>>;

pub fn spawn(
    port: u16,
    info: SharedServerInfo,
    shutdown: ShutdownToken,
) -> std::io::Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
    socket.set_read_timeout(Some(Duration::from_millis(250)))?;
    log::info!("ping responder started on port {}", port);

    std::thread::Builder::new()
        .name("ping-responder".to_string())
        .spawn(move || run(socket, info, shutdown))
}

fn run(socket: UdpSocket, info: SharedServerInfo, shutdown: ShutdownToken) {
    let mut buffer = [0u8; 1024];
    loop {
        if shutdown.is_shutdown() {
            log::info!("ping responder stopped");
            return;
        }
        match socket.recv_from(&mut buffer) {
            Ok((n, addr)) => handle_probe(&socket, &buffer[..n], addr, &info),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                if !shutdown.is_shutdown() {
                    log::error!("ping responder read error: {}", e);
                }
            }
        }
    }
}

fn handle_probe(socket: &UdpSocket, data: &[u8], addr: SocketAddr, info: &SharedServerInfo) {
    match data {
        b"HELLO" => {
            if let Err(e) = socket.send_to(b"HI", addr) {
                log::error!("failed to send ping reply to {}: {}", addr, e);
            }
        }
        b"HELLOLAN" => {
            let reply = {
                let info = info.lock();
                serde_json::to_vec(&*info)
            };
            match reply {
                Ok(json) => {
                    if let Err(e) = socket.send_to(&json, addr) {
                        log::error!("failed to send LAN info to {}: {}", addr, e);
                    }
                }
                Err(e) => log::error!("failed to serialise server info: {}", e),
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_pair;

    fn test_info() -> SharedServerInfo {
        Arc::new(Mutex::new(ServerInfo {
            name: "test server".to_string(),
            players_current: 3,
            players_max: 32,
            map: "classic".to_string(),
            game_mode: "ctf".to_string(),
            game_version: "0.75".to_string(),
        }))
    }

    /// Bind the responder on an OS-assigned port and probe it.
    fn probe(payload: &[u8]) -> Vec<u8> {
        let (trigger, token) = shutdown_pair();
        // Find a free port by binding ephemeral first.
        let probe_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = {
            let temp = UdpSocket::bind("127.0.0.1:0").unwrap();
            temp.local_addr().unwrap().port()
        };
        let handle = spawn(port, test_info(), token).unwrap();

        probe_socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        probe_socket
            .send_to(payload, ("127.0.0.1", port))
            .unwrap();
        let mut buf = [0u8; 2048];
        let (n, _) = probe_socket.recv_from(&mut buf).unwrap();

        trigger.trigger();
        handle.join().unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn hello_replies_hi() {
        assert_eq!(probe(b"HELLO"), b"HI");
    }

    #[test]
    fn hellolan_replies_json_document() {
        let reply = probe(b"HELLOLAN");
        let value: serde_json::Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(value["name"], "test server");
        assert_eq!(value["players_current"], 3);
        assert_eq!(value["players_max"], 32);
        assert_eq!(value["game_mode"], "ctf");
        assert_eq!(value["game_version"], "0.75");
    }
}
