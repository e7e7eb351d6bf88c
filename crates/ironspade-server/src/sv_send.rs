// sv_send.rs — packet marshalling and fan-out
//
// Reliable sends carry semantic events; the unreliable channel carries
// dense telemetry (world updates, input echo). Per peer, reliable order
// is FIFO on channel 0.

use crate::server::Server;
use ironspade_common::compression;
use ironspade_common::protocol::{
    self, ChatMessage, ChatType, CreatePlayer, ExistingPlayer, ExtensionEntry,
    ExtensionInfo, HandshakeInit, IntelDrop, KillAction, KillType, MapChunk, MapStart, MoveObject,
    PlayerLeft, PlayerPositionData, PlayerProperties, Restock, ShortPlayerData, Vec3,
    VersionRequest, WeaponReload, WorldUpdate,
};
use ironspade_common::strings;
use ironspade_game::player::{PeerHandle, PlayerRef, PlayerState};
use rand::Rng;
use std::time::{Duration, Instant};

/// Map transfer chunk payload size.
const MAP_CHUNK_SIZE: usize = 8192;
/// Yield briefly after this many chunks so the loop is not starved.
const MAP_CHUNKS_PER_YIELD: usize = 10;
/// Abandon a transfer that cannot complete in this window.
const MAP_SEND_TIMEOUT: Duration = Duration::from_secs(60);

impl Server {
    // ============================================================
    // Low-level sends
    // ============================================================

    pub fn send_to_peer(&mut self, peer: PeerHandle, data: &[u8], reliable: bool) {
        if let Err(e) = self.net.send(peer, data, reliable) {
            log::error!("failed to send packet type {}: {}", data.first().unwrap_or(&0), e);
        }
    }

    pub fn send_to_player(&mut self, player: &PlayerRef, data: &[u8], reliable: bool) {
        let peer = player.read().peer;
        self.send_to_peer(peer, data, reliable);
    }

    /// Send to every connected peer, including ones still loading.
    pub fn broadcast(&mut self, data: &[u8], reliable: bool) {
        self.net.broadcast(data, reliable);
    }

    /// Send to every Ready player except one id.
    pub fn broadcast_except(&mut self, except: u8, data: &[u8], reliable: bool) {
        for player in self.game.players.snapshot() {
            let (id, state, peer) = {
                let p = player.read();
                (p.id, p.state, p.peer)
            };
            if id != except && state == PlayerState::Ready {
                self.send_to_peer(peer, data, reliable);
            }
        }
    }

    // ============================================================
    // Chat
    // ============================================================

    pub fn send_chat_to_player(&mut self, player: &PlayerRef, message: &str) {
        let Some(encoded) = strings::to_cp437_bytes(message) else {
            log::error!("failed to encode chat message");
            return;
        };
        let player_id = player.read().id;
        let packet = ChatMessage {
            player_id,
            chat_type: ChatType::System,
            message: encoded,
        };
        let data = packet.encode();
        self.send_to_player(player, &data, true);
    }

    pub fn broadcast_chat(&mut self, message: &str, chat_type: ChatType) {
        let Some(encoded) = strings::to_cp437_bytes(message) else {
            log::error!("failed to encode chat message");
            return;
        };
        let packet = ChatMessage {
            player_id: 0,
            chat_type,
            message: encoded,
        };
        let data = packet.encode();
        self.broadcast(&data, true);
    }

    // ============================================================
    // Map transfer and the initial sequence
    // ============================================================

    fn send_map_data(&mut self, player: &PlayerRef) -> Result<(), String> {
        let map_data = self.game.map.write();
        let compressed = compression::compress_map(&map_data)?;
        let (player_id, peer) = {
            let p = player.read();
            (p.id, p.peer)
        };
        log::info!(
            "sending map to player {}: {} bytes compressed from {}",
            player_id,
            compressed.len(),
            map_data.len()
        );

        let start = MapStart {
            map_size: compressed.len() as u32,
        };
        self.send_to_peer(peer, &start.encode(), true);

        let deadline = Instant::now() + MAP_SEND_TIMEOUT;
        for (index, chunk) in compressed.chunks(MAP_CHUNK_SIZE).enumerate() {
            if Instant::now() >= deadline {
                return Err(format!("map send timeout for player {}", player_id));
            }
            if player.read().state == PlayerState::Disconnected {
                return Err(format!("player {} disconnected during map send", player_id));
            }

            let packet = MapChunk { data: chunk };
            self.send_to_peer(peer, &packet.encode(), true);

            if index > 0 && index % MAP_CHUNKS_PER_YIELD == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        log::debug!("finished sending map chunks to player {}", player_id);
        Ok(())
    }

    pub fn send_state_data(&mut self, player: &PlayerRef) {
        let player_id = player.read().id;
        let packet = self.game.state_data(player_id, &self.mode);
        let data = packet.encode();
        self.send_to_player(player, &data, true);
    }

    pub fn send_intel_positions(&mut self, player: &PlayerRef) {
        if !self.mode.intel_enabled() {
            return;
        }
        let peer = player.read().peer;
        for team in 0u8..2 {
            let packet = MoveObject {
                object_id: team,
                team,
                position: self.game.intel[team as usize].position,
            };
            self.send_to_peer(peer, &packet.encode(), true);
        }
    }

    fn send_existing_players(&mut self, player: &PlayerRef) {
        let self_id = player.read().id;
        for other in self.game.players.snapshot() {
            let packet = {
                let o = other.read();
                if o.id == self_id || o.state != PlayerState::Ready {
                    continue;
                }
                ExistingPlayer {
                    player_id: o.id,
                    team: protocol::to_wire_team(o.team),
                    weapon: o.weapon,
                    item: o.tool,
                    kills: o.kills,
                    color: o.color,
                    name: strings::to_cp437_bytes(&o.name).unwrap_or_default(),
                }
            };
            let data = packet.encode();
            self.send_to_player(player, &data, true);
        }
    }

    /// The whole joining sequence: map, state, intel objects, roster,
    /// handshake challenge, version probe. Leaves the player waiting for
    /// its ExistingPlayer reply.
    pub fn send_initial_packets(&mut self, player: &PlayerRef) -> Result<(), String> {
        self.send_map_data(player)?;
        self.send_state_data(player);
        self.send_intel_positions(player);
        self.send_existing_players(player);
        self.send_handshake_init(player);
        self.send_version_request(player);

        player.write().state = PlayerState::WaitingForExistingPlayer;
        log::info!("player {} waiting for ExistingPlayer", player.read().id);
        Ok(())
    }

    /// Re-transfer after a map change; the player keeps its slot and
    /// identity and rejoins immediately.
    pub fn send_map_for_change(&mut self, player: &PlayerRef) {
        if let Err(e) = self.send_map_data(player) {
            log::error!("failed to resend map: {}", e);
            return;
        }
        self.send_state_data(player);
        self.send_intel_positions(player);
        player.write().state = PlayerState::Ready;
        self.finalize_player_join(player);
    }

    // ============================================================
    // Handshake, version, extensions
    // ============================================================

    pub fn send_handshake_init(&mut self, player: &PlayerRef) {
        let challenge = loop {
            let value: u32 = rand::thread_rng().gen();
            if value != 0 {
                break value;
            }
        };
        player.write().handshake_challenge = challenge;
        let data = HandshakeInit { challenge }.encode();
        self.send_to_player(player, &data, true);
    }

    pub fn send_version_request(&mut self, player: &PlayerRef) {
        let data = VersionRequest.encode();
        self.send_to_player(player, &data, true);
    }

    pub fn send_extension_info(&mut self, player: &PlayerRef) {
        let packet = ExtensionInfo {
            entries: vec![
                ExtensionEntry {
                    extension_id: protocol::extension_id::PLAYER_PROPERTIES,
                    version: 1,
                },
                ExtensionEntry {
                    extension_id: protocol::extension_id::PLAYERS_256,
                    version: 1,
                },
                ExtensionEntry {
                    extension_id: protocol::extension_id::MESSAGE_TYPES,
                    version: 1,
                },
                ExtensionEntry {
                    extension_id: protocol::extension_id::KICK_REASON,
                    version: 1,
                },
            ],
        };
        let data = packet.encode();
        self.send_to_player(player, &data, true);
        log::debug!("sent extension info to player {}", player.read().id);
    }

    // ============================================================
    // Roster packets
    // ============================================================

    pub fn broadcast_new_player(&mut self, player: &PlayerRef) {
        let (packet, id) = {
            let p = player.read();
            (
                CreatePlayer {
                    player_id: p.id,
                    weapon: p.weapon,
                    team: protocol::to_wire_team(p.team),
                    position: p.position,
                    name: strings::to_cp437_bytes(&p.name).unwrap_or_default(),
                },
                p.id,
            )
        };
        let data = packet.encode();
        self.broadcast_except(id, &data, true);
        self.broadcast_short_player_data(player);
    }

    pub fn send_spectator_confirmation(&mut self, player: &PlayerRef) {
        let packet = {
            let p = player.read();
            CreatePlayer {
                player_id: p.id,
                weapon: p.weapon,
                team: protocol::SPECTATOR_WIRE_TEAM,
                position: p.position,
                name: strings::to_cp437_bytes(&p.name).unwrap_or_default(),
            }
        };
        let data = packet.encode();
        self.send_to_player(player, &data, true);
        self.send_player_properties(player);
    }

    pub fn broadcast_short_player_data(&mut self, player: &PlayerRef) {
        let packet = {
            let p = player.read();
            ShortPlayerData {
                player_id: p.id,
                team: p.team,
                weapon: p.weapon,
            }
        };
        self.broadcast(&packet.encode(), true);
    }

    pub fn broadcast_player_left(&mut self, player_id: u8) {
        let data = PlayerLeft { player_id }.encode();
        self.broadcast(&data, true);
    }

    pub fn broadcast_player_left_except(&mut self, player_id: u8, except: u8) {
        let data = PlayerLeft { player_id }.encode();
        self.broadcast_except(except, &data, true);
    }

    // ============================================================
    // Combat and inventory packets
    // ============================================================

    pub fn broadcast_kill_action(&mut self, victim: u8, killer: u8, kill_type: KillType) {
        let packet = KillAction {
            player_id: victim,
            killer_id: killer,
            kill_type,
            respawn_time: self.config.server.respawn_time as u8,
        };
        self.broadcast(&packet.encode(), true);
    }

    pub fn send_weapon_reload(&mut self, player: &PlayerRef) {
        let packet = {
            let p = player.read();
            WeaponReload {
                player_id: p.id,
                magazine_ammo: p.magazine_ammo,
                reserve_ammo: p.reserve_ammo,
            }
        };
        let data = packet.encode();
        self.send_to_player(player, &data, true);
    }

    /// Extension 0 inventory snapshot for clients that negotiated it.
    pub fn send_player_properties(&mut self, player: &PlayerRef) {
        let packet = {
            let p = player.read();
            if !p.supports_extension(protocol::extension_id::PLAYER_PROPERTIES) {
                return;
            }
            PlayerProperties {
                player_id: p.id,
                hp: p.hp,
                blocks: p.blocks,
                grenades: p.grenades,
                magazine_ammo: p.magazine_ammo,
                reserve_ammo: p.reserve_ammo,
                score: p.kills,
            }
        };
        let data = packet.encode();
        self.send_to_player(player, &data, true);
    }

    pub fn broadcast_restock(&mut self, player_id: u8) {
        let data = Restock { player_id }.encode();
        self.broadcast(&data, true);
    }

    // ============================================================
    // Intel object packets
    // ============================================================

    pub fn broadcast_move_object(&mut self, team: u8, position: Vec3) {
        if !self.running || !self.mode.intel_enabled() {
            return;
        }
        let packet = MoveObject {
            object_id: team,
            team,
            position,
        };
        self.broadcast(&packet.encode(), true);
    }

    pub fn broadcast_intel_drop(&mut self, intel_idx: usize, position: Vec3) {
        if !self.mode.intel_enabled() {
            return;
        }
        let packet = IntelDrop {
            player_id: intel_idx as u8,
            position,
        };
        self.broadcast(&packet.encode(), true);
        self.broadcast_move_object(intel_idx as u8, position);
    }

    /// Re-broadcast both intel positions.
    pub fn sync_intel_positions(&mut self) {
        if !self.mode.intel_enabled() {
            return;
        }
        for team in 0u8..2 {
            let position = self.game.intel[team as usize].position;
            self.broadcast_move_object(team, position);
        }
    }

    // ============================================================
    // World update (10 Hz, unreliable)
    // ============================================================

    pub fn send_world_update(&mut self) {
        let mut update = WorldUpdate::default();
        for player in self.game.players.snapshot() {
            let p = player.read();
            if p.state == PlayerState::Ready && p.team <= 1 {
                update.players[p.id as usize] = PlayerPositionData {
                    position: p.position,
                    orientation: p.orientation,
                };
            }
        }
        let data = update.encode();
        for player in self.game.players.snapshot() {
            let (state, peer) = {
                let p = player.read();
                (p.state, p.peer)
            };
            if state == PlayerState::Ready {
                self.send_to_peer(peer, &data, false);
            }
        }
    }
}
