// sv_init.rs — map loading, map change and rotation

use crate::server::Server;
use ironspade_common::config::MapConfig;
use ironspade_common::protocol::ChatType;
use ironspade_common::vxl::VxlMap;
use ironspade_game::gamestate::GameState;
use ironspade_game::player::PlayerState;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MAP_WIDTH: usize = 512;
pub const MAP_HEIGHT: usize = 512;
pub const MAP_DEPTH: usize = 64;

/// Read `maps/<name>.vxl` and its metadata sidecar.
pub fn load_map_resources(map_name: &str) -> Result<(VxlMap, MapConfig), Box<dyn Error>> {
    let path = PathBuf::from("maps").join(format!("{}.vxl", map_name));
    let data = std::fs::read(&path)
        .map_err(|e| format!("failed to read map file {}: {}", path.display(), e))?;
    let map = VxlMap::from_bytes(MAP_WIDTH, MAP_HEIGHT, MAP_DEPTH, &data)
        .map_err(|e| format!("failed to parse map {}: {}", map_name, e))?;
    let map_config = MapConfig::load_for_map(&path)
        .map_err(|e| format!("failed to load map metadata for {}: {}", map_name, e))?;
    Ok((map, map_config))
}

impl Server {
    pub fn current_map_name(&self) -> &str {
        &self.active_map_name
    }

    /// Load a new map and walk every connected player through a fresh
    /// transfer.
    pub fn change_map(&mut self, map_name: &str) -> Result<(), Box<dyn Error>> {
        log::info!("changing map to {}", map_name);

        let (map, map_config) = load_map_resources(map_name)?;
        let registry = Arc::clone(&self.game.players);
        self.game = GameState::new(&self.config, map_config, map, registry);
        self.active_map_name = map_name.to_string();

        for player in self.game.players.snapshot() {
            let was_ready = {
                let mut p = player.write();
                let ready = p.state == PlayerState::Ready || p.state == PlayerState::Dead;
                if ready {
                    p.state = PlayerState::Loading;
                    p.has_intel = false;
                    p.alive = false;
                }
                ready
            };
            if was_ready {
                self.send_map_for_change(&player);
            }
        }

        self.notify_masters_map(map_name);
        self.update_ping_info();
        if self.running {
            self.sync_intel_positions();
        }
        log::info!("map changed to {}", map_name);
        Ok(())
    }

    /// Advance the rotation by one and load that map.
    pub fn rotate_map(&mut self) {
        self.current_map = (self.current_map + 1) % self.config.server.maps.len();
        let map_name = self.config.server.maps[self.current_map].clone();
        match self.change_map(&map_name) {
            Ok(()) => {
                let message = format!("Map changed to {}", map_name);
                self.broadcast_chat(&message, ChatType::System);
            }
            Err(e) => log::error!("failed to rotate map: {}", e),
        }
    }

    /// Refresh the document served by the LAN info responder.
    pub fn update_ping_info(&mut self) {
        let mut info = self.ping_info.lock();
        info.players_current = self.game.players.combatant_count();
        info.map = self.active_map_name.clone();
        info.game_mode = self.mode.name().to_string();
    }

    /// Serialise the live map to `maps/<name>.vxl`.
    pub fn save_map(&mut self, filename: &str) -> Result<String, String> {
        let mut filename = if filename.is_empty() {
            format!("{}.saved", self.active_map_name)
        } else {
            filename.to_string()
        };
        if !filename.ends_with(".vxl") {
            filename.push_str(".vxl");
        }
        let path = Path::new("maps").join(&filename);

        let data = self.game.map.write();
        std::fs::write(&path, &data).map_err(|e| format!("failed to write map file: {}", e))?;
        log::info!("map saved to {} ({} bytes)", path.display(), data.len());
        Ok(path.display().to_string())
    }
}
