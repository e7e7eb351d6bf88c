// gamestate.rs — authoritative match state
//
// Owns the map, the intel/base objects, team scores, the live grenade
// list and spawn selection. All mutation happens on the tick thread; the
// player registry inside is shared and individually locked.

use crate::gamemode::GameMode;
use crate::grenade::Grenade;
use crate::player::PlayerRegistry;
use ironspade_common::config::{Config, GamemodeId, MapConfig};
use ironspade_common::protocol::{
    Color3b, CtfState, ModeState, StateData, TcState, Vec3, SPECTATOR_TEAM,
};
use ironspade_common::vxl::VxlMap;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Intel idle far outside the map when a mode runs without one.
const HIDDEN_INTEL: Vec3 = Vec3::new(1e9, 1e9, 128.0);

/// An intel is home when it rests this close (squared) to its base.
const INTEL_AT_BASE_DIST_SQ: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Intel {
    pub position: Vec3,
    pub held: bool,
    pub carrier: u8,
}

pub struct GameState {
    pub map: VxlMap,
    pub map_config: MapConfig,
    pub players: Arc<PlayerRegistry>,
    pub mode: GamemodeId,
    pub team1_score: u8,
    pub team2_score: u8,
    pub capture_limit: u8,
    pub intel: [Intel; 2],
    pub intel_spawn: [Vec3; 2],
    pub base: [Vec3; 2],
    pub grenades: Vec<Grenade>,
    pub round_start: Instant,
    time_limit_announced: bool,
    remove_intel: bool,

    team1_name: String,
    team2_name: String,
    team1_color: Color3b,
    team2_color: Color3b,
    fog_color: Color3b,
}

impl GameState {
    pub fn new(
        config: &Config,
        map_config: MapConfig,
        map: VxlMap,
        players: Arc<PlayerRegistry>,
    ) -> Self {
        let mode = config.gamemode_id();
        let capture_limit = map_config
            .extensions
            .cap_limit
            .unwrap_or(config.server.capture_limit);
        let fog = map_config.map.fog_color;

        let mut state = Self {
            map,
            map_config,
            players,
            mode,
            team1_score: 0,
            team2_score: 0,
            capture_limit,
            intel: [Intel::default(), Intel::default()],
            intel_spawn: [Vec3::default(); 2],
            base: [Vec3::default(); 2],
            grenades: Vec::new(),
            round_start: Instant::now(),
            time_limit_announced: false,
            remove_intel: config.server.remove_intel,
            team1_name: config.teams.team1.name.clone(),
            team2_name: config.teams.team2.name.clone(),
            team1_color: Color3b::rgb(
                config.teams.team1.color[0],
                config.teams.team1.color[1],
                config.teams.team1.color[2],
            ),
            team2_color: Color3b::rgb(
                config.teams.team2.color[0],
                config.teams.team2.color[1],
                config.teams.team2.color[2],
            ),
            fog_color: Color3b::rgb(fog[0], fog[1], fog[2]),
        };
        state.init_gamemode();
        state
    }

    fn init_gamemode(&mut self) {
        self.team1_score = 0;
        self.team2_score = 0;

        let cfg = &self.map_config.intel;
        let team1_intel = vec3_from(cfg.team1_position);
        let team2_intel = vec3_from(cfg.team2_position);
        self.base[0] = vec3_from(cfg.team1_base);
        self.base[1] = vec3_from(cfg.team2_base);

        match self.mode {
            GamemodeId::Babel => {
                // A single centre flag; the second intel is parked held
                // outside the map so nobody can touch it.
                self.intel[0] = Intel {
                    position: team1_intel,
                    held: false,
                    carrier: 0,
                };
                self.intel[1] = Intel {
                    position: HIDDEN_INTEL,
                    held: true,
                    carrier: 0,
                };
                self.intel_spawn = [team1_intel, HIDDEN_INTEL];
            }
            GamemodeId::Tdm if self.remove_intel => {
                self.intel[0] = Intel {
                    position: HIDDEN_INTEL,
                    ..Intel::default()
                };
                self.intel[1] = Intel {
                    position: HIDDEN_INTEL,
                    ..Intel::default()
                };
                self.intel_spawn = [HIDDEN_INTEL, HIDDEN_INTEL];
            }
            _ => {
                self.intel[0] = Intel {
                    position: team1_intel,
                    held: false,
                    carrier: 0,
                };
                self.intel[1] = Intel {
                    position: team2_intel,
                    held: false,
                    carrier: 0,
                };
                self.intel_spawn = [team1_intel, team2_intel];
            }
        }
    }

    // ============================================================
    // Spawn selection
    // ============================================================

    fn is_valid_spawn_point(&self, x: i32, y: i32, z: i32) -> bool {
        if x < 0 || x >= self.map.width() as i32 || y < 0 || y >= self.map.height() as i32 {
            return false;
        }
        if z < 0 || z >= self.map.depth() as i32 - 1 {
            return false;
        }
        // Solid footing below, two cells of clearance at and above.
        if !self.map.is_solid(x, y, z + 1) {
            return false;
        }
        if self.map.is_solid(x, y, z) {
            return false;
        }
        if z >= 1 && self.map.is_solid(x, y, z - 1) {
            return false;
        }
        if z >= 2 && self.map.is_solid(x, y, z - 2) {
            return false;
        }
        true
    }

    fn find_valid_spawn_z(&self, x: i32, y: i32, ground_z: i32) -> i32 {
        let spawn_z = ground_z - 2;
        if self.is_valid_spawn_point(x, y, spawn_z) {
            return spawn_z;
        }
        for offset in 1..=10 {
            if spawn_z - offset >= 0 && self.is_valid_spawn_point(x, y, spawn_z - offset) {
                return spawn_z - offset;
            }
            if spawn_z + offset < self.map.depth() as i32 - 1
                && self.is_valid_spawn_point(x, y, spawn_z + offset)
            {
                return spawn_z + offset;
            }
        }
        spawn_z
    }

    /// Pick a spawn position for a team: explicit point lists first, then
    /// random rolls inside the team rectangle with ground probing and
    /// water avoidance.
    pub fn spawn_position(&self, team: u8) -> Vec3 {
        let mut rng = rand::thread_rng();

        let points = if team == 0 {
            &self.map_config.spawnpoints.team1_points
        } else {
            &self.map_config.spawnpoints.team2_points
        };
        if !points.is_empty() {
            let point = points[rng.gen_range(0..points.len())];
            return Vec3::new(
                point[0] as f32 + 0.5,
                point[1] as f32 + 0.5,
                point[2] as f32 - 2.4,
            );
        }

        let area = if team == 0 {
            self.map_config.spawnpoints.team1
        } else {
            self.map_config.spawnpoints.team2
        };

        let water_level = if self.map_config.water.enabled {
            self.map_config.water.level
        } else {
            63.0
        };

        let roll = |rng: &mut rand::rngs::ThreadRng| {
            let x = rng.gen_range(area.start[0]..=area.end[0].max(area.start[0]));
            let y = rng.gen_range(area.start[1]..=area.end[1].max(area.start[1]));
            let ground_z = self.map.find_ground_level(x, y);
            let spawn_z = self.find_valid_spawn_z(x, y, ground_z);
            (x, y, ground_z, spawn_z)
        };

        for _ in 0..10 {
            let (x, y, ground_z, spawn_z) = roll(&mut rng);
            if (ground_z as f32) < water_level {
                return Vec3::new(x as f32 + 0.5, y as f32 + 0.5, spawn_z as f32 - 0.4);
            }
        }

        let (x, y, _, spawn_z) = roll(&mut rng);
        Vec3::new(x as f32 + 0.5, y as f32 + 0.5, spawn_z as f32 - 0.4)
    }

    // ============================================================
    // Intel
    // ============================================================

    /// Pick up the enemy intel for `team`. The intel index is the
    /// opposing team's; Babel always contends for the centre flag.
    pub fn pickup_intel(&mut self, player_id: u8, team: u8) -> bool {
        if team >= 2 {
            return false;
        }
        let idx = self.contended_intel_index(team);

        if self.intel[idx].held {
            return false;
        }

        let Some(player) = self.players.get(player_id) else {
            return false;
        };
        {
            let p = player.read();
            if !p.alive || p.team != team {
                return false;
            }
        }

        self.intel[idx].held = true;
        self.intel[idx].carrier = player_id;
        player.write().has_intel = true;
        true
    }

    /// Index of the intel a member of `team` contends for.
    pub fn contended_intel_index(&self, team: u8) -> usize {
        if self.mode == GamemodeId::Babel {
            0
        } else {
            1 - team as usize
        }
    }

    pub fn drop_intel(&mut self, intel_idx: usize, mut position: Vec3) {
        if intel_idx >= 2 {
            return;
        }
        position.x = position.x.clamp(0.0, (self.map.width() - 1) as f32);
        position.y = position.y.clamp(0.0, (self.map.height() - 1) as f32);
        position.z = position.z.clamp(0.0, (self.map.depth() - 1) as f32);

        self.intel[intel_idx].held = false;
        self.intel[intel_idx].position = position;
        self.intel[intel_idx].carrier = 0;
    }

    /// Score a capture by `player_id` for `team`: reset the carried intel
    /// to its spawn and increment the team score.
    pub fn capture_intel(&mut self, player_id: u8, team: u8) -> bool {
        if team >= 2 {
            return false;
        }
        let idx = self.contended_intel_index(team);
        if !self.intel[idx].held || self.intel[idx].carrier != player_id {
            return false;
        }
        let Some(player) = self.players.get(player_id) else {
            return false;
        };

        self.intel[idx].held = false;
        self.intel[idx].position = self.intel_spawn[idx];
        self.intel[idx].carrier = 0;
        player.write().has_intel = false;

        if team == 0 {
            self.team1_score += 1;
        } else {
            self.team2_score += 1;
        }
        true
    }

    /// The "at base" check uses a tighter radius than capture proximity;
    /// classic clients expect both values as they are.
    pub fn is_intel_at_base(&self, team: u8) -> bool {
        if team >= 2 {
            return false;
        }
        let intel = &self.intel[team as usize];
        if intel.held {
            return false;
        }
        let d = intel.position.sub(self.base[team as usize]);
        d.length_squared() < INTEL_AT_BASE_DIST_SQ
    }

    pub fn reset_intel(&mut self) {
        for idx in 0..2 {
            self.intel[idx].held = false;
            self.intel[idx].position = self.intel_spawn[idx];
            self.intel[idx].carrier = 0;
        }
    }

    pub fn reset_scores(&mut self) {
        self.team1_score = 0;
        self.team2_score = 0;
    }

    pub fn team_score(&self, team: u8) -> u8 {
        if team == 0 {
            self.team1_score
        } else {
            self.team2_score
        }
    }

    pub fn has_won(&self, team: u8) -> bool {
        self.team_score(team) >= self.capture_limit
    }

    // ============================================================
    // Round clock
    // ============================================================

    /// One-shot: fires true exactly once when the metadata time limit is
    /// crossed.
    pub fn time_limit_reached(&mut self) -> bool {
        if self.time_limit_announced {
            return false;
        }
        let Some(limit) = self.map_config.extensions.time_limit else {
            return false;
        };
        if self.round_start.elapsed() >= Duration::from_secs(limit) {
            self.time_limit_announced = true;
            return true;
        }
        false
    }

    pub fn round_time(&self) -> Duration {
        self.round_start.elapsed()
    }

    // ============================================================
    // State data
    // ============================================================

    pub fn state_data(&self, player_id: u8, mode: &GameMode) -> StateData {
        let intel_enabled = mode.intel_enabled();
        let state = match mode.wire_mode() {
            ironspade_common::protocol::WireGamemode::Tc => ModeState::Tc(TcState::default()),
            ironspade_common::protocol::WireGamemode::Ctf => {
                let mut held_intels = 0u8;
                if intel_enabled && self.intel[0].held {
                    held_intels |= 1;
                }
                if intel_enabled && self.intel[1].held {
                    held_intels |= 2;
                }
                let carrier_ids = if intel_enabled {
                    [self.intel[0].carrier, self.intel[1].carrier]
                } else {
                    [255, 255]
                };
                ModeState::Ctf(CtfState {
                    team1_score: self.team1_score,
                    team2_score: self.team2_score,
                    capture_limit: self.capture_limit,
                    held_intels,
                    carrier_ids,
                    team1_intel: self.intel[0].position,
                    team2_intel: self.intel[1].position,
                    team1_base: self.base[0],
                    team2_base: self.base[1],
                })
            }
        };

        StateData {
            player_id,
            fog_color: self.fog_color,
            team1_color: self.team1_color,
            team2_color: self.team2_color,
            team1_name: self.team1_name.as_bytes().to_vec(),
            team2_name: self.team2_name.as_bytes().to_vec(),
            state,
        }
    }

    pub fn team_name(&self, team: u8) -> &str {
        if team == 0 {
            &self.team1_name
        } else {
            &self.team2_name
        }
    }

    /// Combatant count for vote thresholds and the info responder.
    pub fn ready_player_count(&self) -> usize {
        let mut count = 0;
        self.players.for_each(|p| {
            let p = p.read();
            if p.state == crate::player::PlayerState::Ready && p.team != SPECTATOR_TEAM {
                count += 1;
            }
        });
        count
    }
}

fn vec3_from(v: [f64; 3]) -> Vec3 {
    Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PeerHandle, Player, PlayerState};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.server.name = "test".to_string();
        config.server.capture_limit = 10;
        config.server.maps = vec!["flat".to_string()];
        config
    }

    fn test_state() -> GameState {
        let config = test_config();
        let registry = Arc::new(PlayerRegistry::new());
        let mut map_config = MapConfig::default();
        map_config.spawnpoints.team1 = ironspade_common::config::SpawnArea {
            start: [4, 4, 0],
            end: [28, 28, 63],
        };
        map_config.spawnpoints.team2 = ironspade_common::config::SpawnArea {
            start: [36, 36, 0],
            end: [60, 60, 63],
        };
        GameState::new(&config, map_config, VxlMap::flat(64, 64, 64), registry)
    }

    fn add_ready_player(gs: &GameState, id: u8, team: u8) {
        let mut p = Player::new(id, PeerHandle(id as usize), Instant::now());
        p.team = team;
        p.alive = true;
        p.state = PlayerState::Ready;
        gs.players.add(p);
    }

    #[test]
    fn pickup_and_capture_cycle() {
        let mut gs = test_state();
        add_ready_player(&gs, 1, 1);

        // Team 1 (index 1) picks up team 0's intel (index 0).
        assert!(gs.pickup_intel(1, 1));
        assert!(gs.intel[0].held);
        assert_eq!(gs.intel[0].carrier, 1);
        assert!(gs.players.get(1).unwrap().read().has_intel);

        // Second pickup of a held intel fails.
        add_ready_player(&gs, 2, 1);
        assert!(!gs.pickup_intel(2, 1));

        // Capture scores and resets the intel home.
        assert!(gs.capture_intel(1, 1));
        assert_eq!(gs.team2_score, 1);
        assert!(!gs.intel[0].held);
        assert_eq!(gs.intel[0].position, gs.intel_spawn[0]);
        assert!(!gs.players.get(1).unwrap().read().has_intel);
    }

    #[test]
    fn capture_requires_carrier() {
        let mut gs = test_state();
        add_ready_player(&gs, 1, 1);
        add_ready_player(&gs, 2, 1);
        assert!(gs.pickup_intel(1, 1));
        // Player 2 is not the carrier.
        assert!(!gs.capture_intel(2, 1));
        assert_eq!(gs.team2_score, 0);
    }

    #[test]
    fn dead_players_cannot_pick_up() {
        let mut gs = test_state();
        add_ready_player(&gs, 1, 1);
        gs.players.get(1).unwrap().write().alive = false;
        assert!(!gs.pickup_intel(1, 1));
    }

    #[test]
    fn intel_at_base_radius() {
        let mut gs = test_state();
        gs.base[0] = Vec3::new(100.0, 100.0, 40.0);
        gs.intel[0].position = Vec3::new(101.0, 100.0, 40.0);
        gs.intel[0].held = false;
        // dist^2 = 1 < 2.
        assert!(gs.is_intel_at_base(0));
        gs.intel[0].position = Vec3::new(101.5, 100.0, 40.0);
        // dist^2 = 2.25 >= 2.
        assert!(!gs.is_intel_at_base(0));
        gs.intel[0].position = gs.base[0];
        gs.intel[0].held = true;
        assert!(!gs.is_intel_at_base(0));
    }

    #[test]
    fn drop_clamps_to_map() {
        let mut gs = test_state();
        gs.intel[0].held = true;
        gs.drop_intel(0, Vec3::new(-10.0, 900.0, 70.0));
        assert!(!gs.intel[0].held);
        assert_eq!(gs.intel[0].position.x, 0.0);
        assert_eq!(gs.intel[0].position.y, 63.0);
        assert_eq!(gs.intel[0].position.z, 63.0);
    }

    #[test]
    fn spawn_positions_land_inside_team_area() {
        let gs = test_state();
        for team in [0u8, 1u8] {
            for _ in 0..20 {
                let pos = gs.spawn_position(team);
                let area = if team == 0 {
                    gs.map_config.spawnpoints.team1
                } else {
                    gs.map_config.spawnpoints.team2
                };
                assert!(pos.x >= area.start[0] as f32);
                assert!(pos.x <= area.end[0] as f32 + 1.0);
                assert!(pos.y >= area.start[1] as f32);
                assert!(pos.y <= area.end[1] as f32 + 1.0);
            }
        }
    }

    #[test]
    fn explicit_spawn_points_win() {
        let config = test_config();
        let mut map_config = MapConfig::default();
        map_config.spawnpoints.team1_points = vec![[10.0, 11.0, 40.0]];
        let gs = GameState::new(
            &config,
            map_config,
            VxlMap::flat(64, 64, 64),
            Arc::new(PlayerRegistry::new()),
        );
        let pos = gs.spawn_position(0);
        assert_eq!(pos, Vec3::new(10.5, 11.5, 37.6));
    }

    #[test]
    fn babel_mode_uses_single_centre_flag() {
        let mut config = test_config();
        config.server.gamemode = 2;
        let gs = GameState::new(
            &config,
            MapConfig::default(),
            VxlMap::flat(64, 64, 64),
            Arc::new(PlayerRegistry::new()),
        );
        assert!(gs.intel[1].held);
        assert_eq!(gs.contended_intel_index(0), 0);
        assert_eq!(gs.contended_intel_index(1), 0);
    }

    #[test]
    fn score_reset_and_win() {
        let mut gs = test_state();
        gs.capture_limit = 2;
        gs.team1_score = 2;
        assert!(gs.has_won(0));
        assert!(!gs.has_won(1));
        gs.reset_scores();
        assert!(!gs.has_won(0));
    }
}
