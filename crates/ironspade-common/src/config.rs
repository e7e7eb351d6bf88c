// config.rs — server configuration and map metadata (TOML)

use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

// ============================================================
// Game modes
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamemodeId {
    Ctf,
    Tc,
    Babel,
    Tdm,
    Arena,
}

impl GamemodeId {
    pub fn from_config(id: i64) -> Option<Self> {
        match id {
            0 => Some(GamemodeId::Ctf),
            1 => Some(GamemodeId::Tc),
            2 => Some(GamemodeId::Babel),
            3 => Some(GamemodeId::Tdm),
            4 => Some(GamemodeId::Arena),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GamemodeId::Ctf => "ctf",
            GamemodeId::Tc => "tc",
            GamemodeId::Babel => "babel",
            GamemodeId::Tdm => "tdm",
            GamemodeId::Arena => "arena",
        }
    }
}

// ============================================================
// Server configuration
// ============================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub teams: TeamsConfig,
    pub passwords: PasswordsConfig,
    pub rate_limit: RateLimitConfig,
    pub voting: VotingConfig,
    pub gamemode: GamemodeOverrides,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub port: u16,
    pub gamemode: i64,
    pub capture_limit: u8,
    pub master: bool,
    pub master_hosts: Vec<MasterHost>,
    pub maps: Vec<String>,
    pub welcome_messages: Vec<String>,
    pub periodic_messages: Vec<String>,
    pub max_players: usize,
    pub respawn_time: u64,
    pub log_to_file: bool,
    /// TDM: play without intel objects.
    pub remove_intel: bool,
    pub kill_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            port: 0,
            gamemode: 0,
            capture_limit: 0,
            master: false,
            master_hosts: Vec::new(),
            maps: Vec::new(),
            welcome_messages: Vec::new(),
            periodic_messages: Vec::new(),
            max_players: 0,
            respawn_time: 0,
            log_to_file: false,
            remove_intel: false,
            kill_limit: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MasterHost {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    pub team1: TeamInfo,
    pub team2: TeamInfo,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            team1: TeamInfo {
                name: "Blue".to_string(),
                color: [0, 0, 255],
            },
            team2: TeamInfo {
                name: "Green".to_string(),
                color: [0, 255, 0],
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PasswordsConfig {
    pub manager: String,
    pub admin: String,
    pub moderator: String,
    pub guard: String,
    pub trusted: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub packets_per_second: u32,
    pub burst_size: u32,
    pub position_packets_per_sec: u32,
    pub orient_packets_per_sec: u32,
    pub block_packets_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            packets_per_second: 0,
            burst_size: 0,
            position_packets_per_sec: 0,
            orient_packets_per_sec: 0,
            block_packets_per_sec: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VotingConfig {
    pub votekick_enabled: bool,
    pub votekick_percentage: u32,
    /// Ban length in minutes applied on a successful votekick.
    pub votekick_ban_duration: u64,
    pub vote_cooldown: u64,
    pub vote_timeout: u64,
    pub votemap_enabled: bool,
    pub votemap_percentage: u32,
    pub votemap_choices: usize,
    pub votemap_allow_extend: bool,
}

/// Per-mode override tables; any value present wins over the flat
/// `[server]` keys.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GamemodeOverrides {
    pub ctf: Option<CtfOverrides>,
    pub tdm: Option<TdmOverrides>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CtfOverrides {
    pub capture_limit: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TdmOverrides {
    pub kill_limit: Option<u32>,
    pub remove_intel: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&data)?;
        config.apply_gamemode_overrides();
        config.apply_defaults();
        Ok(config)
    }

    fn apply_gamemode_overrides(&mut self) {
        if let Some(ctf) = &self.gamemode.ctf {
            if let Some(limit) = ctf.capture_limit {
                self.server.capture_limit = limit;
            }
        }
        if let Some(tdm) = &self.gamemode.tdm {
            if let Some(limit) = tdm.kill_limit {
                self.server.kill_limit = limit;
            }
            if let Some(remove) = tdm.remove_intel {
                self.server.remove_intel = remove;
            }
        }
    }

    fn apply_defaults(&mut self) {
        let s = &mut self.server;
        if s.port == 0 {
            s.port = 32887;
        }
        if s.max_players == 0 {
            s.max_players = 32;
        }
        if s.respawn_time == 0 {
            s.respawn_time = 5;
        }
        if s.capture_limit == 0 {
            s.capture_limit = 10;
        }
        if s.kill_limit == 0 {
            s.kill_limit = 100;
        }
        if s.master && s.master_hosts.is_empty() {
            s.master_hosts = vec![MasterHost {
                host: "master.buildandshoot.com".to_string(),
                port: 32886,
            }];
        }

        let r = &mut self.rate_limit;
        if r.packets_per_second == 0 {
            r.packets_per_second = 100;
        }
        if r.burst_size == 0 {
            r.burst_size = 150;
        }
        if r.position_packets_per_sec == 0 {
            r.position_packets_per_sec = 60;
        }
        if r.orient_packets_per_sec == 0 {
            r.orient_packets_per_sec = 60;
        }
        if r.block_packets_per_sec == 0 {
            r.block_packets_per_sec = 30;
        }

        let v = &mut self.voting;
        if v.votekick_percentage == 0 {
            v.votekick_percentage = 35;
        }
        if v.votekick_ban_duration == 0 {
            v.votekick_ban_duration = 30;
        }
        if v.vote_cooldown == 0 {
            v.vote_cooldown = 120;
        }
        if v.vote_timeout == 0 {
            v.vote_timeout = 120;
        }
        if v.votemap_percentage == 0 {
            v.votemap_percentage = 80;
        }
        if v.votemap_choices == 0 {
            v.votemap_choices = 5;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.is_empty() {
            return Err(ConfigError::Invalid("server name cannot be empty".into()));
        }
        if self.server.max_players == 0 || self.server.max_players > 32 {
            return Err(ConfigError::Invalid(
                "max_players must be between 1 and 32".into(),
            ));
        }
        if self.server.maps.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one map must be specified".into(),
            ));
        }
        if self.teams.team1.name.is_empty() || self.teams.team2.name.is_empty() {
            return Err(ConfigError::Invalid("team names cannot be empty".into()));
        }
        if GamemodeId::from_config(self.server.gamemode).is_none() {
            return Err(ConfigError::Invalid(format!(
                "invalid gamemode id {}",
                self.server.gamemode
            )));
        }
        Ok(())
    }

    pub fn gamemode_id(&self) -> GamemodeId {
        GamemodeId::from_config(self.server.gamemode).unwrap_or(GamemodeId::Ctf)
    }
}

// ============================================================
// Map metadata
// ============================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MapConfig {
    pub map: MapInfo,
    pub spawnpoints: SpawnPointsConfig,
    pub water: WaterConfig,
    pub intel: IntelConfig,
    pub extensions: MapExtensions,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MapInfo {
    pub name: String,
    pub author: String,
    pub description: String,
    pub fog_color: [u8; 3],
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WaterConfig {
    pub enabled: bool,
    pub damage: u8,
    pub level: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntelConfig {
    pub team1_position: [f64; 3],
    pub team2_position: [f64; 3],
    pub team1_base: [f64; 3],
    pub team2_base: [f64; 3],
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            team1_position: [128.0, 256.0, 40.0],
            team2_position: [384.0, 256.0, 40.0],
            team1_base: [120.0, 256.0, 40.0],
            team2_base: [392.0, 256.0, 40.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpawnPointsConfig {
    pub team1: SpawnArea,
    pub team2: SpawnArea,
    pub team1_points: Vec<[f64; 3]>,
    pub team2_points: Vec<[f64; 3]>,
}

impl Default for SpawnPointsConfig {
    fn default() -> Self {
        Self {
            team1: SpawnArea {
                start: [64, 192, 0],
                end: [192, 320, 63],
            },
            team2: SpawnArea {
                start: [320, 192, 0],
                end: [448, 320, 63],
            },
            team1_points: Vec::new(),
            team2_points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct SpawnArea {
    pub start: [i32; 3],
    pub end: [i32; 3],
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MapExtensions {
    pub water_damage: Option<u8>,
    pub boundary_damage: Option<BoundaryDamage>,
    /// Round time limit in seconds.
    pub time_limit: Option<u64>,
    pub cap_limit: Option<u8>,
    pub disabled_commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct BoundaryDamage {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
    pub damage: u8,
}

impl MapConfig {
    /// Load metadata next to a `.vxl` file; a missing metadata file gives
    /// the defaults.
    pub fn load_for_map(vxl_path: &Path) -> Result<Self, ConfigError> {
        let toml_path = vxl_path.with_extension("toml");
        if !toml_path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&toml_path)?;
        let config: MapConfig = toml::from_str(&data)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Config {
        let mut config: Config = toml::from_str(text).unwrap();
        config.apply_gamemode_overrides();
        config.apply_defaults();
        config
    }

    #[test]
    fn defaults_fill_missing_knobs() {
        let config = parse(
            r#"
            [server]
            name = "test server"
            maps = ["classic"]
            "#,
        );
        assert_eq!(config.server.port, 32887);
        assert_eq!(config.server.max_players, 32);
        assert_eq!(config.server.respawn_time, 5);
        assert_eq!(config.rate_limit.burst_size, 150);
        assert_eq!(config.rate_limit.position_packets_per_sec, 60);
        assert_eq!(config.voting.votekick_percentage, 35);
        assert_eq!(config.voting.vote_cooldown, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn gamemode_overrides_win() {
        let config = parse(
            r#"
            [server]
            name = "test"
            maps = ["m"]
            capture_limit = 10

            [gamemode.ctf]
            capture_limit = 3
            "#,
        );
        assert_eq!(config.server.capture_limit, 3);
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let mut config = parse(
            r#"
            [server]
            name = "ok"
            maps = ["m"]
            "#,
        );
        assert!(config.validate().is_ok());

        config.server.max_players = 64;
        assert!(config.validate().is_err());

        config.server.max_players = 32;
        config.server.maps.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn map_metadata_parses_extensions() {
        let text = r#"
            [map]
            name = "bridgewars"
            author = "somebody"
            fog_color = [128, 232, 255]

            [water]
            enabled = true
            damage = 5
            level = 62.0

            [intel]
            team1_position = [100.0, 100.0, 40.0]
            team2_position = [400.0, 400.0, 40.0]
            team1_base = [90.0, 90.0, 40.0]
            team2_base = [410.0, 410.0, 40.0]

            [extensions]
            time_limit = 1800
            cap_limit = 5
            disabled_commands = ["votemap"]

            [extensions.boundary_damage]
            left = 64
            right = 448
            top = 64
            bottom = 448
            damage = 10
        "#;
        let config: MapConfig = toml::from_str(text).unwrap();
        assert_eq!(config.map.name, "bridgewars");
        assert_eq!(config.water.damage, 5);
        assert_eq!(config.extensions.time_limit, Some(1800));
        assert_eq!(config.extensions.cap_limit, Some(5));
        assert_eq!(config.extensions.boundary_damage.unwrap().damage, 10);
        assert_eq!(config.extensions.disabled_commands, vec!["votemap"]);
    }

    #[test]
    fn missing_metadata_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let vxl = dir.path().join("somemap.vxl");
        std::fs::File::create(&vxl)
            .unwrap()
            .write_all(&[0, 63, 63, 0])
            .unwrap();
        let meta = MapConfig::load_for_map(&vxl).unwrap();
        assert_eq!(meta.intel.team1_position[2], 40.0);
        assert!(!meta.water.enabled);
    }
}
