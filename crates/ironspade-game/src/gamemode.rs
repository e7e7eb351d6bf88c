// gamemode.rs — mode-specific rules
//
// The mode set is closed, so dispatch is an explicit match on the id
// rather than a trait object. Scripted per-event hooks live in the
// callback chain; this type answers the rule questions the tick loop
// asks.

use crate::gamestate::GameState;
use ironspade_common::config::{Config, GamemodeId};
use ironspade_common::protocol::WireGamemode;

pub struct GameMode {
    id: GamemodeId,
    kill_limit: u32,
    remove_intel: bool,
}

impl GameMode {
    pub fn new(config: &Config) -> Self {
        Self {
            id: config.gamemode_id(),
            kill_limit: config.server.kill_limit,
            remove_intel: config.server.remove_intel,
        }
    }

    pub fn id(&self) -> GamemodeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// The wire protocol only knows CTF and TC layouts; every other mode
    /// presents itself as CTF.
    pub fn wire_mode(&self) -> WireGamemode {
        match self.id {
            GamemodeId::Tc => WireGamemode::Tc,
            _ => WireGamemode::Ctf,
        }
    }

    pub fn intel_enabled(&self) -> bool {
        !(self.id == GamemodeId::Tdm && self.remove_intel)
    }

    /// Water and boundary damage follow the intel switch: a TDM arena
    /// without objectives also runs without environmental hazards.
    pub fn env_hazards_enabled(&self) -> bool {
        self.intel_enabled()
    }

    pub fn is_babel(&self) -> bool {
        self.id == GamemodeId::Babel
    }

    /// Winning team, if any.
    pub fn check_win_condition(&self, gs: &GameState) -> Option<u8> {
        match self.id {
            GamemodeId::Ctf | GamemodeId::Babel => {
                if gs.has_won(0) {
                    Some(0)
                } else if gs.has_won(1) {
                    Some(1)
                } else {
                    None
                }
            }
            GamemodeId::Tdm => {
                let mut kills = [0u32; 2];
                gs.players.for_each(|p| {
                    let p = p.read();
                    if p.team < 2 {
                        kills[p.team as usize] += p.kills;
                    }
                });
                if kills[0] >= self.kill_limit {
                    Some(0)
                } else if kills[1] >= self.kill_limit {
                    Some(1)
                } else {
                    None
                }
            }
            // Territory and arena round logic is driven by scripts; the
            // core carries no win rule for them.
            GamemodeId::Tc | GamemodeId::Arena => None,
        }
    }

    pub fn should_rotate_map(&self) -> bool {
        matches!(self.id, GamemodeId::Ctf | GamemodeId::Babel | GamemodeId::Tdm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PeerHandle, Player, PlayerRegistry, PlayerState};
    use ironspade_common::config::MapConfig;
    use ironspade_common::vxl::VxlMap;
    use std::sync::Arc;
    use std::time::Instant;

    fn config_for_mode(mode: i64) -> Config {
        let mut config = Config::default();
        config.server.name = "t".to_string();
        config.server.gamemode = mode;
        config.server.capture_limit = 2;
        config.server.kill_limit = 3;
        config
    }

    fn state_for(config: &Config) -> GameState {
        GameState::new(
            config,
            MapConfig::default(),
            VxlMap::flat(32, 32, 64),
            Arc::new(PlayerRegistry::new()),
        )
    }

    #[test]
    fn ctf_win_at_capture_limit() {
        let config = config_for_mode(0);
        let mode = GameMode::new(&config);
        let mut gs = state_for(&config);
        assert_eq!(mode.check_win_condition(&gs), None);
        gs.team2_score = 2;
        assert_eq!(mode.check_win_condition(&gs), Some(1));
    }

    #[test]
    fn tdm_win_counts_kills() {
        let config = config_for_mode(3);
        let mode = GameMode::new(&config);
        let gs = state_for(&config);
        let mut p = Player::new(0, PeerHandle(0), Instant::now());
        p.team = 0;
        p.kills = 3;
        p.state = PlayerState::Ready;
        gs.players.add(p);
        assert_eq!(mode.check_win_condition(&gs), Some(0));
    }

    #[test]
    fn tdm_remove_intel_disables_hazards() {
        let mut config = config_for_mode(3);
        config.server.remove_intel = true;
        let mode = GameMode::new(&config);
        assert!(!mode.intel_enabled());
        assert!(!mode.env_hazards_enabled());

        let ctf = GameMode::new(&config_for_mode(0));
        assert!(ctf.intel_enabled());
    }

    #[test]
    fn wire_mode_mapping() {
        assert_eq!(GameMode::new(&config_for_mode(0)).wire_mode(), WireGamemode::Ctf);
        assert_eq!(GameMode::new(&config_for_mode(1)).wire_mode(), WireGamemode::Tc);
        assert_eq!(GameMode::new(&config_for_mode(2)).wire_mode(), WireGamemode::Ctf);
    }
}
