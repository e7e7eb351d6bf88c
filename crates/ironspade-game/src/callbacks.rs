// callbacks.rs — cross-cutting event hooks
//
// The scripting host and plugins observe the simulation through this
// trait. Bool-returning hooks veto the event when any registered hook
// returns false; the rest are observers. Default bodies make every hook
// optional for implementors.

use crate::player::Player;
use ironspade_common::protocol::{KillType, Vec3};

#[allow(unused_variables)]
pub trait Callbacks: Send {
    fn on_connect(&mut self, player_id: u8) {}
    fn on_disconnect(&mut self, player_id: u8) {}
    fn on_player_join(&mut self, player: &Player) {}
    fn on_player_kill(&mut self, killer: Option<&Player>, victim: &Player, kill_type: KillType) {}
    fn on_player_spawn(&mut self, player: &Player) {}
    fn on_player_damage(&mut self, victim: &Player, damage: u8, source: Vec3) {}
    fn on_chat_message(&mut self, player: &Player, message: &str) -> bool {
        true
    }
    fn on_block_place(&mut self, player: &Player, x: i32, y: i32, z: i32) -> bool {
        true
    }
    fn on_block_destroy(&mut self, player: &Player, x: i32, y: i32, z: i32) -> bool {
        true
    }
    fn on_intel_pickup(&mut self, player: &Player, intel_team: u8) -> bool {
        true
    }
    fn on_intel_capture(&mut self, player: &Player, team: u8) -> bool {
        true
    }
    fn on_intel_drop(&mut self, player: &Player, intel_team: u8) {}
    fn on_weapon_fire(&mut self, player: &Player) {}
    fn on_grenade_toss(&mut self, player: &Player) {}
    fn on_restock(&mut self, player: &Player) {}
}

/// Ordered hook chain; veto hooks require every link to agree.
#[derive(Default)]
pub struct CallbackChain {
    hooks: Vec<Box<dyn Callbacks>>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn Callbacks>) {
        self.hooks.push(hook);
    }

    pub fn on_connect(&mut self, player_id: u8) {
        for hook in &mut self.hooks {
            hook.on_connect(player_id);
        }
    }

    pub fn on_disconnect(&mut self, player_id: u8) {
        for hook in &mut self.hooks {
            hook.on_disconnect(player_id);
        }
    }

    pub fn on_player_join(&mut self, player: &Player) {
        for hook in &mut self.hooks {
            hook.on_player_join(player);
        }
    }

    pub fn on_player_kill(
        &mut self,
        killer: Option<&Player>,
        victim: &Player,
        kill_type: KillType,
    ) {
        for hook in &mut self.hooks {
            hook.on_player_kill(killer, victim, kill_type);
        }
    }

    pub fn on_player_spawn(&mut self, player: &Player) {
        for hook in &mut self.hooks {
            hook.on_player_spawn(player);
        }
    }

    pub fn on_player_damage(&mut self, victim: &Player, damage: u8, source: Vec3) {
        for hook in &mut self.hooks {
            hook.on_player_damage(victim, damage, source);
        }
    }

    pub fn on_chat_message(&mut self, player: &Player, message: &str) -> bool {
        self.hooks.iter_mut().all(|h| h.on_chat_message(player, message))
    }

    pub fn on_block_place(&mut self, player: &Player, x: i32, y: i32, z: i32) -> bool {
        self.hooks.iter_mut().all(|h| h.on_block_place(player, x, y, z))
    }

    pub fn on_block_destroy(&mut self, player: &Player, x: i32, y: i32, z: i32) -> bool {
        self.hooks.iter_mut().all(|h| h.on_block_destroy(player, x, y, z))
    }

    pub fn on_intel_pickup(&mut self, player: &Player, intel_team: u8) -> bool {
        self.hooks.iter_mut().all(|h| h.on_intel_pickup(player, intel_team))
    }

    pub fn on_intel_capture(&mut self, player: &Player, team: u8) -> bool {
        self.hooks.iter_mut().all(|h| h.on_intel_capture(player, team))
    }

    pub fn on_intel_drop(&mut self, player: &Player, intel_team: u8) {
        for hook in &mut self.hooks {
            hook.on_intel_drop(player, intel_team);
        }
    }

    pub fn on_weapon_fire(&mut self, player: &Player) {
        for hook in &mut self.hooks {
            hook.on_weapon_fire(player);
        }
    }

    pub fn on_grenade_toss(&mut self, player: &Player) {
        for hook in &mut self.hooks {
            hook.on_grenade_toss(player);
        }
    }

    pub fn on_restock(&mut self, player: &Player) {
        for hook in &mut self.hooks {
            hook.on_restock(player);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PeerHandle, Player};
    use std::time::Instant;

    struct Counter {
        connects: u32,
        veto_chat: bool,
    }

    impl Callbacks for Counter {
        fn on_connect(&mut self, _player_id: u8) {
            self.connects += 1;
        }
        fn on_chat_message(&mut self, _player: &Player, _message: &str) -> bool {
            !self.veto_chat
        }
    }

    #[test]
    fn observers_run_in_order() {
        let mut chain = CallbackChain::new();
        chain.register(Box::new(Counter {
            connects: 0,
            veto_chat: false,
        }));
        chain.on_connect(3);
        chain.on_connect(4);
        // No panic and the chain is callable with zero hooks too.
        let empty = &mut CallbackChain::new();
        empty.on_connect(1);
    }

    #[test]
    fn veto_hooks_require_all_true() {
        let p = Player::new(0, PeerHandle(0), Instant::now());
        let mut chain = CallbackChain::new();
        chain.register(Box::new(Counter {
            connects: 0,
            veto_chat: false,
        }));
        assert!(chain.on_chat_message(&p, "hello"));

        chain.register(Box::new(Counter {
            connects: 0,
            veto_chat: true,
        }));
        assert!(!chain.on_chat_message(&p, "hello"));
    }
}
