// player.rs — per-slot player record and the fixed-capacity registry
//
// Each record sits behind its own readers-writer lock; the registry holds
// a separate lock so slot insert/remove never blocks record reads from
// the ping responder or other observers. All simulation writes happen on
// the tick thread.

use ironspade_common::protocol::{
    self, ItemType, Vec3, WeaponType, INITIAL_BLOCKS, INITIAL_GRENADES, INITIAL_HP, MAX_BLOCKS,
    MAX_GRENADES, MAX_HP, SPECTATOR_TEAM,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque transport peer handle; the server crate maps it onto the ENet
/// peer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Disconnected,
    Connecting,
    Loading,
    WaitingForExistingPlayer,
    Ready,
    Dead,
}

/// Permission mask bits, granted through `/login` role passwords.
pub mod perm {
    pub const TRUSTED: u64 = 1 << 0;
    pub const GUARD: u64 = 1 << 1;
    pub const MODERATOR: u64 = 1 << 3;
    pub const ADMIN: u64 = 1 << 4;
    pub const MANAGER: u64 = 1 << 5;

    pub const STAFF: u64 = MODERATOR | ADMIN | MANAGER;
}

const RELOAD_TIME: Duration = Duration::from_millis(2500);

/// Per-second receive counters for the rate limiter.
#[derive(Debug)]
pub struct RateWindow {
    pub window_start: Instant,
    pub total: u32,
    pub per_type: HashMap<u8, u32>,
    pub violations: u32,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            total: 0,
            per_type: HashMap::new(),
            violations: 0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.total = 0;
        self.per_type.clear();
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: u8,
    pub peer: PeerHandle,
    pub name: String,
    pub team: u8,
    pub weapon: WeaponType,
    pub tool: ItemType,
    pub color: protocol::Color3b,

    pub position: Vec3,
    pub eye_pos: Vec3,
    pub orientation: Vec3,
    pub velocity: Vec3,

    pub hp: u8,
    pub blocks: u8,
    pub grenades: u8,
    pub magazine_ammo: u8,
    pub reserve_ammo: u8,
    pub kills: u32,
    pub deaths: u32,

    pub alive: bool,
    pub crouching: bool,
    pub airborne: bool,
    pub wade: bool,
    pub sprinting: bool,
    pub sneaking: bool,
    pub jumping: bool,
    pub primary_fire: bool,
    pub secondary_fire: bool,
    pub key_states: u8,
    pub state: PlayerState,
    pub last_climb: f32,

    pub respawn_at: Option<Instant>,
    pub next_fire_at: Option<Instant>,
    pub reloading: bool,
    pub reload_done_at: Option<Instant>,
    pub last_water_damage: Option<Instant>,
    pub last_boundary_damage: Option<Instant>,
    pub last_restock: Option<Instant>,
    pub has_intel: bool,

    pub last_block_place: Option<Instant>,
    pub block_place_quota: u32,
    pub last_block_destroy: Option<Instant>,
    pub block_destroy_quota: u32,

    pub permissions: u64,
    pub muted: bool,

    pub handshake_challenge: u32,
    pub handshake_failed: bool,
    pub handshake_complete: bool,
    pub version_info_received: bool,
    pub client_identifier: u8,
    pub version: (i8, i8, i8),
    pub os_info: String,
    pub supported_extensions: HashMap<u8, u8>,

    pub rate: RateWindow,
}

impl Player {
    pub fn new(id: u8, peer: PeerHandle, now: Instant) -> Self {
        Self {
            id,
            peer,
            name: String::new(),
            team: 0,
            weapon: WeaponType::Rifle,
            tool: ItemType::Gun,
            color: protocol::Color3b::default(),
            position: Vec3::default(),
            eye_pos: Vec3::default(),
            orientation: Vec3::default(),
            velocity: Vec3::default(),
            hp: INITIAL_HP,
            blocks: INITIAL_BLOCKS,
            grenades: INITIAL_GRENADES,
            magazine_ammo: protocol::default_magazine_ammo(WeaponType::Rifle),
            reserve_ammo: protocol::default_reserve_ammo(WeaponType::Rifle),
            kills: 0,
            deaths: 0,
            alive: false,
            crouching: false,
            airborne: false,
            wade: false,
            sprinting: false,
            sneaking: false,
            jumping: false,
            primary_fire: false,
            secondary_fire: false,
            key_states: 0,
            state: PlayerState::Connecting,
            last_climb: 0.0,
            respawn_at: None,
            next_fire_at: None,
            reloading: false,
            reload_done_at: None,
            last_water_damage: None,
            last_boundary_damage: None,
            last_restock: None,
            has_intel: false,
            last_block_place: None,
            block_place_quota: 0,
            last_block_destroy: None,
            block_destroy_quota: 0,
            permissions: 0,
            muted: false,
            handshake_challenge: 0,
            handshake_failed: false,
            handshake_complete: false,
            version_info_received: false,
            client_identifier: 0,
            version: (0, 0, 0),
            os_info: String::new(),
            supported_extensions: HashMap::new(),
            rate: RateWindow::new(now),
        }
    }

    pub fn is_spectator(&self) -> bool {
        self.team == SPECTATOR_TEAM
    }

    pub fn set_weapon(&mut self, weapon: WeaponType) {
        self.weapon = weapon;
        self.magazine_ammo = protocol::default_magazine_ammo(weapon);
        self.reserve_ammo = protocol::default_reserve_ammo(weapon);
    }

    /// Apply damage; returns true when this damage killed the player.
    pub fn apply_damage(&mut self, amount: u8) -> bool {
        if !self.alive || self.hp == 0 {
            return false;
        }
        if amount >= self.hp {
            self.hp = 0;
            self.alive = false;
            self.deaths += 1;
            true
        } else {
            self.hp -= amount;
            false
        }
    }

    pub fn kill(&mut self) {
        self.hp = 0;
        self.alive = false;
        self.deaths += 1;
    }

    pub fn respawn(&mut self, position: Vec3) {
        self.hp = INITIAL_HP;
        self.blocks = INITIAL_BLOCKS;
        self.grenades = INITIAL_GRENADES;
        self.magazine_ammo = protocol::default_magazine_ammo(self.weapon);
        self.reserve_ammo = protocol::default_reserve_ammo(self.weapon);
        self.position = position;
        self.eye_pos = position;
        self.alive = true;
        self.state = PlayerState::Ready;
        self.velocity = Vec3::default();
        self.airborne = false;
        self.crouching = false;
        self.wade = false;
        self.jumping = false;
        self.last_climb = 0.0;
        self.tool = ItemType::Gun;
        self.reloading = false;
        self.reload_done_at = None;
        self.has_intel = false;
    }

    pub fn restock(&mut self) {
        self.blocks = MAX_BLOCKS;
        self.grenades = MAX_GRENADES;
        self.hp = MAX_HP;
        self.magazine_ammo = protocol::default_magazine_ammo(self.weapon);
        self.reserve_ammo = protocol::default_reserve_ammo(self.weapon);
        self.reloading = false;
        self.reload_done_at = None;
    }

    pub fn needs_restock(&self) -> bool {
        self.hp < MAX_HP
            || self.blocks < MAX_BLOCKS
            || self.grenades < MAX_GRENADES
            || self.magazine_ammo < protocol::default_magazine_ammo(self.weapon)
            || self.reserve_ammo < protocol::default_reserve_ammo(self.weapon)
    }

    pub fn can_shoot(&self, now: Instant) -> bool {
        if !self.alive || self.tool != ItemType::Gun || self.reloading || self.magazine_ammo == 0 {
            return false;
        }
        self.next_fire_at.map_or(true, |t| now >= t)
    }

    /// Consume one round and arm the fire-delay clock. Returns false when
    /// the shot is not allowed.
    pub fn shoot(&mut self, now: Instant) -> bool {
        if !self.can_shoot(now) {
            return false;
        }
        self.magazine_ammo -= 1;
        self.next_fire_at =
            Some(now + Duration::from_millis(protocol::fire_delay_millis(self.weapon)));
        true
    }

    pub fn start_reload(&mut self, now: Instant) -> bool {
        if !self.alive || self.reloading || self.reserve_ammo == 0 {
            return false;
        }
        if self.magazine_ammo >= protocol::default_magazine_ammo(self.weapon) {
            return false;
        }
        self.reloading = true;
        self.reload_done_at = Some(now + RELOAD_TIME);
        true
    }

    pub fn finish_reload(&mut self) {
        if !self.reloading {
            return;
        }
        let max_ammo = protocol::default_magazine_ammo(self.weapon);
        let needed = (max_ammo - self.magazine_ammo).min(self.reserve_ammo);
        self.magazine_ammo += needed;
        self.reserve_ammo -= needed;
        self.reloading = false;
        self.reload_done_at = None;
    }

    /// Complete a reload whose clock has expired. Returns true when ammo
    /// changed this call.
    pub fn update_reload(&mut self, now: Instant) -> bool {
        match self.reload_done_at {
            Some(done) if self.reloading && now >= done => {
                self.finish_reload();
                true
            }
            _ => false,
        }
    }

    pub fn supports_extension(&self, ext: u8) -> bool {
        self.supported_extensions.contains_key(&ext)
    }

    pub fn add_extension(&mut self, ext: u8, version: u8) {
        self.supported_extensions.insert(ext, version);
    }
}

pub type PlayerRef = Arc<RwLock<Player>>;

/// Slot table keyed by player id in [0, max_players).
#[derive(Default)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<u8, PlayerRef>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, player: Player) -> PlayerRef {
        let id = player.id;
        let entry = Arc::new(RwLock::new(player));
        self.players.write().insert(id, Arc::clone(&entry));
        entry
    }

    pub fn remove(&self, id: u8) {
        self.players.write().remove(&id);
    }

    pub fn get(&self, id: u8) -> Option<PlayerRef> {
        self.players.read().get(&id).cloned()
    }

    pub fn get_by_peer(&self, peer: PeerHandle) -> Option<PlayerRef> {
        self.players
            .read()
            .values()
            .find(|p| p.read().peer == peer)
            .cloned()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.players.read().contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.players.read().len()
    }

    pub fn find_free_id(&self, max_players: usize) -> Option<u8> {
        let players = self.players.read();
        (0..max_players as u8).find(|id| !players.contains_key(id))
    }

    /// Snapshot the current slot table so callers can iterate without
    /// holding the registry lock.
    pub fn snapshot(&self) -> Vec<PlayerRef> {
        let mut entries: Vec<(u8, PlayerRef)> = self
            .players
            .read()
            .iter()
            .map(|(&id, p)| (id, Arc::clone(p)))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, p)| p).collect()
    }

    /// Connected, non-disconnected records.
    pub fn for_each<F: FnMut(&PlayerRef)>(&self, mut f: F) {
        for player in self.snapshot() {
            if player.read().state == PlayerState::Disconnected {
                continue;
            }
            f(&player);
        }
    }

    pub fn ready_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|p| p.read().state == PlayerState::Ready)
            .count()
    }

    /// Combatants only; spectators do not count toward the public total.
    pub fn combatant_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|p| {
                let p = p.read();
                p.state != PlayerState::Disconnected && !p.is_spectator()
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_player(id: u8) -> Player {
        Player::new(id, PeerHandle(0), Instant::now())
    }

    #[test]
    fn damage_floors_at_zero_and_kills() {
        let mut p = test_player(0);
        p.alive = true;
        assert!(!p.apply_damage(60));
        assert_eq!(p.hp, 40);
        assert!(p.apply_damage(100));
        assert_eq!(p.hp, 0);
        assert!(!p.alive);
        assert_eq!(p.deaths, 1);
        // Dead players take no further damage.
        assert!(!p.apply_damage(50));
        assert_eq!(p.deaths, 1);
    }

    #[test]
    fn respawn_resets_loadout() {
        let mut p = test_player(1);
        p.set_weapon(WeaponType::Shotgun);
        p.alive = true;
        p.apply_damage(100);
        p.blocks = 3;
        p.has_intel = true;

        p.respawn(Vec3::new(100.0, 100.0, 30.0));
        assert!(p.alive);
        assert_eq!(p.hp, INITIAL_HP);
        assert_eq!(p.blocks, INITIAL_BLOCKS);
        assert_eq!(p.grenades, INITIAL_GRENADES);
        assert_eq!(p.magazine_ammo, 6);
        assert_eq!(p.reserve_ammo, 48);
        assert_eq!(p.tool, ItemType::Gun);
        assert!(!p.has_intel);
        assert_eq!(p.state, PlayerState::Ready);
    }

    #[test]
    fn shoot_arms_fire_delay() {
        let mut p = test_player(2);
        p.alive = true;
        let t0 = Instant::now();
        assert!(p.shoot(t0));
        assert_eq!(p.magazine_ammo, 9);
        // Rifle delay is 500 ms; an immediate follow-up is refused.
        assert!(!p.shoot(t0 + Duration::from_millis(100)));
        assert!(p.shoot(t0 + Duration::from_millis(500)));
        assert_eq!(p.magazine_ammo, 8);
    }

    #[test]
    fn reload_moves_reserve_into_magazine() {
        let mut p = test_player(3);
        p.alive = true;
        p.magazine_ammo = 2;
        let t0 = Instant::now();
        assert!(p.start_reload(t0));
        assert!(p.reloading);
        // Not done yet.
        assert!(!p.update_reload(t0 + Duration::from_millis(1000)));
        assert!(p.update_reload(t0 + Duration::from_millis(2500)));
        assert_eq!(p.magazine_ammo, 10);
        assert_eq!(p.reserve_ammo, 42);
        assert!(!p.reloading);
    }

    #[test]
    fn reload_refused_when_full_or_empty_reserve() {
        let mut p = test_player(4);
        p.alive = true;
        assert!(!p.start_reload(Instant::now()));
        p.magazine_ammo = 0;
        p.reserve_ammo = 0;
        assert!(!p.start_reload(Instant::now()));
    }

    #[test]
    fn registry_slots() {
        let registry = PlayerRegistry::new();
        assert_eq!(registry.find_free_id(32), Some(0));

        registry.add(test_player(0));
        registry.add(test_player(1));
        assert_eq!(registry.find_free_id(32), Some(2));
        assert_eq!(registry.count(), 2);
        assert!(registry.contains(1));

        registry.remove(0);
        assert_eq!(registry.find_free_id(32), Some(0));
        assert!(!registry.contains(0));
    }

    #[test]
    fn registry_full() {
        let registry = PlayerRegistry::new();
        for id in 0..4 {
            registry.add(test_player(id));
        }
        assert_eq!(registry.find_free_id(4), None);
    }

    #[test]
    fn lookup_by_peer() {
        let registry = PlayerRegistry::new();
        let mut p = test_player(7);
        p.peer = PeerHandle(42);
        registry.add(p);
        let found = registry.get_by_peer(PeerHandle(42)).unwrap();
        assert_eq!(found.read().id, 7);
        assert!(registry.get_by_peer(PeerHandle(43)).is_none());
    }

    #[test]
    fn restock_caps_and_cancels_reload() {
        let mut p = test_player(8);
        p.alive = true;
        p.hp = 40;
        p.blocks = 0;
        p.magazine_ammo = 1;
        assert!(p.needs_restock());
        p.start_reload(Instant::now());
        p.restock();
        assert_eq!(p.hp, MAX_HP);
        assert_eq!(p.blocks, MAX_BLOCKS);
        assert_eq!(p.grenades, MAX_GRENADES);
        assert!(!p.reloading);
        assert!(!p.needs_restock());
    }
}
