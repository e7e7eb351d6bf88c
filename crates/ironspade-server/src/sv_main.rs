// sv_main.rs — tick loop and authoritative simulation
//
// Two tickers share the loop: the 60 Hz simulation tick and the 10 Hz
// world update. Every pass drains up to 100 transport events. All game
// state mutation happens here, on this thread.

use crate::server::{ControlMsg, Server};
use crate::net::NetEvent;
use crate::vote::VoteOutcome;
use ironspade_common::config::GamemodeId;
use ironspade_common::protocol::{
    disconnect_reason, BlockAction, BlockActionType, ChatType, IntelPickup, KillType, ProgressBar,
    SetHp, TerritoryCapture, Vec3, Vec3i,
};
use ironspade_game::grenade::{move_grenade, Grenade, GRENADE_FLOOR_Z};
use ironspade_game::player::{PeerHandle, Player, PlayerRef, PlayerState};
use ironspade_game::pmove;
use ironspade_game::weapons;
use std::time::{Duration, Instant};

const TICK_RATE: Duration = Duration::from_micros(16_667); // 60 Hz
const WORLD_UPDATE_RATE: Duration = Duration::from_millis(100); // 10 Hz
const MAX_EVENTS_PER_PASS: usize = 100;

const RESTOCK_COOLDOWN: Duration = Duration::from_secs(15);
const RESTOCK_RADIUS: f32 = 3.0;
const INTEL_PICKUP_DIST_SQ: f32 = 1.5 * 1.5;
const CAPTURE_DIST_SQ: f32 = 3.0 * 3.0;
const ENV_DAMAGE_COOLDOWN: Duration = Duration::from_secs(1);
const WIN_ROTATE_DELAY: Duration = Duration::from_secs(5);

impl Server {
    /// The authoritative loop. Returns when shutdown is triggered.
    pub fn run(&mut self) {
        let sim_tick = crossbeam::channel::tick(TICK_RATE);
        let world_tick = crossbeam::channel::tick(WORLD_UPDATE_RATE);
        let shutdown = self.shutdown.clone();
        let vote_timer_rx = self.vote_timer_rx.clone();
        let control_rx = self.control_rx.clone();

        while self.running {
            crossbeam::channel::select! {
                recv(shutdown.channel()) -> _ => {
                    log::info!("shutdown signal received, exiting tick loop");
                    break;
                }
                recv(sim_tick) -> _ => self.update(),
                recv(world_tick) -> _ => self.send_world_update(),
                recv(vote_timer_rx) -> event => {
                    if let Ok(event) = event {
                        self.handle_vote_timer(event);
                    }
                }
                recv(control_rx) -> msg => {
                    if let Ok(msg) = msg {
                        self.handle_control(msg);
                    }
                }
            }
            self.handle_network_events();

            if self.shutdown.is_shutdown() {
                break;
            }
        }
    }

    fn handle_control(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::PeriodicAnnounce(message) => {
                self.broadcast_chat(&message, ChatType::System);
            }
            ControlMsg::ChangeMap(map_name) => {
                if let Err(e) = self.change_map(&map_name) {
                    log::error!("failed to change map: {}", e);
                    self.broadcast_chat("Failed to change map", ChatType::System);
                }
            }
        }
    }

    fn handle_vote_timer(&mut self, event: crate::vote::VoteTimerEvent) {
        let count = self.game.ready_player_count();
        if let Some(update) = self.votes.on_timer(event, count) {
            for message in &update.messages {
                self.broadcast_chat(message, ChatType::System);
            }
            if let Some(outcome) = update.outcome {
                self.apply_vote_outcome(outcome);
            }
        }
    }

    pub fn apply_vote_outcome(&mut self, outcome: VoteOutcome) {
        match outcome {
            VoteOutcome::KickPassed {
                victim,
                victim_name,
                reason,
                ban_minutes,
            } => {
                let Some(player) = self.game.players.get(victim) else {
                    return;
                };
                let peer = player.read().peer;
                if let Some(ip) = self.net.peer_ip(peer) {
                    self.bans.add_ip_ban(
                        ip.to_string(),
                        victim_name,
                        reason,
                        "votekick".to_string(),
                        Duration::from_secs(ban_minutes * 60),
                    );
                }
                self.net.disconnect_later(peer, disconnect_reason::UNDEFINED);
            }
            VoteOutcome::MapPassed { map_name } => {
                // The change is deferred so the result broadcast lands
                // before the transfer begins.
                let tx = self.control_tx.clone();
                let shutdown = self.shutdown.clone();
                let _ = std::thread::Builder::new()
                    .name("map-change-delay".to_string())
                    .spawn(move || {
                        crossbeam::channel::select! {
                            recv(shutdown.channel()) -> _ => {}
                            recv(crossbeam::channel::after(WIN_ROTATE_DELAY)) -> _ => {
                                let _ = tx.send(ControlMsg::ChangeMap(map_name));
                            }
                        }
                    });
            }
            VoteOutcome::Extended | VoteOutcome::TimedOut => {}
        }
    }

    // ============================================================
    // Simulation tick
    // ============================================================

    fn update(&mut self) {
        let dt = TICK_RATE.as_secs_f32();
        let game_time = self.game_time();
        let now = Instant::now();

        for player in self.game.players.snapshot() {
            let (state, alive, respawn_due) = {
                let p = player.read();
                (
                    p.state,
                    p.alive,
                    p.respawn_at.map_or(false, |t| now >= t),
                )
            };
            if state == PlayerState::Disconnected {
                continue;
            }

            if alive {
                let fall_damage = {
                    let mut p = player.write();
                    pmove::move_player(&mut p, &self.game.map, dt, game_time)
                };
                if fall_damage > 0 {
                    let (id, position) = {
                        let p = player.read();
                        (p.id, p.position)
                    };
                    if self.damage_player(id, fall_damage as u8, position, 0) {
                        self.handle_environment_kill(&player, KillType::Fall);
                    }
                }

                self.check_water_damage(&player, now);
                self.check_boundary_damage(&player, now);
                self.check_intel_pickup(&player);
                self.check_intel_capture(&player);
                self.check_restock(&player, now);
            }

            let reload_finished = player.write().update_reload(now);
            if reload_finished {
                self.send_weapon_reload(&player);
                self.send_player_properties(&player);
            }

            if state == PlayerState::Dead && respawn_due {
                let id = player.read().id;
                self.respawn_player(id);
            }
        }

        self.update_grenades(dt);

        if self.game.time_limit_reached() {
            self.handle_time_limit_reached();
        }
    }

    // ============================================================
    // Network events
    // ============================================================

    pub fn handle_network_events(&mut self) {
        for _ in 0..MAX_EVENTS_PER_PASS {
            let Some(event) = self.net.service() else {
                break;
            };
            match event {
                NetEvent::Connect { peer } => self.handle_connect(peer),
                NetEvent::Disconnect { peer } => self.handle_peer_disconnect(peer),
                NetEvent::Receive { peer, data } => self.handle_packet(peer, &data),
            }
        }
    }

    fn handle_connect(&mut self, peer: PeerHandle) {
        let ip = self
            .net
            .peer_ip(peer)
            .map(|ip| ip.to_string())
            .unwrap_or_default();

        if let Some(ban) = self.bans.is_banned_ip(&ip) {
            log::info!("banned player attempted to connect: {} ({})", ip, ban.reason);
            self.net.disconnect_now(peer, disconnect_reason::BANNED);
            return;
        }

        let Some(player_id) = self.game.players.find_free_id(self.config.server.max_players)
        else {
            log::warn!("server full, rejecting connection from {}", ip);
            self.net.disconnect_now(peer, disconnect_reason::SERVER_FULL);
            return;
        };

        let mut record = Player::new(player_id, peer, Instant::now());
        record.state = PlayerState::Loading;
        let player = self.game.players.add(record);

        self.callbacks.on_connect(player_id);

        if let Err(e) = self.send_initial_packets(&player) {
            log::error!("failed to send initial packets to {}: {}", player_id, e);
        }

        self.notify_masters_player_count();
        self.update_ping_info();
        log::info!("player connected: id {} from {}", player_id, ip);
    }

    fn handle_peer_disconnect(&mut self, peer: PeerHandle) {
        let Some(player) = self.game.players.get_by_peer(peer) else {
            return;
        };
        let (id, name, has_intel, team) = {
            let p = player.read();
            (p.id, p.name.clone(), p.has_intel, p.team)
        };
        log::info!("player disconnected: id {} name {:?}", id, name);

        if has_intel && team <= 1 {
            let position = player.read().position;
            let drop_pos = self.ground_intel_drop_position(position);
            let idx = self.game.contended_intel_index(team);
            self.game.drop_intel(idx, drop_pos);
            self.broadcast_intel_drop(idx, drop_pos);
        }

        self.broadcast_player_left(id);

        if let Some(messages) = self.votes.handle_disconnect(id) {
            for message in messages {
                self.broadcast_chat(&message, ChatType::System);
            }
        }

        self.callbacks.on_disconnect(id);

        player.write().state = PlayerState::Disconnected;
        self.game.players.remove(id);

        self.notify_masters_player_count();
        self.update_ping_info();
    }

    // ============================================================
    // Join completion, respawn, damage, kills
    // ============================================================

    pub fn finalize_player_join(&mut self, player: &PlayerRef) {
        player.write().has_intel = false;

        for message in self.config.server.welcome_messages.clone() {
            self.send_chat_to_player(player, &message);
        }

        {
            let p = player.read();
            self.callbacks.on_player_join(&p);
        }

        if player.read().is_spectator() {
            self.send_spectator_confirmation(player);
            return;
        }

        self.broadcast_new_player(player);
        let id = player.read().id;
        self.respawn_player(id);
    }

    pub fn respawn_player(&mut self, player_id: u8) {
        let Some(player) = self.game.players.get(player_id) else {
            return;
        };
        let team = player.read().team;
        if team > 1 {
            return;
        }

        let spawn_pos = self.game.spawn_position(team);
        player.write().respawn(spawn_pos);

        {
            let p = player.read();
            self.callbacks.on_player_spawn(&p);
        }

        let create = {
            let p = player.read();
            ironspade_common::protocol::CreatePlayer {
                player_id: p.id,
                weapon: p.weapon,
                team: ironspade_common::protocol::to_wire_team(p.team),
                position: spawn_pos,
                name: ironspade_common::strings::to_cp437_bytes(&p.name).unwrap_or_default(),
            }
        };
        self.broadcast(&create.encode(), true);
        self.send_weapon_reload(&player);
        self.broadcast_short_player_data(&player);
        self.send_player_properties(&player);
    }

    /// Apply server-computed damage. Returns true when the hit killed.
    pub fn damage_player(&mut self, player_id: u8, damage: u8, source: Vec3, damage_type: u8) -> bool {
        let Some(player) = self.game.players.get(player_id) else {
            return false;
        };

        let (killed, hp) = {
            let mut p = player.write();
            let killed = p.apply_damage(damage);
            (killed, p.hp)
        };

        {
            let p = player.read();
            self.callbacks.on_player_damage(&p, damage, source);
        }

        let hp_packet = SetHp {
            hp,
            damage_type,
            source,
        };
        let data = hp_packet.encode();
        self.send_to_player(&player, &data, true);
        self.send_player_properties(&player);

        if killed {
            let (has_intel, team, position) = {
                let p = player.read();
                (p.has_intel, p.team, p.position)
            };
            if has_intel && team <= 1 {
                let drop_pos = self.ground_intel_drop_position(position);
                let idx = self.game.contended_intel_index(team);
                self.game.drop_intel(idx, drop_pos);
                self.broadcast_intel_drop(idx, drop_pos);
                player.write().has_intel = false;
                log::info!("intel dropped on death: player {}", player_id);
            }

            let mut p = player.write();
            p.state = PlayerState::Dead;
            p.respawn_at =
                Some(Instant::now() + Duration::from_secs(self.config.server.respawn_time));
        }

        killed
    }

    pub fn handle_player_kill(&mut self, shooter_id: Option<u8>, victim: &PlayerRef, kill_type: KillType) {
        if let Some(id) = shooter_id {
            if let Some(shooter) = self.game.players.get(id) {
                shooter.write().kills += 1;
            }
        }

        {
            let shooter = shooter_id.and_then(|id| self.game.players.get(id));
            let victim_guard = victim.read();
            match &shooter {
                Some(s) => {
                    let s = s.read();
                    self.callbacks.on_player_kill(Some(&s), &victim_guard, kill_type);
                }
                None => self.callbacks.on_player_kill(None, &victim_guard, kill_type),
            }
        }

        let victim_id = victim.read().id;
        let killer_id = shooter_id.unwrap_or(victim_id);
        self.broadcast_kill_action(victim_id, killer_id, kill_type);

        self.check_win_condition_and_rotate();
    }

    pub fn handle_environment_kill(&mut self, victim: &PlayerRef, kill_type: KillType) {
        {
            let v = victim.read();
            self.callbacks.on_player_kill(None, &v, kill_type);
        }
        let id = victim.read().id;
        self.broadcast_kill_action(id, id, kill_type);
    }

    pub fn check_win_condition_and_rotate(&mut self) {
        let Some(winning_team) = self.mode.check_win_condition(&self.game) else {
            return;
        };
        self.game.reset_scores();
        let message = format!("{} team wins!", self.game.team_name(winning_team));
        self.broadcast_chat(&message, ChatType::System);

        if self.mode.should_rotate_map() {
            std::thread::sleep(WIN_ROTATE_DELAY);
            self.rotate_map();
        }
    }

    fn handle_time_limit_reached(&mut self) {
        let team1 = self.game.team_score(0);
        let team2 = self.game.team_score(1);

        let message = if team1 > team2 {
            format!("Time limit reached! {} team wins!", self.game.team_name(0))
        } else if team2 > team1 {
            format!("Time limit reached! {} team wins!", self.game.team_name(1))
        } else {
            "Time limit reached! It's a draw!".to_string()
        };
        log::info!("time limit reached: {} - {}", team1, team2);
        self.broadcast_chat(&message, ChatType::System);

        self.game.reset_scores();
        self.game.reset_intel();

        if self.mode.should_rotate_map() {
            std::thread::sleep(WIN_ROTATE_DELAY);
            self.rotate_map();
        }
    }

    // ============================================================
    // Environmental and objective checks (per alive player, per tick)
    // ============================================================

    fn check_water_damage(&mut self, player: &PlayerRef, now: Instant) {
        if !self.mode.env_hazards_enabled() {
            return;
        }
        let ext = &self.game.map_config.extensions;
        let water = &self.game.map_config.water;
        let (damage, level) = if let Some(damage) = ext.water_damage {
            (damage, 63.0)
        } else if water.enabled {
            (water.damage, water.level)
        } else {
            return;
        };
        if damage == 0 {
            return;
        }

        let (id, position, due) = {
            let p = player.read();
            let due = p
                .last_water_damage
                .map_or(true, |t| now.duration_since(t) >= ENV_DAMAGE_COOLDOWN);
            (p.id, p.position, due)
        };
        if position.z >= level && due {
            player.write().last_water_damage = Some(now);
            if self.damage_player(id, damage, position, 0) {
                self.handle_environment_kill(player, KillType::Fall);
            }
        }
    }

    fn check_boundary_damage(&mut self, player: &PlayerRef, now: Instant) {
        if !self.mode.env_hazards_enabled() {
            return;
        }
        let Some(boundary) = self.game.map_config.extensions.boundary_damage else {
            return;
        };

        let (id, position, due) = {
            let p = player.read();
            let due = p
                .last_boundary_damage
                .map_or(true, |t| now.duration_since(t) >= ENV_DAMAGE_COOLDOWN);
            (p.id, p.position, due)
        };

        let out_of_bounds = (position.x as i32) <= boundary.left
            || (position.x as i32) >= boundary.right
            || (position.y as i32) <= boundary.top
            || (position.y as i32) >= boundary.bottom;

        if out_of_bounds && due {
            player.write().last_boundary_damage = Some(now);
            if self.damage_player(id, boundary.damage, position, 0) {
                self.handle_environment_kill(player, KillType::Fall);
            }
        }
    }

    fn check_intel_pickup(&mut self, player: &PlayerRef) {
        if !self.mode.intel_enabled() {
            return;
        }
        let (id, team, has_intel, position) = {
            let p = player.read();
            (p.id, p.team, p.has_intel, p.position)
        };
        if has_intel || team > 1 {
            return;
        }

        let idx = self.game.contended_intel_index(team);
        let intel = &self.game.intel[idx];
        if intel.held {
            return;
        }
        let dist_sq = position.sub(intel.position).length_squared();
        if dist_sq > INTEL_PICKUP_DIST_SQ {
            return;
        }

        let allowed = {
            let p = player.read();
            self.callbacks.on_intel_pickup(&p, idx as u8)
        };
        if allowed && self.game.pickup_intel(id, team) {
            let data = IntelPickup { player_id: id }.encode();
            self.broadcast(&data, true);
            log::info!("intel picked up by player {} (team {})", id, team);
        }
    }

    fn is_near_base(&self, position: Vec3, team: u8) -> bool {
        let d = position.sub(self.game.base[team as usize]);
        d.length_squared() <= CAPTURE_DIST_SQ
    }

    fn check_intel_capture(&mut self, player: &PlayerRef) {
        if !self.mode.intel_enabled() {
            return;
        }
        let (id, team, has_intel, position) = {
            let p = player.read();
            (p.id, p.team, p.has_intel, p.position)
        };
        if !has_intel || team > 1 {
            return;
        }

        if self.mode.is_babel() {
            // Babel scores at either tent.
            for base_team in 0u8..2 {
                if self.is_near_base(position, base_team) {
                    let allowed = {
                        let p = player.read();
                        self.callbacks.on_intel_capture(&p, base_team)
                    };
                    if allowed && self.game.capture_intel(id, team) {
                        self.handle_capture_success(player);
                        return;
                    }
                }
            }
        } else {
            if !self.is_near_base(position, team) {
                return;
            }
            if !self.game.is_intel_at_base(team) {
                return;
            }
            let allowed = {
                let p = player.read();
                self.callbacks.on_intel_capture(&p, team)
            };
            if allowed && self.game.capture_intel(id, team) {
                self.handle_capture_success(player);
            }
        }
    }

    fn handle_capture_success(&mut self, player: &PlayerRef) {
        let (id, team, name) = {
            let p = player.read();
            (p.id, p.team, p.name.clone())
        };

        let winning_team = self.mode.check_win_condition(&self.game);
        let winning = u8::from(winning_team.is_some());

        let packet = ironspade_common::protocol::IntelCapture {
            player_id: id,
            winning,
        };
        self.broadcast(&packet.encode(), true);
        self.sync_intel_positions();

        // Babel and TC clients render the score on the territory HUD.
        if self.mode.is_babel() || self.mode.id() == GamemodeId::Tc {
            let capture = TerritoryCapture {
                player_id: id,
                entity_id: 0,
                winning: team,
                state: team,
            };
            self.broadcast(&capture.encode(), true);
            let progress = ProgressBar {
                entity_id: 0,
                capturing_team: team,
                rate: 0,
                progress: 1.0,
            };
            self.broadcast(&progress.encode(), true);
        }

        let score = self.game.team_score(team);
        log::info!(
            "intel captured: player {} team {} score {} winning {}",
            name,
            team,
            score,
            winning
        );

        if let Some(winning_team) = winning_team {
            self.game.reset_scores();
            let message = format!("{} team wins!", self.game.team_name(winning_team));
            self.broadcast_chat(&message, ChatType::System);

            if self.mode.should_rotate_map() {
                std::thread::sleep(WIN_ROTATE_DELAY);
                self.rotate_map();
            }
        }
    }

    fn check_restock(&mut self, player: &PlayerRef, now: Instant) {
        let (id, team, position, due, needs) = {
            let p = player.read();
            let due = p
                .last_restock
                .map_or(true, |t| now.duration_since(t) >= RESTOCK_COOLDOWN);
            (p.id, p.team, p.position, due, p.needs_restock())
        };
        if team > 1 || !due {
            return;
        }

        let base = self.game.base[team as usize];
        let dx = (position.x - base.x).abs();
        let dy = (position.y - base.y).abs();
        let dz = (position.z - base.z).abs();
        if dx >= RESTOCK_RADIUS || dy >= RESTOCK_RADIUS || dz >= RESTOCK_RADIUS {
            return;
        }

        if needs {
            {
                let mut p = player.write();
                p.restock();
                p.last_restock = Some(now);
            }
            {
                let p = player.read();
                self.callbacks.on_restock(&p);
            }
            self.broadcast_restock(id);
            self.send_player_properties(player);
        }
    }

    /// Dropped intel settles on the ground under the drop point.
    pub fn ground_intel_drop_position(&self, position: Vec3) -> Vec3 {
        let x = (position.x as i32).clamp(0, self.game.map.width() as i32 - 1);
        let y = (position.y as i32).clamp(0, self.game.map.height() as i32 - 1);
        let ground_z = self.game.map.find_ground_level(x, y);
        Vec3::new(x as f32 + 0.5, y as f32 + 0.5, ground_z as f32)
    }

    // ============================================================
    // Grenades
    // ============================================================

    fn update_grenades(&mut self, dt: f32) {
        let now = self.game_time() as f64;

        let mut exploded: Vec<Grenade> = Vec::new();
        let mut keep: Vec<Grenade> = Vec::with_capacity(self.game.grenades.len());
        for mut grenade in std::mem::take(&mut self.game.grenades) {
            if grenade.expired(now) {
                exploded.push(grenade);
                continue;
            }
            move_grenade(
                &self.game.map,
                &mut grenade.position,
                &mut grenade.velocity,
                dt,
            );
            keep.push(grenade);
        }
        self.game.grenades = keep;

        for grenade in exploded {
            self.explode_grenade(&grenade);
        }
    }

    fn explode_grenade(&mut self, grenade: &Grenade) {
        // Deep grenades fizzle without terrain damage.
        if grenade.position.z >= GRENADE_FLOOR_Z {
            return;
        }

        let gx = grenade.position.x as i32;
        let gy = grenade.position.y as i32;
        let gz = grenade.position.z as i32;

        let mut destroyed: Vec<Vec3i> = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let (bx, by, bz) = (gx + dx, gy + dy, gz + dz);
                    if bz >= 62 {
                        continue;
                    }
                    if self.game.map.is_inside(bx, by, bz) && self.game.map.is_solid(bx, by, bz) {
                        destroyed.push(Vec3i::new(bx, by, bz));
                    }
                }
            }
        }

        for player in self.game.players.snapshot() {
            let (id, alive, position) = {
                let p = player.read();
                (p.id, p.alive, p.position)
            };
            if !alive {
                continue;
            }

            let d = position.sub(grenade.position);
            if d.x.abs() >= 16.0 || d.y.abs() >= 16.0 || d.z.abs() >= 16.0 {
                continue;
            }

            let dist_sq = d.length_squared();
            let damage = if dist_sq < 1e-6 {
                100.0
            } else {
                if !weapons::can_see(&self.game.map, grenade.position, position) {
                    continue;
                }
                (4096.0 / dist_sq).min(100.0)
            };

            if self.damage_player(id, damage as u8, grenade.position, 1) {
                if self.game.players.contains(grenade.thrower) {
                    self.handle_player_kill(Some(grenade.thrower), &player, KillType::Grenade);
                } else {
                    self.handle_environment_kill(&player, KillType::Grenade);
                }
            }
        }

        for block in destroyed {
            self.game.map.set_air(block.x, block.y, block.z);
            let packet = BlockAction {
                player_id: grenade.thrower,
                action: BlockActionType::GrenadeDestroy,
                x: block.x,
                y: block.y,
                z: block.z,
            };
            self.broadcast(&packet.encode(), true);
        }
    }
}
