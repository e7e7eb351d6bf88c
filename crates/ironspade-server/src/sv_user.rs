// sv_user.rs — client packet handlers and hit validation
//
// Every client frame lands in handle_packet: rate limiting first, then
// per-type dispatch. Malformed frames are dropped (debug log at most);
// impossible claims are rejected and the peer keeps playing.

use crate::rate_limit::{self, RateDecision};
use crate::server::Server;
use ironspade_common::protocol::{
    self, packet_type, BlockAction, BlockActionType, BlockLine, ChangeTeam, ChangeWeapon,
    ChatMessage, ChatType, ExtensionInfo, GrenadePacket, HandshakeReturn, HitPacket, HitType,
    InputData, ItemType, KillType, SetColor, SetTool, Vec3, VersionResponse, WeaponInputData,
    WeaponReload, WeaponType,
};
use ironspade_common::strings;
use ironspade_common::validation;
use ironspade_game::grenade::Grenade;
use ironspade_game::player::{PeerHandle, PlayerRef, PlayerState};
use ironspade_game::pmove;
use ironspade_game::weapons;
use std::time::Instant;

/// Rolling block-placement quota: four placements per 100 ms window.
const BLOCK_PLACE_QUOTA: u32 = 4;
/// Rolling destruction quota: eight removals per 100 ms window.
const BLOCK_DESTROY_QUOTA: u32 = 8;
const BLOCK_QUOTA_WINDOW_MS: u64 = 100;

const MAX_BLOCK_LINE_LEN: i32 = 64;
const SHOT_MAX_RANGE: f32 = 128.0;
/// View-cone tolerance for client-claimed hits; generous so lag never
/// rejects honest shots.
const HIT_CLAIM_TOLERANCE: f32 = 3.0;

impl Server {
    pub fn handle_packet(&mut self, peer: PeerHandle, data: &[u8]) {
        let Ok(tag) = protocol::frame_type(data) else {
            return;
        };
        let Some(player) = self.game.players.get_by_peer(peer) else {
            return;
        };

        let decision = {
            let mut p = player.write();
            rate_limit::check(&mut p, &self.config.rate_limit, tag, Instant::now())
        };
        match decision {
            RateDecision::Allow => {}
            RateDecision::Drop => return,
            RateDecision::Kick => {
                log::warn!(
                    "disconnecting player {} for rate limit violations",
                    player.read().id
                );
                self.net
                    .disconnect_later(peer, protocol::disconnect_reason::UNDEFINED);
                return;
            }
        }

        match tag {
            packet_type::POSITION_DATA => self.handle_position_data(&player, data),
            packet_type::ORIENTATION_DATA => self.handle_orientation_data(&player, data),
            packet_type::INPUT_DATA => self.handle_input_data(&player, data),
            packet_type::WEAPON_INPUT => self.handle_weapon_input(&player, data),
            packet_type::HIT => self.handle_hit(&player, data),
            packet_type::GRENADE => self.handle_grenade(&player, data),
            packet_type::SET_TOOL => self.handle_set_tool(&player, data),
            packet_type::SET_COLOR => self.handle_set_color(&player, data),
            packet_type::EXISTING_PLAYER => self.handle_existing_player(&player, data),
            packet_type::BLOCK_ACTION => self.handle_block_action(&player, data),
            packet_type::BLOCK_LINE => self.handle_block_line(&player, data),
            packet_type::CHAT_MESSAGE => self.handle_chat_message(&player, data),
            packet_type::WEAPON_RELOAD => self.handle_weapon_reload(&player),
            packet_type::CHANGE_TEAM => self.handle_change_team(&player, data),
            packet_type::CHANGE_WEAPON => self.handle_change_weapon(&player, data),
            packet_type::HANDSHAKE_RETURN => self.handle_handshake_return(&player, data),
            packet_type::VERSION_RESPONSE => self.handle_version_response(&player, data),
            packet_type::EXTENSION_INFO => self.handle_extension_info(&player, data),
            other => {
                log::warn!(
                    "unhandled packet from player {}: type {} len {}",
                    player.read().id,
                    other,
                    data.len()
                );
            }
        }
    }

    // ============================================================
    // Movement telemetry
    // ============================================================

    fn handle_position_data(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = protocol::PositionData::decode(data) else {
            return;
        };
        if !validation::is_valid_position(packet.position) {
            log::debug!(
                "player {} reported invalid position ({}, {}, {})",
                player.read().id,
                packet.position.x,
                packet.position.y,
                packet.position.z
            );
            return;
        }
        let mut p = player.write();
        p.position = packet.position;
        p.eye_pos = packet.position;
        p.velocity = Vec3::default();
    }

    fn handle_orientation_data(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = protocol::OrientationData::decode(data) else {
            return;
        };
        if !validation::is_valid_orientation(packet.orientation) {
            return;
        }
        player.write().orientation = packet.orientation;
    }

    fn handle_input_data(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = InputData::decode(data) else {
            return;
        };
        let echo = {
            let key_state = packet.key_states;
            let mut p = player.write();
            p.key_states = key_state;
            p.jumping = key_state & protocol::key_state::JUMP != 0;
            p.sneaking = key_state & protocol::key_state::SNEAK != 0;
            p.sprinting = key_state & protocol::key_state::SPRINT != 0;

            let wants_crouch = key_state & protocol::key_state::CROUCH != 0;
            if wants_crouch {
                p.crouching = true;
            } else if p.crouching {
                // Standing up needs headroom.
                if pmove::try_uncrouch(&mut p, &self.game.map) {
                    p.crouching = false;
                }
            }

            InputData {
                player_id: p.id,
                key_states: packet.key_states,
            }
        };
        let data = echo.encode();
        self.broadcast_except(echo.player_id, &data, false);
    }

    fn handle_weapon_input(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = WeaponInputData::decode(data) else {
            return;
        };
        let (id, fire) = {
            let mut p = player.write();
            p.primary_fire = packet.weapon_input & protocol::weapon_input::PRIMARY != 0;
            p.secondary_fire = packet.weapon_input & protocol::weapon_input::SECONDARY != 0;
            (p.id, p.primary_fire)
        };
        let echo = WeaponInputData {
            player_id: id,
            weapon_input: packet.weapon_input,
        };
        let data = echo.encode();
        self.broadcast_except(id, &data, false);

        if fire && player.read().can_shoot(Instant::now()) {
            self.handle_shot(player);
        }
    }

    // ============================================================
    // Server-side hit-scan
    // ============================================================

    fn handle_shot(&mut self, player: &PlayerRef) {
        if !player.write().shoot(Instant::now()) {
            return;
        }
        {
            let p = player.read();
            self.callbacks.on_weapon_fire(&p);
        }

        let (position, orientation, weapon) = {
            let p = player.read();
            (p.position, p.orientation, p.weapon)
        };
        let eye_pos = Vec3::new(position.x, position.y, position.z - 0.3);

        let pellets = protocol::pellet_count(weapon);
        let spread: f32 = if weapon == WeaponType::Shotgun { 0.05 } else { 0.01 };

        for i in 0..pellets {
            let mut direction = orientation;
            if spread > 0.0 && pellets > 1 {
                direction.x += ((i % 3) as f32 - 1.0) * spread;
                direction.y += ((i / 3) as f32 - 1.0) * spread;
                if let Some(unit) = direction.normalized() {
                    direction = unit;
                }
            }
            self.process_shot(player, eye_pos, direction);
        }
    }

    fn is_valid_target(&self, shooter: &PlayerRef, target: &PlayerRef) -> bool {
        let s = shooter.read();
        let t = target.read();
        t.id != s.id && t.alive && t.team != s.team
    }

    fn check_player_hit(
        &self,
        eye_pos: Vec3,
        direction: Vec3,
        target: &PlayerRef,
        max_distance: f32,
    ) -> Option<(f32, HitType)> {
        let target_pos = target.read().position;
        let to_target = target_pos.sub(eye_pos);
        let distance = to_target.length();
        if distance > max_distance {
            return None;
        }

        let dot = direction.dot(to_target);
        if dot < 0.0 {
            return None;
        }

        let closest = eye_pos.add(direction.scale(dot));
        if closest.sub(target_pos).length() > weapons::HIT_TOLERANCE {
            return None;
        }

        Some((distance, weapons::classify_hit(closest, target_pos)))
    }

    fn find_closest_player_hit(
        &self,
        shooter: &PlayerRef,
        eye_pos: Vec3,
        direction: Vec3,
        max_range: f32,
    ) -> Option<(PlayerRef, HitType, f32)> {
        let mut closest: Option<(PlayerRef, HitType, f32)> = None;
        let mut closest_distance = max_range;

        for target in self.game.players.snapshot() {
            if target.read().state == PlayerState::Disconnected {
                continue;
            }
            if !self.is_valid_target(shooter, &target) {
                continue;
            }
            if let Some((distance, hit_type)) =
                self.check_player_hit(eye_pos, direction, &target, closest_distance)
            {
                closest_distance = distance;
                closest = Some((target, hit_type, distance));
            }
        }
        closest
    }

    fn process_shot(&mut self, shooter: &PlayerRef, eye_pos: Vec3, direction: Vec3) {
        let player_hit =
            self.find_closest_player_hit(shooter, eye_pos, direction, SHOT_MAX_RANGE);
        let terrain_hit = weapons::raycast(&self.game.map, eye_pos, direction, SHOT_MAX_RANGE);

        if let Some((target, hit_type, _)) = player_hit {
            let target_pos = target.read().position;
            let player_distance = target_pos.sub(eye_pos).length();
            let terrain_closer = terrain_hit
                .as_ref()
                .map_or(false, |hit| hit.position.sub(eye_pos).length() <= player_distance);

            if !terrain_closer {
                let weapon = shooter.read().weapon;
                let damage = weapons::damage_for(weapon, hit_type);
                let target_id = target.read().id;
                if self.damage_player(target_id, damage, eye_pos, 1) {
                    let kill_type = if hit_type == HitType::Head {
                        KillType::Headshot
                    } else {
                        KillType::Weapon
                    };
                    let shooter_id = shooter.read().id;
                    self.handle_player_kill(Some(shooter_id), &target, kill_type);
                }
                return;
            }
        }

        if let Some(hit) = terrain_hit {
            let shooter_id = shooter.read().id;
            self.game.map.set_air(hit.block.x, hit.block.y, hit.block.z);
            let packet = BlockAction {
                player_id: shooter_id,
                action: BlockActionType::SpadeGunDestroy,
                x: hit.block.x,
                y: hit.block.y,
                z: hit.block.z,
            };
            self.broadcast(&packet.encode(), true);
        }
    }

    // ============================================================
    // Client-claimed hits
    // ============================================================

    fn validate_weapon_state(&self, player: &PlayerRef, hit_type: HitType) -> bool {
        let p = player.read();
        if hit_type == HitType::Melee {
            if p.tool != ItemType::Spade {
                log::warn!("melee hit with wrong tool: player {} tool {:?}", p.name, p.tool);
                return false;
            }
            return true;
        }
        if p.tool != ItemType::Gun {
            log::warn!("weapon hit with wrong tool: player {} tool {:?}", p.name, p.tool);
            return false;
        }
        if p.reloading {
            log::warn!("hit while reloading: player {}", p.name);
            return false;
        }
        if p.magazine_ammo == 0 {
            log::warn!("hit with no ammo: player {}", p.name);
            return false;
        }
        true
    }

    fn validate_weapon_range(
        &self,
        player: &PlayerRef,
        weapon: WeaponType,
        position: Vec3,
        target_pos: Vec3,
        distance: f32,
    ) -> bool {
        if !validation::is_weapon_in_range(weapon, distance) {
            log::warn!(
                "weapon range exceeded: player {} distance {:.1} weapon {:?}",
                player.read().name,
                distance,
                weapon
            );
            return false;
        }

        // Eye-to-eye line of sight through the terrain.
        let eye = Vec3::new(position.x, position.y, position.z + 1.0);
        let target_eye = Vec3::new(target_pos.x, target_pos.y, target_pos.z + 1.0);
        let direction = target_eye.sub(eye);
        if weapons::raycast(&self.game.map, eye, direction, distance).is_some() {
            log::debug!("hit blocked by terrain: player {}", player.read().name);
            return false;
        }
        true
    }

    fn handle_hit(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = HitPacket::decode(data) else {
            return;
        };
        let Some(target) = self.game.players.get(packet.target_id) else {
            return;
        };

        {
            let p = player.read();
            let t = target.read();
            if !t.alive || !p.alive {
                return;
            }
            if t.team == p.team && t.id != p.id {
                return;
            }
        }

        if !self.validate_weapon_state(player, packet.hit_type) {
            return;
        }

        let (position, orientation, weapon) = {
            let p = player.read();
            (p.position, p.orientation, p.weapon)
        };
        let target_pos = target.read().position;
        let distance = target_pos.sub(position).length();

        if packet.hit_type == HitType::Melee {
            if !validation::is_melee_in_range(distance) {
                log::warn!(
                    "melee range exceeded: player {} distance {:.1}",
                    player.read().name,
                    distance
                );
                return;
            }
        } else {
            if !self.validate_weapon_range(player, weapon, position, target_pos, distance) {
                return;
            }
            // The shooter must actually be looking at the target.
            if !weapons::validate_hit(position, target_pos, orientation, HIT_CLAIM_TOLERANCE) {
                log::warn!(
                    "hit claim outside view tolerance: player {} target {}",
                    player.read().name,
                    packet.target_id
                );
                return;
            }
        }

        let damage = weapons::damage_for(weapon, packet.hit_type);
        if self.damage_player(packet.target_id, damage, position, 1) {
            let kill_type = if packet.hit_type == HitType::Head {
                KillType::Headshot
            } else {
                KillType::Weapon
            };
            let shooter_id = player.read().id;
            self.handle_player_kill(Some(shooter_id), &target, kill_type);
        }
    }

    // ============================================================
    // Tools, colours, grenades
    // ============================================================

    fn handle_set_tool(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = SetTool::decode(data) else {
            return;
        };
        let (id, cancelled_reload) = {
            let mut p = player.write();
            let was_reloading = p.reloading && p.tool == ItemType::Gun;
            p.tool = packet.tool;
            let cancelled = was_reloading && packet.tool != ItemType::Gun;
            if cancelled {
                p.reloading = false;
                p.reload_done_at = None;
            }
            (p.id, cancelled)
        };

        if cancelled_reload {
            self.send_weapon_reload(player);
        }

        let echo = SetTool {
            player_id: id,
            tool: packet.tool,
        };
        let data = echo.encode();
        self.broadcast_except(id, &data, true);
    }

    fn handle_set_color(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = SetColor::decode(data) else {
            return;
        };
        let id = {
            let mut p = player.write();
            p.color = packet.color;
            p.id
        };
        let echo = SetColor {
            player_id: id,
            color: packet.color,
        };
        let data = echo.encode();
        self.broadcast_except(id, &data, true);
    }

    fn handle_grenade(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = GrenadePacket::decode(data) else {
            return;
        };
        if !validation::is_valid_position(packet.position) {
            return;
        }

        let id = {
            let mut p = player.write();
            if p.grenades == 0 {
                return;
            }
            p.grenades -= 1;
            p.id
        };

        {
            let p = player.read();
            self.callbacks.on_grenade_toss(&p);
        }

        self.game.grenades.push(Grenade {
            position: packet.position,
            velocity: packet.velocity,
            fuse_length: packet.fuse_length,
            created_at: self.game_time() as f64,
            thrower: id,
        });

        let echo = GrenadePacket {
            player_id: id,
            ..packet
        };
        let data = echo.encode();
        self.broadcast_except(id, &data, true);
    }

    // ============================================================
    // Joining
    // ============================================================

    fn handle_existing_player(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = protocol::ExistingPlayer::decode(data) else {
            log::warn!("undersized ExistingPlayer from player {}", player.read().id);
            return;
        };

        let (id, state, current_team, handshake_failed) = {
            let p = player.read();
            (p.id, p.state, p.team, p.handshake_failed)
        };

        if state != PlayerState::WaitingForExistingPlayer
            && current_team != protocol::SPECTATOR_TEAM
        {
            log::warn!(
                "ExistingPlayer in wrong state: player {} state {:?}",
                id,
                state
            );
            return;
        }
        if handshake_failed {
            log::warn!("refusing join for player {}: handshake mismatch", id);
            return;
        }

        let Some(team) = protocol::to_internal_team(packet.team) else {
            log::warn!("invalid team in ExistingPlayer: player {} team {}", id, packet.team);
            return;
        };

        let mut name = strings::name_from_cp437(&packet.name);
        if name.is_empty() {
            name = "Deuce".to_string();
        }

        if let Some(ban) = self.bans.is_banned_name(&name) {
            log::info!("banned name attempted to join: {} ({})", name, ban.reason);
            let peer = player.read().peer;
            self.net
                .disconnect_now(peer, protocol::disconnect_reason::BANNED);
            return;
        }

        {
            let mut p = player.write();
            p.team = team;
            p.set_weapon(packet.weapon);
            p.name = name.clone();
            p.tool = packet.item;
            p.color = packet.color;
            p.state = PlayerState::Ready;
            p.has_intel = false;
        }

        log::info!("player joined: id {} name {:?} team {}", id, name, team);
        self.finalize_player_join(player);
    }

    // ============================================================
    // Blocks
    // ============================================================

    fn handle_block_action(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = BlockAction::decode(data) else {
            return;
        };
        let (x, y, z) = (packet.x, packet.y, packet.z);
        if !self.game.map.is_inside(x, y, z) {
            return;
        }
        let id = player.read().id;
        let now = Instant::now();

        if packet.action == BlockActionType::Build {
            if z >= self.game.map.depth() as i32 - 2 {
                return;
            }
            if !self.game.map.has_neighbors(x, y, z) {
                return;
            }

            let allowed = {
                let mut p = player.write();
                if p
                    .last_block_place
                    .map_or(true, |t| now.duration_since(t).as_millis() as u64 >= BLOCK_QUOTA_WINDOW_MS)
                {
                    p.block_place_quota = BLOCK_PLACE_QUOTA;
                    p.last_block_place = Some(now);
                }
                if p.block_place_quota == 0 {
                    log::warn!("block place rate exceeded: player {}", p.name);
                    false
                } else {
                    p.block_place_quota -= 1;
                    true
                }
            };
            if !allowed {
                return;
            }

            let veto = {
                let p = player.read();
                !self.callbacks.on_block_place(&p, x, y, z)
            };
            if veto {
                return;
            }

            let color = {
                let mut p = player.write();
                if p.blocks == 0 {
                    return;
                }
                p.blocks -= 1;
                p.color
            };

            self.game.map.set(x, y, z, color.to_rgb_u32());
            let echo = BlockAction {
                player_id: id,
                ..packet
            };
            self.broadcast(&echo.encode(), true);
            return;
        }

        // Destruction variants share a quota window.
        let allowed = {
            let mut p = player.write();
            if p
                .last_block_destroy
                .map_or(true, |t| now.duration_since(t).as_millis() as u64 >= BLOCK_QUOTA_WINDOW_MS)
            {
                p.block_destroy_quota = BLOCK_DESTROY_QUOTA;
                p.last_block_destroy = Some(now);
            }
            if p.block_destroy_quota == 0 {
                log::warn!("block destroy rate exceeded: player {}", p.name);
                false
            } else {
                p.block_destroy_quota -= 1;
                true
            }
        };
        if !allowed {
            return;
        }

        let veto = {
            let p = player.read();
            !self.callbacks.on_block_destroy(&p, x, y, z)
        };
        if veto {
            return;
        }

        match packet.action {
            BlockActionType::SpadeGunDestroy => {
                if self.game.map.is_solid(x, y, z) {
                    let mut p = player.write();
                    if p.blocks < protocol::MAX_BLOCKS {
                        p.blocks += 1;
                    }
                }
                self.game.map.set_air(x, y, z);
            }
            BlockActionType::SpadeSecondaryDestroy => {
                // Three-block column; the refund matches what actually
                // existed.
                let mut refund = 0;
                for dz in [-1, 0, 1] {
                    if self.game.map.is_solid(x, y, z + dz) {
                        refund += 1;
                    }
                }
                {
                    let mut p = player.write();
                    for _ in 0..refund {
                        if p.blocks < protocol::MAX_BLOCKS {
                            p.blocks += 1;
                        }
                    }
                }
                for dz in [-1, 0, 1] {
                    self.game.map.set_air(x, y, z + dz);
                }
            }
            BlockActionType::GrenadeDestroy | BlockActionType::Build => {
                self.game.map.set_air(x, y, z);
            }
        }

        let echo = BlockAction {
            player_id: id,
            ..packet
        };
        self.broadcast(&echo.encode(), true);
    }

    fn handle_block_line(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = BlockLine::decode(data) else {
            return;
        };
        let (x1, y1, z1) = (
            packet.start.0 as i32,
            packet.start.1 as i32,
            packet.start.2 as i32,
        );
        let (x2, y2, z2) = (packet.end.0 as i32, packet.end.1 as i32, packet.end.2 as i32);

        if !self.game.map.is_inside(x1, y1, z1) || !self.game.map.is_inside(x2, y2, z2) {
            return;
        }
        let floor = self.game.map.depth() as i32 - 2;
        if z1 >= floor || z2 >= floor {
            return;
        }
        if !self.game.map.has_neighbors(x1, y1, z1) || !self.game.map.has_neighbors(x2, y2, z2) {
            return;
        }

        let steps = (x2 - x1).abs().max((y2 - y1).abs()).max((z2 - z1).abs());
        if steps > MAX_BLOCK_LINE_LEN {
            log::warn!(
                "block line too long: player {} length {}",
                player.read().name,
                steps
            );
            return;
        }
        let blocks_needed = (steps + 1) as u8;

        let (id, color) = {
            let mut p = player.write();
            if p.blocks < blocks_needed {
                return;
            }
            p.blocks -= blocks_needed;
            (p.id, p.color)
        };
        let color = color.to_rgb_u32();

        if steps == 0 {
            self.game.map.set(x1, y1, z1, color);
        } else {
            for i in 0..=steps {
                let x = x1 + (x2 - x1) * i / steps;
                let y = y1 + (y2 - y1) * i / steps;
                let z = z1 + (z2 - z1) * i / steps;
                self.game.map.set(x, y, z, color);
            }
        }

        let echo = BlockLine {
            player_id: id,
            ..packet
        };
        self.broadcast(&echo.encode(), true);
    }

    // ============================================================
    // Chat
    // ============================================================

    fn handle_chat_message(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = ChatMessage::decode(data) else {
            return;
        };
        let message = strings::from_cp437_bytes(&packet.message);
        let message = message.trim();
        if message.is_empty() {
            return;
        }

        let (id, name, muted, team) = {
            let p = player.read();
            (p.id, p.name.clone(), p.muted, p.team)
        };
        log::info!("chat: {} ({}): {}", name, id, message);

        if muted {
            self.send_chat_to_player(player, "You are muted and cannot send messages.");
            return;
        }

        if self.handle_command(player, message) {
            return;
        }

        let allowed = {
            let p = player.read();
            self.callbacks.on_chat_message(&p, message)
        };
        if !allowed {
            return;
        }

        let echo = ChatMessage {
            player_id: id,
            chat_type: packet.chat_type,
            message: packet.message.clone(),
        };
        let data = echo.encode();

        if packet.chat_type == ChatType::Team {
            for other in self.game.players.snapshot() {
                let (peer, other_team, state) = {
                    let o = other.read();
                    (o.peer, o.team, o.state)
                };
                if other_team == team && state == PlayerState::Ready {
                    self.send_to_peer(peer, &data, true);
                }
            }
        } else {
            self.broadcast(&data, true);
        }
    }

    // ============================================================
    // Loadout changes
    // ============================================================

    fn handle_weapon_reload(&mut self, player: &PlayerRef) {
        let started = player.write().start_reload(Instant::now());
        if !started {
            return;
        }
        let packet = {
            let p = player.read();
            WeaponReload {
                player_id: p.id,
                magazine_ammo: p.magazine_ammo,
                reserve_ammo: p.reserve_ammo,
            }
        };
        let id = packet.player_id;
        let data = packet.encode();
        self.broadcast_except(id, &data, true);
    }

    fn handle_change_team(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = ChangeTeam::decode(data) else {
            return;
        };
        let Some(team) = protocol::to_internal_team(packet.team) else {
            log::warn!(
                "invalid team change request: player {} team {}",
                player.read().id,
                packet.team
            );
            return;
        };
        self.change_player_team(player, team);
    }

    pub fn change_player_team(&mut self, player: &PlayerRef, team: u8) {
        let (id, current_team) = {
            let p = player.read();
            (p.id, p.team)
        };
        if current_team == team {
            return;
        }

        let (dropped_intel, drop_pos) = {
            let mut p = player.write();
            let dropped = p.has_intel && current_team <= 1;
            let pos = p.position;
            p.has_intel = false;
            p.team = team;
            if team == protocol::SPECTATOR_TEAM {
                p.alive = false;
            }
            p.state = PlayerState::Ready;
            (dropped, pos)
        };

        if dropped_intel {
            let idx = self.game.contended_intel_index(current_team);
            self.game.drop_intel(idx, drop_pos);
            self.broadcast_intel_drop(idx, drop_pos);
        }

        if team <= 1 {
            let packet = ChangeTeam {
                player_id: id,
                team: protocol::to_wire_team(team),
            };
            self.broadcast(&packet.encode(), true);
            self.respawn_player(id);
            return;
        }

        // Moving to spectator: vanish from combatants, confirm the new
        // identity privately.
        self.broadcast_player_left_except(id, id);
        self.broadcast_short_player_data(player);
        self.send_spectator_confirmation(player);
    }

    fn handle_change_weapon(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = ChangeWeapon::decode(data) else {
            return;
        };
        let id = {
            let mut p = player.write();
            p.set_weapon(packet.weapon);
            p.id
        };
        self.respawn_player(id);
        self.broadcast_short_player_data(player);
    }

    // ============================================================
    // Handshake / version / extensions
    // ============================================================

    fn handle_handshake_return(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = HandshakeReturn::decode(data) else {
            log::warn!("invalid handshake return packet");
            return;
        };
        let mut p = player.write();
        if p.handshake_challenge == 0 || packet.challenge != p.handshake_challenge {
            p.handshake_failed = true;
            log::warn!(
                "handshake challenge mismatch: player {} ({:?}) sent {:#x}",
                p.id,
                p.name,
                packet.challenge
            );
            return;
        }
        p.handshake_complete = true;
        log::debug!("handshake verified: player {}", p.id);
    }

    fn handle_version_response(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = VersionResponse::decode(data) else {
            log::warn!("invalid version response packet");
            return;
        };

        {
            let mut p = player.write();
            p.version_info_received = true;
            p.client_identifier = packet.client_identifier;
            p.version = (packet.major, packet.minor, packet.revision);
            if !packet.os_info.is_empty() {
                p.os_info = packet.os_info.clone();
            }
            log::debug!(
                "client version: player {} client {} v{}.{}.{} os {:?}",
                p.id,
                packet.client_identifier as char,
                packet.major,
                packet.minor,
                packet.revision,
                p.os_info
            );
        }

        // OpenSpades above 0.1.3 and BetterSpades understand the
        // extension handshake.
        let supports_extensions = match packet.client_identifier {
            b'o' => {
                packet.major > 0
                    || (packet.major == 0 && packet.minor > 1)
                    || (packet.major == 0 && packet.minor == 1 && packet.revision > 3)
            }
            b'B' => true,
            _ => false,
        };

        if supports_extensions {
            self.send_extension_info(player);
        } else {
            log::debug!(
                "client does not support extensions: player {}",
                player.read().id
            );
        }
    }

    fn handle_extension_info(&mut self, player: &PlayerRef, data: &[u8]) {
        let Ok(packet) = ExtensionInfo::decode(data) else {
            log::warn!("invalid extension info packet");
            return;
        };
        let mut p = player.write();
        for entry in &packet.entries {
            p.add_extension(entry.extension_id, entry.version);
        }
        log::info!(
            "client extensions registered: player {} count {}",
            p.id,
            packet.entries.len()
        );
    }
}
