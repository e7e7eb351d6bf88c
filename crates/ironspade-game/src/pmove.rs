// pmove.rs — player movement against the voxel field
//
// 60 Hz box-clip integration: input acceleration scaled by a stance
// modifier table, X and Y advanced separately with an optional one-block
// climb, then the vertical axis with gravity. Landing classification
// feeds fall damage.

use crate::player::Player;
use ironspade_common::protocol::{key_state, ItemType, Vec3};
use ironspade_common::vxl::VxlMap;

pub const PLAYER_RADIUS: f32 = 0.45;
pub const PLAYER_EYE_HEIGHT: f32 = 0.9;
pub const PLAYER_CROUCH_EYE: f32 = 0.45;
pub const JUMP_VELOCITY: f32 = -0.36;
const DIAGONAL_FACTOR: f32 = 0.707_106_78;

pub const FALL_SLOWDOWN_VEL: f32 = 0.24;
pub const FALL_DAMAGE_VEL: f32 = 0.58;
pub const FALL_DAMAGE_SCALAR: f32 = 4096.0;
const MAX_VERTICAL_VELOCITY: f32 = 3.0;

/// Landing outcome of one movement step.
/// Positive: fall damage to apply. -1: soft landing. 0: nothing.
pub type FallResult = i8;

/// Cell solidity for the collision hull: the bottom layer clamps to the
/// one above it, outside the map in XY is solid, above the sky is air.
fn clip_box(map: &VxlMap, x: f32, y: f32, z: f32) -> bool {
    let ix = x as i32;
    let iy = y as i32;
    let mut iz = z as i32;

    if ix < 0 || ix >= map.width() as i32 || iy < 0 || iy >= map.height() as i32 {
        return true;
    }
    if iz < 0 {
        return false;
    }
    if iz == map.depth() as i32 - 1 {
        iz = map.depth() as i32 - 2;
    } else if iz >= map.depth() as i32 {
        return true;
    }
    map.is_solid(ix, iy, iz)
}

fn check_axis_collision(
    map: &VxlMap,
    coord1: f32,
    coord2_a: f32,
    coord2_b: f32,
    nz: f32,
    body_height: f32,
) -> bool {
    let mut z = body_height;
    while z >= -1.36 {
        if clip_box(map, coord1, coord2_a, nz + z) || clip_box(map, coord1, coord2_b, nz + z) {
            return true;
        }
        z -= 0.9;
    }
    false
}

fn check_axis_climb_collision(
    map: &VxlMap,
    coord1: f32,
    coord2_a: f32,
    coord2_b: f32,
    nz: f32,
) -> bool {
    let mut z = 0.35;
    while z >= -2.36 {
        if clip_box(map, coord1, coord2_a, nz + z) || clip_box(map, coord1, coord2_b, nz + z) {
            return true;
        }
        z -= 0.9;
    }
    false
}

fn check_vertical_collision(map: &VxlMap, pos: Vec3, nz: f32, body_height: f32) -> bool {
    clip_box(map, pos.x - PLAYER_RADIUS, pos.y - PLAYER_RADIUS, nz + body_height)
        || clip_box(map, pos.x - PLAYER_RADIUS, pos.y + PLAYER_RADIUS, nz + body_height)
        || clip_box(map, pos.x + PLAYER_RADIUS, pos.y - PLAYER_RADIUS, nz + body_height)
        || clip_box(map, pos.x + PLAYER_RADIUS, pos.y + PLAYER_RADIUS, nz + body_height)
}

struct BoxClipResult {
    pos: Vec3,
    vel: Vec3,
    last_climb: f32,
    airborne: bool,
    wade: bool,
}

#[allow(clippy::too_many_arguments)]
fn box_clip_move(
    map: &VxlMap,
    mut pos: Vec3,
    mut vel: Vec3,
    dt: f32,
    eye_height: f32,
    mut body_height: f32,
    crouching: bool,
    sprinting: bool,
    orient_z: f32,
    mut last_climb: f32,
    game_time: f32,
) -> BoxClipResult {
    let f = dt * 32.0;
    let nx = f * vel.x + pos.x;
    let ny = f * vel.y + pos.y;
    let mut nz = pos.z + eye_height;

    let mut climb = false;
    let can_climb = !crouching && orient_z < 0.5 && !sprinting;

    let x_dir = if vel.x >= 0.0 { PLAYER_RADIUS } else { -PLAYER_RADIUS };
    let collision_x = check_axis_collision(
        map,
        nx + x_dir,
        pos.y - PLAYER_RADIUS,
        pos.y + PLAYER_RADIUS,
        nz,
        body_height,
    );
    if !collision_x {
        pos.x = nx;
    } else if can_climb
        && !check_axis_climb_collision(map, nx + x_dir, pos.y - PLAYER_RADIUS, pos.y + PLAYER_RADIUS, nz)
    {
        pos.x = nx;
        climb = true;
    } else {
        vel.x = 0.0;
    }

    let y_dir = if vel.y >= 0.0 { PLAYER_RADIUS } else { -PLAYER_RADIUS };
    let collision_y = check_axis_collision(
        map,
        ny + y_dir,
        pos.x - PLAYER_RADIUS,
        pos.x + PLAYER_RADIUS,
        nz,
        body_height,
    );
    if !collision_y {
        pos.y = ny;
    } else if can_climb
        && !climb
        && !check_axis_climb_collision(map, ny + y_dir, pos.x - PLAYER_RADIUS, pos.x + PLAYER_RADIUS, nz)
    {
        pos.y = ny;
        climb = true;
    } else if !climb {
        vel.y = 0.0;
    }

    if climb {
        vel.x *= 0.5;
        vel.y *= 0.5;
        nz -= 1.0;
        body_height = -1.35;
        last_climb = game_time;
    } else {
        if vel.z < 0.0 {
            body_height = -body_height;
        }
        nz += vel.z * dt * 32.0;
    }

    let mut airborne = true;
    let mut wade = false;

    if check_vertical_collision(map, pos, nz, body_height) {
        if vel.z >= 0.0 {
            wade = pos.z > 61.0;
            airborne = false;
        }
        vel.z = 0.0;
    } else {
        pos.z = nz - eye_height;
    }

    BoxClipResult {
        pos,
        vel,
        last_climb,
        airborne,
        wade,
    }
}

/// Advance one player by `dt` seconds. Returns positive fall damage,
/// -1 for a soft landing, 0 otherwise. Mutates kinematic state in place.
pub fn move_player(p: &mut Player, map: &VxlMap, dt: f32, game_time: f32) -> FallResult {
    if !p.alive {
        return 0;
    }

    let forward = p.key_states & key_state::FORWARD != 0;
    let backward = p.key_states & key_state::BACKWARD != 0;
    let left = p.key_states & key_state::LEFT != 0;
    let right = p.key_states & key_state::RIGHT != 0;

    let mut vel = p.velocity;

    if p.jumping {
        vel.z = JUMP_VELOCITY;
        p.jumping = false;
    }

    let ori = p.orientation;
    let mut front = Vec3::new(ori.x, ori.y, 0.0);
    let front_len = (front.x * front.x + front.y * front.y).sqrt();
    if front_len > 0.0 {
        front.x /= front_len;
        front.y /= front_len;
    }
    let strafe = Vec3::new(-front.y, front.x, 0.0);

    let mut accel = dt;
    if p.airborne {
        accel *= 0.1;
    } else if p.crouching {
        accel *= 0.3;
    } else if (p.secondary_fire && p.tool == ItemType::Gun) || p.sneaking {
        accel *= 0.5;
    } else if p.sprinting {
        accel *= 1.3;
    }
    if (forward || backward) && (left || right) {
        accel *= DIAGONAL_FACTOR;
    }

    if forward {
        vel.x += front.x * accel;
        vel.y += front.y * accel;
    } else if backward {
        vel.x -= front.x * accel;
        vel.y -= front.y * accel;
    }
    if left {
        vel.x -= strafe.x * accel;
        vel.y -= strafe.y * accel;
    } else if right {
        vel.x += strafe.x * accel;
        vel.y += strafe.y * accel;
    }

    let old_vel_z = vel.z;

    // Gravity, then friction on each axis.
    let mut friction = dt + 1.0;
    vel.z += dt;
    vel.z /= friction;
    if p.wade {
        friction = dt * 6.0 + 1.0;
    } else if !p.airborne {
        friction = dt * 4.0 + 1.0;
    }
    vel.x /= friction;
    vel.y /= friction;

    let (eye_height, body_height) = if p.crouching {
        (PLAYER_CROUCH_EYE, 0.9)
    } else {
        (PLAYER_EYE_HEIGHT, 1.35)
    };

    let clipped = box_clip_move(
        map,
        p.position,
        vel,
        dt,
        eye_height,
        body_height,
        p.crouching,
        p.sprinting,
        ori.z,
        p.last_climb,
        game_time,
    );
    let mut pos = clipped.pos;
    let mut vel = clipped.vel;

    pos.x = pos.x.clamp(0.0, (map.width() - 1) as f32);
    pos.y = pos.y.clamp(0.0, (map.height() - 1) as f32);
    if pos.z >= (map.depth() - 1) as f32 {
        pos.z = (map.depth() - 2) as f32;
    }

    let capped_old_vel_z = old_vel_z.min(MAX_VERTICAL_VELOCITY);

    let mut fall: FallResult = 0;
    if vel.z == 0.0 && capped_old_vel_z > FALL_SLOWDOWN_VEL {
        vel.x *= 0.5;
        vel.y *= 0.5;

        if capped_old_vel_z > FALL_DAMAGE_VEL {
            let excess = capped_old_vel_z - FALL_DAMAGE_VEL;
            let damage = excess * excess * FALL_DAMAGE_SCALAR;
            fall = damage.clamp(0.0, 127.0) as i8;
        } else {
            fall = -1;
        }
    }

    reposition_player(p, pos, game_time);
    p.velocity = vel;
    p.airborne = clipped.airborne;
    p.wade = clipped.wade;
    p.last_climb = clipped.last_climb;

    fall
}

/// Move both position and eye position, smoothing the eye over the
/// quarter second following a climb.
fn reposition_player(p: &mut Player, position: Vec3, game_time: f32) {
    p.position = position;
    p.eye_pos = position;

    let f = p.last_climb - game_time;
    if f > -0.25 {
        p.eye_pos.z += (f + 0.25) / 0.25;
    }
}

/// Whether a crouching player has room to stand. Standing up while under
/// a ceiling shifts the hull down instead when airborne room exists.
pub fn try_uncrouch(p: &mut Player, map: &VxlMap) -> bool {
    let pos = p.position;
    let x1 = pos.x + PLAYER_RADIUS;
    let x2 = pos.x - PLAYER_RADIUS;
    let y1 = pos.y + PLAYER_RADIUS;
    let y2 = pos.y - PLAYER_RADIUS;
    let z1 = pos.z + 2.25;
    let z2 = pos.z - 1.35;

    if p.airborne
        && !(clip_box(map, x1, y1, z1)
            || clip_box(map, x1, y2, z1)
            || clip_box(map, x2, y1, z1)
            || clip_box(map, x2, y2, z1))
    {
        return true;
    }
    if !(clip_box(map, x1, y1, z2)
        || clip_box(map, x1, y2, z2)
        || clip_box(map, x2, y1, z2)
        || clip_box(map, x2, y2, z2))
    {
        p.position.z -= 0.9;
        p.eye_pos.z -= 0.9;
        return true;
    }
    false
}

/// Fall damage for a landing velocity, as used by the integrator.
pub fn fall_damage(landing_velocity: f32) -> i8 {
    let v = landing_velocity.min(MAX_VERTICAL_VELOCITY);
    if v <= FALL_DAMAGE_VEL {
        return 0;
    }
    let excess = v - FALL_DAMAGE_VEL;
    (excess * excess * FALL_DAMAGE_SCALAR).clamp(0.0, 127.0) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PeerHandle, Player};
    use std::time::Instant;

    const PLATFORM_Z: i32 = 40;

    /// Flat bedrock map with a wide solid platform at z = 40.
    fn platform_map() -> VxlMap {
        let mut map = VxlMap::flat(64, 64, 64);
        for x in 4..60 {
            for y in 4..60 {
                map.set_no_optimize(x, y, PLATFORM_Z, 0x808080);
            }
        }
        map
    }

    /// A standing player's feet sit at `pos.z + 2.25`; rest them just
    /// above the platform surface so the hull does not start embedded.
    fn standing_player() -> Player {
        let mut p = Player::new(0, PeerHandle(0), Instant::now());
        p.alive = true;
        p.position = Vec3::new(16.5, 16.5, PLATFORM_Z as f32 - 2.25 - 0.01);
        p.eye_pos = p.position;
        p.orientation = Vec3::new(1.0, 0.0, 0.0);
        p
    }

    #[test]
    fn fall_damage_curve() {
        assert_eq!(fall_damage(0.58), 0);
        // v = 1.0: (0.42)^2 * 4096 = 722.5 -> clamped to 127.
        assert_eq!(fall_damage(1.0), 127);
        // Just above the threshold stays small.
        assert!(fall_damage(0.60) < 10);
    }

    #[test]
    fn dead_players_do_not_move() {
        let map = platform_map();
        let mut p = standing_player();
        p.alive = false;
        p.velocity = Vec3::new(1.0, 0.0, 0.0);
        let before = p.position;
        assert_eq!(move_player(&mut p, &map, 1.0 / 60.0, 0.0), 0);
        assert_eq!(p.position, before);
    }

    #[test]
    fn forward_input_accelerates_along_orientation() {
        let map = platform_map();
        let mut p = standing_player();
        p.key_states = key_state::FORWARD;
        let x0 = p.position.x;
        for _ in 0..60 {
            move_player(&mut p, &map, 1.0 / 60.0, 0.0);
        }
        assert!(p.position.x > x0);
        assert!((p.position.y - 16.5).abs() < 1e-3);
        assert!(!p.airborne);
    }

    #[test]
    fn jump_consumes_flag_and_sets_velocity() {
        let map = platform_map();
        let mut p = standing_player();
        p.jumping = true;
        move_player(&mut p, &map, 1.0 / 60.0, 0.0);
        assert!(!p.jumping);
        assert!(p.velocity.z < 0.0);
        assert!(p.airborne);
    }

    #[test]
    fn free_fall_lands_with_fall_damage() {
        let map = platform_map();
        let mut p = standing_player();
        // Drop from high above the platform.
        p.position.z = 10.0;
        p.eye_pos = p.position;
        p.airborne = true;

        let mut landed = 0i8;
        for tick in 0..1200 {
            let result = move_player(&mut p, &map, 1.0 / 60.0, tick as f32 / 60.0);
            if result != 0 {
                landed = result;
                break;
            }
        }
        assert!(landed > 0, "expected damaging landing, got {}", landed);
        assert_eq!(p.velocity.z, 0.0);
    }

    #[test]
    fn walls_stop_horizontal_motion() {
        let mut map = platform_map();
        // A wall ahead of the player, four blocks tall above the platform.
        for z in PLATFORM_Z - 4..PLATFORM_Z {
            for y in 14..20 {
                map.set_no_optimize(18, y, z, 0xFFFFFF);
            }
        }
        let mut p = standing_player();
        p.key_states = key_state::FORWARD;
        p.sprinting = true; // sprint disables climbing
        for _ in 0..240 {
            move_player(&mut p, &map, 1.0 / 60.0, 0.0);
        }
        assert!(p.position.x < 18.0 - PLAYER_RADIUS + 0.01);
    }

    #[test]
    fn uncrouch_blocked_under_ceiling() {
        let mut map = platform_map();
        // Crouching on the platform: feet at pos.z + 1.35.
        let mut p = standing_player();
        p.crouching = true;
        p.airborne = false;
        p.position.z = PLATFORM_Z as f32 - 1.35 - 0.01;
        // Standing headroom probes pos.z - 1.35; seal that layer.
        let head_z = (p.position.z - 1.35) as i32;
        for x in 15..19 {
            for y in 15..19 {
                map.set_no_optimize(x, y, head_z, 0xFFFFFF);
            }
        }
        assert!(!try_uncrouch(&mut p, &map));
    }

    #[test]
    fn uncrouch_allowed_with_headroom() {
        let map = platform_map();
        let mut p = standing_player();
        p.crouching = true;
        p.airborne = false;
        p.position.z = PLATFORM_Z as f32 - 1.35 - 0.01;
        let z0 = p.position.z;
        assert!(try_uncrouch(&mut p, &map));
        // The hull shifted up to standing height.
        assert!((p.position.z - (z0 - 0.9)).abs() < 1e-6);
    }
}
