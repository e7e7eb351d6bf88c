// grenade.rs — grenade ballistics
//
// Grenades integrate under the same gravity constant as players and
// reflect off solid cells one axis at a time, Z before X before Y.

use ironspade_common::protocol::Vec3;
use ironspade_common::vxl::VxlMap;

/// Velocity magnitude above which a bounce is loud enough for clients to
/// play the bounce sound.
const LOUD_BOUNCE_THRESHOLD: f32 = 1.1;

/// Velocity retained after a bounce.
const BOUNCE_DAMPING: f32 = 0.36;

/// Grenades never destroy terrain at or below this depth.
pub const GRENADE_FLOOR_Z: f32 = 62.0;

#[derive(Debug, Clone)]
pub struct Grenade {
    pub position: Vec3,
    pub velocity: Vec3,
    pub fuse_length: f32,
    /// Game-time seconds at which the grenade was thrown.
    pub created_at: f64,
    pub thrower: u8,
}

impl Grenade {
    pub fn expired(&self, now: f64) -> bool {
        (now - self.created_at) as f32 >= self.fuse_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceKind {
    None,
    Quiet,
    Loud,
}

/// Integrate one step. On entering a solid cell the previous position is
/// restored, the axis that crossed a cell boundary is reflected, and all
/// axes are damped.
pub fn move_grenade(map: &VxlMap, position: &mut Vec3, velocity: &mut Vec3, dt: f32) -> BounceKind {
    let old_pos = *position;

    let f = dt * 32.0;
    velocity.z += dt;
    position.x += velocity.x * f;
    position.y += velocity.y * f;
    position.z += velocity.z * f;

    let new_x = position.x.floor() as i32;
    let new_y = position.y.floor() as i32;
    let new_z = position.z.floor() as i32;

    if new_x < 0 || new_x >= map.width() as i32 || new_y < 0 || new_y >= map.height() as i32 {
        return BounceKind::None;
    }
    if new_z < 0 {
        return BounceKind::None;
    }
    let mut solid_z = new_z;
    if solid_z == map.depth() as i32 - 1 {
        solid_z = map.depth() as i32 - 2;
    } else if solid_z >= map.depth() as i32 {
        return BounceKind::None;
    }

    if !map.is_solid(new_x, new_y, solid_z) {
        return BounceKind::None;
    }

    let kind = if velocity.x.abs() > LOUD_BOUNCE_THRESHOLD
        || velocity.y.abs() > LOUD_BOUNCE_THRESHOLD
        || velocity.z.abs() > LOUD_BOUNCE_THRESHOLD
    {
        BounceKind::Loud
    } else {
        BounceKind::Quiet
    };

    let old_x = old_pos.x.floor() as i32;
    let old_y = old_pos.y.floor() as i32;
    let old_z = old_pos.z.floor() as i32;

    // Reflect exactly one axis: the first of Z, X, Y that both changed
    // cells and is individually blocked.
    if new_z != old_z && ((new_x == old_x && new_y == old_y) || !map.is_solid(new_x, new_y, old_z))
    {
        velocity.z = -velocity.z;
    } else if new_x != old_x
        && ((new_y == old_y && new_z == old_z) || !map.is_solid(old_x, new_y, new_z))
    {
        velocity.x = -velocity.x;
    } else if new_y != old_y
        && ((new_x == old_x && new_z == old_z) || !map.is_solid(new_x, old_y, new_z))
    {
        velocity.y = -velocity.y;
    }

    *position = old_pos;
    velocity.x *= BOUNCE_DAMPING;
    velocity.y *= BOUNCE_DAMPING;
    velocity.z *= BOUNCE_DAMPING;

    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounce_inverts_z_and_damps() {
        let mut map = VxlMap::flat(32, 32, 64);
        map.set(10, 10, 6, 0xFFFFFF);

        let mut pos = Vec3::new(10.5, 10.5, 5.0);
        let mut vel = Vec3::new(0.0, 0.0, 1.0);
        let dt = 1.0 / 60.0;

        let kind = move_grenade(&map, &mut pos, &mut vel, dt);
        assert_eq!(kind, BounceKind::Quiet);
        // Position restored, fractional XY untouched.
        assert_eq!(pos, Vec3::new(10.5, 10.5, 5.0));
        // Gravity added dt, then Z inverted and all axes scaled by 0.36.
        let expected_z = -(1.0 + dt) * BOUNCE_DAMPING;
        assert!((vel.z - expected_z).abs() < 1e-5);
        assert_eq!(vel.x, 0.0);
        assert_eq!(vel.y, 0.0);
    }

    #[test]
    fn free_flight_advances_position() {
        let map = VxlMap::flat(64, 64, 64);
        let mut pos = Vec3::new(20.0, 20.0, 10.0);
        let mut vel = Vec3::new(1.0, 0.0, 0.0);
        let dt = 1.0 / 60.0;
        assert_eq!(move_grenade(&map, &mut pos, &mut vel, dt), BounceKind::None);
        assert!(pos.x > 20.0);
        // Gravity pulls the grenade down every step.
        assert!(vel.z > 0.0);
    }

    #[test]
    fn fast_bounce_is_loud() {
        let mut map = VxlMap::flat(32, 32, 64);
        map.set(10, 10, 6, 0xFFFFFF);
        let mut pos = Vec3::new(10.5, 10.5, 5.2);
        let mut vel = Vec3::new(0.0, 0.0, 2.0);
        assert_eq!(
            move_grenade(&map, &mut pos, &mut vel, 1.0 / 60.0),
            BounceKind::Loud
        );
    }

    #[test]
    fn x_axis_bounce_reflects_x() {
        let mut map = VxlMap::flat(64, 64, 64);
        for z in 0..64 {
            map.set_no_optimize(12, 10, z, 0xFFFFFF);
        }
        let mut pos = Vec3::new(11.9, 10.5, 30.5);
        let mut vel = Vec3::new(1.0, 0.0, 0.0);
        let kind = move_grenade(&map, &mut pos, &mut vel, 1.0 / 60.0);
        assert_ne!(kind, BounceKind::None);
        assert!(vel.x < 0.0);
    }

    #[test]
    fn fuse_expiry() {
        let g = Grenade {
            position: Vec3::default(),
            velocity: Vec3::default(),
            fuse_length: 3.0,
            created_at: 10.0,
            thrower: 0,
        };
        assert!(!g.expired(12.9));
        assert!(g.expired(13.0));
    }
}
