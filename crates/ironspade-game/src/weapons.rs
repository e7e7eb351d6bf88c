// weapons.rs — hit-scan support: damage tables, hit classification,
// voxel raycast and line-of-sight
//
// The raycast is a 3-D DDA over the integer lattice; see Amanatides/Woo,
// "A Fast Voxel Traversal Algorithm for Ray Tracing".

use ironspade_common::protocol::{HitType, Vec3, Vec3i, WeaponType};
use ironspade_common::vxl::VxlMap;

pub const MELEE_DAMAGE: u8 = 80;

/// Bounding-cylinder radius used when scanning for player hits.
pub const HIT_TOLERANCE: f32 = 0.4;

/// Server-side damage table; the client's claimed damage is ignored.
pub fn damage_for(weapon: WeaponType, hit: HitType) -> u8 {
    if hit == HitType::Melee {
        return MELEE_DAMAGE;
    }
    match weapon {
        WeaponType::Rifle => match hit {
            HitType::Head => 100,
            HitType::Torso => 49,
            HitType::Arms | HitType::Legs => 33,
            HitType::Melee => MELEE_DAMAGE,
        },
        WeaponType::Smg => match hit {
            HitType::Head => 75,
            HitType::Torso => 29,
            HitType::Arms | HitType::Legs => 18,
            HitType::Melee => MELEE_DAMAGE,
        },
        WeaponType::Shotgun => match hit {
            HitType::Head => 37,
            HitType::Torso => 27,
            HitType::Arms | HitType::Legs => 16,
            HitType::Melee => MELEE_DAMAGE,
        },
    }
}

/// Classify a hit from the closest-approach point's height relative to
/// the target's position. Z grows downward: smaller is higher.
pub fn classify_hit(closest_point: Vec3, target_pos: Vec3) -> HitType {
    let head_z = target_pos.z - 1.0;
    let torso_z = target_pos.z - 0.5;
    let legs_z = target_pos.z + 0.5;

    if closest_point.z < head_z {
        HitType::Head
    } else if closest_point.z < torso_z {
        HitType::Torso
    } else if closest_point.z < legs_z {
        HitType::Arms
    } else {
        HitType::Legs
    }
}

pub struct RaycastHit {
    pub position: Vec3,
    pub block: Vec3i,
    pub normal: Vec3,
}

struct RayState {
    origin: Vec3,
    dir: Vec3,
    cell: Vec3i,
    step: Vec3i,
    t_max: Vec3,
    t_delta: Vec3,
    stepped_axis: i32,
    t: f32,
}

fn step_direction(v: f32) -> i32 {
    if v < 0.0 {
        -1
    } else {
        1
    }
}

fn axis_distance(pos: f32, cell: i32, step: i32) -> f32 {
    if step > 0 {
        (cell + 1) as f32 - pos
    } else {
        pos - cell as f32
    }
}

fn t_max_for(delta: f32, dist: f32) -> f32 {
    if delta == f32::INFINITY {
        f32::INFINITY
    } else {
        delta * dist
    }
}

impl RayState {
    fn new(start: Vec3, dir: Vec3) -> Self {
        let cell = Vec3i::new(
            start.x.floor() as i32,
            start.y.floor() as i32,
            start.z.floor() as i32,
        );
        let step = Vec3i::new(
            step_direction(dir.x),
            step_direction(dir.y),
            step_direction(dir.z),
        );
        let t_delta = Vec3::new(
            (1.0 / dir.x).abs(),
            (1.0 / dir.y).abs(),
            (1.0 / dir.z).abs(),
        );
        let t_max = Vec3::new(
            t_max_for(t_delta.x, axis_distance(start.x, cell.x, step.x)),
            t_max_for(t_delta.y, axis_distance(start.y, cell.y, step.y)),
            t_max_for(t_delta.z, axis_distance(start.z, cell.z, step.z)),
        );
        Self {
            origin: start,
            dir,
            cell,
            step,
            t_max,
            t_delta,
            stepped_axis: -1,
            t: 0.0,
        }
    }

    fn advance(&mut self) {
        if self.t_max.x < self.t_max.y {
            if self.t_max.x < self.t_max.z {
                self.cell.x += self.step.x;
                self.t = self.t_max.x;
                self.t_max.x += self.t_delta.x;
                self.stepped_axis = 0;
            } else {
                self.cell.z += self.step.z;
                self.t = self.t_max.z;
                self.t_max.z += self.t_delta.z;
                self.stepped_axis = 2;
            }
        } else if self.t_max.y < self.t_max.z {
            self.cell.y += self.step.y;
            self.t = self.t_max.y;
            self.t_max.y += self.t_delta.y;
            self.stepped_axis = 1;
        } else {
            self.cell.z += self.step.z;
            self.t = self.t_max.z;
            self.t_max.z += self.t_delta.z;
            self.stepped_axis = 2;
        }
    }

    fn hit_normal(&self) -> Vec3 {
        match self.stepped_axis {
            0 => Vec3::new(-self.step.x as f32, 0.0, 0.0),
            1 => Vec3::new(0.0, -self.step.y as f32, 0.0),
            2 => Vec3::new(0.0, 0.0, -self.step.z as f32),
            _ => Vec3::default(),
        }
    }
}

/// Walk the voxel lattice from `start` along `direction` until a solid
/// cell or `max_distance` of accumulated traversal. A zero-length
/// direction is a miss.
pub fn raycast(map: &VxlMap, start: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
    let dir = direction.normalized()?;
    let mut ray = RayState::new(start, dir);

    while ray.t <= max_distance {
        let c = ray.cell;
        if c.x >= 0
            && c.x < map.width() as i32
            && c.y >= 0
            && c.y < map.height() as i32
            && c.z >= 0
            && c.z < map.depth() as i32
            && map.is_solid(c.x, c.y, c.z)
        {
            return Some(RaycastHit {
                position: ray.origin.add(ray.dir.scale(ray.t)),
                block: c,
                normal: ray.hit_normal(),
            });
        }
        ray.advance();
    }
    None
}

/// True when no terrain blocks the segment between two points.
pub fn can_see(map: &VxlMap, from: Vec3, to: Vec3) -> bool {
    let delta = to.sub(from);
    let distance = delta.length();
    if distance.abs() < 1e-6 {
        return true;
    }
    raycast(map, from, delta, distance).is_none()
}

/// Frustum-tolerance check on a client-claimed hit: project the target
/// into the shooter's view basis and require it inside a small square at
/// its depth.
pub fn validate_hit(shooter: Vec3, target: Vec3, orientation: Vec3, tolerance: f32) -> bool {
    let f = (orientation.x * orientation.x + orientation.y * orientation.y).sqrt();
    if f.abs() < 1e-6 {
        return false;
    }

    let strafe = Vec3::new(-orientation.y / f, orientation.x / f, 0.0);
    let height = Vec3::new(
        -orientation.z * strafe.y,
        orientation.z * strafe.x,
        orientation.x * strafe.y - orientation.y * strafe.x,
    );
    let other = target.sub(shooter);

    let cz = other.dot(orientation);
    if cz <= 0.0 {
        return false;
    }

    let r = 1.0 / cz;
    let x = other.dot(strafe) * r;
    let y = other.dot(height) * r;
    let r = r * tolerance;

    x - r < 0.0 && x + r > 0.0 && y - r < 0.0 && y + r > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_table_values() {
        assert_eq!(damage_for(WeaponType::Rifle, HitType::Head), 100);
        assert_eq!(damage_for(WeaponType::Rifle, HitType::Torso), 49);
        assert_eq!(damage_for(WeaponType::Rifle, HitType::Legs), 33);
        assert_eq!(damage_for(WeaponType::Smg, HitType::Head), 75);
        assert_eq!(damage_for(WeaponType::Smg, HitType::Arms), 18);
        assert_eq!(damage_for(WeaponType::Shotgun, HitType::Head), 37);
        assert_eq!(damage_for(WeaponType::Shotgun, HitType::Torso), 27);
        assert_eq!(damage_for(WeaponType::Shotgun, HitType::Melee), 80);
    }

    #[test]
    fn hit_classification_by_height() {
        let target = Vec3::new(64.0, 67.0, 30.0);
        assert_eq!(
            classify_hit(Vec3::new(64.0, 67.0, 28.9), target),
            HitType::Head
        );
        assert_eq!(
            classify_hit(Vec3::new(64.0, 67.0, 29.6), target),
            HitType::Torso
        );
        assert_eq!(
            classify_hit(Vec3::new(64.0, 67.0, 30.2), target),
            HitType::Arms
        );
        assert_eq!(
            classify_hit(Vec3::new(64.0, 67.0, 30.8), target),
            HitType::Legs
        );
    }

    #[test]
    fn raycast_zero_direction_misses() {
        let map = VxlMap::flat(32, 32, 64);
        assert!(raycast(&map, Vec3::new(16.0, 16.0, 30.0), Vec3::default(), 128.0).is_none());
    }

    #[test]
    fn raycast_hits_floor_straight_down() {
        let map = VxlMap::flat(32, 32, 64);
        let hit = raycast(
            &map,
            Vec3::new(16.5, 16.5, 30.0),
            Vec3::new(0.0, 0.0, 1.0),
            128.0,
        )
        .unwrap();
        assert_eq!(hit.block, Vec3i::new(16, 16, 63));
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn raycast_hits_wall_with_side_normal() {
        let mut map = VxlMap::flat(32, 32, 64);
        map.set(20, 16, 30, 0xFFFFFF);
        let hit = raycast(
            &map,
            Vec3::new(16.5, 16.5, 30.5),
            Vec3::new(1.0, 0.0, 0.0),
            64.0,
        )
        .unwrap();
        assert_eq!(hit.block, Vec3i::new(20, 16, 30));
        assert_eq!(hit.normal, Vec3::new(-1.0, 0.0, 0.0));
        // Entry face is x = 20.
        assert!((hit.position.x - 20.0).abs() < 1e-4);
    }

    #[test]
    fn raycast_respects_max_distance() {
        let mut map = VxlMap::flat(256, 256, 64);
        map.set(200, 16, 30, 0xFFFFFF);
        let start = Vec3::new(16.5, 16.5, 30.5);
        let dir = Vec3::new(1.0, 0.0, 0.0);
        assert!(raycast(&map, start, dir, 64.0).is_none());
        assert!(raycast(&map, start, dir, 256.0).is_some());
    }

    #[test]
    fn line_of_sight_blocked_by_wall() {
        let mut map = VxlMap::flat(32, 32, 64);
        let a = Vec3::new(10.5, 16.5, 30.5);
        let b = Vec3::new(22.5, 16.5, 30.5);
        assert!(can_see(&map, a, b));
        for z in 28..34 {
            for y in 14..20 {
                map.set(16, y, z, 0xFFFFFF);
            }
        }
        assert!(!can_see(&map, a, b));
        assert!(can_see(&map, a, a));
    }

    #[test]
    fn validate_hit_frustum() {
        let shooter = Vec3::new(0.0, 0.0, 0.0);
        let forward = Vec3::new(1.0, 0.0, 0.0);
        // Dead ahead passes.
        assert!(validate_hit(shooter, Vec3::new(10.0, 0.0, 0.0), forward, 3.0));
        // Behind the shooter fails.
        assert!(!validate_hit(shooter, Vec3::new(-5.0, 0.0, 0.0), forward, 3.0));
        // Far off-axis fails.
        assert!(!validate_hit(shooter, Vec3::new(10.0, 50.0, 0.0), forward, 3.0));
        // Vertical-only orientation is degenerate and fails.
        assert!(!validate_hit(
            shooter,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 1.0),
            3.0
        ));
    }
}
