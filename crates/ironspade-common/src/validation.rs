// validation.rs — checks on client-reported values
//
// Clients lie. Every float that arrives over the wire passes through here
// before it touches simulation state.

use crate::protocol::{Vec3, WeaponType};

/// World-space positions may overshoot the map a little (knocked off the
/// edge, falling) but NaN/infinite or wildly out-of-range values are
/// rejected outright.
pub fn is_valid_position(v: Vec3) -> bool {
    if !v.x.is_finite() || !v.y.is_finite() || !v.z.is_finite() {
        return false;
    }
    (-8.0..=520.0).contains(&v.x) && (-8.0..=520.0).contains(&v.y) && (-8.0..=72.0).contains(&v.z)
}

/// Orientations must be finite unit vectors, with slack for client float
/// error.
pub fn is_valid_orientation(v: Vec3) -> bool {
    if !v.x.is_finite() || !v.y.is_finite() || !v.z.is_finite() {
        return false;
    }
    let len = v.length();
    (0.9..=1.1).contains(&len)
}

pub fn weapon_max_range(weapon: WeaponType) -> f32 {
    match weapon {
        WeaponType::Rifle | WeaponType::Smg => 128.0,
        WeaponType::Shotgun => 64.0,
    }
}

pub fn is_weapon_in_range(weapon: WeaponType, distance: f32) -> bool {
    distance <= weapon_max_range(weapon)
}

pub const MELEE_RANGE: f32 = 5.0;

pub fn is_melee_in_range(distance: f32) -> bool {
    distance <= MELEE_RANGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(!is_valid_position(Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_valid_position(Vec3::new(0.0, f32::INFINITY, 0.0)));
        assert!(!is_valid_orientation(Vec3::new(0.0, 0.0, f32::NEG_INFINITY)));
    }

    #[test]
    fn accepts_slight_overshoot() {
        assert!(is_valid_position(Vec3::new(-4.0, 516.0, 70.0)));
        assert!(!is_valid_position(Vec3::new(-100.0, 0.0, 0.0)));
    }

    #[test]
    fn orientation_must_be_unit_length() {
        assert!(is_valid_orientation(Vec3::new(1.0, 0.0, 0.0)));
        assert!(is_valid_orientation(Vec3::new(0.577, 0.577, 0.577)));
        assert!(!is_valid_orientation(Vec3::new(2.0, 0.0, 0.0)));
        assert!(!is_valid_orientation(Vec3::new(0.1, 0.1, 0.1)));
    }

    #[test]
    fn weapon_ranges() {
        assert!(is_weapon_in_range(WeaponType::Rifle, 128.0));
        assert!(!is_weapon_in_range(WeaponType::Shotgun, 65.0));
        assert!(is_melee_in_range(5.0));
        assert!(!is_melee_in_range(5.1));
    }
}
