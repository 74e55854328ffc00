//! Launch pad impulse

use glam::Vec3;

use super::world::Facing;

/// Yaw deviation from the pad's facing that is preserved
const MAX_YAW_OFFSET: f32 = 25.0;

/// Velocity given to an avatar with this yaw and pitch touching a pad.
///
/// The launch follows the pad's facing: a yaw more than 90 degrees off is
/// snapped to it, otherwise it is clamped within 25 degrees of it.
pub fn launch_vector(yaw: f32, pitch: f32, facing: Facing, power: u8) -> Vec3 {
    let angle = facing.yaw();

    let yaw = if yaw < 0.0 { yaw + 360.0 } else { yaw };
    let yaw = if yaw > angle + 90.0 || yaw < angle - 90.0 {
        angle
    } else {
        (yaw % 360.0).clamp(angle - MAX_YAW_OFFSET, angle + MAX_YAW_OFFSET)
    };

    let coefficient = if power > 4 {
        f32::from(power)
    } else {
        f32::from(power) * 0.25
    };

    let pitch = pitch.to_radians();
    let yaw = (-yaw).to_radians();
    let horizontal = pitch.cos() * (1.0 + coefficient);

    Vec3::new(
        yaw.sin() * horizontal,
        coefficient.clamp(0.75, 1.0),
        yaw.cos() * horizontal,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looking_along_the_pad_launches_straight() {
        let v = launch_vector(0.0, 0.0, Facing::South, 2);
        assert!(v.x.abs() < 1e-5);
        assert!((v.z - 1.5).abs() < 1e-5);
        assert!((v.y - 0.75).abs() < 1e-5);
    }

    #[test]
    fn opposite_yaw_snaps_to_the_facing() {
        let along = launch_vector(270.0, 0.0, Facing::East, 3);
        let behind = launch_vector(90.0, 0.0, Facing::East, 3);
        assert!((along - behind).length() < 1e-5);
        assert!((along.x - 1.75).abs() < 1e-4);
    }

    #[test]
    fn small_deviation_is_clamped() {
        let clamped = launch_vector(240.0, 0.0, Facing::East, 3);
        let limit = launch_vector(245.0, 0.0, Facing::East, 3);
        assert!((clamped - limit).length() < 1e-5);
    }

    #[test]
    fn strong_pads_use_raw_power() {
        let v = launch_vector(0.0, 0.0, Facing::South, 6);
        assert!((v.z - 7.0).abs() < 1e-4);
        assert_eq!(v.y, 1.0);
    }
}
