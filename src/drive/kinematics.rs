// Ackermann steering for the six-wheel base, and trigger-to-speed mapping
//
// Front and rear wheels steer, the middle pair stays straight. The rear
// wheels counter-steer by the same angle as the front ones so the rover
// turns about a centre level with its middle axle.

use crate::messages::{MotorSpeed, SteeringAngles, MAX_SPEED, SERVO_NEUTRAL_DEG};

/// Geometry of the base (centimetres)
pub const WHEELBASE: f64 = 16.0;
pub const TRACK_WIDTH: f64 = 2.4;

/// Turn radius at full and near-zero stick deflection (centimetres)
pub const R_MIN: f64 = 20.0;
pub const R_MAX: f64 = 200.0;

/// Normalised trigger travel below which the rover holds still
pub const TRIGGER_THRESHOLD: f64 = 0.1;

/// Turn radius for a non-zero steering input.
///
/// Full deflection gives `R_MIN`, deflection close to zero approaches `R_MAX`.
fn turn_radius(steering: f64) -> f64 {
    R_MIN + (R_MAX - R_MIN) * (1.0 - steering.abs())
}

/// Inner and outer front wheel angles (degrees from straight) for a radius
fn wheel_offsets(radius: f64) -> (f64, f64) {
    let inner = (WHEELBASE / (radius - TRACK_WIDTH / 2.0)).atan().to_degrees();
    let outer = (WHEELBASE / (radius + TRACK_WIDTH / 2.0)).atan().to_degrees();
    (inner, outer)
}

/// Convert a steering input in [-1, 1] (positive = right) to servo angles
///
/// # Returns
/// Angles in order front-left, front-right, mid-left, mid-right, rear-left,
/// rear-right, each clamped to the linkage range.
pub fn ackermann_angles(steering: f64) -> SteeringAngles {
    // Zero and garbage axis readings both mean straight ahead
    if steering == 0.0 || !steering.is_finite() {
        return SteeringAngles::NEUTRAL;
    }

    let (inner, outer) = wheel_offsets(turn_radius(steering));
    let (rear_inner, rear_outer) = (-inner, -outer);

    // Right turn feeds inner to the left wheels, left turn feeds outer.
    // The servo horns are mounted mirrored, so this is intentional.
    let [fl, fr, rl, rr] = if steering > 0.0 {
        [
            SERVO_NEUTRAL_DEG + inner,
            SERVO_NEUTRAL_DEG + outer,
            SERVO_NEUTRAL_DEG + rear_inner,
            SERVO_NEUTRAL_DEG + rear_outer,
        ]
    } else {
        [
            SERVO_NEUTRAL_DEG - outer,
            SERVO_NEUTRAL_DEG - inner,
            SERVO_NEUTRAL_DEG - rear_outer,
            SERVO_NEUTRAL_DEG - rear_inner,
        ]
    };

    SteeringAngles::new([
        fl,
        fr,
        SERVO_NEUTRAL_DEG,
        SERVO_NEUTRAL_DEG,
        rl,
        rr,
    ])
}

/// Map a raw trigger axis from [-1, 1] (rest = -1) to [0, 1]
fn normalize_trigger(raw: f64) -> f64 {
    (raw + 1.0) / 2.0
}

/// Convert the two trigger axes to a signed drive speed
///
/// Right trigger drives forward, left trigger drives in reverse, pressing
/// both gives the difference. Both triggers within the dead zone give zero.
pub fn motor_speed(right_trigger: f64, left_trigger: f64) -> MotorSpeed {
    let rt = normalize_trigger(right_trigger);
    let lt = normalize_trigger(left_trigger);

    if rt < TRIGGER_THRESHOLD && lt < TRIGGER_THRESHOLD {
        return MotorSpeed::STOP;
    }

    let speed = ((rt - lt) * f64::from(MAX_SPEED)).round() as i32;
    // Normalised inputs keep this in range already; out-of-range axes do not
    MotorSpeed::new(speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{SERVO_MAX_DEG, SERVO_MIN_DEG};

    fn sweep() -> impl Iterator<Item = f64> {
        (-100..=100).map(|i| i as f64 / 100.0)
    }

    #[test]
    fn test_zero_input_is_neutral() {
        let angles = ackermann_angles(0.0);
        assert_eq!(angles.as_array(), [90.0; 6]);
        // -0.0 compares equal to 0.0
        assert_eq!(ackermann_angles(-0.0).as_array(), [90.0; 6]);
    }

    #[test]
    fn test_angles_always_within_linkage_range() {
        for x in sweep() {
            for angle in ackermann_angles(x).as_array() {
                assert!(
                    (SERVO_MIN_DEG..=SERVO_MAX_DEG).contains(&angle),
                    "input {} produced angle {}",
                    x,
                    angle
                );
            }
        }
    }

    #[test]
    fn test_non_finite_input_is_neutral() {
        for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let angles = ackermann_angles(x);
            assert_eq!(angles.as_array(), [90.0; 6], "input {}", x);
            assert_eq!(
                crate::messages::Command::from(angles).to_string(),
                "S,90,90,90,90,90,90"
            );
        }
    }

    #[test]
    fn test_middle_wheels_stay_straight() {
        for x in sweep() {
            let angles = ackermann_angles(x).as_array();
            assert_eq!(angles[2], 90.0);
            assert_eq!(angles[3], 90.0);
        }
    }

    #[test]
    fn test_full_right_turn() {
        let angles = ackermann_angles(1.0);
        let inner = (16.0f64 / 18.8).atan().to_degrees();
        let outer = (16.0f64 / 21.2).atan().to_degrees();
        println!("Full right: {:?}", angles.as_array());

        assert!((angles.front_left() - (90.0 + inner)).abs() < 1e-9);
        assert!((angles.front_right() - (90.0 + outer)).abs() < 1e-9);
        assert!((angles.rear_left() - (90.0 - inner)).abs() < 1e-9);
        assert!((angles.rear_right() - (90.0 - outer)).abs() < 1e-9);
        assert!(inner > outer, "inner wheel must steer harder");
    }

    #[test]
    fn test_rear_counter_steers() {
        for x in sweep().filter(|&x| x != 0.0) {
            let angles = ackermann_angles(x);
            let front = angles.front_left() - 90.0;
            let rear = angles.rear_left() - 90.0;
            assert!(
                front.signum() == -rear.signum(),
                "input {}: front {} rear {}",
                x,
                front,
                rear
            );
        }
    }

    #[test]
    fn test_left_right_mirroring() {
        for x in sweep().filter(|&x| x != 0.0) {
            let right = ackermann_angles(x);
            let left = ackermann_angles(-x);

            // Same offset magnitude, opposite direction
            let left_fl = left.front_left() - 90.0;
            let right_fr = right.front_right() - 90.0;
            assert!((left_fl + right_fr).abs() < 1e-9, "input {}", x);

            let left_fr = left.front_right() - 90.0;
            let right_fl = right.front_left() - 90.0;
            assert!((left_fr + right_fl).abs() < 1e-9, "input {}", x);
        }
    }

    #[test]
    fn test_front_inner_offset_grows_with_deflection() {
        for sign in [1.0, -1.0] {
            let mut previous = 0.0;
            for i in 1..=100 {
                let x = sign * i as f64 / 100.0;
                let angles = ackermann_angles(x);
                // Inner wheel is front-left for right turns, front-right for left turns
                let inner = if sign > 0.0 {
                    angles.front_left()
                } else {
                    angles.front_right()
                };
                let offset = (inner - 90.0).abs();
                assert!(
                    offset >= previous,
                    "offset shrank at input {}: {} < {}",
                    x,
                    offset,
                    previous
                );
                previous = offset;
            }
        }
    }

    #[test]
    fn test_small_deflection_uses_wide_radius() {
        assert!((turn_radius(1.0) - R_MIN).abs() < 1e-12);
        assert!((turn_radius(-1.0) - R_MIN).abs() < 1e-12);
        assert!((turn_radius(0.001) - R_MAX).abs() < 0.2);
    }

    #[test]
    fn test_triggers_at_rest() {
        assert_eq!(motor_speed(-1.0, -1.0).value(), 0);
    }

    #[test]
    fn test_full_forward_and_reverse() {
        assert_eq!(motor_speed(1.0, -1.0).value(), 255);
        assert_eq!(motor_speed(-1.0, 1.0).value(), -255);
    }

    #[test]
    fn test_both_triggers_cancel() {
        assert_eq!(motor_speed(1.0, 1.0).value(), 0);
    }

    #[test]
    fn test_dead_zone() {
        // Normalised 0.05 on both sides, raw = 2 * 0.05 - 1
        assert_eq!(motor_speed(-0.9, -0.9).value(), 0);
        // Normalised 0.09 vs 0.0, difference ignored inside the dead zone
        assert_eq!(motor_speed(-0.82, -1.0).value(), 0);
    }

    #[test]
    fn test_just_outside_dead_zone() {
        // Normalised 0.2 forward
        assert_eq!(motor_speed(-0.6, -1.0).value(), 51);
        // Normalised 0.2 reverse
        assert_eq!(motor_speed(-1.0, -0.6).value(), -51);
    }

    #[test]
    fn test_speed_stays_in_range_for_bad_axes() {
        assert_eq!(motor_speed(3.0, -1.0).value(), 255);
        assert_eq!(motor_speed(-1.0, 5.0).value(), -255);
    }
}
