// Command types exchanged with the rover firmware
//
// Wire format is comma-separated ASCII with a leading type letter and no
// trailing newline:
//   S,<fl>,<fr>,<ml>,<mr>,<rl>,<rr>   steering servo angles in degrees
//   M,<speed>                          signed drive speed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hard limits of the steering linkage, degrees
pub const SERVO_MIN_DEG: f64 = 45.0;
pub const SERVO_MAX_DEG: f64 = 135.0;
pub const SERVO_NEUTRAL_DEG: f64 = 90.0;

/// Drive speed limit (8-bit PWM duty on the motor boards)
pub const MAX_SPEED: i16 = 255;

pub const NUM_SERVOS: usize = 6;

/// Servo angles for the six steering servos
///
/// Order: front-left, front-right, mid-left, mid-right, rear-left, rear-right.
/// Every angle is within [`SERVO_MIN_DEG`, `SERVO_MAX_DEG`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringAngles([f64; NUM_SERVOS]);

impl SteeringAngles {
    /// All wheels pointing straight ahead
    pub const NEUTRAL: Self = Self([SERVO_NEUTRAL_DEG; NUM_SERVOS]);

    /// Build from raw angles, clamping each one into the linkage range
    ///
    /// A NaN angle becomes neutral.
    pub fn new(angles: [f64; NUM_SERVOS]) -> Self {
        Self(angles.map(|a| {
            if a.is_nan() {
                SERVO_NEUTRAL_DEG
            } else {
                a.clamp(SERVO_MIN_DEG, SERVO_MAX_DEG)
            }
        }))
    }

    pub fn as_array(&self) -> [f64; NUM_SERVOS] {
        self.0
    }

    pub fn front_left(&self) -> f64 {
        self.0[0]
    }

    pub fn front_right(&self) -> f64 {
        self.0[1]
    }

    pub fn rear_left(&self) -> f64 {
        self.0[4]
    }

    pub fn rear_right(&self) -> f64 {
        self.0[5]
    }
}

/// Signed drive speed, positive = forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorSpeed(i16);

impl MotorSpeed {
    pub const STOP: Self = Self(0);

    /// Build from any integer, clamping into [-255, 255]
    pub fn new(speed: i32) -> Self {
        let max = i32::from(MAX_SPEED);
        Self(speed.clamp(-max, max) as i16)
    }

    pub fn value(&self) -> i16 {
        self.0
    }
}

/// One datagram's worth of instruction for the rover
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Steering { angles: SteeringAngles },
    Motor { speed: MotorSpeed },
}

impl From<SteeringAngles> for Command {
    fn from(angles: SteeringAngles) -> Self {
        Command::Steering { angles }
    }
}

impl From<MotorSpeed> for Command {
    fn from(speed: MotorSpeed) -> Self {
        Command::Motor { speed }
    }
}

// Encoding only rounds; range limits were applied when the values were built
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Steering { angles } => {
                f.write_str("S")?;
                for angle in angles.as_array() {
                    write!(f, ",{}", angle.round() as i64)?;
                }
                Ok(())
            }
            Command::Motor { speed } => write!(f, "M,{}", speed.value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command type '{0}'")]
    UnknownType(char),

    #[error("expected {expected} values for '{tag}' command, got {got}")]
    WrongArity { tag: char, expected: usize, got: usize },

    #[error("invalid integer '{0}'")]
    InvalidNumber(String),
}

/// Split off a leading optionally-signed integer, skipping leading whitespace
fn leading_int(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let sign = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    Some(s.split_at(sign + digits))
}

/// Read `expected` comma-prefixed integers from `body`
///
/// Mirrors the firmware's `sscanf`: text after the last integer is ignored,
/// anything else that breaks the `,<int>` pattern stops the match.
fn parse_fields(tag: char, body: &str, expected: usize) -> Result<Vec<i32>, ParseError> {
    let mut values = Vec::with_capacity(expected);
    let mut rest = body;

    while values.len() < expected {
        let arity = ParseError::WrongArity {
            tag,
            expected,
            got: values.len(),
        };
        let Some(field) = rest.strip_prefix(',') else {
            return Err(arity);
        };
        let Some((number, tail)) = leading_int(field) else {
            let token = field.split(',').next().unwrap_or_default().trim();
            if token.is_empty() {
                return Err(arity);
            }
            return Err(ParseError::InvalidNumber(token.to_string()));
        };
        let value = number
            .parse::<i32>()
            .map_err(|_| ParseError::InvalidNumber(number.to_string()))?;
        values.push(value);
        rest = tail;
    }

    Ok(values)
}

/// Decode a datagram payload the way the rover firmware does
impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\r', '\n', '\0']);
        let mut chars = s.chars();
        let tag = chars.next().ok_or(ParseError::Empty)?;
        let body = chars.as_str();

        match tag {
            'S' => {
                let values = parse_fields(tag, body, NUM_SERVOS)?;
                let mut angles = [0.0; NUM_SERVOS];
                for (angle, value) in angles.iter_mut().zip(values) {
                    *angle = f64::from(value);
                }
                Ok(SteeringAngles::new(angles).into())
            }
            'M' => {
                let values = parse_fields(tag, body, 1)?;
                Ok(MotorSpeed::new(values[0]).into())
            }
            other => Err(ParseError::UnknownType(other)),
        }
    }
}
