// Gamepad teleoperation for the six-wheel rover
//
// Controller state is turned into Ackermann steering angles and a drive speed,
// then sent to the rover as UDP text commands by two independently paced loops.

pub mod config;
pub mod drive;
pub mod input;
pub mod listen;
pub mod messages;
pub mod monitor;
pub mod runtime;
