// Drive module for the six-wheel rover
//
// Provides:
// - Ackermann steering angles and trigger-to-speed mapping
// - UDP command transport to the rover

pub mod kinematics;
mod transport;

pub use kinematics::{ackermann_angles, motor_speed};
pub use transport::{TransportError, UdpSender};
