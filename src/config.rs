// Rover address, loop cadences, input mapping, serial monitor defaults
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

// Rover endpoint
// The rover runs its own access point and sits at 192.168.4.1.
// Use the DHCP-assigned address instead when it joins an external network.
pub const ROVER_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const ROVER_PORT: u16 = 8080;

// Rate loop periods
pub const MOTOR_PERIOD: Duration = Duration::from_millis(10); // 100 Hz
pub const STEERING_PERIOD: Duration = Duration::from_millis(50); // 20 Hz

// Button that ends the session ('B' on an Xbox layout)
pub const EXIT_BUTTON: usize = 1;

// Upper bound on how long the event loop blocks waiting for input
pub const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

// A rate loop gives up after this many failed sends in a row
pub const MAX_CONSECUTIVE_SEND_FAILURES: u32 = 100;

// Serial monitor
pub const MONITOR_PORT: &str = "/dev/ttyUSB0";
pub const MONITOR_BAUDRATE: u32 = 115_200;
pub const MONITOR_TIMEOUT: Duration = Duration::from_secs(1);

// Bench receiver
pub const LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Settings for one control session
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub rover: SocketAddr,
    pub motor_period: Duration,
    pub steering_period: Duration,
    pub exit_button: usize,
    pub event_poll_timeout: Duration,
    pub max_send_failures: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rover: SocketAddr::new(IpAddr::V4(ROVER_ADDR), ROVER_PORT),
            motor_period: MOTOR_PERIOD,
            steering_period: STEERING_PERIOD,
            exit_button: EXIT_BUTTON,
            event_poll_timeout: EVENT_POLL_TIMEOUT,
            max_send_failures: MAX_CONSECUTIVE_SEND_FAILURES,
        }
    }
}
