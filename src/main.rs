use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rover_teleop::config::{self, ControlConfig};
#[cfg(feature = "gamepad")]
use rover_teleop::input::GamepadInput;
use rover_teleop::input::{InputError, InputSource, KeyboardInput};
use rover_teleop::{listen, monitor, read_test, runtime};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Teleoperate the six-wheel rover over UDP
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Drive the rover (default)
    Drive(DriveArgs),
    /// Print the rover's serial console
    Monitor {
        #[arg(long, default_value = config::MONITOR_PORT)]
        port: String,
        #[arg(long, default_value_t = config::MONITOR_BAUDRATE)]
        baud: u32,
    },
    /// Decode rover commands sent to this machine
    Listen {
        #[arg(long, default_value = config::LISTEN_ADDR)]
        bind: SocketAddr,
        /// Log each command as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print controller sticks and face buttons, no rover needed
    ReadTest {
        #[arg(long, value_enum, default_value_t = InputKind::Gamepad)]
        input: InputKind,
    },
}

#[derive(Args)]
struct DriveArgs {
    /// Rover IP address
    #[arg(long, default_value_t = IpAddr::V4(config::ROVER_ADDR))]
    addr: IpAddr,
    #[arg(long, default_value_t = config::ROVER_PORT)]
    port: u16,
    #[arg(long, value_enum, default_value_t = InputKind::Keyboard)]
    input: InputKind,
    /// Button index that ends the session
    #[arg(long, default_value_t = config::EXIT_BUTTON)]
    exit_button: usize,
}

impl Default for DriveArgs {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(config::ROVER_ADDR),
            port: config::ROVER_PORT,
            input: InputKind::Keyboard,
            exit_button: config::EXIT_BUTTON,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    Keyboard,
    Gamepad,
}

fn open_input(kind: InputKind) -> Result<Box<dyn InputSource>, InputError> {
    match kind {
        InputKind::Keyboard => Ok(Box::new(KeyboardInput::open()?)),
        #[cfg(feature = "gamepad")]
        InputKind::Gamepad => Ok(Box::new(GamepadInput::open()?)),
        #[cfg(not(feature = "gamepad"))]
        InputKind::Gamepad => Err(InputError::Unavailable(
            "gamepad support not built, rebuild with --features gamepad".to_string(),
        )),
    }
}

fn drive<F>(args: DriveArgs, open: F) -> Result<(), BoxError>
where
    F: FnOnce(InputKind) -> Result<Box<dyn InputSource>, InputError>,
{
    let config = ControlConfig {
        rover: SocketAddr::new(args.addr, args.port),
        exit_button: args.exit_button,
        ..ControlConfig::default()
    };

    // No controller means no session at all
    let mut input = open(args.input)?;
    let report = runtime::run_session(input.as_mut(), &config)?;
    drop(input);

    if !report.is_clean() {
        return Err(format!(
            "session ended with failed loops (motor: {:?}, steering: {:?})",
            report.motor, report.steering
        )
        .into());
    }
    info!("Program exited successfully");
    Ok(())
}

fn run(cli: Cli) -> Result<(), BoxError> {
    match cli.command.unwrap_or_else(|| Cmd::Drive(DriveArgs::default())) {
        Cmd::Drive(args) => drive(args, open_input),
        Cmd::Monitor { port, baud } => {
            monitor::run(&port, baud, config::MONITOR_TIMEOUT)?;
            Ok(())
        }
        Cmd::Listen { bind, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(listen::run(bind, json))?;
            Ok(())
        }
        Cmd::ReadTest { input } => {
            let mut input = open_input(input)?;
            read_test::run(input.as_mut(), config::EVENT_POLL_TIMEOUT)?;
            Ok(())
        }
    }
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
