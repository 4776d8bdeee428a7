// Dual-rate control session
//
// Motor loop (100 Hz) and steering loop (20 Hz) run as tokio tasks, each
// copying the latest controller state, computing its command and sending it.
// The event loop runs on the calling thread, republishes controller state
// and decides when the session ends. Everything stops on one RunningFlag.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

// local imports
use crate::config::ControlConfig;
use crate::drive::{ackermann_angles, motor_speed, TransportError, UdpSender};
use crate::input::{axis, ControllerSnapshot, InputError, InputEvent, InputSource, SharedSnapshot};
use crate::messages::Command;

/// Session-wide continuation flag
///
/// Cloning shares the flag. Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the flag when a rate loop exits for any reason, panics included
struct StopOnDrop(RunningFlag);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Motor,
    Steering,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::Motor => f.write_str("Motor"),
            LoopKind::Steering => f.write_str("Steering"),
        }
    }
}

/// Counters reported by a rate loop when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub sent: u64,
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to start async runtime: {0}")]
    Startup(#[source] std::io::Error),

    #[error("Failed to open command socket: {0}")]
    Bind(#[source] TransportError),

    #[error("{kind} loop gave up after {failures} consecutive send failures: {source}")]
    Transport {
        kind: LoopKind,
        failures: u32,
        #[source]
        source: TransportError,
    },

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Everything a rate loop shares with the rest of the session
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub state: SharedSnapshot,
    pub sender: Arc<UdpSender>,
    pub running: RunningFlag,
    pub max_send_failures: u32,
}

/// Motor command from the trigger axes
pub fn motor_command(snapshot: &ControllerSnapshot) -> Command {
    motor_speed(
        f64::from(snapshot.axis(axis::RIGHT_TRIGGER)),
        f64::from(snapshot.axis(axis::LEFT_TRIGGER)),
    )
    .into()
}

/// Steering command from the left stick
pub fn steering_command(snapshot: &ControllerSnapshot) -> Command {
    ackermann_angles(f64::from(snapshot.axis(axis::LEFT_X))).into()
}

async fn rate_loop<F>(
    kind: LoopKind,
    period: Duration,
    ctx: LoopContext,
    compute: F,
) -> Result<LoopStats, RuntimeError>
where
    F: Fn(&ControllerSnapshot) -> Command,
{
    let _stop = StopOnDrop(ctx.running.clone());
    let mut stats = LoopStats::default();
    let mut consecutive_failures = 0u32;

    // Ticks are anchored to the start time, so send latency does not drift the cadence
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("{} loop started: {}ms period", kind, period.as_millis());

    loop {
        tick.tick().await;
        if !ctx.running.is_running() {
            break;
        }
        stats.ticks += 1;

        // 1. Copy the latest controller state
        let snapshot = ctx.state.current();

        // 2. Compute the command
        let command = compute(&snapshot);

        // 3. Send it; a single failure only skips this tick
        match ctx.sender.send(&command).await {
            Ok(()) => {
                stats.sent += 1;
                consecutive_failures = 0;
            }
            Err(e) => {
                stats.failed += 1;
                consecutive_failures += 1;
                warn!("{} send failed ({} in a row): {}", kind, consecutive_failures, e);

                if consecutive_failures >= ctx.max_send_failures {
                    error!("{} loop giving up, stopping session", kind);
                    return Err(RuntimeError::Transport {
                        kind,
                        failures: consecutive_failures,
                        source: e,
                    });
                }
            }
        }
    }

    info!("{} loop stopped after {} ticks", kind, stats.ticks);
    Ok(stats)
}

/// Drive speed loop
pub async fn motor_loop(ctx: LoopContext, period: Duration) -> Result<LoopStats, RuntimeError> {
    rate_loop(LoopKind::Motor, period, ctx, motor_command).await
}

/// Steering angle loop
pub async fn steering_loop(ctx: LoopContext, period: Duration) -> Result<LoopStats, RuntimeError> {
    rate_loop(LoopKind::Steering, period, ctx, steering_command).await
}

/// Why the event loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Quit event from the input source
    Quit,
    /// Exit button pressed
    ExitButton,
    /// SIGINT
    Interrupted,
    /// A rate loop stopped the session
    LoopStopped,
}

/// Pump input events until the session should end
///
/// Republishes the controller state after every poll. Clears `running` on
/// every return path, errors included.
pub fn event_loop<I: InputSource + ?Sized>(
    input: &mut I,
    state: &SharedSnapshot,
    running: &RunningFlag,
    exit_button: usize,
    poll_timeout: Duration,
    interrupts: &mut mpsc::Receiver<()>,
) -> Result<ExitReason, InputError> {
    while running.is_running() {
        if interrupts.try_recv().is_ok() {
            info!("Interrupted, shutting down");
            running.stop();
            return Ok(ExitReason::Interrupted);
        }

        let event = input.poll_event(poll_timeout);
        state.publish(input.snapshot());

        match event {
            Ok(Some(InputEvent::Quit)) => {
                info!("Quit requested, shutting down");
                running.stop();
                return Ok(ExitReason::Quit);
            }
            Ok(Some(InputEvent::ButtonDown(button))) if button == exit_button => {
                info!("Exit button {} pressed, shutting down", button);
                running.stop();
                return Ok(ExitReason::ExitButton);
            }
            Ok(Some(InputEvent::ButtonDown(button))) => {
                debug!("Button {} pressed", button);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Input failed: {}", e);
                running.stop();
                return Err(e);
            }
        }
    }

    Ok(ExitReason::LoopStopped)
}

/// How a rate loop ended
#[derive(Debug)]
pub enum LoopOutcome {
    Finished(LoopStats),
    Failed(RuntimeError),
    Panicked(String),
}

impl LoopOutcome {
    fn from_join(
        kind: LoopKind,
        joined: Result<Result<LoopStats, RuntimeError>, JoinError>,
    ) -> Self {
        match joined {
            Ok(Ok(stats)) => {
                info!(
                    "{} loop: {} ticks, {} sent, {} failed",
                    kind, stats.ticks, stats.sent, stats.failed
                );
                LoopOutcome::Finished(stats)
            }
            Ok(Err(e)) => {
                error!("{} loop failed: {}", kind, e);
                LoopOutcome::Failed(e)
            }
            Err(e) => {
                error!("{} loop did not finish: {}", kind, e);
                LoopOutcome::Panicked(e.to_string())
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, LoopOutcome::Finished(_))
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub exit: ExitReason,
    pub motor: LoopOutcome,
    pub steering: LoopOutcome,
}

impl SessionReport {
    /// Both loops ran until asked to stop
    pub fn is_clean(&self) -> bool {
        self.motor.is_finished() && self.steering.is_finished()
    }
}

/// Run one control session against the rover in `config`
///
/// Returns once the event loop has ended and both rate loops have been
/// joined. The command socket is closed before returning; the caller owns
/// `input` and releases it afterwards.
pub fn run_session<I: InputSource + ?Sized>(
    input: &mut I,
    config: &ControlConfig,
) -> Result<SessionReport, RuntimeError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("rate-loop")
        .enable_all()
        .build()
        .map_err(RuntimeError::Startup)?;

    let sender = rt
        .block_on(UdpSender::bind(config.rover))
        .map_err(RuntimeError::Bind)?;

    let ctx = LoopContext {
        state: SharedSnapshot::new(input.snapshot()),
        sender: Arc::new(sender),
        running: RunningFlag::new(),
        max_send_failures: config.max_send_failures,
    };

    info!("Session started: {} -> {}", input.name(), ctx.sender.dest());

    let motor = rt.spawn(motor_loop(ctx.clone(), config.motor_period));
    let steering = rt.spawn(steering_loop(ctx.clone(), config.steering_period));

    // SIGINT becomes a quit request for the event loop
    let (interrupt_tx, mut interrupts) = mpsc::channel(1);
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(()).await;
        }
    });

    let exit = event_loop(
        input,
        &ctx.state,
        &ctx.running,
        config.exit_button,
        config.event_poll_timeout,
        &mut interrupts,
    );

    // Both loops must be done before the socket goes away
    let (motor, steering) = rt.block_on(async { (motor.await, steering.await) });
    let motor = LoopOutcome::from_join(LoopKind::Motor, motor);
    let steering = LoopOutcome::from_join(LoopKind::Steering, steering);

    drop(ctx);
    rt.shutdown_timeout(Duration::from_millis(100));

    let exit = exit?;
    info!("Session ended: {:?}", exit);
    Ok(SessionReport {
        exit,
        motor,
        steering,
    })
}
