// Keyboard controller: A/D steer, W forward, S reverse, R/F level, B exit, Q quit
//
// The terminal only reports presses and auto-repeats, never releases, so a
// held key is assumed released once it stops repeating for HOLD_TIMEOUT.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::IsTerminal;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{axis, ControllerSnapshot, InputError, InputEvent, InputSource, TRIGGER_REST};

/// Stick / trigger deflection per level
const LEVELS: [f32; 3] = [0.25, 0.5, 1.0];
const LEVEL_NAMES: [&str; 3] = ["LOW", "MED", "HIGH"];

/// Keys not repeated within this window count as released
const HOLD_TIMEOUT: Duration = Duration::from_millis(100);

/// Key bound to the exit button
const EXIT_KEY: char = 'b';
const EXIT_KEY_BUTTON: usize = 1;

/// Emulated controller state driven by key presses
#[derive(Debug)]
struct KeyMap {
    snapshot: ControllerSnapshot,
    level: usize,
    last_motion: Instant,
}

impl KeyMap {
    fn new() -> Self {
        Self {
            snapshot: ControllerSnapshot::default(),
            level: 0,
            last_motion: Instant::now(),
        }
    }

    /// Trigger raw value for the current level (rest = -1, full = 1)
    fn trigger_value(&self) -> f32 {
        TRIGGER_REST + 2.0 * LEVELS[self.level]
    }

    fn hold(&mut self, index: usize, value: f32) {
        self.snapshot.set_axis(index, value);
        self.last_motion = Instant::now();
    }

    /// Return everything to rest once keys stop repeating
    fn expire(&mut self, now: Instant) {
        if now.duration_since(self.last_motion) > HOLD_TIMEOUT {
            self.snapshot = ControllerSnapshot::default();
        }
    }

    fn apply(&mut self, key: KeyEvent) -> Option<InputEvent> {
        let pressed = key.kind == KeyEventKind::Press || key.kind == KeyEventKind::Repeat;
        if !pressed {
            return None;
        }

        match key.code {
            // Raw mode swallows SIGINT, so Ctrl-C arrives as a key
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(InputEvent::Quit)
            }
            KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),

            // Steering
            KeyCode::Char('a') | KeyCode::Left => {
                self.hold(axis::LEFT_X, -LEVELS[self.level]);
                None
            }
            KeyCode::Char('d') | KeyCode::Right => {
                self.hold(axis::LEFT_X, LEVELS[self.level]);
                None
            }

            // Drive: the latest direction wins
            KeyCode::Char('w') | KeyCode::Up => {
                self.snapshot.set_axis(axis::LEFT_TRIGGER, TRIGGER_REST);
                self.hold(axis::RIGHT_TRIGGER, self.trigger_value());
                None
            }
            KeyCode::Char('s') | KeyCode::Down => {
                self.snapshot.set_axis(axis::RIGHT_TRIGGER, TRIGGER_REST);
                self.hold(axis::LEFT_TRIGGER, self.trigger_value());
                None
            }

            // Level
            KeyCode::Char('r') => {
                self.level = (self.level + 1).min(LEVELS.len() - 1);
                info!("Level: {}", LEVEL_NAMES[self.level]);
                None
            }
            KeyCode::Char('f') => {
                self.level = self.level.saturating_sub(1);
                info!("Level: {}", LEVEL_NAMES[self.level]);
                None
            }

            KeyCode::Char(EXIT_KEY) if key.kind == KeyEventKind::Press => {
                self.snapshot.set_button(EXIT_KEY_BUTTON, true);
                self.last_motion = Instant::now();
                Some(InputEvent::ButtonDown(EXIT_KEY_BUTTON))
            }

            _ => None,
        }
    }
}

/// Terminal keyboard acting as a controller
///
/// Puts the terminal into raw mode for its lifetime.
pub struct KeyboardInput {
    keys: KeyMap,
}

impl KeyboardInput {
    pub fn open() -> Result<Self, InputError> {
        if !std::io::stdin().is_terminal() {
            return Err(InputError::Unavailable(
                "keyboard input needs an interactive terminal".to_string(),
            ));
        }
        enable_raw_mode()?;
        info!("Controls: A/D=steer, W/S=drive, R/F=level, B=exit, Q=quit");
        info!("Level: {}", LEVEL_NAMES[0]);
        Ok(Self {
            keys: KeyMap::new(),
        })
    }
}

impl InputSource for KeyboardInput {
    fn name(&self) -> &str {
        "keyboard"
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>, InputError> {
        let mut result = None;
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                result = self.keys.apply(key);
            }
        }
        self.keys.expire(Instant::now());
        Ok(result)
    }

    fn snapshot(&self) -> ControllerSnapshot {
        self.keys.snapshot
    }
}

impl Drop for KeyboardInput {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_quit_keys() {
        let mut keys = KeyMap::new();
        assert_eq!(keys.apply(press(KeyCode::Char('q'))), Some(InputEvent::Quit));
        assert_eq!(keys.apply(press(KeyCode::Esc)), Some(InputEvent::Quit));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(keys.apply(ctrl_c), Some(InputEvent::Quit));
    }

    #[test]
    fn test_exit_key_is_button_one() {
        let mut keys = KeyMap::new();
        assert_eq!(
            keys.apply(press(KeyCode::Char('b'))),
            Some(InputEvent::ButtonDown(1))
        );
        assert!(keys.snapshot.button(1));
    }

    #[test]
    fn test_steering_and_drive_keys() {
        let mut keys = KeyMap::new();
        keys.apply(press(KeyCode::Char('d')));
        keys.apply(press(KeyCode::Char('w')));
        assert_eq!(keys.snapshot.axis(axis::LEFT_X), 0.25);
        assert_eq!(keys.snapshot.axis(axis::RIGHT_TRIGGER), -0.5);
        assert_eq!(keys.snapshot.axis(axis::LEFT_TRIGGER), -1.0);

        // Highest level gives full deflection
        keys.apply(press(KeyCode::Char('r')));
        keys.apply(press(KeyCode::Char('r')));
        keys.apply(press(KeyCode::Char('r')));
        keys.apply(press(KeyCode::Char('a')));
        keys.apply(press(KeyCode::Char('s')));
        assert_eq!(keys.snapshot.axis(axis::LEFT_X), -1.0);
        assert_eq!(keys.snapshot.axis(axis::LEFT_TRIGGER), 1.0);
    }

    #[test]
    fn test_switching_direction_releases_other_trigger() {
        let mut keys = KeyMap::new();
        keys.apply(press(KeyCode::Char('w')));

        // Holding 's' keeps refreshing the hold window
        let repeat = KeyEvent {
            kind: KeyEventKind::Repeat,
            ..press(KeyCode::Char('s'))
        };
        for _ in 0..20 {
            keys.apply(repeat);
            keys.expire(Instant::now());
        }

        assert_eq!(keys.snapshot.axis(axis::RIGHT_TRIGGER), TRIGGER_REST);
        assert_eq!(keys.snapshot.axis(axis::LEFT_TRIGGER), -0.5);
        let speed = crate::drive::motor_speed(
            f64::from(keys.snapshot.axis(axis::RIGHT_TRIGGER)),
            f64::from(keys.snapshot.axis(axis::LEFT_TRIGGER)),
        );
        assert!(speed.value() < 0, "expected reverse, got {}", speed.value());

        // And back to forward
        keys.apply(press(KeyCode::Char('w')));
        assert_eq!(keys.snapshot.axis(axis::LEFT_TRIGGER), TRIGGER_REST);
        assert_eq!(keys.snapshot.axis(axis::RIGHT_TRIGGER), -0.5);
    }

    #[test]
    fn test_level_saturates() {
        let mut keys = KeyMap::new();
        keys.apply(press(KeyCode::Char('f')));
        assert_eq!(keys.level, 0);
        for _ in 0..5 {
            keys.apply(press(KeyCode::Char('r')));
        }
        assert_eq!(keys.level, LEVELS.len() - 1);
    }

    #[test]
    fn test_held_keys_expire() {
        let mut keys = KeyMap::new();
        keys.apply(press(KeyCode::Char('d')));
        keys.apply(press(KeyCode::Char('b')));

        // Still within the repeat window
        keys.expire(keys.last_motion + Duration::from_millis(50));
        assert_eq!(keys.snapshot.axis(axis::LEFT_X), 0.25);

        keys.expire(keys.last_motion + Duration::from_millis(150));
        assert_eq!(keys.snapshot.axis(axis::LEFT_X), 0.0);
        assert_eq!(keys.snapshot.axis(axis::RIGHT_TRIGGER), TRIGGER_REST);
        assert!(!keys.snapshot.button(1));
    }
}
