// Physical gamepad through gilrs
//
// Uses the first pad connected at startup. Button indices follow the Xbox
// layout (A=0, B=1, X=2, Y=3, ...). Analogue triggers report [0, 1] and are
// rescaled to the [-1, 1] range used everywhere else.

use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{axis, ControllerSnapshot, InputError, InputEvent, InputSource};

/// Gilrs buttons in index order
const BUTTONS: [Button; 12] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
];

fn button_index(button: Button) -> Option<usize> {
    BUTTONS.iter().position(|&b| b == button)
}

/// Trigger pressure in [0, 1] mapped to [-1, 1]
fn trigger_raw(pad: &Gamepad<'_>, button: Button) -> f32 {
    let pressure = pad.button_data(button).map(|d| d.value()).unwrap_or_default();
    pressure * 2.0 - 1.0
}

pub struct GamepadInput {
    gilrs: Gilrs,
    id: GamepadId,
    name: String,
}

impl GamepadInput {
    /// Open the first connected gamepad
    pub fn open() -> Result<Self, InputError> {
        let gilrs = Gilrs::new().map_err(|e| InputError::Unavailable(e.to_string()))?;

        let (id, name) = {
            let (id, pad) = gilrs.gamepads().next().ok_or(InputError::NoController)?;
            (id, pad.name().to_string())
        };
        info!("Controller connected: {}", name);

        Ok(Self { gilrs, id, name })
    }
}

impl InputSource for GamepadInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>, InputError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event_blocking(Some(timeout)) else {
            return Ok(None);
        };
        if id != self.id {
            return Ok(None);
        }

        match event {
            EventType::ButtonPressed(button, _) => {
                Ok(button_index(button).map(InputEvent::ButtonDown))
            }
            EventType::Disconnected => {
                warn!("Controller {} disconnected", self.name);
                Ok(Some(InputEvent::Quit))
            }
            other => {
                debug!("Ignoring controller event {:?}", other);
                Ok(None)
            }
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        let pad = self.gilrs.gamepad(self.id);
        let mut snapshot = ControllerSnapshot::default();

        // gilrs reports stick Y up-positive; the rover mapping expects down-positive
        snapshot.set_axis(axis::LEFT_X, pad.value(Axis::LeftStickX));
        snapshot.set_axis(axis::LEFT_Y, -pad.value(Axis::LeftStickY));
        snapshot.set_axis(axis::RIGHT_X, pad.value(Axis::RightStickX));
        snapshot.set_axis(axis::RIGHT_Y, -pad.value(Axis::RightStickY));
        snapshot.set_axis(axis::LEFT_TRIGGER, trigger_raw(&pad, Button::LeftTrigger2));
        snapshot.set_axis(axis::RIGHT_TRIGGER, trigger_raw(&pad, Button::RightTrigger2));

        for (i, &button) in BUTTONS.iter().enumerate() {
            snapshot.set_button(i, pad.is_pressed(button));
        }
        snapshot
    }
}
