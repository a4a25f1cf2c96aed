//! Button level decoding and edge detection

/// Edge reported by the push-to-talk listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttEvent {
    Pressed,
    Released,
}

/// Debounced level of the push-to-talk button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Button is held down
    pub pressed: bool,
}

impl ButtonState {
    /// Decode a sysfs `value` file; the button pulls the line low
    pub fn from_sysfs(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0" => Some(Self { pressed: true }),
            "1" => Some(Self { pressed: false }),
            _ => None,
        }
    }

    /// Edge between `self` and `next`, if any
    pub fn edge(&self, next: ButtonState) -> Option<PttEvent> {
        match (self.pressed, next.pressed) {
            (false, true) => Some(PttEvent::Pressed),
            (true, false) => Some(PttEvent::Released),
            _ => None,
        }
    }
}
