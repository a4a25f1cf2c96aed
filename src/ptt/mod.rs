//! Push-to-talk button input
//!
//! Polls a GPIO input pin on a dedicated thread and reports press/release
//! edges to the async side.

mod button;
mod listener;

pub use button::PttEvent;
pub use listener::PttListener;
