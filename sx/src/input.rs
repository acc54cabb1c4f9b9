//! Input events consumed from the rendering front end
//!
//! The render loop translates its windowing events into these before handing
//! them to the registered handler, which decides between mutating the shared
//! flag (quit keys) and forwarding to the protocol layer.

/// A key reported by the rendering front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Escape,
}

/// A discrete input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPress(Key),
    /// Window close or equivalent quit request
    Quit,
}

impl InputEvent {
    /// Whether this event should terminate the run (quit keys or a close
    /// request). `q` and Escape mirror the conventional quit bindings.
    pub fn is_quit(&self) -> bool {
        match self {
            InputEvent::Quit => true,
            InputEvent::KeyPress(Key::Escape) => true,
            InputEvent::KeyPress(Key::Char(c)) => *c == 'q',
            InputEvent::KeyPress(_) => false,
        }
    }
}
