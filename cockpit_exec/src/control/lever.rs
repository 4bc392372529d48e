//! Levers and the key events which drive them

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use comms_if::trident::ControlTarget;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lever magnitude with no modifier held.
pub const LEVER_BASE: f32 = 0.1;

/// Lever magnitude with Option held.
pub const LEVER_OPTION: f32 = 0.25;

/// Lever magnitude with Control held.
pub const LEVER_CONTROL: f32 = 0.5;

/// Lever magnitude with Shift held.
pub const LEVER_SHIFT: f32 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Modifier keys held at the time of a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
}

/// A single key transition from the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    pub transition: KeyTransition,
}

/// Current position of every lever, each in `[0.0, 1.0]`.
///
/// Opposing levers are never both non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LeverState {
    pub left: f32,
    pub right: f32,
    pub forward: f32,
    pub backward: f32,
    pub up: f32,
    pub down: f32,
}

/// Setpoint derived from the levers, each axis in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Setpoint {
    pub pitch: f32,
    pub yaw: f32,
    pub thrust: f32,
    pub lift: f32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A key the operator can press. Only the arrows and `w`/`s` drive levers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    Char(char),
}

/// Whether a key was pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// One of the levers, grouped in opposing pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lever {
    /// Yaw left
    Left,
    /// Yaw right
    Right,
    /// Thrust forward
    Forward,
    /// Thrust backward
    Backward,
    /// Pitch up
    Up,
    /// Pitch down
    Down,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, control: false, option: false };

    /// Magnitude a lever is set to when its key goes down with these modifiers held.
    ///
    /// Shift takes priority over Control, which takes priority over Option.
    pub fn lever_magnitude(&self) -> f32 {
        if self.shift {
            LEVER_SHIFT
        }
        else if self.control {
            LEVER_CONTROL
        }
        else if self.option {
            LEVER_OPTION
        }
        else {
            LEVER_BASE
        }
    }
}

impl KeyEvent {
    pub fn down(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers, transition: KeyTransition::Down }
    }

    pub fn up(key: Key) -> Self {
        Self { key, modifiers: Modifiers::NONE, transition: KeyTransition::Up }
    }
}

impl Lever {
    /// The lever a key controls, or `None` if the key isn't a control key.
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::UpArrow => Some(Lever::Forward),
            Key::DownArrow => Some(Lever::Backward),
            Key::LeftArrow => Some(Lever::Left),
            Key::RightArrow => Some(Lever::Right),
            // Physical key, so shift doesn't matter
            Key::Char(c) => match c.to_ascii_lowercase() {
                'w' => Some(Lever::Up),
                's' => Some(Lever::Down),
                _ => None
            }
        }
    }

    /// The lever acting on the same axis in the other direction.
    pub fn opposite(&self) -> Self {
        match self {
            Lever::Left => Lever::Right,
            Lever::Right => Lever::Left,
            Lever::Forward => Lever::Backward,
            Lever::Backward => Lever::Forward,
            Lever::Up => Lever::Down,
            Lever::Down => Lever::Up,
        }
    }
}

impl LeverState {
    pub fn get(&self, lever: Lever) -> f32 {
        match lever {
            Lever::Left => self.left,
            Lever::Right => self.right,
            Lever::Forward => self.forward,
            Lever::Backward => self.backward,
            Lever::Up => self.up,
            Lever::Down => self.down,
        }
    }

    fn get_mut(&mut self, lever: Lever) -> &mut f32 {
        match lever {
            Lever::Left => &mut self.left,
            Lever::Right => &mut self.right,
            Lever::Forward => &mut self.forward,
            Lever::Backward => &mut self.backward,
            Lever::Up => &mut self.up,
            Lever::Down => &mut self.down,
        }
    }

    /// Apply a key event to the levers.
    ///
    /// Key down sets the lever to the magnitude selected by the modifiers and clears its
    /// opposite. Key up clears the lever. Returns false if the key doesn't drive a lever, in which
    /// case nothing is changed.
    pub fn apply(&mut self, event: &KeyEvent) -> bool {
        let lever = match Lever::from_key(event.key) {
            Some(l) => l,
            None => return false
        };

        match event.transition {
            KeyTransition::Down => {
                *self.get_mut(lever) = event.modifiers.lever_magnitude();
                *self.get_mut(lever.opposite()) = 0.0;
            },
            KeyTransition::Up => *self.get_mut(lever) = 0.0
        }

        true
    }

    /// Derive the setpoint from the current lever positions.
    pub fn setpoint(&self) -> Setpoint {
        Setpoint {
            pitch: self.down - self.up,
            yaw: self.right - self.left,
            thrust: self.forward - self.backward,
            lift: 0.0,
        }
    }
}

impl Setpoint {
    /// True if the pitch, yaw and thrust axes are all exactly zero.
    pub fn is_zero(&self) -> bool {
        self.pitch == 0.0 && self.yaw == 0.0 && self.thrust == 0.0
    }

    /// Build the control target message for this setpoint.
    pub fn to_control_target(&self, actuator_id: &str) -> ControlTarget {
        ControlTarget {
            id: actuator_id.to_string(),
            pitch: self.pitch,
            yaw: self.yaw,
            thrust: self.thrust,
            lift: self.lift,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
