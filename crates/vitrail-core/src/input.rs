//! Terminal input decoding: raw bytes to input records and button states.
//!
//! The decoder consumes one batch of raw bytes read from the terminal fd
//! and produces [`InputRecord`]s plus keyboard/mouse state snapshots. Click
//! versus press synthesis and held-key repopulation run afterwards on the
//! state snapshots, under the same pause critical section as dispatch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::geometry::Position;

bitflags! {
    /// Input classification flags carried by records and handler criteria.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Criteria: u64 {
        /// A printable key press; the record carries the byte.
        const KEY_PRESS = 1 << 0;
        /// Enter.
        const ENTER = 1 << 1;
        /// Backspace.
        const BACKSPACE = 1 << 2;
        /// Tab.
        const TAB = 1 << 3;
        /// Escape.
        const ESCAPE = 1 << 4;
        /// Arrow up.
        const UP = 1 << 5;
        /// Arrow down.
        const DOWN = 1 << 6;
        /// Arrow left.
        const LEFT = 1 << 7;
        /// Arrow right.
        const RIGHT = 1 << 8;
        /// Shift modifier.
        const SHIFT = 1 << 9;
        /// Control modifier.
        const CONTROL = 1 << 10;
        /// Alt modifier.
        const ALT = 1 << 11;
        /// Super modifier.
        const SUPER = 1 << 12;
        /// Left button released before the press cooldown.
        const MOUSE_LEFT_CLICKED = 1 << 13;
        /// Left button held past the press cooldown.
        const MOUSE_LEFT_PRESSED = 1 << 14;
        /// Middle button click.
        const MOUSE_MIDDLE_CLICKED = 1 << 15;
        /// Middle button press.
        const MOUSE_MIDDLE_PRESSED = 1 << 16;
        /// Right button click.
        const MOUSE_RIGHT_CLICKED = 1 << 17;
        /// Right button press.
        const MOUSE_RIGHT_PRESSED = 1 << 18;
        /// Scroll wheel up.
        const MOUSE_SCROLL_UP = 1 << 19;
        /// Scroll wheel down.
        const MOUSE_SCROLL_DOWN = 1 << 20;
    }
}

/// Symbolic key names for the keyboard-state map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Enter.
    Enter,
    /// Tab.
    Tab,
    /// Backspace.
    Backspace,
    /// Escape.
    Escape,
    /// Shift.
    Shift,
    /// Control.
    Control,
    /// Alt.
    Alt,
    /// Super.
    Super,
    /// Left mouse button.
    MouseLeft,
    /// Middle mouse button.
    MouseMiddle,
    /// Right mouse button.
    MouseRight,
    /// Scroll wheel up, one-shot.
    MouseScrollUp,
    /// Scroll wheel down, one-shot.
    MouseScrollDown,
}

impl Key {
    /// The criteria flag a held key repopulates.
    pub fn criteria(self) -> Criteria {
        match self {
            Key::Up => Criteria::UP,
            Key::Down => Criteria::DOWN,
            Key::Left => Criteria::LEFT,
            Key::Right => Criteria::RIGHT,
            Key::Enter => Criteria::ENTER,
            Key::Tab => Criteria::TAB,
            Key::Backspace => Criteria::BACKSPACE,
            Key::Escape => Criteria::ESCAPE,
            Key::Shift => Criteria::SHIFT,
            Key::Control => Criteria::CONTROL,
            Key::Alt => Criteria::ALT,
            Key::Super => Criteria::SUPER,
            Key::MouseScrollUp => Criteria::MOUSE_SCROLL_UP,
            Key::MouseScrollDown => Criteria::MOUSE_SCROLL_DOWN,
            Key::MouseLeft => Criteria::MOUSE_LEFT_PRESSED,
            Key::MouseMiddle => Criteria::MOUSE_MIDDLE_PRESSED,
            Key::MouseRight => Criteria::MOUSE_RIGHT_PRESSED,
        }
    }
}

/// State of one button with the time it was captured.
#[derive(Clone, Copy, Debug)]
pub struct ButtonState {
    /// Whether the button is currently down.
    pub pressed: bool,
    /// When this state was recorded.
    pub capture_time: Instant,
}

impl ButtonState {
    /// Create a state captured now.
    pub fn new(pressed: bool, now: Instant) -> Self {
        Self {
            pressed,
            capture_time: now,
        }
    }
}

/// Current and previous keyboard-state snapshots.
#[derive(Clone, Debug, Default)]
pub struct KeyboardStates {
    current: HashMap<Key, ButtonState>,
    previous: HashMap<Key, ButtonState>,
}

impl KeyboardStates {
    /// Create empty state maps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the current snapshot to previous and clear current. POSIX input
    /// carries no per-key release info, so each batch rebuilds the map.
    pub fn snapshot(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Record a key state in the current snapshot.
    pub fn set(&mut self, key: Key, pressed: bool, now: Instant) {
        self.current.insert(key, ButtonState::new(pressed, now));
    }

    /// Whether the key is down in the current snapshot.
    pub fn pressed(&self, key: Key) -> bool {
        self.current.get(&key).is_some_and(|s| s.pressed)
    }

    /// Whether the key was down in the previous snapshot.
    pub fn was_pressed(&self, key: Key) -> bool {
        self.previous.get(&key).is_some_and(|s| s.pressed)
    }

    /// How long the key has been held as of `now`. Zero when unknown.
    pub fn held_for(&self, key: Key, now: Instant) -> Duration {
        self.current
            .get(&key)
            .map(|s| now.saturating_duration_since(s.capture_time))
            .unwrap_or(Duration::ZERO)
    }

    /// Keys that are down in the current snapshot.
    pub fn pressed_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.current
            .iter()
            .filter(|(_, s)| s.pressed)
            .map(|(k, _)| *k)
    }
}

/// One decoded input event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputRecord {
    /// The raw byte for KEY_PRESS and ALT records, zero otherwise.
    pub data: u8,
    /// Mouse column for coordinate-carrying records.
    pub x: i32,
    /// Mouse row for coordinate-carrying records.
    pub y: i32,
    /// Magnitude of scroll-like inputs.
    pub scale: i32,
    /// Classification of this record.
    pub criteria: Criteria,
}

impl InputRecord {
    /// Create a keyboard record.
    pub fn key(data: u8, criteria: Criteria) -> Self {
        Self {
            data,
            x: 0,
            y: 0,
            scale: 1,
            criteria,
        }
    }
}

const CTRL_RANGE_START: u8 = 1;
const CTRL_RANGE_END: u8 = 26;
const BACKSPACE_BYTE: u8 = 8;
const TAB_BYTE: u8 = 9;
const LINE_FEED: u8 = 10;
const CARRIAGE_RETURN: u8 = 13;
const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;

/// Decode one batch of raw terminal bytes.
///
/// Snapshots the keyboard states, classifies every sequence in the buffer
/// and updates `mouse` for motion events (replacing, not queuing). Malformed
/// sequences are skipped; decoding resumes at the next unambiguous boundary.
pub fn translate_input(
    raw: &[u8],
    states: &mut KeyboardStates,
    mouse: &mut Position,
    inputs: &mut Vec<InputRecord>,
    now: Instant,
) {
    states.snapshot();
    if raw.is_empty() {
        return;
    }

    let mut i = 0usize;
    while i < raw.len() {
        let byte = raw[i];

        // Shift leaves its trace on uppercase letters and shifted symbols.
        if byte.is_ascii_uppercase() || (b'!'..=b'/').contains(&byte) {
            inputs.push(InputRecord::key(b' ', Criteria::SHIFT));
            states.set(Key::Shift, true, now);
        } else if (CTRL_RANGE_START..=CTRL_RANGE_END).contains(&byte) && byte != ESC {
            match byte {
                BACKSPACE_BYTE => {
                    inputs.push(InputRecord::key(b' ', Criteria::BACKSPACE));
                    states.set(Key::Backspace, true, now);
                }
                TAB_BYTE => {
                    inputs.push(InputRecord::key(b' ', Criteria::TAB));
                    states.set(Key::Tab, true, now);
                }
                LINE_FEED | CARRIAGE_RETURN => {
                    inputs.push(InputRecord::key(b'\n', Criteria::ENTER));
                    states.set(Key::Enter, true, now);
                }
                _ => {
                    // Control plus a letter; recover the letter from the
                    // ACC offset.
                    inputs.push(InputRecord::key(byte + b'A' - 1, Criteria::CONTROL));
                    states.set(Key::Control, true, now);
                }
            }
        }

        if byte == ESC {
            if i + 1 >= raw.len() {
                inputs.push(InputRecord::key(b' ', Criteria::ESCAPE));
                states.set(Key::Escape, true, now);
                break;
            }
            i += 1;

            if raw[i] == b'[' {
                // Optional modifier prefix "1;m".
                if i + 2 < raw.len() && raw[i + 1] == b'1' && raw[i + 2] == b';' {
                    if let Some(&digit) = raw.get(i + 3) {
                        match digit.wrapping_sub(b'0').wrapping_sub(1) {
                            1 => {
                                inputs.push(InputRecord::key(b' ', Criteria::SHIFT));
                                states.set(Key::Shift, true, now);
                            }
                            2 => {
                                inputs.push(InputRecord::key(b' ', Criteria::ALT));
                                states.set(Key::Alt, true, now);
                            }
                            4 => {
                                inputs.push(InputRecord::key(b' ', Criteria::CONTROL));
                                states.set(Key::Control, true, now);
                            }
                            8 => {
                                inputs.push(InputRecord::key(b' ', Criteria::SUPER));
                                states.set(Key::Super, true, now);
                            }
                            _ => {}
                        }
                    }
                    i += 3;
                }

                match raw.get(i + 1) {
                    Some(b'A') => {
                        inputs.push(InputRecord::key(0, Criteria::UP));
                        states.set(Key::Up, true, now);
                        i += 1;
                    }
                    Some(b'B') => {
                        inputs.push(InputRecord::key(0, Criteria::DOWN));
                        states.set(Key::Down, true, now);
                        i += 1;
                    }
                    Some(b'C') => {
                        inputs.push(InputRecord::key(0, Criteria::RIGHT));
                        states.set(Key::Right, true, now);
                        i += 1;
                    }
                    Some(b'D') => {
                        inputs.push(InputRecord::key(0, Criteria::LEFT));
                        states.set(Key::Left, true, now);
                        i += 1;
                    }
                    Some(b'Z') => {
                        inputs.push(InputRecord::key(b' ', Criteria::SHIFT));
                        inputs.push(InputRecord::key(b' ', Criteria::TAB));
                        states.set(Key::Shift, true, now);
                        states.set(Key::Tab, true, now);
                        i += 1;
                    }
                    Some(b'M') => {
                        i = decode_x10_mouse(raw, i, states, mouse, inputs, now);
                    }
                    Some(b'<') => {
                        i = decode_sgr_mouse(raw, i + 2, states, mouse, inputs, now);
                    }
                    _ => {}
                }
            } else {
                // ESC followed by anything but '[' is Alt plus that key.
                inputs.push(InputRecord::key(raw[i], Criteria::ALT));
                states.set(Key::Alt, true, now);
            }
        } else if (0x20..=0x7e).contains(&byte) {
            inputs.push(InputRecord::key(byte, Criteria::KEY_PRESS));
        } else if byte == DEL {
            inputs.push(InputRecord::key(b' ', Criteria::BACKSPACE));
            states.set(Key::Backspace, true, now);
        }

        i += 1;
    }
}

/// X10 mouse: `ESC [ M b x y`, coordinates offset by 32 and then by one so
/// the top-left cell is actionable. `i` points at the '[' position plus one
/// ('M'); returns the index of the last consumed byte.
fn decode_x10_mouse(
    raw: &[u8],
    i: usize,
    states: &mut KeyboardStates,
    mouse: &mut Position,
    inputs: &mut Vec<InputRecord>,
    now: Instant,
) -> usize {
    let Some(&mask_byte) = raw.get(i + 2) else {
        return raw.len();
    };
    let mut mask = mask_byte;

    if mask & 4 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::SHIFT));
        states.set(Key::Shift, true, now);
        mask &= !4;
    }
    if mask & 8 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::SUPER));
        states.set(Key::Super, true, now);
        mask &= !8;
    }
    if mask & 16 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::CONTROL));
        states.set(Key::Control, true, now);
        mask &= !16;
    }
    mask &= !32;

    if mask & 64 != 0 {
        if let (Some(&x), Some(&y)) = (raw.get(i + 3), raw.get(i + 4)) {
            mouse.x = (i32::from(x) - 32 - 1).max(0);
            mouse.y = (i32::from(y) - 32 - 1).max(0);
        }
        mask &= !64;
    }
    mask &= !128;

    match mask {
        0 => states.set(Key::MouseLeft, true, now),
        1 => states.set(Key::MouseMiddle, true, now),
        2 => states.set(Key::MouseRight, true, now),
        3 => {
            states.set(Key::MouseLeft, false, now);
            states.set(Key::MouseMiddle, false, now);
            states.set(Key::MouseRight, false, now);
        }
        _ => {}
    }

    i + 4
}

/// SGR mouse: `ESC [ < b ; x ; y (M|m)`, coordinates taken as reported.
/// `start` points at the first byte after '<'; returns the index of the
/// final action byte.
fn decode_sgr_mouse(
    raw: &[u8],
    start: usize,
    states: &mut KeyboardStates,
    mouse: &mut Position,
    inputs: &mut Vec<InputRecord>,
    now: Instant,
) -> usize {
    let mut k = start;
    let parse_number = |raw: &[u8], k: &mut usize| -> i32 {
        let mut value = 0i32;
        while let Some(&digit) = raw.get(*k) {
            if !digit.is_ascii_digit() {
                break;
            }
            value = value * 10 + i32::from(digit - b'0');
            *k += 1;
        }
        value
    };

    let mask = parse_number(raw, &mut k);
    if raw.get(k) == Some(&b';') {
        k += 1;
    }
    let x = parse_number(raw, &mut k);
    if raw.get(k) == Some(&b';') {
        k += 1;
    }
    let y = parse_number(raw, &mut k);
    let action = raw.get(k).copied().unwrap_or(0);

    mouse.x = x.max(0);
    mouse.y = y.max(0);

    if mask & 4 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::SHIFT));
        states.set(Key::Shift, true, now);
    }
    if mask & 8 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::ALT));
        states.set(Key::Alt, true, now);
    }
    if mask & 16 != 0 {
        inputs.push(InputRecord::key(b' ', Criteria::CONTROL));
        states.set(Key::Control, true, now);
    }

    if mask & 64 != 0 {
        // Scroll events are one-shot: the dispatcher consumes the state on
        // the next event tick.
        if mask & 1 == 0 {
            states.set(Key::MouseScrollUp, true, now);
            states.set(Key::MouseScrollDown, false, now);
        } else {
            states.set(Key::MouseScrollDown, true, now);
            states.set(Key::MouseScrollUp, false, now);
        }
        return k;
    }

    let pressed = action == b'M';
    match mask & 0x03 {
        0 => states.set(Key::MouseLeft, pressed, now),
        1 => states.set(Key::MouseMiddle, pressed, now),
        2 => states.set(Key::MouseRight, pressed, now),
        _ => {
            states.set(Key::MouseLeft, false, now);
            states.set(Key::MouseMiddle, false, now);
            states.set(Key::MouseRight, false, now);
        }
    }

    k
}

/// Synthesize click and press records from button-state timing.
///
/// A button held at least `cooldown` emits a press record every tick; a
/// down-to-up edge before that emits a single click record.
pub fn synthesize_mouse_actions(
    states: &KeyboardStates,
    cooldown: Duration,
    now: Instant,
    inputs: &mut Vec<InputRecord>,
) {
    let buttons = [
        (
            Key::MouseLeft,
            Criteria::MOUSE_LEFT_PRESSED,
            Criteria::MOUSE_LEFT_CLICKED,
        ),
        (
            Key::MouseRight,
            Criteria::MOUSE_RIGHT_PRESSED,
            Criteria::MOUSE_RIGHT_CLICKED,
        ),
        (
            Key::MouseMiddle,
            Criteria::MOUSE_MIDDLE_PRESSED,
            Criteria::MOUSE_MIDDLE_CLICKED,
        ),
    ];
    for (key, pressed_criteria, clicked_criteria) in buttons {
        if states.pressed(key) {
            if states.held_for(key, now) >= cooldown {
                inputs.push(InputRecord::key(0, pressed_criteria));
            }
        } else if states.was_pressed(key) {
            inputs.push(InputRecord::key(0, clicked_criteria));
        }
    }
}

/// Re-populate records for keys still held down so hold behavior stays
/// continuous across ticks. Mouse buttons and scroll one-shots are skipped;
/// they have their own synthesis.
pub fn populate_inputs_for_held_keys(states: &KeyboardStates, inputs: &mut Vec<InputRecord>) {
    for key in states.pressed_keys() {
        if matches!(
            key,
            Key::MouseLeft
                | Key::MouseMiddle
                | Key::MouseRight
                | Key::MouseScrollUp
                | Key::MouseScrollDown
        ) {
            continue;
        }
        let criteria = key.criteria();
        if !inputs.iter().any(|record| record.criteria == criteria) {
            inputs.push(InputRecord::key(0, criteria));
        }
    }
}
