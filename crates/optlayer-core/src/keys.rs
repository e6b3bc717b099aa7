//! Virtual-key combinations for keybinding options
//!
//! Combos are written as key names joined by `, ` (`"CTRL, SHIFT, Q"`).
//! Parsing also accepts raw `0x`-prefixed key codes. A single unknown key
//! rejects the whole combo.

use optlayer_conf::ConfigValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// A single virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualKey(pub u8);

/// An ordered key combination.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VirtualKeys(pub Vec<VirtualKey>);

struct KeyTable {
    by_name: HashMap<&'static str, u8>,
    by_code: HashMap<u8, &'static str>,
}

static KEY_TABLE: LazyLock<KeyTable> = LazyLock::new(|| {
    let mut names: Vec<(&'static [&'static str], u8)> = vec![
        (&["LBUTTON"], 0x01),
        (&["RBUTTON"], 0x02),
        (&["CANCEL"], 0x03),
        (&["MBUTTON"], 0x04),
        (&["XBUTTON1"], 0x05),
        (&["XBUTTON2"], 0x06),
        (&["BACK"], 0x08),
        (&["TAB"], 0x09),
        (&["CLEAR"], 0x0C),
        (&["ENTER", "RETURN"], 0x0D),
        (&["SHFT", "SHIFT"], 0x10),
        (&["CTRL", "CONTROL"], 0x11),
        (&["ALT", "MENU"], 0x12),
        (&["PAUSE"], 0x13),
        (&["CAPITAL"], 0x14),
        (&["ESCAPE"], 0x1B),
        (&["SPACE"], 0x20),
        (&["PRIOR"], 0x21),
        (&["NEXT"], 0x22),
        (&["END"], 0x23),
        (&["HOME"], 0x24),
        (&["LEFT"], 0x25),
        (&["UP"], 0x26),
        (&["RIGHT"], 0x27),
        (&["DOWN"], 0x28),
        (&["SNAPSHOT"], 0x2C),
        (&["INSERT"], 0x2D),
        (&["DELETE"], 0x2E),
        (&["LWIN"], 0x5B),
        (&["RWIN"], 0x5C),
        (&["MULTIPLY"], 0x6A),
        (&["ADD"], 0x6B),
        (&["SUBTRACT"], 0x6D),
        (&["DECIMAL"], 0x6E),
        (&["DIVIDE"], 0x6F),
        (&["NUMLOCK"], 0x90),
        (&["SCROLL"], 0x91),
        (&["LSHIFT"], 0xA0),
        (&["RSHIFT"], 0xA1),
        (&["LCTRL", "LCONTROL"], 0xA2),
        (&["RCTRL", "RCONTROL"], 0xA3),
        (&["LALT", "LMENU"], 0xA4),
        (&["RALT", "RMENU"], 0xA5),
    ];

    static DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
    static NUMPAD: [&str; 10] = [
        "NUMPAD0", "NUMPAD1", "NUMPAD2", "NUMPAD3", "NUMPAD4", "NUMPAD5", "NUMPAD6", "NUMPAD7",
        "NUMPAD8", "NUMPAD9",
    ];
    static LETTERS: [&str; 26] = [
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
        "S", "T", "U", "V", "W", "X", "Y", "Z",
    ];
    static FUNCTION: [&str; 24] = [
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "F13", "F14",
        "F15", "F16", "F17", "F18", "F19", "F20", "F21", "F22", "F23", "F24",
    ];
    for (offset, name) in DIGITS.iter().enumerate() {
        names.push((std::slice::from_ref(name), 0x30 + offset as u8));
    }
    for (offset, name) in LETTERS.iter().enumerate() {
        names.push((std::slice::from_ref(name), 0x41 + offset as u8));
    }
    for (offset, name) in NUMPAD.iter().enumerate() {
        names.push((std::slice::from_ref(name), 0x60 + offset as u8));
    }
    for (offset, name) in FUNCTION.iter().enumerate() {
        names.push((std::slice::from_ref(name), 0x70 + offset as u8));
    }

    let mut by_name = HashMap::new();
    let mut by_code = HashMap::new();
    for (aliases, code) in names {
        for alias in aliases {
            by_name.insert(*alias, code);
        }
        by_code.insert(code, aliases[0]);
    }
    KeyTable { by_name, by_code }
});

impl VirtualKey {
    /// Look up a key by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        KEY_TABLE
            .by_name
            .get(name.trim().to_ascii_uppercase().as_str())
            .map(|&code| Self(code))
    }

    /// Canonical name, if the code is a known key.
    pub fn name(self) -> Option<&'static str> {
        KEY_TABLE.by_code.get(&self.0).copied()
    }

    pub fn is_valid(self) -> bool {
        self.name().is_some()
    }

    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let key = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => Self(u8::from_str_radix(hex, 16).ok()?),
            None => Self::from_name(token)?,
        };
        key.is_valid().then_some(key)
    }
}

impl VirtualKeys {
    pub fn new(keys: impl IntoIterator<Item = VirtualKey>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ConfigValue for VirtualKeys {
    const TYPE_NAME: &'static str = "virtual key combo";

    fn parse_config(raw: &str) -> Option<Self> {
        let keys = raw
            .split(',')
            .map(VirtualKey::parse)
            .collect::<Option<Vec<_>>>()?;
        (!keys.is_empty()).then_some(Self(keys))
    }

    fn to_config_string(&self) -> String {
        self.0
            .iter()
            .map(|key| key.name().map_or_else(|| format!("0x{:02X}", key.0), str::to_string))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for VirtualKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_config_string())
    }
}
