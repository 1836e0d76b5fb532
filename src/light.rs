//! Light model and toggle resolution
//!
//! Every light owns a `LightState`; turning a light on or off resolves the
//! state into an RGB triple scaled by brightness and renders it as the
//! `"<STATUS>/<r>/<g>/<b>"` payload the transport expects.

use std::fmt;

/// Number of lights controlled by this remote
pub const LIGHT_COUNT: usize = 3;

/// Color names offered by the color selector, in display order
pub const COLOR_NAMES: [&str; 7] = ["WHITE", "RED", "ORANGE", "YELLOW", "GREEN", "BLUE", "PURPLE"];

/// Brightness labels offered by the brightness selector, in display order
pub const BRIGHTNESS_LABELS: [&str; 10] = [
    "100%", "90%", "80%", "70%", "60%", "50%", "40%", "30%", "20%", "10%",
];

const DEFAULT_BRIGHTNESS: u8 = 100;

/// 1-based light number, always within `1..=LIGHT_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightIndex(u8);

impl LightIndex {
    /// Validate a raw light number. Returns `None` outside `1..=LIGHT_COUNT`.
    pub fn new(number: i64) -> Option<Self> {
        if (1..=LIGHT_COUNT as i64).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    /// Caller guarantees `slot < LIGHT_COUNT`
    pub(crate) fn from_slot(slot: usize) -> Self {
        debug_assert!(slot < LIGHT_COUNT);
        Self(slot as u8 + 1)
    }

    /// All light indices in ascending order
    pub fn all() -> impl Iterator<Item = LightIndex> {
        (1..=LIGHT_COUNT as u8).map(LightIndex)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot for array addressing
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for LightIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested on/off status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightStatus {
    On,
    Off,
}

impl LightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LightStatus::On => "ON",
            LightStatus::Off => "OFF",
        }
    }
}

impl fmt::Display for LightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `brightness / 100`, truncating toward zero.
    /// Brightness above 100 is clamped.
    pub fn scaled(self, brightness: u8) -> Rgb {
        let brightness = u16::from(brightness.min(100));
        let scale = |channel: u8| (u16::from(channel) * brightness / 100) as u8;
        Rgb::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Parse `#RRGGBB` or `RRGGBB`
    pub fn from_hex(text: &str) -> Option<Rgb> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::WHITE
    }
}

/// Map a color name to its preset. Unknown names resolve to white.
pub fn color_from_name(name: &str) -> Rgb {
    match name {
        "RED" => Rgb::new(255, 0, 0),
        "ORANGE" => Rgb::new(255, 165, 0),
        "YELLOW" => Rgb::new(255, 255, 0),
        "GREEN" => Rgb::new(0, 255, 0),
        "BLUE" => Rgb::new(0, 0, 255),
        "PURPLE" => Rgb::new(128, 0, 128),
        _ => Rgb::WHITE,
    }
}

/// Parse a percentage label such as `"75%"`. Falls back to 100 on anything
/// that is not an integer in `0..=100`.
pub fn parse_brightness(label: &str) -> u8 {
    label
        .replace('%', "")
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|value| *value <= 100)
        .unwrap_or(DEFAULT_BRIGHTNESS)
}

/// A cyclic choice over a fixed list of labels
#[derive(Debug, Clone)]
pub struct Selector {
    options: &'static [&'static str],
    selected: usize,
}

impl Selector {
    pub fn new(options: &'static [&'static str]) -> Self {
        Self { options, selected: 0 }
    }

    pub fn selected(&self) -> &'static str {
        self.options.get(self.selected).copied().unwrap_or_default()
    }

    /// Select by label; returns false if the label is not offered
    pub fn select(&mut self, label: &str) -> bool {
        match self.options.iter().position(|option| *option == label) {
            Some(position) => {
                self.selected = position;
                true
            }
            None => false,
        }
    }

    pub fn next(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + 1) % self.options.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + self.options.len() - 1) % self.options.len();
        }
    }
}

/// Per-light user selections
#[derive(Debug, Clone)]
pub struct LightState {
    pub color: Selector,
    pub brightness: Selector,
    pub custom_color: Rgb,
    pub use_custom_color: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: Selector::new(&COLOR_NAMES),
            brightness: Selector::new(&BRIGHTNESS_LABELS),
            custom_color: Rgb::WHITE,
            use_custom_color: false,
        }
    }
}

impl LightState {
    /// Color before brightness is applied
    pub fn base_color(&self) -> Rgb {
        if self.use_custom_color {
            self.custom_color
        } else {
            color_from_name(self.color.selected())
        }
    }

    pub fn brightness_percent(&self) -> u8 {
        parse_brightness(self.brightness.selected())
    }

    /// Resolve the outbound toggle message for `status`
    pub fn resolve_toggle(&self, status: LightStatus) -> ToggleMessage {
        ToggleMessage {
            status,
            color: self.base_color().scaled(self.brightness_percent()),
        }
    }
}

/// Outbound toggle payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleMessage {
    pub status: LightStatus,
    pub color: Rgb,
}

impl fmt::Display for ToggleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.status, self.color.r, self.color.g, self.color.b
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_index_bounds() {
        assert!(LightIndex::new(0).is_none());
        assert!(LightIndex::new(4).is_none());
        assert!(LightIndex::new(-1).is_none());
        assert_eq!(LightIndex::new(3).map(LightIndex::slot), Some(2));
        let all: Vec<u8> = LightIndex::all().map(LightIndex::number).collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_scaling_truncates_each_channel() {
        for brightness in 0..=100u8 {
            let scaled = Rgb::new(255, 165, 7).scaled(brightness);
            let expected = |c: u8| (c as u32 * brightness as u32 / 100) as u8;
            assert_eq!(scaled, Rgb::new(expected(255), expected(165), expected(7)));
        }
        // 165 * 0.3 = 49.5 truncates to 49
        assert_eq!(Rgb::new(255, 165, 0).scaled(30), Rgb::new(76, 49, 0));
    }

    #[test]
    fn test_unknown_color_is_white() {
        assert_eq!(color_from_name("MAGENTA"), Rgb::WHITE);
        assert_eq!(color_from_name(""), Rgb::WHITE);
        assert_eq!(color_from_name("red"), Rgb::WHITE);
        assert_eq!(color_from_name("PURPLE"), Rgb::new(128, 0, 128));
    }

    #[test]
    fn test_brightness_parse_fallback() {
        assert_eq!(parse_brightness("75%"), 75);
        assert_eq!(parse_brightness("0%"), 0);
        assert_eq!(parse_brightness("bright"), 100);
        assert_eq!(parse_brightness("150%"), 100);
        assert_eq!(parse_brightness(""), 100);
    }

    #[test]
    fn test_resolve_preset_with_brightness() {
        let mut state = LightState::default();
        assert!(state.color.select("ORANGE"));
        assert!(state.brightness.select("50%"));
        let message = state.resolve_toggle(LightStatus::On);
        assert_eq!(message.to_string(), "ON/127/82/0");
    }

    #[test]
    fn test_custom_color_overrides_preset() {
        let mut state = LightState::default();
        state.color.select("RED");
        state.custom_color = Rgb::new(10, 20, 30);
        state.use_custom_color = true;
        assert_eq!(state.resolve_toggle(LightStatus::Off).to_string(), "OFF/10/20/30");

        state.use_custom_color = false;
        assert_eq!(state.resolve_toggle(LightStatus::Off).to_string(), "OFF/255/0/0");
    }

    #[test]
    fn test_default_state_is_full_white() {
        let state = LightState::default();
        assert_eq!(state.resolve_toggle(LightStatus::On).to_string(), "ON/255/255/255");
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgb::from_hex("#FFA500"), Some(Rgb::new(255, 165, 0)));
        assert_eq!(Rgb::from_hex("0a0b0c"), Some(Rgb::new(10, 11, 12)));
        assert_eq!(Rgb::from_hex("#FFF"), None);
        assert_eq!(Rgb::from_hex("#GG0000"), None);
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102FF");
    }

    #[test]
    fn test_selector_cycles() {
        let mut selector = Selector::new(&COLOR_NAMES);
        selector.previous();
        assert_eq!(selector.selected(), "PURPLE");
        selector.next();
        assert_eq!(selector.selected(), "WHITE");
        assert!(!selector.select("TEAL"));
        assert_eq!(selector.selected(), "WHITE");
    }
}
