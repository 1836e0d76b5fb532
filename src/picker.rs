//! Color picker dialog
//!
//! The dialog is seeded with a light's current custom color and ends in
//! either a confirmed color or a cancellation.

use crate::light::{LightIndex, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Confirmed(Rgb),
    Cancelled,
}

/// Hex-entry color dialog for one light
#[derive(Debug, Clone)]
pub struct ColorPickerDialog {
    light: LightIndex,
    initial: Rgb,
    buffer: String,
}

impl ColorPickerDialog {
    pub fn open(light: LightIndex, initial: Rgb) -> Self {
        Self {
            light,
            initial,
            buffer: initial.to_hex(),
        }
    }

    pub fn light(&self) -> LightIndex {
        self.light
    }

    pub fn initial(&self) -> Rgb {
        self.initial
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Live preview of the buffer, if it currently parses
    pub fn preview(&self) -> Option<Rgb> {
        Rgb::from_hex(&self.buffer)
    }

    /// Accept an optional leading `#` and at most six hex digits
    pub fn push(&mut self, c: char) {
        let digits = self.buffer.trim_start_matches('#').len();
        let accepted = match c {
            '#' => self.buffer.is_empty(),
            c => c.is_ascii_hexdigit() && digits < 6,
        };
        if accepted {
            self.buffer.push(c.to_ascii_uppercase());
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Confirm the dialog. A buffer that is not a color counts as cancel.
    pub fn confirm(self) -> PickerOutcome {
        match self.preview() {
            Some(color) => PickerOutcome::Confirmed(color),
            None => PickerOutcome::Cancelled,
        }
    }

    pub fn cancel(self) -> PickerOutcome {
        PickerOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> LightIndex {
        LightIndex::new(1).unwrap()
    }

    #[test]
    fn test_dialog_is_seeded_with_initial_color() {
        let dialog = ColorPickerDialog::open(light(), Rgb::new(255, 165, 0));
        assert_eq!(dialog.buffer(), "#FFA500");
        assert_eq!(dialog.preview(), Some(Rgb::new(255, 165, 0)));
    }

    #[test]
    fn test_edit_and_confirm() {
        let mut dialog = ColorPickerDialog::open(light(), Rgb::WHITE);
        for _ in 0..6 {
            dialog.backspace();
        }
        for c in "00ff0z0".chars() {
            dialog.push(c);
        }
        assert_eq!(dialog.buffer(), "#00FF00");
        assert_eq!(dialog.confirm(), PickerOutcome::Confirmed(Rgb::new(0, 255, 0)));
    }

    #[test]
    fn test_incomplete_buffer_confirms_as_cancel() {
        let mut dialog = ColorPickerDialog::open(light(), Rgb::WHITE);
        dialog.backspace();
        assert_eq!(dialog.confirm(), PickerOutcome::Cancelled);
    }

    #[test]
    fn test_digit_cap_without_hash() {
        let mut dialog = ColorPickerDialog::open(light(), Rgb::WHITE);
        for _ in 0..7 {
            dialog.backspace();
        }
        for c in "1234567".chars() {
            dialog.push(c);
        }
        assert_eq!(dialog.buffer(), "123456");
        assert_eq!(dialog.confirm(), PickerOutcome::Confirmed(Rgb::new(0x12, 0x34, 0x56)));
    }

    #[test]
    fn test_hash_only_at_start() {
        let mut dialog = ColorPickerDialog::open(light(), Rgb::WHITE);
        dialog.backspace();
        dialog.push('#');
        assert_eq!(dialog.buffer(), "#FFFFF");
    }

    #[test]
    fn test_buffer_is_capped() {
        let mut dialog = ColorPickerDialog::open(light(), Rgb::WHITE);
        dialog.push('A');
        assert_eq!(dialog.buffer(), "#FFFFFF");
    }
}
