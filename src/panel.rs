//! Per-light control panels
//!
//! Each light gets a panel holding its control handles, its `LightState`
//! and the projected status label/icon. Panels live in a fixed-size array
//! addressed by `LightIndex`.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::light::{LightIndex, LightState, LIGHT_COUNT};

/// Unique identifier of one control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u32);

/// Hands out fresh view ids
#[derive(Debug)]
pub struct ViewIdGenerator {
    next: AtomicU32,
}

impl ViewIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn generate(&self) -> ViewId {
        ViewId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ViewIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Status icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightIcon {
    On,
    Off,
}

/// Handles of every control on one panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelHandles {
    pub container: ViewId,
    pub status_label: ViewId,
    pub icon: ViewId,
    pub color_selector: ViewId,
    pub brightness_selector: ViewId,
    pub edit_color_button: ViewId,
    pub use_custom_toggle: ViewId,
    pub on_button: ViewId,
    pub off_button: ViewId,
}

impl PanelHandles {
    fn generate(ids: &ViewIdGenerator) -> Self {
        Self {
            container: ids.generate(),
            status_label: ids.generate(),
            icon: ids.generate(),
            color_selector: ids.generate(),
            brightness_selector: ids.generate(),
            edit_color_button: ids.generate(),
            use_custom_toggle: ids.generate(),
            on_button: ids.generate(),
            off_button: ids.generate(),
        }
    }

    pub fn all(&self) -> [ViewId; 9] {
        [
            self.container,
            self.status_label,
            self.icon,
            self.color_selector,
            self.brightness_selector,
            self.edit_color_button,
            self.use_custom_toggle,
            self.on_button,
            self.off_button,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub index: LightIndex,
    pub handles: PanelHandles,
    pub state: LightState,
    pub status_text: String,
    pub icon: LightIcon,
    pub edit_color_text: String,
    pub use_custom_text: &'static str,
}

impl Panel {
    fn build(index: LightIndex, ids: &ViewIdGenerator) -> Self {
        Self {
            index,
            handles: PanelHandles::generate(ids),
            state: LightState::default(),
            status_text: status_text(index, "OFF"),
            icon: LightIcon::Off,
            edit_color_text: format!("Edit Color {}", index),
            use_custom_text: "Use Edit Color",
        }
    }

    /// Project a status broadcast onto the label and icon
    pub fn show_status(&mut self, status: &str) {
        self.status_text = status_text(self.index, status);
        self.icon = if status == "ON" {
            LightIcon::On
        } else {
            LightIcon::Off
        };
    }
}

fn status_text(index: LightIndex, status: &str) -> String {
    format!("Light {} Status: {}", index, status)
}

/// The full set of panels, one per light
#[derive(Debug, Clone)]
pub struct Panels {
    panels: [Panel; LIGHT_COUNT],
}

impl Panels {
    /// Build one panel per light, in index order
    pub fn build(ids: &ViewIdGenerator) -> Self {
        let panels = std::array::from_fn(|slot| Panel::build(LightIndex::from_slot(slot), ids));
        Self { panels }
    }

    pub fn get(&self, index: LightIndex) -> &Panel {
        &self.panels[index.slot()]
    }

    pub fn get_mut(&mut self, index: LightIndex) -> &mut Panel {
        &mut self.panels[index.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter()
    }

    /// Apply a status broadcast. Returns false when the light number is out
    /// of range and nothing changed.
    pub fn apply_status(&mut self, light_number: i32, status: &str) -> bool {
        match LightIndex::new(light_number.into()) {
            Some(index) => {
                self.get_mut(index).show_status(status);
                true
            }
            None => false,
        }
    }
}
