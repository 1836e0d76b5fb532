//! Light controller
//!
//! Owns the panels, the music-mode flag and the transport link. Every
//! mutation of light state goes through here on the control thread, both
//! for panel input and for voice commands.

use log::{debug, info};

use crate::light::{LightIndex, LightStatus, ToggleMessage};
use crate::panel::{Panel, Panels, ViewIdGenerator};
use crate::picker::{ColorPickerDialog, PickerOutcome};
use crate::transport::{StatusUpdate, TransportLink};
use crate::voice::VoiceCommand;

pub struct LightController {
    panels: Panels,
    link: TransportLink,
    music_mode: bool,
}

impl LightController {
    pub fn new(ids: &ViewIdGenerator) -> Self {
        Self {
            panels: Panels::build(ids),
            link: TransportLink::new(),
            music_mode: false,
        }
    }

    pub fn panels(&self) -> &Panels {
        &self.panels
    }

    pub fn panel_mut(&mut self, index: LightIndex) -> &mut Panel {
        self.panels.get_mut(index)
    }

    pub fn link(&self) -> &TransportLink {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut TransportLink {
        &mut self.link
    }

    pub fn music_mode(&self) -> bool {
        self.music_mode
    }

    /// Resolve and publish a toggle. Returns `None` when the transport is
    /// not connected and the toggle was dropped.
    pub fn toggle_light(&self, index: LightIndex, status: LightStatus) -> Option<ToggleMessage> {
        let message = self.panels.get(index).state.resolve_toggle(status);
        self.link
            .publish_light_toggle(index, &message.to_string())
            .then_some(message)
    }

    pub fn toggle_all(&self, status: LightStatus) {
        for index in LightIndex::all() {
            self.toggle_light(index, status);
        }
    }

    /// Flip music mode and publish the new value
    pub fn toggle_music_mode(&mut self) -> bool {
        self.set_music_mode(!self.music_mode);
        self.music_mode
    }

    pub fn set_music_mode(&mut self, enabled: bool) {
        self.music_mode = enabled;
        self.link.publish_music_mode(enabled);
    }

    /// Open the picker seeded with the light's stored custom color
    pub fn open_color_picker(&self, index: LightIndex) -> ColorPickerDialog {
        ColorPickerDialog::open(index, self.panels.get(index).state.custom_color)
    }

    pub fn close_color_picker(&mut self, index: LightIndex, outcome: PickerOutcome) {
        match outcome {
            PickerOutcome::Confirmed(color) => {
                debug!("light {} custom color {}", index, color.to_hex());
                self.panels.get_mut(index).state.custom_color = color;
            }
            PickerOutcome::Cancelled => {}
        }
    }

    pub fn handle_status(&mut self, update: &StatusUpdate) {
        debug!("status light {}: {}", update.light_number, update.status);
        if !self.panels.apply_status(update.light_number, &update.status) {
            debug!("ignoring status for unknown light {}", update.light_number);
        }
    }

    pub fn apply_voice(&mut self, command: VoiceCommand) {
        info!("voice command {:?}", command);
        match command {
            VoiceCommand::MusicMode(enabled) => self.set_music_mode(enabled),
            VoiceCommand::AllLights(status) => self.toggle_all(status),
            VoiceCommand::Light(index, status) => {
                self.toggle_light(index, status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Rgb;
    use crate::panel::LightIcon;
    use crate::transport::tests::{Published, RecordingTransport};
    use crate::voice;
    use std::sync::Arc;

    fn light(n: i64) -> LightIndex {
        LightIndex::new(n).unwrap()
    }

    fn connected() -> (LightController, Arc<RecordingTransport>) {
        let mut controller = LightController::new(&ViewIdGenerator::new());
        let recorder = Arc::new(RecordingTransport::default());
        controller.link_mut().connecting();
        controller.link_mut().connected(recorder.clone());
        (controller, recorder)
    }

    #[test]
    fn test_toggle_uses_panel_state() {
        let (mut controller, recorder) = connected();
        {
            let state = &mut controller.panel_mut(light(2)).state;
            state.color.select("BLUE");
            state.brightness.select("30%");
        }
        let message = controller.toggle_light(light(2), LightStatus::On).unwrap();
        assert_eq!(message.color, Rgb::new(0, 0, 76));
        assert_eq!(recorder.take(), vec![Published::Toggle(2, "ON/0/0/76".into())]);
    }

    #[test]
    fn test_toggle_dropped_while_disconnected() {
        let controller = LightController::new(&ViewIdGenerator::new());
        assert!(controller.toggle_light(light(1), LightStatus::On).is_none());
    }

    #[test]
    fn test_voice_all_on_toggles_every_light() {
        let (mut controller, recorder) = connected();
        controller.apply_voice(voice::parse("전체켜줘").unwrap());
        let published = recorder.take();
        assert_eq!(
            published,
            vec![
                Published::Toggle(1, "ON/255/255/255".into()),
                Published::Toggle(2, "ON/255/255/255".into()),
                Published::Toggle(3, "ON/255/255/255".into()),
            ]
        );
    }

    #[test]
    fn test_voice_single_light_on() {
        let (mut controller, recorder) = connected();
        controller.apply_voice(voice::parse("2번 켜줘").unwrap());
        let published = recorder.take();
        assert_eq!(published.len(), 1);
        assert!(matches!(&published[0], Published::Toggle(2, payload) if payload.starts_with("ON/")));
    }

    #[test]
    fn test_music_mode_button_and_voice() {
        let (mut controller, recorder) = connected();
        assert!(controller.toggle_music_mode());
        assert!(!controller.toggle_music_mode());
        controller.apply_voice(VoiceCommand::MusicMode(true));
        assert!(controller.music_mode());
        assert_eq!(
            recorder.take(),
            vec![
                Published::MusicMode(true),
                Published::MusicMode(false),
                Published::MusicMode(true),
            ]
        );
    }

    #[test]
    fn test_picker_cancel_keeps_custom_color() {
        let (mut controller, _) = connected();
        controller.close_color_picker(light(3), PickerOutcome::Confirmed(Rgb::new(1, 2, 3)));

        let dialog = controller.open_color_picker(light(3));
        assert_eq!(dialog.initial(), Rgb::new(1, 2, 3));
        controller.close_color_picker(light(3), dialog.cancel());
        assert_eq!(controller.panels().get(light(3)).state.custom_color, Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_picker_confirm_feeds_custom_toggle() {
        let (mut controller, recorder) = connected();
        controller.close_color_picker(light(1), PickerOutcome::Confirmed(Rgb::new(200, 100, 50)));
        controller.panel_mut(light(1)).state.use_custom_color = true;
        controller.toggle_light(light(1), LightStatus::Off);
        assert_eq!(recorder.take(), vec![Published::Toggle(1, "OFF/200/100/50".into())]);
        // other lights keep white
        assert_eq!(controller.panels().get(light(2)).state.custom_color, Rgb::WHITE);
    }

    #[test]
    fn test_status_feedback_projection() {
        let (mut controller, _) = connected();
        controller.handle_status(&StatusUpdate {
            light_number: 3,
            status: "ON".into(),
        });
        controller.handle_status(&StatusUpdate {
            light_number: 9,
            status: "ON".into(),
        });
        let panels = controller.panels();
        assert_eq!(panels.get(light(3)).status_text, "Light 3 Status: ON");
        assert_eq!(panels.get(light(3)).icon, LightIcon::On);
        assert_eq!(panels.get(light(1)).icon, LightIcon::Off);
    }
}
