//! Device transport seam
//!
//! The transport delivers light and music-mode commands to the devices.
//! `TransportLink` tracks the connection lifecycle and drops publishes
//! while the transport is not connected.

use std::sync::Arc;

use log::{debug, info};

use crate::light::LightIndex;

/// Outbound side of the device transport. Publishes are fire-and-forget.
pub trait Transport: Send + Sync {
    fn publish_light_toggle(&self, light: LightIndex, payload: &str);
    fn publish_music_mode(&self, enabled: bool);
}

/// Inbound status notification from the devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub light_number: i32,
    pub status: String,
}

/// Receiver of status broadcasts
pub trait StatusSink: Send + Sync {
    fn deliver(&self, update: StatusUpdate);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection-aware handle to the transport
pub struct TransportLink {
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
}

impl TransportLink {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            transport: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn connecting(&mut self) {
        debug!("transport connecting");
        self.state = ConnectionState::Connecting;
    }

    pub fn connected(&mut self, transport: Arc<dyn Transport>) {
        info!("transport connected");
        self.transport = Some(transport);
        self.state = ConnectionState::Connected;
    }

    pub fn disconnected(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("transport disconnected");
        }
        self.transport = None;
        self.state = ConnectionState::Disconnected;
    }

    fn active(&self) -> Option<&Arc<dyn Transport>> {
        match self.state {
            ConnectionState::Connected => self.transport.as_ref(),
            _ => None,
        }
    }

    /// Returns false if the publish was dropped
    pub fn publish_light_toggle(&self, light: LightIndex, payload: &str) -> bool {
        match self.active() {
            Some(transport) => {
                transport.publish_light_toggle(light, payload);
                true
            }
            None => {
                debug!("dropping toggle for light {} ({:?})", light, self.state);
                false
            }
        }
    }

    /// Returns false if the publish was dropped
    pub fn publish_music_mode(&self, enabled: bool) -> bool {
        match self.active() {
            Some(transport) => {
                transport.publish_music_mode(enabled);
                true
            }
            None => {
                debug!("dropping music mode {} ({:?})", enabled, self.state);
                false
            }
        }
    }
}

impl Default for TransportLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport that logs every publish. With an echo sink attached it also
/// acknowledges toggles with a status broadcast.
pub struct LogTransport {
    echo: Option<Box<dyn StatusSink>>,
}

impl LogTransport {
    pub fn new() -> Self {
        Self { echo: None }
    }

    pub fn with_echo(echo: impl StatusSink + 'static) -> Self {
        Self {
            echo: Some(Box::new(echo)),
        }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LogTransport {
    fn publish_light_toggle(&self, light: LightIndex, payload: &str) {
        info!("publish light/{} {}", light, payload);
        if let Some(echo) = &self.echo {
            let status = payload.split('/').next().unwrap_or_default();
            echo.deliver(StatusUpdate {
                light_number: light.number().into(),
                status: status.to_string(),
            });
        }
    }

    fn publish_music_mode(&self, enabled: bool) {
        info!("publish music_mode {}", enabled);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Published {
        Toggle(u8, String),
        MusicMode(bool),
    }

    /// Records every publish for assertions
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub published: Mutex<Vec<Published>>,
    }

    impl RecordingTransport {
        pub fn take(&self) -> Vec<Published> {
            std::mem::take(&mut *self.published.lock().unwrap())
        }
    }

    impl Transport for RecordingTransport {
        fn publish_light_toggle(&self, light: LightIndex, payload: &str) {
            self.published
                .lock()
                .unwrap()
                .push(Published::Toggle(light.number(), payload.to_string()));
        }

        fn publish_music_mode(&self, enabled: bool) {
            self.published.lock().unwrap().push(Published::MusicMode(enabled));
        }
    }

    #[derive(Default, Clone)]
    struct RecordingSink(Arc<Mutex<Vec<StatusUpdate>>>);

    impl StatusSink for RecordingSink {
        fn deliver(&self, update: StatusUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    fn light(n: i64) -> LightIndex {
        LightIndex::new(n).unwrap()
    }

    #[test]
    fn test_publishes_dropped_until_connected() {
        let recorder = Arc::new(RecordingTransport::default());
        let mut link = TransportLink::new();

        assert!(!link.publish_light_toggle(light(1), "ON/255/255/255"));
        link.connecting();
        assert_eq!(link.state(), ConnectionState::Connecting);
        assert!(!link.publish_music_mode(true));

        link.connected(recorder.clone());
        assert!(link.publish_light_toggle(light(1), "ON/255/255/255"));
        assert!(link.publish_music_mode(true));

        link.disconnected();
        assert!(!link.publish_light_toggle(light(2), "OFF/0/0/0"));

        assert_eq!(
            recorder.take(),
            vec![
                Published::Toggle(1, "ON/255/255/255".into()),
                Published::MusicMode(true),
            ]
        );
    }

    #[test]
    fn test_log_transport_echoes_status() {
        let sink = RecordingSink::default();
        let transport = LogTransport::with_echo(sink.clone());
        transport.publish_light_toggle(light(3), "OFF/0/0/0");
        transport.publish_music_mode(false);

        let delivered = sink.0.lock().unwrap().clone();
        assert_eq!(
            delivered,
            vec![StatusUpdate {
                light_number: 3,
                status: "OFF".into()
            }]
        );
    }
}
