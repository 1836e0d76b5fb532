//! Control loop plumbing
//!
//! Voice commands, status broadcasts and transport lifecycle events all
//! reach the control thread as `AppEvent`s on one channel.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use crate::config::Config;
use crate::controller::LightController;
use crate::recognizer::WhisperRecognizer;
use crate::transport::{LogTransport, StatusSink, StatusUpdate, Transport};
use crate::voice::{VoiceCommand, VoiceService};
use crate::wake_word::SpottingEngine;

pub enum AppEvent {
    Voice(VoiceCommand),
    Status(StatusUpdate),
    TransportConnected(Arc<dyn Transport>),
    TransportLost,
    /// The voice service came up without wake word spotting
    VoiceDegraded(String),
    /// The voice thread has exited
    VoiceStopped,
}

impl AppEvent {
    /// Events that leave a headless session with nothing left to do
    fn ends_headless(&self) -> bool {
        matches!(self, AppEvent::VoiceDegraded(_) | AppEvent::VoiceStopped)
    }
}

/// Sends `VoiceStopped` when the voice thread unwinds, however it exits
struct VoiceExitNotice(Sender<AppEvent>);

impl Drop for VoiceExitNotice {
    fn drop(&mut self) {
        let _ = self.0.send(AppEvent::VoiceStopped);
    }
}

impl StatusSink for Sender<AppEvent> {
    fn deliver(&self, update: StatusUpdate) {
        // the control loop may already be gone during teardown
        let _ = self.send(AppEvent::Status(update));
    }
}

/// What changed, for display
pub fn apply_event(controller: &mut LightController, event: AppEvent) -> String {
    match event {
        AppEvent::Voice(command) => {
            controller.apply_voice(command);
            format!("voice: {:?}", command)
        }
        AppEvent::Status(update) => {
            controller.handle_status(&update);
            format!("light {} reported {}", update.light_number, update.status)
        }
        AppEvent::TransportConnected(transport) => {
            controller.link_mut().connected(transport);
            "transport connected".to_string()
        }
        AppEvent::TransportLost => {
            controller.link_mut().disconnected();
            "transport disconnected".to_string()
        }
        AppEvent::VoiceDegraded(reason) => format!("voice unavailable: {}", reason),
        AppEvent::VoiceStopped => "voice service stopped".to_string(),
    }
}

/// Mark the link as connecting and bring the log transport up on a
/// background thread. Toggles issued before it lands are dropped.
pub fn connect_log_transport(
    controller: &mut LightController,
    events: Sender<AppEvent>,
) -> io::Result<JoinHandle<()>> {
    controller.link_mut().connecting();
    thread::Builder::new()
        .name("transport".into())
        .spawn(move || {
            let transport = LogTransport::with_echo(events.clone());
            if events
                .send(AppEvent::TransportConnected(Arc::new(transport)))
                .is_err()
            {
                warn!("control loop exited before transport connected");
            }
        })
}

/// Start the voice service on its own thread. The microphone and wake word
/// stream are created on that thread and released when it exits. The
/// control loop is told with `VoiceStopped` when the thread ends, and with
/// `VoiceDegraded` when there is no wake word spotting.
pub fn spawn_voice(
    config: Config,
    events: Sender<AppEvent>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("voice".into()).spawn(move || {
        let _notice = VoiceExitNotice(events.clone());

        let recognizer = match WhisperRecognizer::new(&config) {
            Ok(recognizer) => recognizer,
            Err(e) => {
                error!("speech recognizer unavailable: {}", e);
                return;
            }
        };
        let engine = SpottingEngine::start(&config.wake_word_template, config.wake_word_threshold);
        let sink = {
            let events = events.clone();
            move |command: VoiceCommand| {
                let _ = events.send(AppEvent::Voice(command));
            }
        };

        let mut service = VoiceService::new(engine, recognizer, sink)
            .with_max_retries(config.max_recognition_retries);
        if service.is_degraded() {
            let _ = events.send(AppEvent::VoiceDegraded(
                "wake word engine failed to start".into(),
            ));
        }
        service.run(&shutdown);
    })
}

/// Drain events without a terminal. Stops on shutdown, when the channel
/// closes, or when the voice service stops or comes up degraded. The link
/// holds a sender for status echoes, so the channel alone never closes
/// while the transport is connected.
pub fn run_headless(
    controller: &mut LightController,
    events: &Receiver<AppEvent>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                let done = event.ends_headless();
                info!("{}", apply_event(controller, event));
                if done {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    controller.link_mut().disconnected();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{LightIndex, LightStatus};
    use crate::panel::{LightIcon, ViewIdGenerator};
    use crate::transport::ConnectionState;
    use std::sync::mpsc;

    #[test]
    fn test_log_transport_connects_and_echoes_status() {
        let (tx, rx) = mpsc::channel();
        let mut controller = LightController::new(&ViewIdGenerator::new());

        let handle = connect_log_transport(&mut controller, tx.clone()).unwrap();
        assert_eq!(controller.link().state(), ConnectionState::Connecting);
        handle.join().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(apply_event(&mut controller, event), "transport connected");
        assert!(controller.link().is_connected());

        let one = LightIndex::new(1).unwrap();
        tx.send(AppEvent::Voice(VoiceCommand::Light(one, LightStatus::On)))
            .unwrap();
        let voice = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        apply_event(&mut controller, voice);

        // the toggle is acknowledged by the echoed status broadcast
        let echo = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(apply_event(&mut controller, echo), "light 1 reported ON");
        assert_eq!(controller.panels().get(one).icon, LightIcon::On);
    }

    #[test]
    fn test_headless_loop_ends_when_voice_thread_exits() {
        let (tx, rx) = mpsc::channel();
        let mut controller = LightController::new(&ViewIdGenerator::new());
        connect_log_transport(&mut controller, tx.clone())
            .unwrap()
            .join()
            .unwrap();

        // voice side gives up right away, as with no input device
        let notice = VoiceExitNotice(tx);
        let voice = thread::spawn(move || drop(notice));

        let shutdown = AtomicBool::new(false);
        run_headless(&mut controller, &rx, &shutdown);
        voice.join().unwrap();
        assert_eq!(controller.link().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_degraded_voice_ends_headless_session() {
        let (tx, rx) = mpsc::channel();
        let mut controller = LightController::new(&ViewIdGenerator::new());
        let one = LightIndex::new(1).unwrap();
        tx.send(AppEvent::VoiceDegraded("no template".into())).unwrap();
        tx.send(AppEvent::Status(StatusUpdate {
            light_number: 1,
            status: "ON".into(),
        }))
        .unwrap();

        run_headless(&mut controller, &rx, &AtomicBool::new(false));
        // stopped before the later event
        assert_eq!(controller.panels().get(one).icon, LightIcon::Off);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_headless_loop_ends_when_senders_drop() {
        let (tx, rx) = mpsc::channel();
        let mut controller = LightController::new(&ViewIdGenerator::new());
        tx.send(AppEvent::Status(StatusUpdate {
            light_number: 2,
            status: "ON".into(),
        }))
        .unwrap();
        tx.send(AppEvent::TransportLost).unwrap();
        drop(tx);

        let shutdown = AtomicBool::new(false);
        run_headless(&mut controller, &rx, &shutdown);

        let two = LightIndex::new(2).unwrap();
        assert_eq!(controller.panels().get(two).status_text, "Light 2 Status: ON");
        assert_eq!(controller.link().state(), ConnectionState::Disconnected);
    }
}
