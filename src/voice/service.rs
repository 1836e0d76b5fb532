//! Voice command state machine
//!
//! `Idle → WakeWordListening → SpeechCapturing → CommandDispatch → Idle`

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::command::{self, Unmatched};
use super::{CommandSink, SpeechRecognizer, WakeWordEngine};
use crate::error::VoiceError;

const IDLE_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    WakeWordListening,
    /// `retries` counts recognition errors in the current round
    SpeechCapturing { retries: u32 },
    CommandDispatch(String),
}

pub struct VoiceService<W, R, S> {
    engine: Option<W>,
    recognizer: R,
    sink: S,
    state: VoiceState,
    max_retries: Option<u32>,
}

impl<W, R, S> VoiceService<W, R, S>
where
    W: WakeWordEngine,
    R: SpeechRecognizer,
    S: CommandSink,
{
    /// A failed wake word engine leaves the service running without
    /// keyword spotting.
    pub fn new(engine: Result<W, VoiceError>, recognizer: R, sink: S) -> Self {
        let engine = match engine {
            Ok(engine) => Some(engine),
            Err(e) => {
                error!("wake word engine initialization failed: {}", e);
                None
            }
        };
        Self {
            engine,
            recognizer,
            sink,
            state: VoiceState::Idle,
            max_retries: None,
        }
    }

    /// Cap consecutive recognition retries. `None` retries forever.
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn state(&self) -> &VoiceState {
        &self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.engine.is_none()
    }

    /// Advance one transition. Returns false when nothing could happen and
    /// the caller should back off.
    pub fn step(&mut self, shutdown: &AtomicBool) -> bool {
        let state = std::mem::replace(&mut self.state, VoiceState::Idle);
        let (next, progressed) = match state {
            VoiceState::Idle => match self.engine {
                Some(_) => (VoiceState::WakeWordListening, true),
                None => (VoiceState::Idle, false),
            },
            VoiceState::WakeWordListening => self.listen(shutdown),
            VoiceState::SpeechCapturing { retries } => (self.capture(retries), true),
            VoiceState::CommandDispatch(transcript) => {
                self.dispatch(&transcript);
                (VoiceState::Idle, true)
            }
        };
        self.state = next;
        progressed
    }

    /// Run until `shutdown` is raised
    pub fn run(&mut self, shutdown: &AtomicBool) {
        if self.is_degraded() {
            warn!("voice service running without wake word spotting");
        } else {
            info!("voice service listening for wake word");
        }
        while !shutdown.load(Ordering::Relaxed) {
            if !self.step(shutdown) {
                std::thread::sleep(IDLE_POLL);
            }
        }
        info!("voice service stopped");
    }

    fn listen(&mut self, shutdown: &AtomicBool) -> (VoiceState, bool) {
        let Some(engine) = self.engine.as_mut() else {
            return (VoiceState::Idle, false);
        };
        match engine.wait_for_wake_word(shutdown) {
            Ok(true) => {
                info!("wake word detected, capturing speech");
                (VoiceState::SpeechCapturing { retries: 0 }, true)
            }
            Ok(false) => (VoiceState::Idle, false),
            Err(e) => {
                error!("wake word engine error: {}", e);
                (VoiceState::WakeWordListening, false)
            }
        }
    }

    fn capture(&mut self, retries: u32) -> VoiceState {
        match self.recognizer.recognize() {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(transcript) => VoiceState::CommandDispatch(transcript),
                None => {
                    debug!("speech ended without a transcript");
                    VoiceState::WakeWordListening
                }
            },
            Err(e) if self.max_retries.is_some_and(|max| retries >= max) => {
                warn!("speech recognition failed after {} retries: {}", retries, e);
                VoiceState::WakeWordListening
            }
            Err(e) => {
                warn!("speech recognition failed, retrying: {}", e);
                VoiceState::SpeechCapturing {
                    retries: retries + 1,
                }
            }
        }
    }

    fn dispatch(&self, transcript: &str) {
        info!("command: {}", transcript);
        match command::parse(transcript) {
            Ok(command) => self.sink.dispatch(command),
            Err(Unmatched::MissingAction(light)) => {
                error!("invalid command for light {}: {}", light, transcript)
            }
            Err(Unmatched::Unknown) => debug!("unmatched command dropped: {}", transcript),
        }
    }
}
