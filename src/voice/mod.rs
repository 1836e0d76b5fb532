//! Voice control
//!
//! Wake word spotting, single-utterance speech capture and command
//! interpretation, wired together by [`VoiceService`].

use std::sync::atomic::AtomicBool;

use crate::error::VoiceError;

pub mod command;
pub mod service;

pub use command::{parse, Unmatched, VoiceCommand};
pub use service::{VoiceService, VoiceState};

/// Keyword spotter
pub trait WakeWordEngine {
    /// Block until the wake word is heard (`Ok(true)`) or `shutdown` is
    /// raised (`Ok(false)`). Monitoring is paused again before returning.
    fn wait_for_wake_word(&mut self, shutdown: &AtomicBool) -> Result<bool, VoiceError>;
}

/// Speech-to-text for one utterance
pub trait SpeechRecognizer {
    /// Transcript candidates, best first. Empty when speech ended without a
    /// usable result.
    fn recognize(&mut self) -> Result<Vec<String>, VoiceError>;
}

/// Destination of interpreted commands
pub trait CommandSink {
    fn dispatch(&self, command: VoiceCommand);
}

impl<F> CommandSink for F
where
    F: Fn(VoiceCommand),
{
    fn dispatch(&self, command: VoiceCommand) {
        self(command)
    }
}
