//! Speech recognition over a Whisper-style HTTP endpoint

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;

use crate::audio::{self, Microphone};
use crate::config::Config;
use crate::error::VoiceError;
use crate::voice::SpeechRecognizer;

/// Utterances quieter than this are treated as no speech
const SILENCE_RMS: f32 = 0.005;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Records one utterance from the microphone and posts it for transcription
pub struct WhisperRecognizer {
    client: Client,
    microphone: Microphone,
    url: String,
    language: String,
    utterance: Duration,
}

impl WhisperRecognizer {
    pub fn new(config: &Config) -> Result<Self, VoiceError> {
        Ok(Self {
            client: Client::new(),
            microphone: Microphone::open()?,
            url: config.transcribe_url.clone(),
            language: config.language.clone(),
            utterance: config.record_duration,
        })
    }

    fn transcribe(&self, wav: Vec<u8>) -> Result<Vec<String>, VoiceError> {
        let part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("language", self.language.clone());

        let response = self.client.post(&self.url).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::Transcription {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(candidates(response.json()?))
    }
}

fn candidates(response: TranscriptionResponse) -> Vec<String> {
    response
        .text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .into_iter()
        .collect()
}

impl SpeechRecognizer for WhisperRecognizer {
    fn recognize(&mut self) -> Result<Vec<String>, VoiceError> {
        info!("listening for {}s", self.utterance.as_secs());
        let samples = self.microphone.record(self.utterance)?;
        let level = audio::rms(&samples);
        if level < SILENCE_RMS {
            debug!("utterance below silence level ({:.4})", level);
            return Ok(Vec::new());
        }

        let wav = audio::encode_wav(&samples, self.microphone.sample_rate())?;
        debug!("sending {} bytes to {}", wav.len(), self.url);
        self.transcribe(wav)
    }
}
