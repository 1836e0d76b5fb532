//! Wake word spotting
//!
//! A recorded wake phrase is reduced to an MFCC template. Incoming audio is
//! scored against the template with dynamic time warping; a similarity at or
//! above the threshold counts as a detection.
//!
//! `SpottingEngine` runs the detector over a live microphone stream.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::StreamTrait;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::audio::Microphone;
use crate::error::VoiceError;
use crate::voice::WakeWordEngine;

const PRE_EMPHASIS: f32 = 0.97;

/// MFCC front-end parameters
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub num_coefficients: usize,
    pub num_filters: usize,
    pub min_freq: f32,
    pub max_freq: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_size: 512,
            hop_size: 128,
            num_coefficients: 13,
            num_filters: 26,
            min_freq: 300.0,
            max_freq: 8000.0,
        }
    }
}

/// Result of scoring one audio window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub detected: bool,
    pub similarity: f32,
}

impl Detection {
    const MISS: Detection = Detection {
        detected: false,
        similarity: 0.0,
    };
}

/// On-disk form of a trained template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    pub phrase: String,
    pub frames: usize,
    pub coefficients: usize,
    pub features: Vec<f32>,
}

impl TemplateFile {
    pub fn load(path: &Path) -> Result<Self, VoiceError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), VoiceError> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    fn into_array(self) -> Result<Array2<f32>, VoiceError> {
        Array2::from_shape_vec((self.frames, self.coefficients), self.features)
            .map_err(|e| VoiceError::Template(e.to_string()))
    }
}

/// MFCC + DTW detector
pub struct WakeWordDetector {
    config: FeatureConfig,
    template: Option<Array2<f32>>,
    threshold: f32,
    filterbank: Array2<f32>,
    dct: Array2<f32>,
}

impl WakeWordDetector {
    pub fn new(config: FeatureConfig) -> Self {
        let filterbank = mel_filterbank(&config);
        let dct = dct_matrix(config.num_filters, config.num_coefficients);
        Self {
            config,
            template: None,
            threshold: 0.7,
            filterbank,
            dct,
        }
    }

    /// Clamped to `0.0..=1.0`; higher is stricter
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Install a template loaded from disk. The coefficient count must match.
    pub fn load_template(&mut self, file: TemplateFile) -> Result<(), VoiceError> {
        if file.coefficients != self.config.num_coefficients {
            return Err(VoiceError::Template(format!(
                "expected {} coefficients, found {}",
                self.config.num_coefficients, file.coefficients
            )));
        }
        if file.frames == 0 {
            return Err(VoiceError::Template("template has no frames".into()));
        }
        self.template = Some(file.into_array()?);
        Ok(())
    }

    pub fn export_template(&self, phrase: &str) -> Option<TemplateFile> {
        self.template.as_ref().map(|template| TemplateFile {
            phrase: phrase.to_string(),
            frames: template.nrows(),
            coefficients: template.ncols(),
            features: template.iter().copied().collect(),
        })
    }

    /// One row per frame, one column per coefficient
    pub fn features(&self, audio: &[f32]) -> Array2<f32> {
        let FeatureConfig {
            frame_size,
            hop_size,
            num_coefficients,
            ..
        } = self.config;

        if audio.len() < frame_size {
            return Array2::zeros((0, num_coefficients));
        }

        let frames = (audio.len() - frame_size) / hop_size + 1;
        let mut features = Array2::zeros((frames, num_coefficients));
        let fft = FftPlanner::new().plan_fft_forward(frame_size);

        for (row, start) in (0..frames).map(|i| (i, i * hop_size)) {
            let frame = &audio[start..start + frame_size];

            // Pre-emphasis and Hamming window, then FFT
            let mut spectrum: Vec<Complex<f32>> = hamming(&pre_emphasis(frame))
                .into_iter()
                .map(|x| Complex::new(x, 0.0))
                .collect();
            fft.process(&mut spectrum);

            // Log power of the positive frequencies
            let log_power: Array1<f32> = spectrum[..frame_size / 2]
                .iter()
                .map(|c| (c.norm_sqr() + 1e-10).ln())
                .collect();
            // Mel filterbank energies, decorrelated by the DCT
            let coefficients = self.dct.dot(&self.filterbank.dot(&log_power));
            features.row_mut(row).assign(&coefficients);
        }

        features
    }

    /// Score an audio window against the template. Without a template
    /// nothing is ever detected.
    pub fn score(&self, audio: &[f32]) -> Detection {
        let Some(template) = &self.template else {
            return Detection::MISS;
        };
        let features = self.features(audio);
        if features.nrows() == 0 {
            return Detection::MISS;
        }

        // Normalize the alignment cost by template size
        let distance = dtw_distance(&features, template);
        let scale = (template.nrows() as f32 * self.config.num_coefficients as f32).sqrt();
        let similarity = 1.0 - (distance / scale).min(1.0);

        Detection {
            detected: similarity >= self.threshold,
            similarity,
        }
    }

    /// Average several recordings of the wake phrase into a template,
    /// resampling each to the median frame count.
    pub fn train(&mut self, recordings: &[Vec<f32>]) -> Result<(), VoiceError> {
        let sequences: Vec<Array2<f32>> = recordings
            .iter()
            .map(|recording| self.features(recording))
            .filter(|features| features.nrows() > 0)
            .collect();
        if sequences.is_empty() {
            return Err(VoiceError::Template(
                "no usable audio in training recordings".into(),
            ));
        }

        // Every take is resampled to the median frame count
        let mut lengths: Vec<usize> = sequences.iter().map(|s| s.nrows()).collect();
        lengths.sort_unstable();
        let target = lengths[lengths.len() / 2];

        let mut template = Array2::zeros((target, self.config.num_coefficients));
        for sequence in &sequences {
            let last = sequence.nrows() - 1;
            for i in 0..target {
                let source = if target > 1 {
                    (i * last / (target - 1)).min(last)
                } else {
                    0
                };
                let mut row = template.row_mut(i);
                row += &sequence.row(source);
            }
        }
        template /= sequences.len() as f32;

        self.template = Some(template);
        Ok(())
    }
}

/// Boost high frequencies: `y[n] = x[n] - 0.97 * x[n-1]`
fn pre_emphasis(signal: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(signal.len());
    let mut previous = None;
    for &x in signal {
        out.push(match previous {
            Some(p) => x - PRE_EMPHASIS * p,
            None => x,
        });
        previous = Some(x);
    }
    out
}

fn hamming(signal: &[f32]) -> Vec<f32> {
    let span = signal.len().saturating_sub(1).max(1) as f32;
    signal
        .iter()
        .enumerate()
        .map(|(i, &x)| x * (0.54 - 0.46 * (2.0 * PI * i as f32 / span).cos()))
        .collect()
}

/// Triangular filters spaced evenly on the mel scale
fn mel_filterbank(config: &FeatureConfig) -> Array2<f32> {
    let bins = config.frame_size / 2;
    let mut bank = Array2::zeros((config.num_filters, bins));

    let to_mel = |hz: f32| 2595.0 * (1.0 + hz / 700.0).log10();
    let to_hz = |mel: f32| 700.0 * (10f32.powf(mel / 2595.0) - 1.0);
    let (low, high) = (to_mel(config.min_freq), to_mel(config.max_freq));
    let steps = config.num_filters + 1;

    let edges: Vec<usize> = (0..=steps)
        .map(|i| to_hz(low + (high - low) * i as f32 / steps as f32))
        .map(|hz| (hz * config.frame_size as f32 / config.sample_rate as f32).floor() as usize)
        .collect();

    for (filter, edge) in edges.windows(3).enumerate() {
        let (start, center, end) = (edge[0], edge[1], edge[2]);
        for bin in start..center.min(bins) {
            bank[[filter, bin]] = (bin - start) as f32 / (center - start) as f32;
        }
        for bin in center..end.min(bins) {
            bank[[filter, bin]] = (end - bin) as f32 / (end - center) as f32;
        }
    }

    bank
}

fn dct_matrix(num_filters: usize, num_coefficients: usize) -> Array2<f32> {
    let n = num_filters as f32;
    Array2::from_shape_fn((num_coefficients, num_filters), |(i, j)| {
        let norm = if i == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        norm * (PI * i as f32 * (j as f32 + 0.5) / n).cos()
    })
}

/// Dynamic time warping cost of the best alignment of `a` onto `b`
fn dtw_distance(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    let (n, m) = (a.nrows(), b.nrows());
    if n == 0 || m == 0 {
        return f32::MAX;
    }

    let mut cost = Array2::from_elem((n + 1, m + 1), f32::MAX);
    cost[[0, 0]] = 0.0;
    for i in 1..=n {
        for j in 1..=m {
            let distance = frame_distance(a.row(i - 1), b.row(j - 1));
            let best = cost[[i - 1, j - 1]]
                .min(cost[[i - 1, j]])
                .min(cost[[i, j - 1]]);
            cost[[i, j]] = distance + best;
        }
    }
    cost[[n, m]]
}

/// Euclidean distance between two feature frames
fn frame_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Sliding window of the most recent samples
struct RingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    fresh: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            fresh: 0,
        }
    }

    fn push(&mut self, data: &[f32]) {
        for &sample in data {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
        self.fresh += data.len();
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.fresh = 0;
    }

    /// Snapshot of the window once enough new audio has arrived
    fn take_window(&mut self, min_fresh: usize) -> Option<Vec<f32>> {
        if self.fresh < min_fresh {
            return None;
        }
        self.fresh = 0;
        Some(self.samples.iter().copied().collect())
    }
}

/// Live wake word engine over the default input device
pub struct SpottingEngine {
    detector: WakeWordDetector,
    buffer: Arc<Mutex<RingBuffer>>,
    stream: cpal::Stream,
    sample_rate: u32,
    last_detection: Option<Instant>,
}

impl SpottingEngine {
    const WINDOW: Duration = Duration::from_secs(2);
    const CHECK_EVERY: Duration = Duration::from_millis(100);
    const REFRACTORY: Duration = Duration::from_secs(3);

    /// Load the template, open the microphone and prepare a paused stream
    pub fn start(template: &Path, threshold: f32) -> Result<Self, VoiceError> {
        let file = TemplateFile::load(template)?;
        let phrase = file.phrase.clone();

        let microphone = Microphone::open()?;
        let sample_rate = microphone.sample_rate();
        let mut detector = WakeWordDetector::new(FeatureConfig {
            sample_rate,
            ..FeatureConfig::default()
        });
        detector.load_template(file)?;
        detector.set_threshold(threshold);

        let capacity = (Self::WINDOW.as_secs_f32() * sample_rate as f32) as usize;
        let buffer = Arc::new(Mutex::new(RingBuffer::new(capacity)));
        let sink = Arc::clone(&buffer);
        let stream = microphone.stream(move |samples| {
            if let Ok(mut buffer) = sink.lock() {
                buffer.push(samples);
            }
        })?;
        stream.pause().ok();

        info!("wake word \"{}\" armed (threshold {:.2})", phrase, threshold);
        Ok(Self {
            detector,
            buffer,
            stream,
            sample_rate,
            last_detection: None,
        })
    }

    fn poll(&mut self) -> Result<Option<Detection>, VoiceError> {
        let min_fresh = (Self::CHECK_EVERY.as_secs_f32() * self.sample_rate as f32) as usize;
        let window = self
            .buffer
            .lock()
            .map_err(|_| VoiceError::Poisoned)?
            .take_window(min_fresh);
        let Some(window) = window else {
            return Ok(None);
        };
        if self
            .last_detection
            .is_some_and(|at| at.elapsed() < Self::REFRACTORY)
        {
            return Ok(None);
        }
        Ok(Some(self.detector.score(&window)))
    }
}

impl WakeWordEngine for SpottingEngine {
    fn wait_for_wake_word(&mut self, shutdown: &AtomicBool) -> Result<bool, VoiceError> {
        self.buffer.lock().map_err(|_| VoiceError::Poisoned)?.clear();
        self.stream.play()?;

        while !shutdown.load(Ordering::Relaxed) {
            match self.poll()? {
                Some(detection) if detection.detected => {
                    debug!("wake word similarity {:.2}", detection.similarity);
                    self.last_detection = Some(Instant::now());
                    self.stream.pause().ok();
                    return Ok(true);
                }
                _ => std::thread::sleep(Duration::from_millis(20)),
            }
        }

        self.stream.pause().ok();
        Ok(false)
    }
}
