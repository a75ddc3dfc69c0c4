//! Pink noise synthesis using Paul Kellet's filter bank.
//!
//! The engine has no native pink noise node, so the session renders one
//! buffer up front and every `pinkNoise` node plays it on loop.

use log::info;
use rand::Rng;

use crate::error::ConfigError;

/// Length of the pink noise buffer in seconds.
pub const PINK_NOISE_SECONDS: usize = 5;

/// Lowest sample rate an audio context may run at, in Hz.
pub const MIN_SAMPLE_RATE: u32 = 3_000;

/// Highest sample rate an audio context may run at, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Handle name the pink noise buffer is published under.
pub const PINK_NOISE_BUFFER: &str = "pinkNoise";

/// An immutable single-channel sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    name: String,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(name: impl Into<String>, sample_rate: u32, samples: Vec<f32>) -> Self {
        SampleBuffer {
            name: name.into(),
            sample_rate,
            samples,
        }
    }

    /// Render a fresh pink noise buffer seeded from the thread RNG.
    pub fn pink_noise(sample_rate: u32) -> Result<Self, ConfigError> {
        generate_pink_noise_with(&mut rand::thread_rng(), sample_rate)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Kellet's six one-pole filters plus a zero-order term.
///
/// Accumulators start at zero; `b6` holds the previous sample's white term.
#[derive(Debug, Clone, Default)]
pub struct PinkFilter {
    b: [f64; 7],
}

impl PinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one white sample in [-1, 1] and return the next pink sample.
    pub fn process(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = (b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362) * 0.11;
        b[6] = white * 0.115926;
        out
    }
}

/// Render `sample_rate * PINK_NOISE_SECONDS` samples of pink noise.
///
/// Each call starts from a fresh filter; only the white source differs.
/// Rates above `MAX_SAMPLE_RATE` are refused before anything is allocated.
pub fn generate_pink_noise_with<R: Rng>(
    rng: &mut R,
    sample_rate: u32,
) -> Result<SampleBuffer, ConfigError> {
    let len = usize::try_from(sample_rate)
        .ok()
        .filter(|_| sample_rate <= MAX_SAMPLE_RATE)
        .and_then(|rate| rate.checked_mul(PINK_NOISE_SECONDS))
        .ok_or(ConfigError::InvalidSampleRate { value: sample_rate })?;
    let mut filter = PinkFilter::new();
    let samples = (0..len)
        .map(|_| filter.process(rng.gen_range(-1.0..=1.0)) as f32)
        .collect();

    info!("synthesized {len} samples of pink noise at {sample_rate} Hz");
    Ok(SampleBuffer::new(PINK_NOISE_BUFFER, sample_rate, samples))
}
