//! Session configuration.
//!
//! Loaded from JSON by the host page; every field is optional and falls back
//! to the defaults below.

use serde::{Deserialize, Serialize};

use crate::dsp::noise::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use crate::dsp::oscillator::Waveform;
use crate::dsp::pitch::Scale;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Sample rate of the engine's audio context, in Hz.
    pub sample_rate: u32,
    /// Frequency of semitone offset 0, in Hz.
    pub root_frequency: f64,
    /// Interval of the harmony voice, in semitones.
    pub harmony_interval: i32,
    /// Detune of the harmony voice, in cents.
    pub harmony_detune: f64,
    /// Oscillator waveform for both voices.
    pub waveform: Waveform,
    /// Output gain of the initial graph.
    pub init_gain: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let scale = Scale::default();
        SessionConfig {
            sample_rate: 44_100,
            root_frequency: scale.root,
            harmony_interval: scale.harmony_interval,
            harmony_detune: scale.harmony_detune,
            waveform: Waveform::Sine,
            init_gain: 0.0,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            serde_json::from_str(source).map_err(|e| ConfigError::Malformed {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate {
                value: self.sample_rate,
            });
        }
        if !self.root_frequency.is_finite() || self.root_frequency <= 0.0 {
            return Err(ConfigError::InvalidRootFrequency {
                value: self.root_frequency,
            });
        }
        if !self.init_gain.is_finite() {
            return Err(ConfigError::InvalidInitGain {
                value: self.init_gain,
            });
        }
        Ok(())
    }

    pub fn scale(&self) -> Scale {
        Scale {
            root: self.root_frequency,
            harmony_interval: self.harmony_interval,
            harmony_detune: self.harmony_detune,
        }
    }
}
