//! Pitch and loudness curves for mapping UI coordinates to oscillator
//! frequencies and gain levels.

/// Equal-tempered frequency ratio for an offset of `semitones`.
///
/// `2^(x/12)`: twelve semitones double the frequency.
pub fn frequency_ratio(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}

/// Frequency `semitones` above (or below, if negative) `root`.
pub fn semitone_frequency(root: f64, semitones: f64) -> f64 {
    root * frequency_ratio(semitones)
}

/// Squared loudness curve. `level` is expected in [0, 1]; values outside
/// that range are not clamped.
pub fn perceptual_gain(level: f64) -> f64 {
    level * level
}

/// Musical scale parameters for the two-voice mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// Frequency of semitone offset 0, in Hz.
    pub root: f64,
    /// Interval of the second voice above the first, in semitones.
    pub harmony_interval: i32,
    /// Fixed detune of the second voice, in cents.
    pub harmony_detune: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Scale {
            root: 110.0,
            harmony_interval: 7,
            harmony_detune: 4.0,
        }
    }
}

impl Scale {
    /// Frequency of the lead voice at semitone offset `x`.
    pub fn frequency(&self, x: f64) -> f64 {
        semitone_frequency(self.root, x)
    }

    /// Frequency of the harmony voice at semitone offset `x` (before detune).
    pub fn harmony_frequency(&self, x: f64) -> f64 {
        semitone_frequency(self.root, x + self.harmony_interval as f64)
    }
}
