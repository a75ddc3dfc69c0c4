//! DSP helpers — pitch curves, waveform names, and pink noise synthesis.
//!
//! Nothing here renders the graph itself; the engine does that. This module
//! supplies the numbers and the one buffer the engine cannot make on its own.

pub mod noise;
pub mod oscillator;
pub mod pitch;
