//! Audio session: the owned state between the UI and the audio engine.
//!
//! One session per audio context. It holds the engine handle, the config,
//! the shared pink noise buffer and the last graph handed to the engine.
//! The host must only create a session after a user gesture has unlocked
//! audio output.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::SessionConfig;
use crate::dsp::noise::SampleBuffer;
use crate::error::{ConfigError, CoreError, EngineError};
use crate::graph::GraphDescription;
use crate::mapper::{ControlMessage, MapContext, Mapping, map_message};

/// The audio-rendering engine the session drives.
pub trait AudioEngine {
    /// Reconcile the rendered graph to `graph`.
    fn update(&mut self, graph: &GraphDescription) -> Result<(), EngineError>;

    /// Current playback clock, in seconds.
    fn current_time(&self) -> f64;
}

/// Reply to a handled control message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Response {
    /// The engine was updated to this graph.
    Rendered(GraphDescription),
    /// Engine transport time, in seconds.
    CurrentTime(f64),
}

pub struct AudioSession<E> {
    engine: E,
    config: SessionConfig,
    noise: Arc<SampleBuffer>,
    rendered: GraphDescription,
}

impl<E: AudioEngine> AudioSession<E> {
    /// Validate `config` and render the session's pink noise buffer.
    pub fn new(engine: E, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let noise = SampleBuffer::pink_noise(config.sample_rate)?;
        Ok(Self::with_noise(engine, config, Arc::new(noise)))
    }

    /// Build a session around an already rendered noise buffer.
    pub fn with_noise(engine: E, config: SessionConfig, noise: Arc<SampleBuffer>) -> Self {
        info!(
            "audio session created: {} Hz, root {} Hz, {} noise samples",
            config.sample_rate,
            config.root_frequency,
            noise.len()
        );
        AudioSession {
            engine,
            config,
            noise,
            rendered: GraphDescription::new(),
        }
    }

    /// Handle one control message.
    ///
    /// Graph messages update the engine; `getCurrentTime` only reads it.
    /// If the engine rejects an update, the previously rendered graph is kept.
    pub fn handle(&mut self, message: &ControlMessage) -> Result<Response, CoreError> {
        debug!("handling '{}' message", message.kind());

        let cx = MapContext {
            scale: self.config.scale(),
            waveform: self.config.waveform,
            init_gain: self.config.init_gain,
            noise: &self.noise,
        };

        match map_message(message, &self.rendered, &cx) {
            Mapping::QueryTime => Ok(Response::CurrentTime(self.engine.current_time())),
            Mapping::Render(graph) => {
                self.engine.update(&graph)?;
                debug!("rendered graph with {} nodes", graph.len());
                self.rendered = graph.clone();
                Ok(Response::Rendered(graph))
            }
        }
    }

    /// Parse a JSON control message and handle it.
    pub fn handle_json(&mut self, source: &str) -> Result<Response, CoreError> {
        let message = ControlMessage::from_json(source).inspect_err(|e| {
            warn!("rejected control message: {e}");
        })?;
        self.handle(&message)
    }

    /// The last graph accepted by the engine.
    pub fn rendered(&self) -> &GraphDescription {
        &self.rendered
    }

    pub fn noise_buffer(&self) -> &Arc<SampleBuffer> {
        &self.noise
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
