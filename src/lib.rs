pub mod config;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod mapper;
pub mod session;

pub use crate::config::SessionConfig;
pub use crate::dsp::noise::SampleBuffer;
pub use crate::error::CoreError;
pub use crate::graph::{GraphDescription, NodeId, NodeKind, NodeSpec, ParamValue, Target};
pub use crate::mapper::{ControlMessage, NoteInput, map_message, substitute_pink_noise};
pub use crate::session::{AudioEngine, AudioSession, Response};

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::error::EngineError;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the tonegraph-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: install console logging and the panic hook.
/// Call once before creating a session.
#[cfg(feature = "web")]
#[wasm_bindgen]
pub fn tonegraph_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

#[wasm_bindgen]
extern "C" {
    /// A virtual-audio-graph instance bound to an `AudioContext`.
    pub type VirtualAudioGraph;

    #[wasm_bindgen(method, catch, js_name = update)]
    fn js_update(this: &VirtualAudioGraph, graph: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, getter, js_name = currentTime)]
    fn js_current_time(this: &VirtualAudioGraph) -> f64;
}

/// Serialize to plain JS objects (not `Map`s) so the graph library can read
/// node ids as object keys.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

impl AudioEngine for VirtualAudioGraph {
    fn update(&mut self, graph: &GraphDescription) -> Result<(), EngineError> {
        let value = to_js(graph).map_err(|e| EngineError::new(format!("{e}")))?;
        self.js_update(&value)
            .map(|_| ())
            .map_err(|e| EngineError::new(format!("{e:?}")))
    }

    fn current_time(&self) -> f64 {
        self.js_current_time()
    }
}

/// WASM-exposed audio session wrapping a JS virtual-audio-graph.
///
/// ```javascript
/// const session = new AudioSession(virtualAudioGraph, JSON.stringify({ sampleRate: ctx.sampleRate }));
/// const noise = ctx.createBuffer(1, session.noise_len(), ctx.sampleRate);
/// noise.copyToChannel(session.noise_samples(), 0);
/// session.handle(JSON.stringify({ type: "init" }));
/// ```
#[wasm_bindgen(js_name = AudioSession)]
pub struct WasmAudioSession {
    inner: AudioSession<VirtualAudioGraph>,
}

#[wasm_bindgen(js_class = AudioSession)]
impl WasmAudioSession {
    /// `config` is an optional JSON `SessionConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(engine: VirtualAudioGraph, config: Option<String>) -> Result<WasmAudioSession, JsValue> {
        let config = match config {
            Some(source) => SessionConfig::from_json(&source),
            None => Ok(SessionConfig::default()),
        }
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        let inner = AudioSession::new(engine, config).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(WasmAudioSession { inner })
    }

    /// Handle a JSON control message; returns the tagged response object.
    pub fn handle(&mut self, message: &str) -> Result<JsValue, JsValue> {
        let response = self
            .inner
            .handle_json(message)
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        to_js(&response).map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    /// Samples of the shared pink noise buffer, for building the `AudioBuffer`
    /// that `{"$buffer": "pinkNoise"}` handles refer to.
    pub fn noise_samples(&self) -> Vec<f32> {
        self.inner.noise_buffer().samples().to_vec()
    }

    pub fn noise_len(&self) -> usize {
        self.inner.noise_buffer().len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.config().sample_rate
    }
}
