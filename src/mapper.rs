//! Control message → graph description mapping.
//!
//! Messages arrive as a tagged envelope `{"type": ..., "data": ...}`:
//!
//! | type             | data                          | result                  |
//! |------------------|-------------------------------|-------------------------|
//! | `init`           | —                             | one silent gain node    |
//! | `update`         | graph description             | graph, pinkNoise bound  |
//! | `note`           | `{isDown, x, y}`              | two-voice graph         |
//! | `getCurrentTime` | —                             | transport time query    |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsp::noise::SampleBuffer;
use crate::dsp::oscillator::Waveform;
use crate::dsp::pitch::{Scale, perceptual_gain};
use crate::error::MessageError;
use crate::graph::{GraphDescription, NodeId, NodeKind, NodeSpec, OUTPUT_GAIN, ParamValue, Target};

/// Node id of the lead oscillator in a note graph.
pub const LEAD_VOICE: NodeId = 1;
/// Node id of the harmony oscillator in a note graph.
pub const HARMONY_VOICE: NodeId = 2;

// ── Messages ────────────────────────────────────────────────

/// Pointer/touch state from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    pub is_down: bool,
    /// Semitone offset from the scale root.
    pub x: f64,
    /// Normalized level in [0, 1].
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Init,
    Update(GraphDescription),
    GetCurrentTime,
    Note(NoteInput),
}

impl ControlMessage {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Init => "init",
            ControlMessage::Update(_) => "update",
            ControlMessage::GetCurrentTime => "getCurrentTime",
            ControlMessage::Note(_) => "note",
        }
    }

    pub fn from_json(source: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(source).map_err(malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Object(mut fields) = value else {
            return Err(MessageError::Malformed {
                reason: "expected an object with a 'type' field".to_string(),
            });
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(MessageError::Malformed {
                    reason: format!("'type' must be a string, got {other}"),
                });
            }
            None => {
                return Err(MessageError::Malformed {
                    reason: "missing 'type' field".to_string(),
                });
            }
        };
        let data = fields.remove("data").filter(|d| !d.is_null());
        if let Some(extra) = fields.keys().next() {
            return Err(MessageError::Malformed {
                reason: format!("unexpected field '{extra}'"),
            });
        }

        match kind.as_str() {
            "init" | "getCurrentTime" if data.is_some() => Err(MessageError::Malformed {
                reason: format!("message type '{kind}' takes no 'data'"),
            }),
            "init" => Ok(ControlMessage::Init),
            "getCurrentTime" => Ok(ControlMessage::GetCurrentTime),
            "update" => {
                let data = data.ok_or(MessageError::MissingPayload { kind: "update" })?;
                let graph = serde_json::from_value(data).map_err(malformed)?;
                Ok(ControlMessage::Update(graph))
            }
            "note" => {
                let data = data.ok_or(MessageError::MissingPayload { kind: "note" })?;
                let note = serde_json::from_value(data).map_err(malformed)?;
                Ok(ControlMessage::Note(note))
            }
            _ => Err(MessageError::UnknownKind { kind }),
        }
    }
}

fn malformed(e: serde_json::Error) -> MessageError {
    MessageError::Malformed {
        reason: e.to_string(),
    }
}

// ── Mapping ─────────────────────────────────────────────────

/// Everything the mapper reads besides the message itself.
#[derive(Debug, Clone)]
pub struct MapContext<'a> {
    pub scale: Scale,
    pub waveform: Waveform,
    pub init_gain: f64,
    pub noise: &'a Arc<SampleBuffer>,
}

/// What a message asks of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    /// Reconcile the engine to this graph.
    Render(GraphDescription),
    /// Read the transport clock; the graph is left alone.
    QueryTime,
}

/// Map one message to the graph the engine should render next.
///
/// `previous` is the last rendered graph; a note release removes its voices
/// and silences the output stage, leaving any other nodes in place.
pub fn map_message(message: &ControlMessage, previous: &GraphDescription, cx: &MapContext) -> Mapping {
    match message {
        ControlMessage::Init => Mapping::Render(init_graph(cx.init_gain)),
        ControlMessage::Update(graph) => Mapping::Render(substitute_pink_noise(graph, cx.noise)),
        ControlMessage::GetCurrentTime => Mapping::QueryTime,
        ControlMessage::Note(note) if note.is_down => {
            Mapping::Render(note_graph(&cx.scale, cx.waveform, note))
        }
        ControlMessage::Note(_) => Mapping::Render(release_graph(previous)),
    }
}

/// A single gain node on the output, so the engine has something to attach
/// before the first interaction.
pub fn init_graph(gain: f64) -> GraphDescription {
    GraphDescription::new().with_node(OUTPUT_GAIN, NodeSpec::gain(Target::Output, gain))
}

/// Lead voice at `x` semitones plus a detuned harmony voice, both into the
/// output gain stage at `y²`.
pub fn note_graph(scale: &Scale, waveform: Waveform, note: &NoteInput) -> GraphDescription {
    let into_gain = Target::Node(OUTPUT_GAIN);
    GraphDescription::new()
        .with_node(
            OUTPUT_GAIN,
            NodeSpec::gain(Target::Output, perceptual_gain(note.y)),
        )
        .with_node(
            LEAD_VOICE,
            NodeSpec::oscillator(into_gain, waveform, scale.frequency(note.x)),
        )
        .with_node(
            HARMONY_VOICE,
            NodeSpec::oscillator(into_gain, waveform, scale.harmony_frequency(note.x))
                .with_param("detune", scale.harmony_detune),
        )
}

/// Drop the note voices from `previous` and silence its output stage. After a
/// plain note graph this is exactly the init silence graph.
pub fn release_graph(previous: &GraphDescription) -> GraphDescription {
    let mut graph = previous.clone();
    graph.remove(LEAD_VOICE);
    graph.remove(HARMONY_VOICE);
    match graph.get_mut(OUTPUT_GAIN) {
        Some(stage) if stage.kind == NodeKind::Gain => {
            stage.params.insert("gain".to_string(), ParamValue::Number(0.0));
            graph
        }
        _ => init_graph(0.0),
    }
}

/// Rewrite every `pinkNoise` node into a looping `bufferSource` bound to
/// `buffer`. Targets and other params are kept; the input is not modified.
pub fn substitute_pink_noise(graph: &GraphDescription, buffer: &Arc<SampleBuffer>) -> GraphDescription {
    graph
        .iter()
        .map(|(id, spec)| {
            if spec.kind != NodeKind::PinkNoise {
                return (id, spec.clone());
            }
            let mut params = spec.params.clone();
            params.insert("buffer".to_string(), ParamValue::Buffer(Arc::clone(buffer)));
            params.insert("loop".to_string(), ParamValue::Bool(true));
            let spec = NodeSpec {
                kind: NodeKind::BufferSource,
                target: spec.target,
                params,
            };
            (id, spec)
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn noise() -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new("pinkNoise", 100, vec![0.1, -0.2, 0.3]))
    }

    fn render(message: &ControlMessage, previous: &GraphDescription) -> GraphDescription {
        let noise = noise();
        let cx = MapContext {
            scale: Scale::default(),
            waveform: Waveform::Sine,
            init_gain: 0.0,
            noise: &noise,
        };
        match map_message(message, previous, &cx) {
            Mapping::Render(graph) => graph,
            Mapping::QueryTime => panic!("expected a graph"),
        }
    }

    fn freq(graph: &GraphDescription, id: NodeId) -> f64 {
        graph
            .get(id)
            .and_then(|n| n.param("frequency"))
            .and_then(ParamValue::as_f64)
            .unwrap()
    }

    // ── Message parsing ──

    #[test]
    fn parses_each_kind() {
        assert_eq!(ControlMessage::from_json(r#"{"type":"init"}"#), Ok(ControlMessage::Init));
        assert_eq!(
            ControlMessage::from_json(r#"{"type":"getCurrentTime"}"#),
            Ok(ControlMessage::GetCurrentTime)
        );
        assert_eq!(
            ControlMessage::from_json(r#"{"type":"note","data":{"isDown":true,"x":3,"y":0.5}}"#),
            Ok(ControlMessage::Note(NoteInput { is_down: true, x: 3.0, y: 0.5 }))
        );
        let update = ControlMessage::from_json(
            r#"{"type":"update","data":{"0":["gain","output",{"gain":1}]}}"#,
        )
        .unwrap();
        assert_eq!(update.kind(), "update");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"explode"}"#).unwrap_err();
        assert_eq!(err, MessageError::UnknownKind { kind: "explode".to_string() });
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = ControlMessage::from_json(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, MessageError::Malformed { .. }));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = ControlMessage::from_json("[true, 0.5, 0.5]").unwrap_err();
        assert!(matches!(err, MessageError::Malformed { .. }));
    }

    #[test]
    fn payload_on_query_is_rejected() {
        for source in [
            r#"{"type":"init","data":{"0":["gain","output"]}}"#,
            r#"{"type":"getCurrentTime","data":1}"#,
        ] {
            match ControlMessage::from_json(source).unwrap_err() {
                MessageError::Malformed { reason } => assert!(reason.contains("takes no 'data'"), "{reason}"),
                other => panic!("unexpected error {other:?}"),
            }
        }
        // An explicit null payload is the same as none.
        assert_eq!(
            ControlMessage::from_json(r#"{"type":"init","data":null}"#),
            Ok(ControlMessage::Init)
        );
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"note","data":{"isDown":true,"x":0,"y":1},"velocity":3}"#)
            .unwrap_err();
        assert_eq!(
            err,
            MessageError::Malformed { reason: "unexpected field 'velocity'".to_string() }
        );
    }

    #[test]
    fn update_without_data_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"update"}"#).unwrap_err();
        assert_eq!(err, MessageError::MissingPayload { kind: "update" });
        let err = ControlMessage::from_json(r#"{"type":"update","data":null}"#).unwrap_err();
        assert_eq!(err, MessageError::MissingPayload { kind: "update" });
    }

    #[test]
    fn note_missing_field_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"note","data":{"isDown":true,"x":0}}"#)
            .unwrap_err();
        match err {
            MessageError::Malformed { reason } => assert!(reason.contains("y"), "{reason}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn update_with_bad_node_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"update","data":{"1":["gain"]}}"#)
            .unwrap_err();
        assert!(matches!(err, MessageError::Malformed { .. }));
    }

    // ── Mapping ──

    #[test]
    fn init_is_single_silent_output_gain() {
        let graph = render(&ControlMessage::Init, &GraphDescription::new());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.output_nodes().collect::<Vec<_>>(), vec![OUTPUT_GAIN]);
        assert_eq!(graph.count_kind(&NodeKind::Gain), 1);
        assert_eq!(graph.count_kind(&NodeKind::Oscillator), 0);
        assert_eq!(graph.get(OUTPUT_GAIN), Some(&NodeSpec::gain(Target::Output, 0.0)));
    }

    #[test]
    fn two_voice_mapping_at_root() {
        let note = NoteInput { is_down: true, x: 0.0, y: 1.0 };
        let graph = render(&ControlMessage::Note(note), &GraphDescription::new());

        assert_eq!(graph.len(), 3);
        assert_eq!(freq(&graph, LEAD_VOICE), 110.0);
        let harmony = freq(&graph, HARMONY_VOICE);
        assert!((harmony - 110.0 * 2.0_f64.powf(7.0 / 12.0)).abs() < 1e-9);
        assert!((harmony - 164.81).abs() < 0.01, "got {harmony}");

        let voice = graph.get(HARMONY_VOICE).unwrap();
        assert_eq!(voice.param("detune").and_then(ParamValue::as_f64), Some(4.0));
        assert_eq!(voice.target, Target::Node(OUTPUT_GAIN));
        assert_eq!(graph.get(LEAD_VOICE).unwrap().target, Target::Node(OUTPUT_GAIN));
        assert_eq!(graph.get(LEAD_VOICE).unwrap().param("detune"), None);
    }

    #[test]
    fn note_gain_is_squared_level() {
        for (y, expected) in [(0.0, 0.0), (0.5, 0.25), (1.0, 1.0)] {
            let note = NoteInput { is_down: true, x: 0.0, y };
            let graph = render(&ControlMessage::Note(note), &GraphDescription::new());
            let gain = graph.get(OUTPUT_GAIN).and_then(|n| n.param("gain")).unwrap();
            assert_eq!(gain.as_f64(), Some(expected));
        }
    }

    #[test]
    fn octave_up_doubles_both_voices() {
        let low = render(
            &ControlMessage::Note(NoteInput { is_down: true, x: 0.0, y: 1.0 }),
            &GraphDescription::new(),
        );
        let high = render(
            &ControlMessage::Note(NoteInput { is_down: true, x: 12.0, y: 1.0 }),
            &GraphDescription::new(),
        );
        for id in [LEAD_VOICE, HARMONY_VOICE] {
            assert!((freq(&high, id) - 2.0 * freq(&low, id)).abs() < 1e-9);
        }
    }

    #[test]
    fn note_mapping_is_deterministic() {
        let msg = ControlMessage::Note(NoteInput { is_down: true, x: 5.0, y: 0.3 });
        assert_eq!(
            render(&msg, &GraphDescription::new()),
            render(&msg, &GraphDescription::new())
        );
    }

    #[test]
    fn release_tears_down_voices() {
        let playing = render(
            &ControlMessage::Note(NoteInput { is_down: true, x: 2.0, y: 0.8 }),
            &GraphDescription::new(),
        );
        assert_eq!(playing.count_kind(&NodeKind::Oscillator), 2);
        let released = render(
            &ControlMessage::Note(NoteInput { is_down: false, x: 2.0, y: 0.8 }),
            &playing,
        );
        assert_eq!(released.count_kind(&NodeKind::Oscillator), 0);
        assert_eq!(released, init_graph(0.0));
    }

    #[test]
    fn release_keeps_unrelated_nodes() {
        let previous = GraphDescription::from_json(
            r#"{"0":["gain","output",{"gain":0.7}],"1":["oscillator",0,{"frequency":110}],"5":["pinkNoise",0]}"#,
        )
        .unwrap();
        let released = render(
            &ControlMessage::Note(NoteInput { is_down: false, x: 0.0, y: 0.0 }),
            &previous,
        );
        assert_eq!(released.get(LEAD_VOICE), None);
        assert_eq!(released.get(5), previous.get(5));
        let gain = released.get(OUTPUT_GAIN).and_then(|n| n.param("gain")).unwrap();
        assert_eq!(gain.as_f64(), Some(0.0));
    }

    #[test]
    fn release_without_previous_is_silence() {
        let released = render(
            &ControlMessage::Note(NoteInput { is_down: false, x: 0.0, y: 0.0 }),
            &GraphDescription::new(),
        );
        assert_eq!(released, init_graph(0.0));
    }

    #[test]
    fn current_time_produces_no_graph() {
        let noise = noise();
        let cx = MapContext {
            scale: Scale::default(),
            waveform: Waveform::Sine,
            init_gain: 0.0,
            noise: &noise,
        };
        let previous = init_graph(0.0);
        assert_eq!(
            map_message(&ControlMessage::GetCurrentTime, &previous, &cx),
            Mapping::QueryTime
        );
    }

    #[test]
    fn update_passes_graph_through() {
        let graph = GraphDescription::from_json(
            r#"{"0":["gain","output",{"gain":0.4}],"1":["oscillator",0,{"type":"square","frequency":220}]}"#,
        )
        .unwrap();
        let rendered = render(&ControlMessage::Update(graph.clone()), &GraphDescription::new());
        assert_eq!(rendered, graph);
    }

    // ── Pink noise substitution ──

    fn noisy_graph() -> GraphDescription {
        GraphDescription::from_json(
            r#"{
                "0": ["gain", "output", {"gain": 0.2}],
                "1": ["pinkNoise", 0, {"playbackRate": 0.5}],
                "2": ["pinkNoise", "output"],
                "3": ["oscillator", 0, {"frequency": 440}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn substitution_binds_shared_buffer() {
        let buffer = noise();
        let graph = substitute_pink_noise(&noisy_graph(), &buffer);

        for id in [1, 2] {
            let node = graph.get(id).unwrap();
            assert_eq!(node.kind, NodeKind::BufferSource);
            assert_eq!(node.param("loop").and_then(ParamValue::as_bool), Some(true));
            let bound = node.param("buffer").and_then(ParamValue::as_buffer).unwrap();
            assert!(Arc::ptr_eq(bound, &buffer));
        }
        assert_eq!(graph.get(1).unwrap().target, Target::Node(0));
        assert_eq!(graph.get(2).unwrap().target, Target::Output);
        assert_eq!(
            graph.get(1).unwrap().param("playbackRate").and_then(ParamValue::as_f64),
            Some(0.5)
        );
        assert_eq!(graph.count_kind(&NodeKind::PinkNoise), 0);
    }

    #[test]
    fn substitution_leaves_other_nodes_alone() {
        let original = noisy_graph();
        let graph = substitute_pink_noise(&original, &noise());
        assert_eq!(graph.get(0), original.get(0));
        assert_eq!(graph.get(3), original.get(3));
    }

    #[test]
    fn substitution_is_idempotent() {
        let buffer = noise();
        let once = substitute_pink_noise(&noisy_graph(), &buffer);
        let twice = substitute_pink_noise(&once, &buffer);
        assert_eq!(once, twice);
    }

    #[test]
    fn substitution_does_not_mutate_input() {
        let original = noisy_graph();
        let snapshot = original.clone();
        let _ = substitute_pink_noise(&original, &noise());
        assert_eq!(original, snapshot);
        assert_eq!(original.count_kind(&NodeKind::PinkNoise), 2);
    }
}
