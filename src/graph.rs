//! Declarative audio graph descriptions.
//!
//! A `GraphDescription` is the desired state of the audio graph at one
//! instant. The engine diffs consecutive descriptions by node id, so ids are
//! stable handles: reuse an id to update a node, drop it to tear the node down.
//!
//! Wire format (virtual-audio-graph):
//!
//! ```json
//! {
//!   "0": ["gain", "output", { "gain": 0.25 }],
//!   "1": ["oscillator", 0, { "type": "sine", "frequency": 110 }]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::dsp::noise::SampleBuffer;
use crate::dsp::oscillator::Waveform;

/// Node handle within a graph description. Id 0 is the output gain stage.
pub type NodeId = u32;

/// The id conventionally used for the final gain stage.
pub const OUTPUT_GAIN: NodeId = 0;

/// Parameter name → value for a single node.
pub type Params = BTreeMap<String, ParamValue>;

// ── Node Kind ───────────────────────────────────────────────

/// The kind of audio node. Unknown kinds are passed through verbatim; it is
/// the engine's job to reject them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Gain,
    Oscillator,
    BufferSource,
    /// Not an engine primitive; rewritten to `BufferSource` before rendering.
    PinkNoise,
    Other(String),
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "gain" => NodeKind::Gain,
            "oscillator" => NodeKind::Oscillator,
            "bufferSource" => NodeKind::BufferSource,
            "pinkNoise" => NodeKind::PinkNoise,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Gain => "gain",
            NodeKind::Oscillator => "oscillator",
            NodeKind::BufferSource => "bufferSource",
            NodeKind::PinkNoise => "pinkNoise",
            NodeKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(NodeKind::from_tag(&tag))
    }
}

// ── Target ──────────────────────────────────────────────────

/// Where a node's output is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The engine's physical output sink.
    Output,
    Node(NodeId),
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Target::Output => serializer.serialize_str("output"),
            Target::Node(id) => serializer.serialize_u32(*id),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTarget {
            Id(NodeId),
            Name(String),
        }

        match RawTarget::deserialize(deserializer)? {
            RawTarget::Id(id) => Ok(Target::Node(id)),
            RawTarget::Name(name) if name == "output" => Ok(Target::Output),
            RawTarget::Name(name) => Err(de::Error::custom(format!(
                "unknown target '{name}', expected \"output\" or a node id"
            ))),
        }
    }
}

// ── Parameter Values ────────────────────────────────────────

/// A node parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
    /// Scheduled automation, e.g. `["setValueAtTime", 0.5, 1.0]`. Opaque here.
    List(Vec<ParamValue>),
    /// A shared, pre-rendered sample buffer. Only the core creates these.
    Buffer(Arc<SampleBuffer>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Arc<SampleBuffer>> {
        match self {
            ParamValue::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<Waveform> for ParamValue {
    fn from(w: Waveform) -> Self {
        ParamValue::Text(w.as_str().to_string())
    }
}

impl From<Arc<SampleBuffer>> for ParamValue {
    fn from(b: Arc<SampleBuffer>) -> Self {
        ParamValue::Buffer(b)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Number(n) => serializer.serialize_f64(*n),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Text(s) => serializer.serialize_str(s),
            ParamValue::List(items) => items.serialize(serializer),
            // Samples never cross the wire per update; the JS side resolves
            // the handle to the AudioBuffer it built once.
            ParamValue::Buffer(buffer) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$buffer", buffer.name())?;
                map.end()
            }
        }
    }
}

struct ParamValueVisitor;

impl<'de> Visitor<'de> for ParamValueVisitor {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, boolean, string, or list of parameter values")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ParamValue, E> {
        Ok(ParamValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ParamValue, E> {
        Ok(ParamValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ParamValue, E> {
        Ok(ParamValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ParamValue, E> {
        Ok(ParamValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ParamValue, E> {
        Ok(ParamValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ParamValue, E> {
        Ok(ParamValue::Text(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ParamValue, E> {
        Err(de::Error::custom(
            "null is not a parameter value (omit the parameter to use its default)",
        ))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ParamValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ParamValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, _map: A) -> Result<ParamValue, A::Error> {
        Err(de::Error::custom(
            "object parameters are not accepted (buffers are bound by the core)",
        ))
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamValueVisitor)
    }
}

// ── Node Spec ───────────────────────────────────────────────

/// One node of the desired graph: `[kind, target, params]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub target: Target,
    pub params: Params,
}

impl NodeSpec {
    pub fn new(kind: NodeKind, target: Target) -> Self {
        NodeSpec {
            kind,
            target,
            params: Params::new(),
        }
    }

    pub fn gain(target: Target, gain: f64) -> Self {
        NodeSpec::new(NodeKind::Gain, target).with_param("gain", gain)
    }

    pub fn oscillator(target: Target, waveform: Waveform, frequency: f64) -> Self {
        NodeSpec::new(NodeKind::Oscillator, target)
            .with_param("type", waveform)
            .with_param("frequency", frequency)
    }

    /// A looping (or one-shot) player for a shared buffer.
    pub fn buffer_source(target: Target, buffer: Arc<SampleBuffer>, looping: bool) -> Self {
        NodeSpec::new(NodeKind::BufferSource, target)
            .with_param("buffer", buffer)
            .with_param("loop", looping)
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

impl Serialize for NodeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.kind, &self.target, &self.params).serialize(serializer)
    }
}

struct NodeSpecVisitor;

impl<'de> Visitor<'de> for NodeSpecVisitor {
    type Value = NodeSpec;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a [kind, target, params] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<NodeSpec, A::Error> {
        let kind: NodeKind = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let target: Target = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        // Params may be omitted for nodes that only need defaults.
        let params: Option<Params> = seq.next_element()?;
        if seq.next_element::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(4, &self));
        }
        Ok(NodeSpec {
            kind,
            target,
            params: params.unwrap_or_default(),
        })
    }
}

impl<'de> Deserialize<'de> for NodeSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(NodeSpecVisitor)
    }
}

// ── Graph Description ───────────────────────────────────────

/// The complete desired audio graph, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphDescription {
    nodes: BTreeMap<NodeId, NodeSpec>,
}

impl GraphDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: NodeId, spec: NodeSpec) -> Self {
        self.nodes.insert(id, spec);
        self
    }

    /// Insert or replace a node, returning the previous spec for that id.
    pub fn insert(&mut self, id: NodeId, spec: NodeSpec) -> Option<NodeSpec> {
        self.nodes.insert(id, spec)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeSpec> {
        self.nodes.remove(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeSpec> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeSpec)> {
        self.nodes.iter().map(|(id, spec)| (*id, spec))
    }

    /// Number of nodes of the given kind.
    pub fn count_kind(&self, kind: &NodeKind) -> usize {
        self.nodes.values().filter(|n| &n.kind == kind).count()
    }

    /// Ids of nodes connected directly to the output sink.
    pub fn output_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(|(_, spec)| spec.target == Target::Output)
            .map(|(id, _)| id)
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromIterator<(NodeId, NodeSpec)> for GraphDescription {
    fn from_iter<I: IntoIterator<Item = (NodeId, NodeSpec)>>(iter: I) -> Self {
        GraphDescription {
            nodes: iter.into_iter().collect(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────
