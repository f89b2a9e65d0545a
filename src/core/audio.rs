/// Audio synthesis capability consumed by the composer.
///
/// The composer decides *what* plays; an `AudioEngine` implementation owns
/// waveform synthesis, scheduling, and the process-wide transport. Every
/// operation is fallible and the composer degrades to silence on failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::theory::{NoteValue, Pitch};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("audio engine unavailable: {0}")]
    Unavailable(String),
    #[error("unknown audio node {0:?}")]
    UnknownNode(NodeId),
    #[error("audio engine rejected operation: {0}")]
    Rejected(String),
}

/// Handle to an engine-owned voice, effect, or sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Musical layer a voice or sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Melody,
    Bass,
    Pad,
    Percussion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
    Fm,
    Am,
    Noise,
    Membrane,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSpec {
    pub layer: Layer,
    pub waveform: Waveform,
    /// Simultaneous notes the voice can hold.
    pub polyphony: u8,
    pub envelope: Envelope,
    pub volume_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectSpec {
    Reverb { decay: f64, wet: f64 },
    Delay { time: NoteValue, feedback: f64, wet: f64 },
    Limiter { threshold_db: f64 },
}

/// One step of a looped sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepEvent {
    Rest,
    Note {
        pitches: Vec<Pitch>,
        duration: NoteValue,
        velocity: f64,
    },
    /// Unpitched hit for percussion voices.
    Hit { velocity: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSpec {
    pub voice: NodeId,
    /// Length of one step.
    pub subdivision: NoteValue,
    pub steps: Vec<StepEvent>,
}

/// Where a node's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Node(NodeId),
    Master,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Started,
    Paused,
}

/// External synthesis capability: voices, effects, step sequencing, and a
/// shared transport clock.
pub trait AudioEngine {
    fn create_voice(&mut self, spec: &VoiceSpec) -> Result<NodeId, AudioError>;
    fn create_effect(&mut self, spec: &EffectSpec) -> Result<NodeId, AudioError>;
    fn connect(&mut self, from: NodeId, to: Route) -> Result<(), AudioError>;
    /// Arm a looping sequence. It sounds only while the transport runs.
    fn create_sequence(&mut self, spec: &SequenceSpec) -> Result<NodeId, AudioError>;
    fn set_bpm(&mut self, bpm: u32) -> Result<(), AudioError>;
    /// Start the transport from position zero.
    fn start_transport(&mut self) -> Result<(), AudioError>;
    fn pause_transport(&mut self) -> Result<(), AudioError>;
    /// Continue from the paused position.
    fn resume_transport(&mut self) -> Result<(), AudioError>;
    fn stop_transport(&mut self) -> Result<(), AudioError>;
    fn set_master_gain_db(&mut self, db: f64) -> Result<(), AudioError>;
    fn release(&mut self, node: NodeId) -> Result<(), AudioError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessNode {
    Voice(VoiceSpec),
    Effect(EffectSpec),
    Sequence(SequenceSpec),
}

/// Engine that keeps the node graph in memory and produces no sound.
///
/// Used for headless runs (terminal tools, browser builds that schedule
/// audio on the JavaScript side) and as an inspectable fake in tests.
#[derive(Debug, Clone)]
pub struct HeadlessEngine {
    next_id: u64,
    nodes: BTreeMap<NodeId, HeadlessNode>,
    routes: Vec<(NodeId, Route)>,
    bpm: u32,
    transport: TransportState,
    master_db: f64,
    release_attempts: usize,
    fail_releases: bool,
    unavailable: bool,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self {
            next_id: 1,
            nodes: BTreeMap::new(),
            routes: Vec::new(),
            bpm: 120,
            transport: TransportState::Stopped,
            master_db: 0.0,
            release_attempts: 0,
            fail_releases: false,
            unavailable: false,
        }
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every call fails, as when no audio device exists.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Make every `release` call fail (nodes stay allocated).
    pub fn set_fail_releases(&mut self, fail: bool) {
        self.fail_releases = fail;
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Layers that currently have a live voice.
    pub fn voice_layers(&self) -> Vec<Layer> {
        let mut layers: Vec<Layer> = self
            .nodes
            .values()
            .filter_map(|n| match n {
                HeadlessNode::Voice(v) => Some(v.layer),
                _ => None,
            })
            .collect();
        layers.sort();
        layers
    }

    pub fn effects(&self) -> Vec<&EffectSpec> {
        self.nodes
            .values()
            .filter_map(|n| match n {
                HeadlessNode::Effect(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn sequences(&self) -> Vec<&SequenceSpec> {
        self.nodes
            .values()
            .filter_map(|n| match n {
                HeadlessNode::Sequence(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn routes(&self) -> &[(NodeId, Route)] {
        &self.routes
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn master_db(&self) -> f64 {
        self.master_db
    }

    pub fn release_attempts(&self) -> usize {
        self.release_attempts
    }

    fn check(&self) -> Result<(), AudioError> {
        if self.unavailable {
            return Err(AudioError::Unavailable("no output device".to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, node: HeadlessNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }
}

impl AudioEngine for HeadlessEngine {
    fn create_voice(&mut self, spec: &VoiceSpec) -> Result<NodeId, AudioError> {
        self.check()?;
        Ok(self.insert(HeadlessNode::Voice(spec.clone())))
    }

    fn create_effect(&mut self, spec: &EffectSpec) -> Result<NodeId, AudioError> {
        self.check()?;
        Ok(self.insert(HeadlessNode::Effect(spec.clone())))
    }

    fn connect(&mut self, from: NodeId, to: Route) -> Result<(), AudioError> {
        self.check()?;
        if !self.nodes.contains_key(&from) {
            return Err(AudioError::UnknownNode(from));
        }
        if let Route::Node(target) = to {
            if !self.nodes.contains_key(&target) {
                return Err(AudioError::UnknownNode(target));
            }
        }
        self.routes.push((from, to));
        Ok(())
    }

    fn create_sequence(&mut self, spec: &SequenceSpec) -> Result<NodeId, AudioError> {
        self.check()?;
        if !self.nodes.contains_key(&spec.voice) {
            return Err(AudioError::UnknownNode(spec.voice));
        }
        Ok(self.insert(HeadlessNode::Sequence(spec.clone())))
    }

    fn set_bpm(&mut self, bpm: u32) -> Result<(), AudioError> {
        self.check()?;
        self.bpm = bpm;
        Ok(())
    }

    fn start_transport(&mut self) -> Result<(), AudioError> {
        self.check()?;
        self.transport = TransportState::Started;
        Ok(())
    }

    fn pause_transport(&mut self) -> Result<(), AudioError> {
        self.check()?;
        if self.transport == TransportState::Started {
            self.transport = TransportState::Paused;
        }
        Ok(())
    }

    fn resume_transport(&mut self) -> Result<(), AudioError> {
        self.check()?;
        self.transport = TransportState::Started;
        Ok(())
    }

    fn stop_transport(&mut self) -> Result<(), AudioError> {
        self.check()?;
        self.transport = TransportState::Stopped;
        Ok(())
    }

    fn set_master_gain_db(&mut self, db: f64) -> Result<(), AudioError> {
        self.check()?;
        self.master_db = db;
        Ok(())
    }

    fn release(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.release_attempts += 1;
        self.check()?;
        if self.fail_releases {
            return Err(AudioError::Rejected(format!("release of {node:?} refused")));
        }
        self.nodes
            .remove(&node)
            .map(|_| ())
            .ok_or(AudioError::UnknownNode(node))?;
        self.routes
            .retain(|(from, to)| *from != node && *to != Route::Node(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(layer: Layer) -> VoiceSpec {
        VoiceSpec {
            layer,
            waveform: Waveform::Sine,
            polyphony: 1,
            envelope: Envelope {
                attack: 0.01,
                decay: 0.1,
                sustain: 0.5,
                release: 0.5,
            },
            volume_db: -6.0,
        }
    }

    #[test]
    fn nodes_allocate_and_release() {
        let mut engine = HeadlessEngine::new();
        let v = engine.create_voice(&voice(Layer::Bass)).unwrap();
        let fx = engine
            .create_effect(&EffectSpec::Limiter { threshold_db: -1.0 })
            .unwrap();
        engine.connect(v, Route::Node(fx)).unwrap();
        engine.connect(fx, Route::Master).unwrap();
        assert_eq!(engine.live_nodes(), 2);
        assert_eq!(engine.voice_layers(), vec![Layer::Bass]);

        engine.release(v).unwrap();
        assert_eq!(engine.live_nodes(), 1);
        assert_eq!(engine.routes(), &[(fx, Route::Master)]);
        assert!(engine.release(v).is_err());
    }

    #[test]
    fn sequence_requires_known_voice() {
        let mut engine = HeadlessEngine::new();
        let spec = SequenceSpec {
            voice: NodeId(99),
            subdivision: NoteValue::Eighth,
            steps: vec![StepEvent::Rest],
        };
        assert_eq!(
            engine.create_sequence(&spec),
            Err(AudioError::UnknownNode(NodeId(99)))
        );
    }

    #[test]
    fn transport_pause_only_from_started() {
        let mut engine = HeadlessEngine::new();
        engine.pause_transport().unwrap();
        assert_eq!(engine.transport(), TransportState::Stopped);
        engine.start_transport().unwrap();
        engine.pause_transport().unwrap();
        assert_eq!(engine.transport(), TransportState::Paused);
        engine.resume_transport().unwrap();
        assert_eq!(engine.transport(), TransportState::Started);
    }

    #[test]
    fn unavailable_engine_fails_everything() {
        let mut engine = HeadlessEngine::unavailable();
        assert!(engine.create_voice(&voice(Layer::Melody)).is_err());
        assert!(engine.set_bpm(90).is_err());
    }
}
