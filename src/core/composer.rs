/// Procedural composer — builds and drives the audio graph for a musical plan.
///
/// Only one plan is live at a time: `initialize` tears down whatever the
/// previous game left behind before building anything new.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::audio::{
    AudioEngine, AudioError, EffectSpec, Layer, NodeId, Route, SequenceSpec, VoiceSpec,
};
use crate::core::plan::MusicalPlan;
use crate::core::style_profile::{StyleProfile, SynthSettings};
use crate::core::theory::{gain_to_db, NoteValue};
use crate::schema::analysis::CommitAnalysis;

/// Silence floor for master gain, in dB.
pub const VOLUME_FLOOR_DB: f64 = -80.0;
pub const DEFAULT_VOLUME: f64 = 0.7;

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("audio engine error: {0}")]
    Audio(#[from] AudioError),
}

/// Layers a given history and style get.
///
/// Melody always plays. Bass needs two voices; the pad needs three, or a
/// dread style; percussion is dropped from dread styles unless the history
/// is energetic.
pub fn gated_layers(profile: &StyleProfile, analysis: &CommitAnalysis) -> Vec<Layer> {
    let voices = analysis.music.voices;
    let dread = profile.style.is_dread();
    let mut layers = vec![Layer::Melody];
    if voices >= 2 {
        layers.push(Layer::Bass);
    }
    if voices >= 3 || dread {
        layers.push(Layer::Pad);
    }
    if !dread || analysis.music.energy > 0.5 {
        layers.push(Layer::Percussion);
    }
    layers
}

pub struct Composer<E: AudioEngine> {
    engine: E,
    plan: Option<MusicalPlan>,
    /// Every node this composer owns, in creation order.
    nodes: Vec<NodeId>,
    layers: Vec<Layer>,
    playing: bool,
    paused: bool,
    volume: f64,
}

impl<E: AudioEngine> Composer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            plan: None,
            nodes: Vec::new(),
            layers: Vec::new(),
            playing: false,
            paused: false,
            volume: DEFAULT_VOLUME,
        }
    }

    /// Build the audio graph for a history and arm every layer at the
    /// derived tempo. Playback is not started.
    pub fn initialize(
        &mut self,
        profile: &StyleProfile,
        analysis: &CommitAnalysis,
    ) -> Result<&MusicalPlan, ComposerError> {
        self.dispose();

        let plan = MusicalPlan::derive(profile, analysis);
        let layers = gated_layers(profile, analysis);
        if let Err(e) = self.build(profile, &plan, &layers) {
            warn!(error = %e, "audio graph construction failed, music disabled");
            self.dispose();
            return Err(e.into());
        }

        info!(
            style = %profile.style,
            root = plan.root_name(),
            scale = ?plan.scale,
            bpm = plan.bpm,
            layers = ?layers,
            "composer initialized"
        );
        self.layers = layers;
        Ok(self.plan.insert(plan))
    }

    fn build(
        &mut self,
        profile: &StyleProfile,
        plan: &MusicalPlan,
        layers: &[Layer],
    ) -> Result<(), AudioError> {
        let music = &profile.music;

        // Chain: voices -> reverb -> delay -> limiter -> master.
        let limiter = self.effect(&EffectSpec::Limiter {
            threshold_db: music.limiter_db,
        })?;
        self.engine.connect(limiter, Route::Master)?;
        let delay = self.effect(&EffectSpec::Delay {
            time: music.delay.time,
            feedback: music.delay.feedback,
            wet: music.delay.wet,
        })?;
        self.engine.connect(delay, Route::Node(limiter))?;
        let reverb = self.effect(&EffectSpec::Reverb {
            decay: music.reverb.decay,
            wet: music.reverb.wet,
        })?;
        self.engine.connect(reverb, Route::Node(delay))?;

        for &layer in layers {
            let (settings, polyphony, subdivision, steps) = match layer {
                Layer::Melody => (&music.melody, 1, NoteValue::Eighth, plan.melody.clone()),
                Layer::Bass => (&music.bass, 1, NoteValue::Quarter, plan.bass.clone()),
                Layer::Pad => (&music.pad, 4, NoteValue::Whole, plan.pad_steps()),
                Layer::Percussion => (
                    &music.percussion,
                    1,
                    NoteValue::Sixteenth,
                    plan.percussion_steps(),
                ),
            };
            let voice = self.voice(layer, settings, polyphony)?;
            self.engine.connect(voice, Route::Node(reverb))?;
            let sequence = self.engine.create_sequence(&SequenceSpec {
                voice,
                subdivision,
                steps,
            })?;
            self.nodes.push(sequence);
        }

        self.engine.set_bpm(plan.bpm)?;
        self.engine
            .set_master_gain_db(gain_to_db(self.volume, VOLUME_FLOOR_DB))?;
        Ok(())
    }

    fn effect(&mut self, spec: &EffectSpec) -> Result<NodeId, AudioError> {
        let id = self.engine.create_effect(spec)?;
        self.nodes.push(id);
        Ok(id)
    }

    fn voice(
        &mut self,
        layer: Layer,
        settings: &SynthSettings,
        polyphony: u8,
    ) -> Result<NodeId, AudioError> {
        let id = self.engine.create_voice(&VoiceSpec {
            layer,
            waveform: settings.waveform,
            polyphony,
            envelope: settings.envelope,
            volume_db: settings.volume_db,
        })?;
        self.nodes.push(id);
        Ok(id)
    }

    pub fn is_initialized(&self) -> bool {
        self.plan.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start every armed layer from the top.
    pub fn play(&mut self) {
        if !self.is_initialized() {
            debug!("play requested before the composer was initialized");
            return;
        }
        match self.engine.start_transport() {
            Ok(()) => {
                self.playing = true;
                self.paused = false;
            }
            Err(e) => warn!(error = %e, "could not start playback"),
        }
    }

    /// Suspend playback, keeping the sequence position.
    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        match self.engine.pause_transport() {
            Ok(()) => {
                self.playing = false;
                self.paused = true;
            }
            Err(e) => warn!(error = %e, "could not pause playback"),
        }
    }

    /// Flip between playing and paused. Returns whether music is now playing.
    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.pause();
        } else if self.paused {
            match self.engine.resume_transport() {
                Ok(()) => {
                    self.playing = true;
                    self.paused = false;
                }
                Err(e) => warn!(error = %e, "could not resume playback"),
            }
        } else {
            self.play();
        }
        self.playing
    }

    /// Master volume as linear gain, 0.0..=1.0.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        if !self.is_initialized() {
            return;
        }
        let db = gain_to_db(self.volume, VOLUME_FLOOR_DB);
        if let Err(e) = self.engine.set_master_gain_db(db) {
            warn!(error = %e, "could not set master volume");
        }
    }

    /// Stop the transport and release every node. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.nodes.is_empty() && self.plan.is_none() {
            return;
        }
        if let Err(e) = self.engine.stop_transport() {
            debug!(error = %e, "transport stop failed during dispose");
        }
        // Sequences were created last; release in reverse so nothing
        // outlives the node it feeds.
        for node in self.nodes.drain(..).rev() {
            if let Err(e) = self.engine.release(node) {
                warn!(node = node.0, error = %e, "audio node release failed");
            }
        }
        self.plan = None;
        self.layers.clear();
        self.playing = false;
        self.paused = false;
    }

    pub fn plan(&self) -> Option<&MusicalPlan> {
        self.plan.as_ref()
    }

    /// Layers built by the last successful `initialize`.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: AudioEngine> Drop for Composer<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
