// MIDI Bridge - Audio-clock trigger times to wall-clock MIDI messages
//
// The scheduler thinks in audio-clock seconds; external MIDI ports are stamped
// with wall-clock seconds. The two clocks start at unrelated origins and drift
// apart, so every translation re-anchors on a fresh reading of both.
//
// Tolerance: between the two reads and the moment the message is due, the
// error is bounded by (time until due) * (relative drift rate). With the
// lookahead window at 100 ms and typical crystal drift (<100 ppm), that is
// well under a microsecond per message. Accumulated drift over a session is
// tracked against the offset observed at the first translation and reported
// once it exceeds `DRIFT_WARNING_THRESHOLD`.

use std::sync::Arc;

use super::event::MidiMessage;
use super::output::MidiSink;
use crate::audio::clock::{AudioClock, WallClock};

/// Accumulated audio/wall drift (seconds) that triggers a warning
pub const DRIFT_WARNING_THRESHOLD: f64 = 0.010;

pub struct ClockTranslator {
    audio: Arc<dyn AudioClock>,
    wall: Arc<dyn WallClock>,
    initial_offset: Option<f64>,
    last_drift: f64,
    drift_warned: bool,
}

impl ClockTranslator {
    pub fn new(audio: Arc<dyn AudioClock>, wall: Arc<dyn WallClock>) -> Self {
        Self {
            audio,
            wall,
            initial_offset: None,
            last_drift: 0.0,
            drift_warned: false,
        }
    }

    /// Wall time at which `audio_time` will happen, never earlier than now
    pub fn wall_time_for(&mut self, audio_time: f64) -> f64 {
        let audio_now = self.audio.now();
        let wall_now = self.wall.now();
        self.observe_offset(wall_now - audio_now);

        let wall_time = wall_now + (audio_time - audio_now);
        wall_time.max(wall_now)
    }

    pub fn wall_now(&self) -> f64 {
        self.wall.now()
    }

    fn observe_offset(&mut self, offset: f64) {
        let initial = *self.initial_offset.get_or_insert(offset);
        self.last_drift = offset - initial;

        if self.last_drift.abs() > DRIFT_WARNING_THRESHOLD && !self.drift_warned {
            log::warn!(
                "Audio and wall clocks drifted {:.1} ms since playback start",
                self.last_drift * 1000.0
            );
            self.drift_warned = true;
        }
    }

    /// Drift (seconds) between the clocks relative to the first translation
    pub fn drift(&self) -> f64 {
        self.last_drift
    }

    /// Forget the reference offset; the next translation becomes the new anchor
    pub fn rebase(&mut self) {
        self.initial_offset = None;
        self.last_drift = 0.0;
        self.drift_warned = false;
    }
}

/// Emits paired note messages on the selected output, if any
pub struct MidiBridge {
    output: Option<Box<dyn MidiSink>>,
    translator: ClockTranslator,
}

impl MidiBridge {
    pub fn new(audio: Arc<dyn AudioClock>, wall: Arc<dyn WallClock>) -> Self {
        Self {
            output: None,
            translator: ClockTranslator::new(audio, wall),
        }
    }

    /// Swap the output; returns the previous one
    ///
    /// Dropping a returned `MidirSink` lets its already-queued messages play
    /// out, so a deselect never cuts a note that is in flight.
    pub fn select_output(&mut self, output: Option<Box<dyn MidiSink>>) -> Option<Box<dyn MidiSink>> {
        match &output {
            Some(sink) => log::info!("MIDI output selected: {}", sink.name()),
            None => log::info!("MIDI output deselected"),
        }
        std::mem::replace(&mut self.output, output)
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output.as_deref().map(|sink| sink.name())
    }

    pub fn translator(&self) -> &ClockTranslator {
        &self.translator
    }

    pub fn translator_mut(&mut self) -> &mut ClockTranslator {
        &mut self.translator
    }

    fn emit(&mut self, message: MidiMessage, audio_time: f64) {
        let Some(sink) = self.output.as_mut() else {
            return;
        };
        let wall_time = self.translator.wall_time_for(audio_time);
        sink.send(&message.to_bytes(), wall_time);
    }

    pub fn note_on(&mut self, note: u8, accent: bool, audio_time: f64) {
        self.emit(MidiMessage::note_on(note, accent), audio_time);
    }

    pub fn note_off(&mut self, note: u8, audio_time: f64) {
        self.emit(MidiMessage::note_off(note), audio_time);
    }

    /// Drop queued messages and broadcast All Notes Off immediately
    pub fn all_notes_off(&mut self) {
        let Some(sink) = self.output.as_mut() else {
            return;
        };
        sink.clear();
        let now = self.translator.wall_now();
        sink.send(&MidiMessage::all_notes_off().to_bytes(), now);
    }
}
