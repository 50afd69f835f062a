// MIDI messages sent to external instruments

/// Velocity for accented steps
pub const ACCENT_VELOCITY: u8 = 127;
/// Velocity for normal steps
pub const NORMAL_VELOCITY: u8 = 100;

/// Channel-voice messages this crate emits
///
/// `channel` is 0-based (0 is MIDI channel 1). Output always uses channel 0;
/// parsing accepts any channel so captured traffic can be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    AllNotesOff { channel: u8 },
}

impl MidiMessage {
    pub fn note_on(note: u8, accent: bool) -> Self {
        MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: if accent {
                ACCENT_VELOCITY
            } else {
                NORMAL_VELOCITY
            },
        }
    }

    pub fn note_off(note: u8) -> Self {
        MidiMessage::NoteOff { channel: 0, note }
    }

    pub fn all_notes_off() -> Self {
        MidiMessage::AllNotesOff { channel: 0 }
    }

    /// Encode as a raw 3-byte message
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff { channel, note } => [0x80 | (channel & 0x0F), note & 0x7F, 0],
            MidiMessage::AllNotesOff { channel } => [0xB0 | (channel & 0x0F), 123, 0],
        }
    }

    /// Parse a raw message
    ///
    /// Note On with velocity 0 is read as Note Off.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }

        let channel = bytes[0] & 0x0F;
        match bytes[0] & 0xF0 {
            0x90 if bytes[2] == 0 => Some(MidiMessage::NoteOff {
                channel,
                note: bytes[1],
            }),
            0x90 => Some(MidiMessage::NoteOn {
                channel,
                note: bytes[1],
                velocity: bytes[2],
            }),
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: bytes[1],
            }),
            0xB0 if bytes[1] == 123 => Some(MidiMessage::AllNotesOff { channel }),
            _ => None,
        }
    }
}
