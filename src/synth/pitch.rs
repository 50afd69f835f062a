// Pitch table - Step pitch index to note number and frequency

/// Number of selectable pitches per step (one octave, both ends inclusive)
pub const PITCH_COUNT: usize = 13;

/// Note numbers for each pitch index: C2..C3 chromatic
pub const PITCH_TABLE: [u8; PITCH_COUNT] = [36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48];

/// Reference tuning: A4 = 440 Hz at note 69
pub const REFERENCE_FREQUENCY: f64 = 440.0;
pub const REFERENCE_NOTE: u8 = 69;

/// Note number for a pitch index, `None` if the index is outside the table
pub fn note_for_index(pitch_index: usize) -> Option<u8> {
    PITCH_TABLE.get(pitch_index).copied()
}

/// Equal-tempered conversion: 440 * 2^((note - 69) / 12)
pub fn note_to_frequency(note: u8) -> f64 {
    REFERENCE_FREQUENCY * 2f64.powf((note as f64 - REFERENCE_NOTE as f64) / 12.0)
}

/// Note name such as "C2" or "F#2" (octave numbering with note 60 = C4)
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NAMES[(note % 12) as usize], octave)
}
