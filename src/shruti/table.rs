// The fixed 22-shruti just-intonation table
//
// Ratios follow the classical 22-shruti system: Sa and Pa are fixed, every
// other svara has four positions. Western labels assume a tonic of C with
// "-"/"+" marking a syntonic comma below/above the equal-tempered note.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// One degree of the 22-tone scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToneEntry {
    pub name: &'static str,
    pub western_label: &'static str,
    /// Rounded cents above the tonic
    pub cent_value: i32,
    /// Frequency ratio to the tonic, in [1, 2)
    pub frequency_ratio: f64,
}

const fn tone(
    name: &'static str,
    western_label: &'static str,
    cent_value: i32,
    numerator: u32,
    denominator: u32,
) -> ToneEntry {
    ToneEntry {
        name,
        western_label,
        cent_value,
        frequency_ratio: numerator as f64 / denominator as f64,
    }
}

/// Ordered by ascending cent value
pub const SHRUTI_TABLE: [ToneEntry; 22] = [
    tone("Sa", "C", 0, 1, 1),
    tone("Re1", "Db-", 90, 256, 243),
    tone("Re2", "Db", 112, 16, 15),
    tone("Re3", "D-", 182, 10, 9),
    tone("Re4", "D", 204, 9, 8),
    tone("Ga1", "Eb-", 294, 32, 27),
    tone("Ga2", "Eb", 316, 6, 5),
    tone("Ga3", "E", 386, 5, 4),
    tone("Ga4", "E+", 408, 81, 64),
    tone("Ma1", "F", 498, 4, 3),
    tone("Ma2", "F+", 520, 27, 20),
    tone("Ma3", "F#", 590, 45, 32),
    tone("Ma4", "F#+", 612, 729, 512),
    tone("Pa", "G", 702, 3, 2),
    tone("Dha1", "Ab-", 792, 128, 81),
    tone("Dha2", "Ab", 814, 8, 5),
    tone("Dha3", "A", 884, 5, 3),
    tone("Dha4", "A+", 906, 27, 16),
    tone("Ni1", "Bb-", 996, 16, 9),
    tone("Ni2", "Bb", 1018, 9, 5),
    tone("Ni3", "B", 1088, 15, 8),
    tone("Ni4", "B+", 1110, 243, 128),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static ToneEntry>> =
    Lazy::new(|| SHRUTI_TABLE.iter().map(|entry| (entry.name, entry)).collect());

/// Look up a table entry by name
pub fn tone_by_name(name: &str) -> Option<&'static ToneEntry> {
    BY_NAME.get(name).copied()
}
