//! Assembly configuration.
//!
//! Three gates control the optional shape categories (all off by default),
//! and the neighborhood parameters used by construction-rule searches are
//! surfaced here as explicit interline fractions rather than hidden
//! constants. All fields have serde defaults so a partial configuration
//! file deserializes cleanly.

use serde::{Deserialize, Serialize};

/// Configuration recognized by the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Should fingering digits (guitar left hand) produce interpretations?
    pub support_fingerings: bool,
    /// Should fret roman numerals produce interpretations?
    pub support_frets: bool,
    /// Should plucking letters (guitar right hand) produce interpretations?
    pub support_pluckings: bool,

    /// Max horizontal gap, in interline fractions, between an accidental and
    /// the head it alters.
    pub alter_head_dx: f64,
    /// Max vertical gap for the accidental-to-head search.
    pub alter_head_dy: f64,
    /// Max horizontal distance between a rest and some head-chord providing
    /// rhythmic context.
    pub rest_chord_dx: f64,
    /// Max horizontal gap between a flag and its stem.
    pub flag_stem_dx: f64,
    /// Max horizontal distance between a fermata and a barline for the
    /// immediate barline link.
    pub fermata_bar_dx: f64,
    /// Max vertical gap between a fermata and its supporting chord.
    pub fermata_chord_dy: f64,
    /// Max horizontal gap between a dot and its augmented head or rest.
    pub dot_note_dx: f64,
    /// Max vertical gap for dot role searches.
    pub dot_dy: f64,
    /// Vertical margin, in interline fractions, accepted when validating
    /// that a partial time number sits on its staff.
    pub time_staff_margin: f64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            support_fingerings: false,
            support_frets: false,
            support_pluckings: false,
            alter_head_dx: 2.0,
            alter_head_dy: 1.0,
            rest_chord_dx: 4.0,
            flag_stem_dx: 0.75,
            fermata_bar_dx: 1.0,
            fermata_chord_dy: 6.0,
            dot_note_dx: 2.0,
            dot_dy: 1.5,
            time_staff_margin: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_categories_default_off() {
        let config = AssemblyConfig::default();
        assert!(!config.support_fingerings);
        assert!(!config.support_frets);
        assert!(!config.support_pluckings);
    }

    #[test]
    fn neighborhood_defaults_are_positive() {
        let config = AssemblyConfig::default();
        for value in [
            config.alter_head_dx,
            config.alter_head_dy,
            config.rest_chord_dx,
            config.flag_stem_dx,
            config.fermata_bar_dx,
            config.fermata_chord_dy,
            config.dot_note_dx,
            config.dot_dy,
            config.time_staff_margin,
        ] {
            assert!(value > 0.0);
        }
    }
}
