//! Classifier shape labels and construction categories.
//!
//! `Shape` is the closed set of labels the external classifier can emit for
//! a glyph. `ShapeClass` is the coarser grouping the dispatcher routes on:
//! every construction rule handles one class. `Shape::class()` is the total
//! mapping between the two; shapes that map to `None` (stems, noteheads,
//! barlines and anything else built by earlier stages) produce no
//! interpretation at intake, by policy.

use serde::{Deserialize, Serialize};

/// A concrete classifier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    // Clefs
    GClef,
    GClefOttavaBassa,
    FClef,
    CClef,
    PercussionClef,

    // Rests
    WholeRest,
    HalfRest,
    QuarterRest,
    EighthRest,
    SixteenthRest,

    // Alterations
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,

    // Flags (down variants hang from stem top, up variants from stem bottom)
    Flag1,
    Flag2,
    Flag1Up,
    Flag2Up,

    // Partial time-signature numbers
    TimeOne,
    TimeTwo,
    TimeThree,
    TimeFour,
    TimeFive,
    TimeSix,
    TimeSeven,
    TimeEight,
    TimeNine,
    TimeTwelve,
    TimeSixteen,

    // Whole time-signature symbols
    CommonTime,
    CutTime,
    TimeFourFour,
    TimeTwoFour,
    TimeThreeFour,
    TimeSixEight,

    // Dynamics
    DynamicPiano,
    DynamicForte,
    DynamicMezzoForte,
    DynamicPianissimo,
    DynamicFortissimo,
    DynamicSforzando,

    // Tuplets
    TupletThree,
    TupletSix,

    // Fermatas
    FermataAbove,
    FermataBelow,

    // Pedals
    PedalDown,
    PedalUp,

    /// The ambiguous dot mark (augmentation / staccato / repeat dot).
    Dot,

    // Fingerings (guitar left hand)
    DigitZero,
    DigitOne,
    DigitTwo,
    DigitThree,
    DigitFour,
    DigitFive,

    // Frets (roman numerals)
    RomanOne,
    RomanTwo,
    RomanThree,
    RomanFour,
    RomanFive,
    RomanSeven,
    RomanNine,
    RomanTwelve,

    // Pluckings (guitar right hand: p i m a)
    PluckP,
    PluckI,
    PluckM,
    PluckA,

    // Labels owned by earlier pipeline stages; never dispatched here.
    Stem,
    NoteheadBlack,
    NoteheadVoid,
    Barline,
    Beam,
    Slur,
}

/// Construction category routed on by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeClass {
    Clef,
    Rest,
    Alteration,
    Flag,
    PartialTime,
    WholeTime,
    Dynamic,
    Tuplet,
    Fermata,
    Pedal,
    Dot,
    Fingering,
    Fret,
    Plucking,
}

/// Vertical orientation of a fermata mark.
///
/// Orientation is intrinsic to the shape: a fermata drawn below the staff
/// attaches to chords located above the mark, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FermataKind {
    Above,
    Below,
}

impl Shape {
    /// Construction category of this shape, or `None` for labels this
    /// engine never builds from.
    pub fn class(&self) -> Option<ShapeClass> {
        use Shape::*;
        let class = match self {
            GClef | GClefOttavaBassa | FClef | CClef | PercussionClef => ShapeClass::Clef,
            WholeRest | HalfRest | QuarterRest | EighthRest | SixteenthRest => ShapeClass::Rest,
            Sharp | Flat | Natural | DoubleSharp | DoubleFlat => ShapeClass::Alteration,
            Flag1 | Flag2 | Flag1Up | Flag2Up => ShapeClass::Flag,
            TimeOne | TimeTwo | TimeThree | TimeFour | TimeFive | TimeSix | TimeSeven
            | TimeEight | TimeNine | TimeTwelve | TimeSixteen => ShapeClass::PartialTime,
            CommonTime | CutTime | TimeFourFour | TimeTwoFour | TimeThreeFour | TimeSixEight => {
                ShapeClass::WholeTime
            }
            DynamicPiano | DynamicForte | DynamicMezzoForte | DynamicPianissimo
            | DynamicFortissimo | DynamicSforzando => ShapeClass::Dynamic,
            TupletThree | TupletSix => ShapeClass::Tuplet,
            FermataAbove | FermataBelow => ShapeClass::Fermata,
            PedalDown | PedalUp => ShapeClass::Pedal,
            Dot => ShapeClass::Dot,
            DigitZero | DigitOne | DigitTwo | DigitThree | DigitFour | DigitFive => {
                ShapeClass::Fingering
            }
            RomanOne | RomanTwo | RomanThree | RomanFour | RomanFive | RomanSeven | RomanNine
            | RomanTwelve => ShapeClass::Fret,
            PluckP | PluckI | PluckM | PluckA => ShapeClass::Plucking,
            Stem | NoteheadBlack | NoteheadVoid | Barline | Beam | Slur => return None,
        };
        Some(class)
    }

    /// Numeric value of a partial time-signature number, if any.
    pub fn time_number(&self) -> Option<u8> {
        use Shape::*;
        match self {
            TimeOne => Some(1),
            TimeTwo => Some(2),
            TimeThree => Some(3),
            TimeFour => Some(4),
            TimeFive => Some(5),
            TimeSix => Some(6),
            TimeSeven => Some(7),
            TimeEight => Some(8),
            TimeNine => Some(9),
            TimeTwelve => Some(12),
            TimeSixteen => Some(16),
            _ => None,
        }
    }

    /// Numerator/denominator pair encoded by a compound whole time shape.
    ///
    /// `CommonTime` and `CutTime` are single symbols and do not split.
    pub fn time_pair(&self) -> Option<(u8, u8)> {
        use Shape::*;
        match self {
            TimeFourFour => Some((4, 4)),
            TimeTwoFour => Some((2, 4)),
            TimeThreeFour => Some((3, 4)),
            TimeSixEight => Some((6, 8)),
            _ => None,
        }
    }

    /// Orientation of a fermata shape.
    pub fn fermata_kind(&self) -> Option<FermataKind> {
        match self {
            Shape::FermataAbove => Some(FermataKind::Above),
            Shape::FermataBelow => Some(FermataKind::Below),
            _ => None,
        }
    }

    /// Whether this flag variant points upward (hangs from a stem bottom).
    pub fn is_up_flag(&self) -> bool {
        matches!(self, Shape::Flag1Up | Shape::Flag2Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_shapes_have_no_class() {
        assert_eq!(Shape::Stem.class(), None);
        assert_eq!(Shape::NoteheadBlack.class(), None);
        assert_eq!(Shape::Barline.class(), None);
    }

    #[test]
    fn class_routing() {
        assert_eq!(Shape::GClef.class(), Some(ShapeClass::Clef));
        assert_eq!(Shape::QuarterRest.class(), Some(ShapeClass::Rest));
        assert_eq!(Shape::Dot.class(), Some(ShapeClass::Dot));
        assert_eq!(Shape::TimeSix.class(), Some(ShapeClass::PartialTime));
        assert_eq!(Shape::CutTime.class(), Some(ShapeClass::WholeTime));
    }

    #[test]
    fn whole_time_split() {
        assert_eq!(Shape::TimeSixEight.time_pair(), Some((6, 8)));
        assert_eq!(Shape::CommonTime.time_pair(), None);
        assert_eq!(Shape::CutTime.time_pair(), None);
    }

    #[test]
    fn fermata_orientation_is_intrinsic() {
        assert_eq!(Shape::FermataBelow.fermata_kind(), Some(FermataKind::Below));
        assert_eq!(Shape::FermataAbove.fermata_kind(), Some(FermataKind::Above));
        assert_eq!(Shape::Dot.fermata_kind(), None);
    }
}
