//! Interpretation vertices.
//!
//! An `Inter` is a typed symbol hypothesis produced from a classifier
//! evaluation (or seeded by an earlier stage), living inside the system's
//! interpretation graph. Its shape and kind never change after creation;
//! staff binding and relations may be set later.

use crate::geom::{Point, Rect};
use crate::glyph::GlyphId;
use crate::shape::{FermataKind, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratio applied to every classifier confidence to obtain an intrinsic
/// interpretation grade. A single constant, uniform across all shape
/// categories.
pub const INTRINSIC_RATIO: f64 = 0.8;

/// Calibrated grade for a raw classifier confidence.
#[inline]
pub fn calibrated_grade(confidence: f64) -> f64 {
    confidence * INTRINSIC_RATIO
}

/// Stable identifier of an interpretation vertex within one graph.
///
/// Transparent `u32` index into the graph's slot arena. Slots are
/// tombstoned on deletion, never reused, so an `InterId` stays valid as a
/// key for the lifetime of the graph (lookups on a deleted vertex return
/// `None`).
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InterId(u32);

impl InterId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for InterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inter#{}", self.0)
    }
}

/// Identifier of a staff within the system (index into `SystemInfo`).
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StaffId(u16);

impl StaffId {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Typed variant of an interpretation vertex.
///
/// The first five kinds are seeded by earlier stages (structural context);
/// rests appear both seeded and newly built. The remaining kinds are
/// produced by this engine's construction rules and deferred passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterKind {
    Stem,
    Head,
    HeadChord,
    Rest,
    Barline,

    Clef,
    Alter,
    Flag,
    /// Partial time-signature number with its numeric value.
    TimeNumber(u8),
    /// Whole time-signature symbol (C, cut-C).
    TimeWhole,
    Dynamic,
    Tuplet,
    Fermata(FermataKind),
    Pedal,
    /// Rhythmic augmentation dot (winning dot role).
    AugmentationDot,
    /// Staccato articulation dot (winning dot role).
    Staccato,
    /// Structural dot of a barline repeat sign (winning dot role).
    RepeatDot,
    Fingering(u8),
    Fret,
    Plucking,
}

/// A vertex of the interpretation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inter {
    pub kind: InterKind,
    pub shape: Shape,
    /// Calibrated grade in `[0, INTRINSIC_RATIO]`.
    pub grade: f64,
    pub bounds: Rect,
    /// Owning staff, when the construction rule binds one.
    pub staff: Option<StaffId>,
    /// Source glyph, absent for context-seeded vertices built from merged
    /// regions.
    pub glyph: Option<GlyphId>,
}

impl Inter {
    pub fn new(kind: InterKind, shape: Shape, grade: f64, bounds: Rect) -> Self {
        Self {
            kind,
            shape,
            grade,
            bounds,
            staff: None,
            glyph: None,
        }
    }

    pub fn with_staff(mut self, staff: StaffId) -> Self {
        self.staff = Some(staff);
        self
    }

    pub fn with_glyph(mut self, glyph: GlyphId) -> Self {
        self.glyph = Some(glyph);
        self
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    /// Abscissa ordering key: the center abscissa, the same key the
    /// positional indices sort by.
    #[inline]
    pub fn abscissa(&self) -> i32 {
        self.bounds.center().x
    }

    /// Tie-break key independent of insertion order: geometry first, then
    /// the source glyph.
    #[inline]
    pub fn stable_key(&self) -> (i32, i32, Option<GlyphId>) {
        (self.abscissa(), self.center().y, self.glyph)
    }

    /// Whether this vertex belongs to a time-signature kind (whole or
    /// partial).
    pub fn is_time(&self) -> bool {
        matches!(self.kind, InterKind::TimeWhole | InterKind::TimeNumber(_))
    }
}
