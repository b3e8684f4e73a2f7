//! Evaluation intake, dispatch and the finalize phase machine.
//!
//! One `SymbolAssembler` per system. Evaluations stream in through
//! `intake` in arbitrary order; once the system's glyphs are exhausted a
//! single `finalize` call runs the deferred passes in fixed order:
//! fermata linking, dot late checks, time-column assembly. Each pass
//! assumes the graph state left by the previous one, which is why the
//! ordering is enforced by an explicit phase enum rather than ad hoc
//! flags.
//!
//! # Invariants
//! - Positional indices are rebuilt on demand and invalidated whenever a
//!   vertex of an indexed category is added; all caches are additionally
//!   dropped at every pass boundary.
//! - Intake after finalize is a boundary error, as are out-of-range
//!   confidences, degenerate glyphs and unknown staves: these indicate a
//!   contract breach by an upstream collaborator. Every other failure mode
//!   is "fewer interpretations", never an error.

use crate::config::AssemblyConfig;
use crate::context::SystemInfo;
use crate::dots::DotResolver;
use crate::glyph::{Glyph, GlyphId, GlyphIndex};
use crate::inter::{calibrated_grade, InterId, InterKind, StaffId};
use crate::linker::{assemble_time_columns, link_fermatas, BasicColumn, TimeColumnRetriever};
use crate::rules::{rule_for, BuildCx};
use crate::shape::{Shape, ShapeClass};
use crate::sig::InterGraph;
use std::fmt;
use tracing::{debug, trace};

/// A classifier result for one glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub shape: Shape,
    /// Raw classifier confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Evaluation {
    pub const fn new(shape: Shape, confidence: f64) -> Self {
        Self { shape, confidence }
    }
}

/// Assembly progress for one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Evaluations are still being taken in.
    Collecting,
    /// Fermata linking has run.
    FermatasResolved,
    /// Dot late checks have run.
    DotsResolved,
    /// Time columns have been assembled; the graph is final.
    TimesResolved,
}

/// Upstream contract breach detected at the intake boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeError {
    /// Confidence outside `[0, 1]` (or NaN).
    ConfidenceOutOfRange(f64),
    /// Glyph bounds enclose no pixels.
    DegenerateGlyph(GlyphId),
    /// The nearest-staff id does not exist in this system.
    UnknownStaff(StaffId),
    /// Intake attempted after the finalize sequence started.
    AlreadyFinalized,
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::ConfidenceOutOfRange(c) => {
                write!(f, "confidence {} outside [0, 1]", c)
            }
            IntakeError::DegenerateGlyph(id) => write!(f, "degenerate bounds for {}", id),
            IntakeError::UnknownStaff(id) => write!(f, "unknown staff {:?}", id),
            IntakeError::AlreadyFinalized => write!(f, "intake after finalize"),
        }
    }
}

impl std::error::Error for IntakeError {}

/// Error for a repeated finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyFinalized;

impl fmt::Display for AlreadyFinalized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "finalize already ran for this system")
    }
}

impl std::error::Error for AlreadyFinalized {}

/// Lazily built, cached abscissa orderings per structural category.
///
/// Each list is sorted by center abscissa (ties by the order-independent
/// key) and rebuilt on the next query after invalidation.
#[derive(Debug, Default)]
pub(crate) struct PositionalIndices {
    stems: Option<Vec<InterId>>,
    heads: Option<Vec<InterId>>,
    head_chords: Option<Vec<InterId>>,
    rests: Option<Vec<InterId>>,
    barlines: Option<Vec<InterId>>,
}

fn build_index(sig: &InterGraph, kind: InterKind) -> Vec<InterId> {
    // inters_of_kind already sorts by (abscissa, stable key).
    sig.inters_of_kind(kind)
}

impl PositionalIndices {
    pub(crate) fn stems(&mut self, sig: &InterGraph) -> &[InterId] {
        self.stems.get_or_insert_with(|| build_index(sig, InterKind::Stem))
    }

    pub(crate) fn heads(&mut self, sig: &InterGraph) -> &[InterId] {
        self.heads.get_or_insert_with(|| build_index(sig, InterKind::Head))
    }

    pub(crate) fn head_chords(&mut self, sig: &InterGraph) -> &[InterId] {
        self.head_chords
            .get_or_insert_with(|| build_index(sig, InterKind::HeadChord))
    }

    pub(crate) fn rests(&mut self, sig: &InterGraph) -> &[InterId] {
        self.rests.get_or_insert_with(|| build_index(sig, InterKind::Rest))
    }

    pub(crate) fn barlines(&mut self, sig: &InterGraph) -> &[InterId] {
        self.barlines
            .get_or_insert_with(|| build_index(sig, InterKind::Barline))
    }

    /// Drops the cached ordering of `kind`'s category, if it has one.
    pub(crate) fn invalidate_kind(&mut self, kind: InterKind) {
        match kind {
            InterKind::Stem => self.stems = None,
            InterKind::Head => self.heads = None,
            InterKind::HeadChord => self.head_chords = None,
            InterKind::Rest => self.rests = None,
            InterKind::Barline => self.barlines = None,
            _ => {}
        }
    }

    /// Drops every cached ordering. Called at pass boundaries: a cached
    /// order is never trusted across them.
    pub(crate) fn invalidate_all(&mut self) {
        *self = Self::default();
    }
}

/// The symbol-interpretation assembly engine for one system.
///
/// Borrows the system's pre-seeded graph and the sheet-wide glyph index
/// exclusively for the duration of the assembly.
pub struct SymbolAssembler<'a> {
    system: &'a SystemInfo,
    config: AssemblyConfig,
    sig: &'a mut InterGraph,
    glyphs: &'a mut GlyphIndex,
    indices: PositionalIndices,
    dots: DotResolver,
    phase: Phase,
}

impl<'a> SymbolAssembler<'a> {
    pub fn new(
        system: &'a SystemInfo,
        sig: &'a mut InterGraph,
        glyphs: &'a mut GlyphIndex,
    ) -> Self {
        Self::with_config(system, sig, glyphs, AssemblyConfig::default())
    }

    pub fn with_config(
        system: &'a SystemInfo,
        sig: &'a mut InterGraph,
        glyphs: &'a mut GlyphIndex,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            system,
            config,
            sig,
            glyphs,
            indices: PositionalIndices::default(),
            dots: DotResolver::new(),
            phase: Phase::Collecting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sig(&self) -> &InterGraph {
        self.sig
    }

    pub fn glyph_index(&self) -> &GlyphIndex {
        self.glyphs
    }

    /// The dot resolver companion (pending state inspection).
    pub fn dots(&self) -> &DotResolver {
        &self.dots
    }

    /// Takes in one evaluated glyph and creates the proper interpretation
    /// instance(s), if any.
    ///
    /// Unrecognized shapes are silently ignored; a construction rule that
    /// finds no adequate target yields nothing. Only upstream contract
    /// breaches are surfaced as errors.
    pub fn intake(
        &mut self,
        eval: Evaluation,
        glyph: Glyph,
        staff: StaffId,
    ) -> Result<(), IntakeError> {
        if self.phase != Phase::Collecting {
            return Err(IntakeError::AlreadyFinalized);
        }
        if !(0.0..=1.0).contains(&eval.confidence) {
            return Err(IntakeError::ConfidenceOutOfRange(eval.confidence));
        }
        if glyph.bounds.is_degenerate() {
            return Err(IntakeError::DegenerateGlyph(glyph.id));
        }
        if self.system.staff(staff).is_none() {
            return Err(IntakeError::UnknownStaff(staff));
        }

        self.glyphs.register(glyph);
        let grade = calibrated_grade(eval.confidence);

        let Some(class) = eval.shape.class() else {
            trace!(glyph = %glyph.id, shape = ?eval.shape, "shape not handled here, ignored");
            return Ok(());
        };

        if class == ShapeClass::Dot {
            self.dots.instant_checks(
                glyph,
                grade,
                staff,
                self.system,
                &self.config,
                self.sig,
                &mut self.indices,
            );
            return Ok(());
        }

        if let Some(rule) = rule_for(class) {
            let mut cx = BuildCx {
                system: self.system,
                config: &self.config,
                sig: &mut *self.sig,
                indices: &mut self.indices,
                glyph,
                shape: eval.shape,
                grade,
                staff,
            };
            let created = rule.build(&mut cx);
            trace!(glyph = %glyph.id, ?class, created = created.len(), "dispatched");
        }
        Ok(())
    }

    /// Runs the deferred passes with the default time-column retriever.
    pub fn finalize(&mut self) -> Result<(), AlreadyFinalized> {
        self.finalize_with(&mut BasicColumn)
    }

    /// Runs the deferred passes in fixed order: fermata linking, dot late
    /// checks, time-column assembly.
    ///
    /// The ordering matters: column assembly must not see symbols that the
    /// earlier passes are about to delete.
    pub fn finalize_with(
        &mut self,
        retriever: &mut dyn TimeColumnRetriever,
    ) -> Result<(), AlreadyFinalized> {
        if self.phase != Phase::Collecting {
            return Err(AlreadyFinalized);
        }

        link_fermatas(self.system, &self.config, self.sig, &mut self.indices);
        self.indices.invalidate_all();
        self.phase = Phase::FermatasResolved;

        self.dots
            .late_checks(self.system, &self.config, self.sig, &mut self.indices);
        self.indices.invalidate_all();
        self.phase = Phase::DotsResolved;

        assemble_time_columns(self.system, self.sig, retriever);
        self.indices.invalidate_all();
        self.phase = Phase::TimesResolved;

        debug!(live = self.sig.live_count(), "system assembly finalized");
        Ok(())
    }
}
