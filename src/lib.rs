//! Neume: the symbol-interpretation assembly engine of an OMR pipeline.
//!
//! Given, for one horizontal system of a scanned page, a stream of
//! (glyph, shape, confidence) classifications plus previously built
//! structural context (staves, measure stacks, and a graph pre-seeded with
//! stems, heads, head-chords, rests and barlines), the engine decides which
//! typed interpretation vertices to create, wires them into the system's
//! relation graph, and resolves ambiguities that cannot be decided
//! glyph-by-glyph: competing dot roles, scattered time-signature digits,
//! fermata attachment.
//!
//! Upstream image analysis, the classifier itself, rendering, persistence
//! and page layout are external collaborators; this crate is pure
//! in-memory computation over already-available geometry.
//!
//! # Example
//!
//! ```
//! use neume::prelude::*;
//!
//! let system = SystemInfo::new(
//!     Scale::new(16),
//!     vec![Staff::new(100, 164, 80)],
//!     vec![MeasureStack::new(0, 60, 600)],
//! );
//! let mut sig = InterGraph::new();
//! let mut glyphs = GlyphIndex::new();
//! let mut assembler = SymbolAssembler::new(&system, &mut sig, &mut glyphs);
//!
//! let clef = Glyph::new(GlyphId::new(1), Rect::new(90, 96, 14, 70));
//! assembler
//!     .intake(Evaluation::new(Shape::GClef, 0.95), clef, StaffId::new(0))
//!     .unwrap();
//! assembler.finalize().unwrap();
//! assert_eq!(sig.live_count(), 1);
//! ```

pub mod config;
pub mod context;
pub mod dots;
pub mod factory;
pub mod geom;
pub mod glyph;
pub mod inter;
pub mod linker;
pub mod rules;
pub mod shape;
pub mod sig;

/// Convenience re-exports of the assembly surface.
pub mod prelude {
    pub use crate::config::AssemblyConfig;
    pub use crate::context::{MeasureStack, Scale, Staff, SystemInfo};
    pub use crate::factory::{Evaluation, IntakeError, Phase, SymbolAssembler};
    pub use crate::geom::{Point, Rect};
    pub use crate::glyph::{Glyph, GlyphId, GlyphIndex};
    pub use crate::inter::{Inter, InterId, InterKind, StaffId};
    pub use crate::linker::{BasicColumn, TimeColumnRetriever};
    pub use crate::shape::{Shape, ShapeClass};
    pub use crate::sig::{InterGraph, Relation, RelationKind};
}

pub use config::AssemblyConfig;
pub use context::{MeasureStack, Scale, Staff, SystemInfo};
pub use factory::{Evaluation, IntakeError, Phase, SymbolAssembler};
pub use glyph::{Glyph, GlyphId, GlyphIndex};
pub use inter::{Inter, InterId, InterKind, StaffId, INTRINSIC_RATIO};
pub use linker::{BasicColumn, TimeColumnRetriever};
pub use shape::{Shape, ShapeClass};
pub use sig::{InterGraph, Relation, RelationKind};
