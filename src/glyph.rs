//! Glyphs and the shared glyph identity index.
//!
//! A glyph is a connected-component region segmented upstream; this crate
//! only records its identity and bounding box. The `GlyphIndex` is the
//! sheet-wide identity registry: registration is idempotent, so the same
//! glyph arriving through several evaluations is indexed exactly once.
//!
//! # Invariants
//! - `GlyphId`s are assigned upstream and unique per sheet.
//! - Registering an already-registered id is a no-op.
//! - Glyph geometry is never mutated after registration.

use crate::geom::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a glyph.
///
/// Transparent `u64` wrapper; equality and ordering are on the inner value.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GlyphId(u64);

impl GlyphId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "glyph#{}", self.0)
    }
}

/// An immutable connected-component region of the scanned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: GlyphId,
    pub bounds: Rect,
}

impl Glyph {
    #[inline]
    pub const fn new(id: GlyphId, bounds: Rect) -> Self {
        Self { id, bounds }
    }

    #[inline]
    pub const fn center(&self) -> Point {
        self.bounds.center()
    }
}

/// Sheet-wide glyph identity index.
///
/// Iteration order is by `GlyphId` (deterministic).
#[derive(Debug, Clone, Default)]
pub struct GlyphIndex {
    entries: BTreeMap<GlyphId, Glyph>,
}

impl GlyphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a glyph if absent. Returns `true` when the glyph was newly
    /// inserted, `false` when it was already present (idempotent case).
    pub fn register(&mut self, glyph: Glyph) -> bool {
        use std::collections::btree_map::Entry;
        match self.entries.entry(glyph.id) {
            Entry::Vacant(slot) => {
                slot.insert(glyph);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, id: GlyphId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: GlyphId) -> Option<&Glyph> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let mut index = GlyphIndex::new();
        let g = Glyph::new(GlyphId::new(7), Rect::new(0, 0, 4, 4));
        assert!(index.register(g));
        assert!(!index.register(g));
        assert_eq!(index.len(), 1);
        assert!(index.contains(GlyphId::new(7)));
    }

    #[test]
    fn distinct_ids_coexist() {
        let mut index = GlyphIndex::new();
        index.register(Glyph::new(GlyphId::new(1), Rect::new(0, 0, 2, 2)));
        index.register(Glyph::new(GlyphId::new(2), Rect::new(5, 5, 2, 2)));
        assert_eq!(index.len(), 2);
    }
}
