//! The symbol-interpretation graph (SIG).
//!
//! One `InterGraph` per system: a slot arena of interpretation vertices plus
//! typed relation edges stored as id pairs. Deletion tombstones the slot
//! instead of compacting, so iteration during a deferred pass never observes
//! a half-removed vertex and ids stay stable for the graph's lifetime.
//!
//! # Invariants
//! - `InterId`s are never reused; a deleted id simply resolves to nothing.
//! - Removing a vertex removes every relation incident to it (no orphaned
//!   edges).
//! - Query results are ordered by abscissa, ties broken by geometry and
//!   source glyph, so the order never depends on insertion order.

use crate::inter::{Inter, InterId, InterKind};
use crate::shape::ShapeClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed relation between two interpretations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Fermata supported by a head or rest chord.
    FermataChord,
    /// Fermata attached to a barline.
    FermataBar,
    /// Accidental altering a notehead.
    AlterNote,
    /// Flag hanging on a stem.
    FlagStem,
    /// Augmentation dot lengthening a head or rest.
    AugmentationNote,
    /// Staccato dot articulating a chord.
    StaccatoChord,
    /// Repeat dot belonging to a barline.
    RepeatDotBar,
}

/// A directed typed edge of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub source: InterId,
    pub target: InterId,
}

/// Error raised by graph mutations referencing missing vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigError {
    /// The referenced vertex does not exist or has been deleted.
    MissingVertex(InterId),
}

impl fmt::Display for SigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigError::MissingVertex(id) => write!(f, "missing vertex {}", id),
        }
    }
}

impl std::error::Error for SigError {}

/// The per-system interpretation graph.
#[derive(Debug, Clone, Default)]
pub struct InterGraph {
    /// Slot arena; `None` marks a tombstone.
    slots: Vec<Option<Inter>>,
    /// Relation storage; `None` marks a removed edge.
    relations: Vec<Option<Relation>>,
    live_count: usize,
}

impl InterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex and returns its stable id.
    pub fn add_vertex(&mut self, inter: Inter) -> InterId {
        let id = InterId::new(self.slots.len() as u32);
        self.slots.push(Some(inter));
        self.live_count += 1;
        id
    }

    /// Tombstones a vertex and removes all relations incident to it.
    ///
    /// Returns `true` if the vertex was live.
    pub fn remove_vertex(&mut self, id: InterId) -> bool {
        let idx = id.as_u32() as usize;
        let Some(slot) = self.slots.get_mut(idx) else {
            return false;
        };
        if slot.is_none() {
            return false;
        }
        *slot = None;
        self.live_count -= 1;
        for rel in self.relations.iter_mut() {
            if rel.is_some_and(|r| r.source == id || r.target == id) {
                *rel = None;
            }
        }
        true
    }

    pub fn get(&self, id: InterId) -> Option<&Inter> {
        self.slots.get(id.as_u32() as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: InterId) -> Option<&mut Inter> {
        self.slots
            .get_mut(id.as_u32() as usize)
            .and_then(Option::as_mut)
    }

    pub fn contains(&self, id: InterId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live vertices.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Iterates over live vertices in id order.
    pub fn iter(&self) -> impl Iterator<Item = (InterId, &Inter)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref().map(|inter| (InterId::new(idx as u32), inter))
        })
    }

    /// Live vertices satisfying `pred`, ordered by abscissa with ties
    /// broken by the insertion-order-independent key.
    pub fn inters_where(&self, pred: impl Fn(&Inter) -> bool) -> Vec<InterId> {
        let mut ids: Vec<InterId> = self
            .iter()
            .filter(|(_, inter)| pred(inter))
            .map(|(id, _)| id)
            .collect();
        ids.sort_by_key(|&id| (self.get(id).map(|i| i.stable_key()), id));
        ids
    }

    /// Live vertices of the given kind, in `inters_where` order.
    pub fn inters_of_kind(&self, kind: InterKind) -> Vec<InterId> {
        self.inters_where(|inter| inter.kind == kind)
    }

    /// Live vertices whose shape belongs to the given class, in
    /// `inters_where` order.
    pub fn inters_of_class(&self, class: ShapeClass) -> Vec<InterId> {
        self.inters_where(|inter| inter.shape.class() == Some(class))
    }

    /// Adds a typed relation between two live vertices.
    pub fn add_relation(
        &mut self,
        kind: RelationKind,
        source: InterId,
        target: InterId,
    ) -> Result<(), SigError> {
        if !self.contains(source) {
            return Err(SigError::MissingVertex(source));
        }
        if !self.contains(target) {
            return Err(SigError::MissingVertex(target));
        }
        self.relations.push(Some(Relation {
            kind,
            source,
            target,
        }));
        Ok(())
    }

    /// Whether `id` is an endpoint of any live relation of `kind`.
    pub fn has_relation(&self, id: InterId, kind: RelationKind) -> bool {
        self.relations.iter().flatten().any(|r| {
            r.kind == kind && (r.source == id || r.target == id)
        })
    }

    /// Live relations with `id` as an endpoint.
    pub fn relations_of(&self, id: InterId) -> Vec<Relation> {
        self.relations
            .iter()
            .flatten()
            .filter(|r| r.source == id || r.target == id)
            .copied()
            .collect()
    }

    /// All live relations, in insertion order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter().flatten()
    }
}
