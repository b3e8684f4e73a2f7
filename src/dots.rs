//! Two-phase resolution of ambiguous dot marks.
//!
//! The same dot glyph can be a rhythmic augmentation dot after a head or
//! rest, a staccato articulation dot beside a chord, or a structural dot of
//! a barline repeat sign. The role depends on structural context that is
//! only complete once the whole system has been dispatched, so resolution
//! is split in two phases:
//!
//! - immediate (`instant_checks`): record the glyph as pending, together
//!   with every role plausible at that point. Pure bookkeeping, no graph
//!   mutation.
//! - late (`late_checks`): re-evaluate each pending dot against the
//!   complete context, rank roles by calibrated grade times geometric fit,
//!   materialize exactly one winner (or none) and discard the rest.
//!
//! A dot whose only plausible target vanished yields nothing; this is a
//! normal outcome.

use crate::config::AssemblyConfig;
use crate::context::SystemInfo;
use crate::factory::PositionalIndices;
use crate::geom::{dx, dy};
use crate::glyph::Glyph;
use crate::inter::{Inter, InterId, InterKind, StaffId};
use crate::rules::abscissa_window;
use crate::shape::Shape;
use crate::sig::{InterGraph, RelationKind};
use tracing::debug;

/// A role a dot may play, with its supporting target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DotRole {
    /// Augmentation of a head or rest (target sits left of the dot).
    Augmentation,
    /// Staccato articulation of a chord (dot above or below it).
    Staccato,
    /// Structural dot of a barline repeat sign.
    Repeat,
}

impl DotRole {
    /// Tie-break rank when scores are equal (lower wins).
    fn rank(&self) -> u8 {
        match self {
            DotRole::Augmentation => 0,
            DotRole::Staccato => 1,
            DotRole::Repeat => 2,
        }
    }

    fn kind(&self) -> InterKind {
        match self {
            DotRole::Augmentation => InterKind::AugmentationDot,
            DotRole::Staccato => InterKind::Staccato,
            DotRole::Repeat => InterKind::RepeatDot,
        }
    }

    fn relation(&self) -> RelationKind {
        match self {
            DotRole::Augmentation => RelationKind::AugmentationNote,
            DotRole::Staccato => RelationKind::StaccatoChord,
            DotRole::Repeat => RelationKind::RepeatDotBar,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    role: DotRole,
    target: InterId,
    score: f64,
}

/// A dot glyph awaiting the late pass.
#[derive(Debug, Clone)]
struct PendingDot {
    glyph: Glyph,
    grade: f64,
    staff: StaffId,
    /// Roles plausible at intake time (bookkeeping; the late pass
    /// re-evaluates from scratch).
    instant_roles: usize,
}

/// Companion resolver holding the pending-candidates state for one system.
#[derive(Debug, Default)]
pub struct DotResolver {
    pending: Vec<PendingDot>,
}

impl DotResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of dots still awaiting the late pass.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Immediate phase: record the dot and whatever roles are plausible
    /// against the context known so far.
    pub(crate) fn instant_checks(
        &mut self,
        glyph: Glyph,
        grade: f64,
        staff: StaffId,
        system: &SystemInfo,
        config: &AssemblyConfig,
        sig: &InterGraph,
        indices: &mut PositionalIndices,
    ) {
        let roles = enumerate_roles(&glyph, grade, staff, system, config, sig, indices);
        debug!(glyph = %glyph.id, roles = roles.len(), "dot recorded as pending");
        self.pending.push(PendingDot {
            glyph,
            grade,
            staff,
            instant_roles: roles.len(),
        });
    }

    /// Late phase: resolve every pending dot against the complete context.
    ///
    /// Exactly one interpretation is materialized per dot that still has a
    /// plausible role; all other candidate roles are discarded.
    pub(crate) fn late_checks(
        &mut self,
        system: &SystemInfo,
        config: &AssemblyConfig,
        sig: &mut InterGraph,
        indices: &mut PositionalIndices,
    ) {
        let pending = std::mem::take(&mut self.pending);
        for dot in pending {
            let candidates =
                enumerate_roles(&dot.glyph, dot.grade, dot.staff, system, config, sig, indices);
            // Target ids encode arrival order, so the last tie-break
            // compares the targets' geometry instead.
            let winner = candidates.into_iter().min_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then(a.role.rank().cmp(&b.role.rank()))
                    .then_with(|| {
                        let ka = sig.get(a.target).map(|i| i.stable_key());
                        let kb = sig.get(b.target).map(|i| i.stable_key());
                        ka.cmp(&kb)
                    })
            });
            let Some(winner) = winner else {
                debug!(
                    glyph = %dot.glyph.id,
                    instant_roles = dot.instant_roles,
                    "dot with no surviving role, dropped"
                );
                continue;
            };
            let mut inter = Inter::new(
                winner.role.kind(),
                Shape::Dot,
                dot.grade,
                dot.glyph.bounds,
            )
            .with_glyph(dot.glyph.id);
            inter.staff = system.closest_staff(dot.glyph.center().y);
            let id = sig.add_vertex(inter);
            indices.invalidate_kind(winner.role.kind());
            let _ = sig.add_relation(winner.role.relation(), id, winner.target);
        }
    }
}

/// All roles geometrically plausible for the dot against the current graph.
fn enumerate_roles(
    glyph: &Glyph,
    grade: f64,
    staff: StaffId,
    system: &SystemInfo,
    config: &AssemblyConfig,
    sig: &InterGraph,
    indices: &mut PositionalIndices,
) -> Vec<Candidate> {
    let center = glyph.center();
    let interline = system.scale.interline.max(1) as f64;
    let max_dx = system.scale.pixels(config.dot_note_dx);
    let max_dy = system.scale.pixels(config.dot_dy);
    let mut out = Vec::new();

    let fit = |hdist: i32, vdist: i32| 1.0 / (1.0 + (hdist + vdist) as f64 / interline);

    // Augmentation: head or rest ending left of the dot.
    let mut note_targets = indices.heads(sig).to_vec();
    note_targets.extend_from_slice(indices.rests(sig));
    for id in note_targets {
        let Some(target) = sig.get(id) else { continue };
        let tc = target.center();
        let right_of = center.x - tc.x;
        let vdist = dy(center, tc);
        if right_of > 0 && right_of <= max_dx && vdist <= max_dy {
            out.push(Candidate {
                role: DotRole::Augmentation,
                target: id,
                score: grade * fit(right_of, vdist),
            });
        }
    }

    // Staccato: chord with the dot just above or below it.
    let chords = indices.head_chords(sig).to_vec();
    for &id in abscissa_window(sig, &chords, center.x, max_dx) {
        let Some(chord) = sig.get(id) else { continue };
        let hdist = dx(center, chord.center());
        let gap = if center.y < chord.bounds.y {
            chord.bounds.y - center.y
        } else if center.y > chord.bounds.bottom() {
            center.y - chord.bounds.bottom()
        } else {
            continue; // dot inside the chord box is not an articulation
        };
        if gap <= max_dy {
            out.push(Candidate {
                role: DotRole::Staccato,
                target: id,
                score: grade * fit(hdist, gap),
            });
        }
    }

    // Repeat dot: barline beside a dot sitting within the staff lines.
    let within_staff = system
        .staff(staff)
        .is_some_and(|s| s.contains_y(center.y, 0));
    if within_staff {
        let bars = indices.barlines(sig).to_vec();
        for &id in abscissa_window(sig, &bars, center.x, max_dx) {
            let Some(bar) = sig.get(id) else { continue };
            let hdist = dx(center, bar.center());
            if hdist > 0 {
                out.push(Candidate {
                    role: DotRole::Repeat,
                    target: id,
                    score: grade * fit(hdist, 0),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MeasureStack, Scale, Staff};
    use crate::geom::Rect;

    fn system() -> SystemInfo {
        SystemInfo::new(
            Scale::new(16),
            vec![Staff::new(100, 164, 80)],
            vec![MeasureStack::new(0, 0, 1000)],
        )
    }

    fn dot_at(x: i32, y: i32) -> Glyph {
        Glyph::new(crate::glyph::GlyphId::new(99), Rect::new(x, y, 4, 4))
    }

    #[test]
    fn augmentation_wins_next_to_a_head() {
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        let head = sig.add_vertex(Inter::new(
            InterKind::Head,
            Shape::NoteheadBlack,
            0.6,
            Rect::new(100, 118, 10, 10),
        ));
        let mut indices = PositionalIndices::default();
        let mut resolver = DotResolver::new();
        resolver.instant_checks(
            dot_at(118, 121),
            0.5,
            StaffId::new(0),
            &system,
            &config,
            &sig,
            &mut indices,
        );
        resolver.late_checks(&system, &config, &mut sig, &mut indices);

        let dots = sig.inters_of_kind(InterKind::AugmentationDot);
        assert_eq!(dots.len(), 1);
        assert!(sig.has_relation(dots[0], RelationKind::AugmentationNote));
        assert!(sig.has_relation(head, RelationKind::AugmentationNote));
        assert_eq!(resolver.pending_count(), 0);
    }

    #[test]
    fn exactly_one_role_per_dot() {
        // The dot sits right of a head AND within the staff next to a
        // barline; only one interpretation may survive.
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        sig.add_vertex(Inter::new(
            InterKind::Head,
            Shape::NoteheadBlack,
            0.6,
            Rect::new(100, 118, 10, 10),
        ));
        sig.add_vertex(Inter::new(
            InterKind::Barline,
            Shape::Barline,
            0.9,
            Rect::new(130, 100, 3, 64),
        ));
        let mut indices = PositionalIndices::default();
        let mut resolver = DotResolver::new();
        resolver.instant_checks(
            dot_at(118, 121),
            0.5,
            StaffId::new(0),
            &system,
            &config,
            &sig,
            &mut indices,
        );
        resolver.late_checks(&system, &config, &mut sig, &mut indices);

        let derived: Vec<_> = sig
            .iter()
            .filter(|(_, inter)| {
                matches!(
                    inter.kind,
                    InterKind::AugmentationDot | InterKind::Staccato | InterKind::RepeatDot
                )
            })
            .collect();
        assert_eq!(derived.len(), 1);
    }

    #[test]
    fn tied_augmentation_targets_resolve_by_geometry() {
        // Two rests score identically for the same dot; the upper one must
        // win regardless of the order the rests entered the graph.
        let system = system();
        let config = AssemblyConfig::default();
        let rest_at = |y| {
            Inter::new(
                InterKind::Rest,
                Shape::QuarterRest,
                0.6,
                Rect::new(100, y, 10, 10),
            )
        };
        for flip in [false, true] {
            let mut sig = InterGraph::new();
            let (upper, lower) = if flip {
                let l = sig.add_vertex(rest_at(130));
                let u = sig.add_vertex(rest_at(110));
                (u, l)
            } else {
                let u = sig.add_vertex(rest_at(110));
                let l = sig.add_vertex(rest_at(130));
                (u, l)
            };
            let mut indices = PositionalIndices::default();
            let mut resolver = DotResolver::new();
            resolver.instant_checks(
                dot_at(119, 123),
                0.5,
                StaffId::new(0),
                &system,
                &config,
                &sig,
                &mut indices,
            );
            resolver.late_checks(&system, &config, &mut sig, &mut indices);

            assert_eq!(sig.inters_of_kind(InterKind::AugmentationDot).len(), 1);
            assert!(sig.has_relation(upper, RelationKind::AugmentationNote));
            assert!(!sig.has_relation(lower, RelationKind::AugmentationNote));
        }
    }

    #[test]
    fn vanished_target_yields_nothing() {
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        let head = sig.add_vertex(Inter::new(
            InterKind::Head,
            Shape::NoteheadBlack,
            0.6,
            Rect::new(100, 118, 10, 10),
        ));
        let mut indices = PositionalIndices::default();
        let mut resolver = DotResolver::new();
        resolver.instant_checks(
            dot_at(118, 121),
            0.5,
            StaffId::new(0),
            &system,
            &config,
            &sig,
            &mut indices,
        );
        // The sole target disappears before the late pass.
        sig.remove_vertex(head);
        indices.invalidate_all();
        resolver.late_checks(&system, &config, &mut sig, &mut indices);

        assert!(sig.inters_of_kind(InterKind::AugmentationDot).is_empty());
        assert_eq!(sig.live_count(), 0);
    }
}
