//! Construction rules, one per shape class.
//!
//! Each rule is a stateless unit struct behind the `ConstructionRule` trait;
//! the dispatcher routes through the static `RULES` table instead of a
//! growing branch chain, so adding a category is a local, additive change.
//!
//! Rules that search an ordered list (stems, heads, head-chords) first
//! restrict candidates to an abscissa window, then prefer the smallest
//! horizontal distance, then the smallest vertical distance. A rule that
//! finds no adequate neighbor yields nothing rather than a low-confidence
//! guess.

use crate::config::AssemblyConfig;
use crate::context::SystemInfo;
use crate::factory::PositionalIndices;
use crate::geom::{dx, dy, Point};
use crate::glyph::Glyph;
use crate::inter::{Inter, InterId, InterKind, StaffId};
use crate::shape::{Shape, ShapeClass};
use crate::sig::{InterGraph, RelationKind};
use tracing::debug;

/// Everything a rule may read or mutate while building.
pub(crate) struct BuildCx<'a> {
    pub system: &'a SystemInfo,
    pub config: &'a AssemblyConfig,
    pub sig: &'a mut InterGraph,
    pub indices: &'a mut PositionalIndices,
    pub glyph: Glyph,
    pub shape: Shape,
    pub grade: f64,
    pub staff: StaffId,
}

impl BuildCx<'_> {
    /// Adds a vertex and invalidates the positional index of its category,
    /// if it has one.
    pub(crate) fn add(&mut self, inter: Inter) -> InterId {
        let kind = inter.kind;
        let id = self.sig.add_vertex(inter);
        self.indices.invalidate_kind(kind);
        id
    }

    fn px(&self, fraction: f64) -> i32 {
        self.system.scale.pixels(fraction)
    }
}

/// A shape-class construction rule.
pub(crate) trait ConstructionRule: Sync {
    /// Builds zero or more interpretations for the current evaluation.
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId>;
}

/// Sub-slice of `ids` (sorted by center abscissa) whose centers lie within
/// `max_dx` of `x`.
pub(crate) fn abscissa_window<'a>(
    sig: &InterGraph,
    ids: &'a [InterId],
    x: i32,
    max_dx: i32,
) -> &'a [InterId] {
    let lo = ids.partition_point(|&id| sig.get(id).is_some_and(|i| i.abscissa() < x - max_dx));
    let hi = ids.partition_point(|&id| sig.get(id).map_or(true, |i| i.abscissa() <= x + max_dx));
    if lo <= hi {
        &ids[lo..hi]
    } else {
        &ids[lo..lo]
    }
}

/// Closest candidate to `point`: smallest |dx|, then smallest |dy|, then
/// lowest order-independent key. Ids are never compared, so the result
/// does not depend on vertex insertion order.
pub(crate) fn closest(
    sig: &InterGraph,
    candidates: impl IntoIterator<Item = InterId>,
    point: Point,
) -> Option<InterId> {
    candidates
        .into_iter()
        .filter_map(|id| {
            let inter = sig.get(id)?;
            let center = inter.center();
            Some((dx(center, point), dy(center, point), inter.stable_key(), id))
        })
        .min_by_key(|&(hdist, vdist, key, _)| (hdist, vdist, key))
        .map(|(_, _, _, id)| id)
}

struct ClefRule;

impl ConstructionRule for ClefRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let inter = Inter::new(InterKind::Clef, cx.shape, cx.grade, cx.glyph.bounds)
            .with_staff(cx.staff)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct RestRule;

impl ConstructionRule for RestRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let center = cx.glyph.center();
        let max_dx = cx.px(cx.config.rest_chord_dx);
        let chords = cx.indices.head_chords(cx.sig).to_vec();
        if abscissa_window(cx.sig, &chords, center.x, max_dx).is_empty() {
            debug!(glyph = %cx.glyph.id, "rest without chord context, skipped");
            return Vec::new();
        }
        let staff = cx.system.closest_staff(center.y);
        let mut inter =
            Inter::new(InterKind::Rest, cx.shape, cx.grade, cx.glyph.bounds).with_glyph(cx.glyph.id);
        inter.staff = staff;
        vec![cx.add(inter)]
    }
}

struct AlterRule;

impl ConstructionRule for AlterRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        // Staff binding is best-effort for accidentals.
        let inter = Inter::new(InterKind::Alter, cx.shape, cx.grade, cx.glyph.bounds)
            .with_staff(cx.staff)
            .with_glyph(cx.glyph.id);
        let id = cx.add(inter);

        // Note-relation detection: the altered head sits to the right of the
        // accidental. Failure never fails construction.
        let center = cx.glyph.center();
        let max_dx = cx.px(cx.config.alter_head_dx);
        let max_dy = cx.px(cx.config.alter_head_dy);
        let heads = cx.indices.heads(cx.sig).to_vec();
        let nearby = abscissa_window(cx.sig, &heads, center.x, max_dx);
        let candidates = nearby.iter().copied().filter(|&head| {
            cx.sig.get(head).is_some_and(|h| {
                let hc = h.center();
                hc.x > center.x && (hc.y - center.y).abs() <= max_dy
            })
        });
        if let Some(head) = closest(cx.sig, candidates, center) {
            let _ = cx.sig.add_relation(RelationKind::AlterNote, id, head);
        } else {
            debug!(glyph = %cx.glyph.id, "accidental with no altered head");
        }
        vec![id]
    }
}

struct FlagRule;

impl ConstructionRule for FlagRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let center = cx.glyph.center();
        let max_dx = cx.px(cx.config.flag_stem_dx);
        // Flags attach at their left edge.
        let attach_x = cx.glyph.bounds.x;
        let stems = cx.indices.stems(cx.sig).to_vec();
        let nearby = abscissa_window(cx.sig, &stems, attach_x, max_dx);
        // An up flag hangs from the lower end of a down stem, a down flag
        // from the upper end of an up stem.
        let up = cx.shape.is_up_flag();
        let candidates = nearby.iter().copied().filter(|&stem| {
            cx.sig.get(stem).is_some_and(|s| {
                s.bounds.overlaps_vertically(&cx.glyph.bounds)
                    && if up {
                        center.y >= s.center().y
                    } else {
                        center.y <= s.center().y
                    }
            })
        });
        let Some(stem) = closest(cx.sig, candidates, Point::new(attach_x, center.y)) else {
            debug!(glyph = %cx.glyph.id, "flag with no nearby stem, skipped");
            return Vec::new();
        };
        let mut inter =
            Inter::new(InterKind::Flag, cx.shape, cx.grade, cx.glyph.bounds).with_glyph(cx.glyph.id);
        inter.staff = cx.system.closest_staff(center.y);
        let id = cx.add(inter);
        let _ = cx.sig.add_relation(RelationKind::FlagStem, id, stem);
        vec![id]
    }
}

struct TimeNumberRule;

impl ConstructionRule for TimeNumberRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let Some(value) = cx.shape.time_number() else {
            return Vec::new();
        };
        let margin = cx.px(cx.config.time_staff_margin);
        let on_staff = cx
            .system
            .staff(cx.staff)
            .is_some_and(|staff| staff.contains_y(cx.glyph.center().y, margin));
        if !on_staff {
            debug!(glyph = %cx.glyph.id, "time number off its staff, skipped");
            return Vec::new();
        }
        let inter = Inter::new(
            InterKind::TimeNumber(value),
            cx.shape,
            cx.grade,
            cx.glyph.bounds,
        )
        .with_staff(cx.staff)
        .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct TimeWholeRule;

impl TimeWholeRule {
    fn number_shape(value: u8) -> Option<Shape> {
        match value {
            1 => Some(Shape::TimeOne),
            2 => Some(Shape::TimeTwo),
            3 => Some(Shape::TimeThree),
            4 => Some(Shape::TimeFour),
            5 => Some(Shape::TimeFive),
            6 => Some(Shape::TimeSix),
            7 => Some(Shape::TimeSeven),
            8 => Some(Shape::TimeEight),
            9 => Some(Shape::TimeNine),
            12 => Some(Shape::TimeTwelve),
            16 => Some(Shape::TimeSixteen),
            _ => None,
        }
    }
}

impl ConstructionRule for TimeWholeRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        // A compound whole symbol (like 6/8) splits into its numerator and
        // denominator number interpretations; C and cut-C stay whole. This
        // is the one evaluation that may yield two vertices.
        if let Some((num, den)) = cx.shape.time_pair() {
            let (upper_shape, lower_shape) = match (
                Self::number_shape(num),
                Self::number_shape(den),
            ) {
                (Some(u), Some(l)) => (u, l),
                _ => {
                    let inter =
                        Inter::new(InterKind::TimeWhole, cx.shape, cx.grade, cx.glyph.bounds)
                            .with_staff(cx.staff)
                            .with_glyph(cx.glyph.id);
                    return vec![cx.add(inter)];
                }
            };
            let b = cx.glyph.bounds;
            let mut upper = b;
            upper.height = b.height / 2;
            let mut lower = b;
            lower.y = b.y + b.height / 2;
            lower.height = b.height - b.height / 2;
            let top = Inter::new(InterKind::TimeNumber(num), upper_shape, cx.grade, upper)
                .with_staff(cx.staff)
                .with_glyph(cx.glyph.id);
            let bottom = Inter::new(InterKind::TimeNumber(den), lower_shape, cx.grade, lower)
                .with_staff(cx.staff)
                .with_glyph(cx.glyph.id);
            return vec![cx.add(top), cx.add(bottom)];
        }
        let inter = Inter::new(InterKind::TimeWhole, cx.shape, cx.grade, cx.glyph.bounds)
            .with_staff(cx.staff)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct DynamicRule;

impl ConstructionRule for DynamicRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let inter = Inter::new(InterKind::Dynamic, cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct TupletRule;

impl ConstructionRule for TupletRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let center = cx.glyph.center();
        let max_dx = cx.px(cx.config.rest_chord_dx);
        let chords = cx.indices.head_chords(cx.sig).to_vec();
        if abscissa_window(cx.sig, &chords, center.x, max_dx).is_empty() {
            debug!(glyph = %cx.glyph.id, "tuplet without embraced chords, skipped");
            return Vec::new();
        }
        let mut inter = Inter::new(InterKind::Tuplet, cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        inter.staff = cx.system.closest_staff(center.y);
        vec![cx.add(inter)]
    }
}

struct FermataRule;

impl ConstructionRule for FermataRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let Some(kind) = cx.shape.fermata_kind() else {
            return Vec::new();
        };
        let center = cx.glyph.center();
        if cx.system.stack_at(center).is_none() {
            debug!(glyph = %cx.glyph.id, "fermata outside any measure stack, skipped");
            return Vec::new();
        }
        let mut inter = Inter::new(InterKind::Fermata(kind), cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        inter.staff = cx.system.closest_staff(center.y);
        let id = cx.add(inter);

        // Immediate barline link; the chord link is attempted in the
        // deferred fermata pass.
        let max_dx = cx.px(cx.config.fermata_bar_dx);
        let bars = cx.indices.barlines(cx.sig).to_vec();
        let nearby = abscissa_window(cx.sig, &bars, center.x, max_dx);
        if let Some(bar) = closest(cx.sig, nearby.iter().copied(), center) {
            let _ = cx.sig.add_relation(RelationKind::FermataBar, id, bar);
        }
        vec![id]
    }
}

struct PedalRule;

impl ConstructionRule for PedalRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        let inter = Inter::new(InterKind::Pedal, cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct FingeringRule;

impl FingeringRule {
    fn digit(shape: Shape) -> u8 {
        match shape {
            Shape::DigitZero => 0,
            Shape::DigitOne => 1,
            Shape::DigitTwo => 2,
            Shape::DigitThree => 3,
            Shape::DigitFour => 4,
            Shape::DigitFive => 5,
            _ => 0,
        }
    }
}

impl ConstructionRule for FingeringRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        if !cx.config.support_fingerings {
            return Vec::new();
        }
        let inter = Inter::new(
            InterKind::Fingering(Self::digit(cx.shape)),
            cx.shape,
            cx.grade,
            cx.glyph.bounds,
        )
        .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct FretRule;

impl ConstructionRule for FretRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        if !cx.config.support_frets {
            return Vec::new();
        }
        let inter = Inter::new(InterKind::Fret, cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

struct PluckingRule;

impl ConstructionRule for PluckingRule {
    fn build(&self, cx: &mut BuildCx<'_>) -> Vec<InterId> {
        if !cx.config.support_pluckings {
            return Vec::new();
        }
        let inter = Inter::new(InterKind::Plucking, cx.shape, cx.grade, cx.glyph.bounds)
            .with_glyph(cx.glyph.id);
        vec![cx.add(inter)]
    }
}

/// Static routing table. The dot class is absent: dots are delegated
/// entirely to the dot resolver.
static RULES: [(ShapeClass, &(dyn ConstructionRule + Sync)); 13] = [
    (ShapeClass::Clef, &ClefRule),
    (ShapeClass::Rest, &RestRule),
    (ShapeClass::Alteration, &AlterRule),
    (ShapeClass::Flag, &FlagRule),
    (ShapeClass::PartialTime, &TimeNumberRule),
    (ShapeClass::WholeTime, &TimeWholeRule),
    (ShapeClass::Dynamic, &DynamicRule),
    (ShapeClass::Tuplet, &TupletRule),
    (ShapeClass::Fermata, &FermataRule),
    (ShapeClass::Pedal, &PedalRule),
    (ShapeClass::Fingering, &FingeringRule),
    (ShapeClass::Fret, &FretRule),
    (ShapeClass::Plucking, &PluckingRule),
];

/// Rule registered for a shape class, if any.
pub(crate) fn rule_for(class: ShapeClass) -> Option<&'static (dyn ConstructionRule + Sync)> {
    RULES
        .iter()
        .find(|(tag, _)| *tag == class)
        .map(|(_, rule)| *rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::inter::Inter;

    #[test]
    fn every_non_dot_class_has_a_rule() {
        for class in [
            ShapeClass::Clef,
            ShapeClass::Rest,
            ShapeClass::Alteration,
            ShapeClass::Flag,
            ShapeClass::PartialTime,
            ShapeClass::WholeTime,
            ShapeClass::Dynamic,
            ShapeClass::Tuplet,
            ShapeClass::Fermata,
            ShapeClass::Pedal,
            ShapeClass::Fingering,
            ShapeClass::Fret,
            ShapeClass::Plucking,
        ] {
            assert!(rule_for(class).is_some(), "no rule for {:?}", class);
        }
        assert!(rule_for(ShapeClass::Dot).is_none());
    }

    #[test]
    fn abscissa_window_restricts_candidates() {
        let mut sig = InterGraph::new();
        let ids: Vec<InterId> = [10, 50, 90, 130]
            .iter()
            .map(|&x| {
                sig.add_vertex(Inter::new(
                    InterKind::Head,
                    Shape::NoteheadBlack,
                    0.5,
                    Rect::new(x, 40, 8, 8),
                ))
            })
            .collect();
        let window = abscissa_window(&sig, &ids, 54, 40);
        assert_eq!(window, &ids[0..3]);
        let empty = abscissa_window(&sig, &ids, 300, 20);
        assert!(empty.is_empty());
    }

    #[test]
    fn closest_prefers_dx_then_dy() {
        let mut sig = InterGraph::new();
        let near_x_far_y = sig.add_vertex(Inter::new(
            InterKind::Head,
            Shape::NoteheadBlack,
            0.5,
            Rect::new(100, 200, 8, 8),
        ));
        let far_x_near_y = sig.add_vertex(Inter::new(
            InterKind::Head,
            Shape::NoteheadBlack,
            0.5,
            Rect::new(140, 50, 8, 8),
        ));
        let best = closest(&sig, [near_x_far_y, far_x_near_y], Point::new(100, 50));
        assert_eq!(best, Some(near_x_far_y));
    }

    #[test]
    fn closest_breaks_exact_ties_by_geometry_not_insertion() {
        // Two candidates equidistant from the point; the upper one must win
        // whichever was inserted first.
        let point = Point::new(100, 100);
        let head = |bounds| Inter::new(InterKind::Head, Shape::NoteheadBlack, 0.5, bounds);
        let upper = Rect::new(88, 80, 8, 8); // center (92, 84)
        let lower = Rect::new(88, 112, 8, 8); // center (92, 116)

        let mut sig = InterGraph::new();
        let u = sig.add_vertex(head(upper));
        let l = sig.add_vertex(head(lower));
        assert_eq!(closest(&sig, [u, l], point), Some(u));

        let mut sig = InterGraph::new();
        let l = sig.add_vertex(head(lower));
        let u = sig.add_vertex(head(upper));
        assert_eq!(closest(&sig, [l, u], point), Some(u));
    }
}
