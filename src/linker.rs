//! Deferred relation linking: fermatas and time-signature columns.
//!
//! Both passes run once per system, after every glyph has been dispatched,
//! because they depend on the final positions of chords, barlines and time
//! symbols throughout the system.

use crate::config::AssemblyConfig;
use crate::context::{MeasureStack, SystemInfo};
use crate::factory::PositionalIndices;
use crate::inter::{InterId, InterKind};
use crate::rules::closest;
use crate::shape::FermataKind;
use crate::sig::{InterGraph, RelationKind};
use std::collections::BTreeMap;
use tracing::debug;

/// Links every live fermata to a supporting chord, or fails it.
///
/// For each fermata: look up its containing measure stack, select candidate
/// chords on the side its orientation points to (a below-fermata attaches
/// to chords above the mark, an above-fermata to chords below), and link the
/// best candidate. A fermata with neither a chord link nor a pre-existing
/// barline link is deleted: an unsupported fermata is not a valid
/// interpretation.
pub(crate) fn link_fermatas(
    system: &SystemInfo,
    config: &AssemblyConfig,
    sig: &mut InterGraph,
    indices: &mut PositionalIndices,
) {
    let fermatas = sig.inters_where(|inter| matches!(inter.kind, InterKind::Fermata(_)));
    let chords = indices.head_chords(sig).to_vec();
    let max_dy = system.scale.pixels(config.fermata_chord_dy);

    for id in fermatas {
        let Some(inter) = sig.get(id) else { continue };
        let InterKind::Fermata(kind) = inter.kind else {
            continue;
        };
        let center = inter.center();
        let stack = system.stack_at(center).copied();
        let candidates: Vec<InterId> = match stack {
            Some(stack) => chords
                .iter()
                .copied()
                .filter(|&chord| {
                    sig.get(chord).is_some_and(|c| {
                        let cc = c.center();
                        if !stack.contains_x(cc.x) {
                            return false;
                        }
                        let on_side = match kind {
                            FermataKind::Below => cc.y < center.y,
                            FermataKind::Above => cc.y > center.y,
                        };
                        on_side && (cc.y - center.y).abs() <= max_dy
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        if let Some(chord) = closest(sig, candidates, center) {
            let _ = sig.add_relation(RelationKind::FermataChord, id, chord);
        } else if !sig.has_relation(id, RelationKind::FermataBar) {
            debug!(fermata = %id, "fermata with no chord or barline support, deleted");
            sig.remove_vertex(id);
        }
    }
}

/// Opaque boundary validating one stack's worth of time symbols.
///
/// The retriever may delete or adjust member interpretations; the engine
/// only guarantees the grouping it hands over.
pub trait TimeColumnRetriever {
    /// Called once per non-empty stack group, in ascending stack index
    /// order. `members` are live time interpretations located in `stack`.
    fn retrieve(&mut self, stack: &MeasureStack, members: &[InterId], sig: &mut InterGraph);
}

/// Groups time symbols outside staff headers by measure stack and hands
/// each group to the retriever.
///
/// Symbols whose center lies left of their staff's header stop belong to
/// the header stage and are excluded. Stacks are keyed and ordered by their
/// integer index, so processing is deterministic left-to-right.
pub(crate) fn assemble_time_columns(
    system: &SystemInfo,
    sig: &mut InterGraph,
    retriever: &mut dyn TimeColumnRetriever,
) {
    let times = sig.inters_where(|inter| inter.is_time());
    let mut groups: BTreeMap<usize, Vec<InterId>> = BTreeMap::new();

    for id in times {
        let Some(inter) = sig.get(id) else { continue };
        let center = inter.center();
        let in_header = inter
            .staff
            .and_then(|staff| system.staff(staff))
            .is_some_and(|staff| center.x < staff.header_stop);
        if in_header {
            continue;
        }
        let Some(stack) = system.stack_at(center) else {
            debug!(inter = %id, "time symbol outside any measure stack, ignored");
            continue;
        };
        groups.entry(stack.index).or_default().push(id);
    }

    for (index, members) in groups {
        let Some(stack) = system.stacks().iter().find(|s| s.index == index) else {
            continue;
        };
        retriever.retrieve(stack, &members, sig);
    }
}

/// Default time-column retriever.
///
/// Per staff: whole symbols are accepted as-is; partial numbers must pair a
/// numerator with a denominator, split around the column's vertical
/// midpoint. The best-graded number on each side is kept, everything
/// unpaired is deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicColumn;

impl TimeColumnRetriever for BasicColumn {
    fn retrieve(&mut self, stack: &MeasureStack, members: &[InterId], sig: &mut InterGraph) {
        let mut by_staff: BTreeMap<u16, Vec<InterId>> = BTreeMap::new();
        for &id in members {
            let Some(inter) = sig.get(id) else { continue };
            if let InterKind::TimeNumber(_) = inter.kind {
                let staff = inter.staff.map(|s| s.as_usize() as u16).unwrap_or(u16::MAX);
                by_staff.entry(staff).or_default().push(id);
            }
            // TimeWhole members pass through untouched.
        }

        for (_, numbers) in by_staff {
            let middle = numbers
                .iter()
                .filter_map(|&id| sig.get(id))
                .map(|inter| inter.center().y)
                .sum::<i32>()
                / numbers.len().max(1) as i32;
            let best = |above: bool| -> Option<InterId> {
                numbers
                    .iter()
                    .copied()
                    .filter(|&id| {
                        sig.get(id).is_some_and(|inter| {
                            if above {
                                inter.center().y <= middle
                            } else {
                                inter.center().y > middle
                            }
                        })
                    })
                    .max_by(|&a, &b| {
                        let ga = sig.get(a).map(|i| i.grade).unwrap_or(0.0);
                        let gb = sig.get(b).map(|i| i.grade).unwrap_or(0.0);
                        // Equal grades resolve by geometry (leftmost, then
                        // topmost), never by arrival-order-encoding ids.
                        let ka = sig.get(a).map(|i| i.stable_key());
                        let kb = sig.get(b).map(|i| i.stable_key());
                        ga.total_cmp(&gb).then_with(|| kb.cmp(&ka))
                    })
            };
            let keep: Vec<InterId> = match (best(true), best(false)) {
                (Some(num), Some(den)) if num != den => vec![num, den],
                _ => Vec::new(), // no consistent numerator/denominator pair
            };
            for id in numbers {
                if !keep.contains(&id) {
                    debug!(inter = %id, stack = stack.index, "unpaired time number deleted");
                    sig.remove_vertex(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Scale, Staff};
    use crate::geom::Rect;
    use crate::inter::{Inter, StaffId};
    use crate::shape::Shape;

    fn system() -> SystemInfo {
        SystemInfo::new(
            Scale::new(16),
            vec![Staff::new(100, 164, 80)],
            vec![MeasureStack::new(0, 60, 300), MeasureStack::new(1, 300, 600)],
        )
    }

    fn chord(x: i32, y: i32) -> Inter {
        Inter::new(InterKind::HeadChord, Shape::NoteheadBlack, 0.7, Rect::new(x, y, 12, 40))
    }

    fn fermata(x: i32, y: i32, kind: FermataKind) -> Inter {
        let shape = match kind {
            FermataKind::Above => Shape::FermataAbove,
            FermataKind::Below => Shape::FermataBelow,
        };
        Inter::new(InterKind::Fermata(kind), shape, 0.6, Rect::new(x, y, 20, 10))
    }

    #[test]
    fn below_fermata_links_to_chord_above() {
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        let chord_id = sig.add_vertex(chord(100, 110));
        let fermata_id = sig.add_vertex(fermata(98, 180, FermataKind::Below));
        let mut indices = PositionalIndices::default();

        link_fermatas(&system, &config, &mut sig, &mut indices);

        assert!(sig.contains(fermata_id));
        assert!(sig.has_relation(fermata_id, RelationKind::FermataChord));
        assert!(sig.has_relation(chord_id, RelationKind::FermataChord));
        assert!(!sig.has_relation(fermata_id, RelationKind::FermataBar));
    }

    #[test]
    fn unsupported_fermata_is_deleted() {
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        let fermata_id = sig.add_vertex(fermata(98, 180, FermataKind::Below));
        let mut indices = PositionalIndices::default();

        link_fermatas(&system, &config, &mut sig, &mut indices);

        assert!(!sig.contains(fermata_id));
        assert_eq!(sig.live_count(), 0);
    }

    #[test]
    fn barline_linked_fermata_survives_without_chord() {
        let system = system();
        let config = AssemblyConfig::default();
        let mut sig = InterGraph::new();
        let bar = sig.add_vertex(Inter::new(
            InterKind::Barline,
            Shape::Barline,
            0.9,
            Rect::new(105, 100, 3, 64),
        ));
        let fermata_id = sig.add_vertex(fermata(98, 180, FermataKind::Below));
        sig.add_relation(RelationKind::FermataBar, fermata_id, bar)
            .unwrap();
        let mut indices = PositionalIndices::default();

        link_fermatas(&system, &config, &mut sig, &mut indices);

        assert!(sig.contains(fermata_id));
        assert!(sig.has_relation(fermata_id, RelationKind::FermataBar));
    }

    struct Recorder {
        groups: Vec<(usize, Vec<InterId>)>,
    }

    impl TimeColumnRetriever for Recorder {
        fn retrieve(&mut self, stack: &MeasureStack, members: &[InterId], _sig: &mut InterGraph) {
            self.groups.push((stack.index, members.to_vec()));
        }
    }

    fn time_number(x: i32, y: i32, value: u8, shape: Shape) -> Inter {
        Inter::new(InterKind::TimeNumber(value), shape, 0.5, Rect::new(x, y, 8, 14))
            .with_staff(StaffId::new(0))
    }

    #[test]
    fn digits_in_one_stack_form_one_group() {
        let system = system();
        let mut sig = InterGraph::new();
        let six = sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
        let eight = sig.add_vertex(time_number(150, 140, 8, Shape::TimeEight));
        let mut recorder = Recorder { groups: Vec::new() };

        assemble_time_columns(&system, &mut sig, &mut recorder);

        assert_eq!(recorder.groups.len(), 1);
        assert_eq!(recorder.groups[0].0, 0);
        assert_eq!(recorder.groups[0].1, vec![six, eight]);
    }

    #[test]
    fn header_zone_time_symbols_are_excluded() {
        let system = system();
        let mut sig = InterGraph::new();
        // Center x = 74 < header_stop 80: header stage territory.
        sig.add_vertex(time_number(70, 105, 4, Shape::TimeFour));
        let outside = sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
        let mut recorder = Recorder { groups: Vec::new() };

        assemble_time_columns(&system, &mut sig, &mut recorder);

        assert_eq!(recorder.groups.len(), 1);
        assert_eq!(recorder.groups[0].1, vec![outside]);
    }

    #[test]
    fn stacks_are_processed_by_index_order() {
        let system = system();
        let mut sig = InterGraph::new();
        // Insert the right-hand stack's symbol first.
        sig.add_vertex(time_number(400, 105, 3, Shape::TimeThree));
        sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
        sig.add_vertex(time_number(150, 140, 8, Shape::TimeEight));
        let mut recorder = Recorder { groups: Vec::new() };

        assemble_time_columns(&system, &mut sig, &mut recorder);

        let indexes: Vec<usize> = recorder.groups.iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn basic_column_keeps_paired_numbers_and_drops_strays() {
        let system = system();
        let mut sig = InterGraph::new();
        let six = sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
        let eight = sig.add_vertex(time_number(150, 150, 8, Shape::TimeEight));
        // A lone numerator in the next stack cannot be paired.
        let stray = sig.add_vertex(time_number(400, 105, 3, Shape::TimeThree));
        let mut column = BasicColumn;

        assemble_time_columns(&system, &mut sig, &mut column);

        assert!(sig.contains(six));
        assert!(sig.contains(eight));
        assert!(!sig.contains(stray));
    }

    #[test]
    fn equal_grade_numerators_resolve_by_geometry_not_insertion() {
        let system = system();
        for flip in [false, true] {
            let mut sig = InterGraph::new();
            let (left, right) = if flip {
                let r = sig.add_vertex(time_number(170, 105, 6, Shape::TimeSix));
                let l = sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
                (l, r)
            } else {
                let l = sig.add_vertex(time_number(150, 105, 6, Shape::TimeSix));
                let r = sig.add_vertex(time_number(170, 105, 6, Shape::TimeSix));
                (l, r)
            };
            let eight = sig.add_vertex(time_number(150, 150, 8, Shape::TimeEight));
            let mut column = BasicColumn;

            assemble_time_columns(&system, &mut sig, &mut column);

            assert!(sig.contains(left), "leftmost numerator must survive");
            assert!(!sig.contains(right));
            assert!(sig.contains(eight));
        }
    }
}
