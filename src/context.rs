//! Read-only structural context supplied by earlier pipeline stages.
//!
//! Staves, measure stacks and the sheet scale are built by the staff and
//! measure geometry stages; this engine only looks positions up in them and
//! never mutates them. The structural interpretations themselves (stems,
//! heads, head-chords, rests, barlines) arrive pre-seeded inside the
//! system's `InterGraph`.

use crate::geom::Point;
use crate::inter::StaffId;
use serde::{Deserialize, Serialize};

/// Global sheet scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Distance in pixels between two staff lines.
    pub interline: i32,
}

impl Scale {
    pub const fn new(interline: i32) -> Self {
        Self { interline }
    }

    /// Converts an interline fraction to pixels, rounded to nearest.
    #[inline]
    pub fn pixels(&self, fraction: f64) -> i32 {
        (fraction * self.interline as f64).round() as i32
    }
}

/// One staff of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    /// Ordinate of the top staff line.
    pub top: i32,
    /// Ordinate of the bottom staff line.
    pub bottom: i32,
    /// Abscissa where the staff header (clef, key, time) ends. Time symbols
    /// left of this column belong to the header stage, not to this engine.
    pub header_stop: i32,
}

impl Staff {
    pub const fn new(top: i32, bottom: i32, header_stop: i32) -> Self {
        Self {
            top,
            bottom,
            header_stop,
        }
    }

    /// Ordinate of the staff middle line.
    #[inline]
    pub const fn middle(&self) -> i32 {
        (self.top + self.bottom) / 2
    }

    /// Whether `y` falls within the staff lines, with a vertical `margin`.
    #[inline]
    pub const fn contains_y(&self, y: i32, margin: i32) -> bool {
        y >= self.top - margin && y <= self.bottom + margin
    }
}

/// The simultaneous measures of all parts at one horizontal band.
///
/// Compared and grouped by `index` (left-to-right sequence within the
/// system), never by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureStack {
    pub index: usize,
    /// Left abscissa of the band (inclusive).
    pub left: i32,
    /// Right abscissa of the band (exclusive).
    pub right: i32,
}

impl MeasureStack {
    pub const fn new(index: usize, left: i32, right: i32) -> Self {
        Self { index, left, right }
    }

    #[inline]
    pub const fn contains_x(&self, x: i32) -> bool {
        x >= self.left && x < self.right
    }
}

/// Per-system structural context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub scale: Scale,
    staves: Vec<Staff>,
    stacks: Vec<MeasureStack>,
}

impl SystemInfo {
    /// Builds the context. `stacks` must be ordered left-to-right with
    /// consecutive indices; staves top-to-bottom.
    pub fn new(scale: Scale, staves: Vec<Staff>, stacks: Vec<MeasureStack>) -> Self {
        debug_assert!(stacks.windows(2).all(|w| w[0].right <= w[1].left));
        Self {
            scale,
            staves,
            stacks,
        }
    }

    pub fn staff(&self, id: StaffId) -> Option<&Staff> {
        self.staves.get(id.as_usize())
    }

    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    /// Measure stack containing the given page position, by abscissa band.
    pub fn stack_at(&self, point: Point) -> Option<&MeasureStack> {
        self.stacks.iter().find(|stack| stack.contains_x(point.x))
    }

    pub fn stacks(&self) -> &[MeasureStack] {
        &self.stacks
    }

    /// Staff whose vertical range is closest to `y`.
    pub fn closest_staff(&self, y: i32) -> Option<StaffId> {
        self.staves
            .iter()
            .enumerate()
            .min_by_key(|(_, staff)| {
                if staff.contains_y(y, 0) {
                    0
                } else {
                    (y - staff.middle()).abs()
                }
            })
            .map(|(idx, _)| StaffId::new(idx as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> SystemInfo {
        SystemInfo::new(
            Scale::new(16),
            vec![Staff::new(100, 164, 80), Staff::new(300, 364, 80)],
            vec![MeasureStack::new(0, 60, 200), MeasureStack::new(1, 200, 400)],
        )
    }

    #[test]
    fn stack_lookup_by_abscissa() {
        let sys = system();
        assert_eq!(sys.stack_at(Point::new(70, 0)).map(|s| s.index), Some(0));
        assert_eq!(sys.stack_at(Point::new(200, 0)).map(|s| s.index), Some(1));
        assert_eq!(sys.stack_at(Point::new(500, 0)), None);
    }

    #[test]
    fn closest_staff_picks_by_vertical_distance() {
        let sys = system();
        assert_eq!(sys.closest_staff(120), Some(StaffId::new(0)));
        assert_eq!(sys.closest_staff(290), Some(StaffId::new(1)));
    }

    #[test]
    fn scale_fractions() {
        let scale = Scale::new(16);
        assert_eq!(scale.pixels(1.5), 24);
        assert_eq!(scale.pixels(0.75), 12);
    }
}
