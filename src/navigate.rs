//! Directional focus movement between panes.
//!
//! A move "breaks through" one border of the focused pane and lands on the
//! pane whose opposite border touches it over the longest stretch.

use ratatui::layout::Rect;

/// Direction of a focus move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards smaller x.
    Left,
    /// Towards larger x.
    Right,
    /// Towards smaller y.
    Up,
    /// Towards larger y.
    Down,
}

impl Direction {
    /// The side of the focused pane that is left through.
    #[must_use]
    pub fn leaving_side(self) -> Side {
        match self {
            Self::Left => Side::Left,
            Self::Right => Side::Right,
            Self::Up => Side::Top,
            Self::Down => Side::Bottom,
        }
    }

    /// The side of a neighbour that is entered on.
    #[must_use]
    pub fn entering_side(self) -> Side {
        match self {
            Self::Left => Side::Right,
            Self::Right => Side::Left,
            Self::Up => Side::Bottom,
            Self::Down => Side::Top,
        }
    }
}

/// One side of a pane rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Left edge.
    Left,
    /// Right edge.
    Right,
    /// Top edge.
    Top,
    /// Bottom edge.
    Bottom,
}

/// A border segment: a fixed coordinate and an inclusive span on the other axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Border {
    /// x for left/right borders, y for top/bottom borders.
    pub at: i32,
    /// First cell of the span.
    pub from: i32,
    /// Last cell of the span.
    pub to: i32,
}

/// Border of `area` on the given side.
#[must_use]
pub fn border(area: Rect, side: Side) -> Border {
    let (x, y) = (i32::from(area.x), i32::from(area.y));
    let (w, h) = (i32::from(area.width), i32::from(area.height));
    match side {
        Side::Left => Border { at: x, from: y, to: y + h - 1 },
        Side::Right => Border { at: x + w - 1, from: y, to: y + h - 1 },
        Side::Top => Border { at: y, from: x, to: x + w - 1 },
        Side::Bottom => Border { at: y + h - 1, from: x, to: x + w - 1 },
    }
}

/// Length over which the spans `a1..=a2` and `b1..=b2` touch.
#[must_use]
pub fn touches(a1: i32, a2: i32, b1: i32, b2: i32) -> i32 {
    if a2 < b1 || a1 > b2 {
        // disjoint
        0
    } else if a1 <= b1 && b2 <= a2 {
        // a contains b
        b2 - b1
    } else if b1 <= a1 && a2 <= b2 {
        // b contains a
        a2 - a1
    } else if b1 < a1 && b2 <= a2 {
        // b overlaps the low end of a
        b2 - a1
    } else if a1 <= b1 && b2 > a2 {
        // b overlaps the high end of a
        a2 - b1
    } else {
        0
    }
}

/// Score of `candidate` as the target of a move from `focused`.
fn score(focused: Rect, candidate: Rect, direction: Direction) -> i32 {
    let leave = border(focused, direction.leaving_side());
    let enter = border(candidate, direction.entering_side());
    let step = match direction {
        Direction::Left | Direction::Up => -1,
        Direction::Right | Direction::Down => 1,
    };
    if enter.at == leave.at + step {
        touches(leave.from, leave.to, enter.from, enter.to)
    } else {
        0
    }
}

/// Find the pane to focus when moving from `focused` in `direction`.
///
/// `areas` are the pane rectangles in registry order. Returns the index of the
/// neighbour with the longest shared border, the lowest index on ties, or
/// `None` when nothing touches that side.
#[must_use]
pub fn navigate(areas: &[Rect], focused: usize, direction: Direction) -> Option<usize> {
    let origin = *areas.get(focused)?;
    let mut best: Option<(usize, i32)> = None;
    for (i, area) in areas.iter().enumerate() {
        if i == focused {
            continue;
        }
        let touch = score(origin, *area, direction);
        if touch > best.map_or(0, |(_, t)| t) {
            best = Some((i, touch));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    /// +---+---+
    /// | 0 | 1 |
    /// |   +---+
    /// |   | 2 |
    /// +---+---+
    /// ```
    fn grid() -> Vec<Rect> {
        vec![
            Rect::new(0, 0, 40, 20),
            Rect::new(40, 0, 40, 8),
            Rect::new(40, 8, 40, 12),
        ]
    }

    #[test]
    fn test_borders() {
        let area = Rect::new(2, 3, 10, 5);
        assert_eq!(border(area, Side::Left), Border { at: 2, from: 3, to: 7 });
        assert_eq!(border(area, Side::Right), Border { at: 11, from: 3, to: 7 });
        assert_eq!(border(area, Side::Top), Border { at: 3, from: 2, to: 11 });
        assert_eq!(border(area, Side::Bottom), Border { at: 7, from: 2, to: 11 });
    }

    #[test]
    fn test_touches_cases() {
        assert_eq!(touches(0, 5, 7, 9), 0);
        assert_eq!(touches(7, 9, 0, 5), 0);
        assert_eq!(touches(0, 10, 2, 5), 3);
        assert_eq!(touches(2, 5, 0, 10), 3);
        assert_eq!(touches(4, 10, 0, 6), 2);
        assert_eq!(touches(0, 6, 4, 10), 2);
    }

    #[test]
    fn test_no_neighbour() {
        let areas = grid();
        assert_eq!(navigate(&areas, 0, Direction::Left), None);
        assert_eq!(navigate(&areas, 0, Direction::Up), None);
        assert_eq!(navigate(&areas, 1, Direction::Right), None);
    }

    #[test]
    fn test_stacked_down_and_up() {
        let areas = vec![Rect::new(0, 0, 80, 12), Rect::new(0, 12, 80, 12)];
        assert_eq!(navigate(&areas, 0, Direction::Down), Some(1));
        assert_eq!(navigate(&areas, 1, Direction::Up), Some(0));
    }

    #[test]
    fn test_best_overlap_wins() {
        let areas = grid();
        // Pane 2 shares 11 rows with pane 0, pane 1 only 7.
        assert_eq!(navigate(&areas, 0, Direction::Right), Some(2));
        assert_eq!(navigate(&areas, 1, Direction::Left), Some(0));
        assert_eq!(navigate(&areas, 1, Direction::Down), Some(2));
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let areas = vec![
            Rect::new(0, 0, 20, 10),
            Rect::new(20, 0, 10, 10),
            Rect::new(30, 0, 10, 10),
            Rect::new(0, 10, 20, 10),
            Rect::new(20, 10, 20, 10),
        ];
        // From pane 3 upwards both 0 (left half) and nothing else touch.
        assert_eq!(navigate(&areas, 3, Direction::Up), Some(0));
        // From pane 4 upwards panes 1 and 2 tie.
        assert_eq!(navigate(&areas, 4, Direction::Up), Some(1));
    }

    #[test]
    fn test_gap_is_not_adjacent() {
        let areas = vec![Rect::new(0, 0, 10, 10), Rect::new(11, 0, 10, 10)];
        assert_eq!(navigate(&areas, 0, Direction::Right), None);
    }

    #[test]
    fn test_out_of_range_focus() {
        assert_eq!(navigate(&grid(), 7, Direction::Down), None);
    }
}
