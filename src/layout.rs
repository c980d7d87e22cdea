//! Layout tree and the geometry engine that turns it into pane areas.

use std::str::FromStr;
use std::time::Duration;

use ratatui::layout::Rect;

use crate::error::{Error, Result};

/// Minimum width and height of every pane, border included.
pub const MIN_PANE_SIZE: u16 = 3;

/// Split axis for layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Children placed side by side (the width is divided).
    Horizontal,
    /// Children stacked top to bottom (the height is divided).
    Vertical,
}

/// Requested length of a pane along its parent's split axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SizeSpec {
    /// Fixed number of cells, e.g. `"5"`.
    Absolute(u32),
    /// Fraction of the available length, e.g. `"0.25"`.
    Fraction(f64),
    /// Ratio of the available length, e.g. `"1/4"`.
    Ratio(u32, u32),
    /// Percentage of the available length, e.g. `"25%"`.
    Percent(u32),
}

impl SizeSpec {
    /// Resolve against the available length, before clamping.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resolve(self, length: u16) -> u32 {
        let length = u64::from(length);
        let cells = match self {
            Self::Absolute(n) => u64::from(n),
            Self::Fraction(f) => (length as f64 * f).floor() as u64,
            Self::Ratio(a, b) => length * u64::from(a) / u64::from(b),
            Self::Percent(p) => length * u64::from(p) / 100,
        };
        u32::try_from(cells).unwrap_or(u32::MAX)
    }

    /// Resolve and clamp into `[MIN_PANE_SIZE, length]`.
    #[must_use]
    pub fn clamped(self, length: u16) -> u32 {
        self.resolve(length)
            .clamp(u32::from(MIN_PANE_SIZE), u32::from(length))
    }
}

impl FromStr for SizeSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidSize(s.to_string());
        let digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
        let number = |t: &str| t.parse::<u32>().map_err(|_| invalid());

        if digits(s) {
            return Ok(Self::Absolute(number(s)?));
        }
        if let Some(p) = s.strip_suffix('%') {
            if digits(p) {
                return Ok(Self::Percent(number(p)?));
            }
        }
        if let Some((a, b)) = s.split_once('/') {
            if digits(a) && digits(b) {
                let denominator = number(b)?;
                if denominator == 0 {
                    return Err(invalid());
                }
                return Ok(Self::Ratio(number(a)?, denominator));
            }
        }
        if let Some((int, frac)) = s.split_once('.') {
            if digits(int) && digits(frac) {
                return s.parse().map(Self::Fraction).map_err(|_| invalid());
            }
        }
        Err(invalid())
    }
}

/// One leaf of the layout: a shell command hosted in its own pane.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaneSpec {
    /// Shell command line, passed to `sh -c`.
    pub command: String,
    /// Label shown instead of the command.
    pub title: Option<String>,
    /// Requested length along the parent split.
    pub size: Option<SizeSpec>,
    /// Whether this pane receives the initial focus.
    pub focus: bool,
    /// Respawn the command whenever it exits.
    pub restart: bool,
    /// Delay before respawning.
    pub restart_delay: Option<Duration>,
    /// Pane-local error pattern list.
    pub error_patterns: Option<String>,
}

impl PaneSpec {
    /// Create a pane running the given command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the size along the parent split.
    #[must_use]
    pub fn size(mut self, size: SizeSpec) -> Self {
        self.size = Some(size);
        self
    }

    /// Request the initial focus.
    #[must_use]
    pub fn focus(mut self) -> Self {
        self.focus = true;
        self
    }

    /// Restart the command on exit, optionally after a delay.
    #[must_use]
    pub fn restart(mut self, delay: Option<Duration>) -> Self {
        self.restart = true;
        self.restart_delay = delay;
        self
    }

    /// Set the pane-local error patterns.
    #[must_use]
    pub fn error_patterns(mut self, patterns: impl Into<String>) -> Self {
        self.error_patterns = Some(patterns.into());
        self
    }

    /// Label for the pane border: the title, or the command.
    #[must_use]
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.command)
    }
}

/// Layout tree.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutNode {
    /// A rectangle divided among children along one axis.
    Split {
        /// Axis to divide.
        axis: Axis,
        /// Children in placement order.
        children: Vec<LayoutNode>,
    },

    /// A leaf pane.
    Pane(PaneSpec),
}

impl LayoutNode {
    /// Children side by side.
    #[must_use]
    pub fn horizontal(children: Vec<LayoutNode>) -> Self {
        Self::Split {
            axis: Axis::Horizontal,
            children,
        }
    }

    /// Children stacked vertically.
    #[must_use]
    pub fn vertical(children: Vec<LayoutNode>) -> Self {
        Self::Split {
            axis: Axis::Vertical,
            children,
        }
    }

    /// A single pane.
    #[must_use]
    pub fn pane(spec: PaneSpec) -> Self {
        Self::Pane(spec)
    }

    /// All panes in traversal (display) order.
    #[must_use]
    pub fn panes(&self) -> Vec<&PaneSpec> {
        let mut panes = Vec::new();
        self.collect_panes(&mut panes);
        panes
    }

    fn collect_panes<'a>(&'a self, panes: &mut Vec<&'a PaneSpec>) {
        match self {
            Self::Pane(spec) => panes.push(spec),
            Self::Split { children, .. } => {
                for child in children {
                    child.collect_panes(panes);
                }
            }
        }
    }

    fn size(&self) -> Option<SizeSpec> {
        match self {
            Self::Pane(spec) => spec.size,
            Self::Split { .. } => None,
        }
    }

    /// Check construction-time invariants.
    ///
    /// # Errors
    /// Returns an error if a split has no children or more than one pane
    /// requests the initial focus.
    pub fn validate(&self) -> Result<()> {
        self.check_splits()?;
        if self.panes().iter().filter(|p| p.focus).count() > 1 {
            return Err(Error::MultipleFocus);
        }
        Ok(())
    }

    fn check_splits(&self) -> Result<()> {
        match self {
            Self::Pane(_) => Ok(()),
            Self::Split { children, .. } if children.is_empty() => Err(Error::EmptySplit),
            Self::Split { children, .. } => children.iter().try_for_each(Self::check_splits),
        }
    }

    /// Index (0-based, traversal order) of the pane requesting focus.
    #[must_use]
    pub fn focus_request(&self) -> Option<usize> {
        self.panes().iter().position(|p| p.focus)
    }
}

/// Calculates areas for each pane in a layout.
pub struct LayoutCalculator;

impl LayoutCalculator {
    /// Calculate the Rect for each pane, in traversal order.
    ///
    /// # Errors
    /// Returns [`Error::TerminalTooSmall`] when some split cannot give every
    /// child the minimum pane size.
    pub fn calculate_areas(layout: &LayoutNode, area: Rect) -> Result<Vec<Rect>> {
        if area.width < MIN_PANE_SIZE || area.height < MIN_PANE_SIZE {
            return Err(Error::TerminalTooSmall {
                available: area.width.min(area.height),
                required: u32::from(MIN_PANE_SIZE),
            });
        }
        let mut areas = Vec::new();
        Self::calculate_recursive(layout, area, &mut areas)?;
        Ok(areas)
    }

    fn calculate_recursive(layout: &LayoutNode, area: Rect, areas: &mut Vec<Rect>) -> Result<()> {
        match layout {
            LayoutNode::Pane(_) => {
                areas.push(area);
                Ok(())
            }
            LayoutNode::Split { axis, children } => {
                let requested: Vec<_> = children.iter().map(LayoutNode::size).collect();
                match axis {
                    Axis::Horizontal => {
                        let segments = Self::divide(area.x, area.width, &requested)?;
                        for (child, (x, width)) in children.iter().zip(segments) {
                            let child_area = Rect { x, width, ..area };
                            Self::calculate_recursive(child, child_area, areas)?;
                        }
                    }
                    Axis::Vertical => {
                        let segments = Self::divide(area.y, area.height, &requested)?;
                        for (child, (y, height)) in children.iter().zip(segments) {
                            let child_area = Rect { y, height, ..area };
                            Self::calculate_recursive(child, child_area, areas)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Divide `length` cells starting at `start` among children with the
    /// given requested sizes. Returns `(offset, length)` per child.
    ///
    /// # Errors
    /// Returns [`Error::TerminalTooSmall`] if `length < 3 * children`.
    pub fn divide(start: u16, length: u16, requested: &[Option<SizeSpec>]) -> Result<Vec<(u16, u16)>> {
        let n = u32::try_from(requested.len()).unwrap_or(u32::MAX);
        let total = u32::from(length);
        let min = u32::from(MIN_PANE_SIZE);
        if n == 0 || total < n * min {
            return Err(Error::TerminalTooSmall {
                available: length,
                required: n.saturating_mul(min),
            });
        }

        // Explicit sizes first; unsized children share what is left equally.
        let explicit: Vec<Option<u32>> = requested
            .iter()
            .map(|spec| spec.map(|spec| spec.clamped(length)))
            .collect();
        // Unsized children split the remainder rather than taking L/n each,
        // so mixed layouts size differently from a plain equal split.
        let unsized_count = explicit.iter().filter(|s| s.is_none()).count();
        let share = match u32::try_from(unsized_count) {
            Ok(0) | Err(_) => 0,
            Ok(u) => {
                let claimed: u32 = explicit.iter().flatten().sum();
                total.saturating_sub(claimed) / u
            }
        };
        let mut sizes: Vec<u32> = explicit
            .into_iter()
            .map(|size| size.unwrap_or(share.max(min)))
            .collect();

        loop {
            let sum: u32 = sizes.iter().sum();
            if sum > total {
                let mut shrink = sum - total;
                for size in &mut sizes {
                    if shrink == 0 {
                        break;
                    }
                    if *size > min {
                        *size -= 1;
                        shrink -= 1;
                    }
                }
            } else if sum < total {
                let mut grow = total - sum;
                for size in &mut sizes {
                    if grow == 0 {
                        break;
                    }
                    *size += 1;
                    grow -= 1;
                }
            } else {
                break;
            }
        }

        let mut offset = start;
        Ok(sizes
            .into_iter()
            .map(|size| {
                // Every size is <= length here, so it fits in u16.
                let size = u16::try_from(size).unwrap_or(length);
                let segment = (offset, size);
                offset = offset.saturating_add(size);
                segment
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths(length: u16, requested: &[Option<SizeSpec>]) -> Vec<u16> {
        LayoutCalculator::divide(0, length, requested)
            .unwrap()
            .into_iter()
            .map(|(_, l)| l)
            .collect()
    }

    #[test]
    fn test_size_spec_forms() {
        let forms = ["5", "0.25", "1/4", "25%"];
        let resolved: Vec<_> = forms
            .iter()
            .map(|f| f.parse::<SizeSpec>().unwrap().resolve(100))
            .collect();
        assert_eq!(resolved, vec![5, 25, 25, 25]);
    }

    #[test]
    fn test_size_spec_rejects_garbage() {
        assert!("abc".parse::<SizeSpec>().is_err());
        assert!("1/0".parse::<SizeSpec>().is_err());
        assert!("%".parse::<SizeSpec>().is_err());
        assert!("-3".parse::<SizeSpec>().is_err());
        assert!(".5".parse::<SizeSpec>().is_err());
    }

    #[test]
    fn test_size_spec_clamping() {
        assert_eq!(SizeSpec::Absolute(1).clamped(50), 3);
        assert_eq!(SizeSpec::Absolute(500).clamped(50), 50);
        assert_eq!(SizeSpec::Percent(150).clamped(50), 50);
    }

    #[test]
    fn test_percent_and_unsized() {
        let sizes = lengths(100, &[Some(SizeSpec::Percent(30)), None]);
        assert_eq!(sizes, vec![30, 70]);
    }

    #[test]
    fn test_unsized_share_remainder() {
        assert_eq!(
            lengths(100, &[Some(SizeSpec::Percent(30)), None, None]),
            vec![30, 35, 35]
        );
    }

    #[test]
    fn test_three_unsized_in_ten() {
        let sizes = lengths(10, &[None, None, None]);
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_oversized_request_shrinks() {
        let sizes = lengths(20, &[Some(SizeSpec::Absolute(18)), None, None]);
        assert_eq!(sizes.iter().sum::<u16>(), 20);
        assert!(sizes.iter().all(|&s| s >= MIN_PANE_SIZE));
    }

    #[test]
    fn test_lengths_always_sum_to_total() {
        let specs = [
            None,
            Some(SizeSpec::Absolute(7)),
            Some(SizeSpec::Percent(80)),
            Some(SizeSpec::Ratio(1, 3)),
            Some(SizeSpec::Fraction(0.9)),
        ];
        for n in 1..=specs.len() {
            let requested = &specs[..n];
            let min_len = u16::try_from(n).unwrap() * MIN_PANE_SIZE;
            for length in min_len..200 {
                let sizes = lengths(length, requested);
                assert_eq!(sizes.iter().sum::<u16>(), length, "n={n} length={length}");
                assert!(sizes.iter().all(|&s| s >= MIN_PANE_SIZE));
            }
        }
    }

    #[test]
    fn test_divide_offsets_are_consecutive() {
        let segments = LayoutCalculator::divide(5, 30, &[None, None, None]).unwrap();
        assert_eq!(segments, vec![(5, 10), (15, 10), (25, 10)]);
    }

    #[test]
    fn test_too_small() {
        let err = LayoutCalculator::divide(0, 8, &[None, None, None]).unwrap_err();
        assert!(matches!(
            err,
            Error::TerminalTooSmall {
                available: 8,
                required: 9
            }
        ));
    }

    #[test]
    fn test_nested_areas() {
        let layout = LayoutNode::horizontal(vec![
            LayoutNode::pane(PaneSpec::new("a").size(SizeSpec::Percent(30))),
            LayoutNode::vertical(vec![
                LayoutNode::pane(PaneSpec::new("b")),
                LayoutNode::pane(PaneSpec::new("c")),
            ]),
        ]);
        let areas = LayoutCalculator::calculate_areas(&layout, Rect::new(0, 0, 100, 40)).unwrap();
        assert_eq!(
            areas,
            vec![
                Rect::new(0, 0, 30, 40),
                Rect::new(30, 0, 70, 20),
                Rect::new(30, 20, 70, 20),
            ]
        );
    }

    #[test]
    fn test_screen_below_minimum() {
        let layout = LayoutNode::pane(PaneSpec::new("a"));
        assert!(LayoutCalculator::calculate_areas(&layout, Rect::new(0, 0, 2, 10)).is_err());
    }

    #[test]
    fn test_validate_focus() {
        let layout = LayoutNode::horizontal(vec![
            LayoutNode::pane(PaneSpec::new("a").focus()),
            LayoutNode::pane(PaneSpec::new("b").focus()),
        ]);
        assert!(matches!(layout.validate(), Err(Error::MultipleFocus)));

        let layout = LayoutNode::horizontal(vec![
            LayoutNode::pane(PaneSpec::new("a")),
            LayoutNode::pane(PaneSpec::new("b").focus()),
        ]);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.focus_request(), Some(1));
    }

    #[test]
    fn test_validate_empty_split() {
        let layout = LayoutNode::horizontal(vec![
            LayoutNode::pane(PaneSpec::new("a")),
            LayoutNode::vertical(vec![]),
        ]);
        assert!(matches!(layout.validate(), Err(Error::EmptySplit)));
    }

    #[test]
    fn test_label() {
        assert_eq!(PaneSpec::new("top").label(), "top");
        assert_eq!(PaneSpec::new("top").title("cpu").label(), "cpu");
    }
}
