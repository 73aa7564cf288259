//! Border glyph sets and the connection-mask lookup used by stitching.

use bitflags::bitflags;

bitflags! {
    /// Which neighbors of a grid point carry border glyphs.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BorderConnection: u8 {
        /// A border glyph sits above.
        const UP = 1 << 0;
        /// A border glyph sits below.
        const DOWN = 1 << 1;
        /// A border glyph sits to the left.
        const LEFT = 1 << 2;
        /// A border glyph sits to the right.
        const RIGHT = 1 << 3;
    }
}

/// The glyph table of one border style.
///
/// Stitching looks up a replacement glyph by a 4-bit connection mask; a
/// mask without an entry leaves the crossing point untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorderGlyphs {
    /// Top-left corner.
    pub top_left: &'static str,
    /// Top-right corner.
    pub top_right: &'static str,
    /// Bottom-left corner.
    pub bottom_left: &'static str,
    /// Bottom-right corner.
    pub bottom_right: &'static str,
    /// Horizontal line.
    pub horizontal: &'static str,
    /// Vertical line.
    pub vertical: &'static str,
    /// T piece opening to the right.
    pub vertical_right: &'static str,
    /// T piece opening to the left.
    pub vertical_left: &'static str,
    /// T piece opening downward.
    pub horizontal_down: &'static str,
    /// T piece opening upward.
    pub horizontal_up: &'static str,
    /// Four-way cross.
    pub cross: &'static str,
}

impl Default for BorderGlyphs {
    fn default() -> Self {
        Self::SINGLE_LINE
    }
}

impl BorderGlyphs {
    /// The standard single-line box drawing set.
    pub const SINGLE_LINE: Self = Self {
        top_left: "┌",
        top_right: "┐",
        bottom_left: "└",
        bottom_right: "┘",
        horizontal: "─",
        vertical: "│",
        vertical_right: "├",
        vertical_left: "┤",
        horizontal_down: "┬",
        horizontal_up: "┴",
        cross: "┼",
    };

    /// Double-line variant.
    pub const DOUBLE_LINE: Self = Self {
        top_left: "╔",
        top_right: "╗",
        bottom_left: "╚",
        bottom_right: "╝",
        horizontal: "═",
        vertical: "║",
        vertical_right: "╠",
        vertical_left: "╣",
        horizontal_down: "╦",
        horizontal_up: "╩",
        cross: "╬",
    };

    /// Look up the glyph matching a connection mask.
    pub fn glyph_for(&self, mask: BorderConnection) -> Option<&'static str> {
        const UP: u8 = BorderConnection::UP.bits();
        const DOWN: u8 = BorderConnection::DOWN.bits();
        const LEFT: u8 = BorderConnection::LEFT.bits();
        const RIGHT: u8 = BorderConnection::RIGHT.bits();

        match mask.bits() {
            m if m == UP | DOWN => Some(self.vertical),
            m if m == LEFT | RIGHT => Some(self.horizontal),
            m if m == DOWN | RIGHT => Some(self.top_left),
            m if m == DOWN | LEFT => Some(self.top_right),
            m if m == UP | RIGHT => Some(self.bottom_left),
            m if m == UP | LEFT => Some(self.bottom_right),
            m if m == UP | DOWN | RIGHT => Some(self.vertical_right),
            m if m == UP | DOWN | LEFT => Some(self.vertical_left),
            m if m == DOWN | LEFT | RIGHT => Some(self.horizontal_down),
            m if m == UP | LEFT | RIGHT => Some(self.horizontal_up),
            m if m == UP | DOWN | LEFT | RIGHT => Some(self.cross),
            _ => None,
        }
    }

    /// Whether the text is one of this style's glyphs. Stitching uses this
    /// to probe the four neighbors of a crossing point.
    pub fn recognizes(&self, text: &str) -> bool {
        text == self.top_left
            || text == self.top_right
            || text == self.bottom_left
            || text == self.bottom_right
            || text == self.horizontal
            || text == self.vertical
            || text == self.vertical_right
            || text == self.vertical_left
            || text == self.horizontal_down
            || text == self.horizontal_up
            || text == self.cross
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_way_cross() {
        let mask = BorderConnection::all();
        assert_eq!(BorderGlyphs::SINGLE_LINE.glyph_for(mask), Some("┼"));
    }

    #[test]
    fn straight_pieces() {
        let g = BorderGlyphs::SINGLE_LINE;
        assert_eq!(
            g.glyph_for(BorderConnection::UP | BorderConnection::DOWN),
            Some("│")
        );
        assert_eq!(
            g.glyph_for(BorderConnection::LEFT | BorderConnection::RIGHT),
            Some("─")
        );
    }

    #[test]
    fn corners() {
        let g = BorderGlyphs::SINGLE_LINE;
        assert_eq!(
            g.glyph_for(BorderConnection::DOWN | BorderConnection::RIGHT),
            Some("┌")
        );
        assert_eq!(
            g.glyph_for(BorderConnection::UP | BorderConnection::LEFT),
            Some("┘")
        );
    }

    #[test]
    fn tee_pieces() {
        let g = BorderGlyphs::SINGLE_LINE;
        let mask = BorderConnection::UP | BorderConnection::DOWN | BorderConnection::RIGHT;
        assert_eq!(g.glyph_for(mask), Some("├"));
        let mask = BorderConnection::DOWN | BorderConnection::LEFT | BorderConnection::RIGHT;
        assert_eq!(g.glyph_for(mask), Some("┬"));
    }

    #[test]
    fn single_direction_has_no_glyph() {
        assert_eq!(
            BorderGlyphs::SINGLE_LINE.glyph_for(BorderConnection::UP),
            None
        );
        assert_eq!(
            BorderGlyphs::SINGLE_LINE.glyph_for(BorderConnection::empty()),
            None
        );
    }

    #[test]
    fn recognizes_own_glyphs() {
        let g = BorderGlyphs::SINGLE_LINE;
        assert!(g.recognizes("┌"));
        assert!(g.recognizes("┼"));
        assert!(!g.recognizes("x"));
        assert!(!g.recognizes("╔"));
    }
}
