//! Multi-frame canvas support and the small arithmetic helper used by
//! frame animations.

use crate::stain::Stain;
use crate::tree::{ElementKind, NodeId, Tree};

impl Tree {
    /// Advance a canvas node to its next animation frame and stain it for a
    /// color repaint. Non-canvas nodes are ignored.
    pub fn advance_canvas_frame(&mut self, id: NodeId) -> bool {
        let advanced = match &mut self.node_mut(id).kind {
            ElementKind::Canvas { frames, frame } if !frames.is_empty() => {
                *frame = (*frame + 1) % frames.len();
                true
            }
            _ => false,
        };
        if advanced {
            self.node_mut(id).stain.mark(Stain::COLOR);
        }
        advanced
    }
}

/// Componentwise integer division with a floored modulo, so that the
/// remainder is always in `[0, b)` for positive divisors.
pub fn floor_div_mod(a: i32, b: i32) -> (i32, i32) {
    let quotient = a.div_euclid(b);
    let remainder = a - b * quotient;
    (quotient, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::geometry::Size;
    use crate::style::{Dimension, Style};

    fn canvas_node(tree: &mut Tree, frames: usize) -> NodeId {
        let mut style = Style::default();
        style.set_width(Dimension::Absolute(2));
        style.set_height(Dimension::Absolute(1));
        let frame_data = vec![vec![Cell::EMPTY; 2]; frames];
        let id = tree.create(
            style,
            ElementKind::Canvas {
                frames: frame_data,
                frame: 0,
            },
            "anim",
        );
        tree.embed_styles(id, Size::new(2, 1));
        id
    }

    #[test]
    fn frames_wrap_around() {
        let mut tree = Tree::new();
        let id = canvas_node(&mut tree, 3);
        assert!(tree.advance_canvas_frame(id));
        assert!(tree.advance_canvas_frame(id));
        assert!(tree.advance_canvas_frame(id));
        match &tree.node(id).kind {
            ElementKind::Canvas { frame, .. } => assert_eq!(*frame, 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn advance_marks_color() {
        let mut tree = Tree::new();
        let id = canvas_node(&mut tree, 2);
        tree.node_mut(id).stain = Stain::empty();
        tree.advance_canvas_frame(id);
        assert!(tree.node(id).stain.contains(Stain::COLOR));
    }

    #[test]
    fn non_canvas_is_ignored() {
        let mut tree = Tree::new();
        let id = tree.create(Style::default(), ElementKind::Panel, "p");
        assert!(!tree.advance_canvas_frame(id));
    }

    #[test]
    fn floor_division_matches_contract() {
        assert_eq!(floor_div_mod(7, 3), (2, 1));
        assert_eq!(floor_div_mod(-7, 3), (-3, 2));
        assert_eq!(floor_div_mod(6, 3), (2, 0));
    }
}
