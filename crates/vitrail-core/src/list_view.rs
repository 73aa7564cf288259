//! The scroll-capable list view.
//!
//! A list view lays its children out along the style's flow direction,
//! merging adjacent borders, and exposes a scroll index that shifts the
//! whole run along the flow axis. It cooperates with the stain system: the
//! hitbox recompute runs from the render pipeline only while the element is
//! dirty, and scrolling marks the subtree DEEP.

use crate::geometry::Position;
use crate::stain::Stain;
use crate::style::FlowDirection;
use crate::tree::{ElementKind, NodeId, Tree, border_offset};

impl Tree {
    /// Recompute child positions for list views.
    ///
    /// Generic elements skip this; the render pipeline calls it on every
    /// node before dynamic sizing. Children are chained along the flow
    /// axis, overlapping by one cell where two bordered neighbors meet so
    /// their borders merge, and the first child starts at the negative
    /// scroll offset.
    pub(crate) fn calculate_childs_hitboxes(&mut self, id: NodeId) {
        let scroll_index = match &self.node(id).kind {
            ElementKind::ListView { scroll_index } => *scroll_index,
            _ => return,
        };
        if self.node(id).stain.is_clean() || self.children(id).is_empty() {
            return;
        }

        let flow = self.node(id).style.flow;
        let kids = self.children(id).to_vec();

        let first = kids[0];
        let first_pos = self.node(first).position();
        match flow {
            FlowDirection::Row => {
                self.set_position(first, Position::with_z(-scroll_index, first_pos.y, first_pos.z));
            }
            FlowDirection::Column => {
                self.set_position(first, Position::with_z(first_pos.x, -scroll_index, first_pos.z));
            }
        }

        let mut current = first;
        let mut max_width = self.node(first).width();
        let mut max_height = self.node(first).height();

        for &next in &kids[1..] {
            let merge = i32::from(
                self.node(next).has_border() && self.node(current).has_border(),
            );
            let current_pos = self.node(current).position();
            let next_pos = self.node(next).position();
            match flow {
                FlowDirection::Row => {
                    let x = current_pos.x + self.node(current).width() as i32 - merge;
                    self.set_position(next, Position::with_z(x, next_pos.y, next_pos.z));
                    max_height = max_height.max(self.node(next).height());
                }
                FlowDirection::Column => {
                    let y = current_pos.y + self.node(current).height() as i32 - merge;
                    self.set_position(next, Position::with_z(next_pos.x, y, next_pos.z));
                    max_width = max_width.max(self.node(next).width());
                }
            }
            current = next;
        }

        let node = self.node(id);
        let fixed_axes = !node.style.width.get().is_percentage()
            && !node.style.height.get().is_percentage();
        if fixed_axes
            && node.style.allow_dynamic_size
            && max_height > node.height()
            && max_width > node.width()
        {
            self.set_dimensions(id, max_width, max_height);
        }
    }

    /// Scroll one step toward the start. A no-op at the top.
    pub fn scroll_up(&mut self, id: NodeId) -> bool {
        let scroll_index = match &self.node(id).kind {
            ElementKind::ListView { scroll_index } => *scroll_index,
            _ => return false,
        };
        if scroll_index <= 0 {
            return false;
        }
        if let ElementKind::ListView { scroll_index } = &mut self.node_mut(id).kind {
            *scroll_index -= 1;
        }
        self.node_mut(id).stain.mark(Stain::DEEP);
        true
    }

    /// Scroll one step toward the end.
    ///
    /// Scrolling past `container extent - last child extent - border
    /// offset` is a no-op so the last child always stays reachable.
    pub fn scroll_down(&mut self, id: NodeId) -> bool {
        let scroll_index = match &self.node(id).kind {
            ElementKind::ListView { scroll_index } => *scroll_index,
            _ => return false,
        };
        let Some(&last) = self.node(id).children.last() else {
            return false;
        };
        let offset = border_offset(self.node(id), self.node(last));
        let limit = match self.node(id).style.flow {
            FlowDirection::Row => {
                self.node(id).width() as i32 - self.node(last).width() as i32 - offset
            }
            FlowDirection::Column => {
                self.node(id).height() as i32 - self.node(last).height() as i32 - offset
            }
        };
        if scroll_index > limit {
            return false;
        }
        if let ElementKind::ListView { scroll_index } = &mut self.node_mut(id).kind {
            *scroll_index += 1;
        }
        self.node_mut(id).stain.mark(Stain::DEEP);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::style::{Dimension, Style};

    fn sized_style(w: i32, h: i32) -> Style {
        let mut s = Style::default();
        s.set_width(Dimension::Absolute(w));
        s.set_height(Dimension::Absolute(h));
        s
    }

    fn list(tree: &mut Tree, w: i32, h: i32, flow: FlowDirection) -> NodeId {
        let mut style = sized_style(w, h);
        style.flow = flow;
        let id = tree.create(style, ElementKind::ListView { scroll_index: 0 }, "list");
        tree.embed_styles(id, Size::new(w as u32, h as u32));
        id
    }

    fn push_row(tree: &mut Tree, parent: NodeId, w: i32, h: i32, name: &str) -> NodeId {
        let child = tree.create(sized_style(w, h), ElementKind::Panel, name);
        tree.add_child(parent, child);
        child
    }

    #[test]
    fn column_flow_stacks_children() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 10, 10, FlowDirection::Column);
        let a = push_row(&mut tree, lv, 10, 2, "a");
        let b = push_row(&mut tree, lv, 10, 3, "b");
        let c = push_row(&mut tree, lv, 10, 1, "c");
        tree.calculate_childs_hitboxes(lv);

        assert_eq!(tree.node(a).position().y, 0);
        assert_eq!(tree.node(b).position().y, 2);
        assert_eq!(tree.node(c).position().y, 5);
    }

    #[test]
    fn row_flow_chains_horizontally() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 20, 4, FlowDirection::Row);
        let a = push_row(&mut tree, lv, 4, 4, "a");
        let b = push_row(&mut tree, lv, 6, 4, "b");
        tree.calculate_childs_hitboxes(lv);

        assert_eq!(tree.node(a).position().x, 0);
        assert_eq!(tree.node(b).position().x, 4);
    }

    #[test]
    fn bordered_neighbors_merge_by_one_cell() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 20, 5, FlowDirection::Row);
        let mut style = sized_style(5, 5);
        style.border.set(true);
        let a = tree.create(style.clone(), ElementKind::Panel, "a");
        let b = tree.create(style, ElementKind::Panel, "b");
        tree.add_child(lv, a);
        tree.add_child(lv, b);
        tree.calculate_childs_hitboxes(lv);

        assert_eq!(tree.node(b).position().x, 4, "borders overlap by one");
    }

    #[test]
    fn scroll_shifts_first_child() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 10, 4, FlowDirection::Column);
        let a = push_row(&mut tree, lv, 10, 2, "a");
        push_row(&mut tree, lv, 10, 2, "b");
        push_row(&mut tree, lv, 10, 2, "c");

        assert!(tree.scroll_down(lv));
        tree.calculate_childs_hitboxes(lv);
        assert_eq!(tree.node(a).position().y, -1);
    }

    #[test]
    fn scroll_up_at_top_is_noop() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 10, 4, FlowDirection::Column);
        push_row(&mut tree, lv, 10, 2, "a");
        assert!(!tree.scroll_up(lv));
    }

    #[test]
    fn scroll_down_stops_at_last_child() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 10, 4, FlowDirection::Column);
        push_row(&mut tree, lv, 10, 2, "a");
        push_row(&mut tree, lv, 10, 2, "b");

        // Limit is height 4 - last child height 2 - offset 0 = 2.
        assert!(tree.scroll_down(lv));
        assert!(tree.scroll_down(lv));
        assert!(tree.scroll_down(lv));
        assert!(!tree.scroll_down(lv), "scrolling past the end is a no-op");
    }

    #[test]
    fn scroll_marks_deep() {
        let mut tree = Tree::new();
        let lv = list(&mut tree, 10, 4, FlowDirection::Column);
        push_row(&mut tree, lv, 10, 2, "a");
        tree.node_mut(lv).stain = Stain::empty();
        tree.scroll_down(lv);
        assert!(tree.node(lv).stain.contains(Stain::DEEP));
    }

    #[test]
    fn non_list_scroll_is_noop() {
        let mut tree = Tree::new();
        let panel = tree.create(sized_style(5, 5), ElementKind::Panel, "p");
        assert!(!tree.scroll_up(panel));
        assert!(!tree.scroll_down(panel));
    }
}
