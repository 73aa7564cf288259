//! Per-element rasterization: the render pipeline, alpha-aware nesting,
//! border stitching and the shadow/opacity post-process.

use crate::border::BorderConnection;
use crate::cell::{Cell, Glyph};
use crate::stain::Stain;
use crate::tree::{ElementKind, Node, NodeId, Tree, border_offset};

/// The rectangle, in parent-local coordinates, into which a child may draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FittingArea {
    /// Cells clipped off the child's top-left when its position is negative.
    pub negative_offset: (i32, i32),
    /// Inclusive drawable start in parent coordinates.
    pub start: (i32, i32),
    /// Exclusive drawable end in parent coordinates.
    pub end: (i32, i32),
}

/// Compute the drawable intersection of a child inside its parent,
/// accounting for border offsets and negative child positions.
pub fn get_fitting_area(parent: &Node, child: &Node) -> FittingArea {
    let offset = border_offset(parent, child);

    let parent_start = (offset, offset);
    let parent_end = (
        parent.width() as i32 - offset,
        parent.height() as i32 - offset,
    );

    let pos = child.position();
    let negative_offset = ((-pos.x).max(0), (-pos.y).max(0));

    let start = (pos.x.max(0) + parent_start.0, pos.y.max(0) + parent_start.1);
    let end = (
        (start.0 + child.processed_width() as i32 - negative_offset.0).min(parent_end.0),
        (start.1 + child.processed_height() as i32 - negative_offset.1).min(parent_end.1),
    );

    FittingArea {
        negative_offset,
        start,
        end,
    }
}

/// Alpha-aware copy of one source cell onto a destination cell.
///
/// A fully opaque source under full child opacity overwrites the
/// destination; a fully transparent one leaves it untouched. Otherwise the
/// source background tints both destination channels and the source
/// foreground is mixed in only when the source carries visible text.
pub fn compute_alpha_to_nesting(dest: &mut Cell, src: &Cell, child_opacity: f32) {
    if child_opacity >= 1.0 && src.bg.a == u8::MAX {
        *dest = *src;
        return;
    }
    if child_opacity <= 0.0 || src.bg.a == 0 {
        return;
    }

    dest.bg.accumulate(src.bg, child_opacity);
    dest.fg.accumulate(src.bg, child_opacity);

    if !src.has_default_text() {
        dest.copy_text_from(src);
        dest.fg.accumulate(src.fg, child_opacity);
    }
}

impl Tree {
    /// Render the root element. Returns `false` when the frame is identical
    /// to the previous one and the terminal write can be skipped.
    pub fn render_root(&mut self, root: NodeId) -> bool {
        self.render_element(root)
    }

    /// Render one element and its dirty descendants into its render buffer.
    ///
    /// Returns `true` when the buffer was rewritten.
    pub fn render_element(&mut self, id: NodeId) -> bool {
        self.evaluate_dynamic_attributes(id);
        self.calculate_childs_hitboxes(id);
        self.compute_dynamic_size(id);

        if !self
            .node(id)
            .stain
            .intersects(Stain::STRETCH | Stain::RESET)
        {
            let changed = self.children_changed(id);
            if !changed && self.node(id).stain.is_clean() {
                return false;
            }
            if changed || self.has_transparent_children(id) {
                self.node_mut(id).stain.mark(Stain::RESET);
            }
        }
        if self.node(id).stain.is_clean() {
            return false;
        }

        if self.node(id).stain.contains(Stain::MOVE) {
            self.node_mut(id).stain.clear(Stain::MOVE);
            self.update_absolute_position_cache(id);
        }

        let mut buffer = std::mem::take(&mut self.node_mut(id).render_buffer);

        if self.node(id).stain.contains(Stain::RESET) {
            self.node_mut(id).stain.clear(Stain::RESET);
            buffer.fill(Cell::EMPTY);
            self.node_mut(id)
                .stain
                .mark(Stain::COLOR | Stain::EDGE | Stain::DEEP);
        }

        if self.node(id).stain.contains(Stain::STRETCH) {
            self.node_mut(id).stain.clear(Stain::STRETCH);
            let area = self.node(id).size().area();
            buffer.clear();
            buffer.resize(area, Cell::EMPTY);
            self.node_mut(id)
                .stain
                .mark(Stain::COLOR | Stain::EDGE | Stain::DEEP);
        }

        if self.node(id).stain.contains(Stain::COLOR) {
            self.node_mut(id).stain.clear(Stain::COLOR);
            self.apply_colors(id, &mut buffer);
            self.draw_content(id, &mut buffer);
        }

        let mut children_with_borders = 0usize;

        if self.node(id).stain.contains(Stain::DEEP) {
            self.node_mut(id).stain.clear(Stain::DEEP);
            let kids = self.children(id).to_vec();
            for child in kids {
                if !self.node(child).visible {
                    continue;
                }
                if !self.child_is_shown(id, child) {
                    continue;
                }
                if self.node(child).has_border() {
                    children_with_borders += 1;
                }

                self.render_element(child);
                if self.node(child).has_postprocessing() {
                    self.postprocess(child);
                }
                self.nest_child(id, child, &mut buffer);
            }
        }

        if children_with_borders > 0 && self.node(id).has_border() {
            self.node_mut(id).stain.mark(Stain::EDGE);
        }

        if self.node(id).stain.contains(Stain::EDGE) {
            self.node_mut(id).stain.clear(Stain::EDGE);
            self.render_borders(id, &mut buffer);
            self.render_title(id, &mut buffer);
        }

        if children_with_borders > 0 {
            let kids = self.children(id).to_vec();
            for &a in &kids {
                for &b in &kids {
                    if a == b {
                        continue;
                    }
                    if !self.node(a).visible
                        || !self.node(a).has_border()
                        || !self.node(b).visible
                        || !self.node(b).has_border()
                    {
                        continue;
                    }
                    self.stitch_borders(id, a, b, &mut buffer);
                }
                if self.node(id).has_border() && self.node(a).has_border() && self.node(a).visible
                {
                    self.stitch_borders(id, id, a, &mut buffer);
                }
            }
        }

        self.node_mut(id).render_buffer = buffer;
        true
    }

    /// Re-evaluate percentage and additive style values against the parent
    /// context, staining the element when a resolution changed.
    fn evaluate_dynamic_attributes(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let parent_size = self.node(parent).size();
        let node = self.node(id);

        let mut new_width = node.width;
        let mut new_height = node.height;
        if node.style.width.get().is_dynamic() {
            new_width = node.style.width.get().evaluate(parent_size.width).max(0) as u32;
        }
        if node.style.height.get().is_dynamic() {
            new_height = node.style.height.get().evaluate(parent_size.height).max(0) as u32;
        }

        let mut new_position = node.position();
        if node.style.x.get().is_dynamic() {
            new_position.x = node.style.x.get().evaluate(parent_size.width);
        }
        if node.style.y.get().is_dynamic() {
            new_position.y = node.style.y.get().evaluate(parent_size.height);
        }

        if new_width != node.width || new_height != node.height {
            let node = self.node_mut(id);
            node.width = new_width;
            node.height = new_height;
            node.stain.mark(Stain::STRETCH);
        }
        if new_position != self.node(id).position() {
            let node = self.node_mut(id);
            node.position = new_position;
            node.stain.mark(Stain::MOVE);
        }
    }

    /// Refresh the cached absolute position from the parent chain.
    fn update_absolute_position_cache(&mut self, id: NodeId) {
        let parent_abs = self
            .node(id)
            .parent
            .map(|p| self.node(p).absolute_position())
            .unwrap_or_default();
        let node = self.node_mut(id);
        node.absolute_position = parent_abs.offset(node.position);
    }

    /// Whether a direct child intersects the parent's drawable area. A
    /// parent that allows overflow places children without limits; the
    /// buffer bounds still clip the actual draw.
    fn child_is_shown(&self, parent: NodeId, child: NodeId) -> bool {
        let p = self.node(parent);
        let c = self.node(child);
        if p.style.allow_overflow {
            return true;
        }
        let border_modifier = border_offset(p, c);

        let min_x = c.position().x + c.processed_width() as i32;
        let min_y = c.position().y + c.processed_height() as i32;
        let max_x = c.position().x - (c.width() as i32 - c.processed_width() as i32);
        let max_y = c.position().y - (c.height() as i32 - c.processed_height() as i32);

        let x_inside = min_x >= border_modifier && max_x < p.width() as i32 - border_modifier;
        let y_inside = min_y >= border_modifier && max_y < p.height() as i32 - border_modifier;
        x_inside && y_inside
    }

    /// Overwrite every cell's colors with the composed text colors.
    fn apply_colors(&self, id: NodeId, buffer: &mut [Cell]) {
        let node = self.node(id);
        let (fg, bg) = node.style.compose_text_colors(node.focused, node.hovered);
        for cell in buffer.iter_mut() {
            cell.fg = fg;
            cell.bg = bg;
        }
    }

    /// Kind-specific content written after the color pass.
    fn draw_content(&self, id: NodeId, buffer: &mut [Cell]) {
        match &self.node(id).kind {
            ElementKind::Text { content } => {
                let content = content.clone();
                self.draw_text(id, &content, buffer);
            }
            ElementKind::Canvas { frames, frame } => {
                if let Some(frame_cells) = frames.get(*frame) {
                    let frame_cells = frame_cells.clone();
                    let count = frame_cells.len().min(buffer.len());
                    buffer[..count].copy_from_slice(&frame_cells[..count]);
                }
            }
            _ => {}
        }
    }

    /// Write a text run into the content box, wrapping at the box width
    /// and aligning each line by the style's anchor.
    fn draw_text(&self, id: NodeId, content: &str, buffer: &mut [Cell]) {
        let node = self.node(id);
        let offset = i32::from(node.has_border());
        let width = node.width() as i32;
        let height = node.height() as i32;
        let usable_width = width - offset * 2;
        let usable_height = height - offset * 2;
        if usable_width <= 0 || usable_height <= 0 {
            return;
        }
        let anchor = node.style.anchor;

        let mut lines: Vec<Vec<char>> = Vec::new();
        let mut line: Vec<char> = Vec::new();
        for c in content.chars() {
            if c == '\n' || line.len() as i32 >= usable_width {
                lines.push(std::mem::take(&mut line));
            }
            if c != '\n' {
                line.push(c);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }

        for (y, line) in lines.iter().enumerate() {
            if y as i32 >= usable_height {
                break;
            }
            let slack = usable_width - line.len() as i32;
            let lead = match anchor {
                crate::style::Anchor::Left => 0,
                crate::style::Anchor::Center => slack / 2,
                crate::style::Anchor::Right => slack,
            };
            for (i, c) in line.iter().enumerate() {
                let x = lead + i as i32;
                if x < 0 || x >= usable_width {
                    continue;
                }
                let index = ((y as i32 + offset) * width + x + offset) as usize;
                if let Some(cell) = buffer.get_mut(index) {
                    cell.set_text(Glyph::from_char(*c));
                }
            }
        }
    }

    /// Paint the border rectangle with the composed border colors.
    fn render_borders(&self, id: NodeId, buffer: &mut [Cell]) {
        let node = self.node(id);
        if !node.has_border() {
            return;
        }
        let width = node.width() as usize;
        let height = node.height() as usize;
        if width == 0 || height == 0 || buffer.len() < width * height {
            return;
        }
        let (fg, bg) = node.style.compose_border_colors(node.focused, node.hovered);
        let glyphs = node.style.border_glyphs;

        let mut put = |buffer: &mut [Cell], index: usize, text: &'static str| {
            let mut cell = Cell::EMPTY;
            cell.set_text(Glyph::from_str(text));
            cell.fg = fg;
            cell.bg = bg;
            buffer[index] = cell;
        };

        put(buffer, 0, glyphs.top_left);
        put(buffer, width - 1, glyphs.top_right);
        put(buffer, (height - 1) * width, glyphs.bottom_left);
        put(buffer, height * width - 1, glyphs.bottom_right);

        for x in 1..width.saturating_sub(1) {
            put(buffer, x, glyphs.horizontal);
            put(buffer, (height - 1) * width + x, glyphs.horizontal);
        }
        for y in 1..height.saturating_sub(1) {
            put(buffer, y * width, glyphs.vertical);
            put(buffer, y * width + width - 1, glyphs.vertical);
        }
    }

    /// Write the title into the top row, truncated with an ellipsis when it
    /// does not fit.
    fn render_title(&self, id: NodeId, buffer: &mut [Cell]) {
        let node = self.node(id);
        if node.style.title.is_empty() {
            return;
        }
        let width = node.width() as i32;
        let offset = i32::from(node.has_border());
        let (fg, bg) = node.style.compose_text_colors(node.focused, node.hovered);

        let title: Vec<char> = node.style.title.chars().collect();
        const ELLIPSIS_LEN: i32 = 3;
        let writable = (width - offset - ELLIPSIS_LEN - 1).max(0).min(title.len() as i32);
        let truncated = (writable as usize) < title.len();

        let mut put = |buffer: &mut [Cell], x: i32, c: char| {
            if x < 0 || x >= width {
                return;
            }
            if let Some(cell) = buffer.get_mut(x as usize) {
                let mut fresh = Cell::EMPTY;
                fresh.set_text(Glyph::from_char(c));
                fresh.fg = fg;
                fresh.bg = bg;
                *cell = fresh;
            }
        };

        for (i, c) in title.iter().take(writable as usize).enumerate() {
            put(buffer, offset + i as i32, *c);
        }
        if truncated {
            for i in 0..ELLIPSIS_LEN {
                put(buffer, offset + writable + i, '.');
            }
        }
    }

    /// Nest a child's processed buffer into the parent buffer through the
    /// fitting area, blending with the child's opacity.
    fn nest_child(&self, parent: NodeId, child: NodeId, buffer: &mut [Cell]) {
        let p = self.node(parent);
        let c = self.node(child);
        let area = get_fitting_area(p, c);
        let opacity = c.style.opacity;
        let parent_width = p.width() as i32;
        let child_width = c.processed_width() as i32;

        let source: &[Cell] = if c.has_postprocessing() && !c.post_buffer.is_empty() {
            &c.post_buffer
        } else {
            &c.render_buffer
        };

        for y in area.start.1..area.end.1 {
            for x in area.start.0..area.end.0 {
                let child_y = y - area.start.1 + area.negative_offset.1;
                let child_x = x - area.start.0 + area.negative_offset.0;
                let src_index = (child_y * child_width + child_x) as usize;
                let dest_index = (y * parent_width + x) as usize;
                if let (Some(src), Some(dest)) = (source.get(src_index), buffer.get_mut(dest_index))
                {
                    compute_alpha_to_nesting(dest, src, opacity);
                }
            }
        }
    }

    /// Patch the crossing points where the boundary rectangles of `a` and
    /// `b` intersect, substituting the glyph whose connection mask matches
    /// the observed neighbors.
    fn stitch_borders(&self, parent: NodeId, a: NodeId, b: NodeId, buffer: &mut [Cell]) {
        let bounds = |id: NodeId| -> (i32, i32, i32, i32) {
            let n = self.node(id);
            if id == parent {
                (0, 0, n.width() as i32, n.height() as i32)
            } else {
                (
                    n.position().x,
                    n.position().y,
                    n.width() as i32,
                    n.height() as i32,
                )
            }
        };
        let (ax, ay, aw, ah) = bounds(a);
        let (bx, by, bw, bh) = bounds(b);

        // Disjoint rectangles have no crossings.
        if bx + bw < ax || bx > ax + aw || by + bh < ay || by > ay + ah {
            return;
        }
        // A rectangle strictly inside the other produces no boundary
        // crossings either.
        if bx > ax && bx + bw < ax + aw && by > ay && by + bh < ay + ah {
            return;
        }

        let parent_node = self.node(parent);
        let width = parent_node.width() as i32;
        let height = parent_node.height() as i32;
        let a_glyphs = self.node(a).style.border_glyphs;
        let b_glyphs = self.node(b).style.border_glyphs;

        let candidates = [
            (ax, by),
            (ax, by + bh - 1),
            (ax + aw - 1, by),
            (ax + aw - 1, by + bh - 1),
            (bx, ay),
            (bx, ay + ah - 1),
            (bx + bw - 1, ay),
            (bx + bw - 1, ay + ah - 1),
        ];

        let is_border_glyph = |x: i32, y: i32, buffer: &[Cell]| -> bool {
            if x < 0 || y < 0 || x >= width || y >= height {
                return false;
            }
            let text_cell = buffer[(y * width + x) as usize];
            let text = text_cell.glyph.as_str();
            a_glyphs.recognizes(text) || b_glyphs.recognizes(text)
        };

        for (x, y) in candidates {
            if x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            let mut mask = BorderConnection::empty();
            if is_border_glyph(x, y - 1, buffer) {
                mask |= BorderConnection::UP;
            }
            if is_border_glyph(x, y + 1, buffer) {
                mask |= BorderConnection::DOWN;
            }
            if is_border_glyph(x - 1, y, buffer) {
                mask |= BorderConnection::LEFT;
            }
            if is_border_glyph(x + 1, y, buffer) {
                mask |= BorderConnection::RIGHT;
            }

            if let Some(glyph) = a_glyphs.glyph_for(mask) {
                buffer[(y * width + x) as usize].set_text(Glyph::from_str(glyph));
            }
        }
    }

    /// Run shadow and opacity post-processing into the node's post-process
    /// buffer, recording its extents for the parent's fitting-area math.
    pub fn postprocess(&mut self, id: NodeId) {
        let node = self.node(id);
        let mut buffer = node.render_buffer.clone();
        let mut width = node.width();
        let mut height = node.height();

        if node.style.shadow.enabled {
            let shadow = node.style.shadow;
            process_shadow(&mut buffer, &mut width, &mut height, shadow);
        }

        let opacity = self.node(id).style.opacity;
        if opacity < 1.0 {
            for cell in &mut buffer {
                cell.fg.a = (f32::from(cell.fg.a) * opacity) as u8;
                cell.bg.a = (f32::from(cell.bg.a) * opacity) as u8;
            }
        }

        let node = self.node_mut(id);
        node.post_buffer = buffer;
        node.post_width = width;
        node.post_height = height;
    }
}

/// Expand the buffer with decaying shadow rings, then offset the combined
/// box by the shadow direction.
fn process_shadow(
    buffer: &mut Vec<Cell>,
    width: &mut u32,
    height: &mut u32,
    shadow: crate::style::Shadow,
) {
    let length = (shadow.direction.z * shadow.opacity).round() as i32;
    if length <= 0 {
        return;
    }
    let w = *width as i32;
    let h = *height as i32;
    let box_w = w + length * 2;
    let box_h = h + length * 2;

    let mut shadow_box = vec![Cell::EMPTY; (box_w * box_h) as usize];
    let decay = shadow.direction.z.min(0.9);
    let mut alpha = shadow.opacity * 255.0;

    for ring in 0..length {
        let mut pixel = Cell::EMPTY;
        pixel.bg = crate::color::Rgba::new(
            shadow.color.r,
            shadow.color.g,
            shadow.color.b,
            alpha.clamp(0.0, 255.0) as u8,
        );

        let x0 = length - 1 - ring;
        let y0 = length - 1 - ring;
        let x1 = length + w + ring;
        let y1 = length + h + ring;
        for x in x0..=x1 {
            put_cell(&mut shadow_box, box_w, box_h, x, y0, pixel);
            put_cell(&mut shadow_box, box_w, box_h, x, y1, pixel);
        }
        for y in y0..=y1 {
            put_cell(&mut shadow_box, box_w, box_h, x0, y, pixel);
            put_cell(&mut shadow_box, box_w, box_h, x1, y, pixel);
        }

        alpha *= decay;
    }

    let dx = shadow.direction.x as i32;
    let dy = shadow.direction.y as i32;
    let final_w = box_w + dx.abs();
    let final_h = box_h + dy.abs();

    let shadow_start = (dx.max(0), dy.max(0));
    let original_start = (
        shadow_start.0 + length - dx,
        shadow_start.1 + length - dy,
    );

    let mut combined = vec![Cell::EMPTY; (final_w * final_h) as usize];
    for y in 0..box_h {
        for x in 0..box_w {
            let cell = shadow_box[(y * box_w + x) as usize];
            put_cell(
                &mut combined,
                final_w,
                final_h,
                shadow_start.0 + x,
                shadow_start.1 + y,
                cell,
            );
        }
    }
    for y in 0..h {
        for x in 0..w {
            let cell = buffer[(y * w + x) as usize];
            put_cell(
                &mut combined,
                final_w,
                final_h,
                original_start.0 + x,
                original_start.1 + y,
                cell,
            );
        }
    }

    *buffer = combined;
    *width = final_w as u32;
    *height = final_h as u32;
}

fn put_cell(buffer: &mut [Cell], width: i32, height: i32, x: i32, y: i32, cell: Cell) {
    if x < 0 || y < 0 || x >= width || y >= height {
        return;
    }
    buffer[(y * width + x) as usize] = cell;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Rgb, Rgba};
    use crate::geometry::{FVector3, Size};
    use crate::style::{Dimension, Style};

    fn sized_style(w: i32, h: i32) -> Style {
        let mut s = Style::default();
        s.set_width(Dimension::Absolute(w));
        s.set_height(Dimension::Absolute(h));
        s
    }

    fn make_root(tree: &mut Tree, w: i32, h: i32) -> NodeId {
        let id = tree.create(sized_style(w, h), ElementKind::Panel, "root");
        tree.embed_styles(id, Size::new(w as u32, h as u32));
        id
    }

    fn cell_at(tree: &Tree, id: NodeId, x: u32, y: u32) -> Cell {
        let node = tree.node(id);
        node.render_buffer()[(y * node.width() + x) as usize]
    }

    #[test]
    fn clean_render_buffer_matches_extents() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 7, 3);
        tree.render_element(root);
        assert!(tree.node(root).stain.is_clean());
        assert_eq!(tree.node(root).render_buffer().len(), 21);
    }

    #[test]
    fn second_render_is_identical() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 4);
        assert!(tree.render_root(root));
        assert!(!tree.render_root(root), "no change means identical frame");
    }

    #[test]
    fn hard_overwrite_of_opaque_child() {
        let mut dest = Cell::new('a', Rgba::new(10, 10, 10, 255), Rgba::new(0, 0, 0, 255));
        let src = Cell::new('b', Rgba::new(0, 0, 0, 255), Rgba::new(20, 20, 20, 255));
        compute_alpha_to_nesting(&mut dest, &src, 1.0);
        assert_eq!(dest, src);
    }

    #[test]
    fn transparent_child_contributes_nothing() {
        let original = Cell::new('a', Rgba::new(10, 10, 10, 255), Rgba::new(0, 0, 0, 255));
        let mut dest = original;
        let src = Cell::new('b', Rgba::new(9, 9, 9, 255), Rgba::new(20, 20, 20, 0));
        compute_alpha_to_nesting(&mut dest, &src, 1.0);
        assert_eq!(dest, original);
        compute_alpha_to_nesting(&mut dest, &src, 0.0);
        assert_eq!(dest, original);
    }

    #[test]
    fn half_alpha_blend_tints_and_copies_text() {
        let mut dest = Cell::new(' ', Rgba::new(0, 0, 0, 255), Rgba::new(0, 0, 0, 255));
        let src = Cell::new('b', Rgba::new(0, 0, 0, 255), Rgba::new(20, 20, 20, 128));
        compute_alpha_to_nesting(&mut dest, &src, 1.0);
        assert_eq!(dest.bg.rgb(), Rgb::new(10, 10, 10));
        assert_eq!(dest.glyph.as_str(), "b");
    }

    #[test]
    fn fitting_area_clips_negative_position() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 10, 10);
        let mut style = sized_style(4, 4);
        style.x.set(Dimension::Absolute(-2));
        style.y.set(Dimension::Absolute(-2));
        let child = tree.create(style, ElementKind::Panel, "c");
        tree.node_mut(child).parent = Some(root);
        tree.embed_styles(child, Size::new(10, 10));

        let area = get_fitting_area(tree.node(root), tree.node(child));
        assert_eq!(area.negative_offset, (2, 2));
        assert_eq!(area.start, (0, 0));
        assert_eq!(area.end, (2, 2));
    }

    #[test]
    fn fitting_area_accounts_for_parent_border() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 10, 10);
        tree.node_mut(root).style.border.set(true);
        let child = tree.create(sized_style(4, 4), ElementKind::Panel, "c");
        tree.node_mut(child).parent = Some(root);
        tree.embed_styles(child, Size::new(10, 10));

        let area = get_fitting_area(tree.node(root), tree.node(child));
        assert_eq!(area.start, (1, 1));
        assert_eq!(area.end, (5, 5));
    }

    #[test]
    fn negative_child_clipped_top_left() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 4);
        let mut style = sized_style(3, 3);
        style.x.set(Dimension::Absolute(-1));
        style.y.set(Dimension::Absolute(-1));
        style.background_color = Rgba::new(50, 50, 50, 255);
        let child = tree.create(style, ElementKind::Panel, "c");
        tree.add_child(root, child);
        tree.render_root(root);

        // The child covers rows 0..2 and columns 0..2 after clipping.
        assert_eq!(cell_at(&tree, root, 0, 0).bg, Rgba::new(50, 50, 50, 255));
        assert_eq!(cell_at(&tree, root, 1, 1).bg, Rgba::new(50, 50, 50, 255));
        assert_eq!(cell_at(&tree, root, 2, 2).bg, tree.node(root).style.background_color);
    }

    #[test]
    fn anchored_text_is_centered() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 6, 1);
        tree.node_mut(root).style.anchor = crate::style::Anchor::Center;
        tree.node_mut(root).kind = ElementKind::Text {
            content: "ab".into(),
        };
        tree.render_root(root);
        assert_eq!(cell_at(&tree, root, 2, 0).glyph.as_str(), "a");
        assert_eq!(cell_at(&tree, root, 3, 0).glyph.as_str(), "b");
        assert_eq!(cell_at(&tree, root, 0, 0).glyph.as_str(), " ");
    }

    #[test]
    fn overflowing_parent_keeps_far_children() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 4);
        tree.node_mut(root).style.allow_overflow = true;
        let mut style = sized_style(2, 2);
        style.x.set(Dimension::Absolute(10));
        let child = tree.create(style, ElementKind::Panel, "far");
        tree.node_mut(child).parent = Some(root);
        tree.embed_styles(child, Size::new(4, 4));
        tree.node_mut(root).children.push(child);
        tree.node_mut(root).stain.mark(Stain::DEEP);
        // Far outside the parent box, but an overflowing parent still
        // renders it; the buffer bounds clip the actual draw.
        tree.render_root(root);
        assert!(tree.node(child).stain.is_clean());
    }

    #[test]
    fn text_content_is_drawn_after_colors() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 5, 1);
        tree.node_mut(root).kind = ElementKind::Text {
            content: "hi".into(),
        };
        tree.render_root(root);
        assert_eq!(cell_at(&tree, root, 0, 0).glyph.as_str(), "h");
        assert_eq!(cell_at(&tree, root, 1, 0).glyph.as_str(), "i");
        assert_eq!(cell_at(&tree, root, 2, 0).glyph.as_str(), " ");
    }

    #[test]
    fn borders_painted_on_edges() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 3);
        tree.node_mut(root).style.border.set(true);
        tree.render_root(root);
        assert_eq!(cell_at(&tree, root, 0, 0).glyph.as_str(), "┌");
        assert_eq!(cell_at(&tree, root, 3, 0).glyph.as_str(), "┐");
        assert_eq!(cell_at(&tree, root, 0, 2).glyph.as_str(), "└");
        assert_eq!(cell_at(&tree, root, 3, 2).glyph.as_str(), "┘");
        assert_eq!(cell_at(&tree, root, 1, 0).glyph.as_str(), "─");
        assert_eq!(cell_at(&tree, root, 0, 1).glyph.as_str(), "│");
    }

    #[test]
    fn title_rendered_with_ellipsis() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 8, 3);
        tree.node_mut(root).style.border.set(true);
        tree.node_mut(root).style.title = "abcdefghij".into();
        tree.render_root(root);
        assert_eq!(cell_at(&tree, root, 1, 0).glyph.as_str(), "a");
        // Truncation leaves room for the three-dot ellipsis.
        let row: String = (0..8)
            .map(|x| cell_at(&tree, root, x, 0).glyph.as_str().to_string())
            .collect();
        assert!(row.contains("..."), "row was {row}");
    }

    #[test]
    fn overlapping_corner_stitches_four_way_cross() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 6, 6);
        let mut style_a = sized_style(3, 3);
        style_a.border.set(true);
        let mut style_b = sized_style(3, 3);
        style_b.border.set(true);
        style_b.x.set(Dimension::Absolute(2));
        style_b.y.set(Dimension::Absolute(2));
        let a = tree.create(style_a, ElementKind::Panel, "a");
        let b = tree.create(style_b, ElementKind::Panel, "b");
        tree.add_child(root, a);
        tree.add_child(root, b);
        tree.render_root(root);

        assert_eq!(cell_at(&tree, root, 2, 2).glyph.as_str(), "┼");
    }

    #[test]
    fn side_by_side_children_stitch_tee_pieces() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 5, 3);
        tree.node_mut(root).style.border.set(true);
        let mut style_a = sized_style(3, 3);
        style_a.border.set(true);
        let mut style_b = sized_style(3, 3);
        style_b.border.set(true);
        style_b.x.set(Dimension::Absolute(2));
        let a = tree.create(style_a, ElementKind::Panel, "a");
        let b = tree.create(style_b, ElementKind::Panel, "b");
        tree.add_child(root, a);
        tree.add_child(root, b);
        tree.render_root(root);

        // The shared boundary column meets horizontals on both sides at the
        // top and bottom rows.
        assert_eq!(cell_at(&tree, root, 2, 0).glyph.as_str(), "┬");
        assert_eq!(cell_at(&tree, root, 2, 2).glyph.as_str(), "┴");
    }

    #[test]
    fn stitching_is_order_independent() {
        let render_pair = |swap: bool| {
            let mut tree = Tree::new();
            let root = make_root(&mut tree, 6, 6);
            let mut style_a = sized_style(3, 3);
            style_a.border.set(true);
            let mut style_b = sized_style(3, 3);
            style_b.border.set(true);
            style_b.x.set(Dimension::Absolute(2));
            style_b.y.set(Dimension::Absolute(2));
            let a = tree.create(style_a, ElementKind::Panel, "a");
            let b = tree.create(style_b, ElementKind::Panel, "b");
            if swap {
                tree.add_child(root, b);
                tree.add_child(root, a);
            } else {
                tree.add_child(root, a);
                tree.add_child(root, b);
            }
            tree.render_root(root);
            tree.node(root).render_buffer().to_vec()
        };
        let forward = render_pair(false);
        let backward = render_pair(true);
        let forward_glyphs: Vec<&str> = forward.iter().map(|c| c.glyph.as_str()).collect();
        let backward_glyphs: Vec<&str> = backward.iter().map(|c| c.glyph.as_str()).collect();
        assert_eq!(forward_glyphs, backward_glyphs);
    }

    #[test]
    fn opacity_zero_child_leaves_parent_untouched() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 4);
        let mut style = sized_style(2, 2);
        style.opacity = 0.0;
        style.background_color = Rgba::new(200, 0, 0, 255);
        let child = tree.create(style, ElementKind::Panel, "ghost");
        tree.add_child(root, child);
        tree.render_root(root);
        assert_eq!(
            cell_at(&tree, root, 0, 0).bg,
            tree.node(root).style.background_color
        );
    }

    #[test]
    fn shadow_expands_post_process_extents() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 10, 10);
        let mut style = sized_style(3, 3);
        style.shadow = crate::style::Shadow {
            color: Rgb::BLACK,
            direction: FVector3::new(1.0, 1.0, 2.0),
            opacity: 1.0,
            enabled: true,
        };
        let child = tree.create(style, ElementKind::Panel, "s");
        tree.add_child(root, child);
        tree.render_element(child);
        tree.postprocess(child);

        // Length 2 rings on both sides plus the 1-cell directional offset.
        assert_eq!(tree.node(child).processed_width(), 3 + 4 + 1);
        assert_eq!(tree.node(child).processed_height(), 3 + 4 + 1);
    }

    #[test]
    fn opacity_postprocess_scales_alpha() {
        let mut tree = Tree::new();
        let root = make_root(&mut tree, 4, 4);
        let mut style = sized_style(2, 2);
        style.opacity = 0.5;
        style.background_color = Rgba::new(10, 10, 10, 255);
        let child = tree.create(style, ElementKind::Panel, "half");
        tree.add_child(root, child);
        tree.render_element(child);
        tree.postprocess(child);
        let cell = tree.node(child).post_buffer[0];
        assert_eq!(cell.bg.a, 127);
    }
}
