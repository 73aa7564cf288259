//! The retained element tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]; the parent
//! link is a plain id instead of an owning reference, so ownership flows
//! strictly parent to child and the back-pointer is navigation only. Element
//! names are kept unique by an explicit [`NameIndex`] service owned by the
//! tree.

use std::collections::HashMap;

use crate::cell::Cell;
use crate::geometry::{Position, Size};
use crate::stain::Stain;
use crate::style::{Dimension, Style};

/// Handle to a node in the tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw index of this id, for diagnostics.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Widget-specific behavior of a node.
///
/// The render pipeline, child management and hitbox recompute dispatch on
/// this kind; everything else is shared element state.
#[derive(Clone, Debug, Default)]
pub enum ElementKind {
    /// A plain container.
    #[default]
    Panel,
    /// A run of text written into the cell grid after the color pass.
    Text {
        /// The text content.
        content: String,
    },
    /// A scroll-capable list view laying children out along the style's
    /// flow direction.
    ListView {
        /// Current scroll offset in cells along the flow axis.
        scroll_index: i32,
    },
    /// A multi-frame cell canvas advanced by the event thread.
    Canvas {
        /// Animation frames, each sized to the element extent.
        frames: Vec<Vec<Cell>>,
        /// Index of the frame currently shown.
        frame: usize,
    },
}

/// Lifecycle callbacks of a node.
#[derive(Clone, Copy, Default)]
pub struct Hooks {
    /// Runs once when styles are first embedded.
    pub on_init: Option<fn(&mut Node)>,
    /// Runs when the node is destroyed.
    pub on_destroy: Option<fn(&mut Node)>,
    /// Runs on a hide-to-show transition.
    pub on_show: Option<fn(&mut Node)>,
    /// Runs on a show-to-hide transition.
    pub on_hide: Option<fn(&mut Node)>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .field("on_show", &self.on_show.is_some())
            .field("on_hide", &self.on_hide.is_some())
            .finish()
    }
}

/// One element of the tree.
#[derive(Clone, Debug)]
pub struct Node {
    /// Parent link; `None` for a root or detached node.
    pub parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// The style bag.
    pub style: Style,
    /// Dirty set.
    pub stain: Stain,
    /// Whether the element takes part in rendering and events.
    pub visible: bool,
    /// Whether the element holds focus.
    pub focused: bool,
    /// Whether the element is hovered.
    pub hovered: bool,
    /// Unique name, as registered in the name index.
    pub name: String,
    pub(crate) position: Position,
    pub(crate) absolute_position: Position,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) render_buffer: Vec<Cell>,
    pub(crate) post_buffer: Vec<Cell>,
    pub(crate) post_width: u32,
    pub(crate) post_height: u32,
    /// Widget behavior.
    pub kind: ElementKind,
    /// Lifecycle callbacks.
    pub hooks: Hooks,
}

impl Node {
    /// Create a detached node. The FINALIZE stain stays set until the
    /// styles are embedded against a parent context.
    pub fn new(style: Style, kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            style,
            stain: Stain::FINALIZE,
            visible: true,
            focused: false,
            hovered: false,
            name: name.into(),
            position: Position::default(),
            absolute_position: Position::default(),
            width: 0,
            height: 0,
            render_buffer: Vec::new(),
            post_buffer: Vec::new(),
            post_width: 0,
            post_height: 0,
            kind,
            hooks: Hooks::default(),
        }
    }

    /// Resolved width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Resolved height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolved extents.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Resolved parent-local position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Cached absolute position.
    pub fn absolute_position(&self) -> Position {
        self.absolute_position
    }

    /// Whether the border is enabled.
    pub fn has_border(&self) -> bool {
        self.style.has_border()
    }

    /// Whether opacity post-processing applies.
    pub fn is_transparent(&self) -> bool {
        self.style.opacity < 1.0
    }

    /// Whether shadow or opacity post-processing applies.
    pub fn has_postprocessing(&self) -> bool {
        self.style.shadow.enabled || self.is_transparent()
    }

    /// Extent of the buffer a parent nests: the post-process buffer when
    /// post-processing ran, the plain render buffer otherwise.
    pub fn processed_width(&self) -> u32 {
        if self.has_postprocessing() && self.post_width > 0 {
            self.post_width
        } else {
            self.width
        }
    }

    /// See [`Self::processed_width`].
    pub fn processed_height(&self) -> u32 {
        if self.has_postprocessing() && self.post_height > 0 {
            self.post_height
        } else {
            self.height
        }
    }

    /// The current render buffer.
    pub fn render_buffer(&self) -> &[Cell] {
        &self.render_buffer
    }

    /// Mark everything that forces a repaint from scratch.
    pub fn fully_stain(&mut self) {
        self.stain
            .mark(Stain::COLOR | Stain::EDGE | Stain::DEEP | Stain::RESET | Stain::MOVE);
    }
}

/// Border offset between a parent and a child: one cell when the parent has
/// a border and the child does not share it.
pub(crate) fn border_offset(parent: &Node, child: &Node) -> i32 {
    i32::from(parent.has_border() != child.has_border() && parent.has_border())
}

/// Name-to-element lookup service.
///
/// Insertion keeps names unique by suffixing the node id when a requested
/// name is taken or empty.
#[derive(Debug, Default)]
pub struct NameIndex {
    map: HashMap<String, NodeId>,
}

impl NameIndex {
    /// Register a name for a node, returning the (possibly regenerated)
    /// unique name actually stored.
    pub fn insert(&mut self, requested: &str, id: NodeId) -> String {
        let name = if requested.is_empty() {
            format!("element-{}", id.0)
        } else if self.map.contains_key(requested) {
            format!("{requested}-{}", id.0)
        } else {
            requested.to_string()
        };
        self.map.insert(name.clone(), id);
        name
    }

    /// Remove a name.
    pub fn remove(&mut self, name: &str) {
        self.map.remove(name);
    }

    /// Look up a node by name.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.map.get(name).copied()
    }

    /// Number of live names.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The element arena.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    /// The name lookup service.
    pub names: NameIndex,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node, registering its name.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        let id = match self.free.pop() {
            Some(slot) => NodeId(slot),
            None => {
                self.nodes.push(None);
                NodeId(self.nodes.len() as u32 - 1)
            }
        };
        node.name = self.names.insert(&node.name, id);
        self.nodes[id.0 as usize] = Some(node);
        id
    }

    /// Convenience: build and insert a node in one step.
    pub fn create(&mut self, style: Style, kind: ElementKind, name: impl Into<String>) -> NodeId {
        self.insert(Node::new(style, kind, name))
    }

    /// Whether the id refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Borrow a node.
    ///
    /// # Panics
    /// Panics on a stale id; holding one is an invariant violation.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("stale node id {}", id.0))
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    /// Panics on a stale id; holding one is an invariant violation.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("stale node id {}", id.0))
    }

    /// Child ids of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a node's style dimensions and position against a parent
    /// extent and clear FINALIZE. Re-embedding is idempotent; the init hook
    /// runs only on the first embed.
    pub fn embed_styles(&mut self, id: NodeId, parent_extent: Size) {
        let node = self.node_mut(id);
        node.width = node.style.width.get().evaluate(parent_extent.width).max(0) as u32;
        node.height = node.style.height.get().evaluate(parent_extent.height).max(0) as u32;
        node.position = Position::with_z(
            node.style.x.get().evaluate(parent_extent.width),
            node.style.y.get().evaluate(parent_extent.height),
            node.style.z.get().evaluate(0),
        );
        node.stain.mark(Stain::STRETCH | Stain::MOVE);
        if node.stain.contains(Stain::FINALIZE) {
            node.stain.clear(Stain::FINALIZE);
            if let Some(hook) = node.hooks.on_init {
                hook(node);
            }
        }
    }

    /// Attach a child to a parent.
    ///
    /// Embeds the child's styles on first attach, grows a dynamically sized
    /// parent to fit the child (or clamps the child to the parent content
    /// box otherwise), marks the parent DEEP and keeps children sorted by
    /// painter priority. Returns `false` when the child cannot fit and the
    /// parent cannot grow.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child {
            return false;
        }
        if self.node(child).stain.contains(Stain::FINALIZE) {
            self.node_mut(child).parent = Some(parent);
            let extent = self.node(parent).size();
            self.embed_styles(child, extent);
        }
        self.node_mut(child).parent = Some(parent);

        let offset = border_offset(self.node(parent), self.node(child));
        let child_pos = self.node(child).position;
        let child_size = self.node(child).size();
        let parent_size = self.node(parent).size();

        let exceeds = child_pos.x + child_size.width as i32 > parent_size.width as i32 - offset
            || child_pos.y + child_size.height as i32 > parent_size.height as i32 - offset;
        if exceeds {
            if self.node(parent).style.allow_dynamic_size {
                let new_width = (child_pos.x + child_size.width as i32 + offset * 2)
                    .max(parent_size.width as i32) as u32;
                let new_height = (child_pos.y + child_size.height as i32 + offset * 2)
                    .max(parent_size.height as i32) as u32;
                self.set_dimensions(parent, new_width, new_height);
            } else if !self.resize_to_parent(child, parent) {
                return false;
            }
        }

        self.node_mut(parent).stain.mark(Stain::DEEP);
        self.node_mut(parent).children.push(child);
        self.sort_children_by_z(parent);
        true
    }

    /// Stable-sort a node's children by ascending painter priority.
    pub fn sort_children_by_z(&mut self, id: NodeId) {
        let mut kids = std::mem::take(&mut self.node_mut(id).children);
        kids.sort_by_key(|child| self.node(*child).position.z);
        self.node_mut(id).children = kids;
    }

    /// Clamp a child to its parent's content box. Returns `false` when the
    /// content box has no room.
    pub fn resize_to_parent(&mut self, child: NodeId, parent: NodeId) -> bool {
        let offset = border_offset(self.node(parent), self.node(child));
        let parent_size = self.node(parent).size();
        let width = parent_size.width as i32 - offset * 2;
        let height = parent_size.height as i32 - offset * 2;
        if width <= 0 || height <= 0 {
            return false;
        }
        self.set_dimensions(child, width as u32, height as u32);
        true
    }

    /// Detach and destroy a child subtree. Returns the destroyed ids, the
    /// removed child first, or an empty vector when the child was not found.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Vec<NodeId> {
        let Some(index) = self.node(parent).children.iter().position(|c| *c == child) else {
            return Vec::new();
        };
        self.node_mut(parent).children.remove(index);
        let destroyed = self.destroy_subtree(child);
        self.node_mut(parent).stain.mark(Stain::DEEP | Stain::COLOR);
        destroyed
    }

    /// Destroy a node and all its descendants, running destroy hooks and
    /// clearing the name index. Returns the destroyed ids, root first.
    pub fn destroy_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut order = vec![id];
        let mut cursor = 0;
        while cursor < order.len() {
            let current = order[cursor];
            order.extend(self.node(current).children.iter().copied());
            cursor += 1;
        }
        for current in &order {
            if let Some(mut node) = self.nodes[current.0 as usize].take() {
                if let Some(hook) = node.hooks.on_destroy {
                    hook(&mut node);
                }
                self.names.remove(&node.name);
                self.free.push(current.0);
            }
        }
        order
    }

    /// Show or hide a subtree.
    ///
    /// The state cascades to every descendant so that the linear event
    /// handler list sees hidden descendants as not present.
    pub fn display(&mut self, id: NodeId, show: bool) {
        if self.node(id).visible == show {
            return;
        }
        let node = self.node_mut(id);
        node.stain.mark(Stain::STATE);
        node.visible = show;
        let hook = if show {
            node.hooks.on_show
        } else {
            node.hooks.on_hide
        };
        if let Some(hook) = hook {
            hook(node);
        }
        let kids = self.node(id).children.clone();
        for child in kids {
            self.display(child, show);
        }
    }

    /// Whether any descendant is stained or has a pending show/hide
    /// transition. Pending STATE stains are consumed here so recently
    /// hidden children are noticed exactly once.
    pub fn children_changed(&mut self, id: NodeId) -> bool {
        let kids = self.node(id).children.clone();
        let self_visible = self.node(id).visible;
        for child in kids {
            if self.node(child).stain.contains(Stain::STATE) {
                self.node_mut(child).stain.clear(Stain::STATE);
                return true;
            }
            if !self_visible {
                return false;
            }
            if !self.node(child).stain.is_clean() {
                return true;
            }
            if self.children_changed(child) {
                return true;
            }
        }
        false
    }

    /// Whether any descendant of a visible node is transparent.
    pub fn has_transparent_children(&self, id: NodeId) -> bool {
        if !self.node(id).visible {
            return false;
        }
        self.node(id).children.iter().any(|child| {
            self.node(*child).is_transparent() || self.has_transparent_children(*child)
        })
    }

    /// Set absolute extents. Marks STRETCH; the render buffer reallocates
    /// on the next render. Setting the current extents dirties nothing.
    pub fn set_dimensions(&mut self, id: NodeId, width: u32, height: u32) {
        let node = self.node_mut(id);
        if node.width == width && node.height == height {
            return;
        }
        node.style.set_width(Dimension::Absolute(width as i32));
        node.style.set_height(Dimension::Absolute(height as i32));
        node.width = width;
        node.height = height;
        node.stain.mark(Stain::STRETCH);
    }

    /// Set the parent-local position. Marks MOVE; the absolute-position
    /// cache refreshes on the next render. Setting the current position
    /// dirties nothing.
    pub fn set_position(&mut self, id: NodeId, position: Position) {
        let node = self.node_mut(id);
        if node.position == position {
            return;
        }
        node.style.x.set(Dimension::Absolute(position.x));
        node.style.y.set(Dimension::Absolute(position.y));
        node.style.z.set(Dimension::Absolute(position.z));
        node.position = position;
        node.stain.mark(Stain::MOVE);
    }

    /// Grow dynamically sized elements to the union of their children's
    /// bounding boxes, recursing into visible children first.
    pub fn compute_dynamic_size(&mut self, id: NodeId) {
        if !self.node(id).visible || !self.node(id).style.allow_dynamic_size {
            return;
        }
        if !self.children_changed(id) {
            return;
        }
        let kids = self.node(id).children.clone();
        for child in kids {
            if !self.node(child).visible {
                continue;
            }
            self.compute_dynamic_size(child);

            let offset = border_offset(self.node(id), self.node(child)) * 2;
            let child_node = self.node(child);
            let skip_width = child_node.style.width.get().is_percentage()
                || self.node(id).style.width.get().is_percentage();
            let skip_height = child_node.style.height.get().is_percentage()
                || self.node(id).style.height.get().is_percentage();
            let required_width = child_node.position.x + child_node.width as i32 + offset;
            let required_height = child_node.position.y + child_node.height as i32 + offset;

            let current = self.node(id).size();
            let new_width = if skip_width {
                current.width
            } else {
                required_width.max(current.width as i32) as u32
            };
            let new_height = if skip_height {
                current.height
            } else {
                required_height.max(current.height as i32) as u32
            };

            if new_width != current.width || new_height != current.height {
                self.set_dimensions(id, new_width, new_height);
            }
        }
    }

    /// Measure the free rectangle available to a child: grow from the
    /// child's position until the parent content box or another child is
    /// hit.
    pub fn fitting_dimensions(&self, parent: NodeId, child: NodeId) -> Size {
        let offset = border_offset(self.node(parent), self.node(child)) * 2;
        let parent_size = self.node(parent).size();
        let position = self.node(child).position();

        let siblings: Vec<NodeId> = self
            .node(parent)
            .children
            .iter()
            .copied()
            .filter(|c| *c != child)
            .collect();
        if siblings.is_empty() {
            return Size::new(
                (parent_size.width as i32 - offset).max(0) as u32,
                (parent_size.height as i32 - offset).max(0) as u32,
            );
        }

        let mut width = 0u32;
        let mut height = 0u32;
        loop {
            let mut grew = false;
            if position.x + width as i32 + 1 <= parent_size.width as i32 - offset {
                width += 1;
                grew = true;
            }
            if position.y + height as i32 + 1 <= parent_size.height as i32 - offset {
                height += 1;
                grew = true;
            }
            if !grew {
                break;
            }
            let probe = Size::new(width, height);
            for sibling in &siblings {
                let s = self.node(*sibling);
                if crate::geometry::collides(s.position(), position, s.size(), probe) {
                    return probe;
                }
            }
        }
        Size::new(width, height)
    }

    /// Find a node by name anywhere in the tree.
    pub fn get_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name)
    }

    /// Find a descendant of `root` by name.
    pub fn find_in_subtree(&self, root: NodeId, name: &str) -> Option<NodeId> {
        for child in &self.node(root).children {
            if self.node(*child).name == name {
                return Some(*child);
            }
            if let Some(found) = self.find_in_subtree(*child, name) {
                return Some(found);
            }
        }
        None
    }

    /// Deep-copy a subtree into detached nodes with regenerated names.
    /// The copy starts unfocused, unhovered and FINALIZE-stained.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self.node(id).clone();
        let children = std::mem::take(&mut node.children);
        node.parent = None;
        node.focused = false;
        node.hovered = false;
        node.stain.mark(Stain::FINALIZE);
        node.name = format!("{}-copy", node.name);
        let copy = self.insert(node);
        for child in children {
            let child_copy = self.copy_subtree(child);
            self.node_mut(child_copy).parent = Some(copy);
            self.node_mut(copy).children.push(child_copy);
        }
        copy
    }
}
