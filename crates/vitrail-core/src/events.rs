//! Event handlers, focus/hover routing and input dispatch.
//!
//! Handlers live in one process-wide ordered vector; the vector order is
//! also the tab-traversal order. Dispatch walks the handlers under the
//! pause lock, promotes hovered hosts to focus on click or enter, runs
//! exact-criteria jobs against the focused host and maintains the hover
//! state for everything else.

use std::time::{Duration, Instant};

use crate::engine::{CarryFlags, World};
use crate::error::JobError;
use crate::geometry::{Position, collides_point};
use crate::input::{
    Criteria, InputRecord, Key, populate_inputs_for_held_keys, synthesize_mouse_actions,
    translate_input,
};
use crate::settings::Settings;
use crate::stain::Stain;
use crate::tree::{NodeId, Tree};

/// Mutable engine surface exposed to handler and task jobs.
pub struct EventContext<'a> {
    /// The element tree.
    pub tree: &'a mut Tree,
    /// The root element, when the engine is live.
    pub root: Option<NodeId>,
    /// Shared mouse position.
    pub mouse: &'a mut Position,
    /// Runtime settings.
    pub settings: &'a Settings,
    /// Resize/terminate carry flags.
    pub carry: &'a mut CarryFlags,
}

/// Job closure run when a handler matches an input.
pub type HandlerJob =
    Box<dyn FnMut(&mut EventContext<'_>, &InputRecord) -> Result<bool, JobError> + Send>;

/// One entry of the process-wide handler vector.
pub struct EventHandler {
    /// Input flags this handler reacts to. Matching is exact.
    pub criteria: Criteria,
    /// The reaction.
    pub job: HandlerJob,
    /// The element this handler belongs to.
    pub host: Option<NodeId>,
    /// Identity used in failure logs.
    pub id: String,
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("criteria", &self.criteria)
            .field("host", &self.host)
            .field("id", &self.id)
            .finish()
    }
}

impl EventHandler {
    /// Create a handler bound to a host element.
    pub fn new(
        criteria: Criteria,
        host: NodeId,
        id: impl Into<String>,
        job: HandlerJob,
    ) -> Self {
        Self {
            criteria,
            job,
            host: Some(host),
            id: id.into(),
        }
    }
}

fn is_handler_host(handlers: &[EventHandler], id: NodeId) -> bool {
    handlers.iter().any(|h| h.host == Some(id))
}

fn set_focus_state(tree: &mut Tree, id: NodeId, focus: bool) {
    let node = tree.node_mut(id);
    node.focused = focus;
    node.stain.mark(Stain::COLOR);
}

fn set_hover_state(tree: &mut Tree, id: NodeId, hover: bool) {
    let node = tree.node_mut(id);
    node.hovered = hover;
    node.stain.mark(Stain::COLOR);
}

/// Apply a focus state down a subtree. A descendant that is itself a
/// handler host keeps its own state when it already differs from the
/// desired one.
fn apply_focus_recursive(tree: &mut Tree, handlers: &[EventHandler], id: NodeId, focus: bool) {
    if is_handler_host(handlers, id) && tree.node(id).focused != focus {
        return;
    }
    set_focus_state(tree, id, focus);
    let kids = tree.children(id).to_vec();
    for child in kids {
        apply_focus_recursive(tree, handlers, child, focus);
    }
}

fn apply_hover_recursive(tree: &mut Tree, handlers: &[EventHandler], id: NodeId, hover: bool) {
    if is_handler_host(handlers, id) && tree.node(id).hovered != hover {
        return;
    }
    set_hover_state(tree, id, hover);
    let kids = tree.children(id).to_vec();
    for child in kids {
        apply_hover_recursive(tree, handlers, child, hover);
    }
}

pub(crate) fn unfocus_element(
    tree: &mut Tree,
    handlers: &[EventHandler],
    focused: &mut Option<NodeId>,
) {
    let Some(id) = focused.take() else {
        return;
    };
    if !tree.contains(id) {
        return;
    }
    set_focus_state(tree, id, false);
    apply_focus_recursive(tree, handlers, id, false);
}

pub(crate) fn unhover_element(
    tree: &mut Tree,
    handlers: &[EventHandler],
    hovered: &mut Option<NodeId>,
) {
    let Some(id) = hovered.take() else {
        return;
    };
    if !tree.contains(id) {
        return;
    }
    set_hover_state(tree, id, false);
    apply_hover_recursive(tree, handlers, id, false);
}

pub(crate) fn update_focused_element(
    tree: &mut Tree,
    handlers: &[EventHandler],
    focused: &mut Option<NodeId>,
    mouse: &mut Position,
    root: Option<NodeId>,
    candidate: NodeId,
) {
    if *focused == Some(candidate) || Some(candidate) == root || !tree.contains(candidate) {
        return;
    }
    if focused.is_some() {
        unfocus_element(tree, handlers, focused);
    }
    *focused = Some(candidate);
    *mouse = tree.node(candidate).absolute_position();
    set_focus_state(tree, candidate, true);
    apply_focus_recursive(tree, handlers, candidate, true);
}

pub(crate) fn update_hovered_element(
    tree: &mut Tree,
    handlers: &[EventHandler],
    hovered: &mut Option<NodeId>,
    mouse: &mut Position,
    root: Option<NodeId>,
    candidate: NodeId,
) {
    if *hovered == Some(candidate) || Some(candidate) == root || !tree.contains(candidate) {
        return;
    }
    if hovered.is_some() {
        unhover_element(tree, handlers, hovered);
    }
    *hovered = Some(candidate);
    *mouse = tree.node(candidate).absolute_position();
    set_hover_state(tree, candidate, true);
    apply_hover_recursive(tree, handlers, candidate, true);
}

impl World {
    /// Append a handler to the process-wide vector. Vector order is tab
    /// order.
    pub fn add_handler(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    /// Register a handler job on a host element in one call.
    pub fn on(
        &mut self,
        host: NodeId,
        criteria: Criteria,
        id: impl Into<String>,
        job: HandlerJob,
    ) {
        self.handlers
            .push(EventHandler::new(criteria, host, id, job));
    }

    /// Move focus to an element programmatically.
    pub fn focus_element(&mut self, candidate: NodeId) {
        update_focused_element(
            &mut self.tree,
            &self.handlers,
            &mut self.focused,
            &mut self.mouse,
            self.root,
            candidate,
        );
    }

    /// Drop focus entirely.
    pub fn unfocus(&mut self) {
        unfocus_element(&mut self.tree, &self.handlers, &mut self.focused);
    }

    /// Escape unfocuses, restoring hover to the element that held focus so
    /// keyboard users keep their place.
    pub(crate) fn handle_escape(&mut self) {
        if !self.keyboard.pressed(Key::Escape) {
            return;
        }
        if let Some(focused) = self.focused {
            update_hovered_element(
                &mut self.tree,
                &self.handlers,
                &mut self.hovered,
                &mut self.mouse,
                self.root,
                focused,
            );
            unfocus_element(&mut self.tree, &self.handlers, &mut self.focused);
        }
    }

    /// Tab cycles hover through the handler vector, wrapping at the ends;
    /// shift reverses. While an element is focused, tab belongs to it.
    pub(crate) fn handle_tabulator(&mut self) {
        if !self.keyboard.pressed(Key::Tab) {
            return;
        }
        if self.focused.is_some() {
            return;
        }
        let len = self.handlers.len();
        if len == 0 {
            return;
        }
        let shift = self.keyboard.pressed(Key::Shift);

        let next_index = match self.hovered {
            None => {
                if shift {
                    len - 1
                } else {
                    0
                }
            }
            Some(current) => {
                let mut last_occurrence = None;
                for (i, handler) in self.handlers.iter().enumerate() {
                    if handler.host == Some(current) {
                        last_occurrence = Some(i);
                    }
                }
                match last_occurrence {
                    None => {
                        if shift {
                            len - 1
                        } else {
                            0
                        }
                    }
                    Some(i) => {
                        if shift {
                            (i + len - 1) % len
                        } else {
                            (i + 1) % len
                        }
                    }
                }
            }
        };

        if let Some(host) = self.handlers[next_index].host {
            let handlers = std::mem::take(&mut self.handlers);
            update_hovered_element(
                &mut self.tree,
                &handlers,
                &mut self.hovered,
                &mut self.mouse,
                self.root,
                host,
            );
            self.handlers = handlers;
        }
    }

    /// Route scroll one-shots to the focused element.
    pub(crate) fn scroll_api(&mut self) {
        if self.keyboard.pressed(Key::MouseScrollUp) {
            if let Some(focused) = self.focused {
                self.tree.scroll_up(focused);
            }
        } else if self.keyboard.pressed(Key::MouseScrollDown)
            && let Some(focused) = self.focused
        {
            self.tree.scroll_down(focused);
        }
    }

    /// Click-versus-press synthesis from the current button states.
    pub(crate) fn mouse_api(&mut self, now: Instant) {
        let cooldown = Duration::from_millis(self.settings.mouse_press_down_cooldown_ms);
        synthesize_mouse_actions(&self.keyboard, cooldown, now, &mut self.inputs);
    }

    /// Walk the handler vector against the pending inputs.
    ///
    /// Consumed inputs are removed immediately; everything left at the end
    /// of the tick is dropped. Held keys re-populate next tick from the
    /// keyboard states, so hold-down behavior stays continuous.
    pub fn dispatch_events(&mut self) {
        populate_inputs_for_held_keys(&self.keyboard, &mut self.inputs);

        let mut handlers = std::mem::take(&mut self.handlers);
        for index in 0..handlers.len() {
            let Some(host) = handlers[index].host else {
                continue;
            };
            if !self.tree.contains(host) || !self.tree.node(host).visible {
                continue;
            }

            let host_node = self.tree.node(host);
            let overlaps = collides_point(
                host_node.absolute_position(),
                host_node.size(),
                self.mouse,
            );

            let mut j = 0;
            while j < self.inputs.len() {
                let record = self.inputs[j];
                let selects_by_click =
                    record.criteria.contains(Criteria::MOUSE_LEFT_CLICKED) && overlaps;
                let selects_by_enter =
                    record.criteria.contains(Criteria::ENTER) && self.keyboard.pressed(Key::Enter);

                if (selects_by_click || selects_by_enter) && self.tree.node(host).hovered {
                    update_focused_element(
                        &mut self.tree,
                        &handlers,
                        &mut self.focused,
                        &mut self.mouse,
                        self.root,
                        host,
                    );
                    unhover_element(&mut self.tree, &handlers, &mut self.hovered);
                    self.inputs.remove(j);
                    continue;
                }

                if handlers[index].criteria == record.criteria && self.tree.node(host).focused {
                    let mut ctx = EventContext {
                        tree: &mut self.tree,
                        root: self.root,
                        mouse: &mut self.mouse,
                        settings: &self.settings,
                        carry: &mut self.carry,
                    };
                    match (handlers[index].job)(&mut ctx, &record) {
                        Ok(true) => {
                            self.inputs.remove(j);
                            continue;
                        }
                        Ok(false) => {
                            tracing::warn!(handler = %handlers[index].id, "handler job failed");
                        }
                        Err(error) => {
                            tracing::warn!(
                                handler = %handlers[index].id,
                                %error,
                                "handler job error"
                            );
                        }
                    }
                }

                j += 1;
            }

            if !self.tree.node(host).focused {
                if overlaps {
                    update_hovered_element(
                        &mut self.tree,
                        &handlers,
                        &mut self.hovered,
                        &mut self.mouse,
                        self.root,
                        host,
                    );
                } else if self.hovered == Some(host) {
                    unhover_element(&mut self.tree, &handlers, &mut self.hovered);
                }
            }
        }
        self.handlers = handlers;

        // Nothing matched these; do not keep them lingering.
        self.inputs.clear();
    }

    /// One full input-thread critical section: translate the raw bytes,
    /// run escape/tab handling, scroll routing, click/press synthesis and
    /// handler dispatch.
    pub fn process_input_batch(&mut self, raw: &[u8], now: Instant) {
        translate_input(
            raw,
            &mut self.keyboard,
            &mut self.mouse,
            &mut self.inputs,
            now,
        );
        self.handle_escape();
        self.handle_tabulator();
        self.scroll_api();
        self.mouse_api(now);
        self.dispatch_events();
    }
}
