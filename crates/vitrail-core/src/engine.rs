//! The engine: shared world state, the render-thread state machine and the
//! three cooperating workers.
//!
//! One mutex guards the whole world (tree, handlers, keyboard states,
//! memory tasks, carry flags) together with the rendezvous state; one
//! condvar carries every wakeup. A render "ticket" is the state flip to
//! [`RenderStatus::RequestingRendering`]: the render thread consumes it,
//! produces exactly one frame and parks itself back to `Paused`, notifying
//! all waiters. Pausing is counted and reentrant; while the pause count is
//! above zero no new tickets are issued.

use std::io::{self, IoSlice, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::cell::ansi;
use crate::encoder;
use crate::error::Result;
use crate::events::EventContext;
use crate::events::EventHandler;
use crate::filestream::FileStream;
use crate::geometry::{Position, Size};
use crate::input::{InputRecord, KeyboardStates};
use crate::scratch::ScratchVec;
use crate::settings::Settings;
use crate::style::{Dimension, Style};
use crate::tasks::{self, MemoryTask};
use crate::terminal::{self, RAW_INPUT_CAPACITY, TerminalSession};
use crate::tree::{ElementKind, Node, NodeId, Tree};

/// State machine of the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// The engine has not been initialized; all requests are no-ops.
    NotInitialized,
    /// The render thread is parked waiting for a ticket.
    Paused,
    /// A ticket is pending.
    RequestingRendering,
    /// A frame is being produced.
    Rendering,
    /// The render thread has exited.
    Terminated,
}

/// Flags set by signal handlers and input decoding, consumed by the
/// workers under the pause lock.
#[derive(Clone, Copy, Debug, Default)]
pub struct CarryFlags {
    /// The terminal was resized.
    pub resize: bool,
    /// Shutdown was requested.
    pub terminate: bool,
}

/// All engine state shared between the three workers.
///
/// The world lives inside the engine mutex, so a thread holding the lock
/// owns every field at once; the rendezvous protocol decides who gets to
/// hold it when.
#[derive(Debug)]
pub struct World {
    pub(crate) status: RenderStatus,
    pub(crate) locked: u32,
    /// The element tree.
    pub tree: Tree,
    /// The root element.
    pub root: Option<NodeId>,
    /// Process-wide ordered event handlers; order is tab order.
    pub handlers: Vec<EventHandler>,
    /// Inputs pending dispatch.
    pub inputs: Vec<InputRecord>,
    /// Current and previous button states.
    pub keyboard: KeyboardStates,
    /// Shared mouse position.
    pub mouse: Position,
    /// Focus holder.
    pub focused: Option<NodeId>,
    /// Hover holder.
    pub hovered: Option<NodeId>,
    /// Delayed and repeating jobs.
    pub tasks: Vec<MemoryTask>,
    /// Resize/terminate carry flags.
    pub carry: CarryFlags,
    /// Runtime settings.
    pub settings: Settings,
    /// Watched files, ticked by the event thread.
    pub streams: Vec<FileStream>,
    /// Canvas elements advanced by the event thread.
    pub canvases: Vec<NodeId>,
    /// Event-thread load in `[0, 1]`.
    pub event_thread_load: f32,
    /// Cached terminal width.
    pub max_width: u32,
    /// Cached terminal height.
    pub max_height: u32,
}

impl World {
    /// Create a fresh, uninitialized world.
    pub fn new(settings: Settings) -> Self {
        Self {
            status: RenderStatus::NotInitialized,
            locked: 0,
            tree: Tree::new(),
            root: None,
            handlers: Vec::new(),
            inputs: Vec::new(),
            keyboard: KeyboardStates::new(),
            mouse: Position::default(),
            focused: None,
            hovered: None,
            tasks: Vec::new(),
            carry: CarryFlags::default(),
            settings,
            streams: Vec::new(),
            canvases: Vec::new(),
            event_thread_load: 0.0,
            max_width: 0,
            max_height: 0,
        }
    }

    /// Current render status.
    pub fn status(&self) -> RenderStatus {
        self.status
    }

    /// Current pause depth.
    pub fn pause_depth(&self) -> u32 {
        self.locked
    }

    /// Create the root element sized to the terminal.
    pub fn create_root(&mut self, size: Size) -> NodeId {
        let mut style = Style::default();
        style.set_width(Dimension::Absolute(size.width as i32));
        style.set_height(Dimension::Absolute(size.height as i32));
        let id = self.tree.create(style, ElementKind::Panel, "main");
        self.tree.embed_styles(id, size);
        self.root = Some(id);
        self.max_width = size.width;
        self.max_height = size.height;
        id
    }

    /// Insert a detached node and attach it to a parent in one step.
    pub fn attach(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.tree.insert(node);
        self.tree.add_child(parent, id);
        id
    }

    /// Remove an element from the tree.
    ///
    /// Transfers the mouse to the parent when the removed subtree held
    /// focus, destroys the subtree and purges matching event handlers,
    /// focus and hover.
    pub fn remove_element(&mut self, id: NodeId) {
        let Some(parent) = self.tree.node(id).parent else {
            return;
        };
        if self.focused == Some(id) {
            self.mouse = self.tree.node(parent).position();
        }
        let destroyed = self.tree.remove_child(parent, id);
        if destroyed.is_empty() {
            return;
        }
        self.handlers.retain(|handler| {
            handler
                .host
                .is_none_or(|host| !destroyed.contains(&host))
        });
        if let Some(focused) = self.focused
            && destroyed.contains(&focused)
        {
            self.focused = None;
        }
        if let Some(hovered) = self.hovered
            && destroyed.contains(&hovered)
        {
            self.hovered = None;
        }
        self.canvases.retain(|canvas| !destroyed.contains(canvas));
    }

    /// Register a canvas for per-tick frame advancement.
    pub fn register_canvas(&mut self, id: NodeId) {
        if !self.canvases.contains(&id) {
            self.canvases.push(id);
        }
    }

    /// Queue a memory task.
    pub fn add_task(&mut self, task: MemoryTask) {
        self.tasks.push(task);
    }

    /// Register a watched file.
    pub fn add_stream(&mut self, stream: FileStream) {
        self.streams.push(stream);
    }

    pub(crate) fn context(&mut self) -> EventContext<'_> {
        EventContext {
            tree: &mut self.tree,
            root: self.root,
            mouse: &mut self.mouse,
            settings: &self.settings,
            carry: &mut self.carry,
        }
    }

    /// Drain due memory tasks, updating the event-thread load.
    pub fn recall_memories(&mut self, now: Instant) {
        let mut queued = std::mem::take(&mut self.tasks);
        let (outcome, failures) = {
            let mut ctx = self.context();
            tasks::recall(&mut queued, &mut ctx, now)
        };
        // Tasks queued by jobs during the pass land behind the survivors.
        queued.append(&mut self.tasks);
        self.tasks = queued;
        self.event_thread_load = outcome.load;
        for (id, error) in failures {
            self.report(&format!("in memory '{id}': {error}"));
        }
    }

    /// Tick every read-mode file stream.
    pub fn tick_file_streams(&mut self) {
        for stream in &mut self.streams {
            stream.tick();
        }
    }

    /// Advance all registered canvases one frame.
    pub fn advance_canvases(&mut self) {
        let canvases = self.canvases.clone();
        for id in canvases {
            if self.tree.contains(id) {
                self.tree.advance_canvas_frame(id);
            }
        }
    }

    /// One event-thread critical section: memory recall, file-stream tick
    /// and canvas advancement, in any order.
    pub fn event_tick(&mut self, now: Instant) {
        self.event_thread_load = 0.0;
        self.recall_memories(now);
        self.tick_file_streams();
        self.advance_canvases();
    }
}

struct Shared {
    world: Mutex<World>,
    cond: Condvar,
}

/// The engine: owns the shared world, the terminal session and the worker
/// threads.
pub struct Engine {
    shared: Arc<Shared>,
    terminal: TerminalSession,
    workers: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Create an engine with the given settings. Nothing starts until
    /// [`Engine::init`].
    pub fn new(settings: Settings) -> Self {
        settings.apply_process_wide();
        Self {
            shared: Arc::new(Shared {
                world: Mutex::new(World::new(settings)),
                cond: Condvar::new(),
            }),
            terminal: TerminalSession::new(),
            workers: Vec::new(),
        }
    }

    /// Initialize the terminal, create the root element and start the
    /// render, event and input workers.
    pub fn init(&mut self) -> Result<()> {
        let enable_drm = self.shared.world.lock().settings.enable_drm;
        if !enable_drm {
            self.terminal.init()?;
        }
        let size = self.terminal.size().unwrap_or(Size::new(80, 24));

        {
            let mut world = self.shared.world.lock();
            world.create_root(size);
            world.status = RenderStatus::Paused;
        }

        let shared = self.shared.clone();
        self.workers.push(std::thread::spawn(move || {
            render_thread(&shared);
        }));

        let shared = self.shared.clone();
        self.workers.push(std::thread::spawn(move || {
            event_thread(&shared);
        }));

        // The input thread blocks in the terminal read and is detached;
        // shutdown does not wait for it.
        let shared = self.shared.clone();
        let stdin_is_tty = self.terminal.stdin_is_tty();
        if stdin_is_tty || enable_drm {
            std::thread::spawn(move || {
                input_thread(&shared, stdin_is_tty);
            });
        }

        self.update_frame();
        Ok(())
    }

    /// Request one frame. Returns immediately when the engine is paused,
    /// not initialized or already terminated; the ticket is then owned by
    /// the pauser or there is nobody to consume it.
    pub fn update_frame(&self) {
        let mut world = self.shared.world.lock();
        if world.locked > 0
            || matches!(
                world.status,
                RenderStatus::NotInitialized | RenderStatus::Terminated
            )
        {
            return;
        }
        world.status = RenderStatus::RequestingRendering;
        self.shared.cond.notify_all();
    }

    /// Pause the render thread. Reentrant: nested calls only deepen the
    /// count, and the first call waits for the in-flight frame to finish.
    pub fn pause(&self) {
        let mut world = self.shared.world.lock();
        if world.status == RenderStatus::NotInitialized {
            return;
        }
        world.locked += 1;
        if world.locked == 1 {
            while !matches!(
                world.status,
                RenderStatus::Paused | RenderStatus::Terminated
            ) {
                self.shared.cond.wait(&mut world);
            }
        }
    }

    /// Undo one [`Engine::pause`]. At depth zero a render ticket is issued.
    pub fn resume(&self) {
        let mut world = self.shared.world.lock();
        if world.status == RenderStatus::NotInitialized {
            world.locked = 0;
            return;
        }
        world.locked = world.locked.saturating_sub(1);
        if world.locked == 0 && world.status == RenderStatus::Paused {
            world.status = RenderStatus::RequestingRendering;
            self.shared.cond.notify_all();
        }
    }

    /// Run a closure with exclusive world access between a pause and a
    /// resume. Returns `None` once the engine has terminated.
    pub fn pause_scope<R>(&self, f: impl FnOnce(&mut World) -> R) -> Option<R> {
        pause_scope_on(&self.shared, f)
    }

    /// Current render status.
    pub fn status(&self) -> RenderStatus {
        self.shared.world.lock().status
    }

    /// Register a cleanup callback run while the terminal is still live.
    pub fn register_cleanup(&mut self, callback: Box<dyn FnOnce() + Send>) {
        self.terminal.register_cleanup(callback);
    }

    /// Block until the engine terminates, then join the workers and
    /// restore the terminal. Idempotent.
    pub fn wait(&mut self) {
        {
            let mut world = self.shared.world.lock();
            while world.status != RenderStatus::Terminated
                && world.status != RenderStatus::NotInitialized
            {
                self.shared.cond.wait(&mut world);
            }
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.terminal.cleanup();
    }

    /// Signal termination, join the workers and restore the terminal.
    pub fn shutdown(&mut self) {
        {
            let mut world = self.shared.world.lock();
            world.carry.terminate = true;
            match world.status {
                RenderStatus::NotInitialized => {
                    world.status = RenderStatus::Terminated;
                }
                RenderStatus::Terminated => {}
                _ => {
                    // One final ticket; the render thread acknowledges by
                    // moving to Terminated.
                    world.status = RenderStatus::RequestingRendering;
                }
            }
            self.shared.cond.notify_all();
        }
        self.wait();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn pause_scope_on<R>(shared: &Shared, f: impl FnOnce(&mut World) -> R) -> Option<R> {
    let mut world = shared.world.lock();
    if world.status == RenderStatus::NotInitialized {
        return Some(f(&mut world));
    }
    world.locked += 1;
    while !matches!(
        world.status,
        RenderStatus::Paused | RenderStatus::Terminated
    ) {
        shared.cond.wait(&mut world);
    }
    if world.status == RenderStatus::Terminated {
        world.locked = world.locked.saturating_sub(1);
        return None;
    }
    // The engine resumes even when the scoped work panics; the unwind
    // continues after the pause count is restored and the ticket issued.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&mut world)));
    world.locked = world.locked.saturating_sub(1);
    if world.locked == 0 {
        world.status = RenderStatus::RequestingRendering;
        shared.cond.notify_all();
    }
    match result {
        Ok(value) => Some(value),
        Err(payload) => {
            drop(world);
            std::panic::resume_unwind(payload)
        }
    }
}

/// The render worker: waits for tickets, recomputes the tree, encodes and
/// writes the frame in a single vectored write.
fn render_thread(shared: &Shared) {
    let mut scratch = ScratchVec::with_capacity(1 << 16);
    let mut frame_bytes: Vec<u8> = Vec::new();

    loop {
        let mut world = shared.world.lock();
        loop {
            match world.status {
                RenderStatus::RequestingRendering => break,
                RenderStatus::Terminated => return,
                _ => shared.cond.wait(&mut world),
            }
        }
        world.status = RenderStatus::Rendering;

        if terminal::take_resize_flag() {
            world.carry.resize = true;
        }
        if terminal::terminate_requested() {
            world.carry.terminate = true;
        }

        if world.carry.terminate {
            world.status = RenderStatus::Terminated;
            shared.cond.notify_all();
            return;
        }

        if world.carry.resize {
            world.carry.resize = false;
            if let Ok(size) = crossterm::terminal::size() {
                world.max_width = u32::from(size.0);
                world.max_height = u32::from(size.1);
                if let Some(root) = world.root {
                    let (w, h) = (world.max_width, world.max_height);
                    world.tree.set_dimensions(root, w, h);
                }
            }
        }

        if let Some(root) = world.root {
            let changed = world.tree.render_root(root);
            if changed {
                let size = world.tree.node(root).size();
                encoder::encode_buffer(&mut world.tree.node_mut(root).render_buffer);
                encoder::liquify(
                    world.tree.node(root).render_buffer(),
                    size.width,
                    size.height,
                    world.settings.word_wrapping,
                    &mut scratch,
                );
                scratch.liquefy_into(&mut frame_bytes);

                let mut stdout = io::stdout().lock();
                let slices = [
                    IoSlice::new(ansi::SET_CURSOR_TO_START.as_bytes()),
                    IoSlice::new(&frame_bytes),
                ];
                if let Err(error) = stdout
                    .write_vectored(&slices)
                    .and_then(|_| stdout.flush())
                {
                    // Dropped frames are tolerated.
                    tracing::warn!(%error, "frame write failed");
                }
            }
        }

        world.status = RenderStatus::Paused;
        shared.cond.notify_all();
    }
}

/// The event worker: per tick it drains memory tasks, ticks file streams
/// and advances canvases, then sleeps adaptively based on the load the
/// recall pass reported.
fn event_thread(shared: &Shared) {
    loop {
        let tick_start = Instant::now();
        let load = pause_scope_on(shared, |world| {
            if terminal::terminate_requested() {
                world.carry.terminate = true;
            }
            if world.carry.terminate {
                return None;
            }
            world.event_tick(Instant::now());
            Some(world.event_thread_load)
        });

        match load {
            None => return,
            Some(None) => {
                // Termination observed: hand the render thread one last
                // ticket so it can acknowledge.
                let mut world = shared.world.lock();
                if world.status == RenderStatus::Paused {
                    world.status = RenderStatus::RequestingRendering;
                }
                shared.cond.notify_all();
                return;
            }
            Some(Some(load)) => {
                std::thread::sleep(tasks::next_sleep(load, tick_start.elapsed()));
            }
        }
    }
}

/// The input worker: blocks on the terminal fd, then translates and
/// dispatches the batch under the pause lock.
fn input_thread(shared: &Shared, stdin_is_tty: bool) {
    let mut buffer = [0u8; RAW_INPUT_CAPACITY];
    loop {
        let count = terminal::read_terminal_input(&mut buffer, stdin_is_tty);
        if terminal::terminate_requested() {
            return;
        }
        let alive = pause_scope_on(shared, |world| {
            if world.carry.terminate {
                return false;
            }
            if count > 0 {
                world.process_input_batch(&buffer[..count], Instant::now());
            }
            true
        });
        match alive {
            None | Some(false) => return,
            Some(true) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_world() -> World {
        let mut world = World::new(Settings::default());
        world.create_root(Size::new(20, 10));
        world.status = RenderStatus::Paused;
        world
    }

    #[test]
    fn new_world_is_uninitialized() {
        let world = World::new(Settings::default());
        assert_eq!(world.status(), RenderStatus::NotInitialized);
        assert_eq!(world.pause_depth(), 0);
        assert!(world.root.is_none());
    }

    #[test]
    fn create_root_sizes_to_terminal() {
        let mut world = World::new(Settings::default());
        let root = world.create_root(Size::new(120, 40));
        assert_eq!(world.tree.node(root).size(), Size::new(120, 40));
        assert_eq!(world.max_width, 120);
        assert_eq!(world.root, Some(root));
    }

    #[test]
    fn remove_element_purges_handlers_and_focus() {
        let mut world = live_world();
        let root = match world.root {
            Some(root) => root,
            None => unreachable!(),
        };
        let mut style = Style::default();
        style.set_width(Dimension::Absolute(4));
        style.set_height(Dimension::Absolute(2));
        let child = world.attach(root, Node::new(style, ElementKind::Panel, "btn"));
        world.on(
            child,
            crate::input::Criteria::KEY_PRESS,
            "h",
            Box::new(|_, _| Ok(true)),
        );
        world.focus_element(child);
        assert_eq!(world.focused, Some(child));
        assert_eq!(world.handlers.len(), 1);

        world.remove_element(child);
        assert!(world.focused.is_none());
        assert!(world.handlers.is_empty());
        assert!(!world.tree.contains(child));
    }

    #[test]
    fn pause_scope_runs_directly_before_init() {
        let engine = Engine::new(Settings::default());
        let ran = engine.pause_scope(|world| {
            world.mouse = Position::new(3, 4);
            true
        });
        assert_eq!(ran, Some(true));
        assert_eq!(engine.status(), RenderStatus::NotInitialized);
    }

    #[test]
    fn update_frame_is_noop_while_locked() {
        let engine = Engine::new(Settings::default());
        {
            let mut world = engine.shared.world.lock();
            world.status = RenderStatus::Paused;
            world.locked = 1;
        }
        engine.update_frame();
        assert_eq!(engine.status(), RenderStatus::Paused);
    }

    #[test]
    fn update_frame_issues_ticket_when_unlocked() {
        let engine = Engine::new(Settings::default());
        engine.shared.world.lock().status = RenderStatus::Paused;
        engine.update_frame();
        assert_eq!(engine.status(), RenderStatus::RequestingRendering);
    }

    #[test]
    fn pause_and_resume_count() {
        let engine = Engine::new(Settings::default());
        engine.shared.world.lock().status = RenderStatus::Paused;

        engine.pause();
        engine.pause();
        assert_eq!(engine.shared.world.lock().locked, 2);

        engine.resume();
        assert_eq!(engine.shared.world.lock().locked, 1);
        // Still locked: no ticket issued.
        assert_eq!(engine.status(), RenderStatus::Paused);

        engine.resume();
        assert_eq!(engine.shared.world.lock().locked, 0);
        assert_eq!(engine.status(), RenderStatus::RequestingRendering);
    }

    #[test]
    fn pause_before_init_is_noop() {
        let engine = Engine::new(Settings::default());
        engine.pause();
        assert_eq!(engine.shared.world.lock().locked, 0);
        engine.resume();
    }

    #[test]
    fn pause_scope_survives_panicking_closure() {
        let engine = Engine::new(Settings::default());
        engine.shared.world.lock().status = RenderStatus::Paused;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.pause_scope(|_| panic!("scoped work failed"));
        }));
        assert!(result.is_err());
        // The pause count is restored and a ticket was still issued.
        assert_eq!(engine.shared.world.lock().locked, 0);
        assert_eq!(engine.status(), RenderStatus::RequestingRendering);
    }

    #[test]
    fn event_tick_resets_and_sets_load() {
        let mut world = live_world();
        world.event_thread_load = 0.7;
        world.event_tick(Instant::now());
        // No tasks queued: the engine is idle.
        assert_eq!(world.event_thread_load, 0.0);
    }

    #[test]
    fn canvas_registry_deduplicates() {
        let mut world = live_world();
        let root = match world.root {
            Some(root) => root,
            None => unreachable!(),
        };
        world.register_canvas(root);
        world.register_canvas(root);
        assert_eq!(world.canvases.len(), 1);
    }
}
