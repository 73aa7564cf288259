//! Error reporting: tracing events plus the transient on-screen log window.

use std::time::Instant;

use crate::color::{Rgb, Rgba};
use crate::engine::World;
use crate::style::{Dimension, Style};
use crate::tasks::{MemoryTask, TaskFlags};
use crate::tree::{ElementKind, Node};

impl World {
    /// Report an internal failure.
    ///
    /// The message always goes to the logger. When a root element exists a
    /// log window is inserted into it and a memory task removes the window
    /// again after the configured lifetime.
    pub fn report(&mut self, message: &str) {
        tracing::error!("{message}");

        let Some(root) = self.root else {
            return;
        };
        if !self.tree.contains(root) {
            return;
        }

        let root_width = self.tree.node(root).width();
        let width = (message.chars().count() as u32 + 2)
            .min(root_width.max(4))
            .max(4);
        let height = 3u32;

        let mut style = Style::default();
        style.set_width(Dimension::Absolute(width as i32));
        style.set_height(Dimension::Absolute(height as i32));
        style.border.set(true);
        style.text_color = Rgba::opaque(Rgb::WHITE);
        style.background_color = Rgba::opaque(Rgb::DARK_RED);
        style.border_color = Rgba::opaque(Rgb::WHITE);
        style.border_background_color = Rgba::opaque(Rgb::DARK_RED);
        style.z.set(Dimension::Absolute(i32::MAX));

        let node = Node::new(
            style,
            ElementKind::Text {
                content: message.to_string(),
            },
            "log-window",
        );
        let window = self.tree.insert(node);
        if !self.tree.add_child(root, window) {
            self.tree.destroy_subtree(window);
            return;
        }

        let lifetime = self.settings.log_window_lifetime_ms;
        let task_id = format!("log-window-{}", window.index());
        self.tasks.push(MemoryTask::new(
            lifetime,
            Box::new(move |ctx| {
                if let Some(root) = ctx.root
                    && ctx.tree.contains(window)
                {
                    ctx.tree.remove_child(root, window);
                }
                Ok(true)
            }),
            TaskFlags::empty(),
            task_id,
            Instant::now(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RenderStatus;
    use crate::geometry::Size;
    use crate::settings::Settings;
    use crate::tasks;
    use std::time::Duration;

    fn live_world() -> World {
        let mut world = World::new(Settings::default());
        world.create_root(Size::new(40, 12));
        world
    }

    #[test]
    fn report_without_root_only_logs() {
        let mut world = World::new(Settings::default());
        world.report("early failure");
        assert!(world.tasks.is_empty());
        assert_eq!(world.status(), RenderStatus::NotInitialized);
    }

    #[test]
    fn report_inserts_log_window() {
        let mut world = live_world();
        let root = match world.root {
            Some(root) => root,
            None => unreachable!(),
        };
        world.report("something broke");

        assert_eq!(world.tree.children(root).len(), 1);
        assert_eq!(world.tasks.len(), 1);
        let window = world.tree.children(root)[0];
        assert!(world.tree.node(window).name.starts_with("log-window"));
    }

    #[test]
    fn log_window_expires_via_memory_task() {
        let mut world = live_world();
        let root = match world.root {
            Some(root) => root,
            None => unreachable!(),
        };
        world.report("transient");
        assert_eq!(world.tree.children(root).len(), 1);

        let lifetime = world.settings.log_window_lifetime_ms;
        let later = Instant::now() + Duration::from_millis(lifetime + 100);
        world.recall_memories(later);

        assert!(world.tree.children(root).is_empty());
        assert!(world.tasks.is_empty());
    }

    #[test]
    fn log_window_width_clamped_to_root() {
        let mut world = live_world();
        let root = match world.root {
            Some(root) => root,
            None => unreachable!(),
        };
        let long = "x".repeat(500);
        world.report(&long);
        let window = world.tree.children(root)[0];
        assert!(world.tree.node(window).width() <= world.tree.node(root).width());
    }

    #[test]
    fn expiry_load_reflects_pending_window() {
        let mut world = live_world();
        world.report("pending");
        world.recall_memories(Instant::now());
        // A 30 second horizon is far out; the thread may idle.
        assert!(world.event_thread_load <= 1.0);
        let sleep = tasks::next_sleep(world.event_thread_load, Duration::ZERO);
        assert!(sleep >= Duration::from_millis(tasks::MIN_UPDATE_SPEED_MS));
    }
}
